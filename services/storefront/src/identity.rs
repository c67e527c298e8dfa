//! Verification of access tokens issued by the identity service
//!
//! The storefront never issues tokens. It only checks RS256 signatures
//! against the identity service's public key and trusts the `sub` claim as
//! the caller's user id.

use jsonwebtoken::{DecodingKey, Validation, decode};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use uuid::Uuid;

use crate::models::UserId;

/// Identity errors
#[derive(Debug, Error)]
pub enum AuthError {
    #[error("Invalid token: {0}")]
    InvalidToken(#[from] jsonwebtoken::errors::Error),

    #[error("Refresh tokens cannot be used for API access")]
    RefreshToken,

    #[error("Identity configuration error: {0}")]
    Configuration(String),
}

/// JWT configuration
#[derive(Debug, Clone)]
pub struct JwtConfig {
    /// Public key for verifying tokens (PEM)
    pub public_key: String,
}

impl JwtConfig {
    /// Create a new JwtConfig from environment variables
    ///
    /// # Environment Variables
    /// - `JWT_PUBLIC_KEY`: Public key for verifying tokens (PEM format) or path to public key file
    pub fn from_env() -> Result<Self, AuthError> {
        let public_key = std::env::var("JWT_PUBLIC_KEY").map_err(|_| {
            AuthError::Configuration("JWT_PUBLIC_KEY environment variable not set".to_string())
        })?;

        // If the public key looks like a file path, read from file (try CWD, then crate root)
        let public_key = if public_key.starts_with("-----BEGIN") {
            public_key
        } else {
            std::fs::read_to_string(&public_key)
                .or_else(|_| {
                    let mut path = std::path::PathBuf::from(env!("CARGO_MANIFEST_DIR"));
                    path.push(&public_key);
                    std::fs::read_to_string(path)
                })
                .map_err(|e| {
                    AuthError::Configuration(format!("Failed to read public key file: {}", e))
                })?
                .trim()
                .to_string()
        };

        Ok(JwtConfig { public_key })
    }
}

/// JWT claims structure
#[derive(Debug, Serialize, Deserialize)]
pub struct Claims {
    /// User ID
    pub sub: Uuid,
    /// User roles
    pub roles: Vec<String>,
    /// User permissions
    pub permissions: Vec<String>,
    /// Issued at time
    pub iat: u64,
    /// Expiration time
    pub exp: u64,
    /// Token type (access or refresh)
    pub token_type: TokenType,
}

/// Token type enum
#[derive(Debug, Serialize, Deserialize, Clone, Copy, PartialEq)]
pub enum TokenType {
    /// Access token
    Access,
    /// Refresh token
    Refresh,
}

/// Resolves a bearer token to the caller's user id
pub trait Authenticator: Send + Sync {
    fn authenticate(&self, token: &str) -> Result<UserId, AuthError>;
}

/// RS256 access-token verifier
#[derive(Clone)]
pub struct JwtAuthenticator {
    decoding_key: DecodingKey,
    validation: Validation,
}

impl JwtAuthenticator {
    pub fn new(config: &JwtConfig) -> Result<Self, AuthError> {
        let decoding_key = DecodingKey::from_rsa_pem(config.public_key.as_bytes())
            .map_err(|e| AuthError::Configuration(format!("Invalid public key: {}", e)))?;
        let mut validation = Validation::new(jsonwebtoken::Algorithm::RS256);
        validation.validate_exp = true;

        Ok(Self {
            decoding_key,
            validation,
        })
    }

    /// Validate a token and return the claims
    pub fn validate_token(&self, token: &str) -> Result<Claims, AuthError> {
        let token_data = decode::<Claims>(token, &self.decoding_key, &self.validation)?;
        Ok(token_data.claims)
    }
}

impl Authenticator for JwtAuthenticator {
    fn authenticate(&self, token: &str) -> Result<UserId, AuthError> {
        let claims = self.validate_token(token)?;
        if claims.token_type != TokenType::Access {
            return Err(AuthError::RefreshToken);
        }
        Ok(claims.sub)
    }
}
