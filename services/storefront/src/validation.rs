//! Input validation utilities

use regex::Regex;
use std::sync::OnceLock;

use crate::models::AddressRequest;

const MAX_FIELD_LEN: usize = 128;
const MAX_IDEMPOTENCY_KEY_LEN: usize = 128;

fn validate_field(name: &str, value: &str) -> Result<(), String> {
    let value = value.trim();

    if value.is_empty() {
        return Err(format!("{} is required", name));
    }

    if value.chars().count() > MAX_FIELD_LEN {
        return Err(format!(
            "{} must be at most {} characters long",
            name, MAX_FIELD_LEN
        ));
    }

    Ok(())
}

/// Validate pincode
pub fn validate_pincode(pincode: &str) -> Result<(), String> {
    let pincode = pincode.trim();

    if pincode.is_empty() {
        return Err("Pincode is required".to_string());
    }

    static PINCODE_REGEX: OnceLock<Regex> = OnceLock::new();
    let regex = PINCODE_REGEX.get_or_init(|| {
        Regex::new(r"^[0-9A-Za-z][0-9A-Za-z -]{2,9}$").expect("Failed to compile pincode regex")
    });

    if !regex.is_match(pincode) {
        return Err(
            "Pincode must be 3 to 10 letters, digits, spaces or hyphens".to_string(),
        );
    }

    Ok(())
}

/// Validate an address body
pub fn validate_address(request: &AddressRequest) -> Result<(), String> {
    validate_field("House", &request.house)?;
    validate_field("Street", &request.street)?;
    validate_field("City", &request.city)?;
    validate_pincode(&request.pincode)
}

/// Validate an Idempotency-Key header value
pub fn validate_idempotency_key(key: &str) -> Result<(), String> {
    if key.is_empty() {
        return Err("Idempotency key is required".to_string());
    }

    if key.len() > MAX_IDEMPOTENCY_KEY_LEN {
        return Err(format!(
            "Idempotency key must be at most {} characters long",
            MAX_IDEMPOTENCY_KEY_LEN
        ));
    }

    if !key.bytes().all(|b| b.is_ascii_graphic()) {
        return Err("Idempotency key may only contain visible ASCII characters".to_string());
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn address() -> AddressRequest {
        AddressRequest {
            house: "12B".to_string(),
            street: "Rue de la Joie".to_string(),
            city: "Douala".to_string(),
            pincode: "560 001".to_string(),
        }
    }

    #[test]
    fn accepts_a_complete_address() {
        assert!(validate_address(&address()).is_ok());
    }

    #[test]
    fn rejects_blank_fields() {
        let mut request = address();
        request.street = "  ".to_string();
        assert_eq!(
            validate_address(&request).unwrap_err(),
            "Street is required"
        );
    }

    #[test]
    fn rejects_overlong_fields() {
        let mut request = address();
        request.city = "x".repeat(129);
        assert!(validate_address(&request).is_err());

        request.city = "x".repeat(128);
        assert!(validate_address(&request).is_ok());
    }

    #[test]
    fn pincode_shapes() {
        assert!(validate_pincode("75001").is_ok());
        assert!(validate_pincode("SW1A 1AA").is_ok());
        assert!(validate_pincode(" 90210 ").is_ok());
        assert!(validate_pincode("12").is_err());
        assert!(validate_pincode("-1234").is_err());
        assert!(validate_pincode("12345678901").is_err());
        assert!(validate_pincode("123#45").is_err());
    }

    #[test]
    fn idempotency_keys() {
        assert!(validate_idempotency_key("c0ffee-42").is_ok());
        assert!(validate_idempotency_key("").is_err());
        assert!(validate_idempotency_key("two words").is_err());
        assert!(validate_idempotency_key(&"k".repeat(129)).is_err());
        assert!(validate_idempotency_key("clé").is_err());
    }
}
