//! Storefront service: carts, saved addresses and checkout over per-user documents
//!
//! The binary in `main.rs` wires these modules to PostgreSQL, the optional
//! Redis catalog cache and the identity service's public key. Tests build the
//! same router over the in-memory repositories.

pub mod config;
pub mod domain;
pub mod error;
pub mod identity;
pub mod middleware;
pub mod models;
pub mod repositories;
pub mod routes;
pub mod state;
pub mod validation;

pub use state::AppState;
