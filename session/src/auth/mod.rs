//! Authentication module for credentials, identities and role policies.
//!
//! This module provides the wire models for the login, refresh and identity
//! endpoints, the service calling them, and the accepted-role predicate
//! applied by each portal.

pub mod models;
pub mod policy;
pub mod service;

// Re-exports for convenience
pub use models::{CredentialPair, Identity, Role};
pub use policy::RolePolicy;
pub use service::AuthService;
