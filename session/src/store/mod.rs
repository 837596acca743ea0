//! Durable persistence of the credential pair.
//!
//! All reads and writes of the access and refresh tokens go through the
//! [`CredentialStore`] trait, so the persistence policy can change without
//! touching the client, the refresh coordinator or the session context.

pub mod credential_store;

pub use credential_store::{CredentialStore, FileCredentialStore, MemoryCredentialStore};
