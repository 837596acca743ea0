//! Session and credential lifecycle manager for the condominium portals.
//!
//! The crate authenticates against the portal REST backend, keeps the bearer
//! credential pair in a durable [`store::CredentialStore`], renews it
//! transparently when the backend answers `401`, and exposes the resulting
//! session to views through [`context::SessionContext`] and
//! [`gate::RouteGate`].
//!
//! ```no_run
//! use portal_session::{Config, RouteGate, SessionContext, TracingNavigator};
//! use std::sync::Arc;
//!
//! # async fn run() -> anyhow::Result<()> {
//! let config = Config::from_env()?;
//! let session = SessionContext::from_config(&config, Arc::new(TracingNavigator))?;
//! let state = session.bootstrap().await;
//! let decision = RouteGate::from_config(&config).evaluate(&state);
//! # let _ = decision;
//! # Ok(())
//! # }
//! ```

pub mod auth;
pub mod client;
pub mod config;
pub mod context;
pub mod errors;
pub mod gate;
pub mod services;
pub mod store;

#[cfg(test)]
mod test_support;

pub use auth::{CredentialPair, Identity, Role, RolePolicy};
pub use client::{ApiRequest, AuthenticatedClient, Navigator, TracingNavigator};
pub use config::Config;
pub use context::{SessionContext, SessionPhase, SessionState};
pub use errors::{SessionError, SessionResult, StoreError};
pub use gate::{GateDecision, RouteGate};
pub use services::RefreshCoordinator;
pub use store::{CredentialStore, FileCredentialStore, MemoryCredentialStore};
