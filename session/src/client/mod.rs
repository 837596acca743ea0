//! HTTP client that carries the session's bearer credentials.
//!
//! This module provides the [`AuthenticatedClient`] with its two
//! interceptors, the owned [`ApiRequest`] description that makes a request
//! re-sendable, and the [`Navigator`] hook used when the session has to be
//! re-established through the login entry point.

pub mod authenticated;
pub mod navigator;
pub mod request;
pub mod response;

pub use authenticated::AuthenticatedClient;
pub use navigator::{Navigator, TracingNavigator};
pub use request::{ApiRequest, Attempt, RequestBody};
