//! Session-wide error types.
//!
//! Every fallible operation in the crate returns a [`SessionError`]. Errors
//! carry their messages as strings so a single refresh outcome can be cloned
//! and handed to every request waiting on it.

use thiserror::Error;

/// Errors raised by a [`CredentialStore`](crate::store::CredentialStore).
#[derive(Debug, Clone, Error)]
pub enum StoreError {
    /// Reading or writing the backing file failed.
    #[error("Credential store I/O error: {0}")]
    Io(String),
    /// The persisted document could not be parsed.
    #[error("Credential store is corrupt: {0}")]
    Corrupt(String),
}

pub type StoreResult<T> = Result<T, StoreError>;

/// Errors surfaced by the session manager and the authenticated client.
#[derive(Debug, Clone, Error)]
pub enum SessionError {
    #[error("Invalid credentials: {message}")]
    BadCredentials { message: String },

    #[error("Access denied: {message}")]
    AccessDenied { message: String },

    /// A `401` that survived the single post-refresh retry.
    #[error("Unauthorized")]
    Unauthorized,

    /// The session was torn down because the credentials could not be renewed.
    #[error("Session expired: {reason}")]
    SessionExpired { reason: String },

    #[error("Token refresh failed: {message}")]
    RefreshFailed { message: String },

    #[error("Token refresh timed out after {seconds}s")]
    RefreshTimeout { seconds: u64 },

    #[error("API error ({status}): {message}")]
    Api { status: u16, message: String },

    #[error("Network error: {message}")]
    Network { message: String },

    #[error("Failed to decode response: {message}")]
    Decode { message: String },

    #[error("Validation error: {message}")]
    Validation { message: String },

    #[error(transparent)]
    Store(#[from] StoreError),

    #[error("Configuration error: {message}")]
    Config { message: String },
}

pub type SessionResult<T> = Result<T, SessionError>;

/// Message shown when an authenticated user's role is not allowed on the portal.
pub const ACCESS_DENIED_MESSAGE: &str =
    "Access denied. This portal is not available for your role.";

impl SessionError {
    // Helper constructors for common patterns

    pub fn bad_credentials(message: impl Into<String>) -> Self {
        Self::BadCredentials {
            message: message.into(),
        }
    }

    pub fn access_denied() -> Self {
        Self::AccessDenied {
            message: ACCESS_DENIED_MESSAGE.to_string(),
        }
    }

    pub fn session_expired(reason: impl Into<String>) -> Self {
        Self::SessionExpired {
            reason: reason.into(),
        }
    }

    pub fn refresh_failed(message: impl Into<String>) -> Self {
        Self::RefreshFailed {
            message: message.into(),
        }
    }

    pub fn api(status: u16, message: impl Into<String>) -> Self {
        Self::Api {
            status,
            message: message.into(),
        }
    }

    pub fn network(message: impl Into<String>) -> Self {
        Self::Network {
            message: message.into(),
        }
    }

    pub fn decode(message: impl Into<String>) -> Self {
        Self::Decode {
            message: message.into(),
        }
    }

    pub fn validation(message: impl Into<String>) -> Self {
        Self::Validation {
            message: message.into(),
        }
    }

    pub fn config(message: impl Into<String>) -> Self {
        Self::Config {
            message: message.into(),
        }
    }

    /// True when the error means the user has to sign in again.
    pub fn requires_login(&self) -> bool {
        matches!(
            self,
            Self::Unauthorized
                | Self::SessionExpired { .. }
                | Self::BadCredentials { .. }
                | Self::AccessDenied { .. }
        )
    }
}

impl From<reqwest::Error> for SessionError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_decode() {
            Self::decode(err.to_string())
        } else {
            Self::network(err.to_string())
        }
    }
}
