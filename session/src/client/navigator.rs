//! Hook for sending the user back to the login entry point.

use tracing::warn;

/// Receives the instruction to leave the current view for the login entry
/// point after the session has been torn down.
pub trait Navigator: Send + Sync {
    fn redirect_to_login(&self, login_path: &str);
}

/// Navigator for headless hosts: records the redirect in the log.
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingNavigator;

impl Navigator for TracingNavigator {
    fn redirect_to_login(&self, login_path: &str) {
        warn!("Session ended, sign in again at {}", login_path);
    }
}
