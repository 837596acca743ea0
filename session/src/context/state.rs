//! Snapshot of the session as seen by consumers.

use crate::auth::models::{Identity, Role};
use serde::Serialize;

/// Coarse lifecycle phase derived from a [`SessionState`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SessionPhase {
    Bootstrapping,
    Authenticated,
    Unauthenticated,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SessionState {
    pub identity: Option<Identity>,
    pub is_loading: bool,
}

impl SessionState {
    /// State before the persisted credentials have been reconciled.
    pub fn bootstrapping() -> Self {
        Self {
            identity: None,
            is_loading: true,
        }
    }

    pub fn resolved(identity: Option<Identity>) -> Self {
        Self {
            identity,
            is_loading: false,
        }
    }

    pub fn is_authenticated(&self) -> bool {
        self.identity.is_some()
    }

    pub fn phase(&self) -> SessionPhase {
        if self.is_loading {
            SessionPhase::Bootstrapping
        } else if self.identity.is_some() {
            SessionPhase::Authenticated
        } else {
            SessionPhase::Unauthenticated
        }
    }

    pub fn has_role(&self, role: Role) -> bool {
        self.identity.as_ref().is_some_and(|i| i.role == role)
    }
}

impl Default for SessionState {
    fn default() -> Self {
        Self::bootstrapping()
    }
}
