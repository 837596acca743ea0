//! Admission check run before rendering a protected view.
//!
//! The gate is a pure function of [`SessionState`]: while the session is
//! bootstrapping it asks for a loading indicator, once resolved it either
//! admits the identity or redirects. Protected content is only produced on
//! admission, so nothing protected is built before bootstrap resolves.

use crate::auth::models::Identity;
use crate::auth::policy::RolePolicy;
use crate::config::Config;
use crate::context::SessionState;
use tokio::sync::watch;

/// Outcome of evaluating a [`RouteGate`].
#[derive(Debug, Clone, PartialEq)]
pub enum GateDecision {
    /// The session is still bootstrapping; render a loading indicator.
    Loading,
    /// Render the protected view for this identity.
    Admit(Identity),
    /// Replace the current location with `to`.
    Redirect { to: String },
}

#[derive(Debug, Clone)]
struct RoleRequirement {
    policy: RolePolicy,
    fallback_path: String,
}

/// Declarative guard for a protected route.
#[derive(Debug, Clone)]
pub struct RouteGate {
    login_path: String,
    requirement: Option<RoleRequirement>,
}

impl RouteGate {
    pub fn new(login_path: impl Into<String>) -> Self {
        Self {
            login_path: login_path.into(),
            requirement: None,
        }
    }

    pub fn from_config(config: &Config) -> Self {
        Self::new(config.login_path.clone())
    }

    /// Additionally requires the identity to satisfy `policy`; authenticated
    /// users that do not are sent to `fallback_path`.
    pub fn require(mut self, policy: RolePolicy, fallback_path: impl Into<String>) -> Self {
        self.requirement = Some(RoleRequirement {
            policy,
            fallback_path: fallback_path.into(),
        });
        self
    }

    pub fn login_path(&self) -> &str {
        &self.login_path
    }

    pub fn evaluate(&self, state: &SessionState) -> GateDecision {
        if state.is_loading {
            return GateDecision::Loading;
        }

        match &state.identity {
            None => GateDecision::Redirect {
                to: self.login_path.clone(),
            },
            Some(identity) => match &self.requirement {
                Some(requirement) if !requirement.policy.allows(identity) => {
                    GateDecision::Redirect {
                        to: requirement.fallback_path.clone(),
                    }
                }
                _ => GateDecision::Admit(identity.clone()),
            },
        }
    }

    /// Renders one of three views depending on the gate decision. Only the
    /// closure matching the decision is invoked.
    pub fn render<T>(
        &self,
        state: &SessionState,
        loading: impl FnOnce() -> T,
        protected: impl FnOnce(&Identity) -> T,
        redirect: impl FnOnce(&str) -> T,
    ) -> T {
        match self.evaluate(state) {
            GateDecision::Loading => loading(),
            GateDecision::Admit(identity) => protected(&identity),
            GateDecision::Redirect { to } => redirect(&to),
        }
    }

    /// Waits until the session has resolved and returns the final decision.
    ///
    /// If the session is dropped while still loading, the user is sent to the
    /// login path.
    pub async fn wait_for_decision(
        &self,
        receiver: &mut watch::Receiver<SessionState>,
    ) -> GateDecision {
        match receiver.wait_for(|state| !state.is_loading).await {
            Ok(state) => self.evaluate(&state),
            Err(_) => GateDecision::Redirect {
                to: self.login_path.clone(),
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::auth::models::{CredentialPair, Role};
    use crate::context::SessionContext;
    use crate::store::MemoryCredentialStore;
    use crate::test_support::{RecordingNavigator, StubBackend, identity};
    use std::sync::Arc;

    #[test]
    fn test_decisions() {
        let gate = RouteGate::new("/login");

        assert_eq!(gate.evaluate(&SessionState::bootstrapping()), GateDecision::Loading);
        assert_eq!(
            gate.evaluate(&SessionState::resolved(None)),
            GateDecision::Redirect {
                to: "/login".to_string()
            }
        );

        let admin = identity(Role::Admin);
        assert_eq!(
            gate.evaluate(&SessionState::resolved(Some(admin.clone()))),
            GateDecision::Admit(admin)
        );
    }

    #[test]
    fn test_role_requirement() {
        let gate = RouteGate::new("/login").require(RolePolicy::admin_only(), "/");

        assert_eq!(
            gate.evaluate(&SessionState::resolved(Some(identity(Role::Resident)))),
            GateDecision::Redirect { to: "/".to_string() }
        );
        assert!(matches!(
            gate.evaluate(&SessionState::resolved(Some(identity(Role::Admin)))),
            GateDecision::Admit(_)
        ));
    }

    #[test]
    fn test_render_never_builds_protected_view_while_loading() {
        let gate = RouteGate::new("/login");
        let view = gate.render(
            &SessionState::bootstrapping(),
            || "spinner".to_string(),
            |_| panic!("protected view rendered during bootstrap"),
            |to| format!("redirect:{to}"),
        );
        assert_eq!(view, "spinner");

        let view = gate.render(
            &SessionState::resolved(Some(identity(Role::Staff))),
            || "spinner".to_string(),
            |identity| format!("dashboard:{}", identity.email),
            |to| format!("redirect:{to}"),
        );
        assert_eq!(view, "dashboard:staff@example.com");
    }

    #[tokio::test]
    async fn test_gate_waits_for_bootstrap_refresh() {
        let backend = StubBackend::spawn().await;
        backend.add_refresh(
            "valid-r1",
            CredentialPair::new("new-a1", "valid-r2"),
            identity(Role::Admin),
        );
        let store =
            Arc::new(MemoryCredentialStore::with_pair(CredentialPair::new("expired", "valid-r1")));
        let context = SessionContext::new(
            &backend.config(),
            store,
            Arc::new(RecordingNavigator::default()),
            RolePolicy::admin_only(),
        )
        .unwrap();
        let gate = RouteGate::from_config(&backend.config());

        let mut receiver = context.subscribe();
        assert_eq!(gate.evaluate(&receiver.borrow()), GateDecision::Loading);

        let (decision, _) =
            tokio::join!(gate.wait_for_decision(&mut receiver), context.bootstrap());

        assert!(
            matches!(decision, GateDecision::Admit(ref identity) if identity.role == Role::Admin)
        );
        assert_eq!(backend.refresh_calls(), 1);
    }
}
