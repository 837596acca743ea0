//! Process-wide session state and the commands that change it.
//!
//! [`SessionContext`] owns the single [`SessionState`]. Consumers read
//! snapshots or subscribe to changes; only `bootstrap`, `login`, `logout`,
//! `refresh_user` and the client's teardown path write to it.
//!
//! Lifecycle: `Bootstrapping` resolves once into `Authenticated` or
//! `Unauthenticated`; afterwards the state moves only on explicit commands or
//! when the credentials can no longer be renewed.

pub mod state;

pub use state::{SessionPhase, SessionState};

use crate::auth::models::{CredentialPair, Identity, LoginRequest, Role};
use crate::auth::policy::RolePolicy;
use crate::auth::service::AuthService;
use crate::client::{AuthenticatedClient, Navigator};
use crate::config::Config;
use crate::errors::{SessionError, SessionResult};
use crate::store::{CredentialStore, FileCredentialStore};
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use tokio::sync::{OnceCell, watch};
use tracing::{debug, info, warn};

/// Shared session manager. Clones refer to the same session.
#[derive(Clone)]
pub struct SessionContext {
    inner: Arc<ContextInner>,
}

struct ContextInner {
    client: AuthenticatedClient,
    auth: AuthService,
    store: Arc<dyn CredentialStore>,
    policy: RolePolicy,
    state: Arc<watch::Sender<SessionState>>,
    /// Bumped by `login`, `logout` and teardown. A result fetched under an
    /// older epoch is discarded instead of applied.
    epoch: Arc<AtomicU64>,
    bootstrapped: OnceCell<()>,
}

/// Ends the session before handing the redirect to the host navigator, so a
/// torn-down session never keeps an identity without credentials.
struct TeardownNavigator {
    state: Arc<watch::Sender<SessionState>>,
    epoch: Arc<AtomicU64>,
    inner: Arc<dyn Navigator>,
}

impl Navigator for TeardownNavigator {
    fn redirect_to_login(&self, login_path: &str) {
        self.epoch.fetch_add(1, Ordering::SeqCst);
        self.state.send_if_modified(|state| {
            let changed = state.identity.is_some() || state.is_loading;
            *state = SessionState::resolved(None);
            changed
        });
        self.inner.redirect_to_login(login_path);
    }
}

impl SessionContext {
    pub fn new(
        config: &Config,
        store: Arc<dyn CredentialStore>,
        navigator: Arc<dyn Navigator>,
        policy: RolePolicy,
    ) -> SessionResult<Self> {
        let (sender, _) = watch::channel(SessionState::bootstrapping());
        let state = Arc::new(sender);
        let epoch = Arc::new(AtomicU64::new(0));
        let teardown = Arc::new(TeardownNavigator {
            state: Arc::clone(&state),
            epoch: Arc::clone(&epoch),
            inner: navigator,
        });

        let client = AuthenticatedClient::new(config, Arc::clone(&store), teardown)?;
        let auth = AuthService::new(client.clone());

        Ok(Self {
            inner: Arc::new(ContextInner {
                client,
                auth,
                store,
                policy,
                state,
                epoch,
                bootstrapped: OnceCell::new(),
            }),
        })
    }

    /// Builds a context with the file store and role policy named in `config`.
    pub fn from_config(config: &Config, navigator: Arc<dyn Navigator>) -> SessionResult<Self> {
        let policy: RolePolicy = config
            .portal_roles
            .parse()
            .map_err(|e: String| SessionError::config(format!("PORTAL_ROLES: {e}")))?;
        let store = Arc::new(FileCredentialStore::new(&config.credential_store_path));
        Self::new(config, store, navigator, policy)
    }

    /// Current state snapshot.
    pub fn state(&self) -> SessionState {
        self.inner.state.borrow().clone()
    }

    /// Receiver notified on every state change.
    pub fn subscribe(&self) -> watch::Receiver<SessionState> {
        self.inner.state.subscribe()
    }

    pub fn is_authenticated(&self) -> bool {
        self.inner.state.borrow().is_authenticated()
    }

    pub fn is_loading(&self) -> bool {
        self.inner.state.borrow().is_loading
    }

    pub fn identity(&self) -> Option<Identity> {
        self.inner.state.borrow().identity.clone()
    }

    pub fn has_role(&self, role: Role) -> bool {
        self.inner.state.borrow().has_role(role)
    }

    pub fn policy(&self) -> &RolePolicy {
        &self.inner.policy
    }

    /// Client for further API calls made on behalf of this session.
    pub fn client(&self) -> &AuthenticatedClient {
        &self.inner.client
    }

    /// Reconciles persisted credentials with a live identity.
    ///
    /// Runs once; later calls wait for the first run. The returned state is
    /// always resolved, waiting for a sign-in that overtook bootstrap if needed.
    pub async fn bootstrap(&self) -> SessionState {
        self.inner
            .bootstrapped
            .get_or_init(|| self.run_bootstrap())
            .await;
        self.subscribe()
            .wait_for(|state| !state.is_loading)
            .await
            .map(|state| state.clone())
            .unwrap_or_else(|_| self.state())
    }

    async fn run_bootstrap(&self) {
        let epoch = self.epoch();

        let (identity, discard_credentials) = match self.inner.store.load() {
            Err(e) => {
                warn!(error = %e, "Could not read stored credentials");
                (None, true)
            }
            Ok(None) => {
                info!("No stored credentials, starting unauthenticated");
                (None, false)
            }
            Ok(Some(_)) => match self.inner.auth.current_user().await {
                Ok(identity) if self.inner.policy.allows(&identity) => {
                    info!(user_id = %identity.id, role = %identity.role, "Session restored");
                    (Some(identity), false)
                }
                Ok(identity) => {
                    warn!(
                        user_id = %identity.id,
                        role = %identity.role,
                        policy = self.inner.policy.name(),
                        "Role not accepted on this portal, discarding credentials"
                    );
                    (None, true)
                }
                Err(e) => {
                    warn!(error = %e, "Failed to load current user, discarding credentials");
                    (None, true)
                }
            },
        };

        // A login, logout or teardown during bootstrap resolves the state itself.
        self.inner.state.send_if_modified(|state| {
            if !state.is_loading || self.epoch() != epoch {
                debug!("Session changed while bootstrapping, discarding result");
                return false;
            }
            if discard_credentials {
                self.clear_credentials();
            }
            *state = SessionState::resolved(identity);
            true
        });
    }

    /// Signs in and establishes the session.
    ///
    /// On any failure the credentials are cleared, the session is left
    /// unauthenticated and the error is returned for display. A sign-in
    /// overtaken by `logout`, a teardown or a newer sign-in is discarded.
    pub async fn login(&self, email: &str, password: &str) -> SessionResult<Identity> {
        let epoch = self.inner.epoch.fetch_add(1, Ordering::SeqCst) + 1;

        match self.try_login(email, password).await {
            Ok((pair, identity)) => {
                self.establish(epoch, &pair, &identity)?;
                info!(user_id = %identity.id, role = %identity.role, "Signed in");
                Ok(identity)
            }
            Err(err) => {
                warn!(error = %err, "Sign-in failed");
                self.inner.state.send_if_modified(|state| {
                    if self.epoch() != epoch {
                        return false;
                    }
                    self.clear_credentials();
                    *state = SessionState::resolved(None);
                    true
                });
                Err(err)
            }
        }
    }

    async fn try_login(
        &self,
        email: &str,
        password: &str,
    ) -> SessionResult<(CredentialPair, Identity)> {
        let pair = self
            .inner
            .auth
            .login(LoginRequest {
                username: email.trim().to_string(),
                password: password.to_string(),
            })
            .await?;

        let identity = self.inner.auth.current_user().await?;
        if !self.inner.policy.allows(&identity) {
            return Err(SessionError::access_denied());
        }

        Ok((pair, identity))
    }

    /// Publishes a signed-in identity if `epoch` is still current and the store
    /// still holds credentials.
    fn establish(
        &self,
        epoch: u64,
        pair: &CredentialPair,
        identity: &Identity,
    ) -> SessionResult<()> {
        let mut outcome = Ok(());
        self.inner.state.send_if_modified(|state| {
            if self.epoch() != epoch {
                // Drop the pair this sign-in saved unless something replaced it
                if self.store_holds(pair) {
                    self.clear_credentials();
                }
                outcome = Err(SessionError::session_expired("session changed while signing in"));
                return false;
            }
            if !matches!(self.inner.store.load(), Ok(Some(_))) {
                outcome = Err(SessionError::session_expired(
                    "credentials were removed while signing in",
                ));
                *state = SessionState::resolved(None);
                return true;
            }
            *state = SessionState::resolved(Some(identity.clone()));
            true
        });
        if let Err(e) = &outcome {
            warn!(error = %e, "Discarding sign-in result");
        }
        outcome
    }

    /// Ends the session locally. No backend call is made.
    pub fn logout(&self) {
        self.inner.epoch.fetch_add(1, Ordering::SeqCst);
        self.clear_credentials();
        self.inner.state.send_replace(SessionState::resolved(None));
        info!("Signed out");
    }

    /// Re-fetches the identity without touching the credentials.
    ///
    /// A failure is returned to the caller and leaves the session as it was.
    /// It never signs a user in: without a current session the fetched
    /// identity is discarded and `SessionExpired` is returned.
    pub async fn refresh_user(&self) -> SessionResult<Identity> {
        let epoch = self.epoch();
        let identity = self.inner.auth.current_user().await.inspect_err(|e| {
            warn!(error = %e, "Failed to refresh user");
        })?;

        // Only an established session that is still current takes the update
        let applied = self.inner.state.send_if_modified(|state| {
            if self.epoch() != epoch || state.identity.is_none() {
                return false;
            }
            state.identity = Some(identity.clone());
            true
        });
        if !applied {
            warn!("Session ended while refreshing the user, discarding identity");
            return Err(SessionError::session_expired("session ended while refreshing the user"));
        }
        Ok(identity)
    }

    fn epoch(&self) -> u64 {
        self.inner.epoch.load(Ordering::SeqCst)
    }

    fn store_holds(&self, pair: &CredentialPair) -> bool {
        matches!(self.inner.store.access_token(), Ok(Some(token)) if token == pair.access_token)
    }

    fn clear_credentials(&self) {
        if let Err(e) = self.inner.store.clear() {
            warn!(error = %e, "Failed to clear credential store");
        }
    }
}
