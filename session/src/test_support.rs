//! In-process stand-in for the portal backend used by the unit tests.
//!
//! Serves the login, refresh and identity endpoints plus a few protected
//! resources on an ephemeral local port, and counts what it receives.

use crate::auth::models::{CredentialPair, Identity, Role};
use crate::client::Navigator;
use crate::config::Config;
use axum::extract::{Form, Path, State};
use axum::http::{HeaderMap, StatusCode, Uri};
use axum::response::{IntoResponse, Response};
use axum::routing::{delete, get, post};
use axum::{Json, Router};
use serde::Deserialize;
use serde_json::json;
use std::collections::HashMap;
use std::sync::atomic::{AtomicU16, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

pub(crate) fn identity(role: Role) -> Identity {
    Identity {
        id: format!("{role}-id"),
        email: format!("{role}@example.com"),
        role,
        tenant_id: "tenant-1".to_string(),
        is_active: true,
        full_name: None,
        cpf: None,
        unit_id: None,
    }
}

#[derive(Default)]
pub(crate) struct RecordingNavigator {
    redirects: AtomicUsize,
    last_path: Mutex<Option<String>>,
}

impl RecordingNavigator {
    pub(crate) fn redirects(&self) -> usize {
        self.redirects.load(Ordering::SeqCst)
    }

    pub(crate) fn last_path(&self) -> Option<String> {
        self.last_path.lock().unwrap().clone()
    }
}

impl Navigator for RecordingNavigator {
    fn redirect_to_login(&self, login_path: &str) {
        self.redirects.fetch_add(1, Ordering::SeqCst);
        *self.last_path.lock().unwrap() = Some(login_path.to_string());
    }
}

#[derive(Default)]
struct StubState {
    users: Mutex<HashMap<String, (String, Identity)>>,
    access: Mutex<HashMap<String, Identity>>,
    refresh: Mutex<HashMap<String, (CredentialPair, Identity)>>,
    hits: Mutex<HashMap<String, usize>>,
    last_bearer: Mutex<Option<String>>,
    refresh_delay: Mutex<Duration>,
    identity_delay: Mutex<Duration>,
    identity_failure: AtomicU16,
    login_calls: AtomicUsize,
    refresh_calls: AtomicUsize,
    issued: AtomicUsize,
}

impl StubState {
    fn record(&self, uri: &Uri, headers: &HeaderMap) -> Option<String> {
        *self
            .hits
            .lock()
            .unwrap()
            .entry(uri.path().to_string())
            .or_default() += 1;

        let bearer = headers
            .get("authorization")
            .and_then(|value| value.to_str().ok())
            .and_then(|value| value.strip_prefix("Bearer "))
            .map(str::to_string);
        *self.last_bearer.lock().unwrap() = bearer.clone();
        bearer
    }

    fn authorized(&self, bearer: Option<String>) -> Option<Identity> {
        bearer.and_then(|token| self.access.lock().unwrap().get(&token).cloned())
    }

    /// Mints a pair for `identity`; the refresh token renews into a fresh pair once.
    fn issue(&self, identity: Identity) -> CredentialPair {
        let n = self.issued.fetch_add(1, Ordering::SeqCst);
        let pair = CredentialPair::new(format!("access-{n}"), format!("refresh-{n}"));
        let next = CredentialPair::new(
            format!("access-{n}-renewed"),
            format!("refresh-{n}-renewed"),
        );
        self.access
            .lock()
            .unwrap()
            .insert(pair.access_token.clone(), identity.clone());
        self.refresh
            .lock()
            .unwrap()
            .insert(pair.refresh_token.clone(), (next, identity));
        pair
    }
}

fn unauthorized() -> Response {
    (
        StatusCode::UNAUTHORIZED,
        Json(json!({"detail": "Could not validate credentials"})),
    )
        .into_response()
}

#[derive(Deserialize)]
struct LoginForm {
    username: String,
    password: String,
}

#[derive(Deserialize)]
struct RefreshBody {
    refresh_token: String,
}

async fn login(
    State(state): State<Arc<StubState>>,
    uri: Uri,
    headers: HeaderMap,
    Form(form): Form<LoginForm>,
) -> Response {
    state.record(&uri, &headers);
    state.login_calls.fetch_add(1, Ordering::SeqCst);

    let user = state.users.lock().unwrap().get(&form.username).cloned();
    match user {
        Some((password, identity)) if password == form.password => {
            let pair = state.issue(identity);
            Json(json!({
                "access_token": pair.access_token,
                "refresh_token": pair.refresh_token,
                "token_type": "bearer"
            }))
            .into_response()
        }
        _ => (
            StatusCode::UNAUTHORIZED,
            Json(json!({"detail": "Incorrect email or password"})),
        )
            .into_response(),
    }
}

async fn refresh(
    State(state): State<Arc<StubState>>,
    uri: Uri,
    headers: HeaderMap,
    Json(body): Json<RefreshBody>,
) -> Response {
    state.record(&uri, &headers);
    state.refresh_calls.fetch_add(1, Ordering::SeqCst);

    let delay = *state.refresh_delay.lock().unwrap();
    if !delay.is_zero() {
        tokio::time::sleep(delay).await;
    }

    // Refresh tokens are single-use
    let entry = state.refresh.lock().unwrap().remove(&body.refresh_token);
    match entry {
        Some((pair, identity)) => {
            state
                .access
                .lock()
                .unwrap()
                .insert(pair.access_token.clone(), identity);
            Json(json!({
                "access_token": pair.access_token,
                "refresh_token": pair.refresh_token
            }))
            .into_response()
        }
        None => (
            StatusCode::UNAUTHORIZED,
            Json(json!({"detail": "Invalid refresh token"})),
        )
            .into_response(),
    }
}

async fn me(State(state): State<Arc<StubState>>, uri: Uri, headers: HeaderMap) -> Response {
    let bearer = state.record(&uri, &headers);
    let Some(identity) = state.authorized(bearer) else {
        return unauthorized();
    };

    let delay = *state.identity_delay.lock().unwrap();
    if !delay.is_zero() {
        tokio::time::sleep(delay).await;
    }

    match state.identity_failure.load(Ordering::SeqCst) {
        0 => Json(identity).into_response(),
        status => (
            StatusCode::from_u16(status).unwrap(),
            Json(json!({"detail": "Service unavailable"})),
        )
            .into_response(),
    }
}

async fn units(State(state): State<Arc<StubState>>, uri: Uri, headers: HeaderMap) -> Response {
    let bearer = state.record(&uri, &headers);
    if state.authorized(bearer).is_none() {
        return unauthorized();
    }
    Json(json!(["101", "102"])).into_response()
}

async fn delete_unit(
    State(state): State<Arc<StubState>>,
    Path(_id): Path<String>,
    uri: Uri,
    headers: HeaderMap,
) -> Response {
    let bearer = state.record(&uri, &headers);
    if state.authorized(bearer).is_none() {
        return unauthorized();
    }
    (
        StatusCode::NOT_FOUND,
        Json(json!({"detail": "Unit not found"})),
    )
        .into_response()
}

async fn locked(State(state): State<Arc<StubState>>, uri: Uri, headers: HeaderMap) -> Response {
    state.record(&uri, &headers);
    unauthorized()
}

async fn health(State(state): State<Arc<StubState>>, uri: Uri, headers: HeaderMap) -> Response {
    state.record(&uri, &headers);
    Json(json!({"status": "ok"})).into_response()
}

pub(crate) struct StubBackend {
    base_url: String,
    state: Arc<StubState>,
}

impl StubBackend {
    pub(crate) async fn spawn() -> Self {
        let state = Arc::new(StubState::default());

        let app = Router::new()
            .route("/api/v1/auth/login", post(login))
            .route("/api/v1/auth/refresh", post(refresh))
            .route("/api/v1/users/me", get(me))
            .route("/api/v1/units", get(units))
            .route("/api/v1/units/{id}", delete(delete_unit))
            .route("/api/v1/locked", get(locked))
            .route("/api/v1/health", get(health))
            .with_state(Arc::clone(&state));

        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });

        Self {
            base_url: format!("http://{addr}"),
            state,
        }
    }

    pub(crate) fn config(&self) -> Config {
        Config {
            api_base_url: self.base_url.clone(),
            refresh_timeout_seconds: 5,
            request_timeout_seconds: 5,
            ..Config::default()
        }
    }

    pub(crate) fn api_url(&self) -> String {
        self.config().api_url()
    }

    pub(crate) fn add_user(&self, email: &str, password: &str, identity: Identity) {
        self.state
            .users
            .lock()
            .unwrap()
            .insert(email.to_string(), (password.to_string(), identity));
    }

    pub(crate) fn add_access(&self, access_token: &str, identity: Identity) {
        self.state
            .access
            .lock()
            .unwrap()
            .insert(access_token.to_string(), identity);
    }

    /// Registers `refresh_token` so that it renews into `next` for `identity`.
    pub(crate) fn add_refresh(
        &self,
        refresh_token: &str,
        next: CredentialPair,
        identity: Identity,
    ) {
        self.state
            .refresh
            .lock()
            .unwrap()
            .insert(refresh_token.to_string(), (next, identity));
    }

    pub(crate) fn revoke_all(&self) {
        self.state.access.lock().unwrap().clear();
        self.state.refresh.lock().unwrap().clear();
    }

    pub(crate) fn set_refresh_delay(&self, delay: Duration) {
        *self.state.refresh_delay.lock().unwrap() = delay;
    }

    /// Holds every authorized `/users/me` answer back by `delay`.
    pub(crate) fn set_identity_delay(&self, delay: Duration) {
        *self.state.identity_delay.lock().unwrap() = delay;
    }

    /// Makes `/users/me` answer with `status` for valid tokens; `0` restores it.
    pub(crate) fn fail_identity_with(&self, status: u16) {
        self.state.identity_failure.store(status, Ordering::SeqCst);
    }

    pub(crate) fn refresh_calls(&self) -> usize {
        self.state.refresh_calls.load(Ordering::SeqCst)
    }

    pub(crate) fn login_calls(&self) -> usize {
        self.state.login_calls.load(Ordering::SeqCst)
    }

    /// Requests received for an API path such as `/users/me`.
    pub(crate) fn hits(&self, path: &str) -> usize {
        let full = format!("/api/v1{path}");
        self.state
            .hits
            .lock()
            .unwrap()
            .get(&full)
            .copied()
            .unwrap_or(0)
    }

    pub(crate) fn total_requests(&self) -> usize {
        self.state.hits.lock().unwrap().values().sum()
    }

    pub(crate) fn last_bearer(&self) -> Option<String> {
        self.state.last_bearer.lock().unwrap().clone()
    }
}
