//! The authenticated request pipeline.
//!
//! Every request passes through two interceptors:
//! - the request interceptor attaches the stored access token as a bearer
//!   credential (requests without a stored token go out unauthenticated)
//! - the response interceptor turns a first `401` into one refresh through the
//!   [`RefreshCoordinator`] and one resubmission with the new token
//!
//! When the credentials cannot be renewed the session is torn down: the store
//! is cleared, the [`Navigator`] is sent to the login entry point, and the
//! caller receives [`SessionError::SessionExpired`].

use crate::auth::models::CredentialPair;
use crate::client::navigator::Navigator;
use crate::client::request::{ApiRequest, Attempt, RequestBody};
use crate::client::response::ensure_success;
use crate::config::Config;
use crate::errors::{SessionError, SessionResult};
use crate::services::RefreshCoordinator;
use crate::store::CredentialStore;
use reqwest::{Response, StatusCode};
use serde::Serialize;
use serde::de::DeserializeOwned;
use std::sync::Arc;
use tracing::{debug, warn};

/// HTTP client wrapper that carries and renews the session credentials.
///
/// Cloning is cheap; clones share the HTTP connection pool, the store and the
/// refresh coordinator.
#[derive(Clone)]
pub struct AuthenticatedClient {
    inner: Arc<ClientInner>,
}

struct ClientInner {
    http: reqwest::Client,
    api_url: String,
    login_path: String,
    store: Arc<dyn CredentialStore>,
    coordinator: RefreshCoordinator,
    navigator: Arc<dyn Navigator>,
}

impl AuthenticatedClient {
    /// Builds a client for the API described by `config`.
    pub fn new(
        config: &Config,
        store: Arc<dyn CredentialStore>,
        navigator: Arc<dyn Navigator>,
    ) -> SessionResult<Self> {
        let http = reqwest::Client::builder()
            .timeout(config.request_timeout())
            .build()
            .map_err(|e| SessionError::config(format!("HTTP client: {e}")))?;

        let api_url = config.api_url();
        let coordinator = RefreshCoordinator::new(
            http.clone(),
            &api_url,
            Arc::clone(&store),
            config.refresh_timeout(),
        );

        Ok(Self {
            inner: Arc::new(ClientInner {
                http,
                api_url,
                login_path: config.login_path.clone(),
                store,
                coordinator,
                navigator,
            }),
        })
    }

    pub fn store(&self) -> &Arc<dyn CredentialStore> {
        &self.inner.store
    }

    pub fn coordinator(&self) -> &RefreshCoordinator {
        &self.inner.coordinator
    }

    pub fn login_path(&self) -> &str {
        &self.inner.login_path
    }

    /// Absolute URL for an API path.
    pub fn url(&self, path: &str) -> String {
        format!("{}/{}", self.inner.api_url, path.trim_start_matches('/'))
    }

    /// Sends `request` through both interceptors and returns the successful
    /// response.
    pub async fn send(&self, request: &ApiRequest) -> SessionResult<Response> {
        if request.is_public() {
            let response = self.dispatch(request, None).await?;
            return ensure_success(response).await;
        }

        let mut token = self.attach_credentials();
        let mut attempt = Attempt::First;

        loop {
            let response = self.dispatch(request, token.as_deref()).await?;
            if response.status() != StatusCode::UNAUTHORIZED {
                return ensure_success(response).await;
            }

            let Some(next) = attempt.next() else {
                warn!(path = request.path(), "Request still unauthorized after token refresh");
                return Err(SessionError::Unauthorized);
            };

            debug!(path = request.path(), "Access token rejected, refreshing");
            let pair = self.recover(token.as_deref()).await?;
            token = Some(pair.access_token);
            attempt = next;
        }
    }

    /// Sends `request` and decodes a JSON response body.
    pub async fn send_json<T: DeserializeOwned>(&self, request: &ApiRequest) -> SessionResult<T> {
        let response = self.send(request).await?;
        response
            .json::<T>()
            .await
            .map_err(|e| SessionError::decode(e.to_string()))
    }

    pub async fn get_json<T: DeserializeOwned>(&self, path: &str) -> SessionResult<T> {
        self.send_json(&ApiRequest::get(path)).await
    }

    pub async fn post_json<B, T>(&self, path: &str, body: &B) -> SessionResult<T>
    where
        B: Serialize + ?Sized,
        T: DeserializeOwned,
    {
        self.send_json(&ApiRequest::post(path).json(body)?).await
    }

    pub async fn put_json<B, T>(&self, path: &str, body: &B) -> SessionResult<T>
    where
        B: Serialize + ?Sized,
        T: DeserializeOwned,
    {
        self.send_json(&ApiRequest::put(path).json(body)?).await
    }

    pub async fn delete(&self, path: &str) -> SessionResult<()> {
        self.send(&ApiRequest::delete(path)).await?;
        Ok(())
    }

    /// Request interceptor: the access token to present, read from the store.
    fn attach_credentials(&self) -> Option<String> {
        match self.inner.store.access_token() {
            Ok(token) => token,
            Err(e) => {
                warn!(error = %e, "Could not read access token, sending unauthenticated");
                None
            }
        }
    }

    /// Response interceptor recovery path for a rejected access token.
    async fn recover(&self, rejected: Option<&str>) -> SessionResult<CredentialPair> {
        match self.inner.coordinator.refresh_after(rejected).await {
            Ok(pair) => Ok(pair),
            Err(err) => {
                self.tear_down(&err);
                Err(SessionError::session_expired(err.to_string()))
            }
        }
    }

    fn tear_down(&self, cause: &SessionError) {
        warn!(error = %cause, "Credentials could not be renewed, ending session");
        if let Err(e) = self.inner.store.clear() {
            warn!(error = %e, "Failed to clear credential store");
        }
        self.inner
            .navigator
            .redirect_to_login(&self.inner.login_path);
    }

    async fn dispatch(&self, request: &ApiRequest, token: Option<&str>) -> SessionResult<Response> {
        let mut builder = self
            .inner
            .http
            .request(request.method().clone(), self.url(request.path()));

        if !request.query_pairs().is_empty() {
            builder = builder.query(request.query_pairs());
        }

        builder = match request.body() {
            RequestBody::Empty => builder,
            RequestBody::Json(value) => builder.json(value),
            RequestBody::Form(fields) => builder.form(fields),
        };

        if let Some(token) = token {
            builder = builder.bearer_auth(token);
        }

        Ok(builder.send().await?)
    }
}
