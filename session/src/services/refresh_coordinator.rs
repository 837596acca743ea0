//! Token refresh with a single in-flight call.
//!
//! The refresh token is read from the credential store when the refresh
//! starts, never taken from the caller. Every caller that asks for a refresh
//! while one is outstanding awaits the same call and receives the same result,
//! because refresh tokens are single-use on the backend and a second call
//! would invalidate the pair the first caller is waiting for.

use crate::auth::models::{CredentialPair, RefreshTokenRequest, RefreshTokenResponse};
use crate::client::response::error_message;
use crate::errors::{SessionError, SessionResult};
use crate::store::CredentialStore;
use futures::future::{BoxFuture, FutureExt, Shared};
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;
use tokio::sync::Mutex;
use tracing::{debug, info, warn};

type SharedRefresh = Shared<BoxFuture<'static, SessionResult<CredentialPair>>>;

/// Owns the one refresh call allowed in flight at a time.
pub struct RefreshCoordinator {
    http: reqwest::Client,
    refresh_url: String,
    store: Arc<dyn CredentialStore>,
    timeout: Duration,
    in_flight: Mutex<Option<SharedRefresh>>,
    calls: Arc<AtomicUsize>,
}

impl RefreshCoordinator {
    /// Creates a coordinator posting to `{api_url}/auth/refresh`.
    pub fn new(
        http: reqwest::Client,
        api_url: &str,
        store: Arc<dyn CredentialStore>,
        timeout: Duration,
    ) -> Self {
        Self {
            http,
            refresh_url: format!("{}/auth/refresh", api_url.trim_end_matches('/')),
            store,
            timeout,
            in_flight: Mutex::new(None),
            calls: Arc::new(AtomicUsize::new(0)),
        }
    }

    /// Number of refresh calls sent to the backend so far.
    pub fn refresh_count(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    /// Obtains a fresh credential pair, joining an outstanding refresh if
    /// there is one.
    pub async fn refresh(&self) -> SessionResult<CredentialPair> {
        self.refresh_after(None).await
    }

    /// Obtains a fresh credential pair for a request that was rejected while
    /// carrying `rejected_access`.
    ///
    /// When the stored access token already differs from the rejected one,
    /// another caller has renewed the pair in the meantime and the stored pair
    /// is returned without contacting the backend.
    pub async fn refresh_after(
        &self,
        rejected_access: Option<&str>,
    ) -> SessionResult<CredentialPair> {
        let refresh = {
            let mut slot = self.in_flight.lock().await;
            match slot.as_ref() {
                Some(outstanding) => {
                    debug!("Joining in-flight token refresh");
                    outstanding.clone()
                }
                None => {
                    if let Some(rejected) = rejected_access {
                        if let Some(current) = self.store.load()? {
                            if current.access_token != rejected {
                                debug!("Access token already renewed, reusing stored pair");
                                return Ok(current);
                            }
                        }
                    }

                    let refresh = perform_refresh(
                        self.http.clone(),
                        self.refresh_url.clone(),
                        Arc::clone(&self.store),
                        self.timeout,
                        Arc::clone(&self.calls),
                    )
                    .boxed()
                    .shared();
                    *slot = Some(refresh.clone());
                    refresh
                }
            }
        };

        let result = refresh.clone().await;

        let mut slot = self.in_flight.lock().await;
        if slot.as_ref().is_some_and(|current| current.ptr_eq(&refresh)) {
            *slot = None;
        }

        result
    }
}

async fn perform_refresh(
    http: reqwest::Client,
    refresh_url: String,
    store: Arc<dyn CredentialStore>,
    timeout: Duration,
    calls: Arc<AtomicUsize>,
) -> SessionResult<CredentialPair> {
    let refresh_token = store
        .refresh_token()?
        .ok_or_else(|| SessionError::refresh_failed("no refresh token stored"))?;

    calls.fetch_add(1, Ordering::SeqCst);
    debug!("Requesting new credential pair");

    let request = async {
        let response = http
            .post(&refresh_url)
            .json(&RefreshTokenRequest { refresh_token })
            .send()
            .await
            .map_err(|e| SessionError::refresh_failed(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            let message = error_message(response).await;
            return Err(SessionError::refresh_failed(format!(
                "{} ({})",
                message,
                status.as_u16()
            )));
        }

        response
            .json::<RefreshTokenResponse>()
            .await
            .map_err(|e| SessionError::refresh_failed(format!("malformed refresh response: {e}")))
    };

    let refreshed = match tokio::time::timeout(timeout, request).await {
        Ok(result) => result,
        Err(_) => Err(SessionError::RefreshTimeout {
            seconds: timeout.as_secs(),
        }),
    };

    let pair = match refreshed {
        Ok(response) => CredentialPair::from(response),
        Err(err) => {
            warn!(error = %err, "Token refresh failed");
            return Err(err);
        }
    };

    store.save(&pair)?;
    info!("Access token refreshed");

    Ok(pair)
}
