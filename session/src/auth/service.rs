//! Calls against the authentication endpoints.

use crate::auth::models::*;
use crate::client::{ApiRequest, AuthenticatedClient};
use crate::errors::{SessionError, SessionResult};
use validator::Validate;

/// Authentication service for login and identity lookup
#[derive(Clone)]
pub struct AuthService {
    client: AuthenticatedClient,
}

impl AuthService {
    pub fn new(client: AuthenticatedClient) -> Self {
        Self { client }
    }

    /// Exchange email and password for a credential pair and persist it.
    pub async fn login(&self, login_request: LoginRequest) -> SessionResult<CredentialPair> {
        // Validate input
        if let Err(validation_errors) = login_request.validate() {
            let error_messages: Vec<String> = validation_errors
                .field_errors()
                .into_iter()
                .flat_map(|(field, errors)| {
                    errors.iter().map(move |error| {
                        format!(
                            "{}: {}",
                            field,
                            error.message.as_ref().unwrap_or(&"Invalid value".into())
                        )
                    })
                })
                .collect();
            return Err(SessionError::validation(error_messages.join(", ")));
        }

        // The backend expects an OAuth2 password form: the email goes in `username`
        let request = ApiRequest::post("/auth/login")
            .form([
                ("username", login_request.username),
                ("password", login_request.password),
            ])
            .public();

        let tokens: TokenResponse = match self.client.send_json(&request).await {
            Ok(tokens) => tokens,
            Err(SessionError::Api {
                status: 400 | 401 | 403 | 422,
                message,
            }) => return Err(SessionError::bad_credentials(message)),
            Err(e) => return Err(e),
        };

        let pair = CredentialPair::from(tokens);
        self.client.store().save(&pair)?;

        Ok(pair)
    }

    /// Fetch the identity of the user the stored credentials belong to.
    pub async fn current_user(&self) -> SessionResult<Identity> {
        self.client.get_json("/users/me").await
    }
}
