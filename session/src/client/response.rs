//! Response helpers shared by the client and the refresh coordinator.

use crate::errors::{SessionError, SessionResult};
use reqwest::Response;
use serde_json::Value;

/// Extracts a human-readable message from an error response.
///
/// The backend reports errors as `{"detail": ...}`; `detail` is either a
/// string or a list of field errors.
pub async fn error_message(response: Response) -> String {
    let status = response.status();
    let body = response.text().await.unwrap_or_default();
    detail_from_body(&body).unwrap_or_else(|| {
        status
            .canonical_reason()
            .unwrap_or("Request failed")
            .to_string()
    })
}

fn detail_from_body(body: &str) -> Option<String> {
    let value: Value = serde_json::from_str(body).ok()?;
    match value.get("detail")? {
        Value::String(message) => Some(message.clone()),
        Value::Array(errors) => {
            let messages: Vec<String> = errors
                .iter()
                .filter_map(|e| e.get("msg").and_then(Value::as_str).map(str::to_string))
                .collect();
            if messages.is_empty() {
                None
            } else {
                Some(messages.join(", "))
            }
        }
        other => Some(other.to_string()),
    }
}

/// Turns a non-success response into [`SessionError::Api`].
pub async fn ensure_success(response: Response) -> SessionResult<Response> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }
    let message = error_message(response).await;
    Err(SessionError::api(status.as_u16(), message))
}
