//! Diagnostic entry point for the portal session manager.
//!
//! Loads configuration from the environment, restores the session persisted
//! in the credential store, signs in with `PORTAL_EMAIL`/`PORTAL_PASSWORD`
//! when no session could be restored, and prints the route gate decision.

use anyhow::{Context, Result};
use portal_session::{Config, GateDecision, RouteGate, SessionContext, TracingNavigator};
use serde_json::json;
use std::env;
use std::sync::Arc;
use tracing::{error, info};
use tracing_subscriber::fmt::init;

#[tokio::main]
async fn main() -> Result<()> {
    init();

    let config = Config::from_env().context("failed to load configuration")?;
    let session = SessionContext::from_config(&config, Arc::new(TracingNavigator))
        .context("failed to build session")?;
    let gate = RouteGate::from_config(&config);

    info!(
        api = %config.api_url(),
        store = %config.credential_store_path.display(),
        policy = session.policy().name(),
        "Restoring session"
    );
    let mut state = session.bootstrap().await;

    if !state.is_authenticated() {
        if let (Ok(email), Ok(password)) = (env::var("PORTAL_EMAIL"), env::var("PORTAL_PASSWORD")) {
            match session.login(&email, &password).await {
                Ok(identity) => info!("Signed in as {}", identity.display_name()),
                Err(e) => error!("Sign-in failed: {}", e),
            }
            state = session.state();
        }
    }

    let report = match gate.evaluate(&state) {
        GateDecision::Admit(identity) => json!({
            "phase": state.phase(),
            "decision": "admit",
            "identity": identity,
        }),
        GateDecision::Redirect { to } => json!({
            "phase": state.phase(),
            "decision": "redirect",
            "to": to,
        }),
        GateDecision::Loading => json!({
            "phase": state.phase(),
            "decision": "loading",
        }),
    };

    println!("{}", serde_json::to_string_pretty(&report)?);
    Ok(())
}
