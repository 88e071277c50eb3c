use crate::errors::{Result, SignalBotError};
use crate::execution::{SignalProcessor, VenueClient};
use crate::models::{SignalAction, SignalOutcome, WebhookPayload};
use axum::extract::rejection::JsonRejection;
use axum::extract::State;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Json, Router};
use chrono::Utc;
use ethers::types::Address;
use serde_json::json;
use std::net::SocketAddr;
use std::sync::Arc;
use tracing::{error, info, warn};

/// Everything the HTTP handlers need, built once at startup and read-only
/// afterwards
pub struct AppState {
    pub processor: SignalProcessor,
    pub venue: Arc<VenueClient>,
    pub wallet_address: Address,
    pub symbol: String,
    pub testnet: bool,
    pub webhook_secret: String,
}

pub fn router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/", get(status))
        .route("/health", get(health))
        .route("/webhook", post(webhook))
        .with_state(state)
}

pub async fn serve(state: Arc<AppState>, port: u16) -> Result<()> {
    let addr = SocketAddr::from(([0, 0, 0, 0], port));
    let listener = tokio::net::TcpListener::bind(addr).await?;
    info!("Listening on {}", addr);

    axum::serve(listener, router(state)).await?;
    Ok(())
}

/// Check the payload before any side effect: required fields first, then the
/// shared secret, then the action token. The secret compare is constant-time
/// so response latency reveals nothing about a partial match.
pub fn validate_payload(payload: &WebhookPayload, secret: &str) -> Result<SignalAction> {
    let action = payload
        .action
        .as_deref()
        .ok_or(SignalBotError::MissingField("action"))?;
    let passphrase = payload
        .passphrase
        .as_deref()
        .ok_or(SignalBotError::MissingField("passphrase"))?;

    if !constant_time_eq(passphrase.as_bytes(), secret.as_bytes()) {
        return Err(SignalBotError::InvalidSecret);
    }

    SignalAction::parse(action).ok_or_else(|| SignalBotError::UnknownAction(action.to_string()))
}

fn constant_time_eq(a: &[u8], b: &[u8]) -> bool {
    if a.len() != b.len() {
        return false;
    }
    a.iter().zip(b).fold(0u8, |acc, (x, y)| acc | (x ^ y)) == 0
}

async fn webhook(
    State(state): State<Arc<AppState>>,
    payload: std::result::Result<Json<WebhookPayload>, JsonRejection>,
) -> Response {
    let Json(payload) = match payload {
        Ok(json) => json,
        Err(rejection) => {
            warn!("Rejected webhook body: {}", rejection);
            return (
                StatusCode::BAD_REQUEST,
                Json(json!({"status": "error", "message": "Invalid JSON body"})),
            )
                .into_response();
        }
    };

    let action = match validate_payload(&payload, &state.webhook_secret) {
        Ok(action) => action,
        Err(e) => {
            warn!(stage = e.stage(), "Rejected webhook: {}", e);
            return (StatusCode::BAD_REQUEST, Json(SignalOutcome::from_error(&e))).into_response();
        }
    };

    let outcome = state.processor.process(action).await;
    let code = if outcome.is_success() {
        StatusCode::OK
    } else {
        StatusCode::BAD_REQUEST
    };
    (code, Json(outcome)).into_response()
}

async fn status(State(state): State<Arc<AppState>>) -> Response {
    match status_snapshot(&state).await {
        Ok(snapshot) => Json(snapshot).into_response(),
        Err(e) => {
            error!("Status endpoint failed: {}", e);
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(json!({"status": "error", "message": e.to_string()})),
            )
                .into_response()
        }
    }
}

async fn status_snapshot(state: &AppState) -> Result<serde_json::Value> {
    let account = state.venue.get_account_state(state.wallet_address).await?;
    let quote = state.venue.get_price(&state.symbol).await?;

    Ok(json!({
        "bot": "Hyperliquid Signal Bot",
        "status": "operational",
        "symbol": state.symbol,
        "testnet": state.testnet,
        "balance": account.free_balance,
        "positions": account.positions.len(),
        "price": quote.price,
        "timestamp": Utc::now(),
        "version": env!("CARGO_PKG_VERSION"),
    }))
}

async fn health() -> Json<serde_json::Value> {
    Json(json!({
        "status": "healthy",
        "timestamp": Utc::now(),
    }))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn payload(action: Option<&str>, passphrase: Option<&str>) -> WebhookPayload {
        WebhookPayload {
            action: action.map(str::to_string),
            passphrase: passphrase.map(str::to_string),
        }
    }

    #[test]
    fn test_missing_action_rejected_first() {
        // Missing action wins even when the passphrase is also absent
        let err = validate_payload(&payload(None, None), "secret").unwrap_err();
        assert!(matches!(err, SignalBotError::MissingField("action")));
    }

    #[test]
    fn test_missing_passphrase_rejected() {
        let err = validate_payload(&payload(Some("buy"), None), "secret").unwrap_err();
        assert!(matches!(err, SignalBotError::MissingField("passphrase")));
    }

    #[test]
    fn test_wrong_secret_rejected_before_action_check() {
        // A bad secret must not leak whether the action token was valid
        let err = validate_payload(&payload(Some("launch"), Some("wrong")), "secret").unwrap_err();
        assert!(matches!(err, SignalBotError::InvalidSecret));
    }

    #[test]
    fn test_secret_compare_is_case_sensitive() {
        let err = validate_payload(&payload(Some("buy"), Some("Secret")), "secret").unwrap_err();
        assert!(matches!(err, SignalBotError::InvalidSecret));
    }

    #[test]
    fn test_unknown_action_rejected() {
        let err = validate_payload(&payload(Some("hold"), Some("secret")), "secret").unwrap_err();
        assert!(matches!(err, SignalBotError::UnknownAction(a) if a == "hold"));
    }

    #[test]
    fn test_valid_payload_accepted() {
        let action = validate_payload(&payload(Some("BUY"), Some("secret")), "secret").unwrap();
        assert_eq!(action, SignalAction::Buy);

        let action = validate_payload(&payload(Some("close"), Some("secret")), "secret").unwrap();
        assert_eq!(action, SignalAction::Close);
    }

    #[test]
    fn test_constant_time_eq() {
        assert!(constant_time_eq(b"secret", b"secret"));
        assert!(!constant_time_eq(b"secret", b"secre7"));
        assert!(!constant_time_eq(b"secret", b"secret1"));
        assert!(!constant_time_eq(b"", b"x"));
        assert!(constant_time_eq(b"", b""));
    }
}
