use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::errors::SignalBotError;

/// Trading signal carried by a webhook payload
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SignalAction {
    Buy,
    Sell,
    Close,
}

impl SignalAction {
    /// Parse an action token, case-insensitively
    pub fn parse(raw: &str) -> Option<Self> {
        match raw.to_ascii_lowercase().as_str() {
            "buy" => Some(SignalAction::Buy),
            "sell" => Some(SignalAction::Sell),
            "close" => Some(SignalAction::Close),
            _ => None,
        }
    }
}

impl std::fmt::Display for SignalAction {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SignalAction::Buy => write!(f, "buy"),
            SignalAction::Sell => write!(f, "sell"),
            SignalAction::Close => write!(f, "close"),
        }
    }
}

/// Order side (Buy or Sell)
#[derive(Clone, Copy, Debug, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum OrderSide {
    Buy,
    Sell,
}

impl OrderSide {
    pub fn is_buy(&self) -> bool {
        matches!(self, OrderSide::Buy)
    }
}

impl std::fmt::Display for OrderSide {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            OrderSide::Buy => write!(f, "buy"),
            OrderSide::Sell => write!(f, "sell"),
        }
    }
}

/// Price snapshot for one instrument, fetched fresh before every sizing
/// decision and never cached across signals
#[derive(Clone, Debug)]
pub struct PriceQuote {
    pub symbol: String,
    pub price: Decimal,
    pub fetched_at: DateTime<Utc>,
}

/// Account snapshot from the venue: free balance plus open positions.
/// The venue is the sole source of truth; nothing here is persisted locally.
#[derive(Clone, Debug)]
pub struct AccountState {
    pub free_balance: Decimal,
    pub positions: Vec<Position>,
}

/// Open perpetual position. Positive size = long, negative = short.
#[derive(Clone, Debug, Serialize)]
pub struct Position {
    pub symbol: String,
    pub size: Decimal,
}

impl Position {
    /// Side of the order that offsets this position
    pub fn closing_side(&self) -> OrderSide {
        if self.size > Decimal::ZERO {
            OrderSide::Sell
        } else {
            OrderSide::Buy
        }
    }

    /// Unsigned position size
    pub fn magnitude(&self) -> Decimal {
        self.size.abs()
    }
}

/// Untrusted webhook body; validated before any side effect
#[derive(Clone, Debug, Deserialize)]
pub struct WebhookPayload {
    pub action: Option<String>,
    pub passphrase: Option<String>,
}

#[derive(Clone, Copy, Debug, Serialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum OutcomeStatus {
    Success,
    Error,
}

/// Structured result of processing one signal. Serialized as the webhook
/// response body; the venue acknowledgment is passed through verbatim since
/// an IOC ack is not a fill guarantee.
#[derive(Clone, Debug, Serialize)]
pub struct SignalOutcome {
    pub status: OutcomeStatus,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub stage: Option<&'static str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub side: Option<OrderSide>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub size: Option<Decimal>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub venue_response: Option<serde_json::Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub closed_positions: Option<Vec<SignalOutcome>>,
}

impl SignalOutcome {
    pub fn order_placed(side: OrderSide, size: Decimal, ack: serde_json::Value) -> Self {
        Self {
            status: OutcomeStatus::Success,
            message: format!("Placed {} order for {}", side, size),
            stage: None,
            side: Some(side),
            size: Some(size),
            venue_response: Some(ack),
            closed_positions: None,
        }
    }

    pub fn closed(results: Vec<SignalOutcome>) -> Self {
        Self {
            status: OutcomeStatus::Success,
            message: format!("Closed {} positions", results.len()),
            stage: None,
            side: None,
            size: None,
            venue_response: None,
            closed_positions: Some(results),
        }
    }

    /// `close` with no open positions succeeds trivially; this is not an error
    pub fn nothing_to_close() -> Self {
        Self {
            status: OutcomeStatus::Success,
            message: "No positions to close".to_string(),
            stage: None,
            side: None,
            size: None,
            venue_response: None,
            closed_positions: Some(Vec::new()),
        }
    }

    pub fn from_error(err: &SignalBotError) -> Self {
        Self {
            status: OutcomeStatus::Error,
            message: err.to_string(),
            stage: Some(err.stage()),
            side: None,
            size: None,
            venue_response: None,
            closed_positions: None,
        }
    }

    pub fn is_success(&self) -> bool {
        self.status == OutcomeStatus::Success
    }
}
