use crate::errors::{Result, SignalBotError};
use crate::execution::signer::SignedRequest;
use crate::models::{AccountState, Position, PriceQuote};
use chrono::Utc;
use ethers::types::Address;
use reqwest::Client;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::time::Duration;
use tracing::{debug, info};

/// Info queries are quick snapshots; submissions get more headroom
const READ_TIMEOUT: Duration = Duration::from_secs(5);
const SUBMIT_TIMEOUT: Duration = Duration::from_secs(10);

#[derive(Debug, Serialize)]
struct InfoRequest {
    #[serde(rename = "type")]
    request_type: &'static str,
}

#[derive(Debug, Serialize)]
struct InfoUserRequest {
    #[serde(rename = "type")]
    request_type: &'static str,
    user: String,
}

#[derive(Debug, Deserialize)]
struct MetaResponse {
    universe: Vec<AssetMeta>,
}

#[derive(Debug, Deserialize)]
struct AssetMeta {
    name: String,
}

#[derive(Debug, Deserialize)]
struct ClearinghouseState {
    /// Free balance in quote currency
    withdrawable: Option<String>,
    #[serde(rename = "assetPositions", default)]
    asset_positions: Vec<AssetPositionEntry>,
}

#[derive(Debug, Deserialize)]
struct AssetPositionEntry {
    position: AssetPositionData,
}

#[derive(Debug, Deserialize)]
struct AssetPositionData {
    coin: String,
    /// Signed size: positive = long, negative = short
    szi: String,
}

/// Venue acknowledgment. `status` is "ok" or "err"; the body is kept verbatim
/// because an "ok" on an IOC order is not a fill guarantee.
#[derive(Clone, Debug, Deserialize)]
pub struct VenueResponse {
    pub status: String,
    #[serde(default)]
    pub response: serde_json::Value,
}

impl VenueResponse {
    pub fn is_ok(&self) -> bool {
        self.status == "ok"
    }

    /// Error text for an "err" acknowledgment
    pub fn error_text(&self) -> String {
        self.response
            .as_str()
            .map(str::to_string)
            .unwrap_or_else(|| self.response.to_string())
    }

    pub fn into_value(self) -> serde_json::Value {
        serde_json::json!({ "status": self.status, "response": self.response })
    }
}

/// Stateless wrapper around the venue's info and exchange endpoints. Owns
/// timeouts and response parsing; every failure is a typed error, never a
/// fallback value.
pub struct VenueClient {
    http_client: Client,
    info_url: String,
    exchange_url: String,
}

impl VenueClient {
    pub fn new(api_url: &str) -> Result<Self> {
        let http_client = Client::builder()
            .connect_timeout(Duration::from_secs(3))
            .build()?;

        let base = api_url.trim_end_matches('/');
        Ok(Self {
            http_client,
            info_url: format!("{}/info", base),
            exchange_url: format!("{}/exchange", base),
        })
    }

    /// Fetch the current mid price for one symbol
    pub async fn get_price(&self, symbol: &str) -> Result<PriceQuote> {
        let request = InfoRequest {
            request_type: "allMids",
        };

        let response = self
            .http_client
            .post(&self.info_url)
            .timeout(READ_TIMEOUT)
            .json(&request)
            .send()
            .await
            .map_err(|e| SignalBotError::PriceFetchError(format!("allMids request failed: {}", e)))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(SignalBotError::PriceFetchError(format!(
                "HTTP {}: {}",
                status, body
            )));
        }

        let mids: HashMap<String, String> = response.json().await.map_err(|e| {
            SignalBotError::PriceFetchError(format!("Malformed allMids response: {}", e))
        })?;

        let raw = mids
            .get(symbol)
            .ok_or_else(|| SignalBotError::PriceFetchError(format!("No mid price for {}", symbol)))?;

        let price: Decimal = raw.parse().map_err(|e| {
            SignalBotError::PriceFetchError(format!("Unparseable mid {}: {}", raw, e))
        })?;

        debug!(%symbol, %price, "Fetched mid price");

        Ok(PriceQuote {
            symbol: symbol.to_string(),
            price,
            fetched_at: Utc::now(),
        })
    }

    /// Fetch free balance and open positions for an account
    pub async fn get_account_state(&self, address: Address) -> Result<AccountState> {
        let request = InfoUserRequest {
            request_type: "clearinghouseState",
            user: format!("{:?}", address),
        };

        let response = self
            .http_client
            .post(&self.info_url)
            .timeout(READ_TIMEOUT)
            .json(&request)
            .send()
            .await
            .map_err(|e| {
                SignalBotError::AccountFetchError(format!("clearinghouseState request failed: {}", e))
            })?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(SignalBotError::AccountFetchError(format!(
                "HTTP {}: {}",
                status, body
            )));
        }

        let state: ClearinghouseState = response.json().await.map_err(|e| {
            SignalBotError::AccountFetchError(format!("Malformed clearinghouseState: {}", e))
        })?;

        let free_balance: Decimal = match state.withdrawable {
            Some(raw) => raw.parse().map_err(|e| {
                SignalBotError::AccountFetchError(format!("Unparseable balance {}: {}", raw, e))
            })?,
            None => Decimal::ZERO,
        };

        let mut positions = Vec::new();
        for entry in state.asset_positions {
            let size: Decimal = entry.position.szi.parse().map_err(|e| {
                SignalBotError::AccountFetchError(format!(
                    "Unparseable position size {}: {}",
                    entry.position.szi, e
                ))
            })?;
            if size != Decimal::ZERO {
                positions.push(Position {
                    symbol: entry.position.coin,
                    size,
                });
            }
        }

        debug!(%free_balance, open_positions = positions.len(), "Fetched account state");

        Ok(AccountState {
            free_balance,
            positions,
        })
    }

    /// Resolve a symbol to its asset index in the venue's instrument universe
    pub async fn resolve_asset_index(&self, symbol: &str) -> Result<u32> {
        let request = InfoRequest {
            request_type: "meta",
        };

        let response = self
            .http_client
            .post(&self.info_url)
            .timeout(READ_TIMEOUT)
            .json(&request)
            .send()
            .await
            .map_err(|e| SignalBotError::MetaFetchError(format!("meta request failed: {}", e)))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(SignalBotError::MetaFetchError(format!(
                "HTTP {}: {}",
                status, body
            )));
        }

        let meta: MetaResponse = response
            .json()
            .await
            .map_err(|e| SignalBotError::MetaFetchError(format!("Malformed meta response: {}", e)))?;

        meta.universe
            .iter()
            .position(|asset| asset.name == symbol)
            .map(|idx| idx as u32)
            .ok_or_else(|| SignalBotError::UnknownInstrument(symbol.to_string()))
    }

    /// Submit a signed order. Non-2xx surfaces the venue's raw error text;
    /// a 2xx acknowledgment is returned verbatim for the caller to interpret.
    pub async fn submit_order(&self, request: &SignedRequest) -> Result<VenueResponse> {
        let response = self
            .http_client
            .post(&self.exchange_url)
            .timeout(SUBMIT_TIMEOUT)
            .json(request)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(SignalBotError::OrderRejected(body));
        }

        let ack: VenueResponse = response
            .json()
            .await
            .map_err(|e| SignalBotError::OrderRejected(format!("Malformed acknowledgment: {}", e)))?;

        info!(status = %ack.status, "Order submission acknowledged");
        Ok(ack)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::execution::signer::{OrderAction, SignatureWire};
    use crate::models::OrderSide;
    use mockito::Matcher;
    use rust_decimal_macros::dec;
    use serde_json::json;

    fn test_address() -> Address {
        Address::repeat_byte(0x11)
    }

    #[tokio::test]
    async fn test_get_price_parses_mid() {
        let mut server = mockito::Server::new_async().await;
        let _mock = server
            .mock("POST", "/info")
            .match_body(Matcher::PartialJson(json!({"type": "allMids"})))
            .with_status(200)
            .with_header("content-type", "application/json")
            .with_body(r#"{"BTC": "43250.0", "ETH": "2000.5"}"#)
            .create_async()
            .await;

        let client = VenueClient::new(&server.url()).unwrap();
        let quote = client.get_price("ETH").await.unwrap();

        assert_eq!(quote.symbol, "ETH");
        assert_eq!(quote.price, dec!(2000.5));
    }

    #[tokio::test]
    async fn test_get_price_unknown_symbol() {
        let mut server = mockito::Server::new_async().await;
        let _mock = server
            .mock("POST", "/info")
            .with_status(200)
            .with_body(r#"{"BTC": "43250.0"}"#)
            .create_async()
            .await;

        let client = VenueClient::new(&server.url()).unwrap();
        let result = client.get_price("ETH").await;
        assert!(matches!(result, Err(SignalBotError::PriceFetchError(_))));
    }

    #[tokio::test]
    async fn test_get_price_http_error() {
        let mut server = mockito::Server::new_async().await;
        let _mock = server
            .mock("POST", "/info")
            .with_status(503)
            .with_body("upstream unavailable")
            .create_async()
            .await;

        let client = VenueClient::new(&server.url()).unwrap();
        let result = client.get_price("ETH").await;

        match result {
            Err(SignalBotError::PriceFetchError(msg)) => {
                assert!(msg.contains("503"));
            }
            other => panic!("expected PriceFetchError, got {:?}", other.map(|q| q.price)),
        }
    }

    #[tokio::test]
    async fn test_get_account_state_filters_flat_positions() {
        let mut server = mockito::Server::new_async().await;
        let _mock = server
            .mock("POST", "/info")
            .match_body(Matcher::PartialJson(json!({"type": "clearinghouseState"})))
            .with_status(200)
            .with_body(
                r#"{
                    "withdrawable": "100.0",
                    "assetPositions": [
                        {"position": {"coin": "ETH", "szi": "0.5"}},
                        {"position": {"coin": "BTC", "szi": "0"}}
                    ]
                }"#,
            )
            .create_async()
            .await;

        let client = VenueClient::new(&server.url()).unwrap();
        let state = client.get_account_state(test_address()).await.unwrap();

        assert_eq!(state.free_balance, dec!(100));
        assert_eq!(state.positions.len(), 1);
        assert_eq!(state.positions[0].symbol, "ETH");
        assert_eq!(state.positions[0].size, dec!(0.5));
    }

    #[tokio::test]
    async fn test_get_account_state_http_error() {
        let mut server = mockito::Server::new_async().await;
        let _mock = server
            .mock("POST", "/info")
            .with_status(500)
            .create_async()
            .await;

        let client = VenueClient::new(&server.url()).unwrap();
        let result = client.get_account_state(test_address()).await;
        assert!(matches!(result, Err(SignalBotError::AccountFetchError(_))));
    }

    #[tokio::test]
    async fn test_resolve_asset_index() {
        let mut server = mockito::Server::new_async().await;
        let _mock = server
            .mock("POST", "/info")
            .match_body(Matcher::PartialJson(json!({"type": "meta"})))
            .with_status(200)
            .with_body(r#"{"universe": [{"name": "BTC"}, {"name": "ETH"}, {"name": "SOL"}]}"#)
            .create_async()
            .await;

        let client = VenueClient::new(&server.url()).unwrap();
        assert_eq!(client.resolve_asset_index("ETH").await.unwrap(), 1);

        let unknown = client.resolve_asset_index("DOGE").await;
        assert!(matches!(unknown, Err(SignalBotError::UnknownInstrument(_))));
    }

    fn dummy_request() -> SignedRequest {
        SignedRequest {
            action: OrderAction::market_order(1, OrderSide::Buy, dec!(2000), dec!(0.025), false),
            nonce: 1_700_000_000_000,
            signature: SignatureWire {
                r: format!("0x{}", "11".repeat(32)),
                s: format!("0x{}", "22".repeat(32)),
                v: 27,
            },
        }
    }

    #[tokio::test]
    async fn test_submit_order_rejection_carries_raw_text() {
        let mut server = mockito::Server::new_async().await;
        let _mock = server
            .mock("POST", "/exchange")
            .with_status(400)
            .with_body("Order must have minimum value of $10")
            .create_async()
            .await;

        let client = VenueClient::new(&server.url()).unwrap();
        let result = client.submit_order(&dummy_request()).await;

        match result {
            Err(SignalBotError::OrderRejected(msg)) => {
                assert_eq!(msg, "Order must have minimum value of $10");
            }
            other => panic!("expected OrderRejected, got {:?}", other.map(|a| a.status)),
        }
    }

    #[tokio::test]
    async fn test_submit_order_passes_ack_through() {
        let mut server = mockito::Server::new_async().await;
        let _mock = server
            .mock("POST", "/exchange")
            .match_body(Matcher::PartialJson(json!({"nonce": 1_700_000_000_000u64})))
            .with_status(200)
            .with_body(r#"{"status": "ok", "response": {"type": "order", "data": {"statuses": [{"filled": {"totalSz": "0.025", "avgPx": "2000.1"}}]}}}"#)
            .create_async()
            .await;

        let client = VenueClient::new(&server.url()).unwrap();
        let ack = client.submit_order(&dummy_request()).await.unwrap();

        assert!(ack.is_ok());
        assert_eq!(ack.response["type"], "order");
    }

    #[tokio::test]
    async fn test_venue_err_status_not_ok() {
        let mut server = mockito::Server::new_async().await;
        let _mock = server
            .mock("POST", "/exchange")
            .with_status(200)
            .with_body(r#"{"status": "err", "response": "Invalid nonce"}"#)
            .create_async()
            .await;

        let client = VenueClient::new(&server.url()).unwrap();
        let ack = client.submit_order(&dummy_request()).await.unwrap();

        assert!(!ack.is_ok());
        assert_eq!(ack.error_text(), "Invalid nonce");
    }
}
