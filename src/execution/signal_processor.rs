use crate::config::TradingConfig;
use crate::errors::{Result, SignalBotError};
use crate::execution::nonce::NonceSource;
use crate::execution::position_sizer::PositionSizer;
use crate::execution::signer::{OrderAction, SignAction, SignedRequest};
use crate::execution::venue_client::{VenueClient, VenueResponse};
use crate::models::{OrderSide, SignalAction, SignalOutcome};
use rust_decimal::Decimal;
use std::sync::Arc;
use tokio::sync::Mutex;
use tracing::{error, info, warn};

/// Orchestrates one signal end to end: fresh price and account fetch, sizing,
/// signing, submission. Stateless between invocations: the venue is the sole
/// source of truth, and repeated signals each produce a new nonce and order.
pub struct SignalProcessor {
    venue: Arc<VenueClient>,
    sizer: PositionSizer,
    signer: Arc<dyn SignAction>,
    nonce: NonceSource,
    trading: TradingConfig,
    asset_index: u32,
    /// Serializes submissions for this account so double-fired webhook
    /// deliveries cannot interleave nonce generation and submission
    submit_lock: Mutex<()>,
}

impl SignalProcessor {
    pub fn new(
        venue: Arc<VenueClient>,
        sizer: PositionSizer,
        signer: Arc<dyn SignAction>,
        nonce: NonceSource,
        trading: TradingConfig,
        asset_index: u32,
    ) -> Self {
        Self {
            venue,
            sizer,
            signer,
            nonce,
            trading,
            asset_index,
            submit_lock: Mutex::new(()),
        }
    }

    /// Execute a validated action. All pipeline errors are converted to a
    /// structured outcome here; nothing propagates past this boundary.
    pub async fn process(&self, action: SignalAction) -> SignalOutcome {
        info!(%action, "Processing signal");

        let _guard = self.submit_lock.lock().await;

        let result = match action {
            SignalAction::Close => self.close_all_positions().await,
            SignalAction::Buy => self.open_position(OrderSide::Buy).await,
            SignalAction::Sell => self.open_position(OrderSide::Sell).await,
        };

        match result {
            Ok(outcome) => outcome,
            Err(e) => {
                error!(stage = e.stage(), "Signal failed: {}", e);
                SignalOutcome::from_error(&e)
            }
        }
    }

    /// buy/sell: price -> balance -> size -> sign -> submit, each step
    /// aborting the signal on failure
    async fn open_position(&self, side: OrderSide) -> Result<SignalOutcome> {
        let quote = self.venue.get_price(&self.trading.symbol).await?;
        if quote.price <= Decimal::ZERO {
            return Err(SignalBotError::InvalidPrice(quote.price));
        }

        let account = self.venue.get_account_state(self.signer.address()).await?;
        if account.free_balance < self.trading.min_balance_usd {
            return Err(SignalBotError::InsufficientBalance(account.free_balance));
        }

        let size = self.sizer.size(account.free_balance, quote.price);
        if size <= Decimal::ZERO {
            return Err(SignalBotError::SizeTooSmall(size));
        }

        let ack = self
            .submit_market_order(side, size, quote.price, false)
            .await?;

        info!(%side, %size, "Order accepted by venue");
        Ok(SignalOutcome::order_placed(side, size, ack.into_value()))
    }

    /// close: offset every open position on the configured instrument with a
    /// reduce-only order of equal magnitude. An account with no open
    /// positions closes trivially.
    async fn close_all_positions(&self) -> Result<SignalOutcome> {
        let account = self.venue.get_account_state(self.signer.address()).await?;

        let positions: Vec<_> = account
            .positions
            .into_iter()
            .filter(|p| p.symbol == self.trading.symbol)
            .collect();

        if positions.is_empty() {
            info!("No positions to close");
            return Ok(SignalOutcome::nothing_to_close());
        }

        let quote = self.venue.get_price(&self.trading.symbol).await?;

        let mut results = Vec::with_capacity(positions.len());
        for position in &positions {
            let side = position.closing_side();
            let size = position.magnitude();

            match self.submit_market_order(side, size, quote.price, true).await {
                Ok(ack) => {
                    info!(%side, %size, "Closed position");
                    results.push(SignalOutcome::order_placed(side, size, ack.into_value()));
                }
                Err(e) => {
                    warn!(%side, %size, "Failed to close position: {}", e);
                    results.push(SignalOutcome::from_error(&e));
                }
            }
        }

        Ok(SignalOutcome::closed(results))
    }

    /// Sign and submit one marketable IOC order at the given mid price
    async fn submit_market_order(
        &self,
        side: OrderSide,
        size: Decimal,
        mid_price: Decimal,
        reduce_only: bool,
    ) -> Result<VenueResponse> {
        let limit_px = marketable_limit_price(mid_price, side, self.trading.max_slippage);
        let action = OrderAction::market_order(self.asset_index, side, limit_px, size, reduce_only);

        let nonce = self.nonce.next();
        let signature = self.signer.sign_action(&action, nonce)?;
        let request = SignedRequest {
            action,
            nonce,
            signature,
        };

        let ack = self.venue.submit_order(&request).await?;
        if !ack.is_ok() {
            return Err(SignalBotError::OrderRejected(ack.error_text()));
        }

        Ok(ack)
    }
}

/// Limit price that crosses the spread by the configured slippage bound, so
/// an IOC order behaves like a bounded market order
fn marketable_limit_price(mid: Decimal, side: OrderSide, max_slippage: Decimal) -> Decimal {
    match side {
        OrderSide::Buy => mid * (Decimal::ONE + max_slippage),
        OrderSide::Sell => mid * (Decimal::ONE - max_slippage),
    }
}
