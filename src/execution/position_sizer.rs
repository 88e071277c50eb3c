use crate::config::TradingConfig;
use rust_decimal::{Decimal, RoundingStrategy};

/// Pure position sizing: no I/O, no state beyond configured risk limits.
pub struct PositionSizer {
    config: TradingConfig,
}

impl PositionSizer {
    pub fn new(config: TradingConfig) -> Self {
        Self { config }
    }

    /// Order quantity for the given free balance and price:
    /// `min(balance * utilization_fraction, max_position_usd) / price`,
    /// rounded half-to-even at 4 decimal places.
    ///
    /// Returns zero for non-positive balance or price; callers must treat
    /// zero as a sizing failure, never as a valid order.
    pub fn size(&self, free_balance: Decimal, price: Decimal) -> Decimal {
        if free_balance <= Decimal::ZERO || price <= Decimal::ZERO {
            return Decimal::ZERO;
        }

        let usable = (free_balance * self.config.utilization_fraction)
            .min(self.config.max_position_usd);

        (usable / price).round_dp_with_strategy(4, RoundingStrategy::MidpointNearestEven)
    }
}
