use crate::errors::{Result, SignalBotError};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;

pub const MAINNET_API_URL: &str = "https://api.hyperliquid.xyz";
pub const TESTNET_API_URL: &str = "https://api.hyperliquid-testnet.xyz";

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Config {
    pub general: GeneralConfig,
    pub webhook: WebhookConfig,
    pub trading: TradingConfig,
    pub logging: LoggingConfig,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct GeneralConfig {
    pub private_key: String,
    pub testnet: bool,
    /// Explicit API base URL; defaults to the mainnet/testnet URL when absent
    pub api_url: Option<String>,
    pub port: u16,
}

impl GeneralConfig {
    pub fn api_url(&self) -> &str {
        match self.api_url.as_deref() {
            Some(url) => url,
            None if self.testnet => TESTNET_API_URL,
            None => MAINNET_API_URL,
        }
    }
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct WebhookConfig {
    pub secret: String,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct TradingConfig {
    /// Instrument symbol as the venue names it (e.g. "ETH")
    pub symbol: String,
    /// Fraction of free balance committed per signal
    pub utilization_fraction: Decimal,
    /// Hard cap on order notional in quote currency
    pub max_position_usd: Decimal,
    /// Signals are rejected below this free balance
    pub min_balance_usd: Decimal,
    /// Marketable-limit price offset from the mid, as a fraction
    pub max_slippage: Decimal,
}

impl TradingConfig {
    pub fn is_valid(&self) -> bool {
        !self.symbol.is_empty()
            && self.utilization_fraction > Decimal::ZERO
            && self.utilization_fraction <= Decimal::ONE
            && self.max_position_usd > Decimal::ZERO
            && self.min_balance_usd >= Decimal::ZERO
            && self.max_slippage > Decimal::ZERO
            && self.max_slippage < Decimal::ONE
    }
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct LoggingConfig {
    pub level: String,
}

impl Config {
    /// Load configuration from a TOML file
    pub fn load_from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = fs::read_to_string(path)
            .map_err(|e| SignalBotError::ConfigError(format!("Failed to read config file: {}", e)))?;

        let config: Config = toml::from_str(&content)?;
        config.validate()?;

        Ok(config)
    }

    /// Validate configuration
    fn validate(&self) -> Result<()> {
        if self.general.private_key.is_empty() {
            return Err(SignalBotError::ConfigError(
                "private_key must be set".to_string(),
            ));
        }

        if self.webhook.secret.is_empty() {
            return Err(SignalBotError::ConfigError(
                "webhook secret must be set".to_string(),
            ));
        }

        if !self.trading.is_valid() {
            return Err(SignalBotError::ConfigError(
                "Invalid trading configuration".to_string(),
            ));
        }

        Ok(())
    }

    /// Expand environment variables in configuration
    pub fn expand_env_vars(&mut self) -> Result<()> {
        self.general.private_key = expand_env_var(&self.general.private_key)?;
        self.webhook.secret = expand_env_var(&self.webhook.secret)?;
        Ok(())
    }
}

/// Resolve a `${VAR}` placeholder against the environment; other values pass
/// through unchanged
fn expand_env_var(value: &str) -> Result<String> {
    if value.starts_with("${") && value.ends_with('}') {
        let var_name = &value[2..value.len() - 1];
        std::env::var(var_name).map_err(|_| {
            SignalBotError::ConfigError(format!("Environment variable {} not set", var_name))
        })
    } else {
        Ok(value.to_string())
    }
}
