use rust_decimal::Decimal;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum SignalBotError {
    #[error("Configuration error: {0}")]
    ConfigError(String),

    #[error("Missing {0} field")]
    MissingField(&'static str),

    #[error("Invalid passphrase")]
    InvalidSecret,

    #[error("Invalid action: {0}")]
    UnknownAction(String),

    #[error("Network error: {0}")]
    NetworkError(#[from] reqwest::Error),

    #[error("Price fetch failed: {0}")]
    PriceFetchError(String),

    #[error("Invalid price: {0}")]
    InvalidPrice(Decimal),

    #[error("Account fetch failed: {0}")]
    AccountFetchError(String),

    #[error("Meta fetch failed: {0}")]
    MetaFetchError(String),

    #[error("Unknown instrument: {0}")]
    UnknownInstrument(String),

    #[error("Insufficient balance: ${0}")]
    InsufficientBalance(Decimal),

    #[error("Invalid position size: {0}")]
    SizeTooSmall(Decimal),

    #[error("Signing error: {0}")]
    SigningError(String),

    #[error("Order rejected by venue: {0}")]
    OrderRejected(String),

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    SerializationError(#[from] serde_json::Error),

    #[error("TOML error: {0}")]
    TomlError(#[from] toml::de::Error),
}

impl SignalBotError {
    /// Pipeline stage the error belongs to. Surfaced in webhook responses so
    /// the alerting source can tell which step failed without seeing key or
    /// signature material.
    pub fn stage(&self) -> &'static str {
        match self {
            SignalBotError::ConfigError(_) => "config",
            SignalBotError::MissingField(_) | SignalBotError::UnknownAction(_) => "validation",
            SignalBotError::InvalidSecret => "auth",
            SignalBotError::NetworkError(_) => "network",
            SignalBotError::PriceFetchError(_)
            | SignalBotError::InvalidPrice(_)
            | SignalBotError::AccountFetchError(_)
            | SignalBotError::MetaFetchError(_)
            | SignalBotError::UnknownInstrument(_) => "market_data",
            SignalBotError::InsufficientBalance(_) | SignalBotError::SizeTooSmall(_) => "sizing",
            SignalBotError::SigningError(_) => "signing",
            SignalBotError::OrderRejected(_) => "venue",
            SignalBotError::IoError(_)
            | SignalBotError::SerializationError(_)
            | SignalBotError::TomlError(_) => "internal",
        }
    }
}

pub type Result<T> = std::result::Result<T, SignalBotError>;
