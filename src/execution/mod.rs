pub mod nonce;
pub mod position_sizer;
pub mod signal_processor;
pub mod signer;
pub mod venue_client;

pub use nonce::NonceSource;
pub use position_sizer::PositionSizer;
pub use signal_processor::SignalProcessor;
pub use signer::{OrderSigner, SignAction};
pub use venue_client::VenueClient;
