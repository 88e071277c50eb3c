//! Hyperliquid L1-action signing.
//!
//! Two stages: hash the msgpack-serialized action together with the nonce,
//! then sign the resulting "phantom agent" struct under the venue's EIP-712
//! domain. The venue re-derives both hashes from the submitted JSON, so wire
//! field names and order must match the serialized form exactly.

use crate::errors::{Result, SignalBotError};
use crate::models::OrderSide;
use ethers::signers::{LocalWallet, Signer};
use ethers::types::{Address, H256};
use ethers::utils::keccak256;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

pub const EIP712_DOMAIN_NAME: &str = "Exchange";
pub const EIP712_DOMAIN_VERSION: &str = "1";
/// Fixed by the venue; not the chain the funds live on. Binding it into the
/// domain keeps signatures from being replayable elsewhere.
pub const EIP712_CHAIN_ID: u64 = 1337;

/// Wire-format order. Single-letter field names and their declaration order
/// are part of the signed bytes; do not rename or reorder.
#[derive(Clone, Debug, Serialize)]
pub struct OrderWire {
    /// Asset index from the venue's instrument universe
    #[serde(rename = "a")]
    pub asset: u32,

    #[serde(rename = "b")]
    pub is_buy: bool,

    /// Limit price as string
    #[serde(rename = "p")]
    pub limit_px: String,

    /// Size as string
    #[serde(rename = "s")]
    pub sz: String,

    #[serde(rename = "r")]
    pub reduce_only: bool,

    #[serde(rename = "t")]
    pub order_type: OrderTypeWire,

    /// Client order id; the key must be absent (not null) when unused
    #[serde(rename = "c", skip_serializing_if = "Option::is_none")]
    pub cloid: Option<String>,
}

#[derive(Clone, Debug, Serialize)]
#[serde(untagged)]
pub enum OrderTypeWire {
    Limit { limit: LimitTif },
}

impl OrderTypeWire {
    /// Immediate-or-cancel, the only order type this bot submits
    pub fn ioc() -> Self {
        Self::Limit {
            limit: LimitTif {
                tif: "Ioc".to_string(),
            },
        }
    }
}

#[derive(Clone, Debug, Serialize)]
pub struct LimitTif {
    pub tif: String,
}

/// L1 action of type "order". Field order `type, orders, grouping` matches
/// what the venue hashes.
#[derive(Clone, Debug, Serialize)]
pub struct OrderAction {
    #[serde(rename = "type")]
    pub action_type: String,
    pub orders: Vec<OrderWire>,
    pub grouping: String,
}

impl OrderAction {
    /// Build a single marketable IOC order. Immutable once signed; callers
    /// construct a fresh action per submission.
    pub fn market_order(
        asset: u32,
        side: OrderSide,
        limit_px: Decimal,
        size: Decimal,
        reduce_only: bool,
    ) -> Self {
        Self {
            action_type: "order".to_string(),
            orders: vec![OrderWire {
                asset,
                is_buy: side.is_buy(),
                limit_px: format_wire_decimal(limit_px),
                sz: format_wire_decimal(size),
                reduce_only,
                order_type: OrderTypeWire::ioc(),
                cloid: None,
            }],
            grouping: "na".to_string(),
        }
    }
}

/// Render a price or size for the wire: at most 5 significant figures,
/// trailing zeros stripped
fn format_wire_decimal(value: Decimal) -> String {
    value.round_sf(5).unwrap_or(value).normalize().to_string()
}

/// (r, s, v) triple in the venue's submission format
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Eq)]
pub struct SignatureWire {
    pub r: String,
    pub s: String,
    pub v: u64,
}

impl From<ethers::types::Signature> for SignatureWire {
    fn from(sig: ethers::types::Signature) -> Self {
        let mut r = [0u8; 32];
        let mut s = [0u8; 32];
        sig.r.to_big_endian(&mut r);
        sig.s.to_big_endian(&mut s);
        Self {
            r: format!("0x{}", hex::encode(r)),
            s: format!("0x{}", hex::encode(s)),
            v: sig.v,
        }
    }
}

/// Fully signed exchange submission: action + nonce + signature. Sent once;
/// a retry must build a new request with a fresh nonce.
#[derive(Clone, Debug, Serialize)]
pub struct SignedRequest {
    pub action: OrderAction,
    pub nonce: u64,
    pub signature: SignatureWire,
}

/// `keccak256(msgpack(action) || nonce_be || 0x00)`. The trailing byte is the
/// empty vault-address tag; this bot always trades its own account.
pub fn action_hash(action: &OrderAction, nonce: u64) -> Result<H256> {
    let mut data = rmp_serde::to_vec_named(action)
        .map_err(|e| SignalBotError::SigningError(format!("Action serialization failed: {}", e)))?;
    data.extend_from_slice(&nonce.to_be_bytes());
    data.push(0x00);
    Ok(H256::from(keccak256(&data)))
}

fn exchange_domain_separator() -> [u8; 32] {
    let type_hash = keccak256(
        b"EIP712Domain(string name,string version,uint256 chainId,address verifyingContract)",
    );

    let mut data = Vec::with_capacity(160);
    data.extend_from_slice(&type_hash);
    data.extend_from_slice(&keccak256(EIP712_DOMAIN_NAME.as_bytes()));
    data.extend_from_slice(&keccak256(EIP712_DOMAIN_VERSION.as_bytes()));
    let mut chain_id = [0u8; 32];
    chain_id[24..].copy_from_slice(&EIP712_CHAIN_ID.to_be_bytes());
    data.extend_from_slice(&chain_id);
    // verifyingContract is the zero address, left-padded to 32 bytes
    data.extend_from_slice(&[0u8; 32]);

    keccak256(&data)
}

/// EIP-712 signing hash of the phantom agent
/// `Agent { source: "a"|"b", connectionId: action_hash }`
pub fn agent_signing_hash(connection_id: H256, is_mainnet: bool) -> H256 {
    let agent_type_hash = keccak256(b"Agent(string source,bytes32 connectionId)");
    let source = if is_mainnet { "a" } else { "b" };

    let mut struct_data = Vec::with_capacity(96);
    struct_data.extend_from_slice(&agent_type_hash);
    struct_data.extend_from_slice(&keccak256(source.as_bytes()));
    struct_data.extend_from_slice(connection_id.as_bytes());
    let struct_hash = keccak256(&struct_data);

    let mut data = Vec::with_capacity(66);
    data.extend_from_slice(&[0x19, 0x01]);
    data.extend_from_slice(&exchange_domain_separator());
    data.extend_from_slice(&struct_hash);

    H256::from(keccak256(&data))
}

/// Signing capability. The live implementation holds the account's key; tests
/// and dry runs substitute [`MockSigner`] behind the same interface.
pub trait SignAction: Send + Sync {
    fn sign_action(&self, action: &OrderAction, nonce: u64) -> Result<SignatureWire>;

    /// Public address the venue attributes submissions to
    fn address(&self) -> Address;
}

pub struct OrderSigner {
    wallet: LocalWallet,
    is_mainnet: bool,
}

impl OrderSigner {
    /// Create a signer from a hex-encoded private key
    pub fn new(private_key: &str, is_mainnet: bool) -> Result<Self> {
        let wallet = private_key
            .trim()
            .parse::<LocalWallet>()
            .map_err(|e| SignalBotError::SigningError(format!("Invalid private key: {}", e)))?;

        Ok(Self { wallet, is_mainnet })
    }
}

impl SignAction for OrderSigner {
    fn sign_action(&self, action: &OrderAction, nonce: u64) -> Result<SignatureWire> {
        let connection_id = action_hash(action, nonce)?;
        let signing_hash = agent_signing_hash(connection_id, self.is_mainnet);

        let signature = self
            .wallet
            .sign_hash(signing_hash)
            .map_err(|e| SignalBotError::SigningError(format!("Failed to sign action: {}", e)))?;

        Ok(signature.into())
    }

    fn address(&self) -> Address {
        self.wallet.address()
    }
}

/// Deterministic stand-in signer for tests. Produces a fixed triple and a
/// fixed address; never submit its output where real funds are at stake.
pub struct MockSigner {
    address: Address,
}

impl MockSigner {
    pub fn new() -> Self {
        Self {
            address: Address::repeat_byte(0x11),
        }
    }
}

impl Default for MockSigner {
    fn default() -> Self {
        Self::new()
    }
}

impl SignAction for MockSigner {
    fn sign_action(&self, action: &OrderAction, nonce: u64) -> Result<SignatureWire> {
        // Still exercises the hash path so malformed actions fail here too
        let _ = action_hash(action, nonce)?;
        Ok(SignatureWire {
            r: format!("0x{}", "11".repeat(32)),
            s: format!("0x{}", "22".repeat(32)),
            v: 27,
        })
    }

    fn address(&self) -> Address {
        self.address
    }
}
