//! Shared types for the SWEEPER agent.
//!
//! These types form the data model used across all modules. Chain, engine
//! and alert modules depend on them without depending on each other.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Smallest-unit scale of the native token (1 SUI = 10^9 MIST).
pub const MIST_DECIMALS: u32 = 9;

/// Fully-qualified type tag of the native coin.
pub const SUI_COIN_TYPE: &str = "0x2::sui::SUI";

// ---------------------------------------------------------------------------
// Address
// ---------------------------------------------------------------------------

/// A 32-byte account address.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SuiAddress([u8; 32]);

impl SuiAddress {
    pub const LENGTH: usize = 32;

    pub fn from_bytes(bytes: [u8; 32]) -> Self {
        Self(bytes)
    }

    pub fn as_bytes(&self) -> &[u8; 32] {
        &self.0
    }

    /// Abbreviated form for chat messages: `0x1234abcd...wxyz`.
    pub fn short(&self) -> String {
        let full = self.to_string();
        format!("{}...{}", &full[..10], &full[full.len() - 4..])
    }
}

impl fmt::Display for SuiAddress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "0x{}", hex::encode(self.0))
    }
}

impl FromStr for SuiAddress {
    type Err = SweepError;

    /// Parse `0x`-prefixed hex. Short forms such as `0x2` are left-padded.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let trimmed = s.trim();
        let digits = trimmed
            .strip_prefix("0x")
            .or_else(|| trimmed.strip_prefix("0X"))
            .ok_or_else(|| SweepError::Config(format!("address must start with 0x: {trimmed}")))?;

        if digits.is_empty() || digits.len() > Self::LENGTH * 2 {
            return Err(SweepError::Config(format!(
                "address must have 1-64 hex digits: {trimmed}"
            )));
        }

        let padded = format!("{digits:0>64}");
        let mut bytes = [0u8; 32];
        hex::decode_to_slice(&padded, &mut bytes)
            .map_err(|e| SweepError::Config(format!("invalid address {trimmed}: {e}")))?;
        Ok(Self(bytes))
    }
}

impl Serialize for SuiAddress {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.to_string())
    }
}

impl<'de> Deserialize<'de> for SuiAddress {
    fn deserialize<D: serde::Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        s.parse().map_err(serde::de::Error::custom)
    }
}

// ---------------------------------------------------------------------------
// Coins
// ---------------------------------------------------------------------------

/// One spendable coin object owned by the account.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CoinRecord {
    /// Object id as reported by the node (opaque to the agent).
    pub id: String,
    /// Balance in MIST.
    pub balance: u64,
    pub version: String,
    pub digest: String,
}

impl CoinRecord {
    /// Helper to build a coin with placeholder version/digest.
    pub fn new(id: impl Into<String>, balance: u64) -> Self {
        Self {
            id: id.into(),
            balance,
            version: String::new(),
            digest: String::new(),
        }
    }
}

/// Sum coin balances. Overflow means the node returned garbage.
pub fn total_balance(coins: &[CoinRecord]) -> Result<u64, SweepError> {
    coins.iter().try_fold(0u64, |acc, c| {
        acc.checked_add(c.balance)
            .ok_or_else(|| SweepError::Node("coin balances overflow u64".into()))
    })
}

/// Render a MIST amount as a human SUI string, e.g. `1.5`.
pub fn format_sui(mist: u64) -> String {
    Decimal::from_i128_with_scale(mist as i128, MIST_DECIMALS)
        .normalize()
        .to_string()
}

// ---------------------------------------------------------------------------
// Receipts
// ---------------------------------------------------------------------------

/// Acknowledgement that a sweep transaction executed on chain.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TransactionReceipt {
    pub digest: String,
    pub amount: u64,
    pub recipient: SuiAddress,
    pub gas_budget: u64,
    pub timestamp: DateTime<Utc>,
}

// ---------------------------------------------------------------------------
// Error types
// ---------------------------------------------------------------------------

/// Domain-specific error types for SWEEPER.
///
/// `Credential` and `Config` are fatal and only raised during startup.
/// Everything else is recoverable: the loop logs it, notifies, and polls again.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum SweepError {
    #[error("Credential error: {0}")]
    Credential(String),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Network error: {0}")]
    Network(String),

    #[error("Node error: {0}")]
    Node(String),

    #[error("Submission failed: {0}")]
    Submission(String),

    #[error("Invalid sweep plan: {0}")]
    InvalidPlan(String),
}

impl SweepError {
    /// Whether the loop can continue after this error.
    pub fn is_recoverable(&self) -> bool {
        !matches!(self, SweepError::Credential(_) | SweepError::Config(_))
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
