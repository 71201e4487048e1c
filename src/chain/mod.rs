//! Chain integration.
//!
//! Defines the two seams the sweep loop talks to the node through:
//! - `BalanceOracle`: read the account's coins
//! - `TransactionGateway`: materialise and execute a sweep transaction
//!
//! `rpc::SuiRpcClient` implements both over the node's JSON-RPC API.
//! `keys` holds the signing account and credential decoding.

pub mod keys;
pub mod rpc;

use async_trait::async_trait;

use crate::engine::builder::SweepTransaction;
use crate::types::{CoinRecord, SuiAddress, SweepError, TransactionReceipt};

/// Serialized, unsigned transaction data as returned by the node.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TransactionBytes {
    /// Base64 exactly as the node sent it; echoed back on execution.
    pub encoded: String,
    pub raw: Vec<u8>,
}

/// Source of truth for the account's spendable coins.
///
/// Implementations must not cache: every call reflects the node's latest view.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait BalanceOracle: Send + Sync {
    /// All native-token coins owned by `owner`, in node order.
    async fn fetch_coins(&self, owner: &SuiAddress) -> Result<Vec<CoinRecord>, SweepError>;
}

/// Node-side half of submission. Signing happens locally in between.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait TransactionGateway: Send + Sync {
    /// Ask the node to serialize the sweep into transaction bytes.
    async fn prepare(&self, tx: &SweepTransaction) -> Result<TransactionBytes, SweepError>;

    /// Execute signed bytes and wait for the node's local-execution ack.
    async fn execute(
        &self,
        tx: &SweepTransaction,
        bytes: &TransactionBytes,
        signature: &str,
    ) -> Result<TransactionReceipt, SweepError>;
}
