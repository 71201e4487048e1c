//! Sui full-node JSON-RPC client.
//!
//! API docs: https://docs.sui.io/sui-api-ref
//! Default endpoint: https://fullnode.mainnet.sui.io:443
//!
//! Methods used:
//! - `suix_getCoins` — paginated coin listing by owner and coin type
//! - `unsafe_paySui` — node-side serialization of a merge/split/transfer
//! - `sui_executeTransactionBlock` — submit signed bytes, wait for local execution
//!
//! Transport failures and non-2xx statuses map to `SweepError::Network`;
//! JSON-RPC error objects and malformed bodies map to `SweepError::Node`.

use anyhow::{Context, Result};
use async_trait::async_trait;
use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine;
use reqwest::Client;
use serde::de::DeserializeOwned;
use serde::Deserialize;
use serde_json::{json, Value};
use std::future::Future;
use std::time::Duration;
use tracing::{debug, warn};

use super::{BalanceOracle, TransactionBytes, TransactionGateway};
use crate::engine::builder::SweepTransaction;
use crate::types::{CoinRecord, SuiAddress, SweepError, TransactionReceipt, SUI_COIN_TYPE};

// ---------------------------------------------------------------------------
// Configuration
// ---------------------------------------------------------------------------

pub const DEFAULT_RPC_ENDPOINT: &str = "https://fullnode.mainnet.sui.io:443";

/// Coins requested per `suix_getCoins` page (node maximum is 50).
const COIN_PAGE_LIMIT: u32 = 50;

/// Execution request type: block until the node has executed locally.
const EXECUTE_REQUEST_TYPE: &str = "WaitForLocalExecution";

// ---------------------------------------------------------------------------
// API response types (JSON-RPC → Rust)
// ---------------------------------------------------------------------------

#[derive(Debug, Deserialize)]
struct RpcResponse<T> {
    result: Option<T>,
    error: Option<RpcErrorObject>,
}

#[derive(Debug, Deserialize)]
struct RpcErrorObject {
    code: i64,
    message: String,
}

/// One page of `suix_getCoins`.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct CoinPage {
    data: Vec<RpcCoin>,
    #[serde(default)]
    next_cursor: Option<String>,
    #[serde(default)]
    has_next_page: bool,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct RpcCoin {
    coin_type: String,
    coin_object_id: String,
    #[serde(default)]
    version: String,
    #[serde(default)]
    digest: String,
    /// u64 encoded as a decimal string.
    balance: String,
}

/// Result of `unsafe_paySui`.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct TransactionBlockBytes {
    tx_bytes: String,
}

/// Result of `sui_executeTransactionBlock` (only the fields we need).
#[derive(Debug, Deserialize)]
struct ExecuteResponse {
    digest: String,
    #[serde(default)]
    effects: Option<Effects>,
}

#[derive(Debug, Deserialize)]
struct Effects {
    status: ExecutionStatus,
}

#[derive(Debug, Deserialize)]
struct ExecutionStatus {
    status: String,
    #[serde(default)]
    error: Option<String>,
}

// ---------------------------------------------------------------------------
// Client
// ---------------------------------------------------------------------------

/// JSON-RPC client for a single Sui full node.
pub struct SuiRpcClient {
    http: Client,
    endpoint: String,
    /// Upper bound on `suix_getCoins` pages followed per fetch.
    max_pages: usize,
}

impl SuiRpcClient {
    pub fn new(endpoint: &str, timeout: Duration, max_pages: usize) -> Result<Self> {
        let http = Client::builder()
            .timeout(timeout)
            .user_agent("SWEEPER/0.1.0 (balance-sweep-agent)")
            .build()
            .context("Failed to build HTTP client for Sui RPC")?;

        Ok(Self {
            http,
            endpoint: endpoint.trim_end_matches('/').to_string(),
            max_pages: max_pages.max(1),
        })
    }

    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }

    // -- Internal helpers ------------------------------------------------

    async fn call<T: DeserializeOwned>(&self, method: &str, params: Value) -> Result<T, SweepError> {
        let body = json!({
            "jsonrpc": "2.0",
            "id": uuid::Uuid::new_v4().to_string(),
            "method": method,
            "params": params,
        });

        debug!(method, endpoint = %self.endpoint, "Sui RPC call");

        let resp = self
            .http
            .post(&self.endpoint)
            .json(&body)
            .send()
            .await
            .map_err(|e| SweepError::Network(format!("{method}: {e}")))?;

        if !resp.status().is_success() {
            let status = resp.status();
            let text = resp.text().await.unwrap_or_default();
            return Err(SweepError::Network(format!("{method}: HTTP {status}: {text}")));
        }

        let text = resp
            .text()
            .await
            .map_err(|e| SweepError::Network(format!("{method}: failed to read body: {e}")))?;

        decode_response(method, &text)
    }
}

/// Decode a JSON-RPC envelope, surfacing node errors and missing results.
fn decode_response<T: DeserializeOwned>(method: &str, body: &str) -> Result<T, SweepError> {
    let envelope: RpcResponse<T> = serde_json::from_str(body)
        .map_err(|e| SweepError::Node(format!("{method}: malformed response: {e}")))?;

    if let Some(err) = envelope.error {
        return Err(SweepError::Node(format!(
            "{method}: RPC error {}: {}",
            err.code, err.message
        )));
    }

    envelope
        .result
        .ok_or_else(|| SweepError::Node(format!("{method}: response has neither result nor error")))
}

/// Convert one page of node coins into records, skipping foreign coin types.
fn coins_from_page(page: CoinPage) -> Result<Vec<CoinRecord>, SweepError> {
    page.data
        .into_iter()
        .filter(|c| {
            let native = c.coin_type == SUI_COIN_TYPE;
            if !native {
                warn!(coin_type = %c.coin_type, id = %c.coin_object_id, "Ignoring non-SUI coin");
            }
            native
        })
        .map(|c| {
            let balance = c.balance.parse::<u64>().map_err(|e| {
                SweepError::Node(format!(
                    "coin {} has unparseable balance {:?}: {e}",
                    c.coin_object_id, c.balance
                ))
            })?;
            Ok(CoinRecord {
                id: c.coin_object_id,
                balance,
                version: c.version,
                digest: c.digest,
            })
        })
        .collect()
}

/// Positional params for `unsafe_paySui`.
fn pay_sui_params(tx: &SweepTransaction) -> Value {
    json!([
        tx.sender.to_string(),
        tx.input_coin_ids(),
        [tx.recipient.to_string()],
        [tx.amount.to_string()],
        tx.gas_budget.to_string()
    ])
}

/// Turn an execute response into a receipt, rejecting failed effects.
fn receipt_from_execution(
    tx: &SweepTransaction,
    resp: ExecuteResponse,
) -> Result<TransactionReceipt, SweepError> {
    match resp.effects {
        None => Err(SweepError::Submission(format!(
            "transaction {} returned no effects; outcome unknown",
            resp.digest
        ))),
        Some(effects) if effects.status.status != "success" => Err(SweepError::Submission(format!(
            "transaction {} failed on chain: {}",
            resp.digest,
            effects.status.error.unwrap_or(effects.status.status)
        ))),
        Some(_) => Ok(TransactionReceipt {
            digest: resp.digest,
            amount: tx.amount,
            recipient: tx.recipient,
            gas_budget: tx.gas_budget,
            timestamp: chrono::Utc::now(),
        }),
    }
}

// ---------------------------------------------------------------------------
// Trait implementations
// ---------------------------------------------------------------------------

/// Follow `suix_getCoins` cursors until the last page or `max_pages`.
///
/// `fetch_page` receives the cursor for the next page (`None` first).
async fn collect_pages<F, Fut>(
    max_pages: usize,
    mut fetch_page: F,
) -> Result<Vec<CoinRecord>, SweepError>
where
    F: FnMut(Option<String>) -> Fut,
    Fut: Future<Output = Result<CoinPage, SweepError>>,
{
    let mut coins = Vec::new();
    let mut cursor: Option<String> = None;

    for page_no in 0..max_pages {
        let page = fetch_page(cursor.take()).await?;

        let has_next = page.has_next_page;
        cursor = page.next_cursor.clone();
        coins.extend(coins_from_page(page)?);

        if !has_next || cursor.is_none() {
            return Ok(coins);
        }
        debug!(page = page_no + 1, fetched = coins.len(), "Following coin cursor");
    }

    warn!(max_pages, fetched = coins.len(), "Coin listing truncated at page cap");
    Ok(coins)
}

#[async_trait]
impl BalanceOracle for SuiRpcClient {
    async fn fetch_coins(&self, owner: &SuiAddress) -> Result<Vec<CoinRecord>, SweepError> {
        let owner = owner.to_string();
        let rpc = self;
        collect_pages(self.max_pages, move |cursor| {
            let params = json!([owner, SUI_COIN_TYPE, cursor, COIN_PAGE_LIMIT]);
            rpc.call::<CoinPage>("suix_getCoins", params)
        })
        .await
    }
}

#[async_trait]
impl TransactionGateway for SuiRpcClient {
    async fn prepare(&self, tx: &SweepTransaction) -> Result<TransactionBytes, SweepError> {
        let block: TransactionBlockBytes = self.call("unsafe_paySui", pay_sui_params(tx)).await?;
        let raw = BASE64
            .decode(&block.tx_bytes)
            .map_err(|e| SweepError::Node(format!("unsafe_paySui returned invalid base64: {e}")))?;
        Ok(TransactionBytes {
            encoded: block.tx_bytes,
            raw,
        })
    }

    async fn execute(
        &self,
        tx: &SweepTransaction,
        bytes: &TransactionBytes,
        signature: &str,
    ) -> Result<TransactionReceipt, SweepError> {
        let resp: ExecuteResponse = self
            .call(
                "sui_executeTransactionBlock",
                json!([
                    bytes.encoded,
                    [signature],
                    { "showEffects": true },
                    EXECUTE_REQUEST_TYPE
                ]),
            )
            .await?;
        receipt_from_execution(tx, resp)
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
