//! In-memory chain and notifier for integration testing.
//!
//! `MockChain` implements both chain seams and applies executed sweeps to
//! its own coin table, so consecutive cycles observe the effect of earlier
//! ones the way a real node would.

#![allow(dead_code)]

use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use sweeper::alerts::Notifier;
use sweeper::chain::{BalanceOracle, TransactionBytes, TransactionGateway};
use sweeper::engine::builder::SweepTransaction;
use sweeper::types::{CoinRecord, SuiAddress, SweepError, TransactionReceipt};

/// Gas actually burned per executed transaction (always within budget).
pub const GAS_USED: u64 = 600_000;

#[derive(Default)]
struct ChainState {
    coins: HashMap<SuiAddress, Vec<CoinRecord>>,
    executed: Vec<SweepTransaction>,
    next_id: u64,
}

/// A deterministic chain. All state is in-memory.
#[derive(Clone, Default)]
pub struct MockChain {
    state: Arc<Mutex<ChainState>>,
    /// If set, `fetch_coins` returns this error.
    poll_error: Arc<Mutex<Option<SweepError>>>,
    /// If set, `execute` returns this error without touching coins.
    execute_error: Arc<Mutex<Option<SweepError>>>,
    signatures: Arc<Mutex<Vec<String>>>,
}

impl MockChain {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn deposit(&self, owner: SuiAddress, balance: u64) {
        let mut state = self.state.lock().unwrap();
        state.next_id += 1;
        let id = format!("0xcoin{}", state.next_id);
        state
            .coins
            .entry(owner)
            .or_default()
            .push(CoinRecord::new(id, balance));
    }

    pub fn balance_of(&self, owner: &SuiAddress) -> u64 {
        self.state
            .lock()
            .unwrap()
            .coins
            .get(owner)
            .map(|c| c.iter().map(|c| c.balance).sum())
            .unwrap_or(0)
    }

    pub fn coin_count(&self, owner: &SuiAddress) -> usize {
        self.state
            .lock()
            .unwrap()
            .coins
            .get(owner)
            .map(Vec::len)
            .unwrap_or(0)
    }

    pub fn executed(&self) -> Vec<SweepTransaction> {
        self.state.lock().unwrap().executed.clone()
    }

    pub fn signatures(&self) -> Vec<String> {
        self.signatures.lock().unwrap().clone()
    }

    pub fn fail_polls(&self, err: SweepError) {
        *self.poll_error.lock().unwrap() = Some(err);
    }

    pub fn fail_executions(&self, err: SweepError) {
        *self.execute_error.lock().unwrap() = Some(err);
    }

    pub fn heal(&self) {
        *self.poll_error.lock().unwrap() = None;
        *self.execute_error.lock().unwrap() = None;
    }
}

#[async_trait]
impl BalanceOracle for MockChain {
    async fn fetch_coins(&self, owner: &SuiAddress) -> Result<Vec<CoinRecord>, SweepError> {
        if let Some(err) = self.poll_error.lock().unwrap().clone() {
            return Err(err);
        }
        Ok(self
            .state
            .lock()
            .unwrap()
            .coins
            .get(owner)
            .cloned()
            .unwrap_or_default())
    }
}

#[async_trait]
impl TransactionGateway for MockChain {
    async fn prepare(&self, tx: &SweepTransaction) -> Result<TransactionBytes, SweepError> {
        let raw = format!("{}:{}:{}", tx.sender, tx.amount, tx.gas_budget).into_bytes();
        Ok(TransactionBytes {
            encoded: String::from_utf8_lossy(&raw).into_owned(),
            raw,
        })
    }

    async fn execute(
        &self,
        tx: &SweepTransaction,
        _bytes: &TransactionBytes,
        signature: &str,
    ) -> Result<TransactionReceipt, SweepError> {
        if let Some(err) = self.execute_error.lock().unwrap().clone() {
            return Err(err);
        }
        self.signatures.lock().unwrap().push(signature.to_string());

        let mut state = self.state.lock().unwrap();
        let inputs = tx.input_coin_ids();
        let owned = state.coins.entry(tx.sender).or_default();
        if !inputs.iter().all(|id| owned.iter().any(|c| &c.id == id)) {
            return Err(SweepError::Node("input object not found".into()));
        }
        let input_total: u64 = owned
            .iter()
            .filter(|c| inputs.contains(&c.id))
            .map(|c| c.balance)
            .sum();
        if input_total < tx.amount + tx.gas_budget {
            return Err(SweepError::Node("insufficient gas".into()));
        }

        // Merge → split → transfer, gas paid from the merged base coin.
        owned.retain(|c| !inputs.contains(&c.id));
        owned.push(CoinRecord::new(
            tx.base_coin.id.clone(),
            input_total - tx.amount - GAS_USED.min(tx.gas_budget),
        ));

        state.next_id += 1;
        let id = format!("0xcoin{}", state.next_id);
        state
            .coins
            .entry(tx.recipient)
            .or_default()
            .push(CoinRecord::new(id, tx.amount));
        state.executed.push(tx.clone());

        Ok(TransactionReceipt {
            digest: format!("TX{}", state.executed.len()),
            amount: tx.amount,
            recipient: tx.recipient,
            gas_budget: tx.gas_budget,
            timestamp: chrono::Utc::now(),
        })
    }
}

/// Records every message it is asked to deliver.
#[derive(Clone, Default)]
pub struct RecordingNotifier {
    messages: Arc<Mutex<Vec<String>>>,
}

impl RecordingNotifier {
    pub fn messages(&self) -> Vec<String> {
        self.messages.lock().unwrap().clone()
    }
}

#[async_trait]
impl Notifier for RecordingNotifier {
    async fn notify(&self, message: &str) {
        self.messages.lock().unwrap().push(message.to_string());
    }
}
