//! Sweep transaction builder.
//!
//! Turns the observed coins and a `SweepPlan` into one atomic
//! merge → split → transfer transaction. The largest coin is the base:
//! every other coin is merged into it, the plan amount is split off and
//! transferred to the destination, and the remainder stays with the signer
//! to pay gas.
//!
//! Every input coin also pays gas on the node, so one transaction carries at
//! most `MAX_INPUT_COINS` of them. `select_inputs` picks the largest; the
//! rest wait for a later cycle.

use tracing::debug;

use super::fee::SweepPlan;
use crate::types::{total_balance, CoinRecord, SuiAddress, SweepError};

/// Node limit on gas-payment objects per transaction.
pub const MAX_INPUT_COINS: usize = 256;

/// The largest `max` coins, largest first. Equal balances keep node order.
pub fn select_inputs(coins: &[CoinRecord], max: usize) -> Vec<CoinRecord> {
    let mut selected = coins.to_vec();
    selected.sort_by(|a, b| b.balance.cmp(&a.balance));
    selected.truncate(max);
    selected
}

// ---------------------------------------------------------------------------
// Transaction model
// ---------------------------------------------------------------------------

/// One step of the programmable transaction, in execution order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    MergeCoins { into: String, sources: Vec<String> },
    SplitCoins { from: String, amount: u64 },
    TransferObjects { recipient: SuiAddress },
}

/// A fully-specified sweep, ready to be materialised and signed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SweepTransaction {
    pub sender: SuiAddress,
    pub base_coin: CoinRecord,
    pub merge_sources: Vec<CoinRecord>,
    pub recipient: SuiAddress,
    pub amount: u64,
    pub gas_budget: u64,
}

impl SweepTransaction {
    /// Input coins with the base (gas) coin first.
    pub fn input_coin_ids(&self) -> Vec<String> {
        std::iter::once(&self.base_coin)
            .chain(self.merge_sources.iter())
            .map(|c| c.id.clone())
            .collect()
    }

    /// Sum of every input coin.
    pub fn input_total(&self) -> u64 {
        self.merge_sources
            .iter()
            .fold(self.base_coin.balance, |acc, c| acc.saturating_add(c.balance))
    }

    /// What the signer keeps before gas is charged.
    pub fn change(&self) -> u64 {
        self.input_total().saturating_sub(self.amount)
    }

    pub fn commands(&self) -> Vec<Command> {
        let mut commands = Vec::with_capacity(3);
        if !self.merge_sources.is_empty() {
            commands.push(Command::MergeCoins {
                into: self.base_coin.id.clone(),
                sources: self.merge_sources.iter().map(|c| c.id.clone()).collect(),
            });
        }
        commands.push(Command::SplitCoins {
            from: self.base_coin.id.clone(),
            amount: self.amount,
        });
        commands.push(Command::TransferObjects {
            recipient: self.recipient,
        });
        commands
    }
}

// ---------------------------------------------------------------------------
// Builder
// ---------------------------------------------------------------------------

pub struct SweepBuilder {
    sender: SuiAddress,
}

impl SweepBuilder {
    pub fn new(sender: SuiAddress) -> Self {
        Self { sender }
    }

    pub fn build(&self, coins: &[CoinRecord], plan: &SweepPlan) -> Result<SweepTransaction, SweepError> {
        let base_index = coins
            .iter()
            .enumerate()
            .max_by(|(ia, a), (ib, b)| a.balance.cmp(&b.balance).then(ib.cmp(ia)))
            .map(|(i, _)| i)
            .ok_or_else(|| SweepError::InvalidPlan("no coins to sweep".into()))?;

        if coins.len() > MAX_INPUT_COINS {
            return Err(SweepError::InvalidPlan(format!(
                "{} input coins exceeds the per-transaction limit of {MAX_INPUT_COINS}",
                coins.len()
            )));
        }

        if plan.amount_to_send == 0 {
            return Err(SweepError::InvalidPlan("amount to send is zero".into()));
        }

        let total = total_balance(coins)?;
        if plan.amount_to_send > total {
            return Err(SweepError::InvalidPlan(format!(
                "amount {} exceeds coin total {total}",
                plan.amount_to_send
            )));
        }

        let base_coin = coins[base_index].clone();
        let merge_sources: Vec<CoinRecord> = coins
            .iter()
            .enumerate()
            .filter(|(i, _)| *i != base_index)
            .map(|(_, c)| c.clone())
            .collect();

        debug!(
            base = %base_coin.id,
            merged = merge_sources.len(),
            amount = plan.amount_to_send,
            gas_budget = plan.gas_budget,
            "Built sweep transaction"
        );

        Ok(SweepTransaction {
            sender: self.sender,
            base_coin,
            merge_sources,
            recipient: plan.destination,
            amount: plan.amount_to_send,
            gas_budget: plan.gas_budget,
        })
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
