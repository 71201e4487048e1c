//! Sweep loop — poll → plan → build → submit → notify, forever.
//!
//! State machine per cycle:
//!
//! ```text
//! Idle → Polling → Evaluating → Submitting → Idle
//!          │           │
//!          └─ error ───┴─ insufficient / cooling down ─→ Idle
//! ```
//!
//! The loop owns its only mutable state (last observed balance, the
//! in-flight flag, and the cooldown deadline) and runs on a single task, so
//! no locking is needed. The current `LoopState` is published on a `watch`
//! channel for observers. A failing step stays in its state until the
//! failure has been notified. Recoverable errors are logged, notified, and turned
//! into a `CycleOutcome`; they never escape `run_cycle`.

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;
use tokio::time::Instant;
use tracing::{debug, error, info, warn};

use super::builder::{select_inputs, SweepBuilder, MAX_INPUT_COINS};
use super::fee::{FeePolicy, PlanDecision};
use super::submitter::Submitter;
use crate::alerts::Notifier;
use crate::chain::BalanceOracle;
use crate::types::{format_sui, total_balance, SuiAddress, SweepError, TransactionReceipt};

// ---------------------------------------------------------------------------
// State and outcomes
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoopState {
    Idle,
    Polling,
    Evaluating,
    Submitting,
}

/// What a single cycle did.
#[derive(Debug, Clone)]
pub enum CycleOutcome {
    /// Balance at or below the withheld amount; nothing to do.
    Insufficient { total: u64 },
    /// A sweep was planned but a previous one is in flight or cooling down.
    CoolingDown { total: u64 },
    Swept(TransactionReceipt),
    PollFailed(SweepError),
    SubmitFailed(SweepError),
}

impl CycleOutcome {
    /// Whether a transaction was attempted this cycle.
    pub fn attempted_sweep(&self) -> bool {
        matches!(self, CycleOutcome::Swept(_) | CycleOutcome::SubmitFailed(_))
    }
}

/// Loop pacing.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LoopTiming {
    pub poll_interval: Duration,
    /// Pause after an attempted sweep so the node can reflect it.
    pub cooldown: Duration,
}

impl Default for LoopTiming {
    fn default() -> Self {
        Self {
            poll_interval: Duration::from_secs(1),
            cooldown: Duration::from_secs(5),
        }
    }
}

// ---------------------------------------------------------------------------
// Sweeper
// ---------------------------------------------------------------------------

pub struct Sweeper {
    address: SuiAddress,
    oracle: Arc<dyn BalanceOracle>,
    policy: FeePolicy,
    builder: SweepBuilder,
    submitter: Submitter,
    notifier: Arc<dyn Notifier>,
    timing: LoopTiming,
    explorer_url: String,

    state: watch::Sender<LoopState>,
    last_balance: Option<u64>,
    in_flight: bool,
    cooldown_until: Option<Instant>,
    cycles: u64,
}

impl Sweeper {
    pub fn new(
        oracle: Arc<dyn BalanceOracle>,
        policy: FeePolicy,
        submitter: Submitter,
        notifier: Arc<dyn Notifier>,
        timing: LoopTiming,
    ) -> Self {
        let address = submitter.account().address();
        let (state, _) = watch::channel(LoopState::Idle);
        Self {
            address,
            oracle,
            policy,
            builder: SweepBuilder::new(address),
            submitter,
            notifier,
            timing,
            explorer_url: String::new(),
            state,
            last_balance: None,
            in_flight: false,
            cooldown_until: None,
            cycles: 0,
        }
    }

    /// Link sweep notifications to a block explorer (digest is appended).
    pub fn with_explorer_url(mut self, url: impl Into<String>) -> Self {
        self.explorer_url = url.into();
        self
    }

    pub fn address(&self) -> SuiAddress {
        self.address
    }

    pub fn state(&self) -> LoopState {
        *self.state.borrow()
    }

    /// Follow state transitions from outside the loop.
    pub fn watch_state(&self) -> watch::Receiver<LoopState> {
        self.state.subscribe()
    }

    fn set_state(&self, state: LoopState) {
        self.state.send_replace(state);
    }

    pub fn last_balance(&self) -> Option<u64> {
        self.last_balance
    }

    pub fn is_in_flight(&self) -> bool {
        self.in_flight
    }

    pub fn cycles(&self) -> u64 {
        self.cycles
    }

    /// Run until `shutdown` resolves. The in-progress cycle always finishes;
    /// shutdown is observed while sleeping between cycles.
    pub async fn run<F: Future<Output = ()>>(mut self, shutdown: F) {
        tokio::pin!(shutdown);

        info!(
            address = %self.address,
            poll_ms = self.timing.poll_interval.as_millis() as u64,
            cooldown_ms = self.timing.cooldown.as_millis() as u64,
            "Sweep loop started"
        );

        loop {
            let outcome = self.run_cycle().await;
            let delay = self.next_delay(&outcome);

            tokio::select! {
                _ = tokio::time::sleep(delay) => {}
                _ = &mut shutdown => {
                    info!(cycles = self.cycles, "Shutdown signal received, leaving sweep loop");
                    break;
                }
            }
        }
    }

    /// Delay before the next cycle given this cycle's outcome.
    pub fn next_delay(&self, outcome: &CycleOutcome) -> Duration {
        if outcome.attempted_sweep() {
            self.timing.cooldown.max(self.timing.poll_interval)
        } else {
            self.timing.poll_interval
        }
    }

    /// One full poll → plan → (maybe) submit cycle. Never fails.
    pub async fn run_cycle(&mut self) -> CycleOutcome {
        self.cycles += 1;

        // 1. Poll
        self.set_state(LoopState::Polling);
        let fetched = self
            .oracle
            .fetch_coins(&self.address)
            .await
            .and_then(|coins| total_balance(&coins).map(|total| (coins, total)));

        let (coins, total) = match fetched {
            Ok(v) => v,
            Err(e) => {
                error!(cycle = self.cycles, error = %e, "Balance poll failed");
                self.notifier.notify(&format!("❌ Monitor error: {e}")).await;
                self.set_state(LoopState::Idle);
                return CycleOutcome::PollFailed(e);
            }
        };

        self.observe_balance(total).await;

        // 2. Evaluate
        self.set_state(LoopState::Evaluating);
        let inputs = select_inputs(&coins, MAX_INPUT_COINS);
        // Subset of a sum that did not overflow.
        let input_total: u64 = inputs.iter().map(|c| c.balance).sum();
        if inputs.len() < coins.len() {
            debug!(
                coins = coins.len(),
                inputs = inputs.len(),
                input_total,
                "Too many coins for one transaction; sweeping the largest first"
            );
        }

        let plan = match self.policy.plan(input_total, inputs.len()) {
            PlanDecision::Insufficient { required, .. } => {
                debug!(total, input_total, required, coins = coins.len(), "Nothing to sweep");
                self.set_state(LoopState::Idle);
                return CycleOutcome::Insufficient { total };
            }
            PlanDecision::Sweep(plan) => plan,
        };

        if self.in_flight || self.cooling_down() {
            debug!(total, in_flight = self.in_flight, "Sweep deferred: previous submission cooling down");
            self.set_state(LoopState::Idle);
            return CycleOutcome::CoolingDown { total };
        }

        // 3. Build + submit
        self.set_state(LoopState::Submitting);
        self.in_flight = true;
        info!(
            total = %format_sui(total),
            amount = %format_sui(plan.amount_to_send),
            gas_budget = plan.gas_budget,
            coins = inputs.len(),
            "Sweeping balance"
        );

        let result = match self.builder.build(&inputs, &plan) {
            Ok(tx) => self.submitter.submit(&tx).await,
            Err(e) => Err(e),
        };

        self.in_flight = false;
        self.cooldown_until = Some(Instant::now() + self.timing.cooldown);

        let outcome = match result {
            Ok(receipt) => {
                self.notifier.notify(&self.sweep_message(&receipt)).await;
                CycleOutcome::Swept(receipt)
            }
            Err(e) => {
                warn!(cycle = self.cycles, error = %e, "Sweep attempt failed; will re-plan next cycle");
                self.notifier.notify(&format!("❌ Sweep failed: {e}")).await;
                CycleOutcome::SubmitFailed(e)
            }
        };
        self.set_state(LoopState::Idle);
        outcome
    }

    fn cooling_down(&self) -> bool {
        self.cooldown_until
            .map(|until| Instant::now() < until)
            .unwrap_or(false)
    }

    /// Notify only when the total differs from the last observation.
    async fn observe_balance(&mut self, total: u64) {
        if self.last_balance == Some(total) {
            return;
        }
        info!(
            previous = ?self.last_balance,
            total = %format_sui(total),
            "Balance changed"
        );
        self.last_balance = Some(total);
        let msg = format!(
            "💰 Wallet: `{}`\nBalance: `{} SUI`",
            self.address.short(),
            format_sui(total)
        );
        self.notifier.notify(&msg).await;
    }

    fn sweep_message(&self, receipt: &TransactionReceipt) -> String {
        let mut msg = format!(
            "🚨 **SUI SWEEP** 🚨\nSent `{} SUI` to `{}`\nTX: ",
            format_sui(receipt.amount),
            receipt.recipient.short()
        );
        if self.explorer_url.is_empty() {
            msg.push('`');
            msg.push_str(&receipt.digest);
            msg.push('`');
        } else {
            msg.push_str(&self.explorer_url);
            msg.push_str(&receipt.digest);
        }
        msg
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
