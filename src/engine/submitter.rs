//! Submitter — sign and execute a built sweep.
//!
//! The node serializes the transaction, the account signs locally, and the
//! node executes it. Any failure along the way is reported as
//! `SweepError::Submission`; nothing is retried within the cycle. A
//! transaction that never executed leaves the coins untouched, so the next
//! cycle simply plans again from fresh chain state.

use std::sync::Arc;
use tracing::{info, warn};

use super::builder::SweepTransaction;
use crate::chain::keys::Account;
use crate::chain::TransactionGateway;
use crate::types::{format_sui, SweepError, TransactionReceipt};

pub struct Submitter {
    gateway: Arc<dyn TransactionGateway>,
    account: Account,
}

impl Submitter {
    pub fn new(gateway: Arc<dyn TransactionGateway>, account: Account) -> Self {
        Self { gateway, account }
    }

    pub fn account(&self) -> &Account {
        &self.account
    }

    pub async fn submit(&self, tx: &SweepTransaction) -> Result<TransactionReceipt, SweepError> {
        if tx.sender != self.account.address() {
            return Err(SweepError::Submission(format!(
                "transaction sender {} is not the signing account {}",
                tx.sender,
                self.account.address()
            )));
        }

        let bytes = self
            .gateway
            .prepare(tx)
            .await
            .map_err(|e| as_submission(e, "prepare"))?;

        let signature = self.account.sign_transaction(&bytes.raw);

        let receipt = self
            .gateway
            .execute(tx, &bytes, &signature)
            .await
            .map_err(|e| as_submission(e, "execute"))?;

        info!(
            digest = %receipt.digest,
            amount = %format_sui(receipt.amount),
            recipient = %receipt.recipient,
            "Sweep executed"
        );

        Ok(receipt)
    }
}

fn as_submission(err: SweepError, stage: &str) -> SweepError {
    warn!(stage, error = %err, "Sweep submission failed");
    match err {
        SweepError::Submission(_) => err,
        other => SweepError::Submission(format!("{stage}: {other}")),
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
