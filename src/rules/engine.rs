use std::sync::Arc;

use rust_decimal::Decimal;
use tracing::debug;

use crate::models::{RawTransaction, RuleVerdict, ScoredTransaction, Transaction, TransactionError, TransactionType};
use crate::rules::{NoRecentHistory, RecentHistory};

/// Limits used by the fraud rules.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RuleThresholds {
    /// Transfers strictly above this amount are flagged.
    pub high_value_transfer: Decimal,
    /// Transfers strictly below this amount are candidates for the micro-transfer rule.
    pub micro_transfer: Decimal,
    /// Allowed difference between the debited balance and the amount, at minor-unit precision.
    pub balance_tolerance: Decimal
}

impl Default for RuleThresholds {
    fn default() -> Self {
        Self {
            high_value_transfer: Decimal::new(200_000, 0),
            micro_transfer: Decimal::new(10, 0),
            balance_tolerance: Decimal::new(1, 2)
        }
    }
}

/// Deterministic fraud scoring.
///
/// Scoring never mutates its input and depends only on the transaction and the
/// injected [`RecentHistory`], so a redelivered message always gets the verdict
/// it got the first time.
#[derive(Clone)]
pub struct RuleEngine {
    thresholds: RuleThresholds,
    history: Arc<dyn RecentHistory>
}

impl RuleEngine {
    pub fn new() -> Self {
        Self {
            thresholds: RuleThresholds::default(),
            history: Arc::new(NoRecentHistory)
        }
    }

    pub fn with_thresholds(mut self, thresholds: RuleThresholds) -> Self {
        self.thresholds = thresholds;
        self
    }

    pub fn with_history(mut self, history: Arc<dyn RecentHistory>) -> Self {
        self.history = history;
        self
    }

    /// Normalizes a raw transaction and attaches its fraud decision.
    ///
    /// # Errors
    /// Returns `TransactionError` when a required field is missing or a numeric
    /// field cannot be read as a decimal.
    pub fn score(&self, raw: &RawTransaction) -> Result<ScoredTransaction, TransactionError> {
        let transaction = Transaction::try_from(raw)?;
        let verdict = self.evaluate(&transaction);

        debug!(
            step = transaction.step,
            transaction_type = transaction.transaction_type.as_str(),
            amount = %transaction.amount,
            detected_fraud = verdict.is_fraud(),
            rules = ?verdict.fired_rules(),
            "Transaction scored"
        );

        Ok(ScoredTransaction::new(transaction, verdict))
    }

    /// Evaluates every rule against a normalized transaction.
    pub fn evaluate(&self, transaction: &Transaction) -> RuleVerdict {
        let is_transfer = transaction.transaction_type == TransactionType::Transfer;

        let high_value_transfer = is_transfer && transaction.amount > self.thresholds.high_value_transfer;

        let account_drained = transaction.new_balance_origin.is_zero()
            && transaction.old_balance_origin > Decimal::ZERO;

        let rapid_micro_transfer = is_transfer
            && transaction.amount < self.thresholds.micro_transfer
            && self.history.has_rapid_micro_transfers(transaction);

        let balance_mismatch = transaction.old_balance_origin
            .checked_sub(transaction.new_balance_origin)
            .and_then(|difference| difference.checked_sub(transaction.amount))
            .is_none_or(|difference| difference.abs() > self.thresholds.balance_tolerance);

        RuleVerdict {
            high_value_transfer,
            account_drained,
            rapid_micro_transfer,
            balance_mismatch
        }
    }
}

impl Default for RuleEngine {
    fn default() -> Self {
        Self::new()
    }
}
