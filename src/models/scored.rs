use serde::{Deserialize, Serialize};

use crate::models::Transaction;

/// Outcome of every fraud rule for one transaction.
///
/// All rules are evaluated even when an earlier one already fired, so the
/// verdict records each independent signal.
#[derive(Debug, Clone, Copy, Default, Eq, PartialEq)]
pub struct RuleVerdict {
    pub high_value_transfer: bool,
    pub account_drained: bool,
    pub rapid_micro_transfer: bool,
    pub balance_mismatch: bool
}

impl RuleVerdict {
    pub fn is_fraud(&self) -> bool {
        self.high_value_transfer || self.account_drained || self.rapid_micro_transfer || self.balance_mismatch
    }

    /// Names of the rules that fired, in evaluation order.
    pub fn fired_rules(&self) -> Vec<&'static str> {
        [
            (self.high_value_transfer, "high_value_transfer"),
            (self.account_drained, "account_drained"),
            (self.rapid_micro_transfer, "rapid_micro_transfer"),
            (self.balance_mismatch, "balance_mismatch")
        ]
        .into_iter()
        .filter_map(|(fired, name)| fired.then_some(name))
        .collect()
    }
}

/// A normalized transaction with its fraud decision, in warehouse row layout.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScoredTransaction {
    #[serde(flatten)]
    pub transaction: Transaction,
    pub detected_fraud: bool,
    /// Per-rule detail, kept for logging and not persisted.
    #[serde(skip)]
    pub verdict: RuleVerdict
}

impl ScoredTransaction {
    pub fn new(transaction: Transaction, verdict: RuleVerdict) -> Self {
        Self {
            transaction,
            detected_fraud: verdict.is_fraud(),
            verdict
        }
    }
}
