use crate::models::Transaction;

/// Lookup over an account's recent activity, consulted by the rapid micro-transfer rule.
///
/// Implementations own their window and threshold. They must answer from data
/// outside the batch being scored so that re-scoring the same message after a
/// redelivery gives the same verdict.
pub trait RecentHistory: Send + Sync {
    fn has_rapid_micro_transfers(&self, transaction: &Transaction) -> bool;
}

/// Default lookup with no history available. Never flags.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoRecentHistory;

impl RecentHistory for NoRecentHistory {
    fn has_rapid_micro_transfers(&self, _transaction: &Transaction) -> bool {
        false
    }
}
