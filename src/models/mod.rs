mod errors;
mod scored;
#[cfg(test)]
mod tests;
mod transaction;

use std::str::FromStr;

use serde::{Deserialize, Serialize};

pub use errors::TransactionError;
pub use scored::{RuleVerdict, ScoredTransaction};
pub use transaction::{DedupKey, RawTransaction, Transaction};

#[derive(Debug, Clone, Copy, Eq, PartialEq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum TransactionType {
    Transfer,
    CashOut,
    Payment,
    Debit,
    CashIn
}

impl TransactionType {
    pub fn as_str(&self) -> &'static str {
        match self {
            TransactionType::Transfer => "TRANSFER",
            TransactionType::CashOut => "CASH_OUT",
            TransactionType::Payment => "PAYMENT",
            TransactionType::Debit => "DEBIT",
            TransactionType::CashIn => "CASH_IN"
        }
    }
}

impl FromStr for TransactionType {
    type Err = String;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim() {
            "TRANSFER" => Ok(TransactionType::Transfer),
            "CASH_OUT" => Ok(TransactionType::CashOut),
            "PAYMENT" => Ok(TransactionType::Payment),
            "DEBIT" => Ok(TransactionType::Debit),
            "CASH_IN" => Ok(TransactionType::CashIn),
            other => Err(other.to_string())
        }
    }
}
