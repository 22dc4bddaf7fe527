use serde_json::Value;
use thiserror::Error;

use crate::types::Step;

/// A queue message that cannot become a scored transaction.
///
/// Every variant is local to one message: the message is dead-lettered and the
/// rest of the batch carries on.
#[derive(Debug, Error)]
pub enum TransactionError {
    #[error("Malformed transaction payload: {0}")]
    Payload(#[from] serde_json::Error),
    #[error("Field [{field}] is missing for transaction at step [{step}]")]
    MissingField {
        step: Step,
        field: &'static str
    },
    #[error("Field [{field}] has non-numeric value [{value}] for transaction at step [{step}]")]
    NotNumeric {
        step: Step,
        field: &'static str,
        value: String
    },
    #[error("Field [{field}] must not be negative for transaction at step [{step}]")]
    Negative {
        step: Step,
        field: &'static str
    },
    #[error("Unknown transaction type [{value}] for transaction at step [{step}]")]
    UnknownType {
        step: Step,
        value: String
    }
}

impl TransactionError {
    pub fn missing_field(step: Step, field: &'static str) -> Self {
        Self::MissingField { step, field }
    }

    pub fn not_numeric(step: Step, field: &'static str, value: &Value) -> Self {
        Self::NotNumeric { step, field, value: value.to_string() }
    }

    pub fn negative(step: Step, field: &'static str) -> Self {
        Self::Negative { step, field }
    }

    pub fn unknown_type(step: Step, value: &Value) -> Self {
        let value = match value {
            Value::String(text) => text.clone(),
            other => other.to_string()
        };

        Self::UnknownType { step, value }
    }
}
