use std::str::FromStr;

use rust_decimal::Decimal;
use serde::{de, Deserialize, Deserializer, Serialize};
use serde_json::Value;

use crate::models::{TransactionError, TransactionType};
use crate::types::Step;

/// A transaction exactly as it arrived on the queue.
///
/// Only `step` is validated on decode, since it is needed to filter already
/// committed messages before any scoring happens. Every other field keeps its
/// wire representation (string or number) until [`Transaction::try_from`]
/// coerces it. Unknown fields are ignored.
#[derive(Debug, Clone, Deserialize)]
pub struct RawTransaction {
    #[serde(deserialize_with = "deserialize_step")]
    pub step: Step,
    #[serde(rename = "type", default)]
    pub transaction_type: Option<Value>,
    #[serde(default)]
    pub amount: Option<Value>,
    #[serde(rename = "nameOrig", default)]
    pub origin_account: Option<String>,
    #[serde(rename = "oldbalanceOrg", default)]
    pub old_balance_origin: Option<Value>,
    #[serde(rename = "newbalanceOrig", default)]
    pub new_balance_origin: Option<Value>,
    #[serde(rename = "nameDest", default)]
    pub destination_account: Option<String>,
    #[serde(rename = "oldbalanceDest", default)]
    pub old_balance_destination: Option<Value>,
    #[serde(rename = "newbalanceDest", default)]
    pub new_balance_destination: Option<Value>
}

impl RawTransaction {
    /// Decodes one UTF-8 JSON queue payload.
    pub fn decode(payload: &[u8]) -> Result<Self, TransactionError> {
        Ok(serde_json::from_slice(payload)?)
    }
}

/// A payment event with every numeric field normalized to a decimal.
///
/// This is also the row layout written to the warehouse, so field names follow
/// the upstream event schema.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Transaction {
    pub step: Step,
    #[serde(rename = "type")]
    pub transaction_type: TransactionType,
    pub amount: Decimal,
    #[serde(rename = "nameOrig", default, skip_serializing_if = "Option::is_none")]
    pub origin_account: Option<String>,
    #[serde(rename = "oldbalanceOrg")]
    pub old_balance_origin: Decimal,
    #[serde(rename = "newbalanceOrig")]
    pub new_balance_origin: Decimal,
    #[serde(rename = "nameDest", default, skip_serializing_if = "Option::is_none")]
    pub destination_account: Option<String>,
    #[serde(rename = "oldbalanceDest")]
    pub old_balance_destination: Decimal,
    #[serde(rename = "newbalanceDest")]
    pub new_balance_destination: Decimal
}

/// Stable identity of a transaction, used to collapse duplicate warehouse rows at read time.
#[derive(Debug, Clone, Eq, PartialEq, Hash)]
pub struct DedupKey {
    pub step: Step,
    pub origin_account: Option<String>,
    pub destination_account: Option<String>
}

impl Transaction {
    pub fn dedup_key(&self) -> DedupKey {
        DedupKey {
            step: self.step,
            origin_account: self.origin_account.clone(),
            destination_account: self.destination_account.clone()
        }
    }
}

impl TryFrom<&RawTransaction> for Transaction {
    type Error = TransactionError;

    fn try_from(raw: &RawTransaction) -> Result<Self, Self::Error> {
        let step = raw.step;

        let transaction_type = raw.transaction_type.as_ref()
            .ok_or_else(|| TransactionError::missing_field(step, "type"))?;
        let transaction_type = match transaction_type {
            Value::String(text) => TransactionType::from_str(text)
                .map_err(|_| TransactionError::unknown_type(step, transaction_type))?,
            other => return Err(TransactionError::unknown_type(step, other))
        };

        let amount = required_decimal(step, "amount", raw.amount.as_ref())?;

        if amount < Decimal::ZERO {
            return Err(TransactionError::negative(step, "amount"))
        }

        Ok(Transaction {
            step,
            transaction_type,
            amount,
            origin_account: raw.origin_account.clone(),
            old_balance_origin: optional_decimal(step, "oldbalanceOrg", raw.old_balance_origin.as_ref())?,
            new_balance_origin: optional_decimal(step, "newbalanceOrig", raw.new_balance_origin.as_ref())?,
            destination_account: raw.destination_account.clone(),
            old_balance_destination: optional_decimal(step, "oldbalanceDest", raw.old_balance_destination.as_ref())?,
            new_balance_destination: optional_decimal(step, "newbalanceDest", raw.new_balance_destination.as_ref())?
        })
    }
}

fn required_decimal(step: Step, field: &'static str, value: Option<&Value>) -> Result<Decimal, TransactionError> {
    match value {
        None | Some(Value::Null) => Err(TransactionError::missing_field(step, field)),
        Some(value) => coerce_decimal(step, field, value)
    }
}

//NOTE: Balances are routinely omitted by upstream producers for merchant accounts, absent means zero.
fn optional_decimal(step: Step, field: &'static str, value: Option<&Value>) -> Result<Decimal, TransactionError> {
    match value {
        None | Some(Value::Null) => Ok(Decimal::ZERO),
        Some(Value::String(text)) if text.trim().is_empty() => Ok(Decimal::ZERO),
        Some(value) => coerce_decimal(step, field, value)
    }
}

fn coerce_decimal(step: Step, field: &'static str, value: &Value) -> Result<Decimal, TransactionError> {
    let text = match value {
        Value::Number(number) => number.to_string(),
        Value::String(text) => text.trim().to_string(),
        other => return Err(TransactionError::not_numeric(step, field, other))
    };

    Decimal::from_str(&text)
        .or_else(|_| Decimal::from_scientific(&text))
        .map_err(|_| TransactionError::not_numeric(step, field, value))
}

fn deserialize_step<'de, D>(deserializer: D) -> Result<Step, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Value::deserialize(deserializer)?;

    let step = match &value {
        Value::Number(number) => number.as_u64().or_else(|| {
            number.as_f64()
                .filter(|float| *float >= 0.0 && float.fract() == 0.0 && *float < u64::MAX as f64)
                .map(|float| float as u64)
        }),
        Value::String(text) => text.trim().parse().ok(),
        _ => None
    };

    step.ok_or_else(|| de::Error::custom(format!("step [{value}] is not a non-negative integer")))
}
