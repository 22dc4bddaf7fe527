use super::{RawTransaction, RuleVerdict, ScoredTransaction, Transaction, TransactionError, TransactionType};

use std::str::FromStr;

use anyhow::Result;
use rust_decimal::Decimal;
use serde_json::json;

fn decode(payload: serde_json::Value) -> Result<RawTransaction> {
    Ok(RawTransaction::decode(payload.to_string().as_bytes())?)
}

#[test]
fn test_decode_accepts_numeric_and_string_steps() -> Result<()> {
    assert_eq!(decode(json!({ "step": 7 }))?.step, 7);
    assert_eq!(decode(json!({ "step": "8" }))?.step, 8);
    assert_eq!(decode(json!({ "step": 9.0 }))?.step, 9);

    Ok(())
}

#[test]
fn test_decode_rejects_missing_or_invalid_step() {
    assert!(matches!(RawTransaction::decode(br#"{"amount": 1}"#), Err(TransactionError::Payload(_))));
    assert!(matches!(RawTransaction::decode(br#"{"step": -1}"#), Err(TransactionError::Payload(_))));
    assert!(matches!(RawTransaction::decode(br#"{"step": 1.5}"#), Err(TransactionError::Payload(_))));
    assert!(matches!(RawTransaction::decode(br#"{"step": "soon"}"#), Err(TransactionError::Payload(_))));
}

#[test]
fn test_decode_rejects_non_json_payloads() {
    assert!(matches!(RawTransaction::decode(b"not json"), Err(TransactionError::Payload(_))));
    assert!(matches!(RawTransaction::decode(&[0xff, 0xfe]), Err(TransactionError::Payload(_))));
}

#[test]
fn test_decode_ignores_unknown_fields() -> Result<()> {
    let raw = decode(json!({ "step": 1, "isFraud": 0, "isFlaggedFraud": 0, "extra": { "nested": true } }))?;

    assert_eq!(raw.step, 1);

    Ok(())
}

#[test]
fn test_normalization_coerces_strings_and_numbers() -> Result<()> {
    let raw = decode(json!({
        "step": 1,
        "type": "TRANSFER",
        "amount": "181.00",
        "nameOrig": "C1305486145",
        "oldbalanceOrg": 181,
        "newbalanceOrig": "0",
        "nameDest": "C553264065",
        "oldbalanceDest": 1.5e3,
        "newbalanceDest": " 0.0 "
    }))?;

    let transaction = Transaction::try_from(&raw)?;

    assert_eq!(transaction.transaction_type, TransactionType::Transfer);
    assert_eq!(transaction.amount, Decimal::from_str("181")?);
    assert_eq!(transaction.old_balance_origin, Decimal::from(181));
    assert!(transaction.new_balance_origin.is_zero());
    assert_eq!(transaction.old_balance_destination, Decimal::from(1500));
    assert!(transaction.new_balance_destination.is_zero());
    assert_eq!(transaction.origin_account.as_deref(), Some("C1305486145"));

    Ok(())
}

#[test]
fn test_normalization_defaults_absent_balances_to_zero() -> Result<()> {
    let raw = decode(json!({ "step": 3, "type": "PAYMENT", "amount": 12.5, "oldbalanceDest": null, "newbalanceDest": "" }))?;
    let transaction = Transaction::try_from(&raw)?;

    assert!(transaction.old_balance_origin.is_zero());
    assert!(transaction.new_balance_origin.is_zero());
    assert!(transaction.old_balance_destination.is_zero());
    assert!(transaction.new_balance_destination.is_zero());

    Ok(())
}

#[test]
fn test_normalization_rejects_non_numeric_amount() -> Result<()> {
    let raw = decode(json!({ "step": 4, "type": "TRANSFER", "amount": "not_a_number" }))?;
    let result = Transaction::try_from(&raw);

    assert!(matches!(result, Err(TransactionError::NotNumeric { step: 4, field: "amount", .. })));

    Ok(())
}

#[test]
fn test_normalization_rejects_missing_amount_and_type() -> Result<()> {
    let missing_amount = decode(json!({ "step": 5, "type": "DEBIT" }))?;
    let missing_type = decode(json!({ "step": 6, "amount": 10 }))?;

    assert!(matches!(Transaction::try_from(&missing_amount), Err(TransactionError::MissingField { field: "amount", .. })));
    assert!(matches!(Transaction::try_from(&missing_type), Err(TransactionError::MissingField { field: "type", .. })));

    Ok(())
}

#[test]
fn test_normalization_rejects_unknown_type_and_negative_amount() -> Result<()> {
    let unknown = decode(json!({ "step": 7, "type": "REFUND", "amount": 10 }))?;
    let negative = decode(json!({ "step": 8, "type": "PAYMENT", "amount": "-1.00" }))?;

    assert!(matches!(Transaction::try_from(&unknown), Err(TransactionError::UnknownType { .. })));
    assert!(matches!(Transaction::try_from(&negative), Err(TransactionError::Negative { field: "amount", .. })));

    Ok(())
}

#[test]
fn test_normalization_rejects_non_numeric_balance() -> Result<()> {
    let raw = decode(json!({ "step": 9, "type": "CASH_OUT", "amount": 10, "oldbalanceOrg": true }))?;

    assert!(matches!(Transaction::try_from(&raw), Err(TransactionError::NotNumeric { field: "oldbalanceOrg", .. })));

    Ok(())
}

#[test]
fn test_transaction_type_parses_wire_names() -> Result<()> {
    for transaction_type in [TransactionType::Transfer, TransactionType::CashOut, TransactionType::Payment, TransactionType::Debit, TransactionType::CashIn] {
        assert_eq!(TransactionType::from_str(transaction_type.as_str()), Ok(transaction_type));
    }

    assert!(TransactionType::from_str("transfer").is_err());

    Ok(())
}

#[test]
fn test_scored_row_carries_wire_field_names_and_verdict() -> Result<()> {
    let raw = decode(json!({ "step": 10, "type": "CASH_IN", "amount": "5", "nameOrig": "C1", "nameDest": "M2" }))?;
    let verdict = RuleVerdict { balance_mismatch: true, ..RuleVerdict::default() };
    let scored = ScoredTransaction::new(Transaction::try_from(&raw)?, verdict);

    let row = serde_json::to_value(&scored)?;

    assert_eq!(row["step"], json!(10));
    assert_eq!(row["type"], json!("CASH_IN"));
    assert_eq!(row["amount"], json!("5"));
    assert_eq!(row["nameOrig"], json!("C1"));
    assert_eq!(row["oldbalanceOrg"], json!("0"));
    assert_eq!(row["detected_fraud"], json!(true));

    let restored: ScoredTransaction = serde_json::from_value(row)?;

    assert_eq!(restored.transaction, scored.transaction);
    assert!(restored.detected_fraud);

    Ok(())
}

#[test]
fn test_dedup_key_ignores_amounts() -> Result<()> {
    let first = Transaction::try_from(&decode(json!({ "step": 11, "type": "PAYMENT", "amount": 1, "nameOrig": "C1", "nameDest": "M1" }))?)?;
    let second = Transaction::try_from(&decode(json!({ "step": 11, "type": "PAYMENT", "amount": "1.00", "nameOrig": "C1", "nameDest": "M1" }))?)?;
    let other = Transaction::try_from(&decode(json!({ "step": 12, "type": "PAYMENT", "amount": 1, "nameOrig": "C1", "nameDest": "M1" }))?)?;

    assert_eq!(first.dedup_key(), second.dedup_key());
    assert_ne!(first.dedup_key(), other.dedup_key());

    Ok(())
}

#[test]
fn test_verdict_lists_every_fired_rule() {
    let verdict = RuleVerdict { high_value_transfer: true, balance_mismatch: true, ..RuleVerdict::default() };

    assert!(verdict.is_fraud());
    assert_eq!(verdict.fired_rules(), vec!["high_value_transfer", "balance_mismatch"]);
    assert!(!RuleVerdict::default().is_fraud());
}
