use serde_json::Value;
use thiserror::Error;

use crate::collaborators::{InsertError, WarehouseError};

#[derive(Debug, Error)]
pub enum WatermarkError {
    #[error("Watermark store is unavailable: {0}")]
    Unavailable(#[from] WarehouseError),
    #[error("Watermark record was rejected: {}", describe_rejections(.0))]
    Rejected(Vec<InsertError>),
    #[error("Watermark record holds an invalid value [{0}]")]
    InvalidRecord(Value)
}

fn describe_rejections(errors: &[InsertError]) -> String {
    errors.iter()
        .map(|error| format!("row {}: {}", error.index, error.message))
        .collect::<Vec<_>>()
        .join("; ")
}
