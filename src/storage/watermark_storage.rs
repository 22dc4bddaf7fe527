use std::sync::Arc;

use async_trait::async_trait;
use chrono::Utc;
use serde_json::{json, Value};
use tracing::{debug, info};

use crate::collaborators::{TableRef, Warehouse};
use crate::storage::{WatermarkError, WatermarkStore};
use crate::types::Watermark;

pub const TIMESTAMP_COLUMN: &str = "last_processed_timestamp";
const UPDATE_TIME_COLUMN: &str = "update_time";

/// Watermark kept as an append-only audit table in the warehouse.
///
/// Every advance appends a record and reads take the maximum over all records,
/// so duplicated or reordered writes can never lower the effective value.
pub struct WarehouseWatermarkStore {
    warehouse: Arc<dyn Warehouse>,
    table: TableRef
}

impl WarehouseWatermarkStore {
    pub fn new(warehouse: Arc<dyn Warehouse>, table: TableRef) -> Self {
        Self {
            warehouse,
            table
        }
    }

    fn parse_record(value: Value) -> Result<Watermark, WatermarkError> {
        if let Some(step) = value.as_u64() {
            return Ok(Watermark::new(step));
        }

        //NOTE: Warehouses commonly hand integer columns back as floats or strings
        let step = match &value {
            Value::Number(number) => number.as_f64()
                .filter(|float| float.fract() == 0.0 && *float >= 0.0 && *float <= u64::MAX as f64)
                .map(|float| float as u64),
            Value::String(text) => text.trim().parse::<u64>().ok(),
            _ => None
        };

        step.map(Watermark::new).ok_or(WatermarkError::InvalidRecord(value))
    }
}

#[async_trait]
impl WatermarkStore for WarehouseWatermarkStore {
    async fn read_watermark(&self) -> Result<Watermark, WatermarkError> {
        let maximum = self.warehouse.query_max(&self.table, TIMESTAMP_COLUMN).await?;

        let watermark = match maximum {
            Some(Value::Null) | None => Watermark::EPOCH,
            Some(value) => Self::parse_record(value)?
        };

        debug!(table = %self.table, %watermark, "Read watermark");

        Ok(watermark)
    }

    async fn advance_watermark(&self, candidate: Watermark) -> Result<bool, WatermarkError> {
        let current = self.read_watermark().await?;

        if candidate <= current {
            debug!(table = %self.table, %current, %candidate, "Watermark already at or past candidate");
            return Ok(false);
        }

        let record = json!({
            TIMESTAMP_COLUMN: candidate.step(),
            UPDATE_TIME_COLUMN: Utc::now().to_rfc3339()
        });

        let rejected = self.warehouse.insert_rows(&self.table, vec![record]).await?;

        if !rejected.is_empty() {
            return Err(WatermarkError::Rejected(rejected));
        }

        info!(table = %self.table, from = %current, to = %candidate, "Watermark advanced");

        Ok(true)
    }
}
