use std::sync::Arc;

use serde_json::Value;
use tokio::time::{timeout_at, Instant};
use tracing::{error, info};

use crate::collaborators::{TableRef, Warehouse, WarehouseError};
use crate::pipeline::{PipelineError, ProcessedBatch};

#[derive(Debug, Clone, Copy, Eq, PartialEq)]
pub struct CommitResult {
    pub committed: usize
}

/// Writes scored batches to the warehouse fact table.
///
/// A batch is written as one insert. Anything short of every row being accepted
/// fails the whole batch, since the watermark must never move past rows that are
/// not stored. Rows are append-only: a batch re-committed after a crash or a
/// failed acknowledgement produces duplicate rows that readers collapse by
/// [`DedupKey`](crate::models::DedupKey).
pub struct SinkWriter {
    warehouse: Arc<dyn Warehouse>,
    table: TableRef,
    dead_letter_table: Option<TableRef>
}

impl SinkWriter {
    pub fn new(warehouse: Arc<dyn Warehouse>, table: TableRef) -> Self {
        Self {
            warehouse,
            table,
            dead_letter_table: None
        }
    }

    pub fn with_dead_letter_table(mut self, table: Option<TableRef>) -> Self {
        self.dead_letter_table = table;
        self
    }

    /// Inserts every scored transaction of the batch.
    ///
    /// # Errors
    /// - `CommitFailed` when the warehouse call fails or does not finish before the deadline.
    /// - `PartialWriteFailed` when the warehouse rejects any row.
    pub async fn commit(&self, batch: &ProcessedBatch, deadline: Instant) -> Result<CommitResult, PipelineError> {
        if batch.transactions.is_empty() {
            return Ok(CommitResult { committed: 0 });
        }

        let rows = batch.transactions.iter()
            .map(serde_json::to_value)
            .collect::<Result<Vec<Value>, _>>()?;
        let count = rows.len();

        let rejected = timeout_at(deadline, self.warehouse.insert_rows(&self.table, rows)).await
            .unwrap_or(Err(WarehouseError::DeadlineExceeded))
            .map_err(|source| PipelineError::CommitFailed { rows: count, source })?;

        if let Some(first) = rejected.first() {
            return Err(PipelineError::PartialWriteFailed {
                rows: count,
                rejected: rejected.len(),
                first_error: format!("row {}: {}", first.index, first.message)
            });
        }

        info!(table = %self.table, committed = count, fraud_detected = batch.fraud_count(), "Batch committed");

        Ok(CommitResult { committed: count })
    }

    /// Stores the batch's dead letters when a dead-letter table is configured.
    ///
    /// Dead letters are acknowledged with the rest of the batch either way, so a
    /// failure here is logged and never fails the cycle.
    pub async fn persist_dead_letters(&self, batch: &ProcessedBatch, deadline: Instant) -> usize {
        let Some(table) = &self.dead_letter_table else {
            return 0
        };

        if batch.dead_letters.is_empty() {
            return 0;
        }

        let rows = match batch.dead_letters.iter().map(serde_json::to_value).collect::<Result<Vec<Value>, _>>() {
            Ok(rows) => rows,
            Err(error) => {
                error!(table = %table, "Failed to serialize dead letters: {error}");
                return 0;
            }
        };
        let count = rows.len();

        match timeout_at(deadline, self.warehouse.insert_rows(table, rows)).await {
            Ok(Ok(rejected)) if rejected.is_empty() => {
                info!(table = %table, dead_letters = count, "Persisted dead letters");
                count
            }
            Ok(Ok(rejected)) => {
                error!(table = %table, dead_letters = count, rejected = rejected.len(), "Dead-letter table rejected rows");
                count.saturating_sub(rejected.len())
            }
            Ok(Err(error)) => {
                error!(table = %table, dead_letters = count, "Failed to persist dead letters: {error}");
                0
            }
            Err(_) => {
                error!(table = %table, dead_letters = count, "Dead-letter persistence did not finish before the cycle deadline");
                0
            }
        }
    }
}
