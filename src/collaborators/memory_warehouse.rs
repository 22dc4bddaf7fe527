use std::sync::atomic::{AtomicU32, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use dashmap::DashMap;
use serde_json::Value;
use tokio::time::sleep;

use crate::collaborators::{InsertError, TableRef, Warehouse, WarehouseError};

/// Failure applied to every insert into a table until cleared.
#[derive(Debug, Clone, Copy, Eq, PartialEq)]
pub enum InsertFault {
    /// The insert call fails outright and stores nothing.
    Unavailable,
    /// Rows before the index are stored, every later row is rejected.
    RejectFrom(usize)
}

/// Append-only warehouse held in memory, one JSON row list per table.
pub struct InMemoryWarehouse {
    tables: DashMap<TableRef, Vec<Value>>,
    insert_faults: DashMap<TableRef, InsertFault>,
    query_failures: AtomicU32,
    latency: Option<Duration>
}

impl InMemoryWarehouse {
    pub fn new() -> Self {
        Self {
            tables: DashMap::new(),
            insert_faults: DashMap::new(),
            query_failures: AtomicU32::new(0),
            latency: None
        }
    }

    /// Delays every call, so cycle deadlines can expire mid-call.
    pub fn with_latency(mut self, latency: Duration) -> Self {
        self.latency = Some(latency);
        self
    }

    pub fn rows(&self, table: &TableRef) -> Vec<Value> {
        self.tables.get(table).map(|rows| rows.clone()).unwrap_or_default()
    }

    pub fn row_count(&self, table: &TableRef) -> usize {
        self.tables.get(table).map(|rows| rows.len()).unwrap_or(0)
    }

    pub fn inject_insert_fault(&self, table: &TableRef, fault: InsertFault) {
        self.insert_faults.insert(table.clone(), fault);
    }

    pub fn clear_insert_fault(&self, table: &TableRef) {
        self.insert_faults.remove(table);
    }

    /// Makes the next `count` queries fail as if the service were unreachable.
    pub fn fail_next_queries(&self, count: u32) {
        self.query_failures.store(count, Ordering::SeqCst);
    }

    async fn simulate_latency(&self) {
        if let Some(latency) = self.latency {
            sleep(latency).await;
        }
    }
}

impl Default for InMemoryWarehouse {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Warehouse for InMemoryWarehouse {
    async fn query_max(&self, table: &TableRef, column: &str) -> Result<Option<Value>, WarehouseError> {
        self.simulate_latency().await;

        let failed = self.query_failures
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |remaining| remaining.checked_sub(1))
            .is_ok();

        if failed {
            return Err(WarehouseError::Unavailable {
                table: table.clone(),
                reason: "injected query failure".to_string()
            });
        }

        let Some(rows) = self.tables.get(table) else {
            return Ok(None)
        };

        let maximum = rows.iter()
            .filter_map(|row| row.get(column))
            .filter_map(|value| numeric_value(value).map(|number| (number, value)))
            .max_by(|(left, _), (right, _)| left.total_cmp(right))
            .map(|(_, value)| value.clone());

        Ok(maximum)
    }

    async fn insert_rows(&self, table: &TableRef, rows: Vec<Value>) -> Result<Vec<InsertError>, WarehouseError> {
        self.simulate_latency().await;

        let fault = self.insert_faults.get(table).map(|fault| *fault);

        match fault {
            Some(InsertFault::Unavailable) => Err(WarehouseError::Unavailable {
                table: table.clone(),
                reason: "injected insert failure".to_string()
            }),
            Some(InsertFault::RejectFrom(accepted)) => {
                let accepted = accepted.min(rows.len());
                let rejected = (accepted..rows.len())
                    .map(|index| InsertError { index, message: "injected row rejection".to_string() })
                    .collect();

                self.tables.entry(table.clone()).or_default().extend(rows.into_iter().take(accepted));

                Ok(rejected)
            }
            None => {
                self.tables.entry(table.clone()).or_default().extend(rows);

                Ok(Vec::new())
            }
        }
    }
}

//NOTE: Numeric columns may be stored as strings, they still take part in MAX like numbers
fn numeric_value(value: &Value) -> Option<f64> {
    match value {
        Value::String(text) => text.trim().parse::<f64>().ok().filter(|number| number.is_finite()),
        _ => value.as_f64()
    }
}
