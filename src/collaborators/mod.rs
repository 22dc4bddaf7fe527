//! Contracts for the services the pipeline talks to, plus in-memory stand-ins.
//!
//! The message queue and the warehouse are external systems. The pipeline only
//! sees them through [`Queue`] and [`Warehouse`] so that every suspension point
//! can be bounded by the cycle deadline and replaced in tests.

mod errors;
mod memory_queue;
mod memory_warehouse;

use std::fmt;
use std::fmt::{Display, Formatter};

use async_trait::async_trait;
use serde_json::Value;

pub use errors::{QueueError, WarehouseError};
pub use memory_queue::InMemoryQueue;
pub use memory_warehouse::{InMemoryWarehouse, InsertFault};

/// Opaque delivery handle used to acknowledge one delivery of a message.
#[derive(Debug, Clone, Eq, PartialEq, Hash)]
pub struct AckHandle(String);

impl AckHandle {
    pub fn new(value: impl Into<String>) -> Self {
        AckHandle(value.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Display for AckHandle {
    fn fmt(&self, formatter: &mut Formatter<'_>) -> fmt::Result {
        formatter.write_str(&self.0)
    }
}

/// One delivery pulled from the queue.
#[derive(Debug, Clone)]
pub struct QueueMessage {
    pub ack_handle: AckHandle,
    pub data: Vec<u8>
}

/// Pull/acknowledge contract of an at-least-once message queue subscription.
#[async_trait]
pub trait Queue: Send + Sync {
    /// Returns up to `max_messages` deliveries immediately, possibly none.
    async fn pull(&self, max_messages: usize) -> Result<Vec<QueueMessage>, QueueError>;

    /// Confirms the given deliveries so they are not redelivered.
    async fn acknowledge(&self, handles: &[AckHandle]) -> Result<(), QueueError>;
}

/// Fully qualified warehouse table, rendered as `project.dataset.table`.
#[derive(Debug, Clone, Eq, PartialEq, Hash)]
pub struct TableRef {
    pub project: String,
    pub dataset: String,
    pub table: String
}

impl TableRef {
    pub fn new(project: impl Into<String>, dataset: impl Into<String>, table: impl Into<String>) -> Self {
        Self {
            project: project.into(),
            dataset: dataset.into(),
            table: table.into()
        }
    }
}

impl Display for TableRef {
    fn fmt(&self, formatter: &mut Formatter<'_>) -> fmt::Result {
        write!(formatter, "{}.{}.{}", self.project, self.dataset, self.table)
    }
}

/// A row the warehouse refused during a streaming insert.
#[derive(Debug, Clone, PartialEq)]
pub struct InsertError {
    pub index: usize,
    pub message: String
}

/// Query/insert contract of an append-only analytical store.
#[async_trait]
pub trait Warehouse: Send + Sync {
    /// Returns `MAX(column)` over the table, or `None` when the table holds no values.
    async fn query_max(&self, table: &TableRef, column: &str) -> Result<Option<Value>, WarehouseError>;

    /// Streams rows into the table.
    ///
    /// `Ok` with a non-empty list means the insert partially failed: the listed
    /// rows were rejected and any others may have been stored.
    async fn insert_rows(&self, table: &TableRef, rows: Vec<Value>) -> Result<Vec<InsertError>, WarehouseError>;
}
