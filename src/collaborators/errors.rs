use thiserror::Error;

use crate::collaborators::TableRef;

#[derive(Debug, Error)]
pub enum QueueError {
    #[error("Queue subscription [{subscription}] is unavailable: {reason}")]
    Unavailable {
        subscription: String,
        reason: String
    },
    #[error("Queue call did not complete before the cycle deadline")]
    DeadlineExceeded
}

#[derive(Debug, Error)]
pub enum WarehouseError {
    #[error("Warehouse table [{table}] is unavailable: {reason}")]
    Unavailable {
        table: TableRef,
        reason: String
    },
    #[error("Warehouse call did not complete before the cycle deadline")]
    DeadlineExceeded
}
