use thiserror::Error;

use crate::collaborators::{QueueError, WarehouseError};
use crate::storage::WatermarkError;
use crate::types::Watermark;

/// Failure of one pipeline cycle.
///
/// Each variant is raised before the side effects that follow its stage, so a
/// failed cycle never acknowledges messages or advances the watermark past what
/// was durably committed.
#[derive(Debug, Error)]
pub enum PipelineError {
    #[error("Watermark store unavailable: {0}")]
    StoreUnavailable(#[source] WatermarkError),
    #[error("Queue pull failed: {0}")]
    PullFailed(#[source] QueueError),
    #[error("Commit of [{rows}] rows failed: {source}")]
    CommitFailed {
        rows: usize,
        #[source]
        source: WarehouseError
    },
    #[error("Warehouse rejected [{rejected}] of [{rows}] rows: {first_error}")]
    PartialWriteFailed {
        rows: usize,
        rejected: usize,
        first_error: String
    },
    #[error("Row serialization failed: {0}")]
    Serialization(#[from] serde_json::Error),
    #[error("Watermark advance to [{candidate}] failed: {source}")]
    WatermarkWriteFailed {
        candidate: Watermark,
        #[source]
        source: WatermarkError
    },
    #[error("Acknowledgement of [{messages}] messages failed: {source}")]
    AcknowledgeFailed {
        messages: usize,
        #[source]
        source: QueueError
    }
}

impl PipelineError {
    /// Returns true when running the cycle again may succeed.
    pub fn is_retryable(&self) -> bool {
        !matches!(self, PipelineError::Serialization(_))
    }
}
