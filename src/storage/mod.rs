mod errors;
mod watermark_storage;

use async_trait::async_trait;

use crate::types::Watermark;

pub use errors::WatermarkError;
pub use watermark_storage::{WarehouseWatermarkStore, TIMESTAMP_COLUMN};

/// Durable home of the pipeline watermark.
#[async_trait]
pub trait WatermarkStore: Send + Sync {
    /// Returns the highest committed step, or [`Watermark::EPOCH`] when nothing was ever recorded.
    async fn read_watermark(&self) -> Result<Watermark, WatermarkError>;

    /// Records `candidate` if it is above the stored value. Returns whether a record was written.
    async fn advance_watermark(&self, candidate: Watermark) -> Result<bool, WatermarkError>;
}
