use std::fmt;
use std::fmt::{Display, Formatter};
use std::sync::Arc;
use std::time::Duration;

use tokio::time::{timeout_at, Instant};
use tracing::{debug, error, info, warn};

use crate::collaborators::WarehouseError;
use crate::pipeline::{BatchProcessor, PipelineError, SinkWriter};
use crate::storage::{WatermarkError, WatermarkStore};
use crate::types::Watermark;

//NOTE: Thirty years, the same horizon tokio uses for timers that never fire
const FAR_FUTURE: Duration = Duration::from_secs(86_400 * 365 * 30);

/// Stage of the cycle currently executing.
#[derive(Debug, Clone, Copy, Eq, PartialEq)]
pub enum CycleStage {
    Idle,
    Pulling,
    Scoring,
    Committing,
    WatermarkAdvancing,
    Acknowledging,
    Failed
}

impl Display for CycleStage {
    fn fmt(&self, formatter: &mut Formatter<'_>) -> fmt::Result {
        let name = match self {
            CycleStage::Idle => "idle",
            CycleStage::Pulling => "pulling",
            CycleStage::Scoring => "scoring",
            CycleStage::Committing => "committing",
            CycleStage::WatermarkAdvancing => "watermark_advancing",
            CycleStage::Acknowledging => "acknowledging",
            CycleStage::Failed => "failed"
        };

        formatter.write_str(name)
    }
}

/// Summary of one successful cycle.
#[derive(Debug, Clone, Copy, Eq, PartialEq)]
pub struct CycleReport {
    pub pulled: usize,
    pub duplicates: usize,
    pub dead_lettered: usize,
    pub committed: usize,
    pub fraud_detected: usize,
    pub acknowledged: usize,
    /// Watermark in effect when the cycle finished.
    pub watermark: Watermark,
    pub watermark_advanced: bool
}

/// Runs pull, score, commit, advance and acknowledge as one cycle.
///
/// Cycles take `&mut self`, so a coordinator can only ever have one cycle in
/// flight for its watermark. Every suspension point shares a deadline computed
/// when the cycle starts.
///
/// Side effects are ordered commit, then watermark advance, then acknowledgement.
/// A failure at any stage leaves the later ones undone, so uncommitted messages
/// are always redelivered. A failed advance is remembered and re-attempted on
/// its own at the start of the next cycle instead of re-committing the batch.
pub struct PipelineCoordinator {
    store: Arc<dyn WatermarkStore>,
    processor: BatchProcessor,
    sink: SinkWriter,
    cycle_deadline: Duration,
    stage: CycleStage,
    pending_advance: Option<Watermark>
}

impl PipelineCoordinator {
    pub fn new(store: Arc<dyn WatermarkStore>, processor: BatchProcessor, sink: SinkWriter, cycle_deadline: Duration) -> Self {
        Self {
            store,
            processor,
            sink,
            cycle_deadline,
            stage: CycleStage::Idle,
            pending_advance: None
        }
    }

    /// Stage the coordinator is in, `Failed` after a cycle that did not complete.
    pub fn stage(&self) -> CycleStage {
        self.stage
    }

    /// Watermark whose advance failed after its batch was committed, if any.
    pub fn pending_advance(&self) -> Option<Watermark> {
        self.pending_advance
    }

    /// Runs one cycle. A failed cycle always returns an error.
    pub async fn run_cycle(&mut self) -> Result<CycleReport, PipelineError> {
        let deadline = cycle_deadline_from(Instant::now(), self.cycle_deadline);
        let result = self.execute(deadline).await;

        match &result {
            Ok(report) => {
                info!(
                    pulled = report.pulled,
                    duplicates = report.duplicates,
                    dead_lettered = report.dead_lettered,
                    committed = report.committed,
                    fraud_detected = report.fraud_detected,
                    watermark = %report.watermark,
                    advanced = report.watermark_advanced,
                    "Cycle completed"
                );
                self.transition(CycleStage::Idle);
            }
            Err(error) => {
                error!(stage = %self.stage, "Cycle failed: {error}");
                self.transition(CycleStage::Failed);
            }
        }

        result
    }

    async fn execute(&mut self, deadline: Instant) -> Result<CycleReport, PipelineError> {
        self.transition(CycleStage::Idle);
        self.retry_pending_advance(deadline).await?;

        self.transition(CycleStage::Pulling);

        let initial = timeout_at(deadline, self.store.read_watermark()).await
            .unwrap_or(Err(WatermarkError::Unavailable(WarehouseError::DeadlineExceeded)))
            .map_err(PipelineError::StoreUnavailable)?;

        let messages = self.processor.pull(deadline).await?;

        if messages.is_empty() {
            return Ok(CycleReport {
                pulled: 0,
                duplicates: 0,
                dead_lettered: 0,
                committed: 0,
                fraud_detected: 0,
                acknowledged: 0,
                watermark: initial,
                watermark_advanced: false
            });
        }

        self.transition(CycleStage::Scoring);
        let batch = self.processor.process(initial, messages);

        self.transition(CycleStage::Committing);
        let commit = self.sink.commit(&batch, deadline).await?;
        self.sink.persist_dead_letters(&batch, deadline).await;

        self.transition(CycleStage::WatermarkAdvancing);
        let watermark_advanced = self.advance(initial, batch.candidate_watermark, deadline).await?;

        self.transition(CycleStage::Acknowledging);
        let acknowledged = self.processor.acknowledge(&batch, deadline).await?;

        Ok(CycleReport {
            pulled: batch.pulled(),
            duplicates: batch.duplicates,
            dead_lettered: batch.dead_letters.len(),
            committed: commit.committed,
            fraud_detected: batch.fraud_count(),
            acknowledged,
            watermark: batch.candidate_watermark,
            watermark_advanced
        })
    }

    async fn advance(&mut self, initial: Watermark, candidate: Watermark, deadline: Instant) -> Result<bool, PipelineError> {
        if candidate <= initial {
            return Ok(false);
        }

        match self.write_watermark(candidate, deadline).await {
            Ok(written) => Ok(written),
            Err(source) => {
                //NOTE: The batch is committed at this point, only the advance is retried next cycle
                self.pending_advance = Some(candidate);
                Err(PipelineError::WatermarkWriteFailed { candidate, source })
            }
        }
    }

    async fn retry_pending_advance(&mut self, deadline: Instant) -> Result<(), PipelineError> {
        let Some(candidate) = self.pending_advance else {
            return Ok(())
        };

        self.transition(CycleStage::WatermarkAdvancing);
        warn!(%candidate, "Retrying watermark advance left over from a previous cycle");

        match self.write_watermark(candidate, deadline).await {
            Ok(_) => {
                self.pending_advance = None;
                Ok(())
            }
            Err(source) => Err(PipelineError::WatermarkWriteFailed { candidate, source })
        }
    }

    async fn write_watermark(&self, candidate: Watermark, deadline: Instant) -> Result<bool, WatermarkError> {
        timeout_at(deadline, self.store.advance_watermark(candidate)).await
            .unwrap_or(Err(WatermarkError::Unavailable(WarehouseError::DeadlineExceeded)))
    }

    fn transition(&mut self, stage: CycleStage) {
        if self.stage != stage {
            debug!(from = %self.stage, to = %stage, "Cycle stage transition");
            self.stage = stage;
        }
    }
}

/// Deadline `budget` after `start`, clamped to a far-future instant when the sum does not fit.
pub(crate) fn cycle_deadline_from(start: Instant, budget: Duration) -> Instant {
    start.checked_add(budget)
        .or_else(|| start.checked_add(FAR_FUTURE))
        .unwrap_or(start)
}
