use std::sync::Arc;

use tokio::time::{timeout_at, Instant};
use tracing::{debug, warn};

use crate::collaborators::{AckHandle, Queue, QueueError, QueueMessage};
use crate::models::{RawTransaction, ScoredTransaction};
use crate::pipeline::{DeadLetter, PipelineError};
use crate::rules::RuleEngine;
use crate::types::Watermark;

/// Scored output of one cycle, paired with the deliveries it consumed.
///
/// Owned by a single cycle. Nothing in it has been acknowledged yet.
#[derive(Debug, Clone)]
pub struct ProcessedBatch {
    /// Watermark read at the start of the cycle.
    pub initial_watermark: Watermark,
    /// Highest step covered once this batch is committed.
    pub candidate_watermark: Watermark,
    /// Newly seen transactions, in pull order.
    pub transactions: Vec<ScoredTransaction>,
    /// Deliveries skipped because their step was already committed.
    pub duplicates: usize,
    pub dead_letters: Vec<DeadLetter>,
    ack_handles: Vec<AckHandle>
}

impl ProcessedBatch {
    /// Handles of every pulled delivery: new, duplicate and dead-lettered alike.
    pub fn ack_handles(&self) -> &[AckHandle] {
        &self.ack_handles
    }

    pub fn pulled(&self) -> usize {
        self.ack_handles.len()
    }

    pub fn fraud_count(&self) -> usize {
        self.transactions.iter().filter(|scored| scored.detected_fraud).count()
    }
}

/// Pulls, filters and scores a bounded batch of queue messages.
pub struct BatchProcessor {
    queue: Arc<dyn Queue>,
    engine: RuleEngine,
    max_batch: usize
}

impl BatchProcessor {
    pub fn new(queue: Arc<dyn Queue>, engine: RuleEngine, max_batch: usize) -> Self {
        Self {
            queue,
            engine,
            max_batch
        }
    }

    /// Pulls up to `max_batch` messages without waiting for more to arrive.
    pub async fn pull(&self, deadline: Instant) -> Result<Vec<QueueMessage>, PipelineError> {
        let messages = timeout_at(deadline, self.queue.pull(self.max_batch)).await
            .unwrap_or(Err(QueueError::DeadlineExceeded))
            .map_err(PipelineError::PullFailed)?;

        debug!(pulled = messages.len(), max_batch = self.max_batch, "Pulled messages");

        Ok(messages)
    }

    /// Filters already-committed steps out of `messages` and scores the rest.
    ///
    /// Undecodable or unscorable messages are dead-lettered rather than failing
    /// the batch. Every message, whatever its fate, is kept for acknowledgement.
    pub fn process(&self, watermark: Watermark, messages: Vec<QueueMessage>) -> ProcessedBatch {
        let mut batch = ProcessedBatch {
            initial_watermark: watermark,
            candidate_watermark: watermark,
            transactions: Vec::with_capacity(messages.len()),
            duplicates: 0,
            dead_letters: Vec::new(),
            ack_handles: Vec::with_capacity(messages.len())
        };

        for message in messages {
            batch.ack_handles.push(message.ack_handle.clone());

            let raw = match RawTransaction::decode(&message.data) {
                Ok(raw) => raw,
                Err(error) => {
                    warn!("Dead-lettering delivery [{}]: {error}", message.ack_handle);
                    batch.dead_letters.push(DeadLetter::new(&message, error));
                    continue;
                }
            };

            if !watermark.admits(raw.step) {
                debug!("Skipping delivery [{}] at step [{}], already covered by watermark [{watermark}]", message.ack_handle, raw.step);
                batch.duplicates += 1;
                continue;
            }

            match self.engine.score(&raw) {
                Ok(scored) => {
                    batch.candidate_watermark = batch.candidate_watermark.include(scored.transaction.step);
                    batch.transactions.push(scored);
                }
                Err(error) => {
                    warn!("Dead-lettering delivery [{}]: {error}", message.ack_handle);
                    batch.dead_letters.push(DeadLetter::new(&message, error));
                }
            }
        }

        batch
    }

    /// Acknowledges every delivery in the batch. Returns the number acknowledged.
    pub async fn acknowledge(&self, batch: &ProcessedBatch, deadline: Instant) -> Result<usize, PipelineError> {
        let handles = batch.ack_handles();

        if handles.is_empty() {
            return Ok(0);
        }

        timeout_at(deadline, self.queue.acknowledge(handles)).await
            .unwrap_or(Err(QueueError::DeadlineExceeded))
            .map_err(|source| PipelineError::AcknowledgeFailed { messages: handles.len(), source })?;

        Ok(handles.len())
    }
}
