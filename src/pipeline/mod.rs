mod coordinator;
mod dead_letter;
mod errors;
mod processor;
mod sink;

pub use coordinator::{CycleReport, CycleStage, PipelineCoordinator};
pub use dead_letter::DeadLetter;
pub use errors::PipelineError;
pub use processor::{BatchProcessor, ProcessedBatch};
pub use sink::{CommitResult, SinkWriter};
