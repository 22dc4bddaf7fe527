use std::time::Duration;

use envconfig::Envconfig;
use thiserror::Error;

use crate::collaborators::TableRef;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("MAX_BATCH must be at least 1")]
    EmptyBatch,
    #[error("CYCLE_DEADLINE_SECS must be at least 1")]
    ZeroDeadline,
    #[error("CYCLE_INTERVAL_SECS must be at least 1")]
    ZeroInterval
}

/// Pipeline settings, read once at startup and handed to each component.
#[derive(Envconfig, Debug, Clone)]
pub struct PipelineConfig {
    #[envconfig(from = "PROJECT_ID", default = "fraud-detection")]
    pub project_id: String,

    #[envconfig(from = "DATASET_ID", default = "transactions")]
    pub dataset_id: String,

    #[envconfig(from = "TABLE_ID", default = "scored_transactions")]
    pub table_id: String,

    #[envconfig(from = "WATERMARK_TABLE", default = "watermark_table")]
    pub watermark_table: String,

    // Unset disables dead-letter persistence, dead letters are then only logged.
    #[envconfig(from = "DEAD_LETTER_TABLE")]
    pub dead_letter_table: Option<String>,

    #[envconfig(from = "SUBSCRIPTION", default = "transactions-fraud-scoring")]
    pub subscription: String,

    #[envconfig(from = "MAX_BATCH", default = "100")]
    pub max_batch: usize,

    #[envconfig(from = "CYCLE_INTERVAL_SECS", default = "300")]
    pub cycle_interval_secs: u64,

    #[envconfig(from = "CYCLE_DEADLINE_SECS", default = "60")]
    pub cycle_deadline_secs: u64,

    #[envconfig(from = "CYCLE_RETRIES", default = "1")]
    pub cycle_retries: u32,

    #[envconfig(from = "RETRY_DELAY_SECS", default = "300")]
    pub retry_delay_secs: u64
}

impl PipelineConfig {
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.max_batch == 0 {
            return Err(ConfigError::EmptyBatch);
        }

        if self.cycle_deadline_secs == 0 {
            return Err(ConfigError::ZeroDeadline);
        }

        if self.cycle_interval_secs == 0 {
            return Err(ConfigError::ZeroInterval);
        }

        Ok(())
    }

    pub fn target_table(&self) -> TableRef {
        self.table(&self.table_id)
    }

    pub fn watermark_table(&self) -> TableRef {
        self.table(&self.watermark_table)
    }

    pub fn dead_letter_table(&self) -> Option<TableRef> {
        self.dead_letter_table.as_deref().map(|table| self.table(table))
    }

    pub fn cycle_interval(&self) -> Duration {
        Duration::from_secs(self.cycle_interval_secs)
    }

    pub fn cycle_deadline(&self) -> Duration {
        Duration::from_secs(self.cycle_deadline_secs)
    }

    pub fn retry_delay(&self) -> Duration {
        Duration::from_secs(self.retry_delay_secs)
    }

    fn table(&self, table: &str) -> TableRef {
        TableRef::new(&self.project_id, &self.dataset_id, table)
    }
}
