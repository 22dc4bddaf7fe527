use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::collaborators::{AckHandle, QueueMessage};

/// A message that could not be turned into a scored transaction.
#[derive(Debug, Clone, Serialize)]
pub struct DeadLetter {
    #[serde(rename = "ack_id", serialize_with = "serialize_handle")]
    pub ack_handle: AckHandle,
    pub payload: String,
    pub reason: String,
    pub dead_lettered_at: DateTime<Utc>
}

impl DeadLetter {
    pub fn new(message: &QueueMessage, reason: impl ToString) -> Self {
        Self {
            ack_handle: message.ack_handle.clone(),
            payload: String::from_utf8_lossy(&message.data).into_owned(),
            reason: reason.to_string(),
            dead_lettered_at: Utc::now()
        }
    }
}

fn serialize_handle<S>(handle: &AckHandle, serializer: S) -> Result<S::Ok, S::Error>
where
    S: serde::Serializer,
{
    serializer.serialize_str(handle.as_str())
}
