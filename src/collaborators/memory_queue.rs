use std::collections::VecDeque;
use std::sync::atomic::{AtomicU32, AtomicU64, Ordering};
use std::sync::{Mutex, PoisonError};

use async_trait::async_trait;
use dashmap::DashMap;
use tracing::debug;

use crate::collaborators::{AckHandle, Queue, QueueError, QueueMessage};

#[derive(Debug, Clone)]
struct StoredMessage {
    id: u64,
    data: Vec<u8>
}

/// At-least-once queue held in memory.
///
/// A pull leases messages until they are acknowledged. Leased messages go back
/// to the head of the queue, in publish order, on [`InMemoryQueue::redeliver_unacked`],
/// which stands in for an expired acknowledgement deadline.
pub struct InMemoryQueue {
    subscription: String,
    available: Mutex<VecDeque<StoredMessage>>,
    in_flight: DashMap<AckHandle, StoredMessage>,
    next_message_id: AtomicU64,
    next_delivery_id: AtomicU64,
    pull_failures: AtomicU32,
    ack_failures: AtomicU32
}

impl InMemoryQueue {
    pub fn new(subscription: impl Into<String>) -> Self {
        Self {
            subscription: subscription.into(),
            available: Mutex::new(VecDeque::new()),
            in_flight: DashMap::new(),
            next_message_id: AtomicU64::new(0),
            next_delivery_id: AtomicU64::new(0),
            pull_failures: AtomicU32::new(0),
            ack_failures: AtomicU32::new(0)
        }
    }

    /// Appends a message to the subscription and returns its message id.
    pub fn publish(&self, data: impl Into<Vec<u8>>) -> u64 {
        let id = self.next_message_id.fetch_add(1, Ordering::SeqCst);
        let message = StoredMessage { id, data: data.into() };

        self.available.lock().unwrap_or_else(PoisonError::into_inner).push_back(message);

        id
    }

    /// Returns every unacknowledged lease to the head of the queue. Returns the number redelivered.
    pub fn redeliver_unacked(&self) -> usize {
        let handles: Vec<AckHandle> = self.in_flight.iter().map(|entry| entry.key().clone()).collect();
        let mut leased: Vec<StoredMessage> = handles.iter()
            .filter_map(|handle| self.in_flight.remove(handle).map(|(_, message)| message))
            .collect();

        leased.sort_by_key(|message| message.id);

        let count = leased.len();
        let mut available = self.available.lock().unwrap_or_else(PoisonError::into_inner);

        for message in leased.into_iter().rev() {
            available.push_front(message);
        }

        count
    }

    pub fn pending_count(&self) -> usize {
        self.available.lock().unwrap_or_else(PoisonError::into_inner).len()
    }

    pub fn in_flight_count(&self) -> usize {
        self.in_flight.len()
    }

    /// Makes the next `count` pulls fail as if the service were unreachable.
    pub fn fail_next_pulls(&self, count: u32) {
        self.pull_failures.store(count, Ordering::SeqCst);
    }

    /// Makes the next `count` acknowledgements fail as if the service were unreachable.
    pub fn fail_next_acks(&self, count: u32) {
        self.ack_failures.store(count, Ordering::SeqCst);
    }

    fn unavailable(&self, reason: &str) -> QueueError {
        QueueError::Unavailable {
            subscription: self.subscription.clone(),
            reason: reason.to_string()
        }
    }
}

#[async_trait]
impl Queue for InMemoryQueue {
    async fn pull(&self, max_messages: usize) -> Result<Vec<QueueMessage>, QueueError> {
        if take_failure(&self.pull_failures) {
            return Err(self.unavailable("injected pull failure"));
        }

        let leased: Vec<StoredMessage> = {
            let mut available = self.available.lock().unwrap_or_else(PoisonError::into_inner);
            let count = max_messages.min(available.len());
            available.drain(..count).collect()
        };

        let messages = leased.into_iter().map(|message| {
            let delivery = self.next_delivery_id.fetch_add(1, Ordering::SeqCst);
            let ack_handle = AckHandle::new(format!("{}-{}", self.subscription, delivery));
            let data = message.data.clone();

            self.in_flight.insert(ack_handle.clone(), message);

            QueueMessage { ack_handle, data }
        })
        .collect();

        Ok(messages)
    }

    async fn acknowledge(&self, handles: &[AckHandle]) -> Result<(), QueueError> {
        if take_failure(&self.ack_failures) {
            return Err(self.unavailable("injected acknowledge failure"));
        }

        for handle in handles {
            //NOTE: Acknowledging an expired or unknown lease is a no-op, matching hosted queue services
            if self.in_flight.remove(handle).is_none() {
                debug!("Ignoring acknowledgement for unknown delivery [{handle}]");
            }
        }

        Ok(())
    }
}

fn take_failure(counter: &AtomicU32) -> bool {
    counter.fetch_update(Ordering::SeqCst, Ordering::SeqCst, |remaining| remaining.checked_sub(1)).is_ok()
}
