//! In-process broker.
//!
//! Keeps a live queue and a dead-letter queue per destination and records
//! every call made against it. Failures can be injected to reproduce broker
//! errors at a precise point of a drain.

use std::collections::{HashMap, VecDeque};

use async_trait::async_trait;
use tracing::debug;

use super::batch::{BatchSink, SizedBatch, pack_and_send};
use super::{DeadLetterBroker, Message};
use crate::utils::{BoxError, ReceiveError, SendError};

/// Batch payload limit used when none is configured (256 KiB, the Service
/// Bus standard tier limit).
pub const DEFAULT_MAX_BATCH_BYTES: usize = 256 * 1024;

#[derive(Debug, Default)]
struct MemoryQueue {
    live: Vec<Message>,
    dead_letter: VecDeque<Message>,
}

/// Counters of the calls made against a [`MemoryBroker`].
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct CallLog {
    pub sends: usize,
    pub receives: usize,
    pub peeks: usize,
    /// Size of every broker-level batch transmitted, in order.
    pub transmitted_batches: Vec<usize>,
}

#[derive(Debug)]
pub struct MemoryBroker {
    queues: HashMap<String, MemoryQueue>,
    max_batch_bytes: usize,
    fail_send_on: Option<usize>,
    fail_complete_after: Option<usize>,
    calls: CallLog,
}

impl Default for MemoryBroker {
    fn default() -> Self {
        Self::new()
    }
}

impl MemoryBroker {
    pub fn new() -> Self {
        Self {
            queues: HashMap::new(),
            max_batch_bytes: DEFAULT_MAX_BATCH_BYTES,
            fail_send_on: None,
            fail_complete_after: None,
            calls: CallLog::default(),
        }
    }

    pub fn with_max_batch_bytes(mut self, max_batch_bytes: usize) -> Self {
        self.max_batch_bytes = max_batch_bytes;
        self
    }

    /// Makes the `call`-th `send_batch` (1-based) fail with a transmit error.
    pub fn fail_send_on(mut self, call: usize) -> Self {
        self.fail_send_on = Some(call);
        self
    }

    /// Makes completion fail once `completed` messages of a receive have
    /// been completed.
    pub fn fail_complete_after(mut self, completed: usize) -> Self {
        self.fail_complete_after = Some(completed);
        self
    }

    /// Appends messages to the dead-letter sub-queue of `queue`.
    pub fn dead_letter(&mut self, queue: &str, messages: impl IntoIterator<Item = Message>) {
        self.queues
            .entry(queue.to_string())
            .or_default()
            .dead_letter
            .extend(messages);
    }

    /// Messages delivered to the live `queue`, in send order.
    pub fn live(&self, queue: &str) -> &[Message] {
        self.queues
            .get(queue)
            .map(|q| q.live.as_slice())
            .unwrap_or_default()
    }

    pub fn dead_letter_len(&self, queue: &str) -> usize {
        self.queues.get(queue).map_or(0, |q| q.dead_letter.len())
    }

    pub fn calls(&self) -> &CallLog {
        &self.calls
    }

    fn transmit(&mut self, destination: &str, batch: Vec<Message>) {
        self.calls.transmitted_batches.push(batch.len());
        self.queues
            .entry(destination.to_string())
            .or_default()
            .live
            .extend(batch);
    }
}

struct MemorySink<'a> {
    broker: &'a mut MemoryBroker,
    destination: &'a str,
}

#[async_trait]
impl BatchSink for MemorySink<'_> {
    type Batch = SizedBatch;

    fn new_batch(&mut self) -> Result<SizedBatch, SendError> {
        Ok(SizedBatch::new(self.broker.max_batch_bytes))
    }

    async fn transmit(&mut self, batch: SizedBatch) -> Result<(), SendError> {
        self.broker.transmit(self.destination, batch.into_messages());
        Ok(())
    }
}

#[async_trait]
impl DeadLetterBroker for MemoryBroker {
    async fn send_batch(
        &mut self,
        destination: &str,
        messages: &[Message],
    ) -> Result<(), SendError> {
        self.calls.sends += 1;
        if self.fail_send_on == Some(self.calls.sends) {
            return Err(SendError::Transmit {
                destination: destination.to_string(),
                source: "injected send failure".into(),
            });
        }

        let mut sink = MemorySink {
            broker: self,
            destination,
        };
        pack_and_send(&mut sink, messages).await?;
        debug!("memory broker accepted {} messages for {}", messages.len(), destination);
        Ok(())
    }

    async fn receive_dead_letter(
        &mut self,
        destination: &str,
        max_count: usize,
    ) -> Result<Vec<Message>, ReceiveError> {
        self.calls.receives += 1;
        let fail_after = self.fail_complete_after;
        let queue = self.queues.entry(destination.to_string()).or_default();

        let mut received = Vec::new();
        while received.len() < max_count {
            let Some(next) = queue.dead_letter.front() else {
                break;
            };
            if fail_after == Some(received.len()) {
                return Err(ReceiveError::Complete {
                    id: next.id.clone(),
                    completed: received.len(),
                    source: "injected completion failure".into(),
                });
            }
            if let Some(message) = queue.dead_letter.pop_front() {
                received.push(message);
            }
        }
        Ok(received)
    }

    async fn peek_dead_letter(
        &mut self,
        destination: &str,
        max_count: usize,
    ) -> Result<Vec<Message>, ReceiveError> {
        self.calls.peeks += 1;
        Ok(self
            .queues
            .get(destination)
            .map(|q| q.dead_letter.iter().take(max_count).cloned().collect())
            .unwrap_or_default())
    }

    async fn close(self) -> Result<(), BoxError> {
        Ok(())
    }
}
