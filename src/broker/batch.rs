//! Packing messages into broker-level batches.
//!
//! A send hands a slice of messages to [`pack_and_send`], which fills a
//! batch until the broker refuses a message, transmits it, and starts a new
//! one. A message refused by an empty batch can never be sent and fails the
//! whole call with [`SendError::MessageTooLarge`]. Batches transmitted before
//! that point stay transmitted.

use async_trait::async_trait;
use tracing::debug;

use super::Message;
use crate::utils::SendError;

/// One broker batch being filled.
pub trait OutgoingBatch {
    /// Adds `message`. `Ok(false)` means the batch is full.
    fn try_add(&mut self, message: &Message) -> Result<bool, SendError>;

    fn len(&self) -> usize;

    fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Where batches come from and go to: a Service Bus sender or the
/// in-memory broker.
#[async_trait]
pub trait BatchSink: Send {
    type Batch: OutgoingBatch + Send;

    fn new_batch(&mut self) -> Result<Self::Batch, SendError>;

    async fn transmit(&mut self, batch: Self::Batch) -> Result<(), SendError>;
}

pub async fn pack_and_send<S: BatchSink>(
    sink: &mut S,
    messages: &[Message],
) -> Result<(), SendError> {
    let mut batch = sink.new_batch()?;

    for message in messages {
        if batch.try_add(message)? {
            continue;
        }
        if batch.is_empty() {
            return Err(too_large(message));
        }

        debug!("Batch full at {} messages, sending", batch.len());
        sink.transmit(batch).await?;
        batch = sink.new_batch()?;
        if !batch.try_add(message)? {
            return Err(too_large(message));
        }
    }

    if !batch.is_empty() {
        sink.transmit(batch).await?;
    }
    Ok(())
}

fn too_large(message: &Message) -> SendError {
    SendError::MessageTooLarge {
        id: message.id.clone(),
        size: message.size(),
    }
}

/// Batch bounded by a byte budget, where a message costs [`Message::size`].
#[derive(Debug)]
pub struct SizedBatch {
    max_bytes: usize,
    bytes: usize,
    messages: Vec<Message>,
}

impl SizedBatch {
    pub fn new(max_bytes: usize) -> Self {
        Self {
            max_bytes,
            bytes: 0,
            messages: Vec::new(),
        }
    }

    pub fn into_messages(self) -> Vec<Message> {
        self.messages
    }
}

impl OutgoingBatch for SizedBatch {
    fn try_add(&mut self, message: &Message) -> Result<bool, SendError> {
        let size = message.size();
        if self.bytes + size > self.max_bytes {
            return Ok(false);
        }
        self.bytes += size;
        self.messages.push(message.clone());
        Ok(true)
    }

    fn len(&self) -> usize {
        self.messages.len()
    }
}
