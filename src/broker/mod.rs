//! The `broker` module is the adapter between `dlq-resend` and the message
//! broker.
//!
//! [`DeadLetterBroker`] is the seam the drain loop is written against. Two
//! implementations exist:
//! - [`ServiceBusBroker`]: Azure Service Bus, authenticated with the default
//!   credential chain.
//! - [`MemoryBroker`]: an in-process broker with fault injection, used to
//!   exercise the drain loop without a network.
//!
//! Dead-lettered messages are completed as soon as they are received, before
//! they are resent. A failure between the two loses the completed messages
//! from this tool's point of view.

pub mod batch;
pub mod memory;
pub mod message;
pub mod servicebus;

use async_trait::async_trait;

use crate::utils::{BoxError, ReceiveError, SendError};

pub use memory::MemoryBroker;
pub use message::Message;
pub use servicebus::ServiceBusBroker;

/// Operations the drain loop needs from a broker client.
///
/// Each call acquires its own sender or receiver and releases it before
/// returning, whether it succeeds or not.
#[async_trait]
pub trait DeadLetterBroker: Send {
    /// Sends `messages` to the live `destination`, split into as many
    /// broker batches as the size limit requires.
    async fn send_batch(&mut self, destination: &str, messages: &[Message])
    -> Result<(), SendError>;

    /// Receives up to `max_count` messages from the dead-letter sub-queue of
    /// `destination`, completing each one before returning it.
    async fn receive_dead_letter(
        &mut self,
        destination: &str,
        max_count: usize,
    ) -> Result<Vec<Message>, ReceiveError>;

    /// Reads up to `max_count` messages from the dead-letter sub-queue
    /// without removing them.
    async fn peek_dead_letter(
        &mut self,
        destination: &str,
        max_count: usize,
    ) -> Result<Vec<Message>, ReceiveError>;

    /// Releases the underlying connection.
    async fn close(self) -> Result<(), BoxError>
    where
        Self: Sized;
}

#[cfg(test)]
mod tests;
