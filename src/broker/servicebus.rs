//! Azure Service Bus adapter.
//!
//! Translates [`Message`] to and from the SDK message types and performs the
//! three broker operations over AMQP. Authentication uses the default Azure
//! credential chain (environment, managed identity, Azure CLI).
//!
//! Senders and receivers are opened per call and disposed before the call
//! returns. A dispose failure is logged and does not mask the outcome of the
//! operation itself.

use async_trait::async_trait;
use azservicebus::prelude::*;
use azservicebus::core::BasicRetryPolicy;
use azure_identity::{DefaultAzureCredential, TokenCredentialOptions};
use tracing::{info, warn};

use super::batch::{BatchSink, OutgoingBatch, pack_and_send};
use super::{DeadLetterBroker, Message};
use crate::utils::{BoxError, ConnectionError, ReceiveError, SendError};

pub struct ServiceBusBroker {
    namespace: String,
    client: ServiceBusClient<BasicRetryPolicy>,
}

impl std::fmt::Debug for ServiceBusBroker {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ServiceBusBroker")
            .field("namespace", &self.namespace)
            .field("client", &"azservicebus::ServiceBusClient")
            .finish()
    }
}

impl ServiceBusBroker {
    /// Builds a client for `namespace` (e.g. `myns.servicebus.windows.net`)
    /// using the default credential chain.
    pub async fn connect(namespace: String) -> Result<Self, ConnectionError> {
        let credential = DefaultAzureCredential::create(TokenCredentialOptions::default())
            .map_err(|e| ConnectionError::Credential(e.into()))?;

        let client = ServiceBusClient::new_from_credential(
            namespace.clone(),
            credential,
            ServiceBusClientOptions::default(),
        )
        .await
        .map_err(|e| ConnectionError::Client {
            namespace: namespace.clone(),
            source: e.into(),
        })?;

        info!("Connected to Service Bus namespace {}", namespace);
        Ok(Self { namespace, client })
    }

    async fn open_dead_letter_receiver(
        &mut self,
        destination: &str,
    ) -> Result<ServiceBusReceiver, ReceiveError> {
        let options = ServiceBusReceiverOptions {
            sub_queue: SubQueue::DeadLetter,
            ..Default::default()
        };
        self.client
            .create_receiver_for_queue(destination, options)
            .await
            .map_err(|e| ReceiveError::CreateReceiver {
                destination: destination.to_string(),
                source: e.into(),
            })
    }
}

fn to_service_bus_message(message: &Message) -> Result<ServiceBusMessage, SendError> {
    let mut out = ServiceBusMessage::new(message.body.clone());
    out.set_message_id(message.id.clone())
        .map_err(|e| SendError::CreateBatch(e.into()))?;
    Ok(out)
}

fn from_received(message: &ServiceBusReceivedMessage) -> Result<Message, BoxError> {
    let body = message.body()?.to_vec();
    let id = message
        .message_id()
        .map(|id| id.into_owned())
        .unwrap_or_default();
    Ok(Message { id, body })
}

fn from_peeked(message: &ServiceBusPeekedMessage) -> Result<Message, BoxError> {
    let body = message.body()?.to_vec();
    let id = message
        .message_id()
        .map(|id| id.into_owned())
        .unwrap_or_default();
    Ok(Message { id, body })
}

/// SDK batch plus the number of messages it accepted.
struct ServiceBusBatch {
    inner: ServiceBusMessageBatch,
    count: usize,
}

impl OutgoingBatch for ServiceBusBatch {
    fn try_add(&mut self, message: &Message) -> Result<bool, SendError> {
        let added = self
            .inner
            .try_add_message(to_service_bus_message(message)?)
            .is_ok();
        if added {
            self.count += 1;
        }
        Ok(added)
    }

    fn len(&self) -> usize {
        self.count
    }
}

struct SenderSink<'a> {
    sender: &'a mut ServiceBusSender,
    destination: &'a str,
}

#[async_trait]
impl BatchSink for SenderSink<'_> {
    type Batch = ServiceBusBatch;

    fn new_batch(&mut self) -> Result<ServiceBusBatch, SendError> {
        let inner = self
            .sender
            .create_message_batch(CreateMessageBatchOptions::default())
            .map_err(|e| SendError::CreateBatch(e.into()))?;
        Ok(ServiceBusBatch { inner, count: 0 })
    }

    async fn transmit(&mut self, batch: ServiceBusBatch) -> Result<(), SendError> {
        self.sender
            .send_message_batch(batch.inner)
            .await
            .map_err(|e| SendError::Transmit {
                destination: self.destination.to_string(),
                source: e.into(),
            })
    }
}

/// Waits at most the client's default try timeout (from the
/// `ServiceBusClientOptions` retry options) and returns an empty batch when
/// the dead-letter sub-queue has nothing to give.
async fn receive_and_complete(
    receiver: &mut ServiceBusReceiver,
    max_count: usize,
) -> Result<Vec<Message>, ReceiveError> {
    let max = u32::try_from(max_count).unwrap_or(u32::MAX);
    let received = receiver
        .receive_messages_with_max_wait_time(max, None)
        .await
        .map_err(|e| ReceiveError::Fetch(e.into()))?;

    let mut messages = Vec::with_capacity(received.len());
    for message in &received {
        let local = from_received(message).map_err(ReceiveError::Fetch)?;
        receiver
            .complete_message(message)
            .await
            .map_err(|e| ReceiveError::Complete {
                id: local.id.clone(),
                completed: messages.len(),
                source: e.into(),
            })?;
        messages.push(local);
    }
    Ok(messages)
}

async fn peek(
    receiver: &mut ServiceBusReceiver,
    max_count: usize,
) -> Result<Vec<Message>, ReceiveError> {
    let max = u32::try_from(max_count).unwrap_or(u32::MAX);
    let peeked = receiver
        .peek_messages(max, None)
        .await
        .map_err(|e| ReceiveError::Peek(e.into()))?;

    peeked
        .iter()
        .map(|m| from_peeked(m).map_err(ReceiveError::Peek))
        .collect()
}

#[async_trait]
impl DeadLetterBroker for ServiceBusBroker {
    async fn send_batch(
        &mut self,
        destination: &str,
        messages: &[Message],
    ) -> Result<(), SendError> {
        let mut sender = self
            .client
            .create_sender(destination, ServiceBusSenderOptions::default())
            .await
            .map_err(|e| SendError::CreateSender {
                destination: destination.to_string(),
                source: e.into(),
            })?;

        let mut sink = SenderSink {
            sender: &mut sender,
            destination,
        };
        let outcome = pack_and_send(&mut sink, messages).await;
        if let Err(e) = sender.dispose().await {
            warn!("Failed to close sender for {}: {}", destination, e);
        }
        outcome
    }

    async fn receive_dead_letter(
        &mut self,
        destination: &str,
        max_count: usize,
    ) -> Result<Vec<Message>, ReceiveError> {
        let mut receiver = self.open_dead_letter_receiver(destination).await?;
        let outcome = receive_and_complete(&mut receiver, max_count).await;
        if let Err(e) = receiver.dispose().await {
            warn!("Failed to close dead-letter receiver for {}: {}", destination, e);
        }
        outcome
    }

    async fn peek_dead_letter(
        &mut self,
        destination: &str,
        max_count: usize,
    ) -> Result<Vec<Message>, ReceiveError> {
        let mut receiver = self.open_dead_letter_receiver(destination).await?;
        let outcome = peek(&mut receiver, max_count).await;
        if let Err(e) = receiver.dispose().await {
            warn!("Failed to close dead-letter receiver for {}: {}", destination, e);
        }
        outcome
    }

    async fn close(self) -> Result<(), BoxError> {
        self.client.dispose().await?;
        Ok(())
    }
}
