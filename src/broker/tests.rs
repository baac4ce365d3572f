use async_trait::async_trait;

use super::batch::{BatchSink, OutgoingBatch, pack_and_send};
use super::{DeadLetterBroker, MemoryBroker, Message};
use crate::utils::{ReceiveError, SendError};

fn messages(n: usize) -> Vec<Message> {
    (0..n)
        .map(|i| Message::new(format!("msg-{i}"), format!("body-{i}")))
        .collect()
}

#[test]
fn test_message_preview_truncates() {
    let msg = Message::new("a", "hello world");
    assert_eq!(msg.preview(5), "hello...");
    assert_eq!(msg.preview(80), "hello world");
}

#[test]
fn test_message_preview_is_lossy_for_binary() {
    let msg = Message::new("a", vec![0xff, b'o', b'k']);
    assert_eq!(msg.preview(10), "\u{fffd}ok");
}

#[tokio::test]
async fn test_receive_removes_from_dead_letter() {
    let mut broker = MemoryBroker::new();
    broker.dead_letter("orders", messages(5));

    let received = broker.receive_dead_letter("orders", 3).await.unwrap();
    assert_eq!(received, messages(3));
    assert_eq!(broker.dead_letter_len("orders"), 2);

    let rest = broker.receive_dead_letter("orders", 200).await.unwrap();
    assert_eq!(rest.len(), 2);
    assert!(broker.receive_dead_letter("orders", 200).await.unwrap().is_empty());
}

#[tokio::test]
async fn test_peek_leaves_dead_letter_untouched() {
    let mut broker = MemoryBroker::new();
    broker.dead_letter("orders", messages(4));

    let peeked = broker.peek_dead_letter("orders", 2).await.unwrap();
    assert_eq!(peeked, messages(2));
    assert_eq!(broker.dead_letter_len("orders"), 4);
    assert_eq!(broker.calls().peeks, 1);
    assert_eq!(broker.calls().receives, 0);
}

#[tokio::test]
async fn test_peek_unknown_queue_is_empty() {
    let mut broker = MemoryBroker::new();
    assert!(broker.peek_dead_letter("nope", 10).await.unwrap().is_empty());
}

#[tokio::test]
async fn test_partial_completion_failure_loses_completed_prefix() {
    let mut broker = MemoryBroker::new().fail_complete_after(2);
    broker.dead_letter("orders", messages(5));

    let err = broker.receive_dead_letter("orders", 5).await.unwrap_err();
    match err {
        ReceiveError::Complete { id, completed, .. } => {
            assert_eq!(id, "msg-2");
            assert_eq!(completed, 2);
        }
        other => panic!("expected completion failure, got {other:?}"),
    }
    // The two completed messages are gone and were never handed back.
    assert_eq!(broker.dead_letter_len("orders"), 3);
    assert!(broker.live("orders").is_empty());
}

#[tokio::test]
async fn test_send_splits_into_broker_batches() {
    // Each message is 5 + 6 = 11 bytes; 25 bytes fit two per batch.
    let mut broker = MemoryBroker::new().with_max_batch_bytes(25);
    let batch = messages(5);

    broker.send_batch("orders", &batch).await.unwrap();
    assert_eq!(broker.calls().transmitted_batches, vec![2, 2, 1]);
    assert_eq!(broker.live("orders"), batch.as_slice());
}

#[tokio::test]
async fn test_send_rejects_message_larger_than_a_batch() {
    let mut broker = MemoryBroker::new().with_max_batch_bytes(8);
    let err = broker
        .send_batch("orders", &[Message::new("big", "0123456789")])
        .await
        .unwrap_err();
    assert!(matches!(err, SendError::MessageTooLarge { ref id, size: 13 } if id == "big"));
    assert!(broker.live("orders").is_empty());
}

#[tokio::test]
async fn test_injected_send_failure_hits_only_that_call() {
    let mut broker = MemoryBroker::new().fail_send_on(2);
    broker.send_batch("orders", &messages(1)).await.unwrap();
    let err = broker.send_batch("orders", &messages(1)).await.unwrap_err();
    assert!(matches!(err, SendError::Transmit { .. }));
    broker.send_batch("orders", &messages(1)).await.unwrap();
    assert_eq!(broker.live("orders").len(), 2);
    assert_eq!(broker.calls().sends, 3);
}

/// Batch that holds at most `capacity` messages and refuses any message
/// whose id starts with `huge`.
struct CountedBatch {
    capacity: usize,
    ids: Vec<String>,
}

impl OutgoingBatch for CountedBatch {
    fn try_add(&mut self, message: &Message) -> Result<bool, SendError> {
        if self.ids.len() == self.capacity || message.id.starts_with("huge") {
            return Ok(false);
        }
        self.ids.push(message.id.clone());
        Ok(true)
    }

    fn len(&self) -> usize {
        self.ids.len()
    }
}

#[derive(Default)]
struct RecordingSink {
    capacity: usize,
    created: usize,
    transmitted: Vec<Vec<String>>,
}

#[async_trait]
impl BatchSink for RecordingSink {
    type Batch = CountedBatch;

    fn new_batch(&mut self) -> Result<CountedBatch, SendError> {
        self.created += 1;
        Ok(CountedBatch {
            capacity: self.capacity,
            ids: Vec::new(),
        })
    }

    async fn transmit(&mut self, batch: CountedBatch) -> Result<(), SendError> {
        self.transmitted.push(batch.ids);
        Ok(())
    }
}

fn sink(capacity: usize) -> RecordingSink {
    RecordingSink {
        capacity,
        ..Default::default()
    }
}

#[tokio::test]
async fn test_pack_rolls_over_full_batches_in_order() {
    let mut sink = sink(3);
    pack_and_send(&mut sink, &messages(7)).await.unwrap();

    let sizes: Vec<usize> = sink.transmitted.iter().map(Vec::len).collect();
    assert_eq!(sizes, vec![3, 3, 1]);
    assert_eq!(sink.transmitted[1][0], "msg-3");
    assert_eq!(sink.transmitted[2][0], "msg-6");
}

#[tokio::test]
async fn test_pack_exact_fit_sends_no_empty_batch() {
    let mut sink = sink(2);
    pack_and_send(&mut sink, &messages(4)).await.unwrap();
    assert_eq!(sink.transmitted.len(), 2);
    assert!(sink.transmitted.iter().all(|b| b.len() == 2));
}

#[tokio::test]
async fn test_pack_nothing_to_send_transmits_nothing() {
    let mut sink = sink(2);
    pack_and_send(&mut sink, &[]).await.unwrap();
    assert!(sink.transmitted.is_empty());
}

#[tokio::test]
async fn test_pack_rejects_oversized_first_message() {
    let mut sink = sink(3);
    let err = pack_and_send(&mut sink, &[Message::new("huge-0", "x")])
        .await
        .unwrap_err();
    assert!(matches!(err, SendError::MessageTooLarge { ref id, size: 7 } if id == "huge-0"));
    assert!(sink.transmitted.is_empty());
}

#[tokio::test]
async fn test_pack_oversized_after_full_batch_keeps_earlier_batches() {
    let mut sink = sink(2);
    let mut batch = messages(2);
    batch.push(Message::new("huge-1", "x"));
    batch.push(Message::new("msg-9", "x"));

    let err = pack_and_send(&mut sink, &batch).await.unwrap_err();
    assert!(matches!(err, SendError::MessageTooLarge { ref id, .. } if id == "huge-1"));
    // The full batch went out before the retry on a fresh batch failed.
    assert_eq!(sink.transmitted, vec![vec!["msg-0".to_string(), "msg-1".to_string()]]);
    assert_eq!(sink.created, 2);
}
