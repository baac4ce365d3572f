//! Drain loop
//!
//! Repeatedly pulls a batch from the dead-letter sub-queue, relabels the
//! message ids and resends the batch to the live queue or topic, until a
//! receive comes back empty.
//!
//! Notes:
//! - The loop is strictly sequential: one broker call in flight at a time.
//! - Any receive or send failure stops the loop. Batches sent in earlier
//!   iterations stay sent; nothing is retried or rolled back.
//! - Messages are completed on receive, so a failed send loses the batch
//!   that was just received.

use rand::Rng;
use tracing::{debug, info};

use crate::broker::{DeadLetterBroker, Message};
use crate::config::Settings;
use crate::ids::IdGenerator;
use crate::utils::Error;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DrainOptions {
    pub queue: String,
    pub batch_size: usize,
    pub randomize_ids: bool,
}

impl From<&Settings> for DrainOptions {
    fn from(settings: &Settings) -> Self {
        Self {
            queue: settings.broker.queue.clone(),
            batch_size: settings.drain.batch_size,
            randomize_ids: settings.drain.randomize_ids,
        }
    }
}

/// Totals of a completed drain.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct DrainReport {
    /// Receive calls made, including the final empty one.
    pub iterations: usize,
    pub received: usize,
    pub sent: usize,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum DrainState {
    Draining,
    Done,
}

pub struct Drainer<'a, B, R> {
    broker: &'a mut B,
    ids: IdGenerator<R>,
    options: DrainOptions,
}

impl<'a, B, R> Drainer<'a, B, R>
where
    B: DeadLetterBroker,
    R: Rng + Send,
{
    pub fn new(broker: &'a mut B, ids: IdGenerator<R>, options: DrainOptions) -> Self {
        Self {
            broker,
            ids,
            options,
        }
    }

    /// Runs until the dead-letter sub-queue returns an empty batch.
    pub async fn run(&mut self) -> Result<DrainReport, Error> {
        let mut report = DrainReport::default();
        let mut state = DrainState::Draining;

        while state == DrainState::Draining {
            report.iterations += 1;
            let count = self.resend_batch(report.iterations).await?;
            if count == 0 {
                state = DrainState::Done;
            } else {
                report.received += count;
                report.sent += count;
            }
        }

        info!("Queue stopped responding with new messages. Exiting.");
        Ok(report)
    }

    /// One iteration: receive, relabel, resend. Returns the batch size.
    pub async fn resend_batch(&mut self, iteration: usize) -> Result<usize, Error> {
        let queue = self.options.queue.as_str();
        let requested = self.options.batch_size;

        info!("Requesting {} messages", requested);
        let mut messages = self
            .broker
            .receive_dead_letter(queue, requested)
            .await
            .map_err(|source| Error::Receive { iteration, source })?;
        info!("Received {}/{} messages", messages.len(), requested);

        if messages.is_empty() {
            return Ok(0);
        }

        if self.options.randomize_ids {
            self.ids.relabel(&mut messages);
            debug!("Assigned {} new message ids", messages.len());
        }

        self.broker
            .send_batch(queue, &messages)
            .await
            .map_err(|source| Error::Send { iteration, source })?;
        info!("Sent {} messages", messages.len());

        Ok(messages.len())
    }
}

/// Reads up to `max_count` dead-lettered messages without removing them.
pub async fn peek<B: DeadLetterBroker>(
    broker: &mut B,
    queue: &str,
    max_count: usize,
) -> Result<Vec<Message>, Error> {
    info!("Peeking {} messages", max_count);
    let messages = broker
        .peek_dead_letter(queue, max_count)
        .await
        .map_err(Error::Peek)?;
    info!("Peeked {}/{} messages", messages.len(), max_count);
    Ok(messages)
}
