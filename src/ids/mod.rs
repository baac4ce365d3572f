//! Random message id generation.
//!
//! Resent messages get a fresh short alphanumeric id so that Service Bus
//! duplicate detection does not drop them as repeats of the original.
//! The random source is owned by the generator and can be swapped for a
//! seeded one.

use rand::Rng;
use rand::SeedableRng;
use rand::rngs::StdRng;

use crate::broker::Message;

/// The 62 symbols ids are drawn from.
pub const ALPHABET: &[u8; 62] = b"abcdefghijklmnopqrstuvwxyzABCDEFGHIJKLMNOPQRSTUVWXYZ0123456789";

pub const DEFAULT_ID_LENGTH: usize = 8;

#[derive(Debug, Clone)]
pub struct IdGenerator<R = StdRng> {
    rng: R,
    length: usize,
}

impl IdGenerator<StdRng> {
    /// Generator seeded from the operating system.
    pub fn from_entropy(length: usize) -> Self {
        Self::new(StdRng::from_entropy(), length)
    }

    /// Deterministic generator.
    pub fn seeded(seed: u64, length: usize) -> Self {
        Self::new(StdRng::seed_from_u64(seed), length)
    }
}

impl<R: Rng> IdGenerator<R> {
    /// A zero `length` is raised to 1 so that `regenerate` always terminates.
    pub fn new(rng: R, length: usize) -> Self {
        Self {
            rng,
            length: length.max(1),
        }
    }

    pub fn length(&self) -> usize {
        self.length
    }

    /// Draws `length` symbols uniformly from [`ALPHABET`].
    pub fn generate(&mut self, length: usize) -> String {
        (0..length)
            .map(|_| ALPHABET[self.rng.gen_range(0..ALPHABET.len())] as char)
            .collect()
    }

    /// Returns a fresh id that is never equal to `current`.
    pub fn regenerate(&mut self, current: &str) -> String {
        loop {
            let candidate = self.generate(self.length);
            if candidate != current {
                return candidate;
            }
        }
    }

    /// Replaces the id of every message in place.
    pub fn relabel(&mut self, messages: &mut [Message]) {
        for message in messages {
            message.id = self.regenerate(&message.id);
        }
    }
}
