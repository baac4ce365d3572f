//! Local message representation.
//!
//! `Message` is what travels between the dead-letter receiver and the
//! sender. Only the two fields the resend needs are kept:
//! - `id`: the broker message id, used by duplicate detection. A received
//!   message without an id maps to an empty string.
//! - `body`: the raw payload, never interpreted.

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Message {
    pub id: String,
    pub body: Vec<u8>,
}

impl Message {
    pub fn new(id: impl Into<String>, body: impl Into<Vec<u8>>) -> Self {
        Self {
            id: id.into(),
            body: body.into(),
        }
    }

    /// Bytes the message contributes to a batch in the in-memory broker.
    pub fn size(&self) -> usize {
        self.id.len() + self.body.len()
    }

    /// Lossy UTF-8 rendering of the body, cut after `max_chars` characters.
    pub fn preview(&self, max_chars: usize) -> String {
        let text = String::from_utf8_lossy(&self.body);
        let mut chars = text.chars();
        let mut out: String = chars.by_ref().take(max_chars).collect();
        if chars.next().is_some() {
            out.push_str("...");
        }
        out
    }
}
