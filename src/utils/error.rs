//! The `error` module defines the error types used within `dlq-resend`.
//!
//! Every failure is terminal for the process. Errors carry enough context to
//! tell which broker operation failed, and the top level prints the whole
//! source chain with [`report`] before exiting with status 1.

use thiserror::Error;

/// Boxed error coming from the broker SDK, the credential chain or a test double.
pub type BoxError = Box<dyn std::error::Error + Send + Sync + 'static>;

/// Failures while building an authenticated broker client.
#[derive(Debug, Error)]
pub enum ConnectionError {
    #[error("unable to create credentials")]
    Credential(#[source] BoxError),

    #[error("unable to create Service Bus client for {namespace}")]
    Client {
        namespace: String,
        #[source]
        source: BoxError,
    },
}

/// Failures while resending a batch to the live destination.
#[derive(Debug, Error)]
pub enum SendError {
    #[error("unable to create sender for {destination}")]
    CreateSender {
        destination: String,
        #[source]
        source: BoxError,
    },

    #[error("unable to create message batch")]
    CreateBatch(#[source] BoxError),

    #[error("message {id} ({size} bytes) does not fit in an empty batch")]
    MessageTooLarge { id: String, size: usize },

    #[error("unable to send message batch to {destination}")]
    Transmit {
        destination: String,
        #[source]
        source: BoxError,
    },
}

/// Failures while reading from the dead-letter sub-queue.
#[derive(Debug, Error)]
pub enum ReceiveError {
    #[error("unable to create dead-letter receiver for {destination}")]
    CreateReceiver {
        destination: String,
        #[source]
        source: BoxError,
    },

    #[error("unable to receive dead-lettered messages")]
    Fetch(#[source] BoxError),

    /// Messages completed before this one are already gone from the
    /// dead-letter queue and are not handed back to the caller.
    #[error("unable to complete message {id} after {completed} completed in this batch")]
    Complete {
        id: String,
        completed: usize,
        #[source]
        source: BoxError,
    },

    #[error("unable to peek dead-lettered messages")]
    Peek(#[source] BoxError),
}

/// Failures while assembling [`Settings`](crate::config::Settings).
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("unable to load configuration")]
    Load(#[from] config::ConfigError),

    #[error("--namespace and --queue are required.")]
    MissingRequired,

    #[error("invalid value for {field}: {message}")]
    Invalid { field: &'static str, message: String },
}

/// Top-level error of a `dlq-resend` run.
#[derive(Debug, Error)]
pub enum Error {
    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error("unable to get Service Bus client")]
    Connection(#[from] ConnectionError),

    #[error("iteration {iteration}: unable to get dead-lettered messages")]
    Receive {
        iteration: usize,
        #[source]
        source: ReceiveError,
    },

    #[error("iteration {iteration}: unable to resend messages")]
    Send {
        iteration: usize,
        #[source]
        source: SendError,
    },

    #[error("unable to peek dead-lettered messages")]
    Peek(#[source] ReceiveError),
}

impl Error {
    /// Process exit status for this error. Every failure maps to 1.
    pub fn exit_code(&self) -> u8 {
        1
    }
}

/// Renders an error and all of its sources as `outer: inner: root`.
pub fn report(err: &(dyn std::error::Error + 'static)) -> String {
    let mut out = err.to_string();
    let mut source = err.source();
    while let Some(cause) = source {
        out.push_str(": ");
        out.push_str(&cause.to_string());
        source = cause.source();
    }
    out
}
