//! # dlq-resend
//!
//! `dlq-resend` drains the dead-letter sub-queue of an Azure Service Bus queue
//! or topic and resends the messages to the live entity, batch by batch, until
//! the dead-letter sub-queue comes back empty.
//!
//! ## Core Modules
//!
//! - `broker`: the broker adapter trait, the Service Bus implementation and an in-memory broker.
//! - `ids`: random message id generation, so resent messages pass duplicate detection.
//! - `drain`: the drain loop and the peek operation.
//! - `config`: layered settings from file, environment and flags.
//! - `cli`: command-line parsing and exit status mapping.
//! - `utils`: error types and logging setup.

pub mod broker;
pub mod cli;
pub mod config;
pub mod drain;
pub mod ids;
pub mod utils;
