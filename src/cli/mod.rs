//! Command-line front end.
//!
//! Parses flags, loads settings, connects to the broker and runs either the
//! drain loop or a one-shot peek. Every failure is reported on stderr and
//! mapped to exit status 1.

use std::ffi::OsString;
use std::future::Future;

use clap::error::ErrorKind;
use clap::{CommandFactory, Parser};
use tracing::{error, info, warn};

use crate::broker::{DeadLetterBroker, Message, ServiceBusBroker};
use crate::config::{self, Overrides, Settings};
use crate::drain::{self, DrainOptions, DrainReport, Drainer};
use crate::ids::IdGenerator;
use crate::utils::error::report;
use crate::utils::{ConfigError, ConnectionError, Error, logging};

/// Characters of body shown per message in peek mode.
const PREVIEW_CHARS: usize = 80;

/// Resend dead-lettered Service Bus messages to their original queue or topic.
#[derive(Debug, Parser)]
#[command(name = "dlq-resend")]
pub struct Cli {
    /// Service Bus hostname (e.g., myservicebus.servicebus.windows.net)
    #[arg(long)]
    pub namespace: Option<String>,

    /// Name of the queue or topic
    #[arg(long)]
    pub queue: Option<String>,

    /// Number of messages to process at a time (default 200, 250 seems to be the hard cap)
    #[arg(long = "batchsize")]
    pub batch_size: Option<usize>,

    /// Disable random IDs for new messages
    #[arg(long)]
    pub norand: bool,

    /// Only print the dead-lettered messages, without removing or resending them
    #[arg(long)]
    pub peek: bool,

    /// Log level (error, warn, info, debug, trace)
    #[arg(long = "log-level")]
    pub log_level: Option<String>,
}

impl Cli {
    pub fn overrides(&self) -> Overrides {
        Overrides {
            namespace: self.namespace.clone(),
            queue: self.queue.clone(),
            batch_size: self.batch_size,
            disable_random_ids: self.norand,
            log_level: self.log_level.clone(),
        }
    }
}

/// What a successful run did.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Outcome {
    Drained(DrainReport),
    Peeked(Vec<Message>),
}

/// Entry point used by the binary. Returns the process exit status.
pub async fn run<I, T>(args: I) -> u8
where
    I: IntoIterator<Item = T>,
    T: Into<OsString> + Clone,
{
    let cli = match Cli::try_parse_from(args) {
        Ok(cli) => cli,
        Err(e) => {
            let _ = e.print();
            return match e.kind() {
                ErrorKind::DisplayHelp | ErrorKind::DisplayVersion => 0,
                _ => 1,
            };
        }
    };

    match execute(&cli, config::load_config, ServiceBusBroker::connect).await {
        Ok(_) => 0,
        Err(e) => {
            fail(&e);
            e.exit_code()
        }
    }
}

/// Loads settings through `load`, connects through `connect` and runs the
/// requested mode. No broker call is made when settings are incomplete.
pub async fn execute<L, C, Fut, B>(cli: &Cli, load: L, connect: C) -> Result<Outcome, Error>
where
    L: FnOnce(&Overrides) -> Result<Settings, ConfigError>,
    C: FnOnce(String) -> Fut,
    Fut: Future<Output = Result<B, ConnectionError>>,
    B: DeadLetterBroker,
{
    let settings = load(&cli.overrides())?;
    logging::init(&settings.log_level);

    let mut broker = connect(settings.broker.namespace.clone()).await?;

    let outcome = if cli.peek {
        peek_and_print(&mut broker, &settings).await
    } else {
        let ids = IdGenerator::from_entropy(settings.drain.id_length);
        Drainer::new(&mut broker, ids, DrainOptions::from(&settings))
            .run()
            .await
            .map(Outcome::Drained)
    };

    if let Err(e) = broker.close().await {
        warn!("Failed to close Service Bus client: {}", e);
    }

    if let Ok(Outcome::Drained(report)) = &outcome {
        info!(
            "Drained {} messages in {} iterations",
            report.sent, report.iterations
        );
    }
    outcome
}

async fn peek_and_print<B: DeadLetterBroker>(
    broker: &mut B,
    settings: &Settings,
) -> Result<Outcome, Error> {
    let messages = drain::peek(broker, &settings.broker.queue, settings.drain.batch_size).await?;
    for message in &messages {
        println!(
            "{}\t{} bytes\t{}",
            message.id,
            message.body.len(),
            message.preview(PREVIEW_CHARS)
        );
    }
    Ok(Outcome::Peeked(messages))
}

/// The stderr text for a run that stopped before the broker was touched
/// because required flags were missing. `None` for every other failure.
fn usage_error(err: &Error) -> Option<String> {
    match err {
        Error::Config(ConfigError::MissingRequired) => Some(format!(
            "Error: {err}\n{}\n",
            Cli::command().render_usage()
        )),
        _ => None,
    }
}

fn fail(err: &Error) {
    if let Some(text) = usage_error(err) {
        eprint!("{text}");
        return;
    }
    // no-op when settings were loaded and logging is already set up
    logging::init("info");
    error!("{}", report(err));
}

#[cfg(test)]
mod tests;
