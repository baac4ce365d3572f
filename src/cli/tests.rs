use std::cell::Cell;

use clap::Parser;
use serial_test::serial;

use super::{Cli, Outcome, execute, run, usage_error};
use crate::broker::{MemoryBroker, Message};
use crate::config::{Overrides, Settings};
use crate::utils::{ConfigError, ConnectionError, Error, SendError};

fn parse(args: &[&str]) -> Cli {
    Cli::try_parse_from(std::iter::once("dlq-resend").chain(args.iter().copied())).unwrap()
}

/// Settings built from the flags alone, with the same required-field check
/// as the real loader.
fn flags_only(overrides: &Overrides) -> Result<Settings, ConfigError> {
    let mut settings = Settings::default();
    settings.broker.namespace = overrides.namespace.clone().unwrap_or_default();
    settings.broker.queue = overrides.queue.clone().unwrap_or_default();
    if let Some(n) = overrides.batch_size {
        settings.drain.batch_size = n;
    }
    if overrides.disable_random_ids {
        settings.drain.randomize_ids = false;
    }
    if settings.broker.namespace.is_empty() || settings.broker.queue.is_empty() {
        return Err(ConfigError::MissingRequired);
    }
    Ok(settings)
}

fn broker_with(n: usize) -> MemoryBroker {
    let mut broker = MemoryBroker::new();
    broker.dead_letter(
        "orders",
        (0..n).map(|i| Message::new(format!("orig-{i}"), vec![i as u8])),
    );
    broker
}

#[test]
fn test_flags_map_to_overrides() {
    let cli = parse(&[
        "--namespace",
        "ns.servicebus.windows.net",
        "--queue",
        "orders",
        "--batchsize",
        "50",
        "--norand",
    ]);
    let overrides = cli.overrides();
    assert_eq!(overrides.namespace.as_deref(), Some("ns.servicebus.windows.net"));
    assert_eq!(overrides.queue.as_deref(), Some("orders"));
    assert_eq!(overrides.batch_size, Some(50));
    assert!(overrides.disable_random_ids);
    assert!(!cli.peek);
}

#[test]
fn test_rejects_non_numeric_batch_size() {
    assert!(Cli::try_parse_from(["dlq-resend", "--batchsize", "lots"]).is_err());
}

#[tokio::test]
async fn test_missing_namespace_makes_no_broker_call() {
    let cli = parse(&["--queue", "orders"]);
    let connects = Cell::new(0);

    let err = execute(&cli, flags_only, |_ns: String| {
        connects.set(connects.get() + 1);
        async { Ok::<_, ConnectionError>(MemoryBroker::new()) }
    })
    .await
    .unwrap_err();

    assert!(matches!(err, Error::Config(ConfigError::MissingRequired)));
    assert_eq!(err.exit_code(), 1);
    assert_eq!(connects.get(), 0);
}

#[tokio::test]
async fn test_connection_failure_is_fatal() {
    let cli = parse(&["--namespace", "ns", "--queue", "orders"]);

    let err = execute(&cli, flags_only, |ns: String| async move {
        Err::<MemoryBroker, _>(ConnectionError::Client {
            namespace: ns,
            source: "no credentials".into(),
        })
    })
    .await
    .unwrap_err();

    assert!(matches!(err, Error::Connection(ConnectionError::Client { .. })));
}

#[tokio::test]
async fn test_drain_through_the_front_end() {
    let cli = parse(&["--namespace", "ns", "--queue", "orders"]);
    let seen = Cell::new(None);

    let outcome = execute(&cli, flags_only, |ns: String| {
        seen.set(Some(ns));
        async { Ok::<_, ConnectionError>(broker_with(3)) }
    })
    .await
    .unwrap();

    assert_eq!(seen.take().as_deref(), Some("ns"));
    match outcome {
        Outcome::Drained(report) => {
            assert_eq!(report.sent, 3);
            assert_eq!(report.iterations, 2);
        }
        other => panic!("expected a drain, got {other:?}"),
    }
}

#[tokio::test]
async fn test_peek_through_the_front_end() {
    let cli = parse(&["--namespace", "ns", "--queue", "orders", "--peek", "--batchsize", "2"]);

    let outcome = execute(&cli, flags_only, |_ns: String| async {
        Ok::<_, ConnectionError>(broker_with(3))
    })
    .await
    .unwrap();

    match outcome {
        Outcome::Peeked(messages) => {
            assert_eq!(messages.len(), 2);
            assert_eq!(messages[0].id, "orig-0");
        }
        other => panic!("expected a peek, got {other:?}"),
    }
}

#[tokio::test]
async fn test_help_exits_zero() {
    assert_eq!(run(["dlq-resend", "--help"]).await, 0);
}

#[tokio::test]
async fn test_bad_flag_exits_one() {
    assert_eq!(run(["dlq-resend", "--batchsize", "lots"]).await, 1);
}

#[tokio::test]
#[serial]
async fn test_missing_namespace_exits_one() {
    let code = temp_env::async_with_vars(
        [
            ("DLQ__BROKER__NAMESPACE", None::<&str>),
            ("DLQ__BROKER__QUEUE", None),
        ],
        run(["dlq-resend", "--queue", "orders"]),
    )
    .await;
    assert_eq!(code, 1);
}

#[test]
fn test_missing_required_prints_usage() {
    let text = usage_error(&Error::Config(ConfigError::MissingRequired)).unwrap();
    assert!(text.starts_with("Error: --namespace and --queue are required.\n"));
    assert!(text.contains("Usage: dlq-resend"));
    assert!(text.contains("[OPTIONS]"));
}

#[test]
fn test_other_failures_print_no_usage() {
    let err = Error::Send {
        iteration: 2,
        source: SendError::CreateBatch("boom".into()),
    };
    assert!(usage_error(&err).is_none());
    assert!(usage_error(&Error::Config(ConfigError::Invalid {
        field: "batch_size",
        message: "must be at least 1".to_string(),
    }))
    .is_none());
}
