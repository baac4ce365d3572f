use serde::Deserialize;

use crate::ids::DEFAULT_ID_LENGTH;

/// Top-level configuration settings for a run.
///
/// Includes settings for both the broker connection and the drain loop.
#[derive(Debug, Deserialize, Clone, PartialEq, Eq)]
pub struct Settings {
    pub broker: BrokerSettings,
    pub drain: DrainSettings,
    pub log_level: String,
}

/// Where to drain from.
///
/// `namespace` is the Service Bus hostname and `queue` the queue or topic
/// whose dead-letter sub-queue is drained and whose live address receives
/// the resent messages.
#[derive(Debug, Deserialize, Clone, PartialEq, Eq)]
pub struct BrokerSettings {
    pub namespace: String,
    pub queue: String,
}

/// How to drain.
#[derive(Debug, Deserialize, Clone, PartialEq, Eq)]
pub struct DrainSettings {
    /// Messages requested per iteration. Service Bus caps this near 250.
    pub batch_size: usize,
    pub randomize_ids: bool,
    pub id_length: usize,
}

/// Partial configuration settings loaded from files, environment or flags.
///
/// Missing values are filled from `Settings::default()`.
#[derive(Debug, Deserialize, Default)]
pub struct PartialSettings {
    pub broker: Option<PartialBrokerSettings>,
    pub drain: Option<PartialDrainSettings>,
    pub log_level: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct PartialBrokerSettings {
    pub namespace: Option<String>,
    pub queue: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct PartialDrainSettings {
    pub batch_size: Option<usize>,
    pub randomize_ids: Option<bool>,
    pub id_length: Option<usize>,
}

/// Values given on the command line. They win over every other source.
#[derive(Debug, Default, Clone)]
pub struct Overrides {
    pub namespace: Option<String>,
    pub queue: Option<String>,
    pub batch_size: Option<usize>,
    pub disable_random_ids: bool,
    pub log_level: Option<String>,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            broker: BrokerSettings {
                namespace: String::new(),
                queue: String::new(),
            },
            drain: DrainSettings {
                batch_size: 200,
                randomize_ids: true,
                id_length: DEFAULT_ID_LENGTH,
            },
            log_level: "info".to_string(),
        }
    }
}
