use crate::constants::{MAX_BYTES_DEFAULT, MAX_LATENCY_DEFAULT, MAX_MESSAGES_DEFAULT};
use courier_std::errors::SettingsError;
use serde::Deserialize;
use std::time::Duration;

/// Limits that decide when a batch is sealed and sent.
///
/// A batch is committed once it holds `max_messages` messages, once its request size reaches
/// `max_bytes`, or once `max_latency` has elapsed since the publisher's commit timer was armed,
/// whichever comes first.
///
/// Settings can be deserialized from configuration files, with every missing field falling back
/// to its default:
///
/// ```
/// # use courier::batching::BatchSettings;
/// let settings: BatchSettings = serde_json::from_str(r#"{ "max_messages": 500 }"#).unwrap();
/// assert_eq!(settings.message_limit(), 500);
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct BatchSettings {
    pub(crate) max_messages: usize,
    pub(crate) max_bytes: usize,
    #[serde(with = "millis")]
    pub(crate) max_latency: Duration,
}

impl Default for BatchSettings {
    fn default() -> Self {
        Self::new(MAX_MESSAGES_DEFAULT, MAX_BYTES_DEFAULT, MAX_LATENCY_DEFAULT)
    }
}

impl BatchSettings {
    pub fn new(max_messages: usize, max_bytes: usize, max_latency: Duration) -> Self {
        Self {
            max_messages,
            max_bytes,
            max_latency,
        }
    }

    pub fn high_throughput() -> Self {
        Self::new(1000, 5 * MAX_BYTES_DEFAULT, Duration::from_millis(100))
    }

    pub fn balanced() -> Self {
        Self::default()
    }

    pub fn minimal_payload() -> Self {
        Self::new(10, MAX_BYTES_DEFAULT, MAX_LATENCY_DEFAULT)
    }

    /// A `max_messages` of zero sends every message in a batch of its own.
    pub fn max_messages(mut self, max_messages: usize) -> Self {
        self.max_messages = max_messages;
        self
    }

    pub fn max_bytes(mut self, max_bytes: usize) -> Self {
        self.max_bytes = max_bytes;
        self
    }

    pub fn max_latency(mut self, max_latency: Duration) -> Self {
        self.max_latency = max_latency;
        self
    }

    pub fn message_limit(&self) -> usize {
        self.max_messages
    }

    pub fn byte_limit(&self) -> usize {
        self.max_bytes
    }

    pub fn latency(&self) -> Duration {
        self.max_latency
    }

    pub fn validate(&self) -> Result<(), SettingsError> {
        if self.max_bytes == 0 {
            return Err(SettingsError::ZeroMaxBytes);
        }

        Ok(())
    }
}

mod millis {
    use serde::{Deserialize, Deserializer};
    use std::time::Duration;

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Duration, D::Error> {
        u64::deserialize(deserializer).map(Duration::from_millis)
    }
}
