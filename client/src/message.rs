use bytes::Bytes;
use std::collections::BTreeMap;

/// A single message to be published to a topic.
///
/// The payload is an opaque [Bytes] buffer, so cloning a message (which the batching engine does
/// when snapshotting a batch for the transport) never copies the payload itself.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PubsubMessage {
    data: Bytes,
    attributes: BTreeMap<String, String>,
    ordering_key: String,
}

impl PubsubMessage {
    pub fn new(data: impl Into<Bytes>) -> Self {
        Self {
            data: data.into(),
            ..Self::default()
        }
    }

    pub fn with_attribute(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.attributes.insert(key.into(), value.into());
        self
    }

    /// Messages sharing a non-empty ordering key are delivered in publish order, provided
    /// message ordering is enabled on the [Publisher](crate::Publisher).
    pub fn with_ordering_key(mut self, key: impl Into<String>) -> Self {
        self.ordering_key = key.into();
        self
    }

    pub fn data(&self) -> &Bytes {
        &self.data
    }

    pub fn attributes(&self) -> &BTreeMap<String, String> {
        &self.attributes
    }

    pub fn ordering_key(&self) -> &str {
        &self.ordering_key
    }
}

impl From<&'static str> for PubsubMessage {
    fn from(value: &'static str) -> Self {
        Self::new(value)
    }
}

impl From<Vec<u8>> for PubsubMessage {
    fn from(value: Vec<u8>) -> Self {
        Self::new(value)
    }
}
