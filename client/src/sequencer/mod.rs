//! Routing of published messages into batches.
//!
//! A sequencer owns the open batches for one topic, or for one `(topic, ordering_key)` pair when
//! message ordering is enabled, and decides when a new batch has to be started.

mod ordered;
mod unordered;

pub(crate) use ordered::*;
pub(crate) use unordered::*;

use crate::batching::{Batch, BatchBuilder, BatchSettings};
use crate::handle::PublishHandle;
use crate::retry::RetryStrategy;
use crate::traits::PublishTransport;
use crate::PubsubMessage;
use courier_std::errors::Result;
use std::sync::Arc;
use std::time::Duration;
use tokio::runtime::Handle;

pub(crate) trait Sequencer: Send + Sync {
    /// Adds the message to the open batch, starting a new batch if the current one is sealed.
    fn publish(&self, message: PubsubMessage) -> Result<PublishHandle>;

    /// Commits whichever batch is due to be sent next.
    fn commit(&self);

    /// Commits any outstanding messages and refuses further publishes.
    fn stop(&self);

    /// Allows publishing again after a failed ordered publish.
    fn unpause(&self) -> Result<()>;

    /// Whether the sequencer holds nothing and can be discarded.
    fn is_finished(&self) -> bool;
}

/// Identifies the sequencer a message is routed to. The ordering key is empty for unordered
/// messages.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub(crate) struct SequencerKey {
    pub topic: String,
    pub ordering_key: String,
}

impl SequencerKey {
    pub fn new(topic: impl Into<String>, ordering_key: impl Into<String>) -> Self {
        Self {
            topic: topic.into(),
            ordering_key: ordering_key.into(),
        }
    }

    pub fn is_ordered(&self) -> bool {
        !self.ordering_key.is_empty()
    }
}

/// Configuration shared by every batch a publisher creates.
#[derive(Clone)]
pub(crate) struct BatchTemplate {
    pub transport: Arc<dyn PublishTransport>,
    pub settings: BatchSettings,
    pub retry: Option<RetryStrategy>,
    pub timeout: Option<Duration>,
    pub runtime: Handle,
}

impl BatchTemplate {
    pub fn builder(&self, topic: &str) -> BatchBuilder {
        Batch::builder(topic, self.transport.clone())
            .settings(self.settings.clone())
            .retry(self.retry.clone())
            .timeout(self.timeout)
            .runtime(self.runtime.clone())
    }
}
