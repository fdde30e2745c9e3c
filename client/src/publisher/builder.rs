use super::Publisher;
use crate::batching::BatchSettings;
use crate::retry::RetryStrategy;
use crate::sequencer::BatchTemplate;
use crate::traits::PublishTransport;
use courier_std::errors::{CourierError, Result};
use std::sync::Arc;
use std::time::Duration;
use tokio::runtime::Handle;

/// Configures a [Publisher].
///
/// Created with [Publisher::builder].
pub struct PublisherBuilder {
    transport: Arc<dyn PublishTransport>,
    settings: BatchSettings,
    message_ordering: bool,
    retry: Option<RetryStrategy>,
    timeout: Option<Duration>,
    runtime: Option<Handle>,
}

impl PublisherBuilder {
    pub(crate) fn new(transport: Arc<dyn PublishTransport>) -> Self {
        Self {
            transport,
            settings: BatchSettings::default(),
            message_ordering: false,
            retry: None,
            timeout: None,
            runtime: None,
        }
    }

    /// Specifies the [BatchSettings] used to tune every batch the [Publisher] creates.
    pub fn with_batch_settings(mut self, settings: BatchSettings) -> Self {
        self.settings = settings;
        self
    }

    /// Enables publishing messages with an ordering key.
    ///
    /// Messages sharing an ordering key are sent one batch at a time, in publish order. If a
    /// batch for a key fails, every later message for that key fails too, and the key stays
    /// paused until [Publisher::resume_publish] is called.
    pub fn with_message_ordering(mut self, enabled: bool) -> Self {
        self.message_ordering = enabled;
        self
    }

    /// Specifies the retry policy passed to the transport on every commit.
    pub fn with_commit_retry(mut self, retry: impl Into<Option<RetryStrategy>>) -> Self {
        self.retry = retry.into();
        self
    }

    /// Specifies the timeout passed to the transport on every commit.
    pub fn with_commit_timeout(mut self, timeout: impl Into<Option<Duration>>) -> Self {
        self.timeout = timeout.into();
        self
    }

    /// Runs batch commits and the commit timer on `runtime`, allowing the [Publisher] to be used
    /// from threads outside of it.
    pub fn with_runtime(mut self, runtime: Handle) -> Self {
        self.runtime = Some(runtime);
        self
    }

    /// # Errors
    ///
    /// - Returns [CourierError::InvalidSettings] if the batch settings fail validation.
    /// - Returns [CourierError::NoRuntime] if no runtime was specified and this is called outside
    ///   of a tokio runtime.
    pub fn build(self) -> Result<Publisher> {
        self.settings.validate()?;

        let runtime = match self.runtime {
            Some(runtime) => runtime,
            None => Handle::try_current().map_err(|_| CourierError::NoRuntime)?,
        };

        let template = BatchTemplate {
            transport: self.transport,
            settings: self.settings,
            retry: self.retry,
            timeout: self.timeout,
            runtime,
        };

        Ok(Publisher::new(template, self.message_ordering))
    }
}
