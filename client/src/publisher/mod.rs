//! The batch manager that publishing applications interact with.

mod builder;
mod commit_timer;

pub use builder::*;
pub(crate) use commit_timer::*;

use crate::handle::PublishHandle;
use crate::logging;
use crate::sequencer::{BatchTemplate, OrderedSequencer, Sequencer, SequencerKey, UnorderedSequencer};
use crate::traits::PublishTransport;
use crate::PubsubMessage;
use courier_std::errors::{CourierError, Result};
use parking_lot::Mutex;
use std::collections::HashMap;
use std::sync::Arc;

#[derive(Default)]
struct PublisherState {
    sequencers: HashMap<SequencerKey, Arc<dyn Sequencer>>,
    stopped: bool,
}

pub(crate) struct PublisherInner {
    template: BatchTemplate,
    message_ordering: bool,
    timer: Arc<CommitTimer>,
    state: Mutex<PublisherState>,
}

impl PublisherInner {
    fn sequencer(&self, state: &mut PublisherState, key: SequencerKey) -> Arc<dyn Sequencer> {
        if let Some(sequencer) = state.sequencers.get(&key) {
            return sequencer.clone();
        }

        let sequencer: Arc<dyn Sequencer> = if key.is_ordered() {
            OrderedSequencer::new(
                key.topic.as_str(),
                key.ordering_key.as_str(),
                self.template.clone(),
                self.timer.clone(),
            )
        } else {
            Arc::new(UnorderedSequencer::new(
                key.topic.as_str(),
                self.template.clone(),
            ))
        };

        state.sequencers.insert(key, sequencer.clone());
        sequencer
    }

    /// Commits every open batch once the batch latency has elapsed, then discards sequencers
    /// with nothing left to send.
    pub(crate) fn commit_elapsed(&self) {
        let mut state = self.state.lock();
        logging::publisher::commit_timer_fired(state.sequencers.len());

        for sequencer in state.sequencers.values() {
            sequencer.commit();
        }

        state.sequencers.retain(|_, sequencer| !sequencer.is_finished());
    }
}

/// Batches messages per topic and hands them to a [PublishTransport].
///
/// Publishing never waits on the network. Each call to [Publisher::publish] returns a
/// [PublishHandle] right away, which resolves once the batch carrying the message has been sent.
/// Batches are sent when they fill up, when the configured `max_latency` elapses, on
/// [Publisher::flush], or on [Publisher::stop].
///
/// A Publisher is cheap to clone, and all clones share the same batches.
///
/// # Examples
/// ```no_run
/// use anyhow::Result;
/// use courier::batching::BatchSettings;
/// use courier::traits::PublishTransport;
/// use courier::{Publisher, PubsubMessage};
///
/// async fn publish(transport: impl PublishTransport) -> Result<()> {
///     let publisher = Publisher::builder(transport)
///         .with_batch_settings(BatchSettings::high_throughput())
///         .with_message_ordering(true)
///         .build()?;
///
///     let message = PubsubMessage::new("Hello, world!").with_ordering_key("greetings");
///     let message_id = publisher.publish("projects/acme/topics/hello", message)?.await?;
///
///     println!("Published message {message_id}");
///     publisher.stop()?;
///
///     Ok(())
/// }
/// ```
#[derive(Clone)]
pub struct Publisher {
    inner: Arc<PublisherInner>,
}

impl Publisher {
    pub fn builder(transport: impl PublishTransport) -> PublisherBuilder {
        PublisherBuilder::new(Arc::new(transport))
    }

    pub(crate) fn new(template: BatchTemplate, message_ordering: bool) -> Self {
        let latency = template.settings.latency();
        let runtime = template.runtime.clone();

        let inner = Arc::new_cyclic(|me| PublisherInner {
            timer: CommitTimer::start(latency, &runtime, me.clone()),
            template,
            message_ordering,
            state: Mutex::default(),
        });

        Self { inner }
    }

    /// Adds a message to the open batch for `topic`, returning a handle to its outcome.
    ///
    /// # Errors
    ///
    /// - Returns [CourierError::PublisherStopped] once the publisher has been stopped.
    /// - Returns [CourierError::MessageOrderingDisabled] if the message carries an ordering key
    ///   while message ordering is not enabled.
    /// - Returns [CourierError::OrderingKeyPaused] if a prior batch for the message's ordering
    ///   key failed and the key has not been resumed.
    /// - Returns [CourierError::MessageTooLarge] if the message can never fit in a publish
    ///   request.
    pub fn publish(&self, topic: impl Into<String>, message: PubsubMessage) -> Result<PublishHandle> {
        if !message.ordering_key().is_empty() && !self.inner.message_ordering {
            return Err(CourierError::MessageOrderingDisabled);
        }

        let key = SequencerKey::new(topic, message.ordering_key());

        let handle = {
            let mut state = self.inner.state.lock();

            if state.stopped {
                return Err(CourierError::PublisherStopped);
            }

            self.inner.sequencer(&mut state, key).publish(message)?
        };

        self.inner.timer.arm();

        Ok(handle)
    }

    /// Allows publishing again for an ordering key that was paused after a failed publish.
    ///
    /// Resuming a key that has never been published to is a no-op.
    ///
    /// # Errors
    ///
    /// - Returns [CourierError::MessageOrderingDisabled] if message ordering is not enabled.
    /// - Returns [CourierError::SequencerNotPaused] if the key is not paused.
    pub fn resume_publish(&self, topic: &str, ordering_key: &str) -> Result<()> {
        if !self.inner.message_ordering {
            return Err(CourierError::MessageOrderingDisabled);
        }

        let key = SequencerKey::new(topic, ordering_key);
        let state = self.inner.state.lock();

        match state.sequencers.get(&key) {
            Some(sequencer) => sequencer.unpause(),
            None => Ok(()),
        }
    }

    /// Commits every open batch immediately, without waiting for `max_latency` to elapse.
    pub fn flush(&self) {
        let state = self.inner.state.lock();

        for sequencer in state.sequencers.values() {
            sequencer.commit();
        }
    }

    /// Commits every outstanding message and refuses any further publishes.
    ///
    /// Messages queued behind an in-flight batch for an ordering key are still sent, one batch
    /// at a time. Await their handles to know when they have been delivered.
    ///
    /// # Errors
    ///
    /// Returns [CourierError::PublisherStopped] if the publisher was already stopped.
    pub fn stop(&self) -> Result<()> {
        let mut state = self.inner.state.lock();

        if state.stopped {
            return Err(CourierError::PublisherStopped);
        }

        state.stopped = true;
        logging::publisher::stopping(state.sequencers.len());

        for sequencer in state.sequencers.values() {
            sequencer.stop();
        }

        self.inner.timer.cancel();

        Ok(())
    }

    pub fn is_stopped(&self) -> bool {
        self.inner.state.lock().stopped
    }

    pub fn message_ordering(&self) -> bool {
        self.inner.message_ordering
    }
}
