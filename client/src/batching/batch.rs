use super::{BatchSettings, BatchStatus};
use crate::constants::SERVER_PUBLISH_MAX_BYTES;
use crate::handle::{publish_handle, HandleResolver, PublishHandle, PublishResult};
use crate::logging;
use crate::retry::RetryStrategy;
use crate::size;
use crate::traits::PublishTransport;
use crate::PubsubMessage;
use courier_std::errors::{
    CancellationReason, CourierError, PublishError, Result, TransportError,
};
use parking_lot::Mutex;
use std::fmt;
use std::panic::{self, AssertUnwindSafe};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::runtime::Handle;
use tokio::sync::watch;
use tracing::{Instrument, Span};

/// Invoked once a batch has been sent, with `true` only if every message received an ID.
pub type BatchDoneCallback = Box<dyn FnOnce(bool) + Send + 'static>;

/// The outcome of offering a message to a [Batch].
#[derive(Debug)]
pub enum Admission {
    /// The message joined the batch and will be resolved through the returned handle.
    Accepted(PublishHandle),
    /// The batch can no longer take this message. It is handed back so it can be published to
    /// a fresh batch.
    Rejected(PubsubMessage),
}

impl Admission {
    pub fn is_accepted(&self) -> bool {
        matches!(self, Self::Accepted(_))
    }

    pub fn handle(self) -> Option<PublishHandle> {
        match self {
            Self::Accepted(handle) => Some(handle),
            Self::Rejected(_) => None,
        }
    }
}

struct MessageWrapper {
    message: PubsubMessage,
    resolver: HandleResolver,
    /// Closed as soon as the handle resolves.
    span: Option<Span>,
}

impl MessageWrapper {
    fn resolve(&mut self, outcome: PublishResult) -> bool {
        if let Some(span) = self.span.take() {
            match &outcome {
                Ok(message_id) => logging::batch::span_published(&span, message_id),
                Err(err) => logging::batch::span_failed(&span, err),
            }
        }

        self.resolver.resolve(outcome)
    }
}

struct BatchState {
    status: BatchStatus,
    wrappers: Vec<MessageWrapper>,
    size: usize,
}

/// An accumulating group of messages bound for one topic.
///
/// A batch admits messages until it is sealed, either because it filled up, because it was
/// committed explicitly, or because it was cancelled. Committing hands the messages to the
/// [PublishTransport] on a runtime task, and once the transport answers, every
/// [PublishHandle] the batch gave out is resolved: with the message ID at the same position in
/// the response, or with the failure shared by the whole batch.
///
/// Batches are single-use. Once sealed, [Batch::publish] rejects every message and a new batch
/// must be created.
///
/// ```no_run
/// # use courier::batching::{Batch, BatchSettings};
/// # use courier::traits::PublishTransport;
/// # use std::sync::Arc;
/// # async fn example(transport: Arc<dyn PublishTransport>) -> anyhow::Result<()> {
/// let batch = Batch::builder("projects/acme/topics/stocks", transport)
///     .settings(BatchSettings::default().max_messages(2))
///     .build()?;
///
/// let first = batch.publish("ACME 120.5".into())?;
/// // Reaching `max_messages` seals the batch and starts the commit.
/// let second = batch.publish("ACME 121.0".into())?;
///
/// if let (Some(first), Some(second)) = (first.handle(), second.handle()) {
///     println!("published {} and {}", first.await?, second.await?);
/// }
/// # Ok(())
/// # }
/// ```
pub struct Batch {
    topic: String,
    settings: BatchSettings,
    commit_when_full: bool,
    retry: Option<RetryStrategy>,
    timeout: Option<Duration>,
    transport: Arc<dyn PublishTransport>,
    on_done: Mutex<Option<BatchDoneCallback>>,
    runtime: Handle,
    request_limit: usize,
    state: Mutex<BatchState>,
    finished: watch::Sender<bool>,
}

impl Batch {
    pub fn builder(topic: impl Into<String>, transport: Arc<dyn PublishTransport>) -> BatchBuilder {
        BatchBuilder::new(topic.into(), transport)
    }

    /// Offers a message to the batch.
    ///
    /// Returns [Admission::Rejected] when the batch has been sealed, is already full, or would
    /// exceed the server's request size limit by taking the message. In the last case the batch
    /// is committed without the message (if it commits when full), and the message should be
    /// published to a new batch.
    ///
    /// Reaching `max_messages` or `max_bytes` commits the batch before returning when the batch
    /// was built to commit when full. A `max_messages` of zero always commits right after the
    /// first message.
    ///
    /// # Errors
    ///
    /// Returns [CourierError::MessageTooLarge] if a request carrying only this message would
    /// exceed the server's request size limit. Such a message can never be sent.
    pub fn publish(self: &Arc<Self>, message: PubsubMessage) -> Result<Admission> {
        let message_size = size::message_request_len(&message);
        let alone = size::empty_request_len(&self.topic) + message_size;

        if alone > self.request_limit {
            return Err(CourierError::MessageTooLarge {
                size: alone,
                max: self.request_limit,
            });
        }

        let mut state = self.state.lock();

        if state.status != BatchStatus::AcceptingMessages || self.is_full(&state) {
            return Ok(Admission::Rejected(message));
        }

        let new_size = state.size + message_size;

        if !state.wrappers.is_empty() && new_size > self.request_limit {
            drop(state);

            if self.commit_when_full {
                self.commit();
            }

            return Ok(Admission::Rejected(message));
        }

        let (resolver, handle) = publish_handle();
        let span = logging::batch::create_span(&self.topic, &message);

        state.wrappers.push(MessageWrapper {
            message,
            resolver,
            span: Some(span),
        });
        state.size = new_size;

        let should_commit =
            self.settings.max_messages == 0 || (self.commit_when_full && self.is_full(&state));

        drop(state);

        if should_commit {
            self.commit();
        }

        Ok(Admission::Accepted(handle))
    }

    /// Seals the batch and schedules the commit on the runtime the batch was built on.
    ///
    /// Only the first call has any effect, so the full-batch path and the latency timer may
    /// race to commit the same batch.
    pub fn commit(self: &Arc<Self>) {
        if !self.seal() {
            return;
        }

        let batch = Arc::clone(self);

        self.runtime.spawn(async move {
            batch.execute_commit().await;
        });
    }

    /// Seals the batch and sends it on the calling task, returning once the batch has reached
    /// a terminal status.
    ///
    /// If the batch was already sealed elsewhere, this waits for that commit to finish.
    pub async fn commit_and_wait(&self) {
        if self.seal() {
            self.execute_commit().await;
        }

        self.finished().await;
    }

    /// Fails every pending handle with [PublishError::Cancelled] without sending anything.
    ///
    /// A batch that has not started sending moves straight to [BatchStatus::Error], admits no
    /// further messages, and will not reach the transport even if a commit was already
    /// scheduled. If the send is already in flight, handles cancelled here keep their
    /// cancellation error, and the commit settles the batch status once the transport answers.
    pub fn cancel(&self, reason: CancellationReason) {
        let mut state = self.state.lock();

        let cancelled = state
            .wrappers
            .iter_mut()
            .map(|wrapper| wrapper.resolve(Err(PublishError::Cancelled(reason))))
            .filter(|resolved| *resolved)
            .count();

        logging::batch::cancelled(&self.topic, cancelled, reason);

        let fenced = matches!(
            state.status,
            BatchStatus::AcceptingMessages | BatchStatus::Starting
        );

        if fenced {
            state.status = BatchStatus::Error;
        }

        drop(state);

        if fenced {
            self.finished.send_replace(true);
        }
    }

    /// Waits until the batch reaches [BatchStatus::Success] or [BatchStatus::Error].
    ///
    /// Never returns for a batch that is neither committed nor cancelled.
    pub async fn finished(&self) {
        let mut rx = self.finished.subscribe();
        let _ = rx.wait_for(|finished| *finished).await;
    }

    pub fn topic(&self) -> &str {
        &self.topic
    }

    pub fn settings(&self) -> &BatchSettings {
        &self.settings
    }

    pub fn status(&self) -> BatchStatus {
        self.state.lock().status
    }

    /// Size in bytes of the publish request this batch would send right now.
    pub fn size(&self) -> usize {
        self.state.lock().size
    }

    pub fn len(&self) -> usize {
        self.state.lock().wrappers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.state.lock().wrappers.is_empty()
    }

    /// A copy of the admitted messages, in admission order.
    pub fn messages(&self) -> Vec<PubsubMessage> {
        self.snapshot(&self.state.lock())
    }

    fn is_full(&self, state: &BatchState) -> bool {
        let byte_limit = self.settings.max_bytes.min(self.request_limit);

        !state.wrappers.is_empty()
            && (state.wrappers.len() >= self.settings.max_messages || state.size >= byte_limit)
    }

    fn snapshot(&self, state: &BatchState) -> Vec<PubsubMessage> {
        state
            .wrappers
            .iter()
            .map(|wrapper| wrapper.message.clone())
            .collect()
    }

    fn seal(&self) -> bool {
        let mut state = self.state.lock();

        if state.status != BatchStatus::AcceptingMessages {
            return false;
        }

        state.status = BatchStatus::Starting;
        logging::batch::commit_scheduled(&self.topic, state.wrappers.len(), state.size);
        true
    }

    pub(crate) async fn execute_commit(&self) {
        let (messages, span) = {
            let mut state = self.state.lock();

            if state.status != BatchStatus::Starting {
                logging::batch::already_started();
                return;
            }

            state.status = BatchStatus::InProgress;

            if state.wrappers.is_empty() {
                logging::batch::no_messages();
                state.status = BatchStatus::Success;
                drop(state);
                self.finished.send_replace(true);
                return;
            }

            let span = logging::batch::publish_span(&self.topic, state.wrappers.len());

            for message_span in state.wrappers.iter().filter_map(|w| w.span.as_ref()) {
                span.follows_from(message_span);
                message_span.follows_from(&span);
            }

            (self.snapshot(&state), span)
        };

        let count = messages.len();
        let started = Instant::now();
        logging::batch::publishing(&self.topic, count);

        let response = self
            .transport
            .publish(&self.topic, messages, self.retry.as_ref(), self.timeout)
            .instrument(span.clone())
            .await;

        if let Err(err) = &response {
            logging::batch::span_failed(&span, err);
        }

        drop(span);

        let success = self.distribute(response, count, started.elapsed());
        self.finished.send_replace(true);
        self.run_done_callback(success);
    }

    fn distribute(
        &self,
        response: Result<Vec<String>, TransportError>,
        expected: usize,
        elapsed: Duration,
    ) -> bool {
        let mut state = self.state.lock();

        let success = match response {
            Ok(ids) if ids.len() == expected => {
                for (wrapper, id) in state.wrappers.iter_mut().zip(ids) {
                    wrapper.resolve(Ok(id));
                }

                logging::batch::published(&self.topic, expected, elapsed);
                true
            }
            Ok(ids) => {
                logging::batch::id_count_mismatch(&self.topic, expected, ids.len());

                let err = PublishError::IdCountMismatch {
                    expected,
                    received: ids.len(),
                };

                for wrapper in state.wrappers.iter_mut() {
                    wrapper.resolve(Err(err.clone()));
                }

                false
            }
            Err(err) => {
                logging::batch::transport_failure(&self.topic, expected, &err);

                let err = PublishError::from(err);

                for wrapper in state.wrappers.iter_mut() {
                    wrapper.resolve(Err(err.clone()));
                }

                false
            }
        };

        let swept = state
            .wrappers
            .iter_mut()
            .map(|wrapper| wrapper.resolve(Err(PublishError::Unresolved)))
            .filter(|resolved| *resolved)
            .count();

        if swept > 0 {
            logging::batch::unresolved_handles(&self.topic, swept);
        }

        state.status = if success {
            BatchStatus::Success
        } else {
            BatchStatus::Error
        };

        success
    }

    fn run_done_callback(&self, success: bool) {
        let Some(callback) = self.on_done.lock().take() else {
            return;
        };

        if let Err(panic) = panic::catch_unwind(AssertUnwindSafe(|| callback(success))) {
            logging::batch::done_callback_panicked(&self.topic);
            panic::resume_unwind(panic);
        }
    }

    #[cfg(test)]
    pub(crate) fn force_status(&self, status: BatchStatus) {
        self.state.lock().status = status;
    }
}

impl fmt::Debug for Batch {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let state = self.state.lock();

        f.debug_struct("Batch")
            .field("topic", &self.topic)
            .field("status", &state.status)
            .field("messages", &state.wrappers.len())
            .field("size", &state.size)
            .field("settings", &self.settings)
            .field("commit_when_full", &self.commit_when_full)
            .finish_non_exhaustive()
    }
}

/// Configures a [Batch] before it starts accepting messages.
pub struct BatchBuilder {
    topic: String,
    transport: Arc<dyn PublishTransport>,
    settings: BatchSettings,
    commit_when_full: bool,
    on_done: Option<BatchDoneCallback>,
    retry: Option<RetryStrategy>,
    timeout: Option<Duration>,
    runtime: Option<Handle>,
    request_limit: usize,
}

impl BatchBuilder {
    fn new(topic: String, transport: Arc<dyn PublishTransport>) -> Self {
        Self {
            topic,
            transport,
            settings: BatchSettings::default(),
            commit_when_full: true,
            on_done: None,
            retry: None,
            timeout: None,
            runtime: None,
            request_limit: SERVER_PUBLISH_MAX_BYTES,
        }
    }

    pub fn settings(mut self, settings: BatchSettings) -> Self {
        self.settings = settings;
        self
    }

    /// When disabled, reaching a limit only stops the batch from admitting more messages, and
    /// the owner is responsible for committing it. Defaults to `true`.
    pub fn commit_when_full(mut self, commit_when_full: bool) -> Self {
        self.commit_when_full = commit_when_full;
        self
    }

    pub fn on_done(mut self, callback: impl FnOnce(bool) + Send + 'static) -> Self {
        self.on_done = Some(Box::new(callback));
        self
    }

    pub fn retry(mut self, retry: impl Into<Option<RetryStrategy>>) -> Self {
        self.retry = retry.into();
        self
    }

    pub fn timeout(mut self, timeout: impl Into<Option<Duration>>) -> Self {
        self.timeout = timeout.into();
        self
    }

    /// Runs commits on `runtime` instead of the runtime current at [BatchBuilder::build].
    pub fn runtime(mut self, runtime: Handle) -> Self {
        self.runtime = Some(runtime);
        self
    }

    #[cfg(test)]
    pub(crate) fn request_limit(mut self, limit: usize) -> Self {
        self.request_limit = limit;
        self
    }

    /// Builds the batch, binding its commits to the configured runtime, or to the current one.
    ///
    /// # Errors
    ///
    /// - Returns [CourierError::InvalidSettings] if the settings fail validation.
    /// - Returns [CourierError::NoRuntime] if no runtime was configured and this is called
    ///   outside of a tokio runtime.
    pub fn build(self) -> Result<Arc<Batch>> {
        self.settings.validate()?;

        let runtime = match self.runtime {
            Some(runtime) => runtime,
            None => Handle::try_current().map_err(|_| CourierError::NoRuntime)?,
        };

        let (finished, _) = watch::channel(false);

        let state = BatchState {
            status: BatchStatus::AcceptingMessages,
            wrappers: Vec::new(),
            size: size::empty_request_len(&self.topic),
        };

        Ok(Arc::new(Batch {
            topic: self.topic,
            settings: self.settings,
            commit_when_full: self.commit_when_full,
            retry: self.retry,
            timeout: self.timeout,
            transport: self.transport,
            on_done: Mutex::new(self.on_done),
            runtime,
            request_limit: self.request_limit,
            state: Mutex::new(state),
            finished,
        }))
    }
}
