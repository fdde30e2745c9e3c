use crate::retry::RetryStrategy;
use crate::traits::PublishTransport;
use crate::PubsubMessage;
use async_trait::async_trait;
use courier_std::errors::TransportError;
use parking_lot::Mutex;
use std::collections::{HashMap, VecDeque};
use std::fmt;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{Notify, Semaphore};
use tracing::field::{Field, Visit};
use tracing::span::{Attributes, Id, Record};
use tracing::subscriber::DefaultGuard;
use tracing::{Event, Subscriber};
use tracing_subscriber::layer::{Context, SubscriberExt};
use tracing_subscriber::Layer;

#[derive(Debug, Clone)]
pub(crate) struct PublishCall {
    pub topic: String,
    pub messages: Vec<PubsubMessage>,
    pub retry: Option<RetryStrategy>,
    pub timeout: Option<Duration>,
}

impl PublishCall {
    pub fn payloads(&self) -> Vec<&[u8]> {
        self.messages.iter().map(|m| m.data().as_ref()).collect()
    }
}

/// Records every publish call and answers with queued responses, or with sequential IDs once
/// the queue runs dry.
#[derive(Default)]
pub(crate) struct MockTransport {
    calls: Mutex<Vec<PublishCall>>,
    responses: Mutex<VecDeque<Result<Vec<String>, TransportError>>>,
    next_id: AtomicUsize,
    gate: Option<Semaphore>,
    called: Notify,
}

impl MockTransport {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    /// Every publish call blocks until a permit is handed out with [MockTransport::release].
    pub fn gated() -> Arc<Self> {
        Arc::new(Self {
            gate: Some(Semaphore::new(0)),
            ..Self::default()
        })
    }

    pub fn respond_ids(&self, ids: &[&str]) {
        let ids = ids.iter().map(|id| id.to_string()).collect();
        self.responses.lock().push_back(Ok(ids));
    }

    pub fn respond_err(&self, err: TransportError) {
        self.responses.lock().push_back(Err(err));
    }

    pub fn release(&self, permits: usize) {
        if let Some(gate) = &self.gate {
            gate.add_permits(permits);
        }
    }

    pub fn calls(&self) -> Vec<PublishCall> {
        self.calls.lock().clone()
    }

    pub fn call_count(&self) -> usize {
        self.calls.lock().len()
    }

    pub async fn wait_for_call(&self) {
        self.called.notified().await;
    }
}

#[async_trait]
impl PublishTransport for MockTransport {
    async fn publish(
        &self,
        topic: &str,
        messages: Vec<PubsubMessage>,
        retry: Option<&RetryStrategy>,
        timeout: Option<Duration>,
    ) -> Result<Vec<String>, TransportError> {
        let count = messages.len();

        self.calls.lock().push(PublishCall {
            topic: topic.to_owned(),
            messages,
            retry: retry.cloned(),
            timeout,
        });
        self.called.notify_one();

        if let Some(gate) = &self.gate {
            if let Ok(permit) = gate.acquire().await {
                permit.forget();
            }
        }

        let queued = self.responses.lock().pop_front();

        queued.unwrap_or_else(|| {
            let first = self.next_id.fetch_add(count, Ordering::SeqCst);
            Ok((first..first + count).map(|id| id.to_string()).collect())
        })
    }
}

/// A span as seen by the [SpanRecorder].
#[derive(Debug, Clone, Default)]
pub(crate) struct RecordedSpan {
    pub id: u64,
    pub fields: HashMap<String, String>,
    pub events: Vec<String>,
    pub follows_from: Vec<u64>,
    pub closed: bool,
}

impl RecordedSpan {
    pub fn field(&self, name: &str) -> Option<&str> {
        self.fields.get(name).map(String::as_str)
    }
}

struct FieldVisitor<'a>(&'a mut HashMap<String, String>);

impl Visit for FieldVisitor<'_> {
    fn record_str(&mut self, field: &Field, value: &str) {
        self.0.insert(field.name().to_owned(), value.to_owned());
    }

    fn record_debug(&mut self, field: &Field, value: &dyn fmt::Debug) {
        self.0.insert(field.name().to_owned(), format!("{value:?}"));
    }
}

/// A tracing layer keeping every span created on the current thread, keyed by its `otel.name`.
#[derive(Clone, Default)]
pub(crate) struct SpanRecorder {
    spans: Arc<Mutex<Vec<RecordedSpan>>>,
}

impl SpanRecorder {
    /// Installs the recorder as the thread's default subscriber until the guard is dropped.
    pub fn install() -> (Self, DefaultGuard) {
        let recorder = Self::default();
        let subscriber = tracing_subscriber::registry().with(recorder.clone());

        (recorder, tracing::subscriber::set_default(subscriber))
    }

    pub fn named(&self, name: &str) -> Vec<RecordedSpan> {
        self.spans
            .lock()
            .iter()
            .filter(|span| span.field("otel.name") == Some(name))
            .cloned()
            .collect()
    }

    fn with_open(&self, id: &Id, f: impl FnOnce(&mut RecordedSpan)) {
        let mut spans = self.spans.lock();

        // Ids are reused once a span closes.
        if let Some(span) = spans
            .iter_mut()
            .rev()
            .find(|span| span.id == id.into_u64() && !span.closed)
        {
            f(span);
        }
    }
}

impl<S: Subscriber> Layer<S> for SpanRecorder {
    fn on_new_span(&self, attrs: &Attributes<'_>, id: &Id, _ctx: Context<'_, S>) {
        let mut span = RecordedSpan {
            id: id.into_u64(),
            ..RecordedSpan::default()
        };

        attrs.record(&mut FieldVisitor(&mut span.fields));
        self.spans.lock().push(span);
    }

    fn on_record(&self, id: &Id, values: &Record<'_>, _ctx: Context<'_, S>) {
        self.with_open(id, |span| values.record(&mut FieldVisitor(&mut span.fields)));
    }

    fn on_follows_from(&self, id: &Id, follows: &Id, _ctx: Context<'_, S>) {
        self.with_open(id, |span| span.follows_from.push(follows.into_u64()));
    }

    fn on_event(&self, event: &Event<'_>, _ctx: Context<'_, S>) {
        let Some(parent) = event.parent() else {
            return;
        };

        let mut fields = HashMap::new();
        event.record(&mut FieldVisitor(&mut fields));

        if let Some(message) = fields.remove("message") {
            self.with_open(parent, |span| span.events.push(message));
        }
    }

    fn on_close(&self, id: Id, _ctx: Context<'_, S>) {
        self.with_open(&id, |span| span.closed = true);
    }
}
