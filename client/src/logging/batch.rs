use crate::PubsubMessage;
use courier_std::errors::{CancellationReason, TransportError};
use std::fmt::Display;
use std::time::Duration;
use tracing::field::{display, Empty};
use tracing::Span;

const MESSAGING_SYSTEM: &str = "gcp_pubsub";

/// Splits `projects/<project>/topics/<name>` into its project and short topic name.
fn topic_parts(topic: &str) -> (Option<&str>, &str) {
    match topic.split('/').collect::<Vec<_>>().as_slice() {
        ["projects", project, "topics", name] => (Some(*project), *name),
        _ => (None, topic),
    }
}

/// Opens the span following one message from admission until its handle resolves.
pub fn create_span(topic: &str, message: &PubsubMessage) -> Span {
    let (project, name) = topic_parts(topic);
    let ordering_key = Some(message.ordering_key()).filter(|key| !key.is_empty());

    let span = tracing::info_span!(
        "create",
        otel.name = %format!("{name} create"),
        otel.kind = "producer",
        messaging.system = MESSAGING_SYSTEM,
        messaging.destination.name = name,
        gcp.project_id = project,
        messaging.operation = "create",
        messaging.message.body.size = message.data().len(),
        messaging.gcp_pubsub.message.ordering_key = ordering_key,
        messaging.message.id = Empty,
        otel.status_code = Empty,
        exception.message = Empty,
    );

    tracing::info!(parent: &span, "publish start");
    span
}

/// Opens the root span covering one call to the transport.
pub fn publish_span(topic: &str, messages: usize) -> Span {
    let (project, name) = topic_parts(topic);

    tracing::info_span!(
        parent: None,
        "publish",
        otel.name = %format!("{name} publish"),
        otel.kind = "client",
        messaging.system = MESSAGING_SYSTEM,
        messaging.destination.name = name,
        gcp.project_id = project,
        messaging.batch.message_count = messages,
        messaging.operation = "publish",
        code.function = "commit",
        otel.status_code = Empty,
        exception.message = Empty,
    )
}

pub fn span_published(span: &Span, message_id: &str) {
    span.record("messaging.message.id", message_id);
    tracing::info!(parent: span, "publish end");
}

pub fn span_failed(span: &Span, err: &dyn Display) {
    span.record("otel.status_code", "ERROR");
    span.record("exception.message", display(err));
    tracing::info!(parent: span, "exception");
}

pub fn commit_scheduled(topic: &str, messages: usize, size: usize) {
    tracing::debug!(topic, messages, size, "Batch sealed, scheduling commit.");
}

pub fn no_messages() {
    tracing::debug!("No messages to publish, exiting commit.");
}

pub fn already_started() {
    tracing::debug!("Batch is already in progress or has been cancelled, exiting commit.");
}

pub fn publishing(topic: &str, messages: usize) {
    tracing::debug!(topic, messages, "Publishing batch.");
}

pub fn published(topic: &str, messages: usize, elapsed: Duration) {
    tracing::debug!(
        topic,
        messages,
        elapsed_ms = elapsed.as_millis() as u64,
        "Batch published."
    );
}

pub fn id_count_mismatch(topic: &str, expected: usize, received: usize) {
    tracing::error!(
        topic,
        expected,
        received,
        "Publish response contained a different number of message IDs than messages sent."
    );
}

pub fn transport_failure(topic: &str, messages: usize, err: &TransportError) {
    tracing::error!(
        topic,
        messages,
        error = err.to_string(),
        "Failed to publish batch."
    );
}

pub fn unresolved_handles(topic: &str, count: usize) {
    tracing::error!(
        topic,
        count,
        "Batch finished with pending publish handles, failing them."
    );
}

pub fn cancelled(topic: &str, messages: usize, reason: CancellationReason) {
    tracing::warn!(topic, messages, reason = reason.as_str(), "Batch cancelled.");
}

pub fn done_callback_panicked(topic: &str) {
    tracing::error!(topic, "Batch done callback panicked.");
}

pub fn retrying(attempt: u32, delay: Duration, err: &TransportError) {
    tracing::debug!(
        attempt,
        delay_ms = delay.as_millis() as u64,
        error = err.to_string(),
        "Publish attempt failed, retrying."
    );
}
