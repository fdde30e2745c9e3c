//! Shared fixtures for the Courier integration tests.

use async_trait::async_trait;
use courier::retry::RetryStrategy;
use courier::std::errors::TransportError;
use courier::traits::PublishTransport;
use courier::{PublishHandle, PublishResult, PubsubMessage};
use futures::future::join_all;
use parking_lot::Mutex;
use std::collections::VecDeque;
use std::future::IntoFuture;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Notify;

/// A publish request as received by the [InMemoryTransport].
#[derive(Debug, Clone)]
pub struct Request {
    pub topic: String,
    pub messages: Vec<PubsubMessage>,
    pub timeout: Option<Duration>,
}

impl Request {
    pub fn payloads(&self) -> Vec<String> {
        self.messages
            .iter()
            .map(|message| String::from_utf8_lossy(message.data()).into_owned())
            .collect()
    }
}

/// An in-memory stand-in for a publish endpoint.
///
/// Message IDs are `<topic>/<n>`, counting every message the transport ever accepted. Failures
/// can be scripted per delivery attempt, and are retried on the schedule of the commit's
/// [RetryStrategy]. An optional delay simulates network latency.
#[derive(Default)]
pub struct InMemoryTransport {
    requests: Mutex<Vec<Request>>,
    failures: Mutex<VecDeque<Option<TransportError>>>,
    accepted: Mutex<usize>,
    attempts: Mutex<usize>,
    delay: Option<Duration>,
    received: Notify,
}

impl InMemoryTransport {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn with_delay(delay: Duration) -> Arc<Self> {
        Arc::new(Self {
            delay: Some(delay),
            ..Self::default()
        })
    }

    /// Scripts the outcome of upcoming delivery attempts, in order. `None` lets an attempt
    /// through.
    pub fn script(&self, outcomes: impl IntoIterator<Item = Option<TransportError>>) {
        self.failures.lock().extend(outcomes);
    }

    pub fn requests(&self) -> Vec<Request> {
        self.requests.lock().clone()
    }

    /// Every payload the transport accepted, in the order it received them.
    pub fn delivered(&self) -> Vec<String> {
        self.requests().iter().flat_map(Request::payloads).collect()
    }

    pub async fn wait_for_request(&self) {
        self.received.notified().await;
    }

    /// Number of delivery attempts, including retries and scripted failures.
    pub fn attempts(&self) -> usize {
        *self.attempts.lock()
    }

    fn deliver(
        &self,
        topic: &str,
        messages: &[PubsubMessage],
        timeout: Option<Duration>,
    ) -> Result<Vec<String>, TransportError> {
        *self.attempts.lock() += 1;

        if let Some(err) = self.failures.lock().pop_front().flatten() {
            return Err(err);
        }

        self.requests.lock().push(Request {
            topic: topic.to_owned(),
            messages: messages.to_vec(),
            timeout,
        });

        let mut accepted = self.accepted.lock();
        let ids = (*accepted..*accepted + messages.len())
            .map(|n| format!("{topic}/{n}"))
            .collect();
        *accepted += messages.len();

        Ok(ids)
    }
}

/// Waits for every handle, returning the outcomes in the same order.
pub async fn resolve_all(handles: Vec<PublishHandle>) -> Vec<PublishResult> {
    join_all(handles.into_iter().map(IntoFuture::into_future)).await
}

pub fn unavailable() -> TransportError {
    TransportError::Status {
        code: 14,
        message: "service unavailable".to_owned(),
    }
}

#[async_trait]
impl PublishTransport for InMemoryTransport {
    async fn publish(
        &self,
        topic: &str,
        messages: Vec<PubsubMessage>,
        retry: Option<&RetryStrategy>,
        timeout: Option<Duration>,
    ) -> Result<Vec<String>, TransportError> {
        self.received.notify_one();

        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }

        let messages = &messages;
        let attempt = move || async move { self.deliver(topic, messages, timeout) };

        match retry {
            Some(retry) => retry.run(attempt).await,
            None => attempt().await,
        }
    }
}
