use anyhow::Result;
use async_trait::async_trait;
use courier::prelude::*;
use courier::{Publisher, PubsubMessage};
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::time::Duration;

const TOPIC: &str = "projects/acme/topics/orders";

/// Fails the first request it receives, then succeeds.
#[derive(Default)]
struct FlakyTransport {
    failed: AtomicBool,
    next_id: AtomicU64,
}

#[async_trait]
impl PublishTransport for FlakyTransport {
    async fn publish(
        &self,
        _topic: &str,
        messages: Vec<PubsubMessage>,
        _retry: Option<&RetryStrategy>,
        _timeout: Option<Duration>,
    ) -> Result<Vec<String>, TransportError> {
        if !self.failed.swap(true, Ordering::Relaxed) {
            return Err(TransportError::Status {
                code: 14,
                message: "service unavailable".to_owned(),
            });
        }

        let first = self.next_id.fetch_add(messages.len() as u64, Ordering::Relaxed);
        Ok((first..first + messages.len() as u64)
            .map(|id| id.to_string())
            .collect())
    }
}

fn order_event(customer: &str, event: &str) -> PubsubMessage {
    PubsubMessage::new(event.to_owned().into_bytes()).with_ordering_key(customer)
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt::init();

    let publisher = Publisher::builder(FlakyTransport::default())
        .with_message_ordering(true)
        .build()?;

    let created = publisher.publish(TOPIC, order_event("customer-1", "created"))?;
    let paid = publisher.publish(TOPIC, order_event("customer-1", "paid"))?;
    publisher.flush();

    if let Err(err) = created.await {
        println!("'created' failed: {err}");
    }

    if let Err(err) = paid.await {
        println!("'paid' failed: {err}");
    }

    // The key stays paused until resumed, so nothing overtakes the failed events.
    if let Err(err) = publisher.publish(TOPIC, order_event("customer-1", "shipped")) {
        println!("'shipped' refused: {err}");
    }

    publisher.resume_publish(TOPIC, "customer-1")?;

    for event in ["created", "paid", "shipped"] {
        let message_id = publisher
            .publish(TOPIC, order_event("customer-1", event))?
            .await?;

        println!("'{event}' published as {message_id}");
    }

    publisher.stop()?;

    Ok(())
}
