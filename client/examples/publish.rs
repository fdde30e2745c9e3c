use anyhow::Result;
use async_trait::async_trait;
use courier::batching::BatchSettings;
use courier::prelude::*;
use courier::{Publisher, PubsubMessage};
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

const NUM_OF_MESSAGES: usize = 1_000;

/// Pretends to publish each request, assigning sequential message IDs.
#[derive(Default)]
struct LoggingTransport {
    next_id: AtomicU64,
}

#[async_trait]
impl PublishTransport for LoggingTransport {
    async fn publish(
        &self,
        topic: &str,
        messages: Vec<PubsubMessage>,
        _retry: Option<&RetryStrategy>,
        _timeout: Option<Duration>,
    ) -> Result<Vec<String>, TransportError> {
        tokio::time::sleep(Duration::from_millis(5)).await;
        println!("Sending {} messages to {topic}", messages.len());

        let first = self.next_id.fetch_add(messages.len() as u64, Ordering::Relaxed);
        let ids = (first..first + messages.len() as u64)
            .map(|id| id.to_string())
            .collect();

        Ok(ids)
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt::init();

    let publisher = Publisher::builder(LoggingTransport::default())
        .with_batch_settings(BatchSettings::default().max_messages(250))
        .with_commit_timeout(Duration::from_secs(10))
        .build()?;

    let mut handles = Vec::with_capacity(NUM_OF_MESSAGES);

    for i in 0..NUM_OF_MESSAGES {
        let message = PubsubMessage::new(format!("Hello, world - {i}!").into_bytes())
            .with_attribute("origin", "example");

        handles.push(publisher.publish("projects/acme/topics/stocks", message)?);
    }

    publisher.stop()?;

    for handle in handles {
        handle.await?;
    }

    println!("Published {NUM_OF_MESSAGES} messages");

    Ok(())
}
