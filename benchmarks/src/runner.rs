use crate::{args::Args, results::BenchmarkResults};
use anyhow::Result;
use async_trait::async_trait;
use bytes::Bytes;
use courier::batching::BatchSettings;
use courier::prelude::*;
use courier::{Publisher, PubsubMessage};
use futures::future::join_all;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

const TOPIC: &str = "projects/acme/topics/stocks";

fn generate_payload(message_size: usize) -> Bytes {
    (0..message_size)
        .map(|i| (i % 25 + 97) as u8)
        .collect::<Vec<_>>()
        .into()
}

/// A publish endpoint that answers every request after a fixed delay.
pub struct SimulatedTransport {
    latency: Duration,
    requests: AtomicU64,
    next_id: AtomicU64,
}

impl SimulatedTransport {
    pub fn new(latency: Duration) -> Self {
        Self {
            latency,
            requests: AtomicU64::new(0),
            next_id: AtomicU64::new(0),
        }
    }

    pub fn requests(&self) -> u64 {
        self.requests.load(Ordering::Relaxed)
    }
}

#[async_trait]
impl PublishTransport for SimulatedTransport {
    async fn publish(
        &self,
        _topic: &str,
        messages: Vec<PubsubMessage>,
        _retry: Option<&RetryStrategy>,
        _timeout: Option<Duration>,
    ) -> Result<Vec<String>, TransportError> {
        tokio::time::sleep(self.latency).await;
        self.requests.fetch_add(1, Ordering::Relaxed);

        let count = messages.len() as u64;
        let first = self.next_id.fetch_add(count, Ordering::Relaxed);

        Ok((first..first + count).map(|id| id.to_string()).collect())
    }
}

pub struct BenchmarkRunner {
    args: Args,
    transport: Arc<SimulatedTransport>,
    publisher: Publisher,
}

impl BenchmarkRunner {
    pub fn init(args: Args) -> Result<Self> {
        let transport = Arc::new(SimulatedTransport::new(Duration::from_millis(
            args.transport_latency_ms,
        )));

        let settings = BatchSettings::default()
            .max_messages(args.max_messages)
            .max_latency(Duration::from_millis(args.max_latency_ms));

        let publisher = Publisher::builder(transport.clone())
            .with_batch_settings(settings)
            .with_message_ordering(args.enable_ordering)
            .build()?;

        Ok(Self {
            args,
            transport,
            publisher,
        })
    }

    pub async fn run(self) -> Result<BenchmarkResults> {
        let payload = generate_payload(self.args.message_size as usize);
        let messages_per_task = self.args.num_of_messages / self.args.num_of_tasks;
        let mut tasks = Vec::with_capacity(self.args.num_of_tasks as usize);

        tracing::info!(
            messages = self.args.num_of_messages,
            tasks = self.args.num_of_tasks,
            "Starting benchmark."
        );

        let start = Instant::now();

        for task in 0..self.args.num_of_tasks {
            let publisher = self.publisher.clone();
            let payload = payload.clone();
            let ordering_key = if self.args.enable_ordering {
                format!("task-{task}")
            } else {
                String::new()
            };

            let handle = tokio::spawn(async move {
                let mut handles = Vec::with_capacity(messages_per_task as usize);

                for _ in 0..messages_per_task {
                    let message =
                        PubsubMessage::new(payload.clone()).with_ordering_key(ordering_key.as_str());
                    handles.push(publisher.publish(TOPIC, message)?);
                }

                let mut published: u64 = 0;

                for handle in handles {
                    handle.await?;
                    published += 1;
                }

                anyhow::Ok(published)
            });

            tasks.push(handle);
        }

        let mut published = 0;

        for outcome in join_all(tasks).await {
            published += outcome??;
        }

        let elapsed = start.elapsed();
        self.publisher.stop()?;

        Ok(BenchmarkResults::calculate(
            elapsed,
            published,
            self.transport.requests(),
            self.args,
        ))
    }
}
