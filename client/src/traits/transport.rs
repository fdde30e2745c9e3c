use crate::retry::RetryStrategy;
use crate::PubsubMessage;
use async_trait::async_trait;
use courier_std::errors::TransportError;
use std::sync::Arc;
use std::time::Duration;

/// Interface to adapt an RPC layer for sending batches to the service.
///
/// A transport receives one committed batch at a time: the topic, the batch's messages in the
/// order they were published, and the retry and timeout policies the batch was created with.
/// Both policies are passed through untouched, and it is up to the transport to honour them
/// before reporting a final outcome.
///
/// On success, the transport must return exactly one message ID per message, in the same order
/// as `messages`. A response with any other number of IDs fails the whole batch.
#[async_trait]
pub trait PublishTransport: Send + Sync + 'static {
    async fn publish(
        &self,
        topic: &str,
        messages: Vec<PubsubMessage>,
        retry: Option<&RetryStrategy>,
        timeout: Option<Duration>,
    ) -> Result<Vec<String>, TransportError>;
}

#[async_trait]
impl<T> PublishTransport for Arc<T>
where
    T: PublishTransport + ?Sized,
{
    async fn publish(
        &self,
        topic: &str,
        messages: Vec<PubsubMessage>,
        retry: Option<&RetryStrategy>,
        timeout: Option<Duration>,
    ) -> Result<Vec<String>, TransportError> {
        (**self).publish(topic, messages, retry, timeout).await
    }
}
