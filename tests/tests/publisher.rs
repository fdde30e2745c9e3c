use anyhow::Result;
use courier::batching::BatchSettings;
use courier::retry::RetryStrategy;
use courier::std::errors::{CourierError, PublishError, TransportError};
use courier::{PublishHandle, Publisher, PubsubMessage};
use courier_tests::{resolve_all, unavailable, InMemoryTransport};
use futures::future::join_all;
use std::sync::Arc;
use std::time::Duration;

const TOPIC: &str = "projects/acme/topics/stocks";

fn publish_all(publisher: &Publisher, count: usize) -> Result<Vec<PublishHandle>> {
    let handles = (0..count)
        .map(|i| publisher.publish(TOPIC, PubsubMessage::new(format!("message-{i}").into_bytes())))
        .collect::<Result<Vec<_>, _>>()?;

    Ok(handles)
}

#[tokio::test]
async fn splits_messages_into_full_batches() -> Result<()> {
    let transport = InMemoryTransport::new();
    let publisher = Publisher::builder(transport.clone())
        .with_batch_settings(BatchSettings::default().max_messages(10))
        .build()?;

    let handles = publish_all(&publisher, 35)?;
    publisher.flush();

    let ids = resolve_all(handles)
        .await
        .into_iter()
        .collect::<Result<Vec<_>, _>>()?;

    let mut sizes = transport
        .requests()
        .iter()
        .map(|request| request.messages.len())
        .collect::<Vec<_>>();
    sizes.sort();

    assert_eq!(sizes, vec![5, 10, 10, 10]);
    assert_eq!(ids.len(), 35);

    let mut unique = ids.clone();
    unique.sort();
    unique.dedup();
    assert_eq!(unique.len(), 35);

    Ok(())
}

#[tokio::test]
async fn latency_flushes_partial_batch() -> Result<()> {
    let transport = InMemoryTransport::new();
    let publisher = Publisher::builder(transport.clone())
        .with_batch_settings(BatchSettings::default().max_latency(Duration::from_millis(25)))
        .build()?;

    let handles = publish_all(&publisher, 3)?;
    assert!(transport.requests().is_empty());

    for handle in handles {
        handle.await?;
    }

    let requests = transport.requests();
    assert_eq!(requests.len(), 1);
    assert_eq!(
        requests[0].payloads(),
        vec!["message-0", "message-1", "message-2"]
    );

    Ok(())
}

#[tokio::test]
async fn byte_limit_seals_batches() -> Result<()> {
    let transport = InMemoryTransport::new();
    let publisher = Publisher::builder(transport.clone())
        .with_batch_settings(BatchSettings::default().max_bytes(1_000))
        .build()?;

    let payload = vec![b'x'; 300];
    let handles = (0..10)
        .map(|_| publisher.publish(TOPIC, PubsubMessage::new(payload.clone())))
        .collect::<Result<Vec<_>, _>>()?;

    publisher.flush();

    for handle in handles {
        handle.await?;
    }

    for request in transport.requests() {
        assert!(request.messages.len() <= 4);
    }

    assert_eq!(transport.delivered().len(), 10);

    Ok(())
}

#[tokio::test]
async fn failed_batch_fails_every_handle() -> Result<()> {
    let transport = InMemoryTransport::new();
    transport.script([Some(unavailable())]);

    let publisher = Publisher::builder(transport.clone()).build()?;

    let handles = publish_all(&publisher, 3)?;
    publisher.flush();

    let errors = resolve_all(handles)
        .await
        .into_iter()
        .map(|outcome| outcome.unwrap_err())
        .collect::<Vec<_>>();

    match (&errors[0], &errors[2]) {
        (PublishError::Transport(first), PublishError::Transport(last)) => {
            assert!(Arc::ptr_eq(first, last));
        }
        other => panic!("unexpected errors: {other:?}"),
    }

    // Later batches are unaffected.
    let message_id = publisher.publish(TOPIC, "retry".into())?.await?;
    assert_eq!(message_id, format!("{TOPIC}/0"));

    Ok(())
}

#[tokio::test]
async fn rejects_oversized_message() -> Result<()> {
    let transport = InMemoryTransport::new();
    let publisher = Publisher::builder(transport.clone()).build()?;

    let payload = vec![0u8; courier::constants::SERVER_PUBLISH_MAX_BYTES];
    let result = publisher.publish(TOPIC, PubsubMessage::new(payload));

    assert!(matches!(result, Err(CourierError::MessageTooLarge { .. })));

    Ok(())
}

#[tokio::test]
async fn commit_retry_recovers_from_transient_failures() -> Result<()> {
    let transport = InMemoryTransport::new();
    transport.script([Some(unavailable()), Some(unavailable())]);

    let retry = RetryStrategy::exponential(3, 2, Duration::from_millis(5))
        .with_max_delay(Duration::from_millis(10));

    let publisher = Publisher::builder(transport.clone())
        .with_commit_retry(retry)
        .build()?;

    let message_id = publisher.publish(TOPIC, "foo".into())?.await?;

    assert_eq!(message_id, format!("{TOPIC}/0"));
    assert_eq!(transport.attempts(), 3);
    assert_eq!(transport.delivered(), ["foo"]);

    Ok(())
}

#[tokio::test]
async fn exhausted_commit_retry_fails_handles() -> Result<()> {
    let transport = InMemoryTransport::new();
    transport.script((0..3).map(|_| Some(unavailable())));

    let publisher = Publisher::builder(transport.clone())
        .with_commit_retry(RetryStrategy::constant(2, Duration::from_millis(1)))
        .build()?;

    let outcome = publisher.publish(TOPIC, "foo".into())?.await;

    match outcome {
        Err(PublishError::Transport(err)) => match err.as_ref() {
            TransportError::RetryExhausted { attempts, last } => {
                assert_eq!(*attempts, 3);
                assert!(matches!(**last, TransportError::Status { code: 14, .. }));
            }
            other => panic!("unexpected transport error: {other:?}"),
        },
        other => panic!("unexpected outcome: {other:?}"),
    }

    assert_eq!(transport.attempts(), 3);
    assert!(transport.delivered().is_empty());

    Ok(())
}

#[tokio::test]
async fn passes_timeout_to_transport() -> Result<()> {
    let transport = InMemoryTransport::new();
    let publisher = Publisher::builder(transport.clone())
        .with_commit_timeout(Duration::from_secs(30))
        .build()?;

    publisher.publish(TOPIC, "foo".into())?.await?;

    assert_eq!(transport.requests()[0].timeout, Some(Duration::from_secs(30)));

    Ok(())
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn concurrent_publishers_share_batches() -> Result<()> {
    let transport = InMemoryTransport::with_delay(Duration::from_millis(5));
    let publisher = Publisher::builder(transport.clone())
        .with_batch_settings(BatchSettings::default().max_messages(50))
        .build()?;

    let tasks = (0..8)
        .map(|task| {
            let publisher = publisher.clone();

            tokio::spawn(async move {
                let handles = (0..100)
                    .map(|i| {
                        let data = format!("task-{task}-{i}").into_bytes();
                        publisher.publish(TOPIC, PubsubMessage::new(data)).unwrap()
                    })
                    .collect::<Vec<_>>();

                resolve_all(handles).await
            })
        })
        .collect::<Vec<_>>();

    for outcome in join_all(tasks).await {
        for result in outcome? {
            result?;
        }
    }

    assert_eq!(transport.delivered().len(), 800);
    assert!(transport.requests().len() >= 16);

    Ok(())
}

#[tokio::test]
async fn stop_delivers_pending_messages() -> Result<()> {
    let transport = InMemoryTransport::new();
    let publisher = Publisher::builder(transport.clone()).build()?;

    let handles = publish_all(&publisher, 5)?;
    publisher.stop()?;

    for handle in handles {
        handle.await?;
    }

    assert_eq!(transport.delivered().len(), 5);
    assert!(matches!(
        publisher.publish(TOPIC, "late".into()),
        Err(CourierError::PublisherStopped)
    ));

    Ok(())
}
