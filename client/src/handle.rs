use courier_std::errors::PublishError;
use futures::future::BoxFuture;
use std::future::IntoFuture;
use tokio::sync::watch;

pub type PublishResult = Result<String, PublishError>;

type Slot = Option<PublishResult>;

/// Creates a linked resolver/handle pair for one admitted message.
pub(crate) fn publish_handle() -> (HandleResolver, PublishHandle) {
    let (tx, rx) = watch::channel(None);
    (HandleResolver { tx }, PublishHandle { rx })
}

/// The write side of a [PublishHandle], owned by the batch that admitted the message.
#[derive(Debug)]
pub(crate) struct HandleResolver {
    tx: watch::Sender<Slot>,
}

impl HandleResolver {
    /// Assigns the outcome if the handle is still pending.
    ///
    /// Returns `false` without touching the slot when an outcome was already assigned.
    pub fn resolve(&self, outcome: PublishResult) -> bool {
        let mut outcome = Some(outcome);

        self.tx.send_if_modified(|slot| {
            if slot.is_some() {
                return false;
            }

            *slot = outcome.take();
            true
        })
    }
}

/// A single-assignment handle to the outcome of one published message.
///
/// A handle resolves exactly once, either to the server-assigned message ID or to a
/// [PublishError]. Handles are cheap to clone, and every clone observes the same outcome.
///
/// Await the handle directly to retrieve the outcome:
///
/// ```no_run
/// # async fn example(handle: courier::PublishHandle) {
/// match handle.await {
///     Ok(message_id) => println!("published as {message_id}"),
///     Err(err) => eprintln!("publish failed: {err}"),
/// }
/// # }
/// ```
///
/// If the batch holding the message is dropped before resolving it, the handle resolves to
/// [PublishError::Unresolved] rather than waiting forever.
#[derive(Debug, Clone)]
pub struct PublishHandle {
    rx: watch::Receiver<Slot>,
}

impl PublishHandle {
    /// Waits for the outcome without consuming the handle.
    pub async fn result(&self) -> PublishResult {
        let mut rx = self.rx.clone();
        let ready = rx.wait_for(Option::is_some).await.map(|slot| (*slot).clone());

        let outcome = match ready {
            Ok(outcome) => outcome,
            // The resolver is gone. Anything it assigned before dropping is still visible.
            Err(_) => rx.borrow().clone(),
        };

        outcome.unwrap_or(Err(PublishError::Unresolved))
    }

    /// Returns the outcome if the handle has already been resolved.
    pub fn try_result(&self) -> Option<PublishResult> {
        self.rx.borrow().clone()
    }

    pub fn is_done(&self) -> bool {
        self.rx.borrow().is_some()
    }

    /// Blocks the current thread until the handle resolves.
    ///
    /// Must not be called from within an asynchronous context driven by the runtime that
    /// commits the batch, as that would stall the commit itself.
    pub fn wait_blocking(&self) -> PublishResult {
        futures::executor::block_on(self.result())
    }
}

impl IntoFuture for PublishHandle {
    type Output = PublishResult;
    type IntoFuture = BoxFuture<'static, PublishResult>;

    fn into_future(self) -> Self::IntoFuture {
        Box::pin(async move { self.result().await })
    }
}
