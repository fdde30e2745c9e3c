use super::PublisherInner;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Weak};
use std::time::Duration;
use tokio::runtime::Handle;
use tokio::sync::mpsc::{self, Receiver, Sender};
use tokio_util::sync::CancellationToken;

/// Task container for the publisher's max-latency commit timer.
///
/// The CommitTimer spawns a background task that sleeps until armed. Once armed, it waits for the
/// batch latency to elapse and then commits the open batch of every sequencer. Arming an already
/// armed timer has no effect, so the latency is measured from the first publish after the timer
/// last fired.
#[derive(Debug)]
pub(crate) struct CommitTimer {
    armed: Arc<AtomicBool>,
    tx: Sender<()>,
    cancellation_token: CancellationToken,
}

impl CommitTimer {
    pub fn start(latency: Duration, runtime: &Handle, publisher: Weak<PublisherInner>) -> Arc<Self> {
        let armed = Arc::new(AtomicBool::new(false));
        let cancellation_token = CancellationToken::new();
        let (tx, rx) = mpsc::channel(1);

        let task = TimerTask {
            latency,
            armed: armed.clone(),
            cancellation_token: cancellation_token.clone(),
            publisher,
        };

        runtime.spawn(task.run(rx));

        Arc::new(Self {
            armed,
            tx,
            cancellation_token,
        })
    }

    pub fn arm(&self) {
        if !self.armed.swap(true, Ordering::AcqRel) {
            let _ = self.tx.try_send(());
        }
    }

    #[cfg(test)]
    pub fn is_armed(&self) -> bool {
        self.armed.load(Ordering::Acquire)
    }

    pub fn cancel(&self) {
        self.cancellation_token.cancel();
    }
}

impl Drop for CommitTimer {
    /// When the task container is dropped, a cancel signal will be dispatched in order to
    /// terminate the background task.
    fn drop(&mut self) {
        self.cancellation_token.cancel();
    }
}

struct TimerTask {
    latency: Duration,
    armed: Arc<AtomicBool>,
    cancellation_token: CancellationToken,
    publisher: Weak<PublisherInner>,
}

impl TimerTask {
    async fn run(self, mut rx: Receiver<()>) {
        loop {
            tokio::select! {
                signal = rx.recv() => {
                    if signal.is_none() {
                        break;
                    }
                }
                _ = self.cancellation_token.cancelled() => break,
            }

            tokio::select! {
                _ = tokio::time::sleep(self.latency) => {}
                _ = self.cancellation_token.cancelled() => break,
            }

            // Publishes racing with the commit below re-arm the timer for the next interval.
            self.armed.store(false, Ordering::Release);

            match self.publisher.upgrade() {
                Some(publisher) => publisher.commit_elapsed(),
                None => break,
            }
        }
    }
}
