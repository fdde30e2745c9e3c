use super::{BatchTemplate, Sequencer};
use crate::batching::{Admission, Batch};
use crate::handle::PublishHandle;
use crate::logging;
use crate::publisher::CommitTimer;
use crate::PubsubMessage;
use courier_std::errors::{CancellationReason, CourierError, Result};
use parking_lot::Mutex;
use std::collections::VecDeque;
use std::sync::{Arc, Weak};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum OrderedStatus {
    AcceptingMessages,
    /// A batch failed. Publishing is refused until the key is resumed.
    Paused,
    Stopped,
    /// Every batch has been sent, and the sequencer may be discarded.
    Finished,
}

struct OrderedState {
    status: OrderedStatus,
    batches: VecDeque<Arc<Batch>>,
}

/// Sends the messages of one ordering key strictly one batch at a time.
///
/// Batches are queued in publish order and never commit themselves when full. Only the batch at
/// the front of the queue is ever committed, and the next one follows once the front batch is
/// done. If a batch fails, every queued batch is cancelled and the sequencer pauses until
/// resumed, so no later message can overtake a failed one.
pub(crate) struct OrderedSequencer {
    me: Weak<Self>,
    topic: String,
    ordering_key: String,
    template: BatchTemplate,
    timer: Arc<CommitTimer>,
    state: Mutex<OrderedState>,
}

impl OrderedSequencer {
    pub fn new(
        topic: impl Into<String>,
        ordering_key: impl Into<String>,
        mut template: BatchTemplate,
        timer: Arc<CommitTimer>,
    ) -> Arc<Self> {
        // A batch that seals on its first message would commit itself and bypass the queue.
        let max_messages = template.settings.message_limit().max(1);
        template.settings = template.settings.max_messages(max_messages);

        Arc::new_cyclic(|me| Self {
            me: me.clone(),
            topic: topic.into(),
            ordering_key: ordering_key.into(),
            template,
            timer,
            state: Mutex::new(OrderedState {
                status: OrderedStatus::AcceptingMessages,
                batches: VecDeque::new(),
            }),
        })
    }

    fn create_batch(&self) -> Result<Arc<Batch>> {
        let sequencer = self.me.clone();

        self.template
            .builder(&self.topic)
            .commit_when_full(false)
            .on_done(move |success| {
                if let Some(sequencer) = sequencer.upgrade() {
                    sequencer.batch_done(success);
                }
            })
            .build()
    }

    fn batch_done(&self, success: bool) {
        let mut state = self.state.lock();
        state.batches.pop_front();

        if !success {
            for batch in state.batches.drain(..) {
                batch.cancel(CancellationReason::PriorOrderedMessageFailed);
            }

            if state.status != OrderedStatus::Stopped {
                state.status = OrderedStatus::Paused;
                logging::publisher::ordering_key_paused(&self.topic, &self.ordering_key);
            }

            return;
        }

        let remaining = state.batches.len();

        if state.status == OrderedStatus::Stopped || remaining > 1 {
            // The next batch is sealed already, or nothing else will ever join it.
            commit_front(&state);
        } else if remaining == 1 {
            self.timer.arm();
        } else {
            state.status = OrderedStatus::Finished;
        }
    }
}

fn commit_front(state: &OrderedState) {
    if let Some(batch) = state.batches.front() {
        if !batch.is_empty() {
            batch.commit();
        }
    }
}

impl Sequencer for OrderedSequencer {
    fn publish(&self, mut message: PubsubMessage) -> Result<PublishHandle> {
        let mut state = self.state.lock();

        match state.status {
            OrderedStatus::Paused => {
                return Err(CourierError::OrderingKeyPaused(self.ordering_key.clone()))
            }
            OrderedStatus::Stopped => return Err(CourierError::PublisherStopped),
            OrderedStatus::Finished => state.status = OrderedStatus::AcceptingMessages,
            OrderedStatus::AcceptingMessages => {}
        }

        loop {
            let batch = match state.batches.back() {
                Some(batch) => batch.clone(),
                None => {
                    let batch = self.create_batch()?;
                    state.batches.push_back(batch.clone());
                    batch
                }
            };

            match batch.publish(message) {
                Ok(Admission::Accepted(handle)) => return Ok(handle),
                Ok(Admission::Rejected(rejected)) => {
                    let next = self.create_batch()?;
                    state.batches.push_back(next);
                    message = rejected;
                }
                Err(err) => {
                    if batch.is_empty() {
                        state.batches.pop_back();
                    }

                    if state.batches.is_empty() {
                        state.status = OrderedStatus::Finished;
                    }

                    return Err(err);
                }
            }
        }
    }

    fn commit(&self) {
        commit_front(&self.state.lock());
    }

    fn stop(&self) {
        let mut state = self.state.lock();
        state.status = OrderedStatus::Stopped;
        commit_front(&state);
    }

    fn unpause(&self) -> Result<()> {
        let mut state = self.state.lock();

        if state.status != OrderedStatus::Paused {
            return Err(CourierError::SequencerNotPaused(self.ordering_key.clone()));
        }

        state.status = OrderedStatus::AcceptingMessages;
        logging::publisher::ordering_key_resumed(&self.topic, &self.ordering_key);
        Ok(())
    }

    fn is_finished(&self) -> bool {
        self.state.lock().status == OrderedStatus::Finished
    }
}
