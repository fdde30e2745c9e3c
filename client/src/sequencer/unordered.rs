use super::{BatchTemplate, Sequencer};
use crate::batching::{Admission, Batch};
use crate::handle::PublishHandle;
use crate::PubsubMessage;
use courier_std::errors::{CourierError, Result};
use parking_lot::Mutex;
use std::sync::Arc;

#[derive(Default)]
struct UnorderedState {
    current: Option<Arc<Batch>>,
    stopped: bool,
}

/// Sends the messages of one topic in as few batches as possible, with no ordering guarantees
/// across batches.
pub(crate) struct UnorderedSequencer {
    topic: String,
    template: BatchTemplate,
    state: Mutex<UnorderedState>,
}

impl UnorderedSequencer {
    pub fn new(topic: impl Into<String>, template: BatchTemplate) -> Self {
        Self {
            topic: topic.into(),
            template,
            state: Mutex::default(),
        }
    }
}

impl Sequencer for UnorderedSequencer {
    fn publish(&self, mut message: PubsubMessage) -> Result<PublishHandle> {
        let mut state = self.state.lock();

        if state.stopped {
            return Err(CourierError::PublisherStopped);
        }

        loop {
            let batch = match &state.current {
                Some(batch) => batch.clone(),
                None => {
                    let batch = self.template.builder(&self.topic).build()?;
                    state.current = Some(batch.clone());
                    batch
                }
            };

            match batch.publish(message)? {
                Admission::Accepted(handle) => return Ok(handle),
                Admission::Rejected(rejected) => {
                    // Sealed batches are committed by whoever sealed them.
                    state.current = None;
                    message = rejected;
                }
            }
        }
    }

    fn commit(&self) {
        if let Some(batch) = self.state.lock().current.take() {
            batch.commit();
        }
    }

    fn stop(&self) {
        let mut state = self.state.lock();
        state.stopped = true;

        if let Some(batch) = state.current.take() {
            batch.commit();
        }
    }

    fn unpause(&self) -> Result<()> {
        Err(CourierError::SequencerNotPaused(String::new()))
    }

    fn is_finished(&self) -> bool {
        true
    }
}
