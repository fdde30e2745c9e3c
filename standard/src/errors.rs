use std::fmt;
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;

pub type Result<T, E = CourierError> = std::result::Result<T, E>;

/// Why a batch was cancelled before (or while) being sent.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CancellationReason {
    /// A prior batch for the same ordering key failed, so this batch was failed fast to
    /// avoid publishing out of order.
    PriorOrderedMessageFailed,
}

impl CancellationReason {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::PriorOrderedMessageFailed => {
                "Batch cancelled because prior ordered message for the same key has failed. \
                 This batch has been cancelled to avoid out-of-order publish."
            }
        }
    }
}

impl fmt::Display for CancellationReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Error, Debug)]
pub enum SettingsError {
    #[error("Batch setting `max_bytes` must be greater than zero.")]
    ZeroMaxBytes,
}

/// Failures reported by a publish transport implementation.
///
/// Transports are responsible for their own retries, so by the time one of these reaches a
/// batch it is final. [RetryExhausted](TransportError::RetryExhausted) wraps the last failure
/// once a retry schedule has run out.
#[derive(Error, Debug)]
pub enum TransportError {
    #[error("Server rejected the publish request with status {code}: {message}")]
    Status { code: i32, message: String },

    #[error("The publish request timed out after {0:?}.")]
    Timeout(Duration),

    #[error("Retry attempts exhausted after {attempts} attempts.")]
    RetryExhausted {
        attempts: u32,
        #[source]
        last: Box<TransportError>,
    },
}

/// The failure a publish handle resolves to once its message has been admitted into a
/// batch.
///
/// Every handle of a failed batch receives a clone of the same error, so transport errors
/// are shared behind an [Arc].
#[derive(Error, Debug, Clone)]
pub enum PublishError {
    #[error(transparent)]
    Transport(Arc<TransportError>),

    #[error("Publish response contained {received} message IDs, expected {expected}.")]
    IdCountMismatch { expected: usize, received: usize },

    #[error("{0}")]
    Cancelled(CancellationReason),

    #[error("The batch finished without resolving this message.")]
    Unresolved,
}

impl PublishError {
    pub fn is_cancelled(&self) -> bool {
        matches!(self, Self::Cancelled(_))
    }
}

impl From<TransportError> for PublishError {
    fn from(value: TransportError) -> Self {
        Self::Transport(Arc::new(value))
    }
}

#[derive(Error, Debug)]
pub enum CourierError {
    #[error("Message request size ({size} bytes) is greater than the maximum allowed size ({max} bytes).")]
    MessageTooLarge { size: usize, max: usize },

    #[error(transparent)]
    InvalidSettings(#[from] SettingsError),

    #[error("Cannot publish a message with ordering key {0:?}: publishing for this key is paused after a prior failure.")]
    OrderingKeyPaused(String),

    #[error("Cannot publish a message with an ordering key when message ordering is not enabled.")]
    MessageOrderingDisabled,

    #[error("The publisher has been stopped.")]
    PublisherStopped,

    #[error("Ordering key {0:?} is not paused.")]
    SequencerNotPaused(String),

    #[error("A tokio runtime is required to schedule batch commits.")]
    NoRuntime,
}
