use std::fmt;

/// Lifecycle of a [Batch](super::Batch).
///
/// Statuses only ever move forward:
/// `AcceptingMessages -> Starting -> InProgress -> {Success, Error}`. A cancelled batch jumps
/// straight to `Error` from either of the first two.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum BatchStatus {
    AcceptingMessages,
    Starting,
    InProgress,
    Success,
    Error,
}

impl BatchStatus {
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Success | Self::Error)
    }
}

impl fmt::Display for BatchStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let status = match self {
            Self::AcceptingMessages => "accepting messages",
            Self::Starting => "starting",
            Self::InProgress => "in progress",
            Self::Success => "success",
            Self::Error => "error",
        };

        f.write_str(status)
    }
}
