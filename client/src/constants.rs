//! Commonly used constants.

use std::time::Duration;

/// The largest publish request, in bytes, the server will accept.
///
/// Independent of [BatchSettings](crate::batching::BatchSettings): a message whose request would
/// exceed this size on its own can never be sent.
pub const SERVER_PUBLISH_MAX_BYTES: usize = 10 * 1000 * 1000;

/// The default `max_messages` setting for a batch.
pub const MAX_MESSAGES_DEFAULT: usize = 100;
/// The default `max_bytes` setting for a batch.
pub const MAX_BYTES_DEFAULT: usize = 1000 * 1000;
/// The default `max_latency` setting for a batch.
pub const MAX_LATENCY_DEFAULT: Duration = Duration::from_millis(10);
