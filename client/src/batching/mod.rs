//! Accumulation of published messages into batches.
//!
//! Sending every message in a request of its own is wasteful for chatty publishers, so messages
//! are collected into a [Batch] and sent to the [PublishTransport](crate::traits::PublishTransport)
//! together.
//!
//! # Batching Algorithm
//!
//! A batch is tuned by a [BatchSettings] instance, which specifies the maximum number of
//! messages, the maximum request size in bytes, and the maximum latency. The batch keeps admitting
//! messages until either limit is reached, at which point it is sealed and committed. The
//! latency limit is enforced by the [Publisher](crate::Publisher), which commits any open batch
//! once the interval elapses.
//!
//! Independently of the settings, a batch never grows past the server's request size limit. A
//! message that would push the request over it is handed back to the caller and the batch is
//! committed without it.
//!
//! Once the transport answers, every [PublishHandle](crate::PublishHandle) of the batch resolves:
//! to the message ID at the same position in the response, or to the error shared by the whole
//! batch.

mod batch;
mod batch_settings;
mod status;

pub use batch::*;
pub use batch_settings::*;
pub use status::*;
