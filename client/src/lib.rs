//! A client-side publish batching engine.
//!
//! Courier collects the messages an application publishes into batches and hands each batch to a
//! user-provided [PublishTransport](crate::traits::PublishTransport) in a single request. Every
//! published message gets a [PublishHandle] right away, which resolves to the server-assigned
//! message ID, or to the error that failed its batch, once the batch has been sent.
//!
//! The [Publisher] is the usual entry point. It keeps one open batch per topic, or a queue of
//! batches per ordering key when message ordering is enabled, and sends batches when they fill
//! up, when their latency budget elapses, or when flushed.
//!
//! ```no_run
//! use anyhow::Result;
//! use courier::prelude::*;
//! use courier::{Publisher, PubsubMessage};
//!
//! async fn run(transport: impl PublishTransport) -> Result<()> {
//!     let publisher = Publisher::builder(transport).build()?;
//!
//!     let handle = publisher.publish("projects/acme/topics/stocks", PubsubMessage::new("ACME 120.5"))?;
//!     let message_id = handle.await?;
//!
//!     println!("{message_id}");
//!     Ok(())
//! }
//! ```

mod handle;
mod message;
mod publisher;

pub mod batching;
pub mod constants;
pub(crate) mod logging;
pub mod prelude;
pub mod retry;
pub(crate) mod sequencer;
pub mod size;
pub mod traits;

#[cfg(test)]
pub(crate) mod testing;

pub use handle::*;
pub use message::*;
pub use publisher::{Publisher, PublisherBuilder};

pub mod std {
    pub use courier_std::*;
}
