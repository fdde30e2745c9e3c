//! Shared definitions for the Courier publish batching client.
//!
//! Courier Standard holds the error taxonomy used across the Courier crates, so that transport
//! implementations can report failures without depending on the batching engine itself.
//!
//! Errors fall into two families:
//!
//! - [CourierError](errors::CourierError): returned synchronously from publish calls, before a
//!   message has been admitted into a batch.
//! - [PublishError](errors::PublishError): delivered through a message's publish handle once the
//!   batch carrying it has been sent, failed, or cancelled.
//!
//! Transports report their own failures as [TransportError](errors::TransportError), which is
//! forwarded verbatim to every handle of the failed batch.

pub mod errors;
