//! Re-exports commonly used types and traits.
//!
//! Aside from conveniently re-exporting the traits required to plug in a transport, the prelude
//! may continue to expand as the client API evolves, so it's encouraged to import the prelude to
//! help alleviate any migration efforts as new versions of the library are released.
//!
//! ```
//! use courier::prelude::*;
//! ```

pub use crate::batching::BatchSettings;
pub use crate::retry::RetryStrategy;
pub use crate::std::errors::{CourierError, PublishError, TransportError};
pub use crate::traits::PublishTransport;
