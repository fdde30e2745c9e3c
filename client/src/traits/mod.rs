//! Traits implemented by end-users to plug Courier into their own RPC stack.

mod transport;

pub use transport::*;
