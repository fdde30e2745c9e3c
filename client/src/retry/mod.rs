//! Retry and timeout policies passed through to transports on every commit.

mod retry_strategy;

pub use retry_strategy::*;
