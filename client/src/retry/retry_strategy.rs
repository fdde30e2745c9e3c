use crate::logging;
use courier_std::errors::TransportError;
use std::future::Future;
use std::time::Duration;

const DEFAULT_ATTEMPTS: u32 = 5;
const DEFAULT_STEP: Duration = Duration::from_millis(100);

/// The retry policy a batch hands to its [PublishTransport](crate::traits::PublishTransport).
///
/// A strategy is an explicit schedule of delays, one per retry attempt. The batching engine never
/// interprets it. Transports either walk [RetryStrategy::delays] themselves, deciding which
/// failures are worth retrying, or hand each attempt to [RetryStrategy::run].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RetryStrategy(Vec<Duration>);

impl RetryStrategy {
    /// Waits `step`, then `2 * step`, and so on.
    pub fn linear(attempts: u32, step: Duration) -> Self {
        Self((1..=attempts).map(|n| step.saturating_mul(n)).collect())
    }

    pub fn constant(attempts: u32, step: Duration) -> Self {
        Self(vec![step; attempts as usize])
    }

    /// Waits `step`, then `base * step`, then `base^2 * step`, and so on.
    pub fn exponential(attempts: u32, base: u32, step: Duration) -> Self {
        Self(
            (0..attempts)
                .map(|n| step.saturating_mul(base.saturating_pow(n)))
                .collect(),
        )
    }

    /// Caps every delay in the schedule at `max`.
    pub fn with_max_delay(self, max: Duration) -> Self {
        Self(self.0.into_iter().map(|delay| delay.min(max)).collect())
    }

    pub fn attempts(&self) -> usize {
        self.0.len()
    }

    pub fn delays(&self) -> impl Iterator<Item = Duration> + '_ {
        self.0.iter().copied()
    }

    /// Runs `attempt` until it succeeds, sleeping for the next delay of the schedule after each
    /// failure.
    ///
    /// # Errors
    ///
    /// Returns [TransportError::RetryExhausted] carrying the last failure once every scheduled
    /// retry has failed. An empty schedule runs `attempt` once and returns its failure as is.
    pub async fn run<T, F, Fut>(&self, mut attempt: F) -> Result<T, TransportError>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T, TransportError>>,
    {
        let mut attempts = 1;
        let mut delays = self.delays();

        loop {
            let err = match attempt().await {
                Ok(value) => return Ok(value),
                Err(err) => err,
            };

            let Some(delay) = delays.next() else {
                return Err(if attempts == 1 {
                    err
                } else {
                    TransportError::RetryExhausted {
                        attempts,
                        last: Box::new(err),
                    }
                });
            };

            logging::batch::retrying(attempts, delay, &err);
            tokio::time::sleep(delay).await;
            attempts += 1;
        }
    }
}

impl Default for RetryStrategy {
    fn default() -> Self {
        Self::exponential(DEFAULT_ATTEMPTS, 2, DEFAULT_STEP)
    }
}

impl From<&[Duration]> for RetryStrategy {
    fn from(value: &[Duration]) -> Self {
        Self(value.to_vec())
    }
}

impl std::cmp::PartialEq<&[Duration]> for RetryStrategy {
    fn eq(&self, other: &&[Duration]) -> bool {
        &self.0 == other
    }
}
