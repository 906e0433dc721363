//! Exponential backoff controller for retry loops.
//!
//! [`Backoff`] owns the attempt counter, computes the delay for the current attempt and
//! performs the wait through its [`Timer`]. Whether an operation gets retried at all is
//! the caller's business: the loop simply stops calling [`Backoff::advance`].
mod delay;

use std::{fmt, time::Duration};

use pacer_model::BackoffConfig;
use tokio_util::sync::CancellationToken;
use tracing::debug;

use crate::timer::{RealTimer, Timer};

/// Exponential backoff state machine.
///
/// Attempt `0` runs immediately, every following attempt waits for [`Backoff::duration`].
/// Designed to drive a loop:
///
/// ```no_run
/// use std::time::Duration;
/// use pacer_core::Backoff;
/// use tokio_util::sync::CancellationToken;
///
/// # async fn run() {
/// let cancel = CancellationToken::new();
/// let mut backoff = Backoff::new(3, 2.0, Duration::from_secs(1), Duration::from_secs(5));
///
/// while backoff.advance(&cancel).await {
///     // Do work: `continue` on soft failure, `break` on success or fatal error.
/// }
/// # }
/// ```
///
/// A controller is owned by one retry loop; it does no internal locking.
pub struct Backoff<T: Timer = RealTimer> {
    attempt: u32,
    config: BackoffConfig,
    timer: T,
}

impl Backoff<RealTimer> {
    /// Create a controller backed by the wall clock.
    ///
    /// Never fails: degenerate parameters are resolved by clamping, see [`Backoff::duration`].
    pub fn new(max_attempts: u32, factor: f64, min_delay: Duration, max_delay: Duration) -> Self {
        Self::from_config(BackoffConfig::new(
            max_attempts,
            factor,
            min_delay,
            max_delay,
        ))
    }

    /// Create a wall-clock controller from a loaded configuration.
    pub fn from_config(config: BackoffConfig) -> Self {
        Self::with_timer(config, RealTimer::new())
    }
}

impl<T: Timer> Backoff<T> {
    /// Create a controller that waits through the given timer.
    pub fn with_timer(config: BackoffConfig, timer: T) -> Self {
        Self {
            attempt: 0,
            config,
            timer,
        }
    }

    /// Number of attempts begun so far.
    #[inline]
    pub fn attempt(&self) -> u32 {
        self.attempt
    }

    /// Parameters this controller was built with.
    #[inline]
    pub fn config(&self) -> &BackoffConfig {
        &self.config
    }

    /// Timer used for the waits.
    #[inline]
    pub fn timer(&self) -> &T {
        &self.timer
    }

    /// Delay that [`Backoff::advance`] will wait for the current attempt.
    ///
    /// `0` for attempt `0`, otherwise `min_delay * factor^attempt` clamped into
    /// `[min_delay, max_delay]`. Values too large to represent clamp to `max_delay`.
    /// Once the attempt budget is exhausted this keeps returning the last delay.
    pub fn duration(&self) -> Duration {
        delay::delay_for(&self.config, self.attempt)
    }

    /// Returns `true` when no further attempt is allowed.
    pub fn is_exhausted(&self) -> bool {
        self.config.max_attempts != 0 && self.attempt >= self.config.max_attempts
    }

    /// Begins the next attempt, waiting out its delay first.
    ///
    /// Returns `false` without touching any state if the attempt budget is exhausted.
    /// Otherwise the attempt counter is incremented before waiting, so an attempt whose
    /// wait gets cancelled still counts. Returns `false` if `cancel` fires before the
    /// delay elapses (or is already cancelled for a zero delay), `true` otherwise.
    pub async fn advance(&mut self, cancel: &CancellationToken) -> bool {
        if self.is_exhausted() {
            debug!(attempt = self.attempt, "backoff exhausted");
            return false;
        }

        let delay = self.duration();
        self.attempt = self.attempt.saturating_add(1);

        if delay.is_zero() {
            return !cancel.is_cancelled();
        }

        debug!(
            attempt = self.attempt,
            delay_ms = u64::try_from(delay.as_millis()).unwrap_or(u64::MAX),
            "waiting before attempt"
        );
        self.timer.start(delay);

        let cancelled = tokio::select! {
            _ = cancel.cancelled() => true,
            _ = self.timer.fired() => false,
        };
        if !cancelled {
            return true;
        }

        if !self.timer.stop() {
            // The fire raced the cancellation; consume it so the next arming starts clean.
            self.timer.fired().await;
        }
        debug!(attempt = self.attempt, "backoff wait cancelled");
        false
    }

    /// Rewinds the attempt counter to `0`. The timer is left as is.
    ///
    /// Must not be called while an [`Backoff::advance`] of this controller is in flight.
    pub fn reset(&mut self) {
        self.attempt = 0;
    }
}

impl<T: Timer> fmt::Debug for Backoff<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Backoff")
            .field("attempt", &self.attempt)
            .field("config", &self.config)
            .field("timer", &"<timer>")
            .finish()
    }
}

impl<T: Timer> fmt::Display for Backoff<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "Backoff(attempt={}, next={:?}, max_attempts={})",
            self.attempt,
            self.duration(),
            self.config.max_attempts
        )
    }
}
