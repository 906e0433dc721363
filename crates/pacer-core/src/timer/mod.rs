//! Single-fire, restartable timer used by [`crate::Backoff`] to perform its waits.
//!
//! The backoff controller only decides *how long* to wait. Waiting itself goes through
//! [`Timer`], so the controller can run against the wall clock ([`RealTimer`]) or against
//! a deterministic double in tests ([`MockTimer`]).
mod real;
pub use real::RealTimer;

mod mock;
pub use mock::{MockHandle, MockTimer};

use std::time::Duration;

use async_trait::async_trait;
use tokio::time::Instant;

/// Restartable, stoppable, single-fire alarm.
///
/// Contract:
/// - Before the first [`Timer::start`], [`Timer::fired`] never resolves (and never panics).
/// - After `start`, exactly one completion becomes observable through `fired`, unless
///   [`Timer::stop`] returns `true` first.
/// - `start` on an already started timer re-arms it. A completion left over from a previous
///   arming is never delivered to a later `fired` call.
/// - `stop` returns `true` if it prevented a pending fire and `false` if the timer has
///   already fired (or was already stopped). On `false` the caller must drain the completion:
///
/// ```ignore
/// if !timer.stop() {
///     timer.fired().await;
/// }
/// ```
///
/// Draining must not run concurrently with another `fired` call, and only makes sense when
/// the completion has not been observed yet, otherwise it waits forever.
#[async_trait]
pub trait Timer: Send {
    /// Arms (or re-arms) the timer to fire after `d`.
    fn start(&mut self, d: Duration);

    /// Prevents the timer from firing.
    fn stop(&mut self) -> bool;

    /// Resolves with the fire instant once the current arming fires.
    ///
    /// Cancel safe: dropping the future before it resolves loses no completion.
    async fn fired(&mut self) -> Instant;
}
