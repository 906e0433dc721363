//! Exponential backoff for async retry loops.
//!
//! - [`Backoff`] computes the delay of each attempt and waits it out, racing a
//!   [`tokio_util::sync::CancellationToken`].
//! - [`timer`] holds the wait mechanics: the [`Timer`] trait, the Tokio-backed
//!   [`RealTimer`] and the deterministic [`MockTimer`] for tests.
pub mod backoff;
pub mod timer;

pub use backoff::Backoff;
pub use pacer_model::BackoffConfig;
pub use timer::{MockHandle, MockTimer, RealTimer, Timer};

pub mod prelude {
    pub use crate::backoff::Backoff;
    pub use crate::timer::{RealTimer, Timer};
    pub use pacer_model::BackoffConfig;
}
