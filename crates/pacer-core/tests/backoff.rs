use std::{
    sync::{
        Arc,
        atomic::{AtomicBool, Ordering},
    },
    time::Duration,
};

use async_trait::async_trait;
use pacer_core::{Backoff, BackoffConfig, MockHandle, MockTimer, Timer};
use tokio::time::{Instant, timeout};
use tokio_util::sync::CancellationToken;

fn mocked(max_attempts: u32, factor: f64, min: Duration, max: Duration) -> Backoff<MockTimer> {
    Backoff::with_timer(
        BackoffConfig::new(max_attempts, factor, min, max),
        MockTimer::new(),
    )
}

fn manual(
    max_attempts: u32,
    factor: f64,
    min: Duration,
    max: Duration,
) -> (Backoff<MockTimer>, MockHandle) {
    let timer = MockTimer::manual();
    let handle = timer.handle();
    let b = Backoff::with_timer(BackoffConfig::new(max_attempts, factor, min, max), timer);
    (b, handle)
}

/// Timer whose fire is always "in flight" when stopped: `stop` fails and the
/// completion only shows up once someone drains it.
#[derive(Default)]
struct InFlightTimer {
    stopped: bool,
    drained: Arc<AtomicBool>,
}

#[async_trait]
impl Timer for InFlightTimer {
    fn start(&mut self, _: Duration) {}

    fn stop(&mut self) -> bool {
        self.stopped = true;
        false
    }

    async fn fired(&mut self) -> Instant {
        if !self.stopped {
            return std::future::pending().await;
        }
        self.drained.store(true, Ordering::SeqCst);
        Instant::now()
    }
}

#[tokio::test]
async fn attempt_starts_at_zero_and_increments() {
    let mut b = mocked(0, 0.0, Duration::ZERO, Duration::ZERO);
    assert_eq!(b.attempt(), 0);

    assert!(b.advance(&CancellationToken::new()).await);
    assert_eq!(b.attempt(), 1);
}

#[tokio::test]
async fn first_duration_is_zero_then_factor_times_min() {
    let mut b = mocked(0, 2.0, Duration::from_millis(500), Duration::from_secs(3));
    assert_eq!(b.duration(), Duration::ZERO);

    b.advance(&CancellationToken::new()).await;
    assert_eq!(b.duration(), Duration::from_secs(1));
}

#[tokio::test]
async fn duration_does_not_drop_below_min() {
    let mut b = mocked(0, 0.25, Duration::from_secs(1), Duration::from_secs(5));

    b.advance(&CancellationToken::new()).await;
    assert_eq!(b.duration(), Duration::from_secs(1));
}

#[tokio::test]
async fn duration_does_not_exceed_max() {
    let mut b = mocked(0, 2.0, Duration::from_secs(3), Duration::from_millis(500));
    let cancel = CancellationToken::new();

    assert!(b.advance(&cancel).await);
    assert_eq!(b.duration(), Duration::from_millis(500));

    let handle = b.timer().handle();
    assert!(b.advance(&cancel).await);
    assert_eq!(handle.last_duration(), Some(Duration::from_millis(500)));
}

#[tokio::test]
async fn duration_does_not_exceed_max_when_float_overflows() {
    let mut b = mocked(0, f64::MAX, Duration::from_secs(3), Duration::from_millis(500));

    b.advance(&CancellationToken::new()).await;
    assert_eq!(b.duration(), Duration::from_millis(500));
}

#[tokio::test]
async fn follows_configured_schedule_until_exhausted() {
    let mut b = mocked(3, 2.0, Duration::from_secs(1), Duration::from_secs(5));
    let handle = b.timer().handle();
    let cancel = CancellationToken::new();

    assert!(b.advance(&cancel).await);
    assert_eq!(b.duration(), Duration::from_secs(2));
    assert!(b.advance(&cancel).await);
    assert_eq!(b.duration(), Duration::from_secs(4));
    assert!(b.advance(&cancel).await);
    assert_eq!(b.duration(), Duration::from_secs(5));

    assert!(!b.advance(&cancel).await);
    assert_eq!(b.attempt(), 3);
    assert_eq!(b.duration(), Duration::from_secs(5), "stale delay is kept after exhaustion");

    // Attempt 0 skipped the timer; attempts 1 and 2 waited 2s and 4s.
    assert_eq!(handle.starts(), 2);
    assert_eq!(handle.last_duration(), Some(Duration::from_secs(4)));
}

#[tokio::test]
async fn exhausted_advance_leaves_state_untouched() {
    let mut b = mocked(1, 2.0, Duration::from_secs(1), Duration::from_secs(5));
    let handle = b.timer().handle();
    let cancel = CancellationToken::new();

    assert!(b.advance(&cancel).await);
    for _ in 0..3 {
        assert!(!b.advance(&cancel).await);
    }

    assert_eq!(b.attempt(), 1);
    assert!(!handle.started());
}

#[tokio::test]
async fn performs_exactly_max_attempts() {
    let mut b = mocked(5, 0.0, Duration::ZERO, Duration::ZERO);
    let cancel = CancellationToken::new();

    let mut runs = 0;
    while b.advance(&cancel).await {
        runs += 1;
    }

    assert_eq!(runs, 5);
    assert_eq!(b.attempt(), 5);
}

#[tokio::test]
async fn performs_exactly_max_attempts_with_delays() {
    let mut b = mocked(4, 2.0, Duration::from_millis(5), Duration::from_millis(50));
    let cancel = CancellationToken::new();

    let mut runs = 0;
    while b.advance(&cancel).await {
        runs += 1;
    }

    assert_eq!(runs, 4);
    assert_eq!(b.timer().handle().starts(), 3);
}

#[tokio::test]
async fn unlimited_attempts_never_exhaust() {
    let mut b = mocked(0, 2.0, Duration::from_millis(1), Duration::from_millis(10));
    let cancel = CancellationToken::new();

    for _ in 0..1_000 {
        assert!(b.advance(&cancel).await);
    }
    assert_eq!(b.attempt(), 1_000);
}

#[tokio::test]
async fn waits_grow_between_attempts() {
    let mut b = mocked(3, 2.0, Duration::from_millis(5), Duration::from_millis(50));
    let cancel = CancellationToken::new();

    let mut last = b.duration();
    while b.advance(&cancel).await {
        let d = b.duration();
        assert!(d > last, "expected {d:?} > {last:?}");
        last = d;
    }
}

#[tokio::test]
async fn cancelled_before_first_attempt_returns_false() {
    let mut b = mocked(0, 2.0, Duration::from_secs(1), Duration::from_secs(5));
    let handle = b.timer().handle();
    let cancel = CancellationToken::new();
    cancel.cancel();

    assert!(!b.advance(&cancel).await);
    assert_eq!(b.attempt(), 1, "cancelled attempt still counts");
    assert!(!handle.started());
}

#[tokio::test(start_paused = true)]
async fn cancellation_interrupts_wait_between_attempts() {
    let (mut b, handle) = manual(0, 3.0, Duration::from_secs(1), Duration::from_secs(5));
    let cancel = CancellationToken::new();

    assert!(b.advance(&cancel).await);

    let (proceed, ()) = tokio::join!(b.advance(&cancel), async { cancel.cancel() });

    assert!(!proceed);
    assert_eq!(b.attempt(), 2);
    assert!(handle.stopped());
    assert!(!handle.is_armed());
    assert_eq!(handle.last_duration(), Some(Duration::from_secs(3)));
}

#[tokio::test(start_paused = true)]
async fn cancellation_wins_over_manual_timer_that_never_fires() {
    let (mut b, handle) = manual(0, 2.0, Duration::from_secs(1), Duration::from_secs(5));
    let cancel = CancellationToken::new();

    b.advance(&cancel).await;
    let canceller = cancel.clone();
    let (proceed, ()) = tokio::join!(b.advance(&cancel), async move {
        tokio::time::sleep(Duration::from_millis(10)).await;
        canceller.cancel();
    });

    assert!(!proceed);
    assert_eq!(handle.stops(), 1);
}

#[tokio::test]
async fn cancellation_drains_completion_that_is_in_flight() {
    let drained = Arc::new(AtomicBool::new(false));
    let timer = InFlightTimer {
        stopped: false,
        drained: Arc::clone(&drained),
    };
    let mut b = Backoff::with_timer(
        BackoffConfig::new(0, 2.0, Duration::from_secs(1), Duration::from_secs(5)),
        timer,
    );
    let cancel = CancellationToken::new();

    assert!(b.advance(&cancel).await);
    cancel.cancel();

    assert!(!b.advance(&cancel).await);
    assert!(drained.load(Ordering::SeqCst), "pending completion was not drained");
}

#[tokio::test]
async fn fired_timer_lets_advance_proceed() {
    let (mut b, handle) = manual(0, 2.0, Duration::from_secs(1), Duration::from_secs(5));
    let cancel = CancellationToken::new();

    b.advance(&cancel).await;
    let (proceed, fired) = tokio::join!(b.advance(&cancel), async { handle.fire() });

    assert!(fired);
    assert!(proceed);
    assert!(!handle.stopped());
}

#[tokio::test]
async fn reset_behaves_like_fresh_controller() {
    let mut b = mocked(2, 2.0, Duration::from_secs(1), Duration::from_secs(5));
    let handle = b.timer().handle();
    let cancel = CancellationToken::new();

    assert!(b.advance(&cancel).await);
    assert!(b.advance(&cancel).await);
    assert!(!b.advance(&cancel).await);
    let starts = handle.starts();

    b.reset();
    assert_eq!(b.attempt(), 0);
    assert_eq!(b.duration(), Duration::ZERO);
    assert_eq!(handle.starts(), starts, "reset must not touch the timer");

    assert!(b.advance(&cancel).await);
    assert_eq!(b.duration(), Duration::from_secs(2));
    assert!(b.advance(&cancel).await);
    assert!(!b.advance(&cancel).await);
}

#[tokio::test(start_paused = true)]
async fn real_timer_waits_computed_delay() {
    let mut b = Backoff::new(2, 2.0, Duration::from_millis(10), Duration::from_secs(1));
    let cancel = CancellationToken::new();
    let begin = Instant::now();

    assert!(b.advance(&cancel).await);
    assert_eq!(begin.elapsed(), Duration::ZERO);

    assert!(b.advance(&cancel).await);
    assert!(begin.elapsed() >= Duration::from_millis(20));

    assert!(!b.advance(&cancel).await);
}

#[tokio::test(start_paused = true)]
async fn real_timer_wait_is_cut_short_by_cancellation() {
    let mut b = Backoff::new(0, 2.0, Duration::from_secs(3600), Duration::from_secs(3600));
    let cancel = CancellationToken::new();
    let begin = Instant::now();

    assert!(b.advance(&cancel).await);

    let canceller = cancel.clone();
    let (proceed, ()) = tokio::join!(b.advance(&cancel), async move {
        tokio::time::sleep(Duration::from_millis(10)).await;
        canceller.cancel();
    });

    assert!(!proceed);
    assert!(begin.elapsed() < Duration::from_secs(1));
    assert!(!b.timer().is_armed());
}

#[tokio::test(start_paused = true)]
async fn real_timer_is_reusable_after_cancellation() {
    let mut b = Backoff::new(0, 1.0, Duration::from_millis(50), Duration::from_millis(50));
    let cancel = CancellationToken::new();

    assert!(b.advance(&cancel).await);
    let canceller = cancel.clone();
    let (proceed, ()) = tokio::join!(b.advance(&cancel), async move {
        tokio::time::sleep(Duration::from_millis(10)).await;
        canceller.cancel();
    });
    assert!(!proceed);

    b.reset();
    let fresh = CancellationToken::new();
    assert!(b.advance(&fresh).await);

    let begin = Instant::now();
    assert!(timeout(Duration::from_secs(1), b.advance(&fresh)).await.unwrap());
    assert!(begin.elapsed() >= Duration::from_millis(50));
}
