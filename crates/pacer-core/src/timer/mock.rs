use std::{
    sync::{Arc, Mutex, MutexGuard},
    time::Duration,
};

use async_trait::async_trait;
use tokio::{sync::mpsc, time::Instant};

use crate::timer::Timer;

/// When a [`MockTimer`] fires after `start`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum FireMode {
    /// Fires synchronously inside `start`.
    Immediate,
    /// Fires only when [`MockHandle::fire`] is called.
    Manual,
}

#[derive(Debug)]
struct MockState {
    mode: FireMode,
    generation: u64,
    armed: bool,
    pending: bool,
    started: bool,
    stopped: bool,
    starts: u32,
    stops: u32,
    last_duration: Option<Duration>,
}

#[derive(Debug)]
struct Shared {
    state: Mutex<MockState>,
    tx: mpsc::UnboundedSender<u64>,
}

impl Shared {
    fn lock(&self) -> MutexGuard<'_, MockState> {
        self.state.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// Queues a completion for the current arming.
    fn fire_locked(&self, st: &mut MockState) {
        st.armed = false;
        st.pending = true;
        let _ = self.tx.send(st.generation);
    }
}

/// Deterministic [`Timer`] for tests: never waits on the clock.
///
/// [`MockTimer::new`] fires as soon as it is started. [`MockTimer::manual`] stays armed
/// until the test calls [`MockHandle::fire`], which makes cancellation paths reproducible.
/// Calls are recorded and exposed through [`MockTimer::handle`].
#[derive(Debug)]
pub struct MockTimer {
    shared: Arc<Shared>,
    rx: mpsc::UnboundedReceiver<u64>,
}

impl MockTimer {
    /// Mock that fires immediately on every `start`.
    pub fn new() -> Self {
        Self::with_mode(FireMode::Immediate)
    }

    /// Mock that fires only on [`MockHandle::fire`].
    pub fn manual() -> Self {
        Self::with_mode(FireMode::Manual)
    }

    fn with_mode(mode: FireMode) -> Self {
        let (tx, rx) = mpsc::unbounded_channel();
        let state = MockState {
            mode,
            generation: 0,
            armed: false,
            pending: false,
            started: false,
            stopped: false,
            starts: 0,
            stops: 0,
            last_duration: None,
        };
        Self {
            shared: Arc::new(Shared {
                state: Mutex::new(state),
                tx,
            }),
            rx,
        }
    }

    /// Cloneable view of the recorded calls, usable after the timer moved into a
    /// [`crate::Backoff`].
    pub fn handle(&self) -> MockHandle {
        MockHandle {
            shared: Arc::clone(&self.shared),
        }
    }
}

impl Default for MockTimer {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Timer for MockTimer {
    fn start(&mut self, d: Duration) {
        let mut st = self.shared.lock();
        st.generation += 1;
        st.started = true;
        st.starts += 1;
        st.last_duration = Some(d);
        st.pending = false;
        st.armed = true;

        if st.mode == FireMode::Immediate {
            self.shared.fire_locked(&mut st);
        }
    }

    fn stop(&mut self) -> bool {
        let mut st = self.shared.lock();
        st.stopped = true;
        st.stops += 1;

        if st.armed {
            st.armed = false;
            return true;
        }
        !st.started
    }

    async fn fired(&mut self) -> Instant {
        let started = self.shared.lock().started;
        if !started {
            return std::future::pending().await;
        }
        while let Some(generation) = self.rx.recv().await {
            let mut st = self.shared.lock();
            if generation == st.generation {
                st.pending = false;
                return Instant::now();
            }
        }
        std::future::pending().await
    }
}

/// Shared view over a [`MockTimer`].
#[derive(Debug, Clone)]
pub struct MockHandle {
    shared: Arc<Shared>,
}

impl MockHandle {
    /// Fires the current arming. Returns `false` if nothing was armed.
    pub fn fire(&self) -> bool {
        let mut st = self.shared.lock();
        if !st.armed {
            return false;
        }
        self.shared.fire_locked(&mut st);
        true
    }

    /// Whether `start` was ever called.
    pub fn started(&self) -> bool {
        self.shared.lock().started
    }

    /// Whether `stop` was ever called.
    pub fn stopped(&self) -> bool {
        self.shared.lock().stopped
    }

    /// Number of `start` calls.
    pub fn starts(&self) -> u32 {
        self.shared.lock().starts
    }

    /// Number of `stop` calls.
    pub fn stops(&self) -> u32 {
        self.shared.lock().stops
    }

    /// Duration passed to the most recent `start`.
    pub fn last_duration(&self) -> Option<Duration> {
        self.shared.lock().last_duration
    }

    /// Whether the current arming waits for [`MockHandle::fire`].
    pub fn is_armed(&self) -> bool {
        self.shared.lock().armed
    }

    /// Whether a completion was delivered but not yet observed.
    pub fn is_pending(&self) -> bool {
        self.shared.lock().pending
    }
}
