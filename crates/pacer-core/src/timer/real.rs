use std::{
    fmt,
    sync::{
        Arc,
        atomic::{AtomicU8, Ordering},
    },
    time::Duration,
};

use async_trait::async_trait;
use tokio::{
    sync::mpsc,
    task::JoinHandle,
    time::{Instant, sleep},
};
use tracing::trace;

use crate::timer::Timer;

/// Arming is waiting for its deadline.
const ARMED: u8 = 0;
/// Deadline reached; the completion is (or is about to be) in the channel.
const FIRED: u8 = 1;
/// `stop` won the race; the background task never sends.
const STOPPED: u8 = 2;

/// Completion sent by the background task.
#[derive(Debug)]
struct Fire {
    generation: u64,
    at: Instant,
}

/// One `start` call: its background sleeper plus the state word that decides
/// the stop/fire race.
struct Arming {
    state: Arc<AtomicU8>,
    task: JoinHandle<()>,
}

/// Wall-clock timer backed by the Tokio time driver.
///
/// Each [`Timer::start`] spawns a task that sleeps for the requested duration and then
/// delivers the completion over a channel. The channel is created lazily on the first
/// `start`, so a never started timer has no completion source at all.
///
/// # Panics
/// `start` spawns onto the current Tokio runtime and panics outside of one.
#[derive(Default)]
pub struct RealTimer {
    generation: u64,
    arming: Option<Arming>,
    tx: Option<mpsc::UnboundedSender<Fire>>,
    rx: Option<mpsc::UnboundedReceiver<Fire>>,
}

impl RealTimer {
    /// Create a timer that has not been started yet.
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns `true` while the current arming waits for its deadline.
    pub fn is_armed(&self) -> bool {
        self.arming
            .as_ref()
            .is_some_and(|a| a.state.load(Ordering::Acquire) == ARMED)
    }

    /// Retires the current arming so its task can no longer send.
    fn disarm(&mut self) {
        if let Some(prev) = self.arming.take() {
            if prev
                .state
                .compare_exchange(ARMED, STOPPED, Ordering::AcqRel, Ordering::Acquire)
                .is_ok()
            {
                prev.task.abort();
            }
        }
    }

    fn sender(&mut self) -> mpsc::UnboundedSender<Fire> {
        if let Some(tx) = &self.tx {
            return tx.clone();
        }
        let (tx, rx) = mpsc::unbounded_channel();
        self.rx = Some(rx);
        self.tx.insert(tx).clone()
    }
}

#[async_trait]
impl Timer for RealTimer {
    fn start(&mut self, d: Duration) {
        self.disarm();

        let tx = self.sender();
        self.generation = self.generation.wrapping_add(1);
        let generation = self.generation;
        let state = Arc::new(AtomicU8::new(ARMED));

        let task = tokio::spawn({
            let state = Arc::clone(&state);
            async move {
                sleep(d).await;
                // No await point between the transition and the send, so an abort
                // can never separate them.
                if state
                    .compare_exchange(ARMED, FIRED, Ordering::AcqRel, Ordering::Acquire)
                    .is_ok()
                {
                    trace!(generation, "timer fired");
                    let _ = tx.send(Fire {
                        generation,
                        at: Instant::now(),
                    });
                }
            }
        });

        trace!(generation, delay = ?d, "timer armed");
        self.arming = Some(Arming { state, task });
    }

    fn stop(&mut self) -> bool {
        let Some(arming) = &self.arming else {
            return true;
        };
        match arming.state.compare_exchange(
            ARMED,
            STOPPED,
            Ordering::AcqRel,
            Ordering::Acquire,
        ) {
            Ok(_) => {
                arming.task.abort();
                trace!(generation = self.generation, "timer stopped before firing");
                true
            }
            Err(_) => false,
        }
    }

    async fn fired(&mut self) -> Instant {
        let generation = self.generation;
        let Some(rx) = self.rx.as_mut() else {
            return std::future::pending().await;
        };
        loop {
            match rx.recv().await {
                Some(fire) if fire.generation == generation => return fire.at,
                // Completion of an arming that was replaced before anyone observed it.
                Some(_) => continue,
                // `self.tx` keeps the channel open for as long as `self` lives.
                None => return std::future::pending().await,
            }
        }
    }
}

impl Drop for RealTimer {
    fn drop(&mut self) {
        self.disarm();
    }
}

impl fmt::Debug for RealTimer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RealTimer")
            .field("generation", &self.generation)
            .field("armed", &self.is_armed())
            .finish()
    }
}
