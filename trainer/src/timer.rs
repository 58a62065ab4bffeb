//! One-shot deadline timer backed by a short-lived thread.

use std::sync::{Arc, Condvar, Mutex, PoisonError};
use std::thread;
use std::time::{Duration, Instant};

use tracing::warn;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TimerState {
    Idle,
    Armed,
    Fired,
    Cancelled,
}

struct Inner {
    state: TimerState,
    generation: u64,
    started: Option<Instant>,
}

struct Shared {
    inner: Mutex<Inner>,
    wake: Condvar,
}

/// Runs a callback once after a delay unless cancelled first.
///
/// The callback runs at most once per arming, and never after a successful
/// [`cancel`](Self::cancel).
pub struct DeadlineTimer {
    shared: Arc<Shared>,
}

impl Default for DeadlineTimer {
    fn default() -> Self {
        Self::new()
    }
}

impl DeadlineTimer {
    pub fn new() -> Self {
        Self {
            shared: Arc::new(Shared {
                inner: Mutex::new(Inner {
                    state: TimerState::Idle,
                    generation: 0,
                    started: None,
                }),
                wake: Condvar::new(),
            }),
        }
    }

    /// Arm the timer. Returns false when it is already armed.
    pub fn start<F>(&self, duration: Duration, on_fire: F) -> bool
    where
        F: FnOnce() + Send + 'static,
    {
        let generation = {
            let mut inner = self.shared.lock();
            if inner.state == TimerState::Armed {
                return false;
            }
            inner.generation += 1;
            inner.state = TimerState::Armed;
            inner.started = Some(Instant::now());
            inner.generation
        };
        let shared = Arc::clone(&self.shared);
        let spawned = thread::Builder::new()
            .name("deadline-timer".to_string())
            .spawn(move || shared.run(generation, duration, on_fire));
        if let Err(err) = spawned {
            warn!(%err, "failed to spawn deadline timer thread");
            self.shared.lock().state = TimerState::Cancelled;
            return false;
        }
        true
    }

    /// Disarm the timer. Returns the time since arming when this call
    /// prevented the callback, `None` when the timer was not armed.
    pub fn cancel(&self) -> Option<Duration> {
        let mut inner = self.shared.lock();
        if inner.state != TimerState::Armed {
            return None;
        }
        inner.state = TimerState::Cancelled;
        self.shared.wake.notify_all();
        inner.started.map(|started| started.elapsed())
    }

    pub fn state(&self) -> TimerState {
        self.shared.lock().state
    }

    pub fn is_armed(&self) -> bool {
        self.state() == TimerState::Armed
    }

    /// Time since the timer was last armed.
    pub fn elapsed(&self) -> Option<Duration> {
        self.shared.lock().started.map(|started| started.elapsed())
    }
}

impl Drop for DeadlineTimer {
    fn drop(&mut self) {
        self.cancel();
    }
}

impl Shared {
    fn lock(&self) -> std::sync::MutexGuard<'_, Inner> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn run<F: FnOnce()>(&self, generation: u64, duration: Duration, on_fire: F) {
        let deadline = Instant::now() + duration;
        let mut inner = self.lock();
        loop {
            if inner.generation != generation || inner.state != TimerState::Armed {
                return;
            }
            let now = Instant::now();
            if now >= deadline {
                inner.state = TimerState::Fired;
                break;
            }
            inner = self
                .wake
                .wait_timeout(inner, deadline - now)
                .unwrap_or_else(PoisonError::into_inner)
                .0;
        }
        drop(inner);
        on_fire();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::mpsc;

    #[test]
    fn fires_once_after_the_delay() {
        let timer = DeadlineTimer::new();
        let (tx, rx) = mpsc::channel();
        assert!(timer.start(Duration::from_millis(20), move || tx.send(()).expect("send")));
        rx.recv_timeout(Duration::from_secs(5)).expect("fired");
        assert_eq!(timer.state(), TimerState::Fired);
        assert_eq!(timer.cancel(), None);
    }

    #[test]
    fn cancel_prevents_the_callback() {
        let timer = DeadlineTimer::new();
        let fired = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&fired);
        timer.start(Duration::from_millis(200), move || {
            counter.fetch_add(1, Ordering::SeqCst);
        });
        assert!(timer.cancel().is_some());
        assert!(timer.cancel().is_none());
        thread::sleep(Duration::from_millis(300));
        assert_eq!(fired.load(Ordering::SeqCst), 0);
        assert_eq!(timer.state(), TimerState::Cancelled);
    }

    #[test]
    fn rearming_while_armed_is_refused() {
        let timer = DeadlineTimer::new();
        assert!(timer.start(Duration::from_secs(10), || {}));
        assert!(!timer.start(Duration::from_secs(10), || {}));
        timer.cancel();
        assert!(timer.start(Duration::from_secs(10), || {}));
    }
}
