//! Inter-task pauses.

use std::sync::{Condvar, Mutex, PoisonError};
use std::time::{Duration, Instant};

use tracing::debug;

use crate::context::ExecutionContext;
use crate::handler::HandlerScope;
use crate::phase::{Phase, PhaseListener};

/// Sleeps between tasks. No pause precedes the first task of a session;
/// every later task waits `current`, which resets to the default after each
/// task and can be overridden for the next one (e.g. to skip the pause after
/// inserted feedback).
#[derive(Debug, Clone)]
pub struct PauseHandler {
    default: Duration,
    current: Duration,
}

impl PauseHandler {
    pub fn new(default: Duration) -> Self {
        Self {
            default,
            current: Duration::ZERO,
        }
    }

    pub fn default_pause(&self) -> Duration {
        self.default
    }

    pub fn current(&self) -> Duration {
        self.current
    }

    pub fn set_current(&mut self, current: Duration) {
        self.current = current;
    }
}

impl PhaseListener for PauseHandler {
    fn process_phase(&mut self, phase: Phase, scope: &HandlerScope, ctx: &mut ExecutionContext) {
        match phase {
            Phase::SessionStart => self.current = Duration::ZERO,
            Phase::PreTaskExecution if !self.current.is_zero() => {
                let completed = ctx.handle().pause(self.current);
                debug!(handler = %scope.id, pause_ms = self.current.as_millis() as u64, completed, "inter-task pause");
            }
            Phase::PostTaskExecution => self.current = self.default,
            _ => {}
        }
    }
}

#[derive(Debug, Default)]
struct PauseState {
    sleeping: bool,
    interrupted: bool,
}

/// Interruptible sleep shared between the scheduler and the executor handle.
#[derive(Debug, Default)]
pub struct PauseSignal {
    state: Mutex<PauseState>,
    wake: Condvar,
}

impl PauseSignal {
    /// Sleep for `duration`. Returns false when interrupted early, or at once
    /// when an interrupt arrived since the last [`clear`](Self::clear).
    pub fn sleep(&self, duration: Duration) -> bool {
        let deadline = Instant::now() + duration;
        let mut state = self.state.lock().unwrap_or_else(PoisonError::into_inner);
        state.sleeping = true;
        loop {
            if state.interrupted {
                break;
            }
            let now = Instant::now();
            if now >= deadline {
                break;
            }
            state = self
                .wake
                .wait_timeout(state, deadline - now)
                .unwrap_or_else(PoisonError::into_inner)
                .0;
        }
        state.sleeping = false;
        !state.interrupted
    }

    /// Wake a sleeping pause, or cut short the next one. Returns false when
    /// nothing was sleeping.
    pub fn interrupt(&self) -> bool {
        let mut state = self.state.lock().unwrap_or_else(PoisonError::into_inner);
        state.interrupted = true;
        self.wake.notify_all();
        state.sleeping
    }

    /// Forget an earlier interrupt. Called whenever a new task begins.
    pub fn clear(&self) {
        self.state.lock().unwrap_or_else(PoisonError::into_inner).interrupted = false;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::thread;

    #[test]
    fn sleep_runs_to_completion() {
        let signal = PauseSignal::default();
        let start = Instant::now();
        assert!(signal.sleep(Duration::from_millis(20)));
        assert!(start.elapsed() >= Duration::from_millis(20));
        assert!(!signal.interrupt());
    }

    #[test]
    fn interrupt_cuts_a_long_pause_short() {
        let signal = Arc::new(PauseSignal::default());
        let sleeper = {
            let signal = Arc::clone(&signal);
            thread::spawn(move || {
                let start = Instant::now();
                let completed = signal.sleep(Duration::from_millis(5000));
                (completed, start.elapsed())
            })
        };
        thread::sleep(Duration::from_millis(20));
        signal.interrupt();
        let (completed, elapsed) = sleeper.join().expect("join");
        assert!(!completed);
        assert!(elapsed < Duration::from_millis(2000));
    }

    #[test]
    fn interrupt_before_sleep_skips_the_pause_until_cleared() {
        let signal = PauseSignal::default();
        assert!(!signal.interrupt());
        let start = Instant::now();
        assert!(!signal.sleep(Duration::from_millis(5000)));
        assert!(start.elapsed() < Duration::from_millis(1000));

        signal.clear();
        assert!(signal.sleep(Duration::from_millis(10)));
    }

    #[test]
    fn pause_follows_the_session_lifecycle() {
        let mut handler = PauseHandler::new(Duration::from_millis(500));
        assert_eq!(handler.current(), Duration::ZERO);
        handler.set_current(Duration::from_millis(7));
        assert_eq!(handler.current(), Duration::from_millis(7));
        assert_eq!(handler.default_pause(), Duration::from_millis(500));
    }
}
