//! Per-task deadlines.

use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;

use tracing::{debug, warn};

use crate::context::ExecutionContext;
use crate::data::props;
use crate::exec::{CancelToken, Executable};
use crate::handler::HandlerScope;
use crate::phase::{Phase, PhaseListener};
use crate::timer::{DeadlineTimer, TimerState};

struct TimeoutInner {
    duration: Duration,
    timer: DeadlineTimer,
    reaction: Mutex<Option<Duration>>,
}

/// Shared control over one deadline. Tasks receive a clone through
/// [`TaskEnv`](crate::exec::TaskEnv) so they can stop the clock at the moment
/// of the response.
#[derive(Clone)]
pub struct TimeoutControl {
    inner: Arc<TimeoutInner>,
}

impl TimeoutControl {
    pub fn new(duration: Duration) -> Self {
        Self {
            inner: Arc::new(TimeoutInner {
                duration,
                timer: DeadlineTimer::new(),
                reaction: Mutex::new(None),
            }),
        }
    }

    pub fn duration(&self) -> Duration {
        self.inner.duration
    }

    /// Arm the deadline; on expiry `token` is set and `target` is cancelled.
    /// Returns false when the deadline is already running.
    pub fn start(&self, target: Arc<dyn Executable>, token: CancelToken) -> bool {
        *self.reaction_slot() = None;
        let duration = self.inner.duration;
        self.inner.timer.start(duration, move || {
            warn!(task = target.local_id(), timeout_ms = duration.as_millis() as u64, "task timed out");
            token.cancel();
            target.cancel();
        })
    }

    /// Stop the deadline and record the reaction time, capped at the
    /// duration. Calls after expiry or a previous cancel change nothing.
    pub fn cancel(&self) -> Option<Duration> {
        let mut reaction = self.reaction_slot();
        if let Some(elapsed) = self.inner.timer.cancel() {
            *reaction = Some(elapsed.min(self.inner.duration));
        } else if reaction.is_none() && self.inner.timer.state() == TimerState::Fired {
            *reaction = Some(self.inner.duration);
        }
        *reaction
    }

    pub fn reaction_time(&self) -> Option<Duration> {
        *self.reaction_slot()
    }

    pub fn timed_out(&self) -> bool {
        self.inner.timer.state() == TimerState::Fired
    }

    pub fn is_running(&self) -> bool {
        self.inner.timer.is_armed()
    }

    fn reaction_slot(&self) -> std::sync::MutexGuard<'_, Option<Duration>> {
        self.inner
            .reaction
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
    }
}

/// Gives the leaves below it a deadline and records `duration` and
/// `reactionTime` on the first trial of the leaves it owns directly.
pub struct TimeoutHandler {
    control: TimeoutControl,
    auto_start: bool,
}

impl TimeoutHandler {
    /// The deadline starts when the leaf starts executing.
    pub fn new(duration: Duration) -> Self {
        Self {
            control: TimeoutControl::new(duration),
            auto_start: true,
        }
    }

    /// The leaf starts the deadline itself through its
    /// [`TaskEnv`](crate::exec::TaskEnv), e.g. once the stimulus is shown.
    pub fn manual(duration: Duration) -> Self {
        Self {
            auto_start: false,
            ..Self::new(duration)
        }
    }

    pub fn control(&self) -> &TimeoutControl {
        &self.control
    }

    pub fn auto_start(&self) -> bool {
        self.auto_start
    }
}

impl PhaseListener for TimeoutHandler {
    fn process_phase(&mut self, phase: Phase, scope: &HandlerScope, ctx: &mut ExecutionContext) {
        if phase != Phase::PostProcess || ctx.active_element() != Some(scope.element) {
            return;
        }
        let duration = self.control.duration().as_millis() as i64;
        let reaction = self
            .control
            .reaction_time()
            .map_or(-1, |r| r.as_millis() as i64);
        debug!(handler = %scope.id, duration, reaction, "recording timeout");
        let trial = ctx.first_trial_mut();
        trial.set(&scope.id, props::DURATION, duration);
        trial.set(&scope.id, props::REACTION_TIME, reaction);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::ScriptedExecutable;
    use std::thread;

    #[test]
    fn cancel_before_expiry_records_elapsed_time() {
        let control = TimeoutControl::new(Duration::from_secs(10));
        let target = Arc::new(ScriptedExecutable::finishing("task"));
        let token = CancelToken::new();
        assert!(control.start(target.clone(), token.clone()));
        thread::sleep(Duration::from_millis(20));
        let reaction = control.cancel().expect("reaction");
        assert!(reaction >= Duration::from_millis(20));
        assert!(reaction < Duration::from_secs(10));
        assert_eq!(target.cancel_count(), 0);
        assert!(!token.is_cancelled());
        assert_eq!(control.cancel(), Some(reaction));
    }

    #[test]
    fn expiry_cancels_the_target_once() {
        let control = TimeoutControl::new(Duration::from_millis(20));
        let target = Arc::new(ScriptedExecutable::finishing("task"));
        let token = CancelToken::new();
        control.start(target.clone(), token.clone());
        thread::sleep(Duration::from_millis(100));
        assert!(control.timed_out());
        assert!(token.is_cancelled());
        assert_eq!(target.cancel_count(), 1);
        assert_eq!(control.cancel(), Some(Duration::from_millis(20)));
        assert_eq!(control.cancel(), Some(Duration::from_millis(20)));
        assert_eq!(target.cancel_count(), 1);
    }
}
