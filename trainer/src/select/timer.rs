use std::collections::VecDeque;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use tracing::info;

use crate::context::ExecutionContext;
use crate::element::ElementId;
use crate::error::EngineError;
use crate::executor::ExecutorHandle;
use crate::select::{ElementSelector, iteration_budget_left, push_child};
use crate::timer::DeadlineTimer;

/// Iterates the children in declared order until a wall-clock limit,
/// measured from the first leaf that starts below it, runs out. Expiry
/// cancels the running leaf and ends the iteration.
pub struct TimerListSelector {
    iterations: i32,
    limit: Duration,
    executed: u32,
    pending: VecDeque<ElementId>,
    can_iterate: bool,
    expired: Arc<AtomicBool>,
    timer: DeadlineTimer,
}

impl TimerListSelector {
    /// Unbounded iterations within `limit`.
    pub fn new(limit: Duration) -> Self {
        Self {
            iterations: -1,
            limit,
            executed: 0,
            pending: VecDeque::new(),
            can_iterate: true,
            expired: Arc::new(AtomicBool::new(false)),
            timer: DeadlineTimer::new(),
        }
    }

    pub fn with_iterations(mut self, iterations: i32) -> Self {
        self.iterations = iterations;
        self
    }

    pub fn is_expired(&self) -> bool {
        self.expired.load(Ordering::Acquire)
    }

    pub fn is_timer_running(&self) -> bool {
        self.timer.is_armed()
    }

    /// Arm the timer on the first execution start after initialization.
    pub(crate) fn start_execution(&mut self, handle: &ExecutorHandle) {
        if !self.can_iterate || self.is_expired() || self.timer.is_armed() {
            return;
        }
        let expired = Arc::clone(&self.expired);
        let handle = handle.clone();
        let limit = self.limit;
        self.timer.start(limit, move || {
            expired.store(true, Ordering::Release);
            info!(limit_ms = limit.as_millis() as u64, "timed list expired, cancelling current task");
            handle.cancel_current();
        });
    }

    fn stop(&mut self) {
        self.timer.cancel();
        self.can_iterate = false;
        self.pending.clear();
    }
}

impl ElementSelector for TimerListSelector {
    fn initialize(&mut self, _owner: ElementId) {
        self.timer.cancel();
        self.executed = 0;
        self.pending.clear();
        self.can_iterate = true;
        self.expired.store(false, Ordering::Release);
    }

    fn select_next(
        &mut self,
        owner: ElementId,
        ctx: &mut ExecutionContext,
    ) -> Result<bool, EngineError> {
        if self.is_expired() {
            self.stop();
        }
        if self.can_iterate && self.pending.is_empty() {
            if iteration_budget_left(self.iterations, self.executed) {
                self.pending = ctx.tree().children(owner).into();
                self.executed += 1;
            } else {
                self.stop();
            }
        }
        match self.pending.pop_front() {
            Some(child) => push_child(ctx, child),
            None => Ok(false),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::TreeFixture;

    #[test]
    fn expiry_stops_iteration() {
        let fixture = TreeFixture::list_of_leaves(&["a", "b"]);
        let root = fixture.root;
        let mut ctx = fixture.into_context();
        let mut selector = TimerListSelector::new(Duration::from_millis(30));
        selector.initialize(root);

        assert!(selector.select_next(root, &mut ctx).expect("select"));
        selector.start_execution(ctx.handle());
        assert!(selector.is_timer_running());
        ctx.tree_mut().pop();

        std::thread::sleep(Duration::from_millis(80));
        assert!(selector.is_expired());
        assert!(!selector.select_next(root, &mut ctx).expect("select"));
        assert!(!selector.select_next(root, &mut ctx).expect("select"));
    }

    #[test]
    fn natural_exhaustion_stops_the_timer() {
        let fixture = TreeFixture::list_of_leaves(&["a"]);
        let root = fixture.root;
        let mut ctx = fixture.into_context();
        let mut selector = TimerListSelector::new(Duration::from_secs(30)).with_iterations(2);
        selector.initialize(root);
        let mut pushes = 0;
        while selector.select_next(root, &mut ctx).expect("select") {
            selector.start_execution(ctx.handle());
            ctx.tree_mut().pop();
            pushes += 1;
        }
        assert_eq!(pushes, 2);
        assert!(!selector.is_timer_running());
        assert!(!selector.is_expired());
    }
}
