use std::sync::Arc;
use std::time::Duration;

use tracing::debug;

use crate::context::ExecutionContext;
use crate::exec::{ConfidenceRatingTask, Outcome};
use crate::handler::HandlerScope;
use crate::phase::{Phase, PhaseListener};

/// Asks for a confidence rating after every leaf it is attached to.
#[derive(Debug, Clone, Copy)]
pub struct ConfidenceRatingHandler {
    min: i64,
    max: i64,
}

impl Default for ConfidenceRatingHandler {
    fn default() -> Self {
        Self::new(1, 5)
    }
}

impl ConfidenceRatingHandler {
    pub fn new(min: i64, max: i64) -> Self {
        Self { min, max }
    }
}

impl PhaseListener for ConfidenceRatingHandler {
    fn process_phase(&mut self, phase: Phase, scope: &HandlerScope, ctx: &mut ExecutionContext) {
        if phase != Phase::PostProcess
            || ctx.active_element() != Some(scope.element)
            || ctx.outcome() == Some(Outcome::Aborted)
        {
            return;
        }
        debug!(handler = %scope.id, "queueing confidence rating");
        ctx.enqueue_temporary_leaf(Arc::new(ConfidenceRatingTask::executable(self.min, self.max)));
        ctx.set_current_pause(Duration::ZERO);
    }
}
