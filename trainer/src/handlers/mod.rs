//! Auxiliary phase handlers: trial counting, outcome feedback, confidence
//! ratings and key bindings.

mod escape;
mod feedback;
mod rating;
mod trial_count;

pub use escape::{EscapeKeyHandler, Key, KeyAction, KeyBinding};
pub use feedback::OutcomeFeedbackHandler;
pub use rating::ConfidenceRatingHandler;
pub use trial_count::{TrialCountEvaluator, TrialCountHandler};

use crate::context::ExecutionContext;

fn active_is_temporary(ctx: &ExecutionContext) -> bool {
    ctx.active_element()
        .and_then(|id| ctx.tree().get(id))
        .is_some_and(|e| e.is_temporary())
}
