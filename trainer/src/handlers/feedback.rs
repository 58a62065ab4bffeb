use crate::context::ExecutionContext;
use crate::data::props;
use crate::exec::StatusPanel;
use crate::handler::HandlerScope;
use crate::handlers::active_is_temporary;
use crate::phase::{Phase, PhaseListener};
use crate::value::Value;

/// Shows whether the last response was right or wrong.
#[derive(Debug, Clone, Copy, Default)]
pub struct OutcomeFeedbackHandler;

impl PhaseListener for OutcomeFeedbackHandler {
    fn process_phase(&mut self, phase: Phase, _scope: &HandlerScope, ctx: &mut ExecutionContext) {
        if phase != Phase::PostProcess || active_is_temporary(ctx) {
            return;
        }
        let Some(leaf_id) = ctx.active_leaf_id() else {
            return;
        };
        let success = match ctx.trials().first().and_then(|t| t.text(leaf_id, props::RESULT)) {
            Some(props::RESULT_SUCCESS) => true,
            Some(props::RESULT_FAILURE) => false,
            _ => return,
        };
        ctx.services()
            .surface
            .update_status(StatusPanel::Feedback, Value::Bool(success));
    }
}
