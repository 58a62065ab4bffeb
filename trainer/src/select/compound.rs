use tracing::debug;

use crate::context::ExecutionContext;
use crate::element::ElementId;
use crate::error::EngineError;
use crate::exec::Outcome;
use crate::handler::HandlerScope;
use crate::phase::{Phase, PhaseListener};
use crate::select::{ElementSelector, push_child};

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum CompoundState {
    /// The primary runs (again) on the next selection.
    #[default]
    PrimaryPending,
    /// The primary suspended; the secondary runs next.
    SecondaryPending,
    /// The secondary ran; the primary resumes unless the secondary suspended.
    SecondaryActive,
    /// The primary finished without suspending.
    Done,
}

/// Runs a primary element, detouring through the secondary element whenever
/// the primary suspends, until the primary finishes.
#[derive(Debug, Default)]
pub struct CompoundSelector {
    state: CompoundState,
}

impl CompoundSelector {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn state(&self) -> CompoundState {
        self.state
    }

    pub fn is_done(&self) -> bool {
        self.state == CompoundState::Done
    }
}

impl ElementSelector for CompoundSelector {
    fn initialize(&mut self, _owner: ElementId) {
        self.state = CompoundState::PrimaryPending;
    }

    fn select_next(
        &mut self,
        owner: ElementId,
        ctx: &mut ExecutionContext,
    ) -> Result<bool, EngineError> {
        let Some(primary) = ctx.tree().primary(owner) else {
            return Ok(false);
        };
        let secondary = ctx.tree().secondary(owner);
        let next = match (self.state, secondary) {
            (CompoundState::Done, _) => return Ok(false),
            (CompoundState::PrimaryPending, _) => primary,
            (CompoundState::SecondaryPending, Some(secondary)) => {
                self.state = CompoundState::SecondaryActive;
                secondary
            }
            (CompoundState::SecondaryActive, Some(secondary))
                if ctx.outcome() == Some(Outcome::Suspended) =>
            {
                secondary
            }
            (CompoundState::SecondaryPending | CompoundState::SecondaryActive, _) => {
                self.state = CompoundState::PrimaryPending;
                primary
            }
        };
        debug!(owner = %ctx.tree().full_id(owner), state = ?self.state, "compound selection");
        push_child(ctx, next)
    }
}

impl PhaseListener for CompoundSelector {
    fn process_phase(&mut self, phase: Phase, _scope: &HandlerScope, ctx: &mut ExecutionContext) {
        if phase != Phase::PostProcess || self.state != CompoundState::PrimaryPending {
            return;
        }
        let temporary = ctx
            .active_element()
            .and_then(|id| ctx.tree().get(id))
            .is_some_and(|e| e.is_temporary());
        if temporary {
            return;
        }
        self.state = if ctx.outcome() == Some(Outcome::Suspended) {
            CompoundState::SecondaryPending
        } else {
            CompoundState::Done
        };
    }
}
