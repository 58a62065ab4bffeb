//! Selectors decide which child of a grouping element runs next.
//!
//! A selector pushes at most one element per call and reports whether it
//! did. Children are initialized right before they are pushed.

mod compound;
mod list;
mod random;
mod timer;

pub use compound::{CompoundSelector, CompoundState};
pub use list::{IterationGate, ListOrder, ListSelector};
pub use random::RandomListSelector;
pub use timer::TimerListSelector;

use crate::context::ExecutionContext;
use crate::element::ElementId;
use crate::error::EngineError;

pub trait ElementSelector: Send {
    /// Reset per-visit state. Called whenever the owning element is
    /// (re)initialized.
    fn initialize(&mut self, owner: ElementId);

    /// Push the next child of `owner` and return true, or return false
    /// without touching the stack.
    fn select_next(
        &mut self,
        owner: ElementId,
        ctx: &mut ExecutionContext,
    ) -> Result<bool, EngineError>;
}

/// Initialize `child` and push it.
pub(crate) fn push_child(ctx: &mut ExecutionContext, child: ElementId) -> Result<bool, EngineError> {
    let tree = ctx.tree_mut();
    tree.initialize(child);
    tree.push(child)?;
    Ok(true)
}

/// Whether another iteration fits in a budget of `iterations` (negative means
/// unbounded) after `executed` iterations.
fn iteration_budget_left(iterations: i32, executed: u32) -> bool {
    iterations < 0 || i64::from(executed) < i64::from(iterations)
}
