//! Lifecycle phases and their broadcast to handlers.

use serde::{Deserialize, Serialize};
use tracing::trace;

use crate::context::ExecutionContext;
use crate::handler::{Capability, HandlerScope};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Phase {
    SessionStart,
    PreProcess,
    PreTaskExecution,
    PostTaskExecution,
    PostProcess,
    PostSelection,
    SessionFinish,
}

impl Phase {
    /// Session-wide phases reach every handler of the tree, not just the
    /// handlers on the current stack.
    pub fn is_session_wide(self) -> bool {
        matches!(self, Phase::SessionStart | Phase::SessionFinish)
    }
}

/// Receives lifecycle phases. Listeners may edit trials, session data and the
/// temporary queue, but must not push or pop the element stack.
pub trait PhaseListener: Send {
    fn process_phase(&mut self, phase: Phase, scope: &HandlerScope, ctx: &mut ExecutionContext);
}

/// Broadcast `phase` to every phase listener.
///
/// Per-task phases walk the stack from the top element down to the root,
/// visiting each element's handlers in attachment order. Session-wide phases
/// walk the whole tree, innermost elements first.
pub fn dispatch(ctx: &mut ExecutionContext, phase: Phase) {
    ctx.set_phase(phase);
    let listeners = if phase.is_session_wide() {
        ctx.tree().handlers_post_order(Capability::PhaseListener)
    } else {
        ctx.tree().find_all_in_stack(Capability::PhaseListener)
    };
    trace!(?phase, listeners = listeners.len(), "dispatching phase");
    for handler in listeners {
        ctx.with_handler(handler, |handler, scope, ctx| {
            if let Some(listener) = handler.as_phase_listener_mut() {
                listener.process_phase(phase, scope, ctx);
            }
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::element::ElementTree;
    use crate::handler::Handler;
    use crate::test_support::{self, RecordingListener};
    use std::sync::Arc;

    #[test]
    fn per_task_phases_run_top_to_root_in_attachment_order() {
        let mut tree = ElementTree::new();
        let root = tree.add_list("module");
        let task = tree.add_leaf("task", Arc::new(test_support::ScriptedExecutable::finishing("task")));
        tree.append_child(root, task).expect("child");
        tree.set_root(root).expect("root");

        let log = RecordingListener::log();
        for (element, name) in [(root, "root-a"), (root, "root-b"), (task, "task-a")] {
            tree.attach(element, Handler::Listener(Box::new(RecordingListener::new(name, &log))))
                .expect("attach");
        }
        tree.push(root).expect("root");
        tree.push(task).expect("task");

        let mut ctx = test_support::context(tree);
        dispatch(&mut ctx, Phase::PreProcess);
        assert_eq!(
            RecordingListener::entries(&log),
            vec![
                ("task-a".to_string(), Phase::PreProcess),
                ("root-a".to_string(), Phase::PreProcess),
                ("root-b".to_string(), Phase::PreProcess),
            ]
        );
        assert_eq!(ctx.phase(), Some(Phase::PreProcess));
    }

    #[test]
    fn session_phases_reach_elements_off_the_stack() {
        let mut tree = ElementTree::new();
        let root = tree.add_list("module");
        let block = tree.add_list("block");
        tree.append_child(root, block).expect("child");
        tree.set_root(root).expect("root");

        let log = RecordingListener::log();
        tree.attach(block, Handler::Listener(Box::new(RecordingListener::new("block", &log))))
            .expect("attach");
        tree.attach(root, Handler::Listener(Box::new(RecordingListener::new("root", &log))))
            .expect("attach");

        let mut ctx = test_support::context(tree);
        dispatch(&mut ctx, Phase::SessionStart);
        let names: Vec<_> = RecordingListener::entries(&log)
            .into_iter()
            .map(|(name, _)| name)
            .collect();
        assert_eq!(names, ["block", "root"]);
    }
}
