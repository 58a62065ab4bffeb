use crate::context::ExecutionContext;
use crate::data::props;
use crate::exec::StatusPanel;
use crate::handler::{Capability, Handler, HandlerScope};
use crate::handlers::active_is_temporary;
use crate::phase::{Phase, PhaseListener};
use crate::value::Value;

/// Decides how many trials a finished leaf contributes to the trial count.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub enum TrialCountEvaluator {
    /// One when the first trial carries a result.
    #[default]
    ResultPresent,
    /// Defer to the inner evaluator only for leaves reached through the
    /// primary of the nearest compound element.
    CompoundPrimary(Box<TrialCountEvaluator>),
}

impl TrialCountEvaluator {
    pub fn count(&self, ctx: &ExecutionContext) -> u32 {
        match self {
            TrialCountEvaluator::ResultPresent => {
                let Some(leaf_id) = ctx.active_leaf_id() else {
                    return 0;
                };
                let has_result = ctx
                    .trials()
                    .first()
                    .is_some_and(|t| t.contains(leaf_id, props::RESULT));
                u32::from(has_result)
            }
            TrialCountEvaluator::CompoundPrimary(base) => {
                let tree = ctx.tree();
                let nearest = tree
                    .stack()
                    .windows(2)
                    .rev()
                    .find(|pair| tree.get(pair[0]).is_some_and(|e| {
                        matches!(e.kind(), crate::element::ElementKind::Compound { .. })
                    }));
                match nearest {
                    Some(pair) if tree.primary(pair[0]) == Some(pair[1]) => base.count(ctx),
                    _ => 0,
                }
            }
        }
    }
}

/// Counts completed trials for the session and shows the running number.
#[derive(Debug, Clone, Copy, Default)]
pub struct TrialCountHandler {
    counter: u32,
}

impl TrialCountHandler {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn counter(&self) -> u32 {
        self.counter
    }

    fn own_compound_done(scope: &HandlerScope, ctx: &ExecutionContext) -> bool {
        ctx.tree()
            .handlers_on(scope.element, Capability::Selector)
            .into_iter()
            .filter_map(|r| ctx.tree().handler(r).and_then(Handler::as_compound))
            .all(|compound| compound.is_done())
    }
}

impl PhaseListener for TrialCountHandler {
    fn process_phase(&mut self, phase: Phase, scope: &HandlerScope, ctx: &mut ExecutionContext) {
        match phase {
            Phase::SessionStart => self.counter = 0,
            Phase::PreProcess if !active_is_temporary(ctx) => {
                ctx.services()
                    .surface
                    .update_status(StatusPanel::TrialCount, Value::from(self.counter + 1));
            }
            Phase::PostProcess if Self::own_compound_done(scope, ctx) => {
                let evaluator = ctx
                    .tree()
                    .find_in_stack(Capability::TrialCountEvaluator)
                    .and_then(|r| ctx.tree().handler(r))
                    .and_then(Handler::as_trial_count_evaluator)
                    .cloned()
                    .unwrap_or_default();
                self.counter += evaluator.count(ctx);
            }
            _ => {}
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::context::ActiveTask;
    use crate::data::Trial;
    use crate::element::ElementTree;
    use crate::test_support::{self, ScriptedExecutable};
    use std::sync::Arc;

    fn with_active(tree: ElementTree, leaf: crate::element::ElementId, trials: Vec<Trial>) -> ExecutionContext {
        let mut ctx = test_support::context(tree);
        let executable = ctx.tree().executable(leaf).expect("leaf");
        let leaf_id = ctx.tree().full_id(leaf);
        ctx.begin_task(ActiveTask {
            element: leaf,
            leaf_id,
            executable,
        });
        ctx.replace_trials(trials);
        ctx
    }

    #[test]
    fn result_present_counts_one() {
        let mut tree = ElementTree::new();
        let root = tree.add_list("module");
        let leaf = tree.add_leaf("task", Arc::new(ScriptedExecutable::finishing("task")));
        tree.append_child(root, leaf).expect("child");
        tree.set_root(root).expect("root");
        tree.push(root).expect("root");
        tree.push(leaf).expect("leaf");

        let with_result = vec![Trial::new("module.task").with_result("module.task", true)];
        let ctx = with_active(tree, leaf, with_result);
        assert_eq!(TrialCountEvaluator::ResultPresent.count(&ctx), 1);
        let ctx = with_active(ctx.into_tree(), leaf, vec![Trial::new("module.task")]);
        assert_eq!(TrialCountEvaluator::ResultPresent.count(&ctx), 0);
    }

    #[test]
    fn compound_evaluator_counts_primary_only() {
        let mut tree = ElementTree::new();
        let compound = tree.add_compound("pair");
        let primary = tree.add_leaf("primary", Arc::new(ScriptedExecutable::finishing("primary")));
        let secondary = tree.add_leaf("secondary", Arc::new(ScriptedExecutable::finishing("secondary")));
        tree.set_primary(compound, primary).expect("primary");
        tree.set_secondary(compound, secondary).expect("secondary");
        tree.set_root(compound).expect("root");
        tree.push(compound).expect("compound");
        tree.push(primary).expect("primary");

        let evaluator = TrialCountEvaluator::CompoundPrimary(Box::default());
        let trials = vec![Trial::new("pair.primary").with_result("pair.primary", true)];
        let mut ctx = with_active(tree, primary, trials);
        assert_eq!(evaluator.count(&ctx), 1);

        ctx.tree_mut().pop();
        ctx.tree_mut().push(secondary).expect("secondary");
        let trials = vec![Trial::new("pair.secondary").with_result("pair.secondary", true)];
        let ctx = with_active(ctx.into_tree(), secondary, trials);
        assert_eq!(evaluator.count(&ctx), 0);
    }
}
