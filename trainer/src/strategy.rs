//! Tree scheduler: advances the element stack to the next runnable leaf.

use tracing::{debug, instrument, trace, warn};

use crate::context::ExecutionContext;
use crate::element::ElementId;
use crate::error::EngineError;
use crate::handler::Capability;

/// Reported when selection gives up after the configured number of steps.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SelectionStall {
    pub steps: u32,
    /// Full id of the stack top when selection gave up.
    pub top: Option<String>,
}

type StallHook = Box<dyn Fn(&SelectionStall) + Send>;

/// Depth-first scheduler over the element stack.
pub struct ExecutionStrategy {
    max_steps: u32,
    on_stall: Option<StallHook>,
}

impl ExecutionStrategy {
    pub fn new(max_steps: u32) -> Self {
        Self {
            max_steps,
            on_stall: None,
        }
    }

    pub fn max_steps(&self) -> u32 {
        self.max_steps
    }

    /// Observe selections that hit the step bound.
    pub fn on_stall(mut self, hook: impl Fn(&SelectionStall) + Send + 'static) -> Self {
        self.on_stall = Some(Box::new(hook));
        self
    }

    /// Move the stack to the next leaf that has not been executed.
    ///
    /// Returns `Ok(true)` with that leaf on top, or `Ok(false)` once the tree
    /// is exhausted and the stack is empty. An empty stack starts over at
    /// the (re-initialized) root.
    #[instrument(skip_all)]
    pub fn advance(&self, ctx: &mut ExecutionContext) -> Result<bool, EngineError> {
        if ctx.tree().stack().is_empty() {
            let root = ctx
                .tree()
                .root()
                .ok_or_else(|| EngineError::InvalidTree("no root element".to_string()))?;
            ctx.tree_mut().initialize(root);
            ctx.tree_mut().push(root)?;
        }

        for _ in 0..self.max_steps {
            let top = ctx.tree().top().ok_or(EngineError::EmptyStack)?;
            if ctx.tree().is_pending_leaf(top) {
                trace!(leaf = %ctx.tree().full_id(top), "next leaf selected");
                return Ok(true);
            }
            if self.select_below(ctx, top)? {
                continue;
            }
            if let Some(temporary) = ctx.take_temporary() {
                debug!(element = %ctx.tree().full_id(temporary), "pushing temporary element");
                ctx.tree_mut().push(temporary)?;
                continue;
            }
            ctx.tree_mut().pop();
            if ctx.tree().stack().is_empty() {
                debug!("element tree exhausted");
                return Ok(false);
            }
        }

        let top = ctx.tree().top();
        let stall = SelectionStall {
            steps: self.max_steps,
            top: top.map(|id| ctx.tree().full_id(id)),
        };
        warn!(steps = stall.steps, top = ?stall.top, "selection did not settle, giving up");
        if let Some(hook) = &self.on_stall {
            hook(&stall);
        }
        ctx.clear_outcome();
        Ok(top.is_some_and(|id| ctx.tree().executable(id).is_some()))
    }

    /// Ask the selectors of `top` in attachment order; the first push wins.
    fn select_below(&self, ctx: &mut ExecutionContext, top: ElementId) -> Result<bool, EngineError> {
        for selector in ctx.tree().handlers_on(top, Capability::Selector) {
            let before = ctx.tree().stack().len();
            let pushed = ctx
                .with_handler(selector, |handler, _scope, ctx| match handler.as_selector_mut() {
                    Some(selector) => selector.select_next(top, ctx),
                    None => Ok(false),
                })
                .transpose()?
                .unwrap_or(false);
            let grown = ctx.tree().stack().len() as isize - before as isize;
            if grown != isize::from(pushed) {
                return Err(EngineError::SelectorContract {
                    element: ctx.tree().full_id(top),
                    pushed: grown,
                    reported: pushed,
                });
            }
            if pushed {
                return Ok(true);
            }
        }
        Ok(false)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::element::ElementTree;
    use crate::handler::Handler;
    use crate::select::{CompoundSelector, ElementSelector, ListSelector};
    use crate::test_support::{self, ScriptedExecutable, TreeFixture};
    use std::sync::atomic::{AtomicU32, Ordering};
    use std::sync::Arc;

    /// Run the scheduler to exhaustion, marking each selected leaf executed.
    fn run_all(strategy: &ExecutionStrategy, ctx: &mut ExecutionContext) -> Vec<String> {
        let mut order = Vec::new();
        while strategy.advance(ctx).expect("advance") {
            let top = ctx.tree().top().expect("top");
            order.push(ctx.tree().get(top).expect("leaf").local_id().to_string());
            ctx.tree_mut().mark_executed(top);
        }
        order
    }

    #[test]
    fn nested_lists_run_depth_first() {
        let mut tree = ElementTree::new();
        let root = tree.add_list("module");
        let block = tree.add_list("block");
        tree.append_child(root, block).expect("block");
        for id in ["a", "b"] {
            let leaf = tree.add_leaf(id, Arc::new(ScriptedExecutable::finishing(id)));
            tree.append_child(block, leaf).expect("leaf");
        }
        let tail = tree.add_leaf("tail", Arc::new(ScriptedExecutable::finishing("tail")));
        tree.append_child(root, tail).expect("tail");
        tree.attach(root, ListSelector::iterated(1)).expect("root selector");
        tree.attach(block, ListSelector::iterated(2)).expect("block selector");
        tree.set_root(root).expect("root");

        let mut ctx = test_support::context(tree);
        let strategy = ExecutionStrategy::new(100);
        assert_eq!(run_all(&strategy, &mut ctx), ["a", "b", "a", "b", "tail"]);
        assert!(ctx.tree().stack().is_empty());
    }

    #[test]
    fn temporaries_run_before_the_next_sibling() {
        let mut fixture = TreeFixture::list_of_leaves(&["a", "b"]);
        fixture
            .tree
            .attach(fixture.root, ListSelector::iterated(1))
            .expect("selector");
        let mut ctx = fixture.into_empty_context();
        let strategy = ExecutionStrategy::new(100);

        assert!(strategy.advance(&mut ctx).expect("advance"));
        let first = ctx.tree().top().expect("top");
        ctx.tree_mut().mark_executed(first);
        ctx.enqueue_temporary_leaf(Arc::new(ScriptedExecutable::finishing("notice")));

        assert!(strategy.advance(&mut ctx).expect("advance"));
        let temp = ctx.tree().top().expect("temporary");
        assert!(ctx.tree().get(temp).expect("temp").is_temporary());
        ctx.tree_mut().mark_executed(temp);

        assert!(strategy.advance(&mut ctx).expect("advance"));
        let second = ctx.tree().top().expect("second");
        assert_eq!(ctx.tree().full_id(second), "module.b");
    }

    #[test]
    fn compound_primary_detours_on_suspend() {
        let mut tree = ElementTree::new();
        let compound = tree.add_compound("pair");
        let primary = tree.add_leaf("primary", Arc::new(ScriptedExecutable::finishing("primary")));
        let secondary = tree.add_leaf("secondary", Arc::new(ScriptedExecutable::finishing("secondary")));
        tree.set_primary(compound, primary).expect("primary");
        tree.set_secondary(compound, secondary).expect("secondary");
        tree.attach(compound, CompoundSelector::new()).expect("selector");
        tree.set_root(compound).expect("root");
        let mut ctx = test_support::context(tree);
        let strategy = ExecutionStrategy::new(100);

        assert!(strategy.advance(&mut ctx).expect("advance"));
        assert_eq!(ctx.tree().top(), Some(primary));
        ctx.tree_mut().mark_executed(primary);
        ctx.set_outcome(crate::exec::Outcome::Suspended);
        crate::phase::dispatch(&mut ctx, crate::phase::Phase::PostProcess);

        assert!(strategy.advance(&mut ctx).expect("advance"));
        assert_eq!(ctx.tree().top(), Some(secondary));
    }

    struct Greedy;

    impl ElementSelector for Greedy {
        fn initialize(&mut self, _owner: ElementId) {}

        fn select_next(&mut self, owner: ElementId, ctx: &mut ExecutionContext) -> Result<bool, EngineError> {
            let children = ctx.tree().children(owner);
            ctx.tree_mut().push(children[0])?;
            Ok(false)
        }
    }

    #[test]
    fn unreported_push_is_a_contract_violation() {
        let mut fixture = TreeFixture::list_of_leaves(&["a"]);
        fixture
            .tree
            .attach(fixture.root, Handler::Selector(Box::new(Greedy)))
            .expect("selector");
        let mut ctx = fixture.into_empty_context();
        let err = ExecutionStrategy::new(100).advance(&mut ctx).expect_err("contract");
        assert!(matches!(
            err,
            EngineError::SelectorContract { pushed: 1, reported: false, .. }
        ));
    }

    #[test]
    fn step_bound_reports_a_stall() {
        let mut tree = ElementTree::new();
        let root = tree.add_list("module");
        let mut parent = root;
        for depth in 0..10 {
            let child = tree.add_list(&format!("level{depth}"));
            tree.append_child(parent, child).expect("child");
            tree.attach(parent, ListSelector::iterated(1)).expect("selector");
            parent = child;
        }
        let leaf = tree.add_leaf("deep", Arc::new(ScriptedExecutable::finishing("deep")));
        tree.append_child(parent, leaf).expect("leaf");
        tree.attach(parent, ListSelector::iterated(1)).expect("selector");
        tree.set_root(root).expect("root");

        let stalls = Arc::new(AtomicU32::new(0));
        let counter = Arc::clone(&stalls);
        let strategy = ExecutionStrategy::new(3).on_stall(move |stall| {
            assert_eq!(stall.steps, 3);
            counter.fetch_add(1, Ordering::SeqCst);
        });
        let mut ctx = test_support::context(tree);
        ctx.set_outcome(crate::exec::Outcome::Finished);
        assert!(!strategy.advance(&mut ctx).expect("advance"));
        assert_eq!(stalls.load(Ordering::SeqCst), 1);
        assert_eq!(ctx.outcome(), None);
    }
}
