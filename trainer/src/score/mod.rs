//! Points collection and adaptive level control.
//!
//! A [`PointsAndLevelHandler`] copies the points a leaf recorded into its own
//! scope, lets the leaf's [`PointAdaptor`]s rescale them, accumulates session
//! totals and asks its [`LevelPolicy`] whether the level should move. Level
//! changes are broadcast to every [`LevelListener`] on the stack.

mod adaptor;
mod listener;
mod policy;

pub use adaptor::PointAdaptor;
pub use listener::{LevelChange, LevelFeedbackListener, LevelListener};
pub use policy::{BoundaryPolicy, LevelPolicy, WindowedPolicy, WindowStep, cross_boundaries};

use tracing::{debug, info};

use crate::context::ExecutionContext;
use crate::data::props;
use crate::exec::StatusPanel;
use crate::handler::{Capability, Handler, HandlerScope};
use crate::phase::{Phase, PhaseListener};
use crate::value::Value;

pub struct PointsAndLevelHandler {
    policy: LevelPolicy,
    start_level: i64,
    level: i64,
    pending_delta: Option<i64>,
    registered: bool,
}

impl PointsAndLevelHandler {
    pub fn new(policy: LevelPolicy) -> Self {
        Self {
            policy,
            start_level: 1,
            level: 1,
            pending_delta: None,
            registered: false,
        }
    }

    /// Level used when the module has none stored yet.
    pub fn with_start_level(mut self, level: i64) -> Self {
        self.start_level = level;
        self.level = level;
        self
    }

    pub fn level(&self) -> i64 {
        self.level
    }

    pub fn policy(&self) -> &LevelPolicy {
        &self.policy
    }

    /// Delta of the level change currently being broadcast.
    pub fn level_change_delta(&self) -> Option<i64> {
        self.pending_delta
    }

    fn session_start(&mut self, scope: &HandlerScope, ctx: &mut ExecutionContext) {
        let store = ctx.store();
        self.level = store
            .ensure(&scope.id, props::LEVEL, Value::Int(self.start_level))
            .as_i64()
            .unwrap_or(self.start_level);
        for name in [
            props::TOTAL_MIN_POINTS,
            props::TOTAL_POINTS,
            props::TOTAL_MAX_POINTS,
        ] {
            store.ensure(&scope.id, name, Value::Int(0));
        }
        if !self.registered {
            let module = ctx.module_id().to_string();
            ctx.store()
                .set(&module, props::REGISTERED_HANDLER, Value::from(scope.id.as_str()));
            self.registered = true;
        }
        self.policy.session_start(&scope.id, ctx.store());
        let session = ctx.session_mut();
        for name in [
            props::TOTAL_MIN_POINTS,
            props::TOTAL_POINTS,
            props::TOTAL_MAX_POINTS,
        ] {
            session.set(&scope.id, name, 0);
        }
        info!(handler = %scope.id, level = self.level, "points and level handler ready");
    }

    fn pre_process(&mut self, ctx: &mut ExecutionContext) {
        if let Some(active) = ctx.active_element() {
            ctx.tree_mut().set_property(active, props::LEVEL, self.level);
        }
        ctx.services()
            .surface
            .update_status(StatusPanel::Level, Value::Int(self.level));
    }

    fn post_process(&mut self, scope: &HandlerScope, ctx: &mut ExecutionContext) {
        let Some(leaf_id) = ctx.active_leaf_id().map(str::to_string) else {
            return;
        };

        let mut any_points = false;
        for trial in ctx.trials_mut() {
            for name in [props::MIN_POINTS, props::POINTS, props::MAX_POINTS] {
                let value = trial.int(&leaf_id, name);
                any_points |= value.is_some();
                trial.set(&scope.id, name, value.unwrap_or(0));
            }
        }

        if any_points {
            if let Some(active) = ctx.active_element() {
                let adaptors: Vec<PointAdaptor> = ctx
                    .tree()
                    .handlers_on(active, Capability::PointAdaptor)
                    .into_iter()
                    .filter_map(|r| ctx.tree().handler(r).and_then(Handler::as_point_adaptor))
                    .collect();
                for adaptor in adaptors {
                    adaptor.adapt(&scope.id, ctx.trials_mut());
                }
            }
        }

        let (mut min, mut points, mut max) = (0, 0, 0);
        for trial in ctx.trials() {
            min += trial.int(&scope.id, props::MIN_POINTS).unwrap_or(0);
            points += trial.int(&scope.id, props::POINTS).unwrap_or(0);
            max += trial.int(&scope.id, props::MAX_POINTS).unwrap_or(0);
        }
        let session = ctx.session_mut();
        session.add_i64(&scope.id, props::TOTAL_MIN_POINTS, min);
        session.add_i64(&scope.id, props::TOTAL_POINTS, points);
        session.add_i64(&scope.id, props::TOTAL_MAX_POINTS, max);

        if ctx.trials().is_empty() {
            return;
        }
        let new_level = self.policy.evaluate(scope, self.level, ctx);
        if new_level != self.level {
            self.change_level(scope, new_level, ctx);
        }
    }

    fn change_level(&mut self, scope: &HandlerScope, new_level: i64, ctx: &mut ExecutionContext) {
        let change = LevelChange {
            handler_id: scope.id.clone(),
            old_level: self.level,
            new_level,
            delta: new_level - self.level,
        };
        info!(handler = %scope.id, old = change.old_level, new = change.new_level, "level changed");
        self.pending_delta = Some(change.delta);
        ctx.last_trial_mut()
            .set(&scope.id, props::LEVEL_CHANGE_DELTA, change.delta);

        for listener in ctx.tree().find_all_in_stack(Capability::LevelListener) {
            ctx.with_handler(listener, |handler, _scope, ctx| {
                if let Some(listener) = handler.as_level_listener_mut() {
                    listener.level_changed(&change, ctx);
                }
            });
        }

        self.level = new_level;
        self.pending_delta = None;
        ctx.store()
            .set(&scope.id, props::LEVEL, Value::Int(new_level));
    }

    fn session_finish(&mut self, scope: &HandlerScope, ctx: &mut ExecutionContext) {
        ctx.session_mut().set(&scope.id, props::LEVEL, self.level);
        for name in [
            props::TOTAL_MIN_POINTS,
            props::TOTAL_POINTS,
            props::TOTAL_MAX_POINTS,
        ] {
            let session_total = ctx.session().get_i64(&scope.id, name).unwrap_or(0);
            let store = ctx.store();
            let module_total = store.get_i64(&scope.id, name).unwrap_or(0);
            store.set(&scope.id, name, Value::Int(module_total + session_total));
        }
        debug!(handler = %scope.id, level = self.level, "session totals folded into module");
    }
}

impl PhaseListener for PointsAndLevelHandler {
    fn process_phase(&mut self, phase: Phase, scope: &HandlerScope, ctx: &mut ExecutionContext) {
        match phase {
            Phase::SessionStart => self.session_start(scope, ctx),
            Phase::PreProcess => self.pre_process(ctx),
            Phase::PostProcess => self.post_process(scope, ctx),
            Phase::SessionFinish => self.session_finish(scope, ctx),
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
    use crate::exec::Outcome;
    use crate::phase::dispatch;
    use crate::test_support::{self, RecordingLevelListener, ScriptedExecutable};
    use std::sync::Arc;

    struct Rig {
        ctx: crate::context::ExecutionContext,
        task: crate::element::ElementId,
        handler_id: String,
    }

    fn rig(policy: LevelPolicy, adaptor: Option<PointAdaptor>) -> (Rig, RecordingLevelListener) {
        let mut tree = ElementTree::new();
        let root = tree.add_list("module");
        let exec = Arc::new(ScriptedExecutable::finishing("task"));
        let task = tree.add_leaf("task", exec);
        tree.append_child(root, task).expect("child");
        tree.set_root(root).expect("root");
        let points = tree
            .attach_named(root, "points", PointsAndLevelHandler::new(policy))
            .expect("points");
        let listener = RecordingLevelListener::default();
        tree.attach(root, Handler::LevelListener(Box::new(listener.clone())))
            .expect("listener");
        if let Some(adaptor) = adaptor {
            tree.attach(task, adaptor).expect("adaptor");
        }
        let handler_id = tree.handler_full_id(points);
        tree.push(root).expect("root");
        tree.push(task).expect("task");
        let mut ctx = test_support::context(tree);
        dispatch(&mut ctx, Phase::SessionStart);
        (
            Rig {
                ctx,
                task,
                handler_id,
            },
            listener,
        )
    }

    /// Feed one leaf execution with the given trials through the phases the
    /// points handler listens to.
    fn run_leaf(rig: &mut Rig, trials: Vec<Trial>) {
        let executable = rig.ctx.tree().executable(rig.task).expect("leaf");
        rig.ctx.begin_task(ActiveTask {
            element: rig.task,
            leaf_id: "module.task".into(),
            executable,
        });
        dispatch(&mut rig.ctx, Phase::PreProcess);
        rig.ctx.replace_trials(trials);
        rig.ctx.set_outcome(Outcome::Finished);
        dispatch(&mut rig.ctx, Phase::PostProcess);
        rig.ctx.end_task();
    }

    fn scored(points: i64, max: i64) -> Trial {
        Trial::new("module.task").with_points("module.task", 0, points, max)
    }

    #[test]
    fn boundary_policy_levels_up_and_keeps_the_remainder() {
        let (mut rig, listener) = rig(LevelPolicy::Boundary(BoundaryPolicy::new(100)), None);
        run_leaf(&mut rig, vec![scored(250, 250)]);
        let changes = listener.changes();
        assert_eq!(changes.len(), 1);
        assert_eq!((changes[0].old_level, changes[0].new_level, changes[0].delta), (1, 3, 2));
        let store = rig.ctx.store();
        assert_eq!(store.get_i64(&rig.handler_id, props::LEVEL), Some(3));
        assert_eq!(store.get_i64(&rig.handler_id, props::LEVEL_TOTAL), Some(50));
        assert_eq!(
            rig.ctx.session().get_i64(&rig.handler_id, props::TOTAL_POINTS),
            Some(250)
        );
    }

    #[test]
    fn windowed_policy_adapts_after_each_window() {
        let (mut rig, listener) = rig(LevelPolicy::Windowed(WindowedPolicy::default()), None);
        for points in [1, 1, 0] {
            run_leaf(&mut rig, vec![scored(points, 1)]);
        }
        assert!(listener.changes().is_empty(), "66.7% keeps the level");
        for _ in 0..3 {
            run_leaf(&mut rig, vec![scored(1, 1)]);
        }
        assert_eq!(listener.changes().last().map(|c| c.new_level), Some(2));
        for _ in 0..3 {
            run_leaf(&mut rig, vec![scored(0, 1)]);
        }
        assert_eq!(listener.changes().last().map(|c| c.new_level), Some(1));
        for _ in 0..3 {
            run_leaf(&mut rig, vec![scored(0, 1)]);
        }
        assert_eq!(listener.changes().len(), 2, "level 1 is the floor");
    }

    #[test]
    fn adaptors_rescale_handler_scoped_points() {
        let (mut rig, _) = rig(
            LevelPolicy::Boundary(BoundaryPolicy::new(1000)),
            Some(PointAdaptor::Factor(3)),
        );
        run_leaf(&mut rig, vec![scored(2, 4)]);
        assert_eq!(
            rig.ctx.session().get_i64(&rig.handler_id, props::TOTAL_POINTS),
            Some(6)
        );
        assert_eq!(
            rig.ctx.session().get_i64(&rig.handler_id, props::TOTAL_MAX_POINTS),
            Some(12)
        );
    }

    #[test]
    fn trials_without_points_leave_totals_at_zero() {
        let (mut rig, listener) = rig(LevelPolicy::Boundary(BoundaryPolicy::new(1)), Some(PointAdaptor::Nullable));
        run_leaf(&mut rig, vec![Trial::new("module.task")]);
        assert_eq!(
            rig.ctx.session().get_i64(&rig.handler_id, props::TOTAL_POINTS),
            Some(0)
        );
        assert!(listener.changes().is_empty());
    }

    #[test]
    fn session_finish_folds_totals_into_the_module() {
        let (mut rig, _) = rig(LevelPolicy::Boundary(BoundaryPolicy::new(1000)), None);
        rig.ctx.store().set(&rig.handler_id, props::TOTAL_POINTS, Value::Int(10));
        run_leaf(&mut rig, vec![scored(5, 5)]);
        rig.ctx.tree_mut().clear_stack();
        dispatch(&mut rig.ctx, Phase::SessionFinish);
        assert_eq!(rig.ctx.store().get_i64(&rig.handler_id, props::TOTAL_POINTS), Some(15));
        assert_eq!(rig.ctx.session().get_i64(&rig.handler_id, props::LEVEL), Some(1));
    }

    #[test]
    fn pre_process_publishes_the_level_on_the_leaf() {
        let (mut rig, _) = rig(LevelPolicy::Boundary(BoundaryPolicy::new(100)), None);
        rig.ctx.store().set(&rig.handler_id, props::LEVEL, Value::Int(4));
        dispatch(&mut rig.ctx, Phase::SessionStart);
        let executable = rig.ctx.tree().executable(rig.task).expect("leaf");
        rig.ctx.begin_task(ActiveTask {
            element: rig.task,
            leaf_id: "module.task".into(),
            executable,
        });
        dispatch(&mut rig.ctx, Phase::PreProcess);
        assert_eq!(
            rig.ctx.tree().property(rig.task, props::LEVEL).and_then(Value::as_i64),
            Some(4)
        );
    }
}
