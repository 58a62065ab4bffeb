//! Session driver and its thread-safe control handle.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, PoisonError};
use std::time::{Duration, Instant};

use chrono::Utc;
use serde::Serialize;
use tracing::{debug, error, info, info_span, instrument};

use crate::config::EngineConfig;
use crate::context::{ActiveTask, ExecutionContext, Services};
use crate::data::{Trial, props};
use crate::element::ElementTree;
use crate::error::EngineError;
use crate::exec::{CancelToken, Executable, TaskEnv, TaskReport};
use crate::handler::{Capability, Handler};
use crate::handlers::{Key, KeyAction, KeyBinding};
use crate::pause::PauseSignal;
use crate::phase::{Phase, dispatch};
use crate::strategy::ExecutionStrategy;
use crate::value::{PropertyMap, Value};

/// The leaf currently between `begin_task` and `end_task`.
struct ActiveRun {
    executable: Arc<dyn Executable>,
    cancel: CancelToken,
}

#[derive(Default)]
struct HandleInner {
    active: Mutex<Option<ActiveRun>>,
    stop: AtomicBool,
    completed: AtomicBool,
    pause: PauseSignal,
    bindings: Mutex<Vec<KeyBinding>>,
}

/// Control surface for a running session, usable from any thread.
#[derive(Clone, Default)]
pub struct ExecutorHandle {
    inner: Arc<HandleInner>,
}

impl ExecutorHandle {
    pub fn new() -> Self {
        Self::default()
    }

    /// Interrupt the current pause and cancel the running leaf, if any.
    ///
    /// A leaf that is still pausing or has not started listening yet is
    /// aborted as soon as it reaches execution.
    pub fn cancel_current(&self) {
        let (interrupted, active) = {
            let active = self.inner.active.lock().unwrap_or_else(PoisonError::into_inner);
            let executable = active.as_ref().map(|run| {
                run.cancel.cancel();
                Arc::clone(&run.executable)
            });
            (self.inner.pause.interrupt(), executable)
        };
        debug!(interrupted, active = active.is_some(), "cancelling current task");
        if let Some(active) = active {
            active.cancel();
        }
    }

    /// End the session after the current leaf.
    pub fn stop(&self) {
        self.inner.stop.store(true, Ordering::Release);
        self.cancel_current();
    }

    pub fn is_stop_requested(&self) -> bool {
        self.inner.stop.load(Ordering::Acquire)
    }

    /// Count the session as completed even though it ends early.
    pub fn mark_completed(&self) {
        self.inner.completed.store(true, Ordering::Release);
    }

    pub fn is_marked_completed(&self) -> bool {
        self.inner.completed.load(Ordering::Acquire)
    }

    /// Run the action bound to `key`. Returns false when nothing is bound.
    pub fn press_key(&self, key: Key) -> bool {
        let binding = self
            .inner
            .bindings
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .iter()
            .find(|b| b.key == key)
            .copied();
        let Some(binding) = binding else {
            return false;
        };
        info!(?key, "key binding triggered");
        match binding.action {
            KeyAction::StopSession { mark_completed } => {
                if mark_completed {
                    self.mark_completed();
                }
                self.stop();
            }
        }
        true
    }

    /// Interruptible sleep. Returns false when cut short.
    pub fn pause(&self, duration: Duration) -> bool {
        self.inner.pause.sleep(duration)
    }

    fn set_active(&self, run: Option<ActiveRun>) {
        let mut active = self.inner.active.lock().unwrap_or_else(PoisonError::into_inner);
        if run.is_some() {
            self.inner.pause.clear();
        }
        *active = run;
    }

    fn begin_session(&self, bindings: Vec<KeyBinding>) {
        self.inner.stop.store(false, Ordering::Release);
        self.inner.completed.store(false, Ordering::Release);
        *self
            .inner
            .bindings
            .lock()
            .unwrap_or_else(PoisonError::into_inner) = bindings;
    }
}

/// Summary of one session.
#[derive(Debug, Clone, Serialize)]
pub struct SessionReport {
    pub module_id: String,
    pub leaves_executed: u32,
    /// The tree ran to exhaustion, or a key binding counted the early end
    /// as completion.
    pub completed: bool,
    pub stopped: bool,
    pub session: PropertyMap,
    pub trials: Vec<Trial>,
}

#[derive(Default)]
struct SessionRun {
    leaves: u32,
    exhausted: bool,
    trials: Vec<Trial>,
}

/// Runs sessions over an element tree on the calling thread.
pub struct Executor {
    config: EngineConfig,
    strategy: ExecutionStrategy,
    services: Services,
    handle: ExecutorHandle,
}

impl Executor {
    pub fn new(config: EngineConfig, services: Services) -> Self {
        Self {
            strategy: ExecutionStrategy::new(config.max_selection_steps),
            config,
            services,
            handle: ExecutorHandle::new(),
        }
    }

    pub fn with_strategy(mut self, strategy: ExecutionStrategy) -> Self {
        self.strategy = strategy;
        self
    }

    pub fn handle(&self) -> ExecutorHandle {
        self.handle.clone()
    }

    pub fn services(&self) -> &Services {
        &self.services
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    /// Run one session over `tree`. The tree is handed back in place when
    /// the session ends, with an empty stack, so it can run again.
    #[instrument(skip_all, fields(module = %module_id))]
    pub fn run_session(
        &self,
        module_id: &str,
        tree: &mut ElementTree,
    ) -> Result<SessionReport, EngineError> {
        let mut ctx = ExecutionContext::new(
            module_id,
            std::mem::take(tree),
            self.services.clone(),
            self.handle.clone(),
            self.config.clone(),
        );
        let result = self.drive(&mut ctx);
        self.handle.set_active(None);
        ctx.tree_mut().clear_stack();
        let session = ctx.take_session();
        *tree = ctx.into_tree();
        let run = result.inspect_err(|err| error!(%err, "session aborted"))?;

        let report = SessionReport {
            module_id: module_id.to_string(),
            leaves_executed: run.leaves,
            completed: run.exhausted || self.handle.is_marked_completed(),
            stopped: self.handle.is_stop_requested(),
            session,
            trials: run.trials,
        };
        info!(
            leaves = report.leaves_executed,
            completed = report.completed,
            stopped = report.stopped,
            "session finished"
        );
        Ok(report)
    }

    fn drive(&self, ctx: &mut ExecutionContext) -> Result<SessionRun, EngineError> {
        let bindings = ctx
            .tree()
            .handlers_post_order(Capability::KeyHandler)
            .into_iter()
            .filter_map(|r| ctx.tree().handler(r).and_then(Handler::key_binding))
            .collect();
        self.handle.begin_session(bindings);
        ctx.tree_mut().clear_stack();

        dispatch(ctx, Phase::SessionStart);
        info!("session started");

        let mut run = SessionRun::default();
        loop {
            if self.handle.is_stop_requested() {
                info!("stop requested, ending session");
                break;
            }
            if !self.strategy.advance(ctx)? {
                run.exhausted = true;
                break;
            }
            dispatch(ctx, Phase::PostSelection);
            let trials = self.run_leaf(ctx)?;
            run.leaves += 1;
            run.trials.extend(trials);
        }

        let completed = run.exhausted || self.handle.is_marked_completed();
        let module = ctx.module_id().to_string();
        ctx.session_mut().set(&module, props::COMPLETED, completed);
        dispatch(ctx, Phase::SessionFinish);
        Ok(run)
    }

    /// Process the leaf on top of the stack through all per-task phases.
    fn run_leaf(&self, ctx: &mut ExecutionContext) -> Result<Vec<Trial>, EngineError> {
        let element = ctx.tree().top().ok_or(EngineError::EmptyStack)?;
        let executable = ctx.tree().executable(element).ok_or_else(|| {
            EngineError::InvalidTree(format!("{} is not a leaf", ctx.tree().full_id(element)))
        })?;
        let leaf_id = ctx.tree().full_id(element);
        let span = info_span!("leaf", leaf = %leaf_id);
        let _enter = span.enter();

        ctx.begin_task(ActiveTask {
            element,
            leaf_id: leaf_id.clone(),
            executable: Arc::clone(&executable),
        });
        let cancel = CancelToken::new();
        self.handle.set_active(Some(ActiveRun {
            executable: Arc::clone(&executable),
            cancel: cancel.clone(),
        }));

        dispatch(ctx, Phase::PreProcess);
        dispatch(ctx, Phase::PreTaskExecution);

        for listener in ctx.tree().find_all_in_stack(Capability::ExecutionStart) {
            ctx.with_handler(listener, |handler, _scope, ctx| handler.on_execution_start(ctx));
        }
        let timeout = ctx
            .tree()
            .find_in_stack(Capability::TimeoutHandler)
            .and_then(|r| ctx.tree().handler(r))
            .and_then(Handler::as_timeout)
            .map(|t| (t.control().clone(), t.auto_start()));

        let env = TaskEnv {
            leaf_id: leaf_id.clone(),
            level: ctx
                .tree()
                .property(element, props::LEVEL)
                .and_then(Value::as_i64)
                .unwrap_or(1),
            interaction: Arc::clone(&ctx.services().interaction),
            surface: Arc::clone(&ctx.services().surface),
            timeout: timeout.as_ref().map(|(control, _)| control.clone()),
            cancel: cancel.clone(),
        };

        let started_at = Utc::now();
        let clock = Instant::now();
        let report = if self.handle.is_stop_requested() || cancel.is_cancelled() {
            debug!(stopped = self.handle.is_stop_requested(), "leaf aborted before execution");
            TaskReport::aborted()
        } else {
            if let Some((control, true)) = &timeout {
                control.start(Arc::clone(&executable), cancel.clone());
            }
            let result = executable.execute(&env);
            if let Some((control, _)) = &timeout {
                control.cancel();
            }
            match result {
                Ok(report) => report,
                Err(err) => {
                    self.handle.set_active(None);
                    ctx.end_task();
                    return Err(err);
                }
            }
        };
        self.handle.set_active(None);
        let elapsed = clock.elapsed();
        let ended_at = Utc::now();

        let outcome = report.outcome;
        let mut trials = report.trials;
        for trial in &mut trials {
            if !trial.contains(&leaf_id, props::OUTCOME) {
                trial.set(&leaf_id, props::OUTCOME, outcome.as_str());
            }
            if !trial.contains(&leaf_id, props::START_TIME) {
                trial.set(&leaf_id, props::START_TIME, started_at.to_rfc3339());
                trial.set(&leaf_id, props::END_TIME, ended_at.to_rfc3339());
                trial.set(&leaf_id, props::DURATION_TIME, elapsed.as_millis() as i64);
            }
        }
        info!(outcome = outcome.as_str(), trials = trials.len(), elapsed_ms = elapsed.as_millis() as u64, "leaf finished");
        ctx.replace_trials(trials);
        ctx.set_outcome(outcome);
        ctx.tree_mut().mark_executed(element);

        dispatch(ctx, Phase::PostTaskExecution);
        dispatch(ctx, Phase::PostProcess);

        let trials = ctx.end_task();
        for trial in &trials {
            self.services.recorder.record(trial);
        }
        Ok(trials)
    }
}
