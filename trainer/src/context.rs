//! Session-scoped execution state shared by the scheduler and handlers.

use std::collections::VecDeque;
use std::sync::Arc;
use std::time::Duration;

use crate::config::EngineConfig;
use crate::data::{PropertyStore, SessionCounter, Trial, TrialRecorder};
use crate::element::{ElementId, ElementTree};
use crate::exec::{Executable, InteractionSurface, InteractionThread, Outcome};
use crate::executor::ExecutorHandle;
use crate::handler::{Capability, Handler, HandlerRef, HandlerScope};
use crate::phase::Phase;
use crate::value::PropertyMap;

/// External collaborators of a session.
#[derive(Clone)]
pub struct Services {
    pub store: Arc<dyn PropertyStore>,
    pub recorder: Arc<dyn TrialRecorder>,
    pub sessions: Arc<dyn SessionCounter>,
    pub surface: Arc<dyn InteractionSurface>,
    pub interaction: Arc<InteractionThread>,
}

/// The leaf currently being processed.
#[derive(Clone)]
pub struct ActiveTask {
    pub element: ElementId,
    pub leaf_id: String,
    pub executable: Arc<dyn Executable>,
}

pub struct ExecutionContext {
    module_id: String,
    phase: Option<Phase>,
    tree: ElementTree,
    trials: Vec<Trial>,
    session: PropertyMap,
    outcome: Option<Outcome>,
    active: Option<ActiveTask>,
    temporary: VecDeque<ElementId>,
    services: Services,
    handle: ExecutorHandle,
    config: EngineConfig,
}

impl ExecutionContext {
    pub fn new(
        module_id: impl Into<String>,
        tree: ElementTree,
        services: Services,
        handle: ExecutorHandle,
        config: EngineConfig,
    ) -> Self {
        Self {
            module_id: module_id.into(),
            phase: None,
            tree,
            trials: Vec::new(),
            session: PropertyMap::new(),
            outcome: None,
            active: None,
            temporary: VecDeque::new(),
            services,
            handle,
            config,
        }
    }

    pub fn module_id(&self) -> &str {
        &self.module_id
    }

    pub fn phase(&self) -> Option<Phase> {
        self.phase
    }

    pub(crate) fn set_phase(&mut self, phase: Phase) {
        self.phase = Some(phase);
    }

    pub fn tree(&self) -> &ElementTree {
        &self.tree
    }

    pub fn tree_mut(&mut self) -> &mut ElementTree {
        &mut self.tree
    }

    pub fn into_tree(self) -> ElementTree {
        self.tree
    }

    /// Trials of the leaf being processed.
    pub fn trials(&self) -> &[Trial] {
        &self.trials
    }

    pub fn trials_mut(&mut self) -> &mut Vec<Trial> {
        &mut self.trials
    }

    pub(crate) fn replace_trials(&mut self, trials: Vec<Trial>) {
        self.trials = trials;
    }

    fn new_trial(&self) -> Trial {
        Trial::new(self.active_leaf_id().unwrap_or_default())
    }

    /// First trial of the active leaf, created when there is none.
    pub fn first_trial_mut(&mut self) -> &mut Trial {
        if self.trials.is_empty() {
            let trial = self.new_trial();
            self.trials.push(trial);
        }
        &mut self.trials[0]
    }

    /// Last trial of the active leaf, created when there is none.
    pub fn last_trial_mut(&mut self) -> &mut Trial {
        if self.trials.is_empty() {
            let trial = self.new_trial();
            self.trials.push(trial);
        }
        let last = self.trials.len() - 1;
        &mut self.trials[last]
    }

    /// Values persisted with the session record.
    pub fn session(&self) -> &PropertyMap {
        &self.session
    }

    pub fn session_mut(&mut self) -> &mut PropertyMap {
        &mut self.session
    }

    pub(crate) fn take_session(&mut self) -> PropertyMap {
        std::mem::take(&mut self.session)
    }

    /// Outcome of the most recently executed leaf.
    pub fn outcome(&self) -> Option<Outcome> {
        self.outcome
    }

    pub fn set_outcome(&mut self, outcome: Outcome) {
        self.outcome = Some(outcome);
    }

    pub fn clear_outcome(&mut self) {
        self.outcome = None;
    }

    pub fn active(&self) -> Option<&ActiveTask> {
        self.active.as_ref()
    }

    pub fn active_element(&self) -> Option<ElementId> {
        self.active.as_ref().map(|a| a.element)
    }

    pub fn active_leaf_id(&self) -> Option<&str> {
        self.active.as_ref().map(|a| a.leaf_id.as_str())
    }

    pub(crate) fn begin_task(&mut self, task: ActiveTask) {
        self.trials.clear();
        self.active = Some(task);
    }

    pub(crate) fn end_task(&mut self) -> Vec<Trial> {
        self.active = None;
        std::mem::take(&mut self.trials)
    }

    /// Queue an already allocated temporary element.
    pub fn enqueue_temporary(&mut self, element: ElementId) {
        self.temporary.push_back(element);
    }

    /// Allocate a temporary leaf and queue it to run before the next regular
    /// selection.
    pub fn enqueue_temporary_leaf(&mut self, executable: Arc<dyn Executable>) -> ElementId {
        let id = self.tree.add_temporary_leaf(executable);
        self.enqueue_temporary(id);
        id
    }

    pub(crate) fn take_temporary(&mut self) -> Option<ElementId> {
        self.temporary.pop_front()
    }

    pub fn pending_temporaries(&self) -> usize {
        self.temporary.len()
    }

    pub fn services(&self) -> &Services {
        &self.services
    }

    pub fn store(&self) -> &dyn PropertyStore {
        self.services.store.as_ref()
    }

    pub fn handle(&self) -> &ExecutorHandle {
        &self.handle
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    /// Lend the handler at `r` to `f`. The handler is taken out of its slot
    /// for the duration of the call, so `f` gets the context mutably.
    /// Returns `None` when the slot is empty.
    pub fn with_handler<R>(
        &mut self,
        r: HandlerRef,
        f: impl FnOnce(&mut Handler, &HandlerScope, &mut ExecutionContext) -> R,
    ) -> Option<R> {
        let mut handler = self.tree.take_handler(r)?;
        let scope = HandlerScope {
            element: r.element,
            handler: r,
            id: self.tree.handler_full_id(r),
        };
        let out = f(&mut handler, &scope, self);
        self.tree.restore_handler(r, handler);
        Some(out)
    }

    /// Override the next inter-task pause on the nearest pause handler.
    /// Returns false when no pause handler is on the stack.
    pub fn set_current_pause(&mut self, duration: Duration) -> bool {
        let Some(r) = self.tree.find_in_stack(Capability::PauseHandler) else {
            return false;
        };
        match self.tree.handler_mut(r).and_then(Handler::as_pause_mut) {
            Some(pause) => {
                pause.set_current(duration);
                true
            }
            None => false,
        }
    }

    /// Whether every compound selector between the stack top and `owner`
    /// (inclusive) has finished its cycle.
    pub fn compounds_done_above(&self, owner: ElementId) -> bool {
        for element in self.tree.stack().iter().rev() {
            let done = self
                .tree
                .handlers_on(*element, Capability::Selector)
                .into_iter()
                .filter_map(|r| self.tree.handler(r).and_then(Handler::as_compound))
                .all(|compound| compound.is_done());
            if !done {
                return false;
            }
            if *element == owner {
                break;
            }
        }
        true
    }
}
