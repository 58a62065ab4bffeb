//! Test-only helpers: scripted leaves, recording surfaces and small trees.

use std::collections::VecDeque;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Condvar, Mutex};
use std::time::{Duration, Instant};

use crate::config::EngineConfig;
use crate::context::{ExecutionContext, Services};
use crate::data::{FixedSessionCount, MemoryRecorder, MemoryStore};
use crate::element::{ElementId, ElementTree};
use crate::error::EngineError;
use crate::exec::{
    BlockingTask, Executable, FinishHandle, InteractionSurface, InteractionThread, Outcome,
    StatusPanel, TaskEnv, TaskPrompt, TaskReport,
};
use crate::executor::ExecutorHandle;
use crate::handler::HandlerScope;
use crate::phase::{Phase, PhaseListener};
use crate::score::{LevelChange, LevelListener};
use crate::value::Value;

/// One scripted execution of a [`ScriptedExecutable`].
#[derive(Debug, Clone, PartialEq)]
pub struct ScriptStep {
    pub outcome: Outcome,
    /// `(points, max)` recorded on a single trial.
    pub points: Option<(i64, i64)>,
    pub result: Option<bool>,
}

impl ScriptStep {
    pub fn finished() -> Self {
        Self {
            outcome: Outcome::Finished,
            points: None,
            result: None,
        }
    }

    pub fn suspended() -> Self {
        Self {
            outcome: Outcome::Suspended,
            ..Self::finished()
        }
    }

    pub fn scored(points: i64, max: i64) -> Self {
        Self {
            points: Some((points, max)),
            result: Some(points == max),
            ..Self::finished()
        }
    }
}

/// Leaf that replays scripted steps synchronously and then keeps finishing.
pub struct ScriptedExecutable {
    local_id: String,
    steps: Mutex<VecDeque<ScriptStep>>,
    executions: AtomicUsize,
    cancels: AtomicUsize,
}

impl ScriptedExecutable {
    pub fn new(local_id: &str, steps: Vec<ScriptStep>) -> Self {
        Self {
            local_id: local_id.to_string(),
            steps: Mutex::new(steps.into()),
            executions: AtomicUsize::new(0),
            cancels: AtomicUsize::new(0),
        }
    }

    pub fn finishing(local_id: &str) -> Self {
        Self::new(local_id, Vec::new())
    }

    pub fn execution_count(&self) -> usize {
        self.executions.load(Ordering::SeqCst)
    }

    pub fn cancel_count(&self) -> usize {
        self.cancels.load(Ordering::SeqCst)
    }
}

impl Executable for ScriptedExecutable {
    fn local_id(&self) -> &str {
        &self.local_id
    }

    fn execute(&self, env: &TaskEnv) -> Result<TaskReport, EngineError> {
        self.executions.fetch_add(1, Ordering::SeqCst);
        let step = self
            .steps
            .lock()
            .expect("script lock")
            .pop_front()
            .unwrap_or_else(ScriptStep::finished);
        let mut trial = env.trial();
        if let Some((points, max)) = step.points {
            trial = trial.with_points(&env.leaf_id, 0, points, max);
        }
        if let Some(success) = step.result {
            trial = trial.with_result(&env.leaf_id, success);
        }
        Ok(TaskReport::new(step.outcome, vec![trial]))
    }

    fn cancel(&self) {
        self.cancels.fetch_add(1, Ordering::SeqCst);
    }
}

/// Blocking task that never answers on its own; only a cancel ends it.
#[derive(Debug, Default)]
pub struct Unanswered;

impl BlockingTask for Unanswered {
    fn start(&self, _env: &TaskEnv, _completion: FinishHandle) {}
}

type AutoAnswer = Box<dyn Fn(&TaskPrompt) -> Option<Value> + Send + Sync>;

/// Surface that keeps prompts and status updates for inspection.
#[derive(Default)]
pub struct RecordingSurface {
    prompts: Mutex<VecDeque<TaskPrompt>>,
    arrived: Condvar,
    presented: AtomicUsize,
    statuses: Mutex<Vec<(StatusPanel, Value)>>,
    auto_answer: Option<AutoAnswer>,
}

impl RecordingSurface {
    /// Answer every prompt immediately with `answer`, when it returns a value.
    pub fn answering(answer: impl Fn(&TaskPrompt) -> Option<Value> + Send + Sync + 'static) -> Self {
        Self {
            auto_answer: Some(Box::new(answer)),
            ..Self::default()
        }
    }

    pub fn wait_for_prompt(&self, timeout: Duration) -> Option<TaskPrompt> {
        let deadline = Instant::now() + timeout;
        let mut prompts = self.prompts.lock().expect("prompts lock");
        loop {
            if let Some(prompt) = prompts.pop_front() {
                return Some(prompt);
            }
            let now = Instant::now();
            if now >= deadline {
                return None;
            }
            prompts = self
                .arrived
                .wait_timeout(prompts, deadline - now)
                .expect("prompts wait")
                .0;
        }
    }

    pub fn prompt_count(&self) -> usize {
        self.presented.load(Ordering::SeqCst)
    }

    pub fn statuses(&self) -> Vec<(StatusPanel, Value)> {
        self.statuses.lock().expect("status lock").clone()
    }
}

impl InteractionSurface for RecordingSurface {
    fn present(&self, prompt: TaskPrompt) {
        self.presented.fetch_add(1, Ordering::SeqCst);
        if let Some(answer) = self.auto_answer.as_ref().and_then(|f| f(&prompt)) {
            prompt.responder.respond(answer).expect("auto answer");
            return;
        }
        self.prompts.lock().expect("prompts lock").push_back(prompt);
        self.arrived.notify_all();
    }

    fn update_status(&self, panel: StatusPanel, value: Value) {
        self.statuses.lock().expect("status lock").push((panel, value));
    }
}

/// In-memory services around `surface`.
pub fn services_with(surface: Arc<dyn InteractionSurface>) -> Services {
    Services {
        store: Arc::new(MemoryStore::new()),
        recorder: Arc::new(MemoryRecorder::new()),
        sessions: Arc::new(FixedSessionCount::default()),
        surface,
        interaction: InteractionThread::spawn().expect("interaction thread"),
    }
}

pub fn services() -> Services {
    services_with(Arc::new(RecordingSurface::default()))
}

/// Context for module `module` with default config and fresh services.
pub fn context(tree: ElementTree) -> ExecutionContext {
    context_with(tree, services())
}

pub fn context_with(tree: ElementTree, services: Services) -> ExecutionContext {
    ExecutionContext::new(
        "module",
        tree,
        services,
        ExecutorHandle::new(),
        EngineConfig::default(),
    )
}

/// A root list `module` with scripted leaves and no handlers.
pub struct TreeFixture {
    pub tree: ElementTree,
    pub root: ElementId,
    pub leaves: Vec<ElementId>,
}

impl TreeFixture {
    pub fn list_of_leaves(ids: &[&str]) -> Self {
        let mut tree = ElementTree::new();
        let root = tree.add_list("module");
        let leaves = ids
            .iter()
            .map(|id| {
                let leaf = tree.add_leaf(id, Arc::new(ScriptedExecutable::finishing(id)));
                tree.append_child(root, leaf).expect("append leaf");
                leaf
            })
            .collect();
        tree.set_root(root).expect("root");
        Self { tree, root, leaves }
    }

    /// Context with the root already on the stack.
    pub fn into_context(self) -> ExecutionContext {
        self.into_context_with(services())
    }

    pub fn into_context_with(mut self, services: Services) -> ExecutionContext {
        self.tree.push(self.root).expect("push root");
        context_with(self.tree, services)
    }

    /// Context with an empty stack.
    pub fn into_empty_context(self) -> ExecutionContext {
        context(self.tree)
    }
}

type PhaseLog = Arc<Mutex<Vec<(String, Phase)>>>;

/// Phase listener that appends `(name, phase)` to a shared log.
pub struct RecordingListener {
    name: String,
    log: PhaseLog,
}

impl RecordingListener {
    pub fn log() -> PhaseLog {
        Arc::default()
    }

    pub fn new(name: &str, log: &PhaseLog) -> Self {
        Self {
            name: name.to_string(),
            log: Arc::clone(log),
        }
    }

    pub fn entries(log: &PhaseLog) -> Vec<(String, Phase)> {
        log.lock().expect("phase log").clone()
    }
}

impl PhaseListener for RecordingListener {
    fn process_phase(&mut self, phase: Phase, _scope: &HandlerScope, _ctx: &mut ExecutionContext) {
        self.log
            .lock()
            .expect("phase log")
            .push((self.name.clone(), phase));
    }
}

/// Level listener that keeps every change it sees.
#[derive(Clone, Default)]
pub struct RecordingLevelListener {
    changes: Arc<Mutex<Vec<LevelChange>>>,
}

impl RecordingLevelListener {
    pub fn changes(&self) -> Vec<LevelChange> {
        self.changes.lock().expect("level log").clone()
    }
}

impl LevelListener for RecordingLevelListener {
    fn level_changed(&mut self, change: &LevelChange, _ctx: &mut ExecutionContext) {
        self.changes.lock().expect("level log").push(change.clone());
    }
}
