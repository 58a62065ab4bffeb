use std::sync::{Arc, Mutex, PoisonError};

use tracing::{debug, instrument, trace, warn};

use crate::error::EngineError;
use crate::exec::{Executable, FinishHandle, FinishLatch, TaskEnv, TaskReport};

/// A task whose completion arrives asynchronously, typically from user input.
pub trait BlockingTask: Send + Sync + 'static {
    /// Set up the task. Runs on the interaction thread and must return
    /// promptly; completion is reported later through `completion`.
    fn start(&self, env: &TaskEnv, completion: FinishHandle);

    /// Clean up after a cancel and produce the report for it. Runs on the
    /// interaction thread.
    fn cancelled(&self, _env: &TaskEnv) -> TaskReport {
        TaskReport::aborted()
    }
}

/// Adapts a [`BlockingTask`] to [`Executable`]: `execute` starts the task on
/// the interaction thread and blocks on the task's finish latch.
pub struct BlockingExecutable<T> {
    local_id: String,
    task: Arc<T>,
    latch: Arc<FinishLatch>,
    env: Mutex<Option<TaskEnv>>,
}

impl<T: BlockingTask> BlockingExecutable<T> {
    pub fn new(local_id: impl Into<String>, task: T) -> Self {
        let local_id = local_id.into();
        Self {
            latch: Arc::new(FinishLatch::new(local_id.clone())),
            local_id,
            task: Arc::new(task),
            env: Mutex::new(None),
        }
    }

    pub fn task(&self) -> &T {
        &self.task
    }

    pub fn is_running(&self) -> bool {
        self.latch.is_running()
    }

    fn set_env(&self, env: Option<TaskEnv>) {
        *self.env.lock().unwrap_or_else(PoisonError::into_inner) = env;
    }
}

impl<T: BlockingTask> Executable for BlockingExecutable<T> {
    fn local_id(&self) -> &str {
        &self.local_id
    }

    #[instrument(skip_all, fields(leaf = %env.leaf_id))]
    fn execute(&self, env: &TaskEnv) -> Result<TaskReport, EngineError> {
        if self.latch.is_running() {
            return Err(EngineError::AlreadyRunning {
                task: self.local_id.clone(),
            });
        }
        self.set_env(Some(env.clone()));
        self.latch.begin()?;

        let task = Arc::clone(&self.task);
        let start_env = env.clone();
        let completion = FinishHandle::new(Arc::clone(&self.latch));
        if let Err(err) = env
            .interaction
            .invoke_and_wait(move || task.start(&start_env, completion))
        {
            self.latch.abandon();
            self.set_env(None);
            return Err(err);
        }

        if env.cancel.is_cancelled() {
            debug!("cancel arrived before the task was running");
            self.cancel();
        }
        let report = self.latch.wait();
        self.set_env(None);
        debug!(outcome = report.outcome.as_str(), trials = report.trials.len(), "task finished");
        Ok(report)
    }

    fn cancel(&self) {
        if !self.latch.try_claim() {
            trace!(task = %self.local_id, "cancel ignored: task not running or already finishing");
            return;
        }
        let env = self
            .env
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone();
        let report = match env {
            Some(env) => {
                let task = Arc::clone(&self.task);
                let interaction = Arc::clone(&env.interaction);
                interaction
                    .invoke_and_wait(move || task.cancelled(&env))
                    .unwrap_or_else(|err| {
                        warn!(%err, task = %self.local_id, "cancel cleanup did not run");
                        TaskReport::aborted()
                    })
            }
            None => TaskReport::aborted(),
        };
        if let Err(err) = self.latch.finish(report) {
            warn!(%err, "cancel could not finish task");
        }
    }
}
