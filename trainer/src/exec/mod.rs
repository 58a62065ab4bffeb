//! Leaf executables and the hand-off between the scheduler thread and the
//! interaction thread.
//!
//! The scheduler calls [`Executable::execute`] and blocks. Blocking tasks set
//! up their prompt on the [`InteractionThread`] and return control there; the
//! first party to claim the task's [`FinishLatch`] (user response, timeout,
//! external cancel) reports the outcome and wakes the scheduler.

mod blocking;
mod builtin;
mod interaction;
mod latch;

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use serde::{Deserialize, Serialize};

use crate::data::Trial;
use crate::error::EngineError;
use crate::timeout::TimeoutControl;

pub use blocking::{BlockingExecutable, BlockingTask};
pub use builtin::{ConfidenceRatingTask, InstantExecutable, TimedDisplay};
pub use interaction::{
    InteractionSurface, InteractionThread, PromptContent, Responder, StatusPanel, TaskPrompt,
};
pub use latch::{FinishHandle, FinishLatch};

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Outcome {
    /// The task ran to completion.
    #[default]
    Finished,
    /// The task paused the enclosing flow, e.g. to hand over to a secondary
    /// element.
    Suspended,
    /// The task ran but should not count as a trial.
    Skip,
    /// The task was cancelled or interrupted.
    Aborted,
}

impl Outcome {
    pub fn as_str(self) -> &'static str {
        match self {
            Outcome::Finished => "finished",
            Outcome::Suspended => "suspended",
            Outcome::Skip => "skip",
            Outcome::Aborted => "aborted",
        }
    }
}

/// What a leaf hands back when its execution completes.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct TaskReport {
    pub outcome: Outcome,
    pub trials: Vec<Trial>,
}

impl TaskReport {
    pub fn new(outcome: Outcome, trials: Vec<Trial>) -> Self {
        Self { outcome, trials }
    }

    pub fn finished(trials: Vec<Trial>) -> Self {
        Self::new(Outcome::Finished, trials)
    }

    pub fn suspended() -> Self {
        Self::new(Outcome::Suspended, Vec::new())
    }

    pub fn skipped(trials: Vec<Trial>) -> Self {
        Self::new(Outcome::Skip, trials)
    }

    pub fn aborted() -> Self {
        Self::new(Outcome::Aborted, Vec::new())
    }
}

/// Everything a leaf needs while it runs.
#[derive(Clone)]
pub struct TaskEnv {
    /// Full id of the leaf, the scope of the values it records.
    pub leaf_id: String,
    pub level: i64,
    pub interaction: Arc<InteractionThread>,
    pub surface: Arc<dyn InteractionSurface>,
    /// Deadline of the nearest timeout handler, if any.
    pub timeout: Option<TimeoutControl>,
    /// Set once this run is cancelled, even before the task is listening.
    pub cancel: CancelToken,
}

impl TaskEnv {
    /// Fresh trial attributed to this leaf.
    pub fn trial(&self) -> Trial {
        Trial::new(self.leaf_id.clone())
    }
}

/// Cancellation request for one leaf run.
///
/// Cancellers set the token before calling [`Executable::cancel`], so a cancel
/// that lands before the task can be claimed is still seen when it starts.
#[derive(Debug, Clone, Default)]
pub struct CancelToken(Arc<AtomicBool>);

impl CancelToken {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }
}

/// A runnable leaf.
pub trait Executable: Send + Sync {
    fn local_id(&self) -> &str;

    /// Run the task and block until it reports completion.
    fn execute(&self, env: &TaskEnv) -> Result<TaskReport, EngineError>;

    /// Force the running task to finish. Safe to call from any thread and
    /// when nothing is running; a cancel that finds nothing running is only
    /// remembered through the run's [`CancelToken`].
    fn cancel(&self);
}
