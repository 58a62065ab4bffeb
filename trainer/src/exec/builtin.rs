//! Leaves the engine itself inserts or that need no user interaction.

use std::time::Duration;

use tracing::warn;

use crate::data::props;
use crate::exec::{
    BlockingExecutable, BlockingTask, Executable, FinishHandle, PromptContent, Responder,
    TaskEnv, TaskPrompt, TaskReport,
};
use crate::error::EngineError;
use crate::timer::DeadlineTimer;
use crate::value::Value;

/// Leaf that computes its report synchronously on the scheduler thread.
pub struct InstantExecutable<F> {
    local_id: String,
    run: F,
}

impl<F> InstantExecutable<F>
where
    F: Fn(&TaskEnv) -> TaskReport + Send + Sync,
{
    pub fn new(local_id: impl Into<String>, run: F) -> Self {
        Self {
            local_id: local_id.into(),
            run,
        }
    }
}

impl<F> Executable for InstantExecutable<F>
where
    F: Fn(&TaskEnv) -> TaskReport + Send + Sync,
{
    fn local_id(&self) -> &str {
        &self.local_id
    }

    fn execute(&self, env: &TaskEnv) -> Result<TaskReport, EngineError> {
        Ok((self.run)(env))
    }

    fn cancel(&self) {}
}

/// Shows a message for a fixed time. The user may dismiss it early.
/// Always reports [`Skip`](crate::exec::Outcome::Skip).
pub struct TimedDisplay {
    text: String,
    display: Duration,
    timer: DeadlineTimer,
}

impl TimedDisplay {
    pub fn new(text: impl Into<String>, display: Duration) -> Self {
        Self {
            text: text.into(),
            display,
            timer: DeadlineTimer::new(),
        }
    }

    pub fn executable(
        local_id: &str,
        text: impl Into<String>,
        display: Duration,
    ) -> BlockingExecutable<TimedDisplay> {
        BlockingExecutable::new(local_id, Self::new(text, display))
    }

    pub fn text(&self) -> &str {
        &self.text
    }

    fn report(&self, env: &TaskEnv) -> TaskReport {
        let trial = env
            .trial()
            .with(&env.leaf_id, props::DESCRIPTION, self.text.as_str());
        TaskReport::skipped(vec![trial])
    }
}

impl BlockingTask for TimedDisplay {
    fn start(&self, env: &TaskEnv, completion: FinishHandle) {
        self.timer.cancel();
        let report = self.report(env);
        let on_fire = completion.clone();
        let fired_report = report.clone();
        self.timer.start(self.display, move || {
            if let Err(err) = on_fire.complete(fired_report) {
                warn!(%err, "timed display could not finish");
            }
        });
        env.surface.present(TaskPrompt {
            leaf_id: env.leaf_id.clone(),
            content: PromptContent::Message(self.text.clone()),
            responder: Responder::new(move |_| completion.complete(report.clone())),
        });
    }

    fn cancelled(&self, env: &TaskEnv) -> TaskReport {
        self.timer.cancel();
        self.report(env)
    }
}

/// Asks the user how confident they were in their last response.
pub struct ConfidenceRatingTask {
    min: i64,
    max: i64,
}

impl ConfidenceRatingTask {
    pub fn new(min: i64, max: i64) -> Self {
        Self { min, max }
    }

    pub fn executable(min: i64, max: i64) -> BlockingExecutable<ConfidenceRatingTask> {
        BlockingExecutable::new("confidence-rating", Self::new(min, max))
    }
}

impl BlockingTask for ConfidenceRatingTask {
    fn start(&self, env: &TaskEnv, completion: FinishHandle) {
        let (min, max) = (self.min, self.max);
        let leaf_id = env.leaf_id.clone();
        env.surface.present(TaskPrompt {
            leaf_id: env.leaf_id.clone(),
            content: PromptContent::ConfidenceRating { min, max },
            responder: Responder::new(move |input: Value| {
                let Some(rating) = input.as_i64().filter(|r| (min..=max).contains(r)) else {
                    warn!(%input, min, max, "ignoring out of range confidence rating");
                    return Ok(false);
                };
                let trial = crate::data::Trial::new(leaf_id.clone()).with(
                    &leaf_id,
                    props::RATING,
                    rating,
                );
                completion.complete(TaskReport::skipped(vec![trial]))
            }),
        });
    }
}
