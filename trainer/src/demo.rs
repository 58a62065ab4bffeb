//! A small arithmetic module and a simulated participant for the CLI.

use std::sync::{Arc, Mutex, PoisonError};

use anyhow::Result;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use serde_json::json;
use tracing::{info, warn};

use trainer::config::EngineConfig;
use trainer::data::{PropertyStore, Trial, props};
use trainer::element::{ElementId, ElementTree};
use trainer::exec::{
    BlockingExecutable, BlockingTask, FinishHandle, InteractionSurface, PromptContent, Responder,
    StatusPanel, TaskEnv, TaskPrompt, TaskReport,
};
use trainer::handlers::{EscapeKeyHandler, OutcomeFeedbackHandler, TrialCountHandler};
use trainer::pause::PauseHandler;
use trainer::score::{LevelFeedbackListener, LevelPolicy, PointsAndLevelHandler, WindowedPolicy};
use trainer::select::{ListSelector, TimerListSelector};
use trainer::timeout::TimeoutHandler;
use trainer::value::Value;

const MAX_POINTS: i64 = 10;

/// Adds two numbers whose size grows with the level.
pub struct ArithmeticTask {
    rng: Mutex<StdRng>,
}

impl ArithmeticTask {
    pub fn new(seed: u64) -> Self {
        Self {
            rng: Mutex::new(StdRng::seed_from_u64(seed)),
        }
    }
}

impl BlockingTask for ArithmeticTask {
    fn start(&self, env: &TaskEnv, completion: FinishHandle) {
        let bound = 10 * (env.level.max(0) + 1);
        let (a, b) = {
            let mut rng = self.rng.lock().unwrap_or_else(PoisonError::into_inner);
            (rng.gen_range(1..=bound), rng.gen_range(1..=bound))
        };
        let leaf_id = env.leaf_id.clone();
        env.surface.present(TaskPrompt {
            leaf_id: env.leaf_id.clone(),
            content: PromptContent::Stimulus(json!({ "a": a, "b": b, "op": "+" })),
            responder: Responder::new(move |input: Value| {
                let Some(answer) = input.as_i64() else {
                    return Ok(false);
                };
                let correct = answer == a + b;
                let points = if correct { MAX_POINTS } else { 0 };
                let trial = Trial::new(leaf_id.clone())
                    .with_points(&leaf_id, 0, points, MAX_POINTS)
                    .with_result(&leaf_id, correct)
                    .with(&leaf_id, "answer", answer);
                completion.complete(TaskReport::finished(vec![trial]))
            }),
        });
    }
}

/// Answers prompts on the interaction thread, right with probability `accuracy`.
pub struct SimulatedParticipant {
    accuracy: f64,
    rng: Mutex<StdRng>,
}

impl SimulatedParticipant {
    pub fn new(accuracy: f64, seed: u64) -> Self {
        Self {
            accuracy: accuracy.clamp(0.0, 1.0),
            rng: Mutex::new(StdRng::seed_from_u64(seed)),
        }
    }

    fn answer(&self, content: &PromptContent) -> Value {
        let mut rng = self.rng.lock().unwrap_or_else(PoisonError::into_inner);
        match content {
            PromptContent::Stimulus(stimulus) => {
                let a = stimulus["a"].as_i64().unwrap_or_default();
                let b = stimulus["b"].as_i64().unwrap_or_default();
                let sum = a + b;
                if rng.gen_bool(self.accuracy) {
                    Value::Int(sum)
                } else {
                    Value::Int(sum + rng.gen_range(1..=3))
                }
            }
            PromptContent::Message(_) => Value::Bool(true),
            PromptContent::ConfidenceRating { min, max } => Value::Int(rng.gen_range(*min..=*max)),
        }
    }
}

impl InteractionSurface for SimulatedParticipant {
    fn present(&self, prompt: TaskPrompt) {
        if let PromptContent::Message(text) = &prompt.content {
            info!(leaf = %prompt.leaf_id, %text, "message");
        }
        let answer = self.answer(&prompt.content);
        if let Err(err) = prompt.responder.respond(answer) {
            warn!(%err, leaf = %prompt.leaf_id, "response rejected");
        }
    }

    fn update_status(&self, panel: StatusPanel, value: Value) {
        info!(?panel, %value, "status");
    }
}

/// Two rounds of up to `trials` additions each: a practice round that starts
/// no new task once `selection.temporal_list_ms` has passed, then a sprint
/// cut off by `selection.timer_list_ms`, running task or not.
pub fn arithmetic_module(
    cfg: &EngineConfig,
    trials: u32,
    seed: u64,
) -> Result<(ElementTree, ElementId)> {
    let mut tree = ElementTree::new();
    let root = tree.add_list("arithmetic");
    tree.set_root(root)?;
    tree.attach(root, ListSelector::iterated(1))?;

    let iterations = i32::try_from(trials).unwrap_or(i32::MAX);
    let practice = tree.add_list("practice");
    tree.attach(practice, ListSelector::temporal(iterations, cfg.temporal_list()))?;
    let sprint = tree.add_list("sprint");
    tree.attach(
        sprint,
        TimerListSelector::new(cfg.timer_list()).with_iterations(iterations),
    )?;
    for (round, offset) in [(practice, 0), (sprint, 1)] {
        let task = tree.add_leaf(
            "addition",
            Arc::new(BlockingExecutable::new(
                "addition",
                ArithmeticTask::new(seed.wrapping_add(offset)),
            )),
        );
        tree.append_child(round, task)?;
        tree.append_child(root, round)?;
        tree.attach(task, TimeoutHandler::new(cfg.timeout()))?;
        tree.attach(task, OutcomeFeedbackHandler)?;
    }

    tree.attach_named(
        root,
        "level",
        PointsAndLevelHandler::new(LevelPolicy::Windowed(WindowedPolicy::default())),
    )?;
    tree.attach(root, PauseHandler::new(cfg.pause()))?;
    tree.attach(root, TrialCountHandler::new())?;
    tree.attach(root, EscapeKeyHandler::new())?;
    tree.attach(root, LevelFeedbackListener::new(cfg.level_feedback()))?;
    Ok((tree, root))
}

/// Level stored for the module's points handler, if any session ran yet.
pub fn stored_level(store: &dyn PropertyStore, tree: &ElementTree, root: ElementId) -> Option<i64> {
    let scope = format!("{}.level", tree.full_id(root));
    store.get_i64(&scope, props::LEVEL)
}

pub fn pause_override(cfg: &mut EngineConfig, pause_ms: Option<u64>) {
    if let Some(ms) = pause_ms {
        cfg.pause.default_ms = ms;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use trainer::context::Services;
    use trainer::data::{FixedSessionCount, MemoryRecorder, MemoryStore};
    use trainer::exec::InteractionThread;
    use trainer::executor::Executor;

    fn quick_config() -> EngineConfig {
        let mut cfg = EngineConfig::default();
        cfg.pause.default_ms = 0;
        cfg.level_feedback.display_ms = 0;
        cfg
    }

    fn run(cfg: &EngineConfig, trials: u32) -> trainer::executor::SessionReport {
        let interaction = InteractionThread::spawn().expect("interaction thread");
        let services = Services {
            store: Arc::new(MemoryStore::new()),
            recorder: Arc::new(MemoryRecorder::new()),
            sessions: Arc::new(FixedSessionCount::finished(0)),
            surface: Arc::new(SimulatedParticipant::new(1.0, 3)),
            interaction: Arc::clone(&interaction),
        };
        let (mut tree, _) = arithmetic_module(cfg, trials, 3).expect("module");
        let report = Executor::new(cfg.clone(), services)
            .run_session("arithmetic", &mut tree)
            .expect("session");
        interaction.shutdown();
        report
    }

    fn trials_in(report: &trainer::executor::SessionReport, leaf: &str) -> usize {
        report.trials.iter().filter(|t| t.parent_id() == leaf).count()
    }

    #[test]
    fn both_rounds_run_their_trials_within_generous_limits() {
        let report = run(&quick_config(), 3);
        assert!(report.completed);
        assert_eq!(trials_in(&report, "arithmetic.practice.addition"), 3);
        assert_eq!(trials_in(&report, "arithmetic.sprint.addition"), 3);
    }

    #[test]
    fn round_limits_come_from_the_selection_config() {
        let mut cfg = quick_config();
        cfg.pause.default_ms = 20;
        cfg.selection.temporal_list_ms = 1;
        cfg.selection.timer_list_ms = 1;
        let report = run(&cfg, 50);
        assert!(report.completed);
        assert!(trials_in(&report, "arithmetic.practice.addition") < 50);
        assert!(trials_in(&report, "arithmetic.sprint.addition") < 50);
    }
}
