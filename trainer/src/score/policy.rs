use crate::context::ExecutionContext;
use crate::data::{PropertyStore, props};
use crate::exec::Outcome;
use crate::handler::HandlerScope;
use crate::value::Value;

/// How accumulated points turn into level changes.
#[derive(Debug, Clone)]
pub enum LevelPolicy {
    Boundary(BoundaryPolicy),
    Windowed(WindowedPolicy),
}

impl LevelPolicy {
    pub(crate) fn session_start(&mut self, scope_id: &str, store: &dyn PropertyStore) {
        if let LevelPolicy::Windowed(windowed) = self {
            windowed.load(scope_id, store);
        }
    }

    /// Level after the trials of the active leaf.
    pub(crate) fn evaluate(
        &mut self,
        scope: &HandlerScope,
        level: i64,
        ctx: &mut ExecutionContext,
    ) -> i64 {
        match self {
            LevelPolicy::Boundary(boundary) => boundary.evaluate(&scope.id, level, ctx),
            LevelPolicy::Windowed(windowed) => windowed.evaluate(scope, level, ctx),
        }
    }
}

/// Convert `total` points into whole level steps of `boundary` points.
/// Returns the new level and the signed remainder.
pub fn cross_boundaries(level: i64, total: i64, boundary: i64) -> (i64, i64) {
    if boundary <= 0 {
        return (level, total);
    }
    (level + total / boundary, total % boundary)
}

/// Moves one level per `boundary` points gained or lost. The remainder is
/// kept in the module store and carries over to later sessions.
#[derive(Debug, Clone)]
pub struct BoundaryPolicy {
    boundary: i64,
}

impl Default for BoundaryPolicy {
    fn default() -> Self {
        Self::new(100)
    }
}

impl BoundaryPolicy {
    pub fn new(boundary: i64) -> Self {
        Self { boundary }
    }

    pub fn boundary(&self) -> i64 {
        self.boundary
    }

    fn evaluate(&self, scope_id: &str, level: i64, ctx: &ExecutionContext) -> i64 {
        let earned: i64 = ctx
            .trials()
            .iter()
            .map(|t| t.int(scope_id, props::POINTS).unwrap_or(0))
            .sum();
        let store = ctx.store();
        let total = store.get_i64(scope_id, props::LEVEL_TOTAL).unwrap_or(0) + earned;
        let (new_level, remainder) = cross_boundaries(level, total, self.boundary);
        store.set(scope_id, props::LEVEL_TOTAL, Value::Int(remainder));
        new_level
    }
}

/// Result of feeding one trial into a [`WindowedPolicy`].
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct WindowStep {
    pub level: i64,
    /// Percentage of the window, set when this trial closed a window with a
    /// non-zero maximum.
    pub performance: Option<f64>,
}

/// Judges performance over windows of `sample_size` finished trials:
/// at least `max_threshold` percent moves up, at most `min_threshold`
/// percent moves down, never below level 1.
#[derive(Debug, Clone)]
pub struct WindowedPolicy {
    sample_size: u32,
    max_threshold: f64,
    min_threshold: f64,
    counter: u32,
    window_points: i64,
    window_max: i64,
}

impl Default for WindowedPolicy {
    fn default() -> Self {
        Self::new(3, 80.0, 60.0)
    }
}

impl WindowedPolicy {
    pub fn new(sample_size: u32, max_threshold: f64, min_threshold: f64) -> Self {
        Self {
            sample_size: sample_size.max(1),
            max_threshold,
            min_threshold,
            counter: 0,
            window_points: 0,
            window_max: 0,
        }
    }

    /// Counted trials in the open window.
    pub fn counter(&self) -> u32 {
        self.counter
    }

    pub fn observe(&mut self, points: i64, max: i64, level: i64) -> WindowStep {
        self.window_points += points;
        self.window_max += max;
        if self.counter + 1 < self.sample_size {
            self.counter += 1;
            return WindowStep {
                level,
                performance: None,
            };
        }
        let performance = (self.window_max > 0)
            .then(|| self.window_points as f64 / self.window_max as f64 * 100.0);
        let level = match performance {
            Some(p) if p >= self.max_threshold => level + 1,
            Some(p) if p <= self.min_threshold && level > 1 => level - 1,
            _ => level,
        };
        self.counter = 0;
        self.window_points = 0;
        self.window_max = 0;
        WindowStep { level, performance }
    }

    fn load(&mut self, scope_id: &str, store: &dyn PropertyStore) {
        self.counter = store
            .get_i64(scope_id, props::LEVEL_COUNTER)
            .and_then(|c| u32::try_from(c).ok())
            .unwrap_or(0)
            .min(self.sample_size - 1);
        self.window_points = store.get_i64(scope_id, props::LEVEL_WINDOW_POINTS).unwrap_or(0);
        self.window_max = store.get_i64(scope_id, props::LEVEL_WINDOW_MAX).unwrap_or(0);
    }

    fn save(&self, scope_id: &str, store: &dyn PropertyStore) {
        store.set(scope_id, props::LEVEL_COUNTER, Value::from(self.counter));
        store.set(scope_id, props::LEVEL_WINDOW_POINTS, Value::Int(self.window_points));
        store.set(scope_id, props::LEVEL_WINDOW_MAX, Value::Int(self.window_max));
    }

    fn evaluate(&mut self, scope: &HandlerScope, level: i64, ctx: &mut ExecutionContext) -> i64 {
        if !ctx.compounds_done_above(scope.element) {
            return level;
        }
        let leaf_id = ctx.active_leaf_id().unwrap_or_default().to_string();
        let fallback = ctx.outcome();
        let mut level = level;
        for trial in ctx.trials_mut() {
            let finished = match trial.text(&leaf_id, props::OUTCOME) {
                Some(outcome) => outcome == Outcome::Finished.as_str(),
                None => fallback == Some(Outcome::Finished),
            };
            if !finished {
                continue;
            }
            let points = trial.int(&scope.id, props::POINTS).unwrap_or(0);
            let max = trial.int(&scope.id, props::MAX_POINTS).unwrap_or(0);
            let step = self.observe(points, max, level);
            if let Some(performance) = step.performance {
                trial.set(&scope.id, props::LEVEL_PERFORMANCE, performance);
            }
            trial.set(&scope.id, props::LEVEL_COUNTER, self.counter);
            level = step.level;
        }
        self.save(&scope.id, ctx.store());
        level
    }
}
