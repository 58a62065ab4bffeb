use std::sync::{Mutex, PoisonError};

use serde::Serialize;

use crate::data::Trial;
use crate::value::Value;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub struct TrialId(pub usize);

/// Append-only trial persistence.
pub trait TrialRecorder: Send + Sync {
    fn create_trial(&self, parent_id: &str) -> TrialId;

    fn append_property(&self, trial: TrialId, scope: &str, name: &str, value: Value);

    fn list_trials(&self) -> Vec<Trial>;

    /// Persist a complete trial.
    fn record(&self, trial: &Trial) -> TrialId {
        let id = self.create_trial(trial.parent_id());
        for prop in trial.properties() {
            self.append_property(id, &prop.scope, &prop.name, prop.value.clone());
        }
        id
    }
}

/// Process-local [`TrialRecorder`].
#[derive(Debug, Default)]
pub struct MemoryRecorder {
    trials: Mutex<Vec<Trial>>,
}

impl MemoryRecorder {
    pub fn new() -> Self {
        Self::default()
    }
}

impl TrialRecorder for MemoryRecorder {
    fn create_trial(&self, parent_id: &str) -> TrialId {
        let mut trials = self.trials.lock().unwrap_or_else(PoisonError::into_inner);
        trials.push(Trial::new(parent_id));
        TrialId(trials.len() - 1)
    }

    fn append_property(&self, trial: TrialId, scope: &str, name: &str, value: Value) {
        let mut trials = self.trials.lock().unwrap_or_else(PoisonError::into_inner);
        if let Some(existing) = trials.get_mut(trial.0) {
            if existing.contains(scope, name) {
                tracing::warn!(trial = trial.0, scope, name, "ignoring overwrite of recorded trial property");
                return;
            }
            existing.set(scope, name, value);
        }
    }

    fn list_trials(&self) -> Vec<Trial> {
        self.trials
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }
}
