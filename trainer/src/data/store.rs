use std::sync::{Mutex, PoisonError};

use crate::value::{PropertyMap, Value};

/// Persistent `(scope, name) -> value` storage, usually backed by the module.
pub trait PropertyStore: Send + Sync {
    fn get(&self, scope: &str, name: &str) -> Option<Value>;

    fn set(&self, scope: &str, name: &str, value: Value);

    fn get_i64(&self, scope: &str, name: &str) -> Option<i64> {
        self.get(scope, name).and_then(|v| v.as_i64())
    }

    fn get_f64(&self, scope: &str, name: &str) -> Option<f64> {
        self.get(scope, name).and_then(|v| v.as_f64())
    }

    /// Return the stored value, storing and returning `default` when absent.
    fn ensure(&self, scope: &str, name: &str, default: Value) -> Value {
        match self.get(scope, name) {
            Some(value) => value,
            None => {
                self.set(scope, name, default.clone());
                default
            }
        }
    }
}

/// Process-local [`PropertyStore`].
#[derive(Debug, Default)]
pub struct MemoryStore {
    values: Mutex<PropertyMap>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn snapshot(&self) -> PropertyMap {
        self.values
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }
}

impl PropertyStore for MemoryStore {
    fn get(&self, scope: &str, name: &str) -> Option<Value> {
        self.values
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .get(scope, name)
            .cloned()
    }

    fn set(&self, scope: &str, name: &str, value: Value) {
        self.values
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .set(scope, name, value);
    }
}

/// Session history lookup used by session-gated selectors.
pub trait SessionCounter: Send + Sync {
    /// Number of sessions recorded for `module`, optionally counting sessions
    /// that never finished.
    fn session_count(&self, module: &str, include_unfinished: bool) -> u32;
}

/// [`SessionCounter`] with fixed counts.
#[derive(Debug, Clone, Copy, Default)]
pub struct FixedSessionCount {
    pub finished: u32,
    pub unfinished: u32,
}

impl FixedSessionCount {
    pub fn finished(finished: u32) -> Self {
        Self {
            finished,
            unfinished: 0,
        }
    }
}

impl SessionCounter for FixedSessionCount {
    fn session_count(&self, _module: &str, include_unfinished: bool) -> u32 {
        if include_unfinished {
            self.finished + self.unfinished
        } else {
            self.finished
        }
    }
}
