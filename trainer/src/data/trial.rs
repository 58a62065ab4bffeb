use serde::Serialize;

use crate::data::props;
use crate::value::Value;

/// One scoped property of a trial.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TrialProperty {
    pub scope: String,
    pub name: String,
    pub value: Value,
}

/// Record of a single response or stimulus presentation.
///
/// Properties keep their insertion order. Setting an existing `(scope, name)`
/// pair replaces the value in place.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Trial {
    parent_id: String,
    properties: Vec<TrialProperty>,
}

impl Trial {
    pub fn new(parent_id: impl Into<String>) -> Self {
        Self {
            parent_id: parent_id.into(),
            properties: Vec::new(),
        }
    }

    /// Full id of the leaf that produced this trial.
    pub fn parent_id(&self) -> &str {
        &self.parent_id
    }

    pub fn get(&self, scope: &str, name: &str) -> Option<&Value> {
        self.properties
            .iter()
            .find(|p| p.scope == scope && p.name == name)
            .map(|p| &p.value)
    }

    pub fn int(&self, scope: &str, name: &str) -> Option<i64> {
        self.get(scope, name).and_then(Value::as_i64)
    }

    pub fn text(&self, scope: &str, name: &str) -> Option<&str> {
        self.get(scope, name).and_then(Value::as_str)
    }

    pub fn contains(&self, scope: &str, name: &str) -> bool {
        self.get(scope, name).is_some()
    }

    pub fn set(&mut self, scope: &str, name: &str, value: impl Into<Value>) {
        let value = value.into();
        match self
            .properties
            .iter_mut()
            .find(|p| p.scope == scope && p.name == name)
        {
            Some(existing) => existing.value = value,
            None => self.properties.push(TrialProperty {
                scope: scope.to_string(),
                name: name.to_string(),
                value,
            }),
        }
    }

    /// Builder form of [`Trial::set`].
    pub fn with(mut self, scope: &str, name: &str, value: impl Into<Value>) -> Self {
        self.set(scope, name, value);
        self
    }

    /// Record min/points/max under `scope`.
    pub fn with_points(self, scope: &str, min: i64, points: i64, max: i64) -> Self {
        self.with(scope, props::MIN_POINTS, min)
            .with(scope, props::POINTS, points)
            .with(scope, props::MAX_POINTS, max)
    }

    /// Record a success/failure result under `scope`.
    pub fn with_result(self, scope: &str, success: bool) -> Self {
        let result = if success {
            props::RESULT_SUCCESS
        } else {
            props::RESULT_FAILURE
        };
        self.with(scope, props::RESULT, result)
    }

    pub fn properties(&self) -> &[TrialProperty] {
        &self.properties
    }
}
