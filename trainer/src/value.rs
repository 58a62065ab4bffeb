//! Property values and scoped property maps.

use std::collections::BTreeMap;
use std::fmt;

use serde::{Deserialize, Serialize};

/// A primitive property value.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Value {
    Bool(bool),
    Int(i64),
    Float(f64),
    Text(String),
}

impl Value {
    pub fn as_i64(&self) -> Option<i64> {
        match self {
            Value::Int(v) => Some(*v),
            Value::Float(v) if v.fract() == 0.0 => Some(*v as i64),
            Value::Text(s) => s.trim().parse().ok(),
            Value::Bool(_) | Value::Float(_) => None,
        }
    }

    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Value::Int(v) => Some(*v as f64),
            Value::Float(v) => Some(*v),
            Value::Text(s) => s.trim().parse().ok(),
            Value::Bool(_) => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::Text(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Value::Bool(b) => Some(*b),
            Value::Text(s) => s.trim().parse().ok(),
            _ => None,
        }
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Bool(v) => write!(f, "{v}"),
            Value::Int(v) => write!(f, "{v}"),
            Value::Float(v) => write!(f, "{v}"),
            Value::Text(v) => f.write_str(v),
        }
    }
}

impl From<bool> for Value {
    fn from(v: bool) -> Self {
        Value::Bool(v)
    }
}

impl From<i64> for Value {
    fn from(v: i64) -> Self {
        Value::Int(v)
    }
}

impl From<i32> for Value {
    fn from(v: i32) -> Self {
        Value::Int(i64::from(v))
    }
}

impl From<u32> for Value {
    fn from(v: u32) -> Self {
        Value::Int(i64::from(v))
    }
}

impl From<f64> for Value {
    fn from(v: f64) -> Self {
        Value::Float(v)
    }
}

impl From<&str> for Value {
    fn from(v: &str) -> Self {
        Value::Text(v.to_string())
    }
}

impl From<String> for Value {
    fn from(v: String) -> Self {
        Value::Text(v)
    }
}

/// Properties keyed by `(scope, name)`, where the scope is the full id of the
/// node that owns the value.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct PropertyMap {
    scopes: BTreeMap<String, BTreeMap<String, Value>>,
}

impl PropertyMap {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, scope: &str, name: &str) -> Option<&Value> {
        self.scopes.get(scope).and_then(|props| props.get(name))
    }

    pub fn get_i64(&self, scope: &str, name: &str) -> Option<i64> {
        self.get(scope, name).and_then(Value::as_i64)
    }

    pub fn set(&mut self, scope: &str, name: &str, value: impl Into<Value>) {
        self.scopes
            .entry(scope.to_string())
            .or_default()
            .insert(name.to_string(), value.into());
    }

    pub fn remove(&mut self, scope: &str, name: &str) -> Option<Value> {
        let props = self.scopes.get_mut(scope)?;
        let removed = props.remove(name);
        if props.is_empty() {
            self.scopes.remove(scope);
        }
        removed
    }

    pub fn contains(&self, scope: &str, name: &str) -> bool {
        self.get(scope, name).is_some()
    }

    /// Add `delta` to an integer property, treating a missing value as zero.
    pub fn add_i64(&mut self, scope: &str, name: &str, delta: i64) -> i64 {
        let next = self.get_i64(scope, name).unwrap_or(0) + delta;
        self.set(scope, name, next);
        next
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &str, &Value)> {
        self.scopes.iter().flat_map(|(scope, props)| {
            props
                .iter()
                .map(move |(name, value)| (scope.as_str(), name.as_str(), value))
        })
    }

    pub fn is_empty(&self) -> bool {
        self.scopes.is_empty()
    }

    pub fn clear(&mut self) {
        self.scopes.clear();
    }
}
