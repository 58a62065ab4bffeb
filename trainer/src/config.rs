//! Engine configuration stored as TOML.

use std::fs;
use std::path::Path;
use std::time::Duration;

use anyhow::{Context, Result, anyhow};
use serde::{Deserialize, Serialize};

/// Engine configuration (TOML).
///
/// Every field has a default, so a partial or missing file is valid. Values
/// here are the defaults handed to handlers built by the CLI; handlers built
/// in code take their own arguments.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct EngineConfig {
    /// Upper bound on scheduler steps per selection before giving up.
    pub max_selection_steps: u32,

    pub pause: PauseConfig,
    pub timeout: TimeoutConfig,
    pub level_feedback: LevelFeedbackConfig,
    pub selection: SelectionConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct PauseConfig {
    /// Pause between tasks in milliseconds.
    pub default_ms: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct TimeoutConfig {
    /// Per-task deadline in milliseconds.
    pub default_ms: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct LevelFeedbackConfig {
    /// How long a level change announcement stays up; 0 disables it.
    pub display_ms: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct SelectionConfig {
    pub timer_list_ms: u64,
    pub temporal_list_ms: u64,
}

impl Default for PauseConfig {
    fn default() -> Self {
        Self { default_ms: 500 }
    }
}

impl Default for TimeoutConfig {
    fn default() -> Self {
        Self { default_ms: 3000 }
    }
}

impl Default for LevelFeedbackConfig {
    fn default() -> Self {
        Self { display_ms: 3000 }
    }
}

impl Default for SelectionConfig {
    fn default() -> Self {
        Self {
            timer_list_ms: 10_000,
            temporal_list_ms: 10_000,
        }
    }
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            max_selection_steps: 100,
            pause: PauseConfig::default(),
            timeout: TimeoutConfig::default(),
            level_feedback: LevelFeedbackConfig::default(),
            selection: SelectionConfig::default(),
        }
    }
}

impl EngineConfig {
    pub fn validate(&self) -> Result<()> {
        if self.max_selection_steps == 0 {
            return Err(anyhow!("max_selection_steps must be > 0"));
        }
        if self.timeout.default_ms == 0 {
            return Err(anyhow!("timeout.default_ms must be > 0"));
        }
        if self.selection.timer_list_ms == 0 {
            return Err(anyhow!("selection.timer_list_ms must be > 0"));
        }
        if self.selection.temporal_list_ms == 0 {
            return Err(anyhow!("selection.temporal_list_ms must be > 0"));
        }
        Ok(())
    }

    pub fn pause(&self) -> Duration {
        Duration::from_millis(self.pause.default_ms)
    }

    pub fn timeout(&self) -> Duration {
        Duration::from_millis(self.timeout.default_ms)
    }

    pub fn level_feedback(&self) -> Duration {
        Duration::from_millis(self.level_feedback.display_ms)
    }

    pub fn timer_list(&self) -> Duration {
        Duration::from_millis(self.selection.timer_list_ms)
    }

    pub fn temporal_list(&self) -> Duration {
        Duration::from_millis(self.selection.temporal_list_ms)
    }
}

/// Load config from a TOML file.
///
/// If the file is missing, returns `EngineConfig::default()`.
pub fn load_config(path: &Path) -> Result<EngineConfig> {
    if !path.exists() {
        let cfg = EngineConfig::default();
        cfg.validate()?;
        return Ok(cfg);
    }
    let contents = fs::read_to_string(path).with_context(|| format!("read {}", path.display()))?;
    let cfg: EngineConfig =
        toml::from_str(&contents).with_context(|| format!("parse {}", path.display()))?;
    cfg.validate()?;
    Ok(cfg)
}

/// Atomically write config to disk (temp file + rename).
pub fn write_config(path: &Path, cfg: &EngineConfig) -> Result<()> {
    cfg.validate()?;
    let mut buf = toml::to_string_pretty(cfg).context("serialize config toml")?;
    buf.push('\n');
    let parent = path
        .parent()
        .with_context(|| format!("config path missing parent {}", path.display()))?;
    fs::create_dir_all(parent).with_context(|| format!("create directory {}", parent.display()))?;
    let tmp_path = path.with_extension("toml.tmp");
    fs::write(&tmp_path, &buf)
        .with_context(|| format!("write temp config {}", tmp_path.display()))?;
    fs::rename(&tmp_path, path).with_context(|| format!("replace config {}", path.display()))?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn load_missing_returns_default() {
        let temp = tempfile::tempdir().expect("tempdir");
        let cfg = load_config(&temp.path().join("missing.toml")).expect("load");
        assert_eq!(cfg, EngineConfig::default());
        assert_eq!(cfg.pause(), Duration::from_millis(500));
        assert_eq!(cfg.timeout(), Duration::from_millis(3000));
    }

    #[test]
    fn write_then_load_round_trips() {
        let temp = tempfile::tempdir().expect("tempdir");
        let path = temp.path().join("nested").join("engine.toml");
        let mut cfg = EngineConfig::default();
        cfg.pause.default_ms = 0;
        cfg.level_feedback.display_ms = 1200;
        write_config(&path, &cfg).expect("write");
        assert_eq!(load_config(&path).expect("load"), cfg);
    }

    #[test]
    fn partial_file_keeps_other_defaults() {
        let temp = tempfile::tempdir().expect("tempdir");
        let path = temp.path().join("engine.toml");
        fs::write(&path, "max_selection_steps = 40\n[timeout]\ndefault_ms = 1500\n").expect("write");
        let cfg = load_config(&path).expect("load");
        assert_eq!(cfg.max_selection_steps, 40);
        assert_eq!(cfg.timeout.default_ms, 1500);
        assert_eq!(cfg.pause, PauseConfig::default());
    }

    #[test]
    fn zero_step_bound_is_rejected() {
        let cfg = EngineConfig {
            max_selection_steps: 0,
            ..EngineConfig::default()
        };
        let err = cfg.validate().expect_err("invalid");
        assert!(err.to_string().contains("max_selection_steps"));
    }
}
