//! Configuration loading and management
//!
//! Handles parsing of `config.toml` from the platform config directory
//! (or an explicit `--config` path).

use std::path::{Path, PathBuf};

use directories::{BaseDirs, ProjectDirs};
use serde::{Deserialize, Serialize};

use crate::duration::parse_duration;
use crate::error::{Error, Result};
use crate::escalation::EscalationPolicy;
use crate::trigger::SchedulePolicy;

/// File name of the task store inside the home directory
pub const DEFAULT_STORE_FILE: &str = ".daily_planner.json";

/// Main configuration structure
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    /// Task store location; defaults to `~/.daily_planner.json`
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub store: Option<PathBuf>,

    /// Reminder timing
    #[serde(default)]
    pub schedule: ScheduleConfig,

    /// Overdue escalation
    #[serde(default)]
    pub escalation: EscalationConfig,

    /// Notification delivery
    #[serde(default)]
    pub notifications: NotificationConfig,
}

/// Reminder timing configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScheduleConfig {
    /// How long before `when` each reminder fires, largest first
    #[serde(default = "default_reminder_offsets")]
    pub reminder_offsets: Vec<String>,

    /// Delay after `when` before the overdue check fires
    #[serde(default = "default_overdue_delay")]
    pub overdue_delay: String,

    /// Cadence of special-task notifications
    #[serde(default = "default_special_period")]
    pub special_period: String,

    /// Scheduler loop granularity
    #[serde(default = "default_tick")]
    pub tick: String,
}

fn default_reminder_offsets() -> Vec<String> {
    ["60m", "30m", "15m", "5m", "2m"]
        .iter()
        .map(|s| s.to_string())
        .collect()
}

fn default_overdue_delay() -> String {
    "5m".to_string()
}

fn default_special_period() -> String {
    "1h".to_string()
}

fn default_tick() -> String {
    "1s".to_string()
}

impl Default for ScheduleConfig {
    fn default() -> Self {
        Self {
            reminder_offsets: default_reminder_offsets(),
            overdue_delay: default_overdue_delay(),
            special_period: default_special_period(),
            tick: default_tick(),
        }
    }
}

/// Escalation configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EscalationConfig {
    /// Delay before re-asking after the user declines
    #[serde(default = "default_retry_interval")]
    pub retry_interval: String,

    /// Maximum number of prompts per task; unset means ask until answered
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_prompts: Option<u32>,
}

fn default_retry_interval() -> String {
    "30m".to_string()
}

impl Default for EscalationConfig {
    fn default() -> Self {
        Self {
            retry_interval: default_retry_interval(),
            max_prompts: None,
        }
    }
}

/// Notification backend selection
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum NotifierBackend {
    /// Native desktop notifications
    #[default]
    Desktop,
    /// External notifier binary (e.g. terminal-notifier)
    Command,
    /// Write notifications to the log only
    Log,
}

/// Notification configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NotificationConfig {
    #[serde(default)]
    pub backend: NotifierBackend,

    /// Notifier binary, required for the `command` backend
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub command: Option<PathBuf>,

    /// Optional sound name passed to the notifier
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sound: Option<String>,

    /// Desktop notification display timeout, and how long a notifier
    /// command may run before it is killed
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
}

fn default_timeout_secs() -> u64 {
    5
}

impl Default for NotificationConfig {
    fn default() -> Self {
        Self {
            backend: NotifierBackend::default(),
            command: None,
            sound: None,
            timeout_secs: default_timeout_secs(),
        }
    }
}

impl ScheduleConfig {
    /// Build the trigger planning policy
    pub fn policy(&self) -> Result<SchedulePolicy> {
        let mut reminder_offsets = Vec::with_capacity(self.reminder_offsets.len());
        for raw in &self.reminder_offsets {
            reminder_offsets.push(positive_duration(raw, "schedule.reminder_offsets")?);
        }
        Ok(SchedulePolicy {
            reminder_offsets,
            overdue_delay: positive_duration(&self.overdue_delay, "schedule.overdue_delay")?,
            special_period: positive_duration(&self.special_period, "schedule.special_period")?,
        })
    }

    /// Scheduler loop tick
    pub fn tick(&self) -> Result<std::time::Duration> {
        let tick = positive_duration(&self.tick, "schedule.tick")?;
        tick.to_std()
            .map_err(|err| Error::InvalidConfig(format!("schedule.tick: {err}")))
    }
}

impl EscalationConfig {
    /// Build the escalation policy
    pub fn policy(&self) -> Result<EscalationPolicy> {
        if self.max_prompts == Some(0) {
            return Err(Error::InvalidConfig(
                "escalation.max_prompts must be >= 1".to_string(),
            ));
        }
        Ok(EscalationPolicy {
            retry_interval: positive_duration(&self.retry_interval, "escalation.retry_interval")?,
            max_prompts: self.max_prompts,
        })
    }
}

impl NotificationConfig {
    fn validate(&self) -> Result<()> {
        if self.backend == NotifierBackend::Command && self.command.is_none() {
            return Err(Error::InvalidConfig(
                "notifications.command is required for the command backend".to_string(),
            ));
        }
        Ok(())
    }
}

fn positive_duration(raw: &str, field: &str) -> Result<chrono::Duration> {
    let duration =
        parse_duration(raw).map_err(|err| Error::InvalidConfig(format!("{field}: {err}")))?;
    if duration <= chrono::Duration::zero() {
        return Err(Error::InvalidConfig(format!(
            "{field}: duration must be positive, got '{raw}'"
        )));
    }
    Ok(duration)
}

impl Config {
    /// Default config file location (`<config dir>/dayplan/config.toml`)
    pub fn default_path() -> Option<PathBuf> {
        ProjectDirs::from("", "", "dayplan").map(|dirs| dirs.config_dir().join("config.toml"))
    }

    /// Load configuration from a TOML file
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        let config: Config = toml::from_str(&content)?;
        config.validate()?;
        Ok(config)
    }

    /// Load configuration if the file exists, or return defaults
    pub fn load_or_default(path: Option<&Path>) -> Result<Self> {
        match path {
            Some(path) if path.exists() => Self::load(path),
            _ => Ok(Self::default()),
        }
    }

    /// Save configuration to a file
    pub fn save(&self, path: &Path) -> Result<()> {
        let content = toml::to_string_pretty(self)?;
        std::fs::write(path, content)?;
        Ok(())
    }

    /// Resolve the task store path, falling back to the home directory
    pub fn store_path(&self) -> Result<PathBuf> {
        if let Some(path) = &self.store {
            return Ok(path.clone());
        }
        BaseDirs::new()
            .map(|dirs| dirs.home_dir().join(DEFAULT_STORE_FILE))
            .ok_or_else(|| {
                Error::InvalidConfig("cannot locate home directory for the task store".to_string())
            })
    }

    fn validate(&self) -> Result<()> {
        let policy = self.schedule.policy()?;
        if policy.reminder_offsets.is_empty() {
            return Err(Error::InvalidConfig(
                "schedule.reminder_offsets cannot be empty".to_string(),
            ));
        }
        self.schedule.tick()?;
        self.escalation.policy()?;
        self.notifications.validate()?;
        Ok(())
    }
}
