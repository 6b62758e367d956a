//! Task model
//!
//! A task is a titled, time-anchored item of one of two kinds:
//!
//! - **Normal**: one-shot. Reminders count down to `when`, and an overdue
//!   check fires shortly after it.
//! - **Special**: recurring. Notifies on a fixed cadence from `when` on,
//!   with no deadline.
//!
//! On disk each task is a flat record `{ title, when, special }` where
//! `when` is a local ISO-8601 timestamp. New tasks have second precision;
//! a stored timestamp with a fraction is kept as written.

use std::fmt;

use chrono::{NaiveDateTime, Timelike};
use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

/// Timestamp layout used on disk and in trigger identifiers
pub const WHEN_FORMAT: &str = "%Y-%m-%dT%H:%M:%S";

/// Task kind
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TaskKind {
    Normal,
    Special,
}

impl TaskKind {
    pub fn as_str(self) -> &'static str {
        match self {
            TaskKind::Normal => "normal",
            TaskKind::Special => "special",
        }
    }
}

impl fmt::Display for TaskKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A scheduled task
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "TaskRecord", into = "TaskRecord")]
pub struct Task {
    pub title: String,
    pub when: NaiveDateTime,
    pub kind: TaskKind,
}

/// Persisted shape of a task
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TaskRecord {
    pub title: String,
    pub when: NaiveDateTime,
    #[serde(default)]
    pub special: bool,
}

/// Lookup identity of a task: title plus start time
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct TaskKey {
    pub title: String,
    pub when: NaiveDateTime,
}

impl Task {
    /// Build a new task, rejecting empty titles and dropping sub-second
    /// precision
    pub fn new(title: impl Into<String>, when: NaiveDateTime, kind: TaskKind) -> Result<Self> {
        Self::checked(title.into(), truncate_to_seconds(when), kind)
    }

    fn checked(title: String, when: NaiveDateTime, kind: TaskKind) -> Result<Self> {
        if title.trim().is_empty() {
            return Err(Error::InvalidArgument(
                "task title cannot be empty".to_string(),
            ));
        }
        Ok(Self { title, when, kind })
    }

    pub fn normal(title: impl Into<String>, when: NaiveDateTime) -> Result<Self> {
        Self::new(title, when, TaskKind::Normal)
    }

    pub fn special(title: impl Into<String>, when: NaiveDateTime) -> Result<Self> {
        Self::new(title, when, TaskKind::Special)
    }

    pub fn is_special(&self) -> bool {
        self.kind == TaskKind::Special
    }

    /// Turn a normal task into a special one in place. Never reverses.
    pub fn promote(&mut self) {
        self.kind = TaskKind::Special;
    }

    pub fn key(&self) -> TaskKey {
        TaskKey {
            title: self.title.clone(),
            when: self.when,
        }
    }

    /// `when` rendered the way it is stored
    pub fn when_iso(&self) -> String {
        format_when(self.when)
    }
}

impl TryFrom<TaskRecord> for Task {
    type Error = Error;

    fn try_from(record: TaskRecord) -> Result<Self> {
        let kind = if record.special {
            TaskKind::Special
        } else {
            TaskKind::Normal
        };
        Task::checked(record.title, record.when, kind)
    }
}

impl From<Task> for TaskRecord {
    fn from(task: Task) -> Self {
        TaskRecord {
            special: task.is_special(),
            title: task.title,
            when: task.when,
        }
    }
}

pub fn format_when(when: NaiveDateTime) -> String {
    when.format(WHEN_FORMAT).to_string()
}

pub fn truncate_to_seconds(when: NaiveDateTime) -> NaiveDateTime {
    when.with_nanosecond(0).unwrap_or(when)
}
