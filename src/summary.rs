//! Startup summary and task list view.
//!
//! Both only read task data; neither touches the scheduler.

use chrono::{Duration, NaiveDateTime};
use serde::Serialize;

use crate::store::sorted_by_when;
use crate::task::{Task, TaskKind};

/// Notification title for the startup summary
pub const STARTUP_TITLE: &str = "Startup reminder";

/// What the startup notification reports
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct StartupSummary {
    /// Earliest normal task within the next 24 hours
    pub next_up: Option<Task>,
    /// Special tasks dated today
    pub specials_today: Vec<Task>,
}

impl StartupSummary {
    pub fn build(tasks: &[Task], now: NaiveDateTime) -> Self {
        let limit = now + Duration::days(1);
        let today = now.date();

        let next_up = tasks
            .iter()
            .filter(|t| !t.is_special() && now <= t.when && t.when < limit)
            .min_by_key(|t| t.when)
            .cloned();
        let specials_today = sorted_by_when(
            tasks
                .iter()
                .filter(|t| t.is_special() && t.when.date() == today)
                .cloned()
                .collect(),
        );

        Self {
            next_up,
            specials_today,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.next_up.is_none() && self.specials_today.is_empty()
    }

    /// Notification body, or `None` when there is nothing to report
    pub fn message(&self) -> Option<String> {
        let mut parts = Vec::new();
        if let Some(task) = &self.next_up {
            parts.push(format!(
                "Next 24h: {} @ {}",
                task.title,
                task.when.format("%H:%M")
            ));
        }
        if !self.specials_today.is_empty() {
            let titles: Vec<&str> = self
                .specials_today
                .iter()
                .map(|t| t.title.as_str())
                .collect();
            parts.push(format!("Special today: {}", titles.join(", ")));
        }
        (!parts.is_empty()).then(|| parts.join("\n"))
    }
}

/// Row highlight in the task list
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Highlight {
    /// Later today and not yet started
    Today,
    /// Started, special, or from a past day
    Overdue,
    /// More than 24 hours ahead
    Future,
    Plain,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ListEntry {
    pub date: String,
    pub time: String,
    pub title: String,
    pub kind: TaskKind,
    pub highlight: Highlight,
}

/// Tasks for display, sorted by start time.
///
/// Without `show_all`, shows today's special tasks, everything in the next
/// 24 hours, and every task whose start has passed (kept until deleted).
pub fn list_view(tasks: &[Task], now: NaiveDateTime, show_all: bool) -> Vec<ListEntry> {
    let limit = now + Duration::days(1);
    let today = now.date();

    sorted_by_when(tasks.to_vec())
        .into_iter()
        .filter(|t| {
            show_all
                || (t.is_special() && t.when.date() == today)
                || (now <= t.when && t.when < limit)
                || t.when < now
        })
        .map(|t| {
            let overdue = t.is_special() || t.when < now || t.when.date() < today;
            let highlight = if t.when.date() == today && !overdue {
                Highlight::Today
            } else if t.when >= limit {
                Highlight::Future
            } else if overdue {
                Highlight::Overdue
            } else {
                Highlight::Plain
            };
            ListEntry {
                date: t.when.format("%Y-%m-%d").to_string(),
                time: t.when.format("%H:%M").to_string(),
                title: t.title,
                kind: t.kind,
                highlight,
            }
        })
        .collect()
}
