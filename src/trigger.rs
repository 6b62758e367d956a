//! Trigger planning
//!
//! A trigger is one scheduled future action: a notification or an
//! escalation check. [`plan_triggers`] turns a task into the full set of
//! triggers it needs right now; the scheduler only stores and fires them.
//!
//! Every trigger identifier embeds the task's `when`, so "cancel all
//! triggers for a task" is exactly "drop every trigger whose id carries
//! that timestamp".

use std::fmt;

use chrono::{Duration, NaiveDateTime};
use serde::Serialize;

use crate::task::{format_when, Task, TaskKind};

/// Notification title for countdown reminders
pub const REMINDER_TITLE: &str = "Schedule reminder";

/// Notification title for special-task repeats
pub const SPECIAL_TITLE: &str = "Special task reminder";

/// Timing knobs for trigger planning
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SchedulePolicy {
    /// Lead times before `when`, largest first
    pub reminder_offsets: Vec<Duration>,
    /// Overdue check delay after `when`
    pub overdue_delay: Duration,
    /// Special-task cadence
    pub special_period: Duration,
}

impl Default for SchedulePolicy {
    fn default() -> Self {
        Self {
            reminder_offsets: [60, 30, 15, 5, 2]
                .into_iter()
                .map(Duration::minutes)
                .collect(),
            overdue_delay: Duration::minutes(5),
            special_period: Duration::hours(1),
        }
    }
}

/// What kind of trigger an id names
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TriggerKind {
    /// Countdown reminder `offset` before `when`
    Reminder(Duration),
    /// First overdue check after `when`
    Overdue,
    /// Re-prompt after the user declined escalation
    Retry,
    /// Recurring special-task notification
    Special,
}

/// Deterministic trigger identifier
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct TriggerId {
    pub kind: TriggerKind,
    pub when: NaiveDateTime,
}

impl TriggerId {
    pub fn new(kind: TriggerKind, when: NaiveDateTime) -> Self {
        Self { kind, when }
    }

    pub fn belongs_to(&self, when: NaiveDateTime) -> bool {
        self.when == when
    }
}

impl fmt::Display for TriggerId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let when = format_when(self.when);
        match self.kind {
            TriggerKind::Reminder(offset) => {
                if offset.num_seconds() % 60 == 0 {
                    write!(f, "pre_{}_{when}", offset.num_minutes())
                } else {
                    write!(f, "pre_{}s_{when}", offset.num_seconds())
                }
            }
            TriggerKind::Overdue => write!(f, "od_{when}"),
            TriggerKind::Retry => write!(f, "repeat_{when}"),
            TriggerKind::Special => write!(f, "spec_{when}"),
        }
    }
}

impl Serialize for TriggerId {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

/// When a trigger fires
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Schedule {
    Once { at: NaiveDateTime },
    Every { first: NaiveDateTime, period: PeriodSecs },
}

/// Recurrence period, serialized as whole seconds
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PeriodSecs(pub Duration);

impl Serialize for PeriodSecs {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_i64(self.0.num_seconds())
    }
}

impl Schedule {
    pub fn every(first: NaiveDateTime, period: Duration) -> Self {
        Schedule::Every {
            first,
            period: PeriodSecs(period),
        }
    }

    /// First fire time
    pub fn first_fire(&self) -> NaiveDateTime {
        match self {
            Schedule::Once { at } => *at,
            Schedule::Every { first, .. } => *first,
        }
    }

    pub fn period(&self) -> Option<Duration> {
        match self {
            Schedule::Once { .. } => None,
            Schedule::Every { period, .. } => Some(period.0),
        }
    }
}

/// What happens when a trigger fires
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum TriggerAction {
    /// Deliver a notification
    Notify { title: String, message: String },
    /// Ask whether the task at `when` should become special
    Escalate { when: NaiveDateTime },
}

/// A planned trigger
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Trigger {
    pub id: TriggerId,
    pub schedule: Schedule,
    pub action: TriggerAction,
}

/// Plan every trigger `task` needs as of `now`.
///
/// Special tasks get one recurring notification starting at
/// `max(when, now)`. Normal tasks get a reminder per offset whose fire time
/// is still strictly ahead of `now`, plus one overdue check at
/// `when + overdue_delay` if that is still ahead. Missed reminders are not
/// caught up, and a trigger whose fire time falls outside chrono's range is
/// skipped.
pub fn plan_triggers(task: &Task, now: NaiveDateTime, policy: &SchedulePolicy) -> Vec<Trigger> {
    match task.kind {
        TaskKind::Special => vec![Trigger {
            id: TriggerId::new(TriggerKind::Special, task.when),
            schedule: Schedule::every(task.when.max(now), policy.special_period),
            action: TriggerAction::Notify {
                title: SPECIAL_TITLE.to_string(),
                message: task.title.clone(),
            },
        }],
        TaskKind::Normal => {
            let mut triggers: Vec<Trigger> = policy
                .reminder_offsets
                .iter()
                .filter_map(|&offset| {
                    let at = task.when.checked_sub_signed(offset).filter(|at| *at > now)?;
                    Some(Trigger {
                        id: TriggerId::new(TriggerKind::Reminder(offset), task.when),
                        schedule: Schedule::Once { at },
                        action: TriggerAction::Notify {
                            title: REMINDER_TITLE.to_string(),
                            message: reminder_message(offset, &task.title),
                        },
                    })
                })
                .collect();

            let overdue_at = task
                .when
                .checked_add_signed(policy.overdue_delay)
                .filter(|at| *at > now);
            if let Some(overdue_at) = overdue_at {
                triggers.push(Trigger {
                    id: TriggerId::new(TriggerKind::Overdue, task.when),
                    schedule: Schedule::Once { at: overdue_at },
                    action: TriggerAction::Escalate { when: task.when },
                });
            }
            triggers
        }
    }
}

/// One-shot re-prompt for the task at `when`
pub fn retry_trigger(when: NaiveDateTime, at: NaiveDateTime) -> Trigger {
    Trigger {
        id: TriggerId::new(TriggerKind::Retry, when),
        schedule: Schedule::Once { at },
        action: TriggerAction::Escalate { when },
    }
}

fn reminder_message(offset: Duration, title: &str) -> String {
    let minutes = offset.num_minutes();
    if offset.num_seconds() % 60 == 0 {
        let unit = if minutes == 1 { "minute" } else { "minutes" };
        format!("In {minutes} {unit}: {title}")
    } else {
        format!("In {} seconds: {title}", offset.num_seconds())
    }
}
