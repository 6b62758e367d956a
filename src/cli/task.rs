//! dayplan add / rm / list
//!
//! These commands only edit the store. A running daemon picks the change
//! up through its store watcher and installs or cancels triggers.

use chrono::{NaiveDate, NaiveDateTime, NaiveTime, Timelike};
use serde::Serialize;

use crate::clock::{Clock, SystemClock};
use crate::error::{Error, Result};
use crate::output::{emit_success, HumanOutput, OutputOptions};
use crate::store::{insert_task, remove_matching, TaskStore};
use crate::summary::{list_view, Highlight, ListEntry};
use crate::task::{format_when, Task};
use crate::trigger::{plan_triggers, Trigger};

use super::Context;

/// Options for `dayplan add`
pub struct AddOptions {
    pub title: String,
    pub date: Option<String>,
    pub time: Option<String>,
    pub json: bool,
    pub quiet: bool,
}

/// Options for `dayplan rm`
pub struct RmOptions {
    pub title: String,
    pub date: Option<String>,
    pub time: Option<String>,
    pub json: bool,
    pub quiet: bool,
}

/// Options for `dayplan list`
pub struct ListOptions {
    pub all: bool,
    pub json: bool,
    pub quiet: bool,
}

#[derive(Serialize)]
struct AddReport {
    task: Task,
    planned: Vec<Trigger>,
}

#[derive(Serialize)]
struct RmReport {
    removed: Vec<Task>,
}

#[derive(Serialize)]
struct ListReport {
    tasks: Vec<ListEntry>,
}

pub fn run_add(ctx: &Context, options: AddOptions) -> Result<()> {
    let now = SystemClock.now();
    let task = build_task(&options.title, options.date.as_deref(), options.time.as_deref(), now)?;

    insert_task(&ctx.store(), task.clone())?;

    let policy = ctx.config.schedule.policy()?;
    let planned = plan_triggers(&task, now, &policy);

    let mut human = HumanOutput::new(format!("dayplan add: {}", task.title));
    human.push_summary("when", task.when.format("%Y-%m-%d %H:%M").to_string());
    human.push_summary("kind", task.kind.to_string());
    for trigger in &planned {
        human.push_detail(format!(
            "{}  {}",
            trigger.schedule.first_fire().format("%Y-%m-%d %H:%M"),
            trigger.id
        ));
    }
    if planned.is_empty() {
        human.push_warning("no reminders left to schedule");
    }

    emit_success(
        OutputOptions {
            json: options.json,
            quiet: options.quiet,
        },
        "add",
        &AddReport { task, planned },
        Some(&human),
    )
}

pub fn run_rm(ctx: &Context, options: RmOptions) -> Result<()> {
    let now = SystemClock.now();
    let date = parse_date(options.date.as_deref(), now)?;
    let time = options.time.as_deref().map(parse_time).transpose()?;

    let removed = remove_matching(&ctx.store(), |task| {
        task.title == options.title
            && task.when.date() == date
            && time.map_or(true, |t| same_minute(task.when.time(), t))
    })?;

    if removed.is_empty() {
        let at = match time {
            Some(t) => format!("{date} {}", t.format("%H:%M")),
            None => date.to_string(),
        };
        return Err(Error::TaskNotFound(format!("{} on {at}", options.title)));
    }

    let mut human = HumanOutput::new(format!("dayplan rm: {}", options.title));
    human.push_summary("removed", removed.len().to_string());
    for task in &removed {
        human.push_detail(format_when(task.when));
    }

    emit_success(
        OutputOptions {
            json: options.json,
            quiet: options.quiet,
        },
        "rm",
        &RmReport { removed },
        Some(&human),
    )
}

pub fn run_list(ctx: &Context, options: ListOptions) -> Result<()> {
    let tasks = ctx.store().load_all()?;
    let entries = list_view(&tasks, SystemClock.now(), options.all);

    let mut human = HumanOutput::new(format!("dayplan list: {} task(s)", entries.len()));
    for entry in &entries {
        human.push_detail(format!(
            "{} {}  {:<8} {}",
            entry.date,
            entry.time,
            highlight_label(entry.highlight),
            entry.title
        ));
    }

    emit_success(
        OutputOptions {
            json: options.json,
            quiet: options.quiet,
        },
        "list",
        &ListReport { tasks: entries },
        Some(&human),
    )
}

/// Build a task from CLI input.
///
/// Without a time the task is special and starts at the day's midnight,
/// or now if that has passed. A normal task may not start in the past.
fn build_task(
    title: &str,
    date: Option<&str>,
    time: Option<&str>,
    now: NaiveDateTime,
) -> Result<Task> {
    let date = parse_date(date, now)?;
    match time {
        None => {
            let start = date.and_time(NaiveTime::MIN).max(now);
            Task::special(title, start)
        }
        Some(raw) => {
            let start = date.and_time(parse_time(raw)?);
            if start < now {
                return Err(Error::InvalidArgument(format!(
                    "start {} is in the past",
                    start.format("%Y-%m-%d %H:%M")
                )));
            }
            Task::normal(title, start)
        }
    }
}

fn parse_date(raw: Option<&str>, now: NaiveDateTime) -> Result<NaiveDate> {
    match raw.map(str::trim).filter(|s| !s.is_empty()) {
        None => Ok(now.date()),
        Some(raw) => NaiveDate::parse_from_str(raw, "%Y-%m-%d").map_err(|_| {
            Error::InvalidArgument(format!("date '{raw}' must be YYYY-MM-DD"))
        }),
    }
}

fn parse_time(raw: &str) -> Result<NaiveTime> {
    NaiveTime::parse_from_str(raw.trim(), "%H:%M")
        .map_err(|_| Error::InvalidArgument(format!("time '{raw}' must be HH:MM")))
}

fn same_minute(a: NaiveTime, b: NaiveTime) -> bool {
    a.hour() == b.hour() && a.minute() == b.minute()
}

fn highlight_label(highlight: Highlight) -> &'static str {
    match highlight {
        Highlight::Today => "[today]",
        Highlight::Overdue => "[overdue]",
        Highlight::Future => "[future]",
        Highlight::Plain => "",
    }
}
