//! Foreground loop
//!
//! Owns every store read/write the daemon makes and every prompt. The
//! scheduler's background loop only posts [`ForegroundEvent`]s here.
//!
//! The daemon keeps a snapshot of the store grouped by start time. When
//! the store changes under it, every start time whose group of tasks
//! differs is cancelled and re-installed, so a deleted task never keeps a
//! live trigger and a new task is scheduled without a restart.

use std::collections::{BTreeMap, BTreeSet};
use std::sync::Arc;

use chrono::NaiveDateTime;
use serde::Serialize;
use tokio::sync::mpsc;
use tracing::{error, info};

use crate::error::Result;
use crate::escalation::{EscalationController, EscalationOutcome};
use crate::scheduler::{ForegroundEvent, Scheduler};
use crate::sink::{deliver, Notifier};
use crate::store::TaskStore;
use crate::summary::{StartupSummary, STARTUP_TITLE};
use crate::task::Task;

/// What startup did
#[derive(Debug, Clone, Serialize)]
pub struct BootstrapReport {
    pub tasks: usize,
    pub triggers: usize,
    pub summary: Option<String>,
}

/// What a reconcile pass changed
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ReconcileReport {
    /// Start times whose triggers were rebuilt
    pub rescheduled: Vec<NaiveDateTime>,
    pub cancelled: usize,
    pub installed: usize,
}

pub struct Daemon {
    store: Arc<dyn TaskStore>,
    scheduler: Arc<Scheduler>,
    notifier: Arc<dyn Notifier>,
    known: BTreeMap<NaiveDateTime, Vec<Task>>,
}

impl Daemon {
    pub fn new(
        store: Arc<dyn TaskStore>,
        scheduler: Arc<Scheduler>,
        notifier: Arc<dyn Notifier>,
    ) -> Self {
        Self {
            store,
            scheduler,
            notifier,
            known: BTreeMap::new(),
        }
    }

    /// Load the store once, send the startup summary, install everything.
    ///
    /// A malformed store aborts startup.
    pub fn bootstrap(&mut self) -> Result<BootstrapReport> {
        let tasks = self.store.load_all()?;

        let summary = StartupSummary::build(&tasks, self.scheduler.now()).message();
        if let Some(message) = &summary {
            deliver(self.notifier.as_ref(), STARTUP_TITLE, message);
        }

        let triggers = tasks
            .iter()
            .map(|task| self.scheduler.install(task).len())
            .sum();
        info!(tasks = tasks.len(), triggers, "bootstrapped");

        let report = BootstrapReport {
            tasks: tasks.len(),
            triggers,
            summary,
        };
        self.known = group_by_when(tasks);
        Ok(report)
    }

    /// Bring triggers in line with the current store contents
    pub fn reconcile(&mut self) -> Result<ReconcileReport> {
        let current = group_by_when(self.store.load_all()?);

        let times: BTreeSet<NaiveDateTime> =
            self.known.keys().chain(current.keys()).copied().collect();

        let mut report = ReconcileReport::default();
        for when in times {
            let before = self.known.get(&when);
            let after = current.get(&when);
            if before == after {
                continue;
            }
            report.cancelled += self.scheduler.cancel(when);
            if let Some(tasks) = after {
                for task in tasks {
                    report.installed += self.scheduler.install(task).len();
                }
            }
            report.rescheduled.push(when);
        }

        if !report.rescheduled.is_empty() {
            info!(
                rescheduled = report.rescheduled.len(),
                cancelled = report.cancelled,
                installed = report.installed,
                "reconciled with store"
            );
        }
        self.known = current;
        Ok(report)
    }

    /// Apply one event. Returns `false` when the loop should stop.
    pub fn handle_event(
        &mut self,
        controller: &mut EscalationController,
        event: ForegroundEvent,
    ) -> bool {
        match event {
            ForegroundEvent::EscalationRequested { when } => {
                match controller.handle(when) {
                    Ok(EscalationOutcome::Escalated { .. }) => {
                        if let Err(err) = self.refresh_group(when) {
                            error!("cannot refresh tasks after escalation: {err}");
                        }
                    }
                    Ok(outcome) => info!(when = %when, ?outcome, "escalation step"),
                    Err(err) => error!(when = %when, "escalation failed: {err}"),
                }
                true
            }
            ForegroundEvent::StoreChanged => {
                if let Err(err) = self.reconcile() {
                    error!("cannot reconcile with store: {err}");
                }
                true
            }
            ForegroundEvent::Shutdown => false,
        }
    }

    /// Block on `events` until shutdown or until every sender is gone
    pub fn run(
        &mut self,
        controller: &mut EscalationController,
        events: &mut mpsc::UnboundedReceiver<ForegroundEvent>,
    ) {
        while let Some(event) = events.blocking_recv() {
            if !self.handle_event(controller, event) {
                break;
            }
        }
        info!("foreground loop finished");
    }

    // The controller already rescheduled this start time; only the snapshot moves.
    fn refresh_group(&mut self, when: NaiveDateTime) -> Result<()> {
        let group: Vec<Task> = self
            .store
            .load_all()?
            .into_iter()
            .filter(|t| t.when == when)
            .collect();
        if group.is_empty() {
            self.known.remove(&when);
        } else {
            self.known.insert(when, sorted_group(group));
        }
        Ok(())
    }
}

fn group_by_when(tasks: Vec<Task>) -> BTreeMap<NaiveDateTime, Vec<Task>> {
    let mut groups: BTreeMap<NaiveDateTime, Vec<Task>> = BTreeMap::new();
    for task in tasks {
        groups.entry(task.when).or_default().push(task);
    }
    groups
        .into_iter()
        .map(|(when, group)| (when, sorted_group(group)))
        .collect()
}

fn sorted_group(mut group: Vec<Task>) -> Vec<Task> {
    group.sort_by(|a, b| a.title.cmp(&b.title).then(a.kind.as_str().cmp(b.kind.as_str())));
    group
}
