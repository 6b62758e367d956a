//! Reminder scheduler service
//!
//! Holds every pending trigger for the process and fires the ones that
//! are due. One instance is built at startup and shared by reference
//! (`Arc<Scheduler>`) with everything that installs or cancels triggers.
//!
//! Firing model:
//! - a background tokio task ticks at a fixed granularity and calls
//!   [`Scheduler::fire_due`] with the current time;
//! - due triggers are taken out of (or, when recurring, re-armed in) the
//!   pending set under the lock, then dispatched after the lock is
//!   released, so a cancel never interrupts a trigger already in flight;
//! - notifications go to the [`Notifier`]; the background loop hands them
//!   to tokio's blocking pool without waiting, so a slow backend never
//!   holds up later triggers;
//! - escalation checks are handed to the foreground loop as
//!   [`ForegroundEvent`]s, because the confirmation prompt must run there.
//!
//! Installing the same task twice without cancelling in between yields
//! duplicate triggers. Callers rescheduling a task cancel first.

use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration as StdDuration;

use chrono::{Duration, NaiveDateTime};
use serde::Serialize;
use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use crate::clock::Clock;
use crate::sink::{deliver, Notifier};
use crate::task::Task;
use crate::trigger::{
    plan_triggers, retry_trigger, Schedule, SchedulePolicy, Trigger, TriggerAction, TriggerId,
};

/// Work handed to the foreground thread
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ForegroundEvent {
    /// An overdue or retry trigger fired for the task at `when`
    EscalationRequested { when: NaiveDateTime },
    /// The task store changed on disk
    StoreChanged,
    /// Stop the foreground loop
    Shutdown,
}

/// Snapshot of one pending trigger
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PendingTrigger {
    pub id: TriggerId,
    pub next_fire: NaiveDateTime,
    pub schedule: Schedule,
    pub action: TriggerAction,
}

#[derive(Debug)]
struct Entry {
    seq: u64,
    trigger: Trigger,
    next_fire: NaiveDateTime,
}

#[derive(Debug, Default)]
struct State {
    entries: Vec<Entry>,
    next_seq: u64,
}

pub struct Scheduler {
    state: Mutex<State>,
    policy: SchedulePolicy,
    clock: Arc<dyn Clock>,
    notifier: Arc<dyn Notifier>,
    events: mpsc::UnboundedSender<ForegroundEvent>,
    shutdown_tx: watch::Sender<bool>,
}

impl Scheduler {
    pub fn new(
        policy: SchedulePolicy,
        clock: Arc<dyn Clock>,
        notifier: Arc<dyn Notifier>,
        events: mpsc::UnboundedSender<ForegroundEvent>,
    ) -> Self {
        let (shutdown_tx, _) = watch::channel(false);
        Self {
            state: Mutex::new(State::default()),
            policy,
            clock,
            notifier,
            events,
            shutdown_tx,
        }
    }

    pub fn policy(&self) -> &SchedulePolicy {
        &self.policy
    }

    pub fn now(&self) -> NaiveDateTime {
        self.clock.now()
    }

    fn state(&self) -> MutexGuard<'_, State> {
        self.state.lock().unwrap_or_else(|p| p.into_inner())
    }

    /// Install every future trigger for `task`.
    ///
    /// Returns the ids installed; empty when all would already be past.
    pub fn install(&self, task: &Task) -> Vec<TriggerId> {
        let plan = plan_triggers(task, self.clock.now(), &self.policy);
        let ids = self.install_plan(plan);
        debug!(
            task = %task.title,
            when = %task.when_iso(),
            kind = %task.kind,
            count = ids.len(),
            "installed triggers"
        );
        ids
    }

    /// Install already-planned triggers as-is
    pub fn install_plan(&self, plan: Vec<Trigger>) -> Vec<TriggerId> {
        let mut state = self.state();
        plan.into_iter()
            .map(|trigger| {
                let id = trigger.id;
                let seq = state.next_seq;
                state.next_seq += 1;
                state.entries.push(Entry {
                    seq,
                    next_fire: trigger.schedule.first_fire(),
                    trigger,
                });
                id
            })
            .collect()
    }

    /// Arm a one-shot re-prompt for the task at `when`
    pub fn arm_retry(&self, when: NaiveDateTime, at: NaiveDateTime) -> TriggerId {
        let trigger = retry_trigger(when, at);
        let id = trigger.id;
        self.install_plan(vec![trigger]);
        debug!(trigger = %id, at = %at, "armed escalation retry");
        id
    }

    /// Drop every pending trigger derived from `when`.
    ///
    /// Returns how many were removed; zero is fine.
    pub fn cancel(&self, when: NaiveDateTime) -> usize {
        let mut state = self.state();
        let before = state.entries.len();
        state.entries.retain(|entry| !entry.trigger.id.belongs_to(when));
        let removed = before - state.entries.len();
        if removed > 0 {
            debug!(when = %when, removed, "cancelled triggers");
        }
        removed
    }

    /// All pending triggers, earliest first
    pub fn pending(&self) -> Vec<PendingTrigger> {
        let state = self.state();
        let mut snapshot: Vec<(u64, PendingTrigger)> = state
            .entries
            .iter()
            .map(|entry| {
                (
                    entry.seq,
                    PendingTrigger {
                        id: entry.trigger.id,
                        next_fire: entry.next_fire,
                        schedule: entry.trigger.schedule,
                        action: entry.trigger.action.clone(),
                    },
                )
            })
            .collect();
        snapshot.sort_by(|(a_seq, a), (b_seq, b)| {
            a.next_fire.cmp(&b.next_fire).then(a_seq.cmp(b_seq))
        });
        snapshot.into_iter().map(|(_, pending)| pending).collect()
    }

    /// Pending triggers for the task at `when`
    pub fn pending_for(&self, when: NaiveDateTime) -> Vec<PendingTrigger> {
        self.pending()
            .into_iter()
            .filter(|p| p.id.belongs_to(when))
            .collect()
    }

    /// Earliest pending fire time
    pub fn next_fire(&self) -> Option<NaiveDateTime> {
        self.state().entries.iter().map(|e| e.next_fire).min()
    }

    /// Fire everything due at `now`. Returns the number of dispatches.
    pub fn fire_due(&self, now: NaiveDateTime) -> usize {
        let due = self.take_due(now);
        for (id, action) in &due {
            self.dispatch(*id, action);
        }
        due.len()
    }

    fn take_due(&self, now: NaiveDateTime) -> Vec<(TriggerId, TriggerAction)> {
        let mut state = self.state();

        let mut due: Vec<(NaiveDateTime, u64, TriggerId, TriggerAction)> = Vec::new();
        let mut kept = Vec::with_capacity(state.entries.len());
        for mut entry in state.entries.drain(..) {
            if entry.next_fire > now {
                kept.push(entry);
                continue;
            }
            due.push((
                entry.next_fire,
                entry.seq,
                entry.trigger.id,
                entry.trigger.action.clone(),
            ));
            if let Some(period) = entry.trigger.schedule.period() {
                // Missed periods collapse into this one firing.
                match next_after(entry.next_fire, period, now) {
                    Some(next) => {
                        entry.next_fire = next;
                        kept.push(entry);
                    }
                    None => {
                        warn!(trigger = %entry.trigger.id, "next firing out of range; dropped");
                    }
                }
            }
        }
        state.entries = kept;
        drop(state);

        due.sort_by(|a, b| a.0.cmp(&b.0).then(a.1.cmp(&b.1)));
        due.into_iter()
            .map(|(_, _, id, action)| (id, action))
            .collect()
    }

    /// Like [`Scheduler::fire_due`], but notifications run on the blocking
    /// pool and are not awaited. Must be called inside a tokio runtime.
    fn fire_due_detached(&self, now: NaiveDateTime) -> usize {
        let due = self.take_due(now);
        let count = due.len();
        for (id, action) in due {
            match action {
                TriggerAction::Notify { title, message } => {
                    info!(trigger = %id, "firing notification");
                    let notifier = Arc::clone(&self.notifier);
                    tokio::task::spawn_blocking(move || {
                        deliver(notifier.as_ref(), &title, &message)
                    });
                }
                escalate => self.dispatch(id, &escalate),
            }
        }
        count
    }

    fn dispatch(&self, id: TriggerId, action: &TriggerAction) {
        match action {
            TriggerAction::Notify { title, message } => {
                info!(trigger = %id, "firing notification");
                deliver(self.notifier.as_ref(), title, message);
            }
            TriggerAction::Escalate { when } => {
                info!(trigger = %id, "requesting escalation");
                if self
                    .events
                    .send(ForegroundEvent::EscalationRequested { when: *when })
                    .is_err()
                {
                    warn!(trigger = %id, "foreground loop gone; escalation dropped");
                }
            }
        }
    }

    /// Spawn the background loop on the current tokio runtime
    pub fn start(self: &Arc<Self>, tick: StdDuration) -> JoinHandle<()> {
        let scheduler = Arc::clone(self);
        let mut shutdown_rx = self.shutdown_tx.subscribe();

        tokio::spawn(async move {
            if *shutdown_rx.borrow_and_update() {
                return;
            }
            let pending = scheduler.state().entries.len();
            info!(pending, "scheduler started");
            let mut interval = tokio::time::interval(tick);
            interval.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);

            loop {
                tokio::select! {
                    _ = interval.tick() => {
                        scheduler.fire_due_detached(scheduler.clock.now());
                    }
                    changed = shutdown_rx.changed() => {
                        if changed.is_err() || *shutdown_rx.borrow() {
                            break;
                        }
                    }
                }
            }
            info!("scheduler stopped");
        })
    }

    /// Stop the background loop and drop all pending triggers
    pub fn shutdown(&self) {
        self.state().entries.clear();
        let _ = self.shutdown_tx.send(true);
    }
}

/// First `start + k * period` (k >= 1) strictly after `now`, or `None`
/// past the end of the calendar
fn next_after(
    start: NaiveDateTime,
    period: Duration,
    now: NaiveDateTime,
) -> Option<NaiveDateTime> {
    let next = start.checked_add_signed(period)?;
    if next > now {
        return Some(next);
    }
    let behind = (now - next).num_seconds();
    let step = period.num_seconds().max(1);
    let skip = (behind / step + 1).checked_mul(step)?;
    next.checked_add_signed(Duration::try_seconds(skip)?)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::ManualClock;
    use crate::sink::LogNotifier;
    use chrono::NaiveDate;

    fn at(h: u32, m: u32) -> NaiveDateTime {
        NaiveDate::from_ymd_opt(2024, 5, 1)
            .unwrap()
            .and_hms_opt(h, m, 0)
            .unwrap()
    }

    fn scheduler(now: NaiveDateTime) -> (Scheduler, mpsc::UnboundedReceiver<ForegroundEvent>) {
        let (tx, rx) = mpsc::unbounded_channel();
        let scheduler = Scheduler::new(
            SchedulePolicy::default(),
            Arc::new(ManualClock::new(now)),
            Arc::new(LogNotifier),
            tx,
        );
        (scheduler, rx)
    }

    #[test]
    fn next_after_skips_missed_periods() {
        let hour = Duration::hours(1);
        assert_eq!(next_after(at(9, 0), hour, at(9, 0)), Some(at(10, 0)));
        assert_eq!(next_after(at(9, 0), hour, at(12, 30)), Some(at(13, 0)));
        assert_eq!(next_after(at(9, 0), hour, at(13, 0)), Some(at(14, 0)));
    }

    #[test]
    fn special_period_past_the_calendar_drops_the_trigger() {
        let (tx, _rx) = mpsc::unbounded_channel();
        let policy = SchedulePolicy {
            special_period: Duration::weeks(100_000_000),
            ..SchedulePolicy::default()
        };
        let scheduler = Scheduler::new(
            policy,
            Arc::new(ManualClock::new(at(8, 0))),
            Arc::new(LogNotifier),
            tx,
        );
        scheduler.install(&Task::special("stretch", at(7, 0)).unwrap());

        assert_eq!(scheduler.fire_due(at(8, 0)), 1);
        assert!(scheduler.pending().is_empty());
    }

    #[test]
    fn cancel_without_triggers_is_noop() {
        let (scheduler, _rx) = scheduler(at(8, 0));
        assert_eq!(scheduler.cancel(at(9, 0)), 0);
    }

    #[test]
    fn double_install_duplicates() {
        let (scheduler, _rx) = scheduler(at(8, 0));
        let task = Task::normal("standup", at(9, 30)).unwrap();
        assert_eq!(scheduler.install(&task).len(), 6);
        assert_eq!(scheduler.install(&task).len(), 6);
        assert_eq!(scheduler.pending().len(), 12);
        assert_eq!(scheduler.cancel(task.when), 12);
    }

    #[test]
    fn escalate_action_goes_to_foreground() {
        let (scheduler, mut rx) = scheduler(at(8, 0));
        scheduler.arm_retry(at(7, 0), at(8, 30));

        assert_eq!(scheduler.fire_due(at(8, 29)), 0);
        assert_eq!(scheduler.fire_due(at(8, 30)), 1);
        assert_eq!(
            rx.try_recv().unwrap(),
            ForegroundEvent::EscalationRequested { when: at(7, 0) }
        );
        assert!(scheduler.pending().is_empty());
    }

    #[test]
    fn closed_foreground_channel_does_not_panic() {
        let (scheduler, rx) = scheduler(at(8, 0));
        drop(rx);
        scheduler.arm_retry(at(7, 0), at(8, 0));
        assert_eq!(scheduler.fire_due(at(8, 0)), 1);
    }

    #[test]
    fn shutdown_clears_pending() {
        let (scheduler, _rx) = scheduler(at(8, 0));
        scheduler.install(&Task::special("stretch", at(7, 0)).unwrap());
        scheduler.shutdown();
        assert!(scheduler.pending().is_empty());
        assert!(scheduler.next_fire().is_none());
    }

    #[tokio::test]
    async fn background_loop_stops_on_shutdown() {
        let (scheduler, _rx) = scheduler(at(8, 0));
        let scheduler = Arc::new(scheduler);
        let handle = scheduler.start(StdDuration::from_millis(10));
        scheduler.shutdown();
        tokio::time::timeout(StdDuration::from_secs(5), handle)
            .await
            .expect("loop exits")
            .expect("loop task");
    }
}
