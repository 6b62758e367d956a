mod support;

use std::sync::Arc;
use std::time::Duration as StdDuration;

use dayplan::clock::ManualClock;
use dayplan::scheduler::{ForegroundEvent, Scheduler};
use dayplan::task::Task;
use dayplan::trigger::{Schedule, SchedulePolicy, TriggerAction};
use tokio::sync::mpsc;

use support::{at, Harness, StalledNotifier};

#[test]
fn normal_task_gets_five_reminders_and_an_overdue_check() {
    let task = Task::normal("standup", at(10, 0)).unwrap();
    let h = Harness::new(at(8, 0), vec![]);

    let ids = h.scheduler.install(&task);
    assert_eq!(ids.len(), 6);

    let pending = h.scheduler.pending();
    let times: Vec<_> = pending.iter().map(|p| p.next_fire).collect();
    assert_eq!(
        times,
        vec![
            at(9, 0),
            at(9, 30),
            at(9, 45),
            at(9, 55),
            at(9, 58),
            at(10, 5)
        ]
    );

    let names: Vec<String> = pending.iter().map(|p| p.id.to_string()).collect();
    assert_eq!(
        names,
        vec![
            "pre_60_2024-05-01T10:00:00",
            "pre_30_2024-05-01T10:00:00",
            "pre_15_2024-05-01T10:00:00",
            "pre_5_2024-05-01T10:00:00",
            "pre_2_2024-05-01T10:00:00",
            "od_2024-05-01T10:00:00",
        ]
    );
    assert_eq!(
        pending[5].action,
        TriggerAction::Escalate { when: at(10, 0) }
    );
}

#[test]
fn reminders_already_past_are_skipped() {
    let task = Task::normal("standup", at(10, 0)).unwrap();
    let h = Harness::new(at(9, 57), vec![]);

    h.scheduler.install(&task);
    let times: Vec<_> = h.scheduler.pending().iter().map(|p| p.next_fire).collect();
    assert_eq!(times, vec![at(9, 58), at(10, 5)]);
}

#[test]
fn task_past_its_overdue_check_gets_nothing() {
    let task = Task::normal("standup", at(7, 0)).unwrap();
    let h = Harness::new(at(8, 0), vec![]);

    assert!(h.scheduler.install(&task).is_empty());
    assert!(h.scheduler.next_fire().is_none());
}

#[test]
fn reminders_fire_in_order_with_their_messages() {
    let task = Task::normal("standup", at(10, 0)).unwrap();
    let mut h = Harness::new(at(8, 0), vec![]);
    h.scheduler.install(&task);

    assert_eq!(h.tick_to(at(8, 59)), 0);
    assert_eq!(h.tick_to(at(9, 0)), 1);
    assert_eq!(h.tick_to(at(9, 50)), 2);
    assert_eq!(h.tick_to(at(9, 59)), 2);

    assert_eq!(
        h.notifier.messages(),
        vec![
            "In 60 minutes: standup",
            "In 30 minutes: standup",
            "In 15 minutes: standup",
            "In 5 minutes: standup",
            "In 2 minutes: standup",
        ]
    );
    assert!(h.drain_events().is_empty());

    assert_eq!(h.tick_to(at(10, 5)), 1);
    assert_eq!(
        h.drain_events(),
        vec![ForegroundEvent::EscalationRequested { when: at(10, 0) }]
    );
    assert!(h.scheduler.pending().is_empty());
}

#[test]
fn special_task_repeats_hourly_from_now_when_started_in_the_past() {
    let task = Task::special("stretch", at(7, 0)).unwrap();
    let h = Harness::new(at(8, 15), vec![]);

    h.scheduler.install(&task);
    let pending = h.scheduler.pending();
    assert_eq!(pending.len(), 1);
    assert_eq!(pending[0].id.to_string(), "spec_2024-05-01T07:00:00");
    assert_eq!(pending[0].next_fire, at(8, 15));
    assert!(matches!(pending[0].schedule, Schedule::Every { .. }));

    assert_eq!(h.tick_to(at(8, 15)), 1);
    assert_eq!(h.scheduler.next_fire(), Some(at(9, 15)));

    // Three missed periods collapse into a single firing.
    assert_eq!(h.tick_to(at(11, 40)), 1);
    assert_eq!(h.scheduler.next_fire(), Some(at(12, 15)));
    assert_eq!(h.notifier.messages(), vec!["stretch", "stretch"]);
    assert_eq!(h.notifier.sent()[0].0, "Special task reminder");
}

#[test]
fn special_task_in_the_future_starts_at_its_time() {
    let task = Task::special("water plants", at(18, 0)).unwrap();
    let h = Harness::new(at(8, 0), vec![]);

    h.scheduler.install(&task);
    assert_eq!(h.scheduler.next_fire(), Some(at(18, 0)));
}

#[test]
fn cancel_removes_every_trigger_for_the_start_time() {
    let standup = Task::normal("standup", at(10, 0)).unwrap();
    let lunch = Task::normal("lunch", at(12, 0)).unwrap();
    let h = Harness::new(at(8, 0), vec![]);

    h.scheduler.install(&standup);
    h.scheduler.install(&lunch);
    h.scheduler.arm_retry(at(10, 0), at(10, 35));
    assert_eq!(h.scheduler.pending_for(at(10, 0)).len(), 7);

    assert_eq!(h.scheduler.cancel(at(10, 0)), 7);
    assert!(h.scheduler.pending_for(at(10, 0)).is_empty());
    assert_eq!(h.scheduler.pending_for(at(12, 0)).len(), 6);

    // Nothing is left to fire for the cancelled task.
    h.tick_to(at(11, 0));
    assert!(h
        .notifier
        .messages()
        .iter()
        .all(|message| message.ends_with("lunch")));

    assert_eq!(h.scheduler.cancel(at(10, 0)), 0);
}

#[test]
fn installing_twice_duplicates_triggers() {
    let task = Task::special("stretch", at(9, 0)).unwrap();
    let h = Harness::new(at(8, 0), vec![]);

    h.scheduler.install(&task);
    h.scheduler.install(&task);
    assert_eq!(h.scheduler.pending().len(), 2);

    assert_eq!(h.tick_to(at(9, 0)), 2);
}

#[test]
fn shutdown_drops_pending_triggers() {
    let task = Task::normal("standup", at(10, 0)).unwrap();
    let h = Harness::new(at(8, 0), vec![]);
    h.scheduler.install(&task);

    h.scheduler.shutdown();
    assert!(h.scheduler.pending().is_empty());
    assert_eq!(h.tick_to(at(11, 0)), 0);
}

#[tokio::test]
async fn background_loop_fires_due_triggers() {
    let task = Task::normal("standup", at(10, 0)).unwrap();
    let h = Harness::new(at(8, 0), vec![]);
    h.scheduler.install(&task);
    h.clock.set(at(9, 0));

    let handle = h.scheduler.start(std::time::Duration::from_millis(10));
    tokio::time::sleep(std::time::Duration::from_millis(100)).await;
    h.scheduler.shutdown();
    handle.await.unwrap();

    assert_eq!(h.notifier.messages(), vec!["In 60 minutes: standup"]);
}

#[tokio::test]
async fn stalled_notifier_does_not_hold_up_escalations() {
    let (notifier, release) = StalledNotifier::new();
    let (tx, mut events) = mpsc::unbounded_channel();
    let scheduler = Arc::new(Scheduler::new(
        SchedulePolicy::default(),
        Arc::new(ManualClock::new(at(9, 0))),
        Arc::new(notifier),
        tx,
    ));
    scheduler.install(&Task::special("stretch", at(8, 0)).unwrap());
    scheduler.arm_retry(at(7, 0), at(9, 0));

    let handle = scheduler.start(StdDuration::from_millis(10));
    let event = tokio::time::timeout(StdDuration::from_secs(2), events.recv())
        .await
        .expect("escalation arrives while the notifier hangs");
    assert_eq!(
        event,
        Some(ForegroundEvent::EscalationRequested { when: at(7, 0) })
    );

    release.send(()).unwrap();
    scheduler.shutdown();
    handle.await.unwrap();
}
