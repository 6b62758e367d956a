#![allow(dead_code)]

use std::cell::RefCell;
use std::collections::VecDeque;
use std::rc::Rc;
use std::sync::mpsc as std_mpsc;
use std::sync::{Arc, Mutex};
use std::time::Duration as StdDuration;

use chrono::{NaiveDate, NaiveDateTime};
use dayplan::clock::ManualClock;
use dayplan::error::{Error, Result};
use dayplan::prompt::ConfirmationPrompt;
use dayplan::scheduler::{ForegroundEvent, Scheduler};
use dayplan::sink::Notifier;
use dayplan::store::MemoryTaskStore;
use dayplan::task::Task;
use dayplan::trigger::SchedulePolicy;
use tokio::sync::mpsc;

/// 2024-05-01 at `h:m`
pub fn at(h: u32, m: u32) -> NaiveDateTime {
    NaiveDate::from_ymd_opt(2024, 5, 1)
        .expect("date")
        .and_hms_opt(h, m, 0)
        .expect("time")
}

/// Notifier that remembers every (title, message)
#[derive(Default)]
pub struct RecordingNotifier {
    sent: Mutex<Vec<(String, String)>>,
}

impl RecordingNotifier {
    pub fn sent(&self) -> Vec<(String, String)> {
        self.sent.lock().expect("lock").clone()
    }

    pub fn messages(&self) -> Vec<String> {
        self.sent().into_iter().map(|(_, message)| message).collect()
    }
}

impl Notifier for RecordingNotifier {
    fn notify(&self, title: &str, message: &str) -> Result<()> {
        self.sent
            .lock()
            .expect("lock")
            .push((title.to_string(), message.to_string()));
        Ok(())
    }
}

/// Notifier that always fails
pub struct FailingNotifier;

impl Notifier for FailingNotifier {
    fn notify(&self, _title: &str, _message: &str) -> Result<()> {
        Err(Error::Notify("no display".to_string()))
    }
}

/// Notifier that hangs until released (or five seconds pass)
pub struct StalledNotifier {
    release: Mutex<std_mpsc::Receiver<()>>,
}

impl StalledNotifier {
    pub fn new() -> (Self, std_mpsc::Sender<()>) {
        let (tx, rx) = std_mpsc::channel();
        (
            Self {
                release: Mutex::new(rx),
            },
            tx,
        )
    }
}

impl Notifier for StalledNotifier {
    fn notify(&self, _title: &str, _message: &str) -> Result<()> {
        let _ = self
            .release
            .lock()
            .expect("lock")
            .recv_timeout(StdDuration::from_secs(5));
        Ok(())
    }
}

/// Prompt that plays back canned answers and records what it was asked
#[derive(Clone, Default)]
pub struct ScriptedPrompt {
    answers: Rc<RefCell<VecDeque<bool>>>,
    asked: Rc<RefCell<Vec<String>>>,
}

impl ScriptedPrompt {
    pub fn new(answers: &[bool]) -> Self {
        Self {
            answers: Rc::new(RefCell::new(answers.iter().copied().collect())),
            asked: Rc::default(),
        }
    }

    pub fn asked(&self) -> Vec<String> {
        self.asked.borrow().clone()
    }
}

impl ConfirmationPrompt for ScriptedPrompt {
    fn ask_yes_no(&self, _title: &str, message: &str) -> Result<bool> {
        self.asked.borrow_mut().push(message.to_string());
        self.answers
            .borrow_mut()
            .pop_front()
            .ok_or_else(|| Error::Prompt("no scripted answer left".to_string()))
    }
}

pub struct Harness {
    pub clock: Arc<ManualClock>,
    pub notifier: Arc<RecordingNotifier>,
    pub store: Arc<MemoryTaskStore>,
    pub scheduler: Arc<Scheduler>,
    pub events: mpsc::UnboundedReceiver<ForegroundEvent>,
}

impl Harness {
    pub fn new(now: NaiveDateTime, tasks: Vec<Task>) -> Self {
        let clock = Arc::new(ManualClock::new(now));
        let notifier = Arc::new(RecordingNotifier::default());
        let (tx, events) = mpsc::unbounded_channel();
        let scheduler = Arc::new(Scheduler::new(
            SchedulePolicy::default(),
            clock.clone(),
            notifier.clone(),
            tx,
        ));
        Self {
            clock,
            notifier,
            store: Arc::new(MemoryTaskStore::new(tasks)),
            scheduler,
            events,
        }
    }

    /// Move the clock to `now` and fire everything due
    pub fn tick_to(&self, now: NaiveDateTime) -> usize {
        self.clock.set(now);
        self.scheduler.fire_due(now)
    }

    pub fn drain_events(&mut self) -> Vec<ForegroundEvent> {
        let mut out = Vec::new();
        while let Ok(event) = self.events.try_recv() {
            out.push(event);
        }
        out
    }
}
