//! Overdue escalation
//!
//! When a normal task's overdue trigger fires, the user is asked whether
//! the unfinished task should become a recurring special task:
//!
//! ```text
//! Scheduled --(overdue/retry fires)--> PromptPending --yes--> Escalated
//!                                           |
//!                                           +--no--> Deferred --(retry fires)--> PromptPending
//! ```
//!
//! "No" re-arms the question after `retry_interval`, indefinitely unless
//! `max_prompts` is configured. Prompts are counted per task, so normal
//! tasks sharing a start time are asked in turn, least-asked first. Runs
//! only on the foreground thread.

use std::collections::HashMap;
use std::sync::Arc;

use chrono::{Duration, NaiveDateTime};
use serde::Serialize;
use tracing::info;

use crate::duration::format_duration;
use crate::error::{Error, Result};
use crate::prompt::ConfirmationPrompt;
use crate::scheduler::Scheduler;
use crate::store::{find_by_when, TaskStore};
use crate::task::{Task, TaskKey};
use crate::trigger::{TriggerId, TriggerKind};

/// Title of the escalation question
pub const ESCALATION_TITLE: &str = "Unfinished task";

/// Retry behavior for declined escalations
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EscalationPolicy {
    /// Delay before asking again after "no"
    pub retry_interval: Duration,
    /// Cap on prompts per task; `None` asks until answered or deleted
    pub max_prompts: Option<u32>,
}

impl Default for EscalationPolicy {
    fn default() -> Self {
        Self {
            retry_interval: Duration::minutes(30),
            max_prompts: None,
        }
    }
}

/// Result of one escalation step
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum EscalationOutcome {
    /// No task starts at that time any more
    Missing,
    /// Already special; nothing to ask
    AlreadySpecial,
    /// Promoted and rescheduled as a special task
    Escalated { task: Task, triggers: Vec<TriggerId> },
    /// Declined; asked again at `retry_at`
    Deferred { retry_at: NaiveDateTime },
    /// Confirmed, but the task was deleted while the prompt was open
    Vanished,
    /// Declined `prompts` times and the configured cap is reached
    Exhausted { prompts: u32 },
}

pub struct EscalationController {
    store: Arc<dyn TaskStore>,
    scheduler: Arc<Scheduler>,
    prompt: Box<dyn ConfirmationPrompt>,
    policy: EscalationPolicy,
    prompts: HashMap<TaskKey, u32>,
}

impl EscalationController {
    pub fn new(
        store: Arc<dyn TaskStore>,
        scheduler: Arc<Scheduler>,
        prompt: Box<dyn ConfirmationPrompt>,
        policy: EscalationPolicy,
    ) -> Self {
        Self {
            store,
            scheduler,
            prompt,
            policy,
            prompts: HashMap::new(),
        }
    }

    pub fn policy(&self) -> &EscalationPolicy {
        &self.policy
    }

    /// Prompts shown so far for `key`
    pub fn prompt_count(&self, key: &TaskKey) -> u32 {
        self.prompts.get(key).copied().unwrap_or(0)
    }

    /// The task an escalation at `when` is about: the least-asked normal
    /// task starting then, else whatever task starts then
    fn select(&self, tasks: &[Task], when: NaiveDateTime) -> Option<Task> {
        tasks
            .iter()
            .filter(|t| t.when == when && !t.is_special())
            .min_by_key(|t| self.prompt_count(&t.key()))
            .or_else(|| find_by_when(tasks, when))
            .cloned()
    }

    /// Run one escalation step for the task starting at `when`
    pub fn handle(&mut self, when: NaiveDateTime) -> Result<EscalationOutcome> {
        let tasks = self.store.load_all()?;
        let task = match self.select(&tasks, when) {
            None => {
                self.prompts.retain(|key, _| key.when != when);
                info!(when = %when, "escalation skipped: task gone");
                return Ok(EscalationOutcome::Missing);
            }
            Some(task) if task.is_special() => {
                self.prompts.retain(|key, _| key.when != when);
                return Ok(EscalationOutcome::AlreadySpecial);
            }
            Some(task) => task,
        };
        let key = task.key();

        // Least-asked first, so this only hits once every candidate is capped.
        if let Some(max) = self.policy.max_prompts {
            let asked = self.prompt_count(&key);
            if asked >= max {
                return Ok(EscalationOutcome::Exhausted { prompts: asked });
            }
        }

        let asked = self.prompts.entry(key.clone()).or_insert(0);
        *asked += 1;
        let asked = *asked;

        let keep = self
            .prompt
            .ask_yes_no(ESCALATION_TITLE, &escalation_message(&task))?;

        if keep {
            return self.escalate(key);
        }

        if let Some(max) = self.policy.max_prompts {
            if asked >= max {
                info!(task = %task.title, prompts = asked, "escalation abandoned");
                return Ok(EscalationOutcome::Exhausted { prompts: asked });
            }
        }

        let retry_at = self
            .scheduler
            .now()
            .checked_add_signed(self.policy.retry_interval)
            .ok_or_else(|| {
                Error::InvalidConfig("escalation.retry_interval is out of range".to_string())
            })?;
        self.scheduler.arm_retry(when, retry_at);
        info!(
            task = %task.title,
            retry_at = %retry_at,
            "escalation deferred; asking again in {}",
            format_duration(self.policy.retry_interval)
        );
        Ok(EscalationOutcome::Deferred { retry_at })
    }

    fn escalate(&mut self, key: TaskKey) -> Result<EscalationOutcome> {
        self.prompts.remove(&key);

        // The store may have changed while the prompt was open.
        let mut tasks = self.store.load_all()?;
        let Some(task) = tasks
            .iter_mut()
            .find(|t| t.title == key.title && t.when == key.when)
        else {
            info!(task = %key.title, "escalation confirmed for a deleted task");
            return Ok(EscalationOutcome::Vanished);
        };
        if task.is_special() {
            return Ok(EscalationOutcome::AlreadySpecial);
        }
        task.promote();
        let promoted = task.clone();
        self.store.save_all(&tasks)?;

        // Cancel-before-install; siblings sharing this start time are re-planned too.
        let retries: Vec<NaiveDateTime> = self
            .scheduler
            .pending_for(key.when)
            .into_iter()
            .filter(|p| p.id.kind == TriggerKind::Retry)
            .map(|p| p.next_fire)
            .collect();
        self.scheduler.cancel(key.when);
        let mut triggers = Vec::new();
        for sibling in tasks.iter().filter(|t| t.when == key.when) {
            let installed = self.scheduler.install(sibling);
            if sibling.title == promoted.title {
                triggers = installed;
            }
        }
        // Siblings still waiting on an answer keep their re-prompts.
        if tasks.iter().any(|t| t.when == key.when && !t.is_special()) {
            for at in retries {
                self.scheduler.arm_retry(key.when, at);
            }
        }

        info!(task = %promoted.title, "escalated to special task");
        Ok(EscalationOutcome::Escalated {
            task: promoted,
            triggers,
        })
    }
}

fn escalation_message(task: &Task) -> String {
    format!(
        "{} started at {}.\nKeep it as a recurring special task?",
        task.title,
        task.when.format("%H:%M")
    )
}
