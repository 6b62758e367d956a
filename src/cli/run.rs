//! dayplan run
//!
//! Wires the scheduler's background loop, the store watcher and the
//! foreground escalation loop together. The calling thread becomes the
//! foreground thread: it owns prompts and escalation writes until Ctrl-C.

use std::sync::Arc;
use std::time::Duration as StdDuration;

use tokio::sync::mpsc;
use tracing::{info, warn};

use crate::clock::{Clock, SystemClock};
use crate::daemon::Daemon;
use crate::error::Result;
use crate::escalation::EscalationController;
use crate::output::{emit_success, HumanOutput, OutputOptions};
use crate::prompt::{ConfirmationPrompt, FixedAnswer, TerminalPrompt};
use crate::scheduler::{ForegroundEvent, Scheduler};
use crate::sink;
use crate::store::{JsonTaskStore, TaskStore};
use crate::watch::watch_store;

use super::{Answer, Context};

pub struct RunOptions {
    pub assume: Option<Answer>,
    pub watch: bool,
    pub json: bool,
    pub quiet: bool,
}

pub fn run(ctx: Context, options: RunOptions) -> Result<()> {
    let schedule_policy = ctx.config.schedule.policy()?;
    let escalation_policy = ctx.config.escalation.policy()?;
    let tick = ctx.config.schedule.tick()?;

    let runtime = tokio::runtime::Builder::new_multi_thread()
        .worker_threads(2)
        .enable_all()
        .build()?;

    let store: Arc<dyn TaskStore> = Arc::new(JsonTaskStore::new(&ctx.store_path));
    let notifier = sink::from_config(&ctx.config.notifications);
    let clock: Arc<dyn Clock> = Arc::new(SystemClock);
    let (events_tx, mut events_rx) = mpsc::unbounded_channel();

    let scheduler = Arc::new(Scheduler::new(
        schedule_policy,
        clock,
        notifier.clone(),
        events_tx.clone(),
    ));
    let mut daemon = Daemon::new(store.clone(), scheduler.clone(), notifier);
    let report = daemon.bootstrap()?;

    let mut human = HumanOutput::new("dayplan run");
    human.push_summary("store", ctx.store_path.display().to_string());
    human.push_summary("tasks", report.tasks.to_string());
    human.push_summary("triggers", report.triggers.to_string());
    if let Some(summary) = &report.summary {
        for line in summary.lines() {
            human.push_detail(line);
        }
    }

    let _watcher = if options.watch {
        match watch_store(&ctx.store_path, events_tx.clone()) {
            Ok(watcher) => {
                human.push_summary("watching", watcher.dir().display().to_string());
                Some(watcher)
            }
            Err(err) => {
                human.push_warning(format!("not watching the store: {err}"));
                warn!("cannot watch {}: {err}", ctx.store_path.display());
                None
            }
        }
    } else {
        None
    };

    emit_success(
        OutputOptions {
            json: options.json,
            quiet: options.quiet,
        },
        "run",
        &report,
        Some(&human),
    )?;

    let background = {
        let _guard = runtime.enter();
        scheduler.start(tick)
    };
    runtime.spawn(shutdown_on_ctrl_c(events_tx));

    let prompt: Box<dyn ConfirmationPrompt> = match options.assume {
        Some(answer) => Box::new(FixedAnswer(answer.into())),
        None => Box::new(TerminalPrompt::stdio()),
    };
    let mut controller =
        EscalationController::new(store, scheduler.clone(), prompt, escalation_policy);

    daemon.run(&mut controller, &mut events_rx);

    scheduler.shutdown();
    if let Err(err) = runtime.block_on(background) {
        warn!("scheduler loop ended abnormally: {err}");
    }
    runtime.shutdown_timeout(StdDuration::from_secs(1));
    info!("daemon stopped");
    Ok(())
}

/// First Ctrl-C asks the foreground loop to stop; a second one exits hard,
/// since the foreground thread may be blocked on a prompt.
async fn shutdown_on_ctrl_c(events: mpsc::UnboundedSender<ForegroundEvent>) {
    if tokio::signal::ctrl_c().await.is_err() {
        return;
    }
    info!("interrupt received, shutting down");
    let _ = events.send(ForegroundEvent::Shutdown);

    if tokio::signal::ctrl_c().await.is_ok() {
        std::process::exit(130);
    }
}
