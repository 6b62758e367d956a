//! dayplan summary

use serde::Serialize;

use crate::clock::{Clock, SystemClock};
use crate::error::Result;
use crate::output::{emit_success, HumanOutput, OutputOptions};
use crate::sink::{self, deliver};
use crate::store::TaskStore;
use crate::summary::{StartupSummary, STARTUP_TITLE};

use super::Context;

pub struct SummaryOptions {
    pub notify: bool,
    pub json: bool,
    pub quiet: bool,
}

#[derive(Serialize)]
struct SummaryReport {
    #[serde(flatten)]
    summary: StartupSummary,
    message: Option<String>,
    notified: bool,
}

pub fn run(ctx: &Context, options: SummaryOptions) -> Result<()> {
    let tasks = ctx.store().load_all()?;
    let summary = StartupSummary::build(&tasks, SystemClock.now());
    let message = summary.message();

    let notified = options.notify && !summary.is_empty();
    if let (true, Some(message)) = (notified, &message) {
        let notifier = sink::from_config(&ctx.config.notifications);
        deliver(notifier.as_ref(), STARTUP_TITLE, message);
    }

    let mut human = HumanOutput::new("dayplan summary");
    match &message {
        Some(message) => {
            for line in message.lines() {
                human.push_detail(line);
            }
        }
        None => human.push_detail("Nothing scheduled in the next 24 hours."),
    }

    emit_success(
        OutputOptions {
            json: options.json,
            quiet: options.quiet,
        },
        "summary",
        &SummaryReport {
            summary,
            message,
            notified,
        },
        Some(&human),
    )
}
