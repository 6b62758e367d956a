//! Command-line interface for dayplan
//!
//! This module defines the CLI structure using clap derive macros.
//! Each subcommand is implemented in its own submodule.

use std::path::PathBuf;

use clap::{Parser, Subcommand, ValueEnum};

use crate::config::Config;
use crate::error::Result;
use crate::store::JsonTaskStore;

mod run;
mod summary;
mod task;

/// dayplan - daily planner
///
/// Timed reminders for the day's tasks, with hourly repeats for special
/// tasks and a prompt when a task runs past its start.
#[derive(Parser, Debug)]
#[command(name = "dayplan")]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
pub struct Cli {
    /// Task store file (defaults to ~/.daily_planner.json)
    #[arg(long, global = true, env = "DAYPLAN_STORE")]
    pub store: Option<PathBuf>,

    /// Config file (defaults to the platform config dir)
    #[arg(long, global = true, env = "DAYPLAN_CONFIG")]
    pub config: Option<PathBuf>,

    /// Output in JSON format
    #[arg(long, global = true)]
    pub json: bool,

    /// Suppress non-essential output
    #[arg(short, long, global = true)]
    pub quiet: bool,

    #[command(subcommand)]
    pub command: Commands,
}

/// Available subcommands
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Add a task; omit --time to add a special (hourly) task
    Add {
        /// What to do
        title: String,

        /// Day of the task, YYYY-MM-DD (defaults to today)
        #[arg(long)]
        date: Option<String>,

        /// Start time, HH:MM
        #[arg(long)]
        time: Option<String>,
    },

    /// Delete tasks by title and start
    Rm {
        /// Task title
        title: String,

        /// Day of the task, YYYY-MM-DD (defaults to today)
        #[arg(long)]
        date: Option<String>,

        /// Start time, HH:MM (omit to match the whole day)
        #[arg(long)]
        time: Option<String>,
    },

    /// List tasks
    List {
        /// Show every task, not just today's and the next 24 hours
        #[arg(short, long)]
        all: bool,
    },

    /// Show the startup summary
    Summary {
        /// Also send it as a notification
        #[arg(long)]
        notify: bool,
    },

    /// Run the reminder daemon in the foreground
    Run {
        /// Answer escalation prompts automatically
        #[arg(long, value_enum)]
        assume: Option<Answer>,

        /// Do not watch the store for external edits
        #[arg(long)]
        no_watch: bool,
    },
}

/// Canned answer for escalation prompts
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum Answer {
    Yes,
    No,
}

impl From<Answer> for bool {
    fn from(answer: Answer) -> bool {
        answer == Answer::Yes
    }
}

/// Resolved config and store for a command
pub(crate) struct Context {
    pub config: Config,
    pub store_path: PathBuf,
}

impl Context {
    pub fn load(config: Option<PathBuf>, store: Option<PathBuf>) -> Result<Self> {
        let config_path = config.or_else(Config::default_path);
        let config = Config::load_or_default(config_path.as_deref())?;
        let store_path = match store {
            Some(path) => path,
            None => config.store_path()?,
        };
        Ok(Self { config, store_path })
    }

    pub fn store(&self) -> JsonTaskStore {
        JsonTaskStore::new(&self.store_path)
    }
}

impl Cli {
    /// Execute the CLI command
    pub fn run(self) -> Result<()> {
        let ctx = Context::load(self.config, self.store)?;
        match self.command {
            Commands::Add { title, date, time } => task::run_add(
                &ctx,
                task::AddOptions {
                    title,
                    date,
                    time,
                    json: self.json,
                    quiet: self.quiet,
                },
            ),
            Commands::Rm { title, date, time } => task::run_rm(
                &ctx,
                task::RmOptions {
                    title,
                    date,
                    time,
                    json: self.json,
                    quiet: self.quiet,
                },
            ),
            Commands::List { all } => task::run_list(
                &ctx,
                task::ListOptions {
                    all,
                    json: self.json,
                    quiet: self.quiet,
                },
            ),
            Commands::Summary { notify } => summary::run(
                &ctx,
                summary::SummaryOptions {
                    notify,
                    json: self.json,
                    quiet: self.quiet,
                },
            ),
            Commands::Run { assume, no_watch } => run::run(
                ctx,
                run::RunOptions {
                    assume,
                    watch: !no_watch,
                    json: self.json,
                    quiet: self.quiet,
                },
            ),
        }
    }
}
