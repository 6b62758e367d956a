//! dayplan - Daily Planner Library
//!
//! This library provides the core functionality for the dayplan CLI:
//! timed reminders for a personal task list, with escalation of tasks
//! that run past their start.
//!
//! # Core Concepts
//!
//! - **Tasks**: A title and a start time, either normal or special
//! - **Triggers**: Pre-start reminders, an overdue check, and hourly
//!   repeats for special tasks
//! - **Escalation**: A yes/no prompt that promotes an overdue task to a
//!   special one, or asks again later
//!
//! # Module Organization
//!
//! - `cli`: Command-line interface using clap
//! - `config`: Configuration loading from `config.toml`
//! - `error`: Error types and result aliases
//! - `task`: Task model and its on-disk record
//! - `store`: JSON task store
//! - `trigger`: Trigger planning for a task
//! - `scheduler`: Pending triggers and the background firing loop
//! - `escalation`: Overdue-task escalation
//! - `daemon`: Foreground loop tying the pieces together
//! - `sink`: Notification backends
//! - `prompt`: Yes/no confirmation prompts
//! - `watch`: Store file watcher
//! - `lock`: File locking and atomic writes for concurrency safety

pub mod cli;
pub mod clock;
pub mod config;
pub mod daemon;
pub mod duration;
pub mod error;
pub mod escalation;
pub mod lock;
pub mod output;
pub mod prompt;
pub mod scheduler;
pub mod sink;
pub mod store;
pub mod summary;
pub mod task;
pub mod trigger;
pub mod watch;

pub use error::{Error, Result};
