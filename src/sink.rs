//! Notification delivery
//!
//! Delivery is best-effort. Backends report failures through [`Notifier`],
//! and [`deliver`] is the single place that swallows them: a failed
//! notification is logged and never reaches the scheduler.

use std::io::Read;
use std::path::{Path, PathBuf};
use std::process::{Command, Stdio};
use std::sync::Arc;
use std::time::{Duration, Instant};

use notify_rust::{Notification, Timeout};
use tracing::{info, warn};

use crate::config::{NotificationConfig, NotifierBackend};
use crate::error::{Error, Result};

/// A notification backend
pub trait Notifier: Send + Sync {
    fn notify(&self, title: &str, message: &str) -> Result<()>;
}

/// Send a notification, logging instead of returning any failure
pub fn deliver(notifier: &dyn Notifier, title: &str, message: &str) {
    match notifier.notify(title, message) {
        Ok(()) => info!(title, message, "notification delivered"),
        Err(err) => warn!(title, message, "notification failed: {err}"),
    }
}

/// Build the backend selected in config
pub fn from_config(config: &NotificationConfig) -> Arc<dyn Notifier> {
    match config.backend {
        NotifierBackend::Desktop => Arc::new(DesktopNotifier::new(
            config.timeout_secs,
            config.sound.clone(),
        )),
        NotifierBackend::Command => match &config.command {
            Some(program) => Arc::new(
                CommandNotifier::new(program, config.sound.clone())
                    .with_timeout(Duration::from_secs(config.timeout_secs.max(1))),
            ),
            None => Arc::new(LogNotifier),
        },
        NotifierBackend::Log => Arc::new(LogNotifier),
    }
}

/// Native desktop notifications
#[derive(Debug, Clone)]
pub struct DesktopNotifier {
    timeout_secs: u64,
    sound: Option<String>,
}

impl DesktopNotifier {
    pub fn new(timeout_secs: u64, sound: Option<String>) -> Self {
        Self {
            timeout_secs,
            sound,
        }
    }
}

impl Notifier for DesktopNotifier {
    fn notify(&self, title: &str, message: &str) -> Result<()> {
        let mut notification = Notification::new();
        notification
            .summary(title)
            .body(message)
            .timeout(Timeout::Milliseconds(
                (self.timeout_secs.saturating_mul(1000)).min(u32::MAX as u64) as u32,
            ));
        if let Some(sound) = &self.sound {
            notification.sound_name(sound);
        }
        notification
            .show()
            .map(|_| ())
            .map_err(|err| Error::Notify(err.to_string()))
    }
}

const COMMAND_POLL_INTERVAL_MS: u64 = 25;
const DEFAULT_COMMAND_TIMEOUT_SECS: u64 = 5;

/// External notifier binary invoked as
/// `<program> -title <title> -message <message> [-sound <sound>]`
///
/// A run that outlives the timeout is killed and reported as a failure.
#[derive(Debug, Clone)]
pub struct CommandNotifier {
    program: PathBuf,
    sound: Option<String>,
    timeout: Duration,
}

impl CommandNotifier {
    pub fn new(program: impl AsRef<Path>, sound: Option<String>) -> Self {
        Self {
            program: program.as_ref().to_path_buf(),
            sound,
            timeout: Duration::from_secs(DEFAULT_COMMAND_TIMEOUT_SECS),
        }
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    fn args(&self, title: &str, message: &str) -> Vec<String> {
        let mut args = vec![
            "-title".to_string(),
            title.to_string(),
            "-message".to_string(),
            message.to_string(),
        ];
        if let Some(sound) = &self.sound {
            args.push("-sound".to_string());
            args.push(sound.clone());
        }
        args
    }
}

impl Notifier for CommandNotifier {
    fn notify(&self, title: &str, message: &str) -> Result<()> {
        // Bare names are resolved through PATH by the OS.
        if self.program.components().count() > 1 && !self.program.exists() {
            return Err(Error::Notify(format!(
                "notifier not found: {}",
                self.program.display()
            )));
        }

        let mut child = Command::new(&self.program)
            .args(self.args(title, message))
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::piped())
            .spawn()
            .map_err(|err| {
                Error::Notify(format!("cannot run {}: {err}", self.program.display()))
            })?;

        let deadline = Instant::now() + self.timeout;
        let status = loop {
            match child.try_wait() {
                Ok(Some(status)) => break status,
                Ok(None) if Instant::now() >= deadline => {
                    let _ = child.kill();
                    let _ = child.wait();
                    return Err(Error::Notify(format!(
                        "{} timed out after {}ms",
                        self.program.display(),
                        self.timeout.as_millis()
                    )));
                }
                Ok(None) => std::thread::sleep(Duration::from_millis(COMMAND_POLL_INTERVAL_MS)),
                Err(err) => {
                    return Err(Error::Notify(format!(
                        "cannot wait for {}: {err}",
                        self.program.display()
                    )));
                }
            }
        };

        if !status.success() {
            let mut stderr = String::new();
            if let Some(mut pipe) = child.stderr.take() {
                let _ = pipe.read_to_string(&mut stderr);
            }
            return Err(Error::Notify(format!(
                "{} exited with {status}: {}",
                self.program.display(),
                stderr.trim()
            )));
        }
        Ok(())
    }
}

/// Log-only backend for headless use
#[derive(Debug, Clone, Copy, Default)]
pub struct LogNotifier;

impl Notifier for LogNotifier {
    fn notify(&self, title: &str, message: &str) -> Result<()> {
        info!(target: "dayplan::notification", title, message, "notify");
        Ok(())
    }
}
