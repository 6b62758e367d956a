//! Store file watcher.
//!
//! Other `dayplan` invocations edit the store while the daemon runs. The
//! watcher observes the store's directory (the file itself is replaced by
//! rename on every save), debounces bursts, and posts
//! [`ForegroundEvent::StoreChanged`] so the foreground loop can reconcile.

use std::ffi::OsString;
use std::path::{Path, PathBuf};
use std::sync::mpsc as std_mpsc;
use std::thread;
use std::time::{Duration, Instant};

use notify::{RecommendedWatcher, RecursiveMode, Watcher};
use tokio::sync::mpsc;
use tracing::{debug, warn};

use crate::error::Result;
use crate::scheduler::ForegroundEvent;

const WATCH_DEBOUNCE_MS: u64 = 200;

/// Keeps the watch alive; dropping it stops watching
pub struct StoreWatcher {
    _watcher: RecommendedWatcher,
    dir: PathBuf,
}

impl StoreWatcher {
    pub fn dir(&self) -> &Path {
        &self.dir
    }
}

/// Start watching the directory containing `store_path`
pub fn watch_store(
    store_path: &Path,
    events: mpsc::UnboundedSender<ForegroundEvent>,
) -> Result<StoreWatcher> {
    let dir = match store_path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent.to_path_buf(),
        _ => PathBuf::from("."),
    };
    std::fs::create_dir_all(&dir)?;
    let file_name = store_path.file_name().map(|name| name.to_os_string());

    let (raw_tx, raw_rx) = std_mpsc::channel();
    let mut watcher = notify::recommended_watcher(move |res: notify::Result<notify::Event>| {
        let _ = raw_tx.send(res);
    })?;
    watcher.watch(&dir, RecursiveMode::NonRecursive)?;

    thread::spawn(move || debounce_loop(raw_rx, file_name, events));
    debug!(dir = %dir.display(), "watching task store");

    Ok(StoreWatcher {
        _watcher: watcher,
        dir,
    })
}

fn debounce_loop(
    raw_rx: std_mpsc::Receiver<notify::Result<notify::Event>>,
    file_name: Option<OsString>,
    events: mpsc::UnboundedSender<ForegroundEvent>,
) {
    let debounce = Duration::from_millis(WATCH_DEBOUNCE_MS);
    let mut pending: Option<Instant> = None;

    loop {
        let timeout = pending
            .map(|deadline| deadline.saturating_duration_since(Instant::now()))
            .unwrap_or(Duration::from_secs(3600));
        match raw_rx.recv_timeout(timeout) {
            Ok(Ok(event)) => {
                if touches_store(&event, file_name.as_deref()) {
                    pending = Some(Instant::now() + debounce);
                }
            }
            Ok(Err(err)) => warn!("store watch error: {err}"),
            Err(std_mpsc::RecvTimeoutError::Timeout) => {
                if pending.take().is_some()
                    && events.send(ForegroundEvent::StoreChanged).is_err()
                {
                    break;
                }
            }
            Err(std_mpsc::RecvTimeoutError::Disconnected) => break,
        }
    }
}

fn touches_store(event: &notify::Event, file_name: Option<&std::ffi::OsStr>) -> bool {
    match file_name {
        Some(name) => event
            .paths
            .iter()
            .any(|path| path.file_name() == Some(name)),
        None => true,
    }
}
