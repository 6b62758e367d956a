//! Task store
//!
//! The store is a load-all / save-all collection of [`Task`]s. The on-disk
//! implementation keeps a pretty-printed JSON array in a single file:
//!
//! ```text
//! ~/.daily_planner.json
//! [
//!   { "title": "standup", "when": "2024-05-01T09:30:00", "special": false }
//! ]
//! ```
//!
//! Order in the file carries no meaning. Every mutation is a full
//! load-modify-save cycle with no lock spanning the cycle, so concurrent
//! writers (a CLI edit racing the daemon's escalation) are last-writer-wins.

use std::path::{Path, PathBuf};
use std::sync::{Mutex, MutexGuard};

use chrono::NaiveDateTime;
use tracing::debug;

use crate::error::{Error, Result};
use crate::lock::{self, DEFAULT_LOCK_TIMEOUT_MS};
use crate::task::{format_when, Task};

/// Durable collection of tasks
pub trait TaskStore: Send + Sync {
    /// All persisted tasks; empty when nothing has been saved yet
    fn load_all(&self) -> Result<Vec<Task>>;

    /// Replace the persisted collection
    fn save_all(&self, tasks: &[Task]) -> Result<()>;
}

/// JSON file store
#[derive(Debug, Clone)]
pub struct JsonTaskStore {
    path: PathBuf,
    lock_timeout_ms: u64,
}

impl JsonTaskStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            lock_timeout_ms: DEFAULT_LOCK_TIMEOUT_MS,
        }
    }

    pub fn with_lock_timeout(mut self, timeout_ms: u64) -> Self {
        self.lock_timeout_ms = timeout_ms;
        self
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl TaskStore for JsonTaskStore {
    fn load_all(&self) -> Result<Vec<Task>> {
        let data = match lock::read_locked(&self.path, self.lock_timeout_ms)? {
            Some(data) => data,
            None => return Ok(Vec::new()),
        };
        if data.iter().all(u8::is_ascii_whitespace) {
            return Ok(Vec::new());
        }

        // One bad record fails the whole load.
        let tasks: Vec<Task> =
            serde_json::from_slice(&data).map_err(|source| Error::MalformedStore {
                path: self.path.clone(),
                source,
            })?;
        debug!(count = tasks.len(), path = %self.path.display(), "loaded tasks");
        Ok(tasks)
    }

    fn save_all(&self, tasks: &[Task]) -> Result<()> {
        let mut data = serde_json::to_vec_pretty(tasks)?;
        data.push(b'\n');
        lock::write_atomic_locked(&self.path, &data, self.lock_timeout_ms)?;
        debug!(count = tasks.len(), path = %self.path.display(), "saved tasks");
        Ok(())
    }
}

/// In-process store, used by tests and embedders
#[derive(Debug, Default)]
pub struct MemoryTaskStore {
    tasks: Mutex<Vec<Task>>,
}

impl MemoryTaskStore {
    pub fn new(tasks: Vec<Task>) -> Self {
        Self {
            tasks: Mutex::new(tasks),
        }
    }

    fn guard(&self) -> MutexGuard<'_, Vec<Task>> {
        self.tasks.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

impl TaskStore for MemoryTaskStore {
    fn load_all(&self) -> Result<Vec<Task>> {
        Ok(self.guard().clone())
    }

    fn save_all(&self, tasks: &[Task]) -> Result<()> {
        *self.guard() = tasks.to_vec();
        Ok(())
    }
}

/// Add a task, rejecting a second task with the same title and start time
pub fn insert_task(store: &dyn TaskStore, task: Task) -> Result<()> {
    let mut tasks = store.load_all()?;
    if tasks
        .iter()
        .any(|existing| existing.title == task.title && existing.when == task.when)
    {
        return Err(Error::DuplicateTask {
            title: task.title,
            when: format_when(task.when),
        });
    }
    tasks.push(task);
    store.save_all(&tasks)
}

/// Remove every task matching `pred`, returning the removed tasks.
///
/// The store is only rewritten when something was removed.
pub fn remove_matching<F>(store: &dyn TaskStore, mut pred: F) -> Result<Vec<Task>>
where
    F: FnMut(&Task) -> bool,
{
    let tasks = store.load_all()?;
    let (removed, kept): (Vec<Task>, Vec<Task>) = tasks.into_iter().partition(|t| pred(t));
    if !removed.is_empty() {
        store.save_all(&kept)?;
    }
    Ok(removed)
}

/// First normal task starting at `when`, else the first task of any kind.
///
/// A start time does not identify a task: with several tasks at `when`
/// this always returns the same one. Callers that must reach each of them
/// (escalation) choose among the candidates themselves.
pub fn find_by_when(tasks: &[Task], when: NaiveDateTime) -> Option<&Task> {
    tasks
        .iter()
        .find(|t| t.when == when && !t.is_special())
        .or_else(|| tasks.iter().find(|t| t.when == when))
}

/// Tasks ordered by start time, for display
pub fn sorted_by_when(mut tasks: Vec<Task>) -> Vec<Task> {
    tasks.sort_by(|a, b| a.when.cmp(&b.when).then_with(|| a.title.cmp(&b.title)));
    tasks
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;
    use std::fs;
    use tempfile::TempDir;

    fn at(h: u32, m: u32) -> NaiveDateTime {
        NaiveDate::from_ymd_opt(2024, 5, 1)
            .unwrap()
            .and_hms_opt(h, m, 0)
            .unwrap()
    }

    #[test]
    fn missing_file_loads_empty() {
        let dir = TempDir::new().unwrap();
        let store = JsonTaskStore::new(dir.path().join("tasks.json"));
        assert!(store.load_all().unwrap().is_empty());
    }

    #[test]
    fn save_then_load_preserves_fields() {
        let dir = TempDir::new().unwrap();
        let store = JsonTaskStore::new(dir.path().join("tasks.json"));
        let tasks = vec![
            Task::normal("写周报", at(17, 0)).unwrap(),
            Task::special("stretch", at(0, 0)).unwrap(),
        ];
        store.save_all(&tasks).unwrap();

        assert_eq!(store.load_all().unwrap(), tasks);
        let raw = fs::read_to_string(store.path()).unwrap();
        assert!(raw.contains("写周报"));
        assert!(raw.contains("\"when\": \"2024-05-01T17:00:00\""));
    }

    #[test]
    fn malformed_record_fails_whole_load() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("tasks.json");
        fs::write(
            &path,
            r#"[{"title":"ok","when":"2024-05-01T09:00:00","special":false},
               {"title":"bad","when":"not a time","special":false}]"#,
        )
        .unwrap();

        let err = JsonTaskStore::new(&path).load_all().unwrap_err();
        assert!(matches!(err, Error::MalformedStore { .. }));
    }

    #[test]
    fn insert_rejects_duplicate_title_and_time() {
        let store = MemoryTaskStore::default();
        insert_task(&store, Task::normal("gym", at(18, 0)).unwrap()).unwrap();
        insert_task(&store, Task::normal("gym", at(19, 0)).unwrap()).unwrap();
        insert_task(&store, Task::normal("swim", at(18, 0)).unwrap()).unwrap();

        let err = insert_task(&store, Task::normal("gym", at(18, 0)).unwrap()).unwrap_err();
        assert!(matches!(err, Error::DuplicateTask { .. }));
        assert_eq!(store.load_all().unwrap().len(), 3);
    }

    #[test]
    fn remove_matching_returns_removed() {
        let store = MemoryTaskStore::new(vec![
            Task::normal("a", at(8, 0)).unwrap(),
            Task::normal("b", at(9, 0)).unwrap(),
        ]);
        let removed = remove_matching(&store, |t| t.title == "a").unwrap();
        assert_eq!(removed.len(), 1);
        assert_eq!(store.load_all().unwrap().len(), 1);

        let none = remove_matching(&store, |t| t.title == "zzz").unwrap();
        assert!(none.is_empty());
    }

    #[test]
    fn find_by_when_prefers_normal_task() {
        let tasks = vec![
            Task::special("s", at(9, 0)).unwrap(),
            Task::normal("n", at(9, 0)).unwrap(),
        ];
        assert_eq!(find_by_when(&tasks, at(9, 0)).unwrap().title, "n");
        assert!(find_by_when(&tasks, at(10, 0)).is_none());
    }
}
