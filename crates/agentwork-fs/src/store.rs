//! The work store: in-memory list, persisted to a JSON index, kept in sync
//! with other processes writing the same data directory.

use agentwork_core::{
    auto_close, diff_snapshots, validate_new, validate_transition, ChangeEvent, NewWork, Work,
    WorkPatch, WorkStatus,
};
use chrono::{DateTime, Utc};
use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard};
use tracing::{debug, info};

use crate::config::{DataDirConfig, StoreSettings};
use crate::error::{Result, StoreError};
use crate::index::IndexFile;
use crate::watch::{self, WatchHandle};

/// Callback invoked for every change event.
///
/// Listeners run after the store lock has been released, in registration
/// order, on the thread that made the change (or the reconciliation thread
/// for external events). A listener that needs to call back into the store
/// must do so from its own task or thread rather than inline.
pub type ChangeListener = Arc<dyn Fn(&ChangeEvent) + Send + Sync>;

/// Handle to a work store rooted at a data directory.
///
/// Cloning is cheap; all clones share the same state.
#[derive(Clone)]
pub struct WorkStore {
    inner: Arc<StoreInner>,
}

pub(crate) struct StoreInner {
    data_dir: PathBuf,
    settings: StoreSettings,
    index: IndexFile,
    works: RwLock<Vec<Work>>,
    /// Bumped after every successful write, under the `works` write lock.
    write_generation: AtomicU64,
    /// Reconciliation passes that read the index, discarded ones included.
    reloads: AtomicU64,
    listeners: RwLock<Vec<ChangeListener>>,
    watcher: Mutex<Option<WatchHandle>>,
}

impl fmt::Debug for WorkStore {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("WorkStore")
            .field("data_dir", &self.inner.data_dir)
            .field("index", &self.inner.index.path())
            .field("items", &self.inner.read_works().len())
            .finish_non_exhaustive()
    }
}

impl WorkStore {
    /// Open the store in `data_dir`, creating the directory if needed and
    /// reading `config.yml` when present.
    ///
    /// # Errors
    /// Returns error if the directory, config or index cannot be read.
    pub fn open(data_dir: impl AsRef<Path>) -> Result<Self> {
        let data_dir = data_dir.as_ref();
        fs::create_dir_all(data_dir)?;
        let config = DataDirConfig::load(data_dir)?;
        Self::open_with_settings(data_dir, config.store)
    }

    /// Open the store with explicit settings, ignoring `config.yml`.
    ///
    /// # Errors
    /// Returns error if the directory or index cannot be read.
    pub fn open_with_settings(data_dir: impl AsRef<Path>, settings: StoreSettings) -> Result<Self> {
        let data_dir = data_dir.as_ref().to_path_buf();
        fs::create_dir_all(&data_dir)?;

        let index = IndexFile::new(&data_dir, &settings);
        let works = index.read()?;

        info!(path = %data_dir.display(), items = works.len(), "Opened work store");

        Ok(Self {
            inner: Arc::new(StoreInner {
                data_dir,
                settings,
                index,
                works: RwLock::new(works),
                write_generation: AtomicU64::new(0),
                reloads: AtomicU64::new(0),
                listeners: RwLock::new(Vec::new()),
                watcher: Mutex::new(None),
            }),
        })
    }

    #[must_use]
    pub fn data_dir(&self) -> &Path {
        &self.inner.data_dir
    }

    #[must_use]
    pub fn index_path(&self) -> &Path {
        self.inner.index.path()
    }

    /// Number of successful writes made by this store.
    #[must_use]
    pub fn write_generation(&self) -> u64 {
        self.inner.write_generation.load(Ordering::SeqCst)
    }

    /// Number of reconciliation passes run so far, discarded ones included.
    #[must_use]
    pub fn reload_count(&self) -> u64 {
        self.inner.reload_count()
    }

    /// All items, in creation order.
    #[must_use]
    pub fn list(&self) -> Vec<Work> {
        self.inner.read_works().clone()
    }

    #[must_use]
    pub fn get(&self, id: &str) -> Option<Work> {
        self.inner.read_works().iter().find(|w| w.id == id).cloned()
    }

    /// Direct children of `id`.
    #[must_use]
    pub fn children(&self, id: &str) -> Vec<Work> {
        self.inner
            .read_works()
            .iter()
            .filter(|w| w.parent() == Some(id))
            .cloned()
            .collect()
    }

    /// The `in_progress` item bound to `session_id`, if any.
    #[must_use]
    pub fn find_in_progress_by_session(&self, session_id: &str) -> Option<Work> {
        self.inner
            .read_works()
            .iter()
            .find(|w| w.status == WorkStatus::InProgress && w.session() == Some(session_id))
            .cloned()
    }

    /// Create a new item in `open`.
    ///
    /// # Errors
    /// Returns `StoreError::Validation` for a blank title, bad parent or missing
    /// role, and an IO/JSON error if persisting fails (nothing is kept in that case).
    pub fn create(&self, new: NewWork) -> Result<Work> {
        let work = {
            let mut works = self.inner.write_works();

            let parent = new
                .parent_id
                .as_deref()
                .and_then(|pid| works.iter().find(|w| w.id == pid));
            let agent_role_id = validate_new(&new, parent)?;

            let work = new.into_work(agent_role_id, Utc::now());
            works.push(work.clone());

            if let Err(e) = self.inner.persist(&works) {
                works.pop();
                return Err(e);
            }
            work
        };

        info!(id = %work.id, work_type = %work.work_type, title = %work.title, "Created work item");
        self.inner.notify(&[ChangeEvent::created(work.clone())]);

        Ok(work)
    }

    /// Apply `patch` to an item.
    ///
    /// Moving an item to `done` runs the auto-close cascade in the same call.
    /// One update event is emitted for the item and one for each ancestor the
    /// cascade touched.
    ///
    /// # Errors
    /// Returns `StoreError::NotFound` for an unknown id, `StoreError::Validation`
    /// for a disallowed transition or session change, and an IO/JSON error if
    /// persisting fails (the list is restored first).
    pub fn update(&self, id: &str, patch: &WorkPatch) -> Result<Work> {
        let (work, events) = {
            let mut works = self.inner.write_works();
            let idx = position(&works, id)?;
            patch.validate(&works[idx])?;

            let snapshot = works.clone();
            let now = Utc::now();
            patch.apply(&mut works[idx], now);

            let modified = if patch.status == Some(WorkStatus::Done) {
                close_eligible(&mut works, id, now)
            } else {
                vec![id.to_string()]
            };

            self.inner.commit(&mut works, snapshot, &modified, idx)?
        };

        info!(id = %id, status = %work.status, events = events.len(), "Updated work item");
        self.inner.notify(&events);

        Ok(work)
    }

    /// Move an item to `done`, first advancing it from `open` to `in_progress`
    /// when needed. Both steps happen under one lock.
    ///
    /// # Errors
    /// Returns `StoreError::NotFound` for an unknown id, `StoreError::Validation`
    /// if the item cannot reach `done` (already `done` or `closed`), and an
    /// IO/JSON error if persisting fails.
    pub fn mark_done(&self, id: &str) -> Result<Work> {
        let (work, events) = {
            let mut works = self.inner.write_works();
            let idx = position(&works, id)?;

            let from = match works[idx].status {
                WorkStatus::Open => WorkStatus::InProgress,
                other => other,
            };
            validate_transition(from, WorkStatus::Done)?;

            let snapshot = works.clone();
            let now = Utc::now();
            works[idx].status = WorkStatus::Done;
            works[idx].touch(now);
            let modified = close_eligible(&mut works, id, now);

            self.inner.commit(&mut works, snapshot, &modified, idx)?
        };

        info!(id = %id, status = %work.status, events = events.len(), "Marked work item done");
        self.inner.notify(&events);

        Ok(work)
    }

    /// Remove an item that has no children.
    ///
    /// # Errors
    /// Returns `StoreError::NotFound` for an unknown id, `StoreError::HasChildren`
    /// if any item names it as parent, and an IO/JSON error if persisting fails.
    pub fn delete(&self, id: &str) -> Result<Work> {
        let removed = {
            let mut works = self.inner.write_works();
            let idx = position(&works, id)?;

            let children = works.iter().filter(|w| w.parent() == Some(id)).count();
            if children > 0 {
                return Err(StoreError::HasChildren {
                    id: id.to_string(),
                    children,
                });
            }

            let removed = works.remove(idx);
            if let Err(e) = self.inner.persist(&works) {
                works.insert(idx, removed);
                return Err(e);
            }
            removed
        };

        info!(id = %id, "Deleted work item");
        self.inner.notify(&[ChangeEvent::deleted(removed.clone())]);

        Ok(removed)
    }

    /// Register a listener for every subsequent change event.
    pub fn add_on_change_listener<F>(&self, listener: F)
    where
        F: Fn(&ChangeEvent) + Send + Sync + 'static,
    {
        self.inner
            .listeners
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .push(Arc::new(listener));
    }

    /// Re-read the index and emit external events for whatever changed on disk.
    ///
    /// Returns the number of events emitted. A reload that races an in-process
    /// write is discarded and reports zero.
    ///
    /// # Errors
    /// Returns error if the index cannot be read or parsed; the in-memory list
    /// is left untouched.
    pub fn reload(&self) -> Result<usize> {
        self.inner.reload()
    }

    /// Start reconciling with writes from other processes.
    ///
    /// Must be called from within a tokio runtime. Calling it twice is a no-op.
    ///
    /// # Errors
    /// Returns error if no runtime is available or the watch cannot be installed.
    pub fn start_watching(&self) -> Result<()> {
        let mut watcher = self.inner.watcher.lock().unwrap_or_else(PoisonError::into_inner);
        if watcher.is_none() {
            *watcher = Some(watch::spawn(&self.inner)?);
        }
        Ok(())
    }

    /// Stop reconciling. Pending debounced reloads are abandoned.
    pub fn stop_watching(&self) {
        let handle = self
            .inner
            .watcher
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take();
        if let Some(handle) = handle {
            handle.stop();
            info!(path = %self.inner.data_dir.display(), "Stopped watching data directory");
        }
    }

    #[must_use]
    pub fn is_watching(&self) -> bool {
        self.inner
            .watcher
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .is_some()
    }
}

impl StoreInner {
    pub(crate) fn data_dir(&self) -> &Path {
        &self.data_dir
    }

    pub(crate) const fn settings(&self) -> &StoreSettings {
        &self.settings
    }

    pub(crate) const fn index(&self) -> &IndexFile {
        &self.index
    }

    fn read_works(&self) -> RwLockReadGuard<'_, Vec<Work>> {
        self.works.read().unwrap_or_else(PoisonError::into_inner)
    }

    fn write_works(&self) -> RwLockWriteGuard<'_, Vec<Work>> {
        self.works.write().unwrap_or_else(PoisonError::into_inner)
    }

    /// Write the list and bump the generation. Callers hold the `works` write lock.
    fn persist(&self, works: &[Work]) -> Result<()> {
        self.index.write(works)?;
        self.write_generation.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }

    /// Persist a status/field change, restoring `snapshot` on failure.
    ///
    /// Returns the target item and one update event per modified id.
    fn commit(
        &self,
        works: &mut Vec<Work>,
        snapshot: Vec<Work>,
        modified: &[String],
        idx: usize,
    ) -> Result<(Work, Vec<ChangeEvent>)> {
        if let Err(e) = self.persist(works) {
            *works = snapshot;
            return Err(e);
        }

        let events = modified
            .iter()
            .filter_map(|id| {
                let previous = snapshot.iter().find(|w| &w.id == id)?;
                let current = works.iter().find(|w| &w.id == id)?;
                Some(ChangeEvent::updated(previous.clone(), current.clone()))
            })
            .collect();

        Ok((works[idx].clone(), events))
    }

    /// Read the index along with the generation observed before reading it.
    pub(crate) fn read_snapshot(&self) -> Result<(u64, Vec<Work>)> {
        let generation = self.write_generation.load(Ordering::SeqCst);
        let fresh = self.index.read()?;
        Ok((generation, fresh))
    }

    /// Swap in a snapshot read at `generation` and return the external events,
    /// or `None` if an in-process write happened since.
    pub(crate) fn apply_snapshot(&self, generation: u64, fresh: Vec<Work>) -> Option<Vec<ChangeEvent>> {
        let mut works = self.write_works();
        // The concurrent write's own filesystem event will trigger a later reload.
        if self.write_generation.load(Ordering::SeqCst) != generation {
            debug!(generation, "Discarding reload that raced an in-process write");
            return None;
        }

        let events = diff_snapshots(&works, &fresh);
        *works = fresh;
        Some(events)
    }

    pub(crate) fn reload_count(&self) -> u64 {
        self.reloads.load(Ordering::SeqCst)
    }

    pub(crate) fn reload(&self) -> Result<usize> {
        self.reloads.fetch_add(1, Ordering::SeqCst);
        let (generation, fresh) = self.read_snapshot()?;
        let Some(events) = self.apply_snapshot(generation, fresh) else {
            return Ok(0);
        };

        if !events.is_empty() {
            info!(events = events.len(), "Reconciled external changes");
            self.notify(&events);
        }
        Ok(events.len())
    }

    /// Dispatch events to every listener. Never called with `works` locked.
    fn notify(&self, events: &[ChangeEvent]) {
        if events.is_empty() {
            return;
        }
        let listeners = self
            .listeners
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone();
        for event in events {
            for listener in &listeners {
                listener(event);
            }
        }
    }
}

fn position(works: &[Work], id: &str) -> Result<usize> {
    works
        .iter()
        .position(|w| w.id == id)
        .ok_or_else(|| StoreError::NotFound(id.to_string()))
}

/// Run the cascade from `id` and list every modified id, `id` first.
fn close_eligible(works: &mut [Work], id: &str, now: DateTime<Utc>) -> Vec<String> {
    let mut modified = vec![id.to_string()];
    for closed in auto_close(works, id, now) {
        if !modified.contains(&closed) {
            modified.push(closed);
        }
    }
    modified
}
