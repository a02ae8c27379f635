//! The automatic trigger engine.
//!
//! Three triggers keep a story/task hierarchy moving without a human
//! re-prompting the agent:
//!
//! - **A, stalled continuation**: an agent went idle while its item is still
//!   `in_progress`; after a settle delay, nudge it (bounded per session).
//! - **B, parent reactivation**: a task closed while its story sits at `done`
//!   with a live session; move the story back to `in_progress` and tell it.
//! - **C, external start**: another process moved an item to `in_progress`
//!   with a session; provision that session, or roll the item back to `open`.

use agentwork_core::{ChangeEvent, ChangeOperation, Work, WorkPatch, WorkStatus};
use agentwork_fs::{ResumerSettings, WorkStore};
use anyhow::Context;
use std::collections::HashMap;
use std::sync::{Arc, Mutex, OnceLock, PoisonError, Weak};
use tokio::runtime::{Handle, TryCurrentError};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tokio_util::task::TaskTracker;
use tracing::{debug, info, warn};

use crate::capability::{MessageSender, WorkStartHandler};
use crate::messages::{continuation_message, reactivation_message};

/// An agent process became idle.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IdleSignal {
    pub session_id: String,
    /// First idle after the process started, before any work was sent.
    pub initial: bool,
    /// The agent stopped to ask the user something.
    pub awaiting_input: bool,
}

impl IdleSignal {
    #[must_use]
    pub fn new(session_id: impl Into<String>) -> Self {
        Self {
            session_id: session_id.into(),
            initial: false,
            awaiting_input: false,
        }
    }

    #[must_use]
    pub const fn initial(mut self) -> Self {
        self.initial = true;
        self
    }

    #[must_use]
    pub const fn awaiting_input(mut self) -> Self {
        self.awaiting_input = true;
        self
    }
}

/// Turns store events and idle signals into automatic follow-ups.
///
/// Every trigger runs on its own tracked task. [`AutoResumer::stop`] cancels
/// pending settle delays and waits for in-flight triggers.
#[derive(Clone)]
pub struct AutoResumer {
    inner: Arc<Inner>,
}

struct Inner {
    store: WorkStore,
    sender: Arc<dyn MessageSender>,
    starter: Arc<dyn WorkStartHandler>,
    settings: ResumerSettings,
    /// Continuation attempts per session.
    retries: Mutex<HashMap<String, u32>>,
    shutdown: CancellationToken,
    tasks: TaskTracker,
    /// Runtime captured by the first `start`; every trigger is spawned on it.
    runtime: OnceLock<Handle>,
}

impl std::fmt::Debug for AutoResumer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AutoResumer")
            .field("settings", &self.inner.settings)
            .field("started", &self.inner.runtime.get().is_some())
            .field("stopped", &self.inner.shutdown.is_cancelled())
            .finish_non_exhaustive()
    }
}

impl AutoResumer {
    #[must_use]
    pub fn new(
        store: WorkStore,
        sender: Arc<dyn MessageSender>,
        starter: Arc<dyn WorkStartHandler>,
        settings: ResumerSettings,
    ) -> Self {
        Self {
            inner: Arc::new(Inner {
                store,
                sender,
                starter,
                settings,
                retries: Mutex::new(HashMap::new()),
                shutdown: CancellationToken::new(),
                tasks: TaskTracker::new(),
                runtime: OnceLock::new(),
            }),
        }
    }

    /// Subscribe to store events. Triggers are spawned on the current runtime.
    ///
    /// Only the first call subscribes; later calls are no-ops.
    ///
    /// # Errors
    /// Returns error if called outside a tokio runtime.
    pub fn start(&self) -> Result<(), TryCurrentError> {
        let handle = Handle::try_current()?;
        if self.inner.runtime.set(handle.clone()).is_err() {
            debug!("Auto-resumer already started");
            return Ok(());
        }
        let weak: Weak<Inner> = Arc::downgrade(&self.inner);

        // The listener runs on the thread that changed the store; it must only
        // hand the event off, never call back into the store inline.
        self.inner.store.add_on_change_listener(move |event| {
            let Some(inner) = weak.upgrade() else {
                return;
            };
            if inner.shutdown.is_cancelled() {
                return;
            }
            let event = event.clone();
            let tasks = inner.tasks.clone();
            tasks.spawn_on(inner.on_change(event), &handle);
        });

        info!(
            max_retries = self.inner.settings.max_retries,
            settle_delay_ms = self.inner.settings.settle_delay_ms,
            "Auto-resumer started"
        );
        Ok(())
    }

    /// Process-lifecycle entry point: the agent in `signal.session_id` went idle.
    ///
    /// The trigger runs on the runtime captured by [`AutoResumer::start`], so
    /// this may be called from any thread. Returns `None` before `start` or
    /// after `stop`.
    pub fn handle_idle(&self, signal: IdleSignal) -> Option<JoinHandle<()>> {
        let Some(runtime) = self.inner.runtime.get() else {
            warn!(session_id = %signal.session_id, "Idle signal before start, ignoring");
            return None;
        };
        if self.inner.shutdown.is_cancelled() {
            debug!(session_id = %signal.session_id, "Idle signal after stop, ignoring");
            return None;
        }
        Some(
            self.inner
                .tasks
                .spawn_on(Arc::clone(&self.inner).on_idle(signal), runtime),
        )
    }

    /// Continuation messages sent to `session_id` since its item last completed.
    #[must_use]
    pub fn retry_count(&self, session_id: &str) -> u32 {
        self.inner
            .lock_retries()
            .get(session_id)
            .copied()
            .unwrap_or(0)
    }

    #[must_use]
    pub fn is_stopped(&self) -> bool {
        self.inner.shutdown.is_cancelled()
    }

    /// Cancel pending settle delays and wait for every spawned trigger to finish.
    pub async fn stop(&self) {
        self.inner.shutdown.cancel();
        self.inner.tasks.close();
        self.inner.tasks.wait().await;
        info!("Auto-resumer stopped");
    }
}

impl Inner {
    fn lock_retries(&self) -> std::sync::MutexGuard<'_, HashMap<String, u32>> {
        self.retries.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn clear_retries(&self, session_id: &str) {
        if self.lock_retries().remove(session_id).is_some() {
            debug!(session_id, "Cleared retry counter");
        }
    }

    /// Reserve the next attempt for `session_id`, or `None` at the cap.
    fn next_attempt(&self, session_id: &str) -> Option<u32> {
        let mut retries = self.lock_retries();
        let count = retries.entry(session_id.to_string()).or_insert(0);
        if *count >= self.settings.max_retries {
            return None;
        }
        *count += 1;
        Some(*count)
    }

    async fn on_idle(self: Arc<Self>, signal: IdleSignal) {
        if signal.initial || signal.awaiting_input {
            debug!(session_id = %signal.session_id, "Ignoring idle signal");
            return;
        }
        let session_id = signal.session_id.as_str();
        let Some(work) = self.store.find_in_progress_by_session(session_id) else {
            debug!(session_id, "No in-progress work bound to idle session");
            return;
        };

        tokio::select! {
            () = self.shutdown.cancelled() => return,
            () = tokio::time::sleep(self.settings.settle_delay()) => {}
        }

        // A done call written elsewhere may have landed during the delay.
        let still_running = self
            .store
            .get(&work.id)
            .filter(|w| w.status == WorkStatus::InProgress && w.session() == Some(session_id));
        let Some(work) = still_running else {
            debug!(id = %work.id, session_id, "Work moved on during settle delay");
            return;
        };

        let Some(attempt) = self.next_attempt(session_id) else {
            info!(
                id = %work.id,
                session_id,
                max_retries = self.settings.max_retries,
                "Retry limit reached, leaving work in progress for manual handling"
            );
            return;
        };

        let message = continuation_message(&work, attempt, self.settings.max_retries);
        if self.deliver(session_id, &message).await {
            info!(id = %work.id, session_id, attempt, "Sent continuation nudge");
        }
    }

    async fn on_change(self: Arc<Self>, event: ChangeEvent) {
        self.forget_finished(&event);

        if event.operation == ChangeOperation::Update && event.became(WorkStatus::Closed) {
            if let Some(parent_id) = event.work.parent() {
                self.reactivate_parent(parent_id, &event.work).await;
            }
        }

        // In-process starts already provisioned their session synchronously.
        if event.external && event.became(WorkStatus::InProgress) && event.work.session().is_some() {
            self.start_external(&event.work).await;
        }
    }

    fn forget_finished(&self, event: &ChangeEvent) {
        let finished =
            event.operation == ChangeOperation::Delete || event.work.status.is_complete();
        if finished {
            if let Some(session_id) = event.work.session() {
                self.clear_retries(session_id);
            }
        }
    }

    async fn reactivate_parent(&self, parent_id: &str, child: &Work) {
        let Some(parent) = self.store.get(parent_id) else {
            return;
        };
        if parent.status != WorkStatus::Done {
            return;
        }
        let Some(session_id) = parent.session().map(str::to_string) else {
            debug!(id = %parent.id, "Done parent has no live session, not reactivating");
            return;
        };

        let patch = WorkPatch::new().with_status(WorkStatus::InProgress);
        if let Err(e) = self.update(&parent.id, patch).await {
            warn!(id = %parent.id, error = %e, "Failed to reactivate parent");
            return;
        }
        self.clear_retries(&session_id);

        info!(id = %parent.id, child = %child.id, session_id, "Reactivated parent");
        self.deliver(&session_id, &reactivation_message(&parent, child))
            .await;
    }

    async fn start_external(&self, work: &Work) {
        match self.starter.handle_work_start(work).await {
            Ok(()) => info!(id = %work.id, session_id = ?work.session(), "Provisioned externally started work"),
            Err(e) => {
                warn!(id = %work.id, error = %e, "Work start failed, rolling back to open");
                if let Err(e) = self.update(&work.id, WorkPatch::rollback()).await {
                    warn!(id = %work.id, error = %e, "Failed to roll back work");
                }
            }
        }
    }

    /// Store mutations block on file locks and fsync, so they leave the runtime.
    async fn update(&self, id: &str, patch: WorkPatch) -> anyhow::Result<Work> {
        let store = self.store.clone();
        let id = id.to_string();
        let work = tokio::task::spawn_blocking(move || store.update(&id, &patch))
            .await
            .context("store update task failed")??;
        Ok(work)
    }

    /// Send `content`, logging failures. Returns whether delivery succeeded.
    async fn deliver(&self, session_id: &str, content: &str) -> bool {
        match self.sender.send_message(session_id, content).await {
            Ok(()) => true,
            Err(e) if self.shutdown.is_cancelled() => {
                debug!(session_id, error = %e, "Send failed during shutdown");
                false
            }
            Err(e) => {
                warn!(session_id, error = %e, "Failed to send message");
                false
            }
        }
    }
}
