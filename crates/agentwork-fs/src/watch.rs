//! Filesystem watch that reconciles the store with external writers.
//!
//! The data directory is watched (not the index file itself, which is
//! replaced on every write). Create/modify events naming the index are
//! coalesced over a fixed window and then trigger one reload.

use notify::{Event, EventKind, RecommendedWatcher, RecursiveMode, Watcher};
use std::ffi::OsStr;
use std::sync::{Arc, Weak};
use std::time::Duration;
use tokio::runtime::Handle;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::error::{Result, StoreError};
use crate::store::StoreInner;

/// A running watch. Dropping the watcher closes the event channel, which ends
/// the debounce task as well.
pub(crate) struct WatchHandle {
    watcher: RecommendedWatcher,
    cancel: CancellationToken,
}

impl WatchHandle {
    pub(crate) fn stop(self) {
        self.cancel.cancel();
        drop(self.watcher);
    }
}

pub(crate) fn spawn(store: &Arc<StoreInner>) -> Result<WatchHandle> {
    let runtime = Handle::try_current().map_err(|_| StoreError::NoRuntime)?;
    let (tx, rx) = mpsc::channel::<()>(64);
    let index_name = store.index().file_name().to_os_string();

    let mut watcher = notify::recommended_watcher(move |res: notify::Result<Event>| match res {
        Ok(event) if is_index_write(&event, &index_name) => {
            // A full channel already has a reload pending.
            let _ = tx.try_send(());
        }
        Ok(_) => {}
        Err(e) => warn!(error = %e, "Filesystem watch error"),
    })?;
    watcher.watch(store.data_dir(), RecursiveMode::NonRecursive)?;

    let cancel = CancellationToken::new();
    runtime.spawn(debounce_loop(
        Arc::downgrade(store),
        rx,
        store.settings().debounce(),
        cancel.clone(),
    ));

    info!(path = %store.data_dir().display(), "Watching data directory");
    Ok(WatchHandle { watcher, cancel })
}

fn is_index_write(event: &Event, index_name: &OsStr) -> bool {
    matches!(event.kind, EventKind::Create(_) | EventKind::Modify(_))
        && event
            .paths
            .iter()
            .any(|p| p.file_name() == Some(index_name))
}

async fn debounce_loop(
    store: Weak<StoreInner>,
    mut rx: mpsc::Receiver<()>,
    window: Duration,
    cancel: CancellationToken,
) {
    loop {
        tokio::select! {
            () = cancel.cancelled() => break,
            received = rx.recv() => {
                if received.is_none() {
                    break;
                }
            }
        }

        let deadline = tokio::time::sleep(window);
        tokio::pin!(deadline);
        loop {
            tokio::select! {
                () = cancel.cancelled() => return,
                () = &mut deadline => break,
                Some(()) = rx.recv() => {}
            }
        }

        let Some(store) = store.upgrade() else {
            break;
        };
        let reloads = store.reload_count() + 1;
        match tokio::task::spawn_blocking(move || store.reload()).await {
            Ok(Ok(events)) => debug!(events, reloads, "Reload finished"),
            Ok(Err(e)) => warn!(error = %e, "Reload failed, keeping in-memory state"),
            Err(e) => warn!(error = %e, "Reload task panicked"),
        }
    }
    debug!("Watch loop stopped");
}
