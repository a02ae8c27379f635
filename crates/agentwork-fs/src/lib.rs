//! Filesystem backend for agentwork.
//!
//! Stores every work item in one data directory:
//! - `works.json`: the full item list as a JSON array
//! - `works.json.lock`: advisory lock file, never read for data
//! - `config.yml`: optional settings
//!
//! The [`WorkStore`] owns the in-memory list, persists each mutation
//! atomically, and reconciles with other processes writing the same directory.

pub mod config;
pub mod error;
pub mod index;
pub mod lock;
pub mod store;
mod watch;

pub use config::{CONFIG_FILE, DataDirConfig, ResumerSettings, StoreSettings};
pub use error::{Result, StoreError};
pub use lock::{LockGuard, SharedFileLock};
pub use store::{ChangeListener, WorkStore};
