//! agentwork-core: Domain model and rules for agent work items.
//!
//! This crate provides:
//! - `Work`: stories and tasks with their status lifecycle
//! - Validation of creation, status transitions and session coupling
//! - `WorkPatch`: partial updates
//! - `ChangeEvent`: change notifications and snapshot diffing
//! - The auto-close cascade

pub mod cascade;
pub mod diff;
pub mod error;
pub mod event;
pub mod patch;
pub mod validate;
pub mod work;

pub use cascade::{auto_close, MAX_CASCADE_DEPTH};
pub use diff::diff_snapshots;
pub use error::{CoreError, Result};
pub use event::{ChangeEvent, ChangeOperation};
pub use patch::{SessionChange, WorkPatch};
pub use validate::{validate_new, validate_parent, validate_transition};
pub use work::{NewWork, Work, WorkStatus, WorkType};
