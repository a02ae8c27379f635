//! Change notifications emitted by the store.

use serde::{Deserialize, Serialize};

use crate::work::{Work, WorkStatus};

/// Kind of change applied to a work item.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ChangeOperation {
    Create,
    Update,
    Delete,
}

impl std::fmt::Display for ChangeOperation {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Create => write!(f, "create"),
            Self::Update => write!(f, "update"),
            Self::Delete => write!(f, "delete"),
        }
    }
}

/// A single change to a work item.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ChangeEvent {
    pub operation: ChangeOperation,

    /// The item after the change (for deletes, the removed item).
    pub work: Work,

    /// The item before the change. Set for updates only.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub previous: Option<Work>,

    /// True when the change came from reconciling a write made by another
    /// process, false for in-process API calls.
    #[serde(default)]
    pub external: bool,
}

impl ChangeEvent {
    #[must_use]
    pub const fn created(work: Work) -> Self {
        Self {
            operation: ChangeOperation::Create,
            work,
            previous: None,
            external: false,
        }
    }

    #[must_use]
    pub const fn updated(previous: Work, work: Work) -> Self {
        Self {
            operation: ChangeOperation::Update,
            work,
            previous: Some(previous),
            external: false,
        }
    }

    #[must_use]
    pub const fn deleted(work: Work) -> Self {
        Self {
            operation: ChangeOperation::Delete,
            work,
            previous: None,
            external: false,
        }
    }

    /// Mark this event as originating outside the process.
    #[must_use]
    pub const fn external(mut self) -> Self {
        self.external = true;
        self
    }

    /// Whether this change moved the item into `status`.
    ///
    /// Creates count when the item starts in `status`; deletes never do.
    #[must_use]
    pub fn became(&self, status: WorkStatus) -> bool {
        match self.operation {
            ChangeOperation::Delete => false,
            ChangeOperation::Create => self.work.status == status,
            ChangeOperation::Update => {
                self.work.status == status
                    && self.previous.as_ref().is_none_or(|p| p.status != status)
            }
        }
    }
}
