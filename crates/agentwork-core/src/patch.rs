//! Partial updates for work items.
//!
//! A [`WorkPatch`] carries only the fields a caller wants to change. It can be
//! built programmatically or from `key=value` assignments
//! (e.g. `status=in_progress`, `session=s1`, `session=` to clear).

use chrono::{DateTime, Utc};

use crate::error::{CoreError, Result};
use crate::validate::{validate_title, validate_transition};
use crate::work::{Work, WorkStatus};

/// Change to the session binding of an item.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SessionChange {
    /// Bind the item to a live session. Only valid alongside `in_progress`.
    Set(String),
    /// Unbind the item. Only valid alongside `open`.
    Clear,
}

/// Fields to change on an existing work item.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct WorkPatch {
    pub title: Option<String>,
    pub body: Option<String>,
    pub agent_role_id: Option<String>,
    pub status: Option<WorkStatus>,
    pub session: Option<SessionChange>,
}

impl WorkPatch {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn with_title(mut self, title: impl Into<String>) -> Self {
        self.title = Some(title.into());
        self
    }

    #[must_use]
    pub fn with_body(mut self, body: impl Into<String>) -> Self {
        self.body = Some(body.into());
        self
    }

    #[must_use]
    pub fn with_role(mut self, agent_role_id: impl Into<String>) -> Self {
        self.agent_role_id = Some(agent_role_id.into());
        self
    }

    #[must_use]
    pub const fn with_status(mut self, status: WorkStatus) -> Self {
        self.status = Some(status);
        self
    }

    /// Bind a session. An empty id is treated as [`SessionChange::Clear`].
    #[must_use]
    pub fn with_session(mut self, session_id: impl Into<String>) -> Self {
        let session_id = session_id.into();
        self.session = Some(if session_id.is_empty() {
            SessionChange::Clear
        } else {
            SessionChange::Set(session_id)
        });
        self
    }

    #[must_use]
    pub fn clear_session(mut self) -> Self {
        self.session = Some(SessionChange::Clear);
        self
    }

    /// `start`: open -> in_progress bound to `session_id`.
    #[must_use]
    pub fn start(session_id: impl Into<String>) -> Self {
        Self::new()
            .with_status(WorkStatus::InProgress)
            .with_session(session_id)
    }

    /// `rollback`: in_progress -> open, releasing the session.
    #[must_use]
    pub fn rollback() -> Self {
        Self::new().with_status(WorkStatus::Open).clear_session()
    }

    /// Parse one `key=value` assignment into this patch.
    ///
    /// Keys: `title`, `body`, `role` (or `agent_role_id`), `status`, `session`
    /// (or `session_id`).
    ///
    /// # Errors
    /// Returns `CoreError::Validation` for a malformed assignment or unknown key,
    /// and `CoreError::UnknownValue` for an unknown status.
    pub fn assign(mut self, input: &str) -> Result<Self> {
        let (key, value) = input.split_once('=').ok_or_else(|| {
            CoreError::validation(format!("expected 'key=value', got '{input}'"))
        })?;
        let value = value.trim();

        match key.trim() {
            "title" => self.title = Some(value.to_string()),
            "body" => self.body = Some(value.to_string()),
            "role" | "agent_role_id" => self.agent_role_id = Some(value.to_string()),
            "status" => self.status = Some(value.parse()?),
            "session" | "session_id" => self = self.with_session(value),
            other => {
                return Err(CoreError::validation(format!("unknown field: {other}")));
            }
        }
        Ok(self)
    }

    /// Check the patch against the item it will be applied to.
    ///
    /// # Errors
    /// Returns an error if the title is blank, the status change is not in the
    /// transition table, or the session change is not coupled to the matching
    /// status change.
    pub fn validate(&self, current: &Work) -> Result<()> {
        if let Some(title) = &self.title {
            validate_title(title)?;
        }
        if let Some(role) = &self.agent_role_id {
            if role.trim().is_empty() {
                return Err(CoreError::validation("agent_role_id cannot be empty"));
            }
        }
        if let Some(to) = self.status {
            validate_transition(current.status, to)?;
        }
        match &self.session {
            Some(SessionChange::Set(id)) if id.trim().is_empty() => {
                Err(CoreError::validation("session id cannot be empty"))
            }
            Some(SessionChange::Set(_)) if self.status != Some(WorkStatus::InProgress) => {
                Err(CoreError::SessionCoupling {
                    action: "set",
                    required: WorkStatus::InProgress,
                })
            }
            Some(SessionChange::Clear) if self.status != Some(WorkStatus::Open) => {
                Err(CoreError::SessionCoupling {
                    action: "cleared",
                    required: WorkStatus::Open,
                })
            }
            _ => Ok(()),
        }
    }

    /// Write the patched fields into `work` and touch it. Does not validate.
    pub fn apply(&self, work: &mut Work, now: DateTime<Utc>) {
        if let Some(title) = &self.title {
            work.title.clone_from(title);
        }
        if let Some(body) = &self.body {
            work.body = Some(body.clone()).filter(|b| !b.is_empty());
        }
        if let Some(role) = &self.agent_role_id {
            work.agent_role_id.clone_from(role);
        }
        if let Some(status) = self.status {
            work.status = status;
        }
        match &self.session {
            // The index stores an absent session as "", so never keep one in memory.
            Some(SessionChange::Set(id)) => {
                work.session_id = Some(id.clone()).filter(|s| !s.is_empty());
            }
            Some(SessionChange::Clear) => work.session_id = None,
            None => {}
        }
        work.touch(now);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::work::NewWork;

    fn open_story() -> Work {
        NewWork::story("Story", "lead").into_work("lead".into(), Utc::now())
    }

    #[test]
    fn test_start_and_rollback() {
        let mut work = open_story();
        let start = WorkPatch::start("s1");
        start.validate(&work).unwrap();
        start.apply(&mut work, Utc::now());
        assert_eq!(work.status, WorkStatus::InProgress);
        assert_eq!(work.session(), Some("s1"));

        let rollback = WorkPatch::rollback();
        rollback.validate(&work).unwrap();
        rollback.apply(&mut work, Utc::now());
        assert_eq!(work.status, WorkStatus::Open);
        assert_eq!(work.session(), None);
    }

    #[test]
    fn test_session_requires_status_change() {
        let mut work = open_story();
        let err = WorkPatch::new().with_session("s1").validate(&work).unwrap_err();
        assert!(matches!(err, CoreError::SessionCoupling { action: "set", .. }));

        WorkPatch::start("s1").apply(&mut work, Utc::now());
        let err = WorkPatch::new().clear_session().validate(&work).unwrap_err();
        assert!(matches!(err, CoreError::SessionCoupling { action: "cleared", .. }));

        // Setting a session while moving to done is just as invalid.
        let err = WorkPatch::new()
            .with_status(WorkStatus::Done)
            .with_session("s2")
            .validate(&work)
            .unwrap_err();
        assert!(matches!(err, CoreError::SessionCoupling { .. }));
    }

    #[test]
    fn test_empty_session_id_rejected() {
        let mut work = open_story();
        let patch = WorkPatch {
            status: Some(WorkStatus::InProgress),
            session: Some(SessionChange::Set(String::new())),
            ..WorkPatch::default()
        };
        assert!(matches!(patch.validate(&work), Err(CoreError::Validation(_))));

        patch.apply(&mut work, Utc::now());
        assert_eq!(work.session_id, None);
    }

    #[test]
    fn test_rejects_same_status() {
        let work = open_story();
        let err = WorkPatch::new()
            .with_status(WorkStatus::Open)
            .validate(&work)
            .unwrap_err();
        assert!(matches!(err, CoreError::InvalidStateTransition { .. }));
    }

    #[test]
    fn test_assign_parses_fields() {
        let patch = WorkPatch::new()
            .assign("status=in_progress")
            .unwrap()
            .assign("session=s9")
            .unwrap()
            .assign("title = Renamed")
            .unwrap();

        assert_eq!(patch.status, Some(WorkStatus::InProgress));
        assert_eq!(patch.session, Some(SessionChange::Set("s9".into())));
        assert_eq!(patch.title.as_deref(), Some("Renamed"));

        let cleared = WorkPatch::new().assign("session=").unwrap();
        assert_eq!(cleared.session, Some(SessionChange::Clear));

        assert!(WorkPatch::new().assign("priority=high").is_err());
        assert!(WorkPatch::new().assign("status").is_err());
        assert!(WorkPatch::new().assign("status=blocked").is_err());
    }

    #[test]
    fn test_blank_title_rejected() {
        let work = open_story();
        assert!(WorkPatch::new().with_title(" ").validate(&work).is_err());
    }
}
