//! Creation and transition rules for work items.

use crate::error::{CoreError, Result};
use crate::work::{NewWork, Work, WorkStatus, WorkType};

/// Check a caller-requested status change against the transition table.
///
/// # Errors
/// Returns `CoreError::InvalidStateTransition` for any pair outside the table,
/// which includes every attempt to set `closed` directly.
pub fn validate_transition(from: WorkStatus, to: WorkStatus) -> Result<()> {
    if from.can_transition_to(to) {
        Ok(())
    } else {
        Err(CoreError::InvalidStateTransition { from, to })
    }
}

/// Titles must contain something other than whitespace.
///
/// # Errors
/// Returns `CoreError::Validation` for an empty title.
pub fn validate_title(title: &str) -> Result<()> {
    if title.trim().is_empty() {
        return Err(CoreError::validation("title is required"));
    }
    Ok(())
}

/// Check parent/type compatibility for a new item.
///
/// `parent` is the resolved item for `parent_id`, or `None` if it does not exist.
///
/// # Errors
/// Returns `CoreError::Validation` if a story has a parent, or a task has a
/// missing, task-typed or closed parent.
pub fn validate_parent(
    work_type: WorkType,
    parent_id: Option<&str>,
    parent: Option<&Work>,
) -> Result<()> {
    let parent_id = parent_id.filter(|p| !p.is_empty());

    match (work_type, parent_id) {
        (WorkType::Story, None) => Ok(()),
        (WorkType::Story, Some(_)) => Err(CoreError::validation(
            "stories are top-level and cannot have a parent",
        )),
        (WorkType::Task, None) => Err(CoreError::validation("a task requires a parent story")),
        (WorkType::Task, Some(id)) => {
            let parent = parent
                .ok_or_else(|| CoreError::validation(format!("parent not found: {id}")))?;
            if parent.work_type == WorkType::Task {
                return Err(CoreError::validation(format!(
                    "parent {id} is a task; tasks cannot own children"
                )));
            }
            if parent.status == WorkStatus::Closed {
                return Err(CoreError::validation(format!("parent {id} is closed")));
            }
            Ok(())
        }
    }
}

/// Resolve the agent role for a new item, inheriting from the parent when unset.
///
/// # Errors
/// Returns `CoreError::Validation` if no role is given and none can be inherited.
pub fn resolve_agent_role(new: &NewWork, parent: Option<&Work>) -> Result<String> {
    new.agent_role_id
        .as_deref()
        .filter(|r| !r.trim().is_empty())
        .or_else(|| {
            parent
                .map(|p| p.agent_role_id.as_str())
                .filter(|r| !r.is_empty())
        })
        .map(str::to_string)
        .ok_or_else(|| CoreError::validation("agent_role_id is required"))
}

/// Run every creation check and return the resolved agent role.
///
/// # Errors
/// Returns the first failing rule as `CoreError::Validation`.
pub fn validate_new(new: &NewWork, parent: Option<&Work>) -> Result<String> {
    validate_title(&new.title)?;
    validate_parent(new.work_type, new.parent_id.as_deref(), parent)?;
    resolve_agent_role(new, parent)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;

    fn story() -> Work {
        NewWork::story("Story", "lead").into_work("lead".into(), Utc::now())
    }

    #[test]
    fn test_story_cannot_have_parent() {
        let parent = story();
        let err = validate_parent(WorkType::Story, Some(&parent.id), Some(&parent)).unwrap_err();
        assert!(err.to_string().contains("top-level"));
    }

    #[test]
    fn test_task_parent_rules() {
        let mut parent = story();
        assert!(validate_parent(WorkType::Task, Some(&parent.id), Some(&parent)).is_ok());
        assert!(validate_parent(WorkType::Task, None, None).is_err());
        assert!(validate_parent(WorkType::Task, Some("w_missing"), None).is_err());

        parent.status = WorkStatus::Closed;
        assert!(validate_parent(WorkType::Task, Some(&parent.id), Some(&parent)).is_err());

        let task = NewWork::task(&parent.id, "Leaf").into_work("dev".into(), Utc::now());
        assert!(validate_parent(WorkType::Task, Some(&task.id), Some(&task)).is_err());
    }

    #[test]
    fn test_task_inherits_role() {
        let parent = story();
        let new = NewWork::task(&parent.id, "Leaf");
        assert_eq!(resolve_agent_role(&new, Some(&parent)).unwrap(), "lead");

        let new = new.with_role("reviewer");
        assert_eq!(resolve_agent_role(&new, Some(&parent)).unwrap(), "reviewer");
    }

    #[test]
    fn test_story_requires_role() {
        let mut new = NewWork::story("Story", "");
        assert!(resolve_agent_role(&new, None).is_err());
        new.agent_role_id = None;
        assert!(validate_new(&new, None).is_err());
    }

    #[test]
    fn test_blank_title_rejected() {
        let new = NewWork::story("   ", "lead");
        let err = validate_new(&new, None).unwrap_err();
        assert!(matches!(err, CoreError::Validation(_)));
    }

    #[test]
    fn test_closed_never_settable() {
        for from in WorkStatus::ALL {
            assert!(validate_transition(from, WorkStatus::Closed).is_err());
        }
    }
}
