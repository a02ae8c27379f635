//! Work item model.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Deserializer, Serialize};
use std::fmt;
use std::str::FromStr;
use uuid::Uuid;

use crate::error::CoreError;

/// Kind of work item.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WorkType {
    /// Coordinator item that owns child tasks. Always top-level.
    Story,
    /// Leaf item executed by a single agent.
    Task,
}

impl fmt::Display for WorkType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Story => write!(f, "story"),
            Self::Task => write!(f, "task"),
        }
    }
}

impl FromStr for WorkType {
    type Err = CoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "story" => Ok(Self::Story),
            "task" => Ok(Self::Task),
            _ => Err(CoreError::UnknownValue {
                kind: "work type",
                value: s.to_string(),
            }),
        }
    }
}

/// Lifecycle status of a work item.
///
/// ```text
/// open --start--> in_progress
/// in_progress --done--> done
/// in_progress --rollback--> open
/// done --reactivate--> in_progress
/// done --(all children done/closed)--> closed
/// ```
///
/// `Closed` is terminal and only ever produced by the auto-close cascade.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WorkStatus {
    Open,
    InProgress,
    Done,
    Closed,
}

impl WorkStatus {
    /// All statuses, in lifecycle order.
    pub const ALL: [Self; 4] = [Self::Open, Self::InProgress, Self::Done, Self::Closed];

    /// Whether a caller may move an item from `self` to `to`.
    #[must_use]
    pub const fn can_transition_to(self, to: Self) -> bool {
        matches!(
            (self, to),
            (Self::Open, Self::InProgress)
                | (Self::InProgress, Self::Open | Self::Done)
                | (Self::Done, Self::InProgress)
        )
    }

    /// `done` or `closed`: the item no longer blocks its parent.
    #[must_use]
    pub const fn is_complete(self) -> bool {
        matches!(self, Self::Done | Self::Closed)
    }
}

impl fmt::Display for WorkStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Open => write!(f, "open"),
            Self::InProgress => write!(f, "in_progress"),
            Self::Done => write!(f, "done"),
            Self::Closed => write!(f, "closed"),
        }
    }
}

impl FromStr for WorkStatus {
    type Err = CoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().replace('-', "_").as_str() {
            "open" => Ok(Self::Open),
            "in_progress" => Ok(Self::InProgress),
            "done" => Ok(Self::Done),
            "closed" => Ok(Self::Closed),
            _ => Err(CoreError::UnknownValue {
                kind: "status",
                value: s.to_string(),
            }),
        }
    }
}

/// A story or task tracked by the store.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Work {
    /// Unique, time-ordered identifier (e.g. "w_0192f5e3...").
    pub id: String,

    #[serde(rename = "type")]
    pub work_type: WorkType,

    /// Owning story for tasks; always absent for stories.
    #[serde(
        default,
        skip_serializing_if = "Option::is_none",
        deserialize_with = "empty_as_none"
    )]
    pub parent_id: Option<String>,

    /// Agent role that executes this item.
    pub agent_role_id: String,

    pub title: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub body: Option<String>,

    pub status: WorkStatus,

    /// Live agent session bound to this item while it is being worked on.
    #[serde(
        default,
        skip_serializing_if = "Option::is_none",
        deserialize_with = "empty_as_none"
    )]
    pub session_id: Option<String>,

    /// Creation timestamp (RFC 3339 UTC).
    pub created_at: DateTime<Utc>,

    /// Last update timestamp (RFC 3339 UTC).
    pub updated_at: DateTime<Utc>,
}

impl Work {
    /// Generate a fresh, lexicographically time-ordered id.
    #[must_use]
    pub fn generate_id() -> String {
        format!("w_{}", Uuid::now_v7().as_simple())
    }

    /// The bound session, if any.
    #[must_use]
    pub fn session(&self) -> Option<&str> {
        self.session_id.as_deref().filter(|s| !s.is_empty())
    }

    /// The parent id, if any.
    #[must_use]
    pub fn parent(&self) -> Option<&str> {
        self.parent_id.as_deref().filter(|s| !s.is_empty())
    }

    #[must_use]
    pub fn is_story(&self) -> bool {
        self.work_type == WorkType::Story
    }

    /// Touch the `updated_at` timestamp.
    pub fn touch(&mut self, now: DateTime<Utc>) {
        self.updated_at = now;
    }
}

/// Input for creating a work item.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewWork {
    pub work_type: WorkType,
    pub parent_id: Option<String>,
    /// Required for stories; tasks inherit their parent's role when absent.
    pub agent_role_id: Option<String>,
    pub title: String,
    pub body: Option<String>,
}

impl NewWork {
    /// A top-level story executed by `agent_role_id`.
    #[must_use]
    pub fn story(title: impl Into<String>, agent_role_id: impl Into<String>) -> Self {
        Self {
            work_type: WorkType::Story,
            parent_id: None,
            agent_role_id: Some(agent_role_id.into()),
            title: title.into(),
            body: None,
        }
    }

    /// A task under `parent_id`, inheriting the parent's role unless overridden.
    #[must_use]
    pub fn task(parent_id: impl Into<String>, title: impl Into<String>) -> Self {
        Self {
            work_type: WorkType::Task,
            parent_id: Some(parent_id.into()),
            agent_role_id: None,
            title: title.into(),
            body: None,
        }
    }

    #[must_use]
    pub fn with_role(mut self, agent_role_id: impl Into<String>) -> Self {
        self.agent_role_id = Some(agent_role_id.into());
        self
    }

    #[must_use]
    pub fn with_body(mut self, body: impl Into<String>) -> Self {
        self.body = Some(body.into());
        self
    }

    /// Build the stored item: fresh id, `open`, both timestamps set to `now`.
    #[must_use]
    pub fn into_work(self, agent_role_id: String, now: DateTime<Utc>) -> Work {
        Work {
            id: Work::generate_id(),
            work_type: self.work_type,
            parent_id: self.parent_id.filter(|p| !p.is_empty()),
            agent_role_id,
            title: self.title,
            body: self.body,
            status: WorkStatus::Open,
            session_id: None,
            created_at: now,
            updated_at: now,
        }
    }
}

fn empty_as_none<'de, D>(deserializer: D) -> Result<Option<String>, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Option::<String>::deserialize(deserializer)?;
    Ok(value.filter(|s| !s.is_empty()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_transition_table() {
        use WorkStatus::{Closed, Done, InProgress, Open};
        let allowed = [(Open, InProgress), (InProgress, Open), (InProgress, Done), (Done, InProgress)];

        for from in WorkStatus::ALL {
            for to in WorkStatus::ALL {
                assert_eq!(
                    from.can_transition_to(to),
                    allowed.contains(&(from, to)),
                    "{from} -> {to}"
                );
            }
        }
    }

    #[test]
    fn test_closed_is_terminal() {
        for to in WorkStatus::ALL {
            assert!(!WorkStatus::Closed.can_transition_to(to));
        }
    }

    #[test]
    fn test_parse_status_and_type() {
        assert_eq!("in-progress".parse::<WorkStatus>().unwrap(), WorkStatus::InProgress);
        assert_eq!("DONE".parse::<WorkStatus>().unwrap(), WorkStatus::Done);
        assert_eq!("Story".parse::<WorkType>().unwrap(), WorkType::Story);
        assert!("epic".parse::<WorkType>().is_err());
    }

    #[test]
    fn test_ids_are_time_ordered() {
        let first = Work::generate_id();
        let second = Work::generate_id();
        assert!(first.starts_with("w_"));
        assert_ne!(first, second);
        // The leading 48 bits are the millisecond timestamp.
        assert!(first[2..14] <= second[2..14]);
    }

    #[test]
    fn test_new_task_defaults() {
        let now = Utc::now();
        let work = NewWork::task("w_parent", "Write tests").into_work("dev".into(), now);

        assert_eq!(work.work_type, WorkType::Task);
        assert_eq!(work.parent(), Some("w_parent"));
        assert_eq!(work.status, WorkStatus::Open);
        assert_eq!(work.session(), None);
        assert_eq!(work.created_at, work.updated_at);
    }

    #[test]
    fn test_serialized_shape() {
        let now = Utc::now();
        let work = NewWork::story("Ship it", "lead").into_work("lead".into(), now);
        let json = serde_json::to_string(&work).unwrap();

        assert!(json.contains(r#""type":"story""#));
        assert!(json.contains(r#""status":"open""#));
        assert!(!json.contains("parent_id"));
        assert!(!json.contains("session_id"));
    }

    #[test]
    fn test_empty_session_on_disk_reads_as_none() {
        let json = r#"{
            "id": "w_1", "type": "task", "parent_id": "w_0", "agent_role_id": "dev",
            "title": "t", "status": "open", "session_id": "",
            "created_at": "2025-01-01T00:00:00Z", "updated_at": "2025-01-01T00:00:00Z"
        }"#;
        let work: Work = serde_json::from_str(json).unwrap();
        assert_eq!(work.session_id, None);
        assert_eq!(work.parent(), Some("w_0"));
    }
}
