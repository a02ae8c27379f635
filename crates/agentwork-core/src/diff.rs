//! Snapshot diffing for reconciliation with external writers.

use std::collections::HashMap;

use crate::event::ChangeEvent;
use crate::work::Work;

/// Compare two snapshots by id and describe the difference as external events.
///
/// - ids only in `new` become create events, in `new` order
/// - ids in both whose tracked fields differ become update events
/// - ids only in `old` become delete events, in `old` order
///
/// `created_at` and `type` are not tracked; any other field difference,
/// including `updated_at`, counts as an update.
#[must_use]
pub fn diff_snapshots(old: &[Work], new: &[Work]) -> Vec<ChangeEvent> {
    let old_by_id: HashMap<&str, &Work> = old.iter().map(|w| (w.id.as_str(), w)).collect();
    let new_by_id: HashMap<&str, &Work> = new.iter().map(|w| (w.id.as_str(), w)).collect();

    let mut events = Vec::new();

    for work in new {
        match old_by_id.get(work.id.as_str()) {
            None => events.push(ChangeEvent::created(work.clone()).external()),
            Some(previous) if tracked_fields_differ(previous, work) => {
                events.push(ChangeEvent::updated((*previous).clone(), work.clone()).external());
            }
            Some(_) => {}
        }
    }

    for work in old {
        if !new_by_id.contains_key(work.id.as_str()) {
            events.push(ChangeEvent::deleted(work.clone()).external());
        }
    }

    events
}

fn tracked_fields_differ(a: &Work, b: &Work) -> bool {
    a.title != b.title
        || a.body != b.body
        || a.agent_role_id != b.agent_role_id
        || a.status != b.status
        || a.session_id != b.session_id
        || a.parent_id != b.parent_id
        || a.updated_at != b.updated_at
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::event::ChangeOperation;
    use crate::work::{NewWork, WorkStatus};
    use chrono::{Duration, Utc};

    fn story(title: &str) -> Work {
        NewWork::story(title, "lead").into_work("lead".into(), Utc::now())
    }

    #[test]
    fn test_identical_snapshots_yield_nothing() {
        let items = vec![story("a"), story("b")];
        assert!(diff_snapshots(&items, &items.clone()).is_empty());
    }

    #[test]
    fn test_create_update_delete() {
        let kept = story("kept");
        let removed = story("removed");
        let added = story("added");

        let mut changed = kept.clone();
        changed.status = WorkStatus::InProgress;
        changed.session_id = Some("s1".into());
        changed.updated_at += Duration::seconds(1);

        let events = diff_snapshots(&[kept, removed.clone()], &[changed, added.clone()]);
        let ops: Vec<_> = events.iter().map(|e| (e.operation, e.work.id.clone())).collect();

        assert_eq!(events.len(), 3);
        assert!(events.iter().all(|e| e.external));
        assert!(ops.contains(&(ChangeOperation::Create, added.id)));
        assert!(ops.contains(&(ChangeOperation::Delete, removed.id)));
        assert!(events[0].became(WorkStatus::InProgress));
    }

    #[test]
    fn test_updated_at_alone_counts() {
        let before = story("a");
        let mut after = before.clone();
        after.updated_at += Duration::milliseconds(5);

        let events = diff_snapshots(&[before], &[after]);
        assert_eq!(events.len(), 1);
        assert_eq!(events[0].operation, ChangeOperation::Update);
    }
}
