//! Auto-close cascade.
//!
//! An item at `done` whose children are all `done` or `closed` (or that has no
//! children) is promoted to `closed`. Promotion then propagates to a `done`
//! parent, and so on up the hierarchy.

use chrono::{DateTime, Utc};

use crate::work::{Work, WorkStatus};

/// Upper bound on ancestors visited, so corrupted or cyclic parent links
/// cannot loop forever.
pub const MAX_CASCADE_DEPTH: usize = 32;

/// Close `id` and its ancestors where eligible.
///
/// Returns the ids promoted to `closed`, nearest first. Stops at the first
/// item that is not `done` or still has incomplete children.
pub fn auto_close(items: &mut [Work], id: &str, now: DateTime<Utc>) -> Vec<String> {
    let mut closed = Vec::new();
    let mut current = id.to_string();

    for _ in 0..MAX_CASCADE_DEPTH {
        let Some(idx) = items.iter().position(|w| w.id == current) else {
            break;
        };
        if items[idx].status != WorkStatus::Done || has_pending_children(items, &current) {
            break;
        }

        items[idx].status = WorkStatus::Closed;
        items[idx].touch(now);
        closed.push(current.clone());

        match items[idx].parent() {
            Some(parent_id) => current = parent_id.to_string(),
            None => break,
        }
    }

    closed
}

fn has_pending_children(items: &[Work], id: &str) -> bool {
    items
        .iter()
        .any(|w| w.parent() == Some(id) && !w.status.is_complete())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::work::NewWork;
    use pretty_assertions::assert_eq;

    fn story(status: WorkStatus) -> Work {
        let mut w = NewWork::story("Story", "lead").into_work("lead".into(), Utc::now());
        w.status = status;
        w
    }

    fn task(parent: &Work, status: WorkStatus) -> Work {
        let mut w = NewWork::task(&parent.id, "Task").into_work("lead".into(), Utc::now());
        w.status = status;
        w
    }

    #[test]
    fn test_childless_done_closes() {
        let s = story(WorkStatus::Done);
        let id = s.id.clone();
        let mut items = vec![s];

        assert_eq!(auto_close(&mut items, &id, Utc::now()), vec![id]);
        assert_eq!(items[0].status, WorkStatus::Closed);
    }

    #[test]
    fn test_pending_child_blocks_close() {
        let s = story(WorkStatus::Done);
        let t = task(&s, WorkStatus::Open);
        let id = s.id.clone();
        let mut items = vec![s, t];

        assert!(auto_close(&mut items, &id, Utc::now()).is_empty());
        assert_eq!(items[0].status, WorkStatus::Done);
    }

    #[test]
    fn test_last_child_cascades_to_parent() {
        let s = story(WorkStatus::Done);
        let first = task(&s, WorkStatus::Closed);
        let last = task(&s, WorkStatus::Done);
        let (story_id, last_id) = (s.id.clone(), last.id.clone());
        let mut items = vec![s, first, last];

        let closed = auto_close(&mut items, &last_id, Utc::now());
        assert_eq!(closed, vec![last_id, story_id]);
        assert!(items.iter().all(|w| w.status == WorkStatus::Closed));
    }

    #[test]
    fn test_parent_not_done_is_untouched() {
        let s = story(WorkStatus::InProgress);
        let t = task(&s, WorkStatus::Done);
        let task_id = t.id.clone();
        let mut items = vec![s, t];

        assert_eq!(auto_close(&mut items, &task_id, Utc::now()), vec![task_id]);
        assert_eq!(items[0].status, WorkStatus::InProgress);
    }

    #[test]
    fn test_cyclic_links_are_bounded() {
        let mut a = story(WorkStatus::Done);
        let mut b = story(WorkStatus::Done);
        a.parent_id = Some(b.id.clone());
        b.parent_id = Some(a.id.clone());
        let id = a.id.clone();
        let mut items = vec![a, b];

        // Both close, then the loop finds `a` already closed and stops.
        assert_eq!(auto_close(&mut items, &id, Utc::now()).len(), 2);
    }
}
