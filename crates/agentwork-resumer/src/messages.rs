//! Text of the automatic follow-up messages.

use agentwork_core::{Work, WorkType};

/// Nudge for an agent that went idle while its item is still `in_progress`.
#[must_use]
pub fn continuation_message(work: &Work, attempt: u32, max_attempts: u32) -> String {
    let header = format!(
        "[auto-resume {attempt}/{max_attempts}] {kind} \"{title}\" ({id}) is still in progress.",
        kind = work.work_type,
        title = work.title,
        id = work.id,
    );

    match work.work_type {
        WorkType::Task => format!(
            "{header}\nIf the task is complete, call done now. \
             Otherwise finish the remaining work and then call done."
        ),
        WorkType::Story => format!(
            "{header}\nContinue coordinating: start the next open task, or mark the story \
             done once every task is finished. Do not implement tasks yourself."
        ),
    }
}

/// Wake-up for a coordinator whose child just closed.
#[must_use]
pub fn reactivation_message(parent: &Work, child: &Work) -> String {
    format!(
        "{child_kind} \"{child_title}\" ({child_id}) is complete.\n\
         Review its result, then either continue with the next task of \"{parent_title}\" \
         or mark {parent_kind} {parent_id} done again.",
        child_kind = capitalize(child.work_type),
        child_title = child.title,
        child_id = child.id,
        parent_title = parent.title,
        parent_kind = parent.work_type,
        parent_id = parent.id,
    )
}

fn capitalize(work_type: WorkType) -> &'static str {
    match work_type {
        WorkType::Story => "Story",
        WorkType::Task => "Task",
    }
}
