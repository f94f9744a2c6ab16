//! Completion pipeline shared by board actions and external edits.

use regex::Regex;
use time::{Date, OffsetDateTime};

use crate::error::RepeatError;
use crate::repeat::{get_next_repeating_task, is_task_repeating};
use crate::task::Task;
use crate::value::{CompletedOn, Description, POSITION_FIELD, REPEAT_FIELD, StatusTag};

/// Settings-driven parts of completing a task.
#[derive(Debug, Clone, Default)]
pub struct CompletionRules {
    /// Status tags stripped from a completed task.
    pub status_tags: Vec<StatusTag>,
    /// Text removed from the description on completion.
    pub remove: Option<Regex>,
}

/// Complete `task`.
///
/// The completed copy is stamped with `now` (unless it already has a
/// timestamp), loses its status tags, position and any dangling `repeat`
/// field, and has the remove pattern cut from its description. A repeating task instead yields its next
/// instance, which keeps status and position and carries the completed copy as
/// [`Task::before`].
///
/// # Errors
/// Propagates [`RepeatError::Parse`] for a malformed repeat rule.
pub fn complete_task(
    task: &Task,
    rules: &CompletionRules,
    now: OffsetDateTime,
    today: Date,
) -> Result<Task, RepeatError> {
    let done = task.mutate(|t| {
        t.completed = true;
        t.completed_on.get_or_insert(CompletedOn(now));
        for status in &rules.status_tags {
            t.tags.remove(&status.tag);
        }
        t.dataview_fields.remove(POSITION_FIELD);
        if let Some(remove) = &rules.remove {
            t.description = Description::new(&remove.replace_all(t.description.as_str(), " "));
        }
    });

    if !is_task_repeating(task) {
        // A rule without a due date never fires; dropping it ends the cycle.
        return Ok(done.mutate(|t| {
            t.dataview_fields.remove(REPEAT_FIELD);
        }));
    }
    let spawned = get_next_repeating_task(&done, today)?;
    let predecessor = spawned.before.clone();
    // The next instance keeps the board placement of the task as it was.
    Ok(task.mutate(|t| {
        t.due_on = spawned.due_on;
        t.completed = false;
        t.completed_on = None;
        t.before = predecessor;
    }))
}
