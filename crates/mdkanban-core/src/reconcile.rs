//! Reconciling freshly parsed files with the task store.

use std::collections::HashMap;
use std::path::Path;

use tracing::debug;

use crate::task::Task;
use crate::value::{REPEAT_FIELD, StatusTag};

/// Newly parsed tasks of `file` that differ from every stored task of that file.
///
/// Ids are ignored. When the store knows nothing about `file` yet the result
/// is empty: a first load is not a change.
#[must_use]
pub fn changed_tasks(file: &Path, new: &[Task], store: &[Task]) -> Vec<Task> {
    let stored: Vec<&Task> = store.iter().filter(|task| task.file == file).collect();
    if stored.is_empty() {
        return Vec::new();
    }
    new.iter()
        .filter(|task| !stored.iter().any(|old| old.content_eq(task)))
        .cloned()
        .collect()
}

/// Drop every task that lives in `file`.
#[must_use]
pub fn remove_tasks_for_file(tasks: &[Task], file: &Path) -> Vec<Task> {
    tasks.iter().filter(|task| task.file != file).cloned().collect()
}

/// Replace the tasks of `file` with `new`, carrying ids over.
///
/// An unchanged task keeps the id of its stored twin; a changed task keeps the
/// id of the stored task that sat on the same line, so an edit in place does
/// not look like a delete plus an insert. Other files are left untouched.
#[must_use]
pub fn merge_file_tasks(store: &[Task], file: &Path, new: Vec<Task>) -> Vec<Task> {
    let mut stored: Vec<Option<&Task>> = store
        .iter()
        .filter(|task| task.file == file)
        .map(Some)
        .collect();
    let mut merged = remove_tasks_for_file(store, file);

    let mut carried: Vec<Task> = Vec::with_capacity(new.len());
    let mut pending: Vec<Task> = Vec::new();
    for task in new {
        let twin = stored
            .iter_mut()
            .find(|slot| slot.is_some_and(|old| old.content_eq(&task)))
            .and_then(Option::take);
        match twin {
            Some(old) => carried.push(adopt_ids(old, task)),
            None => pending.push(task),
        }
    }

    let by_line: HashMap<usize, &Task> = stored
        .iter()
        .flatten()
        .map(|old| (old.file_position.line, *old))
        .collect();
    let changed = pending.len();
    for mut task in pending {
        if let Some(old) = by_line.get(&task.file_position.line) {
            task.id = old.id;
        }
        carried.push(task);
    }
    carried.sort_by_key(|task| task.file_position.line);

    debug!(file = %file.display(), tasks = carried.len(), changed, "merged file tasks");
    merged.extend(carried);
    merged
}

/// Give `new` the ids of its content-equal stored twin, subtree included.
fn adopt_ids(old: &Task, mut new: Task) -> Task {
    new.id = old.id;
    new.subtasks = new
        .subtasks
        .into_iter()
        .zip(&old.subtasks)
        .map(|(sub, old_sub)| adopt_ids(old_sub, sub))
        .collect();
    new
}

/// Point every task of `from` at `to`.
#[must_use]
pub fn rename_file(tasks: &[Task], from: &Path, to: &Path) -> Vec<Task> {
    tasks
        .iter()
        .map(|task| {
            if task.file == from {
                let mut moved = task.clone();
                moved.file = to.to_path_buf();
                moved
            } else {
                task.clone()
            }
        })
        .collect()
}

/// Completed tasks that still look active: they keep a status tag or a repeat rule.
///
/// Such tasks were ticked off outside the board and still need the completion
/// pipeline.
#[must_use]
pub fn externally_completed<'a>(tasks: &'a [Task], status_tags: &[StatusTag]) -> Vec<&'a Task> {
    tasks
        .iter()
        .filter(|task| task.completed)
        .filter(|task| {
            task.status(status_tags).is_some() || task.dataview_fields.contains(REPEAT_FIELD)
        })
        .collect()
}
