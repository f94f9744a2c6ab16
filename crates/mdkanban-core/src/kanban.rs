//! Column grouping and fractional ordering of tasks.
//!
//! Every status column orders its tasks by the numeric `pos` field. Inserting
//! before a task takes the midpoint between it and its predecessor (or half of
//! its position when it is first), so a move never renumbers the column.
//! Repeated inserts at the same boundary lose float precision; that trade-off
//! is accepted.

use std::cmp::Ordering;

use indexmap::IndexMap;

use crate::error::OrderingError;
use crate::id::TaskId;
use crate::task::Task;
use crate::value::{DataviewField, DataviewValue, POSITION_FIELD, StatusTag, Tag};

/// Board grouping: one entry per configured status, in configured order.
pub type KanbanMap = IndexMap<StatusTag, Vec<Task>>;

/// Group tasks into status columns and order each column.
///
/// A task carrying several status tags lands in the first one configured.
/// `date_sort` columns are ordered by due date with undated tasks first; the
/// others by position with unpositioned tasks last, and those get fresh
/// positions after the current maximum.
#[must_use]
pub fn create_kanban_map(tasks: &[Task], status_tags: &[StatusTag]) -> KanbanMap {
    let mut map: KanbanMap = status_tags
        .iter()
        .map(|status| (status.clone(), Vec::new()))
        .collect();

    for task in tasks {
        if let Some(column) = task.status(status_tags).and_then(|status| map.get_mut(status)) {
            column.push(task.clone());
        }
    }

    for (status, column) in &mut map {
        if status.date_sort {
            column.sort_by_key(|task| task.due_on);
        } else {
            column.sort_by(compare_positions);
            upsert_order(column);
        }
    }
    map
}

fn compare_positions(a: &Task, b: &Task) -> Ordering {
    match (a.position(), b.position()) {
        (Some(a), Some(b)) => a.total_cmp(&b),
        (Some(_), None) => Ordering::Less,
        (None, Some(_)) => Ordering::Greater,
        (None, None) => Ordering::Equal,
    }
}

fn upsert_order(column: &mut [Task]) {
    let mut next = max_position(column.iter());
    for task in column.iter_mut().filter(|task| task.position().is_none()) {
        next += 1.0;
        *task = with_position(task, next);
    }
}

/// Copy of `task` with `pos` set.
#[must_use]
pub fn with_position(task: &Task, position: f64) -> Task {
    task.mutate(|t| {
        t.dataview_fields
            .insert(DataviewField::new(POSITION_FIELD), DataviewValue::Number(position));
    })
}

fn max_position<'a>(tasks: impl Iterator<Item = &'a Task>) -> f64 {
    tasks.filter_map(Task::position).reduce(f64::max).unwrap_or(0.0)
}

/// Position for a task entering `status`, optionally right before `before`.
///
/// The status-filtered list keeps the caller's order; the predecessor of
/// `before` is whatever precedes it in `tasks`.
///
/// # Errors
/// [`OrderingError::BeforeTaskDoesNotExist`] when `before` is not in the column.
pub fn find_position(tasks: &[Task], status: &Tag, before: Option<TaskId>) -> Result<f64, OrderingError> {
    let column: Vec<&Task> = tasks.iter().filter(|task| task.has_tag(status)).collect();
    position_in(&column, before)
}

fn position_in(column: &[&Task], before: Option<TaskId>) -> Result<f64, OrderingError> {
    if column.is_empty() {
        return Ok(1.0);
    }
    let Some(before) = before else {
        return Ok(max_position(column.iter().copied()) + 1.0);
    };
    let index = column
        .iter()
        .position(|task| task.id == before)
        .ok_or(OrderingError::BeforeTaskDoesNotExist(before))?;
    let anchor = column[index].position().unwrap_or(0.0);
    Ok(match index.checked_sub(1) {
        None => anchor / 2.0,
        Some(prev) => {
            let previous = column[prev].position().unwrap_or(0.0);
            previous + (anchor - previous) / 2.0
        }
    })
}

/// Position after every task in `status`.
#[must_use]
pub fn find_end_position(tasks: &[Task], status: &Tag) -> f64 {
    max_position(tasks.iter().filter(|task| task.has_tag(status))) + 1.0
}

/// Move `task` into `status`, optionally before another task.
///
/// `column` is the target column as it stood before the move; the moved task
/// is never its own predecessor. Every configured status tag is removed before
/// the new one is added.
///
/// # Errors
/// [`OrderingError::BeforeTaskDoesNotExist`] when `before` is not in the column.
pub fn move_task(
    task: &Task,
    column: &[Task],
    status: &StatusTag,
    before: Option<TaskId>,
    status_tags: &[StatusTag],
) -> Result<Task, OrderingError> {
    let others: Vec<&Task> = column
        .iter()
        .filter(|other| other.id != task.id && other.has_tag(&status.tag))
        .collect();
    let position = position_in(&others, before)?;
    Ok(task.mutate(|t| {
        for configured in status_tags {
            t.tags.remove(&configured.tag);
        }
        t.tags.insert(status.tag.clone());
        t.dataview_fields
            .insert(DataviewField::new(POSITION_FIELD), DataviewValue::Number(position));
    }))
}
