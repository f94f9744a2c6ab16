//! Canonical Markdown rendering of task trees.

use crate::task::{Note, Task};

/// Render a task (and everything nested below it) as Markdown.
///
/// A generated predecessor in [`Task::before`] is rendered first, at the same depth.
#[must_use]
pub fn to_markdown(task: &Task) -> String {
    let mut out = Vec::new();
    push_task(&mut out, task, 0);
    out.join("\n")
}

fn push_task(out: &mut Vec<String>, task: &Task, depth: usize) {
    if let Some(before) = task.before.as_deref() {
        push_task(out, before, depth);
    }
    out.push(format!("{}{}", indent(depth), task_line(task)));
    for subtask in &task.subtasks {
        push_task(out, subtask, depth + 1);
    }
    for note in &task.notes {
        push_note(out, note, depth + 1);
    }
}

fn push_note(out: &mut Vec<String>, note: &Note, depth: usize) {
    out.push(format!("{}- {}", indent(depth), note.text));
    for sub in &note.subnotes {
        push_note(out, sub, depth + 1);
    }
}

fn indent(depth: usize) -> String {
    "\t".repeat(depth)
}

/// Render only the task's own line, without children or predecessor.
#[must_use]
pub fn task_line(task: &Task) -> String {
    let marker = if task.completed { "- [x]" } else { "- [ ]" };
    let mut parts = vec![marker.to_owned()];
    if !task.description.is_empty() {
        parts.push(task.description.to_string());
    }
    parts.extend(task.tags.iter().map(ToString::to_string));
    parts.extend(
        task.dataview_fields
            .iter()
            .map(|(key, value)| format!("[{key}:: {value}]")),
    );
    if let Some(due) = task.due_on {
        parts.push(format!("@due({due})"));
    }
    if let Some(completed) = task.completed_on {
        parts.push(format!("@completed({completed})"));
    }
    parts.join(" ")
}
