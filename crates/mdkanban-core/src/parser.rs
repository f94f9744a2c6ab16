//! Line parser and forest builder.

use std::collections::{HashMap, HashSet};
use std::path::{Path, PathBuf};
use std::sync::LazyLock;

use regex::Regex;
use serde::{Deserialize, Serialize};
use tracing::{trace, warn};

use crate::error::{ItemError, ParseError, StructureError};
use crate::task::{Note, Task};
use crate::value::{CompletedOn, DataviewField, DataviewValue, Description, DueOn, Tag};

static DUE: LazyLock<Regex> = LazyLock::new(|| pattern(r"@due\(([^)]*)\)"));
static COMPLETED: LazyLock<Regex> = LazyLock::new(|| pattern(r"@completed\(([^)]*)\)"));
static TAG: LazyLock<Regex> = LazyLock::new(|| pattern(r"(^|\s)#(\p{L}[\w/-]*)"));
static FIELD: LazyLock<Regex> =
    LazyLock::new(|| pattern(r"\[([^\[\]:]+)::\s*([^\[\]]*?)\s*\]"));
static CHECKBOX: LazyLock<Regex> = LazyLock::new(|| pattern(r"^\s*[-*+]\s+\[([ xX])\]"));
static LIST_MARKER: LazyLock<Regex> = LazyLock::new(|| pattern(r"^\s*(?:[-*+]|\d+[.)])\s+"));

#[allow(clippy::expect_used)]
pub(crate) fn pattern(source: &str) -> Regex {
    Regex::new(source).expect("built-in pattern must compile")
}

/// List item record provided by the host renderer (or by a line scanner).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ListItem {
    /// Line the item starts on.
    pub line: usize,
    /// Line of the enclosing list item, if nested.
    pub parent: Option<usize>,
    /// True for `- [ ]` / `- [x]` items.
    pub is_task: bool,
}

/// Problem found on one item while parsing a file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileProblem {
    /// Line of the failing item.
    pub line: usize,
    /// What went wrong.
    pub error: ItemError,
}

/// Root tasks of a file plus the items that had to be skipped.
#[derive(Debug, Clone, Default)]
pub struct ParsedFile {
    /// Root-level tasks in file order.
    pub tasks: Vec<Task>,
    /// Items that failed; their subtrees are left out of [`tasks`](Self::tasks).
    pub problems: Vec<FileProblem>,
}

/// Parse one checklist line into a task.
///
/// # Errors
/// Returns [`ParseError::NotATask`] for lines without a checklist marker and
/// [`ParseError::InvalidDate`] when a date annotation holds malformed text.
/// Missing annotations are not errors.
pub fn parse_task_line(file: &Path, line: usize, raw: &str) -> Result<Task, ParseError> {
    let Some(marker) = CHECKBOX.captures(raw) else {
        return Err(ParseError::NotATask(raw.to_owned()));
    };
    let completed = marker.get(1).is_some_and(|m| m.as_str().eq_ignore_ascii_case("x"));

    let due_on = annotation(&DUE, raw, "due")?
        .map(|text| text.parse::<DueOn>().map_err(|err| invalid_date("due", text, &err)))
        .transpose()?;
    let completed_on = annotation(&COMPLETED, raw, "completed")?
        .map(|text| {
            text.parse::<CompletedOn>()
                .map_err(|err| invalid_date("completed", text, &err))
        })
        .transpose()?;

    let rest = DUE.replace_all(raw, " ");
    let rest = COMPLETED.replace_all(&rest, " ");

    let tags = TAG
        .captures_iter(&rest)
        .filter_map(|caps| caps.get(2))
        .map(|m| Tag::new(m.as_str()))
        .collect();
    let rest = TAG.replace_all(&rest, " ");

    let dataview_fields = FIELD
        .captures_iter(&rest)
        .filter_map(|caps| Some((caps.get(1)?, caps.get(2)?)))
        .map(|(key, value)| (DataviewField::new(key.as_str()), DataviewValue::parse(value.as_str())))
        .collect();
    let rest = FIELD.replace_all(&rest, " ");
    let rest = CHECKBOX.replace(&rest, "");

    let mut task = Task::new(file, line);
    task.description = Description::new(&rest);
    task.due_on = due_on;
    task.completed_on = completed_on;
    task.tags = tags;
    task.dataview_fields = dataview_fields;
    task.completed = completed;
    Ok(task)
}

/// Extract the text between the parentheses of an annotation.
///
/// An absent annotation is only worth a trace line: most tasks have no dates.
fn annotation<'a>(
    regex: &Regex,
    raw: &'a str,
    name: &'static str,
) -> Result<Option<&'a str>, ParseError> {
    let Some(caps) = regex.captures(raw) else {
        trace!(annotation = name, "annotation not present");
        return Ok(None);
    };
    Ok(caps.get(1).map(|m| m.as_str()))
}

fn invalid_date(annotation: &'static str, text: &str, err: &time::error::Parse) -> ParseError {
    ParseError::InvalidDate {
        annotation,
        text: text.to_owned(),
        reason: err.to_string(),
    }
}

/// Parse a plain list line into a note.
#[must_use]
pub fn parse_note_line(line: usize, raw: &str) -> Note {
    Note::new(LIST_MARKER.replace(raw, "").trim_end(), line)
}

enum Slot {
    Task(Task),
    Note(Note),
}

struct Entry {
    slot: Option<Slot>,
    children: Vec<usize>,
}

/// Build the task forest of one file.
///
/// Items whose parent is unknown become roots; notes at the root are dropped.
/// A failing item is reported in [`ParsedFile::problems`] and its subtree is
/// skipped while its siblings are still parsed.
pub fn parse_file<S: AsRef<str>>(file: &Path, lines: &[S], items: &[ListItem]) -> ParsedFile {
    let file: PathBuf = file.to_path_buf();
    let mut entries: Vec<Entry> = Vec::with_capacity(items.len());
    let mut by_line: HashMap<usize, usize> = HashMap::new();
    let mut roots = Vec::new();
    let mut failed: HashSet<usize> = HashSet::new();
    let mut problems = Vec::new();

    for item in items {
        if item.parent.is_some_and(|parent| failed.contains(&parent)) {
            failed.insert(item.line);
            continue;
        }
        let parent = item.parent.and_then(|line| by_line.get(&line).copied());

        let slot = match build_slot(&file, lines, item, parent.map(|idx| &entries[idx])) {
            Ok(Some(slot)) => slot,
            Ok(None) => continue,
            Err(error) => {
                warn!(file = %file.display(), line = item.line, %error, "skipping list item");
                failed.insert(item.line);
                problems.push(FileProblem {
                    line: item.line,
                    error,
                });
                continue;
            }
        };

        let idx = entries.len();
        entries.push(Entry {
            slot: Some(slot),
            children: Vec::new(),
        });
        by_line.insert(item.line, idx);
        match parent {
            Some(parent) => entries[parent].children.push(idx),
            None => roots.push(idx),
        }
    }

    let tasks = roots
        .into_iter()
        .filter_map(|idx| match assemble(&mut entries, idx) {
            Some(Slot::Task(task)) => Some(task),
            _ => None,
        })
        .collect();

    ParsedFile { tasks, problems }
}

fn build_slot<S: AsRef<str>>(
    file: &Path,
    lines: &[S],
    item: &ListItem,
    parent: Option<&Entry>,
) -> Result<Option<Slot>, ItemError> {
    let raw = lines
        .get(item.line)
        .map(AsRef::as_ref)
        .ok_or(StructureError::LineOutOfRange(item.line))?;

    match (item.is_task, parent.and_then(|entry| entry.slot.as_ref())) {
        (true, Some(Slot::Note(note))) => Err(StructureError::SubtaskUnderNote {
            line: item.line,
            parent: note.file_position.line,
        }
        .into()),
        (true, _) => Ok(Some(Slot::Task(parse_task_line(file, item.line, raw)?))),
        (false, Some(_)) => Ok(Some(Slot::Note(parse_note_line(item.line, raw)))),
        // Root-level notes carry no task and are not tracked.
        (false, None) => Ok(None),
    }
}

fn assemble(entries: &mut [Entry], idx: usize) -> Option<Slot> {
    let mut slot = entries[idx].slot.take()?;
    let children = std::mem::take(&mut entries[idx].children);
    for child in children {
        match (&mut slot, assemble(entries, child)) {
            (Slot::Task(task), Some(Slot::Task(sub))) => task.subtasks.push(sub),
            (Slot::Task(task), Some(Slot::Note(note))) => task.notes.push(note),
            (Slot::Note(note), Some(Slot::Note(sub))) => note.subnotes.push(sub),
            (Slot::Note(_), Some(Slot::Task(_))) | (_, None) => {}
        }
    }
    Some(slot)
}
