//! Recursive checklist item model.

use std::collections::BTreeSet;
use std::path::PathBuf;
use std::sync::Arc;

use crate::id::TaskId;
use crate::value::{
    CompletedOn, DataviewFields, Description, DueOn, FilePosition, POSITION_FIELD, REPEAT_FIELD,
    StatusTag, Tag,
};

/// Checklist item together with its nested subtasks and notes.
#[derive(Debug, Clone)]
pub struct Task {
    /// Identifier minted at parse time.
    pub id: TaskId,
    /// File that holds the task.
    pub file: PathBuf,
    /// Line of the task inside [`file`](Self::file).
    pub file_position: FilePosition,
    /// Text left after annotations are stripped.
    pub description: Description,
    /// `@due(...)` annotation.
    pub due_on: Option<DueOn>,
    /// `@completed(...)` annotation.
    pub completed_on: Option<CompletedOn>,
    /// `#tag` annotations.
    pub tags: BTreeSet<Tag>,
    /// `[key:: value]` annotations.
    pub dataview_fields: DataviewFields,
    /// `- [x]` marker.
    pub completed: bool,
    /// Nested checklist items.
    pub subtasks: Vec<Self>,
    /// Nested plain list items.
    pub notes: Vec<Note>,
    /// Value before the first mutation of this chain.
    pub original: Option<Arc<Self>>,
    /// Predecessor written ahead of this task (e.g. the completed instance of a repeat).
    pub before: Option<Arc<Self>>,
}

impl Task {
    /// Blank, uncompleted task at `file:line`.
    pub fn new(file: impl Into<PathBuf>, line: usize) -> Self {
        Self {
            id: TaskId::new(),
            file: file.into(),
            file_position: FilePosition::new(line),
            description: Description::default(),
            due_on: None,
            completed_on: None,
            tags: BTreeSet::new(),
            dataview_fields: DataviewFields::new(),
            completed: false,
            subtasks: Vec::new(),
            notes: Vec::new(),
            original: None,
            before: None,
        }
    }

    /// Copy-on-write update.
    ///
    /// The first mutation of a chain records the untouched value in
    /// [`original`](Self::original); later mutations keep that first snapshot.
    #[must_use]
    pub fn mutate(&self, change: impl FnOnce(&mut Self)) -> Self {
        let mut next = self.clone();
        if next.original.is_none() {
            next.original = Some(Arc::new(self.clone()));
        }
        change(&mut next);
        next
    }

    /// True once the task went through [`mutate`](Self::mutate).
    #[must_use]
    pub const fn is_modified(&self) -> bool {
        self.original.is_some()
    }

    /// Numeric `pos` field.
    #[must_use]
    pub fn position(&self) -> Option<f64> {
        self.dataview_fields.number(POSITION_FIELD)
    }

    /// Raw `repeat` field, if it holds text.
    #[must_use]
    pub fn repeat_rule(&self) -> Option<&str> {
        self.dataview_fields
            .get(REPEAT_FIELD)
            .and_then(|value| value.as_text())
    }

    /// True when the task carries `tag`.
    #[must_use]
    pub fn has_tag(&self, tag: &Tag) -> bool {
        self.tags.contains(tag)
    }

    /// First configured status the task belongs to.
    #[must_use]
    pub fn status<'a>(&self, status_tags: &'a [StatusTag]) -> Option<&'a StatusTag> {
        status_tags.iter().find(|status| self.has_tag(&status.tag))
    }

    /// Equality that ignores ids at every level of the tree.
    #[must_use]
    pub fn content_eq(&self, other: &Self) -> bool {
        self.file == other.file
            && self.fields_eq(other)
            && self.subtasks.len() == other.subtasks.len()
            && self
                .subtasks
                .iter()
                .zip(&other.subtasks)
                .all(|(a, b)| a.content_eq(b))
    }

    fn fields_eq(&self, other: &Self) -> bool {
        self.description == other.description
            && self.due_on == other.due_on
            && self.tags == other.tags
            && self.dataview_fields == other.dataview_fields
            && self.completed == other.completed
            && self.notes == other.notes
    }

    /// Number of tasks in the tree, this one included.
    #[must_use]
    pub fn count(&self) -> usize {
        1 + self.subtasks.iter().map(Self::count).sum::<usize>()
    }
}

impl PartialEq for Task {
    /// Compares identity and content; `original`, `before`, positions and the
    /// completion timestamp take no part so snapshots never nest into the check.
    fn eq(&self, other: &Self) -> bool {
        self.id == other.id
            && self.file == other.file
            && self.fields_eq(other)
            && self.subtasks == other.subtasks
    }
}

/// Plain list item nested under a task.
#[derive(Debug, Clone)]
pub struct Note {
    /// Text after the list marker.
    pub text: String,
    /// Line of the note.
    pub file_position: FilePosition,
    /// Nested plain list items.
    pub subnotes: Vec<Self>,
}

impl Note {
    /// Note with no children.
    pub fn new(text: impl Into<String>, line: usize) -> Self {
        Self {
            text: text.into(),
            file_position: FilePosition::new(line),
            subnotes: Vec::new(),
        }
    }
}

impl PartialEq for Note {
    fn eq(&self, other: &Self) -> bool {
        self.text == other.text && self.subnotes == other.subnotes
    }
}
