//! Error types raised by the parsing, ordering and repeat engines.

use thiserror::Error;

use crate::id::TaskId;

/// A single line could not be turned into a task.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ParseError {
    /// An annotation is present but its date text is malformed.
    #[error("invalid date in @{annotation}({text}): {reason}")]
    InvalidDate {
        /// Annotation name (`due` or `completed`).
        annotation: &'static str,
        /// Text found between the parentheses.
        text: String,
        /// Parser message.
        reason: String,
    },

    /// The line has no `- [ ]` / `- [x]` marker.
    #[error("line is not a checklist item: {0:?}")]
    NotATask(String),
}

/// The item forest could not be assembled as described by the list metadata.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum StructureError {
    /// A checklist item is nested under a plain list item.
    #[error("illegal state: task on line {line} is nested under the note on line {parent}")]
    SubtaskUnderNote {
        /// Line of the offending task.
        line: usize,
        /// Line of the note it was nested under.
        parent: usize,
    },

    /// The metadata points at a line that has no text.
    #[error("list item on line {0} is outside the file")]
    LineOutOfRange(usize),
}

/// Problem recorded for a single item while parsing a file.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ItemError {
    /// Line-level failure.
    #[error(transparent)]
    Parse(#[from] ParseError),
    /// Tree-level failure.
    #[error(transparent)]
    Structure(#[from] StructureError),
    /// A task ticked off outside the board carries an unusable repeat rule.
    #[error(transparent)]
    Repeat(#[from] RepeatError),
}

/// Failure of a kanban ordering operation.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum OrderingError {
    /// The anchor task of an insert-before is not in the target column.
    #[error("task {0} to insert before does not exist in the column")]
    BeforeTaskDoesNotExist(TaskId),

    /// The task to move is unknown.
    #[error("task {0} does not exist")]
    TaskDoesNotExist(TaskId),
}

/// Failure of the repeat-rule engine.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RepeatError {
    /// The repeat field does not follow `<span>(!)?(: <amount>)?`.
    #[error("cannot parse repeat rule {0:?}")]
    Parse(String),

    /// The task lacks a repeat field or a due date.
    #[error("task {0} is not repeating")]
    NotRepeating(TaskId),
}
