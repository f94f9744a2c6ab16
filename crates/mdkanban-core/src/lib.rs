//! Markdown checklist model for kanban boards.
//!
//! Tasks live as `- [ ]` lines in Markdown files. This crate parses them into
//! trees, renders them back, groups them into status columns with fractional
//! ordering, and computes the next instance of repeating tasks. Everything
//! here is pure: file access and state handling live in `mdkanban-app`.

/// Completion pipeline.
pub mod complete;
/// Error types.
pub mod error;
/// Identifier types.
pub mod id;
/// Column grouping and ordering.
pub mod kanban;
/// Markdown rendering.
pub mod markdown;
/// Line and file parsing.
pub mod parser;
/// File reconciliation.
pub mod reconcile;
/// Repeat rules.
pub mod repeat;
/// Task and note trees.
pub mod task;
/// Annotation value types.
pub mod value;

pub use complete::{CompletionRules, complete_task};
pub use error::{ItemError, OrderingError, ParseError, RepeatError, StructureError};
pub use id::TaskId;
pub use kanban::{KanbanMap, create_kanban_map, find_end_position, find_position, move_task};
pub use markdown::{task_line, to_markdown};
pub use parser::{FileProblem, ListItem, ParsedFile, parse_file, parse_task_line};
pub use reconcile::{changed_tasks, externally_completed, merge_file_tasks, remove_tasks_for_file, rename_file};
pub use repeat::{get_next_repeat_date, get_next_repeating_task, is_task_repeating};
pub use task::{Note, Task};
pub use value::{StatusTag, Tag};
