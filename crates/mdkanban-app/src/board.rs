//! Board state machine.
//!
//! [`reduce`] is pure: it takes the current [`BoardState`] and one [`Action`]
//! and returns the next state together with the [`TaskWrite`]s the vault
//! boundary has to apply. Time enters through the actions that complete
//! tasks, never through a clock read.

use std::collections::BTreeMap;
use std::ops::RangeInclusive;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use mdkanban_core::{
    FileProblem, KanbanMap, OrderingError, ParsedFile, RepeatError, Tag, Task, TaskId, complete_task,
    create_kanban_map, externally_completed, merge_file_tasks, move_task, remove_tasks_for_file,
    rename_file, task_line, to_markdown,
};
use thiserror::Error;
use time::OffsetDateTime;
use tracing::{debug, info, warn};

use crate::settings::BoardSettings;

/// Failure of a board action. The previous state stays current.
#[derive(Debug, Error)]
pub enum BoardError {
    /// Ordering failed, e.g. the `before` task is not in the target column.
    #[error(transparent)]
    Ordering(#[from] OrderingError),
    /// A repeating task carries a rule that cannot be applied.
    #[error(transparent)]
    Repeat(#[from] RepeatError),
    /// No column is configured for the requested tag.
    #[error("no column is configured for {0}")]
    UnknownStatus(Tag),
}

/// Replacement text for a span of lines in one file.
///
/// Board actions only ever change a root task's own line, so the span of a
/// task write is that line. Nested items and any text between them stay in
/// the file untouched; a generated predecessor is inserted as a block in
/// front of the rewritten line.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TaskWrite {
    /// Vault-relative file.
    pub file: PathBuf,
    /// Lines replaced, inclusive.
    pub lines: RangeInclusive<usize>,
    /// Unindented Markdown that takes their place.
    pub markdown: String,
}

impl TaskWrite {
    fn for_task(task: &Task) -> Self {
        let line = task.file_position.line;
        let own = task_line(task);
        let markdown = match task.before.as_deref() {
            Some(before) => format!("{}\n{own}", to_markdown(before)),
            None => own,
        };
        Self {
            file: task.file.clone(),
            lines: line..=line,
            markdown,
        }
    }

    /// True when applying the write would leave the task's line as it was.
    fn is_noop(task: &Task) -> bool {
        task.before.is_none()
            && task
                .original
                .as_deref()
                .is_some_and(|original| task_line(original) == task_line(task))
    }
}

/// Everything the board knows.
#[derive(Debug, Clone, Default)]
pub struct BoardState {
    /// Active settings.
    pub settings: Arc<BoardSettings>,
    /// Root tasks of every loaded file.
    pub tasks: Vec<Task>,
    /// Status columns derived from [`tasks`](Self::tasks).
    pub board: KanbanMap,
    /// Items that failed to parse, per file.
    pub problems: BTreeMap<PathBuf, Vec<FileProblem>>,
}

impl BoardState {
    /// Empty board using `settings`.
    #[must_use]
    pub fn new(settings: BoardSettings) -> Self {
        let board = create_kanban_map(&[], &settings.status_tags);
        Self {
            settings: Arc::new(settings),
            tasks: Vec::new(),
            board,
            problems: BTreeMap::new(),
        }
    }

    /// Root task with `id`.
    #[must_use]
    pub fn task(&self, id: TaskId) -> Option<&Task> {
        self.tasks.iter().find(|task| task.id == id)
    }

    fn replace(&mut self, task: Task) {
        if let Some(slot) = self.tasks.iter_mut().find(|slot| slot.id == task.id) {
            *slot = task;
        }
    }

    fn set_problems(&mut self, file: PathBuf, problems: Vec<FileProblem>) {
        if problems.is_empty() {
            self.problems.remove(&file);
        } else {
            self.problems.insert(file, problems);
        }
    }
}

/// Something that happened to the vault or a request from the user.
#[derive(Debug, Clone)]
pub enum Action {
    /// A file was read for the first time.
    FileLoaded {
        /// Vault-relative path.
        file: PathBuf,
        /// Parse result.
        parsed: ParsedFile,
    },
    /// A known file changed on disk.
    FileModified {
        /// Vault-relative path.
        file: PathBuf,
        /// Parse result of the new content.
        parsed: ParsedFile,
        /// When the change was seen; stamps tasks completed outside the board.
        at: OffsetDateTime,
    },
    /// A file disappeared.
    FileDeleted {
        /// Vault-relative path.
        file: PathBuf,
    },
    /// A file moved.
    FileRenamed {
        /// Old path.
        from: PathBuf,
        /// New path.
        to: PathBuf,
    },
    /// Put a task into a column, optionally before another task.
    MoveTask {
        /// Task to move.
        id: TaskId,
        /// Target column.
        status: Tag,
        /// Task to land in front of; end of column when absent.
        before: Option<TaskId>,
    },
    /// Tick a task off.
    CompleteTask {
        /// Task to complete.
        id: TaskId,
        /// Completion time.
        at: OffsetDateTime,
    },
    /// New settings were saved.
    SettingsChanged(BoardSettings),
}

/// Result of one [`reduce`] step.
#[derive(Debug, Clone)]
pub struct Transition {
    /// State after the action.
    pub state: BoardState,
    /// File edits the action implies.
    pub writes: Vec<TaskWrite>,
}

/// Apply `action` to `state`.
///
/// After the action the board is regrouped; tasks that were changed, including
/// those that only received a fresh position, are turned into writes and the
/// stored copies are marked clean.
///
/// # Errors
/// Move and completion failures; `state` is left untouched by the caller.
pub fn reduce(state: &BoardState, action: Action) -> Result<Transition, BoardError> {
    let mut next = state.clone();
    match action {
        Action::FileLoaded { file, parsed } => {
            if next.settings.is_ignored(&file) {
                debug!(file = %file.display(), "ignored file");
            } else {
                next.tasks = merge_file_tasks(&next.tasks, &file, parsed.tasks);
                next.set_problems(file, parsed.problems);
            }
        }
        Action::FileModified { file, parsed, at } => {
            if next.settings.is_ignored(&file) {
                debug!(file = %file.display(), "ignored file");
            } else {
                debug!(file = %file.display(), tasks = parsed.tasks.len(), "file modified");
                next.tasks = merge_file_tasks(&next.tasks, &file, parsed.tasks);
                next.set_problems(file.clone(), parsed.problems);
                complete_external(&mut next, &file, at);
            }
        }
        Action::FileDeleted { file } => {
            next.tasks = remove_tasks_for_file(&next.tasks, &file);
            next.problems.remove(&file);
        }
        Action::FileRenamed { from, to } => {
            let problems = next.problems.remove(&from);
            if next.settings.is_ignored(&to) {
                next.tasks = remove_tasks_for_file(&next.tasks, &from);
            } else {
                next.tasks = rename_file(&next.tasks, &from, &to);
                if let Some(problems) = problems {
                    next.problems.insert(to, problems);
                }
            }
        }
        Action::MoveTask { id, status, before } => {
            let target = next
                .settings
                .status_for(&status)
                .ok_or_else(|| BoardError::UnknownStatus(status.clone()))?;
            let task = next.task(id).ok_or(OrderingError::TaskDoesNotExist(id))?;
            let column = next.board.get(target).map_or(&[][..], Vec::as_slice);
            let moved = move_task(task, column, target, before, &next.settings.status_tags)?;
            info!(task = %id, status = %status, "moved task");
            next.replace(moved);
        }
        Action::CompleteTask { id, at } => {
            let task = next.task(id).ok_or(OrderingError::TaskDoesNotExist(id))?;
            let done = complete_task(task, &next.settings.completion_rules(), at, at.date())?;
            info!(task = %id, "completed task");
            next.replace(done);
        }
        Action::SettingsChanged(settings) => {
            next.settings = Arc::new(settings);
            let ignored: Vec<PathBuf> = next
                .tasks
                .iter()
                .map(|task| task.file.clone())
                .filter(|file| next.settings.is_ignored(file))
                .collect();
            for file in ignored {
                next.tasks = remove_tasks_for_file(&next.tasks, &file);
                next.problems.remove(&file);
            }
        }
    }
    Ok(settle(next))
}

/// Run completed-but-still-active tasks of `file` through the completion pipeline.
///
/// A task whose completion fails stays as parsed and is recorded as a problem
/// of the file; its siblings are still completed.
fn complete_external(state: &mut BoardState, file: &Path, at: OffsetDateTime) {
    let rules = state.settings.completion_rules();
    let file_tasks: Vec<Task> = state
        .tasks
        .iter()
        .filter(|task| task.file == file)
        .cloned()
        .collect();
    let mut done = Vec::new();
    let mut failed = Vec::new();
    for task in externally_completed(&file_tasks, &state.settings.status_tags) {
        match complete_task(task, &rules, at, at.date()) {
            Ok(completed) => done.push(completed),
            Err(error) => {
                let line = task.file_position.line;
                warn!(file = %file.display(), line, %error, "cannot complete task ticked off outside the board");
                failed.push(FileProblem {
                    line,
                    error: error.into(),
                });
            }
        }
    }
    if !done.is_empty() {
        info!(file = %file.display(), count = done.len(), "completed tasks ticked off outside the board");
    }
    for task in done {
        state.replace(task);
    }
    if !failed.is_empty() {
        let problems = state.problems.entry(file.to_path_buf()).or_default();
        problems.extend(failed);
        problems.sort_by_key(|problem| problem.line);
    }
}

/// Regroup the board and turn every modified task into a write.
fn settle(mut state: BoardState) -> Transition {
    let upserted: Vec<Task> = create_kanban_map(&state.tasks, &state.settings.status_tags)
        .into_values()
        .flatten()
        .filter(Task::is_modified)
        .collect();
    for task in upserted {
        state.replace(task);
    }

    let mut writes = Vec::new();
    for task in state.tasks.iter_mut().filter(|task| task.is_modified()) {
        if !TaskWrite::is_noop(task) {
            writes.push(TaskWrite::for_task(task));
        }
        // The write carries the predecessor; the stored copy is clean from here on.
        task.original = None;
        task.before = None;
    }
    state.board = create_kanban_map(&state.tasks, &state.settings.status_tags);
    Transition { state, writes }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::list_items::parse_document;
    use crate::vault::splice_writes;
    use mdkanban_core::{ItemError, StatusTag};
    use time::macros::datetime;

    fn settings() -> BoardSettings {
        BoardSettings {
            status_tags: vec![
                StatusTag::new("backlog", "Backlog", false),
                StatusTag::new("doing", "Doing", false),
            ],
            ignore_paths: vec![PathBuf::from("archive")],
            ..BoardSettings::default()
        }
    }

    fn load(state: &BoardState, file: &str, lines: &[&str]) -> Transition {
        let file = PathBuf::from(file);
        let parsed = parse_document(&file, lines);
        reduce(state, Action::FileLoaded { file, parsed }).unwrap_or_else(|err| panic!("load must succeed: {err}"))
    }

    fn column<'a>(state: &'a BoardState, tag: &str) -> Vec<&'a str> {
        state
            .board
            .iter()
            .find(|(status, _)| status.tag == Tag::new(tag))
            .map(|(_, tasks)| tasks.iter().map(|t| t.description.as_str()).collect())
            .unwrap_or_default()
    }

    #[test]
    fn loading_groups_and_writes_fresh_positions() {
        let state = BoardState::new(settings());
        let Transition { state, writes } = load(
            &state,
            "todo.md",
            &["- [ ] first #backlog [pos:: 1]", "- [ ] second #backlog", "- [ ] loose"],
        );
        assert_eq!(column(&state, "backlog"), vec!["first", "second"]);
        assert_eq!(
            writes,
            vec![TaskWrite {
                file: PathBuf::from("todo.md"),
                lines: 1..=1,
                markdown: "- [ ] second #backlog [pos:: 2]".to_owned(),
            }]
        );
        assert!(state.tasks.iter().all(|t| !t.is_modified()));
    }

    #[test]
    fn ignored_files_never_reach_the_board() {
        let state = BoardState::new(settings());
        let Transition { state, writes } = load(&state, "archive/old.md", &["- [ ] old #backlog"]);
        assert!(state.tasks.is_empty());
        assert!(writes.is_empty());
    }

    #[test]
    fn move_before_a_task_in_another_column() {
        let state = BoardState::new(settings());
        let loaded = load(
            &state,
            "b.md",
            &["- [ ] a #doing [pos:: 1]", "- [ ] b #doing [pos:: 2]", "- [ ] m #backlog [pos:: 1]"],
        )
        .state;
        let id = loaded.tasks[2].id;
        let before = Some(loaded.tasks[1].id);

        let Transition { state, writes } = reduce(
            &loaded,
            Action::MoveTask {
                id,
                status: Tag::new("doing"),
                before,
            },
        )
        .unwrap_or_else(|err| panic!("{err}"));
        assert_eq!(column(&state, "doing"), vec!["a", "m", "b"]);
        assert!(column(&state, "backlog").is_empty());
        assert_eq!(writes.len(), 1);
        assert_eq!(writes[0].markdown, "- [ ] m #doing [pos:: 1.5]");
        assert_eq!(writes[0].lines, 2..=2);
    }

    #[test]
    fn failed_move_reports_and_keeps_state() {
        let state = BoardState::new(settings());
        let loaded = load(&state, "b.md", &["- [ ] a #doing [pos:: 1]", "- [ ] m #backlog [pos:: 1]"]).state;
        let stranger = TaskId::new();
        let err = reduce(
            &loaded,
            Action::MoveTask {
                id: loaded.tasks[1].id,
                status: Tag::new("doing"),
                before: Some(stranger),
            },
        );
        assert!(matches!(
            err,
            Err(BoardError::Ordering(OrderingError::BeforeTaskDoesNotExist(id))) if id == stranger
        ));

        let unknown = reduce(
            &loaded,
            Action::MoveTask {
                id: loaded.tasks[1].id,
                status: Tag::new("nowhere"),
                before: None,
            },
        );
        assert!(matches!(unknown, Err(BoardError::UnknownStatus(_))));
    }

    #[test]
    fn completing_writes_the_stripped_task() {
        let state = BoardState::new(settings());
        let loaded = load(&state, "b.md", &["- [ ] ship it #doing [pos:: 1]", "\t- [ ] sub"]).state;
        let Transition { state, writes } = reduce(
            &loaded,
            Action::CompleteTask {
                id: loaded.tasks[0].id,
                at: datetime!(2022-05-01 10:00 UTC),
            },
        )
        .unwrap_or_else(|err| panic!("{err}"));
        assert!(column(&state, "doing").is_empty());
        assert_eq!(
            writes,
            vec![TaskWrite {
                file: PathBuf::from("b.md"),
                lines: 0..=0,
                markdown: "- [x] ship it @completed(2022-05-01T10:00:00Z)".to_owned(),
            }]
        );
    }

    #[test]
    fn external_completion_runs_the_pipeline_once() {
        let state = BoardState::new(settings());
        let file = PathBuf::from("r.md");
        let loaded = load(&state, "r.md", &["- [ ] rent #doing [pos:: 1] [repeat:: monthly: 1] @due(2022-01-03)"]).state;

        let ticked = ["- [x] rent #doing [pos:: 1] [repeat:: monthly: 1] @due(2022-01-03)"];
        let Transition { state, writes } = reduce(
            &loaded,
            Action::FileModified {
                file: file.clone(),
                parsed: parse_document(&file, &ticked),
                at: datetime!(2022-01-03 12:00 UTC),
            },
        )
        .unwrap_or_else(|err| panic!("{err}"));
        assert_eq!(
            writes,
            vec![TaskWrite {
                file: file.clone(),
                lines: 0..=0,
                markdown: "- [x] rent @due(2022-01-03) @completed(2022-01-03T12:00:00Z)\n\
                           - [ ] rent #doing [pos:: 1] [repeat:: monthly: 1] @due(2022-02-03)"
                    .to_owned(),
            }]
        );
        let id = state.tasks[0].id;

        // Re-reading the rewritten file is quiet and keeps the open instance's id.
        let rewritten: Vec<&str> = writes[0].markdown.lines().collect();
        let Transition { state, writes } = reduce(
            &state,
            Action::FileModified {
                file: file.clone(),
                parsed: parse_document(&file, &rewritten),
                at: datetime!(2022-01-03 12:00 UTC),
            },
        )
        .unwrap_or_else(|err| panic!("{err}"));
        assert!(writes.is_empty());
        assert_eq!(column(&state, "doing"), vec!["rent"]);
        assert_eq!(state.tasks.len(), 2);
        assert!(state.tasks.iter().any(|t| t.id == id && !t.completed));
    }

    #[test]
    fn file_events_update_the_partition() {
        let state = BoardState::new(settings());
        let state = load(&state, "a.md", &["- [ ] a #doing [pos:: 1]"]).state;
        let state = load(&state, "b.md", &["- [ ] b #doing [pos:: 2]"]).state;

        let renamed = reduce(
            &state,
            Action::FileRenamed {
                from: PathBuf::from("a.md"),
                to: PathBuf::from("c.md"),
            },
        )
        .unwrap_or_else(|err| panic!("{err}"))
        .state;
        assert!(renamed.tasks.iter().any(|t| t.file == Path::new("c.md")));

        let deleted = reduce(&renamed, Action::FileDeleted { file: PathBuf::from("c.md") })
            .unwrap_or_else(|err| panic!("{err}"))
            .state;
        assert_eq!(column(&deleted, "doing"), vec!["b"]);
    }

    #[test]
    fn settings_change_regroups_and_drops_ignored_files() {
        let state = BoardState::new(settings());
        let state = load(&state, "notes/a.md", &["- [ ] a #review [pos:: 1]"]).state;
        let state = load(&state, "b.md", &["- [ ] b #review [pos:: 1]"]).state;
        assert!(state.board.values().all(Vec::is_empty));

        let mut changed = settings();
        changed.status_tags.push(StatusTag::new("review", "Review", false));
        changed.ignore_paths.push(PathBuf::from("notes"));
        let state = reduce(&state, Action::SettingsChanged(changed))
            .unwrap_or_else(|err| panic!("{err}"))
            .state;
        assert_eq!(column(&state, "review"), vec!["b"]);
        assert_eq!(state.tasks.len(), 1);
    }

    #[test]
    fn parse_problems_are_kept_per_file() {
        let state = BoardState::new(settings());
        let state = load(&state, "p.md", &["- [ ] bad @due(someday)", "- [ ] good #doing"]).state;
        assert_eq!(state.problems.get(Path::new("p.md")).map(Vec::len), Some(1));
        let state = load(&state, "p.md", &["- [ ] good #doing"]).state;
        assert!(state.problems.is_empty());
    }

    fn modify(state: &BoardState, file: &str, lines: &[&str], at: OffsetDateTime) -> Transition {
        let file = PathBuf::from(file);
        let parsed = parse_document(&file, lines);
        reduce(state, Action::FileModified { file, parsed, at }).unwrap_or_else(|err| panic!("modify must succeed: {err}"))
    }

    fn owned(lines: &[&str]) -> Vec<String> {
        lines.iter().map(|line| (*line).to_owned()).collect()
    }

    #[test]
    fn writes_leave_nested_and_unparsed_lines_alone() {
        let lines = [
            "- [ ] parent #doing",
            "  continuation paragraph",
            "",
            "\t```",
            "\t- [ ] not a task inside code",
            "\t```",
            "\t- [ ] bad @due(someday)",
            "\t\t- [ ] under the bad one",
            "\t- [ ] ok",
        ];
        let state = BoardState::new(settings());
        let Transition { state, writes } = load(&state, "p.md", &lines);
        assert_eq!(state.problems.get(Path::new("p.md")).map(Vec::len), Some(1));
        assert_eq!(
            writes,
            vec![TaskWrite {
                file: PathBuf::from("p.md"),
                lines: 0..=0,
                markdown: "- [ ] parent #doing [pos:: 1]".to_owned(),
            }]
        );

        let mut on_disk = owned(&lines);
        let writes: Vec<&TaskWrite> = writes.iter().collect();
        splice_writes(Path::new("p.md"), &mut on_disk, &writes).unwrap_or_else(|err| panic!("{err}"));
        let mut expected = owned(&lines);
        expected[0] = "- [ ] parent #doing [pos:: 1]".to_owned();
        assert_eq!(on_disk, expected);
    }

    #[test]
    fn repeat_with_children_inserts_the_done_copy_above_the_line() {
        let lines = [
            "- [ ] water #doing [pos:: 1] [repeat:: daily: 1] @due(2022-01-03)",
            "\tsome prose about watering",
            "\t- [ ] fill can",
        ];
        let state = BoardState::new(settings());
        let loaded = load(&state, "w.md", &lines).state;
        let Transition { writes, .. } = reduce(
            &loaded,
            Action::CompleteTask {
                id: loaded.tasks[0].id,
                at: datetime!(2022-01-03 08:00 UTC),
            },
        )
        .unwrap_or_else(|err| panic!("{err}"));

        let mut on_disk = owned(&lines);
        let writes: Vec<&TaskWrite> = writes.iter().collect();
        splice_writes(Path::new("w.md"), &mut on_disk, &writes).unwrap_or_else(|err| panic!("{err}"));
        assert_eq!(
            on_disk,
            owned(&[
                "- [x] water @due(2022-01-03) @completed(2022-01-03T08:00:00Z)",
                "\t- [ ] fill can",
                "- [ ] water #doing [pos:: 1] [repeat:: daily: 1] @due(2022-01-04)",
                "\tsome prose about watering",
                "\t- [ ] fill can",
            ])
        );
    }

    #[test]
    fn one_bad_repeat_rule_does_not_block_its_siblings() {
        let state = BoardState::new(settings());
        let loaded = load(
            &state,
            "s.md",
            &[
                "- [ ] a #doing [pos:: 1] [repeat:: fortnightly] @due(2022-01-03)",
                "- [ ] b #doing [pos:: 2]",
                "- [ ] c #doing [pos:: 3]",
            ],
        )
        .state;

        let Transition { state, writes } = modify(
            &loaded,
            "s.md",
            &[
                "- [x] a #doing [pos:: 1] [repeat:: fortnightly] @due(2022-01-03)",
                "- [ ] b edited #doing [pos:: 2]",
                "- [x] c #doing [pos:: 3]",
            ],
            datetime!(2022-01-04 9:00 UTC),
        );

        assert_eq!(column(&state, "doing"), vec!["a", "b edited"]);
        assert_eq!(
            writes,
            vec![TaskWrite {
                file: PathBuf::from("s.md"),
                lines: 2..=2,
                markdown: "- [x] c @completed(2022-01-04T09:00:00Z)".to_owned(),
            }]
        );
        let problems = state
            .problems
            .get(Path::new("s.md"))
            .unwrap_or_else(|| panic!("the failing task must be recorded"));
        assert_eq!(problems.len(), 1);
        assert_eq!(problems[0].line, 0);
        assert!(matches!(problems[0].error, ItemError::Repeat(RepeatError::Parse(_))));
    }

    #[test]
    fn dangling_repeat_rule_settles_after_one_write() {
        let lines = ["- [x] a [repeat:: daily: 1]"];
        let state = BoardState::new(settings());
        let loaded = load(&state, "d.md", &lines).state;

        let at = datetime!(2022-01-02 0:00 UTC);
        let Transition { state, writes } = modify(&loaded, "d.md", &lines, at);
        assert_eq!(writes.len(), 1);
        assert_eq!(writes[0].markdown, "- [x] a @completed(2022-01-02T00:00:00Z)");

        let rewritten: Vec<&str> = writes[0].markdown.lines().collect();
        let Transition { writes, .. } = modify(&state, "d.md", &rewritten, at);
        assert!(writes.is_empty());
    }

    #[test]
    fn unchanged_lines_produce_no_write() {
        let state = BoardState::new(settings());
        let loaded = load(&state, "n.md", &["- [x] shipped @completed(2021-01-01T00:00:00Z)"]).state;
        let Transition { writes, .. } = reduce(
            &loaded,
            Action::CompleteTask {
                id: loaded.tasks[0].id,
                at: datetime!(2022-05-01 10:00 UTC),
            },
        )
        .unwrap_or_else(|err| panic!("{err}"));
        assert!(writes.is_empty());
    }
}
