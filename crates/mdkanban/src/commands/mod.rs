//! Command handlers.

use std::fmt::Write as _;
use std::path::{Path, PathBuf};
use std::str::FromStr;

use anyhow::{Context, Result, bail};
use mdkanban_app::{BoardService, BoardSettings, BoardState, FsVault};
use mdkanban_core::{Tag, Task, TaskId};
use serde::Serialize;
use thiserror::Error;
use time::OffsetDateTime;

use crate::{BoardFormat, Command};

/// Task addressed by file and 1-based line, as editors show it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TaskRef {
    /// Vault-relative file.
    pub file: PathBuf,
    /// 0-based line.
    pub line: usize,
}

#[derive(Debug, Error)]
pub enum TaskRefError {
    #[error("expected <file>:<line>, got '{0}'")]
    Shape(String),
    #[error("line numbers start at 1, got '{0}'")]
    Line(String),
}

impl FromStr for TaskRef {
    type Err = TaskRefError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let (file, line) = s.rsplit_once(':').ok_or_else(|| TaskRefError::Shape(s.to_owned()))?;
        if file.is_empty() {
            return Err(TaskRefError::Shape(s.to_owned()));
        }
        let line = line
            .parse::<usize>()
            .ok()
            .and_then(|line| line.checked_sub(1))
            .ok_or_else(|| TaskRefError::Line(s.to_owned()))?;
        Ok(Self {
            file: PathBuf::from(file),
            line,
        })
    }
}

pub async fn run(vault: PathBuf, settings: BoardSettings, command: Command) -> Result<()> {
    if let Command::Init { force } = command {
        return handle_init(&vault, force);
    }

    let now = OffsetDateTime::now_utc();
    let mut service = BoardService::new(FsVault::new(&vault), settings);
    service.load(now).await?;

    match command {
        Command::Board { format } => {
            let out = match format {
                BoardFormat::Text => render_text(service.state()),
                BoardFormat::Json => serde_json::to_string_pretty(&BoardView::from(service.state()))?,
            };
            println!("{out}");
        }
        Command::Check => {
            let problems = &service.state().problems;
            for (file, items) in problems {
                for problem in items {
                    println!("{}:{}: {}", file.display(), problem.line + 1, problem.error);
                }
            }
            if !problems.is_empty() {
                bail!("{} file(s) with unparsable tasks", problems.len());
            }
        }
        Command::Complete { task } => {
            let id = resolve(&service, &task)?;
            service.complete_task(id, now).await?;
            println!("completed {}:{}", task.file.display(), task.line + 1);
        }
        Command::Move { task, status, before } => {
            let id = resolve(&service, &task)?;
            let before = before.map(|before| resolve(&service, &before)).transpose()?;
            let status = Tag::new(&status);
            service.move_task(id, status.clone(), before, now).await?;
            println!("moved {}:{} to {status}", task.file.display(), task.line + 1);
        }
        Command::Init { .. } => {}
    }
    Ok(())
}

fn handle_init(vault: &Path, force: bool) -> Result<()> {
    let path = vault.join(".mdkanban").join("settings.json");
    if path.exists() && !force {
        bail!("{} already exists (use --force to overwrite)", path.display());
    }
    BoardSettings::default().save(vault)?;
    println!("wrote {}", path.display());
    Ok(())
}

fn resolve(service: &BoardService<FsVault>, task: &TaskRef) -> Result<TaskId> {
    service
        .task_at(&task.file, task.line)
        .with_context(|| format!("no task starts at {}:{}", task.file.display(), task.line + 1))
}

fn render_text(state: &BoardState) -> String {
    let mut out = String::new();
    for (status, tasks) in &state.board {
        let _ = writeln!(out, "## {} ({})", status.name, tasks.len());
        for task in tasks {
            let _ = writeln!(out, "- {}", summary(task));
        }
        out.push('\n');
    }
    out.trim_end().to_owned()
}

fn summary(task: &Task) -> String {
    let mut line = format!(
        "{}:{} {}",
        task.file.display(),
        task.file_position.line + 1,
        task.description
    );
    if let Some(due) = task.due_on {
        let _ = write!(line, " (due {due})");
    }
    let subtasks = task.count() - 1;
    if subtasks > 0 {
        let _ = write!(line, " [+{subtasks}]");
    }
    line
}

#[derive(Debug, Serialize)]
struct BoardView {
    columns: Vec<ColumnView>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct ColumnView {
    tag: String,
    name: String,
    date_sort: bool,
    tasks: Vec<TaskView>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct TaskView {
    file: String,
    line: usize,
    description: String,
    tags: Vec<String>,
    due: Option<String>,
    position: Option<f64>,
}

impl From<&BoardState> for BoardView {
    fn from(state: &BoardState) -> Self {
        let columns = state
            .board
            .iter()
            .map(|(status, tasks)| ColumnView {
                tag: status.tag.as_str().to_owned(),
                name: status.name.clone(),
                date_sort: status.date_sort,
                tasks: tasks
                    .iter()
                    .map(|task| TaskView {
                        file: task.file.display().to_string(),
                        line: task.file_position.line + 1,
                        description: task.description.to_string(),
                        tags: task.tags.iter().map(|tag| tag.as_str().to_owned()).collect(),
                        due: task.due_on.map(|due| due.to_string()),
                        position: task.position(),
                    })
                    .collect(),
            })
            .collect();
        Self { columns }
    }
}
