//! End-to-end board operations over a temporary vault.

use std::fs;
use std::path::Path;

use anyhow::{Context, Result};
use mdkanban_app::{BoardService, BoardSettings, FsVault};
use mdkanban_core::Tag;
use tempfile::{TempDir, tempdir};
use time::macros::datetime;

const TODO: &str = "\
# Todo
- [ ] write docs #backlog
- [ ] fix bug #doing [pos:: 1]
\t- [ ] reproduce
- [ ] pay rent #doing [pos:: 2] [repeat:: monthly: 1] @due(2022-01-03)
";

fn vault() -> Result<TempDir> {
    let dir = tempdir()?;
    fs::create_dir_all(dir.path().join(".mdkanban"))?;
    fs::write(
        dir.path().join(".mdkanban/settings.json"),
        r#"{"version":"2","columnTags":["backlog:Backlog:false","doing:Doing:false"],"logLevel":"debug"}"#,
    )?;
    fs::create_dir_all(dir.path().join("archive"))?;
    fs::write(dir.path().join("archive/old.md"), "- [ ] old #backlog\n")?;
    fs::write(dir.path().join("todo.md"), TODO)?;
    Ok(dir)
}

fn read(dir: &TempDir, file: &str) -> Result<String> {
    fs::read_to_string(dir.path().join(file)).with_context(|| format!("reading {file}"))
}

async fn service(dir: &TempDir, ignore_archive: bool) -> Result<BoardService<FsVault>> {
    let mut settings = BoardSettings::load(dir.path())?;
    if ignore_archive {
        settings.ignore_paths.push("archive".into());
    }
    let mut service = BoardService::new(FsVault::new(dir.path()), settings);
    service.load(datetime!(2022-01-03 12:00 UTC)).await?;
    Ok(service)
}

#[tokio::test]
async fn loading_assigns_missing_positions() -> Result<()> {
    let dir = vault()?;
    let service = service(&dir, true).await?;

    assert_eq!(
        read(&dir, "todo.md")?,
        "# Todo\n\
         - [ ] write docs #backlog [pos:: 1]\n\
         - [ ] fix bug #doing [pos:: 1]\n\
         \t- [ ] reproduce\n\
         - [ ] pay rent #doing [pos:: 2] [repeat:: monthly: 1] @due(2022-01-03)\n"
    );
    assert_eq!(read(&dir, "archive/old.md")?, "- [ ] old #backlog\n");

    let doing: Vec<_> = service.state().board[1]
        .iter()
        .map(|task| task.description.as_str())
        .collect();
    assert_eq!(doing, vec!["fix bug", "pay rent"]);
    Ok(())
}

#[tokio::test]
async fn without_ignore_paths_every_file_is_loaded() -> Result<()> {
    let dir = vault()?;
    let service = service(&dir, false).await?;
    assert_eq!(read(&dir, "archive/old.md")?, "- [ ] old #backlog [pos:: 1]\n");
    assert_eq!(service.state().board[0].len(), 2);
    Ok(())
}

#[tokio::test]
async fn completing_a_repeating_task_inserts_the_done_copy() -> Result<()> {
    let dir = vault()?;
    let mut service = service(&dir, true).await?;

    let rent = service
        .task_at(Path::new("todo.md"), 4)
        .context("rent task must be on line 4")?;
    service.complete_task(rent, datetime!(2022-01-03 18:30 UTC)).await?;

    let text = read(&dir, "todo.md")?;
    assert!(text.ends_with(
        "- [x] pay rent @due(2022-01-03) @completed(2022-01-03T18:30:00Z)\n\
         - [ ] pay rent #doing [pos:: 2] [repeat:: monthly: 1] @due(2022-02-03)\n"
    ));
    assert_eq!(service.task_at(Path::new("todo.md"), 5), Some(rent));
    Ok(())
}

#[tokio::test]
async fn moving_rewrites_status_and_position() -> Result<()> {
    let dir = vault()?;
    let mut service = service(&dir, true).await?;

    let docs = service.task_at(Path::new("todo.md"), 1).context("docs on line 1")?;
    let bug = service.task_at(Path::new("todo.md"), 2).context("bug on line 2")?;
    service
        .move_task(docs, Tag::new("doing"), Some(bug), datetime!(2022-01-03 12:00 UTC))
        .await?;

    let text = read(&dir, "todo.md")?;
    assert!(text.contains("- [ ] write docs #doing [pos:: 0.5]\n"));
    let doing: Vec<_> = service.state().board[1]
        .iter()
        .map(|task| task.description.as_str())
        .collect();
    assert_eq!(doing, vec!["write docs", "fix bug", "pay rent"]);
    assert!(service.state().board[0].is_empty());
    Ok(())
}

#[tokio::test]
async fn ticking_off_in_an_editor_runs_the_completion_pipeline() -> Result<()> {
    let dir = vault()?;
    let mut service = service(&dir, true).await?;
    let rx = service.subscribe();

    let edited = read(&dir, "todo.md")?.replace("- [ ] fix bug", "- [x] fix bug");
    fs::write(dir.path().join("todo.md"), edited)?;
    service
        .refresh(Path::new("todo.md"), datetime!(2022-01-04 9:00 UTC))
        .await?;

    let text = read(&dir, "todo.md")?;
    assert!(text.contains("- [x] fix bug @completed(2022-01-04T09:00:00Z)\n\t- [ ] reproduce\n"));
    assert!(rx.has_changed()?);
    let published = rx.borrow().clone();
    let doing: Vec<_> = published.board[1]
        .iter()
        .map(|task| task.description.as_str())
        .collect();
    assert_eq!(doing, vec!["pay rent"]);
    Ok(())
}

#[tokio::test]
async fn loading_keeps_prose_and_unparsable_children_in_place() -> Result<()> {
    let dir = vault()?;
    let notes = "\
- [ ] plan trip #backlog
  we still need to pick dates

\t- [ ] book flights @due(next week)
\t\t- [ ] compare prices
\t- [ ] ask for leave
";
    fs::write(dir.path().join("trip.md"), notes)?;
    let service = service(&dir, true).await?;

    assert_eq!(
        read(&dir, "trip.md")?,
        notes.replacen("#backlog\n", "#backlog [pos:: 2]\n", 1)
    );
    let problems = service
        .state()
        .problems
        .get(Path::new("trip.md"))
        .context("the bad child must be reported")?;
    assert_eq!(problems.len(), 1);
    assert_eq!(problems[0].line, 3);
    Ok(())
}

#[tokio::test]
async fn refreshing_twice_after_an_external_tick_is_quiet() -> Result<()> {
    let dir = vault()?;
    fs::write(dir.path().join("chores.md"), "- [ ] sweep [repeat:: weekly: 1]\n")?;
    let mut service = service(&dir, true).await?;

    fs::write(dir.path().join("chores.md"), "- [x] sweep [repeat:: weekly: 1]\n")?;
    service
        .refresh(Path::new("chores.md"), datetime!(2022-01-05 7:00 UTC))
        .await?;
    let settled = "- [x] sweep @completed(2022-01-05T07:00:00Z)\n";
    assert_eq!(read(&dir, "chores.md")?, settled);

    service
        .refresh(Path::new("chores.md"), datetime!(2022-01-06 7:00 UTC))
        .await?;
    assert_eq!(read(&dir, "chores.md")?, settled);
    Ok(())
}
