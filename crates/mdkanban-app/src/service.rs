//! Vault-backed board operations shared by the CLI.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{Context, Result};
use mdkanban_core::{Tag, TaskId};
use time::OffsetDateTime;
use tokio::sync::watch;
use tracing::{debug, warn};

use crate::board::{Action, BoardState, TaskWrite};
use crate::list_items::parse_document;
use crate::settings::BoardSettings;
use crate::store::BoardStore;
use crate::vault::{VaultIo, apply_writes};

/// Write-back rounds before giving up on a file that keeps changing.
const MAX_SETTLE_ROUNDS: usize = 4;

/// Service façade tying the board store to a vault.
///
/// Every operation dispatches an action, applies the resulting writes and
/// re-reads the touched files so the store matches the disk afterwards.
pub struct BoardService<V> {
    vault: V,
    store: BoardStore,
}

impl<V> BoardService<V> {
    /// Service over `vault` with an empty board.
    pub fn new(vault: V, settings: BoardSettings) -> Self {
        Self {
            vault,
            store: BoardStore::new(settings),
        }
    }

    /// Current board.
    pub fn state(&self) -> &BoardState {
        self.store.state()
    }

    /// Receiver for board updates.
    pub fn subscribe(&self) -> watch::Receiver<Arc<BoardState>> {
        self.store.subscribe()
    }

    /// Root task starting on `line` of `file`.
    pub fn task_at(&self, file: &Path, line: usize) -> Option<TaskId> {
        self.state()
            .tasks
            .iter()
            .find(|task| task.file == file && task.file_position.line == line)
            .map(|task| task.id)
    }
}

impl<V: VaultIo> BoardService<V> {
    /// Read every non-ignored Markdown file of the vault.
    ///
    /// # Errors
    /// Returns an error if listing, reading or writing back fails.
    pub async fn load(&mut self, at: OffsetDateTime) -> Result<()> {
        let files = self.vault.list_markdown().await.context("failed to list vault")?;
        let mut writes = Vec::new();
        for file in files {
            if self.state().settings.is_ignored(&file) {
                debug!(file = %file.display(), "skipping ignored file");
                continue;
            }
            let lines = self
                .vault
                .read_lines(&file)
                .await
                .with_context(|| format!("failed to read {}", file.display()))?;
            let parsed = parse_document(&file, &lines);
            writes.extend(self.store.dispatch(Action::FileLoaded { file, parsed })?);
        }
        self.persist(writes, at).await
    }

    /// Re-read `file` after it changed on disk.
    ///
    /// # Errors
    /// Returns an error if reading, reducing or writing back fails.
    pub async fn refresh(&mut self, file: &Path, at: OffsetDateTime) -> Result<()> {
        let writes = self.reload(file.to_path_buf(), at).await?;
        self.persist(writes, at).await
    }

    /// Move a task into the column of `status`.
    ///
    /// # Errors
    /// Returns an error for unknown tasks or columns and failed writes.
    pub async fn move_task(&mut self, id: TaskId, status: Tag, before: Option<TaskId>, at: OffsetDateTime) -> Result<()> {
        let writes = self.store.dispatch(Action::MoveTask { id, status, before })?;
        self.persist(writes, at).await
    }

    /// Complete a task.
    ///
    /// # Errors
    /// Returns an error for unknown tasks, bad repeat rules and failed writes.
    pub async fn complete_task(&mut self, id: TaskId, at: OffsetDateTime) -> Result<()> {
        let writes = self.store.dispatch(Action::CompleteTask { id, at })?;
        self.persist(writes, at).await
    }

    async fn reload(&mut self, file: PathBuf, at: OffsetDateTime) -> Result<Vec<TaskWrite>> {
        let lines = self
            .vault
            .read_lines(&file)
            .await
            .with_context(|| format!("failed to read {}", file.display()))?;
        let parsed = parse_document(&file, &lines);
        Ok(self.store.dispatch(Action::FileModified { file, parsed, at })?)
    }

    async fn persist(&mut self, mut writes: Vec<TaskWrite>, at: OffsetDateTime) -> Result<()> {
        for _ in 0..MAX_SETTLE_ROUNDS {
            if writes.is_empty() {
                return Ok(());
            }
            let touched = apply_writes(&self.vault, &writes).await?;
            writes.clear();
            for file in touched {
                writes.extend(self.reload(file, at).await?);
            }
        }
        if !writes.is_empty() {
            warn!(pending = writes.len(), "task writes did not settle");
        }
        Ok(())
    }
}
