//! Async file access for a vault directory.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use thiserror::Error;
use tracing::{debug, trace};

use crate::board::TaskWrite;

/// Failure at the file boundary.
#[derive(Debug, Error)]
pub enum VaultError {
    /// Reading, writing or listing failed.
    #[error("failed to access {path}: {source}")]
    Io {
        /// Path involved.
        path: PathBuf,
        /// Underlying error.
        #[source]
        source: std::io::Error,
    },
    /// A write addresses lines the file no longer has.
    #[error("{file}: line {line} is past the end of the file")]
    LineOutOfRange {
        /// Vault-relative file.
        file: PathBuf,
        /// First missing line.
        line: usize,
    },
}

/// Storage the board reads Markdown files from and writes tasks back to.
///
/// Paths are vault-relative.
#[allow(async_fn_in_trait)]
pub trait VaultIo: Send + Sync {
    /// Every Markdown file in the vault, sorted.
    ///
    /// # Errors
    /// Returns a storage-specific error when listing fails.
    async fn list_markdown(&self) -> Result<Vec<PathBuf>, VaultError>;

    /// Lines of `file`, without line terminators.
    ///
    /// # Errors
    /// Returns a storage-specific error when the file cannot be read.
    async fn read_lines(&self, file: &Path) -> Result<Vec<String>, VaultError>;

    /// Replace the content of `file`.
    ///
    /// # Errors
    /// Returns a storage-specific error when the file cannot be written.
    async fn write_lines(&self, file: &Path, lines: &[String]) -> Result<(), VaultError>;
}

/// Vault on the local file system.
#[derive(Debug, Clone)]
pub struct FsVault {
    root: PathBuf,
}

impl FsVault {
    /// Vault rooted at `root`.
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    /// Root directory.
    #[must_use]
    pub fn root(&self) -> &Path {
        &self.root
    }

    fn io_error(path: &Path) -> impl FnOnce(std::io::Error) -> VaultError {
        move |source| VaultError::Io {
            path: path.to_path_buf(),
            source,
        }
    }
}

impl VaultIo for FsVault {
    async fn list_markdown(&self) -> Result<Vec<PathBuf>, VaultError> {
        let mut found = Vec::new();
        let mut pending = vec![self.root.clone()];
        while let Some(dir) = pending.pop() {
            let mut entries = tokio::fs::read_dir(&dir).await.map_err(Self::io_error(&dir))?;
            while let Some(entry) = entries.next_entry().await.map_err(Self::io_error(&dir))? {
                let path = entry.path();
                // Hidden entries hold tool state, not notes.
                if entry.file_name().to_string_lossy().starts_with('.') {
                    continue;
                }
                let kind = entry.file_type().await.map_err(Self::io_error(&path))?;
                if kind.is_dir() {
                    pending.push(path);
                } else if path.extension().is_some_and(|ext| ext == "md") {
                    found.extend(path.strip_prefix(&self.root).ok().map(Path::to_path_buf));
                }
            }
        }
        found.sort();
        debug!(root = %self.root.display(), files = found.len(), "listed vault");
        Ok(found)
    }

    async fn read_lines(&self, file: &Path) -> Result<Vec<String>, VaultError> {
        let path = self.root.join(file);
        let text = tokio::fs::read_to_string(&path).await.map_err(Self::io_error(&path))?;
        Ok(text.lines().map(str::to_owned).collect())
    }

    async fn write_lines(&self, file: &Path, lines: &[String]) -> Result<(), VaultError> {
        let path = self.root.join(file);
        let mut text = lines.join("\n");
        text.push('\n');
        trace!(path = %path.display(), lines = lines.len(), "writing file");
        tokio::fs::write(&path, text).await.map_err(Self::io_error(&path))
    }
}

/// Apply `writes` to the lines of one file.
///
/// Spans are replaced bottom-up so earlier spans keep their line numbers. Each
/// replacement takes the indentation of the first line it replaces.
///
/// # Errors
/// [`VaultError::LineOutOfRange`] when a span reaches past the end of `lines`.
pub fn splice_writes(file: &Path, lines: &mut Vec<String>, writes: &[&TaskWrite]) -> Result<(), VaultError> {
    let mut ordered: Vec<&TaskWrite> = writes.to_vec();
    ordered.sort_by_key(|write| std::cmp::Reverse(*write.lines.start()));
    for write in ordered {
        let (start, end) = (*write.lines.start(), *write.lines.end());
        if end >= lines.len() {
            return Err(VaultError::LineOutOfRange {
                file: file.to_path_buf(),
                line: lines.len(),
            });
        }
        let indent: String = lines[start]
            .chars()
            .take_while(|c| *c == ' ' || *c == '\t')
            .collect();
        let replacement: Vec<String> = write
            .markdown
            .lines()
            .map(|line| format!("{indent}{line}"))
            .collect();
        lines.splice(start..=end, replacement);
    }
    Ok(())
}

/// Group `writes` by file and apply them.
///
/// Returns the files that were rewritten, in path order.
///
/// # Errors
/// The first read, splice or write failure; files handled before it stay written.
pub async fn apply_writes<V: VaultIo>(vault: &V, writes: &[TaskWrite]) -> Result<Vec<PathBuf>, VaultError> {
    let mut by_file: BTreeMap<&Path, Vec<&TaskWrite>> = BTreeMap::new();
    for write in writes {
        by_file.entry(write.file.as_path()).or_default().push(write);
    }
    let mut touched = Vec::with_capacity(by_file.len());
    for (file, writes) in by_file {
        let mut lines = vault.read_lines(file).await?;
        splice_writes(file, &mut lines, &writes)?;
        vault.write_lines(file, &lines).await?;
        debug!(file = %file.display(), writes = writes.len(), "applied task writes");
        touched.push(file.to_path_buf());
    }
    Ok(touched)
}
