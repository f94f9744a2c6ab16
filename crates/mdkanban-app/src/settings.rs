//! Board settings persisted as versioned JSON.
//!
//! The file lives at `<vault>/.mdkanban/settings.json`. Older versions are
//! upgraded one step at a time over the raw JSON object before it is
//! deserialized, so every migration only has to know its own two versions.

use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::str::FromStr;

use mdkanban_core::{CompletionRules, StatusTag, Tag};
use regex::Regex;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use thiserror::Error;
use tracing::{Level, debug, info};

const SETTINGS_DIR: &str = ".mdkanban";
const SETTINGS_FILE: &str = "settings.json";

/// Version written by this build.
pub const CURRENT_VERSION: &str = "3";

/// Failure while loading or validating settings.
#[derive(Debug, Error)]
pub enum SettingsError {
    /// The settings file exists but cannot be read or written.
    #[error("failed to access {path}: {source}")]
    Io {
        /// File involved.
        path: PathBuf,
        /// Underlying error.
        #[source]
        source: std::io::Error,
    },
    /// Not a JSON object, or fields of the wrong shape.
    #[error("invalid settings JSON: {0}")]
    Json(#[from] serde_json::Error),
    /// `version` names no known schema.
    #[error("unknown settings version '{0}'")]
    UnknownVersion(String),
    /// A `columnTags` entry is not `tag:displayName:dateSort`.
    #[error("invalid column tag '{0}': expected tag:displayName:dateSort")]
    InvalidColumnTag(String),
    /// `taskRemoveRegex` does not compile.
    #[error("invalid taskRemoveRegex: {0}")]
    InvalidRemoveRegex(#[from] regex::Error),
    /// `logLevel` is not a tracing level.
    #[error("invalid logLevel '{0}'")]
    InvalidLogLevel(String),
}

/// On-disk shape of the current settings version.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SettingsFile {
    /// Schema version.
    pub version: String,
    /// Pattern cut from descriptions on completion; empty disables it.
    #[serde(default)]
    pub task_remove_regex: String,
    /// Columns as `tag:displayName:dateSort`.
    #[serde(default)]
    pub column_tags: Vec<String>,
    /// Tag name to display colour.
    #[serde(default)]
    pub tag_colors: BTreeMap<String, String>,
    /// Default log level of the binary.
    #[serde(default = "default_log_level")]
    pub log_level: String,
    /// Vault-relative path prefixes whose files are never read.
    #[serde(default)]
    pub ignore_paths: Vec<String>,
}

fn default_log_level() -> String {
    "info".to_owned()
}

impl Default for SettingsFile {
    fn default() -> Self {
        Self {
            version: CURRENT_VERSION.to_owned(),
            task_remove_regex: String::new(),
            column_tags: vec![
                "backlog:Backlog:false".to_owned(),
                "scheduled:Scheduled:true".to_owned(),
                "doing:Doing:false".to_owned(),
            ],
            tag_colors: BTreeMap::new(),
            log_level: default_log_level(),
            ignore_paths: Vec::new(),
        }
    }
}

/// Validated settings consumed by the board.
#[derive(Debug, Clone)]
pub struct BoardSettings {
    /// Columns in display order.
    pub status_tags: Vec<StatusTag>,
    /// Compiled `taskRemoveRegex`.
    pub remove: Option<Regex>,
    /// Tag display colours.
    pub tag_colors: BTreeMap<Tag, String>,
    /// Default log level.
    pub log_level: Level,
    /// Ignored path prefixes, vault-relative.
    pub ignore_paths: Vec<PathBuf>,
}

impl Default for BoardSettings {
    fn default() -> Self {
        // The built-in file is known to validate; fall back to an empty board otherwise.
        Self::try_from(SettingsFile::default()).unwrap_or_else(|_| Self {
            status_tags: Vec::new(),
            remove: None,
            tag_colors: BTreeMap::new(),
            log_level: Level::INFO,
            ignore_paths: Vec::new(),
        })
    }
}

impl TryFrom<SettingsFile> for BoardSettings {
    type Error = SettingsError;

    fn try_from(file: SettingsFile) -> Result<Self, Self::Error> {
        let status_tags = file
            .column_tags
            .iter()
            .map(|raw| parse_column_tag(raw))
            .collect::<Result<Vec<_>, _>>()?;
        let remove = match file.task_remove_regex.trim() {
            "" => None,
            pattern => Some(Regex::new(pattern)?),
        };
        let log_level = Level::from_str(file.log_level.trim())
            .map_err(|_| SettingsError::InvalidLogLevel(file.log_level.clone()))?;
        Ok(Self {
            status_tags,
            remove,
            tag_colors: file
                .tag_colors
                .into_iter()
                .map(|(tag, colour)| (Tag::new(&tag), colour))
                .collect(),
            log_level,
            ignore_paths: file.ignore_paths.iter().map(PathBuf::from).collect(),
        })
    }
}

impl From<&BoardSettings> for SettingsFile {
    fn from(settings: &BoardSettings) -> Self {
        Self {
            version: CURRENT_VERSION.to_owned(),
            task_remove_regex: settings
                .remove
                .as_ref()
                .map(|regex| regex.as_str().to_owned())
                .unwrap_or_default(),
            column_tags: settings
                .status_tags
                .iter()
                .map(|status| format!("{}:{}:{}", status.tag.as_str(), status.name, status.date_sort))
                .collect(),
            tag_colors: settings
                .tag_colors
                .iter()
                .map(|(tag, colour)| (tag.as_str().to_owned(), colour.clone()))
                .collect(),
            log_level: settings.log_level.as_str().to_ascii_lowercase(),
            ignore_paths: settings
                .ignore_paths
                .iter()
                .map(|path| path.display().to_string())
                .collect(),
        }
    }
}

impl BoardSettings {
    /// Load `<vault>/.mdkanban/settings.json`, or defaults when it is absent.
    ///
    /// # Errors
    /// Fails on unreadable files, bad JSON, unknown versions and invalid fields.
    pub fn load(vault: impl AsRef<Path>) -> Result<Self, SettingsError> {
        let path = settings_path(vault.as_ref());
        if !path.exists() {
            debug!(path = %path.display(), "no settings file, using defaults");
            return Ok(Self::default());
        }
        let contents = fs::read_to_string(&path).map_err(|source| SettingsError::Io {
            path: path.clone(),
            source,
        })?;
        Self::from_json(&contents)
    }

    /// Parse settings JSON of any known version.
    ///
    /// # Errors
    /// See [`load`](Self::load).
    pub fn from_json(contents: &str) -> Result<Self, SettingsError> {
        let raw: Map<String, Value> = serde_json::from_str(contents)?;
        let file: SettingsFile = serde_json::from_value(Value::Object(migrate(raw)?))?;
        Self::try_from(file)
    }

    /// Write these settings in the current version.
    ///
    /// # Errors
    /// Fails when the directory or file cannot be written.
    pub fn save(&self, vault: impl AsRef<Path>) -> Result<(), SettingsError> {
        let path = settings_path(vault.as_ref());
        let io_err = |source| SettingsError::Io {
            path: path.clone(),
            source,
        };
        if let Some(dir) = path.parent() {
            fs::create_dir_all(dir).map_err(io_err)?;
        }
        let body = serde_json::to_string_pretty(&SettingsFile::from(self))?;
        fs::write(&path, body).map_err(io_err)
    }

    /// Whether `file` (vault-relative) sits under an ignored prefix.
    #[must_use]
    pub fn is_ignored(&self, file: &Path) -> bool {
        self.ignore_paths.iter().any(|prefix| file.starts_with(prefix))
    }

    /// Column configured for `tag`.
    #[must_use]
    pub fn status_for(&self, tag: &Tag) -> Option<&StatusTag> {
        self.status_tags.iter().find(|status| &status.tag == tag)
    }

    /// Rules used when a task is completed.
    #[must_use]
    pub fn completion_rules(&self) -> CompletionRules {
        CompletionRules {
            status_tags: self.status_tags.clone(),
            remove: self.remove.clone(),
        }
    }
}

fn settings_path(vault: &Path) -> PathBuf {
    vault.join(SETTINGS_DIR).join(SETTINGS_FILE)
}

/// Parse `tag:displayName:dateSort`; the display name may itself contain colons.
fn parse_column_tag(raw: &str) -> Result<StatusTag, SettingsError> {
    let invalid = || SettingsError::InvalidColumnTag(raw.to_owned());
    let (tag, rest) = raw.split_once(':').ok_or_else(invalid)?;
    let (name, date_sort) = match rest.rsplit_once(':') {
        Some((name, "true")) => (name, true),
        Some((name, "false")) => (name, false),
        Some(_) | None => (rest, false),
    };
    let tag = Tag::new(tag);
    if tag.as_str().is_empty() {
        return Err(invalid());
    }
    let name = if name.trim().is_empty() { tag.as_str() } else { name.trim() };
    Ok(StatusTag::new(tag.clone(), name, date_sort))
}

/// Upgrade a settings object to [`CURRENT_VERSION`].
fn migrate(mut raw: Map<String, Value>) -> Result<Map<String, Value>, SettingsError> {
    loop {
        let version = match raw.get("version") {
            Some(Value::String(version)) => version.clone(),
            Some(Value::Number(number)) => number.to_string(),
            Some(other) => return Err(SettingsError::UnknownVersion(other.to_string())),
            None => "1".to_owned(),
        };
        match version.as_str() {
            CURRENT_VERSION => return Ok(raw),
            "1" => v1_to_v2(&mut raw),
            "2" => v2_to_v3(&mut raw),
            _ => return Err(SettingsError::UnknownVersion(version)),
        }
        info!(from = %version, "migrated settings");
    }
}

fn v1_to_v2(raw: &mut Map<String, Value>) {
    raw.entry("taskRemoveRegex").or_insert_with(|| Value::String(String::new()));
    raw.entry("logLevel").or_insert_with(|| Value::String(default_log_level()));
    raw.insert("version".to_owned(), Value::String("2".to_owned()));
}

fn v2_to_v3(raw: &mut Map<String, Value>) {
    raw.entry("ignorePaths").or_insert_with(|| Value::Array(Vec::new()));
    raw.insert("version".to_owned(), Value::String("3".to_owned()));
}
