//! Small wrapper types that give primitive strings and numbers a meaning.

use std::fmt;
use std::str::FromStr;

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use time::format_description::well_known::Rfc3339;
use time::macros::format_description;
use time::{Date, OffsetDateTime, PrimitiveDateTime, Time};

/// Inline field holding the position of a task inside its status column.
pub const POSITION_FIELD: &str = "pos";
/// Inline field holding the repeat rule of a task.
pub const REPEAT_FIELD: &str = "repeat";

/// Normalized `#tag` label.
///
/// The stored value never carries the leading `#`; [`fmt::Display`] adds it back.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Tag(String);

impl Tag {
    /// Normalize `raw` (with or without a leading `#`) into a tag.
    #[must_use]
    pub fn new(raw: &str) -> Self {
        let trimmed = raw.trim();
        Self(trimmed.strip_prefix('#').unwrap_or(trimmed).to_owned())
    }

    /// Tag name without the `#` prefix.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for Tag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

impl From<&str> for Tag {
    fn from(value: &str) -> Self {
        Self::new(value)
    }
}

/// Task description with whitespace collapsed to single spaces.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Description(String);

impl Description {
    /// Collapse runs of whitespace and trim both ends.
    #[must_use]
    pub fn new(raw: &str) -> Self {
        Self(raw.split_whitespace().collect::<Vec<_>>().join(" "))
    }

    /// Borrow the normalized text.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// True when nothing but annotations was on the line.
    #[must_use]
    pub const fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl fmt::Display for Description {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Due date taken from `@due(YYYY-MM-DD)`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct DueOn(pub Date);

impl DueOn {
    /// Underlying calendar date.
    #[must_use]
    pub const fn date(self) -> Date {
        self.0
    }
}

impl FromStr for DueOn {
    type Err = time::error::Parse;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Date::parse(s.trim(), format_description!("[year]-[month]-[day]")).map(Self)
    }
}

impl fmt::Display for DueOn {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let text = self
            .0
            .format(format_description!("[year]-[month]-[day]"))
            .map_err(|_| fmt::Error)?;
        f.write_str(&text)
    }
}

/// Completion timestamp taken from `@completed(...)`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct CompletedOn(#[serde(with = "time::serde::rfc3339")] pub OffsetDateTime);

impl FromStr for CompletedOn {
    type Err = time::error::Parse;

    /// Accepts RFC 3339, a local `YYYY-MM-DDTHH:MM[:SS]` (read as UTC) or a bare date.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim();
        if let Ok(ts) = OffsetDateTime::parse(s, &Rfc3339) {
            return Ok(Self(ts));
        }
        if let Ok(ts) = PrimitiveDateTime::parse(
            s,
            format_description!("[year]-[month]-[day]T[hour]:[minute]:[second]"),
        ) {
            return Ok(Self(ts.assume_utc()));
        }
        if let Ok(ts) = PrimitiveDateTime::parse(s, format_description!("[year]-[month]-[day]T[hour]:[minute]")) {
            return Ok(Self(ts.assume_utc()));
        }
        let date = Date::parse(s, format_description!("[year]-[month]-[day]"))?;
        Ok(Self(PrimitiveDateTime::new(date, Time::MIDNIGHT).assume_utc()))
    }
}

impl fmt::Display for CompletedOn {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let text = self.0.format(&Rfc3339).map_err(|_| fmt::Error)?;
        f.write_str(&text)
    }
}

/// Key of an inline `[key:: value]` field.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct DataviewField(String);

impl DataviewField {
    /// Build a key from raw text, trimming surrounding whitespace.
    #[must_use]
    pub fn new(raw: &str) -> Self {
        Self(raw.trim().to_owned())
    }

    /// Borrow the key.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for DataviewField {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Value of an inline field: numeric when the text is a float literal, text otherwise.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum DataviewValue {
    /// Numeric value, used for position keys.
    Number(f64),
    /// Free text, e.g. a repeat rule.
    Text(String),
}

impl DataviewValue {
    /// Coerce raw field text.
    #[must_use]
    pub fn parse(raw: &str) -> Self {
        let trimmed = raw.trim();
        match trimmed.parse::<f64>() {
            Ok(number) if number.is_finite() => Self::Number(number),
            _ => Self::Text(trimmed.to_owned()),
        }
    }

    /// Numeric value, if any.
    #[must_use]
    pub const fn as_number(&self) -> Option<f64> {
        match self {
            Self::Number(number) => Some(*number),
            Self::Text(_) => None,
        }
    }

    /// Text value, if any.
    #[must_use]
    pub fn as_text(&self) -> Option<&str> {
        match self {
            Self::Number(_) => None,
            Self::Text(text) => Some(text),
        }
    }
}

impl fmt::Display for DataviewValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Number(number) => write!(f, "{number}"),
            Self::Text(text) => f.write_str(text),
        }
    }
}

/// Unique inline fields of a task.
///
/// Insertion order is kept for rendering; equality ignores it.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct DataviewFields(IndexMap<DataviewField, DataviewValue>);

impl DataviewFields {
    /// Empty field set.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert or overwrite a field; an existing key keeps its slot.
    pub fn insert(&mut self, key: DataviewField, value: DataviewValue) {
        self.0.insert(key, value);
    }

    /// Remove a field, keeping the order of the others.
    pub fn remove(&mut self, key: &str) -> Option<DataviewValue> {
        self.0.shift_remove(key)
    }

    /// Look up a field by key.
    #[must_use]
    pub fn get(&self, key: &str) -> Option<&DataviewValue> {
        self.0.get(key)
    }

    /// Numeric value of a field, if present and numeric.
    #[must_use]
    pub fn number(&self, key: &str) -> Option<f64> {
        self.get(key).and_then(DataviewValue::as_number)
    }

    /// True when the key is present.
    #[must_use]
    pub fn contains(&self, key: &str) -> bool {
        self.0.contains_key(key)
    }

    /// True when no field is present.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Iterate in insertion order.
    pub fn iter(&self) -> impl Iterator<Item = (&DataviewField, &DataviewValue)> {
        self.0.iter()
    }
}

impl std::borrow::Borrow<str> for DataviewField {
    fn borrow(&self) -> &str {
        &self.0
    }
}

impl FromIterator<(DataviewField, DataviewValue)> for DataviewFields {
    fn from_iter<I: IntoIterator<Item = (DataviewField, DataviewValue)>>(iter: I) -> Self {
        Self(iter.into_iter().collect())
    }
}

/// A tag that designates membership of a kanban column.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StatusTag {
    /// Tag carried by tasks in the column.
    pub tag: Tag,
    /// Column heading.
    pub name: String,
    /// Order the column by due date instead of position.
    pub date_sort: bool,
}

impl StatusTag {
    /// Build a status tag.
    pub fn new(tag: impl Into<Tag>, name: impl Into<String>, date_sort: bool) -> Self {
        Self {
            tag: tag.into(),
            name: name.into(),
            date_sort,
        }
    }
}

/// Zero-based line index of an item inside its file.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct FilePosition {
    /// Line index.
    pub line: usize,
}

impl FilePosition {
    /// Position at `line`.
    #[must_use]
    pub const fn new(line: usize) -> Self {
        Self { line }
    }
}
