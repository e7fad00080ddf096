//! Basic building blocks shared by the matcher, planner, and remote
//! directory: the local and remote document representations and the metadata
//! keys both sides agree on.

use serde::{Deserialize, Serialize};
use serde_yaml::{Mapping, Value};
use std::path::PathBuf;

use crate::{codec, error::ParleyError, labels::Classification};

/// Stable identifier matching a local document to a remote record.
pub const KEY_SLUG: &str = "slug";
/// Publication date. `MM/DD/YYYY` locally, `YYYY-MM-DD` in remote bodies.
pub const KEY_PUBLISHED: &str = "published";
pub const KEY_DESCRIPTION: &str = "description";
pub const KEY_TAGS: &str = "tags";
pub const KEY_SERIES: &str = "series";
pub const KEY_DRAFT: &str = "draft";
/// Optional local override for the title otherwise derived from the file name.
pub const KEY_TITLE: &str = "title";

/// String lookup into a metadata mapping.
pub fn meta_str<'a>(metadata: &'a Mapping, key: &str) -> Option<&'a str> {
    metadata
        .get(Value::String(key.to_string()))
        .and_then(Value::as_str)
}

/// String-list lookup. A scalar value is treated as a single-element list.
pub fn meta_str_list(metadata: &Mapping, key: &str) -> Vec<String> {
    match metadata.get(Value::String(key.to_string())) {
        Some(Value::Sequence(seq)) => seq
            .iter()
            .filter_map(Value::as_str)
            .map(str::to_string)
            .collect(),
        Some(Value::String(s)) => vec![s.clone()],
        _ => Vec::new(),
    }
}

pub fn meta_bool(metadata: &Mapping, key: &str) -> bool {
    metadata
        .get(Value::String(key.to_string()))
        .and_then(Value::as_bool)
        .unwrap_or(false)
}

/// A markdown article under the configured root, split into its metadata
/// block and body. Identity is the file path; ownership stays with the host
/// storage.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LocalDocument {
    pub path: PathBuf,
    pub metadata: Mapping,
    /// The raw metadata block as it appears on disk, delimiter lines
    /// included. Kept so updates that leave the block untouched can carry it
    /// forward byte-for-byte, comments and quoting intact.
    pub header: String,
    pub body: String,
}

impl LocalDocument {
    /// Parses raw article text. Failure carries the file path as context.
    pub fn parse(path: PathBuf, raw: &str) -> Result<Self, ParleyError> {
        let context = path.display().to_string();
        let (header, _) = codec::split(raw).map_err(|e| e.in_context(context.clone()))?;
        let header = header.to_string();
        let (metadata, body) = codec::parse(raw).map_err(|e| e.in_context(context))?;
        Ok(LocalDocument {
            path,
            metadata,
            header,
            body,
        })
    }

    /// Title from the `title` metadata key, falling back to the file stem.
    pub fn title(&self) -> String {
        if let Some(title) = meta_str(&self.metadata, KEY_TITLE) {
            return title.to_string();
        }
        self.path
            .file_stem()
            .map(|s| s.to_string_lossy().to_string())
            .unwrap_or_default()
    }

    pub fn slug(&self) -> Option<&str> {
        meta_str(&self.metadata, KEY_SLUG)
    }

    pub fn description(&self) -> Option<&str> {
        meta_str(&self.metadata, KEY_DESCRIPTION)
    }

    /// Publication date in the local `MM/DD/YYYY` representation.
    pub fn published(&self) -> Option<&str> {
        meta_str(&self.metadata, KEY_PUBLISHED)
    }

    pub fn classification(&self) -> Classification {
        Classification::from_metadata(&self.metadata)
    }

    /// Reassembles the article text from the raw header and body. Exact
    /// inverse of [`LocalDocument::parse`].
    pub fn to_text(&self) -> String {
        format!("{}{}", self.header, self.body)
    }
}

/// A label attached to a remote record. The id is opaque to this crate; it is
/// only echoed back into label mutations.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Label {
    pub id: String,
    pub name: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Category {
    pub id: String,
    pub name: String,
}

/// A remote discussion record. Read-mostly input to the planner, plus the
/// target of planned mutations. The body follows the same embedded-metadata
/// convention as [`LocalDocument`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RemoteRecord {
    pub id: String,
    pub number: u64,
    pub title: String,
    pub body: String,
    #[serde(default)]
    pub labels: Vec<Label>,
    pub category: Option<Category>,
    pub created_at: String,
    pub updated_at: String,
}

impl RemoteRecord {
    /// Splits the record body into its metadata block and free text.
    pub fn parts(&self) -> Result<(Mapping, String), ParleyError> {
        codec::parse(&self.body).map_err(|e| e.in_context(format!("remote #{}", self.number)))
    }

    /// The slug embedded in the record body, if the body parses and carries
    /// one. Records without a slug are invisible to matching.
    pub fn slug(&self) -> Option<String> {
        let (metadata, _) = self.parts().ok()?;
        meta_str(&metadata, KEY_SLUG).map(str::to_string)
    }

    pub fn label_names(&self) -> Vec<String> {
        self.labels.iter().map(|l| l.name.clone()).collect()
    }
}

/// Repository-level metadata fetched once per run: the repository id, its
/// discussion categories, and the full set of known labels (which seeds the
/// known-labels cache).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RepositoryInfo {
    pub id: String,
    pub categories: Vec<Category>,
    pub labels: Vec<Label>,
}

impl RepositoryInfo {
    /// Resolves a configured category name to its id.
    pub fn category_id(&self, name: &str) -> Result<&str, ParleyError> {
        self.categories
            .iter()
            .find(|c| c.name == name)
            .map(|c| c.id.as_str())
            .ok_or_else(|| ParleyError::CategoryNotFound(name.to_string()))
    }
}
