use std::{fmt, io};

use serde::{Deserialize, Serialize};
use serde_json::Error as JsonError;
use serde_yaml::Error as YamlError;
use thiserror::Error;

/// Crate-wide error taxonomy.
///
/// Per-document failures ([`ParleyError::MalformedDocument`],
/// [`ParleyError::InvalidDateFormat`]) are caught and isolated by the sync
/// driver so one bad article never blocks the rest of a run. Per-run failures
/// (remote transport, category resolution, preconditions) abort the current
/// direction before any mutation is attempted.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Error)]
pub enum ParleyError {
    /// The document text does not contain a complete metadata block.
    #[error("Malformed document '{context}': {reason}")]
    MalformedDocument { context: String, reason: String },
    /// A published date did not split into exactly three components.
    #[error("Invalid date format: '{0}'")]
    InvalidDateFormat(String),
    /// The transport could not reach the remote endpoint.
    #[error("Remote endpoint unavailable: {0}")]
    RemoteUnavailable(String),
    /// The remote endpoint returned a well-formed error payload. Carries the
    /// first reported message.
    #[error("Remote query error: {0}")]
    RemoteQueryError(String),
    /// The configured category name has no match in the repository. Fatal for
    /// the upload direction; must abort before any mutation.
    #[error("Discussion category not found: '{0}'")]
    CategoryNotFound(String),
    /// Missing credential, missing articles root, or an empty document set.
    #[error("Precondition failed: {0}")]
    PreconditionFailed(String),
    #[error("File System error: {0}")]
    Io(String),
    #[error("Item Not Found: {0}")]
    NotFound(String),
    #[error("You do not have permission to access this resource")]
    PermissionDenied,
    #[error("(De)Serialization error: {0}")]
    Serialization(String),
}

impl ParleyError {
    pub fn malformed(context: impl Into<String>, reason: impl Into<String>) -> Self {
        ParleyError::MalformedDocument {
            context: context.into(),
            reason: reason.into(),
        }
    }

    /// Attach a document context (slug or file path) to a [`ParleyError::MalformedDocument`]
    /// produced below the level where that context is known.
    pub fn in_context(self, context: impl Into<String>) -> Self {
        match self {
            ParleyError::MalformedDocument { reason, .. } => ParleyError::MalformedDocument {
                context: context.into(),
                reason,
            },
            other => other,
        }
    }

    /// Whether the failure is scoped to a single document. Document-scoped
    /// errors are reported and skipped; everything else aborts the run.
    pub fn is_document_scoped(&self) -> bool {
        matches!(
            self,
            ParleyError::MalformedDocument { .. } | ParleyError::InvalidDateFormat(_)
        )
    }
}

impl From<io::Error> for ParleyError {
    fn from(x: io::Error) -> Self {
        match x.kind() {
            io::ErrorKind::NotFound => ParleyError::NotFound(format!("{x}")),
            io::ErrorKind::PermissionDenied => ParleyError::PermissionDenied,
            _ => ParleyError::Io(format!("IOError: {}", x.kind())),
        }
    }
}

impl From<JsonError> for ParleyError {
    fn from(src: JsonError) -> ParleyError {
        ParleyError::Serialization(format!("JSON (de)serialization error: {src}"))
    }
}

impl From<YamlError> for ParleyError {
    fn from(src: YamlError) -> ParleyError {
        ParleyError::Serialization(format!("YAML (de)serialization error: {src}"))
    }
}

impl From<toml::de::Error> for ParleyError {
    fn from(src: toml::de::Error) -> ParleyError {
        ParleyError::Serialization(format!("Toml deserialization error: {src}"))
    }
}

impl From<toml::ser::Error> for ParleyError {
    fn from(src: toml::ser::Error) -> ParleyError {
        ParleyError::Serialization(format!("Toml serialization error: {src}"))
    }
}

impl From<fmt::Error> for ParleyError {
    fn from(x: fmt::Error) -> Self {
        ParleyError::Serialization(format!("{x}"))
    }
}
