use serde::{Deserialize, Serialize};
use std::fmt::{Display, Formatter};
use std::path::PathBuf;

/// The three independently confirmable mutation classes for matched pairs,
/// plus record creation. The confirmation layer gates each class on its own.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum MutationClass {
    Create,
    Frontmatter,
    Content,
    Labels,
}

impl Display for MutationClass {
    fn fmt(&self, f: &mut Formatter) -> std::fmt::Result {
        match self {
            MutationClass::Create => write!(f, "create"),
            MutationClass::Frontmatter => write!(f, "frontmatter"),
            MutationClass::Content => write!(f, "content"),
            MutationClass::Labels => write!(f, "labels"),
        }
    }
}

/// Human-readable status stream for a sync run. Status only; never part of
/// the data contract between planner and executor.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum SyncEvent {
    /// Counts from the match partition: new-local, new-remote, paired.
    Matched(usize, usize, usize),
    /// A document was skipped with the reason; the run continues.
    DocumentSkipped(PathBuf, String),
    /// Duplicate slug seen; first encountered wins.
    DuplicateSlug(String, String),
    /// Data-integrity warning not tied to a single mutation.
    Warning(String),
    /// (slug, class) applied successfully.
    Applied(String, MutationClass),
    /// (slug, class, reason); other documents keep processing.
    Failed(String, MutationClass, String),
}

impl Display for SyncEvent {
    fn fmt(&self, f: &mut Formatter) -> std::fmt::Result {
        match self {
            SyncEvent::Matched(new_local, new_remote, paired) => write!(
                f,
                "{new_local} new local document(s), {new_remote} new remote record(s), {paired} matched pair(s)"
            ),
            SyncEvent::DocumentSkipped(path, reason) => {
                write!(f, "skipped {path:?}: {reason}")
            }
            SyncEvent::DuplicateSlug(slug, context) => {
                write!(f, "duplicate slug '{slug}' ({context}); first encountered wins")
            }
            SyncEvent::Warning(msg) => write!(f, "warning: {msg}"),
            SyncEvent::Applied(slug, class) => write!(f, "applied {class} for '{slug}'"),
            SyncEvent::Failed(slug, class, reason) => {
                write!(f, "failed {class} for '{slug}': {reason}")
            }
        }
    }
}
