//! Translation between local classification attributes and the flat remote
//! label set, plus the diffing that keeps the two aligned.
//!
//! Only labels inside the managed namespace (the configured tag and series
//! prefixes, plus the literal draft label) are ever added or removed. Any
//! other label on a remote record belongs to an unrelated concern of the
//! remote system and is preserved unconditionally.

use serde::{Deserialize, Serialize};
use serde_yaml::{Mapping, Value};
use std::collections::BTreeSet;

use crate::properties::{meta_bool, meta_str, meta_str_list, Label, KEY_DRAFT, KEY_SERIES, KEY_TAGS};

/// The configured rendering of classification attributes onto label strings.
///
/// Rendering must stay injective per kind: distinct tags produce distinct
/// strings because the prefix is constant and the value is carried verbatim.
/// Callers are responsible for choosing prefixes that do not shadow each
/// other (e.g. a series prefix that is a prefix of the tag prefix).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LabelPrefixes {
    pub tag: String,
    pub series: String,
    /// Matched literally, not as a prefix.
    pub draft: String,
}

impl LabelPrefixes {
    /// Whether a label name falls inside the managed namespace.
    pub fn is_managed(&self, name: &str) -> bool {
        name.starts_with(&self.tag) || name.starts_with(&self.series) || name == self.draft
    }
}

/// The combination of tags, series, and draft status attached to a document.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Classification {
    pub tags: Vec<String>,
    pub series: Option<String>,
    pub draft: bool,
}

impl Classification {
    /// Reads classification attributes from a local metadata mapping.
    pub fn from_metadata(metadata: &Mapping) -> Self {
        Classification {
            tags: meta_str_list(metadata, KEY_TAGS),
            series: meta_str(metadata, KEY_SERIES).map(str::to_string),
            draft: meta_bool(metadata, KEY_DRAFT),
        }
    }

    /// Writes classification attributes back into a local metadata mapping,
    /// leaving every other key untouched. The draft key is present iff true,
    /// mirroring the rendering convention for the draft label.
    pub fn apply_to_metadata(&self, metadata: &mut Mapping) {
        if self.tags.is_empty() {
            metadata.remove(Value::String(KEY_TAGS.to_string()));
        } else {
            metadata.insert(
                Value::String(KEY_TAGS.to_string()),
                Value::Sequence(
                    self.tags
                        .iter()
                        .map(|t| Value::String(t.clone()))
                        .collect(),
                ),
            );
        }
        match &self.series {
            Some(series) => {
                metadata.insert(
                    Value::String(KEY_SERIES.to_string()),
                    Value::String(series.clone()),
                );
            }
            None => {
                metadata.remove(Value::String(KEY_SERIES.to_string()));
            }
        }
        if self.draft {
            metadata.insert(Value::String(KEY_DRAFT.to_string()), Value::Bool(true));
        } else {
            metadata.remove(Value::String(KEY_DRAFT.to_string()));
        }
    }

    /// Tag comparison ignores ordering and duplicates.
    pub fn tag_set(&self) -> BTreeSet<&str> {
        self.tags.iter().map(String::as_str).collect()
    }

    /// Order-insensitive equality over all three attributes.
    pub fn same_as(&self, other: &Classification) -> bool {
        self.tag_set() == other.tag_set() && self.series == other.series && self.draft == other.draft
    }
}

/// Renders a classification to its remote label strings.
pub fn to_labels(classification: &Classification, prefixes: &LabelPrefixes) -> BTreeSet<String> {
    let mut labels: BTreeSet<String> = classification
        .tags
        .iter()
        .map(|tag| format!("{}{tag}", prefixes.tag))
        .collect();
    if let Some(series) = &classification.series {
        labels.insert(format!("{}{series}", prefixes.series));
    }
    if classification.draft {
        labels.insert(prefixes.draft.clone());
    }
    labels
}

/// Inverts [`to_labels`]: strips known prefixes and reconstructs the
/// classification. Labels matching no configured prefix pass through
/// untouched — they are simply not part of the result.
///
/// Tags come back deduplicated and sorted. When more than one series-prefixed
/// label is present the first encountered wins and a warning is returned;
/// the paginated label list gives no ordering guarantee, so silently picking
/// one would hide a data-integrity problem.
pub fn from_labels<I, S>(labels: I, prefixes: &LabelPrefixes) -> (Classification, Vec<String>)
where
    I: IntoIterator<Item = S>,
    S: AsRef<str>,
{
    let mut tags = BTreeSet::new();
    let mut series: Option<String> = None;
    let mut draft = false;
    let mut warnings = Vec::new();
    for label in labels {
        let name = label.as_ref();
        if name == prefixes.draft {
            draft = true;
        } else if let Some(tag) = name.strip_prefix(&prefixes.tag) {
            tags.insert(tag.to_string());
        } else if let Some(value) = name.strip_prefix(&prefixes.series) {
            match &series {
                None => series = Some(value.to_string()),
                Some(first) => {
                    tracing::warn!(
                        "Multiple series labels present; keeping '{first}', ignoring '{value}'"
                    );
                    warnings.push(format!(
                        "multiple series labels: keeping '{first}', ignoring '{value}'"
                    ));
                }
            }
        }
    }
    (
        Classification {
            tags: tags.into_iter().collect(),
            series,
            draft,
        },
        warnings,
    )
}

/// Label mutations required to bring a record's managed labels in line with
/// the desired set. `to_add` carries names (ids may not exist yet);
/// `to_remove` carries the full label records so their ids can be echoed into
/// the removal mutation.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct LabelDiff {
    pub to_add: Vec<String>,
    pub to_remove: Vec<Label>,
}

impl LabelDiff {
    pub fn is_empty(&self) -> bool {
        self.to_add.is_empty() && self.to_remove.is_empty()
    }
}

/// Computes the label diff for one record.
///
/// Only managed-namespace labels are candidates for removal; everything else
/// in `current` is preserved. Running the result and reconciling again yields
/// an empty diff, so sync is idempotent.
pub fn reconcile_labels(
    desired: &BTreeSet<String>,
    current: &[Label],
    prefixes: &LabelPrefixes,
) -> LabelDiff {
    let current_names: BTreeSet<&str> = current.iter().map(|l| l.name.as_str()).collect();
    let to_add = desired
        .iter()
        .filter(|name| !current_names.contains(name.as_str()))
        .cloned()
        .collect();
    let mut to_remove: Vec<Label> = current
        .iter()
        .filter(|l| prefixes.is_managed(&l.name) && !desired.contains(&l.name))
        .cloned()
        .collect();
    to_remove.sort_by(|a, b| a.name.cmp(&b.name));
    LabelDiff { to_add, to_remove }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn prefixes() -> LabelPrefixes {
        LabelPrefixes {
            tag: "tag/".to_string(),
            series: "series/".to_string(),
            draft: "state/draft".to_string(),
        }
    }

    fn label(id: &str, name: &str) -> Label {
        Label {
            id: id.to_string(),
            name: name.to_string(),
        }
    }

    #[test]
    fn rendering_and_parsing_are_inverse() {
        let classification = Classification {
            tags: vec!["go".to_string(), "systems".to_string()],
            series: Some("internals".to_string()),
            draft: true,
        };
        let labels = to_labels(&classification, &prefixes());
        assert_eq!(
            labels,
            BTreeSet::from([
                "tag/go".to_string(),
                "tag/systems".to_string(),
                "series/internals".to_string(),
                "state/draft".to_string(),
            ])
        );
        let (parsed, warnings) = from_labels(&labels, &prefixes());
        assert_eq!(parsed, classification);
        assert!(warnings.is_empty());
    }

    #[test]
    fn draft_label_absent_when_not_draft() {
        let classification = Classification::default();
        assert!(to_labels(&classification, &prefixes()).is_empty());
    }

    #[test]
    fn unmatched_labels_are_ignored_on_parse() {
        let (parsed, _) = from_labels(["area/infra", "tag/x"], &prefixes());
        assert_eq!(parsed.tags, vec!["x".to_string()]);
        assert_eq!(parsed.series, None);
        assert!(!parsed.draft);
    }

    #[test]
    fn multiple_series_labels_warn_and_keep_first() {
        let (parsed, warnings) = from_labels(["series/a", "series/b"], &prefixes());
        assert_eq!(parsed.series.as_deref(), Some("a"));
        assert_eq!(warnings.len(), 1);
    }

    #[test]
    fn reconcile_preserves_unrelated_labels() {
        let current = vec![label("L1", "area/infra"), label("L2", "tag/x")];
        let desired = BTreeSet::from(["tag/y".to_string()]);
        let diff = reconcile_labels(&desired, &current, &prefixes());
        assert_eq!(diff.to_add, vec!["tag/y".to_string()]);
        assert_eq!(diff.to_remove, vec![label("L2", "tag/x")]);
    }

    #[test]
    fn reconcile_is_idempotent() {
        let current = vec![label("L1", "tag/x"), label("L2", "area/infra")];
        let desired = BTreeSet::from(["tag/x".to_string()]);
        let diff = reconcile_labels(&desired, &current, &prefixes());
        assert!(diff.is_empty());
    }

    #[test]
    fn metadata_round_trip_through_classification() {
        let mut metadata = Mapping::new();
        metadata.insert(
            Value::String("slug".to_string()),
            Value::String("a".to_string()),
        );
        let classification = Classification {
            tags: vec!["go".to_string()],
            series: Some("internals".to_string()),
            draft: false,
        };
        classification.apply_to_metadata(&mut metadata);
        assert!(Classification::from_metadata(&metadata).same_as(&classification));
        // Unrelated keys survive.
        assert_eq!(meta_str(&metadata, "slug"), Some("a"));
    }
}
