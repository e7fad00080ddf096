//! Mutation planning.
//!
//! The planner turns a match partition into the minimal set of create and
//! update operations for one sync direction. Plans contain no pending I/O and
//! are deterministic: the same inputs always produce the same plan, ordered
//! by the match partition and sorted label sets.
//!
//! For matched pairs the three mutation classes (frontmatter, content,
//! labels) are computed and carried separately so the confirmation layer can
//! accept or reject each class without affecting the others. A content
//! operation never rewrites the other side's metadata block; a frontmatter
//! operation never touches body text.

use serde_yaml::{Mapping, Value};
use std::{
    collections::{BTreeMap, BTreeSet},
    path::{Path, PathBuf},
};

use crate::{
    codec::{to_local_date, to_remote_date},
    event::SyncEvent,
    labels::{from_labels, reconcile_labels, to_labels, LabelDiff, LabelPrefixes},
    matcher::MatchSet,
    properties::{
        meta_str, LocalDocument, RemoteRecord, KEY_DESCRIPTION, KEY_PUBLISHED, KEY_SLUG,
    },
    storage::sanitized_file_name,
};

/// Repository-level context threaded into upload planning: resolved ids plus
/// a snapshot of the known labels. No shared globals; every call receives the
/// context it plans against.
#[derive(Debug, Clone)]
pub struct RepoContext {
    pub repository_id: String,
    pub category_id: String,
    pub prefixes: LabelPrefixes,
    /// Label name → id, seeded from the repository info fetch.
    pub known_labels: BTreeMap<String, String>,
}

/// Create one remote record from a new-local document.
#[derive(Debug, Clone, PartialEq)]
pub struct RemoteCreate {
    pub slug: String,
    pub title: String,
    /// Remote-format metadata block (slug, description, remote-format date)
    /// followed by the local body.
    pub body: String,
    /// Label names to attach once the record exists, sorted.
    pub attach: Vec<String>,
}

/// Gated mutations for one matched pair, upload direction.
#[derive(Debug, Clone, PartialEq)]
pub struct RemotePairPlan {
    pub slug: String,
    pub remote_id: String,
    /// The record's current metadata block, raw bytes with delimiters. When
    /// the frontmatter class does not fire this text is carried forward
    /// unchanged, so comments and scalar quoting in the block survive a
    /// content-only update.
    pub base_header: String,
    /// The record's current free-text body.
    pub base_body: String,
    /// Class 1: replacement metadata block, present when the
    /// classification-relevant fields differ.
    pub frontmatter: Option<Mapping>,
    /// Class 2: replacement free text (the local body), present when the
    /// bodies differ.
    pub content: Option<String>,
    /// Class 3: label additions and removals within the managed namespace.
    pub labels: LabelDiff,
}

impl RemotePairPlan {
    pub fn is_noop(&self) -> bool {
        self.frontmatter.is_none() && self.content.is_none() && self.labels.is_empty()
    }
}

/// The upload-direction mutation plan.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct UploadPlan {
    pub creates: Vec<RemoteCreate>,
    /// Labels referenced by the plan but unknown to the repository; each
    /// needs a create before any attach can reference it. Sorted.
    pub label_creates: Vec<String>,
    pub pairs: Vec<RemotePairPlan>,
}

impl UploadPlan {
    pub fn is_empty(&self) -> bool {
        self.creates.is_empty() && self.pairs.iter().all(RemotePairPlan::is_noop)
    }
}

/// Create one local article from a new-remote record.
#[derive(Debug, Clone, PartialEq)]
pub struct LocalCreate {
    pub slug: String,
    pub path: PathBuf,
    /// Full article text: local-format metadata plus the remote body copied
    /// verbatim.
    pub text: String,
}

/// Gated mutations for one matched pair, download direction. Labels fold into
/// the frontmatter class locally, so there are two classes here.
#[derive(Debug, Clone, PartialEq)]
pub struct LocalPairPlan {
    pub slug: String,
    pub path: PathBuf,
    /// The article's on-disk metadata block, raw bytes with delimiters.
    /// Carried forward unchanged when the frontmatter class does not fire.
    pub base_header: String,
    pub base_body: String,
    pub frontmatter: Option<Mapping>,
    pub content: Option<String>,
}

impl LocalPairPlan {
    pub fn is_noop(&self) -> bool {
        self.frontmatter.is_none() && self.content.is_none()
    }
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct DownloadPlan {
    pub creates: Vec<LocalCreate>,
    pub pairs: Vec<LocalPairPlan>,
}

impl DownloadPlan {
    pub fn is_empty(&self) -> bool {
        self.creates.is_empty() && self.pairs.iter().all(LocalPairPlan::is_noop)
    }
}

/// Converts a date with [`SyncEvent::Warning`] fallback: an unconvertible
/// date is carried through unchanged rather than aborting the document.
fn convert_date(
    value: &str,
    convert: fn(&str) -> Result<String, crate::error::ParleyError>,
    slug: &str,
    warnings: &mut Vec<SyncEvent>,
) -> String {
    match convert(value) {
        Ok(converted) => converted,
        Err(e) => {
            tracing::warn!("'{slug}': {e}; keeping date as-is");
            warnings.push(SyncEvent::Warning(format!("'{slug}': {e}")));
            value.to_string()
        }
    }
}

fn set_str(metadata: &mut Mapping, key: &str, value: &str) {
    metadata.insert(
        Value::String(key.to_string()),
        Value::String(value.to_string()),
    );
}

/// The remote-format metadata block for an uploaded document: slug,
/// description, and the remote-format published date, in that order.
fn remote_metadata(
    doc: &LocalDocument,
    slug: &str,
    warnings: &mut Vec<SyncEvent>,
) -> Mapping {
    let mut metadata = Mapping::new();
    set_str(&mut metadata, KEY_SLUG, slug);
    if let Some(description) = doc.description() {
        set_str(&mut metadata, KEY_DESCRIPTION, description);
    }
    if let Some(published) = doc.published() {
        let converted = convert_date(published, to_remote_date, slug, warnings);
        set_str(&mut metadata, KEY_PUBLISHED, &converted);
    }
    metadata
}

/// Computes the upload-direction plan.
///
/// New-local documents become record creations (with the label creates and
/// attaches they imply); matched pairs get their three gated classes. The
/// returned events carry the warnings planning produced.
pub fn plan_upload(set: &MatchSet, ctx: &RepoContext) -> (UploadPlan, Vec<SyncEvent>) {
    let mut warnings = Vec::new();
    let mut plan = UploadPlan::default();
    let mut referenced_labels: BTreeSet<String> = BTreeSet::new();

    for doc in &set.new_local {
        let Some(slug) = doc.slug().map(str::to_string) else {
            continue;
        };
        let metadata = remote_metadata(doc, &slug, &mut warnings);
        let body = match crate::codec::serialize(&metadata, &doc.body) {
            Ok(body) => body,
            Err(e) => {
                warnings.push(SyncEvent::DocumentSkipped(doc.path.clone(), format!("{e}")));
                continue;
            }
        };
        let desired = to_labels(&doc.classification(), &ctx.prefixes);
        referenced_labels.extend(desired.iter().cloned());
        plan.creates.push(RemoteCreate {
            slug,
            title: doc.title(),
            body,
            attach: desired.into_iter().collect(),
        });
    }

    for (doc, record) in &set.paired {
        let Some(slug) = doc.slug().map(str::to_string) else {
            continue;
        };
        let (base_metadata, base_body) = match record.parts() {
            Ok(parts) => parts,
            Err(e) => {
                warnings.push(SyncEvent::Warning(format!("'{slug}': {e}")));
                continue;
            }
        };
        let base_header = match crate::codec::split(&record.body) {
            Ok((header, _)) => header.to_string(),
            Err(e) => {
                warnings.push(SyncEvent::Warning(format!("'{slug}': {e}")));
                continue;
            }
        };

        // Class 1: update only the classification-relevant fields inside the
        // remote metadata block; every other key the remote side carries is
        // preserved.
        let mut desired_metadata = base_metadata.clone();
        set_str(&mut desired_metadata, KEY_SLUG, &slug);
        match doc.description() {
            Some(description) => set_str(&mut desired_metadata, KEY_DESCRIPTION, description),
            None => {
                desired_metadata.remove(Value::String(KEY_DESCRIPTION.to_string()));
            }
        }
        match doc.published() {
            Some(published) => {
                let converted = convert_date(published, to_remote_date, &slug, &mut warnings);
                set_str(&mut desired_metadata, KEY_PUBLISHED, &converted);
            }
            None => {
                desired_metadata.remove(Value::String(KEY_PUBLISHED.to_string()));
            }
        }
        let frontmatter = (desired_metadata != base_metadata).then_some(desired_metadata);

        // Class 2: the free-text portion only.
        let content = (doc.body != base_body).then(|| doc.body.clone());

        // Class 3: managed-namespace label diff.
        let desired_labels = to_labels(&doc.classification(), &ctx.prefixes);
        referenced_labels.extend(desired_labels.iter().cloned());
        let labels = reconcile_labels(&desired_labels, &record.labels, &ctx.prefixes);

        plan.pairs.push(RemotePairPlan {
            slug,
            remote_id: record.id.clone(),
            base_header,
            base_body,
            frontmatter,
            content,
            labels,
        });
    }

    plan.label_creates = referenced_labels
        .into_iter()
        .filter(|name| !ctx.known_labels.contains_key(name))
        .collect();

    (plan, warnings)
}

/// The local-format metadata for a downloaded record: the remote block with
/// its date converted, plus the classification carried by the record's
/// labels.
fn local_metadata(
    record: &RemoteRecord,
    base: &Mapping,
    slug: &str,
    prefixes: &LabelPrefixes,
    warnings: &mut Vec<SyncEvent>,
) -> Mapping {
    let mut metadata = base.clone();
    set_str(&mut metadata, KEY_SLUG, slug);
    if let Some(published) = meta_str(&metadata, KEY_PUBLISHED).map(str::to_string) {
        let converted = convert_date(&published, to_local_date, slug, warnings);
        set_str(&mut metadata, KEY_PUBLISHED, &converted);
    }
    let (classification, series_warnings) = from_labels(record.label_names(), prefixes);
    for warning in series_warnings {
        warnings.push(SyncEvent::Warning(format!("'{slug}': {warning}")));
    }
    classification.apply_to_metadata(&mut metadata);
    metadata
}

/// Computes the download-direction plan: local creations for new-remote
/// records and gated local updates for matched pairs.
pub fn plan_download(
    set: &MatchSet,
    articles_root: &Path,
    prefixes: &LabelPrefixes,
) -> (DownloadPlan, Vec<SyncEvent>) {
    let mut warnings = Vec::new();
    let mut plan = DownloadPlan::default();

    for record in &set.new_remote {
        let Some(slug) = record.slug() else {
            continue;
        };
        let (remote_metadata, remote_body) = match record.parts() {
            Ok(parts) => parts,
            Err(e) => {
                warnings.push(SyncEvent::Warning(format!("'{slug}': {e}")));
                continue;
            }
        };
        let metadata = local_metadata(record, &remote_metadata, &slug, prefixes, &mut warnings);
        let text = match crate::codec::serialize(&metadata, &remote_body) {
            Ok(text) => text,
            Err(e) => {
                warnings.push(SyncEvent::Warning(format!("'{slug}': {e}")));
                continue;
            }
        };
        plan.creates.push(LocalCreate {
            path: articles_root.join(sanitized_file_name(&record.title, &slug)),
            slug,
            text,
        });
    }

    for (doc, record) in &set.paired {
        let Some(slug) = doc.slug().map(str::to_string) else {
            continue;
        };
        let (remote_metadata, remote_body) = match record.parts() {
            Ok(parts) => parts,
            Err(e) => {
                warnings.push(SyncEvent::Warning(format!("'{slug}': {e}")));
                continue;
            }
        };

        // Class 1: pull description, date, and label-derived classification
        // into the local block; unrelated local keys stay put.
        let mut desired_metadata = doc.metadata.clone();
        match meta_str(&remote_metadata, KEY_DESCRIPTION) {
            Some(description) => set_str(&mut desired_metadata, KEY_DESCRIPTION, description),
            None => {
                desired_metadata.remove(Value::String(KEY_DESCRIPTION.to_string()));
            }
        }
        match meta_str(&remote_metadata, KEY_PUBLISHED) {
            Some(published) => {
                let converted = convert_date(published, to_local_date, &slug, &mut warnings);
                set_str(&mut desired_metadata, KEY_PUBLISHED, &converted);
            }
            None => {
                desired_metadata.remove(Value::String(KEY_PUBLISHED.to_string()));
            }
        }
        let (classification, series_warnings) = from_labels(record.label_names(), prefixes);
        for warning in series_warnings {
            warnings.push(SyncEvent::Warning(format!("'{slug}': {warning}")));
        }
        classification.apply_to_metadata(&mut desired_metadata);
        let frontmatter = (desired_metadata != doc.metadata).then_some(desired_metadata);

        // Class 2: the remote free text replaces the local body.
        let content = (remote_body != doc.body).then_some(remote_body);

        plan.pairs.push(LocalPairPlan {
            slug,
            path: doc.path.clone(),
            base_header: doc.header.clone(),
            base_body: doc.body.clone(),
            frontmatter,
            content,
        });
    }

    (plan, warnings)
}
