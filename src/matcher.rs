//! Correspondence between local documents and remote records.
//!
//! Matching is keyed on the slug each side embeds in its metadata block.
//! Entries without a slug are invisible to the sync mechanism: they land in
//! no partition at all. Duplicate slugs resolve to first-encountered-wins and
//! are reported as a data-integrity warning rather than a hard failure.

use std::collections::HashMap;

use crate::{
    event::SyncEvent,
    properties::{LocalDocument, RemoteRecord},
};

/// The match partition. Disjoint and exhaustive over slugged inputs: every
/// document or record carrying a slug appears in exactly one field.
#[derive(Debug, Clone, Default)]
pub struct MatchSet {
    /// Present locally, no remote counterpart. Upload candidates.
    pub new_local: Vec<LocalDocument>,
    /// Present remotely, no local counterpart. Download candidates.
    pub new_remote: Vec<RemoteRecord>,
    /// Both sides present, keyed by the shared slug.
    pub paired: Vec<(LocalDocument, RemoteRecord)>,
}

impl MatchSet {
    pub fn counts(&self) -> SyncEvent {
        SyncEvent::Matched(self.new_local.len(), self.new_remote.len(), self.paired.len())
    }
}

/// Partitions the inputs by slug in O(n+m) time via a hash index.
///
/// Warnings (duplicate slugs) are returned alongside so the driver can emit
/// them as status events; a duplicate never aborts the run.
pub fn match_documents(
    local: Vec<LocalDocument>,
    remote: Vec<RemoteRecord>,
) -> (MatchSet, Vec<SyncEvent>) {
    let mut warnings = Vec::new();

    // Index remote records by slug, skipping the slug-less and keeping the
    // first record for any duplicate.
    let mut remote_index: HashMap<String, usize> = HashMap::with_capacity(remote.len());
    for (idx, record) in remote.iter().enumerate() {
        let Some(slug) = record.slug() else {
            tracing::debug!(
                "Remote record #{} has no parseable slug; excluded from matching",
                record.number
            );
            continue;
        };
        if remote_index.contains_key(&slug) {
            tracing::warn!("Duplicate slug '{slug}' on remote record #{}", record.number);
            warnings.push(SyncEvent::DuplicateSlug(
                slug,
                format!("remote #{}", record.number),
            ));
            continue;
        }
        remote_index.insert(slug, idx);
    }

    let mut matched = vec![false; remote.len()];
    let mut new_local = Vec::new();
    let mut paired_slots: Vec<(LocalDocument, usize)> = Vec::new();
    let mut seen_local: HashMap<String, ()> = HashMap::new();

    for doc in local {
        let Some(slug) = doc.slug().map(str::to_string) else {
            tracing::debug!("{:?} has no slug; excluded from matching", doc.path);
            continue;
        };
        if seen_local.insert(slug.clone(), ()).is_some() {
            tracing::warn!("Duplicate slug '{slug}' in {:?}", doc.path);
            warnings.push(SyncEvent::DuplicateSlug(
                slug,
                format!("{:?}", doc.path),
            ));
            continue;
        }
        match remote_index.get(&slug) {
            Some(&idx) => {
                matched[idx] = true;
                paired_slots.push((doc, idx));
            }
            None => new_local.push(doc),
        }
    }

    // Reunite paired locals with their records while draining the remainder
    // into new_remote, preserving the remote listing order for both.
    let mut paired = Vec::with_capacity(paired_slots.len());
    let mut new_remote = Vec::new();
    let mut remote_slots: Vec<Option<RemoteRecord>> = remote.into_iter().map(Some).collect();
    for (doc, idx) in paired_slots {
        let record = remote_slots[idx].take().expect("paired index taken once");
        paired.push((doc, record));
    }
    for (idx, slot) in remote_slots.into_iter().enumerate() {
        if let Some(record) = slot {
            if !matched[idx] && record.slug().is_some() && !is_duplicate(&record, &remote_index, idx)
            {
                new_remote.push(record);
            }
        }
    }

    (
        MatchSet {
            new_local,
            new_remote,
            paired,
        },
        warnings,
    )
}

/// A record whose slug indexed to a different position lost a duplicate-slug
/// tie and stays out of every partition's mutation path.
fn is_duplicate(record: &RemoteRecord, index: &HashMap<String, usize>, idx: usize) -> bool {
    record
        .slug()
        .and_then(|slug| index.get(&slug).copied())
        .is_some_and(|winner| winner != idx)
}
