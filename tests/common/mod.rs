//! Common utilities for sync integration tests: a scripted in-memory
//! transport plus payload builders for the wire shapes.
#![allow(dead_code)]

use async_trait::async_trait;
use parking_lot::Mutex;
use serde_json::{json, Value as JsonValue};
use std::{
    collections::VecDeque,
    path::Path,
    sync::{
        atomic::{AtomicU64, Ordering},
        Arc,
    },
};

use parley_sync::{
    config::{Credential, SyncConfig},
    error::ParleyError,
    event::SyncEvent,
    remote::{RemoteDirectory, RemoteTransport},
    storage::FsArticleStore,
    sync::SyncSession,
};
use tokio::sync::mpsc::UnboundedSender;

pub fn repository_payload(categories: &[(&str, &str)], labels: &[(&str, &str)]) -> JsonValue {
    json!({ "data": { "repository": {
        "id": "R_1",
        "discussionCategories": { "nodes": categories
            .iter()
            .map(|(id, name)| json!({ "id": id, "name": name }))
            .collect::<Vec<_>>() },
        "labels": { "nodes": labels
            .iter()
            .map(|(id, name)| json!({ "id": id, "name": name }))
            .collect::<Vec<_>>() },
    }}})
}

pub fn record_node(id: &str, number: u64, title: &str, body: &str, labels: &[(&str, &str)]) -> JsonValue {
    json!({
        "id": id,
        "number": number,
        "title": title,
        "body": body,
        "createdAt": "2024-01-01T00:00:00Z",
        "updatedAt": "2024-01-03T00:00:00Z",
        "category": { "id": "C_1", "name": "Articles" },
        "labels": { "nodes": labels
            .iter()
            .map(|(id, name)| json!({ "id": id, "name": name }))
            .collect::<Vec<_>>() },
    })
}

pub fn records_page(nodes: Vec<JsonValue>, has_next: bool, cursor: Option<&str>) -> JsonValue {
    json!({ "data": { "repository": { "discussions": {
        "pageInfo": { "hasNextPage": has_next, "endCursor": cursor },
        "nodes": nodes,
    }}}})
}

/// In-memory transport: canned repository info and record pages, fabricated
/// mutation results, and a full call log for assertions.
pub struct MockRemote {
    repository: JsonValue,
    pages: Mutex<VecDeque<JsonValue>>,
    pub calls: Arc<Mutex<Vec<(String, JsonValue)>>>,
    counter: AtomicU64,
}

impl MockRemote {
    pub fn new(repository: JsonValue, pages: Vec<JsonValue>) -> Self {
        MockRemote {
            repository,
            pages: Mutex::new(pages.into()),
            calls: Arc::new(Mutex::new(Vec::new())),
            counter: AtomicU64::new(0),
        }
    }

    fn operation(document: &str) -> String {
        document
            .split_whitespace()
            .nth(1)
            .unwrap_or_default()
            .split('(')
            .next()
            .unwrap_or_default()
            .to_string()
    }
}

/// Snapshot of the calls matching one operation name.
pub fn calls_named(calls: &Arc<Mutex<Vec<(String, JsonValue)>>>, op: &str) -> Vec<JsonValue> {
    calls
        .lock()
        .iter()
        .filter(|(name, _)| name == op)
        .map(|(_, vars)| vars.clone())
        .collect()
}

#[async_trait]
impl RemoteTransport for MockRemote {
    async fn execute(
        &self,
        document: &str,
        variables: JsonValue,
        _credential: &Credential,
    ) -> Result<JsonValue, ParleyError> {
        let op = MockRemote::operation(document);
        self.calls.lock().push((op.clone(), variables.clone()));
        match op.as_str() {
            "RepositoryInfo" => Ok(self.repository.clone()),
            "Records" => Ok(self
                .pages
                .lock()
                .pop_front()
                .unwrap_or_else(|| records_page(vec![], false, None))),
            "CreateRecord" => {
                let n = self.counter.fetch_add(1, Ordering::SeqCst) + 1;
                Ok(json!({ "data": { "createDiscussion": { "discussion": {
                    "id": format!("D_new_{n}"),
                    "number": 100 + n,
                }}}}))
            }
            "CreateLabel" => {
                let name = variables["name"].as_str().unwrap_or_default().to_string();
                Ok(json!({ "data": { "createLabel": { "label": {
                    "id": format!("L_{name}"),
                    "name": name,
                }}}}))
            }
            "UpdateRecord" | "AddLabels" | "RemoveLabels" => {
                Ok(json!({ "data": { "clientMutationId": null } }))
            }
            other => Err(ParleyError::RemoteUnavailable(format!(
                "unscripted operation '{other}'"
            ))),
        }
    }
}

pub fn test_config(root: &Path) -> SyncConfig {
    SyncConfig {
        articles_root: root.to_path_buf(),
        owner: "buildonomy".to_string(),
        repo_name: "parley".to_string(),
        category_name: "Articles".to_string(),
        draft_label: "state/draft".to_string(),
        tag_prefix: "tag/".to_string(),
        series_prefix: "series/".to_string(),
    }
}

pub fn session(root: &Path, remote: MockRemote) -> SyncSession<MockRemote, FsArticleStore> {
    build_session(root, remote, None)
}

pub fn session_with_events(
    root: &Path,
    remote: MockRemote,
    event_tx: UnboundedSender<SyncEvent>,
) -> SyncSession<MockRemote, FsArticleStore> {
    build_session(root, remote, Some(event_tx))
}

fn build_session(
    root: &Path,
    remote: MockRemote,
    event_tx: Option<UnboundedSender<SyncEvent>>,
) -> SyncSession<MockRemote, FsArticleStore> {
    let config = test_config(root);
    let directory = RemoteDirectory::new(
        remote,
        Credential::new("test-token").expect("non-empty token"),
        config.owner.clone(),
        config.repo_name.clone(),
    );
    let store = FsArticleStore::new(root).expect("tempdir root exists");
    SyncSession::new(directory, store, config, event_tx)
}

pub fn write_article(root: &Path, name: &str, text: &str) {
    std::fs::write(root.join(name), text).expect("write test article");
}
