//! Remote record directory.
//!
//! Everything the core knows about the remote system flows through a single
//! transport primitive: execute one query or mutation document with its
//! variables and a credential, get back the raw JSON payload. Pagination,
//! payload decoding, and error classification live here; HTTP mechanics,
//! retries, and timeouts belong to the transport collaborator. Each page
//! request is an independently retryable idempotent read.

use async_trait::async_trait;
use serde::{de::DeserializeOwned, Deserialize};
use serde_json::{json, Value as JsonValue};

use crate::{
    config::Credential,
    error::ParleyError,
    properties::{Category, Label, RemoteRecord, RepositoryInfo},
};

/// Records fetched per page. The remote caps page sizes well above this; the
/// value only bounds payload sizes.
const PAGE_SIZE: u32 = 50;

/// Color assigned to labels this crate creates. The remote requires one; the
/// value is cosmetic and deliberately constant so planning stays
/// deterministic.
const DEFAULT_LABEL_COLOR: &str = "ededed";

/// The single query execution primitive the core consumes.
///
/// Implementations map transport-level failures (connection refused, DNS,
/// non-2xx statuses) to [`ParleyError::RemoteUnavailable`] and return the
/// full response payload, `errors` array included, without interpreting it.
#[async_trait]
pub trait RemoteTransport: Send + Sync {
    async fn execute(
        &self,
        document: &str,
        variables: JsonValue,
        credential: &Credential,
    ) -> Result<JsonValue, ParleyError>;
}

pub const REPOSITORY_INFO_QUERY: &str = r#"
query RepositoryInfo($owner: String!, $name: String!) {
  repository(owner: $owner, name: $name) {
    id
    discussionCategories(first: 25) { nodes { id name } }
    labels(first: 100) { nodes { id name } }
  }
}"#;

pub const RECORDS_QUERY: &str = r#"
query Records($owner: String!, $name: String!, $first: Int!, $after: String, $categoryId: ID) {
  repository(owner: $owner, name: $name) {
    discussions(first: $first, after: $after, categoryId: $categoryId) {
      pageInfo { hasNextPage endCursor }
      nodes {
        id
        number
        title
        body
        createdAt
        updatedAt
        category { id name }
        labels(first: 50) { nodes { id name } }
      }
    }
  }
}"#;

pub const CREATE_RECORD_MUTATION: &str = r#"
mutation CreateRecord($repositoryId: ID!, $categoryId: ID!, $title: String!, $body: String!) {
  createDiscussion(input: {repositoryId: $repositoryId, categoryId: $categoryId, title: $title, body: $body}) {
    discussion { id number }
  }
}"#;

pub const UPDATE_RECORD_MUTATION: &str = r#"
mutation UpdateRecord($recordId: ID!, $body: String!) {
  updateDiscussion(input: {discussionId: $recordId, body: $body}) {
    discussion { id }
  }
}"#;

pub const CREATE_LABEL_MUTATION: &str = r#"
mutation CreateLabel($repositoryId: ID!, $name: String!, $color: String!) {
  createLabel(input: {repositoryId: $repositoryId, name: $name, color: $color}) {
    label { id name }
  }
}"#;

pub const ADD_LABELS_MUTATION: &str = r#"
mutation AddLabels($recordId: ID!, $labelIds: [ID!]!) {
  addLabelsToLabelable(input: {labelableId: $recordId, labelIds: $labelIds}) {
    clientMutationId
  }
}"#;

pub const REMOVE_LABELS_MUTATION: &str = r#"
mutation RemoveLabels($recordId: ID!, $labelIds: [ID!]!) {
  removeLabelsFromLabelable(input: {labelableId: $recordId, labelIds: $labelIds}) {
    clientMutationId
  }
}"#;

/// Classification filter for record listing.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RecordFilter {
    pub category_id: Option<String>,
}

// Wire shapes. Every query response gets an explicit record type decoded at
// this boundary; decode failure is a RemoteQueryError.

#[derive(Debug, Deserialize)]
struct Nodes<T> {
    #[serde(default = "Vec::new")]
    nodes: Vec<T>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct PageInfo {
    has_next_page: bool,
    end_cursor: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct RepositoryInfoWire {
    id: String,
    discussion_categories: Nodes<Category>,
    labels: Nodes<Label>,
}

#[derive(Debug, Deserialize)]
struct RepositoryInfoData {
    repository: RepositoryInfoWire,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct RecordWire {
    id: String,
    number: u64,
    title: String,
    body: String,
    created_at: String,
    updated_at: String,
    category: Option<Category>,
    labels: Option<Nodes<Label>>,
}

impl From<RecordWire> for RemoteRecord {
    fn from(wire: RecordWire) -> RemoteRecord {
        RemoteRecord {
            id: wire.id,
            number: wire.number,
            title: wire.title,
            body: wire.body,
            labels: wire.labels.map(|n| n.nodes).unwrap_or_default(),
            category: wire.category,
            created_at: wire.created_at,
            updated_at: wire.updated_at,
        }
    }
}

#[derive(Debug, Deserialize)]
struct RecordsPage {
    #[serde(rename = "pageInfo")]
    page_info: PageInfo,
    nodes: Vec<RecordWire>,
}

#[derive(Debug, Deserialize)]
struct RecordsRepository {
    discussions: RecordsPage,
}

#[derive(Debug, Deserialize)]
struct RecordsData {
    repository: RecordsRepository,
}

#[derive(Debug, Deserialize)]
struct CreatedRecord {
    id: String,
    number: u64,
}

#[derive(Debug, Deserialize)]
struct CreateRecordResult {
    discussion: CreatedRecord,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct CreateRecordData {
    create_discussion: CreateRecordResult,
}

#[derive(Debug, Deserialize)]
struct CreateLabelResult {
    label: Label,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct CreateLabelData {
    create_label: CreateLabelResult,
}

/// Separates the error payload from the data payload and decodes the latter
/// into its typed record.
fn decode_payload<T: DeserializeOwned>(payload: JsonValue) -> Result<T, ParleyError> {
    if let Some(errors) = payload.get("errors").and_then(JsonValue::as_array) {
        if let Some(first) = errors.first() {
            let message = first
                .get("message")
                .and_then(JsonValue::as_str)
                .unwrap_or("unspecified remote error");
            return Err(ParleyError::RemoteQueryError(message.to_string()));
        }
    }
    let data = payload
        .get("data")
        .cloned()
        .ok_or_else(|| ParleyError::RemoteQueryError("response carries no data".to_string()))?;
    serde_json::from_value(data).map_err(|e| ParleyError::RemoteQueryError(format!("{e}")))
}

/// Read/write access to the full set of remote records for one repository.
pub struct RemoteDirectory<T: RemoteTransport> {
    transport: T,
    credential: Credential,
    owner: String,
    repo_name: String,
}

impl<T: RemoteTransport> RemoteDirectory<T> {
    pub fn new(
        transport: T,
        credential: Credential,
        owner: impl Into<String>,
        repo_name: impl Into<String>,
    ) -> Self {
        RemoteDirectory {
            transport,
            credential,
            owner: owner.into(),
            repo_name: repo_name.into(),
        }
    }

    async fn execute<D: DeserializeOwned>(
        &self,
        document: &str,
        variables: JsonValue,
    ) -> Result<D, ParleyError> {
        let payload = self
            .transport
            .execute(document, variables, &self.credential)
            .await?;
        decode_payload(payload)
    }

    /// One fetch per run: repository id, categories, and the label seed for
    /// the known-labels cache.
    pub async fn repository_info(&self) -> Result<RepositoryInfo, ParleyError> {
        let data: RepositoryInfoData = self
            .execute(
                REPOSITORY_INFO_QUERY,
                json!({ "owner": self.owner, "name": self.repo_name }),
            )
            .await?;
        Ok(RepositoryInfo {
            id: data.repository.id,
            categories: data.repository.discussion_categories.nodes,
            labels: data.repository.labels.nodes,
        })
    }

    /// Pages through the record listing until the cursor is exhausted.
    pub async fn fetch_all_records(
        &self,
        filter: &RecordFilter,
    ) -> Result<Vec<RemoteRecord>, ParleyError> {
        let mut records = Vec::new();
        let mut cursor: Option<String> = None;
        loop {
            let data: RecordsData = self
                .execute(
                    RECORDS_QUERY,
                    json!({
                        "owner": self.owner,
                        "name": self.repo_name,
                        "first": PAGE_SIZE,
                        "after": cursor,
                        "categoryId": filter.category_id,
                    }),
                )
                .await?;
            let page = data.repository.discussions;
            records.extend(page.nodes.into_iter().map(RemoteRecord::from));
            if !page.page_info.has_next_page {
                break;
            }
            cursor = page.page_info.end_cursor;
            if cursor.is_none() {
                tracing::warn!("Remote reported a next page without a cursor; stopping");
                break;
            }
        }
        tracing::debug!(
            "Fetched {} remote record(s) for {}/{}",
            records.len(),
            self.owner,
            self.repo_name
        );
        Ok(records)
    }

    /// Returns the (id, number) of the created record.
    pub async fn create_record(
        &self,
        repository_id: &str,
        category_id: &str,
        title: &str,
        body: &str,
    ) -> Result<(String, u64), ParleyError> {
        let data: CreateRecordData = self
            .execute(
                CREATE_RECORD_MUTATION,
                json!({
                    "repositoryId": repository_id,
                    "categoryId": category_id,
                    "title": title,
                    "body": body,
                }),
            )
            .await?;
        Ok((
            data.create_discussion.discussion.id,
            data.create_discussion.discussion.number,
        ))
    }

    pub async fn update_record_body(
        &self,
        record_id: &str,
        body: &str,
    ) -> Result<(), ParleyError> {
        let _: JsonValue = self
            .execute(
                UPDATE_RECORD_MUTATION,
                json!({ "recordId": record_id, "body": body }),
            )
            .await?;
        Ok(())
    }

    pub async fn create_label(
        &self,
        repository_id: &str,
        name: &str,
    ) -> Result<Label, ParleyError> {
        let data: CreateLabelData = self
            .execute(
                CREATE_LABEL_MUTATION,
                json!({
                    "repositoryId": repository_id,
                    "name": name,
                    "color": DEFAULT_LABEL_COLOR,
                }),
            )
            .await?;
        Ok(data.create_label.label)
    }

    pub async fn add_labels(
        &self,
        record_id: &str,
        label_ids: &[String],
    ) -> Result<(), ParleyError> {
        if label_ids.is_empty() {
            return Ok(());
        }
        let _: JsonValue = self
            .execute(
                ADD_LABELS_MUTATION,
                json!({ "recordId": record_id, "labelIds": label_ids }),
            )
            .await?;
        Ok(())
    }

    pub async fn remove_labels(
        &self,
        record_id: &str,
        label_ids: &[String],
    ) -> Result<(), ParleyError> {
        if label_ids.is_empty() {
            return Ok(());
        }
        let _: JsonValue = self
            .execute(
                REMOVE_LABELS_MUTATION,
                json!({ "recordId": record_id, "labelIds": label_ids }),
            )
            .await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use parking_lot::Mutex;

    /// Replays canned payloads in order.
    struct ScriptedTransport {
        payloads: Mutex<Vec<JsonValue>>,
    }

    impl ScriptedTransport {
        fn new(mut payloads: Vec<JsonValue>) -> Self {
            payloads.reverse();
            ScriptedTransport {
                payloads: Mutex::new(payloads),
            }
        }
    }

    #[async_trait]
    impl RemoteTransport for ScriptedTransport {
        async fn execute(
            &self,
            _document: &str,
            _variables: JsonValue,
            _credential: &Credential,
        ) -> Result<JsonValue, ParleyError> {
            self.payloads
                .lock()
                .pop()
                .ok_or_else(|| ParleyError::RemoteUnavailable("script exhausted".to_string()))
        }
    }

    fn directory(payloads: Vec<JsonValue>) -> RemoteDirectory<ScriptedTransport> {
        RemoteDirectory::new(
            ScriptedTransport::new(payloads),
            Credential::new("token").unwrap(),
            "buildonomy",
            "parley",
        )
    }

    fn record_node(id: &str, number: u64, slug: &str) -> JsonValue {
        json!({
            "id": id,
            "number": number,
            "title": format!("Record {number}"),
            "body": format!("---\nslug: {slug}\n---\nbody"),
            "createdAt": "2024-01-01T00:00:00Z",
            "updatedAt": "2024-01-02T00:00:00Z",
            "category": { "id": "C_1", "name": "Articles" },
            "labels": { "nodes": [{ "id": "L_1", "name": "tag/go" }] },
        })
    }

    #[tokio::test]
    async fn fetch_all_records_follows_the_cursor() -> Result<(), ParleyError> {
        let dir = directory(vec![
            json!({ "data": { "repository": { "discussions": {
                "pageInfo": { "hasNextPage": true, "endCursor": "cursor-1" },
                "nodes": [record_node("D_1", 1, "one")],
            }}}}),
            json!({ "data": { "repository": { "discussions": {
                "pageInfo": { "hasNextPage": false, "endCursor": null },
                "nodes": [record_node("D_2", 2, "two")],
            }}}}),
        ]);
        let records = dir.fetch_all_records(&RecordFilter::default()).await?;
        assert_eq!(records.len(), 2);
        assert_eq!(records[0].slug().as_deref(), Some("one"));
        assert_eq!(records[1].labels[0].name, "tag/go");
        Ok(())
    }

    #[tokio::test]
    async fn error_payload_surfaces_first_message() {
        let dir = directory(vec![json!({
            "errors": [
                { "message": "Could not resolve to a Repository" },
                { "message": "secondary" },
            ]
        })]);
        let err = dir.repository_info().await.unwrap_err();
        assert_eq!(
            err,
            ParleyError::RemoteQueryError("Could not resolve to a Repository".to_string())
        );
    }

    #[tokio::test]
    async fn malformed_data_payload_is_a_query_error() {
        let dir = directory(vec![json!({ "data": { "repository": { "id": 42 } } })]);
        assert!(matches!(
            dir.repository_info().await,
            Err(ParleyError::RemoteQueryError(_))
        ));
    }
}
