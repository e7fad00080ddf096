//! # parley-sync
//!
//! Bi-directional reconciliation between locally-stored markdown articles and
//! remotely-stored discussion records.
//!
//! ## Overview
//!
//! parley-sync matches local documents (markdown with an embedded YAML
//! metadata block) to remote discussion records by a stable `slug`
//! identifier, computes which side is authoritative for each field, and
//! produces the minimal set of mutations that brings each side into the
//! desired state without destroying unrelated data. It never merges: each
//! run has an explicit direction (upload or download), and matched pairs
//! carry three independently confirmable mutation classes (frontmatter,
//! content, labels) so a host's confirmation layer can accept or reject each
//! on its own.
//!
//! ### Key properties
//!
//! - **Lossless**: unrelated remote labels and unrelated local metadata keys
//!   survive every plan; a content update never rewrites the other side's
//!   metadata block.
//! - **Idempotent**: running a direction twice with no intervening change
//!   plans nothing the second time.
//! - **Deterministic**: the same inputs always produce the same plan; plans
//!   contain no pending I/O.
//! - **Failure isolation**: a malformed document or a failed mutation is
//!   reported and skipped; independent documents keep processing.
//!
//! ## Architecture
//!
//! - [`codec`]: parsing/serialization of the embedded metadata convention and
//!   the two date representations
//! - [`labels`]: classification ↔ label-string mapping and label
//!   reconciliation
//! - [`remote`]: the paginated record directory over a single
//!   query-execution transport primitive
//! - [`matcher`]: slug-keyed partition into new-local / new-remote / paired
//! - [`planner`]: per-partition mutation planning with per-class gating
//! - [`sync`]: run orchestration, precondition checks, and gated apply
//!
//! Host integration points are traits: [`remote::RemoteTransport`] for the
//! query endpoint and [`storage::ArticleStore`] for the document store.
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use parley_sync::{
//!     config::{Credential, SyncConfig},
//!     remote::RemoteDirectory,
//!     storage::FsArticleStore,
//!     sync::{PlanGates, SyncSession},
//! };
//! # use parley_sync::{error::ParleyError, remote::RemoteTransport};
//! # use async_trait::async_trait;
//! # struct HttpTransport;
//! # #[async_trait]
//! # impl RemoteTransport for HttpTransport {
//! #     async fn execute(
//! #         &self,
//! #         _document: &str,
//! #         _variables: serde_json::Value,
//! #         _credential: &Credential,
//! #     ) -> Result<serde_json::Value, ParleyError> {
//! #         unimplemented!()
//! #     }
//! # }
//!
//! #[tokio::main(flavor = "current_thread")]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let config = SyncConfig {
//!         articles_root: "articles".into(),
//!         owner: "buildonomy".into(),
//!         repo_name: "parley".into(),
//!         category_name: "Articles".into(),
//!         draft_label: "state/draft".into(),
//!         tag_prefix: "tag/".into(),
//!         series_prefix: "series/".into(),
//!     };
//!     let credential = Credential::from_env("PARLEY_TOKEN")?;
//!     let directory = RemoteDirectory::new(
//!         HttpTransport,
//!         credential,
//!         config.owner.clone(),
//!         config.repo_name.clone(),
//!     );
//!     let store = FsArticleStore::new(&config.articles_root)?;
//!     let session = SyncSession::new(directory, store, config, None);
//!
//!     // Build the plan, show it to the user, then apply what they accept.
//!     let (plan, ctx) = session.prepare_upload().await?;
//!     let outcome = session.apply_upload(&plan, &ctx, &PlanGates::default()).await?;
//!     println!("applied {} mutation(s)", outcome.applied);
//!     Ok(())
//! }
//! ```

pub mod codec;
pub mod config;
pub mod error;
pub mod event;
pub mod labels;
pub mod matcher;
pub mod planner;
pub mod properties;
pub mod remote;
pub mod storage;
pub mod sync;

pub use error::*;
