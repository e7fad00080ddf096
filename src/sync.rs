//! Run orchestration: preconditions, fetch, match, plan, gated apply.
//!
//! A [`SyncSession`] drives one direction at a time. Per-run failures
//! (credential, category resolution, transport errors) abort before any
//! mutation; per-document failures are isolated — one bad article never
//! blocks the rest. Plans are built fully before anything is applied, so the
//! confirmation layer can inspect them and flip [`PlanGates`] per mutation
//! class.

use parking_lot::Mutex;
use std::{collections::BTreeMap, sync::Arc};
use tokio::sync::mpsc::UnboundedSender;

use crate::{
    codec,
    config::SyncConfig,
    error::ParleyError,
    event::{MutationClass, SyncEvent},
    matcher::{match_documents, MatchSet},
    planner::{
        plan_download, plan_upload, DownloadPlan, LocalPairPlan, RemoteCreate, RemotePairPlan,
        RepoContext, UploadPlan,
    },
    properties::LocalDocument,
    remote::{RecordFilter, RemoteDirectory, RemoteTransport},
    storage::ArticleStore,
};

/// Boolean gates per mutation class, set by the confirmation layer. Rejecting
/// one class never affects the others.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PlanGates {
    pub create: bool,
    pub frontmatter: bool,
    pub content: bool,
    pub labels: bool,
}

impl Default for PlanGates {
    fn default() -> Self {
        PlanGates {
            create: true,
            frontmatter: true,
            content: true,
            labels: true,
        }
    }
}

/// Per-run application tally.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SyncOutcome {
    pub applied: usize,
    pub failed: usize,
}

pub struct SyncSession<T: RemoteTransport, S: ArticleStore> {
    directory: RemoteDirectory<T>,
    store: S,
    config: SyncConfig,
    event_tx: Option<UnboundedSender<SyncEvent>>,
    /// Label name → id. Creation-if-absent goes through
    /// [`SyncSession::ensure_label`], which the apply loops call
    /// sequentially, so two documents introducing the same new tag in one
    /// run create exactly one remote label.
    known_labels: Arc<Mutex<BTreeMap<String, String>>>,
}

impl<T: RemoteTransport, S: ArticleStore> SyncSession<T, S> {
    pub fn new(
        directory: RemoteDirectory<T>,
        store: S,
        config: SyncConfig,
        event_tx: Option<UnboundedSender<SyncEvent>>,
    ) -> Self {
        SyncSession {
            directory,
            store,
            config,
            event_tx,
            known_labels: Arc::new(Mutex::new(BTreeMap::new())),
        }
    }

    fn emit(&self, event: SyncEvent) {
        tracing::info!("{event}");
        if let Some(tx) = &self.event_tx {
            // A closed receiver means nobody is listening; status events are
            // best-effort.
            tx.send(event).ok();
        }
    }

    /// Reads and parses every article under the root. Malformed documents are
    /// skipped with a status event; storage failures abort.
    async fn load_local_documents(&self) -> Result<Vec<LocalDocument>, ParleyError> {
        let mut docs = Vec::new();
        for path in self.store.list().await? {
            let raw = self.store.read(&path).await?;
            match LocalDocument::parse(path.clone(), &raw) {
                Ok(doc) => docs.push(doc),
                Err(e) if e.is_document_scoped() => {
                    self.emit(SyncEvent::DocumentSkipped(path, format!("{e}")));
                }
                Err(e) => return Err(e),
            }
        }
        Ok(docs)
    }

    async fn fetch_and_match(
        &self,
        docs: Vec<LocalDocument>,
        filter: &RecordFilter,
    ) -> Result<MatchSet, ParleyError> {
        let records = self.directory.fetch_all_records(filter).await?;
        let (set, warnings) = match_documents(docs, records);
        self.emit(set.counts());
        for warning in warnings {
            self.emit(warning);
        }
        Ok(set)
    }

    /// Builds the upload plan. Fatal preconditions (no documents, category
    /// unresolvable) surface here, before any mutation is attempted.
    pub async fn prepare_upload(&self) -> Result<(UploadPlan, RepoContext), ParleyError> {
        let docs = self.load_local_documents().await?;
        if docs.is_empty() {
            return Err(ParleyError::PreconditionFailed(format!(
                "no parseable documents under {:?}",
                self.config.articles_root
            )));
        }
        let info = self.directory.repository_info().await?;
        let category_id = info.category_id(&self.config.category_name)?.to_string();
        {
            let mut cache = self.known_labels.lock();
            for label in &info.labels {
                cache.insert(label.name.clone(), label.id.clone());
            }
        }
        let filter = RecordFilter {
            category_id: Some(category_id.clone()),
        };
        let set = self.fetch_and_match(docs, &filter).await?;
        let ctx = RepoContext {
            repository_id: info.id,
            category_id,
            prefixes: self.config.prefixes(),
            known_labels: self.known_labels.lock().clone(),
        };
        let (plan, warnings) = plan_upload(&set, &ctx);
        for warning in warnings {
            self.emit(warning);
        }
        Ok((plan, ctx))
    }

    /// Builds the download plan. An unresolvable category degrades to an
    /// unfiltered listing with a warning: the download direction can still
    /// reconcile by slug.
    pub async fn prepare_download(&self) -> Result<DownloadPlan, ParleyError> {
        let docs = self.load_local_documents().await?;
        let info = self.directory.repository_info().await?;
        let filter = match info.category_id(&self.config.category_name) {
            Ok(id) => RecordFilter {
                category_id: Some(id.to_string()),
            },
            Err(e) => {
                self.emit(SyncEvent::Warning(format!(
                    "{e}; listing records without a category filter"
                )));
                RecordFilter::default()
            }
        };
        let set = self.fetch_and_match(docs, &filter).await?;
        let (plan, warnings) = plan_download(&set, &self.config.articles_root, &self.config.prefixes());
        for warning in warnings {
            self.emit(warning);
        }
        Ok(plan)
    }

    /// Looks up or creates a label, keeping the read-then-create-then-cache
    /// sequence atomic with respect to other documents in the run (apply
    /// loops call this sequentially; the cache lock is never held across the
    /// create call).
    async fn ensure_label(&self, repository_id: &str, name: &str) -> Result<String, ParleyError> {
        if let Some(id) = self.known_labels.lock().get(name) {
            return Ok(id.clone());
        }
        let label = self.directory.create_label(repository_id, name).await?;
        self.known_labels
            .lock()
            .insert(label.name.clone(), label.id.clone());
        Ok(label.id)
    }

    /// Ids for already-ensured label names. A miss means the earlier ensure
    /// failed; the caller counts the document as failed.
    fn resolve_label_ids(&self, names: &[String]) -> Result<Vec<String>, ParleyError> {
        let cache = self.known_labels.lock();
        names
            .iter()
            .map(|name| {
                cache
                    .get(name)
                    .cloned()
                    .ok_or_else(|| ParleyError::NotFound(format!("label '{name}'")))
            })
            .collect()
    }

    async fn apply_remote_create(
        &self,
        create: &RemoteCreate,
        ctx: &RepoContext,
    ) -> Result<(), ParleyError> {
        let (record_id, number) = self
            .directory
            .create_record(&ctx.repository_id, &ctx.category_id, &create.title, &create.body)
            .await?;
        tracing::debug!("Created remote record #{number} for '{}'", create.slug);
        let label_ids = self.resolve_label_ids(&create.attach)?;
        self.directory.add_labels(&record_id, &label_ids).await
    }

    async fn apply_remote_pair(
        &self,
        pair: &RemotePairPlan,
        gates: &PlanGates,
    ) -> Result<Vec<MutationClass>, ParleyError> {
        let mut applied = Vec::new();
        let body = match (&pair.content, gates.content) {
            (Some(body), true) => {
                applied.push(MutationClass::Content);
                body.as_str()
            }
            _ => pair.base_body.as_str(),
        };
        // A content-only update splices the new body after the existing
        // metadata block bytes; the block is only re-serialized when the
        // frontmatter class itself fires.
        let text = match (&pair.frontmatter, gates.frontmatter) {
            (Some(metadata), true) => {
                applied.push(MutationClass::Frontmatter);
                Some(codec::serialize(metadata, body)?)
            }
            _ if applied.is_empty() => None,
            _ => Some(format!("{}{body}", pair.base_header)),
        };
        if let Some(text) = text {
            self.directory.update_record_body(&pair.remote_id, &text).await?;
        }
        if gates.labels && !pair.labels.is_empty() {
            let add_ids = self.resolve_label_ids(&pair.labels.to_add)?;
            self.directory.add_labels(&pair.remote_id, &add_ids).await?;
            let remove_ids: Vec<String> = pair
                .labels
                .to_remove
                .iter()
                .map(|l| l.id.clone())
                .collect();
            self.directory
                .remove_labels(&pair.remote_id, &remove_ids)
                .await?;
            applied.push(MutationClass::Labels);
        }
        Ok(applied)
    }

    /// Applies an upload plan under the given gates. Label creation runs
    /// first so attaches can resolve ids; per-document failures are counted
    /// and reported without aborting the loop.
    pub async fn apply_upload(
        &self,
        plan: &UploadPlan,
        ctx: &RepoContext,
        gates: &PlanGates,
    ) -> Result<SyncOutcome, ParleyError> {
        let mut outcome = SyncOutcome::default();

        if gates.create || gates.labels {
            for name in &plan.label_creates {
                if let Err(e) = self.ensure_label(&ctx.repository_id, name).await {
                    self.emit(SyncEvent::Failed(
                        name.clone(),
                        MutationClass::Labels,
                        format!("{e}"),
                    ));
                    outcome.failed += 1;
                }
            }
        }

        if gates.create {
            for create in &plan.creates {
                match self.apply_remote_create(create, ctx).await {
                    Ok(()) => {
                        self.emit(SyncEvent::Applied(create.slug.clone(), MutationClass::Create));
                        outcome.applied += 1;
                    }
                    Err(e) => {
                        self.emit(SyncEvent::Failed(
                            create.slug.clone(),
                            MutationClass::Create,
                            format!("{e}"),
                        ));
                        outcome.failed += 1;
                    }
                }
            }
        }

        for pair in &plan.pairs {
            match self.apply_remote_pair(pair, gates).await {
                Ok(applied) => {
                    for class in applied {
                        self.emit(SyncEvent::Applied(pair.slug.clone(), class));
                        outcome.applied += 1;
                    }
                }
                Err(e) => {
                    self.emit(SyncEvent::Failed(
                        pair.slug.clone(),
                        MutationClass::Content,
                        format!("{e}"),
                    ));
                    outcome.failed += 1;
                }
            }
        }

        Ok(outcome)
    }

    async fn apply_local_pair(
        &self,
        pair: &LocalPairPlan,
        gates: &PlanGates,
    ) -> Result<Vec<MutationClass>, ParleyError> {
        let mut applied = Vec::new();
        let body = match (&pair.content, gates.content) {
            (Some(body), true) => {
                applied.push(MutationClass::Content);
                body.as_str()
            }
            _ => pair.base_body.as_str(),
        };
        let text = match (&pair.frontmatter, gates.frontmatter) {
            (Some(metadata), true) => {
                applied.push(MutationClass::Frontmatter);
                Some(codec::serialize(metadata, body)?)
            }
            _ if applied.is_empty() => None,
            _ => Some(format!("{}{body}", pair.base_header)),
        };
        if let Some(text) = text {
            self.store.write(&pair.path, &text).await?;
        }
        Ok(applied)
    }

    /// Applies a download plan under the given gates.
    pub async fn apply_download(
        &self,
        plan: &DownloadPlan,
        gates: &PlanGates,
    ) -> Result<SyncOutcome, ParleyError> {
        let mut outcome = SyncOutcome::default();

        if gates.create {
            for create in &plan.creates {
                match self.store.create(&create.path, &create.text).await {
                    Ok(()) => {
                        self.emit(SyncEvent::Applied(create.slug.clone(), MutationClass::Create));
                        outcome.applied += 1;
                    }
                    Err(e) => {
                        self.emit(SyncEvent::Failed(
                            create.slug.clone(),
                            MutationClass::Create,
                            format!("{e}"),
                        ));
                        outcome.failed += 1;
                    }
                }
            }
        }

        for pair in &plan.pairs {
            match self.apply_local_pair(pair, gates).await {
                Ok(applied) => {
                    for class in applied {
                        self.emit(SyncEvent::Applied(pair.slug.clone(), class));
                        outcome.applied += 1;
                    }
                }
                Err(e) => {
                    self.emit(SyncEvent::Failed(
                        pair.slug.clone(),
                        MutationClass::Content,
                        format!("{e}"),
                    ));
                    outcome.failed += 1;
                }
            }
        }

        Ok(outcome)
    }

    /// Plan and apply in one step, for hosts without an interactive
    /// confirmation layer.
    pub async fn run_upload(&self, gates: &PlanGates) -> Result<SyncOutcome, ParleyError> {
        let (plan, ctx) = self.prepare_upload().await?;
        self.apply_upload(&plan, &ctx, gates).await
    }

    pub async fn run_download(&self, gates: &PlanGates) -> Result<SyncOutcome, ParleyError> {
        let plan = self.prepare_download().await?;
        self.apply_download(&plan, gates).await
    }
}
