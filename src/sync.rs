// ABOUTME: Per-document sync orchestration and batch/scheduled sync
// ABOUTME: Converts every failure into a persisted Failed state; never panics out

use crate::{
    config::SyncConfig,
    convert::transform,
    model::{Document, PropertyValue, SyncState, SyncStatus},
    notion::{DocumentService, PatchValue, PropertyPatch},
    publish::{PublishDriver, PublishReceipt},
    state::{DocumentLocks, SyncStateStore},
    Error, Result,
};
use chrono::Utc;
use indicatif::{ProgressBar, ProgressStyle};
use std::future::Future;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tracing::{error, info, warn};

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SyncReport {
    pub synced: usize,
    pub failed: usize,
    pub skipped: usize,
}

pub struct SyncOrchestrator {
    documents: Arc<dyn DocumentService>,
    driver: PublishDriver,
    states: Arc<dyn SyncStateStore>,
    locks: DocumentLocks,
    settings: SyncConfig,
}

impl SyncOrchestrator {
    pub fn new(
        documents: Arc<dyn DocumentService>,
        driver: PublishDriver,
        states: Arc<dyn SyncStateStore>,
        settings: SyncConfig,
    ) -> Self {
        SyncOrchestrator {
            documents,
            driver,
            states,
            locks: DocumentLocks::new(),
            settings,
        }
    }

    pub async fn list_documents(&self) -> Result<Vec<Document>> {
        self.documents.list_documents().await
    }

    /// Last recorded state, or Pending for a document never synced.
    pub fn get_state(&self, document_id: &str) -> SyncState {
        self.states
            .get(document_id)
            .unwrap_or_else(|| SyncState::pending(document_id))
    }

    /// Publishes one document and records the outcome.
    ///
    /// Calls for the same id wait for each other; the returned state is also
    /// what the store holds afterwards.
    pub async fn sync_document(&self, document_id: &str) -> SyncState {
        let _guard = self.locks.acquire(document_id).await;
        info!(document_id, "starting sync");
        self.record(&SyncState::syncing(document_id));

        let state = match self.publish_document(document_id).await {
            Ok((document, receipt)) => {
                let mut state =
                    SyncState::succeeded(document_id, receipt.publish_id, receipt.article_url);
                match self.annotate(&document).await {
                    Ok(()) => {
                        // The patch itself bumps the remote edit time
                        state.last_sync_time = Some(Utc::now());
                        info!(document_id, "sync succeeded");
                    }
                    Err(e) => {
                        warn!(
                            document_id,
                            error = %e,
                            "published, but source document status was not updated; needs manual check"
                        );
                        state.warning = Some(format!(
                            "Published, but updating the source document failed: {}",
                            e
                        ));
                    }
                }
                state
            }
            Err(e) => {
                warn!(document_id, error = %e, "sync failed");
                SyncState::failed(document_id, e.to_string())
            }
        };

        self.record(&state);
        state
    }

    async fn publish_document(&self, document_id: &str) -> Result<(Document, PublishReceipt)> {
        let document = self.documents.get_properties(document_id).await.map_err(|e| {
            Error::Fetch(format!(
                "failed to fetch document properties for {}: {}",
                document_id, e
            ))
        })?;

        let blocks = self.documents.get_blocks(document_id).await.map_err(|e| {
            Error::Fetch(format!(
                "failed to fetch document blocks for {}: {}",
                document_id, e
            ))
        })?;
        if blocks.is_empty() {
            return Err(Error::EmptyContent(document_id.to_string()));
        }

        let article = transform(&document, &blocks);
        article.validate()?;

        let receipt = self.driver.publish(&article).await?;
        Ok((document, receipt))
    }

    /// Marks the source document as published. Best effort.
    async fn annotate(&self, document: &Document) -> Result<()> {
        let label = self.settings.published_label.clone();
        let status = match document.property(&self.settings.status_property) {
            Some(PropertyValue::Status { .. }) => PatchValue::Status(label),
            _ => PatchValue::Select(label),
        };
        let patch: PropertyPatch = vec![
            (self.settings.status_property.clone(), status),
            (
                self.settings.publish_time_property.clone(),
                PatchValue::Date(Utc::now()),
            ),
        ];
        self.documents.patch_properties(&document.id, &patch).await
    }

    fn record(&self, state: &SyncState) {
        if let Err(e) = self.states.put(state) {
            error!(document_id = %state.document_id, error = %e, "failed to persist sync state");
        }
    }

    /// Whether a document changed since its last successful sync.
    pub fn needs_sync(&self, document: &Document) -> bool {
        let state = self.get_state(&document.id);
        if state.status != SyncStatus::Success {
            return true;
        }
        match (state.last_sync_time, document.last_edited_time) {
            (Some(synced_at), Some(edited_at)) => edited_at > synced_at,
            (None, _) => true,
            (Some(_), None) => false,
        }
    }

    /// Syncs every document in the database, one at a time.
    pub async fn sync_all(&self, force: bool) -> Result<SyncReport> {
        self.run_batch(force, &AtomicBool::new(false)).await
    }

    /// Like `sync_all`, but checks `stop` before starting each document.
    async fn run_batch(&self, force: bool, stop: &AtomicBool) -> Result<SyncReport> {
        info!("fetching document list");
        let documents = self.documents.list_documents().await?;

        let pb = ProgressBar::new(documents.len() as u64);
        if let Ok(style) = ProgressStyle::with_template("[{bar:40}] {pos}/{len} docs {msg}") {
            pb.set_style(style.progress_chars("##-"));
        }

        let mut report = SyncReport::default();
        for document in &documents {
            if stop.load(Ordering::SeqCst) {
                pb.abandon_with_message("stopped");
                info!(
                    remaining = documents.len() - (report.synced + report.failed + report.skipped),
                    "batch stopped early"
                );
                return Ok(report);
            }
            if !force && !self.needs_sync(document) {
                report.skipped += 1;
                pb.inc(1);
                continue;
            }

            pb.set_message(document.title.clone());
            let state = self.sync_document(&document.id).await;
            match state.status {
                SyncStatus::Success => report.synced += 1,
                _ => report.failed += 1,
            }
            pb.inc(1);
        }

        pb.finish_with_message(format!(
            "{} docs ({} published, {} failed, {} skipped)",
            documents.len(),
            report.synced,
            report.failed,
            report.skipped
        ));
        Ok(report)
    }

    /// Runs `sync_all` on a fixed interval until `shutdown` resolves.
    ///
    /// Requires `auto_sync` to be enabled. A shutdown during a batch lets the
    /// document in flight finish and skips the rest.
    pub async fn watch<F>(&self, interval: Duration, shutdown: F) -> Result<()>
    where
        F: Future<Output = ()>,
    {
        if !self.settings.auto_sync {
            return Err(Error::Config(
                "Scheduled sync is disabled. Run `n2w config sync --auto-sync true` to enable it"
                    .into(),
            ));
        }

        info!(interval_secs = interval.as_secs(), "watching for changes");
        let mut timer = tokio::time::interval(interval);
        tokio::pin!(shutdown);

        loop {
            tokio::select! {
                _ = timer.tick() => {
                    let stop = AtomicBool::new(false);
                    let batch = self.run_batch(false, &stop);
                    tokio::pin!(batch);
                    let mut stopping = false;

                    let result = loop {
                        tokio::select! {
                            result = &mut batch => break result,
                            _ = &mut shutdown, if !stopping => {
                                info!("shutdown requested; finishing current document");
                                stopping = true;
                                stop.store(true, Ordering::SeqCst);
                            }
                        }
                    };

                    match result {
                        Ok(report) => info!(
                            synced = report.synced,
                            failed = report.failed,
                            skipped = report.skipped,
                            "scheduled sync finished"
                        ),
                        Err(e) => error!(error = %e, "scheduled sync failed"),
                    }
                    if stopping {
                        info!("watch stopped");
                        return Ok(());
                    }
                }
                _ = &mut shutdown => {
                    info!("watch stopped");
                    return Ok(());
                }
            }
        }
    }
}
