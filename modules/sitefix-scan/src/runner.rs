//! Drives a scan record through PENDING -> COMPLETE | FAILED.

use std::sync::Arc;

use sitefix_common::{normalize_url, Plan, ScanRecord};
use tracing::{error, info, warn};
use uuid::Uuid;

use crate::error::ScanError;
use crate::pipeline::ScanPipeline;
use crate::plan_gate::{can_start_scan, ScanView};
use crate::traits::ScanStore;

#[derive(Clone)]
pub struct ScanRunner {
    pipeline: ScanPipeline,
    store: Arc<dyn ScanStore>,
}

impl ScanRunner {
    pub fn new(pipeline: ScanPipeline, store: Arc<dyn ScanStore>) -> Self {
        Self { pipeline, store }
    }

    /// Validate, check quota, create the PENDING record and run it to a
    /// terminal state. Returns the scan id once COMPLETE.
    pub async fn start(&self, user_id: Uuid, raw_url: &str, plan: Plan) -> Result<Uuid, ScanError> {
        let url = normalize_url(raw_url)?;

        let prior = self.store.count_scans(user_id).await?;
        if !can_start_scan(plan, prior) {
            info!(%user_id, %plan, prior, "Scan quota reached");
            return Err(ScanError::QuotaExceeded);
        }

        let scan = self.store.create_scan(user_id, &url).await?;
        info!(scan_id = %scan.id, url = url.as_str(), "Scan created");

        self.execute(scan.id, &url).await?;
        Ok(scan.id)
    }

    /// Run the pipeline for an existing PENDING scan and commit the result.
    ///
    /// A pipeline failure commits FAILED. If committing success fails, FAILED
    /// is attempted so the record does not stay PENDING. The store leaves a
    /// COMPLETE record alone, so a commit that landed before its error keeps
    /// its results.
    pub async fn execute(&self, scan_id: Uuid, url: &str) -> Result<(), ScanError> {
        let outcome = match self.pipeline.run(url).await {
            Ok(outcome) => outcome,
            Err(cause) => {
                warn!(%scan_id, strategy = %cause.strategy, error = %cause.cause, "Scan audit failed");
                self.store.commit_failure(scan_id).await?;
                return Err(ScanError::Failed { scan_id, cause });
            }
        };

        if let Err(err) = self
            .store
            .commit_success(scan_id, &outcome.summary, &outcome.raw, &outcome.issues)
            .await
        {
            error!(%scan_id, error = %err, "Failed to commit scan results");
            if let Err(mark_err) = self.store.commit_failure(scan_id).await {
                error!(%scan_id, error = %mark_err, "Failed to mark scan as FAILED");
            }
            return Err(ScanError::Persistence(err));
        }

        info!(%scan_id, issues = outcome.issues.len(), "Scan complete");
        Ok(())
    }

    /// The scan as its owner sees it under `plan`.
    pub async fn view(&self, scan_id: Uuid, viewer: Uuid, plan: Plan) -> anyhow::Result<Option<ScanView>> {
        load_view(self.store.as_ref(), scan_id, viewer, plan).await
    }

    pub async fn list(&self, user_id: Uuid, limit: u32) -> anyhow::Result<Vec<ScanRecord>> {
        self.store.list_scans(user_id, limit).await
    }
}

/// Read a scan and gate it for `viewer` under `plan`. Needs only the store,
/// so read-only callers never build a pipeline.
pub async fn load_view(
    store: &dyn ScanStore,
    scan_id: Uuid,
    viewer: Uuid,
    plan: Plan,
) -> anyhow::Result<Option<ScanView>> {
    let scan = store.find_scan(scan_id).await?;
    Ok(scan.and_then(|scan| ScanView::build(&scan, viewer, plan)))
}
