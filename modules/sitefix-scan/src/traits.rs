// Trait seams for the scan pipeline and runner.
//
// AuditFetcher wraps the PageSpeed client; ScanStore wraps Postgres.
// Both have in-memory stand-ins in `testing` so the whole lifecycle runs
// without network or database.

use anyhow::Result;
use async_trait::async_trait;
use uuid::Uuid;

use pagespeed_client::{PageSpeedClient, RawAuditReport, Strategy};
use sitefix_common::{Issue, RawReports, Scan, ScanRecord, ScanSummary};
use sitefix_store::PgScanStore;

use crate::error::AuditFetchError;

// ---------------------------------------------------------------------------
// AuditFetcher
// ---------------------------------------------------------------------------

#[async_trait]
pub trait AuditFetcher: Send + Sync {
    /// Fetch one report for all four categories. No retry.
    async fn fetch(&self, url: &str, strategy: Strategy) -> Result<RawAuditReport, AuditFetchError>;
}

#[async_trait]
impl AuditFetcher for PageSpeedClient {
    async fn fetch(&self, url: &str, strategy: Strategy) -> Result<RawAuditReport, AuditFetchError> {
        self.run_pagespeed(url, strategy)
            .await
            .map_err(|cause| AuditFetchError::new(strategy, cause))
    }
}

// ---------------------------------------------------------------------------
// ScanStore
// ---------------------------------------------------------------------------

#[async_trait]
pub trait ScanStore: Send + Sync {
    /// Create a scan record in PENDING.
    async fn create_scan(&self, user_id: Uuid, url: &str) -> Result<Scan>;

    /// Atomically replace the issue set and mark COMPLETE.
    async fn commit_success(
        &self,
        scan_id: Uuid,
        summary: &ScanSummary,
        raw: &RawReports,
        issues: &[Issue],
    ) -> Result<()>;

    /// Atomically clear issues and summary and mark FAILED.
    async fn commit_failure(&self, scan_id: Uuid) -> Result<()>;

    /// Full scan with issues in stored order.
    async fn find_scan(&self, scan_id: Uuid) -> Result<Option<Scan>>;

    /// Newest first, without issues.
    async fn list_scans(&self, user_id: Uuid, limit: u32) -> Result<Vec<ScanRecord>>;

    async fn count_scans(&self, user_id: Uuid) -> Result<u64>;
}

#[async_trait]
impl ScanStore for PgScanStore {
    async fn create_scan(&self, user_id: Uuid, url: &str) -> Result<Scan> {
        PgScanStore::create_scan(self, user_id, url).await
    }

    async fn commit_success(
        &self,
        scan_id: Uuid,
        summary: &ScanSummary,
        raw: &RawReports,
        issues: &[Issue],
    ) -> Result<()> {
        PgScanStore::commit_success(self, scan_id, summary, raw, issues).await
    }

    async fn commit_failure(&self, scan_id: Uuid) -> Result<()> {
        PgScanStore::commit_failure(self, scan_id).await
    }

    async fn find_scan(&self, scan_id: Uuid) -> Result<Option<Scan>> {
        PgScanStore::find_scan(self, scan_id).await
    }

    async fn list_scans(&self, user_id: Uuid, limit: u32) -> Result<Vec<ScanRecord>> {
        PgScanStore::list_scans(self, user_id, limit).await
    }

    async fn count_scans(&self, user_id: Uuid) -> Result<u64> {
        PgScanStore::count_scans(self, user_id).await
    }
}
