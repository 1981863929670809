// Test doubles for the scan pipeline and runner.
//
// - MockFetcher (AuditFetcher): canned report or error per strategy, optional delay
// - MemoryScanStore (ScanStore): in-memory records with mid-commit fault injection
// - ReportBuilder: terse construction of RawAuditReport values

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Mutex;
use std::time::Duration;

use anyhow::{anyhow, bail, Result};
use async_trait::async_trait;
use chrono::Utc;
use uuid::Uuid;

use pagespeed_client::{
    Audit, AuditRef, CategoryResult, Extra, LighthouseResult, LoadingExperience, OrderedMap,
    PageSpeedError, RawAuditReport, Strategy, WebVitalMetric,
};
use sitefix_common::{Issue, RawReports, Scan, ScanRecord, ScanStatus, ScanSummary};
use sitefix_store::MAX_LIST_LIMIT;

use crate::error::AuditFetchError;
use crate::traits::{AuditFetcher, ScanStore};

// ---------------------------------------------------------------------------
// MockFetcher
// ---------------------------------------------------------------------------

#[derive(Debug, Clone)]
enum Canned {
    Report(RawAuditReport),
    Timeout,
    Status(u16),
}

#[derive(Debug, Clone)]
struct StrategySetup {
    response: Canned,
    delay: Duration,
}

/// Per-strategy canned responses. Unconfigured strategies fail with a 404.
/// Builder: `.on(strategy, report)`, `.timeout(strategy)`, `.status(strategy, code)`,
/// `.delay(strategy, duration)`.
#[derive(Default)]
pub struct MockFetcher {
    setups: HashMap<Strategy, StrategySetup>,
    calls: Mutex<Vec<(String, Strategy)>>,
    in_flight: AtomicUsize,
    peak_in_flight: AtomicUsize,
}

impl MockFetcher {
    pub fn new() -> Self {
        Self::default()
    }

    /// Same report for both strategies.
    pub fn with_report(report: RawAuditReport) -> Self {
        Self::new()
            .on(Strategy::Mobile, report.clone())
            .on(Strategy::Desktop, report)
    }

    fn set(mut self, strategy: Strategy, response: Canned) -> Self {
        let delay = self.setups.get(&strategy).map(|s| s.delay).unwrap_or_default();
        self.setups.insert(strategy, StrategySetup { response, delay });
        self
    }

    pub fn on(self, strategy: Strategy, report: RawAuditReport) -> Self {
        self.set(strategy, Canned::Report(report))
    }

    pub fn timeout(self, strategy: Strategy) -> Self {
        self.set(strategy, Canned::Timeout)
    }

    pub fn status(self, strategy: Strategy, status: u16) -> Self {
        self.set(strategy, Canned::Status(status))
    }

    /// Sleep before answering for this strategy.
    pub fn delay(mut self, strategy: Strategy, delay: Duration) -> Self {
        let setup = self.setups.entry(strategy).or_insert(StrategySetup {
            response: Canned::Status(404),
            delay,
        });
        setup.delay = delay;
        self
    }

    /// Every (url, strategy) requested so far, in call order.
    pub fn calls(&self) -> Vec<(String, Strategy)> {
        self.calls.lock().map(|c| c.clone()).unwrap_or_default()
    }

    /// Most fetches that were in flight at the same time.
    pub fn peak_in_flight(&self) -> usize {
        self.peak_in_flight.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl AuditFetcher for MockFetcher {
    async fn fetch(&self, url: &str, strategy: Strategy) -> Result<RawAuditReport, AuditFetchError> {
        if let Ok(mut calls) = self.calls.lock() {
            calls.push((url.to_string(), strategy));
        }
        let now = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        self.peak_in_flight.fetch_max(now, Ordering::SeqCst);

        let setup = self.setups.get(&strategy).cloned().unwrap_or(StrategySetup {
            response: Canned::Status(404),
            delay: Duration::ZERO,
        });
        if !setup.delay.is_zero() {
            tokio::time::sleep(setup.delay).await;
        }
        self.in_flight.fetch_sub(1, Ordering::SeqCst);

        match setup.response {
            Canned::Report(report) => Ok(report),
            Canned::Timeout => Err(AuditFetchError::new(strategy, PageSpeedError::Timeout)),
            Canned::Status(status) => Err(AuditFetchError::new(
                strategy,
                PageSpeedError::Api {
                    status,
                    message: format!("MockFetcher: canned {status} for {strategy}"),
                },
            )),
        }
    }
}

// ---------------------------------------------------------------------------
// MemoryScanStore
// ---------------------------------------------------------------------------

/// In-memory scan records. Commits build the new record on a copy and swap
/// it in at the end, so an injected fault leaves the prior state visible.
#[derive(Default)]
pub struct MemoryScanStore {
    scans: Mutex<HashMap<Uuid, Scan>>,
    fail_next_commit: AtomicBool,
    fail_commit_failure: AtomicBool,
    lose_next_ack: AtomicBool,
}

impl MemoryScanStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Make the next `commit_success` fail after its delete step.
    pub fn fail_next_commit(&self) {
        self.fail_next_commit.store(true, Ordering::SeqCst);
    }

    /// Make the next `commit_success` land and then report an error, as a
    /// dropped connection after COMMIT would.
    pub fn lose_next_ack(&self) {
        self.lose_next_ack.store(true, Ordering::SeqCst);
    }

    /// Make every `commit_failure` error.
    pub fn fail_commit_failure(&self) {
        self.fail_commit_failure.store(true, Ordering::SeqCst);
    }

    /// Seed a record directly.
    pub fn insert(&self, scan: Scan) {
        if let Ok(mut scans) = self.scans.lock() {
            scans.insert(scan.id, scan);
        }
    }

    fn with_scans<T>(&self, f: impl FnOnce(&mut HashMap<Uuid, Scan>) -> Result<T>) -> Result<T> {
        let mut scans = self
            .scans
            .lock()
            .map_err(|_| anyhow!("MemoryScanStore: lock poisoned"))?;
        f(&mut scans)
    }
}

#[async_trait]
impl ScanStore for MemoryScanStore {
    async fn create_scan(&self, user_id: Uuid, url: &str) -> Result<Scan> {
        let scan = Scan {
            id: Uuid::new_v4(),
            url: url.to_string(),
            user_id,
            status: ScanStatus::Pending,
            created_at: Utc::now(),
            completed_at: None,
            summary: None,
            raw_report: None,
            issues: Vec::new(),
        };
        self.with_scans(|scans| {
            scans.insert(scan.id, scan.clone());
            Ok(scan)
        })
    }

    async fn commit_success(
        &self,
        scan_id: Uuid,
        summary: &ScanSummary,
        raw: &RawReports,
        issues: &[Issue],
    ) -> Result<()> {
        let fail = self.fail_next_commit.swap(false, Ordering::SeqCst);
        self.with_scans(|scans| {
            let current = scans
                .get(&scan_id)
                .ok_or_else(|| anyhow!("scan {scan_id} not found"))?;

            let mut staged = current.clone();
            staged.issues.clear();
            staged.status = ScanStatus::Complete;
            staged.completed_at = Some(Utc::now());
            staged.summary = Some(summary.clone());
            staged.raw_report = Some(raw.clone());
            if fail {
                bail!("MemoryScanStore: injected fault inserting issues for {scan_id}");
            }
            staged.issues = issues.to_vec();

            scans.insert(scan_id, staged);
            Ok(())
        })?;
        if self.lose_next_ack.swap(false, Ordering::SeqCst) {
            bail!("MemoryScanStore: connection lost acknowledging commit for {scan_id}");
        }
        Ok(())
    }

    async fn commit_failure(&self, scan_id: Uuid) -> Result<()> {
        if self.fail_commit_failure.load(Ordering::SeqCst) {
            bail!("MemoryScanStore: injected fault marking {scan_id} failed");
        }
        self.with_scans(|scans| {
            let scan = scans
                .get_mut(&scan_id)
                .ok_or_else(|| anyhow!("scan {scan_id} not found"))?;
            if scan.status == ScanStatus::Complete {
                return Ok(());
            }
            scan.status = ScanStatus::Failed;
            scan.completed_at = None;
            scan.summary = None;
            scan.raw_report = None;
            scan.issues.clear();
            Ok(())
        })
    }

    async fn find_scan(&self, scan_id: Uuid) -> Result<Option<Scan>> {
        self.with_scans(|scans| Ok(scans.get(&scan_id).cloned()))
    }

    async fn list_scans(&self, user_id: Uuid, limit: u32) -> Result<Vec<ScanRecord>> {
        self.with_scans(|scans| {
            let mut owned: Vec<&Scan> = scans.values().filter(|s| s.user_id == user_id).collect();
            owned.sort_by(|a, b| b.created_at.cmp(&a.created_at));
            Ok(owned
                .into_iter()
                .take(limit.min(MAX_LIST_LIMIT) as usize)
                .map(ScanRecord::from)
                .collect())
        })
    }

    async fn count_scans(&self, user_id: Uuid) -> Result<u64> {
        self.with_scans(|scans| Ok(scans.values().filter(|s| s.user_id == user_id).count() as u64))
    }
}

// ---------------------------------------------------------------------------
// ReportBuilder
// ---------------------------------------------------------------------------

/// Builds a `RawAuditReport` audit by audit, keeping insertion order.
#[derive(Default)]
pub struct ReportBuilder {
    audits: OrderedMap<Audit>,
    categories: OrderedMap<CategoryResult>,
    web_vitals: OrderedMap<WebVitalMetric>,
}

impl ReportBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn audit(mut self, id: &str, title: &str, score: Option<f64>) -> Self {
        self.audits.insert(
            id,
            Audit {
                id: id.to_string(),
                title: title.to_string(),
                description: None,
                score,
                extra: Extra::new(),
            },
        );
        self
    }

    pub fn audit_with_description(
        mut self,
        id: &str,
        title: &str,
        score: Option<f64>,
        description: &str,
    ) -> Self {
        self.audits.insert(
            id,
            Audit {
                id: id.to_string(),
                title: title.to_string(),
                description: Some(description.to_string()),
                score,
                extra: Extra::new(),
            },
        );
        self
    }

    pub fn category(mut self, id: &str, score: Option<f64>, audit_ids: &[&str]) -> Self {
        self.categories.insert(
            id,
            CategoryResult {
                title: None,
                score,
                audit_refs: audit_ids
                    .iter()
                    .map(|a| AuditRef::new(*a))
                    .collect(),
                extra: Extra::new(),
            },
        );
        self
    }

    pub fn web_vital(mut self, metric: &str, percentile: f64, category: &str) -> Self {
        self.web_vitals.insert(
            metric,
            WebVitalMetric::new(percentile, category),
        );
        self
    }

    pub fn build(self) -> RawAuditReport {
        RawAuditReport {
            lighthouse_result: LighthouseResult {
                audits: self.audits,
                categories: self.categories,
                extra: Extra::new(),
            },
            loading_experience: (!self.web_vitals.is_empty()).then(|| LoadingExperience {
                metrics: Some(self.web_vitals),
                extra: Extra::new(),
            }),
            extra: Extra::new(),
        }
    }
}

/// A failing report with `n` untemplated audits, titled `"{prefix} {i}"`.
pub fn failing_report(prefix: &str, n: usize) -> RawAuditReport {
    (0..n)
        .fold(ReportBuilder::new(), |builder, i| {
            builder.audit(&format!("{prefix}-{i}"), &format!("{prefix} {i}"), Some(0.3))
        })
        .category("performance", Some(0.35), &[])
        .build()
}
