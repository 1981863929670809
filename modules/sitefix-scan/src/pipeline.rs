//! One scan attempt: both device audits concurrently, then extraction and
//! summary from the mobile report.

use std::sync::Arc;

use pagespeed_client::{RawAuditReport, Strategy};
use sitefix_common::{CategoryScores, Issue, RawReports, ScanSummary};
use tracing::info;

use crate::error::AuditFetchError;
use crate::extractor::extract;
use crate::templates::TemplateLookup;
use crate::traits::AuditFetcher;

/// Everything a successful run produces, ready for `commit_success`.
#[derive(Debug, Clone, PartialEq)]
pub struct ScanOutcome {
    pub summary: ScanSummary,
    pub issues: Vec<Issue>,
    pub raw: RawReports,
}

#[derive(Clone)]
pub struct ScanPipeline {
    fetcher: Arc<dyn AuditFetcher>,
    templates: Arc<dyn TemplateLookup>,
}

impl ScanPipeline {
    pub fn new(fetcher: Arc<dyn AuditFetcher>, templates: Arc<dyn TemplateLookup>) -> Self {
        Self { fetcher, templates }
    }

    /// Run both audits and join. The first failure wins and the other
    /// result is dropped; there is no partial outcome.
    ///
    /// Only the mobile report is mined for issues. Desktop is kept raw.
    pub async fn run(&self, url: &str) -> Result<ScanOutcome, AuditFetchError> {
        let (mobile, desktop) = tokio::try_join!(
            self.fetcher.fetch(url, Strategy::Mobile),
            self.fetcher.fetch(url, Strategy::Desktop),
        )?;

        let issues = extract(&mobile, self.templates.as_ref());
        let summary = summarize(&mobile);
        info!(url, issues = issues.len(), "Audits complete");

        Ok(ScanOutcome {
            summary,
            issues,
            raw: RawReports { mobile, desktop },
        })
    }
}

/// Category scores scaled to 0-100 plus the report's field metrics.
pub fn summarize(report: &RawAuditReport) -> ScanSummary {
    ScanSummary {
        scores: CategoryScores {
            speed: scaled_score(report.category_score("performance")),
            seo: scaled_score(report.category_score("seo")),
            accessibility: scaled_score(report.category_score("accessibility")),
            best_practices: scaled_score(report.category_score("best-practices")),
        },
        web_vitals: report.web_vitals(),
    }
}

/// `round(score * 100)`, half away from zero, clamped to 0..=100.
fn scaled_score(score: Option<f64>) -> Option<u8> {
    score
        .filter(|s| s.is_finite())
        .map(|s| (s * 100.0).round().clamp(0.0, 100.0) as u8)
}
