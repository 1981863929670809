use std::str::FromStr;

use chrono::{DateTime, Utc};
use pagespeed_client::{OrderedMap, RawAuditReport, WebVitalMetric};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::SitefixError;

// --- Issue taxonomy ---

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Category {
    Speed,
    Seo,
    Accessibility,
    BestPractices,
}

impl Category {
    pub fn as_str(&self) -> &'static str {
        match self {
            Category::Speed => "speed",
            Category::Seo => "seo",
            Category::Accessibility => "accessibility",
            Category::BestPractices => "best-practices",
        }
    }

    /// Map a Lighthouse category id onto the issue taxonomy.
    /// Categories outside the four audited ones (e.g. "pwa") have no mapping.
    pub fn from_lighthouse(category_id: &str) -> Option<Self> {
        match category_id {
            "performance" => Some(Category::Speed),
            "seo" => Some(Category::Seo),
            "accessibility" => Some(Category::Accessibility),
            "best-practices" => Some(Category::BestPractices),
            _ => None,
        }
    }
}

impl std::fmt::Display for Category {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Category {
    type Err = SitefixError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "speed" => Ok(Category::Speed),
            "seo" => Ok(Category::Seo),
            "accessibility" => Ok(Category::Accessibility),
            "best-practices" => Ok(Category::BestPractices),
            other => Err(SitefixError::Validation(format!("unknown category: {other}"))),
        }
    }
}

/// Ordered least to most severe, so `Critical > Low`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Severity {
    Low,
    Medium,
    High,
    Critical,
}

impl Severity {
    pub fn as_str(&self) -> &'static str {
        match self {
            Severity::Low => "low",
            Severity::Medium => "medium",
            Severity::High => "high",
            Severity::Critical => "critical",
        }
    }

    /// Severity implied by a Lighthouse audit score in [0, 1].
    pub fn from_score(score: Option<f64>) -> Self {
        match score {
            None => Severity::Low,
            Some(s) if s < 0.5 => Severity::Critical,
            Some(s) if s < 0.7 => Severity::High,
            Some(s) if s < 0.9 => Severity::Medium,
            Some(_) => Severity::Low,
        }
    }
}

impl std::fmt::Display for Severity {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Severity {
    type Err = SitefixError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "low" => Ok(Severity::Low),
            "medium" => Ok(Severity::Medium),
            "high" => Ok(Severity::High),
            "critical" => Ok(Severity::Critical),
            other => Err(SitefixError::Validation(format!("unknown severity: {other}"))),
        }
    }
}

/// One actionable finding, owned by the scan that produced it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Issue {
    pub title: String,
    pub category: Category,
    pub severity: Severity,
    pub why: String,
    pub how: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub code: Option<String>,
    pub impact: String,
}

// --- Scan lifecycle ---

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ScanStatus {
    Pending,
    Complete,
    Failed,
}

impl ScanStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            ScanStatus::Pending => "PENDING",
            ScanStatus::Complete => "COMPLETE",
            ScanStatus::Failed => "FAILED",
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, ScanStatus::Complete | ScanStatus::Failed)
    }

    /// Transitions are one-way out of PENDING. Nothing re-enters PENDING and
    /// terminal states never change for the same scan id.
    pub fn can_transition_to(&self, next: ScanStatus) -> bool {
        matches!(
            (self, next),
            (ScanStatus::Pending, ScanStatus::Complete) | (ScanStatus::Pending, ScanStatus::Failed)
        )
    }
}

impl std::fmt::Display for ScanStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ScanStatus {
    type Err = SitefixError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "PENDING" => Ok(ScanStatus::Pending),
            "COMPLETE" => Ok(ScanStatus::Complete),
            "FAILED" => Ok(ScanStatus::Failed),
            other => Err(SitefixError::Validation(format!("unknown scan status: {other}"))),
        }
    }
}

/// Category scores scaled to 0-100. `None` when Lighthouse did not score the category.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CategoryScores {
    pub speed: Option<u8>,
    pub seo: Option<u8>,
    pub accessibility: Option<u8>,
    pub best_practices: Option<u8>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ScanSummary {
    pub scores: CategoryScores,
    #[serde(default)]
    pub web_vitals: OrderedMap<WebVitalMetric>,
}

/// Both provider reports for a scan, kept for audit and re-extraction.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RawReports {
    pub mobile: RawAuditReport,
    pub desktop: RawAuditReport,
}

/// A persisted scan with its full issue set in stored order.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Scan {
    pub id: Uuid,
    pub url: String,
    pub user_id: Uuid,
    pub status: ScanStatus,
    pub created_at: DateTime<Utc>,
    pub completed_at: Option<DateTime<Utc>>,
    pub summary: Option<ScanSummary>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub raw_report: Option<RawReports>,
    pub issues: Vec<Issue>,
}

/// Listing row: a scan without its issues or raw reports.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ScanRecord {
    pub id: Uuid,
    pub url: String,
    pub user_id: Uuid,
    pub status: ScanStatus,
    pub created_at: DateTime<Utc>,
    pub completed_at: Option<DateTime<Utc>>,
    pub summary: Option<ScanSummary>,
}

impl From<&Scan> for ScanRecord {
    fn from(scan: &Scan) -> Self {
        Self {
            id: scan.id,
            url: scan.url.clone(),
            user_id: scan.user_id,
            status: scan.status,
            created_at: scan.created_at,
            completed_at: scan.completed_at,
            summary: scan.summary.clone(),
        }
    }
}

// --- Subscription tiers ---

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Plan {
    Free,
    Pro,
    Business,
    Enterprise,
}

impl Plan {
    pub fn as_str(&self) -> &'static str {
        match self {
            Plan::Free => "free",
            Plan::Pro => "pro",
            Plan::Business => "business",
            Plan::Enterprise => "enterprise",
        }
    }

    pub fn is_paid(&self) -> bool {
        !matches!(self, Plan::Free)
    }
}

impl std::fmt::Display for Plan {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Plan {
    type Err = SitefixError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "free" => Ok(Plan::Free),
            "pro" => Ok(Plan::Pro),
            "business" => Ok(Plan::Business),
            "enterprise" => Ok(Plan::Enterprise),
            other => Err(SitefixError::Validation(format!("unknown plan: {other}"))),
        }
    }
}

/// Billing-provider subscription states.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SubscriptionStatus {
    Active,
    Trialing,
    PastDue,
    Unpaid,
    Canceled,
    Incomplete,
    IncompleteExpired,
    Paused,
}

impl SubscriptionStatus {
    /// Whether the subscription currently grants its plan.
    pub fn is_entitled(&self) -> bool {
        matches!(self, SubscriptionStatus::Active | SubscriptionStatus::Trialing)
    }
}

impl FromStr for SubscriptionStatus {
    type Err = SitefixError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "active" => Ok(SubscriptionStatus::Active),
            "trialing" => Ok(SubscriptionStatus::Trialing),
            "past_due" => Ok(SubscriptionStatus::PastDue),
            "unpaid" => Ok(SubscriptionStatus::Unpaid),
            "canceled" => Ok(SubscriptionStatus::Canceled),
            "incomplete" => Ok(SubscriptionStatus::Incomplete),
            "incomplete_expired" => Ok(SubscriptionStatus::IncompleteExpired),
            "paused" => Ok(SubscriptionStatus::Paused),
            other => Err(SitefixError::Validation(format!(
                "unknown subscription status: {other}"
            ))),
        }
    }
}

/// Subscription as resolved by the billing collaborator.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Subscription {
    pub status: SubscriptionStatus,
    pub plan: Option<Plan>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn severity_thresholds() {
        assert_eq!(Severity::from_score(Some(0.0)), Severity::Critical);
        assert_eq!(Severity::from_score(Some(0.49)), Severity::Critical);
        assert_eq!(Severity::from_score(Some(0.5)), Severity::High);
        assert_eq!(Severity::from_score(Some(0.69)), Severity::High);
        assert_eq!(Severity::from_score(Some(0.7)), Severity::Medium);
        assert_eq!(Severity::from_score(Some(0.89)), Severity::Medium);
        assert_eq!(Severity::from_score(Some(0.9)), Severity::Low);
        assert_eq!(Severity::from_score(Some(1.0)), Severity::Low);
        assert_eq!(Severity::from_score(None), Severity::Low);
    }

    #[test]
    fn severity_is_monotonic_in_score() {
        let scores: Vec<f64> = (0..100).map(|i| i as f64 / 100.0).collect();
        for pair in scores.windows(2) {
            let lower = Severity::from_score(Some(pair[0]));
            let higher = Severity::from_score(Some(pair[1]));
            assert!(
                lower >= higher,
                "severity({}) = {lower} should be at least severity({}) = {higher}",
                pair[0],
                pair[1]
            );
        }
    }

    #[test]
    fn category_wire_names() {
        assert_eq!(
            serde_json::to_string(&Category::BestPractices).unwrap(),
            "\"best-practices\""
        );
        assert_eq!(Category::from_lighthouse("performance"), Some(Category::Speed));
        assert_eq!(Category::from_lighthouse("pwa"), None);
        assert_eq!("best-practices".parse::<Category>().unwrap(), Category::BestPractices);
    }

    #[test]
    fn status_transitions_are_one_way() {
        use ScanStatus::*;
        assert!(Pending.can_transition_to(Complete));
        assert!(Pending.can_transition_to(Failed));
        assert!(!Complete.can_transition_to(Failed));
        assert!(!Failed.can_transition_to(Complete));
        assert!(!Complete.can_transition_to(Pending));
        assert!(!Pending.can_transition_to(Pending));
        assert!(Complete.is_terminal() && Failed.is_terminal() && !Pending.is_terminal());
    }

    #[test]
    fn status_round_trips_through_db_text() {
        for status in [ScanStatus::Pending, ScanStatus::Complete, ScanStatus::Failed] {
            assert_eq!(status.as_str().parse::<ScanStatus>().unwrap(), status);
        }
        assert!("DONE".parse::<ScanStatus>().is_err());
    }

    #[test]
    fn summary_uses_camel_case_keys() {
        let summary = ScanSummary {
            scores: CategoryScores {
                speed: Some(42),
                seo: None,
                accessibility: Some(78),
                best_practices: Some(96),
            },
            web_vitals: OrderedMap::new(),
        };
        let json = serde_json::to_value(&summary).unwrap();
        assert_eq!(json["scores"]["bestPractices"], 96);
        assert!(json["scores"]["seo"].is_null());
        assert!(json["webVitals"].as_object().unwrap().is_empty());
    }

    #[test]
    fn subscription_entitlement() {
        assert!(SubscriptionStatus::Active.is_entitled());
        assert!(SubscriptionStatus::Trialing.is_entitled());
        assert!(!SubscriptionStatus::PastDue.is_entitled());
        assert!(!"canceled".parse::<SubscriptionStatus>().unwrap().is_entitled());
    }
}
