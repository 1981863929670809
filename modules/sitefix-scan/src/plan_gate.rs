//! Read-time issue visibility by subscription tier.
//!
//! Nothing here touches stored data; the view is recomputed on every read.

use chrono::{DateTime, Utc};
use serde::Serialize;
use sitefix_common::{Issue, Plan, Scan, ScanStatus, ScanSummary, Subscription};
use uuid::Uuid;

/// Issues a free plan sees, taken from the front in stored order.
pub const FREE_VISIBLE_ISSUES: usize = 4;

/// Scans a free plan may start in total.
pub const FREE_SCAN_QUOTA: u64 = 1;

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PlanView {
    pub visible_issues: Vec<Issue>,
    pub is_limited: bool,
    pub hidden_count: usize,
}

/// Entitled plan for a subscription. Only `active` and `trialing` grant a
/// paid plan; a paid subscription without a recorded plan counts as pro.
pub fn resolve_plan(subscription: Option<&Subscription>) -> Plan {
    match subscription {
        Some(sub) if sub.status.is_entitled() => sub.plan.unwrap_or(Plan::Pro),
        _ => Plan::Free,
    }
}

pub fn filter_for_plan(issues: &[Issue], plan: Plan) -> PlanView {
    match plan {
        Plan::Free => PlanView {
            visible_issues: issues.iter().take(FREE_VISIBLE_ISSUES).cloned().collect(),
            is_limited: true,
            hidden_count: issues.len().saturating_sub(FREE_VISIBLE_ISSUES),
        },
        Plan::Pro | Plan::Business | Plan::Enterprise => PlanView {
            visible_issues: issues.to_vec(),
            is_limited: false,
            hidden_count: 0,
        },
    }
}

/// Whether a user with `prior_scans` existing scans may start another.
pub fn can_start_scan(plan: Plan, prior_scans: u64) -> bool {
    match plan {
        Plan::Free => prior_scans < FREE_SCAN_QUOTA,
        Plan::Pro | Plan::Business | Plan::Enterprise => true,
    }
}

/// What a scan's owner is shown.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ScanView {
    pub id: Uuid,
    pub url: String,
    pub status: ScanStatus,
    pub created_at: DateTime<Utc>,
    pub completed_at: Option<DateTime<Utc>>,
    pub summary: Option<ScanSummary>,
    pub issues: Vec<Issue>,
    pub plan: Plan,
    pub is_limited: bool,
    pub hidden_count: usize,
}

impl ScanView {
    /// `None` unless `viewer` owns the scan.
    pub fn build(scan: &Scan, viewer: Uuid, plan: Plan) -> Option<Self> {
        if scan.user_id != viewer {
            return None;
        }
        let gated = filter_for_plan(&scan.issues, plan);
        Some(Self {
            id: scan.id,
            url: scan.url.clone(),
            status: scan.status,
            created_at: scan.created_at,
            completed_at: scan.completed_at,
            summary: scan.summary.clone(),
            issues: gated.visible_issues,
            plan,
            is_limited: gated.is_limited,
            hidden_count: gated.hidden_count,
        })
    }
}
