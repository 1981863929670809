//! PgScanStore: scan records and their issue sets in Postgres.
//!
//! Every write that touches a scan's issues runs in one transaction that
//! holds the scan row lock, so a reader sees either the previous committed
//! issue set or the new one. Reads run in a REPEATABLE READ snapshot so the
//! scan row and its issues come from the same point in time.

use anyhow::{anyhow, Context, Result};
use chrono::{DateTime, Utc};
use sitefix_common::{Issue, RawReports, Scan, ScanRecord, ScanStatus, ScanSummary};
use sqlx::postgres::PgPoolOptions;
use sqlx::types::Json;
use sqlx::{PgPool, Postgres, QueryBuilder, Transaction};
use tracing::{info, warn};
use uuid::Uuid;

/// Most rows a listing may return.
pub const MAX_LIST_LIMIT: u32 = 20;

type ScanRow = (
    Uuid,
    String,
    Uuid,
    String,
    DateTime<Utc>,
    Option<DateTime<Utc>>,
    Option<serde_json::Value>,
    Option<serde_json::Value>,
);

type IssueRow = (String, String, String, String, String, Option<String>, String);

// ---------------------------------------------------------------------------
// PgScanStore
// ---------------------------------------------------------------------------

#[derive(Clone)]
pub struct PgScanStore {
    pool: PgPool,
}

impl PgScanStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    pub async fn connect(database_url: &str) -> Result<Self> {
        let pool = PgPoolOptions::new()
            .max_connections(8)
            .connect(database_url)
            .await
            .context("Failed to connect to Postgres")?;
        Ok(Self::new(pool))
    }

    pub fn pool(&self) -> &PgPool {
        &self.pool
    }

    /// Apply pending migrations (idempotent).
    pub async fn migrate(&self) -> Result<()> {
        sqlx::migrate!("../../migrations").run(&self.pool).await?;
        info!("Migrations complete");
        Ok(())
    }

    /// Create a scan record in PENDING.
    pub async fn create_scan(&self, user_id: Uuid, url: &str) -> Result<Scan> {
        let id = Uuid::new_v4();
        let (created_at,) = sqlx::query_as::<_, (DateTime<Utc>,)>(
            r#"
            INSERT INTO scans (id, url, user_id, status)
            VALUES ($1, $2, $3, 'PENDING')
            RETURNING created_at
            "#,
        )
        .bind(id)
        .bind(url)
        .bind(user_id)
        .fetch_one(&self.pool)
        .await?;

        Ok(Scan {
            id,
            url: url.to_string(),
            user_id,
            status: ScanStatus::Pending,
            created_at,
            completed_at: None,
            summary: None,
            raw_report: None,
            issues: Vec::new(),
        })
    }

    /// Replace the issue set and mark the scan COMPLETE, all in one transaction.
    pub async fn commit_success(
        &self,
        scan_id: Uuid,
        summary: &ScanSummary,
        raw: &RawReports,
        issues: &[Issue],
    ) -> Result<()> {
        let mut tx = self.pool.begin().await?;

        lock_for_transition(&mut tx, scan_id, ScanStatus::Complete).await?;

        sqlx::query("DELETE FROM issues WHERE scan_id = $1")
            .bind(scan_id)
            .execute(&mut *tx)
            .await?;

        sqlx::query(
            r#"
            UPDATE scans
            SET status = 'COMPLETE', completed_at = now(), summary_json = $2, raw_json = $3
            WHERE id = $1
            "#,
        )
        .bind(scan_id)
        .bind(Json(summary))
        .bind(Json(raw))
        .execute(&mut *tx)
        .await?;

        if !issues.is_empty() {
            let mut insert = QueryBuilder::<Postgres>::new(
                "INSERT INTO issues (scan_id, position, title, category, severity, why, how, code, impact) ",
            );
            insert.push_values(issues.iter().enumerate(), |mut row, (position, issue)| {
                row.push_bind(scan_id)
                    .push_bind(position as i32)
                    .push_bind(&issue.title)
                    .push_bind(issue.category.as_str())
                    .push_bind(issue.severity.as_str())
                    .push_bind(&issue.why)
                    .push_bind(&issue.how)
                    .push_bind(issue.code.as_deref())
                    .push_bind(&issue.impact);
            });
            insert.build().execute(&mut *tx).await?;
        }

        tx.commit().await?;
        info!(%scan_id, issues = issues.len(), "Scan committed as COMPLETE");
        Ok(())
    }

    /// Mark the scan FAILED with no issues and no summary.
    ///
    /// A COMPLETE scan is left untouched: an ambiguous commit error may mean
    /// the success commit landed, and its results must not be discarded.
    pub async fn commit_failure(&self, scan_id: Uuid) -> Result<()> {
        let mut tx = self.pool.begin().await?;

        let current = lock_for_transition(&mut tx, scan_id, ScanStatus::Failed).await?;
        if current == ScanStatus::Complete {
            tx.rollback().await?;
            warn!(%scan_id, "Scan already COMPLETE, not marking FAILED");
            return Ok(());
        }

        sqlx::query("DELETE FROM issues WHERE scan_id = $1")
            .bind(scan_id)
            .execute(&mut *tx)
            .await?;

        sqlx::query(
            r#"
            UPDATE scans
            SET status = 'FAILED', completed_at = NULL, summary_json = NULL, raw_json = NULL
            WHERE id = $1
            "#,
        )
        .bind(scan_id)
        .execute(&mut *tx)
        .await?;

        tx.commit().await?;
        info!(%scan_id, "Scan committed as FAILED");
        Ok(())
    }

    /// Read a scan with its issues in stored order.
    pub async fn find_scan(&self, scan_id: Uuid) -> Result<Option<Scan>> {
        let mut tx = self.pool.begin().await?;
        sqlx::query("SET TRANSACTION ISOLATION LEVEL REPEATABLE READ READ ONLY")
            .execute(&mut *tx)
            .await?;

        let row = sqlx::query_as::<_, ScanRow>(
            r#"
            SELECT id, url, user_id, status, created_at, completed_at, summary_json, raw_json
            FROM scans
            WHERE id = $1
            "#,
        )
        .bind(scan_id)
        .fetch_optional(&mut *tx)
        .await?;

        let Some(row) = row else {
            tx.commit().await?;
            return Ok(None);
        };

        let issue_rows = sqlx::query_as::<_, IssueRow>(
            r#"
            SELECT title, category, severity, why, how, code, impact
            FROM issues
            WHERE scan_id = $1
            ORDER BY position
            "#,
        )
        .bind(scan_id)
        .fetch_all(&mut *tx)
        .await?;

        tx.commit().await?;

        let mut scan = row_to_scan(row)?;
        scan.issues = issue_rows
            .into_iter()
            .map(row_to_issue)
            .collect::<Result<Vec<_>>>()?;
        Ok(Some(scan))
    }

    /// A user's scans, newest first. `limit` is capped at [`MAX_LIST_LIMIT`].
    pub async fn list_scans(&self, user_id: Uuid, limit: u32) -> Result<Vec<ScanRecord>> {
        let limit = limit.min(MAX_LIST_LIMIT) as i64;

        let rows = sqlx::query_as::<_, ScanRow>(
            r#"
            SELECT id, url, user_id, status, created_at, completed_at, summary_json, NULL::jsonb
            FROM scans
            WHERE user_id = $1
            ORDER BY created_at DESC
            LIMIT $2
            "#,
        )
        .bind(user_id)
        .bind(limit)
        .fetch_all(&self.pool)
        .await?;

        rows.into_iter()
            .map(|row| row_to_scan(row).map(|scan| ScanRecord::from(&scan)))
            .collect()
    }

    /// Number of scans a user has ever started, in any state.
    pub async fn count_scans(&self, user_id: Uuid) -> Result<u64> {
        let (count,) = sqlx::query_as::<_, (i64,)>("SELECT COUNT(*) FROM scans WHERE user_id = $1")
            .bind(user_id)
            .fetch_one(&self.pool)
            .await?;
        Ok(count.max(0) as u64)
    }
}

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

/// Lock the scan row for the rest of the transaction, check the transition
/// and return the current status.
///
/// An out-of-order transition is a caller error and is logged. Callers decide
/// whether to refuse it.
async fn lock_for_transition(
    tx: &mut Transaction<'static, Postgres>,
    scan_id: Uuid,
    next: ScanStatus,
) -> Result<ScanStatus> {
    let row = sqlx::query_as::<_, (String,)>("SELECT status FROM scans WHERE id = $1 FOR UPDATE")
        .bind(scan_id)
        .fetch_optional(&mut **tx)
        .await?;

    let (status,) = row.ok_or_else(|| anyhow!("scan {scan_id} not found"))?;
    let current: ScanStatus = status.parse()?;
    if !current.can_transition_to(next) {
        warn!(%scan_id, from = %current, to = %next, "Unexpected scan status transition");
    }
    Ok(current)
}

fn row_to_scan(row: ScanRow) -> Result<Scan> {
    let (id, url, user_id, status, created_at, completed_at, summary_json, raw_json) = row;

    let summary = summary_json
        .map(serde_json::from_value::<ScanSummary>)
        .transpose()
        .with_context(|| format!("Malformed summary_json on scan {id}"))?;
    let raw_report = raw_json
        .map(serde_json::from_value::<RawReports>)
        .transpose()
        .with_context(|| format!("Malformed raw_json on scan {id}"))?;

    Ok(Scan {
        id,
        url,
        user_id,
        status: status.parse()?,
        created_at,
        completed_at,
        summary,
        raw_report,
        issues: Vec::new(),
    })
}

fn row_to_issue(row: IssueRow) -> Result<Issue> {
    let (title, category, severity, why, how, code, impact) = row;
    Ok(Issue {
        title,
        category: category.parse()?,
        severity: severity.parse()?,
        why,
        how,
        code,
        impact,
    })
}
