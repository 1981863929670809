use pagespeed_client::{PageSpeedError, Strategy};
use thiserror::Error;

/// A provider call failed for one device strategy. Never retried.
#[derive(Debug, Error)]
#[error("{strategy} audit failed: {cause}")]
pub struct AuditFetchError {
    pub strategy: Strategy,
    #[source]
    pub cause: PageSpeedError,
}

impl AuditFetchError {
    pub fn new(strategy: Strategy, cause: PageSpeedError) -> Self {
        Self { strategy, cause }
    }

    pub fn is_timeout(&self) -> bool {
        matches!(self.cause, PageSpeedError::Timeout)
    }
}

/// What a caller starting a scan can see go wrong.
#[derive(Debug, Error)]
pub enum ScanError {
    #[error("Invalid URL: {0}")]
    InvalidUrl(String),

    #[error("Go Pro for more scanning and results.")]
    QuotaExceeded,

    /// The scan was committed as FAILED.
    #[error("Scan failed. Try again.")]
    Failed {
        scan_id: uuid::Uuid,
        #[source]
        cause: AuditFetchError,
    },

    #[error("Persistence error: {0}")]
    Persistence(#[from] anyhow::Error),
}

impl From<sitefix_common::SitefixError> for ScanError {
    fn from(err: sitefix_common::SitefixError) -> Self {
        match err {
            sitefix_common::SitefixError::InvalidUrl(msg) => ScanError::InvalidUrl(msg),
            other => ScanError::Persistence(other.into()),
        }
    }
}
