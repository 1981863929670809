use std::env;
use std::path::PathBuf;
use std::time::Duration;

use pagespeed_client::{DEFAULT_ENDPOINT, DEFAULT_TIMEOUT};

use crate::error::SitefixError;


/// Runtime configuration loaded from environment variables.
/// Handed explicitly to the fetcher and store at construction; nothing reads env later.
#[derive(Debug, Clone)]
pub struct Config {
    // Database
    pub database_url: Option<String>,

    // Audit provider
    pub pagespeed_api_key: Option<String>,
    pub pagespeed_endpoint: String,
    pub pagespeed_timeout: Duration,

    // Issue templates (override of the built-in table)
    pub issue_templates_path: Option<PathBuf>,
}

impl Config {
    /// Load configuration from the process environment (and `.env` if present).
    pub fn from_env() -> Result<Self, SitefixError> {
        dotenvy::dotenv().ok();
        Self::from_vars(|key| env::var(key).ok())
    }

    /// Build from an arbitrary variable source. Empty values count as unset.
    pub fn from_vars(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, SitefixError> {
        let get = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        let pagespeed_timeout = match get("PAGESPEED_TIMEOUT_SECS") {
            Some(raw) => {
                let secs: u64 = raw.trim().parse().map_err(|_| {
                    SitefixError::Config(format!(
                        "PAGESPEED_TIMEOUT_SECS must be a positive integer, got {raw:?}"
                    ))
                })?;
                if secs == 0 {
                    return Err(SitefixError::Config(
                        "PAGESPEED_TIMEOUT_SECS must be greater than zero".to_string(),
                    ));
                }
                Duration::from_secs(secs)
            }
            None => DEFAULT_TIMEOUT,
        };

        Ok(Self {
            database_url: get("DATABASE_URL"),
            pagespeed_api_key: get("PAGESPEED_API_KEY"),
            pagespeed_endpoint: get("PAGESPEED_ENDPOINT")
                .unwrap_or_else(|| DEFAULT_ENDPOINT.to_string()),
            pagespeed_timeout,
            issue_templates_path: get("ISSUE_TEMPLATES_PATH").map(PathBuf::from),
        })
    }

    /// The database URL, for commands that persist scans.
    pub fn require_database_url(&self) -> Result<&str, SitefixError> {
        self.database_url
            .as_deref()
            .ok_or_else(|| SitefixError::Config("DATABASE_URL environment variable is required".into()))
    }

    /// Log which settings are present without leaking secrets.
    pub fn log_redacted(&self) {
        fn preview_opt(val: &Option<String>) -> String {
            match val {
                Some(v) => {
                    let head: String = v.chars().take(5).collect();
                    format!("{}...({} chars)", head, v.len())
                }
                None => "<not set>".to_string(),
            }
        }

        tracing::info!("Config loaded:");
        tracing::info!(
            "  DATABASE_URL: {}",
            if self.database_url.is_some() { "<set>" } else { "<not set>" }
        );
        tracing::info!("  PAGESPEED_API_KEY: {}", preview_opt(&self.pagespeed_api_key));
        tracing::info!("  PAGESPEED_ENDPOINT: {}", self.pagespeed_endpoint);
        tracing::info!("  PAGESPEED_TIMEOUT_SECS: {}", self.pagespeed_timeout.as_secs());
        tracing::info!(
            "  ISSUE_TEMPLATES_PATH: {}",
            self.issue_templates_path
                .as_ref()
                .map(|p| p.display().to_string())
                .unwrap_or_else(|| "<built-in>".to_string())
        );
    }
}
