pub mod error;
pub mod types;

pub use error::{PageSpeedError, Result};
pub use types::{
    Audit, AuditRef, CategoryResult, Extra, LighthouseResult, LoadingExperience, OrderedMap,
    RawAuditReport, Strategy, WebVitalMetric, CATEGORIES,
};

use std::time::Duration;

pub const DEFAULT_ENDPOINT: &str = "https://www.googleapis.com/pagespeedonline/v5/runPagespeed";

/// Per-call bound on a runPagespeed request. Lighthouse runs routinely take 15-40s.
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(60);

pub struct PageSpeedClient {
    client: reqwest::Client,
    endpoint: String,
    api_key: Option<String>,
}

impl PageSpeedClient {
    pub fn new(api_key: Option<&str>, timeout: Duration) -> Result<Self> {
        Self::with_endpoint(DEFAULT_ENDPOINT, api_key, timeout)
    }

    /// Build a client against a non-default endpoint (proxies, local fakes).
    pub fn with_endpoint(endpoint: &str, api_key: Option<&str>, timeout: Duration) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| PageSpeedError::Config(e.to_string()))?;

        Ok(Self {
            client,
            endpoint: endpoint.trim_end_matches('/').to_string(),
            api_key: api_key.filter(|k| !k.is_empty()).map(String::from),
        })
    }

    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }

    /// Query parameters for one run: url, strategy, all four categories, and the key if set.
    fn query_params<'a>(&'a self, url: &'a str, strategy: Strategy) -> Vec<(&'static str, &'a str)> {
        let mut params = vec![("url", url), ("strategy", strategy.as_str())];
        for category in CATEGORIES {
            params.push(("category", category));
        }
        if let Some(ref key) = self.api_key {
            params.push(("key", key.as_str()));
        }
        params
    }

    /// Run a Lighthouse audit for `url` under one device strategy.
    ///
    /// One outbound request, no retry. A timeout, transport failure,
    /// non-2xx status or undecodable body is returned as an error.
    pub async fn run_pagespeed(&self, url: &str, strategy: Strategy) -> Result<RawAuditReport> {
        tracing::debug!(url, %strategy, "Requesting PageSpeed run");

        let resp = self
            .client
            .get(&self.endpoint)
            .query(&self.query_params(url, strategy))
            .send()
            .await?;

        let status = resp.status();
        if !status.is_success() {
            let message = resp.text().await.unwrap_or_default();
            return Err(PageSpeedError::Api {
                status: status.as_u16(),
                message,
            });
        }

        let report: RawAuditReport = resp.json().await?;
        tracing::debug!(
            url,
            %strategy,
            audits = report.lighthouse_result.audits.len(),
            "PageSpeed run complete"
        );
        Ok(report)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn query_requests_all_categories() {
        let client = PageSpeedClient::new(None, DEFAULT_TIMEOUT).unwrap();
        let params = client.query_params("https://example.com", Strategy::Mobile);
        let categories: Vec<&str> = params
            .iter()
            .filter(|(k, _)| *k == "category")
            .map(|(_, v)| *v)
            .collect();
        assert_eq!(categories, CATEGORIES.to_vec());
        assert!(params.contains(&("strategy", "mobile")));
        assert!(!params.iter().any(|(k, _)| *k == "key"));
    }

    #[test]
    fn api_key_appended_when_present() {
        let client = PageSpeedClient::new(Some("abc123"), DEFAULT_TIMEOUT).unwrap();
        let params = client.query_params("https://example.com", Strategy::Desktop);
        assert!(params.contains(&("key", "abc123")));
        assert!(params.contains(&("strategy", "desktop")));
    }

    #[test]
    fn empty_api_key_is_ignored() {
        let client = PageSpeedClient::new(Some(""), DEFAULT_TIMEOUT).unwrap();
        let params = client.query_params("https://example.com", Strategy::Mobile);
        assert!(!params.iter().any(|(k, _)| *k == "key"));
    }

    #[test]
    fn endpoint_trailing_slash_trimmed() {
        let client =
            PageSpeedClient::with_endpoint("http://localhost:9000/run/", None, DEFAULT_TIMEOUT)
                .unwrap();
        assert_eq!(client.endpoint(), "http://localhost:9000/run");
    }
}
