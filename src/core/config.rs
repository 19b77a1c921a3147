use std::time::Duration;

/// Browser-like request headers. Several security publishers reject
/// unidentified clients, so the values stay configurable per deployment.
#[derive(Debug, Clone)]
pub struct FetchHeaders {
    pub user_agent: String,
    pub accept: String,
    pub accept_language: String,
}

impl Default for FetchHeaders {
    fn default() -> Self {
        Self {
            user_agent: "Mozilla/5.0 (Macintosh; Intel Mac OS X 10_15_7) AppleWebKit/537.36 \
                         (KHTML, like Gecko) Chrome/120.0.0.0 Safari/537.36"
                .to_string(),
            accept: "text/html,application/xhtml+xml,application/xml;q=0.9,image/avif,\
                     image/webp,image/apng,*/*;q=0.8"
                .to_string(),
            accept_language: "en-US,en;q=0.9".to_string(),
        }
    }
}

#[derive(Debug, Clone)]
pub struct IngestConfig {
    pub request_timeout: Duration,
    /// Retries after the initial attempt, so `2` means at most three requests.
    pub max_retries: u32,
    /// Retry N sleeps `N * backoff_unit` before re-sending.
    pub backoff_unit: Duration,
    pub max_items_per_source: usize,
    pub summary_limit: usize,
    pub retention_days: i64,
    pub headers: FetchHeaders,
}

impl Default for IngestConfig {
    fn default() -> Self {
        Self {
            request_timeout: Duration::from_secs(15),
            max_retries: 2,
            backoff_unit: Duration::from_millis(1000),
            max_items_per_source: 10,
            summary_limit: 300,
            retention_days: 30,
            headers: FetchHeaders::default(),
        }
    }
}
