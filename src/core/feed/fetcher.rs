use std::time::Duration;

use reqwest::header::{
    HeaderMap, HeaderName, HeaderValue, ACCEPT, ACCEPT_LANGUAGE, CACHE_CONTROL, PRAGMA, USER_AGENT,
};
use tracing::debug;

use crate::core::config::IngestConfig;

#[derive(Debug, thiserror::Error)]
pub enum FetchError {
    #[error("http client configuration: {0}")]
    Client(String),
    #[error("request timed out")]
    Timeout,
    #[error("certificate validation failed: {0}")]
    Ssl(String),
    #[error("endpoint not found (HTTP 404), feed URL is likely invalid or moved")]
    NotFound,
    #[error("unexpected status code: {0}")]
    HttpStatus(u16),
    #[error("request failed: {0}")]
    Transport(String),
}

impl FetchError {
    fn from_reqwest(err: reqwest::Error) -> Self {
        if err.is_timeout() {
            return FetchError::Timeout;
        }
        let chain = error_chain(&err);
        if err.is_builder() {
            return FetchError::Client(chain);
        }
        let lowered = chain.to_lowercase();
        if lowered.contains("certificate") || lowered.contains("ssl") {
            return FetchError::Ssl(chain);
        }
        FetchError::Transport(chain)
    }

    /// Timeouts, transport faults, and server-side errors are worth another
    /// attempt. A 404, a certificate problem, or any other client-side status
    /// will not heal between retries.
    pub fn is_retryable(&self) -> bool {
        match self {
            FetchError::Timeout | FetchError::Transport(_) => true,
            FetchError::HttpStatus(code) => *code >= 500,
            FetchError::Client(_) | FetchError::Ssl(_) | FetchError::NotFound => false,
        }
    }
}

/// reqwest's Display keeps the interesting part (certificate names, connect
/// errno) in the source chain, so flatten the chain into one line.
fn error_chain(err: &reqwest::Error) -> String {
    let mut parts = vec![err.to_string()];
    let mut source = std::error::Error::source(err);
    while let Some(inner) = source {
        parts.push(inner.to_string());
        source = inner.source();
    }
    parts.join(": ")
}

pub fn build_client(config: &IngestConfig) -> Result<reqwest::Client, FetchError> {
    let pairs: [(HeaderName, &str); 5] = [
        (USER_AGENT, config.headers.user_agent.as_str()),
        (ACCEPT, config.headers.accept.as_str()),
        (ACCEPT_LANGUAGE, config.headers.accept_language.as_str()),
        (CACHE_CONTROL, "no-cache"),
        (PRAGMA, "no-cache"),
    ];
    let mut headers = HeaderMap::new();
    for (name, value) in pairs {
        let value = HeaderValue::from_str(value)
            .map_err(|err| FetchError::Client(format!("invalid {name} header: {err}")))?;
        headers.insert(name, value);
    }

    reqwest::Client::builder()
        .timeout(config.request_timeout)
        .default_headers(headers)
        .build()
        .map_err(FetchError::from_reqwest)
}

pub async fn fetch_feed(client: &reqwest::Client, url: &str) -> Result<String, FetchError> {
    let response = client
        .get(url)
        .send()
        .await
        .map_err(FetchError::from_reqwest)?;
    let status = response.status();
    if status.as_u16() == 404 {
        return Err(FetchError::NotFound);
    }
    if !status.is_success() {
        return Err(FetchError::HttpStatus(status.as_u16()));
    }
    response.text().await.map_err(FetchError::from_reqwest)
}

/// Retry `max_retries` times beyond the first attempt, sleeping
/// `attempt * backoff_unit` between sends. Non-retryable failures surface
/// immediately.
pub async fn fetch_feed_with_retry(
    client: &reqwest::Client,
    url: &str,
    max_retries: u32,
    backoff_unit: Duration,
) -> Result<String, FetchError> {
    let mut attempt = 0_u32;
    loop {
        match fetch_feed(client, url).await {
            Ok(body) => return Ok(body),
            Err(err) => {
                if !err.is_retryable() || attempt >= max_retries {
                    return Err(err);
                }
                attempt += 1;
                debug!(url, attempt, error = %err, "retrying fetch after backoff");
                tokio::time::sleep(backoff_unit * attempt).await;
            }
        }
    }
}
