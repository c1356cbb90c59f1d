use crate::config::FetchConfig;
use crate::types::{EngineError, Result};
use backoff::backoff::Backoff;
use backoff::exponential::ExponentialBackoff;
use reqwest::Client;
use std::time::Duration;
use tracing::{debug, info, warn};

/// Outcome of a conditional feed fetch.
#[derive(Debug, Clone)]
pub struct FetchOutcome {
    /// None when the server answered 304 Not Modified.
    pub content: Option<String>,
    pub etag: Option<String>,
    pub last_modified: Option<String>,
}

/// HTTP fetcher for the external conference feed. Every request carries a
/// bounded timeout; transient failures are retried up to the configured
/// count with exponential backoff, then surfaced as `Upstream`.
pub struct FeedFetcher {
    client: Client,
    config: FetchConfig,
}

impl FeedFetcher {
    pub fn new(config: FetchConfig) -> Result<Self> {
        let redirects = if config.follow_redirects {
            reqwest::redirect::Policy::limited(config.max_redirects)
        } else {
            reqwest::redirect::Policy::none()
        };
        let client = Client::builder()
            .user_agent(&config.user_agent)
            .timeout(Duration::from_secs(config.timeout_seconds))
            .gzip(true)
            .deflate(true)
            .brotli(true)
            .redirect(redirects)
            .build()?;
        Ok(Self { client, config })
    }

    pub async fn fetch(
        &self,
        url: &str,
        etag: Option<&str>,
        last_modified: Option<&str>,
    ) -> Result<FetchOutcome> {
        // Reject obviously bad URLs before going to the network.
        url::Url::parse(url)?;

        let mut backoff: ExponentialBackoff<backoff::SystemClock> = ExponentialBackoff {
            current_interval: Duration::from_secs(self.config.retry_delay_seconds),
            initial_interval: Duration::from_secs(self.config.retry_delay_seconds),
            max_interval: Duration::from_secs(self.config.retry_delay_seconds * 8),
            multiplier: 2.0,
            max_elapsed_time: None,
            ..Default::default()
        };

        let mut last_error: Option<EngineError> = None;
        for attempt in 0..=self.config.max_retries {
            match self.fetch_once(url, etag, last_modified).await {
                Ok(outcome) => {
                    debug!("fetched feed {} on attempt {}", url, attempt + 1);
                    return Ok(outcome);
                }
                Err(e) => {
                    warn!("attempt {} failed for {}: {}", attempt + 1, url, e);
                    last_error = Some(e);
                    if attempt < self.config.max_retries {
                        if let Some(delay) = backoff.next_backoff() {
                            tokio::time::sleep(delay).await;
                        }
                    }
                }
            }
        }

        let message = last_error
            .map(|e| e.to_string())
            .unwrap_or_else(|| "unknown fetch failure".to_string());
        Err(EngineError::Upstream(format!(
            "feed fetch failed after {} attempts: {}",
            self.config.max_retries + 1,
            message
        )))
    }

    async fn fetch_once(
        &self,
        url: &str,
        etag: Option<&str>,
        last_modified: Option<&str>,
    ) -> Result<FetchOutcome> {
        let mut request = self.client.get(url);
        if let Some(etag) = etag {
            request = request.header("If-None-Match", etag);
        }
        if let Some(last_modified) = last_modified {
            request = request.header("If-Modified-Since", last_modified);
        }

        let response = request.send().await?;
        let status = response.status();

        if status == reqwest::StatusCode::NOT_MODIFIED {
            debug!("feed not modified: {}", url);
            return Ok(FetchOutcome {
                content: None,
                etag: etag.map(|s| s.to_string()),
                last_modified: last_modified.map(|s| s.to_string()),
            });
        }
        if !status.is_success() {
            return Err(EngineError::Upstream(format!(
                "HTTP {}: {}",
                status,
                status.canonical_reason().unwrap_or("unknown")
            )));
        }

        let new_etag = response
            .headers()
            .get("etag")
            .and_then(|v| v.to_str().ok())
            .map(|s| s.to_string());
        let new_last_modified = response
            .headers()
            .get("last-modified")
            .and_then(|v| v.to_str().ok())
            .map(|s| s.to_string());

        let content = response.text().await?;
        info!("fetched feed {} ({} bytes)", url, content.len());
        Ok(FetchOutcome {
            content: Some(content),
            etag: new_etag,
            last_modified: new_last_modified,
        })
    }
}
