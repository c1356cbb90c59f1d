use crate::config::FetchConfig;
use crate::feed::{DevEventsParser, FeedFetcher};
use crate::types::{Conference, Result};
use async_trait::async_trait;
use tracing::{info, warn};

/// A pluggable origin of external conference records.
#[async_trait]
pub trait FeedSource: Send + Sync {
    /// Stable identifier for this source.
    fn source_id(&self) -> String;

    /// Human-readable name for logging.
    fn source_name(&self) -> String;

    /// Fetch the current batch of conference records from the source.
    async fn pull(&mut self) -> Result<Vec<Conference>>;

    /// Recommended polling interval.
    fn poll_interval_ms(&self) -> u64;
}

/// The dev.events RSS feed as a [`FeedSource`]. Tracks conditional request
/// headers across pulls so an unchanged feed costs a 304.
pub struct DevEventsSource {
    url: String,
    fetcher: FeedFetcher,
    parser: DevEventsParser,
    etag: Option<String>,
    last_modified: Option<String>,
    poll_interval_ms: u64,
}

impl DevEventsSource {
    pub const DEFAULT_URL: &'static str = "https://dev.events/rss.xml";

    pub fn new(url: impl Into<String>, fetch_config: FetchConfig) -> Result<Self> {
        Ok(Self {
            url: url.into(),
            fetcher: FeedFetcher::new(fetch_config)?,
            parser: DevEventsParser::new(),
            etag: None,
            last_modified: None,
            poll_interval_ms: 1_800_000,
        })
    }
}

#[async_trait]
impl FeedSource for DevEventsSource {
    fn source_id(&self) -> String {
        format!("dev-events:{}", self.url)
    }

    fn source_name(&self) -> String {
        "dev.events".to_string()
    }

    async fn pull(&mut self) -> Result<Vec<Conference>> {
        info!("pulling conference feed: {}", self.url);
        let outcome = self
            .fetcher
            .fetch(&self.url, self.etag.as_deref(), self.last_modified.as_deref())
            .await?;

        self.etag = outcome.etag;
        self.last_modified = outcome.last_modified;

        let content = match outcome.content {
            Some(content) => content,
            None => {
                warn!("feed {} not modified since last pull", self.url);
                return Ok(Vec::new());
            }
        };

        // A full payload is a fresh snapshot of the feed, so earlier seen
        // links must not suppress re-ingestion.
        self.parser.clear_seen();
        self.parser.parse(&content)
    }

    fn poll_interval_ms(&self) -> u64 {
        self.poll_interval_ms
    }
}
