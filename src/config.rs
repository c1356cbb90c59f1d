use std::time::Duration;

/// Tunables for the whole engine. Everything here has a sensible default so
/// callers can start from `EngineConfig::default()` and override selectively.
#[derive(Debug, Clone)]
pub struct EngineConfig {
    pub credibility: CredibilityWeights,
    /// Follower counts that trigger a milestone mutation event when first
    /// reached. Configuration, not a hard requirement.
    pub follower_milestones: Vec<usize>,
    /// Qualifying mutations of the same (recipient, conference, kind) within
    /// this window collapse into a single notification.
    pub collapse_window: Duration,
    /// Oldest notifications beyond this count are dropped per user.
    pub max_notifications_per_user: usize,
    pub fetch: FetchConfig,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            credibility: CredibilityWeights::default(),
            follower_milestones: vec![1, 10, 50, 100],
            collapse_window: Duration::from_secs(2),
            max_notifications_per_user: 100,
            fetch: FetchConfig::default(),
        }
    }
}

/// Weights for the credibility score. The score is deterministic in these
/// values plus (source, publisher, rating volume); see `ratings::credibility`.
#[derive(Debug, Clone)]
pub struct CredibilityWeights {
    /// Trust factor for organizer-submitted records.
    pub native_trust: f64,
    /// Trust factor for feed-ingested records; lower than native.
    pub external_trust: f64,
    /// Reputation assigned to publishers not in the lookup table.
    pub default_publisher_reputation: f64,
    /// Half-saturation point of the volume term `n / (n + pivot)`.
    pub volume_pivot: f64,
    /// Share of the score granted before any ratings exist; the remainder is
    /// earned through volume.
    pub volume_floor: f64,
}

impl Default for CredibilityWeights {
    fn default() -> Self {
        Self {
            native_trust: 1.0,
            external_trust: 0.6,
            default_publisher_reputation: 0.5,
            volume_pivot: 3.0,
            volume_floor: 0.4,
        }
    }
}

/// HTTP fetch settings for feed ingestion.
#[derive(Debug, Clone)]
pub struct FetchConfig {
    pub user_agent: String,
    pub timeout_seconds: u64,
    pub max_retries: u32,
    pub retry_delay_seconds: u64,
    pub follow_redirects: bool,
    pub max_redirects: usize,
}

impl Default for FetchConfig {
    fn default() -> Self {
        Self {
            user_agent: "ConfTrack/0.1".to_string(),
            timeout_seconds: 10,
            max_retries: 1,
            retry_delay_seconds: 2,
            follow_redirects: true,
            max_redirects: 5,
        }
    }
}
