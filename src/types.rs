use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Users are identified by the numeric id the account layer hands us.
pub type UserId = u64;

/// Identity of a conference record, namespaced by origin so a native id and
/// an external feed id can never collide after merge.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(tag = "origin", content = "id", rename_all = "snake_case")]
pub enum ConferenceId {
    /// Organizer-submitted record, id assigned by the repository.
    Native(u64),
    /// Feed-ingested record, keyed by the stable item link from the feed.
    External(String),
}

impl ConferenceId {
    pub fn source(&self) -> Source {
        match self {
            ConferenceId::Native(_) => Source::Native,
            ConferenceId::External(_) => Source::ExternalFeed,
        }
    }

    pub fn is_native(&self) -> bool {
        matches!(self, ConferenceId::Native(_))
    }
}

impl std::fmt::Display for ConferenceId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ConferenceId::Native(id) => write!(f, "native:{}", id),
            ConferenceId::External(id) => write!(f, "external:{}", id),
        }
    }
}

/// Where a conference record came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Source {
    Native,
    ExternalFeed,
}

/// A sub-event hosted by a conference (workshop, tutorial, keynote, ...).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConferenceEvent {
    pub title: String,
    pub kind: String,
    pub date: Option<NaiveDate>,
    pub time: Option<String>,
    pub speakers: Option<String>,
    pub description: Option<String>,
}

/// A published paper attached to a conference, bulk-imported from a
/// scholarly index.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Paper {
    pub title: String,
    pub year: Option<i32>,
    pub citation_count: Option<u32>,
    pub url: Option<String>,
}

/// A stored conference record. Derived metrics (average rating, credibility,
/// follower count) are not part of the record; they live in the engagement
/// components and are joined into a [`ConferenceView`] on read.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Conference {
    pub id: ConferenceId,
    pub name: String,
    pub acronym: Option<String>,
    pub series: Option<String>,
    pub publisher: Option<String>,
    pub location: Option<String>,
    pub start_date: Option<NaiveDate>,
    pub end_date: Option<NaiveDate>,
    pub topics: Option<String>,
    pub description: Option<String>,
    pub speakers: Option<String>,
    pub website: Option<String>,
    pub colocated_with: Option<String>,
    /// Owning organizer; present only on native records.
    pub organizer: Option<UserId>,
    pub events: Vec<ConferenceEvent>,
    pub papers: Vec<Paper>,
    pub created_at: DateTime<Utc>,
    /// Bumped on every native edit; used for optimistic concurrency checks.
    pub version: u64,
}

impl Conference {
    pub fn source(&self) -> Source {
        self.id.source()
    }

    pub fn paper_count(&self) -> usize {
        self.papers.len()
    }
}

/// The mutable descriptive fields of a conference, as supplied by an
/// organizer on create/edit.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ConferenceDraft {
    pub name: String,
    pub acronym: Option<String>,
    pub series: Option<String>,
    pub publisher: Option<String>,
    pub location: Option<String>,
    pub start_date: Option<NaiveDate>,
    pub end_date: Option<NaiveDate>,
    pub topics: Option<String>,
    pub description: Option<String>,
    pub speakers: Option<String>,
    pub website: Option<String>,
    pub colocated_with: Option<String>,
    pub events: Vec<ConferenceEvent>,
}

/// Read model for a conference: the record plus everything the engagement
/// components derive for it.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConferenceView {
    pub conference: Conference,
    /// None when the conference has no ratings yet; never zero-filled.
    pub average_rating: Option<f64>,
    pub rating_count: usize,
    pub credibility: f64,
    pub follower_count: usize,
    pub category: String,
    pub banner: String,
}

impl ConferenceView {
    /// Average rounded to one decimal for display. Full precision stays in
    /// `average_rating`.
    pub fn display_rating(&self) -> Option<f64> {
        self.average_rating.map(round_one_decimal)
    }

    pub fn display_credibility(&self) -> f64 {
        round_one_decimal(self.credibility)
    }
}

pub fn round_one_decimal(value: f64) -> f64 {
    (value * 10.0).round() / 10.0
}

/// A single user's rating of a conference. At most one per (user, conference);
/// resubmission overwrites.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RatingEvent {
    pub user: UserId,
    pub conference: ConferenceId,
    pub value: u8,
    pub submitted_at: DateTime<Utc>,
}

/// An append-only discussion entry. `seq` is assigned monotonically per
/// conference and defines the total order of the thread.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Comment {
    pub id: Uuid,
    pub conference: ConferenceId,
    pub author: UserId,
    pub content: String,
    pub seq: u64,
    pub created_at: DateTime<Utc>,
}

/// Outcome of a feed ingestion batch. Per-record failures are collected here
/// instead of aborting the batch.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct IngestSummary {
    pub received: usize,
    pub stored: usize,
    pub replaced: usize,
    /// (external id or link, error message) per failed record.
    pub failed: Vec<(String, String)>,
}

#[derive(Debug, thiserror::Error)]
pub enum EngineError {
    #[error("not found: {0}")]
    NotFound(String),

    #[error("invalid input: {0}")]
    InvalidInput(String),

    #[error("unauthorized: {0}")]
    Unauthorized(String),

    #[error("conflict: {0}")]
    Conflict(String),

    #[error("upstream error: {0}")]
    Upstream(String),

    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("invalid URL: {0}")]
    InvalidUrl(#[from] url::ParseError),

    #[error("feed parse error: {0}")]
    Parse(String),

    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

pub type Result<T> = std::result::Result<T, EngineError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn native_and_external_ids_never_collide() {
        let native = ConferenceId::Native(42);
        let external = ConferenceId::External("42".to_string());
        assert_ne!(native, external);
        assert_eq!(native.source(), Source::Native);
        assert_eq!(external.source(), Source::ExternalFeed);
    }

    #[test]
    fn display_rounding_keeps_one_decimal() {
        assert_eq!(round_one_decimal(4.25), 4.3);
        assert_eq!(round_one_decimal(3.333333), 3.3);
        assert_eq!(round_one_decimal(5.0), 5.0);
    }
}
