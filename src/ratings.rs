use crate::config::CredibilityWeights;
use crate::events::{EventSink, MutationEvent, MutationKind};
use crate::repository::ConferenceRepository;
use crate::types::{ConferenceId, EngineError, RatingEvent, Result, Source, UserId};
use chrono::Utc;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::{Mutex, RwLock};
use tracing::{debug, info};

/// Publisher reputation lookup, matched case-insensitively. Unlisted
/// publishers fall back to the configured default.
const PUBLISHER_REPUTATION: &[(&str, f64)] = &[
    ("acm", 1.0),
    ("ieee", 1.0),
    ("usenix", 0.95),
    ("springer", 0.9),
    ("elsevier", 0.85),
];

struct RatingBook {
    events: HashMap<UserId, RatingEvent>,
}

impl RatingBook {
    fn average(&self) -> Option<f64> {
        if self.events.is_empty() {
            return None;
        }
        let sum: u32 = self.events.values().map(|e| e.value as u32).sum();
        Some(sum as f64 / self.events.len() as f64)
    }
}

/// Maintains per-conference rating events and derives average rating and
/// credibility. Writes on the same conference are serialized by a
/// per-identity lock; distinct conferences proceed in parallel.
pub struct RatingAggregator {
    books: RwLock<HashMap<ConferenceId, Arc<Mutex<RatingBook>>>>,
    repository: Arc<ConferenceRepository>,
    weights: CredibilityWeights,
    sink: EventSink,
}

impl RatingAggregator {
    pub fn new(
        repository: Arc<ConferenceRepository>,
        weights: CredibilityWeights,
        sink: EventSink,
    ) -> Self {
        Self {
            books: RwLock::new(HashMap::new()),
            repository,
            weights,
            sink,
        }
    }

    /// Upsert `user`'s rating and recompute the average atomically. Returns
    /// the new average for the conference.
    pub async fn submit_rating(
        &self,
        user: UserId,
        conference: &ConferenceId,
        value: u8,
    ) -> Result<f64> {
        if !(1..=5).contains(&value) {
            return Err(EngineError::InvalidInput(format!(
                "rating must be an integer from 1 to 5, got {}",
                value
            )));
        }
        if !self.repository.exists(conference).await {
            return Err(EngineError::NotFound(format!("conference {}", conference)));
        }

        let book = self.book_for(conference).await;
        let average = {
            let mut book = book.lock().await;
            book.events.insert(
                user,
                RatingEvent {
                    user,
                    conference: conference.clone(),
                    value,
                    submitted_at: Utc::now(),
                },
            );
            // Average cannot be None here, we just inserted an event.
            book.average().unwrap_or(value as f64)
        };

        info!(
            "user {} rated {} with {}, new average {:.2}",
            user, conference, value, average
        );
        self.sink.emit(MutationEvent::new(
            conference.clone(),
            user,
            MutationKind::RatingChanged,
            format!("Average rating is now {:.1}", crate::types::round_one_decimal(average)),
        ));
        Ok(average)
    }

    /// Average over all current events, or None when nobody has rated yet.
    pub async fn average(&self, conference: &ConferenceId) -> Option<f64> {
        let book = {
            let books = self.books.read().await;
            books.get(conference).cloned()
        };
        match book {
            Some(book) => book.lock().await.average(),
            None => None,
        }
    }

    pub async fn rating_count(&self, conference: &ConferenceId) -> usize {
        let book = {
            let books = self.books.read().await;
            books.get(conference).cloned()
        };
        match book {
            Some(book) => book.lock().await.events.len(),
            None => 0,
        }
    }

    /// The acting user's own rating, if any.
    pub async fn rating_of(&self, user: UserId, conference: &ConferenceId) -> Option<u8> {
        let book = {
            let books = self.books.read().await;
            books.get(conference).cloned()
        };
        match book {
            Some(book) => book.lock().await.events.get(&user).map(|e| e.value),
            None => None,
        }
    }

    /// Credibility score for a conference, recomputed on read.
    pub async fn credibility(
        &self,
        conference: &ConferenceId,
        publisher: Option<&str>,
    ) -> f64 {
        let count = self.rating_count(conference).await;
        credibility(conference.source(), publisher, count, &self.weights)
    }

    /// Drop all events for a deleted conference.
    pub async fn purge(&self, conference: &ConferenceId) {
        let mut books = self.books.write().await;
        if books.remove(conference).is_some() {
            debug!("purged rating book for {}", conference);
        }
    }

    async fn book_for(&self, conference: &ConferenceId) -> Arc<Mutex<RatingBook>> {
        {
            let books = self.books.read().await;
            if let Some(book) = books.get(conference) {
                return book.clone();
            }
        }
        let mut books = self.books.write().await;
        books
            .entry(conference.clone())
            .or_insert_with(|| {
                Arc::new(Mutex::new(RatingBook {
                    events: HashMap::new(),
                }))
            })
            .clone()
    }
}

/// Pure credibility function on a 0..=5 scale.
///
/// score = 5 * source_trust * publisher_reputation
///           * (floor + (1 - floor) * n / (n + pivot))
///
/// The saturating volume term keeps one or two ratings from dominating: with
/// the default pivot of 3, a single rating earns a quarter of the volume
/// share and ten ratings roughly three quarters.
pub fn credibility(
    source: Source,
    publisher: Option<&str>,
    rating_count: usize,
    weights: &CredibilityWeights,
) -> f64 {
    let trust = match source {
        Source::Native => weights.native_trust,
        Source::ExternalFeed => weights.external_trust,
    };
    let reputation = publisher
        .map(|p| p.trim().to_lowercase())
        .and_then(|p| {
            PUBLISHER_REPUTATION
                .iter()
                .find(|(name, _)| *name == p)
                .map(|(_, rep)| *rep)
        })
        .unwrap_or(weights.default_publisher_reputation);

    let n = rating_count as f64;
    let volume = n / (n + weights.volume_pivot);
    5.0 * trust * reputation * (weights.volume_floor + (1.0 - weights.volume_floor) * volume)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::ConferenceDraft;

    async fn setup() -> (Arc<ConferenceRepository>, RatingAggregator, ConferenceId) {
        let repo = Arc::new(ConferenceRepository::new());
        let conf = repo
            .create_native(
                1,
                ConferenceDraft {
                    name: "ICSE".to_string(),
                    ..Default::default()
                },
            )
            .await
            .unwrap();
        let (sink, _rx) = EventSink::channel();
        let ratings = RatingAggregator::new(repo.clone(), CredibilityWeights::default(), sink);
        (repo, ratings, conf.id)
    }

    #[tokio::test]
    async fn resubmission_overwrites() {
        let (_repo, ratings, conf) = setup().await;

        ratings.submit_rating(7, &conf, 2).await.unwrap();
        let average = ratings.submit_rating(7, &conf, 5).await.unwrap();

        assert_eq!(ratings.rating_count(&conf).await, 1);
        assert_eq!(average, 5.0);
    }

    #[tokio::test]
    async fn average_is_undefined_without_events() {
        let (_repo, ratings, conf) = setup().await;
        assert_eq!(ratings.average(&conf).await, None);
    }

    #[tokio::test]
    async fn out_of_range_and_unknown_conference_fail() {
        let (_repo, ratings, conf) = setup().await;

        let err = ratings.submit_rating(7, &conf, 0).await.unwrap_err();
        assert!(matches!(err, EngineError::InvalidInput(_)));
        let err = ratings.submit_rating(7, &conf, 6).await.unwrap_err();
        assert!(matches!(err, EngineError::InvalidInput(_)));

        let missing = ConferenceId::External("https://nope".to_string());
        let err = ratings.submit_rating(7, &missing, 3).await.unwrap_err();
        assert!(matches!(err, EngineError::NotFound(_)));
        // A failed submit leaves no partial state behind.
        assert_eq!(ratings.rating_count(&missing).await, 0);
    }

    #[test]
    fn credibility_is_deterministic_and_saturating() {
        let weights = CredibilityWeights::default();

        let a = credibility(Source::Native, Some("ACM"), 4, &weights);
        let b = credibility(Source::Native, Some("ACM"), 4, &weights);
        assert_eq!(a, b);

        // External feeds are trusted less than native records.
        let native = credibility(Source::Native, None, 4, &weights);
        let external = credibility(Source::ExternalFeed, None, 4, &weights);
        assert!(external < native);

        // Volume helps, but with diminishing returns.
        let one = credibility(Source::Native, Some("IEEE"), 1, &weights);
        let ten = credibility(Source::Native, Some("IEEE"), 10, &weights);
        let hundred = credibility(Source::Native, Some("IEEE"), 100, &weights);
        assert!(one < ten && ten < hundred);
        assert!(ten - one > hundred - ten);
        assert!(hundred <= 5.0);
    }
}
