use crate::categorize::categorize;
use crate::comments::CommentThread;
use crate::config::EngineConfig;
use crate::events::{EventSink, MutationEvent, MutationKind};
use crate::feed::FeedSource;
use crate::interest::{InterestState, InterestTracker};
use crate::notifications::{DispatcherHandle, Notification, NotificationDispatcher, NotificationStore};
use crate::ranking::{self, FeedFilter, SortKey};
use crate::ratings::RatingAggregator;
use crate::repository::ConferenceRepository;
use crate::types::{
    Comment, Conference, ConferenceDraft, ConferenceId, ConferenceView, EngineError,
    IngestSummary, Paper, Result, UserId,
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{info, warn};
use uuid::Uuid;

/// A conference plus its discussion thread, as returned by
/// [`ConferenceEngine::get_conference`].
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConferenceDetail {
    pub view: ConferenceView,
    pub comments: Vec<Comment>,
}

#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize)]
pub struct EngineStats {
    pub total_conferences: usize,
    pub native_conferences: usize,
    pub external_conferences: usize,
}

/// Facade wiring the repository and the engagement components together and
/// exposing the operations the outer layers (UI, transport) call.
pub struct ConferenceEngine {
    repository: Arc<ConferenceRepository>,
    ratings: Arc<RatingAggregator>,
    interest: Arc<InterestTracker>,
    comments: Arc<CommentThread>,
    notifications: Arc<NotificationStore>,
    dispatcher: DispatcherHandle,
    sink: EventSink,
}

impl ConferenceEngine {
    pub fn new(config: EngineConfig) -> Self {
        let (sink, rx) = EventSink::channel();
        let repository = Arc::new(ConferenceRepository::new());
        let ratings = Arc::new(RatingAggregator::new(
            repository.clone(),
            config.credibility.clone(),
            sink.clone(),
        ));
        let interest = Arc::new(InterestTracker::new(
            repository.clone(),
            config.follower_milestones.clone(),
            sink.clone(),
        ));
        let comments = Arc::new(CommentThread::new(repository.clone(), sink.clone()));
        let notifications = Arc::new(NotificationStore::new(config.max_notifications_per_user));
        let dispatcher = NotificationDispatcher::spawn(
            rx,
            interest.clone(),
            repository.clone(),
            notifications.clone(),
            config.collapse_window,
        );

        Self {
            repository,
            ratings,
            interest,
            comments,
            notifications,
            dispatcher,
            sink,
        }
    }

    // --- conference lifecycle -------------------------------------------

    pub async fn create_conference(
        &self,
        owner: UserId,
        draft: ConferenceDraft,
    ) -> Result<ConferenceView> {
        let conference = self.repository.create_native(owner, draft).await?;
        self.view_of(conference).await
    }

    /// Edit a native conference. Reads the current version and applies the
    /// draft against it; when another edit slips in between, the conflict is
    /// retried once with a fresh read before being surfaced.
    pub async fn edit_conference(
        &self,
        owner: UserId,
        id: &ConferenceId,
        draft: ConferenceDraft,
    ) -> Result<ConferenceView> {
        let mut attempts = 0;
        let updated = loop {
            let current = self.repository.get(id).await?;
            match self
                .repository
                .update_native(owner, id, current.version, draft.clone())
                .await
            {
                Ok(updated) => break updated,
                Err(EngineError::Conflict(message)) if attempts == 0 => {
                    attempts += 1;
                    warn!("edit conflict on {}, retrying once: {}", id, message);
                }
                Err(e) => return Err(e),
            }
        };

        self.sink.emit(MutationEvent::new(
            id.clone(),
            owner,
            MutationKind::ConferenceUpdated,
            "Conference details were updated".to_string(),
        ));
        self.view_of(updated).await
    }

    /// Delete a native conference and all engagement state attached to it.
    pub async fn delete_conference(&self, owner: UserId, id: &ConferenceId) -> Result<()> {
        self.repository.delete(id, owner).await?;
        self.ratings.purge(id).await;
        self.interest.purge(id).await;
        self.comments.purge(id).await;
        Ok(())
    }

    // --- read side -------------------------------------------------------

    pub async fn get_conference(&self, id: &ConferenceId) -> Result<ConferenceDetail> {
        let conference = self.repository.get(id).await?;
        let comments = self.comments.list_comments(id).await;
        Ok(ConferenceDetail {
            view: self.view_of(conference).await?,
            comments,
        })
    }

    /// List conferences matching `filter`, optionally sorted.
    pub async fn get_conferences(
        &self,
        filter: &FeedFilter,
        sort: Option<SortKey>,
    ) -> Result<Vec<ConferenceView>> {
        let records = self.repository.list(|_| true).await;
        let mut views = Vec::with_capacity(records.len());
        for record in records {
            views.push(self.view_of(record).await?);
        }

        let mut views = ranking::filter(&views, filter);
        if let Some(key) = sort {
            views = ranking::sort(views, key);
        }
        Ok(views)
    }

    /// List conferences split into (native, external-feed) groups, keeping
    /// the sort order within each group.
    pub async fn get_conferences_by_source(
        &self,
        filter: &FeedFilter,
        sort: Option<SortKey>,
    ) -> Result<(Vec<ConferenceView>, Vec<ConferenceView>)> {
        let views = self.get_conferences(filter, sort).await?;
        Ok(ranking::partition_by_source(views))
    }

    // --- engagement ------------------------------------------------------

    pub async fn submit_rating(
        &self,
        user: UserId,
        id: &ConferenceId,
        value: u8,
    ) -> Result<f64> {
        self.ratings.submit_rating(user, id, value).await
    }

    /// The acting user's own rating for a conference, if any.
    pub async fn my_rating(&self, user: UserId, id: &ConferenceId) -> Option<u8> {
        self.ratings.rating_of(user, id).await
    }

    pub async fn toggle_interest(&self, user: UserId, id: &ConferenceId) -> Result<InterestState> {
        self.interest.toggle_interest(user, id).await
    }

    /// Whether the user currently follows the conference.
    pub async fn is_interested(&self, user: UserId, id: &ConferenceId) -> bool {
        self.interest.is_interested(user, id).await
    }

    pub async fn add_comment(
        &self,
        user: UserId,
        id: &ConferenceId,
        content: &str,
    ) -> Result<Comment> {
        self.comments.add_comment(user, id, content).await
    }

    pub async fn list_comments(&self, id: &ConferenceId) -> Vec<Comment> {
        self.comments.list_comments(id).await
    }

    /// The conferences the user follows, as full views.
    pub async fn my_interests(&self, user: UserId) -> Result<Vec<ConferenceView>> {
        let ids = self.interest.interests_of(user).await;
        let mut views = Vec::with_capacity(ids.len());
        for id in ids {
            // A conference can disappear between the id snapshot and the
            // lookup; skip it rather than failing the whole listing.
            if let Ok(conference) = self.repository.get(&id).await {
                views.push(self.view_of(conference).await?);
            }
        }
        Ok(views)
    }

    // --- notifications ---------------------------------------------------

    pub async fn list_notifications(&self, user: UserId) -> Vec<Notification> {
        self.notifications.list(user).await
    }

    pub async fn unread_count(&self, user: UserId) -> usize {
        self.notifications.unread_count(user).await
    }

    pub async fn mark_read(&self, user: UserId, id: Uuid) -> Result<()> {
        self.notifications.mark_read(user, id).await
    }

    pub async fn mark_all_read(&self, user: UserId) -> usize {
        self.notifications.mark_all_read(user).await
    }

    /// Attach bulk-imported papers to a conference.
    pub async fn import_papers(&self, id: &ConferenceId, papers: Vec<Paper>) -> Result<usize> {
        self.repository.import_papers(id, papers).await
    }

    // --- feed ingestion --------------------------------------------------

    /// Merge a parsed batch of external records into the repository.
    pub async fn ingest_feed(&self, batch: Vec<Conference>) -> IngestSummary {
        self.repository.ingest_batch(batch).await
    }

    /// Pull the source once and merge whatever it returns.
    pub async fn refresh_from(&self, source: &mut dyn FeedSource) -> Result<IngestSummary> {
        let batch = source.pull().await?;
        info!(
            "pulled {} records from {}",
            batch.len(),
            source.source_name()
        );
        Ok(self.ingest_feed(batch).await)
    }

    pub async fn stats(&self) -> EngineStats {
        let records = self.repository.list(|_| true).await;
        let native = records.iter().filter(|c| c.id.is_native()).count();
        EngineStats {
            total_conferences: records.len(),
            native_conferences: native,
            external_conferences: records.len() - native,
        }
    }

    /// Stop the dispatcher task. Pending (uncollapsed) notifications are
    /// dropped; delivered ones stay readable.
    pub fn shutdown(&self) {
        self.dispatcher.abort();
    }

    async fn view_of(&self, conference: Conference) -> Result<ConferenceView> {
        let id = conference.id.clone();
        let average_rating = self.ratings.average(&id).await;
        let rating_count = self.ratings.rating_count(&id).await;
        let credibility = self
            .ratings
            .credibility(&id, conference.publisher.as_deref())
            .await;
        let follower_count = self.interest.follower_count(&id).await;
        let (category, banner) = categorize(&conference);

        Ok(ConferenceView {
            conference,
            average_rating,
            rating_count,
            credibility,
            follower_count,
            category: category.to_string(),
            banner: banner.to_string(),
        })
    }
}
