use crate::events::{EventSink, MutationEvent, MutationKind};
use crate::repository::ConferenceRepository;
use crate::types::{ConferenceId, EngineError, Result, UserId};
use serde::{Deserialize, Serialize};
use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use tokio::sync::{Mutex, RwLock};
use tracing::{debug, info};

/// Result of a toggle: the user's new relation state and the conference's
/// updated follower count.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct InterestState {
    pub interested: bool,
    pub follower_count: usize,
}

/// Maintains the (user, conference) follow relations and the denormalized
/// follower count. Toggle and count update are atomic per conference.
pub struct InterestTracker {
    relations: RwLock<HashMap<ConferenceId, Arc<Mutex<HashSet<UserId>>>>>,
    repository: Arc<ConferenceRepository>,
    milestones: Vec<usize>,
    sink: EventSink,
}

impl InterestTracker {
    pub fn new(
        repository: Arc<ConferenceRepository>,
        milestones: Vec<usize>,
        sink: EventSink,
    ) -> Self {
        Self {
            relations: RwLock::new(HashMap::new()),
            repository,
            milestones,
            sink,
        }
    }

    /// Add the relation if absent, remove it if present. Toggling twice in a
    /// row with no other actor returns the follower count to its prior value.
    pub async fn toggle_interest(
        &self,
        user: UserId,
        conference: &ConferenceId,
    ) -> Result<InterestState> {
        if !self.repository.exists(conference).await {
            return Err(EngineError::NotFound(format!("conference {}", conference)));
        }

        let followers = self.followers_entry(conference).await;
        let state = {
            let mut followers = followers.lock().await;
            let interested = if followers.remove(&user) {
                false
            } else {
                followers.insert(user);
                true
            };
            InterestState {
                interested,
                follower_count: followers.len(),
            }
        };

        debug!(
            "user {} {} {} ({} followers)",
            user,
            if state.interested { "follows" } else { "unfollows" },
            conference,
            state.follower_count
        );

        if state.interested && self.milestones.contains(&state.follower_count) {
            info!(
                "conference {} reached {} followers",
                conference, state.follower_count
            );
            self.sink.emit(MutationEvent::new(
                conference.clone(),
                user,
                MutationKind::FollowerMilestone,
                format!("Reached {} followers", state.follower_count),
            ));
        }
        Ok(state)
    }

    pub async fn is_interested(&self, user: UserId, conference: &ConferenceId) -> bool {
        let set = {
            let relations = self.relations.read().await;
            relations.get(conference).cloned()
        };
        match set {
            Some(set) => set.lock().await.contains(&user),
            None => false,
        }
    }

    pub async fn follower_count(&self, conference: &ConferenceId) -> usize {
        let set = {
            let relations = self.relations.read().await;
            relations.get(conference).cloned()
        };
        match set {
            Some(set) => set.lock().await.len(),
            None => 0,
        }
    }

    /// All users currently following a conference; the dispatcher fans
    /// notifications out to this set.
    pub async fn followers_of(&self, conference: &ConferenceId) -> Vec<UserId> {
        let set = {
            let relations = self.relations.read().await;
            relations.get(conference).cloned()
        };
        match set {
            Some(set) => set.lock().await.iter().copied().collect(),
            None => Vec::new(),
        }
    }

    /// All conferences a user follows ("my interests").
    pub async fn interests_of(&self, user: UserId) -> Vec<ConferenceId> {
        let snapshot: Vec<(ConferenceId, Arc<Mutex<HashSet<UserId>>>)> = {
            let relations = self.relations.read().await;
            relations
                .iter()
                .map(|(id, set)| (id.clone(), set.clone()))
                .collect()
        };

        let mut interests = Vec::new();
        for (id, set) in snapshot {
            if set.lock().await.contains(&user) {
                interests.push(id);
            }
        }
        interests
    }

    /// Drop all relations for a deleted conference.
    pub async fn purge(&self, conference: &ConferenceId) {
        let mut relations = self.relations.write().await;
        if relations.remove(conference).is_some() {
            debug!("purged interest relations for {}", conference);
        }
    }

    async fn followers_entry(&self, conference: &ConferenceId) -> Arc<Mutex<HashSet<UserId>>> {
        {
            let relations = self.relations.read().await;
            if let Some(set) = relations.get(conference) {
                return set.clone();
            }
        }
        let mut relations = self.relations.write().await;
        relations
            .entry(conference.clone())
            .or_insert_with(|| Arc::new(Mutex::new(HashSet::new())))
            .clone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::ConferenceDraft;

    async fn setup(milestones: Vec<usize>) -> (InterestTracker, ConferenceId) {
        let repo = Arc::new(ConferenceRepository::new());
        let conf = repo
            .create_native(
                1,
                ConferenceDraft {
                    name: "NeurIPS".to_string(),
                    ..Default::default()
                },
            )
            .await
            .unwrap();
        let (sink, _rx) = EventSink::channel();
        (InterestTracker::new(repo, milestones, sink), conf.id)
    }

    #[tokio::test]
    async fn double_toggle_is_an_involution() {
        let (tracker, conf) = setup(Vec::new()).await;

        let before = tracker.follower_count(&conf).await;
        let on = tracker.toggle_interest(9, &conf).await.unwrap();
        assert_eq!(on, InterestState { interested: true, follower_count: 1 });
        let off = tracker.toggle_interest(9, &conf).await.unwrap();
        assert_eq!(off.interested, false);
        assert_eq!(off.follower_count, before);
    }

    #[tokio::test]
    async fn unknown_conference_is_rejected() {
        let (tracker, _conf) = setup(Vec::new()).await;
        let missing = ConferenceId::Native(999);
        let err = tracker.toggle_interest(9, &missing).await.unwrap_err();
        assert!(matches!(err, EngineError::NotFound(_)));
    }

    #[tokio::test]
    async fn milestone_fires_on_first_follower() {
        let repo = Arc::new(ConferenceRepository::new());
        let conf = repo
            .create_native(
                1,
                ConferenceDraft {
                    name: "PLDI".to_string(),
                    ..Default::default()
                },
            )
            .await
            .unwrap();
        let (sink, mut rx) = EventSink::channel();
        let tracker = InterestTracker::new(repo, vec![1], sink);

        tracker.toggle_interest(9, &conf.id).await.unwrap();
        let event = rx.try_recv().unwrap();
        assert_eq!(event.kind, MutationKind::FollowerMilestone);

        // Unfollow then refollow crosses the threshold again.
        tracker.toggle_interest(9, &conf.id).await.unwrap();
        tracker.toggle_interest(9, &conf.id).await.unwrap();
        assert!(rx.try_recv().is_ok());
    }
}
