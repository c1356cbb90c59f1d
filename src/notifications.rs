use crate::events::{MutationEvent, MutationKind};
use crate::interest::InterestTracker;
use crate::repository::ConferenceRepository;
use crate::types::{ConferenceId, EngineError, Result, UserId};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{mpsc, RwLock};
use tokio::task::JoinHandle;
use tokio::time::interval;
use tracing::{debug, info};
use uuid::Uuid;

/// A notification produced by the dispatcher for one recipient. Only the
/// read flag ever changes after creation.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Notification {
    pub id: Uuid,
    pub recipient: UserId,
    pub conference: ConferenceId,
    pub kind: MutationKind,
    pub title: String,
    pub content: String,
    pub is_read: bool,
    pub created_at: DateTime<Utc>,
}

/// Poll-based read model over delivered notifications.
pub struct NotificationStore {
    inner: RwLock<HashMap<UserId, Vec<Notification>>>,
    max_per_user: usize,
}

impl NotificationStore {
    pub fn new(max_per_user: usize) -> Self {
        Self {
            inner: RwLock::new(HashMap::new()),
            max_per_user,
        }
    }

    async fn push(&self, notification: Notification) {
        let mut inner = self.inner.write().await;
        let list = inner.entry(notification.recipient).or_default();
        list.push(notification);
        if list.len() > self.max_per_user {
            let excess = list.len() - self.max_per_user;
            list.drain(..excess);
        }
    }

    /// The user's notifications, newest first.
    pub async fn list(&self, user: UserId) -> Vec<Notification> {
        let inner = self.inner.read().await;
        let mut list = inner.get(&user).cloned().unwrap_or_default();
        list.reverse();
        list
    }

    pub async fn unread_count(&self, user: UserId) -> usize {
        let inner = self.inner.read().await;
        inner
            .get(&user)
            .map(|list| list.iter().filter(|n| !n.is_read).count())
            .unwrap_or(0)
    }

    /// Flip one notification to read. Idempotent; fails `Unauthorized` when
    /// the notification belongs to somebody else and `NotFound` when the id
    /// is unknown entirely.
    pub async fn mark_read(&self, user: UserId, id: Uuid) -> Result<()> {
        let mut inner = self.inner.write().await;
        if let Some(list) = inner.get_mut(&user) {
            if let Some(notification) = list.iter_mut().find(|n| n.id == id) {
                notification.is_read = true;
                return Ok(());
            }
        }
        let owned_elsewhere = inner
            .iter()
            .any(|(owner, list)| *owner != user && list.iter().any(|n| n.id == id));
        if owned_elsewhere {
            Err(EngineError::Unauthorized(format!(
                "notification {} does not belong to user {}",
                id, user
            )))
        } else {
            Err(EngineError::NotFound(format!("notification {}", id)))
        }
    }

    /// Flip every unread notification of `user`. Safe to call repeatedly.
    pub async fn mark_all_read(&self, user: UserId) -> usize {
        let mut inner = self.inner.write().await;
        let mut flipped = 0;
        if let Some(list) = inner.get_mut(&user) {
            for notification in list.iter_mut().filter(|n| !n.is_read) {
                notification.is_read = true;
                flipped += 1;
            }
        }
        flipped
    }
}

/// One pending notification per (recipient, conference, kind); later events
/// in the same collapsing window overwrite the content.
#[derive(Debug, Clone)]
struct Pending {
    title: String,
    content: String,
}

/// Consumes mutation events, fans them out to interested users minus the
/// actor, collapses duplicates within the configured window and appends the
/// survivors to the store on every flush tick.
pub struct NotificationDispatcher;

impl NotificationDispatcher {
    pub fn spawn(
        mut rx: mpsc::UnboundedReceiver<MutationEvent>,
        tracker: Arc<InterestTracker>,
        repository: Arc<ConferenceRepository>,
        store: Arc<NotificationStore>,
        window: Duration,
    ) -> DispatcherHandle {
        let handle = tokio::spawn(async move {
            let mut pending: HashMap<(UserId, ConferenceId, MutationKind), Pending> =
                HashMap::new();
            let mut flush_tick = interval(window);

            loop {
                tokio::select! {
                    event = rx.recv() => {
                        match event {
                            Some(event) => {
                                collect(&mut pending, event, &tracker, &repository).await;
                            }
                            None => {
                                // All emitters dropped; deliver what is left
                                // and shut down.
                                flush(&mut pending, &store).await;
                                debug!("notification dispatcher shutting down");
                                break;
                            }
                        }
                    }
                    _ = flush_tick.tick() => {
                        flush(&mut pending, &store).await;
                    }
                }
            }
        });
        DispatcherHandle { handle }
    }
}

async fn collect(
    pending: &mut HashMap<(UserId, ConferenceId, MutationKind), Pending>,
    event: MutationEvent,
    tracker: &InterestTracker,
    repository: &ConferenceRepository,
) {
    let recipients: Vec<UserId> = tracker
        .followers_of(&event.conference)
        .await
        .into_iter()
        .filter(|user| *user != event.actor)
        .collect();
    if recipients.is_empty() {
        return;
    }

    let title = match repository.get(&event.conference).await {
        Ok(conference) => conference.name,
        Err(_) => event.conference.to_string(),
    };

    debug!(
        "fanning out {:?} on {} to {} recipients",
        event.kind,
        event.conference,
        recipients.len()
    );
    for recipient in recipients {
        pending.insert(
            (recipient, event.conference.clone(), event.kind),
            Pending {
                title: title.clone(),
                content: event.detail.clone(),
            },
        );
    }
}

async fn flush(
    pending: &mut HashMap<(UserId, ConferenceId, MutationKind), Pending>,
    store: &NotificationStore,
) {
    if pending.is_empty() {
        return;
    }
    let drained = std::mem::take(pending);
    let count = drained.len();
    for ((recipient, conference, kind), entry) in drained {
        store
            .push(Notification {
                id: Uuid::new_v4(),
                recipient,
                conference,
                kind,
                title: entry.title,
                content: entry.content,
                is_read: false,
                created_at: Utc::now(),
            })
            .await;
    }
    info!("delivered {} notifications", count);
}

/// Owns the dispatcher task; aborting it is safe at any time because the
/// store only ever sees fully formed notifications.
pub struct DispatcherHandle {
    handle: JoinHandle<()>,
}

impl DispatcherHandle {
    pub fn abort(&self) {
        self.handle.abort();
    }

    pub fn is_finished(&self) -> bool {
        self.handle.is_finished()
    }
}
