use crate::engine::ConferenceEngine;
use crate::notifications::Notification;
use crate::types::UserId;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::RwLock;
use tokio::task::JoinHandle;
use tracing::{debug, info};

/// Explicit per-user session: constructed at login, destroyed at logout.
/// Owns the notification poll task, so no timer can outlive the session
/// and no component ever reaches into ambient global auth state.
pub struct Session {
    user: UserId,
    engine: Arc<ConferenceEngine>,
    poller: Option<NotificationPoller>,
}

impl Session {
    pub fn open(engine: Arc<ConferenceEngine>, user: UserId) -> Self {
        info!("opened session for user {}", user);
        Self {
            user,
            engine,
            poller: None,
        }
    }

    pub fn user(&self) -> UserId {
        self.user
    }

    pub fn engine(&self) -> &Arc<ConferenceEngine> {
        &self.engine
    }

    /// Start the cooperative notification poll loop. Restarting replaces the
    /// previous loop. Each completed poll replaces the cached snapshot
    /// wholesale, so a superseded in-flight response never wins.
    pub fn start_notification_poll(&mut self, every: Duration) {
        self.stop_notification_poll();

        let running = Arc::new(AtomicBool::new(true));
        let latest: Arc<RwLock<Vec<Notification>>> = Arc::new(RwLock::new(Vec::new()));

        let engine = self.engine.clone();
        let user = self.user;
        let loop_running = running.clone();
        let loop_latest = latest.clone();
        let handle = tokio::spawn(async move {
            let mut tick = tokio::time::interval(every);
            while loop_running.load(Ordering::Acquire) {
                tick.tick().await;
                if !loop_running.load(Ordering::Acquire) {
                    break;
                }
                let snapshot = engine.list_notifications(user).await;
                *loop_latest.write().await = snapshot;
            }
            debug!("notification poll loop for user {} ended", user);
        });

        self.poller = Some(NotificationPoller {
            latest,
            running,
            handle,
        });
    }

    /// Latest snapshot the poll loop has seen. Empty until the first poll
    /// completes or when polling was never started.
    pub async fn latest_notifications(&self) -> Vec<Notification> {
        match &self.poller {
            Some(poller) => poller.latest.read().await.clone(),
            None => Vec::new(),
        }
    }

    pub fn is_polling(&self) -> bool {
        self.poller
            .as_ref()
            .map(|p| !p.handle.is_finished())
            .unwrap_or(false)
    }

    /// Stop the poll loop deterministically. Idempotent.
    pub fn stop_notification_poll(&mut self) {
        if let Some(poller) = self.poller.take() {
            poller.running.store(false, Ordering::Release);
            poller.handle.abort();
            debug!("stopped notification polling for user {}", self.user);
        }
    }

    /// Tear the session down; equivalent to dropping it.
    pub fn close(mut self) {
        self.stop_notification_poll();
        info!("closed session for user {}", self.user);
    }
}

impl Drop for Session {
    fn drop(&mut self) {
        self.stop_notification_poll();
    }
}

struct NotificationPoller {
    latest: Arc<RwLock<Vec<Notification>>>,
    running: Arc<AtomicBool>,
    handle: JoinHandle<()>,
}
