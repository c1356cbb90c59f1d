use crate::types::{ConferenceId, UserId};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tokio::sync::mpsc;
use tracing::debug;

/// What kind of write produced a mutation event. Doubles as the notification
/// kind on the dispatcher side.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MutationKind {
    RatingChanged,
    CommentAdded,
    FollowerMilestone,
    ConferenceUpdated,
}

/// Internal signal emitted by a write operation and consumed by the
/// notification dispatcher.
#[derive(Debug, Clone)]
pub struct MutationEvent {
    pub conference: ConferenceId,
    /// The user whose action caused the mutation; excluded from fan-out.
    pub actor: UserId,
    pub kind: MutationKind,
    /// Human-readable summary carried into the notification body.
    pub detail: String,
    pub occurred_at: DateTime<Utc>,
}

impl MutationEvent {
    pub fn new(conference: ConferenceId, actor: UserId, kind: MutationKind, detail: String) -> Self {
        Self {
            conference,
            actor,
            kind,
            detail,
            occurred_at: Utc::now(),
        }
    }
}

/// Cloneable handle the engagement components use to emit mutation events.
/// Emission never blocks the mutating call; once the dispatcher is gone the
/// events are dropped silently.
#[derive(Debug, Clone)]
pub struct EventSink {
    tx: mpsc::UnboundedSender<MutationEvent>,
}

impl EventSink {
    pub fn channel() -> (Self, mpsc::UnboundedReceiver<MutationEvent>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (Self { tx }, rx)
    }

    pub fn emit(&self, event: MutationEvent) {
        debug!(
            "mutation event: {:?} on {} by user {}",
            event.kind, event.conference, event.actor
        );
        if self.tx.send(event).is_err() {
            debug!("no dispatcher attached, dropping mutation event");
        }
    }
}
