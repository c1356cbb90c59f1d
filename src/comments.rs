use crate::events::{EventSink, MutationEvent, MutationKind};
use crate::repository::ConferenceRepository;
use crate::types::{Comment, ConferenceId, EngineError, Result, UserId};
use chrono::Utc;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::{Mutex, RwLock};
use tracing::{debug, info};
use uuid::Uuid;

struct Thread {
    next_seq: u64,
    comments: Vec<Comment>,
}

/// Append-only per-conference discussion log. Sequence numbers are assigned
/// under a per-conference lock, so the thread order is total; comments on
/// different conferences are independent.
pub struct CommentThread {
    threads: RwLock<HashMap<ConferenceId, Arc<Mutex<Thread>>>>,
    repository: Arc<ConferenceRepository>,
    sink: EventSink,
}

impl CommentThread {
    pub fn new(repository: Arc<ConferenceRepository>, sink: EventSink) -> Self {
        Self {
            threads: RwLock::new(HashMap::new()),
            repository,
            sink,
        }
    }

    pub async fn add_comment(
        &self,
        user: UserId,
        conference: &ConferenceId,
        content: &str,
    ) -> Result<Comment> {
        let content = content.trim();
        if content.is_empty() {
            return Err(EngineError::InvalidInput(
                "comment content must not be empty".to_string(),
            ));
        }
        if !self.repository.exists(conference).await {
            return Err(EngineError::NotFound(format!("conference {}", conference)));
        }

        let thread = self.thread_for(conference).await;
        let comment = {
            let mut thread = thread.lock().await;
            let comment = Comment {
                id: Uuid::new_v4(),
                conference: conference.clone(),
                author: user,
                content: content.to_string(),
                seq: thread.next_seq,
                created_at: Utc::now(),
            };
            thread.next_seq += 1;
            thread.comments.push(comment.clone());
            comment
        };

        info!(
            "user {} commented on {} (seq {})",
            user, conference, comment.seq
        );
        self.sink.emit(MutationEvent::new(
            conference.clone(),
            user,
            MutationKind::CommentAdded,
            format!("New comment from user {}: {}", user, preview(content)),
        ));
        Ok(comment)
    }

    /// All comments in creation order. A snapshot; restartable and finite.
    pub async fn list_comments(&self, conference: &ConferenceId) -> Vec<Comment> {
        let thread = {
            let threads = self.threads.read().await;
            threads.get(conference).cloned()
        };
        match thread {
            Some(thread) => thread.lock().await.comments.clone(),
            None => Vec::new(),
        }
    }

    pub async fn comment_count(&self, conference: &ConferenceId) -> usize {
        let thread = {
            let threads = self.threads.read().await;
            threads.get(conference).cloned()
        };
        match thread {
            Some(thread) => thread.lock().await.comments.len(),
            None => 0,
        }
    }

    /// Drop the thread of a deleted conference.
    pub async fn purge(&self, conference: &ConferenceId) {
        let mut threads = self.threads.write().await;
        if threads.remove(conference).is_some() {
            debug!("purged comment thread for {}", conference);
        }
    }

    async fn thread_for(&self, conference: &ConferenceId) -> Arc<Mutex<Thread>> {
        {
            let threads = self.threads.read().await;
            if let Some(thread) = threads.get(conference) {
                return thread.clone();
            }
        }
        let mut threads = self.threads.write().await;
        threads
            .entry(conference.clone())
            .or_insert_with(|| {
                Arc::new(Mutex::new(Thread {
                    next_seq: 1,
                    comments: Vec::new(),
                }))
            })
            .clone()
    }
}

fn preview(content: &str) -> String {
    const MAX: usize = 80;
    if content.chars().count() <= MAX {
        content.to_string()
    } else {
        let truncated: String = content.chars().take(MAX).collect();
        format!("{}...", truncated)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::ConferenceDraft;

    async fn setup() -> (CommentThread, ConferenceId) {
        let repo = Arc::new(ConferenceRepository::new());
        let conf = repo
            .create_native(
                1,
                ConferenceDraft {
                    name: "OSDI".to_string(),
                    ..Default::default()
                },
            )
            .await
            .unwrap();
        let (sink, _rx) = EventSink::channel();
        (CommentThread::new(repo, sink), conf.id)
    }

    #[tokio::test]
    async fn comments_keep_creation_order() {
        let (thread, conf) = setup().await;

        thread.add_comment(1, &conf, "first").await.unwrap();
        thread.add_comment(2, &conf, "second").await.unwrap();
        thread.add_comment(1, &conf, "third").await.unwrap();

        let comments = thread.list_comments(&conf).await;
        let contents: Vec<&str> = comments.iter().map(|c| c.content.as_str()).collect();
        assert_eq!(contents, vec!["first", "second", "third"]);
        let seqs: Vec<u64> = comments.iter().map(|c| c.seq).collect();
        assert_eq!(seqs, vec![1, 2, 3]);
    }

    #[tokio::test]
    async fn whitespace_only_content_is_rejected() {
        let (thread, conf) = setup().await;
        let err = thread.add_comment(1, &conf, "   \n\t ").await.unwrap_err();
        assert!(matches!(err, EngineError::InvalidInput(_)));
        assert_eq!(thread.comment_count(&conf).await, 0);
    }
}
