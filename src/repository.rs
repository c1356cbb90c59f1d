use crate::types::{
    Conference, ConferenceDraft, ConferenceId, EngineError, IngestSummary, Paper, Result, UserId,
};
use chrono::{NaiveDate, Utc};
use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use tokio::sync::RwLock;
use tracing::{debug, info, warn};

/// Canonical store of conference records, keyed by [`ConferenceId`].
///
/// Native records are created by organizer action and are mutable/deletable
/// only by their owner. External records enter through [`ingest_batch`] and
/// are replaced wholesale on re-ingestion, never edited or deleted by users.
///
/// [`ingest_batch`]: ConferenceRepository::ingest_batch
pub struct ConferenceRepository {
    records: RwLock<HashMap<ConferenceId, Conference>>,
    next_native_id: AtomicU64,
}

impl ConferenceRepository {
    pub fn new() -> Self {
        Self {
            records: RwLock::new(HashMap::new()),
            next_native_id: AtomicU64::new(1),
        }
    }

    /// Create a native record owned by `organizer`. The name must be
    /// non-empty; everything else is optional.
    pub async fn create_native(&self, organizer: UserId, draft: ConferenceDraft) -> Result<Conference> {
        validate_draft(&draft)?;

        let id = ConferenceId::Native(self.next_native_id.fetch_add(1, Ordering::SeqCst));
        let conference = conference_from_draft(id.clone(), Some(organizer), draft, 1);

        let mut records = self.records.write().await;
        records.insert(id.clone(), conference.clone());
        info!("created native conference {} ({})", id, conference.name);
        Ok(conference)
    }

    pub async fn get(&self, id: &ConferenceId) -> Result<Conference> {
        let records = self.records.read().await;
        records
            .get(id)
            .cloned()
            .ok_or_else(|| EngineError::NotFound(format!("conference {}", id)))
    }

    pub async fn exists(&self, id: &ConferenceId) -> bool {
        self.records.read().await.contains_key(id)
    }

    /// Snapshot of every record matching `predicate`. The returned vector is
    /// finite and independent of later mutations, so callers can restart
    /// iteration freely.
    pub async fn list<F>(&self, predicate: F) -> Vec<Conference>
    where
        F: Fn(&Conference) -> bool,
    {
        let records = self.records.read().await;
        records.values().filter(|c| predicate(c)).cloned().collect()
    }

    /// Apply `draft` to a native record. `expected_version` is the version
    /// the caller read; a mismatch means somebody else edited in between and
    /// surfaces as `Conflict` so the caller can re-read and retry.
    pub async fn update_native(
        &self,
        acting_user: UserId,
        id: &ConferenceId,
        expected_version: u64,
        draft: ConferenceDraft,
    ) -> Result<Conference> {
        validate_draft(&draft)?;
        if !id.is_native() {
            return Err(EngineError::Unauthorized(format!(
                "external record {} is not editable",
                id
            )));
        }

        let mut records = self.records.write().await;
        let existing = records
            .get(id)
            .ok_or_else(|| EngineError::NotFound(format!("conference {}", id)))?;

        if existing.organizer != Some(acting_user) {
            return Err(EngineError::Unauthorized(format!(
                "user {} does not own conference {}",
                acting_user, id
            )));
        }
        if existing.version != expected_version {
            return Err(EngineError::Conflict(format!(
                "conference {} is at version {}, expected {}",
                id, existing.version, expected_version
            )));
        }

        let mut updated = conference_from_draft(
            id.clone(),
            existing.organizer,
            draft,
            existing.version + 1,
        );
        updated.created_at = existing.created_at;
        updated.papers = existing.papers.clone();
        records.insert(id.clone(), updated.clone());
        debug!("updated conference {} to version {}", id, updated.version);
        Ok(updated)
    }

    /// Delete a native record. Only the owning organizer may do this;
    /// external records are never deleted through this path.
    pub async fn delete(&self, id: &ConferenceId, acting_user: UserId) -> Result<()> {
        let mut records = self.records.write().await;
        let existing = records
            .get(id)
            .ok_or_else(|| EngineError::NotFound(format!("conference {}", id)))?;

        let owner_matches =
            existing.id.is_native() && existing.organizer == Some(acting_user);
        if owner_matches {
            records.remove(id);
            info!("deleted conference {} by owner {}", id, acting_user);
            Ok(())
        } else {
            Err(EngineError::Unauthorized(format!(
                "user {} may not delete conference {}",
                acting_user, id
            )))
        }
    }

    /// Attach bulk-imported papers to an existing conference. Entries with an
    /// empty title are dropped. Returns the conference's new paper count.
    pub async fn import_papers(&self, id: &ConferenceId, papers: Vec<Paper>) -> Result<usize> {
        let mut records = self.records.write().await;
        let existing = records
            .get_mut(id)
            .ok_or_else(|| EngineError::NotFound(format!("conference {}", id)))?;

        let before = existing.papers.len();
        existing
            .papers
            .extend(papers.into_iter().filter(|p| !p.title.trim().is_empty()));
        debug!(
            "imported {} papers into {}",
            existing.papers.len() - before,
            id
        );
        Ok(existing.papers.len())
    }

    /// Insert-or-replace a single record, keyed by identity. Idempotent.
    pub async fn upsert(&self, record: Conference) -> Result<()> {
        let mut records = self.records.write().await;
        records.insert(record.id.clone(), record);
        Ok(())
    }

    /// Merge a batch of feed-ingested records. Each record either replaces
    /// the stored record with the same external id, replaces a heuristic
    /// duplicate, or is stored fresh. A bad record fails on its own and the
    /// rest of the batch continues.
    ///
    /// Duplicate detection when the external id is new: two external records
    /// are considered the same conference when their casefolded
    /// whitespace-collapsed name, start date and casefolded location all
    /// match. This is product policy; records without a start date never
    /// match heuristically.
    pub async fn ingest_batch(&self, batch: Vec<Conference>) -> IngestSummary {
        let mut summary = IngestSummary {
            received: batch.len(),
            ..Default::default()
        };

        let mut records = self.records.write().await;
        for record in batch {
            let external_id = match &record.id {
                ConferenceId::External(ext) => ext.clone(),
                ConferenceId::Native(_) => {
                    warn!("rejecting native record {} in feed batch", record.id);
                    summary.failed.push((
                        record.id.to_string(),
                        "feed batches may only carry external records".to_string(),
                    ));
                    continue;
                }
            };
            if record.name.trim().is_empty() {
                summary
                    .failed
                    .push((external_id, "record has no name".to_string()));
                continue;
            }

            if records.contains_key(&record.id) {
                let prior = records.get(&record.id).cloned();
                let mut replacement = record;
                if let Some(prior) = prior {
                    replacement.created_at = prior.created_at;
                    replacement.papers = prior.papers;
                }
                records.insert(replacement.id.clone(), replacement);
                summary.replaced += 1;
                continue;
            }

            match find_heuristic_match(&records, &record) {
                Some(existing_id) => {
                    debug!(
                        "feed record {} merged into existing {} by heuristic key",
                        record.id, existing_id
                    );
                    let prior = records.get(&existing_id).cloned();
                    let mut replacement = record;
                    replacement.id = existing_id.clone();
                    if let Some(prior) = prior {
                        replacement.created_at = prior.created_at;
                        replacement.papers = prior.papers;
                    }
                    records.insert(existing_id, replacement);
                    summary.replaced += 1;
                }
                None => {
                    records.insert(record.id.clone(), record);
                    summary.stored += 1;
                }
            }
        }

        info!(
            "ingested feed batch: {} received, {} stored, {} replaced, {} failed",
            summary.received,
            summary.stored,
            summary.replaced,
            summary.failed.len()
        );
        summary
    }

    pub async fn len(&self) -> usize {
        self.records.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.records.read().await.is_empty()
    }
}

impl Default for ConferenceRepository {
    fn default() -> Self {
        Self::new()
    }
}

fn validate_draft(draft: &ConferenceDraft) -> Result<()> {
    if draft.name.trim().is_empty() {
        return Err(EngineError::InvalidInput(
            "conference name must not be empty".to_string(),
        ));
    }
    if let (Some(start), Some(end)) = (draft.start_date, draft.end_date) {
        if end < start {
            return Err(EngineError::InvalidInput(
                "end date precedes start date".to_string(),
            ));
        }
    }
    Ok(())
}

fn conference_from_draft(
    id: ConferenceId,
    organizer: Option<UserId>,
    draft: ConferenceDraft,
    version: u64,
) -> Conference {
    Conference {
        id,
        name: draft.name,
        acronym: draft.acronym,
        series: draft.series,
        publisher: draft.publisher,
        location: draft.location,
        start_date: draft.start_date,
        end_date: draft.end_date,
        topics: draft.topics,
        description: draft.description,
        speakers: draft.speakers,
        website: draft.website,
        colocated_with: draft.colocated_with,
        organizer,
        events: draft.events,
        papers: Vec::new(),
        created_at: Utc::now(),
        version,
    }
}

/// Deterministic dedup key: (normalized name, start date, normalized location).
fn merge_key(conference: &Conference) -> Option<(String, NaiveDate, String)> {
    let start = conference.start_date?;
    Some((
        normalize(&conference.name),
        start,
        normalize(conference.location.as_deref().unwrap_or("")),
    ))
}

fn normalize(text: &str) -> String {
    text.split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
        .to_lowercase()
}

fn find_heuristic_match(
    records: &HashMap<ConferenceId, Conference>,
    incoming: &Conference,
) -> Option<ConferenceId> {
    let key = merge_key(incoming)?;
    records
        .values()
        .filter(|existing| !existing.id.is_native())
        .find(|existing| merge_key(existing).as_ref() == Some(&key))
        .map(|existing| existing.id.clone())
}
