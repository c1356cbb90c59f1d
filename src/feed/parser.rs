use crate::types::{Conference, ConferenceId, EngineError, Result};
use chrono::{NaiveDate, Utc};
use feed_rs::parser;
use std::collections::HashSet;
use tracing::{debug, info};

/// Parses a dev.events-style RSS feed into external conference records.
///
/// Each item's link doubles as the stable external id; items without a link
/// are skipped. Duplicate links within and across parses are dropped by the
/// seen-set, so re-running the parser over an unchanged feed is cheap.
pub struct DevEventsParser {
    seen_links: HashSet<String>,
}

impl DevEventsParser {
    pub fn new() -> Self {
        Self {
            seen_links: HashSet::new(),
        }
    }

    pub fn parse(&mut self, content: &str) -> Result<Vec<Conference>> {
        let feed = parser::parse(content.as_bytes())
            .map_err(|e| EngineError::Parse(format!("failed to parse feed: {}", e)))?;

        let now = Utc::now();
        let mut conferences = Vec::new();
        for entry in feed.entries {
            let link = match entry.links.first() {
                Some(link) => link.href.clone(),
                None => {
                    debug!("skipping feed item without a link");
                    continue;
                }
            };
            if !self.seen_links.insert(link.clone()) {
                debug!("skipping duplicate feed item: {}", link);
                continue;
            }

            let name = entry
                .title
                .map(|t| t.content)
                .unwrap_or_else(|| "Unknown Conference".to_string());
            let description = entry.summary.map(|s| s.content);
            let (start_date, location) = description
                .as_deref()
                .map(parse_schedule)
                .unwrap_or((None, None));

            conferences.push(Conference {
                id: ConferenceId::External(link.clone()),
                name,
                acronym: None,
                series: None,
                publisher: None,
                location,
                start_date,
                end_date: None,
                topics: None,
                description,
                speakers: None,
                website: Some(link),
                colocated_with: None,
                organizer: None,
                events: Vec::new(),
                papers: Vec::new(),
                created_at: now,
                version: 1,
            });
        }

        info!("parsed {} conferences from feed", conferences.len());
        Ok(conferences)
    }

    pub fn clear_seen(&mut self) {
        self.seen_links.clear();
    }
}

impl Default for DevEventsParser {
    fn default() -> Self {
        Self::new()
    }
}

/// Extract start date and location from a dev.events item description of the
/// form "<name> is happening on September 24, 2026, Online. More
/// information: <link>". The segment after the last comma is the location;
/// everything before it is the date.
fn parse_schedule(description: &str) -> (Option<NaiveDate>, Option<String>) {
    let after_marker = match description.split_once("is happening on ") {
        Some((_, rest)) => rest,
        None => return (None, None),
    };
    let schedule = match after_marker.split_once(". More information") {
        Some((head, _)) => head,
        None => after_marker,
    };

    let (date_part, location) = match schedule.rsplit_once(", ") {
        Some((date_part, location)) => (date_part.trim(), Some(location.trim().to_string())),
        None => (schedule.trim(), None),
    };

    let start_date = NaiveDate::parse_from_str(date_part, "%B %d, %Y")
        .or_else(|_| NaiveDate::parse_from_str(date_part, "%b %d, %Y"))
        .ok();
    (start_date, location)
}
