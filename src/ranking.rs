use crate::types::{ConferenceView, Source};
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;

/// Optional predicates for the conference feed; all set predicates are AND-ed.
/// An absent predicate means "no constraint", not zero.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct FeedFilter {
    pub publisher: Option<String>,
    pub min_rating: Option<f64>,
    pub min_credibility: Option<f64>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SortKey {
    NameAsc,
    RatingDesc,
}

/// Keep the records passing every set predicate. A record with no rating yet
/// fails a set `min_rating`, but passes when the predicate is absent.
pub fn filter(records: &[ConferenceView], filter: &FeedFilter) -> Vec<ConferenceView> {
    records
        .iter()
        .filter(|view| {
            if let Some(publisher) = &filter.publisher {
                match &view.conference.publisher {
                    Some(p) if p.eq_ignore_ascii_case(publisher) => {}
                    _ => return false,
                }
            }
            if let Some(min) = filter.min_rating {
                match view.average_rating {
                    Some(rating) if rating >= min => {}
                    _ => return false,
                }
            }
            if let Some(min) = filter.min_credibility {
                if view.credibility < min {
                    return false;
                }
            }
            true
        })
        .cloned()
        .collect()
}

/// Sort records by the given key. Both orderings are total and deterministic:
/// `RatingDesc` places unrated conferences last and breaks rating ties by
/// `NameAsc`.
pub fn sort(mut records: Vec<ConferenceView>, key: SortKey) -> Vec<ConferenceView> {
    match key {
        SortKey::NameAsc => records.sort_by(|a, b| name_order(a, b)),
        SortKey::RatingDesc => records.sort_by(|a, b| rating_order(a, b)),
    }
    records
}

/// Stable partition into (native, external-feed), preserving the incoming
/// order within each group.
pub fn partition_by_source(records: Vec<ConferenceView>) -> (Vec<ConferenceView>, Vec<ConferenceView>) {
    records
        .into_iter()
        .partition(|view| view.conference.source() == Source::Native)
}

/// Case-insensitive name comparison; falls back to the raw name so equal
/// casefolded names still order deterministically.
fn name_order(a: &ConferenceView, b: &ConferenceView) -> Ordering {
    let a_key = a.conference.name.to_lowercase();
    let b_key = b.conference.name.to_lowercase();
    a_key
        .cmp(&b_key)
        .then_with(|| a.conference.name.cmp(&b.conference.name))
}

fn rating_order(a: &ConferenceView, b: &ConferenceView) -> Ordering {
    match (a.average_rating, b.average_rating) {
        (Some(ra), Some(rb)) => rb
            .partial_cmp(&ra)
            .unwrap_or(Ordering::Equal)
            .then_with(|| name_order(a, b)),
        (Some(_), None) => Ordering::Less,
        (None, Some(_)) => Ordering::Greater,
        (None, None) => name_order(a, b),
    }
}
