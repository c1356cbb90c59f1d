pub mod categorize;
pub mod comments;
pub mod config;
pub mod engine;
pub mod events;
pub mod feed;
pub mod interest;
pub mod notifications;
pub mod ranking;
pub mod ratings;
pub mod repository;
pub mod session;
pub mod types;

pub use comments::CommentThread;
pub use config::{CredibilityWeights, EngineConfig, FetchConfig};
pub use engine::{ConferenceDetail, ConferenceEngine, EngineStats};
pub use events::{EventSink, MutationEvent, MutationKind};
pub use feed::{DevEventsParser, DevEventsSource, FeedFetcher, FeedSource};
pub use interest::{InterestState, InterestTracker};
pub use notifications::{Notification, NotificationDispatcher, NotificationStore};
pub use ranking::{FeedFilter, SortKey};
pub use ratings::RatingAggregator;
pub use repository::ConferenceRepository;
pub use session::Session;
pub use types::*;
