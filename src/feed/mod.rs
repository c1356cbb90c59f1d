pub mod fetcher;
pub mod parser;
pub mod source;

pub use fetcher::FeedFetcher;
pub use parser::DevEventsParser;
pub use source::{DevEventsSource, FeedSource};
