//! Feed module: HTTP retrieval and item extraction for the warnings RSS feed.
//!
//! The module is organized into two submodules:
//!
//! - [`fetcher`] - HTTP fetching of the raw feed text with timeout and size limits
//! - [`extractor`] - Streaming extraction of `<item>` records from the raw XML
//!
//! Extraction deliberately works on the raw element text rather than a
//! higher-level feed model: the warning parser needs the verbatim `pubDate`
//! string for its date-range fallback, which generic feed libraries normalize
//! away.

mod extractor;
mod fetcher;

pub use extractor::{FeedFormatError, FeedItem, ItemStream};
pub use fetcher::{fetch_feed, FetchError};
