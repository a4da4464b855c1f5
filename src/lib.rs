//! metwarn — UK Met Office weather-warning feed watcher.
//!
//! The crate turns the loosely structured regional warnings RSS feed into a
//! normalized list of [`warning::Warning`] records and keeps a last-known-good
//! snapshot of that list refreshed on a fixed interval.
//!
//! Pipeline: [`feed::fetch_feed`] → [`feed::ItemStream`] →
//! [`warning::parse`] per item → [`controller::RefreshController`]
//! (aggregation, atomic snapshot swap, publish/subscribe to consumers).

pub mod config;
pub mod controller;
pub mod feed;
pub mod warning;

pub use config::Config;
pub use controller::{FeedSnapshot, FeedState, RefreshController, RefreshEvent};
pub use warning::{ValidPeriod, Warning, WarningLevel};
