//! htmx feeds - A minimal RSS feed aggregator
//!
//! This crate keeps a set of feeds in memory, refreshes them whenever a feed
//! page is viewed, deduplicates entries by link and remembers which entries
//! have been read. Pages are rendered as HTML fragments for an htmx front end.

pub mod config;
pub mod fetcher;
pub mod registry;
pub mod routes;
pub mod store;
