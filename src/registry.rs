use std::collections::HashMap;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use thiserror::Error;
use tokio::sync::RwLock;

use crate::config::FeedConfig;
use crate::fetcher::FetchedEntry;
use crate::store::{EntryStore, Page};

pub type SharedRegistry = Arc<RwLock<FeedRegistry>>;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum RegistryError {
    #[error("feed not found: {0}")]
    FeedNotFound(String),
    #[error("entry not found in feed {feed}: {link}")]
    EntryNotFound { feed: String, link: String },
    #[error("no feeds registered")]
    Empty,
}

#[derive(Debug, Clone)]
pub struct Feed {
    pub url: String,
    pub title: String,
    pub href: String,
    pub show_images: bool,
    pub entries: EntryStore,
    pub last_fetched: Option<DateTime<Utc>>,
    pub last_error: Option<String>,
}

impl Feed {
    pub fn new(url: &str, title: &str, href: &str, show_images: bool) -> Self {
        Self {
            url: url.to_string(),
            title: title.to_string(),
            href: href.to_string(),
            show_images,
            entries: EntryStore::new(),
            last_fetched: None,
            last_error: None,
        }
    }
}

impl From<&FeedConfig> for Feed {
    fn from(config: &FeedConfig) -> Self {
        Feed::new(&config.url, &config.title, config.href(), config.show_images)
    }
}

/// All known feeds, keyed by URL, in registration order.
#[derive(Debug, Default)]
pub struct FeedRegistry {
    feeds: Vec<Feed>,
    index: HashMap<String, usize>,
}

impl FeedRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_config(configs: &[FeedConfig]) -> Self {
        let mut registry = Self::new();
        for config in configs {
            registry.put(config.into());
        }
        registry
    }

    pub fn into_shared(self) -> SharedRegistry {
        Arc::new(RwLock::new(self))
    }

    /// Register a feed, or update the metadata of an already registered URL.
    ///
    /// An existing feed keeps its entries, fetch status and position.
    pub fn put(&mut self, feed: Feed) -> &Feed {
        match self.index.get(&feed.url).copied() {
            Some(i) => {
                let existing = &mut self.feeds[i];
                existing.title = feed.title;
                existing.href = feed.href;
                existing.show_images = feed.show_images;
                &self.feeds[i]
            }
            None => {
                let i = self.feeds.len();
                self.index.insert(feed.url.clone(), i);
                self.feeds.push(feed);
                &self.feeds[i]
            }
        }
    }

    /// Register a feed submitted through the add-feed form. Returns its URL.
    pub fn add_feed(&mut self, url: &str, title: &str, show_images: bool) -> String {
        self.put(Feed::new(url, title, url, show_images)).url.clone()
    }

    pub fn get(&self, url: &str) -> Result<&Feed, RegistryError> {
        self.index
            .get(url)
            .map(|&i| &self.feeds[i])
            .ok_or_else(|| RegistryError::FeedNotFound(url.to_string()))
    }

    fn get_mut(&mut self, url: &str) -> Result<&mut Feed, RegistryError> {
        match self.index.get(url) {
            Some(&i) => Ok(&mut self.feeds[i]),
            None => Err(RegistryError::FeedNotFound(url.to_string())),
        }
    }

    pub fn contains(&self, url: &str) -> bool {
        self.index.contains_key(url)
    }

    pub fn list(&self) -> &[Feed] {
        &self.feeds
    }

    pub fn urls(&self) -> Vec<String> {
        self.feeds.iter().map(|f| f.url.clone()).collect()
    }

    pub fn len(&self) -> usize {
        self.feeds.len()
    }

    pub fn is_empty(&self) -> bool {
        self.feeds.is_empty()
    }

    pub fn default_feed(&self) -> Option<&Feed> {
        self.feeds.first()
    }

    /// The requested feed, or the first registered one when none is given.
    pub fn resolve(&self, url: Option<&str>) -> Result<&Feed, RegistryError> {
        match url {
            Some(url) => self.get(url),
            None => self.default_feed().ok_or(RegistryError::Empty),
        }
    }

    pub fn merge_entries(
        &mut self,
        url: &str,
        entries: Vec<FetchedEntry>,
    ) -> Result<usize, RegistryError> {
        Ok(self.get_mut(url)?.entries.merge(entries))
    }

    pub fn record_fetch(&mut self, url: &str, error: Option<String>) -> Result<(), RegistryError> {
        let feed = self.get_mut(url)?;
        feed.last_fetched = Some(Utc::now());
        feed.last_error = error;
        Ok(())
    }

    pub fn page(&self, url: &str, page: usize, page_size: usize) -> Result<Page, RegistryError> {
        Ok(self.get(url)?.entries.page(page, page_size))
    }

    /// Mark an entry read and return the link the browser should go to.
    pub fn mark_read(&mut self, feed_url: &str, entry_link: &str) -> Result<String, RegistryError> {
        let feed = self.get_mut(feed_url)?;
        feed.entries
            .mark_read(entry_link)
            .map(|entry| entry.link.clone())
            .ok_or_else(|| RegistryError::EntryNotFound {
                feed: feed_url.to_string(),
                link: entry_link.to_string(),
            })
    }
}
