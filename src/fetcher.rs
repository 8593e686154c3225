use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use feed_rs::parser;
use futures::future::join_all;
use reqwest::Client;
use tracing::{error, info, warn};

use crate::registry::SharedRegistry;

/// An entry as it comes off the wire, before it is merged into a feed.
#[derive(Debug, Clone, PartialEq)]
pub struct FetchedEntry {
    pub link: String,
    pub title: String,
    pub published: Option<DateTime<Utc>>,
    pub image: Option<String>,
}

/// Outcome of one pass over every registered feed.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct RefreshReport {
    pub refreshed: usize,
    pub failed: usize,
    pub added: usize,
}

pub struct Fetcher {
    client: Client,
    registry: SharedRegistry,
}

impl Fetcher {
    pub fn new(registry: SharedRegistry) -> anyhow::Result<Self> {
        let client = Client::builder()
            .timeout(Duration::from_secs(30))
            .user_agent("HtmxFeeds/1.0 (RSS Aggregator)")
            .build()?;

        Ok(Self { client, registry })
    }

    /// Fetch every registered feed and merge the results.
    ///
    /// Downloads run concurrently without holding the registry lock. Merging
    /// happens under a single write lock, so concurrent refreshes never
    /// interleave inside one feed's entry store. A feed that fails to fetch
    /// keeps its existing entries and gets its `last_error` set.
    pub async fn refresh_all(&self) -> RefreshReport {
        let urls = self.registry.read().await.urls();
        info!("Refreshing {} feeds", urls.len());

        let results = join_all(urls.iter().map(|url| self.fetch(url))).await;

        let mut report = RefreshReport::default();
        let mut registry = self.registry.write().await;
        for (url, result) in urls.iter().zip(results) {
            let status = match result {
                Ok(entries) => match registry.merge_entries(url, entries) {
                    Ok(added) => {
                        info!("Added {} new entries for feed '{}'", added, url);
                        report.refreshed += 1;
                        report.added += added;
                        None
                    }
                    Err(e) => {
                        warn!("Dropping fetched entries: {}", e);
                        continue;
                    }
                },
                Err(e) => {
                    error!("Failed to refresh feed '{}': {:#}", url, e);
                    report.failed += 1;
                    Some(format!("{:#}", e))
                }
            };
            if let Err(e) = registry.record_fetch(url, status) {
                warn!("Could not record fetch status: {}", e);
            }
        }

        info!(
            "Feed refresh complete: {} ok, {} failed",
            report.refreshed, report.failed
        );
        report
    }

    pub async fn fetch(&self, url: &str) -> anyhow::Result<Vec<FetchedEntry>> {
        info!("Fetching feed: {}", url);

        let response = self.client.get(url).send().await?.error_for_status()?;
        let bytes = response.bytes().await?;

        Self::parse_entries(&bytes)
    }

    /// Parse an RSS/Atom document into entries, in document order.
    pub fn parse_entries(bytes: &[u8]) -> anyhow::Result<Vec<FetchedEntry>> {
        let parsed = parser::parse(bytes)?;

        let mut entries = Vec::with_capacity(parsed.entries.len());
        for entry in parsed.entries {
            let title = entry
                .title
                .as_ref()
                .map(|t| t.content.clone())
                .unwrap_or_else(|| "Untitled".to_string());

            let link = entry
                .links
                .first()
                .map(|l| l.href.clone())
                .unwrap_or_default();

            if link.is_empty() {
                warn!("Skipping entry with no link: {}", title);
                continue;
            }

            let published: Option<DateTime<Utc>> = entry.published.or(entry.updated);
            let image = Self::extract_image(&entry);

            entries.push(FetchedEntry {
                link,
                title,
                published,
                image,
            });
        }

        Ok(entries)
    }

    /// First media thumbnail, falling back to the first media content URL
    pub fn extract_image(entry: &feed_rs::model::Entry) -> Option<String> {
        entry
            .media
            .iter()
            .flat_map(|m| m.thumbnails.iter())
            .map(|t| t.image.uri.clone())
            .next()
            .or_else(|| {
                entry
                    .media
                    .iter()
                    .flat_map(|m| m.content.iter())
                    .find_map(|c| c.url.as_ref())
                    .map(|u| u.to_string())
            })
    }
}

fn refresh_period(interval_minutes: u64) -> Duration {
    Duration::from_secs(interval_minutes.saturating_mul(60))
}

pub async fn start_background_refresh(fetcher: Arc<Fetcher>, interval_minutes: u64) {
    let interval = refresh_period(interval_minutes);

    loop {
        tokio::time::sleep(interval).await;
        info!("Starting scheduled feed refresh");
        fetcher.refresh_all().await;
    }
}
