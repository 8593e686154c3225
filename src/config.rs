use serde::Deserialize;
use std::path::Path;

#[derive(Debug, Deserialize, Clone)]
pub struct Config {
    /// Number of entries rendered per page
    #[serde(default = "default_page_size")]
    pub page_size: usize,
    #[serde(default = "default_bind_addr")]
    pub bind_addr: String,
    /// Background refresh interval in minutes. Feeds are always refreshed
    /// on feed-view requests; this adds a periodic refresh on top.
    #[serde(default)]
    pub refresh_interval: Option<u64>,
    pub feeds: Vec<FeedConfig>,
}

fn default_page_size() -> usize {
    5
}

fn default_bind_addr() -> String {
    "0.0.0.0:5000".to_string()
}

#[derive(Debug, Deserialize, Clone)]
pub struct FeedConfig {
    pub url: String,
    pub title: String,
    /// Display link, defaults to the feed URL
    #[serde(default)]
    pub href: Option<String>,
    #[serde(default)]
    pub show_images: bool,
}

impl FeedConfig {
    pub fn href(&self) -> &str {
        self.href.as_deref().unwrap_or(&self.url)
    }
}

impl Config {
    pub fn load<P: AsRef<Path>>(path: P) -> anyhow::Result<Self> {
        let content = std::fs::read_to_string(path)?;
        Self::from_str(&content)
    }

    /// Parse config from a TOML string (useful for testing)
    pub fn from_str(content: &str) -> anyhow::Result<Self> {
        let config: Config = toml::from_str(content)?;
        anyhow::ensure!(config.page_size > 0, "page_size must be greater than zero");
        Ok(config)
    }
}
