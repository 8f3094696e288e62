//! Station directory lookups (radio-browser.info).
//!
//! The controller never talks to the directory; the front end uses it to turn
//! a country / language / tag into a list of playable entries.

use std::fmt;
use std::str::FromStr;
use std::time::Duration;

use async_trait::async_trait;
use reqwest::{Client, Url};
use serde::Deserialize;
use tracing::debug;

use crate::config::DirectoryConfig;
use crate::station::StationDirectoryEntry;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SearchKind {
    Country,
    Language,
    Tag,
}

impl SearchKind {
    fn path_segment(self) -> &'static str {
        match self {
            SearchKind::Country => "bycountry",
            SearchKind::Language => "bylanguage",
            SearchKind::Tag => "bytag",
        }
    }
}

impl fmt::Display for SearchKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            SearchKind::Country => "country",
            SearchKind::Language => "language",
            SearchKind::Tag => "tag",
        };
        f.write_str(s)
    }
}

impl FromStr for SearchKind {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "country" | "c" => Ok(SearchKind::Country),
            "language" | "lang" | "l" => Ok(SearchKind::Language),
            "tag" | "t" => Ok(SearchKind::Tag),
            other => anyhow::bail!("unknown search kind '{}'", other),
        }
    }
}

/// A country, language or tag as listed by the directory.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct NamedEntry {
    pub name: String,
    #[serde(rename = "stationcount", default)]
    pub station_count: u64,
}

#[async_trait]
pub trait StationDirectory: Send + Sync {
    async fn search(
        &self,
        kind: SearchKind,
        value: &str,
    ) -> anyhow::Result<Vec<StationDirectoryEntry>>;

    async fn list_countries(&self) -> anyhow::Result<Vec<NamedEntry>>;

    async fn list_languages(&self) -> anyhow::Result<Vec<NamedEntry>>;

    async fn list_tags(&self) -> anyhow::Result<Vec<NamedEntry>>;
}

#[derive(Clone)]
pub struct RadioBrowserClient {
    client: Client,
    base_url: Url,
    limit: u32,
}

impl RadioBrowserClient {
    pub fn new(config: &DirectoryConfig) -> anyhow::Result<Self> {
        let client = Client::builder()
            .user_agent(config.user_agent.clone())
            .timeout(Duration::from_secs(config.timeout_secs.max(1)))
            .build()?;
        let base_url = Url::parse(config.base_url.trim())?;
        if base_url.cannot_be_a_base() {
            anyhow::bail!("directory base_url '{}' is not a base URL", config.base_url);
        }
        Ok(Self {
            client,
            base_url,
            limit: config.limit,
        })
    }

    /// `<base>/json/<segments...>`, each segment percent-encoded.
    pub fn endpoint(&self, segments: &[&str]) -> anyhow::Result<Url> {
        let mut url = self.base_url.clone();
        {
            let mut path = url
                .path_segments_mut()
                .map_err(|_| anyhow::anyhow!("directory base_url cannot hold a path"))?;
            path.pop_if_empty().push("json");
            for segment in segments {
                path.push(segment);
            }
        }
        Ok(url)
    }

    fn search_url(&self, kind: SearchKind, value: &str) -> anyhow::Result<Url> {
        let mut url = self.endpoint(&["stations", kind.path_segment(), value.trim()])?;
        {
            let mut query = url.query_pairs_mut();
            query.append_pair("hidebroken", "true");
            query.append_pair("order", "clickcount");
            query.append_pair("reverse", "true");
            if self.limit > 0 {
                query.append_pair("limit", &self.limit.to_string());
            }
        }
        Ok(url)
    }

    async fn get_json<D: serde::de::DeserializeOwned>(&self, url: Url) -> anyhow::Result<D> {
        debug!("directory: GET {}", url);
        let response = self.client.get(url).send().await?;
        if !response.status().is_success() {
            anyhow::bail!("radio browser returned {}", response.status());
        }
        Ok(response.json().await?)
    }

    async fn list(&self, what: &str) -> anyhow::Result<Vec<NamedEntry>> {
        let url = self.endpoint(&[what])?;
        let entries: Vec<NamedEntry> = self.get_json(url).await?;
        Ok(normalize_names(entries))
    }
}

#[async_trait]
impl StationDirectory for RadioBrowserClient {
    async fn search(
        &self,
        kind: SearchKind,
        value: &str,
    ) -> anyhow::Result<Vec<StationDirectoryEntry>> {
        let url = self.search_url(kind, value)?;
        let raw: Vec<StationDirectoryEntry> = self.get_json(url).await?;
        let stations = playable(raw);
        debug!(
            "directory: {} '{}' -> {} stations",
            kind,
            value,
            stations.len()
        );
        Ok(stations)
    }

    async fn list_countries(&self) -> anyhow::Result<Vec<NamedEntry>> {
        self.list("countries").await
    }

    async fn list_languages(&self) -> anyhow::Result<Vec<NamedEntry>> {
        self.list("languages").await
    }

    async fn list_tags(&self) -> anyhow::Result<Vec<NamedEntry>> {
        self.list("tags").await
    }
}

/// Drop entries that have nothing to play.
pub fn playable(entries: Vec<StationDirectoryEntry>) -> Vec<StationDirectoryEntry> {
    entries.into_iter().filter(|e| e.is_playable()).collect()
}

/// Trim names and drop blanks; the directory has a few of each.
pub fn normalize_names(entries: Vec<NamedEntry>) -> Vec<NamedEntry> {
    entries
        .into_iter()
        .filter_map(|mut e| {
            let trimmed = e.name.trim();
            if trimmed.is_empty() {
                return None;
            }
            e.name = trimmed.to_string();
            Some(e)
        })
        .collect()
}
