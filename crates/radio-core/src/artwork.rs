use std::time::Duration;

use tracing::debug;

/// Station artwork.  A failed fetch is never an error to the caller; it just
/// produces `Fallback` and the UI shows its default asset.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Artwork {
    Image { url: String, bytes: Vec<u8> },
    Fallback,
}

impl Artwork {
    pub fn is_fallback(&self) -> bool {
        matches!(self, Artwork::Fallback)
    }
}

#[derive(Clone)]
pub struct ArtworkFetcher {
    client: reqwest::Client,
}

impl ArtworkFetcher {
    pub fn new(user_agent: &str, timeout: Duration) -> anyhow::Result<Self> {
        let client = reqwest::Client::builder()
            .user_agent(user_agent)
            .timeout(timeout)
            .build()?;
        Ok(Self { client })
    }

    pub async fn fetch(&self, url: &str) -> Artwork {
        match self.try_fetch(url).await {
            Ok(artwork) => artwork,
            Err(e) => {
                debug!("artwork: falling back for '{}': {}", url, e);
                Artwork::Fallback
            }
        }
    }

    async fn try_fetch(&self, url: &str) -> anyhow::Result<Artwork> {
        let url = url.trim();
        let parsed = reqwest::Url::parse(url)?;
        if !matches!(parsed.scheme(), "http" | "https") {
            anyhow::bail!("unsupported scheme {}", parsed.scheme());
        }
        let response = self.client.get(parsed).send().await?;
        if !response.status().is_success() {
            anyhow::bail!("server returned {}", response.status());
        }
        let bytes = response.bytes().await?;
        if bytes.is_empty() {
            anyhow::bail!("empty body");
        }
        Ok(Artwork::Image {
            url: url.to_string(),
            bytes: bytes.to_vec(),
        })
    }
}
