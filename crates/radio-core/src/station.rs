use serde::{Deserialize, Serialize};

/// Compact station identity stored in history/favorites and used as the
/// "now playing" snapshot.
///
/// On disk the fields are `name`, `streamUrl`, `imageUrl`.  Older data written
/// with `url` / `image` keys still loads.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StationRecord {
    pub name: String,
    #[serde(alias = "url")]
    pub stream_url: String,
    #[serde(alias = "image")]
    pub image_url: String,
}

impl StationRecord {
    pub fn new(
        name: impl Into<String>,
        stream_url: impl Into<String>,
        image_url: impl Into<String>,
    ) -> Self {
        Self {
            name: name.into(),
            stream_url: stream_url.into(),
            image_url: image_url.into(),
        }
    }
}

/// A station as returned by the directory service.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
pub struct StationDirectoryEntry {
    #[serde(default)]
    pub name: String,
    #[serde(rename = "url_resolved", default)]
    pub resolved_url: String,
    #[serde(rename = "favicon", default)]
    pub favicon_url: String,
    #[serde(default, deserialize_with = "empty_as_none")]
    pub tags: Option<String>,
    #[serde(default, deserialize_with = "empty_as_none")]
    pub country: Option<String>,
    #[serde(default, deserialize_with = "empty_as_none")]
    pub language: Option<String>,
}

impl StationDirectoryEntry {
    /// Snapshot used when the entry is played.
    pub fn to_record(&self) -> StationRecord {
        StationRecord::new(
            self.name.trim(),
            self.resolved_url.trim(),
            self.favicon_url.trim(),
        )
    }

    /// Entries without a resolved stream address cannot be played.
    pub fn is_playable(&self) -> bool {
        !self.resolved_url.trim().is_empty()
    }
}

impl From<&StationDirectoryEntry> for StationRecord {
    fn from(entry: &StationDirectoryEntry) -> Self {
        entry.to_record()
    }
}

fn empty_as_none<'de, D>(deserializer: D) -> Result<Option<String>, D::Error>
where
    D: serde::Deserializer<'de>,
{
    let value = Option::<String>::deserialize(deserializer)?;
    Ok(value.filter(|s| !s.trim().is_empty()))
}
