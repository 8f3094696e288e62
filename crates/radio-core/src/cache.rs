//! History and favorites, kept in memory and flushed in full on every change.
//!
//! Both lists are loaded once when the cache is opened.  Missing data starts
//! empty; unreadable data is logged and also starts empty.  A failed write is
//! logged and the in-memory list stays authoritative for the rest of the
//! process.

use tracing::{debug, info, warn};

use crate::error::CacheError;
use crate::station::StationRecord;
use crate::store::ByteStore;

pub const HISTORY_KEY: &str = "history";
pub const FAVORITES_KEY: &str = "favorites";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum List {
    History,
    Favorites,
}

impl List {
    fn key(self) -> &'static str {
        match self {
            List::History => HISTORY_KEY,
            List::Favorites => FAVORITES_KEY,
        }
    }
}

pub struct StationCache {
    store: Box<dyn ByteStore + Send>,
    history: Vec<StationRecord>,
    favorites: Vec<StationRecord>,
}

impl StationCache {
    /// Open the cache on top of `store`, loading both lists.
    pub fn open(store: impl ByteStore + Send + 'static) -> Self {
        let mut cache = Self {
            store: Box::new(store),
            history: Vec::new(),
            favorites: Vec::new(),
        };
        cache.history = cache.load(HISTORY_KEY);
        cache.favorites = cache.load(FAVORITES_KEY);
        info!(
            "cache: loaded {} history and {} favorite entries",
            cache.history.len(),
            cache.favorites.len()
        );
        cache
    }

    pub fn history(&self) -> &[StationRecord] {
        &self.history
    }

    pub fn favorites(&self) -> &[StationRecord] {
        &self.favorites
    }

    /// Read the list stored under `key`.  Never fails: a missing key or bad
    /// data both yield an empty list.
    pub fn load(&self, key: &str) -> Vec<StationRecord> {
        match self.try_load(key) {
            Ok(records) => records,
            Err(e) => {
                warn!("cache: {}", e);
                Vec::new()
            }
        }
    }

    /// Like [`load`](Self::load) but reports `CacheError::LoadFailed` instead
    /// of swallowing it.  A missing key is still `Ok(vec![])`.
    pub fn try_load(&self, key: &str) -> Result<Vec<StationRecord>, CacheError> {
        let bytes = self.store.read(key).map_err(|e| CacheError::LoadFailed {
            key: key.to_string(),
            source: e.into(),
        })?;
        let Some(bytes) = bytes else {
            debug!("cache: nothing stored under '{}'", key);
            return Ok(Vec::new());
        };
        serde_json::from_slice(&bytes).map_err(|e| CacheError::LoadFailed {
            key: key.to_string(),
            source: e.into(),
        })
    }

    /// Serialise `records` and replace whatever is stored under `key`.
    pub fn save(&self, key: &str, records: &[StationRecord]) -> Result<(), CacheError> {
        let bytes = serde_json::to_vec(records).map_err(|e| CacheError::SaveFailed {
            key: key.to_string(),
            source: e.into(),
        })?;
        self.store
            .write(key, &bytes)
            .map_err(|e| CacheError::SaveFailed {
                key: key.to_string(),
                source: e.into(),
            })
    }

    /// Newest entries go last.  Repeated plays are recorded every time.
    pub fn append_history(&mut self, record: StationRecord) {
        self.history.push(record);
        self.flush(List::History);
    }

    /// No duplicate check: a station can be favorited more than once.
    pub fn append_favorite(&mut self, record: StationRecord) {
        self.favorites.push(record);
        self.flush(List::Favorites);
    }

    /// Remove the favorite at `index`, keeping the order of the rest.
    pub fn remove_favorite(&mut self, index: usize) -> Result<StationRecord, CacheError> {
        if index >= self.favorites.len() {
            return Err(CacheError::IndexOutOfRange {
                index,
                len: self.favorites.len(),
            });
        }
        let removed = self.favorites.remove(index);
        self.flush(List::Favorites);
        Ok(removed)
    }

    fn flush(&self, list: List) {
        let records = match list {
            List::History => &self.history,
            List::Favorites => &self.favorites,
        };
        if let Err(e) = self.save(list.key(), records) {
            warn!("cache: {}", e);
        }
    }
}

impl std::fmt::Debug for StationCache {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StationCache")
            .field("history", &self.history.len())
            .field("favorites", &self.favorites.len())
            .finish()
    }
}
