//! Playback session and station cache for an internet radio client.
//!
//! [`session::PlaybackController`] owns the one active stream and the
//! [`cache::StationCache`] (history + favorites).  Audio output, directory
//! lookups and artwork are collaborators behind [`session::Transport`],
//! [`directory::StationDirectory`] and [`artwork::ArtworkFetcher`].

pub mod artwork;
pub mod cache;
pub mod config;
pub mod directory;
pub mod error;
pub mod events;
pub mod platform;
pub mod session;
pub mod station;
pub mod store;

pub use cache::StationCache;
pub use error::{CacheError, SessionError};
pub use events::{PlaybackEvent, PlaybackObserver};
pub use session::{PlaybackController, PlaybackStatus, RequestId, StreamHandle, Transport};
pub use station::{StationDirectoryEntry, StationRecord};
pub use store::{ByteStore, FileStore, MemoryStore};
