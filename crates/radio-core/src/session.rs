/// PlaybackController — owner of the single active stream.
///
/// The controller is synchronous and single-owner.  Stream acquisition is
/// asynchronous on the transport side, so a selection goes through two steps:
///
/// ```text
///   select_station(r)  ── release old handle ── acquire(r.stream_url, req) ──► Loading
///                                                        │
///   stream_ready(req)  ◄──── transport reports live ─────┘           ──► Playing
///   stream_failed(req) ◄──── transport reports error ────┘           ──► Idle
/// ```
///
/// Every acquisition is tagged with a fresh `RequestId`.  Completions carrying
/// anything but the latest id are stale and dropped, so `select(A); select(B)`
/// records exactly one history entry, for B.
use std::fmt;

use tracing::{debug, info, warn};

use crate::artwork::Artwork;
use crate::cache::StationCache;
use crate::error::{CacheError, SessionError};
use crate::events::{PlaybackEvent, PlaybackObserver};
use crate::station::StationRecord;

/// Generation token for one acquisition.  Strictly increasing per controller.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct RequestId(u64);

impl RequestId {
    pub fn new(value: u64) -> Self {
        Self(value)
    }

    pub fn value(self) -> u64 {
        self.0
    }
}

impl fmt::Display for RequestId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// Opaque live connection to the audio transport.
///
/// Not `Clone`: `Transport::release` takes it by value, so a handle can only
/// be released once.
#[derive(Debug, PartialEq, Eq)]
pub struct StreamHandle {
    id: u64,
}

impl StreamHandle {
    pub fn new(id: u64) -> Self {
        Self { id }
    }

    pub fn id(&self) -> u64 {
        self.id
    }
}

/// The audio subsystem.  `acquire` starts connecting and returns right away;
/// the outcome is reported later through [`PlaybackController::stream_ready`]
/// or [`PlaybackController::stream_failed`] with the same `request`.
pub trait Transport {
    fn acquire(&mut self, url: &str, request: RequestId) -> anyhow::Result<StreamHandle>;
    fn release(&mut self, handle: StreamHandle);
    fn pause(&mut self, handle: &StreamHandle);
    fn resume(&mut self, handle: &StreamHandle);
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum PlaybackStatus {
    #[default]
    Idle,
    Loading,
    Playing,
    Paused,
}

/// The acquisition currently in flight or live.
#[derive(Debug)]
struct ActiveStream {
    handle: StreamHandle,
    request: RequestId,
    /// Only user selections go to history; a restart from Idle does not.
    record_history: bool,
}

pub struct PlaybackController<T: Transport> {
    transport: T,
    cache: StationCache,
    observers: Vec<Box<dyn PlaybackObserver + Send>>,
    current: Option<StationRecord>,
    status: PlaybackStatus,
    active: Option<ActiveStream>,
    last_request: u64,
}

impl<T: Transport> PlaybackController<T> {
    pub fn new(transport: T, cache: StationCache) -> Self {
        Self {
            transport,
            cache,
            observers: Vec::new(),
            current: None,
            status: PlaybackStatus::Idle,
            active: None,
            last_request: 0,
        }
    }

    pub fn subscribe(&mut self, observer: impl PlaybackObserver + Send + 'static) {
        self.observers.push(Box::new(observer));
    }

    pub fn status(&self) -> PlaybackStatus {
        self.status
    }

    pub fn current(&self) -> Option<&StationRecord> {
        self.current.as_ref()
    }

    pub fn cache(&self) -> &StationCache {
        &self.cache
    }

    pub fn transport(&self) -> &T {
        &self.transport
    }

    /// The request the next completion must carry to be accepted.
    pub fn pending_request(&self) -> Option<RequestId> {
        self.active.as_ref().map(|a| a.request)
    }

    pub fn has_active_stream(&self) -> bool {
        self.active.is_some()
    }

    // ── selection ────────────────────────────────────────────────────────────

    /// Make `record` the current station and (re)start its stream.
    ///
    /// Selecting the station that is already playing still restarts it from
    /// scratch.  History is written once the transport reports the stream live.
    pub fn select_station(&mut self, record: StationRecord) -> Result<RequestId, SessionError> {
        info!("session: select '{}' ({})", record.name, record.stream_url);
        self.current = Some(record);
        self.start_stream(true)
    }

    /// Transport says the stream for `request` is live.  Returns `false` when
    /// the completion is stale and was ignored.
    pub fn stream_ready(&mut self, request: RequestId) -> bool {
        let Some(active) = self.active.as_ref() else {
            debug!("session: ready {} with no active stream, ignoring", request);
            return false;
        };
        if active.request != request || self.status != PlaybackStatus::Loading {
            debug!(
                "session: stale ready {} (latest {}, status {:?})",
                request, active.request, self.status
            );
            return false;
        }
        let record_history = active.record_history;

        let Some(station) = self.current.clone() else {
            return false;
        };
        self.status = PlaybackStatus::Playing;
        info!("session: now playing '{}'", station.name);
        self.notify(PlaybackEvent::NowPlaying {
            station: station.clone(),
        });

        if record_history {
            self.cache.append_history(station);
            let history = self.cache.history().to_vec();
            self.notify(PlaybackEvent::HistoryChanged { history });
        }
        true
    }

    /// Transport says the stream for `request` could not start or has died.
    /// The session drops back to `Idle`; `current` is kept so the user can retry.
    pub fn stream_failed(&mut self, request: RequestId, reason: &str) -> Option<SessionError> {
        match self.active.as_ref() {
            Some(active) if active.request == request => {}
            _ => {
                debug!("session: stale failure {}: {}", request, reason);
                return None;
            }
        }
        if let Some(active) = self.active.take() {
            self.transport.release(active.handle);
        }
        self.status = PlaybackStatus::Idle;
        let station = self.current.clone()?;
        warn!("session: stream for '{}' failed: {}", station.name, reason);
        self.notify(PlaybackEvent::Failed {
            station: station.clone(),
            reason: reason.to_string(),
        });
        Some(SessionError::StreamAcquisitionFailed {
            station: station.name,
            reason: reason.to_string(),
        })
    }

    /// Artwork fetched for `request`.  Dropped unless that request still owns
    /// the active stream: a later selection, a failed acquisition or a stop
    /// all make it stale.
    pub fn artwork_loaded(&mut self, request: RequestId, artwork: Artwork) -> bool {
        if self.pending_request() != Some(request) {
            debug!("session: stale artwork for {}", request);
            return false;
        }
        let Some(station) = self.current.clone() else {
            return false;
        };
        self.notify(PlaybackEvent::ArtworkLoaded { station, artwork });
        true
    }

    // ── play / pause ─────────────────────────────────────────────────────────

    pub fn pause(&mut self) {
        if self.status != PlaybackStatus::Playing {
            return;
        }
        let Some(active) = self.active.as_ref() else {
            return;
        };
        self.transport.pause(&active.handle);
        self.status = PlaybackStatus::Paused;
        if let Some(station) = self.current.clone() {
            info!("session: paused '{}'", station.name);
            self.notify(PlaybackEvent::Paused { station });
        }
    }

    /// Continue a paused stream on the same handle.
    pub fn resume(&mut self) {
        if self.status != PlaybackStatus::Paused {
            return;
        }
        let Some(active) = self.active.as_ref() else {
            return;
        };
        self.transport.resume(&active.handle);
        self.status = PlaybackStatus::Playing;
        if let Some(station) = self.current.clone() {
            info!("session: resumed '{}'", station.name);
            self.notify(PlaybackEvent::Resumed { station });
        }
    }

    /// Pause when playing, resume when paused, restart the current station
    /// when idle.  While still connecting this does nothing.
    pub fn toggle_play_pause(&mut self) -> Result<(), SessionError> {
        match self.status {
            PlaybackStatus::Playing => {
                self.pause();
                Ok(())
            }
            PlaybackStatus::Paused => {
                self.resume();
                Ok(())
            }
            PlaybackStatus::Loading => Ok(()),
            PlaybackStatus::Idle => {
                if self.current.is_none() {
                    return Err(SessionError::NoActiveStation);
                }
                self.start_stream(false).map(|_| ())
            }
        }
    }

    /// Release the stream and go idle.  The current station is kept.
    pub fn stop(&mut self) {
        let Some(active) = self.active.take() else {
            return;
        };
        self.transport.release(active.handle);
        self.status = PlaybackStatus::Idle;
        if let Some(station) = self.current.clone() {
            info!("session: stopped '{}'", station.name);
            self.notify(PlaybackEvent::Stopped { station });
        }
    }

    // ── favorites ────────────────────────────────────────────────────────────

    pub fn add_current_to_favorites(&mut self) -> Result<(), SessionError> {
        let station = self.current.clone().ok_or(SessionError::NoActiveStation)?;
        info!("session: favorite '{}'", station.name);
        self.cache.append_favorite(station);
        let favorites = self.cache.favorites().to_vec();
        self.notify(PlaybackEvent::FavoritesChanged { favorites });
        Ok(())
    }

    /// Callers validate `index` against `cache().favorites().len()` first.
    pub fn remove_favorite(&mut self, index: usize) -> Result<StationRecord, CacheError> {
        let removed = self.cache.remove_favorite(index)?;
        info!("session: unfavorite '{}'", removed.name);
        let favorites = self.cache.favorites().to_vec();
        self.notify(PlaybackEvent::FavoritesChanged { favorites });
        Ok(removed)
    }

    // ── internals ────────────────────────────────────────────────────────────

    fn start_stream(&mut self, record_history: bool) -> Result<RequestId, SessionError> {
        let Some(station) = self.current.clone() else {
            return Err(SessionError::NoActiveStation);
        };

        // Replace, never stack: the old handle is gone before the new one exists.
        if let Some(old) = self.active.take() {
            debug!("session: releasing stream {}", old.request);
            self.transport.pause(&old.handle);
            self.transport.release(old.handle);
        }

        self.last_request += 1;
        let request = RequestId::new(self.last_request);
        self.status = PlaybackStatus::Loading;
        self.notify(PlaybackEvent::SelectionStarted {
            station: station.clone(),
            request,
        });

        match self.transport.acquire(&station.stream_url, request) {
            Ok(handle) => {
                debug!("session: acquired stream {} as {}", handle.id(), request);
                self.active = Some(ActiveStream {
                    handle,
                    request,
                    record_history,
                });
                Ok(request)
            }
            Err(e) => {
                let reason = e.to_string();
                warn!("session: could not acquire '{}': {}", station.name, reason);
                self.status = PlaybackStatus::Idle;
                self.notify(PlaybackEvent::Failed {
                    station: station.clone(),
                    reason: reason.clone(),
                });
                Err(SessionError::StreamAcquisitionFailed {
                    station: station.name,
                    reason,
                })
            }
        }
    }

    fn notify(&mut self, event: PlaybackEvent) {
        for observer in self.observers.iter_mut() {
            observer.on_event(&event);
        }
    }
}

impl<T: Transport> fmt::Debug for PlaybackController<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PlaybackController")
            .field("current", &self.current)
            .field("status", &self.status)
            .field("active", &self.active)
            .field("cache", &self.cache)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::MemoryStore;

    /// Transport that records calls and hands out sequential handles.
    #[derive(Default)]
    struct FakeTransport {
        next_id: u64,
        live: Vec<u64>,
        calls: Vec<String>,
        refuse: bool,
    }

    impl Transport for FakeTransport {
        fn acquire(&mut self, url: &str, request: RequestId) -> anyhow::Result<StreamHandle> {
            if self.refuse {
                anyhow::bail!("connection refused");
            }
            self.next_id += 1;
            self.live.push(self.next_id);
            self.calls.push(format!("acquire {} {}", url, request));
            Ok(StreamHandle::new(self.next_id))
        }

        fn release(&mut self, handle: StreamHandle) {
            self.live.retain(|id| *id != handle.id());
            self.calls.push(format!("release {}", handle.id()));
        }

        fn pause(&mut self, handle: &StreamHandle) {
            self.calls.push(format!("pause {}", handle.id()));
        }

        fn resume(&mut self, handle: &StreamHandle) {
            self.calls.push(format!("resume {}", handle.id()));
        }
    }

    fn controller() -> PlaybackController<FakeTransport> {
        PlaybackController::new(
            FakeTransport::default(),
            StationCache::open(MemoryStore::new()),
        )
    }

    fn station(name: &str) -> StationRecord {
        StationRecord::new(name, format!("https://{}/stream", name), "")
    }

    #[test]
    fn test_select_enters_loading_until_ready() {
        let mut c = controller();
        let req = c.select_station(station("a")).unwrap();
        assert_eq!(c.status(), PlaybackStatus::Loading);
        assert!(c.has_active_stream());
        assert!(c.cache().history().is_empty());

        assert!(c.stream_ready(req));
        assert_eq!(c.status(), PlaybackStatus::Playing);
        assert_eq!(c.cache().history(), &[station("a")]);
    }

    #[test]
    fn test_ready_twice_only_records_once() {
        let mut c = controller();
        let req = c.select_station(station("a")).unwrap();
        assert!(c.stream_ready(req));
        assert!(!c.stream_ready(req));
        assert_eq!(c.cache().history().len(), 1);
    }

    #[test]
    fn test_reselect_same_station_restarts() {
        let mut c = controller();
        let first = c.select_station(station("a")).unwrap();
        c.stream_ready(first);
        let second = c.select_station(station("a")).unwrap();
        assert_ne!(first, second);
        assert_eq!(c.transport().live, vec![2]);
        let expected = vec![
            "pause 1".to_string(),
            "release 1".to_string(),
            format!("acquire https://a/stream {}", second),
        ];
        assert_eq!(c.transport().calls[1..].to_vec(), expected);
    }

    #[test]
    fn test_pause_is_noop_unless_playing() {
        let mut c = controller();
        c.pause();
        assert_eq!(c.status(), PlaybackStatus::Idle);

        c.select_station(station("a")).unwrap();
        c.pause();
        assert_eq!(c.status(), PlaybackStatus::Loading);
        assert!(!c.transport().calls.iter().any(|call| call.starts_with("pause")));
    }

    #[test]
    fn test_toggle_without_station_fails() {
        let mut c = controller();
        assert!(matches!(
            c.toggle_play_pause(),
            Err(SessionError::NoActiveStation)
        ));
        assert_eq!(c.status(), PlaybackStatus::Idle);
        assert!(c.transport().calls.is_empty());
    }

    #[test]
    fn test_toggle_from_idle_restarts_without_history() {
        let mut c = controller();
        let req = c.select_station(station("a")).unwrap();
        c.stream_ready(req);
        c.stop();
        assert_eq!(c.status(), PlaybackStatus::Idle);
        assert!(!c.has_active_stream());
        assert_eq!(c.current(), Some(&station("a")));

        c.toggle_play_pause().unwrap();
        assert_eq!(c.status(), PlaybackStatus::Loading);
        let req = c.pending_request().unwrap();
        assert!(c.stream_ready(req));
        assert_eq!(c.status(), PlaybackStatus::Playing);
        assert_eq!(c.cache().history().len(), 1);
    }

    #[test]
    fn test_acquire_error_goes_idle_and_keeps_current() {
        let mut c = controller();
        c.transport.refuse = true;
        let err = c.select_station(station("a")).unwrap_err();
        assert!(matches!(err, SessionError::StreamAcquisitionFailed { .. }));
        assert_eq!(c.status(), PlaybackStatus::Idle);
        assert!(!c.has_active_stream());
        assert_eq!(c.current(), Some(&station("a")));
        assert!(c.cache().history().is_empty());
    }

    #[test]
    fn test_stream_failure_releases_handle() {
        let mut c = controller();
        let req = c.select_station(station("a")).unwrap();
        let err = c.stream_failed(req, "404").unwrap();
        assert!(matches!(err, SessionError::StreamAcquisitionFailed { .. }));
        assert_eq!(c.status(), PlaybackStatus::Idle);
        assert!(c.transport().live.is_empty());
        assert!(c.cache().history().is_empty());
        assert!(!c.stream_ready(req));
    }

    #[test]
    fn test_stale_failure_is_ignored() {
        let mut c = controller();
        let a = c.select_station(station("a")).unwrap();
        let b = c.select_station(station("b")).unwrap();
        assert!(c.stream_failed(a, "timeout").is_none());
        assert_eq!(c.status(), PlaybackStatus::Loading);
        assert!(c.stream_ready(b));
    }

    #[test]
    fn test_stale_artwork_is_dropped() {
        let (tx, rx) = std::sync::mpsc::channel();
        let mut c = controller();
        c.subscribe(tx);
        let a = c.select_station(station("a")).unwrap();
        let b = c.select_station(station("b")).unwrap();
        assert!(!c.artwork_loaded(a, Artwork::Fallback));
        assert!(c.artwork_loaded(b, Artwork::Fallback));

        let artwork: Vec<_> = rx
            .try_iter()
            .filter_map(|e| match e {
                PlaybackEvent::ArtworkLoaded { station, .. } => Some(station),
                _ => None,
            })
            .collect();
        assert_eq!(artwork, vec![station("b")]);
    }

    #[test]
    fn test_artwork_needs_an_acquired_stream() {
        let mut c = controller();
        let a = c.select_station(station("a")).unwrap();
        c.transport.refuse = true;
        assert!(c.select_station(station("b")).is_err());

        let b = RequestId::new(a.value() + 1);
        assert!(!c.artwork_loaded(b, Artwork::Fallback));
        assert!(!c.artwork_loaded(a, Artwork::Fallback));

        c.transport.refuse = false;
        let retry = c.select_station(station("b")).unwrap();
        c.stop();
        assert!(!c.artwork_loaded(retry, Artwork::Fallback));
    }

    #[test]
    fn test_add_favorite_requires_station() {
        let mut c = controller();
        assert!(matches!(
            c.add_current_to_favorites(),
            Err(SessionError::NoActiveStation)
        ));
        c.select_station(station("a")).unwrap();
        c.add_current_to_favorites().unwrap();
        c.add_current_to_favorites().unwrap();
        assert_eq!(c.cache().favorites(), &[station("a"), station("a")]);
    }
}
