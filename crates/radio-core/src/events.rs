//! Notifications from the playback controller to whatever renders it.
//!
//! Every state transition and every cache mutation produces exactly one
//! event, carrying enough data to redraw without reading the controller back.

use crate::artwork::Artwork;
use crate::session::RequestId;
use crate::station::StationRecord;

#[derive(Debug, Clone, PartialEq)]
pub enum PlaybackEvent {
    /// A station was selected and its stream is connecting.
    SelectionStarted {
        station: StationRecord,
        request: RequestId,
    },
    /// The transport reported the stream is live.
    NowPlaying { station: StationRecord },
    Paused { station: StationRecord },
    Resumed { station: StationRecord },
    /// The stream could not be started or dropped; the session is idle again.
    Failed {
        station: StationRecord,
        reason: String,
    },
    Stopped { station: StationRecord },
    ArtworkLoaded {
        station: StationRecord,
        artwork: Artwork,
    },
    HistoryChanged { history: Vec<StationRecord> },
    FavoritesChanged { favorites: Vec<StationRecord> },
}

impl PlaybackEvent {
    /// Label for the play/pause control after this event, if it changes it.
    pub fn play_label(&self) -> Option<&'static str> {
        match self {
            PlaybackEvent::SelectionStarted { .. }
            | PlaybackEvent::NowPlaying { .. }
            | PlaybackEvent::Resumed { .. } => Some("Pause"),
            PlaybackEvent::Paused { .. }
            | PlaybackEvent::Failed { .. }
            | PlaybackEvent::Stopped { .. } => Some("Play"),
            _ => None,
        }
    }
}

pub trait PlaybackObserver {
    fn on_event(&mut self, event: &PlaybackEvent);
}

impl PlaybackObserver for std::sync::mpsc::Sender<PlaybackEvent> {
    fn on_event(&mut self, event: &PlaybackEvent) {
        // A dropped receiver just means nobody is watching any more.
        let _ = self.send(event.clone());
    }
}

impl PlaybackObserver for tokio::sync::mpsc::UnboundedSender<PlaybackEvent> {
    fn on_event(&mut self, event: &PlaybackEvent) {
        let _ = self.send(event.clone());
    }
}
