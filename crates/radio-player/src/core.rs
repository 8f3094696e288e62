/// PlayerCore — single-owner event loop for the playback session.
///
/// Every input reaches the controller through one `CoreEvent` channel: console
/// commands, transport readiness/failure from the audio worker, and results of
/// artwork and directory fetches spawned off this loop.  Nothing else touches
/// the controller or its cache, so no locking is needed.
use std::sync::Arc;

use radio_core::artwork::{Artwork, ArtworkFetcher};
use radio_core::directory::{NamedEntry, SearchKind, StationDirectory};
use radio_core::{
    PlaybackController, PlaybackStatus, RequestId, SessionError, StationDirectoryEntry,
    StationRecord,
};
use tokio::sync::mpsc;
use tracing::{debug, info, warn};

use crate::command::{Command, HELP};
use crate::console::{format_names, format_records, format_results, print_line};
use crate::transport::{MpvTransport, TransportEvent};

#[derive(Debug)]
pub enum CoreEvent {
    Command(Command),
    Transport(TransportEvent),
    Artwork {
        request: RequestId,
        artwork: Artwork,
    },
    SearchResults {
        kind: SearchKind,
        value: String,
        stations: Vec<StationDirectoryEntry>,
    },
    Names {
        title: &'static str,
        names: Vec<NamedEntry>,
    },
    Shutdown,
}

#[derive(Debug, Clone, Copy)]
enum ListKind {
    Countries,
    Languages,
    Tags,
}

pub struct PlayerCore {
    controller: PlaybackController<MpvTransport>,
    directory: Arc<dyn StationDirectory>,
    artwork: ArtworkFetcher,
    event_tx: mpsc::Sender<CoreEvent>,
    results: Vec<StationDirectoryEntry>,
}

impl PlayerCore {
    pub fn new(
        controller: PlaybackController<MpvTransport>,
        directory: Arc<dyn StationDirectory>,
        artwork: ArtworkFetcher,
        event_tx: mpsc::Sender<CoreEvent>,
    ) -> Self {
        Self {
            controller,
            directory,
            artwork,
            event_tx,
            results: Vec::new(),
        }
    }

    /// Runs until `quit`, a `Shutdown` event, or every sender is gone.
    pub async fn run(mut self, mut event_rx: mpsc::Receiver<CoreEvent>) -> anyhow::Result<()> {
        info!("PlayerCore: starting event loop");
        print_line("type 'help' for commands");

        while let Some(event) = event_rx.recv().await {
            match event {
                CoreEvent::Shutdown | CoreEvent::Command(Command::Quit) => {
                    info!("PlayerCore: shutdown requested");
                    break;
                }
                CoreEvent::Command(cmd) => {
                    debug!("PlayerCore: command {:?}", cmd);
                    self.handle_command(cmd);
                }
                CoreEvent::Transport(TransportEvent::Ready { request }) => {
                    self.controller.stream_ready(request);
                }
                CoreEvent::Transport(TransportEvent::Failed { request, reason }) => {
                    self.controller.stream_failed(request, &reason);
                }
                CoreEvent::Artwork { request, artwork } => {
                    self.controller.artwork_loaded(request, artwork);
                }
                CoreEvent::SearchResults {
                    kind,
                    value,
                    stations,
                } => {
                    info!("PlayerCore: {} '{}' gave {} stations", kind, value, stations.len());
                    self.results = stations;
                    print_line(&format_results(&self.results));
                }
                CoreEvent::Names { title, names } => {
                    print_line(&format_names(title, &names));
                }
            }
        }

        self.controller.stop();
        self.controller.transport().shutdown();
        Ok(())
    }

    fn handle_command(&mut self, cmd: Command) {
        match cmd {
            Command::Countries => self.spawn_list(ListKind::Countries),
            Command::Languages => self.spawn_list(ListKind::Languages),
            Command::Tags => self.spawn_list(ListKind::Tags),
            Command::Search { kind, value } => self.spawn_search(kind, value),
            Command::Results => print_line(&format_results(&self.results)),
            Command::Play(i) => {
                let record = self.results.get(i).map(StationRecord::from);
                self.select_from(record, "search result");
            }
            Command::Replay(i) => {
                let record = self.controller.cache().history().get(i).cloned();
                self.select_from(record, "history entry");
            }
            Command::FavoritePlay(i) => {
                let record = self.controller.cache().favorites().get(i).cloned();
                self.select_from(record, "favorite");
            }
            Command::History => {
                print_line(&format_records("history", self.controller.cache().history()))
            }
            Command::Favorites => print_line(&format_records(
                "favorites",
                self.controller.cache().favorites(),
            )),
            Command::Favorite => {
                if let Err(SessionError::NoActiveStation) = self.controller.add_current_to_favorites()
                {
                    print_line("nothing selected yet");
                }
            }
            Command::Unfavorite(i) => {
                let len = self.controller.cache().favorites().len();
                if i >= len {
                    print_line(&format!("no favorite #{} ({} saved)", i + 1, len));
                    return;
                }
                if let Err(e) = self.controller.remove_favorite(i) {
                    warn!("PlayerCore: {}", e);
                }
            }
            Command::Pause => self.controller.pause(),
            Command::Resume => self.controller.resume(),
            Command::Toggle => {
                let was_idle = self.controller.status() == PlaybackStatus::Idle;
                match self.controller.toggle_play_pause() {
                    Ok(()) if was_idle => self.fetch_artwork_for_pending(),
                    Ok(()) => {}
                    Err(SessionError::NoActiveStation) => print_line("nothing selected yet"),
                    Err(e) => debug!("PlayerCore: toggle: {}", e),
                }
            }
            Command::Stop => self.controller.stop(),
            Command::Status => print_line(&self.status_line()),
            Command::Help => println!("{}", HELP),
            Command::Quit => {}
        }
    }

    fn select_from(&mut self, record: Option<StationRecord>, what: &str) {
        let Some(record) = record else {
            print_line(&format!("no such {}", what));
            return;
        };
        let image_url = record.image_url.clone();
        match self.controller.select_station(record) {
            Ok(request) => self.spawn_artwork(request, image_url),
            // Already reported to the console as a Failed event.
            Err(e) => debug!("PlayerCore: select: {}", e),
        }
    }

    /// A restart from idle is a new request; artwork follows it like a selection.
    fn fetch_artwork_for_pending(&mut self) {
        let (Some(request), Some(current)) =
            (self.controller.pending_request(), self.controller.current())
        else {
            return;
        };
        let image_url = current.image_url.clone();
        self.spawn_artwork(request, image_url);
    }

    fn spawn_artwork(&self, request: RequestId, image_url: String) {
        let fetcher = self.artwork.clone();
        let tx = self.event_tx.clone();
        tokio::spawn(async move {
            let artwork = fetcher.fetch(&image_url).await;
            let _ = tx.send(CoreEvent::Artwork { request, artwork }).await;
        });
    }

    fn spawn_search(&self, kind: SearchKind, value: String) {
        let directory = Arc::clone(&self.directory);
        let tx = self.event_tx.clone();
        tokio::spawn(async move {
            match directory.search(kind, &value).await {
                Ok(stations) => {
                    let _ = tx
                        .send(CoreEvent::SearchResults {
                            kind,
                            value,
                            stations,
                        })
                        .await;
                }
                Err(e) => warn!("directory: search {} '{}' failed: {}", kind, value, e),
            }
        });
    }

    fn spawn_list(&self, kind: ListKind) {
        let directory = Arc::clone(&self.directory);
        let tx = self.event_tx.clone();
        tokio::spawn(async move {
            let (title, result) = match kind {
                ListKind::Countries => ("countries", directory.list_countries().await),
                ListKind::Languages => ("languages", directory.list_languages().await),
                ListKind::Tags => ("tags", directory.list_tags().await),
            };
            match result {
                Ok(names) => {
                    let _ = tx.send(CoreEvent::Names { title, names }).await;
                }
                Err(e) => warn!("directory: listing {} failed: {}", title, e),
            }
        });
    }

    fn status_line(&self) -> String {
        match (self.controller.status(), self.controller.current()) {
            (_, None) => "idle, nothing selected".to_string(),
            (PlaybackStatus::Idle, Some(s)) => format!("idle: {}", s.name),
            (PlaybackStatus::Loading, Some(s)) => format!("connecting: {}", s.name),
            (PlaybackStatus::Playing, Some(s)) => format!("playing: {}", s.name),
            (PlaybackStatus::Paused, Some(s)) => format!("paused: {}", s.name),
        }
    }
}
