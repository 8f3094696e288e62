//! mpv-backed `Transport`.
//!
//! `MpvTransport` is the synchronous face the controller sees: it hands out
//! handle ids and forwards commands to `AudioWorker`, which owns the mpv
//! process and reports readiness/failure back into the core loop tagged with
//! the request that started the stream.

use std::time::Duration;

use radio_core::{RequestId, StreamHandle, Transport};
use tokio::sync::mpsc;
use tokio::time::Instant;
use tracing::{debug, info, warn};

use crate::core::CoreEvent;
use crate::mpv::{MpvDriver, MpvEvent, MpvHandle, OBS_CORE_IDLE};

#[derive(Debug, Clone, PartialEq)]
pub enum TransportEvent {
    Ready { request: RequestId },
    Failed { request: RequestId, reason: String },
}

#[derive(Debug)]
pub enum AudioCommand {
    Load {
        handle: u64,
        url: String,
        request: RequestId,
    },
    Release {
        handle: u64,
    },
    Pause {
        handle: u64,
    },
    Resume {
        handle: u64,
    },
    Shutdown,
}

pub struct MpvTransport {
    tx: mpsc::UnboundedSender<AudioCommand>,
    next_handle: u64,
}

impl MpvTransport {
    pub fn new(tx: mpsc::UnboundedSender<AudioCommand>) -> Self {
        Self { tx, next_handle: 0 }
    }

    /// Ask the worker to kill mpv and exit.
    pub fn shutdown(&self) {
        let _ = self.tx.send(AudioCommand::Shutdown);
    }
}

impl Transport for MpvTransport {
    fn acquire(&mut self, url: &str, request: RequestId) -> anyhow::Result<StreamHandle> {
        self.next_handle += 1;
        self.tx
            .send(AudioCommand::Load {
                handle: self.next_handle,
                url: url.to_string(),
                request,
            })
            .map_err(|_| anyhow::anyhow!("audio worker is not running"))?;
        Ok(StreamHandle::new(self.next_handle))
    }

    fn release(&mut self, handle: StreamHandle) {
        let _ = self.tx.send(AudioCommand::Release {
            handle: handle.id(),
        });
    }

    fn pause(&mut self, handle: &StreamHandle) {
        let _ = self.tx.send(AudioCommand::Pause {
            handle: handle.id(),
        });
    }

    fn resume(&mut self, handle: &StreamHandle) {
        let _ = self.tx.send(AudioCommand::Resume {
            handle: handle.id(),
        });
    }
}

/// What mpv currently has loaded on our behalf.
///
/// mpv events carry no request id, only a playlist entry id.  Events from a
/// previous file can still be queued after a new load, so readiness and
/// end-of-file only count once mpv has started this load's entry.
#[derive(Debug)]
struct Loaded {
    handle: u64,
    request: RequestId,
    /// Set until the stream is live or has been reported failed.
    connecting_since: Option<Instant>,
    /// From the `loadfile` reply, or the first `start-file` if mpv is too old
    /// to report it.
    entry: Option<i64>,
    started: bool,
}

impl Loaded {
    fn new(handle: u64, request: RequestId) -> Self {
        Self {
            handle,
            request,
            connecting_since: Some(Instant::now()),
            entry: None,
            started: false,
        }
    }

    /// `None` ids (old mpv) are accepted once the load has started.
    fn owns(&self, entry: Option<i64>) -> bool {
        match (self.entry, entry) {
            (Some(ours), Some(theirs)) => ours == theirs,
            _ => self.started,
        }
    }
}

pub struct AudioWorker {
    driver: MpvDriver,
    mpv: Option<MpvHandle>,
    mpv_events: Option<mpsc::Receiver<MpvEvent>>,
    loaded: Option<Loaded>,
    core_tx: mpsc::Sender<CoreEvent>,
    volume: f32,
    connect_timeout: Duration,
}

impl AudioWorker {
    pub fn new(core_tx: mpsc::Sender<CoreEvent>, volume: f32, connect_timeout: Duration) -> Self {
        Self {
            driver: MpvDriver::new(),
            mpv: None,
            mpv_events: None,
            loaded: None,
            core_tx,
            volume,
            connect_timeout,
        }
    }

    pub async fn run(mut self, mut rx: mpsc::UnboundedReceiver<AudioCommand>) {
        info!("audio: worker started");
        let mut tick = tokio::time::interval(Duration::from_secs(1));

        loop {
            tokio::select! {
                cmd = rx.recv() => match cmd {
                    None | Some(AudioCommand::Shutdown) => break,
                    Some(cmd) => self.handle_command(cmd).await,
                },
                evt = next_event(&mut self.mpv_events) => match evt {
                    Some(evt) => self.handle_mpv_event(evt).await,
                    None => self.connection_lost("mpv IPC connection closed").await,
                },
                _ = tick.tick() => self.check_health().await,
            }
        }

        if let Some(mpv) = self.mpv.take() {
            let _ = mpv.stop().await;
        }
        self.driver.kill().await;
        info!("audio: worker stopped");
    }

    async fn handle_command(&mut self, cmd: AudioCommand) {
        debug!("audio: {:?}", cmd);
        match cmd {
            AudioCommand::Load {
                handle,
                url,
                request,
            } => self.load(handle, url, request).await,
            AudioCommand::Release { handle } => {
                if self.loaded.as_ref().map(|l| l.handle) != Some(handle) {
                    return;
                }
                self.loaded = None;
                if let Some(mpv) = &self.mpv {
                    if let Err(e) = mpv.stop().await {
                        warn!("audio: stop failed: {}", e);
                    }
                }
            }
            AudioCommand::Pause { handle } => self.set_pause(handle, true).await,
            AudioCommand::Resume { handle } => self.set_pause(handle, false).await,
            AudioCommand::Shutdown => {}
        }
    }

    async fn load(&mut self, handle: u64, url: String, request: RequestId) {
        self.loaded = Some(Loaded::new(handle, request));

        let mpv = match self.ensure_connected().await {
            Ok(mpv) => mpv,
            Err(e) => {
                self.report_failure(format!("could not start mpv: {}", e)).await;
                return;
            }
        };
        info!("audio: loading {} for {}", url, request);
        match mpv.load_stream(&url, self.volume).await {
            Ok(entry) => {
                if let Some(loaded) = self.loaded.as_mut() {
                    debug!("audio: {} is playlist entry {:?}", request, entry);
                    loaded.entry = entry;
                }
            }
            Err(e) => self.report_failure(e.to_string()).await,
        }
    }

    async fn set_pause(&mut self, handle: u64, paused: bool) {
        if self.loaded.as_ref().map(|l| l.handle) != Some(handle) {
            return;
        }
        if let Some(mpv) = &self.mpv {
            if let Err(e) = mpv.set_pause(paused).await {
                warn!("audio: set pause={} failed: {}", paused, e);
            }
        }
    }

    async fn ensure_connected(&mut self) -> anyhow::Result<MpvHandle> {
        if let Some(mpv) = &self.mpv {
            return Ok(mpv.clone());
        }
        let (event_tx, event_rx) = mpsc::channel(256);
        let mpv = self.driver.spawn_and_connect(event_tx).await?;
        mpv.observe_core_idle().await?;
        self.mpv = Some(mpv.clone());
        self.mpv_events = Some(event_rx);
        Ok(mpv)
    }

    async fn handle_mpv_event(&mut self, evt: MpvEvent) {
        if let Some((OBS_CORE_IDLE, data)) = evt.as_property_change() {
            let started = self.loaded.as_ref().is_some_and(|l| l.started);
            if data.as_bool() == Some(false) && started {
                self.report_ready().await;
            }
            return;
        }

        if evt.event_name() == Some("start-file") {
            let entry = evt.playlist_entry_id();
            if let Some(loaded) = self.loaded.as_mut() {
                if loaded.entry.is_none() || loaded.entry == entry {
                    loaded.entry = loaded.entry.or(entry);
                    loaded.started = true;
                } else {
                    debug!("audio: start-file for stale entry {:?}", entry);
                }
            }
            return;
        }

        if let Some((reason, detail)) = evt.end_file() {
            let ours = self
                .loaded
                .as_ref()
                .is_some_and(|l| l.owns(evt.playlist_entry_id()));
            if !ours {
                debug!("audio: end-file reason={} for a previous file", reason);
                return;
            }
            match reason {
                "error" => {
                    let reason = detail.unwrap_or("playback error").to_string();
                    self.report_failure(reason).await;
                }
                // A live stream reaching EOF means the server hung up.
                "eof" => self.report_failure("stream ended".to_string()).await,
                _ => debug!("audio: end-file reason={}", reason),
            }
        }
    }

    async fn check_health(&mut self) {
        if self.mpv.is_some() && !self.driver.process_alive() {
            warn!("audio: mpv process died");
            self.connection_lost("mpv exited").await;
            return;
        }

        let timed_out = self
            .loaded
            .as_ref()
            .and_then(|l| l.connecting_since)
            .is_some_and(|since| since.elapsed() >= self.connect_timeout);
        if timed_out {
            let secs = self.connect_timeout.as_secs();
            self.report_failure(format!("no audio after {}s", secs)).await;
        }
    }

    async fn connection_lost(&mut self, reason: &str) {
        self.mpv = None;
        self.mpv_events = None;
        self.report_failure(reason.to_string()).await;
    }

    async fn report_ready(&mut self) {
        let Some(loaded) = self.loaded.as_mut() else {
            return;
        };
        if loaded.connecting_since.take().is_none() {
            return;
        }
        let request = loaded.request;
        let _ = self
            .core_tx
            .send(CoreEvent::Transport(TransportEvent::Ready { request }))
            .await;
    }

    /// Report failure of whatever is loaded.  The controller answers with a
    /// release, which stops mpv.
    async fn report_failure(&mut self, reason: String) {
        let Some(loaded) = self.loaded.as_mut() else {
            return;
        };
        loaded.connecting_since = None;
        let request = loaded.request;
        warn!("audio: {} failed: {}", request, reason);
        let _ = self
            .core_tx
            .send(CoreEvent::Transport(TransportEvent::Failed { request, reason }))
            .await;
    }
}

async fn next_event(rx: &mut Option<mpsc::Receiver<MpvEvent>>) -> Option<MpvEvent> {
    match rx {
        Some(rx) => rx.recv().await,
        None => std::future::pending().await,
    }
}
