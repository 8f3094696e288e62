mod command;
mod console;
mod core;
mod mpv;
mod transport;

use std::io::BufRead;
use std::sync::Arc;
use std::time::Duration;

use radio_core::artwork::ArtworkFetcher;
use radio_core::config::Config;
use radio_core::directory::RadioBrowserClient;
use radio_core::{FileStore, PlaybackController, PlaybackEvent, StationCache};
use tokio::sync::mpsc;
use tracing::info;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;

use crate::command::Command;
use crate::core::{CoreEvent, PlayerCore};
use crate::transport::{AudioWorker, MpvTransport};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Logs go to a file; stdout belongs to the console.
    let log_path = radio_core::platform::log_file();
    if let Some(dir) = log_path.parent() {
        std::fs::create_dir_all(dir)?;
    }
    let log_file = std::fs::OpenOptions::new()
        .create(true)
        .append(true)
        .open(&log_path)?;

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::fmt::layer()
                .with_writer(log_file)
                .with_ansi(false),
        )
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| {
                tracing_subscriber::EnvFilter::new("info,radio_player=debug,radio_core=debug")
            }),
        )
        .init();

    info!("Log file: {:?}", log_path);

    let config = Config::load()?;
    info!("Config loaded from: {:?}", Config::config_path());

    let (event_tx, event_rx) = mpsc::channel::<CoreEvent>(256);

    // Audio worker owns mpv; the controller only sees MpvTransport.
    let (audio_tx, audio_rx) = mpsc::unbounded_channel();
    let worker = AudioWorker::new(
        event_tx.clone(),
        config.player.clamped_volume(),
        Duration::from_secs(config.player.connect_timeout_secs.max(1)),
    );
    let worker_handle = tokio::spawn(worker.run(audio_rx));

    let cache = StationCache::open(FileStore::new(&config.storage.cache_dir));
    let mut controller = PlaybackController::new(MpvTransport::new(audio_tx), cache);

    let (ui_tx, ui_rx) = mpsc::unbounded_channel::<PlaybackEvent>();
    controller.subscribe(ui_tx);
    let printer_handle = tokio::spawn(console::run_printer(ui_rx));

    let directory = Arc::new(RadioBrowserClient::new(&config.directory)?);
    let artwork = ArtworkFetcher::new(
        &config.directory.user_agent,
        Duration::from_secs(config.directory.timeout_secs.max(1)),
    )?;

    spawn_stdin_reader(event_tx.clone());

    let core = PlayerCore::new(controller, directory, artwork, event_tx);
    core.run(event_rx).await?;

    let _ = worker_handle.await;
    let _ = printer_handle.await;
    info!("radio-player exiting");
    Ok(())
}

/// One command per line; EOF ends the session.  Runs on a plain thread so a
/// pending blocking read never holds up runtime shutdown.
fn spawn_stdin_reader(tx: mpsc::Sender<CoreEvent>) {
    std::thread::spawn(move || {
        for line in std::io::stdin().lock().lines() {
            let Ok(line) = line else {
                break;
            };
            match Command::parse(&line) {
                Ok(Some(cmd)) => {
                    if tx.blocking_send(CoreEvent::Command(cmd)).is_err() {
                        return;
                    }
                }
                Ok(None) => {}
                Err(msg) => console::print_line(&msg),
            }
        }
        let _ = tx.blocking_send(CoreEvent::Shutdown);
    });
}
