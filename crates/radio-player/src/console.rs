//! Console rendering: one timestamped line per event, numbered lists.

use radio_core::artwork::Artwork;
use radio_core::directory::NamedEntry;
use radio_core::{PlaybackEvent, StationDirectoryEntry, StationRecord};
use tokio::sync::mpsc;

pub fn print_line(message: &str) {
    let now = chrono::Local::now();
    println!("{} {}", now.format("%H:%M:%S"), message);
}

pub fn format_event(event: &PlaybackEvent) -> String {
    let label = event
        .play_label()
        .map(|l| format!("  [{}]", l))
        .unwrap_or_default();
    let body = match event {
        PlaybackEvent::SelectionStarted { station, .. } => {
            format!("connecting: {}", station.name)
        }
        PlaybackEvent::NowPlaying { station } => format!("now playing: {}", station.name),
        PlaybackEvent::Paused { station } => format!("paused: {}", station.name),
        PlaybackEvent::Resumed { station } => format!("resumed: {}", station.name),
        PlaybackEvent::Failed { station, reason } => {
            format!("could not play {}: {}", station.name, reason)
        }
        PlaybackEvent::Stopped { station } => format!("stopped: {}", station.name),
        PlaybackEvent::ArtworkLoaded { station, artwork } => match artwork {
            Artwork::Image { bytes, .. } => {
                format!("artwork for {}: {} bytes", station.name, bytes.len())
            }
            Artwork::Fallback => format!("artwork for {}: default", station.name),
        },
        PlaybackEvent::HistoryChanged { history } => {
            format!("history: {} entries", history.len())
        }
        PlaybackEvent::FavoritesChanged { favorites } => {
            format!("favorites: {} entries", favorites.len())
        }
    };
    format!("{}{}", body, label)
}

/// Print controller events until the sender side is dropped.
pub async fn run_printer(mut rx: mpsc::UnboundedReceiver<PlaybackEvent>) {
    while let Some(event) = rx.recv().await {
        print_line(&format_event(&event));
    }
}

pub fn format_records(title: &str, records: &[StationRecord]) -> String {
    if records.is_empty() {
        return format!("{}: empty", title);
    }
    let mut out = format!("{}:", title);
    for (i, r) in records.iter().enumerate() {
        out.push_str(&format!("\n  {:>3}. {}  <{}>", i + 1, r.name, r.stream_url));
    }
    out
}

pub fn format_results(entries: &[StationDirectoryEntry]) -> String {
    if entries.is_empty() {
        return "no stations found".to_string();
    }
    let mut out = format!("{} stations:", entries.len());
    for (i, e) in entries.iter().enumerate() {
        out.push_str(&format!("\n  {:>3}. {}", i + 1, e.name.trim()));
        let extra: Vec<&str> = [&e.country, &e.language, &e.tags]
            .into_iter()
            .filter_map(|v| v.as_deref())
            .collect();
        if !extra.is_empty() {
            out.push_str(&format!("  ({})", extra.join(" · ")));
        }
    }
    out
}

pub fn format_names(title: &str, names: &[NamedEntry]) -> String {
    let list: Vec<String> = names
        .iter()
        .map(|n| format!("{} ({})", n.name, n.station_count))
        .collect();
    format!("{} {}: {}", names.len(), title, list.join(", "))
}
