mod common;

use common::{station, RecordingTransport};
use radio_core::{
    MemoryStore, PlaybackController, PlaybackEvent, PlaybackStatus, SessionError, StationCache,
    StationRecord,
};

fn controller_with(store: MemoryStore) -> PlaybackController<RecordingTransport> {
    PlaybackController::new(RecordingTransport::default(), StationCache::open(store))
}

fn play(c: &mut PlaybackController<RecordingTransport>, record: StationRecord) {
    let request = c.select_station(record).unwrap();
    assert!(c.stream_ready(request));
}

#[test]
fn jazz_then_rock_scenario() {
    let mut c = controller_with(MemoryStore::new());

    let jazz = StationRecord::new("Jazz24", "https://x/stream", "https://x/art.png");
    play(&mut c, jazz.clone());
    assert_eq!(c.status(), PlaybackStatus::Playing);
    assert_eq!(c.cache().history(), &[jazz.clone()]);

    c.add_current_to_favorites().unwrap();
    assert_eq!(c.cache().favorites(), &[jazz.clone()]);

    let rock = StationRecord::new("RockFM", "https://rock/stream", "https://rock/art.png");
    let log_before = c.transport().log.len();
    play(&mut c, rock.clone());

    let new_calls: Vec<_> = c.transport().log[log_before..]
        .iter()
        .filter(|call| **call != "pause")
        .copied()
        .collect();
    assert_eq!(new_calls, vec!["release", "acquire"]);
    assert_eq!(c.cache().history(), &[jazz.clone(), rock]);
    assert_eq!(c.cache().favorites(), &[jazz]);
}

#[test]
fn at_most_one_handle_outstanding() {
    let mut c = controller_with(MemoryStore::new());
    for name in ["A", "B", "C", "A", "A"] {
        let request = c.select_station(station(name)).unwrap();
        assert_eq!(c.transport().outstanding(), 1);
        assert_eq!(c.transport().live.len(), 1);
        if name != "B" {
            c.stream_ready(request);
        }
        c.pause();
        assert_eq!(c.transport().outstanding(), 1);
    }
    c.stop();
    assert_eq!(c.transport().outstanding(), 0);
    assert_eq!(c.status(), PlaybackStatus::Idle);
}

#[test]
fn superseded_selection_never_reaches_history() {
    let store = MemoryStore::new();
    let mut c = controller_with(store);
    play(&mut c, station("Earlier"));

    let a = c.select_station(station("A")).unwrap();
    let b = c.select_station(station("B")).unwrap();

    // Completions arrive out of order; A's is stale whichever comes first.
    assert!(c.stream_ready(b));
    assert!(!c.stream_ready(a));

    assert_eq!(c.cache().history(), &[station("Earlier"), station("B")]);
    assert_eq!(c.current(), Some(&station("B")));
}

#[test]
fn stale_ready_before_latest_is_ignored() {
    let mut c = controller_with(MemoryStore::new());
    let a = c.select_station(station("A")).unwrap();
    let b = c.select_station(station("B")).unwrap();

    assert!(!c.stream_ready(a));
    assert_eq!(c.status(), PlaybackStatus::Loading);
    assert!(c.cache().history().is_empty());

    assert!(c.stream_ready(b));
    assert_eq!(c.cache().history(), &[station("B")]);
}

#[test]
fn pause_resume_keeps_handle() {
    let mut c = controller_with(MemoryStore::new());
    play(&mut c, station("A"));
    let acquires = c.transport().acquired.len();
    let handle = c.transport().live[0];

    c.pause();
    assert_eq!(c.status(), PlaybackStatus::Paused);
    c.resume();
    assert_eq!(c.status(), PlaybackStatus::Playing);

    c.toggle_play_pause().unwrap();
    assert_eq!(c.status(), PlaybackStatus::Paused);
    c.toggle_play_pause().unwrap();
    assert_eq!(c.status(), PlaybackStatus::Playing);

    assert_eq!(c.transport().acquired.len(), acquires);
    assert_eq!(c.transport().live, vec![handle]);
    assert_eq!(c.transport().paused, vec![handle, handle]);
    assert_eq!(c.transport().resumed, vec![handle, handle]);
    assert_eq!(c.cache().history().len(), 1);
}

#[test]
fn toggle_with_nothing_selected() {
    let mut c = controller_with(MemoryStore::new());
    assert!(matches!(
        c.toggle_play_pause(),
        Err(SessionError::NoActiveStation)
    ));
    assert_eq!(c.status(), PlaybackStatus::Idle);
    assert!(c.transport().log.is_empty());
}

#[test]
fn failed_acquisition_keeps_station_for_retry() {
    let mut c = controller_with(MemoryStore::new());
    let request = c.select_station(station("A")).unwrap();
    assert!(c.stream_failed(request, "connection reset").is_some());
    assert_eq!(c.status(), PlaybackStatus::Idle);
    assert_eq!(c.transport().outstanding(), 0);
    assert!(c.cache().history().is_empty());

    c.toggle_play_pause().unwrap();
    let retry = c.pending_request().unwrap();
    assert!(c.stream_ready(retry));
    assert_eq!(c.status(), PlaybackStatus::Playing);
    assert_eq!(c.transport().acquired.len(), 2);
}

#[test]
fn observer_sees_each_transition() {
    let (tx, rx) = std::sync::mpsc::channel();
    let mut c = controller_with(MemoryStore::new());
    c.subscribe(tx);

    let request = c.select_station(station("A")).unwrap();
    c.stream_ready(request);
    c.pause();
    c.resume();
    c.add_current_to_favorites().unwrap();
    c.remove_favorite(0).unwrap();

    let events: Vec<PlaybackEvent> = rx.try_iter().collect();
    let a = station("A");
    assert_eq!(
        events,
        vec![
            PlaybackEvent::SelectionStarted {
                station: a.clone(),
                request
            },
            PlaybackEvent::NowPlaying { station: a.clone() },
            PlaybackEvent::HistoryChanged {
                history: vec![a.clone()]
            },
            PlaybackEvent::Paused { station: a.clone() },
            PlaybackEvent::Resumed { station: a.clone() },
            PlaybackEvent::FavoritesChanged {
                favorites: vec![a.clone()]
            },
            PlaybackEvent::FavoritesChanged { favorites: vec![] },
        ]
    );
    assert_eq!(events[0].play_label(), Some("Pause"));
    assert_eq!(events[3].play_label(), Some("Play"));
}

#[test]
fn history_keeps_repeats() {
    let mut c = controller_with(MemoryStore::new());
    play(&mut c, station("A"));
    play(&mut c, station("A"));
    play(&mut c, station("B"));
    play(&mut c, station("A"));
    let names: Vec<_> = c.cache().history().iter().map(|r| r.name.as_str()).collect();
    assert_eq!(names, vec!["A", "A", "B", "A"]);
}

#[test]
fn live_stream_failure_goes_idle_and_retries_without_history() {
    for pause_first in [false, true] {
        let mut c = controller_with(MemoryStore::new());
        let request = c.select_station(station("A")).unwrap();
        assert!(c.stream_ready(request));
        if pause_first {
            c.pause();
            assert_eq!(c.status(), PlaybackStatus::Paused);
        }
        let handle = c.transport().live[0];

        assert!(c.stream_failed(request, "server hung up").is_some());
        assert_eq!(c.status(), PlaybackStatus::Idle);
        assert!(!c.has_active_stream());
        assert_eq!(c.transport().released, vec![handle]);
        assert_eq!(c.transport().outstanding(), 0);
        assert_eq!(c.current(), Some(&station("A")));

        // A second report for the same request is stale now.
        assert!(c.stream_failed(request, "server hung up").is_none());

        c.toggle_play_pause().unwrap();
        let retry = c.pending_request().unwrap();
        assert_ne!(retry, request);
        assert!(c.stream_ready(retry));
        assert_eq!(c.status(), PlaybackStatus::Playing);
        assert_eq!(c.transport().outstanding(), 1);
        assert_eq!(c.cache().history(), &[station("A")]);
    }
}
