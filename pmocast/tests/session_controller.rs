//! Drives a full session against an in-process receiver.

use std::sync::Arc;
use std::time::Duration;

use crossbeam_channel::Receiver;
use pmocast::{
    AdapterError, DeviceId, DeviceNotification, MediaDescriptor, MediaRootResolver, MediaStatus,
    MemoryDevice, PlayerState, SessionController, SessionEvent, SessionSnapshot, Track,
};

const TIMEOUT: Duration = Duration::from_secs(2);

struct Harness {
    controller: SessionController,
    events: Receiver<SessionEvent>,
    device: Arc<MemoryDevice>,
}

impl Harness {
    /// Controller with one registered device, not connected yet.
    fn new() -> Self {
        let resolver = Arc::new(MediaRootResolver::new("/music", "127.0.0.1", 8090));
        let controller =
            SessionController::with_options("pmocast-test", "TESTAPP", resolver).unwrap();
        let events = controller.subscribe();
        let device = Arc::new(MemoryDevice::new("kitchen", "Kitchen"));
        controller.device_discovered(device.clone()).unwrap();
        let harness = Harness {
            controller,
            events,
            device,
        };
        harness.wait_for(|e| matches!(e, SessionEvent::DevicesChanged(_)).then_some(()));
        harness
    }

    fn connected() -> Self {
        let harness = Self::new();
        harness.controller.connect(DeviceId::new("kitchen")).unwrap();
        harness.wait_for(|e| matches!(e, SessionEvent::Connected { .. }).then_some(()));
        harness
    }

    /// Next event other than `Busy`.
    fn next(&self) -> SessionEvent {
        loop {
            let event = self.events.recv_timeout(TIMEOUT).expect("no event");
            if event != SessionEvent::Busy {
                return event;
            }
        }
    }

    fn wait_for<T>(&self, mut pick: impl FnMut(SessionEvent) -> Option<T>) -> T {
        loop {
            if let Some(found) = pick(self.next()) {
                return found;
            }
        }
    }

    fn queue(&self) -> SessionSnapshot {
        self.wait_for(|e| match e {
            SessionEvent::QueueChanged(snapshot) => Some(snapshot),
            _ => None,
        })
    }

    fn track_changed(&self) -> Track {
        self.wait_for(|e| match e {
            SessionEvent::TrackChanged(track) => Some(track),
            _ => None,
        })
    }

    fn error(&self) -> String {
        self.wait_for(|e| match e {
            SessionEvent::Error(message) => Some(message),
            _ => None,
        })
    }

    /// Plays `names` and waits for the first track to start.
    fn play(&self, names: &[&str]) -> SessionSnapshot {
        self.controller
            .play(names.iter().map(|n| track(n)).collect())
            .unwrap();
        let snapshot = self.queue();
        self.track_changed();
        snapshot
    }

    fn resync(&self) -> SessionSnapshot {
        self.controller.resync().unwrap();
        self.queue()
    }
}

fn track(name: &str) -> Track {
    Track::new("Artist", "Album", name, format!("/music/{name}.flac"))
}

fn names(snapshot: &SessionSnapshot) -> Vec<String> {
    snapshot
        .tracks
        .iter()
        .map(|q| q.track.name.clone())
        .collect()
}

#[test]
fn test_play_replaces_queue_and_announces_track() {
    let h = Harness::connected();
    h.controller.play(vec![track("A"), track("B")]).unwrap();

    let snapshot = h.queue();
    assert_eq!(names(&snapshot), ["A", "B"]);
    assert!(!snapshot.desynchronized);
    assert_eq!(h.track_changed().name, "A");
    assert_eq!(h.device.running_app().as_deref(), Some("TESTAPP"));
}

#[test]
fn test_same_track_twice_stays_two_entries() {
    let h = Harness::connected();
    let snapshot = h.play(&["A", "A"]);
    assert_eq!(snapshot.len(), 2);
    let second = snapshot.tracks[1].correlation;
    assert_ne!(snapshot.tracks[0].correlation, second);

    h.controller.remove(0).unwrap();
    let snapshot = h.queue();
    assert_eq!(snapshot.len(), 1);
    assert_eq!(snapshot.tracks[0].correlation, second);
}

#[test]
fn test_queue_next_and_last_follow_receiver_order() {
    let h = Harness::connected();
    h.play(&["A", "B"]);

    h.controller.queue_next(vec![track("X")]).unwrap();
    assert_eq!(names(&h.queue()), ["A", "X", "B"]);

    h.controller.queue_last(vec![track("Z")]).unwrap();
    assert_eq!(names(&h.queue()), ["A", "X", "B", "Z"]);
    assert_eq!(h.device.queue_titles(), ["A", "X", "B", "Z"]);
}

#[test]
fn test_queue_next_on_last_track_appends() {
    let h = Harness::connected();
    h.play(&["A"]);
    h.controller.queue_next(vec![track("B")]).unwrap();
    assert_eq!(names(&h.queue()), ["A", "B"]);
}

#[test]
fn test_queue_last_on_empty_session_loads() {
    let h = Harness::connected();
    h.controller.queue_last(vec![track("A")]).unwrap();
    assert_eq!(names(&h.queue()), ["A"]);
    assert_eq!(h.track_changed().name, "A");
    assert!(h.device.calls().contains(&"load"));
}

#[test]
fn test_resync_is_idempotent() {
    let h = Harness::connected();
    h.play(&["A", "B", "C"]);
    let first = h.resync();
    let second = h.resync();
    assert_eq!(first, second);
    assert!(!first.desynchronized);
    assert_eq!(first.current_track.map(|t| t.name), Some("A".to_string()));
}

#[test]
fn test_unknown_remote_item_flags_desync() {
    let h = Harness::connected();
    h.play(&["A", "B"]);

    let foreign = MediaDescriptor::tagged(
        "http://127.0.0.1:8090/other.flac",
        &track("other"),
        &pmocast::CorrelationId::mint(),
    );
    h.device.inject_foreign_item(foreign);

    let snapshot = h.resync();
    assert!(snapshot.desynchronized);
    assert_eq!(names(&snapshot), ["A", "B"]);
}

#[test]
fn test_receiver_dropping_tags_flags_desync() {
    let h = Harness::connected();
    h.device.set_strip_custom_data(true);
    h.controller.play(vec![track("A")]).unwrap();
    let snapshot = h.queue();
    assert!(snapshot.desynchronized);
    assert!(snapshot.is_empty());
    assert_eq!(h.error(), "Playback error: No current track");
}

#[test]
fn test_jump_uses_relative_offsets() {
    let h = Harness::connected();
    let snapshot = h.play(&["A", "B", "C"]);
    let ids: Vec<_> = snapshot.tracks.iter().map(|q| q.correlation).collect();

    h.controller.jump_to(ids[2]).unwrap();
    assert_eq!(h.track_changed().name, "C");

    h.controller.jump_to(ids[0]).unwrap();
    assert_eq!(h.track_changed().name, "A");

    // unknown entry: offset 0, current track restarts
    h.controller.jump_to(pmocast::CorrelationId::mint()).unwrap();
    assert_eq!(h.track_changed().name, "A");
}

#[test]
fn test_remove_prunes_only_the_removed_entry() {
    let h = Harness::connected();
    h.play(&["A", "B", "C"]);
    h.controller.remove(1).unwrap();
    let snapshot = h.queue();
    assert_eq!(names(&snapshot), ["A", "C"]);
    assert_eq!(h.device.queue_titles(), ["A", "C"]);
}

#[test]
fn test_remove_before_synchronization_is_rejected() {
    let h = Harness::connected();
    h.controller.remove(0).unwrap();
    assert_eq!(
        h.error(),
        "Playback error: Queue entry 0 is not synchronized with the device yet"
    );
    assert!(!h.device.calls().contains(&"remove_by_ids"));
}

#[test]
fn test_stop_clears_without_push() {
    let h = Harness::connected();
    h.play(&["A", "B"]);
    h.controller.stop().unwrap();

    let snapshot = h.queue();
    assert!(snapshot.is_empty());
    assert_eq!(snapshot.current_track, None);
    assert_eq!(h.next(), SessionEvent::PlaybackStopped);
    assert_eq!(h.device.queue_len(), 0);
}

#[test]
fn test_failed_command_leaves_state_untouched() {
    let h = Harness::connected();
    let before = h.resync();
    h.play(&["A", "B", "C"]);
    let before_failure = h.resync();
    assert_ne!(before, before_failure);

    h.device.fail_next(AdapterError::Timeout);
    h.controller.remove(1).unwrap();
    assert_eq!(h.error(), "Playback error: request timed out");

    h.device.fail_next(AdapterError::Io("broken pipe".into()));
    h.controller.stop().unwrap();
    assert_eq!(h.error(), "Playback error: I/O error: broken pipe");

    assert_eq!(h.resync(), before_failure);
}

#[test]
fn test_failed_refetch_after_append_keeps_previous_queue() {
    let h = Harness::connected();
    h.play(&["A", "B"]);
    let before = h.resync();

    h.device.fail_call("queue_items", AdapterError::Timeout);
    h.controller.queue_last(vec![track("C")]).unwrap();
    assert_eq!(h.error(), "Playback error: request timed out");
    assert_eq!(h.device.queue_titles(), ["A", "B", "C"]);

    // C reached the receiver but its tag was never committed
    let after = h.resync();
    assert_eq!(after.tracks, before.tracks);
    assert!(after.desynchronized);
}

#[test]
fn test_toggle_playback_follows_device_response() {
    let h = Harness::connected();
    h.play(&["A"]);
    h.controller.toggle_playback().unwrap();
    assert_eq!(h.next(), SessionEvent::PlaybackPaused);
    assert_eq!(h.device.status().player_state, PlayerState::Paused);
    h.controller.toggle_playback().unwrap();
    assert_eq!(h.next(), SessionEvent::PlaybackPlaying);
}

#[test]
fn test_toggle_after_queue_finished_keeps_queue() {
    let h = Harness::connected();
    h.play(&["A"]);
    h.device.finish_current();
    assert_eq!(h.next(), SessionEvent::PlaybackFinished);

    h.controller.toggle_playback().unwrap();
    h.controller.resync().unwrap();
    match h.next() {
        SessionEvent::QueueChanged(snapshot) => assert_eq!(names(&snapshot), ["A"]),
        other => panic!("unexpected event {other:?}"),
    }
    assert_eq!(h.device.status().player_state, PlayerState::Idle);
}

#[test]
fn test_next_previous_and_finish() {
    let h = Harness::connected();
    h.play(&["A", "B"]);
    h.controller.next().unwrap();
    assert_eq!(h.track_changed().name, "B");
    h.controller.previous().unwrap();
    assert_eq!(h.track_changed().name, "A");

    h.device.finish_current();
    assert_eq!(h.track_changed().name, "B");
    h.device.finish_current();
    assert_eq!(h.next(), SessionEvent::PlaybackFinished);

    h.controller.next().unwrap();
    assert_eq!(h.error(), "Playback error: invalid request (no next item)");
}

#[test]
fn test_device_error_push_is_reported() {
    let h = Harness::connected();
    h.device.emit(DeviceNotification::MediaError(pmocast::DeviceError::new(
        "LOAD_FAILED",
        None,
        None,
    )));
    assert_eq!(h.error(), "Playback error: load failed");
}

#[test]
fn test_commands_without_session_are_rejected() {
    let h = Harness::new();
    h.controller.play(vec![track("A")]).unwrap();
    assert_eq!(h.error(), "No connected device");
    h.controller.disconnect().unwrap();
    assert_eq!(h.error(), "No connected device");
}

#[test]
fn test_second_connection_is_rejected() {
    let h = Harness::connected();
    let salon = Arc::new(MemoryDevice::new("salon", "Salon"));
    h.controller.device_discovered(salon.clone()).unwrap();
    h.controller.connect(DeviceId::new("salon")).unwrap();
    assert_eq!(h.error(), "Kitchen already connected");
    assert!(salon.calls().is_empty());
}

#[test]
fn test_failed_connection_reports_disconnected() {
    let h = Harness::new();
    h.device.fail_connect(AdapterError::Timeout);
    h.controller.connect(DeviceId::new("kitchen")).unwrap();
    assert_eq!(
        h.next(),
        SessionEvent::Disconnected {
            device_id: DeviceId::new("kitchen"),
            reason: Some("Playback error: request timed out".into()),
        }
    );
    assert!(!h.device.is_connected());

    h.controller.connect(DeviceId::new("kitchen")).unwrap();
    assert!(matches!(h.next(), SessionEvent::Connected { .. }));
}

#[test]
fn test_unknown_device_reports_disconnected() {
    let h = Harness::new();
    h.controller.connect(DeviceId::new("attic")).unwrap();
    assert_eq!(
        h.next(),
        SessionEvent::Disconnected {
            device_id: DeviceId::new("attic"),
            reason: Some("Unknown device: attic".into()),
        }
    );
}

#[test]
fn test_removing_connected_device_tears_session_down() {
    let h = Harness::connected();
    h.play(&["A"]);
    h.controller.device_removed(DeviceId::new("kitchen")).unwrap();
    assert_eq!(
        h.next(),
        SessionEvent::Disconnected {
            device_id: DeviceId::new("kitchen"),
            reason: Some("device not reachable".into()),
        }
    );
    assert_eq!(h.next(), SessionEvent::DevicesChanged(Vec::new()));
    assert!(!h.device.is_connected());
    assert!(!h.device.has_sink());
}

#[test]
fn test_dead_connection_tears_session_down() {
    let h = Harness::connected();
    h.device.drop_connection();
    assert_eq!(
        h.next(),
        SessionEvent::Disconnected {
            device_id: DeviceId::new("kitchen"),
            reason: Some("connection dropped".into()),
        }
    );
    h.controller.play(vec![track("A")]).unwrap();
    assert_eq!(h.error(), "No connected device");
}

#[test]
fn test_stale_notifications_are_ignored() {
    let h = Harness::connected();
    let old_sink = h.device.sink().expect("sink attached");

    h.controller.disconnect().unwrap();
    assert!(matches!(h.next(), SessionEvent::Disconnected { reason: None, .. }));
    h.controller.connect(DeviceId::new("kitchen")).unwrap();
    assert!(matches!(h.next(), SessionEvent::Connected { .. }));

    old_sink.notify(DeviceNotification::MediaStatus(MediaStatus {
        player_state: PlayerState::Paused,
        ..Default::default()
    }));
    old_sink.notify(DeviceNotification::ConnectionDead);
    h.device.emit(DeviceNotification::MediaError(pmocast::DeviceError::new(
        "INVALID_REQUEST",
        None,
        None,
    )));

    assert_eq!(h.next(), SessionEvent::Error("Playback error: invalid request".into()));
    assert!(h.device.is_connected());
}

#[test]
fn test_shutdown_disconnects_active_session() {
    let h = Harness::connected();
    let device = h.device.clone();
    h.controller.shutdown();
    assert!(!device.is_connected());
    assert_eq!(device.running_app(), None);
    assert!(matches!(
        h.events.recv_timeout(TIMEOUT),
        Ok(SessionEvent::Disconnected { reason: None, .. })
    ));
}
