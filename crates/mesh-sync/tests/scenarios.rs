//! End-to-end sync scenarios through the public API

use std::sync::Arc;

use mesh_sync::{
    command_channel, ControlBus, DeckId, DeckRateControl, RateControl, SyncCommand, SyncConfig,
    SyncCoordinator, SyncMode, SyncSource,
};

const EPSILON: f64 = 1e-9;

fn setup(bpms: &[f64]) -> (Arc<ControlBus>, SyncCoordinator, Vec<Arc<DeckRateControl>>) {
    let bus = Arc::new(ControlBus::new());
    let mut sync = SyncCoordinator::new(Arc::clone(&bus), SyncConfig::default());
    let rates = bpms
        .iter()
        .enumerate()
        .map(|(idx, &bpm)| {
            let rate = Arc::new(DeckRateControl::new(DeckId(idx)));
            if bpm > 0.0 {
                rate.load(bpm);
            }
            sync.add_deck(rate.clone());
            rate
        })
        .collect();
    (bus, sync, rates)
}

/// Invariants that must hold after every operation
fn check_invariants(sync: &SyncCoordinator, decks: usize) {
    let subscribed: Vec<DeckId> = (0..decks)
        .map(DeckId)
        .filter(|&deck| sync.is_subscribed(deck))
        .collect();

    match sync.sync_source() {
        SyncSource::Deck(deck) => {
            let rate = sync.rate_control(deck).expect("authority is registered");
            assert!(rate.has_loaded_buffer(), "{} leads without a track", deck);
            assert_eq!(subscribed, vec![deck]);
            assert!(!sync.internal_clock_enabled());
        }
        SyncSource::Internal => {
            assert!(subscribed.is_empty());
            assert!(sync.internal_clock_enabled());
        }
        SyncSource::None => {
            assert!(subscribed.is_empty());
            assert!(!sync.internal_clock_enabled());
        }
    }

    let distance = sync.internal_beat_distance();
    assert!((0.0..1.0).contains(&distance), "beat distance {}", distance);
    assert!(sync.samples_per_beat() > 0.0);
}

#[test]
fn test_internal_clock_continues_from_outgoing_master() {
    let (_bus, mut sync, _rates) = setup(&[128.0, 128.0]);
    let (mut tx, mut rx) = command_channel(16);

    tx.push(SyncCommand::RequestSync { deck: DeckId(0) }).unwrap();
    tx.push(SyncCommand::SetDeckPlaying { deck: DeckId(0), playing: true })
        .unwrap();
    sync.process(&mut rx, 0);
    assert_eq!(sync.master_deck(), Some(DeckId(0)));

    let deck0 = sync.deck_controls(DeckId(0)).unwrap().clone();
    sync.publish(&deck0.beat_distance, 0.6);
    assert!((sync.master_beat_distance() - 0.6).abs() < EPSILON);

    tx.push(SyncCommand::RequestSync { deck: DeckId(1) }).unwrap();
    tx.push(SyncCommand::SetDeckPlaying { deck: DeckId(1), playing: true })
        .unwrap();
    sync.process(&mut rx, 0);

    assert_eq!(sync.sync_source(), SyncSource::Internal);
    assert!((sync.internal_beat_distance() - 0.6).abs() < EPSILON);
    assert_eq!(sync.master_bpm(), 128.0);

    // 128 BPM at 44.1kHz: 20671.875 frames per beat
    sync.process(&mut rx, 4096);
    let expected = 0.6 + 2048.0 / 20671.875;
    assert!((sync.master_beat_distance() - expected).abs() < EPSILON);

    // Deck values no longer reach the master outputs
    sync.publish(&deck0.beat_distance, 0.1);
    assert!((sync.master_beat_distance() - expected).abs() < EPSILON);
}

#[test]
fn test_slider_and_toggle_from_ui_thread() {
    let (_bus, mut sync, rates) = setup(&[124.0]);
    let (_tx, mut rx) = command_channel(4);
    let ui = sync.handle();

    ui.set_internal_clock(true);
    sync.process(&mut rx, 0);
    assert_eq!(sync.sync_source(), SyncSource::Internal);

    std::thread::spawn(move || ui.set_rate_slider(174.0))
        .join()
        .unwrap();
    sync.process(&mut rx, 0);
    assert_eq!(sync.master_bpm(), 174.0);

    // Turning the internal clock off with no playing deck leaves nobody in charge
    rates[0].set_sync_mode(SyncMode::Follower);
    sync.handle().set_internal_clock(false);
    sync.process(&mut rx, 0);
    assert_eq!(sync.sync_source(), SyncSource::None);
}

#[test]
fn test_slider_tempo_survives_restart() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("sync.yaml");

    {
        let (_bus, mut sync, _rates) = setup(&[128.0]);
        sync.set_rate_slider(DeckId(0), 136.0).unwrap();
        sync.persisted_config().save(&path).unwrap();
    }

    let config = SyncConfig::load(&path);
    assert_eq!(config.default_bpm, 136.0);

    let sync = SyncCoordinator::new(Arc::new(ControlBus::new()), config);
    assert_eq!(sync.master_bpm(), 136.0);
    assert_eq!(sync.rate_slider(), 136.0);
}

#[test]
fn test_invariants_hold_under_request_sequence() {
    // Deck 3 never has a track loaded
    let bpms = [128.0, 140.0, 96.0, 0.0];
    let (_bus, mut sync, _rates) = setup(&bpms);
    let (mut tx, mut rx) = command_channel(64);
    let ui = sync.handle();

    // Deterministic LCG so failures are reproducible
    let mut state: u64 = 0x5eed;
    let mut next = |bound: u64| {
        state = state
            .wrapping_mul(6364136223846793005)
            .wrapping_add(1442695040888963407);
        (state >> 33) % bound
    };

    for _ in 0..2000 {
        let deck = DeckId(next(bpms.len() as u64) as usize);
        match next(7) {
            0 => {
                let mode = match next(3) {
                    0 => SyncMode::None,
                    1 => SyncMode::Follower,
                    _ => SyncMode::Master,
                };
                tx.push(SyncCommand::RequestSyncMode { deck, mode }).unwrap();
            }
            1 => tx.push(SyncCommand::RequestSync { deck }).unwrap(),
            2 | 3 => {
                let playing = next(2) == 0;
                tx.push(SyncCommand::SetDeckPlaying { deck, playing }).unwrap();
            }
            4 => {
                let bpm = 60.0 + next(120) as f64;
                tx.push(SyncCommand::SetRateSlider { deck, bpm }).unwrap();
            }
            5 => ui.set_internal_clock(next(2) == 0),
            _ => {
                if let Some(controls) = sync.deck_controls(deck).cloned() {
                    let phase = next(1000) as f64 / 1000.0;
                    sync.publish(&controls.beat_distance, phase);
                    sync.publish(&controls.rate_engine, 0.9 + next(20) as f64 / 100.0);
                }
            }
        }

        sync.process(&mut rx, 1024);
        check_invariants(&sync, bpms.len());
    }
}

#[test]
fn test_unknown_deck_command_is_ignored() {
    let (_bus, mut sync, _rates) = setup(&[128.0]);
    let (mut tx, mut rx) = command_channel(4);

    tx.push(SyncCommand::RequestSyncMode { deck: DeckId(9), mode: SyncMode::Master })
        .unwrap();
    sync.process(&mut rx, 1024);

    assert_eq!(sync.sync_source(), SyncSource::None);
    assert!(!sync.explicit_master_selected());
}
