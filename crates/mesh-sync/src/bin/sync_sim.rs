//! Headless sync simulator
//!
//! Drives a coordinator with four simulated decks through a scripted set of
//! play and sync changes, logging who leads and the master beat phase.
//!
//! ## Command line flags
//!
//! - `--config <path>`: sync config to load (default: the mesh collection folder)
//! - `--save`: write the config back on exit, like the player does at shutdown
//!
//! Set RUST_LOG=debug to see every election step.

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::Result;

use mesh_sync::config::default_config_path;
use mesh_sync::{
    command_channel, ControlBus, DeckControls, DeckId, DeckRateControl, RateControl, SyncCommand,
    SyncConfig, SyncCoordinator, SyncMode,
};

/// Interleaved stereo samples per buffer (256 frames)
const BUFFER_SAMPLES: usize = 512;
const TOTAL_BUFFERS: usize = 1000;
const REPORT_EVERY: usize = 100;

/// Track tempos loaded on decks 1-4
const TRACK_BPMS: [f64; 4] = [128.0, 126.0, 130.0, 124.0];

/// A deck as the playback engine would drive it
struct SimDeck {
    rate: Arc<DeckRateControl>,
    controls: DeckControls,
}

impl SimDeck {
    /// Advance playback by one buffer and publish the deck's live values
    fn tick(&self, sync: &mut SyncCoordinator, sample_rate: f64) {
        if !self.controls.is_playing() {
            return;
        }
        let file_bpm = self.rate.file_bpm();
        let rate = if self.rate.sync_mode().is_enabled() && file_bpm > 0.0 {
            sync.master_bpm() / file_bpm
        } else {
            1.0
        };
        let bpm = file_bpm * rate;
        let samples_per_beat = sample_rate * 60.0 / bpm;
        let frames = (BUFFER_SAMPLES / 2) as f64;
        let beat_distance = (self.controls.beat_distance.get() + frames / samples_per_beat).fract();

        sync.publish(&self.controls.rate_engine, rate);
        sync.publish(&self.controls.bpm, bpm);
        sync.publish(&self.controls.beat_distance, beat_distance);
    }
}

/// Commands the "UI" sends at a given buffer index
fn script(buffer: usize) -> Vec<SyncCommand> {
    let deck = DeckId::new;
    match buffer {
        0 => vec![
            SyncCommand::RequestSync { deck: deck(0) },
            SyncCommand::SetDeckPlaying { deck: deck(0), playing: true },
        ],
        200 => vec![
            SyncCommand::RequestSync { deck: deck(1) },
            SyncCommand::SetDeckPlaying { deck: deck(1), playing: true },
        ],
        400 => vec![SyncCommand::SetDeckPlaying { deck: deck(0), playing: false }],
        500 => vec![SyncCommand::SetRateSlider { deck: deck(1), bpm: 127.0 }],
        600 => vec![
            SyncCommand::RequestSyncMode { deck: deck(2), mode: SyncMode::Master },
            SyncCommand::SetDeckPlaying { deck: deck(2), playing: true },
        ],
        800 => vec![SyncCommand::RequestSyncMode { deck: deck(2), mode: SyncMode::None }],
        _ => Vec::new(),
    }
}

fn main() -> Result<()> {
    let args: Vec<String> = std::env::args().collect();
    let config_path = args
        .iter()
        .position(|arg| arg == "--config")
        .and_then(|idx| args.get(idx + 1))
        .map(PathBuf::from)
        .unwrap_or_else(default_config_path);
    let save_on_exit = args.iter().any(|arg| arg == "--save");

    // Initialize logger - set RUST_LOG=debug for verbose output
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info"))
        .format_timestamp_millis()
        .init();

    log::info!("sync-sim starting up");

    let config = SyncConfig::load(&config_path);
    let sample_rate = config.sample_rate as f64;

    let bus = Arc::new(ControlBus::with_queue_capacity(config.external_queue_capacity));
    let mut sync = SyncCoordinator::new(Arc::clone(&bus), config.clone());
    let (mut tx, mut rx) = command_channel(config.command_queue_capacity);
    let handle = sync.handle();

    let decks: Vec<SimDeck> = TRACK_BPMS
        .iter()
        .enumerate()
        .map(|(idx, &bpm)| {
            let rate = Arc::new(DeckRateControl::new(DeckId::new(idx)));
            rate.load(bpm);
            sync.add_deck(rate.clone());
            let controls = DeckControls::register(&bus, &rate.group());
            SimDeck { rate, controls }
        })
        .collect();

    for buffer in 0..TOTAL_BUFFERS {
        for command in script(buffer) {
            if tx.push(command).is_err() {
                log::warn!("sync-sim: command queue full, dropping {:?}", command);
            }
        }

        sync.process(&mut rx, BUFFER_SAMPLES);
        for deck in &decks {
            deck.tick(&mut sync, sample_rate);
        }

        if buffer % REPORT_EVERY == 0 {
            let snapshot = sync.snapshot();
            log::info!(
                "buffer {:4}: master {} | {:.2} BPM | beat {:.3} | slider {:.2}",
                buffer,
                snapshot.source,
                snapshot.master_bpm,
                snapshot.beat_distance,
                handle.rate_slider()
            );
        }
    }

    for deck in &decks {
        log::info!(
            "{}: mode {:?}, playing {}",
            deck.rate.deck(),
            deck.rate.sync_mode(),
            deck.controls.is_playing()
        );
    }

    if save_on_exit {
        sync.persisted_config().save(&config_path)?;
    }

    log::info!("sync-sim done");
    Ok(())
}
