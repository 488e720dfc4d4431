//! Master sync coordinator
//!
//! Decides who holds timing authority (the internal clock or one deck),
//! keeps the coordinator subscribed to exactly that authority's live values
//! and republishes master tempo and beat distance for followers.
//!
//! Everything here runs on the audio thread. Other threads talk to the
//! coordinator through the control bus (slider, toggle, sample rate) or the
//! command ring (mode requests, play state).

use std::sync::Arc;

use crate::config::SyncConfig;
use crate::control::{ChangeOrigin, ControlBus, ControlId, ControlKey, ControlRef, Connections};
use crate::deck::{DeckControls, RateControl};
use crate::error::{SyncError, SyncResult};
use crate::types::{DeckId, SyncMode, SyncSource, MASTER_GROUP};

use super::clock::InternalClock;
use super::registry::{DeckEntry, DeckRegistry};

/// Bus item: master tempo followers match
pub const SYNC_BPM: &str = "sync_bpm";
/// Bus item: master beat distance followers align to
pub const MASTER_BEAT_DISTANCE: &str = "beat_distance";
/// Bus item: engine sample rate
pub const SAMPLE_RATE: &str = "samplerate";
/// Bus item: internal clock on/off toggle
pub const SYNC_MASTER: &str = "sync_master";
/// Bus item: tempo slider for the internal clock
pub const SYNC_SLIDER: &str = "sync_slider";

/// Tempo differences below this are treated as equal
const BPM_EPSILON: f64 = 1e-9;

/// Handler run when a connected control changes
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Reaction {
    /// Authority deck's playback rate
    SourceRateEngine,
    /// Authority deck's effective tempo
    SourceBpm,
    /// Authority deck's beat phase
    SourceBeatDistance,
    /// Master tempo, from any writer
    MasterBpm,
    SampleRate,
    /// Internal clock toggle
    InternalMaster,
    /// Tempo slider, from any writer
    RateSlider,
}

/// The coordinator's own controls under `[Master]`
#[derive(Debug, Clone)]
pub struct MasterControls {
    pub bpm: ControlRef,
    pub beat_distance: ControlRef,
    pub sample_rate: ControlRef,
    pub internal_master: ControlRef,
    pub rate_slider: ControlRef,
}

impl MasterControls {
    /// Register (or resolve) the master controls, seeding them from config
    pub fn register(bus: &ControlBus, config: &SyncConfig) -> Self {
        let default_bpm = config.clamp_to_slider(config.default_bpm);
        let controls = Self {
            bpm: bus.register(ControlKey::new(MASTER_GROUP, SYNC_BPM), default_bpm),
            beat_distance: bus.register(ControlKey::new(MASTER_GROUP, MASTER_BEAT_DISTANCE), 0.0),
            sample_rate: bus.register(
                ControlKey::new(MASTER_GROUP, SAMPLE_RATE),
                config.sample_rate as f64,
            ),
            internal_master: bus.register(ControlKey::new(MASTER_GROUP, SYNC_MASTER), 0.0),
            rate_slider: bus.register(ControlKey::new(MASTER_GROUP, SYNC_SLIDER), default_bpm),
        };
        let sample_rate = controls.sample_rate.get();
        if sample_rate.is_nan() || sample_rate <= 0.0 {
            controls.sample_rate.set(config.sample_rate as f64);
        }
        controls
    }
}

/// Point-in-time view of sync state for display
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SyncSnapshot {
    pub source: SyncSource,
    pub explicit_master_selected: bool,
    pub master_bpm: f64,
    pub beat_distance: f64,
    pub samples_per_beat: f64,
    pub internal_clock_enabled: bool,
    pub rate_slider: f64,
}

fn subscribe(connections: &mut Connections<Reaction>, controls: &DeckControls) {
    connections.connect(controls.rate_engine.id(), Reaction::SourceRateEngine);
    connections.connect(controls.bpm.id(), Reaction::SourceBpm);
    connections.connect(controls.beat_distance.id(), Reaction::SourceBeatDistance);
}

fn unsubscribe(connections: &mut Connections<Reaction>, controls: &DeckControls) {
    connections.disconnect(controls.rate_engine.id(), Reaction::SourceRateEngine);
    connections.disconnect(controls.bpm.id(), Reaction::SourceBpm);
    connections.disconnect(controls.beat_distance.id(), Reaction::SourceBeatDistance);
}

/// Master sync state machine
///
/// Owned by the audio thread; every method takes `&mut self` and returns
/// without blocking or allocating once decks are registered.
pub struct SyncCoordinator {
    bus: Arc<ControlBus>,
    config: SyncConfig,
    decks: DeckRegistry,
    source: SyncSource,
    /// Set by an explicit Master request; cleared by the next election
    explicit_master_selected: bool,
    clock: InternalClock,
    master: MasterControls,
    connections: Connections<Reaction>,
}

impl SyncCoordinator {
    /// Create a coordinator publishing its controls on `bus`
    pub fn new(bus: Arc<ControlBus>, config: SyncConfig) -> Self {
        let master = MasterControls::register(&bus, &config);
        let clock = InternalClock::new(master.bpm.get(), master.sample_rate.get() as u32);

        // 4 master connections + 3 for the authority deck, with room to spare
        let mut connections = Connections::with_capacity(16);
        connections.connect(master.bpm.id(), Reaction::MasterBpm);
        connections.connect(master.sample_rate.id(), Reaction::SampleRate);
        connections.connect(master.internal_master.id(), Reaction::InternalMaster);
        connections.connect(master.rate_slider.id(), Reaction::RateSlider);

        log::info!(
            "SyncCoordinator: created (master bpm {:.2}, sample rate {}, {:.3} samples/beat)",
            master.bpm.get(),
            clock.sample_rate(),
            clock.samples_per_beat()
        );

        Self {
            bus,
            config,
            decks: DeckRegistry::new(),
            source: SyncSource::None,
            explicit_master_selected: false,
            clock,
            master,
            connections,
        }
    }

    // ─────────────────────────────────────────────────────────────
    // Registration
    // ─────────────────────────────────────────────────────────────

    /// Register a deck's rate controller
    ///
    /// Re-registering a deck replaces its controller in place and returns
    /// the previous one. The deck keeps its sync mode, and if it holds
    /// authority the coordinator rebinds to the new controller.
    pub fn add_deck(&mut self, controller: Arc<dyn RateControl>) -> Option<Arc<dyn RateControl>> {
        let deck = controller.deck();
        let controls = DeckControls::register(&self.bus, &controller.group());
        let entry = DeckEntry {
            controller,
            controls,
        };

        let Some(previous) = self.decks.insert(entry.clone()) else {
            log::info!("SyncCoordinator: registered {} ({})", deck, entry.controller.group());
            return None;
        };

        log::warn!(
            "SyncCoordinator::add_deck: {} already registered, replacing its rate controller",
            deck
        );
        entry.controller.set_sync_mode(previous.sync_mode());

        if self.source == SyncSource::Deck(deck) {
            unsubscribe(&mut self.connections, &previous.controls);
            self.source = SyncSource::None;
            if !self.bind_authority(deck) {
                entry.controller.set_sync_mode(SyncMode::Follower);
                self.elect_new_authority(SyncSource::Deck(deck));
            }
        }

        Some(previous.controller)
    }

    // ─────────────────────────────────────────────────────────────
    // Authority
    // ─────────────────────────────────────────────────────────────

    /// Make `deck` the timing authority
    ///
    /// Fails without touching the current authority if the deck is unknown
    /// or has nothing loaded.
    pub fn bind_authority(&mut self, deck: DeckId) -> bool {
        if self.source == SyncSource::Deck(deck) {
            return true;
        }

        let Some(entry) = self.decks.get(deck) else {
            log::warn!("SyncCoordinator::bind_authority: {} is not registered", deck);
            return false;
        };
        if !entry.controller.has_loaded_buffer() {
            log::warn!(
                "SyncCoordinator::bind_authority: {} has no track loaded, cannot be master",
                deck
            );
            return false;
        }
        let controls = entry.controls.clone();

        self.release_authority();

        subscribe(&mut self.connections, &controls);
        self.source = SyncSource::Deck(deck);
        log::info!("SyncCoordinator: {} is now sync master", deck);

        self.master.internal_master.set_bool(false);

        // Pull current values so followers don't wait for the next change
        self.on_source_rate_engine(controls.rate_engine.get());
        self.on_source_bpm(controls.bpm.get());
        self.sync_phase_from(&controls);
        true
    }

    /// Drop the current authority, leaving the source as None
    ///
    /// A deck authority is unsubscribed and demoted to Follower.
    pub fn release_authority(&mut self) {
        match self.source {
            SyncSource::Deck(deck) => {
                if let Some(entry) = self.decks.get(deck) {
                    unsubscribe(&mut self.connections, &entry.controls);
                    entry.controller.set_sync_mode(SyncMode::Follower);
                }
                log::debug!("SyncCoordinator: released {}", deck);
            }
            SyncSource::Internal => {
                self.master.internal_master.set_bool(false);
                log::debug!("SyncCoordinator: released internal clock");
            }
            SyncSource::None => {}
        }
        self.source = SyncSource::None;
    }

    /// Hand authority to the internal clock
    pub fn activate_internal_clock(&mut self) {
        if self.source.is_internal() {
            return;
        }

        let master_bpm = self.master.bpm.get();
        if master_bpm > 0.0 {
            self.set_rate_slider_value(master_bpm);
        }

        // Continue from where the outgoing deck was in its beat
        if let Some(controls) = self.source_controls() {
            self.sync_phase_from(&controls);
        }

        self.release_authority();
        self.source = SyncSource::Internal;
        self.clock.set_tempo(self.master.bpm.get());
        self.master.internal_master.set_bool(true);
        log::info!(
            "SyncCoordinator: internal clock is now sync master at {:.2} BPM",
            self.master.bpm.get()
        );
    }

    /// Pick a new authority, never choosing `excluding`
    pub fn elect_new_authority(&mut self, excluding: SyncSource) {
        log::debug!("SyncCoordinator: electing new master (excluding {})", excluding);

        if excluding.is_internal() && self.source.is_internal() {
            self.release_authority();
        }

        let excluded_deck = excluding.deck();
        let mut flagged_master = None;
        let mut playing = 0;
        let mut candidate = None;

        for entry in self.decks.iter() {
            let deck = entry.deck();
            if Some(deck) == excluded_deck {
                continue;
            }
            match entry.sync_mode() {
                SyncMode::None => continue,
                SyncMode::Master => {
                    if entry.controller.has_loaded_buffer() {
                        flagged_master = Some(deck);
                        break;
                    }
                    log::debug!(
                        "SyncCoordinator: {} is flagged master but has no track, skipping",
                        deck
                    );
                    continue;
                }
                SyncMode::Follower => {}
            }
            if entry.controls.is_playing() {
                playing += 1;
                candidate = Some(deck);
            }
        }

        let adopted = match flagged_master {
            Some(deck) => self.bind_authority(deck),
            None => false,
        };

        if !adopted {
            let promoted = match candidate {
                Some(deck) if playing == 1 => self.promote(deck),
                _ => false,
            };

            if !promoted {
                if !excluding.is_internal() {
                    self.activate_internal_clock();
                } else if let Some(deck) = candidate.filter(|_| playing > 1) {
                    // Internal clock explicitly turned off: any playing deck will do
                    self.promote(deck);
                } else if self.source.is_none() {
                    log::info!("SyncCoordinator: no sync master available");
                }
            }
        }

        self.explicit_master_selected = false;
    }

    /// Bind `deck` and mark it Master
    fn promote(&mut self, deck: DeckId) -> bool {
        if !self.bind_authority(deck) {
            return false;
        }
        if let Some(entry) = self.decks.get(deck) {
            entry.controller.set_sync_mode(SyncMode::Master);
        }
        true
    }

    /// Mark `deck` Master and bind it, electing someone else if that fails
    fn promote_or_elect(&mut self, deck: DeckId) {
        if let Some(entry) = self.decks.get(deck) {
            entry.controller.set_sync_mode(SyncMode::Master);
        }
        if !self.bind_authority(deck) {
            if let Some(entry) = self.decks.get(deck) {
                entry.controller.set_sync_mode(SyncMode::Follower);
            }
            self.elect_new_authority(SyncSource::Deck(deck));
        }
    }

    // ─────────────────────────────────────────────────────────────
    // Deck requests
    // ─────────────────────────────────────────────────────────────

    /// Handle a deck asking for a specific sync mode
    pub fn request_sync_mode(&mut self, deck: DeckId, mode: SyncMode) -> SyncResult<()> {
        let controller = self.controller(deck)?;
        let was_authority = self.source == SyncSource::Deck(deck);

        log::debug!("SyncCoordinator: {} requests {:?}", deck, mode);

        match mode {
            SyncMode::Master => {
                self.explicit_master_selected = true;
                if self.bind_authority(deck) {
                    controller.set_sync_mode(SyncMode::Master);
                } else {
                    controller.set_sync_mode(SyncMode::Follower);
                    self.elect_new_authority(SyncSource::Deck(deck));
                }
            }
            SyncMode::Follower => {
                controller.set_sync_mode(SyncMode::Follower);
                if was_authority {
                    self.elect_new_authority(SyncSource::Deck(deck));
                } else if !self.explicit_master_selected {
                    self.follow(deck);
                }
            }
            SyncMode::None => {
                self.elect_new_authority(SyncSource::None);
                if self.source == SyncSource::Deck(deck) {
                    // Re-elected itself; a deck leaving sync can't keep leading
                    self.elect_new_authority(SyncSource::Deck(deck));
                }
                controller.set_sync_mode(SyncMode::None);
            }
        }
        Ok(())
    }

    /// Turn sync on for a deck, letting the coordinator pick its role
    pub fn request_sync(&mut self, deck: DeckId) -> SyncResult<()> {
        self.controller(deck)?;
        if self.source.is_none() {
            self.promote_or_elect(deck);
            Ok(())
        } else {
            self.request_sync_mode(deck, SyncMode::Follower)
        }
    }

    /// Re-evaluate authority after `deck` became a follower
    fn follow(&mut self, deck: DeckId) {
        match self.source {
            SyncSource::None => self.promote_or_elect(deck),
            SyncSource::Internal => {
                if self.decks.playing_sync_count() == 1 {
                    self.promote_or_elect(deck);
                }
            }
            SyncSource::Deck(_) => {
                if self.decks.playing_sync_count() > 1 {
                    self.activate_internal_clock();
                }
            }
        }
    }

    /// Record a play/pause transition and re-evaluate authority
    pub fn on_deck_playing_changed(&mut self, deck: DeckId, playing: bool) -> SyncResult<()> {
        let entry = self.decks.get(deck).ok_or(SyncError::UnknownDeck(deck))?;
        entry.controls.play.set_bool(playing);
        if !entry.sync_mode().is_enabled() {
            return Ok(());
        }
        let controls = entry.controls.clone();

        let count = self.decks.playing_sync_count();
        log::debug!(
            "SyncCoordinator: {} {} ({} playing sync decks)",
            deck,
            if playing { "started" } else { "stopped" },
            count
        );

        if count == 1 {
            self.sync_phase_from(&controls);
        } else if !self.explicit_master_selected {
            if count == 0 {
                self.promote(deck);
            } else {
                self.activate_internal_clock();
            }
        }
        Ok(())
    }

    /// A deck's rate slider moved while in sync: drives the master tempo
    pub fn set_rate_slider(&mut self, deck: DeckId, bpm: f64) -> SyncResult<()> {
        self.controller(deck)?;
        let bpm = self.config.clamp_to_slider(bpm);
        self.set_rate_slider_value(bpm);
        self.set_master_bpm(bpm);
        Ok(())
    }

    // ─────────────────────────────────────────────────────────────
    // Audio thread entry points
    // ─────────────────────────────────────────────────────────────

    /// Write a control from the audio thread and run its reactions
    pub fn publish(&mut self, control: &ControlRef, value: f64) {
        control.set(value);
        self.dispatch(control.id(), value, ChangeOrigin::Engine);
    }

    /// Report a new engine sample rate
    pub fn set_sample_rate(&mut self, sample_rate: u32) {
        let control = self.master.sample_rate.clone();
        self.publish(&control, sample_rate as f64);
    }

    /// Run reactions for values written by other threads since the last call
    pub fn process_external_changes(&mut self) {
        // Bounded so a busy writer can't keep the audio thread here
        let pending = self.bus.pending_external();
        for _ in 0..pending {
            let Some(change) = self.bus.pop_external() else {
                break;
            };
            self.dispatch(change.control, change.value, ChangeOrigin::External);
        }
    }

    /// Internal clock tick, once per audio buffer
    ///
    /// `buffer_samples` is the interleaved stereo sample count.
    pub fn advance(&mut self, buffer_samples: usize) {
        if !self.source.is_internal() {
            return;
        }
        let beat_distance = self.clock.advance(buffer_samples);
        self.master.beat_distance.set(beat_distance);
        log::trace!("SyncCoordinator: internal beat distance {:.4}", beat_distance);
    }

    // ─────────────────────────────────────────────────────────────
    // Reactions
    // ─────────────────────────────────────────────────────────────

    fn dispatch(&mut self, control: ControlId, value: f64, origin: ChangeOrigin) {
        for reaction in self.connections.listeners(control) {
            self.react(reaction, value, origin);
        }
    }

    fn react(&mut self, reaction: Reaction, value: f64, origin: ChangeOrigin) {
        log::trace!("SyncCoordinator: {:?} <- {} ({:?})", reaction, value, origin);
        match reaction {
            Reaction::SourceRateEngine => self.on_source_rate_engine(value),
            Reaction::SourceBpm => self.on_source_bpm(value),
            Reaction::SourceBeatDistance => {
                self.master.beat_distance.set(value);
                self.clock.set_beat_distance(value);
            }
            Reaction::MasterBpm => self.clock.set_tempo(value),
            Reaction::SampleRate => {
                if value.is_finite() && value >= 1.0 {
                    self.clock
                        .set_sample_rate(value as u32, self.master.bpm.get());
                } else {
                    log::error!("SyncCoordinator: ignoring invalid sample rate {}", value);
                }
            }
            Reaction::InternalMaster => {
                if value != 0.0 {
                    self.activate_internal_clock();
                } else if self.source.deck().is_none() {
                    self.release_authority();
                    self.elect_new_authority(SyncSource::Internal);
                }
            }
            Reaction::RateSlider => {
                let value = self.config.clamp_to_slider(value);
                if origin == ChangeOrigin::External {
                    // The engine may have moved the slider since; the queued write wins
                    self.master.rate_slider.set(value);
                }
                if self.source.is_internal()
                    && (self.master.bpm.get() - value).abs() > BPM_EPSILON
                {
                    self.set_master_bpm(value);
                }
            }
        }
    }

    fn on_source_rate_engine(&mut self, rate: f64) {
        let Some(file_bpm) = self
            .source
            .deck()
            .and_then(|deck| self.decks.get(deck))
            .map(|entry| entry.controller.file_bpm())
        else {
            return;
        };
        self.set_master_bpm(rate * file_bpm);
    }

    fn on_source_bpm(&mut self, bpm: f64) {
        if self.source.deck().is_some() && bpm > 0.0 {
            self.set_rate_slider_value(bpm);
        }
    }

    fn set_master_bpm(&mut self, bpm: f64) {
        let control = self.master.bpm.id();
        self.master.bpm.set(bpm);
        self.dispatch(control, bpm, ChangeOrigin::Engine);
    }

    fn set_rate_slider_value(&mut self, bpm: f64) {
        let bpm = self.config.clamp_to_slider(bpm);
        let control = self.master.rate_slider.id();
        self.master.rate_slider.set(bpm);
        self.dispatch(control, bpm, ChangeOrigin::Engine);
    }

    /// Align the internal clock and master beat distance with a deck's phase
    fn sync_phase_from(&mut self, controls: &DeckControls) {
        self.clock.set_beat_distance(controls.beat_distance.get());
        let beat_distance = self.clock.beat_distance();
        self.master.beat_distance.set(beat_distance);
        log::debug!(
            "SyncCoordinator: internal beat distance reset to {:.4} ({:.1} samples)",
            beat_distance,
            self.clock.position()
        );
    }

    // ─────────────────────────────────────────────────────────────
    // Queries
    // ─────────────────────────────────────────────────────────────

    fn controller(&self, deck: DeckId) -> SyncResult<Arc<dyn RateControl>> {
        self.decks
            .get(deck)
            .map(|entry| Arc::clone(&entry.controller))
            .ok_or(SyncError::UnknownDeck(deck))
    }

    fn source_controls(&self) -> Option<DeckControls> {
        self.source
            .deck()
            .and_then(|deck| self.decks.get(deck))
            .map(|entry| entry.controls.clone())
    }

    pub fn sync_source(&self) -> SyncSource {
        self.source
    }

    /// Deck currently holding authority
    pub fn master_deck(&self) -> Option<DeckId> {
        self.source.deck()
    }

    pub fn rate_control(&self, deck: DeckId) -> Option<&Arc<dyn RateControl>> {
        self.decks.get(deck).map(|entry| &entry.controller)
    }

    pub fn deck_controls(&self, deck: DeckId) -> Option<&DeckControls> {
        self.decks.get(deck).map(|entry| &entry.controls)
    }

    pub fn deck_count(&self) -> usize {
        self.decks.iter().count()
    }

    pub fn explicit_master_selected(&self) -> bool {
        self.explicit_master_selected
    }

    pub fn master_controls(&self) -> &MasterControls {
        &self.master
    }

    pub fn master_bpm(&self) -> f64 {
        self.master.bpm.get()
    }

    pub fn master_beat_distance(&self) -> f64 {
        self.master.beat_distance.get()
    }

    pub fn rate_slider(&self) -> f64 {
        self.master.rate_slider.get()
    }

    pub fn internal_clock_enabled(&self) -> bool {
        self.master.internal_master.get_bool()
    }

    pub fn samples_per_beat(&self) -> f64 {
        self.clock.samples_per_beat()
    }

    /// Internal clock position as a beat fraction
    pub fn internal_beat_distance(&self) -> f64 {
        self.clock.beat_distance()
    }

    /// Number of playing decks in Follower or Master mode
    pub fn playing_sync_deck_count(&self) -> usize {
        self.decks.playing_sync_count()
    }

    /// Whether the coordinator listens to any of `deck`'s live values
    pub fn is_subscribed(&self, deck: DeckId) -> bool {
        self.decks.get(deck).is_some_and(|entry| {
            let controls = &entry.controls;
            self.connections
                .is_connected(controls.rate_engine.id(), Reaction::SourceRateEngine)
                || self.connections.is_connected(controls.bpm.id(), Reaction::SourceBpm)
                || self
                    .connections
                    .is_connected(controls.beat_distance.id(), Reaction::SourceBeatDistance)
        })
    }

    pub fn bus(&self) -> &Arc<ControlBus> {
        &self.bus
    }

    pub fn config(&self) -> &SyncConfig {
        &self.config
    }

    pub fn snapshot(&self) -> SyncSnapshot {
        SyncSnapshot {
            source: self.source,
            explicit_master_selected: self.explicit_master_selected,
            master_bpm: self.master_bpm(),
            beat_distance: self.master_beat_distance(),
            samples_per_beat: self.samples_per_beat(),
            internal_clock_enabled: self.internal_clock_enabled(),
            rate_slider: self.rate_slider(),
        }
    }

    /// Config to save at shutdown
    ///
    /// Uses the slider rather than master tempo: the slider never drops to 0.
    pub fn persisted_config(&self) -> SyncConfig {
        SyncConfig {
            default_bpm: self.rate_slider(),
            ..self.config.clone()
        }
    }
}
