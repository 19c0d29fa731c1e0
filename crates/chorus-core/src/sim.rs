//! Headless playback backend.
//!
//! [`SimulatedUnit`]s keep their state behind a shared lock so a harness can
//! advance sample positions while the voices own the units. Used by tests and
//! by the `chorus` session runner in place of real audio output.

use std::sync::Arc;

use parking_lot::Mutex;

use crate::playback::{ClipHandle, PlaybackUnit};

#[derive(Debug, Default)]
struct UnitState {
    clip: Option<ClipHandle>,
    looping: bool,
    volume: f32,
    playing: bool,
    paused: bool,
    active: bool,
    position: u64,
    play_count: u32,
}

impl UnitState {
    fn advance(&mut self, dt: f32) {
        if !self.playing || dt <= 0.0 {
            return;
        }
        let Some(clip) = self.clip.as_ref() else {
            return;
        };

        let total = clip.total_samples();
        let step = (f64::from(dt) * f64::from(clip.sample_rate())).round() as u64;
        self.position = self.position.saturating_add(step);

        if self.position >= total {
            if self.looping && total > 0 {
                self.position %= total;
            } else {
                self.playing = false;
                self.position = 0;
            }
        }
    }
}

type SharedState = Arc<Mutex<UnitState>>;

/// Playback unit that only tracks position and gain.
#[derive(Debug, Clone, Default)]
pub struct SimulatedUnit {
    state: SharedState,
}

impl SimulatedUnit {
    /// Create a standalone unit.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Inspection handle sharing this unit's state.
    #[must_use]
    pub fn probe(&self) -> UnitProbe {
        UnitProbe {
            state: Arc::clone(&self.state),
        }
    }
}

impl PlaybackUnit for SimulatedUnit {
    fn set_clip(&mut self, clip: Option<ClipHandle>) {
        let mut state = self.state.lock();
        state.clip = clip;
        state.position = 0;
    }

    fn set_looping(&mut self, looping: bool) {
        self.state.lock().looping = looping;
    }

    fn is_looping(&self) -> bool {
        self.state.lock().looping
    }

    fn set_volume(&mut self, volume: f32) {
        self.state.lock().volume = volume;
    }

    fn play(&mut self) {
        let mut state = self.state.lock();
        state.position = 0;
        state.playing = state.clip.is_some();
        state.paused = false;
        state.play_count += 1;
    }

    fn pause(&mut self) {
        let mut state = self.state.lock();
        if state.playing {
            state.playing = false;
            state.paused = true;
        }
    }

    fn resume(&mut self) {
        let mut state = self.state.lock();
        if state.paused {
            state.paused = false;
            state.playing = true;
        }
    }

    fn stop(&mut self) {
        let mut state = self.state.lock();
        state.playing = false;
        state.paused = false;
        state.position = 0;
    }

    fn is_playing(&self) -> bool {
        self.state.lock().playing
    }

    fn position(&self) -> u64 {
        self.state.lock().position
    }

    fn set_active(&mut self, active: bool) {
        self.state.lock().active = active;
    }
}

/// Read access to a [`SimulatedUnit`] from outside its voice.
#[derive(Debug, Clone)]
pub struct UnitProbe {
    state: SharedState,
}

impl UnitProbe {
    /// Move the playback position forward by `dt` seconds.
    pub fn advance(&self, dt: f32) {
        self.state.lock().advance(dt);
    }

    /// Jump to a sample position, e.g. to force a wrap.
    pub fn set_position(&self, position: u64) {
        self.state.lock().position = position;
    }

    /// Last gain set by the voice.
    #[must_use]
    pub fn volume(&self) -> f32 {
        self.state.lock().volume
    }

    /// Current sample position.
    #[must_use]
    pub fn position(&self) -> u64 {
        self.state.lock().position
    }

    /// Whether the unit is producing sound.
    #[must_use]
    pub fn is_playing(&self) -> bool {
        self.state.lock().playing
    }

    /// Whether the unit is paused.
    #[must_use]
    pub fn is_paused(&self) -> bool {
        self.state.lock().paused
    }

    /// Whether the unit is looping.
    #[must_use]
    pub fn is_looping(&self) -> bool {
        self.state.lock().looping
    }

    /// Whether the unit is activated.
    #[must_use]
    pub fn is_active(&self) -> bool {
        self.state.lock().active
    }

    /// Name of the attached clip.
    #[must_use]
    pub fn clip_name(&self) -> Option<String> {
        self.state
            .lock()
            .clip
            .as_ref()
            .map(|clip| clip.name().to_string())
    }

    /// How many times `play` was called.
    #[must_use]
    pub fn play_count(&self) -> u32 {
        self.state.lock().play_count
    }
}

/// Creates simulated units and advances them together.
#[derive(Debug, Default)]
pub struct SimulatedBackend {
    units: Vec<UnitProbe>,
}

impl SimulatedBackend {
    /// Create an empty backend.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a unit tracked by this backend.
    pub fn create_unit(&mut self) -> SimulatedUnit {
        let unit = SimulatedUnit::new();
        self.units.push(unit.probe());
        unit
    }

    /// Advance every tracked unit by `dt` seconds.
    pub fn advance(&self, dt: f32) {
        for unit in &self.units {
            unit.advance(dt);
        }
    }

    /// Probe of the `index`-th created unit.
    #[must_use]
    pub fn probe(&self, index: usize) -> Option<&UnitProbe> {
        self.units.get(index)
    }

    /// Number of created units.
    #[must_use]
    pub fn len(&self) -> usize {
        self.units.len()
    }

    /// Whether no unit was created.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.units.is_empty()
    }

    /// Number of units currently producing sound.
    #[must_use]
    pub fn playing_count(&self) -> usize {
        self.units.iter().filter(|unit| unit.is_playing()).count()
    }
}
