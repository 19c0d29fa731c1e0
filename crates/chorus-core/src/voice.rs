//! Per-voice playback lifecycle.
//!
//! A [`Voice`] owns one [`PlaybackUnit`] and runs it through
//! `Wait -> PlayWait -> Play -> StopWait -> Stop -> Wait`. Each state has an
//! entry action and a per-tick action; a tick may cascade forward through
//! several states when delays and fades are zero, but never revisits one.

use chorus_common::SoundHandle;
use tracing::debug;

use crate::events::{SoundEvent, SoundEventKind};
use crate::fade::{FadeDirection, FadeRamp, RampStep};
use crate::playback::{ClipHandle, PlaybackUnit};

/// Upper bound on state changes within one tick (`PlayWait` to `Wait`).
pub const MAX_TRANSITIONS_PER_TICK: usize = 4;

/// Lifecycle state of a voice.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Default)]
pub enum VoiceState {
    /// Idle, available for a new request.
    #[default]
    Wait,
    /// Counting down the start delay.
    PlayWait,
    /// Producing sound, fading in.
    Play,
    /// Counting down the stop delay.
    StopWait,
    /// Fading out.
    Stop,
}

impl VoiceState {
    /// Whether the voice holds a live request.
    #[must_use]
    pub const fn is_active(self) -> bool {
        !matches!(self, Self::Wait)
    }
}

/// Parameters of one play request.
#[derive(Debug, Clone)]
pub struct PlayRequest {
    /// Handle identifying the request.
    pub handle: SoundHandle,
    /// Clip to play.
    pub clip: ClipHandle,
    /// Fade-in length in seconds.
    pub fade: f32,
    /// Start delay in seconds.
    pub delay: f32,
    /// Whether the clip loops.
    pub looping: bool,
}

/// Non-finite or negative durations count as zero.
fn seconds(value: f32) -> f32 {
    if value.is_finite() {
        value.max(0.0)
    } else {
        0.0
    }
}

/// Clamp a volume to 0.0-1.0. Non-finite values count as full level.
pub(crate) fn unit_volume(volume: f32) -> f32 {
    if volume.is_finite() {
        volume.clamp(0.0, 1.0)
    } else {
        1.0
    }
}

enum Flow {
    Stay,
    Enter(VoiceState),
}

/// One reusable playback slot.
#[derive(Debug)]
pub struct Voice<U> {
    unit: U,
    state: VoiceState,
    handle: SoundHandle,
    clip: Option<ClipHandle>,
    fade_duration: f32,
    delay_duration: f32,
    elapsed: f32,
    ramp: FadeRamp,
    volume: f32,
    volume_rate: f32,
    playback_start_time: f64,
    playback_complete_count: u32,
    prev_position: u64,
    paused: bool,
    unit_paused: bool,
}

impl<U: PlaybackUnit> Voice<U> {
    /// Wrap a playback unit. The unit is parked until the first request.
    pub fn new(mut unit: U, volume_rate: f32) -> Self {
        unit.set_active(false);
        Self {
            unit,
            state: VoiceState::Wait,
            handle: SoundHandle::NONE,
            clip: None,
            fade_duration: 0.0,
            delay_duration: 0.0,
            elapsed: 0.0,
            ramp: FadeRamp::new(),
            volume: 1.0,
            volume_rate: unit_volume(volume_rate),
            playback_start_time: 0.0,
            playback_complete_count: 0,
            prev_position: 0,
            paused: false,
            unit_paused: false,
        }
    }

    /// Start a request. A voice that is still busy is stopped first.
    ///
    /// With a non-positive delay the voice is in [`VoiceState::Play`] when
    /// this returns.
    pub(crate) fn play(&mut self, request: PlayRequest, now: f64, events: &mut Vec<SoundEvent>) {
        self.force_stop(events);

        self.unit.set_active(true);
        self.unit.set_looping(request.looping);
        self.unit.set_clip(Some(request.clip.clone()));

        self.handle = request.handle;
        self.clip = Some(request.clip);
        self.fade_duration = seconds(request.fade);
        self.delay_duration = seconds(request.delay);
        self.volume = 1.0;
        self.playback_start_time = now;

        self.transition(VoiceState::PlayWait, events);
        self.run(0.0, events);
    }

    /// Request a stop. Only honored in `PlayWait` and `Play`; returns
    /// whether the request was accepted.
    ///
    /// With `immediate` the stop delay and fade are evaluated right away
    /// with zero elapsed time.
    pub(crate) fn stop(
        &mut self,
        fade: f32,
        delay: f32,
        immediate: bool,
        events: &mut Vec<SoundEvent>,
    ) -> bool {
        if !matches!(self.state, VoiceState::PlayWait | VoiceState::Play) {
            return false;
        }

        self.fade_duration = seconds(fade);
        self.delay_duration = seconds(delay);
        self.transition(VoiceState::StopWait, events);
        if immediate {
            self.run(0.0, events);
        }
        true
    }

    /// Silence the voice at once and return it to `Wait`, regardless of
    /// state or pause. Emits `Stopped` for the evicted request.
    pub(crate) fn force_stop(&mut self, events: &mut Vec<SoundEvent>) {
        if self.state == VoiceState::Wait {
            return;
        }
        self.unit.stop();
        events.push(SoundEvent::new(SoundEventKind::Stopped, self.handle));
        self.transition(VoiceState::Wait, events);
    }

    /// Freeze the voice. No effect in `Wait` or `Stop`, or when already paused.
    pub(crate) fn pause(&mut self) {
        if self.paused || matches!(self.state, VoiceState::Wait | VoiceState::Stop) {
            return;
        }
        self.paused = true;
        if self.unit.is_playing() {
            self.unit.pause();
            self.unit_paused = true;
        }
    }

    /// Undo [`pause`](Self::pause).
    pub(crate) fn unpause(&mut self) {
        if !self.paused {
            return;
        }
        self.paused = false;
        if self.unit_paused {
            self.unit.resume();
            self.unit_paused = false;
        }
    }

    /// Advance the state machine by `dt` seconds.
    pub(crate) fn execute(&mut self, dt: f32, events: &mut Vec<SoundEvent>) {
        self.run(dt, events);
    }

    /// Set the per-voice base volume (clamped), applied on the next tick.
    pub(crate) fn set_volume(&mut self, volume: f32) {
        self.volume = unit_volume(volume);
        self.ramp.touch();
    }

    /// Set the group-derived volume rate (clamped), applied on the next tick.
    pub(crate) fn set_volume_rate(&mut self, rate: f32) {
        self.volume_rate = unit_volume(rate);
        self.ramp.touch();
    }

    fn run(&mut self, dt: f32, events: &mut Vec<SoundEvent>) {
        let mut dt = dt;
        let mut transitions = 0;
        while transitions < MAX_TRANSITIONS_PER_TICK {
            match self.step(dt, events) {
                Flow::Stay => break,
                Flow::Enter(next) => {
                    debug_assert!(next > self.state || next == VoiceState::Wait);
                    self.transition(next, events);
                    transitions += 1;
                    // Time was consumed by the state that just finished.
                    dt = 0.0;
                }
            }
        }
    }

    fn step(&mut self, dt: f32, events: &mut Vec<SoundEvent>) -> Flow {
        match self.state {
            VoiceState::Wait => Flow::Stay,
            VoiceState::PlayWait => {
                if self.delay_elapsed(dt) {
                    Flow::Enter(VoiceState::Play)
                } else {
                    Flow::Stay
                }
            }
            VoiceState::Play => self.execute_play(dt, events),
            VoiceState::StopWait => {
                if self.delay_elapsed(dt) {
                    Flow::Enter(VoiceState::Stop)
                } else {
                    Flow::Stay
                }
            }
            VoiceState::Stop => self.execute_stop(dt, events),
        }
    }

    fn transition(&mut self, next: VoiceState, events: &mut Vec<SoundEvent>) {
        debug!("Voice {} {:?} -> {:?}", self.handle, self.state, next);
        self.state = next;
        match next {
            VoiceState::Wait => self.enter_wait(),
            VoiceState::PlayWait | VoiceState::StopWait => self.elapsed = 0.0,
            VoiceState::Play => self.enter_play(events),
            VoiceState::Stop => self.ramp.arm_fall(self.fade_duration),
        }
    }

    fn enter_wait(&mut self) {
        self.handle = SoundHandle::NONE;
        self.clip = None;
        self.fade_duration = 0.0;
        self.delay_duration = 0.0;
        self.elapsed = 0.0;
        self.ramp = FadeRamp::new();
        self.playback_start_time = 0.0;
        self.playback_complete_count = 0;
        self.prev_position = 0;
        self.paused = false;
        self.unit_paused = false;
        self.unit.set_clip(None);
        self.unit.set_active(false);
    }

    fn enter_play(&mut self, events: &mut Vec<SoundEvent>) {
        self.ramp.arm_rise(self.fade_duration);
        self.prev_position = 0;
        self.unit.set_volume(self.gain());
        self.unit.play();
        events.push(SoundEvent::new(SoundEventKind::Played, self.handle));
    }

    fn execute_play(&mut self, dt: f32, events: &mut Vec<SoundEvent>) -> Flow {
        if !self.paused {
            self.drive_ramp(dt, FadeDirection::Rise);
        }

        let position = self.unit.position();
        let wrapped = position < self.prev_position;
        self.prev_position = position;
        if !wrapped {
            return Flow::Stay;
        }

        self.playback_complete_count += 1;
        if self.unit.is_looping() {
            events.push(SoundEvent::new(SoundEventKind::PlaybackCompleted, self.handle));
            Flow::Stay
        } else {
            self.fade_duration = 0.0;
            self.delay_duration = 0.0;
            Flow::Enter(VoiceState::StopWait)
        }
    }

    fn execute_stop(&mut self, dt: f32, events: &mut Vec<SoundEvent>) -> Flow {
        let step = self.drive_ramp(dt, FadeDirection::Fall);
        let fading = matches!(step, RampStep::Moved { settled: false });
        let drained = !self.unit.is_playing() && self.unit.position() == 0;
        if fading && !drained {
            return Flow::Stay;
        }

        self.unit.stop();
        events.push(SoundEvent::new(SoundEventKind::Stopped, self.handle));
        Flow::Enter(VoiceState::Wait)
    }

    fn delay_elapsed(&mut self, dt: f32) -> bool {
        if self.paused {
            return false;
        }
        self.elapsed += dt;
        self.delay_duration <= 0.0 || self.elapsed >= self.delay_duration
    }

    fn drive_ramp(&mut self, dt: f32, direction: FadeDirection) -> RampStep {
        let step = self.ramp.advance(dt, direction);
        if matches!(step, RampStep::Moved { .. }) {
            self.unit.set_volume(self.gain());
        }
        step
    }

    /// Current state.
    #[must_use]
    pub const fn state(&self) -> VoiceState {
        self.state
    }

    /// Handle of the live request, `NONE` in `Wait`.
    #[must_use]
    pub const fn handle(&self) -> SoundHandle {
        self.handle
    }

    /// Whether this voice carries the given live handle.
    #[must_use]
    pub fn matches(&self, handle: SoundHandle) -> bool {
        handle.is_some() && self.handle == handle
    }

    /// Clip of the live request.
    #[must_use]
    pub fn clip(&self) -> Option<&ClipHandle> {
        self.clip.as_ref()
    }

    /// Effective output gain: `volume * volume_rate * ramp`, clamped.
    #[must_use]
    pub fn gain(&self) -> f32 {
        (self.volume * self.volume_rate * self.ramp.ratio()).clamp(0.0, 1.0)
    }

    /// Current fade ratio (0.0-1.0).
    #[must_use]
    pub const fn ramp_ratio(&self) -> f32 {
        self.ramp.ratio()
    }

    /// Per-voice base volume.
    #[must_use]
    pub const fn volume(&self) -> f32 {
        self.volume
    }

    /// Group-derived volume rate.
    #[must_use]
    pub const fn volume_rate(&self) -> f32 {
        self.volume_rate
    }

    /// Group clock value when the request started.
    #[must_use]
    pub const fn playback_start_time(&self) -> f64 {
        self.playback_start_time
    }

    /// Completed loop cycles of the live request.
    #[must_use]
    pub const fn playback_complete_count(&self) -> u32 {
        self.playback_complete_count
    }

    /// Whether the voice is paused.
    #[must_use]
    pub const fn is_paused(&self) -> bool {
        self.paused
    }

    /// Whether the unit is producing sound.
    #[must_use]
    pub fn is_playing(&self) -> bool {
        self.unit.is_playing()
    }

    /// The owned playback unit.
    #[must_use]
    pub const fn unit(&self) -> &U {
        &self.unit
    }
}
