//! Scripted playback session.
//!
//! Builds a [`Manager`] over the simulated backend, registers the clip
//! catalogue and replays the configured cues on a fixed timestep, logging
//! every playback event.

use chorus_common::SoundResult;
use chorus_core::{Group, Manager, SimulatedBackend, SimulatedUnit, SoundEvent, SoundEventKind};
use crossbeam_channel::Receiver;
use tracing::{debug, info, warn};

use crate::config::{ClipConfig, Cue, CueAction, EngineConfig};
use crate::timing::FixedStep;

/// Counters collected while a session runs.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SessionReport {
    /// Fixed updates performed
    pub ticks: u64,
    /// Cues executed
    pub cues: usize,
    /// `Played` events seen
    pub played: u32,
    /// `PlaybackCompleted` events seen
    pub completed: u32,
    /// `Stopped` events seen
    pub stopped: u32,
    /// Most voices busy at once
    pub peak_voices: usize,
}

/// A running session.
pub struct Session {
    manager: Manager<SimulatedUnit>,
    backend: SimulatedBackend,
    events: Receiver<SoundEvent>,
    timing: FixedStep,
    cues: Vec<Cue>,
    next_cue: usize,
    time: f64,
    frame_dt: f32,
    length: f64,
    log_events: bool,
    report: SessionReport,
}

impl Session {
    /// Build the mixer and load the clip catalogue.
    pub fn new(config: &EngineConfig) -> SoundResult<Self> {
        let mut backend = SimulatedBackend::new();
        let mut manager = Manager::new(&config.mixer, |_, _| backend.create_unit())?;
        manager.register_clips(config.clips.iter().map(ClipConfig::to_clip));
        let events = manager.event_stream();

        let mut cues = config.cues.clone();
        cues.sort_by(|a, b| a.at.total_cmp(&b.at));

        info!(
            "Session ready: {} clips, {} cues, {} simulated units",
            manager.clips().len(),
            cues.len(),
            backend.len()
        );

        let timing = FixedStep::new(config.tick_rate);
        let frame_dt = config.frame_ms / 1000.0;
        let frame_dt = if frame_dt.is_finite() && frame_dt > 0.0 {
            frame_dt
        } else {
            warn!("Invalid frame time {}ms, using the tick length", config.frame_ms);
            timing.fixed_dt()
        };
        let length = if config.session_seconds.is_finite() {
            f64::from(config.session_seconds.max(0.0))
        } else {
            warn!("Invalid session length {}s, nothing to run", config.session_seconds);
            0.0
        };

        Ok(Self {
            manager,
            backend,
            events,
            timing,
            cues,
            next_cue: 0,
            time: 0.0,
            frame_dt,
            length,
            log_events: config.log_events,
            report: SessionReport::default(),
        })
    }

    /// Run until the session length has elapsed.
    pub fn run(&mut self) -> SessionReport {
        info!(
            "Running session for {:.1}s at {:.0} Hz",
            self.length,
            1.0 / self.timing.fixed_dt()
        );

        while self.time < self.length {
            let steps = self.timing.accumulate(self.frame_dt);
            for _ in 0..steps {
                self.tick();
                if self.time >= self.length {
                    break;
                }
            }
        }

        info!(
            "Session finished after {} ticks: {} played, {} loops completed, {} stopped, peak {} voices",
            self.report.ticks,
            self.report.played,
            self.report.completed,
            self.report.stopped,
            self.report.peak_voices
        );
        self.report.clone()
    }

    /// Execute due cues, then advance the backend and the mixer by one step.
    pub fn tick(&mut self) {
        self.fire_due_cues();

        let dt = self.timing.fixed_dt();
        self.backend.advance(dt);
        self.manager.update(dt);
        self.time += f64::from(dt);
        self.report.ticks += 1;

        self.drain_events();
        let busy: usize = self.manager.groups().map(Group::active_count).sum();
        self.report.peak_voices = self.report.peak_voices.max(busy);
    }

    fn fire_due_cues(&mut self) {
        while let Some(cue) = self.cues.get(self.next_cue) {
            if f64::from(cue.at) > self.time {
                break;
            }
            let action = cue.action.clone();
            self.next_cue += 1;
            self.report.cues += 1;
            debug!("Cue at {:.2}s: {:?}", self.time, action);
            self.apply(action);
        }
        // Commands deliver their events synchronously.
        self.drain_events();
    }

    fn apply(&mut self, action: CueAction) {
        let manager = &mut self.manager;
        match action {
            CueAction::Play {
                group,
                clip,
                fade,
                delay,
            } => {
                manager.play(&group, &clip, fade, delay);
            },
            CueAction::PlayLoop {
                group,
                clip,
                fade,
                delay,
            } => {
                manager.play_loop(&group, &clip, fade, delay);
            },
            CueAction::StopGroup { group, fade } => manager.stop_group(&group, fade),
            CueAction::StopAll { fade } => manager.stop_all(fade),
            CueAction::SetVolume { group, volume } => manager.set_volume(&group, volume),
            CueAction::SetMasterVolume { volume } => manager.set_master_volume(volume),
            CueAction::Background { enabled } => manager.set_background(enabled),
        }
    }

    fn drain_events(&mut self) {
        while let Ok(event) = self.events.try_recv() {
            match event.kind {
                SoundEventKind::Played => self.report.played += 1,
                SoundEventKind::PlaybackCompleted => self.report.completed += 1,
                SoundEventKind::Stopped => self.report.stopped += 1,
            }

            if self.log_events {
                let group = self
                    .manager
                    .group_by_id(event.group())
                    .map_or("?", Group::name);
                info!(
                    "[{:>6.2}s] {:<17} {} ({})",
                    self.time,
                    format!("{:?}", event.kind),
                    event.handle,
                    group
                );
            }
        }
    }

    /// The mixer driven by this session.
    #[must_use]
    pub fn manager(&self) -> &Manager<SimulatedUnit> {
        &self.manager
    }

    /// Simulated time in seconds.
    #[must_use]
    pub fn time(&self) -> f64 {
        self.time
    }
}
