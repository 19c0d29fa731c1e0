//! Single-sound helper for game objects.
//!
//! A [`SoundPlayer`] remembers which group and clip it plays and keeps track
//! of its own handles, so an owner can start, restart and stop "its" sound
//! and pick its own notifications out of the manager's event stream.

use chorus_common::SoundHandle;

use crate::events::{SoundEvent, SoundEventKind};
use crate::manager::Manager;
use crate::playback::PlaybackUnit;

/// Plays one clip on one group, tracking its handles.
#[derive(Debug, Clone)]
pub struct SoundPlayer {
    group: String,
    clip: String,
    fade: f32,
    delay: f32,
    playing: SoundHandle,
    stopping: SoundHandle,
}

impl SoundPlayer {
    /// Create a player for `clip` on `group`.
    #[must_use]
    pub fn new(group: impl Into<String>, clip: impl Into<String>) -> Self {
        Self {
            group: group.into(),
            clip: clip.into(),
            fade: 0.0,
            delay: 0.0,
            playing: SoundHandle::NONE,
            stopping: SoundHandle::NONE,
        }
    }

    /// Set the fade-in used by [`play`](Self::play) and [`play_loop`](Self::play_loop).
    #[must_use]
    pub const fn with_fade(mut self, fade: f32) -> Self {
        self.fade = fade;
        self
    }

    /// Set the start delay used by [`play`](Self::play) and [`play_loop`](Self::play_loop).
    #[must_use]
    pub const fn with_delay(mut self, delay: f32) -> Self {
        self.delay = delay;
        self
    }

    /// Restart the sound once.
    pub fn play<U: PlaybackUnit>(&mut self, manager: &mut Manager<U>) -> SoundHandle {
        self.stop(manager, 0.0, 0.0);
        self.playing = manager.play(&self.group, &self.clip, self.fade, self.delay);
        self.playing
    }

    /// Restart the sound in a loop.
    pub fn play_loop<U: PlaybackUnit>(&mut self, manager: &mut Manager<U>) -> SoundHandle {
        self.stop(manager, 0.0, 0.0);
        self.playing = manager.play_loop(&self.group, &self.clip, self.fade, self.delay);
        self.playing
    }

    /// Stop the sound if it is playing.
    pub fn stop<U: PlaybackUnit>(&mut self, manager: &mut Manager<U>, fade: f32, delay: f32) {
        if !self.is_playing(manager) {
            return;
        }
        self.stopping = self.playing;
        self.playing = SoundHandle::NONE;
        manager.stop(self.stopping, fade, delay);
    }

    /// Whether the current sound is producing audio.
    #[must_use]
    pub fn is_playing<U: PlaybackUnit>(&self, manager: &Manager<U>) -> bool {
        manager.is_playing(self.playing)
    }

    /// Filter an event from the manager. Returns its kind when it concerns
    /// this player, clearing the handle a `Stopped` event retires.
    pub fn observe(&mut self, event: &SoundEvent) -> Option<SoundEventKind> {
        if event.handle.is_none() {
            return None;
        }

        match event.kind {
            SoundEventKind::Played | SoundEventKind::PlaybackCompleted => {
                (event.handle == self.playing).then_some(event.kind)
            }
            SoundEventKind::Stopped => {
                if event.handle == self.stopping {
                    self.stopping = SoundHandle::NONE;
                    Some(event.kind)
                } else if event.handle == self.playing {
                    self.playing = SoundHandle::NONE;
                    Some(event.kind)
                } else {
                    None
                }
            }
        }
    }

    /// Handle of the current sound.
    #[must_use]
    pub const fn handle(&self) -> SoundHandle {
        self.playing
    }

    /// Handle of the sound being stopped.
    #[must_use]
    pub const fn stopping(&self) -> SoundHandle {
        self.stopping
    }

    /// Target group.
    #[must_use]
    pub fn group(&self) -> &str {
        &self.group
    }

    /// Clip name.
    #[must_use]
    pub fn clip(&self) -> &str {
        &self.clip
    }
}
