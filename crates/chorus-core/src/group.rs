//! Voice pools.
//!
//! A [`Group`] owns a fixed set of [`Voice`]s sharing one volume and one set
//! of observers. It issues handles, picks a free voice for each request
//! (stealing the oldest one when all are busy) and routes handle-addressed
//! commands to the voice carrying that handle.

use chorus_common::{GroupId, SequenceCounter, SoundError, SoundHandle, SoundResult};
use crossbeam_channel::Sender;
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::events::{EventTaps, SoundEvent, SoundEventKind, Subscribers, SubscriptionId};
use crate::playback::{ClipHandle, PlaybackUnit};
use crate::voice::{unit_volume, PlayRequest, Voice, VoiceState};

/// How a group treats overlapping requests.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PlayPolicy {
    /// Requests overlap up to the voice count.
    #[default]
    Polyphonic,
    /// Each request stops the previous one (background music).
    Exclusive,
}

/// A named pool of voices.
#[derive(Debug)]
pub struct Group<U> {
    name: String,
    id: GroupId,
    policy: PlayPolicy,
    voices: Vec<Voice<U>>,
    volume: f32,
    master: f32,
    sequence: SequenceCounter,
    clock: f64,
    current: SoundHandle,
    pending: Vec<SoundEvent>,
    subscribers: Subscribers,
    taps: EventTaps,
}

impl<U: PlaybackUnit> Group<U> {
    /// Create a group owning one voice per unit.
    ///
    /// # Errors
    ///
    /// Fails when the name is empty or no unit is given.
    pub fn new(
        name: impl Into<String>,
        policy: PlayPolicy,
        units: impl IntoIterator<Item = U>,
    ) -> SoundResult<Self> {
        let name = name.into();
        if name.is_empty() {
            return Err(SoundError::EmptyGroupName);
        }

        let voices: Vec<_> = units.into_iter().map(|unit| Voice::new(unit, 1.0)).collect();
        if voices.is_empty() {
            return Err(SoundError::NoVoices { group: name });
        }

        let id = GroupId::from_name(&name);
        debug!(
            "Created sound group '{}' ({}) with {} voices",
            name,
            id,
            voices.len()
        );

        Ok(Self {
            name,
            id,
            policy,
            voices,
            volume: 1.0,
            master: 1.0,
            sequence: SequenceCounter::new(),
            clock: 0.0,
            current: SoundHandle::NONE,
            pending: Vec::new(),
            subscribers: Subscribers::new(),
            taps: EventTaps::default(),
        })
    }

    /// Play a clip once. Returns [`SoundHandle::NONE`] without a clip.
    pub fn play(&mut self, clip: impl Into<Option<ClipHandle>>, fade: f32, delay: f32) -> SoundHandle {
        self.start(clip.into(), fade, delay, false)
    }

    /// Play a clip in a loop. Returns [`SoundHandle::NONE`] without a clip.
    pub fn play_loop(
        &mut self,
        clip: impl Into<Option<ClipHandle>>,
        fade: f32,
        delay: f32,
    ) -> SoundHandle {
        self.start(clip.into(), fade, delay, true)
    }

    fn start(&mut self, clip: Option<ClipHandle>, fade: f32, delay: f32, looping: bool) -> SoundHandle {
        let Some(clip) = clip else {
            warn!("Sound group '{}' asked to play without a clip", self.name);
            return SoundHandle::NONE;
        };

        let handle = SoundHandle::new(self.id, self.sequence.next_id());
        let index = self.select_voice();

        let voice = &mut self.voices[index];
        if voice.state().is_active() {
            warn!(
                "Sound group '{}' out of voices, stealing {} ({})",
                self.name,
                voice.handle(),
                voice.clip().map_or("<none>", |clip| clip.name())
            );
            voice.force_stop(&mut self.pending);
        }

        debug!("Playing '{}' as {} on voice {}", clip.name(), handle, index);
        let request = PlayRequest {
            handle,
            clip,
            fade,
            delay,
            looping,
        };
        voice.play(request, self.clock, &mut self.pending);

        if self.policy == PlayPolicy::Exclusive {
            let previous = std::mem::replace(&mut self.current, handle);
            self.stop_voice(previous, fade, delay);
        }

        self.flush();
        handle
    }

    /// First idle voice, else the one that started earliest (lowest index
    /// on ties).
    fn select_voice(&self) -> usize {
        if let Some(index) = self
            .voices
            .iter()
            .position(|voice| voice.state() == VoiceState::Wait)
        {
            return index;
        }

        let mut oldest = 0;
        for (index, voice) in self.voices.iter().enumerate().skip(1) {
            if voice.playback_start_time() < self.voices[oldest].playback_start_time() {
                oldest = index;
            }
        }
        oldest
    }

    fn position_of(&self, handle: SoundHandle) -> Option<usize> {
        self.voices.iter().position(|voice| voice.matches(handle))
    }

    fn stop_voice(&mut self, handle: SoundHandle, fade: f32, delay: f32) -> bool {
        match self.position_of(handle) {
            Some(index) => self.voices[index].stop(fade, delay, true, &mut self.pending),
            None => false,
        }
    }

    /// Stop the request carrying `handle`. Returns whether a voice accepted it.
    pub fn stop(&mut self, handle: SoundHandle, fade: f32, delay: f32) -> bool {
        let accepted = self.stop_voice(handle, fade, delay);
        self.flush();
        accepted
    }

    /// Stop every voice with the given fade and no delay.
    pub fn stop_all(&mut self, fade: f32) {
        for voice in &mut self.voices {
            voice.stop(fade, 0.0, true, &mut self.pending);
        }
        self.flush();
    }

    /// Pause the request carrying `handle`. Returns whether it was found.
    pub fn pause(&mut self, handle: SoundHandle) -> bool {
        match self.position_of(handle) {
            Some(index) => {
                self.voices[index].pause();
                true
            }
            None => false,
        }
    }

    /// Pause every voice.
    pub fn pause_all(&mut self) {
        for voice in &mut self.voices {
            voice.pause();
        }
    }

    /// Resume the request carrying `handle`. Returns whether it was found.
    pub fn unpause(&mut self, handle: SoundHandle) -> bool {
        match self.position_of(handle) {
            Some(index) => {
                self.voices[index].unpause();
                true
            }
            None => false,
        }
    }

    /// Resume every voice.
    pub fn unpause_all(&mut self) {
        for voice in &mut self.voices {
            voice.unpause();
        }
    }

    /// Whether the unit of the voice carrying `handle` is producing sound.
    #[must_use]
    pub fn is_playing(&self, handle: SoundHandle) -> bool {
        self.voice(handle).is_some_and(Voice::is_playing)
    }

    /// Whether any voice is producing sound.
    #[must_use]
    pub fn is_any_playing(&self) -> bool {
        self.voices.iter().any(Voice::is_playing)
    }

    /// Change the base volume of one request. Returns whether it was found.
    pub fn set_sound_volume(&mut self, handle: SoundHandle, volume: f32) -> bool {
        match self.position_of(handle) {
            Some(index) => {
                self.voices[index].set_volume(volume);
                true
            }
            None => false,
        }
    }

    /// Group volume (0.0-1.0).
    #[must_use]
    pub const fn volume(&self) -> f32 {
        self.volume
    }

    /// Set the group volume (clamped) and push the new rate to every voice.
    pub fn set_volume(&mut self, volume: f32) {
        self.volume = unit_volume(volume);
        self.apply_volume_rate();
    }

    /// Set the master scale this group's rate is multiplied by.
    pub(crate) fn set_master_scale(&mut self, master: f32) {
        self.master = unit_volume(master);
        self.apply_volume_rate();
    }

    /// Rate pushed to the voices: group volume times master volume.
    #[must_use]
    pub fn volume_rate(&self) -> f32 {
        self.volume * self.master
    }

    fn apply_volume_rate(&mut self) {
        let rate = self.volume_rate();
        for voice in &mut self.voices {
            voice.set_volume_rate(rate);
        }
    }

    /// Advance every voice by `dt` seconds and deliver the resulting events.
    pub fn update(&mut self, dt: f32) {
        self.clock += f64::from(dt);
        for voice in &mut self.voices {
            voice.execute(dt, &mut self.pending);
        }
        self.flush();
    }

    fn flush(&mut self) {
        for event in self.pending.drain(..) {
            self.subscribers.dispatch(&event);
            self.taps.publish(event);
        }
    }

    /// Register an observer for one kind of event.
    pub fn subscribe<F>(&mut self, kind: SoundEventKind, callback: F) -> SubscriptionId
    where
        F: FnMut(SoundHandle) + 'static,
    {
        self.subscribers.subscribe(kind, callback)
    }

    /// Remove an observer. Returns whether it was registered.
    pub fn unsubscribe(&mut self, kind: SoundEventKind, id: SubscriptionId) -> bool {
        self.subscribers.unsubscribe(kind, id)
    }

    /// Forward every future event of this group to `sender`.
    pub fn attach_stream(&mut self, sender: Sender<SoundEvent>) {
        self.taps.attach(sender);
    }

    /// The voice carrying `handle`.
    #[must_use]
    pub fn voice(&self, handle: SoundHandle) -> Option<&Voice<U>> {
        self.voices.iter().find(|voice| voice.matches(handle))
    }

    /// All voices in creation order.
    #[must_use]
    pub fn voices(&self) -> &[Voice<U>] {
        &self.voices
    }

    /// Number of voices holding a live request.
    #[must_use]
    pub fn active_count(&self) -> usize {
        self.voices
            .iter()
            .filter(|voice| voice.state().is_active())
            .count()
    }

    /// Group name.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Group id embedded in the handles it issues.
    #[must_use]
    pub const fn id(&self) -> GroupId {
        self.id
    }

    /// Play policy.
    #[must_use]
    pub const fn policy(&self) -> PlayPolicy {
        self.policy
    }

    /// Sum of all ticks seen by this group, in seconds.
    #[must_use]
    pub const fn clock(&self) -> f64 {
        self.clock
    }

    /// Last handle issued under the exclusive policy.
    #[must_use]
    pub const fn current(&self) -> SoundHandle {
        self.current
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::playback::ClipInfo;
    use crate::sim::{SimulatedBackend, SimulatedUnit};
    use std::cell::RefCell;
    use std::rc::Rc;

    fn group(voices: usize, policy: PlayPolicy) -> (Group<SimulatedUnit>, SimulatedBackend) {
        let mut backend = SimulatedBackend::new();
        let units: Vec<_> = (0..voices).map(|_| backend.create_unit()).collect();
        let group = Group::new("se", policy, units).expect("group");
        (group, backend)
    }

    fn clip(name: &str) -> ClipHandle {
        ClipInfo::with_duration(name, 1_000, 10.0).into_handle()
    }

    fn tick(group: &mut Group<SimulatedUnit>, backend: &SimulatedBackend, dt: f32) {
        backend.advance(dt);
        group.update(dt);
    }

    #[test]
    fn test_rejects_bad_construction() {
        let empty: Vec<SimulatedUnit> = Vec::new();
        assert_eq!(
            Group::new("se", PlayPolicy::Polyphonic, empty).err(),
            Some(SoundError::NoVoices {
                group: "se".to_string()
            })
        );
        assert_eq!(
            Group::new("", PlayPolicy::Polyphonic, vec![SimulatedUnit::new()]).err(),
            Some(SoundError::EmptyGroupName)
        );
    }

    #[test]
    fn test_handles_carry_group_id() {
        let (mut group, _backend) = group(2, PlayPolicy::Polyphonic);
        let a = group.play(clip("a"), 0.0, 0.0);
        let b = group.play(clip("b"), 0.0, 0.0);

        assert_eq!(a.group_id(), group.id());
        assert_ne!(a.sequence_id(), 0);
        assert_ne!(a, b);
        assert!(group.is_playing(a));
        assert!(group.is_playing(b));
    }

    #[test]
    fn test_missing_clip_returns_none() {
        let (mut group, _backend) = group(1, PlayPolicy::Polyphonic);
        let handle = group.play(None, 0.0, 0.0);
        assert!(handle.is_none());
        assert_eq!(group.active_count(), 0);
    }

    #[test]
    fn test_steals_oldest_voice() {
        let (mut group, backend) = group(3, PlayPolicy::Polyphonic);
        let first = group.play_loop(clip("a"), 0.0, 0.0);
        tick(&mut group, &backend, 0.1);
        let second = group.play_loop(clip("b"), 0.0, 0.0);
        tick(&mut group, &backend, 0.1);
        let third = group.play_loop(clip("c"), 0.0, 0.0);
        tick(&mut group, &backend, 0.1);

        let fourth = group.play_loop(clip("d"), 0.0, 0.0);
        assert!(!group.is_playing(first));
        assert!(group.voice(first).is_none());
        assert!(group.is_playing(second));
        assert!(group.is_playing(third));
        assert!(group.is_playing(fourth));
        assert_eq!(group.voices()[0].handle(), fourth);

        let fifth = group.play_loop(clip("e"), 0.0, 0.0);
        assert!(group.voice(second).is_none());
        assert_eq!(group.voices()[1].handle(), fifth);
    }

    #[test]
    fn test_steal_ties_go_to_first_voice() {
        let (mut group, _backend) = group(2, PlayPolicy::Polyphonic);
        let first = group.play_loop(clip("a"), 0.0, 0.0);
        let second = group.play_loop(clip("b"), 0.0, 0.0);

        let third = group.play_loop(clip("c"), 0.0, 0.0);
        assert!(group.voice(first).is_none());
        assert!(group.is_playing(second));
        assert_eq!(group.voices()[0].handle(), third);
    }

    #[test]
    fn test_steal_reports_stop_before_play() {
        let (mut group, _backend) = group(1, PlayPolicy::Polyphonic);
        let (tx, rx) = EventTaps::open();
        group.attach_stream(tx);

        let first = group.play(clip("a"), 0.0, 0.0);
        let second = group.play(clip("b"), 0.0, 0.0);

        let events: Vec<_> = rx.try_iter().collect();
        assert_eq!(
            events,
            vec![
                SoundEvent::new(SoundEventKind::Played, first),
                SoundEvent::new(SoundEventKind::Stopped, first),
                SoundEvent::new(SoundEventKind::Played, second),
            ]
        );
    }

    #[test]
    fn test_stale_handle_is_ignored() {
        let (mut group, _backend) = group(1, PlayPolicy::Polyphonic);
        let handle = group.play(clip("a"), 0.0, 0.0);
        assert!(group.stop(handle, 0.0, 0.0));
        assert!(!group.stop(handle, 0.0, 0.0));
        assert!(!group.pause(handle));
        assert!(!group.unpause(handle));
        assert!(!group.is_playing(handle));
        assert!(!group.stop(SoundHandle::NONE, 0.0, 0.0));
    }

    #[test]
    fn test_exclusive_stops_previous_with_fade() {
        let (mut group, backend) = group(2, PlayPolicy::Exclusive);
        let intro = group.play_loop(clip("intro"), 0.0, 0.0);
        let theme = group.play_loop(clip("theme"), 1.0, 0.0);

        assert_eq!(group.current(), theme);
        assert_eq!(group.voice(intro).map(Voice::state), Some(VoiceState::Stop));
        assert_eq!(group.voice(theme).map(Voice::state), Some(VoiceState::Play));

        tick(&mut group, &backend, 0.5);
        assert!(group.is_playing(intro));
        tick(&mut group, &backend, 0.5);
        assert!(group.voice(intro).is_none());
        assert!(group.is_playing(theme));
    }

    #[test]
    fn test_exclusive_keeps_track_on_missing_clip() {
        let (mut group, _backend) = group(2, PlayPolicy::Exclusive);
        let theme = group.play_loop(clip("theme"), 0.0, 0.0);
        assert!(group.play_loop(None, 0.0, 0.0).is_none());

        assert_eq!(group.current(), theme);
        assert!(group.is_playing(theme));
    }

    #[test]
    fn test_volume_rate_pushed_to_voices() {
        let (mut group, backend) = group(2, PlayPolicy::Polyphonic);
        let handle = group.play_loop(clip("a"), 0.0, 0.0);
        group.set_master_scale(0.5);
        group.set_volume(0.8);

        assert!((group.volume_rate() - 0.4).abs() < 1e-6);
        for voice in group.voices() {
            assert!((voice.volume_rate() - 0.4).abs() < 1e-6);
        }

        tick(&mut group, &backend, 0.1);
        let probe = backend.probe(0).expect("probe");
        assert!((probe.volume() - 0.4).abs() < 1e-6);
        assert!(group.is_playing(handle));

        group.set_volume(1.5);
        assert_eq!(group.volume(), 1.0);
        group.set_volume(-1.0);
        assert_eq!(group.volume(), 0.0);
    }

    #[test]
    fn test_set_sound_volume() {
        let (mut group, backend) = group(2, PlayPolicy::Polyphonic);
        let a = group.play_loop(clip("a"), 0.0, 0.0);
        let b = group.play_loop(clip("b"), 0.0, 0.0);
        assert!(group.set_sound_volume(b, 0.3));

        tick(&mut group, &backend, 0.1);
        assert_eq!(group.voice(a).map(Voice::gain), Some(1.0));
        let gain = group.voice(b).map(Voice::gain).unwrap_or_default();
        assert!((gain - 0.3).abs() < 1e-6);
    }

    #[test]
    fn test_observers_follow_group_not_voice() {
        let (mut group, backend) = group(1, PlayPolicy::Polyphonic);
        let stopped = Rc::new(RefCell::new(Vec::new()));
        let sink = Rc::clone(&stopped);
        group.subscribe(SoundEventKind::Stopped, move |h| sink.borrow_mut().push(h));

        let first = group.play(clip("a"), 0.0, 0.0);
        group.stop(first, 0.0, 0.0);
        let second = group.play(clip("b"), 0.0, 0.0);
        group.stop(second, 0.5, 0.0);
        tick(&mut group, &backend, 0.5);

        assert_eq!(*stopped.borrow(), vec![first, second]);
    }

    #[test]
    fn test_pause_all_and_resume() {
        let (mut group, backend) = group(2, PlayPolicy::Polyphonic);
        let a = group.play_loop(clip("a"), 0.0, 0.0);
        let b = group.play_loop(clip("b"), 0.0, 1.0);

        group.pause_all();
        assert!(!group.is_any_playing());
        tick(&mut group, &backend, 2.0);
        assert_eq!(group.voice(b).map(Voice::state), Some(VoiceState::PlayWait));

        group.unpause_all();
        assert!(group.is_playing(a));
        tick(&mut group, &backend, 1.0);
        assert!(group.is_playing(b));
    }

    #[test]
    fn test_stop_all() {
        let (mut group, _backend) = group(3, PlayPolicy::Polyphonic);
        for name in ["a", "b", "c"] {
            group.play_loop(clip(name), 0.0, 0.0);
        }
        assert_eq!(group.active_count(), 3);

        group.stop_all(0.0);
        assert_eq!(group.active_count(), 0);
        assert!(!group.is_any_playing());
    }
}
