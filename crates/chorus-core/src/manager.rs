//! Group registry and global playback policy.
//!
//! The [`Manager`] owns every [`Group`], the master volume and the clip
//! registry. Name-addressed commands look the group up by name;
//! handle-addressed commands route through the group id inside the handle.
//! Commands never fail: unknown names and stale handles are logged and
//! ignored.

use ahash::AHashMap;
use chorus_common::{GroupId, SoundError, SoundHandle, SoundResult};
use crossbeam_channel::Receiver;
use tracing::{debug, info, warn};

use crate::config::{GroupConfig, MixerConfig};
use crate::events::{EventTaps, SoundEvent, SoundEventKind, SubscriptionId};
use crate::group::Group;
use crate::playback::{ClipHandle, PlaybackUnit};
use crate::registry::ClipRegistry;
use crate::voice::{unit_volume, Voice};

/// Owner of all sound groups.
#[derive(Debug)]
pub struct Manager<U> {
    groups: Vec<Group<U>>,
    by_name: AHashMap<String, usize>,
    by_id: AHashMap<GroupId, usize>,
    master_volume: f32,
    clips: ClipRegistry,
    background: bool,
}

impl<U: PlaybackUnit> Manager<U> {
    /// Build every configured group, asking `factory` for one unit per voice.
    ///
    /// # Errors
    ///
    /// Fails when the configuration does not pass [`MixerConfig::check`].
    pub fn new<F>(config: &MixerConfig, mut factory: F) -> SoundResult<Self>
    where
        F: FnMut(&GroupConfig, usize) -> U,
    {
        let mut config = config.clone();
        config.validate();
        config.check()?;

        let mut manager = Self {
            groups: Vec::with_capacity(config.groups.len()),
            by_name: AHashMap::with_capacity(config.groups.len()),
            by_id: AHashMap::with_capacity(config.groups.len()),
            master_volume: config.master_volume,
            clips: ClipRegistry::new(),
            background: false,
        };

        for group_config in &config.groups {
            let units = (0..group_config.voices).map(|index| factory(group_config, index));
            let mut group = Group::new(group_config.name.clone(), group_config.policy, units)?;
            group.set_volume(group_config.volume);
            group.set_master_scale(manager.master_volume);

            let index = manager.groups.len();
            manager.by_name.insert(group.name().to_string(), index);
            manager.by_id.insert(group.id(), index);
            manager.groups.push(group);
        }

        info!(
            "Sound manager initialized with {} groups ({} voices)",
            manager.groups.len(),
            config.total_voices()
        );
        Ok(manager)
    }

    fn index_of(&self, name: &str) -> Option<usize> {
        let index = self.by_name.get(name).copied();
        if index.is_none() {
            warn!("Sound group '{}' not found", name);
        }
        index
    }

    fn routed(&mut self, handle: SoundHandle) -> Option<&mut Group<U>> {
        if handle.is_none() {
            return None;
        }
        match self.by_id.get(&handle.group_id()) {
            Some(&index) => self.groups.get_mut(index),
            None => {
                debug!("No sound group owns handle {}", handle);
                None
            }
        }
    }

    fn routed_ref(&self, handle: SoundHandle) -> Option<&Group<U>> {
        if handle.is_none() {
            return None;
        }
        self.by_id
            .get(&handle.group_id())
            .and_then(|&index| self.groups.get(index))
    }

    fn lookup_clip(&self, name: &str) -> Option<ClipHandle> {
        let clip = self.clips.get(name).cloned();
        if clip.is_none() {
            warn!("Audio clip '{}' not found", name);
        }
        clip
    }

    fn start(&mut self, group: &str, clip: &str, fade: f32, delay: f32, looping: bool) -> SoundHandle {
        let Some(index) = self.index_of(group) else {
            return SoundHandle::NONE;
        };
        let Some(clip) = self.lookup_clip(clip) else {
            return SoundHandle::NONE;
        };

        let group = &mut self.groups[index];
        if looping {
            group.play_loop(clip, fade, delay)
        } else {
            group.play(clip, fade, delay)
        }
    }

    /// Play a registered clip once on a group.
    pub fn play(&mut self, group: &str, clip: &str, fade: f32, delay: f32) -> SoundHandle {
        self.start(group, clip, fade, delay, false)
    }

    /// Play a registered clip in a loop on a group.
    pub fn play_loop(&mut self, group: &str, clip: &str, fade: f32, delay: f32) -> SoundHandle {
        self.start(group, clip, fade, delay, true)
    }

    /// Stop one playback. Returns whether a voice accepted the request.
    pub fn stop(&mut self, handle: SoundHandle, fade: f32, delay: f32) -> bool {
        self.routed(handle)
            .is_some_and(|group| group.stop(handle, fade, delay))
    }

    /// Stop every voice of a group.
    pub fn stop_group(&mut self, group: &str, fade: f32) {
        if let Some(index) = self.index_of(group) {
            self.groups[index].stop_all(fade);
        }
    }

    /// Stop every voice of every group.
    pub fn stop_all(&mut self, fade: f32) {
        for group in &mut self.groups {
            group.stop_all(fade);
        }
    }

    /// Pause one playback.
    pub fn pause(&mut self, handle: SoundHandle) -> bool {
        self.routed(handle).is_some_and(|group| group.pause(handle))
    }

    /// Pause every voice of a group.
    pub fn pause_group(&mut self, group: &str) {
        if let Some(index) = self.index_of(group) {
            self.groups[index].pause_all();
        }
    }

    /// Pause every voice of every group.
    pub fn pause_all(&mut self) {
        for group in &mut self.groups {
            group.pause_all();
        }
    }

    /// Resume one playback.
    pub fn unpause(&mut self, handle: SoundHandle) -> bool {
        self.routed(handle).is_some_and(|group| group.unpause(handle))
    }

    /// Resume every voice of a group.
    pub fn unpause_group(&mut self, group: &str) {
        if let Some(index) = self.index_of(group) {
            self.groups[index].unpause_all();
        }
    }

    /// Resume every voice of every group.
    pub fn unpause_all(&mut self) {
        for group in &mut self.groups {
            group.unpause_all();
        }
    }

    /// Whether the playback is producing sound.
    #[must_use]
    pub fn is_playing(&self, handle: SoundHandle) -> bool {
        self.routed_ref(handle)
            .is_some_and(|group| group.is_playing(handle))
    }

    /// Whether any voice of the group is producing sound.
    #[must_use]
    pub fn is_group_playing(&self, group: &str) -> bool {
        self.index_of(group)
            .is_some_and(|index| self.groups[index].is_any_playing())
    }

    /// Set a group's volume (clamped).
    pub fn set_volume(&mut self, group: &str, volume: f32) {
        if let Some(index) = self.index_of(group) {
            self.groups[index].set_volume(volume);
        }
    }

    /// A group's volume, 0.0 for unknown groups.
    #[must_use]
    pub fn volume(&self, group: &str) -> f32 {
        self.index_of(group)
            .map_or(0.0, |index| self.groups[index].volume())
    }

    /// Master volume (0.0-1.0).
    #[must_use]
    pub const fn master_volume(&self) -> f32 {
        self.master_volume
    }

    /// Set the master volume (clamped) and recompute every group's rate.
    pub fn set_master_volume(&mut self, volume: f32) {
        self.master_volume = unit_volume(volume);
        for group in &mut self.groups {
            group.set_master_scale(self.master_volume);
        }
    }

    /// Change the base volume of one playback.
    pub fn set_sound_volume(&mut self, handle: SoundHandle, volume: f32) -> bool {
        self.routed(handle)
            .is_some_and(|group| group.set_sound_volume(handle, volume))
    }

    /// Register a clip and return its reference count.
    pub fn register_clip(&mut self, clip: ClipHandle) -> u32 {
        self.clips.register(clip)
    }

    /// Drop one reference to a clip and return the remaining count.
    pub fn unregister_clip(&mut self, name: &str) -> u32 {
        self.clips.unregister(name)
    }

    /// Register several clips.
    pub fn register_clips(&mut self, clips: impl IntoIterator<Item = ClipHandle>) {
        for clip in clips {
            self.clips.register(clip);
        }
    }

    /// Unregister several clips by name.
    pub fn unregister_clips<'a>(&mut self, names: impl IntoIterator<Item = &'a str>) {
        for name in names {
            self.clips.unregister(name);
        }
    }

    /// The clip registry.
    #[must_use]
    pub const fn clips(&self) -> &ClipRegistry {
        &self.clips
    }

    /// Register an observer on a group. `None` when the group is unknown.
    pub fn subscribe<F>(
        &mut self,
        group: &str,
        kind: SoundEventKind,
        callback: F,
    ) -> Option<SubscriptionId>
    where
        F: FnMut(SoundHandle) + 'static,
    {
        let index = self.index_of(group)?;
        Some(self.groups[index].subscribe(kind, callback))
    }

    /// Remove an observer. Returns whether it was registered.
    pub fn unsubscribe(&mut self, group: &str, kind: SoundEventKind, id: SubscriptionId) -> bool {
        self.index_of(group)
            .is_some_and(|index| self.groups[index].unsubscribe(kind, id))
    }

    /// Observe playback starts on a group.
    pub fn on_play<F>(&mut self, group: &str, callback: F) -> Option<SubscriptionId>
    where
        F: FnMut(SoundHandle) + 'static,
    {
        self.subscribe(group, SoundEventKind::Played, callback)
    }

    /// Observe loop completions on a group.
    pub fn on_playback_complete<F>(&mut self, group: &str, callback: F) -> Option<SubscriptionId>
    where
        F: FnMut(SoundHandle) + 'static,
    {
        self.subscribe(group, SoundEventKind::PlaybackCompleted, callback)
    }

    /// Observe finished stops on a group.
    pub fn on_stop<F>(&mut self, group: &str, callback: F) -> Option<SubscriptionId>
    where
        F: FnMut(SoundHandle) + 'static,
    {
        self.subscribe(group, SoundEventKind::Stopped, callback)
    }

    /// Open a stream receiving every event of every group in emission order.
    pub fn event_stream(&mut self) -> Receiver<SoundEvent> {
        let (sender, receiver) = EventTaps::open();
        for group in &mut self.groups {
            group.attach_stream(sender.clone());
        }
        receiver
    }

    /// Enter or leave the background. Entering pauses everything, leaving
    /// resumes everything; repeating the current state does nothing.
    pub fn set_background(&mut self, background: bool) {
        if self.background == background {
            return;
        }
        self.background = background;
        if background {
            info!("Entering background, pausing all sounds");
            self.pause_all();
        } else {
            info!("Leaving background, resuming all sounds");
            self.unpause_all();
        }
    }

    /// Whether the manager is in the background.
    #[must_use]
    pub const fn is_background(&self) -> bool {
        self.background
    }

    /// Advance every group by `dt` seconds. Negative or non-finite values
    /// count as zero.
    pub fn update(&mut self, dt: f32) {
        let dt = if dt.is_finite() { dt.max(0.0) } else { 0.0 };
        for group in &mut self.groups {
            group.update(dt);
        }
    }

    /// Look up a group by name.
    #[must_use]
    pub fn group(&self, name: &str) -> Option<&Group<U>> {
        self.by_name.get(name).map(|&index| &self.groups[index])
    }

    /// Look up a group by name for mutation.
    pub fn group_mut(&mut self, name: &str) -> Option<&mut Group<U>> {
        let index = *self.by_name.get(name)?;
        self.groups.get_mut(index)
    }

    /// Look up a group by name.
    ///
    /// # Errors
    ///
    /// Returns [`SoundError::GroupNotFound`] when no group has this name.
    pub fn try_group(&self, name: &str) -> SoundResult<&Group<U>> {
        self.group(name)
            .ok_or_else(|| SoundError::GroupNotFound(name.to_string()))
    }

    /// Look up a group by id.
    #[must_use]
    pub fn group_by_id(&self, id: GroupId) -> Option<&Group<U>> {
        self.by_id.get(&id).map(|&index| &self.groups[index])
    }

    /// Look up a group by id.
    ///
    /// # Errors
    ///
    /// Returns [`SoundError::GroupIdNotFound`] when no group owns the id.
    pub fn try_group_by_id(&self, id: GroupId) -> SoundResult<&Group<U>> {
        self.group_by_id(id).ok_or(SoundError::GroupIdNotFound(id))
    }

    /// The voice currently carrying `handle`.
    ///
    /// # Errors
    ///
    /// Returns [`SoundError::GroupIdNotFound`] when the handle's group is
    /// unknown, and [`SoundError::StaleHandle`] when no voice carries it.
    pub fn try_voice(&self, handle: SoundHandle) -> SoundResult<&Voice<U>> {
        self.try_group_by_id(handle.group_id())?
            .voice(handle)
            .ok_or(SoundError::StaleHandle(handle))
    }

    /// All groups in configuration order.
    pub fn groups(&self) -> impl Iterator<Item = &Group<U>> {
        self.groups.iter()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::group::PlayPolicy;
    use crate::playback::ClipInfo;
    use crate::sim::{SimulatedBackend, SimulatedUnit};
    use crate::voice::VoiceState;
    use std::cell::Cell;
    use std::rc::Rc;

    fn config() -> MixerConfig {
        MixerConfig::empty()
            .with_group(GroupConfig::new("bgm", 2).with_policy(PlayPolicy::Exclusive))
            .with_group(GroupConfig::new("se", 3))
    }

    fn manager() -> (Manager<SimulatedUnit>, SimulatedBackend) {
        let mut backend = SimulatedBackend::new();
        let mut manager =
            Manager::new(&config(), |_, _| backend.create_unit()).expect("manager");
        manager.register_clips([
            ClipInfo::with_duration("theme", 1_000, 30.0).into_handle(),
            ClipInfo::with_duration("coin", 1_000, 0.5).into_handle(),
        ]);
        (manager, backend)
    }

    fn tick(manager: &mut Manager<SimulatedUnit>, backend: &SimulatedBackend, dt: f32) {
        backend.advance(dt);
        manager.update(dt);
    }

    #[test]
    fn test_builds_configured_groups() {
        let (manager, backend) = manager();
        assert_eq!(backend.len(), 5);
        assert_eq!(manager.groups().count(), 2);

        let se = manager.try_group("se").expect("se");
        assert_eq!(se.voices().len(), 3);
        assert_eq!(manager.group_by_id(se.id()).map(Group::name), Some("se"));
        assert_eq!(
            manager.try_group("ui").err(),
            Some(SoundError::GroupNotFound("ui".to_string()))
        );
    }

    #[test]
    fn test_rejects_invalid_config() {
        let bad = MixerConfig::empty().with_group(GroupConfig::new("se", 0));
        let result = Manager::new(&bad, |_, _| SimulatedUnit::new());
        assert!(matches!(result, Err(SoundError::NoVoices { .. })));
    }

    #[test]
    fn test_immediate_play_scenario() {
        let (mut manager, _backend) = manager();
        let handle = manager.play("se", "coin", 0.0, 0.0);

        assert!(handle.is_some());
        assert_eq!(
            Some(handle.group_id()),
            manager.group("se").map(Group::id)
        );
        assert!(manager.is_playing(handle));
        let state = manager
            .group("se")
            .and_then(|group| group.voice(handle))
            .map(|voice| voice.state());
        assert_eq!(state, Some(VoiceState::Play));
    }

    #[test]
    fn test_unknown_targets_are_noops() {
        let (mut manager, _backend) = manager();
        assert!(manager.play("ui", "coin", 0.0, 0.0).is_none());
        assert!(manager.play("se", "missing", 0.0, 0.0).is_none());
        assert_eq!(manager.volume("ui"), 0.0);
        assert!(!manager.is_group_playing("ui"));
        assert!(!manager.is_playing(SoundHandle::NONE));
        assert!(!manager.stop(SoundHandle::NONE, 0.0, 0.0));
        assert!(!manager.pause(SoundHandle::new(GroupId::from_raw(7), 1)));
        assert!(manager.on_play("ui", |_| {}).is_none());
    }

    #[test]
    fn test_handle_routing_by_group_id() {
        let (mut manager, _backend) = manager();
        let music = manager.play_loop("bgm", "theme", 0.0, 0.0);
        let coin = manager.play("se", "coin", 0.0, 0.0);

        assert!(manager.pause(coin));
        assert!(!manager.is_playing(coin));
        assert!(manager.is_playing(music));

        assert!(manager.unpause(coin));
        assert!(manager.stop(music, 0.0, 0.0));
        assert!(!manager.is_playing(music));
        assert!(manager.is_playing(coin));
    }

    #[test]
    fn test_master_and_group_volume_compose() {
        let (mut manager, _backend) = manager();
        manager.set_master_volume(0.5);
        manager.set_volume("se", 0.8);

        let se = manager.group("se").expect("se");
        for voice in se.voices() {
            assert!((voice.volume_rate() - 0.4).abs() < 1e-6);
        }
        assert!((manager.volume("se") - 0.8).abs() < 1e-6);

        manager.set_master_volume(3.0);
        assert_eq!(manager.master_volume(), 1.0);
    }

    #[test]
    fn test_clip_reference_counting() {
        let (mut manager, _backend) = manager();
        let jump = ClipInfo::new("jump", 1_000, 100).into_handle();
        assert_eq!(manager.register_clip(jump.clone()), 1);
        assert_eq!(manager.register_clip(jump.clone()), 2);
        assert_eq!(manager.register_clip(jump.clone()), 3);

        manager.unregister_clip("jump");
        manager.unregister_clip("jump");
        assert_eq!(manager.clips().ref_count("jump"), 1);

        manager.unregister_clip("jump");
        assert!(!manager.clips().contains("jump"));
        assert_eq!(manager.unregister_clip("jump"), 0);
    }

    #[test]
    fn test_unregister_keeps_playing_voice() {
        let (mut manager, _backend) = manager();
        let handle = manager.play_loop("bgm", "theme", 0.0, 0.0);
        manager.unregister_clips(["theme"]);

        assert!(!manager.clips().contains("theme"));
        assert!(manager.is_playing(handle));
        assert!(manager.play("bgm", "theme", 0.0, 0.0).is_none());
    }

    #[test]
    fn test_background_is_idempotent() {
        let (mut manager, backend) = manager();
        let handle = manager.play_loop("bgm", "theme", 0.0, 0.0);

        manager.set_background(true);
        manager.set_background(true);
        assert!(manager.is_background());
        assert!(!manager.is_playing(handle));

        tick(&mut manager, &backend, 1.0);
        manager.set_background(false);
        assert!(manager.is_playing(handle));

        manager.set_background(false);
        assert!(manager.is_playing(handle));
    }

    #[test]
    fn test_observers_and_stream_see_same_events() {
        let (mut manager, backend) = manager();
        let stream = manager.event_stream();
        let stops = Rc::new(Cell::new(0));
        let counter = Rc::clone(&stops);
        manager.on_stop("se", move |_| counter.set(counter.get() + 1));

        let music = manager.play_loop("bgm", "theme", 0.0, 0.0);
        let coin = manager.play("se", "coin", 0.0, 0.0);
        tick(&mut manager, &backend, 0.3);
        tick(&mut manager, &backend, 0.3);

        let events: Vec<_> = stream.try_iter().collect();
        assert_eq!(
            events,
            vec![
                SoundEvent::new(SoundEventKind::Played, music),
                SoundEvent::new(SoundEventKind::Played, coin),
                SoundEvent::new(SoundEventKind::Stopped, coin),
            ]
        );
        assert_eq!(events[2].group(), coin.group_id());
        assert_eq!(stops.get(), 1);
    }

    #[test]
    fn test_stop_with_fade_scenario() {
        let (mut manager, backend) = manager();
        let stops = Rc::new(Cell::new(0));
        let counter = Rc::clone(&stops);
        manager.on_stop("bgm", move |_| counter.set(counter.get() + 1));

        let handle = manager.play_loop("bgm", "theme", 0.0, 0.0);
        manager.stop(handle, 2.0, 0.0);

        tick(&mut manager, &backend, 1.0);
        let ratio = manager
            .group("bgm")
            .and_then(|group| group.voice(handle))
            .map(|voice| voice.ramp_ratio())
            .unwrap_or_default();
        assert!((ratio - 0.5).abs() < 1e-6);
        assert_eq!(stops.get(), 0);

        tick(&mut manager, &backend, 1.0);
        assert!(manager.group("bgm").and_then(|g| g.voice(handle)).is_none());
        assert_eq!(stops.get(), 1);
    }

    #[test]
    fn test_update_ignores_invalid_dt() {
        let (mut manager, _backend) = manager();
        let handle = manager.play("se", "coin", 0.0, 1.0);

        manager.update(-5.0);
        manager.update(f32::NAN);
        manager.update(f32::INFINITY);

        let group = manager.group("se").expect("se");
        assert_eq!(group.clock(), 0.0);
        assert_eq!(group.voice(handle).map(|v| v.state()), Some(VoiceState::PlayWait));
    }

    #[test]
    fn test_set_sound_volume_routes_by_handle() {
        let (mut manager, backend) = manager();
        let coin = manager.play("se", "coin", 0.0, 0.0);
        assert!(manager.set_sound_volume(coin, 0.5));
        tick(&mut manager, &backend, 0.1);

        let gain = manager
            .group("se")
            .and_then(|group| group.voice(coin))
            .map(|voice| voice.gain())
            .unwrap_or_default();
        assert!((gain - 0.5).abs() < 1e-6);
    }

    #[test]
    fn test_try_lookups_report_missing_targets() {
        let (mut manager, backend) = manager();
        let coin = manager.play("se", "coin", 0.0, 0.0);
        assert_eq!(
            manager.try_voice(coin).map(Voice::state),
            Ok(VoiceState::Play)
        );

        let foreign = SoundHandle::new(GroupId::from_name("ui"), 1);
        assert_eq!(
            manager.try_voice(foreign).err(),
            Some(SoundError::GroupIdNotFound(GroupId::from_name("ui")))
        );

        for _ in 0..3 {
            tick(&mut manager, &backend, 0.3);
        }
        assert_eq!(manager.try_voice(coin).err(), Some(SoundError::StaleHandle(coin)));
        assert_eq!(
            manager.clips().try_get("door").err(),
            Some(SoundError::ClipNotFound("door".to_string()))
        );
    }

    #[test]
    fn test_non_finite_fade_and_delay_do_not_wedge_voices() {
        let (mut manager, backend) = manager();
        let theme = manager.play_loop("se", "theme", 0.0, 0.0);
        assert!(manager.stop(theme, f32::NAN, 0.0));
        tick(&mut manager, &backend, 0.1);
        assert!(!manager.is_playing(theme));
        assert_eq!(manager.group("se").map(Group::active_count), Some(0));

        let delayed = manager.play("se", "coin", 0.0, f32::NAN);
        assert!(manager.is_playing(delayed));

        let faded = manager.play_loop("se", "theme", f32::INFINITY, 0.0);
        tick(&mut manager, &backend, 0.1);
        let gain = manager.try_voice(faded).map(Voice::gain);
        assert_eq!(gain, Ok(1.0));

        manager.set_master_volume(f32::NAN);
        manager.set_volume("se", f32::NAN);
        assert_eq!(manager.master_volume(), 1.0);
        assert_eq!(manager.volume("se"), 1.0);
    }
}
