//! Playback unit and clip abstractions.
//!
//! The core never decodes or mixes audio. It drives a [`PlaybackUnit`] (one
//! per voice) and hands it an opaque [`AudioClip`]. Backends implement these
//! traits on top of whatever output they use; [`crate::sim`] provides a
//! headless implementation.

use std::fmt::Debug;
use std::sync::Arc;
use std::time::Duration;

/// Decoded audio data as seen by the voice manager.
pub trait AudioClip: Debug + Send + Sync {
    /// Stable name used as the registry key.
    fn name(&self) -> &str;

    /// Sample rate in Hz.
    fn sample_rate(&self) -> u32;

    /// Number of samples per channel.
    fn total_samples(&self) -> u64;

    /// Playback length of the clip.
    fn duration(&self) -> Duration {
        let rate = self.sample_rate();
        if rate == 0 {
            return Duration::ZERO;
        }
        Duration::from_secs_f64(self.total_samples() as f64 / f64::from(rate))
    }
}

/// Shared reference to a clip. Voices hold their own copy, independent of
/// the registry.
pub type ClipHandle = Arc<dyn AudioClip>;

/// Plain clip descriptor for backends that keep sample data elsewhere.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClipInfo {
    name: String,
    sample_rate: u32,
    total_samples: u64,
}

impl ClipInfo {
    /// Create a clip descriptor.
    #[must_use]
    pub fn new(name: impl Into<String>, sample_rate: u32, total_samples: u64) -> Self {
        Self {
            name: name.into(),
            sample_rate,
            total_samples,
        }
    }

    /// Create a descriptor from a length in seconds.
    #[must_use]
    pub fn with_duration(name: impl Into<String>, sample_rate: u32, seconds: f64) -> Self {
        let total_samples = (seconds.max(0.0) * f64::from(sample_rate)).round() as u64;
        Self::new(name, sample_rate, total_samples)
    }

    /// Wrap into a shareable [`ClipHandle`].
    #[must_use]
    pub fn into_handle(self) -> ClipHandle {
        Arc::new(self)
    }
}

impl AudioClip for ClipInfo {
    fn name(&self) -> &str {
        &self.name
    }

    fn sample_rate(&self) -> u32 {
        self.sample_rate
    }

    fn total_samples(&self) -> u64 {
        self.total_samples
    }
}

/// A controllable output slot owned by one voice.
///
/// `position` must advance monotonically while playing and drop back
/// (to the loop start, or to zero at a natural end) when the clip wraps;
/// the voice detects completion from that drop.
pub trait PlaybackUnit {
    /// Attach a clip, or detach with `None`.
    fn set_clip(&mut self, clip: Option<ClipHandle>);

    /// Set whether playback restarts at the end of the clip.
    fn set_looping(&mut self, looping: bool);

    /// Whether playback restarts at the end of the clip.
    fn is_looping(&self) -> bool;

    /// Set the output gain (0.0-1.0).
    fn set_volume(&mut self, volume: f32);

    /// Start playback from the beginning of the attached clip.
    fn play(&mut self);

    /// Pause playback, keeping the position.
    fn pause(&mut self);

    /// Resume paused playback.
    fn resume(&mut self);

    /// Stop playback and rewind.
    fn stop(&mut self);

    /// Whether the unit is currently producing sound (false while paused).
    fn is_playing(&self) -> bool;

    /// Current playback position in samples.
    fn position(&self) -> u64;

    /// Activate or park the unit. Parked units are idle voices.
    fn set_active(&mut self, _active: bool) {}
}
