//! Reference-counted clip registry.

use ahash::AHashMap;
use chorus_common::{SoundError, SoundResult};
use tracing::debug;

use crate::playback::ClipHandle;

#[derive(Debug)]
struct Entry {
    clip: ClipHandle,
    refs: u32,
}

/// Clips available for playback by name.
///
/// Several owners may register the same clip; it stays available until each
/// of them has unregistered it. Removing a clip never affects voices that
/// are already playing it.
#[derive(Debug, Default)]
pub struct ClipRegistry {
    entries: AHashMap<String, Entry>,
}

impl ClipRegistry {
    /// Create an empty registry.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a clip under its name and return the new reference count.
    ///
    /// The first registration stores the clip; later ones only count.
    pub fn register(&mut self, clip: ClipHandle) -> u32 {
        let name = clip.name().to_string();
        let entry = self
            .entries
            .entry(name)
            .or_insert_with(|| Entry { clip, refs: 0 });
        entry.refs += 1;
        debug!("Registered clip '{}' ({} refs)", entry.clip.name(), entry.refs);
        entry.refs
    }

    /// Drop one reference and return the remaining count. The clip is
    /// evicted at zero; unknown names return 0.
    pub fn unregister(&mut self, name: &str) -> u32 {
        let Some(entry) = self.entries.get_mut(name) else {
            return 0;
        };

        entry.refs = entry.refs.saturating_sub(1);
        let refs = entry.refs;
        if refs == 0 {
            self.entries.remove(name);
            debug!("Evicted clip '{}'", name);
        }
        refs
    }

    /// Look up a clip.
    #[must_use]
    pub fn get(&self, name: &str) -> Option<&ClipHandle> {
        self.entries.get(name).map(|entry| &entry.clip)
    }

    /// Look up a clip that must be registered.
    ///
    /// # Errors
    ///
    /// Returns [`SoundError::ClipNotFound`] for unknown names.
    pub fn try_get(&self, name: &str) -> SoundResult<&ClipHandle> {
        self.get(name)
            .ok_or_else(|| SoundError::ClipNotFound(name.to_string()))
    }

    /// Current reference count (0 when absent).
    #[must_use]
    pub fn ref_count(&self, name: &str) -> u32 {
        self.entries.get(name).map_or(0, |entry| entry.refs)
    }

    /// Whether a clip is registered.
    #[must_use]
    pub fn contains(&self, name: &str) -> bool {
        self.entries.contains_key(name)
    }

    /// Number of distinct clips.
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Whether the registry is empty.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Names of all registered clips.
    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.entries.keys().map(String::as_str)
    }
}
