//! ID types for groups and playback requests.

use std::fmt;
use std::hash::Hasher;

use rustc_hash::FxHasher;
use serde::{Deserialize, Serialize};

/// Stable numeric identifier of a sound group.
///
/// Derived from the group name, so a [`SoundHandle`] can be routed back to
/// its group without carrying the name.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct GroupId(i32);

impl GroupId {
    /// Derives the id for a group name.
    #[must_use]
    pub fn from_name(name: &str) -> Self {
        let mut hasher = FxHasher::default();
        hasher.write(name.as_bytes());
        let hash = hasher.finish();
        Self(((hash >> 32) ^ hash) as u32 as i32)
    }

    /// Creates a group id from a raw value (for deserialization).
    #[must_use]
    pub const fn from_raw(value: i32) -> Self {
        Self(value)
    }

    /// Returns the raw id value.
    #[must_use]
    pub const fn raw(self) -> i32 {
        self.0
    }
}

impl fmt::Display for GroupId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:08x}", self.0)
    }
}

/// Opaque reference to one playback request.
///
/// Handles are plain values: they own nothing and stay comparable after the
/// voice they referred to has been recycled. A stale handle matches no voice.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct SoundHandle {
    group_id: GroupId,
    sequence_id: u32,
}

impl SoundHandle {
    /// The "no playback" handle returned when a request did not happen.
    pub const NONE: Self = Self {
        group_id: GroupId(0),
        sequence_id: 0,
    };

    /// Creates a handle from its parts.
    #[must_use]
    pub const fn new(group_id: GroupId, sequence_id: u32) -> Self {
        Self {
            group_id,
            sequence_id,
        }
    }

    /// Id of the group that issued this handle.
    #[must_use]
    pub const fn group_id(&self) -> GroupId {
        self.group_id
    }

    /// Per-group sequence number. Zero only for [`SoundHandle::NONE`].
    #[must_use]
    pub const fn sequence_id(&self) -> u32 {
        self.sequence_id
    }

    /// Checks if this is the "none" handle.
    #[must_use]
    pub const fn is_none(&self) -> bool {
        self.sequence_id == 0
    }

    /// Checks if this handle refers to an actual request.
    #[must_use]
    pub const fn is_some(&self) -> bool {
        self.sequence_id != 0
    }
}

impl Default for SoundHandle {
    fn default() -> Self {
        Self::NONE
    }
}

impl fmt::Display for SoundHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.is_none() {
            f.write_str("none")
        } else {
            write!(f, "{}:{}", self.group_id, self.sequence_id)
        }
    }
}

/// Monotonic per-group sequence generator. Never yields zero.
#[derive(Debug, Clone, Default)]
pub struct SequenceCounter {
    last: u32,
}

impl SequenceCounter {
    /// Creates a counter whose first id is 1.
    #[must_use]
    pub const fn new() -> Self {
        Self { last: 0 }
    }

    /// Creates a counter that continues after `last`.
    #[must_use]
    pub const fn starting_after(last: u32) -> Self {
        Self { last }
    }

    /// Returns the next sequence id, skipping zero on wraparound.
    pub fn next_id(&mut self) -> u32 {
        self.last = self.last.wrapping_add(1);
        if self.last == 0 {
            self.last = 1;
        }
        self.last
    }

    /// The most recently issued id (0 before the first call).
    #[must_use]
    pub const fn last(&self) -> u32 {
        self.last
    }
}
