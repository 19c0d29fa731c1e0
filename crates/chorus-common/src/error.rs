//! Error types for Chorus.

use thiserror::Error;

use crate::ids::{GroupId, SoundHandle};

/// Top-level error type for Chorus operations.
///
/// Playback commands never surface these to callers; they log and become
/// no-ops. The variants are returned by fallible lookups and by
/// configuration validation.
#[derive(Debug, Error, Clone, PartialEq)]
pub enum SoundError {
    /// No group is registered under this name
    #[error("Sound group not found: {0}")]
    GroupNotFound(String),

    /// No group owns this id
    #[error("Sound group not found for id {0}")]
    GroupIdNotFound(GroupId),

    /// No clip is registered under this name
    #[error("Audio clip not found: {0}")]
    ClipNotFound(String),

    /// The handle no longer refers to a live playback
    #[error("Stale sound handle: {0}")]
    StaleHandle(SoundHandle),

    /// A group was configured without any voices
    #[error("Sound group '{group}' must own at least one voice")]
    NoVoices {
        /// Group name
        group: String,
    },

    /// A group was configured with an empty name
    #[error("Sound group name must not be empty")]
    EmptyGroupName,

    /// Two groups share a name
    #[error("Duplicate sound group: {0}")]
    DuplicateGroup(String),

    /// Two different group names hash to the same id
    #[error("Sound groups '{first}' and '{second}' map to the same id")]
    GroupIdCollision {
        /// Name registered first
        first: String,
        /// Name that collided
        second: String,
    },
}

/// Result type alias for Chorus operations.
pub type SoundResult<T> = Result<T, SoundError>;
