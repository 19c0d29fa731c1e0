//! # Chorus Core
//!
//! Fixed-pool voice management.
//!
//! This crate decides when clips start, how their gain ramps and when they
//! finish. It never decodes or mixes audio; it drives [`PlaybackUnit`]s
//! supplied by a backend.
//!
//! - Voice lifecycle state machine with delayed start, fade-in, loop and end
//!   detection, delayed stop and fade-out
//! - Groups of voices with handle allocation and oldest-voice stealing
//! - A manager owning named groups, master volume, background pausing and a
//!   reference-counted clip registry
//! - Play / loop-complete / stop notifications as observers or a channel
//! - A headless simulated backend
//!
//! ## Ticking
//!
//! Everything is single-threaded and advanced by [`Manager::update`]. Each
//! voice executes once per tick; notifications raised during a command or a
//! tick are delivered before that call returns.
//!
//! ## Handles
//!
//! A [`SoundHandle`](chorus_common::SoundHandle) embeds the id of the group
//! that issued it, so handle-addressed commands never need the group name.
//! Handles of finished or stolen sounds match nothing.

#![warn(missing_docs)]
#![warn(clippy::all)]
#![deny(clippy::unwrap_used)]

pub mod config;
pub mod events;
pub mod fade;
pub mod group;
pub mod manager;
pub mod playback;
pub mod player;
pub mod registry;
pub mod sim;
pub mod voice;

/// Prelude for convenient imports
pub mod prelude {
    pub use crate::config::*;
    pub use crate::events::*;
    pub use crate::fade::*;
    pub use crate::group::*;
    pub use crate::manager::*;
    pub use crate::playback::*;
    pub use crate::player::*;
    pub use crate::registry::*;
    pub use crate::sim::*;
    pub use crate::voice::*;
}

pub use prelude::*;
