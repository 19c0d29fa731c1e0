//! # Chorus Common
//!
//! Shared types for the Chorus voice manager.
//!
//! This crate provides the foundational types used by every Chorus crate:
//! - Identifier types (`GroupId`, `SoundHandle`, `SequenceCounter`)
//! - The error taxonomy (`SoundError`)
//! - Prelude for convenient imports

#![warn(missing_docs)]
#![warn(clippy::all)]
#![deny(clippy::unwrap_used)]

pub mod error;
pub mod ids;

/// Prelude module for convenient imports
pub mod prelude {
    pub use crate::error::*;
    pub use crate::ids::*;
}

pub use prelude::*;
