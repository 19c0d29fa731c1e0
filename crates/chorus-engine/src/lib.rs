//! Chorus Engine - scripted sessions for the Chorus voice manager.
//!
//! Provides the session configuration, the fixed-step driver and the
//! session runner used by the `chorus` binary.

#![warn(missing_docs)]
#![warn(clippy::all)]
#![deny(clippy::unwrap_used)]

pub mod config;
pub mod session;
pub mod timing;

pub use config::{ClipConfig, Cue, CueAction, EngineConfig};
pub use session::{Session, SessionReport};
pub use timing::FixedStep;
