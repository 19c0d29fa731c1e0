//! # Chorus Engine
//!
//! Runs a scripted playback session against the simulated backend.
//!
//! The session loads its mixer layout, clip catalogue and cue list from a
//! TOML file (first command-line argument, or `chorus.toml` in the working
//! directory), then ticks the voice manager on a fixed timestep and logs
//! every play, loop and stop notification.

#![warn(missing_docs)]
#![warn(clippy::all)]
#![deny(clippy::unwrap_used)]

use anyhow::{Context, Result};
use tracing::info;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use chorus_engine::{EngineConfig, Session};
use std::path::PathBuf;

/// Main entry point.
fn main() -> Result<()> {
    // Initialize tracing
    tracing_subscriber::registry()
        .with(fmt::layer())
        .with(EnvFilter::from_default_env().add_directive("chorus=info".parse()?))
        .init();

    info!("Chorus starting...");
    info!("Version: {}", env!("CARGO_PKG_VERSION"));

    let path = std::env::args()
        .nth(1)
        .map_or_else(EngineConfig::config_path, PathBuf::from);
    let mut config = EngineConfig::load_from(&path);
    config.validate();

    let mut session = Session::new(&config)
        .with_context(|| format!("Invalid mixer configuration in {}", path.display()))?;
    let report = session.run();

    info!(
        "Chorus shutdown complete ({} cues, {} ticks)",
        report.cues, report.ticks
    );
    Ok(())
}
