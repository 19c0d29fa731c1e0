//! Session configuration.
//!
//! Describes the mixer layout, the clip catalogue and the scripted cues a
//! session plays. Configuration can be loaded from and saved to a TOML file.

use chorus_core::{ClipHandle, ClipInfo, GroupConfig, MixerConfig, PlayPolicy};
use serde::{Deserialize, Serialize};
use std::fs;
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use tracing::{info, warn};

/// Configuration file name.
const CONFIG_FILE: &str = "chorus.toml";

const DEFAULT_FRAME_MS: f32 = 1000.0 / 60.0;
const DEFAULT_SESSION_SECONDS: f32 = 10.0;

fn finite_or(value: f32, fallback: f32) -> f32 {
    if value.is_finite() {
        value
    } else {
        fallback
    }
}

/// One clip made available to the session.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ClipConfig {
    /// Registry name
    pub name: String,
    /// Sample rate in Hz
    pub sample_rate: u32,
    /// Length in seconds
    pub seconds: f64,
}

impl Default for ClipConfig {
    fn default() -> Self {
        Self {
            name: String::new(),
            sample_rate: 48_000,
            seconds: 1.0,
        }
    }
}

impl ClipConfig {
    fn new(name: &str, seconds: f64) -> Self {
        Self {
            name: name.to_string(),
            seconds,
            ..Self::default()
        }
    }

    /// Build the clip descriptor.
    #[must_use]
    pub fn to_clip(&self) -> ClipHandle {
        ClipInfo::with_duration(self.name.clone(), self.sample_rate, self.seconds).into_handle()
    }
}

/// A command issued by the session script.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "action", rename_all = "snake_case")]
pub enum CueAction {
    /// Play a clip once
    Play {
        /// Target group
        group: String,
        /// Clip name
        clip: String,
        /// Fade-in seconds
        #[serde(default)]
        fade: f32,
        /// Start delay seconds
        #[serde(default)]
        delay: f32,
    },
    /// Play a clip in a loop
    PlayLoop {
        /// Target group
        group: String,
        /// Clip name
        clip: String,
        /// Fade-in seconds
        #[serde(default)]
        fade: f32,
        /// Start delay seconds
        #[serde(default)]
        delay: f32,
    },
    /// Stop every voice of a group
    StopGroup {
        /// Target group
        group: String,
        /// Fade-out seconds
        #[serde(default)]
        fade: f32,
    },
    /// Stop every voice
    StopAll {
        /// Fade-out seconds
        #[serde(default)]
        fade: f32,
    },
    /// Change a group volume
    SetVolume {
        /// Target group
        group: String,
        /// New volume
        volume: f32,
    },
    /// Change the master volume
    SetMasterVolume {
        /// New volume
        volume: f32,
    },
    /// Enter or leave the background
    Background {
        /// Whether the session is in the background
        enabled: bool,
    },
}

/// A cue scheduled at a session time.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Cue {
    /// Session time in seconds
    pub at: f32,
    /// What to do
    #[serde(flatten)]
    pub action: CueAction,
}

impl Cue {
    fn new(at: f32, action: CueAction) -> Self {
        Self { at, action }
    }
}

/// Session configuration parameters.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    // === Timing ===
    /// Fixed mixer updates per second
    pub tick_rate: u32,
    /// Simulated frame time in milliseconds
    pub frame_ms: f32,
    /// Session length in seconds
    pub session_seconds: f32,

    // === Debug ===
    /// Log every playback event at info level
    pub log_events: bool,

    // === Mixer ===
    /// Groups and master volume
    pub mixer: MixerConfig,

    // === Content ===
    /// Clip catalogue
    pub clips: Vec<ClipConfig>,
    /// Scripted cues, in any order
    pub cues: Vec<Cue>,
}

impl Default for EngineConfig {
    fn default() -> Self {
        let play = |group: &str, clip: &str, fade: f32, delay: f32| CueAction::Play {
            group: group.to_string(),
            clip: clip.to_string(),
            fade,
            delay,
        };
        let play_loop = |group: &str, clip: &str, fade: f32| CueAction::PlayLoop {
            group: group.to_string(),
            clip: clip.to_string(),
            fade,
            delay: 0.0,
        };

        Self {
            // Timing
            tick_rate: 60,
            frame_ms: DEFAULT_FRAME_MS,
            session_seconds: DEFAULT_SESSION_SECONDS,

            // Debug
            log_events: true,

            // Mixer
            mixer: MixerConfig::empty()
                .with_group(GroupConfig::new("bgm", 2).with_policy(PlayPolicy::Exclusive))
                .with_group(GroupConfig::new("se", 8))
                .with_group(GroupConfig::new("voice", 1).with_volume(0.9)),

            // Content
            clips: vec![
                ClipConfig::new("field_theme", 24.0),
                ClipConfig::new("battle_theme", 16.0),
                ClipConfig::new("coin", 0.3),
                ClipConfig::new("door", 0.8),
                ClipConfig::new("greeting", 1.2),
            ],
            cues: vec![
                Cue::new(0.0, play_loop("bgm", "field_theme", 1.0)),
                Cue::new(0.5, play("se", "coin", 0.0, 0.0)),
                Cue::new(0.6, play("se", "coin", 0.0, 0.25)),
                Cue::new(1.0, play("voice", "greeting", 0.0, 0.0)),
                Cue::new(1.5, play("se", "door", 0.1, 0.0)),
                Cue::new(2.0, CueAction::Background { enabled: true }),
                Cue::new(3.0, CueAction::Background { enabled: false }),
                Cue::new(4.0, play_loop("bgm", "battle_theme", 2.0)),
                Cue::new(5.0, play("se", "coin", 0.0, 0.0)),
                Cue::new(
                    6.0,
                    CueAction::SetVolume {
                        group: "se".to_string(),
                        volume: 0.5,
                    },
                ),
                Cue::new(6.5, CueAction::SetMasterVolume { volume: 0.8 }),
                Cue::new(8.0, CueAction::StopAll { fade: 1.0 }),
            ],
        }
    }
}

impl EngineConfig {
    /// Load configuration from a specific path.
    /// Returns default config if file doesn't exist or is invalid.
    pub fn load_from<P: AsRef<Path>>(path: P) -> Self {
        let path = path.as_ref();

        if !path.exists() {
            info!("Config file not found, using defaults");
            return Self::default();
        }

        let contents = match fs::read_to_string(path) {
            Ok(contents) => contents,
            Err(e) => {
                warn!("Failed to read config file {}: {e}", path.display());
                return Self::default();
            },
        };

        match toml::from_str(&contents) {
            Ok(config) => {
                info!("Loaded config from {}", path.display());
                config
            },
            Err(e) => {
                warn!("Failed to parse config file {}: {e}", path.display());
                Self::default()
            },
        }
    }

    /// Save configuration to a specific path.
    pub fn save_to<P: AsRef<Path>>(&self, path: P) -> io::Result<()> {
        let path = path.as_ref();

        // Create parent directories if needed
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }

        let contents = toml::to_string_pretty(self)
            .map_err(|e| io::Error::new(io::ErrorKind::InvalidData, e))?;

        let mut file = fs::File::create(path)?;
        file.write_all(contents.as_bytes())?;

        info!("Saved config to {}", path.display());
        Ok(())
    }

    /// Default configuration file path (working directory).
    pub fn config_path() -> PathBuf {
        PathBuf::from(CONFIG_FILE)
    }

    /// Validate and clamp configuration values to sensible ranges.
    pub fn validate(&mut self) {
        // Timing
        self.tick_rate = self.tick_rate.clamp(10, 1000);
        self.frame_ms = finite_or(self.frame_ms, DEFAULT_FRAME_MS).clamp(1.0, 250.0);
        self.session_seconds =
            finite_or(self.session_seconds, DEFAULT_SESSION_SECONDS).clamp(0.0, 3600.0);

        // Mixer
        self.mixer.validate();

        // Content
        for clip in &mut self.clips {
            clip.sample_rate = clip.sample_rate.clamp(8_000, 192_000);
            clip.seconds = clip.seconds.max(0.0);
        }
        self.cues.retain(|cue| {
            let keep = cue.at.is_finite();
            if !keep {
                warn!("Dropping cue with invalid time {}: {:?}", cue.at, cue.action);
            }
            keep
        });
        self.cues.sort_by(|a, b| a.at.total_cmp(&b.at));
    }

    /// Ticks a full session takes at the configured rate.
    #[must_use]
    pub fn session_ticks(&self) -> u64 {
        (f64::from(self.session_seconds) * f64::from(self.tick_rate)).ceil() as u64
    }
}
