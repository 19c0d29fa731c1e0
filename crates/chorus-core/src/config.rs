//! Mixer configuration.
//!
//! Describes the groups a [`Manager`](crate::Manager) is built with. Volumes
//! are clamped by [`MixerConfig::validate`]; structural problems (empty or
//! duplicate names, groups without voices) are reported by
//! [`MixerConfig::check`].

use ahash::AHashMap;
use chorus_common::{GroupId, SoundError, SoundResult};
use serde::{Deserialize, Serialize};

use crate::group::PlayPolicy;
use crate::voice::unit_volume;

/// One sound group.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct GroupConfig {
    /// Group name, used for lookups and to derive the group id
    pub name: String,
    /// Number of voices (fixed for the session)
    pub voices: usize,
    /// Initial group volume (0.0 - 1.0)
    pub volume: f32,
    /// Overlap policy
    pub policy: PlayPolicy,
}

impl Default for GroupConfig {
    fn default() -> Self {
        Self {
            name: String::new(),
            voices: 2,
            volume: 1.0,
            policy: PlayPolicy::Polyphonic,
        }
    }
}

impl GroupConfig {
    /// A polyphonic group.
    #[must_use]
    pub fn new(name: impl Into<String>, voices: usize) -> Self {
        Self {
            name: name.into(),
            voices,
            ..Self::default()
        }
    }

    /// Set the overlap policy.
    #[must_use]
    pub fn with_policy(mut self, policy: PlayPolicy) -> Self {
        self.policy = policy;
        self
    }

    /// Set the initial volume.
    #[must_use]
    pub fn with_volume(mut self, volume: f32) -> Self {
        self.volume = volume;
        self
    }
}

/// Manager configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct MixerConfig {
    /// Master volume (0.0 - 1.0)
    pub master_volume: f32,
    /// Sound groups, in creation order
    pub groups: Vec<GroupConfig>,
}

impl Default for MixerConfig {
    fn default() -> Self {
        Self {
            master_volume: 1.0,
            groups: vec![
                GroupConfig::new("bgm", 2).with_policy(PlayPolicy::Exclusive),
                GroupConfig::new("se", 8),
            ],
        }
    }
}

impl MixerConfig {
    /// A configuration without groups.
    #[must_use]
    pub fn empty() -> Self {
        Self {
            master_volume: 1.0,
            groups: Vec::new(),
        }
    }

    /// Append a group.
    #[must_use]
    pub fn with_group(mut self, group: GroupConfig) -> Self {
        self.groups.push(group);
        self
    }

    /// Set the master volume.
    #[must_use]
    pub fn with_master_volume(mut self, volume: f32) -> Self {
        self.master_volume = volume;
        self
    }

    /// Clamp volumes to their valid ranges. Non-finite volumes reset to 1.0.
    pub fn validate(&mut self) {
        self.master_volume = unit_volume(self.master_volume);
        for group in &mut self.groups {
            group.volume = unit_volume(group.volume);
        }
    }

    /// Check that every group can be built and addressed unambiguously.
    ///
    /// # Errors
    ///
    /// Returns the first empty name, voiceless group, duplicate name or
    /// group id collision found.
    pub fn check(&self) -> SoundResult<()> {
        let mut seen: AHashMap<GroupId, &str> = AHashMap::with_capacity(self.groups.len());
        for group in &self.groups {
            if group.name.is_empty() {
                return Err(SoundError::EmptyGroupName);
            }
            if group.voices == 0 {
                return Err(SoundError::NoVoices {
                    group: group.name.clone(),
                });
            }

            let id = GroupId::from_name(&group.name);
            if let Some(first) = seen.insert(id, &group.name) {
                if first == group.name {
                    return Err(SoundError::DuplicateGroup(group.name.clone()));
                }
                return Err(SoundError::GroupIdCollision {
                    first: first.to_string(),
                    second: group.name.clone(),
                });
            }
        }
        Ok(())
    }

    /// Total number of voices across all groups.
    #[must_use]
    pub fn total_voices(&self) -> usize {
        self.groups.iter().map(|group| group.voices).sum()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn test_default_config() {
        let config = MixerConfig::default();
        assert_eq!(config.master_volume, 1.0);
        assert_eq!(config.groups.len(), 2);
        assert_eq!(config.groups[0].policy, PlayPolicy::Exclusive);
        assert!(config.check().is_ok());
        assert_eq!(config.total_voices(), 10);
    }

    #[test]
    fn test_validation_clamps_volumes() {
        let mut config = MixerConfig::empty()
            .with_master_volume(2.0)
            .with_group(GroupConfig::new("se", 4).with_volume(-0.5));
        config.validate();

        assert_eq!(config.master_volume, 1.0);
        assert_eq!(config.groups[0].volume, 0.0);
    }

    #[test]
    fn test_check_rejects_duplicates() {
        let config = MixerConfig::empty()
            .with_group(GroupConfig::new("se", 4))
            .with_group(GroupConfig::new("se", 2));
        assert_eq!(
            config.check(),
            Err(SoundError::DuplicateGroup("se".to_string()))
        );
    }

    #[test]
    fn test_check_rejects_voiceless_and_unnamed() {
        let config = MixerConfig::empty().with_group(GroupConfig::new("ui", 0));
        assert_eq!(
            config.check(),
            Err(SoundError::NoVoices {
                group: "ui".to_string()
            })
        );

        let config = MixerConfig::empty().with_group(GroupConfig::new("", 1));
        assert_eq!(config.check(), Err(SoundError::EmptyGroupName));
    }

    #[test]
    fn test_toml_defaults_fill_missing_fields() {
        let config: MixerConfig = toml::from_str(
            r#"
            master_volume = 0.5

            [[groups]]
            name = "bgm"
            policy = "exclusive"

            [[groups]]
            name = "se"
            voices = 6
            "#,
        )
        .expect("parse");

        assert_eq!(config.master_volume, 0.5);
        assert_eq!(config.groups[0].voices, 2);
        assert_eq!(config.groups[0].policy, PlayPolicy::Exclusive);
        assert_eq!(config.groups[1].voices, 6);
        assert_eq!(config.groups[1].volume, 1.0);
    }

    #[test]
    fn test_validate_resets_non_finite_volumes() {
        let mut config = MixerConfig::empty()
            .with_master_volume(f32::NAN)
            .with_group(GroupConfig::new("se", 1).with_volume(f32::INFINITY));
        config.validate();

        assert_eq!(config.master_volume, 1.0);
        assert_eq!(config.groups[0].volume, 1.0);
    }

    proptest! {
        #[test]
        fn prop_validated_volumes_in_range(master in -10.0f32..10.0, group in -10.0f32..10.0) {
            let mut config = MixerConfig::empty()
                .with_master_volume(master)
                .with_group(GroupConfig::new("se", 1).with_volume(group));
            config.validate();

            prop_assert!((0.0..=1.0).contains(&config.master_volume));
            prop_assert!((0.0..=1.0).contains(&config.groups[0].volume));
        }
    }
}
