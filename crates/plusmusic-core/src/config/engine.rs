//! Engine and loader configuration

use std::path::PathBuf;

use serde::{Deserialize, Serialize};

use super::paths::default_cache_root;
use crate::arrangement::{ArrangementReconstructor, DEFAULT_GUARD_FRAMES, DEFAULT_OVERLAP_SECONDS};
use crate::engine::{DEFAULT_START_VOLUME, COMMAND_QUEUE_CAPACITY};
use crate::mix::{DEFAULT_CLAMP_LIMIT, DEFAULT_FILTER_VOLUME};
use crate::types::ArrangementTag;

/// Playback engine configuration
///
/// Every field has a default, so a YAML file only lists what it changes.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    /// Length of the blend window at a segment splice, in seconds
    /// Default: 0.005
    pub overlap_seconds: f64,

    /// Extra frames allocated past the arrangement length
    /// Default: 2
    pub guard_frames: usize,

    /// Wet level of the filter pass
    /// Default: 0.05
    pub filter_volume: f32,

    /// Absolute sample limit after mixing and filtering
    /// Default: 0.99
    pub clamp_limit: f32,

    /// Volume the incoming buffer set starts at
    /// Default: 0.0001
    pub start_volume: f32,

    /// Blend length used by `play(tag)`, in seconds
    /// Default: 1.0
    pub default_transition_duration: f64,

    /// Event bus depth; events past it are dropped
    /// Default: 256
    pub event_capacity: usize,

    /// Command queue depth
    /// Default: 64
    pub command_capacity: usize,

    /// Stem cache directory, `None` for the platform cache dir
    pub cache_root: Option<PathBuf>,

    pub loader: LoaderConfig,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            overlap_seconds: DEFAULT_OVERLAP_SECONDS,
            guard_frames: DEFAULT_GUARD_FRAMES,
            filter_volume: DEFAULT_FILTER_VOLUME,
            clamp_limit: DEFAULT_CLAMP_LIMIT,
            start_volume: DEFAULT_START_VOLUME,
            default_transition_duration: 1.0,
            event_capacity: 256,
            command_capacity: COMMAND_QUEUE_CAPACITY,
            cache_root: None,
            loader: LoaderConfig::default(),
        }
    }
}

impl EngineConfig {
    /// Cache directory with the platform default filled in
    pub fn resolved_cache_root(&self) -> PathBuf {
        self.cache_root.clone().unwrap_or_else(default_cache_root)
    }

    /// Reconstructor set up with this config's splice and mix settings
    pub fn reconstructor(&self) -> ArrangementReconstructor {
        ArrangementReconstructor::new(self.overlap_seconds, self.guard_frames)
            .with_filter_volume(self.filter_volume)
            .with_clamp_limit(self.clamp_limit)
    }
}

/// Track loading configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LoaderConfig {
    /// Failed stages tolerated before the rest of a request is aborted
    /// Default: 0
    pub abort_threshold: usize,

    /// Start playback once a track finishes loading
    /// Default: true
    pub auto_play: bool,

    /// Arrangement started by auto-play
    /// Default: backing_track
    pub auto_play_tag: ArrangementTag,

    /// Reconstruct every arrangement when a track loads instead of on
    /// first use
    /// Default: false
    pub prebuild_arrangements: bool,

    /// Read and write the stem cache
    /// Default: true
    pub use_cache: bool,
}

impl Default for LoaderConfig {
    fn default() -> Self {
        Self {
            abort_threshold: 0,
            auto_play: true,
            auto_play_tag: ArrangementTag::BackingTrack,
            prebuild_arrangements: false,
            use_cache: true,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_partial_yaml_keeps_defaults() {
        let yaml = "start_volume: 0.01\nloader:\n  abort_threshold: 2\n  auto_play_tag: victory\n";
        let config: EngineConfig = serde_yaml::from_str(yaml).unwrap();

        assert_eq!(config.start_volume, 0.01);
        assert_eq!(config.overlap_seconds, 0.005);
        assert_eq!(config.guard_frames, 2);
        assert_eq!(config.loader.abort_threshold, 2);
        assert_eq!(config.loader.auto_play_tag, ArrangementTag::Victory);
        assert!(config.loader.use_cache);
    }

    #[test]
    fn test_cache_root_override() {
        let config = EngineConfig {
            cache_root: Some(PathBuf::from("/tmp/pm-cache")),
            ..Default::default()
        };
        assert_eq!(config.resolved_cache_root(), PathBuf::from("/tmp/pm-cache"));
        assert!(EngineConfig::default().resolved_cache_root().ends_with("plusmusic"));
    }
}
