//! Structured cache keys
//!
//! Every blob lives at `{tracks|projects}/{id}/{id}_{kind}{ext}` relative to
//! the cache root.

use std::fmt;
use std::path::PathBuf;

use super::error::{CacheError, CacheResult};
use crate::types::Layer;

/// Top-level cache directory
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CacheScope {
    Tracks,
    Projects,
}

impl CacheScope {
    pub fn dir_name(self) -> &'static str {
        match self {
            CacheScope::Tracks => "tracks",
            CacheScope::Projects => "projects",
        }
    }
}

/// Extension for a single extracted stem
pub const LAYER_EXTENSION: &str = ".loud";
/// Extension for a whole container
pub const CONTAINER_EXTENSION: &str = ".aai";
/// Kind-and-extension suffix for metadata JSON
const META_SUFFIX: &str = "meta";
const META_EXTENSION: &str = ".json";
const IMAGE_SUFFIX: &str = "image";
const IMAGE_EXTENSION: &str = ".img";
const CONTAINER_SUFFIX: &str = "audio";
const FILTER_SUFFIX: &str = "filter";
const FILTER_EXTENSION: &str = ".raw";

/// A validated cache location
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct CacheKey {
    scope: CacheScope,
    id: String,
    kind: String,
    extension: &'static str,
}

impl CacheKey {
    fn build(scope: CacheScope, id: &str, kind: &str, extension: &'static str) -> CacheResult<Self> {
        validate_id(id)?;
        Ok(Self {
            scope,
            id: id.to_string(),
            kind: kind.to_string(),
            extension,
        })
    }

    /// One extracted stem of a track
    pub fn layer(track_id: &str, layer: Layer) -> CacheResult<Self> {
        Self::build(CacheScope::Tracks, track_id, layer.name(), LAYER_EXTENSION)
    }

    /// The whole container of a track
    pub fn container(track_id: &str) -> CacheResult<Self> {
        Self::build(CacheScope::Tracks, track_id, CONTAINER_SUFFIX, CONTAINER_EXTENSION)
    }

    /// Filter impulse chunk extracted from a track's container
    pub fn filter(track_id: &str) -> CacheResult<Self> {
        Self::build(CacheScope::Tracks, track_id, FILTER_SUFFIX, FILTER_EXTENSION)
    }

    pub fn track_metadata(track_id: &str) -> CacheResult<Self> {
        Self::build(CacheScope::Tracks, track_id, META_SUFFIX, META_EXTENSION)
    }

    pub fn project_metadata(project_id: &str) -> CacheResult<Self> {
        Self::build(CacheScope::Projects, project_id, META_SUFFIX, META_EXTENSION)
    }

    pub fn image(track_id: &str) -> CacheResult<Self> {
        Self::build(CacheScope::Tracks, track_id, IMAGE_SUFFIX, IMAGE_EXTENSION)
    }

    /// Directory holding every blob of one track or project
    pub fn directory(scope: CacheScope, id: &str) -> CacheResult<PathBuf> {
        validate_id(id)?;
        Ok(PathBuf::from(scope.dir_name()).join(id))
    }

    pub fn scope(&self) -> CacheScope {
        self.scope
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    /// Path relative to the cache root
    pub fn path(&self) -> PathBuf {
        PathBuf::from(self.scope.dir_name())
            .join(&self.id)
            .join(format!("{}_{}{}", self.id, self.kind, self.extension))
    }
}

impl fmt::Display for CacheKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.path().display())
    }
}

fn validate_id(id: &str) -> CacheResult<()> {
    if id.is_empty() || id == "." || id == ".." || id.contains(['/', '\\']) {
        return Err(CacheError::InvalidId(id.to_string()));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::Path;

    #[test]
    fn test_layer_key_path() {
        let key = CacheKey::layer("1234", Layer::TopMix).unwrap();
        assert_eq!(key.path(), Path::new("tracks/1234/1234_topmix.loud"));
    }

    #[test]
    fn test_metadata_keys() {
        assert_eq!(
            CacheKey::project_metadata("p9").unwrap().path(),
            Path::new("projects/p9/p9_meta.json")
        );
        assert_eq!(
            CacheKey::track_metadata("t1").unwrap().path(),
            Path::new("tracks/t1/t1_meta.json")
        );
        assert_eq!(
            CacheKey::container("t1").unwrap().path(),
            Path::new("tracks/t1/t1_audio.aai")
        );
    }

    #[test]
    fn test_rejects_path_like_ids() {
        assert!(CacheKey::layer("../etc", Layer::Bass).is_err());
        assert!(CacheKey::image("").is_err());
        assert!(CacheKey::directory(CacheScope::Tracks, "..").is_err());
    }
}
