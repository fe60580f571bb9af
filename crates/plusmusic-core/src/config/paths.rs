//! Standard locations for the stem cache and config files

use std::path::PathBuf;

/// Default stem cache root
///
/// Returns: `{platform cache dir}/plusmusic`, or `./plusmusic` when the
/// platform has none.
pub fn default_cache_root() -> PathBuf {
    dirs::cache_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("plusmusic")
}

/// Default path of a config file
///
/// Returns: `{platform config dir}/plusmusic/{filename}`
pub fn default_config_path(filename: &str) -> PathBuf {
    dirs::config_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("plusmusic")
        .join(filename)
}
