//! Engine configuration
//!
//! - [`EngineConfig`]: splice, mix and playback settings plus queue depths
//! - [`LoaderConfig`]: stage gating, auto-play and cache use
//! - Generic YAML load/save and the default cache and config locations
//!
//! ```ignore
//! use plusmusic_core::config::{default_config_path, load_config, EngineConfig};
//!
//! let config: EngineConfig = load_config(&default_config_path("engine.yaml"));
//! ```

mod engine;
mod io;
mod paths;

pub use engine::{EngineConfig, LoaderConfig};
pub use io::{load_config, save_config};
pub use paths::{default_cache_root, default_config_path};
