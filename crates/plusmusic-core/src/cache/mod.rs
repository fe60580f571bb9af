//! Stem cache store
//!
//! Persists extracted stems, whole containers, artwork and metadata JSON so
//! a track can be reloaded without touching the network. Storage is a plain
//! key to blob abstraction ([`BlobStore`]) with a filesystem and an
//! in-memory backend.
//!
//! ```text
//! {root}/
//!   projects/{id}/{id}_meta.json
//!   tracks/{id}/{id}_meta.json
//!   tracks/{id}/{id}_image.img
//!   tracks/{id}/{id}_audio.aai
//!   tracks/{id}/{id}_{bass|drums|topmix|vocals|fullmix}.loud
//!   tracks/{id}/{id}_filter.raw
//! ```

mod error;
mod key;
mod stem_cache;
mod store;

pub use error::{CacheError, CacheResult};
pub use key::{CacheKey, CacheScope, CONTAINER_EXTENSION, LAYER_EXTENSION};
pub use stem_cache::StemCache;
pub use store::{BlobStore, FsBlobStore, MemoryBlobStore};
