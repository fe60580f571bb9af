//! Network seam and cooperative cancellation

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, RwLock};

use super::error::{LoadError, LoadResult};
use crate::audio::{decode_payload, StemFormat};
use crate::types::AudioBuffer;

/// Blocking fetch operations the loader thread depends on
///
/// Retry and backoff are the implementor's business.
pub trait Fetcher: Send + Sync {
    fn fetch_json(&self, url: &str, auth_token: Option<&str>) -> LoadResult<String>;

    fn fetch_binary(&self, url: &str, auth_token: Option<&str>) -> LoadResult<Vec<u8>>;

    /// Fetch and decode a standalone audio file
    fn fetch_audio(
        &self,
        url: &str,
        auth_token: Option<&str>,
        format: StemFormat,
    ) -> LoadResult<AudioBuffer>;
}

/// Fetcher serving fixed payloads by url
///
/// Used for offline bundles and in tests. Counts requests per url.
#[derive(Debug, Default)]
pub struct MemoryFetcher {
    payloads: RwLock<HashMap<String, Vec<u8>>>,
    hits: RwLock<HashMap<String, usize>>,
}

impl MemoryFetcher {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&self, url: impl Into<String>, bytes: impl Into<Vec<u8>>) {
        if let Ok(mut map) = self.payloads.write() {
            map.insert(url.into(), bytes.into());
        }
    }

    /// How many times `url` was requested
    pub fn requests(&self, url: &str) -> usize {
        self.hits
            .read()
            .ok()
            .and_then(|map| map.get(url).copied())
            .unwrap_or(0)
    }

    fn get(&self, url: &str) -> LoadResult<Vec<u8>> {
        if let Ok(mut hits) = self.hits.write() {
            *hits.entry(url.to_string()).or_insert(0) += 1;
        }
        self.payloads
            .read()
            .ok()
            .and_then(|map| map.get(url).cloned())
            .ok_or_else(|| LoadError::fetch(url, "not found"))
    }
}

impl Fetcher for MemoryFetcher {
    fn fetch_json(&self, url: &str, _auth_token: Option<&str>) -> LoadResult<String> {
        let bytes = self.get(url)?;
        String::from_utf8(bytes).map_err(|e| LoadError::fetch(url, e))
    }

    fn fetch_binary(&self, url: &str, _auth_token: Option<&str>) -> LoadResult<Vec<u8>> {
        self.get(url)
    }

    fn fetch_audio(
        &self,
        url: &str,
        _auth_token: Option<&str>,
        format: StemFormat,
    ) -> LoadResult<AudioBuffer> {
        let bytes = self.get(url)?;
        // Standalone files carry their own channel layout
        Ok(decode_payload(format, &bytes, 0, 0)?)
    }
}

/// Shared cancellation flag, checked between load stages
#[derive(Debug, Clone, Default)]
pub struct CancelToken {
    cancelled: Arc<AtomicBool>,
}

impl CancelToken {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.cancelled.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancelled.load(Ordering::SeqCst)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_memory_fetcher() {
        let fetcher = MemoryFetcher::new();
        fetcher.insert("mem://track.json", "{\"id\":\"t1\"}");

        assert_eq!(fetcher.fetch_json("mem://track.json", None).unwrap(), "{\"id\":\"t1\"}");
        assert!(matches!(
            fetcher.fetch_binary("mem://missing", Some("token")),
            Err(LoadError::Fetch { .. })
        ));
        assert_eq!(fetcher.requests("mem://track.json"), 1);
        assert_eq!(fetcher.requests("mem://missing"), 1);
    }

    #[test]
    fn test_cancel_token_is_shared() {
        let token = CancelToken::new();
        let clone = token.clone();
        assert!(!clone.is_cancelled());
        token.cancel();
        assert!(clone.is_cancelled());
    }
}
