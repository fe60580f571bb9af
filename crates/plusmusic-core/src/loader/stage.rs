//! Load stages and the sequential pipeline that runs them
//!
//! ```text
//! ProjectMetadata → TrackMetadata → TrackImage → TrackAudio → AutoPlay
//! ```
//!
//! Each stage checks the stem cache before the network and writes what it
//! fetched back to the cache. A stage that fails counts towards the abort
//! threshold; once failures exceed it every remaining stage is aborted. A
//! stage whose input never arrived is aborted as well.

use std::fmt;
use std::sync::Arc;

use super::error::{LoadError, LoadResult};
use super::fetch::{CancelToken, Fetcher};
use super::track::{decode_container, decode_filter, decode_parsed, LoadedTrack};
use crate::arrangement::TrackStems;
use crate::audio::{decode_stem, StemFormat};
use crate::cache::{BlobStore, FsBlobStore, StemCache};
use crate::container::{parse_container, ParsedContainer, RawKind};
use crate::config::{EngineConfig, LoaderConfig};
use crate::metadata::{ProjectInfo, TrackInfo};
use crate::mix::FilterImpulse;
use crate::types::{ArrangementTag, Layer};

/// Stem cache shared between the loader thread and its owner
pub type SharedStemCache = StemCache<Arc<dyn BlobStore>>;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoadStage {
    ProjectMetadata,
    TrackMetadata,
    TrackImage,
    TrackAudio,
    AutoPlay,
}

impl LoadStage {
    /// Execution order
    pub const ALL: [LoadStage; 5] = [
        LoadStage::ProjectMetadata,
        LoadStage::TrackMetadata,
        LoadStage::TrackImage,
        LoadStage::TrackAudio,
        LoadStage::AutoPlay,
    ];

    pub fn name(self) -> &'static str {
        match self {
            LoadStage::ProjectMetadata => "project metadata",
            LoadStage::TrackMetadata => "track metadata",
            LoadStage::TrackImage => "track image",
            LoadStage::TrackAudio => "track audio",
            LoadStage::AutoPlay => "auto-play",
        }
    }
}

impl fmt::Display for LoadStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Outcome of one stage
#[derive(Debug, Clone, PartialEq)]
pub enum StageStatus {
    /// Served from the stem cache
    Cached,
    /// Fetched from the network
    Fetched,
    /// Ran without touching cache or network
    Completed,
    /// Nothing to do for this request
    Skipped,
    Failed(String),
    Aborted,
}

impl StageStatus {
    pub fn is_failure(&self) -> bool {
        matches!(self, StageStatus::Failed(_))
    }

    pub fn is_success(&self) -> bool {
        matches!(
            self,
            StageStatus::Cached | StageStatus::Fetched | StageStatus::Completed
        )
    }
}

/// Status of every stage of one request, in execution order
#[derive(Debug, Clone, Default, PartialEq)]
pub struct StageReport {
    stages: Vec<(LoadStage, StageStatus)>,
}

impl StageReport {
    fn record(&mut self, stage: LoadStage, status: StageStatus) {
        self.stages.push((stage, status));
    }

    pub fn status(&self, stage: LoadStage) -> Option<&StageStatus> {
        self.stages
            .iter()
            .find(|(s, _)| *s == stage)
            .map(|(_, status)| status)
    }

    pub fn failures(&self) -> usize {
        self.stages.iter().filter(|(_, status)| status.is_failure()).count()
    }

    pub fn iter(&self) -> impl Iterator<Item = &(LoadStage, StageStatus)> {
        self.stages.iter()
    }
}

/// Project a track belongs to
#[derive(Debug, Clone, PartialEq)]
pub struct ProjectRef {
    pub id: String,
    /// Project metadata JSON
    pub url: String,
}

/// What to load
#[derive(Debug, Clone, PartialEq)]
pub struct LoadRequest {
    pub track_id: String,
    /// Track metadata JSON
    pub track_url: String,
    pub project: Option<ProjectRef>,
    pub auth_token: Option<String>,
}

impl LoadRequest {
    pub fn track(track_id: impl Into<String>, track_url: impl Into<String>) -> Self {
        Self {
            track_id: track_id.into(),
            track_url: track_url.into(),
            project: None,
            auth_token: None,
        }
    }

    pub fn in_project(mut self, id: impl Into<String>, url: impl Into<String>) -> Self {
        self.project = Some(ProjectRef {
            id: id.into(),
            url: url.into(),
        });
        self
    }

    pub fn with_auth_token(mut self, token: impl Into<String>) -> Self {
        self.auth_token = Some(token.into());
        self
    }
}

/// Final result of running a request
#[derive(Debug)]
pub enum LoadOutcome {
    Loaded {
        track: Box<LoadedTrack>,
        /// Arrangement to start, when auto-play ran
        auto_play: Option<ArrangementTag>,
        report: StageReport,
    },
    Failed {
        error: LoadError,
        report: StageReport,
    },
    Cancelled {
        report: StageReport,
    },
}

/// Data gathered so far by one request
#[derive(Default)]
struct Gathered {
    project: Option<ProjectInfo>,
    info: Option<TrackInfo>,
    image: Option<Vec<u8>>,
    audio: Option<(TrackStems, Option<FilterImpulse>)>,
    auto_play: Option<ArrangementTag>,
}

/// Runs the stages of a request in order
pub struct LoadPipeline {
    fetcher: Arc<dyn Fetcher>,
    cache: Option<Arc<SharedStemCache>>,
    config: LoaderConfig,
}

impl LoadPipeline {
    pub fn new(
        fetcher: Arc<dyn Fetcher>,
        cache: Option<Arc<SharedStemCache>>,
        config: LoaderConfig,
    ) -> Self {
        // A disabled cache is never consulted
        let cache = cache.filter(|_| config.use_cache);
        Self {
            fetcher,
            cache,
            config,
        }
    }

    /// Pipeline caching on disk under the configured cache root
    pub fn from_config(fetcher: Arc<dyn Fetcher>, config: &EngineConfig) -> Self {
        let root = config.resolved_cache_root();
        log::info!("[LOADER] Caching under {}", root.display());
        let store: Arc<dyn BlobStore> = Arc::new(FsBlobStore::new(root));
        Self::new(fetcher, Some(Arc::new(StemCache::new(store))), config.loader.clone())
    }

    pub fn config(&self) -> &LoaderConfig {
        &self.config
    }

    /// Run every stage, reporting the completed fraction after each
    ///
    /// # Arguments
    /// * `request` - Track (and optional project) to load
    /// * `token` - Checked between stages; a cancelled run stops at the next one
    /// * `progress` - Called with `1/5`, `2/5`, ... as stages finish
    ///
    /// # Returns
    /// `Loaded` with the auto-play tag when every required stage succeeded,
    /// `Failed` with the last error otherwise, `Cancelled` when the token
    /// fired. The stage report is attached in every case.
    pub fn run(
        &self,
        request: &LoadRequest,
        token: &CancelToken,
        mut progress: impl FnMut(f32),
    ) -> LoadOutcome {
        let mut report = StageReport::default();
        let mut gathered = Gathered::default();
        let mut last_error = None;
        let total = LoadStage::ALL.len() as f32;

        for (done, stage) in LoadStage::ALL.into_iter().enumerate() {
            if token.is_cancelled() {
                log::info!("[LOADER] Load of {} cancelled before {}", request.track_id, stage);
                return LoadOutcome::Cancelled { report };
            }

            let status = if report.failures() > self.config.abort_threshold {
                StageStatus::Aborted
            } else {
                match self.run_stage(stage, request, &mut gathered) {
                    Ok(status) => status,
                    Err(LoadError::Aborted(_)) => StageStatus::Aborted,
                    Err(e) => {
                        log::warn!("[LOADER] {} failed for {}: {}", stage, request.track_id, e);
                        let status = StageStatus::Failed(e.to_string());
                        last_error = Some(e);
                        status
                    }
                }
            };
            log::debug!("[LOADER] {}: {:?}", stage, status);
            report.record(stage, status);
            progress((done + 1) as f32 / total);
        }

        match (gathered.info, gathered.audio) {
            (Some(info), Some((stems, filter))) => {
                log::info!("[LOADER] Loaded track {} ({})", info.id, info.title);
                LoadOutcome::Loaded {
                    track: Box::new(LoadedTrack {
                        info,
                        project: gathered.project,
                        stems,
                        filter,
                        image: gathered.image,
                    }),
                    auto_play: gathered.auto_play,
                    report,
                }
            }
            _ => LoadOutcome::Failed {
                error: last_error.unwrap_or_else(|| LoadError::NoAudio(request.track_id.clone())),
                report,
            },
        }
    }

    fn run_stage(
        &self,
        stage: LoadStage,
        request: &LoadRequest,
        gathered: &mut Gathered,
    ) -> LoadResult<StageStatus> {
        let auth = request.auth_token.as_deref();
        match stage {
            LoadStage::ProjectMetadata => {
                let Some(project) = &request.project else {
                    return Ok(StageStatus::Skipped);
                };
                if let Some(info) = self
                    .cache_get(|cache| cache.get_project_metadata(&project.id))
                    .and_then(|json| parse_cached(&project.id, ProjectInfo::from_json(&json)))
                {
                    gathered.project = Some(info);
                    return Ok(StageStatus::Cached);
                }
                let json = self.fetcher.fetch_json(&project.url, auth)?;
                gathered.project = Some(ProjectInfo::from_json(&json)?);
                self.cache_put(|cache| cache.put_project_metadata(&project.id, &json));
                Ok(StageStatus::Fetched)
            }

            LoadStage::TrackMetadata => {
                if let Some(info) = self
                    .cache_get(|cache| cache.get_track_metadata(&request.track_id))
                    .and_then(|json| parse_cached(&request.track_id, TrackInfo::from_json(&json)))
                {
                    gathered.info = Some(info);
                    return Ok(StageStatus::Cached);
                }
                let json = self.fetcher.fetch_json(&request.track_url, auth)?;
                gathered.info = Some(TrackInfo::from_json(&json)?);
                self.cache_put(|cache| cache.put_track_metadata(&request.track_id, &json));
                Ok(StageStatus::Fetched)
            }

            LoadStage::TrackImage => {
                let info = gathered.info.as_ref().ok_or(LoadError::Aborted(stage))?;
                let Some(url) = info.image_url.as_deref() else {
                    return Ok(StageStatus::Skipped);
                };
                if let Some(bytes) = self.cache_get(|cache| cache.get_image(&info.id)) {
                    gathered.image = Some(bytes);
                    return Ok(StageStatus::Cached);
                }
                let bytes = self.fetcher.fetch_binary(url, auth)?;
                self.cache_put(|cache| cache.put_image(&info.id, &bytes));
                gathered.image = Some(bytes);
                Ok(StageStatus::Fetched)
            }

            LoadStage::TrackAudio => {
                let info = gathered.info.as_ref().ok_or(LoadError::Aborted(stage))?;
                if let Some(audio) = self.cached_stems(info) {
                    gathered.audio = Some(audio);
                    return Ok(StageStatus::Cached);
                }
                if let Some(bytes) = self.cache_get(|cache| cache.get_container(&info.id)) {
                    match decode_container(&info.id, &bytes) {
                        Ok(audio) => {
                            gathered.audio = Some(audio);
                            return Ok(StageStatus::Cached);
                        }
                        Err(e) => log::warn!("[LOADER] Cached container for {} unusable: {}", info.id, e),
                    }
                }

                let url = info
                    .audio_url
                    .as_deref()
                    .ok_or_else(|| LoadError::MissingAudioUrl(info.id.clone()))?;

                match url_extension(url).and_then(StemFormat::from_extension) {
                    // A plain audio file is a single-track song
                    Some(format) => {
                        let buffer = self.fetcher.fetch_audio(url, auth, format)?;
                        let mut stems = TrackStems::default();
                        stems.insert(Layer::FullMix, buffer);
                        gathered.audio = Some((stems, None));
                    }
                    None => {
                        let bytes = self.fetcher.fetch_binary(url, auth)?;
                        let parsed = parse_container(&bytes)?;
                        gathered.audio = Some(decode_parsed(&info.id, &parsed)?);
                        self.cache_put(|cache| cache.put_container(&info.id, &bytes));
                        self.persist_stems(&info.id, &parsed);
                    }
                }
                Ok(StageStatus::Fetched)
            }

            LoadStage::AutoPlay => {
                if !self.config.auto_play {
                    return Ok(StageStatus::Skipped);
                }
                let (Some(info), Some(_)) = (&gathered.info, &gathered.audio) else {
                    return Err(LoadError::Aborted(stage));
                };
                let tag = self.config.auto_play_tag;
                if info.arrangement_info(tag).is_none() {
                    return Err(LoadError::MissingArrangement(tag));
                }
                gathered.auto_play = Some(tag);
                Ok(StageStatus::Completed)
            }
        }
    }

    /// Rebuild stems from per-layer cache entries
    ///
    /// Needs all four stems, and the filter blob when the track declares a
    /// filter; anything less falls back to the cached container.
    fn cached_stems(&self, info: &TrackInfo) -> Option<(TrackStems, Option<FilterImpulse>)> {
        let cache = self.cache.as_deref()?;
        if !cache.has_all_stems(&info.id) {
            return None;
        }

        let mut stems = TrackStems::default();
        for layer in Layer::ALL {
            let Some(chunk) = cache.get_layer(&info.id, layer) else {
                if layer == Layer::FullMix {
                    continue;
                }
                return None;
            };
            match decode_stem(&chunk) {
                Ok(buffer) => stems.insert(layer, buffer),
                Err(e) => {
                    log::warn!("[LOADER] Cached {} stem of {} unusable: {}", layer.name(), info.id, e);
                    return None;
                }
            }
        }

        let filter = cache
            .get_filter(&info.id)
            .and_then(|raw| decode_filter(&info.id, &raw));
        if info.has_filter && filter.is_none() {
            return None;
        }
        Some((stems, filter))
    }

    /// Write each stem, and the filter impulse, as its own cache entry
    fn persist_stems(&self, track_id: &str, parsed: &ParsedContainer) {
        for layer in Layer::ALL {
            if let Some(chunk) = parsed.stem(layer) {
                self.cache_put(|cache| cache.put_layer(track_id, layer, chunk));
            }
        }
        if let Some(raw) = parsed.raw_of(RawKind::FilterImpulse) {
            self.cache_put(|cache| cache.put_filter(track_id, raw));
        }
    }

    fn cache_get<T>(&self, read: impl FnOnce(&SharedStemCache) -> Option<T>) -> Option<T> {
        self.cache.as_deref().and_then(read)
    }

    /// Persisting is best effort; a failed write only costs a refetch later
    fn cache_put(&self, write: impl FnOnce(&SharedStemCache) -> crate::cache::CacheResult<()>) {
        if let Some(cache) = self.cache.as_deref() {
            if let Err(e) = write(cache) {
                log::warn!("[LOADER] Cache write failed: {}", e);
            }
        }
    }
}

fn parse_cached<T, E: fmt::Display>(id: &str, parsed: Result<T, E>) -> Option<T> {
    match parsed {
        Ok(value) => Some(value),
        Err(e) => {
            log::warn!("[LOADER] Cached metadata for {} is invalid, refetching: {}", id, e);
            None
        }
    }
}

/// Extension of the last path segment, ignoring any query string
fn url_extension(url: &str) -> Option<&str> {
    let path = url.split(['?', '#']).next()?;
    let name = path.rsplit('/').next()?;
    name.rsplit_once('.').map(|(_, ext)| ext)
}
