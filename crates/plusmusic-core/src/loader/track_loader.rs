//! Background track loader
//!
//! One worker thread takes requests in FIFO order and runs them one at a
//! time through a [`LoadPipeline`]. Progress and results come back as
//! [`LoaderEvent`]s on a crossbeam channel, so a host can poll them from its
//! tick loop or forward them to [`AudioEngine::handle_loader_event`].
//!
//! [`AudioEngine::handle_loader_event`]: crate::engine::AudioEngine::handle_loader_event

use std::sync::atomic::{AtomicU64, Ordering};
use std::thread::{self, JoinHandle};

use crossbeam::channel::{self, Receiver, Sender};

use super::error::{LoadError, LoadResult};
use super::fetch::CancelToken;
use super::stage::{LoadOutcome, LoadPipeline, LoadRequest, StageReport};
use super::track::LoadedTrack;
use crate::types::ArrangementTag;

/// Messages from the loader thread
#[derive(Debug)]
pub enum LoaderEvent {
    /// Fraction of the request's stages finished (0.0 - 1.0)
    Progress { request_id: u64, fraction: f32 },
    Loaded {
        request_id: u64,
        track: Box<LoadedTrack>,
        /// Arrangement to start right away
        auto_play: Option<ArrangementTag>,
        report: StageReport,
    },
    Failed {
        request_id: u64,
        error: String,
        report: StageReport,
    },
    Cancelled { request_id: u64 },
}

impl LoaderEvent {
    pub fn request_id(&self) -> u64 {
        match self {
            LoaderEvent::Progress { request_id, .. }
            | LoaderEvent::Loaded { request_id, .. }
            | LoaderEvent::Failed { request_id, .. }
            | LoaderEvent::Cancelled { request_id } => *request_id,
        }
    }
}

/// Handle to a queued request
#[derive(Debug, Clone)]
pub struct LoadHandle {
    pub id: u64,
    token: CancelToken,
}

impl LoadHandle {
    /// Stop the request before its next stage; a queued request never starts
    pub fn cancel(&self) {
        self.token.cancel();
    }

    pub fn is_cancelled(&self) -> bool {
        self.token.is_cancelled()
    }
}

struct Job {
    id: u64,
    request: LoadRequest,
    token: CancelToken,
}

pub struct TrackLoader {
    request_tx: Sender<Job>,
    event_rx: Receiver<LoaderEvent>,
    next_id: AtomicU64,
    _handle: JoinHandle<()>,
}

impl TrackLoader {
    /// Spawn the loader thread
    pub fn new(pipeline: LoadPipeline) -> LoadResult<Self> {
        let (request_tx, request_rx) = channel::unbounded::<Job>();
        let (event_tx, event_rx) = channel::unbounded::<LoaderEvent>();

        let handle = thread::Builder::new()
            .name("track-loader".to_string())
            .spawn(move || loader_thread(pipeline, request_rx, event_tx))
            .map_err(LoadError::Spawn)?;

        Ok(Self {
            request_tx,
            event_rx,
            next_id: AtomicU64::new(1),
            _handle: handle,
        })
    }

    /// Queue a request behind any already queued
    pub fn load(&self, request: LoadRequest) -> LoadResult<LoadHandle> {
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        let token = CancelToken::new();
        log::info!("[LOADER] Queued request {} for track {}", id, request.track_id);

        self.request_tx
            .send(Job {
                id,
                request,
                token: token.clone(),
            })
            .map_err(|_| LoadError::Disconnected)?;
        Ok(LoadHandle { id, token })
    }

    /// Clonable receiver for the loader's events
    pub fn events(&self) -> Receiver<LoaderEvent> {
        self.event_rx.clone()
    }

    pub fn try_recv(&self) -> Option<LoaderEvent> {
        self.event_rx.try_recv().ok()
    }
}

fn loader_thread(pipeline: LoadPipeline, rx: Receiver<Job>, tx: Sender<LoaderEvent>) {
    log::info!("[LOADER] Loader thread started");

    while let Ok(job) = rx.recv() {
        let start = std::time::Instant::now();
        let request_id = job.id;

        let outcome = pipeline.run(&job.request, &job.token, |fraction| {
            let _ = tx.send(LoaderEvent::Progress { request_id, fraction });
        });

        let event = match outcome {
            LoadOutcome::Loaded {
                track,
                auto_play,
                report,
            } => LoaderEvent::Loaded {
                request_id,
                track,
                auto_play,
                report,
            },
            LoadOutcome::Failed { error, report } => {
                log::error!("[LOADER] Request {} failed: {}", request_id, error);
                LoaderEvent::Failed {
                    request_id,
                    error: error.to_string(),
                    report,
                }
            }
            LoadOutcome::Cancelled { .. } => LoaderEvent::Cancelled { request_id },
        };
        log::debug!("[LOADER] Request {} finished in {:?}", request_id, start.elapsed());

        if tx.send(event).is_err() {
            break;
        }
    }

    log::info!("[LOADER] Loader thread exiting");
}
