//! Playback orchestrator
//!
//! [`AudioEngine`] owns one loaded track, reconstructs its arrangements on
//! first use, and drives the crossfade engine and return timers from a
//! single tick. Requests, ticks and commands run on the tick thread; other
//! threads talk to it through the command queue and listen on the event bus.
//!
//! Reconstruction touches every sample of every stem, so it never runs on
//! the tick thread. A request for an arrangement that is not built yet
//! spawns the build on the rayon pool and waits; the tick that receives the
//! finished buffers starts the request.
//!
//! ```text
//! play(tag) ──► cached? ──yes──► crossfade request
//!                 │no
//!                 ▼
//!           rayon::spawn(reconstruct_all) ──► builds channel ──► tick()
//!                                                                 │
//!                                            queued request ◄─────┘
//! ```

use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use std::time::{Duration, Instant};

use crossbeam::channel::{unbounded, Receiver, Sender};

use super::command::{command_channel, CommandReceiver, CommandSender, EngineCommand};
use super::crossfade::{CrossfadeEngine, CrossfadeState, VolumeMode};
use super::error::{EngineError, EngineResult};
use super::events::{EngineEvent, EventBus};
use super::scheduler::TransitionScheduler;
use super::transition::Transition;
use crate::arrangement::{ArrangementAudio, ArrangementReconstructor, TrackStems};
use crate::config::EngineConfig;
use crate::loader::{LoadedTrack, LoaderEvent};
use crate::metadata::Arrangement;
use crate::mix::FilterImpulse;
use crate::types::{ArrangementTag, Layer, LayerVolumes};

/// Result of a background reconstruction
struct BuiltArrangement {
    /// Track generation the build was started for
    generation: u64,
    tag: ArrangementTag,
    audio: ArrangementAudio,
}

/// A request waiting for its arrangement to be built
struct QueuedRequest {
    transition: Transition,
    from_timer: bool,
}

pub struct AudioEngine {
    config: EngineConfig,
    crossfade: CrossfadeEngine,
    scheduler: TransitionScheduler,
    events: EventBus,
    track: Option<LoadedTrack>,
    /// Reconstructed arrangements of the loaded track, by tag
    arrangements: HashMap<ArrangementTag, Arc<ArrangementAudio>>,
    reconstructor: ArrangementReconstructor,
    /// Set by `with_filter`; otherwise each track brings its own impulse
    engine_filter: bool,
    builds_tx: Sender<BuiltArrangement>,
    builds_rx: Receiver<BuiltArrangement>,
    /// Tags with a build in flight for the current track
    building: HashSet<ArrangementTag>,
    /// Bumped on every load and unload; older builds are dropped
    generation: u64,
    queued: Option<QueuedRequest>,
}

impl AudioEngine {
    pub fn new(config: EngineConfig) -> Self {
        let events = EventBus::new(config.event_capacity);
        let crossfade = CrossfadeEngine::new(events.sender(), config.start_volume);
        let reconstructor = config.reconstructor();
        log::info!(
            "[ENGINE] Created (overlap {:.4}s, guard {} frames, start volume {})",
            config.overlap_seconds,
            config.guard_frames,
            config.start_volume
        );
        let (builds_tx, builds_rx) = unbounded();
        Self {
            config,
            crossfade,
            scheduler: TransitionScheduler::new(),
            events,
            track: None,
            arrangements: HashMap::new(),
            reconstructor,
            engine_filter: false,
            builds_tx,
            builds_rx,
            building: HashSet::new(),
            generation: 0,
            queued: None,
        }
    }

    /// Use one impulse for every track that declares a filter
    pub fn with_filter(mut self, filter: FilterImpulse) -> Self {
        self.reconstructor.set_filter(Some(Arc::new(filter)));
        self.engine_filter = true;
        self
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    pub fn events(&self) -> &EventBus {
        &self.events
    }

    pub fn subscribe(&self) -> Receiver<EngineEvent> {
        self.events.subscribe()
    }

    /// Command queue sized by `command_capacity`; keep the receiver on the
    /// tick thread
    pub fn command_channel(&self) -> (CommandSender, CommandReceiver) {
        command_channel(self.config.command_capacity)
    }

    pub fn crossfade(&self) -> &CrossfadeEngine {
        &self.crossfade
    }

    pub fn scheduler(&self) -> &TransitionScheduler {
        &self.scheduler
    }

    pub fn track(&self) -> Option<&LoadedTrack> {
        self.track.as_ref()
    }

    pub fn state(&self) -> CrossfadeState {
        self.crossfade.state()
    }

    pub fn current_tag(&self) -> Option<ArrangementTag> {
        self.crossfade.current_tag()
    }

    /// Arrangements reconstructed so far
    pub fn cached_arrangements(&self) -> usize {
        self.arrangements.len()
    }

    /// Background builds not yet received by `tick`
    pub fn pending_builds(&self) -> usize {
        self.building.len()
    }

    /// The request waiting for its arrangement, if any
    pub fn queued_transition(&self) -> Option<&Transition> {
        self.queued.as_ref().map(|queued| &queued.transition)
    }

    /// Replace the loaded track, stopping whatever was playing
    pub fn load_track(&mut self, track: LoadedTrack) {
        if self.crossfade.state() != CrossfadeState::Idle {
            self.crossfade.stop();
        }
        self.scheduler.cancel_all();
        self.forget_arrangements();

        let mode = VolumeMode::detect(track.stems.get(Layer::FullMix).is_some(), track.stems.has_stems());
        self.crossfade.set_mode(mode);
        if !self.engine_filter {
            self.reconstructor.set_filter(track.filter.clone().map(Arc::new));
        }
        if track.info.has_filter && self.reconstructor.filter().is_none() {
            log::warn!("[ENGINE] Track {} wants a filter but none is available", track.id());
        }

        log::info!(
            "[ENGINE] Loaded track {} ({:?}, {} arrangements, {:.1}s of source)",
            track.id(),
            mode,
            track.info.arrangements.len(),
            track.stems.duration_seconds()
        );
        self.track = Some(track);

        if self.config.loader.prebuild_arrangements {
            self.prebuild_arrangements();
        }
    }

    pub fn unload_track(&mut self) {
        if self.crossfade.state() != CrossfadeState::Idle {
            self.crossfade.stop();
        }
        self.scheduler.cancel_all();
        self.forget_arrangements();
        if let Some(track) = self.track.take() {
            log::info!("[ENGINE] Unloaded track {}", track.id());
        }
    }

    /// Drop cached and in-flight arrangements of the previous track
    fn forget_arrangements(&mut self) {
        self.arrangements.clear();
        self.building.clear();
        self.queued = None;
        self.generation += 1;
    }

    /// Start background builds for every arrangement the track declares
    ///
    /// Returns how many builds were started. Results land in the cache on
    /// later ticks.
    pub fn prebuild_arrangements(&mut self) -> usize {
        let tags: Vec<ArrangementTag> = match &self.track {
            Some(track) => track.info.arrangements.iter().map(|info| info.tag).collect(),
            None => return 0,
        };
        let before = self.building.len();
        for tag in tags {
            if self.arrangements.contains_key(&tag) {
                continue;
            }
            if let Err(e) = self.spawn_build(tag) {
                log::warn!("[ENGINE] Could not prebuild {}: {}", tag, e);
            }
        }
        self.building.len() - before
    }

    /// Reconstructed audio for an arrangement, building it here if needed
    ///
    /// This blocks for the whole reconstruction. It is meant for tools and
    /// warm-up code; requests made through [`transition`](Self::transition)
    /// build in the background instead.
    pub fn arrangement_audio(&mut self, tag: ArrangementTag) -> EngineResult<Arc<ArrangementAudio>> {
        if let Some(audio) = self.arrangements.get(&tag) {
            return Ok(Arc::clone(audio));
        }
        let arrangement = self.resolve_arrangement(tag)?;
        let track = self.track.as_ref().ok_or(EngineError::NoTrackLoaded)?;

        let audio = Arc::new(build_arrangement(
            &self.reconstructor,
            &arrangement,
            &track.stems,
            track.info.has_filter,
        ));
        self.arrangements.insert(tag, Arc::clone(&audio));
        Ok(audio)
    }

    /// Arrangement metadata for `tag`, checked to be playable
    fn resolve_arrangement(&self, tag: ArrangementTag) -> EngineResult<Arrangement> {
        let track = self.track.as_ref().ok_or(EngineError::NoTrackLoaded)?;
        let Some(arrangement) = track.info.arrangement(tag) else {
            log::warn!("[ENGINE] Track {} has no {} arrangement", track.id(), tag);
            return Err(EngineError::MissingArrangement(tag));
        };
        if arrangement.segments.is_empty() {
            return Err(EngineError::EmptyArrangement(tag));
        }
        Ok(arrangement)
    }

    /// Reconstruct `tag` on the rayon pool unless a build is already running
    fn spawn_build(&mut self, tag: ArrangementTag) -> EngineResult<()> {
        let arrangement = self.resolve_arrangement(tag)?;
        let track = self.track.as_ref().ok_or(EngineError::NoTrackLoaded)?;
        if !self.building.insert(tag) {
            return Ok(());
        }

        let stems = track.stems.clone();
        let has_filter = track.info.has_filter;
        let reconstructor = self.reconstructor.clone();
        let tx = self.builds_tx.clone();
        let generation = self.generation;
        log::debug!("[ENGINE] Building {} in the background", tag);

        rayon::spawn(move || {
            let audio = build_arrangement(&reconstructor, &arrangement, &stems, has_filter);
            // The engine may already be gone
            let _ = tx.send(BuiltArrangement {
                generation,
                tag,
                audio,
            });
        });
        Ok(())
    }

    /// Move finished builds into the cache and start a request they unblock
    fn collect_builds(&mut self) {
        while let Ok(built) = self.builds_rx.try_recv() {
            if built.generation != self.generation {
                log::debug!("[ENGINE] Dropping {} built for a previous track", built.tag);
                continue;
            }
            self.building.remove(&built.tag);
            self.arrangements.insert(built.tag, Arc::new(built.audio));
        }

        let ready = self
            .queued
            .as_ref()
            .is_some_and(|queued| self.arrangements.contains_key(&queued.transition.tag));
        if !ready {
            return;
        }
        if let Some(queued) = self.queued.take() {
            let tag = queued.transition.tag;
            if let Err(e) = self.request(queued.transition, queued.from_timer) {
                log::warn!("[ENGINE] Queued transition to {} failed: {}", tag, e);
            }
        }
    }

    /// Request a transition
    ///
    /// # Arguments
    /// * `transition` - Target arrangement, timing, blend and return timer
    ///
    /// # Returns
    /// * `Ok(true)` - Accepted. If the arrangement is not built yet the
    ///   request is queued and starts on the tick that receives the build;
    ///   a newer request replaces a queued one.
    /// * `Ok(false)` - Ignored by the self-transition guard
    /// * `Err(_)` - No track, unknown or empty arrangement, or missing beat
    ///   or bar marks. Playback is left untouched.
    ///
    /// # Example
    /// ```ignore
    /// let stinger = Transition::to(ArrangementTag::Victory)
    ///     .with_duration(0.5)
    ///     .with_timing(TransitionTiming::NextBar)
    ///     .returning(4.0);
    /// engine.transition(stinger)?;
    /// ```
    pub fn transition(&mut self, transition: Transition) -> EngineResult<bool> {
        self.request(transition, false)
    }

    /// Transition to `tag` with the default blend
    pub fn play(&mut self, tag: ArrangementTag) -> EngineResult<bool> {
        self.transition(Transition::to(tag).with_duration(self.config.default_transition_duration))
    }

    fn request(&mut self, transition: Transition, from_timer: bool) -> EngineResult<bool> {
        let Some(audio) = self.arrangements.get(&transition.tag).cloned() else {
            self.spawn_build(transition.tag)?;
            if !from_timer {
                self.scheduler.cancel_all();
            }
            let queued = QueuedRequest {
                transition,
                from_timer,
            };
            if let Some(replaced) = self.queued.replace(queued) {
                log::debug!("[ENGINE] Queued {} replaced", replaced.transition.tag);
            }
            return Ok(true);
        };

        // Resolved before the request: the committed transition is still
        // the one playing now
        let return_target = if transition.return_to_previous {
            self.crossfade.current_transition().cloned()
        } else {
            Some(transition.clone().allow_self_transition())
        };

        let length = audio.length();
        if !self.crossfade.request(transition.clone(), audio)? {
            return Ok(false);
        }
        self.queued = None;

        if !from_timer {
            self.scheduler.cancel_all();
        }
        if transition.has_return_timer() {
            match return_target {
                Some(target) => {
                    let delay = TransitionScheduler::return_delay(
                        transition.time_to_live,
                        length,
                        transition.duration,
                    );
                    self.scheduler.arm(delay, target);
                }
                None => log::warn!("[ENGINE] Nothing to return to from {}", transition.tag),
            }
        }
        Ok(true)
    }

    /// Stop playback, drop a queued request and cancel every return timer
    pub fn stop(&mut self) {
        self.queued = None;
        self.scheduler.cancel_all();
        self.crossfade.stop();
    }

    pub fn pause(&mut self) {
        self.crossfade.pause();
    }

    pub fn unpause(&mut self) {
        self.crossfade.unpause();
    }

    pub fn mute(&mut self) {
        self.crossfade.mute();
    }

    pub fn unmute(&mut self) {
        self.crossfade.unmute();
    }

    pub fn set_layer_volumes(&mut self, volumes: LayerVolumes) {
        self.crossfade.set_layer_volumes(volumes);
    }

    pub fn set_main_volume(&mut self, volume: f32) {
        self.crossfade.set_main_volume(volume);
    }

    /// Advance playback, blends and return timers by `dt`
    ///
    /// Finished background builds are picked up first, even while paused.
    /// Never fails: a return transition that cannot start is logged and
    /// dropped. Paused engines do not advance their timers either.
    pub fn tick(&mut self, dt: Duration) {
        self.collect_builds();
        if self.crossfade.is_paused() {
            return;
        }
        self.crossfade.tick(dt);
        for request in self.scheduler.tick(dt) {
            let tag = request.tag;
            if let Err(e) = self.request(request, true) {
                log::warn!("[ENGINE] Return to {} failed: {}", tag, e);
            }
        }
    }

    /// Apply every queued command
    pub fn process_commands(&mut self, rx: &mut CommandReceiver) {
        while let Ok(cmd) = rx.pop() {
            let name = cmd.name();
            if let Err(e) = self.apply_command(cmd) {
                log::warn!("[ENGINE] Command {} failed: {}", name, e);
            }
        }
    }

    fn apply_command(&mut self, cmd: EngineCommand) -> EngineResult<()> {
        match cmd {
            EngineCommand::LoadTrack(track) => self.load_track(*track),
            EngineCommand::UnloadTrack => self.unload_track(),
            EngineCommand::Transition(transition) => {
                self.transition(*transition)?;
            }
            EngineCommand::Play(tag) => {
                self.play(tag)?;
            }
            EngineCommand::Stop => self.stop(),
            EngineCommand::Pause => self.pause(),
            EngineCommand::Unpause => self.unpause(),
            EngineCommand::Mute => self.mute(),
            EngineCommand::Unmute => self.unmute(),
            EngineCommand::SetLayerVolumes(volumes) => self.set_layer_volumes(volumes),
            EngineCommand::SetMainVolume(volume) => self.set_main_volume(volume),
        }
        Ok(())
    }

    /// React to a loader message: report progress, install loaded tracks
    /// and start auto-play
    pub fn handle_loader_event(&mut self, event: LoaderEvent) {
        match event {
            LoaderEvent::Progress { fraction, .. } => {
                self.events.publish(EngineEvent::TrackLoadingProgress(fraction));
            }
            LoaderEvent::Loaded { track, auto_play, .. } => {
                self.load_track(*track);
                if let Some(tag) = auto_play {
                    if let Err(e) = self.play(tag) {
                        log::warn!("[ENGINE] Auto-play of {} failed: {}", tag, e);
                    }
                }
            }
            LoaderEvent::Failed {
                request_id, error, ..
            } => {
                log::error!("[ENGINE] Load request {} failed: {}", request_id, error);
            }
            LoaderEvent::Cancelled { request_id } => {
                log::debug!("[ENGINE] Load request {} cancelled", request_id);
            }
        }
    }
}

fn build_arrangement(
    reconstructor: &ArrangementReconstructor,
    arrangement: &Arrangement,
    stems: &TrackStems,
    has_filter: bool,
) -> ArrangementAudio {
    let start = Instant::now();
    let audio = reconstructor.reconstruct_all(arrangement, stems, has_filter);
    log::info!(
        "[ENGINE] Reconstructed {} ({:.2}s) in {:?}",
        arrangement.tag,
        audio.length(),
        start.elapsed()
    );
    audio
}

impl Default for AudioEngine {
    fn default() -> Self {
        Self::new(EngineConfig::default())
    }
}
