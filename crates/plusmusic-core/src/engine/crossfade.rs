//! Double-buffered crossfade engine
//!
//! Two buffer sets hold one playback channel per layer. One set is active
//! (audible, steady state); the other receives the next arrangement. A
//! transition moves through:
//!
//! ```text
//! Idle/Settled ──request──► Armed ──delay elapsed──► Blending ──elapsed > duration──► Settled
//!                              │                        │
//!                              └──── new request cancels the in-flight one ────┘
//! ```
//!
//! All progress is driven by the `dt` passed to [`CrossfadeEngine::tick`],
//! never by tick count, so blends take the same time at any tick rate.

use std::sync::Arc;
use std::time::Duration;

use super::error::{EngineError, EngineResult};
use super::events::{AudioState, EngineEvent, EventSender};
use super::transition::{delay_to_next_mark, Transition, TransitionTiming};
use crate::arrangement::ArrangementAudio;
use crate::types::{ArrangementTag, AudioBuffer, Layer, LayerVolumes, NUM_LAYERS};

/// Volume the incoming set starts at before the first blend step
pub const DEFAULT_START_VOLUME: f32 = 0.0001;

/// Crossfade state
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CrossfadeState {
    /// Nothing requested yet, or stopped
    Idle,
    /// Waiting for the start delay (next beat/bar)
    Armed,
    /// Volume ramp in progress
    Blending,
    /// Last transition finished; the active set is steady
    Settled,
}

/// Which channels of a set play
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum VolumeMode {
    /// The four stems play; index 0 is the master gain over them
    #[default]
    Layers,
    /// Only the FullMix channel plays
    SingleTrack,
}

impl VolumeMode {
    /// A song with a full mix and no complete stem set is single-track;
    /// anything else plays its stems
    pub fn detect(has_full_mix: bool, has_all_stems: bool) -> Self {
        if has_full_mix && !has_all_stems {
            VolumeMode::SingleTrack
        } else {
            VolumeMode::Layers
        }
    }

    pub fn plays(self, layer: Layer) -> bool {
        match self {
            VolumeMode::Layers => layer != Layer::FullMix,
            VolumeMode::SingleTrack => layer == Layer::FullMix,
        }
    }
}

/// One output channel: a buffer and how loud it plays
#[derive(Debug, Clone, Default)]
pub struct PlaybackChannel {
    pub buffer: Option<Arc<AudioBuffer>>,
    pub volume: f32,
    pub playing: bool,
    /// Seconds into the buffer
    pub position: f64,
}

impl PlaybackChannel {
    fn start(&mut self, buffer: Arc<AudioBuffer>, volume: f32, playing: bool) {
        self.buffer = Some(buffer);
        self.volume = volume;
        self.playing = playing;
        self.position = 0.0;
    }

    fn stop(&mut self) {
        self.buffer = None;
        self.playing = false;
        self.position = 0.0;
    }

    /// Advance, looping at `loop_length`
    fn advance(&mut self, dt: f64, loop_length: f64) {
        if !self.playing {
            return;
        }
        self.position += dt;
        if loop_length > 0.0 && self.position >= loop_length {
            self.position %= loop_length;
        }
    }

    /// Current interleaved frame index for the sink
    pub fn frame_position(&self) -> usize {
        match &self.buffer {
            Some(buffer) => (self.position * buffer.sample_rate as f64) as usize,
            None => 0,
        }
    }
}

/// Per-layer channels playing one arrangement
#[derive(Debug, Clone, Default)]
pub struct BufferSet {
    pub channels: [PlaybackChannel; NUM_LAYERS],
    audio: Option<Arc<ArrangementAudio>>,
}

impl BufferSet {
    pub fn tag(&self) -> Option<ArrangementTag> {
        self.audio.as_ref().map(|audio| audio.arrangement().tag)
    }

    pub fn audio(&self) -> Option<&Arc<ArrangementAudio>> {
        self.audio.as_ref()
    }

    pub fn is_playing(&self) -> bool {
        self.channels.iter().any(|channel| channel.playing)
    }

    /// Playback time of the set in arrangement seconds
    pub fn position(&self) -> f64 {
        self.channels
            .iter()
            .find(|channel| channel.playing)
            .map_or(0.0, |channel| channel.position)
    }

    pub fn volumes(&self) -> [f32; NUM_LAYERS] {
        std::array::from_fn(|i| self.channels[i].volume)
    }

    fn load(&mut self, audio: Arc<ArrangementAudio>, mode: VolumeMode, volume: f32) {
        let has_full_mix = audio.layer(Layer::FullMix).is_some();
        let mode = match mode {
            VolumeMode::Layers => VolumeMode::detect(has_full_mix, audio.has_stems()),
            VolumeMode::SingleTrack => mode,
        };

        for layer in Layer::ALL {
            let channel = &mut self.channels[layer.index()];
            match audio.layer(layer) {
                Some(buffer) => channel.start(Arc::clone(buffer), volume, mode.plays(layer)),
                None => channel.stop(),
            }
        }
        self.audio = Some(audio);
    }

    fn stop(&mut self) {
        for channel in self.channels.iter_mut() {
            channel.stop();
        }
        self.audio = None;
    }

    fn set_volumes(&mut self, volumes: &[f32; NUM_LAYERS]) {
        for (channel, &volume) in self.channels.iter_mut().zip(volumes.iter()) {
            channel.volume = volume;
        }
    }

    fn advance(&mut self, dt: f64) {
        let loop_length = self.audio.as_ref().map_or(0.0, |audio| audio.length());
        for channel in self.channels.iter_mut() {
            channel.advance(dt, loop_length);
        }
    }
}

/// Outgoing and incoming volumes at a curve value
///
/// `outgoing[l] = from[l] * (1 - curve)`, `incoming[l] = curve * to[l]`.
pub fn blend_volumes(
    from: &[f32; NUM_LAYERS],
    to: &[f32; NUM_LAYERS],
    curve: f32,
) -> ([f32; NUM_LAYERS], [f32; NUM_LAYERS]) {
    let outgoing = std::array::from_fn(|i| from[i] * (1.0 - curve));
    let incoming = std::array::from_fn(|i| curve * to[i]);
    (outgoing, incoming)
}

/// The transition currently armed or blending
#[derive(Debug, Clone)]
struct InFlight {
    transition: Transition,
    audio: Arc<ArrangementAudio>,
    /// Seconds until blending starts
    delay: f64,
    /// Seconds since blending started
    elapsed: f64,
    from: [f32; NUM_LAYERS],
    to: [f32; NUM_LAYERS],
}

impl InFlight {
    fn progress(&self) -> f32 {
        if self.transition.duration <= 0.0 {
            return 1.0;
        }
        (self.elapsed / self.transition.duration).clamp(0.0, 1.0) as f32
    }
}

/// Drives the A/B buffer sets through transitions
pub struct CrossfadeEngine {
    sets: [BufferSet; 2],
    active: usize,
    state: CrossfadeState,
    mode: VolumeMode,
    /// Steady-state volumes, index 0 = master/FullMix
    volumes: [f32; NUM_LAYERS],
    in_flight: Option<InFlight>,
    current: Option<Transition>,
    previous: Option<Transition>,
    start_volume: f32,
    paused: bool,
    muted: bool,
    events: EventSender,
}

impl CrossfadeEngine {
    pub fn new(events: EventSender, start_volume: f32) -> Self {
        Self {
            sets: Default::default(),
            active: 0,
            state: CrossfadeState::Idle,
            mode: VolumeMode::Layers,
            volumes: [1.0; NUM_LAYERS],
            in_flight: None,
            current: None,
            previous: None,
            start_volume,
            paused: false,
            muted: false,
            events,
        }
    }

    pub fn state(&self) -> CrossfadeState {
        self.state
    }

    pub fn mode(&self) -> VolumeMode {
        self.mode
    }

    /// Applies to sets loaded from now on
    pub fn set_mode(&mut self, mode: VolumeMode) {
        self.mode = mode;
    }

    pub fn active_index(&self) -> usize {
        self.active
    }

    pub fn set(&self, index: usize) -> Option<&BufferSet> {
        self.sets.get(index)
    }

    pub fn active_set(&self) -> &BufferSet {
        &self.sets[self.active]
    }

    pub fn next_set(&self) -> &BufferSet {
        &self.sets[1 - self.active]
    }

    pub fn volumes(&self) -> [f32; NUM_LAYERS] {
        self.volumes
    }

    /// Arrangement the active set is playing
    pub fn current_tag(&self) -> Option<ArrangementTag> {
        self.active_set().tag()
    }

    /// Last committed transition
    pub fn current_transition(&self) -> Option<&Transition> {
        self.current.as_ref()
    }

    pub fn previous_transition(&self) -> Option<&Transition> {
        self.previous.as_ref()
    }

    /// Transition armed or blending, if any
    pub fn pending_transition(&self) -> Option<&Transition> {
        self.in_flight.as_ref().map(|f| &f.transition)
    }

    pub fn is_paused(&self) -> bool {
        self.paused
    }

    pub fn is_muted(&self) -> bool {
        self.muted
    }

    /// Playback time of the active set in arrangement seconds
    pub fn playback_time(&self) -> f64 {
        self.active_set().position()
    }

    /// Gain the sink should apply to one channel of one set
    ///
    /// In layer mode the stem volume is scaled by the master volume in
    /// slot 0. Muting silences output without touching the volumes.
    pub fn output_volume(&self, set: usize, layer: Layer) -> f32 {
        let Some(buffer_set) = self.sets.get(set) else {
            return 0.0;
        };
        let channel = &buffer_set.channels[layer.index()];
        if self.muted || !channel.playing {
            return 0.0;
        }
        if layer == Layer::FullMix {
            channel.volume
        } else {
            channel.volume * buffer_set.channels[Layer::FullMix.index()].volume
        }
    }

    /// Request a transition to already reconstructed audio
    ///
    /// Returns `Ok(false)` when the self-transition guard turns the request
    /// into a no-op. Errors leave every piece of state untouched.
    pub fn request(
        &mut self,
        transition: Transition,
        audio: Arc<ArrangementAudio>,
    ) -> EngineResult<bool> {
        if !transition.can_transition_to_itself && self.current_tag() == Some(transition.tag) {
            log::debug!("[ENGINE] Already playing {}, ignoring transition", transition.tag);
            return Ok(false);
        }
        if audio.layers().iter().all(Option::is_none) {
            return Err(EngineError::EmptyArrangement(transition.tag));
        }

        let delay = self.start_delay(transition.timing)?;
        self.cancel_in_flight();

        let from = self.volumes;
        let to = transition.target_volumes(&from);
        log::info!(
            "[ENGINE] Transition to {} ({:?}, delay {:.3}s, blend {:.3}s)",
            transition.tag,
            transition.timing,
            delay,
            transition.duration
        );

        self.in_flight = Some(InFlight {
            transition,
            audio,
            delay,
            elapsed: 0.0,
            from,
            to,
        });

        if delay <= 0.0 {
            self.begin_blend(0.0);
        } else {
            self.state = CrossfadeState::Armed;
        }
        Ok(true)
    }

    fn start_delay(&self, timing: TransitionTiming) -> EngineResult<f64> {
        if timing == TransitionTiming::Now {
            return Ok(0.0);
        }
        let active = self.active_set();
        let Some(audio) = active.audio().filter(|_| active.is_playing()) else {
            // Nothing playing, nothing to align to
            return Ok(0.0);
        };
        let marks = audio.arrangement().timing_marks(timing).unwrap_or(&[]);
        delay_to_next_mark(marks, active.position(), audio.length())
            .ok_or(EngineError::MissingTimingData { timing })
    }

    /// Drop the armed or blending transition, restoring steady volumes
    fn cancel_in_flight(&mut self) {
        let Some(cancelled) = self.in_flight.take() else {
            return;
        };
        if self.state == CrossfadeState::Blending {
            self.sets[1 - self.active].stop();
            let volumes = self.volumes;
            self.sets[self.active].set_volumes(&volumes);
        }
        log::info!("[ENGINE] Cancelled transition to {}", cancelled.transition.tag);
        self.state = if self.active_set().is_playing() {
            CrossfadeState::Settled
        } else {
            CrossfadeState::Idle
        };
    }

    fn begin_blend(&mut self, overshoot: f64) {
        let Some(in_flight) = self.in_flight.as_mut() else {
            return;
        };
        in_flight.elapsed = overshoot;
        let audio = Arc::clone(&in_flight.audio);
        let tag = in_flight.transition.tag;
        let sound_fx = in_flight.transition.sound_fx.clone();

        let was_silent = !self.sets[self.active].is_playing();
        let next = 1 - self.active;
        self.sets[next].load(audio, self.mode, self.start_volume);
        self.state = CrossfadeState::Blending;

        self.events.publish(EngineEvent::ArrangementChanged(tag));
        if let Some(id) = sound_fx {
            self.events.publish(EngineEvent::SoundFx(id));
        }
        if was_silent {
            self.events.publish(EngineEvent::AudioStateChanged(AudioState::Playing));
        }
    }

    fn apply_blend(&mut self) {
        let Some(in_flight) = &self.in_flight else {
            return;
        };
        let curve = in_flight.transition.curve_value(in_flight.progress());
        let (outgoing, incoming) = blend_volumes(&in_flight.from, &in_flight.to, curve);
        self.sets[self.active].set_volumes(&outgoing);
        self.sets[1 - self.active].set_volumes(&incoming);
    }

    fn complete(&mut self) -> Option<Transition> {
        let finished = self.in_flight.take()?;

        self.sets[self.active].stop();
        self.active = 1 - self.active;
        self.volumes = finished.to;
        let volumes = self.volumes;
        self.sets[self.active].set_volumes(&volumes);

        if finished.transition.commits() {
            self.previous = self.current.take();
            self.current = Some(finished.transition.clone());
        }
        self.state = CrossfadeState::Settled;

        log::info!("[ENGINE] Settled on {}", finished.transition.tag);
        self.events.publish(EngineEvent::LayerVolumeChanged(self.volumes));
        Some(finished.transition)
    }

    /// Advance playback and any transition by `dt`
    ///
    /// Returns the transition that finished blending during this tick.
    pub fn tick(&mut self, dt: Duration) -> Option<Transition> {
        if self.paused {
            return None;
        }
        let dt = dt.as_secs_f64();
        for set in self.sets.iter_mut() {
            set.advance(dt);
        }

        match self.state {
            CrossfadeState::Armed => {
                let overshoot = self.in_flight.as_mut().and_then(|in_flight| {
                    in_flight.delay -= dt;
                    (in_flight.delay <= 0.0).then_some(-in_flight.delay)
                });
                if let Some(overshoot) = overshoot {
                    self.begin_blend(overshoot);
                }
                None
            }
            CrossfadeState::Blending => {
                let done = match self.in_flight.as_mut() {
                    Some(in_flight) => {
                        in_flight.elapsed += dt;
                        in_flight.elapsed > in_flight.transition.duration
                    }
                    None => false,
                };
                self.apply_blend();
                if done {
                    self.complete()
                } else {
                    None
                }
            }
            CrossfadeState::Idle | CrossfadeState::Settled => None,
        }
    }

    /// Stop both sets and drop any in-flight transition
    pub fn stop(&mut self) {
        self.in_flight = None;
        for set in self.sets.iter_mut() {
            set.stop();
        }
        self.state = CrossfadeState::Idle;
        self.paused = false;
        self.events.publish(EngineEvent::AudioStateChanged(AudioState::Stopped));
    }

    pub fn pause(&mut self) {
        if !self.paused {
            self.paused = true;
            self.events.publish(EngineEvent::AudioStateChanged(AudioState::Paused));
        }
    }

    pub fn unpause(&mut self) {
        if self.paused {
            self.paused = false;
            self.events.publish(EngineEvent::AudioStateChanged(AudioState::Unpaused));
        }
    }

    pub fn mute(&mut self) {
        if !self.muted {
            self.muted = true;
            self.events.publish(EngineEvent::AudioStateChanged(AudioState::Muted));
        }
    }

    pub fn unmute(&mut self) {
        if self.muted {
            self.muted = false;
            self.events.publish(EngineEvent::AudioStateChanged(AudioState::Unmuted));
        }
    }

    /// Set steady-state stem volumes
    ///
    /// During a blend the new values become the blend target.
    pub fn set_layer_volumes(&mut self, volumes: LayerVolumes) {
        for layer in Layer::STEMS {
            if let Some(volume) = volumes.get(layer) {
                self.set_volume(layer.index(), volume);
            }
        }
        self.events.publish(EngineEvent::LayerVolumeChanged(self.volumes));
    }

    /// Set the master volume (slot 0)
    pub fn set_main_volume(&mut self, volume: f32) {
        self.set_volume(Layer::FullMix.index(), volume);
        self.events.publish(EngineEvent::LayerVolumeChanged(self.volumes));
    }

    fn set_volume(&mut self, index: usize, volume: f32) {
        self.volumes[index] = volume;
        match self.in_flight.as_mut() {
            Some(in_flight) if self.state == CrossfadeState::Blending => {
                in_flight.to[index] = volume;
            }
            Some(in_flight) => {
                // Armed: the blend has not started, so both ends follow the
                // new steady volumes
                in_flight.from = self.volumes;
                in_flight.to = in_flight.transition.target_volumes(&self.volumes);
                self.sets[self.active].channels[index].volume = volume;
            }
            None => self.sets[self.active].channels[index].volume = volume,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::{BlendCurve, EventBus};
    use crate::metadata::Arrangement;
    use crate::types::SegmentClip;

    fn audio(tag: ArrangementTag, seconds: f64, beats: Vec<f64>) -> Arc<ArrangementAudio> {
        let arrangement = Arrangement {
            name: tag.to_string(),
            tag,
            segments: vec![SegmentClip::new(0.0, seconds)],
            beats,
            bars: Vec::new(),
        };
        let frames = (seconds * 100.0) as usize;
        let layers = std::array::from_fn(|_| Some(Arc::new(AudioBuffer::silence(frames, 2, 100))));
        Arc::new(ArrangementAudio::new(arrangement, layers))
    }

    fn engine() -> (CrossfadeEngine, EventBus) {
        let bus = EventBus::new(64);
        (CrossfadeEngine::new(bus.sender(), DEFAULT_START_VOLUME), bus)
    }

    fn ms(millis: u64) -> Duration {
        Duration::from_millis(millis)
    }

    /// Bring the engine to a settled `tag` with beats every half second
    fn settled_on(engine: &mut CrossfadeEngine, tag: ArrangementTag) {
        let transition = Transition::to(tag).with_duration(0.1);
        engine
            .request(transition, audio(tag, 2.0, vec![0.0, 0.5, 1.0, 1.5]))
            .unwrap();
        engine.tick(ms(200));
        assert_eq!(engine.state(), CrossfadeState::Settled);
    }

    #[test]
    fn test_blend_volume_boundaries() {
        let from = [1.0, 0.8, 0.6, 0.4, 0.2];
        let to = [0.5, 1.0, 1.0, 0.0, 0.3];

        let (outgoing, incoming) = blend_volumes(&from, &to, 0.0);
        assert_eq!(outgoing, from);
        assert!(incoming.iter().all(|v| v.abs() < 1e-6));

        let (outgoing, incoming) = blend_volumes(&from, &to, 1.0);
        assert!(outgoing.iter().all(|v| v.abs() < 1e-6));
        assert_eq!(incoming, to);
    }

    #[test]
    fn test_first_request_plays_and_settles() {
        let (mut engine, bus) = engine();
        engine
            .request(Transition::to(ArrangementTag::BackingTrack), audio(ArrangementTag::BackingTrack, 4.0, vec![]))
            .unwrap();

        assert_eq!(engine.state(), CrossfadeState::Blending);
        assert_eq!(engine.next_set().channels[1].volume, DEFAULT_START_VOLUME);
        assert_eq!(
            bus.drain(),
            vec![
                EngineEvent::ArrangementChanged(ArrangementTag::BackingTrack),
                EngineEvent::AudioStateChanged(AudioState::Playing),
            ]
        );

        engine.tick(ms(500));
        let incoming = engine.next_set().channels[1].volume;
        assert!((incoming - 0.5).abs() < 1e-6);

        let finished = engine.tick(ms(600)).unwrap();
        assert_eq!(finished.tag, ArrangementTag::BackingTrack);
        assert_eq!(engine.state(), CrossfadeState::Settled);
        assert_eq!(engine.active_index(), 1);
        assert_eq!(engine.current_tag(), Some(ArrangementTag::BackingTrack));
        assert_eq!(engine.current_transition().map(|t| t.tag), Some(ArrangementTag::BackingTrack));
        assert!(!engine.next_set().is_playing());
        assert_eq!(bus.drain(), vec![EngineEvent::LayerVolumeChanged([1.0; NUM_LAYERS])]);
    }

    #[test]
    fn test_self_transition_guard() {
        let (mut engine, bus) = engine();
        settled_on(&mut engine, ArrangementTag::BackingTrack);
        bus.drain();

        let accepted = engine
            .request(
                Transition::to(ArrangementTag::BackingTrack),
                audio(ArrangementTag::BackingTrack, 2.0, vec![]),
            )
            .unwrap();
        assert!(!accepted);
        assert_eq!(engine.state(), CrossfadeState::Settled);
        assert!(bus.drain().is_empty());

        let accepted = engine
            .request(
                Transition::to(ArrangementTag::BackingTrack).allow_self_transition(),
                audio(ArrangementTag::BackingTrack, 2.0, vec![]),
            )
            .unwrap();
        assert!(accepted);
        assert_eq!(engine.state(), CrossfadeState::Blending);
    }

    #[test]
    fn test_next_beat_arms_until_mark() {
        let (mut engine, _bus) = engine();
        settled_on(&mut engine, ArrangementTag::BackingTrack);
        assert!((engine.playback_time() - 0.2).abs() < 1e-9);

        let transition = Transition::to(ArrangementTag::Victory).with_timing(TransitionTiming::NextBeat);
        engine.request(transition, audio(ArrangementTag::Victory, 2.0, vec![])).unwrap();
        assert_eq!(engine.state(), CrossfadeState::Armed);

        engine.tick(ms(290));
        assert_eq!(engine.state(), CrossfadeState::Armed);
        engine.tick(ms(20));
        assert_eq!(engine.state(), CrossfadeState::Blending);
        assert_eq!(engine.next_set().tag(), Some(ArrangementTag::Victory));
    }

    #[test]
    fn test_missing_timing_data_leaves_state() {
        let (mut engine, _bus) = engine();
        settled_on(&mut engine, ArrangementTag::BackingTrack);

        let transition = Transition::to(ArrangementTag::Victory).with_timing(TransitionTiming::NextBar);
        let result = engine.request(transition, audio(ArrangementTag::Victory, 2.0, vec![]));
        assert_eq!(
            result,
            Err(EngineError::MissingTimingData {
                timing: TransitionTiming::NextBar
            })
        );
        assert_eq!(engine.state(), CrossfadeState::Settled);
        assert!(engine.pending_transition().is_none());
    }

    #[test]
    fn test_new_request_cancels_in_flight() {
        let (mut engine, _bus) = engine();
        settled_on(&mut engine, ArrangementTag::BackingTrack);

        engine
            .request(Transition::to(ArrangementTag::Victory), audio(ArrangementTag::Victory, 2.0, vec![]))
            .unwrap();
        engine.tick(ms(500));
        assert!(engine.active_set().channels[1].volume < 1.0);

        engine
            .request(Transition::to(ArrangementTag::Failure), audio(ArrangementTag::Failure, 2.0, vec![]))
            .unwrap();
        assert_eq!(engine.pending_transition().map(|t| t.tag), Some(ArrangementTag::Failure));
        assert_eq!(engine.next_set().tag(), Some(ArrangementTag::Failure));
        assert_eq!(engine.active_set().channels[1].volume, 1.0);
    }

    #[test]
    fn test_blend_is_tick_rate_independent() {
        let run = |step_ms: u64, steps: u64| {
            let (mut engine, _bus) = engine();
            settled_on(&mut engine, ArrangementTag::BackingTrack);
            let transition = Transition::to(ArrangementTag::Highlight)
                .with_duration(2.0)
                .with_curve(BlendCurve::EqualPower)
                .with_main_volume(0.5);
            engine
                .request(transition, audio(ArrangementTag::Highlight, 4.0, vec![]))
                .unwrap();
            for _ in 0..steps {
                engine.tick(ms(step_ms));
            }
            (engine.active_set().volumes(), engine.next_set().volumes())
        };

        let (fine_out, fine_in) = run(10, 100);
        let (coarse_out, coarse_in) = run(250, 4);
        for i in 0..NUM_LAYERS {
            assert!((fine_out[i] - coarse_out[i]).abs() < 1e-4);
            assert!((fine_in[i] - coarse_in[i]).abs() < 1e-4);
        }
        // Halfway along a quarter sine
        let expected = (std::f32::consts::FRAC_PI_4).sin() * 0.5;
        assert!((fine_in[0] - expected).abs() < 1e-3);
    }

    #[test]
    fn test_return_to_previous_without_ttl_does_not_commit() {
        let (mut engine, _bus) = engine();
        settled_on(&mut engine, ArrangementTag::BackingTrack);

        let stinger = Transition::to(ArrangementTag::Victory).with_duration(0.1).returning(0.0);
        engine.request(stinger, audio(ArrangementTag::Victory, 1.0, vec![])).unwrap();
        engine.tick(ms(200));

        assert_eq!(engine.current_tag(), Some(ArrangementTag::Victory));
        assert_eq!(engine.current_transition().map(|t| t.tag), Some(ArrangementTag::BackingTrack));
    }

    #[test]
    fn test_mute_and_pause() {
        let (mut engine, bus) = engine();
        settled_on(&mut engine, ArrangementTag::BackingTrack);
        bus.drain();
        let active = engine.active_index();

        assert_eq!(engine.output_volume(active, Layer::Bass), 1.0);
        engine.mute();
        engine.mute();
        assert_eq!(engine.output_volume(active, Layer::Bass), 0.0);
        engine.unmute();

        engine.pause();
        let before = engine.playback_time();
        engine.tick(ms(300));
        assert_eq!(engine.playback_time(), before);
        engine.unpause();

        assert_eq!(
            bus.drain(),
            vec![
                EngineEvent::AudioStateChanged(AudioState::Muted),
                EngineEvent::AudioStateChanged(AudioState::Unmuted),
                EngineEvent::AudioStateChanged(AudioState::Paused),
                EngineEvent::AudioStateChanged(AudioState::Unpaused),
            ]
        );
    }

    #[test]
    fn test_single_track_mode_plays_full_mix_only() {
        let (mut engine, _bus) = engine();
        engine.set_mode(VolumeMode::SingleTrack);
        settled_on(&mut engine, ArrangementTag::FullSong);
        let set = engine.active_set();
        assert!(set.channels[0].playing);
        assert!(Layer::STEMS.iter().all(|l| !set.channels[l.index()].playing));
    }

    #[test]
    fn test_volume_change_while_armed_survives_blend() {
        let (mut engine, _bus) = engine();
        settled_on(&mut engine, ArrangementTag::BackingTrack);

        let transition = Transition::to(ArrangementTag::Victory)
            .with_duration(0.1)
            .with_timing(TransitionTiming::NextBeat);
        engine.request(transition, audio(ArrangementTag::Victory, 2.0, vec![])).unwrap();
        assert_eq!(engine.state(), CrossfadeState::Armed);

        engine.set_layer_volumes(LayerVolumes::uniform(0.4));
        let bass = Layer::Bass.index();
        assert!((engine.active_set().volumes()[bass] - 0.4).abs() < 1e-6);

        engine.tick(ms(350));
        assert_eq!(engine.state(), CrossfadeState::Blending);
        engine.tick(ms(100));
        assert_eq!(engine.state(), CrossfadeState::Settled);
        assert_eq!(engine.current_tag(), Some(ArrangementTag::Victory));
        assert!((engine.volumes()[bass] - 0.4).abs() < 1e-6);
        assert!((engine.active_set().volumes()[bass] - 0.4).abs() < 1e-6);
    }

    #[test]
    fn test_set_main_volume_scales_stems() {
        let (mut engine, _bus) = engine();
        settled_on(&mut engine, ArrangementTag::BackingTrack);
        engine.set_main_volume(0.5);
        engine.set_layer_volumes(LayerVolumes::uniform(0.5));
        let active = engine.active_index();
        assert!((engine.output_volume(active, Layer::Drums) - 0.25).abs() < 1e-6);
        assert_eq!(engine.volumes(), [0.5; NUM_LAYERS]);
    }
}
