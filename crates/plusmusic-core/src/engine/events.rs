//! Engine events
//!
//! Events are broadcast over a bounded crossbeam channel. Publishing never
//! blocks the tick loop: when the bus is full the event is dropped.

use std::fmt;

use crossbeam::channel::{Receiver, Sender, TrySendError};

use crate::types::{ArrangementTag, NUM_LAYERS};

/// Playback state transitions reported to listeners
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AudioState {
    Playing,
    Stopped,
    Paused,
    Unpaused,
    Muted,
    Unmuted,
}

impl fmt::Display for AudioState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            AudioState::Playing => "playing",
            AudioState::Stopped => "stopped",
            AudioState::Paused => "paused",
            AudioState::Unpaused => "unpaused",
            AudioState::Muted => "muted",
            AudioState::Unmuted => "unmuted",
        };
        f.write_str(name)
    }
}

/// Events emitted by the engine and the loader
#[derive(Debug, Clone, PartialEq)]
pub enum EngineEvent {
    /// Fraction of the current load request completed (0.0 - 1.0)
    TrackLoadingProgress(f32),
    /// A blend towards this arrangement has started
    ArrangementChanged(ArrangementTag),
    AudioStateChanged(AudioState),
    /// New steady-state volumes, index 0 = master/FullMix
    LayerVolumeChanged([f32; NUM_LAYERS]),
    /// A transition asked for a one-shot sound effect
    SoundFx(String),
}

/// Publishing half of the bus, cheap to clone
#[derive(Debug, Clone)]
pub struct EventSender {
    sender: Sender<EngineEvent>,
}

impl EventSender {
    /// Publish without blocking; a full bus drops the event
    pub fn publish(&self, event: EngineEvent) {
        match self.sender.try_send(event) {
            Ok(()) => {}
            Err(TrySendError::Full(event)) => {
                log::debug!("[ENGINE] Event bus full, dropping {:?}", event);
            }
            Err(TrySendError::Disconnected(_)) => {}
        }
    }
}

/// Event bus for broadcasting events to subscribers
///
/// Subscribers share one queue, so each event is received once.
pub struct EventBus {
    sender: Sender<EngineEvent>,
    receiver: Receiver<EngineEvent>,
}

impl EventBus {
    /// Create a new event bus with bounded capacity
    pub fn new(capacity: usize) -> Self {
        let (sender, receiver) = crossbeam::channel::bounded(capacity.max(1));
        Self { sender, receiver }
    }

    /// Get a sender for publishing events
    pub fn sender(&self) -> EventSender {
        EventSender {
            sender: self.sender.clone(),
        }
    }

    /// Get a receiver for subscribing to events
    pub fn subscribe(&self) -> Receiver<EngineEvent> {
        self.receiver.clone()
    }

    pub fn publish(&self, event: EngineEvent) {
        self.sender().publish(event);
    }

    /// Take every queued event
    pub fn drain(&self) -> Vec<EngineEvent> {
        self.receiver.try_iter().collect()
    }
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new(256)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_event_bus() {
        let bus = EventBus::new(16);
        let rx = bus.subscribe();

        bus.publish(EngineEvent::ArrangementChanged(ArrangementTag::Victory));

        match rx.recv().unwrap() {
            EngineEvent::ArrangementChanged(tag) => assert_eq!(tag, ArrangementTag::Victory),
            other => panic!("Wrong event type: {:?}", other),
        }
    }

    #[test]
    fn test_full_bus_drops_instead_of_blocking() {
        let bus = EventBus::new(2);
        let sender = bus.sender();
        for i in 0..5 {
            sender.publish(EngineEvent::TrackLoadingProgress(i as f32 / 4.0));
        }
        let events = bus.drain();
        assert_eq!(
            events,
            vec![
                EngineEvent::TrackLoadingProgress(0.0),
                EngineEvent::TrackLoadingProgress(0.25)
            ]
        );
    }

    #[test]
    fn test_audio_state_display() {
        assert_eq!(AudioState::Unmuted.to_string(), "unmuted");
    }
}
