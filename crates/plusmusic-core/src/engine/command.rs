//! Lock-free command queue for engine control
//!
//! Hosts push commands from any one thread; the thread that owns the
//! [`AudioEngine`](super::AudioEngine) pops them before each tick with
//! [`AudioEngine::process_commands`](super::AudioEngine::process_commands).
//!
//! The `rtrb` ringbuffer is allocated once and both push and pop are
//! wait-free, so a host never stalls the tick loop.
//!
//! ```ignore
//! let (mut tx, mut rx) = command_channel(64);
//! tx.push(EngineCommand::Play(ArrangementTag::BackingTrack))?;
//! engine.process_commands(&mut rx);
//! engine.tick(dt);
//! ```

use super::transition::Transition;
use crate::loader::LoadedTrack;
use crate::types::{ArrangementTag, LayerVolumes};

/// Commands accepted by the engine
///
/// Large payloads are boxed so the enum stays small in the ringbuffer.
pub enum EngineCommand {
    /// Replace the loaded track
    LoadTrack(Box<LoadedTrack>),
    UnloadTrack,
    Transition(Box<Transition>),
    /// Default transition to an arrangement
    Play(ArrangementTag),
    Stop,
    Pause,
    Unpause,
    Mute,
    Unmute,
    SetLayerVolumes(LayerVolumes),
    SetMainVolume(f32),
}

impl EngineCommand {
    pub fn name(&self) -> &'static str {
        match self {
            EngineCommand::LoadTrack(_) => "load_track",
            EngineCommand::UnloadTrack => "unload_track",
            EngineCommand::Transition(_) => "transition",
            EngineCommand::Play(_) => "play",
            EngineCommand::Stop => "stop",
            EngineCommand::Pause => "pause",
            EngineCommand::Unpause => "unpause",
            EngineCommand::Mute => "mute",
            EngineCommand::Unmute => "unmute",
            EngineCommand::SetLayerVolumes(_) => "set_layer_volumes",
            EngineCommand::SetMainVolume(_) => "set_main_volume",
        }
    }
}

/// Default queue depth
pub const COMMAND_QUEUE_CAPACITY: usize = 64;

pub type CommandSender = rtrb::Producer<EngineCommand>;
pub type CommandReceiver = rtrb::Consumer<EngineCommand>;

/// Create a bounded command channel (producer/consumer pair)
pub fn command_channel(capacity: usize) -> (CommandSender, CommandReceiver) {
    rtrb::RingBuffer::new(capacity.max(1))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_command_channel_creation() {
        let (mut tx, mut rx) = command_channel(COMMAND_QUEUE_CAPACITY);

        tx.push(EngineCommand::Play(ArrangementTag::Victory)).unwrap();

        let cmd = rx.pop().unwrap();
        assert!(matches!(cmd, EngineCommand::Play(ArrangementTag::Victory)));
    }

    #[test]
    fn test_command_channel_empty() {
        let (_tx, mut rx) = command_channel(4);
        assert!(rx.pop().is_err());
    }

    #[test]
    fn test_full_channel_rejects_push() {
        let (mut tx, _rx) = command_channel(2);
        tx.push(EngineCommand::Mute).unwrap();
        tx.push(EngineCommand::Unmute).unwrap();
        assert!(tx.push(EngineCommand::Stop).is_err());
    }

    #[test]
    fn test_command_size() {
        // Tracks and transitions are boxed
        let size = std::mem::size_of::<EngineCommand>();
        assert!(size <= 24, "EngineCommand is {} bytes, expected <= 24", size);
    }
}
