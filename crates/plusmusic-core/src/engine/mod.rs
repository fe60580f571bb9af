//! Playback engine: transitions, crossfades, return timers
//!
//! - [`AudioEngine`]: owns the loaded track and its reconstructed
//!   arrangements (built on the rayon pool), and ticks everything below
//! - [`CrossfadeEngine`]: two buffer sets, one audible, one receiving the
//!   next arrangement, blended by a [`Transition`]
//! - [`TransitionScheduler`]: return timers for stingers and timed
//!   arrangements
//! - [`EngineCommand`] queue in, [`EngineEvent`] bus out
//!
//! Time only advances through `tick(dt)`, so behavior does not depend on
//! how often the host ticks.

mod audio_engine;
mod command;
mod crossfade;
mod error;
mod events;
mod scheduler;
mod transition;

pub use audio_engine::AudioEngine;
pub use command::{command_channel, CommandReceiver, CommandSender, EngineCommand, COMMAND_QUEUE_CAPACITY};
pub use crossfade::{
    blend_volumes, BufferSet, CrossfadeEngine, CrossfadeState, PlaybackChannel, VolumeMode,
    DEFAULT_START_VOLUME,
};
pub use error::{EngineError, EngineResult};
pub use events::{AudioState, EngineEvent, EventBus, EventSender};
pub use scheduler::{ReturnTimer, TransitionScheduler};
pub use transition::{delay_to_next_mark, BlendCurve, Transition, TransitionTiming};
