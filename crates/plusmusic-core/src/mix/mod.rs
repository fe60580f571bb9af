//! Full-mix synthesis, the filter pass and mono downmix
//!
//! All three operate on whole interleaved buffers after reconstruction; none
//! of them run per tick.

mod downmix;
mod filter;
mod full_mix;

pub use downmix::to_mono;
pub use filter::{apply_filter, FilterImpulse};
pub use full_mix::synthesize_full_mix;

/// Hard clamp applied to synthesized and filtered output
pub const DEFAULT_CLAMP_LIMIT: f32 = 0.99;

/// Default overlay volume of the filter impulse
pub const DEFAULT_FILTER_VOLUME: f32 = 0.05;
