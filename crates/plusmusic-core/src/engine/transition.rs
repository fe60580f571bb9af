//! Transition descriptors and blend curves

use serde::{Deserialize, Serialize};

use crate::types::{ArrangementTag, LayerVolumes, Layer, NUM_LAYERS};

/// When a requested transition starts
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TransitionTiming {
    /// Start on the next tick
    #[default]
    Now,
    /// Start on the next beat of the playing arrangement
    NextBeat,
    /// Start on the next bar of the playing arrangement
    NextBar,
}

/// Shape of the volume ramp over blend progress
///
/// Every curve maps 0 to 0 and 1 to 1.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BlendCurve {
    Linear,
    /// Quadratic, slow start
    EaseIn,
    /// Quadratic, slow end
    EaseOut,
    /// Hermite `t²(3−2t)`
    SmoothStep,
    /// Quarter sine
    EqualPower,
    /// Piecewise linear through `(progress, value)` points
    Keyframes(Vec<(f32, f32)>),
}

impl BlendCurve {
    /// Evaluate at a progress value, clamped to [0, 1] first
    pub fn evaluate(&self, progress: f32) -> f32 {
        let t = progress.clamp(0.0, 1.0);
        match self {
            BlendCurve::Linear => t,
            BlendCurve::EaseIn => t * t,
            BlendCurve::EaseOut => 1.0 - (1.0 - t) * (1.0 - t),
            BlendCurve::SmoothStep => t * t * (3.0 - 2.0 * t),
            BlendCurve::EqualPower => (t * std::f32::consts::FRAC_PI_2).sin(),
            BlendCurve::Keyframes(points) => evaluate_keyframes(points, t),
        }
    }
}

fn evaluate_keyframes(points: &[(f32, f32)], t: f32) -> f32 {
    let (Some(first), Some(last)) = (points.first(), points.last()) else {
        return t;
    };
    if t <= first.0 {
        return first.1;
    }
    if t >= last.0 {
        return last.1;
    }
    for pair in points.windows(2) {
        let (x0, y0) = pair[0];
        let (x1, y1) = pair[1];
        if t >= x0 && t <= x1 {
            if x1 <= x0 {
                return y1;
            }
            return y0 + (y1 - y0) * (t - x0) / (x1 - x0);
        }
    }
    last.1
}

/// A request to move playback to another arrangement
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Transition {
    /// Arrangement to play
    pub tag: ArrangementTag,
    /// Blend length in seconds
    pub duration: f64,
    pub timing: TransitionTiming,
    /// Replace the master volume (index 0) with `main_volume`
    pub use_main_volume: bool,
    pub main_volume: f32,
    /// Replace the stem volumes with `layer_volumes`
    pub use_layer_volumes: bool,
    pub layer_volumes: LayerVolumes,
    /// One-shot sound effect announced when the blend starts
    pub sound_fx: Option<String>,
    pub can_transition_to_itself: bool,
    /// Go back to the arrangement that was playing before this one
    pub return_to_previous: bool,
    /// Seconds before an automatic return; 0 means the arrangement length
    pub time_to_live: f64,
    /// Linear when absent
    pub blend_curve: Option<BlendCurve>,
}

impl Default for Transition {
    fn default() -> Self {
        Self {
            tag: ArrangementTag::BackingTrack,
            duration: 1.0,
            timing: TransitionTiming::Now,
            use_main_volume: false,
            main_volume: 1.0,
            use_layer_volumes: false,
            layer_volumes: LayerVolumes::default(),
            sound_fx: None,
            can_transition_to_itself: false,
            return_to_previous: false,
            time_to_live: 0.0,
            blend_curve: None,
        }
    }
}

impl Transition {
    /// Transition to `tag` with default settings
    pub fn to(tag: ArrangementTag) -> Self {
        Self {
            tag,
            ..Default::default()
        }
    }

    pub fn with_duration(mut self, seconds: f64) -> Self {
        self.duration = seconds;
        self
    }

    pub fn with_timing(mut self, timing: TransitionTiming) -> Self {
        self.timing = timing;
        self
    }

    pub fn with_main_volume(mut self, volume: f32) -> Self {
        self.use_main_volume = true;
        self.main_volume = volume;
        self
    }

    pub fn with_layer_volumes(mut self, volumes: LayerVolumes) -> Self {
        self.use_layer_volumes = true;
        self.layer_volumes = volumes;
        self
    }

    pub fn with_curve(mut self, curve: BlendCurve) -> Self {
        self.blend_curve = Some(curve);
        self
    }

    pub fn with_sound_fx(mut self, id: impl Into<String>) -> Self {
        self.sound_fx = Some(id.into());
        self
    }

    pub fn allow_self_transition(mut self) -> Self {
        self.can_transition_to_itself = true;
        self
    }

    pub fn returning(mut self, time_to_live: f64) -> Self {
        self.return_to_previous = true;
        self.time_to_live = time_to_live;
        self
    }

    pub fn with_time_to_live(mut self, seconds: f64) -> Self {
        self.time_to_live = seconds;
        self
    }

    /// Arms a return timer when started
    pub fn has_return_timer(&self) -> bool {
        self.return_to_previous || self.time_to_live > 0.0
    }

    /// Becomes the committed transition once its blend completes
    pub fn commits(&self) -> bool {
        !(self.return_to_previous && self.time_to_live <= 0.0)
    }

    /// Curve value at a blend progress
    pub fn curve_value(&self, progress: f32) -> f32 {
        match &self.blend_curve {
            Some(curve) => curve.evaluate(progress),
            None => progress.clamp(0.0, 1.0),
        }
    }

    /// Steady-state volumes this transition settles on, starting from
    /// `previous`
    pub fn target_volumes(&self, previous: &[f32; NUM_LAYERS]) -> [f32; NUM_LAYERS] {
        let mut target = *previous;
        if self.use_main_volume {
            target[Layer::FullMix.index()] = self.main_volume;
        }
        if self.use_layer_volumes {
            for layer in Layer::STEMS {
                if let Some(volume) = self.layer_volumes.get(layer) {
                    target[layer.index()] = volume;
                }
            }
        }
        target
    }
}

/// Delay until the first mark strictly after `now`
///
/// When every mark is at or behind the playhead the arrangement loops, so
/// the wait runs to the end and on to the first mark. `None` for an empty
/// array.
pub fn delay_to_next_mark(marks: &[f64], now: f64, loop_length: f64) -> Option<f64> {
    let first = *marks.first()?;
    match marks.iter().find(|&&mark| mark > now) {
        Some(&mark) => Some(mark - now),
        None => Some((loop_length - now).max(0.0) + first),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_curves_hit_endpoints() {
        let curves = [
            BlendCurve::Linear,
            BlendCurve::EaseIn,
            BlendCurve::EaseOut,
            BlendCurve::SmoothStep,
            BlendCurve::EqualPower,
            BlendCurve::Keyframes(vec![(0.0, 0.0), (0.5, 0.8), (1.0, 1.0)]),
        ];
        for curve in &curves {
            assert!(curve.evaluate(0.0).abs() < 1e-6, "{:?}", curve);
            assert!((curve.evaluate(1.0) - 1.0).abs() < 1e-6, "{:?}", curve);
            assert!((curve.evaluate(2.0) - 1.0).abs() < 1e-6, "{:?}", curve);
        }
    }

    #[test]
    fn test_keyframes_interpolate() {
        let curve = BlendCurve::Keyframes(vec![(0.0, 0.0), (0.5, 0.8), (1.0, 1.0)]);
        assert!((curve.evaluate(0.25) - 0.4).abs() < 1e-6);
        assert!((curve.evaluate(0.75) - 0.9).abs() < 1e-6);
        assert_eq!(BlendCurve::Keyframes(vec![]).evaluate(0.3), 0.3);
    }

    #[test]
    fn test_absent_curve_is_linear() {
        let t = Transition::default();
        assert_eq!(t.curve_value(0.3), 0.3);
        assert_eq!(t.curve_value(-1.0), 0.0);
    }

    #[test]
    fn test_target_volumes() {
        let previous = [0.8, 0.5, 0.5, 0.5, 0.5];
        let keep = Transition::default().target_volumes(&previous);
        assert_eq!(keep, previous);

        let t = Transition::default()
            .with_main_volume(0.3)
            .with_layer_volumes(LayerVolumes {
                bass: 1.0,
                drums: 0.0,
                top_mix: 0.2,
                vocals: 0.4,
            });
        assert_eq!(t.target_volumes(&previous), [0.3, 1.0, 0.0, 0.2, 0.4]);
    }

    #[test]
    fn test_commit_rule() {
        assert!(Transition::default().commits());
        assert!(!Transition::default().returning(0.0).commits());
        assert!(Transition::default().returning(5.0).commits());
        assert!(Transition::default().with_time_to_live(2.0).has_return_timer());
        assert!(!Transition::default().has_return_timer());
    }

    #[test]
    fn test_next_mark_delay() {
        let beats = [0.0, 0.5, 1.0, 1.5];
        let delay = delay_to_next_mark(&beats, 0.2, 2.0).unwrap();
        assert!((delay - 0.3).abs() < 1e-12);
        // Exactly on a mark waits for the following one
        assert_eq!(delay_to_next_mark(&beats, 0.5, 2.0), Some(0.5));
        // Past the last mark wraps into the next loop
        assert_eq!(delay_to_next_mark(&beats, 1.75, 2.0), Some(0.25));
        assert_eq!(delay_to_next_mark(&[], 0.0, 2.0), None);
    }

    #[test]
    fn test_transition_yaml_defaults() {
        let t: Transition = serde_yaml::from_str("tag: victory\nreturn_to_previous: true\n").unwrap();
        assert_eq!(t.tag, ArrangementTag::Victory);
        assert!(t.return_to_previous);
        assert_eq!(t.duration, 1.0);
        assert!(t.blend_curve.is_none());
    }
}
