//! Return timers
//!
//! A transition with `return_to_previous` or a time-to-live arms a timer.
//! When it fires the engine receives a fresh request for the timer's target.
//! Timers count down on the same `dt` as the crossfade engine, so a paused
//! engine also pauses its timers.

use std::time::Duration;

use super::transition::Transition;

/// One armed return
#[derive(Debug, Clone)]
pub struct ReturnTimer {
    pub id: u64,
    /// Seconds until the timer fires
    pub remaining: f64,
    /// Request issued on fire
    pub target: Transition,
    killed: bool,
}

impl ReturnTimer {
    pub fn is_killed(&self) -> bool {
        self.killed
    }
}

/// Owns every armed return timer
#[derive(Debug, Default)]
pub struct TransitionScheduler {
    timers: Vec<ReturnTimer>,
    next_id: u64,
}

impl TransitionScheduler {
    pub fn new() -> Self {
        Self::default()
    }

    /// Seconds between a transition starting and its return request
    ///
    /// `ttl` falls back to the track length when not positive and never
    /// exceeds it. The blend duration is taken off so the return blend
    /// finishes when the time-to-live runs out.
    pub fn return_delay(time_to_live: f64, track_length: f64, duration: f64) -> f64 {
        let ttl = if time_to_live > 0.0 {
            time_to_live
        } else {
            track_length
        };
        (ttl.min(track_length) - duration).max(0.0)
    }

    /// Arm a timer; returns its id
    pub fn arm(&mut self, delay: f64, target: Transition) -> u64 {
        let id = self.next_id;
        self.next_id += 1;
        log::debug!("[ENGINE] Return to {} armed in {:.3}s (timer {})", target.tag, delay, id);
        self.timers.push(ReturnTimer {
            id,
            remaining: delay,
            target,
            killed: false,
        });
        id
    }

    /// Kill one timer; false when it was not armed
    pub fn cancel(&mut self, id: u64) -> bool {
        match self.timers.iter_mut().find(|timer| timer.id == id && !timer.killed) {
            Some(timer) => {
                timer.killed = true;
                true
            }
            None => false,
        }
    }

    pub fn cancel_all(&mut self) {
        if !self.timers.is_empty() {
            log::debug!("[ENGINE] Cancelling {} return timer(s)", self.timers.len());
        }
        self.timers.clear();
    }

    /// Count down and collect the requests of every timer that fired
    ///
    /// Fired requests never arm another return.
    pub fn tick(&mut self, dt: Duration) -> Vec<Transition> {
        let dt = dt.as_secs_f64();
        let mut fired = Vec::new();
        self.timers.retain_mut(|timer| {
            if timer.killed {
                return false;
            }
            timer.remaining -= dt;
            if timer.remaining > 0.0 {
                return true;
            }
            let mut request = timer.target.clone();
            request.return_to_previous = false;
            request.time_to_live = 0.0;
            fired.push(request);
            false
        });
        fired
    }

    /// Live timers
    pub fn pending(&self) -> usize {
        self.timers.iter().filter(|timer| !timer.killed).count()
    }

    pub fn timers(&self) -> impl Iterator<Item = &ReturnTimer> {
        self.timers.iter().filter(|timer| !timer.killed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::ArrangementTag;

    #[test]
    fn test_return_delay() {
        // ttl shortened by the blend
        assert_eq!(TransitionScheduler::return_delay(5.0, 30.0, 1.0), 4.0);
        // ttl of zero means the track length
        assert_eq!(TransitionScheduler::return_delay(0.0, 30.0, 2.0), 28.0);
        // capped at the track length
        assert_eq!(TransitionScheduler::return_delay(60.0, 30.0, 0.0), 30.0);
        // never negative
        assert_eq!(TransitionScheduler::return_delay(0.5, 30.0, 1.0), 0.0);
    }

    #[test]
    fn test_timer_fires_once() {
        let mut scheduler = TransitionScheduler::new();
        let target = Transition::to(ArrangementTag::BackingTrack).returning(3.0);
        scheduler.arm(1.0, target);

        assert!(scheduler.tick(Duration::from_millis(600)).is_empty());
        let fired = scheduler.tick(Duration::from_millis(600));
        assert_eq!(fired.len(), 1);
        assert_eq!(fired[0].tag, ArrangementTag::BackingTrack);
        assert!(!fired[0].has_return_timer());
        assert_eq!(scheduler.pending(), 0);
        assert!(scheduler.tick(Duration::from_secs(5)).is_empty());
    }

    #[test]
    fn test_cancel() {
        let mut scheduler = TransitionScheduler::new();
        let a = scheduler.arm(0.5, Transition::to(ArrangementTag::Victory));
        scheduler.arm(0.5, Transition::to(ArrangementTag::Failure));

        assert!(scheduler.cancel(a));
        assert!(!scheduler.cancel(a));
        assert_eq!(scheduler.pending(), 1);

        let fired = scheduler.tick(Duration::from_secs(1));
        assert_eq!(fired.len(), 1);
        assert_eq!(fired[0].tag, ArrangementTag::Failure);

        scheduler.arm(0.5, Transition::to(ArrangementTag::Victory));
        scheduler.cancel_all();
        assert!(scheduler.tick(Duration::from_secs(1)).is_empty());
    }
}
