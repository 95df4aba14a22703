use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::assets::AnimationClip;

/// Timing for one frame, in seconds.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct FrameTime {
    /// Seconds since the first frame.
    pub elapsed: f32,
    /// Seconds since the previous frame.
    pub delta: f32,
}

/// Turns host timestamps into elapsed/delta pairs.
#[derive(Debug, Default, Clone)]
pub struct FrameClock {
    start: Option<Duration>,
    last: Option<Duration>,
}

impl FrameClock {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn reset(&mut self) {
        self.start = None;
        self.last = None;
    }

    /// The first tick reports zero elapsed and zero delta. A timestamp that
    /// goes backwards yields a zero delta instead of a negative one.
    pub fn tick(&mut self, now: Duration) -> FrameTime {
        let start = *self.start.get_or_insert(now);
        let last = self.last.replace(now).unwrap_or(now);
        FrameTime {
            elapsed: now.saturating_sub(start).as_secs_f32(),
            delta: now.saturating_sub(last).as_secs_f32(),
        }
    }
}

/// One looping clip playing on a model.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ClipAction {
    pub clip: AnimationClip,
    pub time: f32,
}

/// Plays every clip of a model on loop.
#[derive(Debug, Default, Clone)]
pub struct AnimationMixer {
    actions: Vec<ClipAction>,
}

impl AnimationMixer {
    /// Returns `None` when the model carries no animation.
    pub fn for_clips(clips: &[AnimationClip]) -> Option<Self> {
        if clips.is_empty() {
            return None;
        }
        Some(Self {
            actions: clips
                .iter()
                .cloned()
                .map(|clip| ClipAction { clip, time: 0.0 })
                .collect(),
        })
    }

    pub fn update(&mut self, delta: f32) {
        let delta = delta.max(0.0);
        for action in &mut self.actions {
            let duration = action.clip.duration;
            action.time = if duration > 0.0 {
                (action.time + delta) % duration
            } else {
                0.0
            };
        }
    }

    pub fn actions(&self) -> &[ClipAction] {
        &self.actions
    }
}

#[cfg(test)]
mod tests {
    use approx::assert_relative_eq;

    use super::*;

    fn clip(name: &str, duration: f32) -> AnimationClip {
        AnimationClip {
            name: name.to_string(),
            duration,
        }
    }

    #[test]
    fn first_tick_is_zero() {
        let mut clock = FrameClock::new();
        let time = clock.tick(Duration::from_millis(500));
        assert_eq!(time, FrameTime::default());

        let time = clock.tick(Duration::from_millis(516));
        assert_relative_eq!(time.elapsed, 0.016, epsilon = 1e-6);
        assert_relative_eq!(time.delta, 0.016, epsilon = 1e-6);
    }

    #[test]
    fn backwards_timestamps_do_not_go_negative() {
        let mut clock = FrameClock::new();
        clock.tick(Duration::from_secs(2));
        let time = clock.tick(Duration::from_secs(1));
        assert_eq!(time.delta, 0.0);
        assert_eq!(time.elapsed, 0.0);
    }

    #[test]
    fn mixer_loops_clips() {
        let mut mixer = AnimationMixer::for_clips(&[clip("spin", 1.0), clip("idle", 0.0)]).unwrap();
        for _ in 0..5 {
            mixer.update(0.25);
        }
        assert_relative_eq!(mixer.actions()[0].time, 0.25, epsilon = 1e-6);
        assert_eq!(mixer.actions()[1].time, 0.0);
    }

    #[test]
    fn no_clips_no_mixer() {
        assert!(AnimationMixer::for_clips(&[]).is_none());
    }
}
