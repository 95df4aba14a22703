//! Small per-frame effects that sit on top of the backdrop: the magnetic
//! cursor with its trail, magnetic buttons, tilting cards, the stats
//! counters and the scroll progress bar.

use std::{f32::consts::TAU, time::Duration};

use serde::{Deserialize, Serialize};

use crate::view::scroll_progress;

/// Head smoothing factor of the custom cursor.
pub const CURSOR_SMOOTHING: f32 = 0.15;
pub const TRAIL_LENGTH: usize = 5;
/// Narrower viewports keep the native cursor.
pub const MIN_CURSOR_VIEWPORT_WIDTH: f32 = 1024.0;
pub const MAGNETIC_STRENGTH: f32 = 0.3;
/// Pixels of pointer offset per degree of card rotation.
pub const TILT_DIVISOR: f32 = 20.0;
pub const TILT_PERSPECTIVE: f32 = 1000.0;

const FOLLOW_DURATION: Duration = Duration::from_millis(300);
const RELEASE_DURATION: Duration = Duration::from_millis(500);

/// Easing curves used by the page's tweens.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub enum Ease {
    Power2Out,
    ElasticOut { amplitude: f32, period: f32 },
}

impl Ease {
    pub fn apply(self, progress: f32) -> f32 {
        let t = progress.clamp(0.0, 1.0);
        match self {
            Ease::Power2Out => 1.0 - (1.0 - t) * (1.0 - t),
            Ease::ElasticOut { amplitude, period } => {
                if t <= 0.0 || t >= 1.0 {
                    return t;
                }
                let amplitude = amplitude.max(1.0);
                let phase = period / TAU * (1.0 / amplitude).asin();
                amplitude * 2.0_f32.powf(-10.0 * t) * ((t - phase) * TAU / period).sin() + 1.0
            }
        }
    }
}

/// One value moving from `from` to `to` over `duration`, starting at `start`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Tween {
    from: f32,
    to: f32,
    start: Duration,
    duration: Duration,
    ease: Ease,
}

impl Tween {
    pub fn settled(value: f32) -> Self {
        Self {
            from: value,
            to: value,
            start: Duration::ZERO,
            duration: Duration::ZERO,
            ease: Ease::Power2Out,
        }
    }

    pub fn target(&self) -> f32 {
        self.to
    }

    pub fn value_at(&self, now: Duration) -> f32 {
        if self.duration.is_zero() {
            return self.to;
        }
        let progress = now.saturating_sub(self.start).as_secs_f32() / self.duration.as_secs_f32();
        if progress >= 1.0 {
            return self.to;
        }
        self.from + (self.to - self.from) * self.ease.apply(progress)
    }

    /// Restarts toward `to` from wherever the value is at `now`.
    pub fn retarget(&mut self, to: f32, duration: Duration, ease: Ease, now: Duration) {
        *self = Self {
            from: self.value_at(now),
            to,
            start: now,
            duration,
            ease,
        };
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct TrailDot {
    pub x: f32,
    pub y: f32,
    pub opacity: f32,
    pub scale: f32,
}

/// Cursor ring that lags behind the pointer, followed by a fading trail.
///
/// Each trail dot tweens straight to the pointer with `power2.out`, later
/// dots taking longer, so the trail fans out behind fast movement.
#[derive(Debug, Clone)]
pub struct CursorFollower {
    pointer: (f32, f32),
    head: (f32, f32),
    trail: [TrailDot; TRAIL_LENGTH],
    tweens: [(Tween, Tween); TRAIL_LENGTH],
}

impl Default for CursorFollower {
    fn default() -> Self {
        Self::new()
    }
}

impl CursorFollower {
    pub fn new() -> Self {
        let mut trail = [TrailDot::default(); TRAIL_LENGTH];
        for (index, dot) in trail.iter_mut().enumerate() {
            dot.opacity = 1.0 - index as f32 * 0.2;
            dot.scale = 1.0 - index as f32 * 0.15;
        }
        Self {
            pointer: (0.0, 0.0),
            head: (0.0, 0.0),
            trail,
            tweens: [(Tween::settled(0.0), Tween::settled(0.0)); TRAIL_LENGTH],
        }
    }

    /// The custom cursor only exists on desktop-width viewports.
    pub fn for_viewport(width: f32) -> Option<Self> {
        (width >= MIN_CURSOR_VIEWPORT_WIDTH).then(Self::new)
    }

    /// Trail tween length for dot `index`.
    pub fn trail_duration(index: usize) -> Duration {
        FOLLOW_DURATION + Duration::from_millis(80) * index as u32
    }

    pub fn set_pointer(&mut self, x: f32, y: f32, now: Duration) {
        if self.pointer == (x, y) {
            return;
        }
        self.pointer = (x, y);
        for (index, (tween_x, tween_y)) in self.tweens.iter_mut().enumerate() {
            let duration = Self::trail_duration(index);
            tween_x.retarget(x, duration, Ease::Power2Out, now);
            tween_y.retarget(y, duration, Ease::Power2Out, now);
        }
    }

    pub fn head(&self) -> (f32, f32) {
        self.head
    }

    pub fn trail(&self) -> &[TrailDot] {
        &self.trail
    }

    /// Moves the head toward the pointer and samples the trail tweens.
    pub fn tick(&mut self, now: Duration) {
        self.head.0 += (self.pointer.0 - self.head.0) * CURSOR_SMOOTHING;
        self.head.1 += (self.pointer.1 - self.head.1) * CURSOR_SMOOTHING;

        for (dot, (tween_x, tween_y)) in self.trail.iter_mut().zip(&self.tweens) {
            dot.x = tween_x.value_at(now);
            dot.y = tween_y.value_at(now);
        }
    }
}

/// Page-space bounds of an element.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct ElementRect {
    pub left: f32,
    pub top: f32,
    pub width: f32,
    pub height: f32,
}

impl ElementRect {
    fn local(&self, client_x: f32, client_y: f32) -> (f32, f32) {
        (client_x - self.left, client_y - self.top)
    }
}

/// Button that leans toward the pointer and springs back when it leaves.
#[derive(Debug, Clone)]
pub struct MagneticButton {
    rect: ElementRect,
    x: Tween,
    y: Tween,
}

impl MagneticButton {
    pub fn new(rect: ElementRect) -> Self {
        Self {
            rect,
            x: Tween::settled(0.0),
            y: Tween::settled(0.0),
        }
    }

    /// Offset the button eases toward for a pointer at the given position.
    pub fn pull(&self, client_x: f32, client_y: f32) -> (f32, f32) {
        let (x, y) = self.rect.local(client_x, client_y);
        (
            (x - self.rect.width / 2.0) * MAGNETIC_STRENGTH,
            (y - self.rect.height / 2.0) * MAGNETIC_STRENGTH,
        )
    }

    pub fn pointer_move(&mut self, client_x: f32, client_y: f32, now: Duration) {
        let (x, y) = self.pull(client_x, client_y);
        self.x.retarget(x, FOLLOW_DURATION, Ease::Power2Out, now);
        self.y.retarget(y, FOLLOW_DURATION, Ease::Power2Out, now);
    }

    pub fn pointer_leave(&mut self, now: Duration) {
        let ease = Ease::ElasticOut {
            amplitude: 1.0,
            period: 0.5,
        };
        self.x.retarget(0.0, RELEASE_DURATION, ease, now);
        self.y.retarget(0.0, RELEASE_DURATION, ease, now);
    }

    pub fn offset_at(&self, now: Duration) -> (f32, f32) {
        (self.x.value_at(now), self.y.value_at(now))
    }
}

/// Rotation and glow of a card under the pointer.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct CardTiltPose {
    /// Degrees.
    pub rotate_x: f32,
    pub rotate_y: f32,
    /// Glow centre in percent of the card size.
    pub glow_x: f32,
    pub glow_y: f32,
}

/// Card that tilts in 3D toward the pointer.
#[derive(Debug, Clone)]
pub struct CardTilt {
    rect: ElementRect,
    rotate_x: Tween,
    rotate_y: Tween,
    glow: (f32, f32),
}

impl CardTilt {
    pub fn new(rect: ElementRect) -> Self {
        Self {
            rect,
            rotate_x: Tween::settled(0.0),
            rotate_y: Tween::settled(0.0),
            glow: (50.0, 50.0),
        }
    }

    /// Target pose for a pointer at the given position.
    pub fn pose_for(&self, client_x: f32, client_y: f32) -> CardTiltPose {
        let (x, y) = self.rect.local(client_x, client_y);
        let percent = |value: f32, extent: f32| {
            if extent > 0.0 {
                value / extent * 100.0
            } else {
                50.0
            }
        };
        CardTiltPose {
            rotate_x: (y - self.rect.height / 2.0) / TILT_DIVISOR,
            rotate_y: (self.rect.width / 2.0 - x) / TILT_DIVISOR,
            glow_x: percent(x, self.rect.width),
            glow_y: percent(y, self.rect.height),
        }
    }

    pub fn pointer_move(&mut self, client_x: f32, client_y: f32, now: Duration) {
        let pose = self.pose_for(client_x, client_y);
        self.rotate_x
            .retarget(pose.rotate_x, FOLLOW_DURATION, Ease::Power2Out, now);
        self.rotate_y
            .retarget(pose.rotate_y, FOLLOW_DURATION, Ease::Power2Out, now);
        self.glow = (pose.glow_x, pose.glow_y);
    }

    /// Eases flat again; the glow stays where the pointer left.
    pub fn pointer_leave(&mut self, now: Duration) {
        self.rotate_x
            .retarget(0.0, RELEASE_DURATION, Ease::Power2Out, now);
        self.rotate_y
            .retarget(0.0, RELEASE_DURATION, Ease::Power2Out, now);
    }

    pub fn pose_at(&self, now: Duration) -> CardTiltPose {
        CardTiltPose {
            rotate_x: self.rotate_x.value_at(now),
            rotate_y: self.rotate_y.value_at(now),
            glow_x: self.glow.0,
            glow_y: self.glow.1,
        }
    }
}

/// Ease-out exponential: fast start, settles on 1.
pub fn ease_out_expo(progress: f32) -> f32 {
    if progress >= 1.0 {
        1.0
    } else {
        1.0 - 2.0_f32.powf(-10.0 * progress.max(0.0))
    }
}

/// Number that counts up to its target once its section becomes visible.
#[derive(Debug, Clone)]
pub struct StatCounter {
    target: u64,
    duration: Duration,
    started: Option<Duration>,
}

impl StatCounter {
    pub const DEFAULT_DURATION: Duration = Duration::from_millis(1200);

    pub fn new(target: u64) -> Self {
        Self {
            target,
            duration: Self::DEFAULT_DURATION,
            started: None,
        }
    }

    pub fn with_duration(mut self, duration: Duration) -> Self {
        self.duration = duration;
        self
    }

    /// Starts counting at `now`. Later calls are ignored so the counter only
    /// runs once.
    pub fn trigger(&mut self, now: Duration) {
        self.started.get_or_insert(now);
    }

    pub fn is_started(&self) -> bool {
        self.started.is_some()
    }

    /// Displayed value at `now`.
    pub fn value_at(&self, now: Duration) -> u64 {
        let Some(started) = self.started else {
            return 0;
        };
        if self.duration.is_zero() {
            return self.target;
        }
        let progress =
            (now.saturating_sub(started).as_secs_f32() / self.duration.as_secs_f32()).min(1.0);
        if progress >= 1.0 {
            return self.target;
        }
        (self.target as f64 * ease_out_expo(progress) as f64).floor() as u64
    }

    pub fn is_finished(&self, now: Duration) -> bool {
        self.started
            .map(|started| now.saturating_sub(started) >= self.duration)
            .unwrap_or(false)
    }
}

/// Width of the scroll progress bar, in percent.
pub fn scroll_indicator_percent(scroll_y: f32, document_height: f32, viewport_height: f32) -> f32 {
    scroll_progress(scroll_y, document_height, viewport_height) * 100.0
}
