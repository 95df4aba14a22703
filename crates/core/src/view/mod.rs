//! Scroll and pointer tracking for the backdrop camera.
//!
//! Event handlers only write the `target` half of each [`Smoothed`] value.
//! The frame loop moves `current` toward it with exponential smoothing, so a
//! burst of input never reaches the camera in a single frame.

use std::f32::consts::TAU;

use crate::config::{AngleBounds, OrbitConfig, WaveFieldConfig};

/// A live value chasing a raw target.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct Smoothed {
    pub current: f32,
    pub target: f32,
}

impl Smoothed {
    pub const fn new(value: f32) -> Self {
        Self {
            current: value,
            target: value,
        }
    }

    /// `current += (target - current) * factor`.
    pub fn step(&mut self, factor: f32) -> f32 {
        self.current += (self.target - self.current) * factor;
        self.current
    }

    /// Smooths toward the clamped target and keeps `current` inside `bounds`.
    /// `target` itself is left unclamped.
    pub fn step_within(&mut self, factor: f32, bounds: AngleBounds) -> f32 {
        let goal = if self.target.is_nan() {
            self.current
        } else {
            bounds.clamp(self.target)
        };
        let next = self.current + (goal - self.current) * factor;
        if !next.is_nan() {
            self.current = bounds.clamp(next);
        }
        self.current
    }
}

/// Everything the per-frame update reads from user input.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ViewState {
    /// Scroll progress in [0, 1].
    pub scroll: Smoothed,
    /// Unsmoothed scroll angle, `progress * 2π`.
    pub scroll_angle: f32,
    pub pointer_x: Smoothed,
    pub pointer_y: Smoothed,
    pub azimuth: Smoothed,
    pub polar: Smoothed,
}

impl ViewState {
    pub fn for_wave_field() -> Self {
        Self::default()
    }

    pub fn for_orbit(config: &OrbitConfig) -> Self {
        Self {
            polar: Smoothed::new(config.polar.clamp(config.rest_polar)),
            ..Self::default()
        }
    }

    /// Records a new scroll position. Only targets change.
    pub fn set_scroll_progress(&mut self, progress: f32) {
        let progress = progress.clamp(0.0, 1.0);
        self.scroll.target = progress;
        self.scroll_angle = progress * TAU;
    }

    pub fn set_pointer(&mut self, x: f32, y: f32) {
        self.pointer_x.target = x;
        self.pointer_y.target = y;
    }

    /// Wave-field update: scroll and pointer are each smoothed once.
    pub fn update_wave(&mut self, config: &WaveFieldConfig) {
        self.scroll.step(config.scroll_smoothing);
        self.pointer_x.step(config.pointer_smoothing);
        self.pointer_y.step(config.pointer_smoothing);
    }

    /// Orbit update: the pointer is smoothed, blended with the scroll angle
    /// into raw angle targets, then the angles are smoothed again and clamped.
    pub fn update_orbit(&mut self, config: &OrbitConfig) {
        self.scroll.step(config.view_smoothing);
        let pointer_x = self.pointer_x.step(config.pointer_smoothing);
        let pointer_y = self.pointer_y.step(config.pointer_smoothing);

        self.azimuth.target = self.scroll_angle + pointer_x * config.pointer_azimuth_influence;
        self.polar.target = config.rest_polar + pointer_y * config.pointer_polar_influence;

        self.azimuth.step_within(config.view_smoothing, config.azimuth);
        self.polar.step_within(config.view_smoothing, config.polar);
    }
}

/// Scroll offset normalised over the scrollable height, in [0, 1].
pub fn scroll_progress(scroll_y: f32, document_height: f32, viewport_height: f32) -> f32 {
    let max_scroll = (document_height - viewport_height).max(1.0);
    (scroll_y / max_scroll).clamp(0.0, 1.0)
}

/// Pointer coordinate mapped to [-1, 1] across `extent`, 0 at the centre.
pub fn pointer_offset(client: f32, extent: f32) -> f32 {
    if !(extent > 0.0) {
        return 0.0;
    }
    ((client / extent - 0.5) * 2.0).clamp(-1.0, 1.0)
}

#[cfg(test)]
mod tests {
    use std::f32::consts::PI;

    use approx::assert_relative_eq;

    use super::*;

    #[test]
    fn progress_stays_in_unit_range() {
        let document = 5000.0;
        let viewport = 800.0;
        let mut y = 0.0;
        while y <= document {
            let p = scroll_progress(y, document, viewport);
            assert!((0.0..=1.0).contains(&p), "progress {p} at {y}");
            y += 37.0;
        }
        assert_eq!(scroll_progress(document, document, viewport), 1.0);
    }

    #[test]
    fn short_documents_do_not_divide_by_zero() {
        assert_eq!(scroll_progress(0.0, 600.0, 800.0), 0.0);
        assert_eq!(scroll_progress(10.0, 600.0, 800.0), 1.0);
    }

    #[test]
    fn pointer_offsets_stay_in_range() {
        let width = 1280.0;
        let mut x = 0.0;
        while x <= width {
            let o = pointer_offset(x, width);
            assert!((-1.0..=1.0).contains(&o));
            x += 13.0;
        }
        assert_relative_eq!(pointer_offset(640.0, width), 0.0);
        assert_relative_eq!(pointer_offset(0.0, width), -1.0);
        assert_eq!(pointer_offset(10.0, 0.0), 0.0);
    }

    #[test]
    fn smoothing_converges_on_target() {
        let mut value = Smoothed::new(0.0);
        value.target = 1.0;
        value.step(0.5);
        assert_relative_eq!(value.current, 0.5);
        for _ in 0..100 {
            value.step(0.5);
        }
        assert_relative_eq!(value.current, 1.0, epsilon = 1e-6);
    }

    #[test]
    fn extreme_targets_never_escape_bounds() {
        let config = OrbitConfig::default();
        for &extreme in &[1.0e6_f32, -1.0e6, f32::MAX, f32::MIN, f32::INFINITY] {
            let mut view = ViewState::for_orbit(&config);
            view.scroll_angle = extreme;
            view.set_pointer(extreme, -extreme);
            for _ in 0..50 {
                view.update_orbit(&config);
                assert!(config.azimuth.contains(view.azimuth.current));
                assert!(config.polar.contains(view.polar.current));
            }
        }
    }

    #[test]
    fn raw_targets_are_not_clamped() {
        let config = OrbitConfig::default();
        let mut view = ViewState::for_orbit(&config);
        view.set_scroll_progress(1.0);
        view.update_orbit(&config);
        assert!(view.azimuth.target > config.azimuth.max);
        assert!(view.azimuth.current <= config.azimuth.max);
    }

    #[test]
    fn half_scroll_targets_half_turn() {
        let config = OrbitConfig::default();
        let mut view = ViewState::for_orbit(&config);
        view.set_scroll_progress(scroll_progress(2100.0, 5000.0, 800.0));
        for _ in 0..400 {
            view.update_orbit(&config);
        }
        assert_relative_eq!(view.scroll_angle, PI, epsilon = 1e-4);
        assert_relative_eq!(view.azimuth.target, PI, epsilon = 1e-4);
        assert_relative_eq!(view.azimuth.current, config.azimuth.max, epsilon = 1e-4);
    }

    #[test]
    fn pointer_is_smoothed_before_reaching_the_view() {
        let config = OrbitConfig::default();
        let mut view = ViewState::for_orbit(&config);
        view.set_pointer(1.0, 0.0);
        view.update_orbit(&config);

        assert_relative_eq!(view.pointer_x.current, 0.05);
        let expected_target = 0.05 * config.pointer_azimuth_influence;
        assert_relative_eq!(view.azimuth.target, expected_target);
        assert_relative_eq!(view.azimuth.current, expected_target * 0.08);
    }

    #[test]
    fn wave_update_smooths_scroll_once() {
        let config = WaveFieldConfig::default();
        let mut view = ViewState::for_wave_field();
        view.set_scroll_progress(1.0);
        view.update_wave(&config);
        assert_relative_eq!(view.scroll.current, 0.05);
    }
}
