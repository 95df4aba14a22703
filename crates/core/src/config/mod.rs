use std::{f32::consts::PI, fs, path::Path};

use serde::{Deserialize, Serialize};

use crate::{BackdropError, Result};

/// Which backdrop the driver builds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum BackgroundVariant {
    /// Particle field in front of a scroll-rolled wave plane.
    WaveField,
    /// Environment-lit model orbited by the camera as the page scrolls.
    OrbitModel,
}

/// Top-level configuration structure for the backdrop driver.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct BackdropConfig {
    pub variant: BackgroundVariant,
    pub mount: MountConfig,
    pub quality: QualityConfig,
    pub wave: WaveFieldConfig,
    pub orbit: OrbitConfig,
}

impl Default for BackdropConfig {
    fn default() -> Self {
        Self {
            variant: BackgroundVariant::WaveField,
            mount: MountConfig::default(),
            quality: QualityConfig::default(),
            wave: WaveFieldConfig::default(),
            orbit: OrbitConfig::default(),
        }
    }
}

impl BackdropConfig {
    pub fn wave_field() -> Self {
        Self::default()
    }

    pub fn orbit_model() -> Self {
        Self {
            variant: BackgroundVariant::OrbitModel,
            ..Self::default()
        }
    }

    /// Reads a JSON config file. Missing fields take their defaults.
    pub fn from_json_file(path: impl AsRef<Path>) -> Result<Self> {
        let raw = fs::read_to_string(path.as_ref())?;
        let config: Self = serde_json::from_str(&raw)?;
        config.validate()?;
        Ok(config)
    }

    pub fn to_json_pretty(&self) -> Result<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    /// Rejects values that would make the view escape its envelope or the
    /// smoothing diverge.
    pub fn validate(&self) -> Result<()> {
        if self.mount.container_id.trim().is_empty() {
            return Err(invalid("mount.container_id must not be empty"));
        }
        if !(self.quality.max_pixel_ratio > 0.0) {
            return Err(invalid("quality.max_pixel_ratio must be positive"));
        }

        self.wave.camera.validate("wave.camera")?;
        check_factor("wave.scroll_smoothing", self.wave.scroll_smoothing)?;
        check_factor("wave.pointer_smoothing", self.wave.pointer_smoothing)?;
        if self.wave.particles.count == 0 {
            return Err(invalid("wave.particles.count must be at least 1"));
        }
        if self.wave.particles.inner_radius < 0.0 || self.wave.particles.shell_depth < 0.0 {
            return Err(invalid("wave.particles radii must not be negative"));
        }
        if !(self.wave.particles.wrap_depth > 0.0) {
            return Err(invalid("wave.particles.wrap_depth must be positive"));
        }

        self.orbit.camera.validate("orbit.camera")?;
        check_factor("orbit.view_smoothing", self.orbit.view_smoothing)?;
        check_factor("orbit.pointer_smoothing", self.orbit.pointer_smoothing)?;
        self.orbit.azimuth.validate("orbit.azimuth")?;
        self.orbit.polar.validate("orbit.polar")?;
        if !(self.orbit.radius > 0.0) {
            return Err(invalid("orbit.radius must be positive"));
        }
        Ok(())
    }
}

fn invalid(message: impl Into<String>) -> BackdropError {
    BackdropError::InvalidConfig(message.into())
}

fn check_factor(name: &str, value: f32) -> Result<()> {
    if value > 0.0 && value <= 1.0 {
        Ok(())
    } else {
        Err(invalid(format!("{name} must be in (0, 1], got {value}")))
    }
}

/// Where the backdrop mounts in the host page.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct MountConfig {
    pub container_id: String,
    /// Class added to the container when 3D rendering is unavailable.
    pub fallback_class: String,
}

impl Default for MountConfig {
    fn default() -> Self {
        Self {
            container_id: "canvas-container".to_string(),
            fallback_class: "canvas-fallback".to_string(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct QualityConfig {
    pub max_pixel_ratio: f32,
    pub antialias: bool,
}

impl Default for QualityConfig {
    fn default() -> Self {
        Self {
            max_pixel_ratio: 2.0,
            antialias: true,
        }
    }
}

/// Perspective camera frustum.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct CameraConfig {
    pub fov_degrees: f32,
    pub near: f32,
    pub far: f32,
}

impl CameraConfig {
    fn validate(&self, name: &str) -> Result<()> {
        if !(self.fov_degrees > 0.0 && self.fov_degrees < 180.0) {
            return Err(invalid(format!("{name}.fov_degrees must be in (0, 180)")));
        }
        if !(self.near > 0.0 && self.far > self.near) {
            return Err(invalid(format!("{name} requires 0 < near < far")));
        }
        Ok(())
    }
}

/// Inclusive range an angle is clamped to, in radians.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct AngleBounds {
    pub min: f32,
    pub max: f32,
}

impl AngleBounds {
    pub const fn new(min: f32, max: f32) -> Self {
        Self { min, max }
    }

    pub fn clamp(&self, value: f32) -> f32 {
        value.clamp(self.min, self.max)
    }

    pub fn contains(&self, value: f32) -> bool {
        value >= self.min && value <= self.max
    }

    fn validate(&self, name: &str) -> Result<()> {
        if self.min.is_finite() && self.max.is_finite() && self.min <= self.max {
            Ok(())
        } else {
            Err(invalid(format!("{name} requires finite min <= max")))
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ParticleConfig {
    pub count: usize,
    pub size: f32,
    /// Per-frame rotation increment of the whole field, in radians.
    pub speed: f32,
    pub inner_radius: f32,
    pub shell_depth: f32,
    /// Particles past `+wrap_depth` on z reappear at `-wrap_depth`.
    pub wrap_depth: f32,
    pub opacity: f32,
    /// Fixed seed for a reproducible field; `None` draws from entropy.
    pub seed: Option<u64>,
}

impl Default for ParticleConfig {
    fn default() -> Self {
        Self {
            count: 2500,
            size: 2.5,
            speed: 0.0008,
            inner_radius: 800.0,
            shell_depth: 1200.0,
            wrap_depth: 1000.0,
            opacity: 0.6,
            seed: None,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PlaneConfig {
    pub width: f32,
    pub height: f32,
    /// Distance kept between the camera and the plane along -z.
    pub depth_offset: f32,
    /// Extra scale applied at full scroll.
    pub scroll_zoom: f32,
    /// Tilt in radians per unit of pointer offset.
    pub pointer_tilt: f32,
}

impl Default for PlaneConfig {
    fn default() -> Self {
        Self {
            width: 3500.0,
            height: 2200.0,
            depth_offset: 1000.0,
            scroll_zoom: 0.15,
            pointer_tilt: 0.015,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct WaveFieldConfig {
    pub camera: CameraConfig,
    pub camera_distance: f32,
    pub particles: ParticleConfig,
    pub plane: PlaneConfig,
    pub texture_url: Option<String>,
    pub scroll_smoothing: f32,
    pub pointer_smoothing: f32,
}

impl Default for WaveFieldConfig {
    fn default() -> Self {
        Self {
            camera: CameraConfig {
                fov_degrees: 50.0,
                near: 0.1,
                far: 3000.0,
            },
            camera_distance: 300.0,
            particles: ParticleConfig::default(),
            plane: PlaneConfig::default(),
            texture_url: Some("textures/wave.png".to_string()),
            scroll_smoothing: 0.05,
            pointer_smoothing: 0.05,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct OrbitConfig {
    pub camera: CameraConfig,
    pub radius: f32,
    pub azimuth: AngleBounds,
    pub polar: AngleBounds,
    /// Polar angle the camera rests at with a centred pointer.
    pub rest_polar: f32,
    pub pointer_azimuth_influence: f32,
    pub pointer_polar_influence: f32,
    pub view_smoothing: f32,
    pub pointer_smoothing: f32,
    pub environment_url: Option<String>,
    pub model_url: Option<String>,
    pub tone_mapping_exposure: f32,
}

impl Default for OrbitConfig {
    fn default() -> Self {
        Self {
            camera: CameraConfig {
                fov_degrees: 45.0,
                near: 0.25,
                far: 20.0,
            },
            radius: 3.2,
            azimuth: AngleBounds::new(-PI * 0.9, PI * 0.9),
            polar: AngleBounds::new(0.15, 0.65),
            rest_polar: 0.35,
            pointer_azimuth_influence: PI * 0.4,
            pointer_polar_influence: 0.25,
            view_smoothing: 0.08,
            pointer_smoothing: 0.05,
            environment_url: Some("environment/royal_esplanade_1k.hdr".to_string()),
            model_url: Some("models/DamagedHelmet.glb".to_string()),
            tone_mapping_exposure: 1.0,
        }
    }
}
