//! Scene graph for both backdrop variants.
//!
//! The scene owns every object the renderer draws. The driver builds it at
//! start, mutates it once per frame from the smoothed [`ViewState`] and drops
//! it on stop.

use nalgebra::{Matrix4, Perspective3, Point3, Vector2, Vector3};
use rand::{rngs::StdRng, Rng, SeedableRng};
use serde::{Deserialize, Serialize};

use crate::{
    assets::{EnvironmentMap, ModelAsset, TextureAsset},
    config::{CameraConfig, OrbitConfig, ParticleConfig, PlaneConfig, WaveFieldConfig},
    timeline::{AnimationMixer, FrameTime},
    view::ViewState,
};

/// Particle colours: cyan, blue, purple, white, light cyan.
pub const PARTICLE_PALETTE: [[f32; 3]; 5] = [
    [0.376, 0.937, 1.0],
    [0.0, 0.380, 1.0],
    [0.545, 0.361, 0.965],
    [1.0, 1.0, 1.0],
    [0.0, 0.831, 1.0],
];

/// Perspective camera looking at a fixed point.
#[derive(Debug, Clone)]
pub struct Camera {
    pub position: Point3<f32>,
    pub target: Point3<f32>,
    pub up: Vector3<f32>,
    pub fov_degrees: f32,
    pub aspect: f32,
    pub near: f32,
    pub far: f32,
}

impl Camera {
    pub fn perspective(config: &CameraConfig, aspect: f32) -> Self {
        Self {
            position: Point3::origin(),
            target: Point3::origin(),
            up: Vector3::y(),
            fov_degrees: config.fov_degrees,
            aspect: sanitize_aspect(aspect),
            near: config.near,
            far: config.far,
        }
    }

    pub fn set_aspect(&mut self, aspect: f32) {
        let aspect = sanitize_aspect(aspect);
        if (self.aspect - aspect).abs() > 0.01 {
            tracing::debug!(from = self.aspect, to = aspect, "camera aspect changed");
        }
        self.aspect = aspect;
    }

    pub fn look_at(&mut self, target: Point3<f32>) {
        self.target = target;
    }

    /// Places the camera on a sphere around `center`. Polar is the elevation
    /// above the horizontal plane; azimuth 0 faces down +z.
    pub fn orbit(&mut self, center: Point3<f32>, radius: f32, azimuth: f32, polar: f32) {
        self.position = center
            + Vector3::new(
                radius * polar.cos() * azimuth.sin(),
                radius * polar.sin(),
                radius * polar.cos() * azimuth.cos(),
            );
        self.look_at(center);
    }

    pub fn view_matrix(&self) -> Matrix4<f32> {
        Matrix4::look_at_rh(&self.position, &self.target, &self.up)
    }

    pub fn projection_matrix(&self) -> Matrix4<f32> {
        Perspective3::new(self.aspect, self.fov_degrees.to_radians(), self.near, self.far)
            .to_homogeneous()
    }
}

fn sanitize_aspect(aspect: f32) -> f32 {
    if aspect.is_finite() && aspect > 0.0 {
        aspect
    } else {
        1.0
    }
}

/// Drifting point cloud in a spherical shell.
#[derive(Debug, Clone)]
pub struct ParticleField {
    pub positions: Vec<Vector3<f32>>,
    pub velocities: Vec<Vector3<f32>>,
    pub colors: Vec<[f32; 3]>,
    pub sizes: Vec<f32>,
    /// Field rotation about x and y, in radians.
    pub rotation: Vector2<f32>,
    pub point_size: f32,
    pub opacity: f32,
    speed: f32,
    wrap_depth: f32,
}

impl ParticleField {
    pub fn new(config: &ParticleConfig) -> Self {
        let mut rng = match config.seed {
            Some(seed) => StdRng::seed_from_u64(seed),
            None => StdRng::from_entropy(),
        };

        let mut positions = Vec::with_capacity(config.count);
        let mut velocities = Vec::with_capacity(config.count);
        let mut colors = Vec::with_capacity(config.count);
        let mut sizes = Vec::with_capacity(config.count);

        for _ in 0..config.count {
            let radius = config.inner_radius + rng.gen::<f32>() * config.shell_depth;
            let theta = rng.gen::<f32>() * std::f32::consts::TAU;
            let phi = (2.0 * rng.gen::<f32>() - 1.0).acos();
            positions.push(Vector3::new(
                radius * phi.sin() * theta.cos(),
                radius * phi.sin() * theta.sin(),
                radius * phi.cos(),
            ));
            velocities.push(Vector3::new(
                (rng.gen::<f32>() - 0.5) * 0.5,
                (rng.gen::<f32>() - 0.5) * 0.5,
                (rng.gen::<f32>() - 0.5) * 0.5,
            ));
            colors.push(PARTICLE_PALETTE[rng.gen_range(0..PARTICLE_PALETTE.len())]);
            sizes.push(rng.gen::<f32>() * 3.0 + 0.5);
        }

        Self {
            positions,
            velocities,
            colors,
            sizes,
            rotation: Vector2::zeros(),
            point_size: config.size,
            opacity: config.opacity,
            speed: config.speed,
            wrap_depth: config.wrap_depth,
        }
    }

    pub fn len(&self) -> usize {
        self.positions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.positions.is_empty()
    }

    /// Sways each particle on x/y and pushes it along z faster as the page
    /// scrolls. Particles leaving the far side wrap to the near side.
    pub fn advance(&mut self, elapsed: f32, scroll: f32, pointer: Vector2<f32>) {
        let push = 1.0 + scroll * 2.0;
        for (index, (position, velocity)) in self
            .positions
            .iter_mut()
            .zip(&self.velocities)
            .enumerate()
        {
            // Phase offset matches the flat xyz layout the shader consumes.
            let phase = (index * 3) as f32;
            position.x += (elapsed * 0.5 + phase).sin() * 0.1;
            position.y += (elapsed * 0.3 + phase).cos() * 0.1;
            position.z += velocity.z * push;
            if position.z > self.wrap_depth {
                position.z = -self.wrap_depth;
            }
        }

        self.rotation.y += self.speed + pointer.x * 0.0002;
        self.rotation.x += self.speed * 0.5 + pointer.y * 0.0002;
    }
}

/// Values fed to the wave plane's fragment shader.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct WaveUniforms {
    pub scroll: f32,
    pub time: f32,
    pub mouse: [f32; 2],
}

/// Textured plane kept behind the camera's view.
#[derive(Debug, Clone)]
pub struct WavePlane {
    pub width: f32,
    pub height: f32,
    pub position: Vector3<f32>,
    /// Tilt about x and y, in radians.
    pub rotation: Vector2<f32>,
    pub scale: f32,
    pub uniforms: WaveUniforms,
    pub texture: Option<TextureAsset>,
    config: PlaneConfig,
}

impl WavePlane {
    pub fn new(config: &PlaneConfig) -> Self {
        Self {
            width: config.width,
            height: config.height,
            position: Vector3::new(0.0, 0.0, -config.depth_offset),
            rotation: Vector2::zeros(),
            scale: 1.0,
            uniforms: WaveUniforms::default(),
            texture: None,
            config: config.clone(),
        }
    }

    pub fn update(&mut self, camera: &Camera, elapsed: f32, scroll: f32, pointer: Vector2<f32>) {
        self.uniforms = WaveUniforms {
            scroll,
            time: elapsed,
            mouse: [pointer.x, pointer.y],
        };
        self.scale = 1.0 + scroll * self.config.scroll_zoom;
        self.position = camera.position.coords - Vector3::z() * self.config.depth_offset;
        self.rotation = Vector2::new(
            pointer.y * self.config.pointer_tilt,
            pointer.x * self.config.pointer_tilt,
        );
    }
}

/// A model placed at the origin, with its clips playing if it has any.
#[derive(Debug, Clone)]
pub struct PlacedModel {
    pub asset: ModelAsset,
    pub mixer: Option<AnimationMixer>,
}

impl PlacedModel {
    pub fn new(asset: ModelAsset) -> Self {
        let mixer = AnimationMixer::for_clips(&asset.clips);
        Self { asset, mixer }
    }
}

/// Variant-specific scene contents.
#[derive(Debug, Clone)]
pub enum SceneContent {
    WaveField {
        plane: WavePlane,
        particles: ParticleField,
    },
    Orbit {
        center: Point3<f32>,
        model: Option<PlacedModel>,
    },
}

/// Tone mapping applied when resolving the frame.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub enum ToneMapping {
    None,
    AcesFilmic { exposure: f32 },
}

#[derive(Debug, Clone)]
pub struct SceneGraph {
    pub camera: Camera,
    pub environment: Option<EnvironmentMap>,
    pub content: SceneContent,
    pub transparent: bool,
    pub tone_mapping: ToneMapping,
}

impl SceneGraph {
    /// Camera at a fixed distance on +z, plane behind, particles around.
    pub fn wave_field(config: &WaveFieldConfig, aspect: f32) -> Self {
        let mut camera = Camera::perspective(&config.camera, aspect);
        camera.position = Point3::new(0.0, 0.0, config.camera_distance);
        camera.look_at(Point3::origin());

        Self {
            camera,
            environment: None,
            content: SceneContent::WaveField {
                plane: WavePlane::new(&config.plane),
                particles: ParticleField::new(&config.particles),
            },
            transparent: false,
            tone_mapping: ToneMapping::None,
        }
    }

    /// Camera on its orbit at the rest angle; the model arrives later.
    pub fn orbit(config: &OrbitConfig, aspect: f32, view: &ViewState) -> Self {
        let mut camera = Camera::perspective(&config.camera, aspect);
        let center = Point3::origin();
        camera.orbit(center, config.radius, view.azimuth.current, view.polar.current);

        Self {
            camera,
            environment: None,
            content: SceneContent::Orbit {
                center,
                model: None,
            },
            transparent: true,
            tone_mapping: ToneMapping::AcesFilmic {
                exposure: config.tone_mapping_exposure,
            },
        }
    }

    pub fn set_texture(&mut self, texture: TextureAsset) {
        match &mut self.content {
            SceneContent::WaveField { plane, .. } => plane.texture = Some(texture),
            SceneContent::Orbit { .. } => {
                tracing::debug!("orbit scene has no textured plane, texture ignored")
            }
        }
    }

    pub fn set_model(&mut self, asset: ModelAsset) {
        match &mut self.content {
            SceneContent::Orbit { model, .. } => *model = Some(PlacedModel::new(asset)),
            SceneContent::WaveField { .. } => {
                tracing::debug!("wave scene does not place models, model ignored")
            }
        }
    }

    pub fn model(&self) -> Option<&PlacedModel> {
        match &self.content {
            SceneContent::Orbit { model, .. } => model.as_ref(),
            SceneContent::WaveField { .. } => None,
        }
    }

    /// Advances time-based animation: shader time or clip playback.
    pub fn animate(&mut self, time: FrameTime) {
        match &mut self.content {
            SceneContent::WaveField { plane, .. } => plane.uniforms.time = time.elapsed,
            SceneContent::Orbit { model, .. } => {
                if let Some(mixer) = model.as_mut().and_then(|model| model.mixer.as_mut()) {
                    mixer.update(time.delta);
                }
            }
        }
    }

    /// Recomputes transforms and uniforms from the smoothed view.
    pub fn apply_view(&mut self, view: &ViewState, time: FrameTime, orbit_radius: f32) {
        let pointer = Vector2::new(view.pointer_x.current, view.pointer_y.current);
        match &mut self.content {
            SceneContent::WaveField { plane, particles } => {
                let scroll = view.scroll.current;
                particles.advance(time.elapsed, scroll, pointer);
                plane.update(&self.camera, time.elapsed, scroll, pointer);
            }
            SceneContent::Orbit { center, .. } => {
                self.camera.orbit(
                    *center,
                    orbit_radius,
                    view.azimuth.current,
                    view.polar.current,
                );
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use std::f32::consts::FRAC_PI_2;

    use approx::assert_relative_eq;

    use super::*;

    fn seeded_particles(count: usize) -> ParticleConfig {
        ParticleConfig {
            count,
            seed: Some(7),
            ..ParticleConfig::default()
        }
    }

    #[test]
    fn orbit_geometry_matches_spherical_coordinates() {
        let config = OrbitConfig::default();
        let mut camera = Camera::perspective(&config.camera, 1.0);
        camera.orbit(Point3::origin(), 2.0, 0.0, 0.0);
        assert_relative_eq!(camera.position, Point3::new(0.0, 0.0, 2.0), epsilon = 1e-6);

        camera.orbit(Point3::origin(), 2.0, FRAC_PI_2, 0.0);
        assert_relative_eq!(camera.position, Point3::new(2.0, 0.0, 0.0), epsilon = 1e-6);

        camera.orbit(Point3::origin(), 2.0, 0.3, 0.5);
        assert_relative_eq!(camera.position.coords.norm(), 2.0, epsilon = 1e-5);
        assert_relative_eq!(camera.position.y, 2.0 * 0.5_f32.sin(), epsilon = 1e-6);
    }

    #[test]
    fn orbit_centre_sits_on_the_view_axis() {
        let config = OrbitConfig::default();
        let mut camera = Camera::perspective(&config.camera, 16.0 / 9.0);
        let center = Point3::new(0.5, -0.25, 1.0);
        for (azimuth, polar) in [(0.0, 0.35), (2.5, 0.15), (-2.8, 0.65)] {
            camera.orbit(center, config.radius, azimuth, polar);

            let in_view = camera.view_matrix().transform_point(&center);
            assert_relative_eq!(in_view.x, 0.0, epsilon = 1e-4);
            assert_relative_eq!(in_view.y, 0.0, epsilon = 1e-4);
            assert_relative_eq!(in_view.z, -config.radius, epsilon = 1e-4);

            let ndc = camera.projection_matrix().transform_point(&in_view);
            assert_relative_eq!(ndc.x, 0.0, epsilon = 1e-4);
            assert_relative_eq!(ndc.y, 0.0, epsilon = 1e-4);
            assert!((-1.0..=1.0).contains(&ndc.z));
        }
    }

    #[test]
    fn degenerate_aspect_falls_back() {
        let mut camera = Camera::perspective(&OrbitConfig::default().camera, f32::NAN);
        assert_eq!(camera.aspect, 1.0);
        camera.set_aspect(0.0);
        assert_eq!(camera.aspect, 1.0);
        camera.set_aspect(16.0 / 9.0);
        assert_relative_eq!(camera.aspect, 16.0 / 9.0);
    }

    #[test]
    fn particles_spawn_in_shell() {
        let config = seeded_particles(500);
        let field = ParticleField::new(&config);
        assert_eq!(field.len(), 500);
        for position in &field.positions {
            let r = position.norm();
            assert!(r >= config.inner_radius - 1e-2);
            assert!(r <= config.inner_radius + config.shell_depth + 1e-2);
        }
        assert!(field.sizes.iter().all(|size| (0.5..=3.5).contains(size)));
    }

    #[test]
    fn seeded_fields_are_reproducible() {
        let a = ParticleField::new(&seeded_particles(10));
        let b = ParticleField::new(&seeded_particles(10));
        assert_eq!(a.positions, b.positions);
    }

    #[test]
    fn particles_wrap_past_far_plane() {
        let mut field = ParticleField::new(&seeded_particles(1));
        field.positions[0] = Vector3::new(0.0, 0.0, 999.9);
        field.velocities[0] = Vector3::new(0.0, 0.0, 0.2);
        field.advance(0.0, 0.0, Vector2::zeros());
        assert_eq!(field.positions[0].z, -1000.0);
    }

    #[test]
    fn field_rotation_follows_pointer() {
        let mut field = ParticleField::new(&seeded_particles(1));
        field.advance(0.0, 0.0, Vector2::new(1.0, -1.0));
        assert_relative_eq!(field.rotation.y, 0.0008 + 0.0002);
        assert_relative_eq!(field.rotation.x, 0.0004 - 0.0002);
    }

    #[test]
    fn wave_plane_tracks_scroll_and_pointer() {
        let config = WaveFieldConfig::default();
        let mut scene = SceneGraph::wave_field(&config, 1.5);
        let mut view = ViewState::for_wave_field();
        view.scroll.current = 1.0;
        view.pointer_x.current = 0.5;
        view.pointer_y.current = -0.5;

        let time = FrameTime {
            elapsed: 2.0,
            delta: 0.016,
        };
        scene.apply_view(&view, time, 0.0);

        let SceneContent::WaveField { plane, .. } = &scene.content else {
            panic!("expected wave field");
        };
        assert_relative_eq!(plane.scale, 1.15);
        assert_relative_eq!(plane.position.z, 300.0 - 1000.0);
        assert_relative_eq!(plane.rotation.x, -0.0075);
        assert_relative_eq!(plane.rotation.y, 0.0075);
        assert_eq!(
            plane.uniforms,
            WaveUniforms {
                scroll: 1.0,
                time: 2.0,
                mouse: [0.5, -0.5],
            }
        );
    }

    #[test]
    fn orbit_scene_places_model_and_plays_clips() {
        let config = OrbitConfig::default();
        let view = ViewState::for_orbit(&config);
        let mut scene = SceneGraph::orbit(&config, 1.0, &view);
        assert!(scene.model().is_none());

        scene.set_model(ModelAsset {
            clips: vec![crate::assets::AnimationClip {
                name: "idle".to_string(),
                duration: 1.0,
            }],
            ..ModelAsset::default()
        });
        scene.animate(FrameTime {
            elapsed: 0.5,
            delta: 0.5,
        });

        let mixer = scene.model().and_then(|model| model.mixer.as_ref()).unwrap();
        assert_relative_eq!(mixer.actions()[0].time, 0.5);
    }
}
