use serde::{Deserialize, Serialize};

use crate::{
    scene::{SceneContent, SceneGraph, ToneMapping, WaveUniforms},
    BackdropError, Result,
};

/// Settings the renderer needs before the first frame.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SurfaceConfig {
    pub width: u32,
    pub height: u32,
    pub pixel_ratio: f32,
    pub antialias: bool,
    /// Clear to transparent so the page shows through.
    pub transparent: bool,
    pub tone_mapping: ToneMapping,
}

/// GPU submission target.
pub trait Renderer {
    fn configure(&mut self, surface: SurfaceConfig) -> Result<()>;

    fn resize(&mut self, width: u32, height: u32);

    /// Draws one frame of `scene`.
    fn render(&mut self, scene: &SceneGraph) -> Result<()>;

    /// Frees GPU resources. Safe to call more than once.
    fn release(&mut self);
}

/// What a recorded frame looked like.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FrameRecord {
    pub index: u64,
    pub camera_position: [f32; 3],
    /// Column-major world-to-camera transform.
    pub view_matrix: [[f32; 4]; 4],
    pub projection_matrix: [[f32; 4]; 4],
    pub uniforms: Option<WaveUniforms>,
    pub particle_count: usize,
    pub has_texture: bool,
    pub has_environment: bool,
    /// Mean environment radiance used as the ambient term.
    pub ambient: Option<[f32; 3]>,
    pub has_model: bool,
}

impl FrameRecord {
    fn capture(index: u64, scene: &SceneGraph) -> Self {
        let position = scene.camera.position;
        let (uniforms, particle_count, has_texture) = match &scene.content {
            SceneContent::WaveField { plane, particles } => {
                (Some(plane.uniforms), particles.len(), plane.texture.is_some())
            }
            SceneContent::Orbit { .. } => (None, 0, false),
        };
        Self {
            index,
            camera_position: [position.x, position.y, position.z],
            view_matrix: scene.camera.view_matrix().into(),
            projection_matrix: scene.camera.projection_matrix().into(),
            uniforms,
            particle_count,
            has_texture,
            has_environment: scene.environment.is_some(),
            ambient: scene
                .environment
                .as_ref()
                .map(|environment| environment.average_radiance()),
            has_model: scene.model().is_some(),
        }
    }
}

/// Headless renderer that keeps a summary of every submitted frame.
#[derive(Debug, Default)]
pub struct RecordingRenderer {
    surface: Option<SurfaceConfig>,
    frames: Vec<FrameRecord>,
    /// Keep at most this many records; 0 keeps all of them.
    history: usize,
    submitted: u64,
    fail_next: usize,
    released: bool,
}

impl RecordingRenderer {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_history(history: usize) -> Self {
        Self {
            history,
            ..Self::default()
        }
    }

    /// Makes the next `count` frames fail, to exercise the loop's recovery.
    pub fn fail_next_frames(&mut self, count: usize) {
        self.fail_next = count;
    }

    pub fn surface(&self) -> Option<&SurfaceConfig> {
        self.surface.as_ref()
    }

    pub fn frames(&self) -> &[FrameRecord] {
        &self.frames
    }

    pub fn last_frame(&self) -> Option<&FrameRecord> {
        self.frames.last()
    }

    /// Frames accepted, including ones dropped from the history.
    pub fn submitted(&self) -> u64 {
        self.submitted
    }

    pub fn is_released(&self) -> bool {
        self.released
    }
}

impl Renderer for RecordingRenderer {
    fn configure(&mut self, surface: SurfaceConfig) -> Result<()> {
        if surface.width == 0 || surface.height == 0 {
            return Err(BackdropError::Render(format!(
                "surface must not be empty, got {}x{}",
                surface.width, surface.height
            )));
        }
        self.surface = Some(surface);
        self.released = false;
        Ok(())
    }

    fn resize(&mut self, width: u32, height: u32) {
        if let Some(surface) = self.surface.as_mut() {
            surface.width = width.max(1);
            surface.height = height.max(1);
        }
    }

    fn render(&mut self, scene: &SceneGraph) -> Result<()> {
        if self.surface.is_none() || self.released {
            return Err(BackdropError::Render("renderer is not configured".to_string()));
        }
        if self.fail_next > 0 {
            self.fail_next -= 1;
            return Err(BackdropError::Render("simulated device loss".to_string()));
        }

        self.frames.push(FrameRecord::capture(self.submitted, scene));
        self.submitted += 1;
        if self.history > 0 && self.frames.len() > self.history {
            let overflow = self.frames.len() - self.history;
            self.frames.drain(0..overflow);
        }
        Ok(())
    }

    fn release(&mut self) {
        self.released = true;
    }
}

#[cfg(test)]
mod tests {
    use approx::assert_relative_eq;
    use nalgebra::{Matrix4, Point3, Vector3};

    use super::*;
    use crate::{
        config::{OrbitConfig, ParticleConfig, WaveFieldConfig},
        view::ViewState,
    };

    fn surface() -> SurfaceConfig {
        SurfaceConfig {
            width: 640,
            height: 360,
            pixel_ratio: 1.0,
            antialias: true,
            transparent: false,
            tone_mapping: ToneMapping::None,
        }
    }

    fn small_scene() -> SceneGraph {
        let config = WaveFieldConfig {
            particles: ParticleConfig {
                count: 3,
                seed: Some(1),
                ..ParticleConfig::default()
            },
            ..WaveFieldConfig::default()
        };
        SceneGraph::wave_field(&config, 16.0 / 9.0)
    }

    #[test]
    fn refuses_frames_before_configure() {
        let mut renderer = RecordingRenderer::new();
        assert!(renderer.render(&small_scene()).is_err());
    }

    #[test]
    fn records_scene_summary() {
        let mut renderer = RecordingRenderer::new();
        renderer.configure(surface()).unwrap();
        renderer.render(&small_scene()).unwrap();

        let frame = renderer.last_frame().unwrap();
        assert_eq!(frame.particle_count, 3);
        assert_eq!(frame.camera_position, [0.0, 0.0, 300.0]);
        assert!(!frame.has_texture);
        assert!(!frame.has_model);
    }

    #[test]
    fn history_is_bounded() {
        let mut renderer = RecordingRenderer::with_history(2);
        renderer.configure(surface()).unwrap();
        let scene = small_scene();
        for _ in 0..5 {
            renderer.render(&scene).unwrap();
        }
        assert_eq!(renderer.frames().len(), 2);
        assert_eq!(renderer.submitted(), 5);
        assert_eq!(renderer.frames()[0].index, 3);
    }

    #[test]
    fn records_camera_transforms() {
        let config = OrbitConfig::default();
        let view = ViewState::for_orbit(&config);
        let scene = SceneGraph::orbit(&config, 2.0, &view);
        let mut renderer = RecordingRenderer::new();
        renderer.configure(surface()).unwrap();
        renderer.render(&scene).unwrap();

        let frame = renderer.last_frame().unwrap();
        assert_eq!(frame.view_matrix, <[[f32; 4]; 4]>::from(scene.camera.view_matrix()));
        assert_eq!(
            frame.projection_matrix,
            <[[f32; 4]; 4]>::from(scene.camera.projection_matrix())
        );
        assert!(frame.ambient.is_none());

        let view_matrix = Matrix4::from(frame.view_matrix);
        let center = view_matrix.transform_point(&Point3::origin());
        assert_relative_eq!(center.coords, Vector3::new(0.0, 0.0, -config.radius), epsilon = 1e-4);
    }

    #[test]
    fn simulated_failures_are_transient() {
        let mut renderer = RecordingRenderer::new();
        renderer.configure(surface()).unwrap();
        renderer.fail_next_frames(1);
        let scene = small_scene();
        assert!(renderer.render(&scene).is_err());
        assert!(renderer.render(&scene).is_ok());
    }
}
