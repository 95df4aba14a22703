//! The background render driver.
//!
//! ```text
//! Uninitialized -> DetectingCapability -> Unsupported
//!                                      \-> Initializing -> LoadingAssets -> Animating -> Destroyed
//! ```
//!
//! The driver never returns an error to the page. A missing container, a
//! host without 3D support and failed assets all degrade the backdrop and
//! are logged instead.

use std::{
    panic::{self, AssertUnwindSafe},
    sync::{
        atomic::{AtomicBool, Ordering},
        Arc,
    },
    time::Duration,
};

use serde::{Deserialize, Serialize};

use crate::{
    assets::{AssetKind, AssetRequest, AssetSource, LoadedAsset, PendingAsset},
    config::{BackdropConfig, BackgroundVariant},
    host::{
        FrameRequest, HeadlessHost, Host, HostEvent, ListenerId, ListenerKind, SurfaceHandle,
        Viewport,
    },
    render::{Renderer, SurfaceConfig},
    scene::SceneGraph,
    timeline::FrameClock,
    view::{pointer_offset, scroll_progress, ViewState},
    Result,
};

const LISTENERS: [ListenerKind; 3] = [
    ListenerKind::Resize,
    ListenerKind::Scroll,
    ListenerKind::PointerMove,
];

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum DriverState {
    Uninitialized,
    DetectingCapability,
    /// Terminal: the container carries the fallback class instead.
    Unsupported,
    Initializing,
    /// Frames render while assets are still arriving.
    LoadingAssets,
    Animating,
    /// Terminal: everything start created has been released.
    Destroyed,
}

impl DriverState {
    /// Whether the frame loop is live.
    pub fn is_running(self) -> bool {
        matches!(self, DriverState::LoadingAssets | DriverState::Animating)
    }
}

/// Requests a stop from anywhere, including inside a frame. The driver
/// honours it at the next frame boundary and does not reschedule.
#[derive(Debug, Clone, Default)]
pub struct StopHandle(Arc<AtomicBool>);

impl StopHandle {
    pub fn request_stop(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    pub fn is_requested(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }
}

/// Counters reported by the driver.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct DriverStats {
    pub frames_rendered: u64,
    pub render_errors: u64,
    pub pending_assets: usize,
    pub loaded_assets: Vec<String>,
    pub failed_assets: Vec<String>,
}

/// Owns the scene, view state and everything attached to the host.
pub struct BackgroundDriver<H: Host, R: Renderer, S: AssetSource> {
    config: BackdropConfig,
    host: H,
    renderer: R,
    source: Arc<S>,
    state: DriverState,
    view: ViewState,
    /// Viewport as of the last applied event.
    viewport: Viewport,
    scene: Option<SceneGraph>,
    clock: FrameClock,
    pending: Vec<PendingAsset>,
    listeners: Vec<ListenerId>,
    surface: Option<SurfaceHandle>,
    frame_request: Option<FrameRequest>,
    renderer_configured: bool,
    stop: StopHandle,
    stats: DriverStats,
}

impl<H: Host, R: Renderer, S: AssetSource> BackgroundDriver<H, R, S> {
    pub fn new(config: BackdropConfig, host: H, renderer: R, source: Arc<S>) -> Self {
        Self {
            config,
            host,
            renderer,
            source,
            state: DriverState::Uninitialized,
            view: ViewState::default(),
            viewport: Viewport::default(),
            scene: None,
            clock: FrameClock::new(),
            pending: Vec::new(),
            listeners: Vec::new(),
            surface: None,
            frame_request: None,
            renderer_configured: false,
            stop: StopHandle::default(),
            stats: DriverStats::default(),
        }
    }

    pub fn state(&self) -> DriverState {
        self.state
    }

    pub fn config(&self) -> &BackdropConfig {
        &self.config
    }

    pub fn view(&self) -> &ViewState {
        &self.view
    }

    pub fn scene(&self) -> Option<&SceneGraph> {
        self.scene.as_ref()
    }

    pub fn host(&self) -> &H {
        &self.host
    }

    pub fn host_mut(&mut self) -> &mut H {
        &mut self.host
    }

    pub fn renderer(&self) -> &R {
        &self.renderer
    }

    pub fn stop_handle(&self) -> StopHandle {
        self.stop.clone()
    }

    pub fn stats(&self) -> DriverStats {
        DriverStats {
            pending_assets: self.pending.len(),
            ..self.stats.clone()
        }
    }

    /// Mounts the backdrop and schedules the first frame.
    ///
    /// Only the first call on a fresh driver does anything. Returns the state
    /// the driver ends up in.
    pub fn start(&mut self) -> DriverState {
        if self.state != DriverState::Uninitialized {
            tracing::debug!(state = ?self.state, "start ignored");
            return self.state;
        }
        if self.stop.is_requested() {
            tracing::debug!("stop requested before start");
            self.stop();
            return self.state;
        }

        let container = self.config.mount.container_id.clone();
        if !self.host.has_container(&container) {
            tracing::warn!(%container, "no backdrop container found");
            return self.state;
        }

        self.state = DriverState::DetectingCapability;
        if !self.capability_supported() {
            self.fall_back(&container);
            return self.state;
        }

        self.state = DriverState::Initializing;
        if let Err(err) = self.initialize(&container) {
            tracing::warn!(%err, "renderer initialisation failed");
            self.release_resources();
            self.fall_back(&container);
            return self.state;
        }

        self.state = if self.pending.is_empty() {
            DriverState::Animating
        } else {
            DriverState::LoadingAssets
        };
        tracing::info!(variant = ?self.config.variant, state = ?self.state, "backdrop started");
        self.state
    }

    fn capability_supported(&self) -> bool {
        let host = &self.host;
        match panic::catch_unwind(AssertUnwindSafe(|| host.detect_capability())) {
            Ok(Ok(supported)) => supported,
            Ok(Err(err)) => {
                tracing::warn!(%err, "capability probe failed, treating as unsupported");
                false
            }
            Err(_) => {
                tracing::warn!("capability probe panicked, treating as unsupported");
                false
            }
        }
    }

    fn fall_back(&mut self, container: &str) {
        let class = self.config.mount.fallback_class.clone();
        self.host.add_container_class(container, &class);
        self.state = DriverState::Unsupported;
        tracing::info!(%class, "3D backdrop unavailable, fallback applied");
    }

    fn initialize(&mut self, container: &str) -> Result<()> {
        let viewport = self.host.viewport();
        let aspect = viewport.aspect();

        let (view, scene) = match self.config.variant {
            BackgroundVariant::WaveField => (
                ViewState::for_wave_field(),
                SceneGraph::wave_field(&self.config.wave, aspect),
            ),
            BackgroundVariant::OrbitModel => {
                let view = ViewState::for_orbit(&self.config.orbit);
                let scene = SceneGraph::orbit(&self.config.orbit, aspect, &view);
                (view, scene)
            }
        };

        self.renderer.configure(SurfaceConfig {
            width: viewport.width.max(0.0) as u32,
            height: viewport.height.max(0.0) as u32,
            pixel_ratio: viewport
                .device_pixel_ratio
                .min(self.config.quality.max_pixel_ratio),
            antialias: self.config.quality.antialias,
            transparent: scene.transparent,
            tone_mapping: scene.tone_mapping,
        })?;
        self.renderer_configured = true;

        self.surface = Some(self.host.attach_surface(container, viewport)?);
        self.view = view;
        self.viewport = viewport;
        self.scene = Some(scene);
        self.clock.reset();

        self.begin_asset_loads();
        for kind in LISTENERS {
            self.listeners.push(self.host.add_listener(kind));
        }

        let metrics = self.host.scroll_metrics();
        self.view.set_scroll_progress(scroll_progress(
            metrics.scroll_y,
            metrics.document_height,
            viewport.height,
        ));

        self.frame_request = Some(self.host.request_frame());
        Ok(())
    }

    fn begin_asset_loads(&mut self) {
        let first = match self.config.variant {
            BackgroundVariant::WaveField => self
                .config
                .wave
                .texture_url
                .clone()
                .map(|url| AssetRequest::new(url, AssetKind::Texture)),
            // The model follows once the environment has settled.
            BackgroundVariant::OrbitModel => match &self.config.orbit.environment_url {
                Some(url) => Some(AssetRequest::new(url.clone(), AssetKind::Environment)),
                None => self.model_request(),
            },
        };
        if let Some(request) = first {
            self.load(request);
        }
    }

    fn model_request(&self) -> Option<AssetRequest> {
        self.config
            .orbit
            .model_url
            .clone()
            .map(|url| AssetRequest::new(url, AssetKind::Model))
    }

    fn load(&mut self, request: AssetRequest) {
        tracing::debug!(url = %request.url, kind = ?request.kind, "loading asset");
        self.pending
            .push(PendingAsset::spawn(Arc::clone(&self.source), request));
    }

    /// One frame: advance time, fold in input, smooth, place, draw, and
    /// reschedule unless a stop was requested.
    pub fn frame(&mut self) {
        self.frame_request = None;
        if !self.state.is_running() {
            return;
        }
        if self.stop.is_requested() {
            self.stop();
            return;
        }

        let time = self.clock.tick(self.host.now());
        self.poll_assets();
        if let Some(scene) = self.scene.as_mut() {
            scene.animate(time);
        }
        self.apply_events();

        match self.config.variant {
            BackgroundVariant::WaveField => self.view.update_wave(&self.config.wave),
            BackgroundVariant::OrbitModel => self.view.update_orbit(&self.config.orbit),
        }

        if let Some(scene) = self.scene.as_mut() {
            scene.apply_view(&self.view, time, self.config.orbit.radius);
            match self.renderer.render(scene) {
                Ok(()) => self.stats.frames_rendered += 1,
                Err(err) => {
                    self.stats.render_errors += 1;
                    tracing::warn!(%err, errors = self.stats.render_errors, "frame dropped");
                }
            }
        }

        if self.stop.is_requested() {
            self.stop();
            return;
        }
        self.frame_request = Some(self.host.request_frame());
    }

    fn poll_assets(&mut self) {
        let mut settled = Vec::new();
        self.pending.retain(|pending| match pending.poll() {
            Some(result) => {
                settled.push((pending.request().clone(), result));
                false
            }
            None => true,
        });

        for (request, result) in settled {
            match result {
                Ok(asset) => {
                    tracing::info!(url = %request.url, kind = ?request.kind, "asset loaded");
                    self.install(asset);
                    self.stats.loaded_assets.push(request.url.clone());
                }
                Err(err) => {
                    tracing::warn!(url = %request.url, %err, "asset failed, rendering without it");
                    self.stats.failed_assets.push(request.url.clone());
                }
            }
            if request.kind == AssetKind::Environment {
                if let Some(model) = self.model_request() {
                    self.load(model);
                }
            }
        }

        if self.state == DriverState::LoadingAssets && self.pending.is_empty() {
            self.state = DriverState::Animating;
            tracing::debug!("all assets settled");
        }
    }

    fn install(&mut self, asset: LoadedAsset) {
        let Some(scene) = self.scene.as_mut() else {
            return;
        };
        match asset {
            LoadedAsset::Texture(texture) => scene.set_texture(texture),
            LoadedAsset::Environment(environment) => scene.environment = Some(environment),
            LoadedAsset::Model(model) => scene.set_model(model),
        }
    }

    /// Applies queued input in arrival order. Each event is measured against
    /// the viewport as it was when the event fired.
    fn apply_events(&mut self) {
        for event in self.host.drain_events() {
            match event {
                HostEvent::Scroll {
                    scroll_y,
                    document_height,
                } => {
                    self.view.set_scroll_progress(scroll_progress(
                        scroll_y,
                        document_height,
                        self.viewport.height,
                    ));
                }
                HostEvent::PointerMove { client_x, client_y } => {
                    self.view.set_pointer(
                        pointer_offset(client_x, self.viewport.width),
                        pointer_offset(client_y, self.viewport.height),
                    );
                }
                HostEvent::Resize(viewport) => {
                    self.viewport = viewport;
                    if let Some(scene) = self.scene.as_mut() {
                        scene.camera.set_aspect(viewport.aspect());
                    }
                    self.renderer.resize(
                        viewport.width.max(0.0) as u32,
                        viewport.height.max(0.0) as u32,
                    );
                }
            }
        }
    }

    /// Cancels the loop, removes listeners and the surface, and drops the
    /// scene. Idempotent; safe after a partial start.
    pub fn stop(&mut self) {
        self.stop.request_stop();
        self.release_resources();
        if self.state != DriverState::Destroyed {
            tracing::info!(frames = self.stats.frames_rendered, "backdrop stopped");
            self.state = DriverState::Destroyed;
        }
    }

    fn release_resources(&mut self) {
        if let Some(request) = self.frame_request.take() {
            self.host.cancel_frame(request);
        }
        for id in self.listeners.drain(..) {
            self.host.remove_listener(id);
        }
        if let Some(surface) = self.surface.take() {
            self.host.detach_surface(surface);
        }
        self.pending.clear();
        self.scene = None;
        if self.renderer_configured {
            self.renderer.release();
            self.renderer_configured = false;
        }
    }
}

impl<R: Renderer, S: AssetSource> BackgroundDriver<HeadlessHost, R, S> {
    /// Advances the headless clock and runs the scheduled frame, if any.
    /// Returns whether a frame ran.
    pub fn pump(&mut self, delta: Duration) -> bool {
        self.host.advance(delta);
        if self.host.take_frame() {
            self.frame();
            true
        } else {
            false
        }
    }
}

impl<H: Host, R: Renderer, S: AssetSource> Drop for BackgroundDriver<H, R, S> {
    fn drop(&mut self) {
        self.release_resources();
    }
}
