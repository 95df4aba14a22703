//! The page the backdrop lives in: container lookup, capability probing,
//! listeners, the render surface and frame scheduling.
//!
//! [`HeadlessHost`] implements the seam without a browser so the driver can
//! run natively, from the CLI and under test.

use std::{
    collections::{BTreeMap, VecDeque},
    time::Duration,
};

use serde::{Deserialize, Serialize};

use crate::{BackdropError, Result};

/// Size of the visible area in CSS pixels.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Viewport {
    pub width: f32,
    pub height: f32,
    pub device_pixel_ratio: f32,
}

impl Viewport {
    pub fn aspect(&self) -> f32 {
        self.width / self.height.max(1.0)
    }
}

impl Default for Viewport {
    fn default() -> Self {
        Self {
            width: 1280.0,
            height: 720.0,
            device_pixel_ratio: 1.0,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum ListenerKind {
    Resize,
    Scroll,
    PointerMove,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct ListenerId(pub u64);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SurfaceHandle(pub u64);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct FrameRequest(pub u64);

/// Input delivered to registered listeners.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub enum HostEvent {
    Resize(Viewport),
    Scroll { scroll_y: f32, document_height: f32 },
    PointerMove { client_x: f32, client_y: f32 },
}

impl HostEvent {
    pub fn kind(&self) -> ListenerKind {
        match self {
            HostEvent::Resize(_) => ListenerKind::Resize,
            HostEvent::Scroll { .. } => ListenerKind::Scroll,
            HostEvent::PointerMove { .. } => ListenerKind::PointerMove,
        }
    }
}

/// Current scroll position and document size.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct ScrollMetrics {
    pub scroll_y: f32,
    pub document_height: f32,
}

/// Services the driver needs from the page.
pub trait Host {
    fn has_container(&self, id: &str) -> bool;

    /// Whether 3D rendering is available. Errors count as unsupported.
    fn detect_capability(&self) -> Result<bool>;

    fn add_container_class(&mut self, id: &str, class: &str);

    fn viewport(&self) -> Viewport;

    fn scroll_metrics(&self) -> ScrollMetrics;

    fn attach_surface(&mut self, container_id: &str, viewport: Viewport) -> Result<SurfaceHandle>;

    fn detach_surface(&mut self, surface: SurfaceHandle);

    fn add_listener(&mut self, kind: ListenerKind) -> ListenerId;

    fn remove_listener(&mut self, id: ListenerId);

    /// Events delivered since the last call, oldest first.
    fn drain_events(&mut self) -> Vec<HostEvent>;

    /// Asks for one callback on the next display refresh.
    fn request_frame(&mut self) -> FrameRequest;

    fn cancel_frame(&mut self, request: FrameRequest);

    /// Monotonic timestamp for frame timing.
    fn now(&self) -> Duration;
}

/// What the headless capability probe reports.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum CapabilityProbe {
    Supported,
    Unsupported,
    /// The probe itself fails with an error.
    Faulty,
    /// The probe panics.
    Panics,
}

/// A page without a browser: the caller scripts scroll, pointer, resize and
/// time, then fires scheduled frames with [`HeadlessHost::take_frame`].
#[derive(Debug)]
pub struct HeadlessHost {
    container: Option<String>,
    classes: Vec<String>,
    probe: CapabilityProbe,
    viewport: Viewport,
    scroll: ScrollMetrics,
    surfaces: Vec<SurfaceHandle>,
    listeners: BTreeMap<ListenerId, ListenerKind>,
    events: VecDeque<HostEvent>,
    pending_frame: Option<FrameRequest>,
    now: Duration,
    next_id: u64,
    mutations: usize,
}

impl HeadlessHost {
    pub fn new(container_id: impl Into<String>) -> Self {
        Self {
            container: Some(container_id.into()),
            classes: Vec::new(),
            probe: CapabilityProbe::Supported,
            viewport: Viewport::default(),
            scroll: ScrollMetrics {
                scroll_y: 0.0,
                document_height: 4000.0,
            },
            surfaces: Vec::new(),
            listeners: BTreeMap::new(),
            events: VecDeque::new(),
            pending_frame: None,
            now: Duration::ZERO,
            next_id: 1,
            mutations: 0,
        }
    }

    /// A page with no mount point at all.
    pub fn without_container() -> Self {
        Self {
            container: None,
            ..Self::new(String::new())
        }
    }

    pub fn with_capability(mut self, probe: CapabilityProbe) -> Self {
        self.probe = probe;
        self
    }

    pub fn with_viewport(mut self, viewport: Viewport) -> Self {
        self.viewport = viewport;
        self
    }

    pub fn with_document_height(mut self, height: f32) -> Self {
        self.scroll.document_height = height;
        self
    }

    fn next_id(&mut self) -> u64 {
        let id = self.next_id;
        self.next_id += 1;
        id
    }

    fn dispatch(&mut self, event: HostEvent) {
        let kind = event.kind();
        if self.listeners.values().any(|listener| *listener == kind) {
            self.events.push_back(event);
        }
    }

    pub fn scroll_to(&mut self, scroll_y: f32) {
        let max = (self.scroll.document_height - self.viewport.height).max(0.0);
        self.scroll.scroll_y = scroll_y.clamp(0.0, max);
        self.dispatch(HostEvent::Scroll {
            scroll_y: self.scroll.scroll_y,
            document_height: self.scroll.document_height,
        });
    }

    /// Scrolls to a fraction of the scrollable height.
    pub fn scroll_to_fraction(&mut self, fraction: f32) {
        let max = (self.scroll.document_height - self.viewport.height).max(0.0);
        self.scroll_to(max * fraction.clamp(0.0, 1.0));
    }

    pub fn move_pointer(&mut self, client_x: f32, client_y: f32) {
        self.dispatch(HostEvent::PointerMove { client_x, client_y });
    }

    pub fn resize(&mut self, width: f32, height: f32) {
        self.viewport.width = width;
        self.viewport.height = height;
        self.dispatch(HostEvent::Resize(self.viewport));
    }

    pub fn advance(&mut self, delta: Duration) {
        self.now += delta;
    }

    /// Consumes the scheduled frame, if any. The caller then runs the
    /// driver's frame callback.
    pub fn take_frame(&mut self) -> bool {
        self.pending_frame.take().is_some()
    }

    pub fn has_pending_frame(&self) -> bool {
        self.pending_frame.is_some()
    }

    pub fn listener_count(&self) -> usize {
        self.listeners.len()
    }

    pub fn surface_count(&self) -> usize {
        self.surfaces.len()
    }

    pub fn container_classes(&self) -> &[String] {
        &self.classes
    }

    /// Number of page mutations: classes added, surfaces attached or removed.
    pub fn mutation_count(&self) -> usize {
        self.mutations
    }
}

impl Host for HeadlessHost {
    fn has_container(&self, id: &str) -> bool {
        self.container.as_deref() == Some(id)
    }

    fn detect_capability(&self) -> Result<bool> {
        match self.probe {
            CapabilityProbe::Supported => Ok(true),
            CapabilityProbe::Unsupported => Ok(false),
            CapabilityProbe::Faulty => Err(BackdropError::CapabilityUnsupported(
                "context creation threw".to_string(),
            )),
            CapabilityProbe::Panics => panic!("capability probe crashed"),
        }
    }

    fn add_container_class(&mut self, id: &str, class: &str) {
        if self.has_container(id) && !self.classes.iter().any(|c| c == class) {
            self.classes.push(class.to_string());
            self.mutations += 1;
        }
    }

    fn viewport(&self) -> Viewport {
        self.viewport
    }

    fn scroll_metrics(&self) -> ScrollMetrics {
        self.scroll
    }

    fn attach_surface(&mut self, container_id: &str, viewport: Viewport) -> Result<SurfaceHandle> {
        if !self.has_container(container_id) {
            return Err(BackdropError::msg(format!(
                "no container `{container_id}` to attach to"
            )));
        }
        let handle = SurfaceHandle(self.next_id());
        tracing::trace!(?handle, width = viewport.width, height = viewport.height, "surface attached");
        self.surfaces.push(handle);
        self.mutations += 1;
        Ok(handle)
    }

    fn detach_surface(&mut self, surface: SurfaceHandle) {
        let before = self.surfaces.len();
        self.surfaces.retain(|attached| *attached != surface);
        if self.surfaces.len() != before {
            self.mutations += 1;
        }
    }

    fn add_listener(&mut self, kind: ListenerKind) -> ListenerId {
        let id = ListenerId(self.next_id());
        self.listeners.insert(id, kind);
        id
    }

    fn remove_listener(&mut self, id: ListenerId) {
        self.listeners.remove(&id);
    }

    fn drain_events(&mut self) -> Vec<HostEvent> {
        self.events.drain(..).collect()
    }

    fn request_frame(&mut self) -> FrameRequest {
        let request = FrameRequest(self.next_id());
        self.pending_frame = Some(request);
        request
    }

    fn cancel_frame(&mut self, request: FrameRequest) {
        if self.pending_frame == Some(request) {
            self.pending_frame = None;
        }
    }

    fn now(&self) -> Duration {
        self.now
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn events_only_reach_registered_listeners() {
        let mut host = HeadlessHost::new("root");
        host.scroll_to(100.0);
        assert!(host.drain_events().is_empty());

        let id = host.add_listener(ListenerKind::Scroll);
        host.scroll_to(200.0);
        host.move_pointer(1.0, 1.0);
        let events = host.drain_events();
        assert_eq!(events.len(), 1);
        assert_eq!(events[0].kind(), ListenerKind::Scroll);

        host.remove_listener(id);
        host.scroll_to(300.0);
        assert!(host.drain_events().is_empty());
    }

    #[test]
    fn scroll_is_limited_to_document() {
        let mut host = HeadlessHost::new("root").with_document_height(1720.0);
        host.scroll_to(10_000.0);
        assert_eq!(host.scroll_metrics().scroll_y, 1000.0);
        host.scroll_to_fraction(0.5);
        assert_eq!(host.scroll_metrics().scroll_y, 500.0);
    }

    #[test]
    fn cancelling_a_stale_request_keeps_the_new_one() {
        let mut host = HeadlessHost::new("root");
        let first = host.request_frame();
        let second = host.request_frame();
        host.cancel_frame(first);
        assert!(host.has_pending_frame());
        host.cancel_frame(second);
        assert!(!host.take_frame());
    }

    #[test]
    fn surfaces_need_the_container() {
        let mut host = HeadlessHost::without_container();
        assert!(host.attach_surface("root", Viewport::default()).is_err());
        assert_eq!(host.mutation_count(), 0);
    }
}
