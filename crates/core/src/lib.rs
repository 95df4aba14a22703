//! Core library for the animated site backdrop.
//!
//! The crate drives a 3D background that reacts to scroll and pointer input:
//! either a particle field over a wave plane, or an environment-lit model the
//! camera orbits. The page and the GPU are reached through the [`Host`] and
//! [`Renderer`] traits, so the whole loop also runs headlessly.

pub mod assets;
pub mod config;
pub mod driver;
pub mod error;
pub mod host;
pub mod interactions;
pub mod render;
pub mod scene;
pub mod timeline;
pub mod view;

#[cfg(test)]
mod test_support;

pub use assets::{AssetSource, FileSource, MemorySource, PendingAsset};
pub use config::{BackdropConfig, BackgroundVariant};
pub use driver::{BackgroundDriver, DriverState, DriverStats, StopHandle};
pub use error::{BackdropError, Result};
pub use host::{HeadlessHost, Host, HostEvent, Viewport};
pub use interactions::{CursorFollower, StatCounter};
pub use render::{FrameRecord, RecordingRenderer, Renderer};
pub use scene::SceneGraph;
pub use timeline::{AnimationMixer, FrameClock};
pub use view::ViewState;
