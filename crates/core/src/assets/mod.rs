//! Asset fetching and decoding for the backdrop.
//!
//! Loads run on worker threads and hand their result back over a channel.
//! The frame loop polls a [`PendingAsset`] once per frame and never blocks on
//! it, so a slow or failed download only means the scene renders without
//! that asset.

use std::{
    collections::HashMap,
    fs,
    path::PathBuf,
    sync::{
        mpsc::{self, Receiver, TryRecvError},
        Arc,
    },
    thread,
};

use serde::{Deserialize, Serialize};

use crate::{BackdropError, Result};

mod model;

pub use model::parse_model;

/// Supplies the raw bytes behind an asset URL.
pub trait AssetSource: Send + Sync + 'static {
    fn fetch(&self, url: &str) -> Result<Vec<u8>>;
}

/// Reads assets from a directory on disk.
#[derive(Debug, Clone)]
pub struct FileSource {
    root: PathBuf,
}

impl FileSource {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }
}

impl AssetSource for FileSource {
    fn fetch(&self, url: &str) -> Result<Vec<u8>> {
        if url.starts_with("http://") || url.starts_with("https://") {
            return Err(BackdropError::asset(url, "remote fetching is not available"));
        }
        let path = self.root.join(url.trim_start_matches('/'));
        tracing::debug!(?path, "reading asset");
        fs::read(&path).map_err(|err| BackdropError::asset(url, err.to_string()))
    }
}

/// In-memory asset table, handy for embedded assets and tests.
#[derive(Debug, Default, Clone)]
pub struct MemorySource {
    entries: HashMap<String, Vec<u8>>,
}

impl MemorySource {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, url: impl Into<String>, bytes: impl Into<Vec<u8>>) -> Self {
        self.insert(url, bytes);
        self
    }

    pub fn insert(&mut self, url: impl Into<String>, bytes: impl Into<Vec<u8>>) {
        self.entries.insert(url.into(), bytes.into());
    }
}

impl AssetSource for MemorySource {
    fn fetch(&self, url: &str) -> Result<Vec<u8>> {
        self.entries
            .get(url)
            .cloned()
            .ok_or_else(|| BackdropError::asset(url, "not found"))
    }
}

/// What an asset URL is expected to contain.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum AssetKind {
    Texture,
    Environment,
    Model,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AssetRequest {
    pub url: String,
    pub kind: AssetKind,
}

impl AssetRequest {
    pub fn new(url: impl Into<String>, kind: AssetKind) -> Self {
        Self {
            url: url.into(),
            kind,
        }
    }

    /// Decodes fetched bytes according to the requested kind.
    pub fn decode(&self, bytes: &[u8]) -> Result<LoadedAsset> {
        match self.kind {
            AssetKind::Texture => TextureAsset::from_bytes(bytes).map(LoadedAsset::Texture),
            AssetKind::Environment => {
                EnvironmentMap::from_bytes(bytes).map(LoadedAsset::Environment)
            }
            AssetKind::Model => parse_model(bytes).map(LoadedAsset::Model),
        }
    }
}

#[derive(Debug, Clone)]
pub enum LoadedAsset {
    Texture(TextureAsset),
    Environment(EnvironmentMap),
    Model(ModelAsset),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum WrapMode {
    ClampToEdge,
    Repeat,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum FilterMode {
    Nearest,
    Linear,
}

/// RGBA8 texture ready for upload.
#[derive(Debug, Clone)]
pub struct TextureAsset {
    pub width: u32,
    pub height: u32,
    pub pixels: Vec<u8>,
    pub wrap: WrapMode,
    pub filter: FilterMode,
    pub srgb: bool,
}

impl TextureAsset {
    /// Decodes an image into a repeating, linearly filtered sRGB texture.
    pub fn from_bytes(bytes: &[u8]) -> Result<Self> {
        let image = image::load_from_memory(bytes)?.to_rgba8();
        let (width, height) = image.dimensions();
        tracing::debug!(width, height, "decoded texture");
        Ok(Self {
            width,
            height,
            pixels: image.into_raw(),
            wrap: WrapMode::Repeat,
            filter: FilterMode::Linear,
            srgb: true,
        })
    }
}

/// How an environment image wraps around the scene.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum EnvironmentMapping {
    EquirectangularReflection,
}

/// Linear HDR radiance used for image-based lighting.
#[derive(Debug, Clone)]
pub struct EnvironmentMap {
    pub width: u32,
    pub height: u32,
    pub texels: Vec<[f32; 3]>,
    pub mapping: EnvironmentMapping,
}

impl EnvironmentMap {
    pub fn from_bytes(bytes: &[u8]) -> Result<Self> {
        let image = image::load_from_memory(bytes)?.to_rgb32f();
        let (width, height) = image.dimensions();
        let texels = image.pixels().map(|pixel| pixel.0).collect();
        tracing::debug!(width, height, "decoded environment map");
        Ok(Self {
            width,
            height,
            texels,
            mapping: EnvironmentMapping::EquirectangularReflection,
        })
    }

    /// Mean radiance, used as the ambient term when nothing better exists.
    pub fn average_radiance(&self) -> [f32; 3] {
        if self.texels.is_empty() {
            return [0.0; 3];
        }
        let mut sum = [0.0_f32; 3];
        for texel in &self.texels {
            for (acc, channel) in sum.iter_mut().zip(texel) {
                *acc += channel;
            }
        }
        let count = self.texels.len() as f32;
        sum.map(|channel| channel / count)
    }
}

/// Named animation with its length in seconds.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AnimationClip {
    pub name: String,
    pub duration: f32,
}

/// Structure of a loaded glTF model.
#[derive(Debug, Clone, Default)]
pub struct ModelAsset {
    pub node_count: usize,
    pub mesh_count: usize,
    pub material_count: usize,
    pub clips: Vec<AnimationClip>,
    /// Length of the binary buffer chunk, 0 for JSON-only files.
    pub binary_len: usize,
}

/// A load in flight. Dropping it abandons the result.
#[derive(Debug)]
pub struct PendingAsset {
    request: AssetRequest,
    receiver: Receiver<Result<LoadedAsset>>,
}

impl PendingAsset {
    /// Fetches and decodes `request` on a worker thread.
    pub fn spawn<S: AssetSource>(source: Arc<S>, request: AssetRequest) -> Self {
        let (sender, receiver) = mpsc::channel();
        let job = request.clone();
        let spawned = thread::Builder::new()
            .name(format!("asset-{:?}", request.kind).to_lowercase())
            .spawn(move || {
                let result = source.fetch(&job.url).and_then(|bytes| {
                    job.decode(&bytes)
                        .map_err(|err| BackdropError::asset(&job.url, err.to_string()))
                });
                // The receiver is gone once the driver stops; nothing to report.
                let _ = sender.send(result);
            });

        if let Err(err) = spawned {
            tracing::warn!(url = %request.url, %err, "could not start asset worker");
        }

        Self { request, receiver }
    }

    pub fn request(&self) -> &AssetRequest {
        &self.request
    }

    /// `None` while the load is still running.
    pub fn poll(&self) -> Option<Result<LoadedAsset>> {
        match self.receiver.try_recv() {
            Ok(result) => Some(result),
            Err(TryRecvError::Empty) => None,
            Err(TryRecvError::Disconnected) => Some(Err(BackdropError::asset(
                &self.request.url,
                "loader exited without a result",
            ))),
        }
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use super::*;
    use crate::test_support::{hdr_bytes, png_bytes};

    fn wait(pending: &PendingAsset) -> Result<LoadedAsset> {
        for _ in 0..500 {
            if let Some(result) = pending.poll() {
                return result;
            }
            thread::sleep(Duration::from_millis(2));
        }
        panic!("asset never settled");
    }

    #[test]
    fn decodes_png_texture() {
        let texture = TextureAsset::from_bytes(&png_bytes(4, 2)).unwrap();
        assert_eq!((texture.width, texture.height), (4, 2));
        assert_eq!(texture.pixels.len(), 4 * 2 * 4);
        assert_eq!(&texture.pixels[0..4], &[10, 20, 30, 255]);
        assert_eq!(texture.wrap, WrapMode::Repeat);
    }

    #[test]
    fn pending_texture_resolves() {
        let source = Arc::new(MemorySource::new().with("wave.png", png_bytes(2, 2)));
        let pending = PendingAsset::spawn(source, AssetRequest::new("wave.png", AssetKind::Texture));
        match wait(&pending).unwrap() {
            LoadedAsset::Texture(texture) => assert_eq!(texture.width, 2),
            other => panic!("unexpected asset {other:?}"),
        }
    }

    #[test]
    fn missing_asset_fails_with_url() {
        let pending = PendingAsset::spawn(
            Arc::new(MemorySource::new()),
            AssetRequest::new("env.hdr", AssetKind::Environment),
        );
        let err = wait(&pending).unwrap_err();
        assert!(matches!(err, BackdropError::AssetLoadFailed { ref url, .. } if url == "env.hdr"));
    }

    #[test]
    fn pending_environment_decodes_hdr() {
        let source = Arc::new(MemorySource::new().with("env.hdr", hdr_bytes(4, 2, 0.5)));
        let pending = PendingAsset::spawn(source, AssetRequest::new("env.hdr", AssetKind::Environment));
        match wait(&pending).unwrap() {
            LoadedAsset::Environment(map) => {
                assert_eq!((map.width, map.height), (4, 2));
                assert_eq!(map.texels.len(), 8);
                assert_eq!(map.average_radiance(), [0.5, 0.5, 0.5]);
            }
            other => panic!("unexpected asset {other:?}"),
        }
    }

    #[test]
    fn corrupt_bytes_fail_to_decode() {
        let source = Arc::new(MemorySource::new().with("env.hdr", b"not an image".to_vec()));
        let pending = PendingAsset::spawn(source, AssetRequest::new("env.hdr", AssetKind::Environment));
        assert!(wait(&pending).is_err());
    }

    #[test]
    fn file_source_refuses_remote_urls() {
        let source = FileSource::new(".");
        let err = source.fetch("https://example.com/model.glb").unwrap_err();
        assert!(format!("{err}").contains("remote"));
    }

    #[test]
    fn average_radiance_of_flat_map() {
        let map = EnvironmentMap {
            width: 2,
            height: 1,
            texels: vec![[1.0, 0.0, 0.5], [0.0, 1.0, 0.5]],
            mapping: EnvironmentMapping::EquirectangularReflection,
        };
        assert_eq!(map.average_radiance(), [0.5, 0.5, 0.5]);
    }
}
