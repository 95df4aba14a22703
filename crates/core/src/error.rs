/// Result alias that carries the custom [`BackdropError`] type.
pub type Result<T> = std::result::Result<T, BackdropError>;

/// Common error type for the core crate.
///
/// Only configuration and I/O errors reach callers of the app. Capability
/// and asset failures are absorbed by the driver and logged, since the
/// backdrop degrades instead of failing.
#[derive(Debug, thiserror::Error)]
pub enum BackdropError {
    /// Free-form message for conditions without a dedicated variant.
    #[error("{0}")]
    Message(String),
    /// Wrapper around standard IO errors.
    #[error("{0}")]
    Io(#[from] std::io::Error),
    /// A caller passed a value outside the accepted domain.
    #[error("invalid input: {0}")]
    InvalidInput(&'static str),
    /// Configuration failed validation.
    #[error("invalid configuration: {0}")]
    InvalidConfig(String),
    /// The host cannot draw 3D content.
    #[error("3D rendering unsupported: {0}")]
    CapabilityUnsupported(String),
    /// An external asset could not be fetched or decoded.
    #[error("failed to load `{url}`: {reason}")]
    AssetLoadFailed { url: String, reason: String },
    /// Asset bytes were fetched but are malformed.
    #[error("decode error: {0}")]
    Decode(String),
    /// JSON (de)serialisation failure.
    #[error("{0}")]
    Json(#[from] serde_json::Error),
    /// Image decoding failure.
    #[error("{0}")]
    Image(#[from] image::ImageError),
    /// Malformed or invalid glTF model.
    #[error("{0}")]
    Gltf(#[from] gltf::Error),
    /// The renderer rejected a frame.
    #[error("render error: {0}")]
    Render(String),
}

impl BackdropError {
    /// Creates a new error that simply wraps the provided message.
    pub fn msg<T: Into<String>>(msg: T) -> Self {
        Self::Message(msg.into())
    }

    pub fn asset(url: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::AssetLoadFailed {
            url: url.into(),
            reason: reason.into(),
        }
    }
}

impl From<&str> for BackdropError {
    fn from(value: &str) -> Self {
        Self::msg(value)
    }
}

impl From<String> for BackdropError {
    fn from(value: String) -> Self {
        Self::Message(value)
    }
}
