//! Error types for the export pipeline

use thiserror::Error;

/// Result type alias for export operations
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can occur while exporting a scene
#[derive(Error, Debug)]
pub enum Error {
    /// The export target id is not present in the live document
    #[error("Export target '{0}' not found. Please ensure an image is uploaded.")]
    ElementNotFound(String),

    /// The rasterizer finished without producing a canvas
    #[error("Failed to create canvas")]
    CanvasUnavailable,

    /// Encoding the canvas into a binary image failed
    #[error("Failed to create blob from canvas: {0}")]
    BlobError(String),

    /// Encoding the canvas into a data URL produced the empty sentinel
    #[error("Failed to generate image data URL")]
    DataUrlError,

    /// The rasterizer failed while cloning, laying out or painting
    #[error("Rendering failed: {0}")]
    RenderError(String),

    /// A resource could not be fetched or decoded
    #[error("Failed to load image {src}: {reason}")]
    ImageError { src: String, reason: String },

    /// Markup or style text could not be parsed
    #[error("Parse error: {0}")]
    ParseError(String),

    /// Invalid configuration or export options
    #[error("Invalid configuration: {0}")]
    ConfigError(String),

    /// Filesystem error
    #[error(transparent)]
    Io(#[from] std::io::Error),

    /// Generic error
    #[error("{0}")]
    Other(String),
}

impl Error {
    pub(crate) fn image(src: &str, reason: impl std::fmt::Display) -> Self {
        Error::ImageError {
            src: src.to_string(),
            reason: reason.to_string(),
        }
    }
}

impl From<image::ImageError> for Error {
    fn from(err: image::ImageError) -> Self {
        Error::BlobError(err.to_string())
    }
}
