use std::path::PathBuf;

use thiserror::Error;

/// Library error type for mural operations.
#[derive(Debug, Error)]
pub enum Error {
    /// The configured artwork library is invalid or unreadable.
    #[error("invalid artwork library: {0}")]
    BadLibrary(String),

    /// The library scan completed but found no usable artwork.
    #[error("no artwork found in the configured library")]
    EmptyLibrary,

    /// An artwork file could not be decoded.
    #[error("unreadable artwork {path}: {source}")]
    Decode {
        path: PathBuf,
        #[source]
        source: image::ImageError,
    },

    /// The decoded artwork has a zero dimension.
    #[error("artwork {0} decoded to an empty image")]
    EmptyImage(PathBuf),

    /// Underlying IO error.
    #[error(transparent)]
    Io(#[from] std::io::Error),

    /// YAML/serde configuration error.
    #[error(transparent)]
    Config(#[from] serde_yaml::Error),

    /// Rendering error from the GPU shell.
    #[error("render error: {0}")]
    Render(anyhow::Error),
}
