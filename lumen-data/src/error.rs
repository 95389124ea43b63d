//! Error types for dataset reading.

use std::path::PathBuf;
use thiserror::Error;

pub type Result<T> = std::result::Result<T, DatasetError>;

/// Errors that can occur while reading a dataset or a point cloud.
#[derive(Debug, Error)]
pub enum DatasetError {
    #[error("IO error at {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Missing file: {0}")]
    MissingFile(PathBuf),

    #[error("JSON error in {path}: {source}")]
    Json {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    #[error("PLY parsing error in {path}: {message}")]
    Ply { path: PathBuf, message: String },

    #[error("PLY writing error in {path}: {source}")]
    PlyWrite {
        path: PathBuf,
        #[source]
        source: serde_ply::SerializeError,
    },

    #[error("Image error at {path}: {source}")]
    Image {
        path: PathBuf,
        #[source]
        source: image::ImageError,
    },

    #[error("Unsupported camera model: {0} (only PINHOLE and SIMPLE_PINHOLE are supported)")]
    UnsupportedCameraModel(String),

    #[error("Invalid COLMAP data in {path}: {message}")]
    InvalidColmap { path: PathBuf, message: String },

    #[error("Invalid scene description in {path}: {message}")]
    InvalidScene { path: PathBuf, message: String },

    #[error("Camera {0} referenced by an image is not defined")]
    UnknownCamera(u32),

    #[error("No reader registered for format {0}")]
    NoReader(crate::DatasetFormat),
}

impl DatasetError {
    pub(crate) fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }

    pub(crate) fn colmap(path: impl Into<PathBuf>, message: impl Into<String>) -> Self {
        Self::InvalidColmap {
            path: path.into(),
            message: message.into(),
        }
    }
}
