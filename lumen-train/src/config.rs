//! Model configuration shared by the scene, the camera builder and the store.

use lumen_data::ReaderFlags;
use serde::{Deserialize, Serialize};
use std::fs::File;
use std::io::{BufReader, BufWriter, Write};
use std::path::{Path, PathBuf};
use thiserror::Error;
use tracing::debug;

/// Name of the configuration dump written next to a fresh snapshot.
pub const CONFIG_FILE_NAME: &str = "cfg_args.json";

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("IO error at {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("Invalid configuration in {path}: {source}")]
    Json {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },
}

/// Dataset and output locations plus camera loading defaults.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ModelParams {
    /// Spherical harmonics degree of the Gaussian store.
    pub sh_degree: u32,
    /// Dataset root.
    pub source_path: PathBuf,
    /// Output directory for the snapshot and checkpoints.
    pub model_path: PathBuf,
    /// Image subfolder name (COLMAP datasets).
    pub images: String,
    /// `-1` for automatic, `1/2/4/8` for a fixed divisor, otherwise a target width.
    pub resolution: i32,
    pub white_background: bool,
    /// Device tag carried by every camera.
    pub data_device: String,
    pub eval: bool,
    pub debug_cuda: bool,
}

impl Default for ModelParams {
    fn default() -> Self {
        Self {
            sh_degree: 3,
            source_path: PathBuf::new(),
            model_path: PathBuf::new(),
            images: "images".to_string(),
            resolution: -1,
            white_background: false,
            data_device: "cuda".to_string(),
            eval: false,
            debug_cuda: false,
        }
    }
}

impl ModelParams {
    /// Flags forwarded to the dataset reader.
    pub fn reader_flags(&self) -> ReaderFlags {
        ReaderFlags {
            images: self.images.clone(),
            white_background: self.white_background,
            eval: self.eval,
            debug: self.debug_cuda,
        }
    }

    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let file = File::open(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        serde_json::from_reader(BufReader::new(file)).map_err(|source| ConfigError::Json {
            path: path.to_path_buf(),
            source,
        })
    }

    pub fn save(&self, path: &Path) -> Result<(), ConfigError> {
        let io_err = |source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        };
        let file = File::create(path).map_err(io_err)?;
        let mut writer = BufWriter::new(file);
        serde_json::to_writer_pretty(&mut writer, self).map_err(|source| ConfigError::Json {
            path: path.to_path_buf(),
            source,
        })?;
        writer.flush().map_err(io_err)?;
        debug!("Wrote model configuration to {}", path.display());
        Ok(())
    }
}
