//! Lumen Training Crate
//!
//! Scene assembly for Gaussian reconstruction: turns a dataset directory into
//! per-resolution camera lists and an initialized Gaussian store, and manages
//! the on-disk snapshot and checkpoint layout under the model path.
//!
//! ## Modules
//!
//! - [`scene`]: format detection, fresh start vs resume, snapshot and camera lists
//! - [`camera`]: resolved cameras and the image-decoding camera builder
//! - [`gaussian`]: the Gaussian point-cloud store and its PLY layout
//! - [`iteration`]: `iteration_<N>` checkpoint discovery
//! - [`config`]: model parameters

pub mod camera;
pub mod config;
pub mod gaussian;
pub mod iteration;
pub mod scene;

pub use camera::{Camera, CameraError, CameraLoader, ImageCameraLoader};
pub use config::{CONFIG_FILE_NAME, ConfigError, ModelParams};
pub use gaussian::{GaussianModel, PointCloudStore, StoreError};
pub use iteration::{checkpoint_path, search_for_max_iteration};
pub use scene::{LoadIteration, Scene, SceneError, SceneOptions};
