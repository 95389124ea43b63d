//! Lumen Data Crate
//!
//! Dataset loading for Gaussian reconstruction: format detection, per-format
//! readers that normalize cameras and initial point clouds into a [`SceneInfo`],
//! and PLY point cloud I/O. This crate is GPU-agnostic and never decodes the
//! training images themselves.

pub mod error;
pub mod format;
pub mod graphics;
pub mod ply;
pub mod readers;
pub mod registry;
pub mod scene_info;

pub use error::{DatasetError, Result};
pub use format::{DatasetFormat, FORMAT_RULES, FormatRule, detect_format};
pub use ply::{
    BasicPointCloud, VertexRow, read_point_cloud, read_vertex_rows, write_point_cloud,
    write_vertex_rows,
};
pub use readers::{ColmapReader, NeilfReader, TransformsFlavor, TransformsReader};
pub use registry::{DatasetReader, ReaderFlags, ReaderRegistry};
pub use scene_info::{CameraInfo, CameraRecord, Normalization, SceneInfo};
