//! Gaussian point-cloud store and its 3DGS PLY serialization.

use glam::{Quat, Vec3};
use lumen_data::{BasicPointCloud, DatasetError, read_vertex_rows, write_vertex_rows};
use serde::Serialize;
use serde::ser::{SerializeMap, Serializer};
use std::fs;
use std::path::{Path, PathBuf};
use thiserror::Error;
use tracing::{debug, info};

/// Zeroth-order spherical harmonic coefficient.
const SH_C0: f32 = 0.282_094_8;

/// Opacity every Gaussian starts from.
const INITIAL_OPACITY: f32 = 0.1;

/// Isotropic extent of a freshly created Gaussian.
const DEFAULT_SCALE: f32 = 0.01;

#[derive(Debug, Error)]
pub enum StoreError {
    #[error(transparent)]
    Dataset(#[from] DatasetError),
    #[error("IO error at {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("Unexpected Gaussian layout in {path}: {message}")]
    Layout { path: PathBuf, message: String },
}

/// Owner of the trainable representation, persisted as a point cloud file.
pub trait PointCloudStore {
    /// Initialize from a dataset point cloud. `spatial_lr_scale` is the scene extent.
    fn create_from_pcd(&mut self, cloud: &BasicPointCloud, spatial_lr_scale: f32);

    fn load_ply(&mut self, path: &Path) -> Result<(), StoreError>;

    /// Write to `path`, creating missing parent directories.
    fn save_ply(&self, path: &Path) -> Result<(), StoreError>;
}

pub fn rgb_to_sh(rgb: Vec3) -> Vec3 {
    (rgb - 0.5) / SH_C0
}

pub fn sh_to_rgb(sh: Vec3) -> Vec3 {
    sh * SH_C0 + 0.5
}

fn inverse_sigmoid(x: f32) -> f32 {
    (x / (1.0 - x)).ln()
}

fn sigmoid(x: f32) -> f32 {
    1.0 / (1.0 + (-x).exp())
}

/// 3D Gaussians with spherical harmonic color.
///
/// Opacities are stored as logits and scales as logs, matching the file layout.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct GaussianModel {
    max_sh_degree: u32,
    active_sh_degree: u32,
    spatial_lr_scale: f32,
    pub means: Vec<Vec3>,
    pub features_dc: Vec<Vec3>,
    /// Higher-order coefficients, `rest_len()` per Gaussian, channel-major.
    pub features_rest: Vec<f32>,
    pub opacities: Vec<f32>,
    pub scales: Vec<Vec3>,
    pub rotations: Vec<Quat>,
}

impl GaussianModel {
    pub fn new(sh_degree: u32) -> Self {
        Self {
            max_sh_degree: sh_degree,
            ..Default::default()
        }
    }

    pub fn len(&self) -> usize {
        self.means.len()
    }

    pub fn is_empty(&self) -> bool {
        self.means.is_empty()
    }

    pub fn max_sh_degree(&self) -> u32 {
        self.max_sh_degree
    }

    pub fn active_sh_degree(&self) -> u32 {
        self.active_sh_degree
    }

    pub fn spatial_lr_scale(&self) -> f32 {
        self.spatial_lr_scale
    }

    /// Activated opacity of Gaussian `index`.
    pub fn opacity(&self, index: usize) -> f32 {
        sigmoid(self.opacities[index])
    }

    /// Base color of Gaussian `index`.
    pub fn color(&self, index: usize) -> Vec3 {
        sh_to_rgb(self.features_dc[index])
    }

    /// Higher-order SH coefficients per Gaussian, across all three channels.
    pub fn rest_len(&self) -> usize {
        let coeffs = (self.max_sh_degree as usize + 1).pow(2);
        3 * (coeffs - 1)
    }
}

/// Higher-order SH coefficients of one Gaussian, written as `f_rest_<k>`.
struct RestCoefficients<'a>(&'a [f32]);

impl Serialize for RestCoefficients<'_> {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(self.0.len()))?;
        for (k, value) in self.0.iter().enumerate() {
            map.serialize_entry(&format!("f_rest_{k}"), value)?;
        }
        map.end()
    }
}

/// One `vertex` row of the 3DGS checkpoint layout.
#[derive(Serialize)]
struct GaussianRow<'a> {
    x: f32,
    y: f32,
    z: f32,
    nx: f32,
    ny: f32,
    nz: f32,
    f_dc_0: f32,
    f_dc_1: f32,
    f_dc_2: f32,
    #[serde(flatten)]
    f_rest: RestCoefficients<'a>,
    opacity: f32,
    scale_0: f32,
    scale_1: f32,
    scale_2: f32,
    rot_0: f32,
    rot_1: f32,
    rot_2: f32,
    rot_3: f32,
}

impl GaussianModel {
    fn row(&self, i: usize) -> GaussianRow<'_> {
        let rest_len = self.rest_len();
        let (mean, dc, scale, q) = (
            self.means[i],
            self.features_dc[i],
            self.scales[i],
            self.rotations[i],
        );
        GaussianRow {
            x: mean.x,
            y: mean.y,
            z: mean.z,
            nx: 0.0,
            ny: 0.0,
            nz: 0.0,
            f_dc_0: dc.x,
            f_dc_1: dc.y,
            f_dc_2: dc.z,
            f_rest: RestCoefficients(&self.features_rest[i * rest_len..(i + 1) * rest_len]),
            opacity: self.opacities[i],
            scale_0: scale.x,
            scale_1: scale.y,
            scale_2: scale.z,
            rot_0: q.w,
            rot_1: q.x,
            rot_2: q.y,
            rot_3: q.z,
        }
    }
}

impl PointCloudStore for GaussianModel {
    fn create_from_pcd(&mut self, cloud: &BasicPointCloud, spatial_lr_scale: f32) {
        info!("Number of points at initialisation: {}", cloud.len());
        let count = cloud.len();
        self.spatial_lr_scale = spatial_lr_scale;
        self.active_sh_degree = 0;
        self.means = cloud.points.clone();
        self.features_dc = cloud.colors.iter().copied().map(rgb_to_sh).collect();
        self.features_rest = vec![0.0; count * self.rest_len()];
        self.opacities = vec![inverse_sigmoid(INITIAL_OPACITY); count];
        self.scales = vec![Vec3::splat(DEFAULT_SCALE.ln()); count];
        self.rotations = vec![Quat::IDENTITY; count];
    }

    #[tracing::instrument(skip_all, fields(path = %path.display()))]
    fn load_ply(&mut self, path: &Path) -> Result<(), StoreError> {
        let rows = read_vertex_rows(path)?;
        let rest_len = self.rest_len();
        let layout = |message: String| StoreError::Layout {
            path: path.to_path_buf(),
            message,
        };

        if let Some(first) = rows.first() {
            let found = (0..).take_while(|i| first.contains(&format!("f_rest_{i}"))).count();
            if found != rest_len {
                return Err(layout(format!(
                    "expected {} f_rest properties for SH degree {}, found {}",
                    rest_len, self.max_sh_degree, found
                )));
            }
        }

        let mut model = GaussianModel::new(self.max_sh_degree);
        model.spatial_lr_scale = self.spatial_lr_scale;
        model.features_rest.reserve(rows.len() * rest_len);
        for (i, row) in rows.iter().enumerate() {
            let f = |name: &str| row.require_f32(name, i, path);
            model.means.push(Vec3::new(f("x")?, f("y")?, f("z")?));
            model
                .features_dc
                .push(Vec3::new(f("f_dc_0")?, f("f_dc_1")?, f("f_dc_2")?));
            for k in 0..rest_len {
                model.features_rest.push(f(&format!("f_rest_{k}"))?);
            }
            model.opacities.push(f("opacity")?);
            model
                .scales
                .push(Vec3::new(f("scale_0")?, f("scale_1")?, f("scale_2")?));
            // Stored as (w, x, y, z).
            let rotation = Quat::from_xyzw(f("rot_1")?, f("rot_2")?, f("rot_3")?, f("rot_0")?);
            model.rotations.push(rotation);
        }
        model.active_sh_degree = model.max_sh_degree;

        debug!("Loaded {} Gaussians", model.len());
        *self = model;
        Ok(())
    }

    #[tracing::instrument(skip_all, fields(path = %path.display()))]
    fn save_ply(&self, path: &Path) -> Result<(), StoreError> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).map_err(|source| StoreError::Io {
                path: path.to_path_buf(),
                source,
            })?;
        }

        let rows: Vec<GaussianRow<'_>> = (0..self.len()).map(|i| self.row(i)).collect();
        write_vertex_rows(path, &rows)?;

        info!("Saved {} Gaussians", self.len());
        Ok(())
    }
}
