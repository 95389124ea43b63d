//! Built-in dataset readers
//!
//! - [`ColmapReader`]: COLMAP sparse reconstructions (binary or text)
//! - [`TransformsReader`]: NeRF-style `transforms_*.json` datasets
//!   (Blender, Stanford-ORB, Synthetic4Relight)
//! - [`NeilfReader`]: NeILF `inputs/sfm_scene.json` scenes

mod colmap;
mod neilf;
mod transforms;

pub use colmap::ColmapReader;
pub use neilf::NeilfReader;
pub use transforms::{TransformsFlavor, TransformsReader};

use crate::error::{DatasetError, Result};
use crate::ply::{read_point_cloud, write_point_cloud, BasicPointCloud};
use glam::Vec3;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use std::path::Path;
use tracing::info;

/// Points generated when a synthetic dataset ships without an initial cloud.
pub const RANDOM_POINT_COUNT: usize = 100_000;

const RANDOM_POINT_SEED: u64 = 0x5eed;

/// Zeroth-order spherical harmonic coefficient.
const SH_C0: f32 = 0.282_094_8;

/// Uniform random points inside `[min, max]` with dim, near-grey colors.
pub fn random_point_cloud(count: usize, min: Vec3, max: Vec3) -> BasicPointCloud {
    let mut rng = StdRng::seed_from_u64(RANDOM_POINT_SEED);
    let extent = max - min;

    let points = (0..count)
        .map(|_| min + Vec3::new(rng.r#gen(), rng.r#gen(), rng.r#gen()) * extent)
        .collect();
    // Colors are SH DC terms drawn in [0, 1/255) and converted back to RGB.
    let colors = (0..count)
        .map(|_| {
            let sh = Vec3::new(rng.r#gen(), rng.r#gen(), rng.r#gen()) / 255.0;
            sh * SH_C0 + 0.5
        })
        .collect();

    BasicPointCloud::new(points, colors)
}

/// Read the cloud at `path`, generating and storing it first if absent.
pub(crate) fn load_or_create_point_cloud(
    path: &Path,
    create: impl FnOnce() -> Result<BasicPointCloud>,
) -> Result<BasicPointCloud> {
    if !path.is_file() {
        let cloud = create()?;
        info!(
            "Writing initial point cloud with {} points to {}",
            cloud.len(),
            path.display()
        );
        write_point_cloud(path, &cloud)?;
    }
    read_point_cloud(path)
}

/// Pixel dimensions of an image file, read from its header only.
pub(crate) fn image_dimensions(path: &Path) -> Result<(u32, u32)> {
    if !path.is_file() {
        return Err(DatasetError::MissingFile(path.to_path_buf()));
    }
    image::image_dimensions(path).map_err(|source| DatasetError::Image {
        path: path.to_path_buf(),
        source,
    })
}

/// File name without extension, used as the camera's image name.
pub(crate) fn image_stem(path: &Path) -> String {
    path.file_stem()
        .map(|stem| stem.to_string_lossy().into_owned())
        .unwrap_or_default()
}

#[cfg(test)]
pub(crate) mod test_util {
    use image::{Rgb, RgbImage, Rgba, RgbaImage};
    use std::path::Path;

    pub fn write_rgb(path: &Path, width: u32, height: u32) {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).unwrap();
        }
        RgbImage::from_pixel(width, height, Rgb([10, 20, 30]))
            .save(path)
            .unwrap();
    }

    pub fn write_rgba(path: &Path, width: u32, height: u32) {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).unwrap();
        }
        RgbaImage::from_pixel(width, height, Rgba([255, 0, 0, 0]))
            .save(path)
            .unwrap();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_random_cloud_within_bounds() {
        let min = Vec3::splat(-1.3);
        let max = Vec3::splat(1.3);
        let cloud = random_point_cloud(500, min, max);
        assert_eq!(cloud.len(), 500);
        assert!(cloud.points.iter().all(|p| p.cmpge(min).all() && p.cmple(max).all()));
        assert!(cloud.colors.iter().all(|c| (c.x - 0.5).abs() < 0.01));
    }

    #[test]
    fn test_random_cloud_is_deterministic() {
        let a = random_point_cloud(10, Vec3::ZERO, Vec3::ONE);
        let b = random_point_cloud(10, Vec3::ZERO, Vec3::ONE);
        assert_eq!(a, b);
    }

    #[test]
    fn test_load_or_create_only_creates_once() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("points3d.ply");
        let first = load_or_create_point_cloud(&path, || {
            Ok(random_point_cloud(8, Vec3::ZERO, Vec3::ONE))
        })
        .unwrap();
        assert_eq!(first.len(), 8);

        let second = load_or_create_point_cloud(&path, || panic!("cloud already exists")).unwrap();
        assert_eq!(second.len(), 8);
    }
}
