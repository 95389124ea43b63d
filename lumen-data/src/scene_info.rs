//! Normalized reader output: camera descriptors and scene bundles.

use crate::graphics;
use crate::ply::BasicPointCloud;
use glam::{Mat3, Vec3};
use serde::Serialize;
use std::path::PathBuf;

/// A raw camera as described by a dataset, before any image is decoded.
#[derive(Debug, Clone, PartialEq)]
pub struct CameraInfo {
    /// Identifier assigned by the dataset (COLMAP image id, frame index).
    pub uid: u32,
    /// Camera-to-world rotation.
    pub rotation: Mat3,
    /// World-to-camera translation.
    pub translation: Vec3,
    pub fov_x: f32,
    pub fov_y: f32,
    pub image_path: PathBuf,
    pub image_name: String,
    pub width: u32,
    pub height: u32,
    /// Background to composite transparent pixels onto. `None` keeps alpha as a mask.
    pub background: Option<Vec3>,
}

impl CameraInfo {
    pub fn center(&self) -> Vec3 {
        graphics::camera_center(self.rotation, self.translation)
    }

    pub fn focal_x(&self) -> f32 {
        graphics::fov_to_focal(self.fov_x, self.width as f32)
    }

    pub fn focal_y(&self) -> f32 {
        graphics::fov_to_focal(self.fov_y, self.height as f32)
    }

    /// Serializable record written to `cameras.json`.
    pub fn to_record(&self, id: usize) -> CameraRecord {
        CameraRecord {
            id,
            img_name: self.image_name.clone(),
            width: self.width,
            height: self.height,
            position: self.center().to_array(),
            rotation: [
                self.rotation.row(0).to_array(),
                self.rotation.row(1).to_array(),
                self.rotation.row(2).to_array(),
            ],
            fy: self.focal_y(),
            fx: self.focal_x(),
        }
    }
}

/// A camera as stored in `cameras.json`.
#[derive(Debug, Clone, PartialEq, Serialize, serde::Deserialize)]
pub struct CameraRecord {
    pub id: usize,
    pub img_name: String,
    pub width: u32,
    pub height: u32,
    /// Camera centre in world space.
    pub position: [f32; 3],
    /// Camera-to-world rotation, row-major.
    pub rotation: [[f32; 3]; 3],
    pub fy: f32,
    pub fx: f32,
}

/// Scene normalization derived from the camera centres.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Normalization {
    pub translate: Vec3,
    /// Bounding radius of the cameras, used to scale optimization step sizes.
    pub radius: f32,
}

impl Normalization {
    /// Centre the cameras on their mean and take 1.1x the farthest centre as radius.
    pub fn from_cameras(cameras: &[CameraInfo]) -> Self {
        if cameras.is_empty() {
            return Self {
                translate: Vec3::ZERO,
                radius: 1.1,
            };
        }
        let centers: Vec<Vec3> = cameras.iter().map(CameraInfo::center).collect();
        let mean = centers.iter().copied().sum::<Vec3>() / centers.len() as f32;
        let diagonal = centers
            .iter()
            .map(|c| c.distance(mean))
            .fold(0.0_f32, f32::max);

        Self {
            translate: -mean,
            radius: diagonal * 1.1,
        }
    }
}

/// Everything a reader produces for one dataset.
#[derive(Debug, Clone)]
pub struct SceneInfo {
    pub point_cloud: BasicPointCloud,
    pub point_cloud_path: PathBuf,
    pub train_cameras: Vec<CameraInfo>,
    pub test_cameras: Vec<CameraInfo>,
    pub normalization: Normalization,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn camera_at(uid: u32, center: Vec3) -> CameraInfo {
        CameraInfo {
            uid,
            rotation: Mat3::IDENTITY,
            translation: -center,
            fov_x: 1.0,
            fov_y: 1.0,
            image_path: PathBuf::from(format!("{uid}.png")),
            image_name: uid.to_string(),
            width: 100,
            height: 50,
            background: None,
        }
    }

    #[test]
    fn test_normalization_radius() {
        let cameras = vec![
            camera_at(0, Vec3::new(1.0, 0.0, 0.0)),
            camera_at(1, Vec3::new(-1.0, 0.0, 0.0)),
        ];
        let norm = Normalization::from_cameras(&cameras);
        assert!(norm.translate.abs_diff_eq(Vec3::ZERO, 1e-6));
        assert!((norm.radius - 1.1).abs() < 1e-6);
    }

    #[test]
    fn test_record_fields() {
        let camera = camera_at(3, Vec3::new(0.0, 2.0, 0.0));
        let record = camera.to_record(7);
        assert_eq!(record.id, 7);
        assert_eq!(record.img_name, "3");
        assert_eq!((record.width, record.height), (100, 50));
        assert!((record.position[1] - 2.0).abs() < 1e-6);
        assert_eq!(record.rotation[0], [1.0, 0.0, 0.0]);
        assert!((record.fx - camera.focal_x()).abs() < 1e-6);
    }
}
