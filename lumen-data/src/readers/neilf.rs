//! NeILF scene reader (`inputs/sfm_scene.json`).

use super::colmap::LLFF_HOLD;
use super::{
    RANDOM_POINT_COUNT, image_dimensions, image_stem, load_or_create_point_cloud, random_point_cloud,
};
use crate::error::{DatasetError, Result};
use crate::graphics::focal_to_fov;
use crate::registry::{DatasetReader, ReaderFlags};
use crate::scene_info::{CameraInfo, Normalization, SceneInfo};
use glam::{Mat3, Mat4, Vec3};
use serde::Deserialize;
use std::collections::{BTreeMap, HashSet};
use std::fs::File;
use std::io::BufReader;
use std::path::Path;
use tracing::{debug, info};

#[derive(Debug, Deserialize)]
struct SfmScene {
    #[serde(default)]
    bbox: Option<BoundingBox>,
    camera_track_map: CameraTrackMap,
    /// Image ids held out for evaluation. Absent means every 8th image.
    #[serde(default)]
    test_ids: Option<Vec<u32>>,
}

#[derive(Debug, Deserialize)]
struct BoundingBox {
    lower: [f32; 3],
    upper: [f32; 3],
}

#[derive(Debug, Deserialize)]
struct CameraTrackMap {
    /// Keyed by image id as a decimal string.
    images: BTreeMap<String, ImageTrack>,
}

#[derive(Debug, Deserialize)]
struct ImageTrack {
    /// Relative to `inputs/images`.
    path: String,
    /// 3x3 pinhole intrinsics, row-major.
    intrinsic: [[f32; 3]; 3],
    /// 4x4 world-to-camera, row-major.
    extrinsic: [[f32; 4]; 4],
}

/// Reads NeILF multi-view scenes.
#[derive(Debug, Clone, Copy, Default)]
pub struct NeilfReader;

impl DatasetReader for NeilfReader {
    #[tracing::instrument(skip_all, fields(path = %source.display()))]
    fn read(&self, source: &Path, flags: &ReaderFlags) -> Result<SceneInfo> {
        let inputs = source.join("inputs");
        let scene_path = inputs.join("sfm_scene.json");
        let file = File::open(&scene_path).map_err(|e| DatasetError::io(&scene_path, e))?;
        let scene: SfmScene =
            serde_json::from_reader(BufReader::new(file)).map_err(|source| DatasetError::Json {
                path: scene_path.clone(),
                source,
            })?;

        let mut tracks = Vec::with_capacity(scene.camera_track_map.images.len());
        for (key, track) in &scene.camera_track_map.images {
            let id: u32 = key.parse().map_err(|_| DatasetError::InvalidScene {
                path: scene_path.clone(),
                message: format!("image id '{}' is not an integer", key),
            })?;
            tracks.push((id, track));
        }
        tracks.sort_by_key(|(id, _)| *id);

        let images_dir = inputs.join("images");
        let mut cameras = Vec::with_capacity(tracks.len());
        for (id, track) in &tracks {
            let image_path = images_dir.join(&track.path);
            let (width, height) = image_dimensions(&image_path)?;
            let world_to_camera = Mat4::from_cols_array_2d(&track.extrinsic).transpose();
            let fx = track.intrinsic[0][0];
            let fy = track.intrinsic[1][1];

            if flags.debug {
                info!("Reading NeILF image {}: {}", id, image_path.display());
            }
            cameras.push(CameraInfo {
                uid: *id,
                rotation: Mat3::from_mat4(world_to_camera).transpose(),
                translation: world_to_camera.w_axis.truncate(),
                fov_x: focal_to_fov(fx, width as f32),
                fov_y: focal_to_fov(fy, height as f32),
                image_name: image_stem(&image_path),
                image_path,
                width,
                height,
                background: None,
            });
        }

        let (train_cameras, test_cameras) = if flags.eval {
            let test_ids: HashSet<u32> = match &scene.test_ids {
                Some(ids) => ids.iter().copied().collect(),
                None => tracks
                    .iter()
                    .enumerate()
                    .filter(|(i, _)| i % LLFF_HOLD == 0)
                    .map(|(_, (id, _))| *id)
                    .collect(),
            };
            cameras.into_iter().partition(|c| !test_ids.contains(&c.uid))
        } else {
            (cameras, Vec::new())
        };
        debug!(
            "NeILF split: {} train / {} test",
            train_cameras.len(),
            test_cameras.len()
        );

        let normalization = Normalization::from_cameras(&train_cameras);

        let point_cloud_path = inputs.join("points3d.ply");
        let point_cloud = load_or_create_point_cloud(&point_cloud_path, || {
            let (min, max) = scene
                .bbox
                .as_ref()
                .map(|b| (Vec3::from_array(b.lower), Vec3::from_array(b.upper)))
                .unwrap_or((Vec3::splat(-1.0), Vec3::ONE));
            info!("Generating random point cloud inside {} .. {}", min, max);
            Ok(random_point_cloud(RANDOM_POINT_COUNT, min, max))
        })?;

        Ok(SceneInfo {
            point_cloud,
            point_cloud_path,
            train_cameras,
            test_cameras,
            normalization,
        })
    }
}
