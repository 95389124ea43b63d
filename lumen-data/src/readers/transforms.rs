//! NeRF-style `transforms_{train,test}.json` datasets.

use super::{
    RANDOM_POINT_COUNT, image_dimensions, image_stem, load_or_create_point_cloud, random_point_cloud,
};
use crate::error::{DatasetError, Result};
use crate::graphics::{focal_to_fov, fov_to_focal};
use crate::registry::{DatasetReader, ReaderFlags};
use crate::scene_info::{CameraInfo, Normalization, SceneInfo};
use glam::{Mat3, Mat4, Vec3};
use serde::Deserialize;
use std::fs::File;
use std::io::BufReader;
use std::path::{Path, PathBuf};
use tracing::{debug, info};

/// Half extent of the cube random initial points are drawn from.
const RANDOM_EXTENT: f32 = 1.3;

/// Variants of the transforms layout.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransformsFlavor {
    /// NeRF synthetic: `file_path` never carries an extension.
    Blender,
    /// Stanford-ORB: `file_path` may already name the image file.
    StanfordOrb,
    /// Synthetic4Relight: `file_path` may already name the image file.
    Synthetic4Relight,
}

impl TransformsFlavor {
    fn image_path(&self, source: &Path, file_path: &str) -> PathBuf {
        let relative = Path::new(file_path);
        match self {
            TransformsFlavor::StanfordOrb | TransformsFlavor::Synthetic4Relight
                if relative.extension().is_some() =>
            {
                source.join(relative)
            }
            _ => source.join(format!("{}.png", file_path)),
        }
    }
}

#[derive(Debug, Deserialize)]
struct TransformsFile {
    camera_angle_x: f32,
    frames: Vec<Frame>,
}

#[derive(Debug, Deserialize)]
struct Frame {
    file_path: String,
    /// Camera-to-world, row-major, OpenGL axes.
    transform_matrix: [[f32; 4]; 4],
}

/// Reads Blender-style synthetic scenes.
#[derive(Debug, Clone, Copy)]
pub struct TransformsReader {
    flavor: TransformsFlavor,
}

impl TransformsReader {
    pub fn new(flavor: TransformsFlavor) -> Self {
        Self { flavor }
    }

    fn read_cameras(
        &self,
        source: &Path,
        transforms_name: &str,
        background: Vec3,
        debug_log: bool,
    ) -> Result<Vec<CameraInfo>> {
        let path = source.join(transforms_name);
        let file = File::open(&path).map_err(|e| DatasetError::io(&path, e))?;
        let transforms: TransformsFile = serde_json::from_reader(BufReader::new(file))
            .map_err(|source| DatasetError::Json {
                path: path.clone(),
                source,
            })?;

        let fov_x = transforms.camera_angle_x;
        transforms
            .frames
            .iter()
            .enumerate()
            .map(|(idx, frame)| {
                let image_path = self.flavor.image_path(source, &frame.file_path);
                let (width, height) = image_dimensions(&image_path)?;
                let (rotation, translation) = colmap_pose(&frame.transform_matrix);
                let fov_y = focal_to_fov(fov_to_focal(fov_x, width as f32), height as f32);

                if debug_log {
                    info!("Reading {} frame {}: {}", transforms_name, idx, image_path.display());
                }
                Ok(CameraInfo {
                    uid: idx as u32,
                    rotation,
                    translation,
                    fov_x,
                    fov_y,
                    image_name: image_stem(&image_path),
                    image_path,
                    width,
                    height,
                    background: Some(background),
                })
            })
            .collect()
    }
}

/// Convert an OpenGL camera-to-world matrix into the COLMAP `(R, t)` pair.
fn colmap_pose(rows: &[[f32; 4]; 4]) -> (Mat3, Vec3) {
    let mut camera_to_world = Mat4::from_cols_array_2d(rows).transpose();
    // OpenGL/Blender (Y up, Z back) to COLMAP (Y down, Z forward).
    camera_to_world.y_axis = -camera_to_world.y_axis;
    camera_to_world.z_axis = -camera_to_world.z_axis;

    let world_to_camera = camera_to_world.inverse();
    let rotation = Mat3::from_mat4(world_to_camera).transpose();
    (rotation, world_to_camera.w_axis.truncate())
}

impl DatasetReader for TransformsReader {
    #[tracing::instrument(skip_all, fields(path = %source.display()))]
    fn read(&self, source: &Path, flags: &ReaderFlags) -> Result<SceneInfo> {
        let background = if flags.white_background {
            Vec3::ONE
        } else {
            Vec3::ZERO
        };

        debug!("Reading training transforms ({:?})", self.flavor);
        let mut train_cameras =
            self.read_cameras(source, "transforms_train.json", background, flags.debug)?;
        let mut test_cameras = if source.join("transforms_test.json").is_file() {
            debug!("Reading test transforms");
            self.read_cameras(source, "transforms_test.json", background, flags.debug)?
        } else {
            Vec::new()
        };

        if !flags.eval {
            train_cameras.append(&mut test_cameras);
        }

        let normalization = Normalization::from_cameras(&train_cameras);

        let point_cloud_path = source.join("points3d.ply");
        let point_cloud = load_or_create_point_cloud(&point_cloud_path, || {
            info!("Generating random point cloud ({} points)", RANDOM_POINT_COUNT);
            Ok(random_point_cloud(
                RANDOM_POINT_COUNT,
                Vec3::splat(-RANDOM_EXTENT),
                Vec3::splat(RANDOM_EXTENT),
            ))
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

#[cfg(test)]
mod tests {
    use super::*;
    use crate::readers::test_util::{write_rgb, write_rgba};
    use crate::write_point_cloud;
    use crate::BasicPointCloud;
    use std::fs;

    fn frame_json(file_path: &str, x: f32) -> String {
        format!(
            r#"{{"file_path": "{file_path}", "transform_matrix": [[1,0,0,{x}],[0,1,0,0],[0,0,1,4],[0,0,0,1]]}}"#
        )
    }

    fn write_transforms(source: &Path, name: &str, frames: &[String]) {
        fs::write(
            source.join(name),
            format!(r#"{{"camera_angle_x": 0.69, "frames": [{}]}}"#, frames.join(",")),
        )
        .unwrap();
    }

    fn seed_points(source: &Path) {
        let cloud = BasicPointCloud::new(vec![Vec3::ZERO], vec![Vec3::ONE]);
        write_point_cloud(&source.join("points3d.ply"), &cloud).unwrap();
    }

    #[test]
    fn test_blender_split_and_pose() {
        let dir = tempfile::tempdir().unwrap();
        let source = dir.path();
        write_rgba(&source.join("train/r_0.png"), 8, 4);
        write_rgba(&source.join("train/r_1.png"), 8, 4);
        write_rgba(&source.join("test/r_0.png"), 8, 4);
        write_transforms(
            source,
            "transforms_train.json",
            &[frame_json("./train/r_0", 1.0), frame_json("./train/r_1", -1.0)],
        );
        write_transforms(source, "transforms_test.json", &[frame_json("./test/r_0", 0.0)]);
        seed_points(source);

        let flags = ReaderFlags {
            eval: true,
            white_background: true,
            ..Default::default()
        };
        let info = TransformsReader::new(TransformsFlavor::Blender)
            .read(source, &flags)
            .unwrap();
        assert_eq!(info.train_cameras.len(), 2);
        assert_eq!(info.test_cameras.len(), 1);

        let camera = &info.train_cameras[0];
        assert_eq!((camera.width, camera.height), (8, 4));
        assert_eq!(camera.image_name, "r_0");
        assert_eq!(camera.background, Some(Vec3::ONE));
        assert!(camera.center().abs_diff_eq(Vec3::new(1.0, 0.0, 4.0), 1e-5));
        assert!(camera.fov_y < camera.fov_x);
        assert!((info.normalization.radius - 1.1).abs() < 1e-5);
    }

    #[test]
    fn test_without_eval_merges_test_frames() {
        let dir = tempfile::tempdir().unwrap();
        let source = dir.path();
        write_rgba(&source.join("train/r_0.png"), 4, 4);
        write_rgba(&source.join("test/r_0.png"), 4, 4);
        write_transforms(source, "transforms_train.json", &[frame_json("./train/r_0", 0.0)]);
        write_transforms(source, "transforms_test.json", &[frame_json("./test/r_0", 1.0)]);
        seed_points(source);

        let info = TransformsReader::new(TransformsFlavor::Blender)
            .read(source, &ReaderFlags::default())
            .unwrap();
        assert_eq!(info.train_cameras.len(), 2);
        assert!(info.test_cameras.is_empty());
        assert_eq!(info.train_cameras[0].background, Some(Vec3::ZERO));
    }

    #[test]
    fn test_orb_accepts_explicit_extension() {
        let dir = tempfile::tempdir().unwrap();
        let source = dir.path();
        write_rgb(&source.join("train/0000.jpg"), 4, 4);
        write_transforms(source, "transforms_train.json", &[frame_json("train/0000.jpg", 0.0)]);
        seed_points(source);

        let info = TransformsReader::new(TransformsFlavor::StanfordOrb)
            .read(source, &ReaderFlags::default())
            .unwrap();
        assert_eq!(info.train_cameras[0].image_path, source.join("train/0000.jpg"));
        assert!(info.test_cameras.is_empty());
    }

    #[test]
    fn test_missing_image_is_reported() {
        let dir = tempfile::tempdir().unwrap();
        let source = dir.path();
        write_transforms(source, "transforms_train.json", &[frame_json("./train/r_0", 0.0)]);
        let err = TransformsReader::new(TransformsFlavor::Blender)
            .read(source, &ReaderFlags::default())
            .unwrap_err();
        assert!(matches!(err, DatasetError::MissingFile(path) if path.ends_with("train/r_0.png")));
    }
}
