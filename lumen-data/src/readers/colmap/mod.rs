//! COLMAP sparse reconstruction reader.

mod binary;
mod model;
mod text;

use model::{CameraModel, ColmapCamera, ColmapImage};

use super::{image_stem, load_or_create_point_cloud};
use crate::error::{DatasetError, Result};
use crate::graphics::{focal_to_fov, qvec_to_rotation};
use crate::ply::BasicPointCloud;
use crate::registry::{DatasetReader, ReaderFlags};
use crate::scene_info::{CameraInfo, Normalization, SceneInfo};
use glam::{DVec3, Vec3};
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use tracing::{debug, info};

/// Every n-th image (by name) goes to the test split when `eval` is set.
pub const LLFF_HOLD: usize = 8;

/// Reads `sparse/0/{cameras,images,points3D}` in binary or text form.
#[derive(Debug, Clone, Copy, Default)]
pub struct ColmapReader;

impl ColmapReader {
    fn read_model(sparse: &Path) -> Result<(Vec<ColmapImage>, Vec<ColmapCamera>)> {
        let images_bin = sparse.join("images.bin");
        let cameras_bin = sparse.join("cameras.bin");
        if images_bin.is_file() && cameras_bin.is_file() {
            debug!("Reading binary COLMAP model from {}", sparse.display());
            return Ok((binary::read_images(&images_bin)?, binary::read_cameras(&cameras_bin)?));
        }

        let images_txt = sparse.join("images.txt");
        let cameras_txt = sparse.join("cameras.txt");
        if !images_txt.is_file() {
            return Err(DatasetError::MissingFile(images_bin));
        }
        if !cameras_txt.is_file() {
            return Err(DatasetError::MissingFile(cameras_bin));
        }
        debug!("Reading text COLMAP model from {}", sparse.display());
        Ok((text::read_images(&images_txt)?, text::read_cameras(&cameras_txt)?))
    }

    fn read_points(sparse: &Path) -> Result<BasicPointCloud> {
        let bin = sparse.join("points3D.bin");
        let points = if bin.is_file() {
            binary::read_points(&bin)?
        } else {
            let txt = sparse.join("points3D.txt");
            if !txt.is_file() {
                return Err(DatasetError::MissingFile(bin));
            }
            text::read_points(&txt)?
        };
        info!("Converting {} COLMAP points to PLY", points.len());

        Ok(BasicPointCloud::new(
            points.iter().map(|p| p.xyz).collect(),
            points
                .iter()
                .map(|p| Vec3::new(p.rgb[0] as f32, p.rgb[1] as f32, p.rgb[2] as f32) / 255.0)
                .collect(),
        ))
    }
}

/// Convert COLMAP extrinsics/intrinsics into a camera descriptor.
pub(crate) fn camera_info(
    image: &ColmapImage,
    camera: &ColmapCamera,
    images_folder: &Path,
) -> Result<CameraInfo> {
    let (width, height) = (camera.width as f32, camera.height as f32);
    let (fov_x, fov_y) = match camera.model {
        CameraModel::SimplePinhole => {
            let focal = camera.params[0] as f32;
            (focal_to_fov(focal, width), focal_to_fov(focal, height))
        }
        CameraModel::Pinhole => (
            focal_to_fov(camera.params[0] as f32, width),
            focal_to_fov(camera.params[1] as f32, height),
        ),
        other => return Err(DatasetError::UnsupportedCameraModel(other.name().to_string())),
    };

    let image_path: PathBuf = images_folder.join(&image.name);
    Ok(CameraInfo {
        uid: image.id,
        rotation: qvec_to_rotation(image.qvec).transpose(),
        translation: DVec3::from_array(image.tvec).as_vec3(),
        fov_x,
        fov_y,
        image_name: image_stem(&image_path),
        image_path,
        width: camera.width as u32,
        height: camera.height as u32,
        background: None,
    })
}

impl DatasetReader for ColmapReader {
    #[tracing::instrument(skip_all, fields(path = %source.display()))]
    fn read(&self, source: &Path, flags: &ReaderFlags) -> Result<SceneInfo> {
        let sparse = source.join("sparse").join("0");
        let (mut images, cameras) = Self::read_model(&sparse)?;
        let cameras: HashMap<u32, ColmapCamera> =
            cameras.into_iter().map(|c| (c.id, c)).collect();
        images.sort_by(|a, b| a.name.cmp(&b.name));

        let images_folder = source.join(&flags.images);
        let mut camera_infos = Vec::with_capacity(images.len());
        for (i, image) in images.iter().enumerate() {
            let camera = cameras
                .get(&image.camera_id)
                .ok_or(DatasetError::UnknownCamera(image.camera_id))?;
            let info = camera_info(image, camera, &images_folder)?;
            if flags.debug {
                info!(
                    "Reading camera {}/{}: {} ({}x{})",
                    i + 1,
                    images.len(),
                    info.image_name,
                    info.width,
                    info.height
                );
            }
            camera_infos.push(info);
        }

        let (train_cameras, test_cameras): (Vec<_>, Vec<_>) = if flags.eval {
            let (test, train): (Vec<_>, Vec<_>) = camera_infos
                .into_iter()
                .enumerate()
                .partition(|(i, _)| i % LLFF_HOLD == 0);
            (
                train.into_iter().map(|(_, c)| c).collect(),
                test.into_iter().map(|(_, c)| c).collect(),
            )
        } else {
            (camera_infos, Vec::new())
        };

        let normalization = Normalization::from_cameras(&train_cameras);

        let point_cloud_path = sparse.join("points3D.ply");
        let point_cloud = load_or_create_point_cloud(&point_cloud_path, || Self::read_points(&sparse))?;

        info!(
            "COLMAP scene: {} train / {} test cameras, {} points",
            train_cameras.len(),
            test_cameras.len(),
            point_cloud.len()
        );

        Ok(SceneInfo {
            point_cloud,
            point_cloud_path,
            train_cameras,
            test_cameras,
            normalization,
        })
    }
}
