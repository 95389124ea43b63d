//! Resolved training cameras and the builder that decodes their images.

use crate::config::ModelParams;
use glam::{Mat3, Mat4, Vec3};
use image::imageops::FilterType;
use image::{DynamicImage, ImageBuffer, Luma, Rgb, Rgb32FImage};
use lumen_data::graphics::{projection_matrix, world_to_view};
use lumen_data::CameraInfo;
use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use thiserror::Error;
use tracing::{debug, info, warn};

pub const ZNEAR: f32 = 0.01;
pub const ZFAR: f32 = 100.0;

/// Widest image loaded at full size when the resolution is automatic.
pub const MAX_AUTO_WIDTH: u32 = 1600;

/// Single-channel float mask in `[0, 1]`.
pub type AlphaMask = ImageBuffer<Luma<f32>, Vec<f32>>;

#[derive(Debug, Error)]
pub enum CameraError {
    #[error("Failed to load image {path}: {source}")]
    Image {
        path: PathBuf,
        #[source]
        source: image::ImageError,
    },
    #[error("Invalid resolution {0}")]
    InvalidResolution(i32),
    #[error("Invalid resolution scale {0} (must be finite and positive)")]
    InvalidResolutionScale(f32),
}

/// A camera ready for training at one resolution scale.
#[derive(Debug, Clone)]
pub struct Camera {
    /// Position in the built list.
    pub uid: usize,
    /// Identifier from the dataset descriptor.
    pub colmap_id: u32,
    pub rotation: Mat3,
    pub translation: Vec3,
    pub fov_x: f32,
    pub fov_y: f32,
    pub image_name: String,
    /// RGB in `[0, 1]`.
    pub image: Rgb32FImage,
    /// Alpha of the source image, kept when it was not composited.
    pub alpha_mask: Option<AlphaMask>,
    pub data_device: String,
    pub world_view_transform: Mat4,
    pub projection_matrix: Mat4,
    pub full_proj_transform: Mat4,
    pub camera_center: Vec3,
}

impl Camera {
    pub fn new(
        uid: usize,
        info: &CameraInfo,
        image: Rgb32FImage,
        alpha_mask: Option<AlphaMask>,
        data_device: &str,
    ) -> Self {
        let world_view_transform = world_to_view(info.rotation, info.translation, Vec3::ZERO, 1.0);
        let projection_matrix = projection_matrix(ZNEAR, ZFAR, info.fov_x, info.fov_y);
        Self {
            uid,
            colmap_id: info.uid,
            rotation: info.rotation,
            translation: info.translation,
            fov_x: info.fov_x,
            fov_y: info.fov_y,
            image_name: info.image_name.clone(),
            image,
            alpha_mask,
            data_device: data_device.to_string(),
            world_view_transform,
            projection_matrix,
            full_proj_transform: projection_matrix * world_view_transform,
            camera_center: world_view_transform.inverse().w_axis.truncate(),
        }
    }

    pub fn image_width(&self) -> u32 {
        self.image.width()
    }

    pub fn image_height(&self) -> u32 {
        self.image.height()
    }
}

/// Turns camera descriptors into [`Camera`]s at a resolution scale.
///
/// Implementations must return one camera per descriptor, in input order.
pub trait CameraLoader {
    fn load_cameras(
        &self,
        infos: &[CameraInfo],
        resolution_scale: f32,
        params: &ModelParams,
    ) -> Result<Vec<Camera>, CameraError>;
}

/// Decodes every image from disk and resizes it for the requested scale.
#[derive(Debug, Default)]
pub struct ImageCameraLoader {
    warned_large_image: AtomicBool,
}

impl ImageCameraLoader {
    pub fn new() -> Self {
        Self::default()
    }

    /// Target size of an `width`x`height` image at `resolution_scale`.
    pub fn target_size(
        &self,
        width: u32,
        height: u32,
        resolution_scale: f32,
        resolution: i32,
    ) -> Result<(u32, u32), CameraError> {
        if !(resolution_scale.is_finite() && resolution_scale > 0.0) {
            return Err(CameraError::InvalidResolutionScale(resolution_scale));
        }
        let (w, h) = (width as f32, height as f32);
        let (target_w, target_h) = match resolution {
            1 | 2 | 4 | 8 => {
                let divisor = resolution_scale * resolution as f32;
                ((w / divisor).round(), (h / divisor).round())
            }
            -1 => {
                let global_down = if width > MAX_AUTO_WIDTH {
                    if !self.warned_large_image.swap(true, Ordering::Relaxed) {
                        warn!(
                            "Encountered quite large input images (>{}px wide), rescaling to {}px. \
                             Set an explicit resolution to keep the original size.",
                            MAX_AUTO_WIDTH, MAX_AUTO_WIDTH
                        );
                    }
                    w / MAX_AUTO_WIDTH as f32
                } else {
                    1.0
                };
                let scale = global_down * resolution_scale;
                ((w / scale).trunc(), (h / scale).trunc())
            }
            target if target > 0 => {
                let scale = w / target as f32 * resolution_scale;
                ((w / scale).trunc(), (h / scale).trunc())
            }
            other => return Err(CameraError::InvalidResolution(other)),
        };
        Ok(((target_w as u32).max(1), (target_h as u32).max(1)))
    }

    fn load_camera(
        &self,
        uid: usize,
        info: &CameraInfo,
        resolution_scale: f32,
        params: &ModelParams,
    ) -> Result<Camera, CameraError> {
        let decoded = image::open(&info.image_path).map_err(|source| CameraError::Image {
            path: info.image_path.clone(),
            source,
        })?;
        let (width, height) =
            self.target_size(decoded.width(), decoded.height(), resolution_scale, params.resolution)?;
        let resized = if (width, height) == (decoded.width(), decoded.height()) {
            decoded
        } else {
            decoded.resize_exact(width, height, FilterType::Triangle)
        };

        let (image, alpha_mask) = split_alpha(&resized, info.background);
        if params.debug_cuda {
            info!("Loaded {} at {}x{}", info.image_name, width, height);
        }
        Ok(Camera::new(uid, info, image, alpha_mask, &params.data_device))
    }
}

/// RGB plus the alpha channel, or RGB composited onto `background`.
fn split_alpha(image: &DynamicImage, background: Option<Vec3>) -> (Rgb32FImage, Option<AlphaMask>) {
    if !image.color().has_alpha() {
        return (image.to_rgb32f(), None);
    }

    let rgba = image.to_rgba32f();
    let rgb = Rgb32FImage::from_fn(rgba.width(), rgba.height(), |x, y| {
        let [r, g, b, a] = rgba.get_pixel(x, y).0;
        let color = Vec3::new(r, g, b);
        match background {
            Some(bg) => Rgb((color * a + bg * (1.0 - a)).to_array()),
            None => Rgb(color.to_array()),
        }
    });
    match background {
        Some(_) => (rgb, None),
        None => {
            let alpha = AlphaMask::from_fn(rgba.width(), rgba.height(), |x, y| {
                Luma([rgba.get_pixel(x, y)[3]])
            });
            (rgb, Some(alpha))
        }
    }
}

impl CameraLoader for ImageCameraLoader {
    #[tracing::instrument(skip_all, fields(count = infos.len(), scale = resolution_scale))]
    fn load_cameras(
        &self,
        infos: &[CameraInfo],
        resolution_scale: f32,
        params: &ModelParams,
    ) -> Result<Vec<Camera>, CameraError> {
        let cameras = infos
            .iter()
            .enumerate()
            .map(|(uid, info)| self.load_camera(uid, info, resolution_scale, params))
            .collect::<Result<Vec<_>, _>>()?;
        debug!("Built {} cameras at scale {}", cameras.len(), resolution_scale);
        Ok(cameras)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::{RgbImage, Rgba, RgbaImage};
    use std::path::Path;

    fn info(path: &Path, background: Option<Vec3>) -> CameraInfo {
        CameraInfo {
            uid: 9,
            rotation: Mat3::IDENTITY,
            translation: Vec3::new(0.0, 0.0, 2.0),
            fov_x: 1.0,
            fov_y: 0.8,
            image_path: path.to_path_buf(),
            image_name: "frame".into(),
            width: 8,
            height: 4,
            background,
        }
    }

    #[test]
    fn test_fixed_divisor() {
        let loader = ImageCameraLoader::new();
        assert_eq!(loader.target_size(800, 600, 1.0, 2).unwrap(), (400, 300));
        assert_eq!(loader.target_size(800, 600, 2.0, 4).unwrap(), (100, 75));
    }

    #[test]
    fn test_auto_resolution_caps_width() {
        let loader = ImageCameraLoader::new();
        assert_eq!(loader.target_size(3200, 1800, 1.0, -1).unwrap(), (1600, 900));
        assert_eq!(loader.target_size(800, 600, 2.0, -1).unwrap(), (400, 300));
        assert!(loader.warned_large_image.load(Ordering::Relaxed));
    }

    #[test]
    fn test_target_width() {
        let loader = ImageCameraLoader::new();
        assert_eq!(loader.target_size(1000, 500, 1.0, 200).unwrap(), (200, 100));
        assert!(matches!(
            loader.target_size(10, 10, 1.0, -3),
            Err(CameraError::InvalidResolution(-3))
        ));
    }

    #[test]
    fn test_rejects_degenerate_scale() {
        let loader = ImageCameraLoader::new();
        for scale in [0.0, -2.0, f32::INFINITY] {
            assert!(matches!(
                loader.target_size(800, 600, scale, 1),
                Err(CameraError::InvalidResolutionScale(s)) if s == scale
            ));
        }
        assert!(matches!(
            loader.target_size(800, 600, f32::NAN, -1),
            Err(CameraError::InvalidResolutionScale(s)) if s.is_nan()
        ));
    }

    #[test]
    fn test_composites_onto_background() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("frame.png");
        RgbaImage::from_pixel(8, 4, Rgba([255, 0, 0, 0])).save(&path).unwrap();

        let loader = ImageCameraLoader::new();
        let params = ModelParams::default();
        let cameras = loader
            .load_cameras(&[info(&path, Some(Vec3::ONE))], 1.0, &params)
            .unwrap();
        let camera = &cameras[0];
        assert_eq!(camera.colmap_id, 9);
        assert_eq!(camera.uid, 0);
        assert!(camera.alpha_mask.is_none());
        assert_eq!(camera.image.get_pixel(0, 0).0, [1.0, 1.0, 1.0]);
    }

    #[test]
    fn test_keeps_alpha_mask_and_scales() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("frame.png");
        RgbaImage::from_pixel(8, 4, Rgba([0, 255, 0, 255])).save(&path).unwrap();

        let params = ModelParams::default();
        let cameras = ImageCameraLoader::new()
            .load_cameras(&[info(&path, None)], 2.0, &params)
            .unwrap();
        let camera = &cameras[0];
        assert_eq!((camera.image_width(), camera.image_height()), (4, 2));
        let mask = camera.alpha_mask.as_ref().unwrap();
        assert!(mask.pixels().all(|p| (p[0] - 1.0).abs() < 1e-4));
        assert_eq!(camera.data_device, "cuda");
    }

    #[test]
    fn test_camera_matrices() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("frame.png");
        RgbImage::new(8, 4).save(&path).unwrap();

        let cameras = ImageCameraLoader::new()
            .load_cameras(&[info(&path, None)], 1.0, &ModelParams::default())
            .unwrap();
        let camera = &cameras[0];
        assert!(camera.alpha_mask.is_none());
        assert!(camera.camera_center.abs_diff_eq(Vec3::new(0.0, 0.0, -2.0), 1e-5));
        assert!(camera
            .full_proj_transform
            .abs_diff_eq(camera.projection_matrix * camera.world_view_transform, 1e-6));
    }

    #[test]
    fn test_missing_image() {
        let err = ImageCameraLoader::new()
            .load_cameras(&[info(Path::new("/nonexistent/frame.png"), None)], 1.0, &ModelParams::default())
            .unwrap_err();
        assert!(matches!(err, CameraError::Image { .. }));
    }
}
