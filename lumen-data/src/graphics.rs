//! Camera math shared by the readers and the camera builder.
//!
//! Conventions follow COLMAP: a camera is described by the world-to-camera
//! translation `t` and the camera-to-world rotation `R` (the transpose of the
//! world-to-camera rotation). Matrices act on column vectors.

use glam::{DMat3, DQuat, Mat3, Mat4, Vec3, Vec4};

pub fn fov_to_focal(fov: f32, pixels: f32) -> f32 {
    pixels / (2.0 * (fov / 2.0).tan())
}

pub fn focal_to_fov(focal: f32, pixels: f32) -> f32 {
    2.0 * (pixels / (2.0 * focal)).atan()
}

/// Rotation matrix of a COLMAP quaternion given as `(w, x, y, z)`.
pub fn qvec_to_rotation(qvec: [f64; 4]) -> Mat3 {
    let [w, x, y, z] = qvec;
    let rotation = DMat3::from_quat(DQuat::from_xyzw(x, y, z, w).normalize());
    rotation.as_mat3()
}

/// World-to-view transform for a camera, optionally re-centred and scaled.
pub fn world_to_view(rotation: Mat3, translation: Vec3, translate: Vec3, scale: f32) -> Mat4 {
    let world_to_camera = Mat4::from_cols(
        rotation.transpose().x_axis.extend(0.0),
        rotation.transpose().y_axis.extend(0.0),
        rotation.transpose().z_axis.extend(0.0),
        translation.extend(1.0),
    );
    if translate == Vec3::ZERO && scale == 1.0 {
        return world_to_camera;
    }

    let mut camera_to_world = world_to_camera.inverse();
    let center = (camera_to_world.w_axis.truncate() + translate) * scale;
    camera_to_world.w_axis = center.extend(1.0);
    camera_to_world.inverse()
}

/// Camera centre in world space.
pub fn camera_center(rotation: Mat3, translation: Vec3) -> Vec3 {
    world_to_view(rotation, translation, Vec3::ZERO, 1.0)
        .inverse()
        .w_axis
        .truncate()
}

/// Perspective projection mapping view depth `[znear, zfar]` to `[0, 1]`.
pub fn projection_matrix(znear: f32, zfar: f32, fov_x: f32, fov_y: f32) -> Mat4 {
    let tan_half_fov_y = (fov_y / 2.0).tan();
    let tan_half_fov_x = (fov_x / 2.0).tan();

    let top = tan_half_fov_y * znear;
    let bottom = -top;
    let right = tan_half_fov_x * znear;
    let left = -right;

    Mat4::from_cols(
        Vec4::new(2.0 * znear / (right - left), 0.0, 0.0, 0.0),
        Vec4::new(0.0, 2.0 * znear / (top - bottom), 0.0, 0.0),
        Vec4::new(
            (right + left) / (right - left),
            (top + bottom) / (top - bottom),
            zfar / (zfar - znear),
            1.0,
        ),
        Vec4::new(0.0, 0.0, -(zfar * znear) / (zfar - znear), 0.0),
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fov_focal_inverse() {
        let fov = 0.8;
        let focal = fov_to_focal(fov, 800.0);
        assert!((focal_to_fov(focal, 800.0) - fov).abs() < 1e-6);
    }

    #[test]
    fn test_identity_quaternion() {
        let r = qvec_to_rotation([1.0, 0.0, 0.0, 0.0]);
        assert!(r.abs_diff_eq(Mat3::IDENTITY, 1e-6));
    }

    #[test]
    fn test_camera_center_of_translated_camera() {
        // World-to-camera translation t with identity rotation puts the centre at -t.
        let center = camera_center(Mat3::IDENTITY, Vec3::new(1.0, 2.0, 3.0));
        assert!(center.abs_diff_eq(Vec3::new(-1.0, -2.0, -3.0), 1e-6));
    }

    #[test]
    fn test_projection_depth_range() {
        let proj = projection_matrix(0.01, 100.0, 1.0, 1.0);
        let near = proj * Vec4::new(0.0, 0.0, 0.01, 1.0);
        let far = proj * Vec4::new(0.0, 0.0, 100.0, 1.0);
        assert!((near.z / near.w).abs() < 1e-5);
        assert!((far.z / far.w - 1.0).abs() < 1e-5);
    }
}
