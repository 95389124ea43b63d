//! CPU-side point cloud used to seed Gaussian training.

use glam::Vec3;

/// A colored point cloud with optional per-point normals.
///
/// All three vectors have the same length. Colors are linear RGB in `[0, 1]`.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct BasicPointCloud {
    pub points: Vec<Vec3>,
    pub colors: Vec<Vec3>,
    pub normals: Vec<Vec3>,
}

impl BasicPointCloud {
    /// Create a point cloud with zero normals.
    pub fn new(points: Vec<Vec3>, colors: Vec<Vec3>) -> Self {
        let normals = vec![Vec3::ZERO; points.len()];
        Self {
            points,
            colors,
            normals,
        }
    }

    pub fn len(&self) -> usize {
        self.points.len()
    }

    pub fn is_empty(&self) -> bool {
        self.points.is_empty()
    }

    /// Axis-aligned bounds as `(min, max)`, or `None` for an empty cloud.
    pub fn bounds(&self) -> Option<(Vec3, Vec3)> {
        if self.points.is_empty() {
            return None;
        }
        Some(self.points.iter().fold(
            (Vec3::splat(f32::INFINITY), Vec3::splat(f32::NEG_INFINITY)),
            |(min, max), p| (min.min(*p), max.max(*p)),
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_new_fills_zero_normals() {
        let cloud = BasicPointCloud::new(vec![Vec3::ONE, Vec3::X], vec![Vec3::ZERO, Vec3::ONE]);
        assert_eq!(cloud.len(), 2);
        assert_eq!(cloud.normals, vec![Vec3::ZERO, Vec3::ZERO]);
    }

    #[test]
    fn test_bounds() {
        let cloud = BasicPointCloud::new(
            vec![Vec3::new(-1.0, 2.0, 0.5), Vec3::new(3.0, -4.0, 0.0)],
            vec![Vec3::ONE; 2],
        );
        let (min, max) = cloud.bounds().unwrap();
        assert_eq!(min, Vec3::new(-1.0, -4.0, 0.0));
        assert_eq!(max, Vec3::new(3.0, 2.0, 0.5));
        assert!(BasicPointCloud::default().bounds().is_none());
    }
}
