//! PLY file loading functions

use crate::error::{DatasetError, Result};
use crate::ply::BasicPointCloud;
use glam::Vec3;
use serde::Deserialize;
use serde_json::Value as JsonValue;
use std::collections::HashMap;
use std::fs::File;
use std::io::BufReader;
use std::path::Path;
use tracing::{debug, info, warn};

// Rows are decoded as maps so that any property layout can be read.
#[derive(Deserialize, Debug)]
struct PlyFile {
    #[serde(rename = "vertex")]
    vertex: Vec<HashMap<String, JsonValue>>,
}

/// One decoded `vertex` element, keyed by property name.
#[derive(Debug, Clone, Default)]
pub struct VertexRow(HashMap<String, JsonValue>);

impl VertexRow {
    pub fn get_f32(&self, name: &str) -> Option<f32> {
        match self.0.get(name)? {
            JsonValue::Number(n) => n.as_f64().map(|f| f as f32),
            _ => None,
        }
    }

    pub fn get_u8(&self, name: &str) -> Option<u8> {
        match self.0.get(name)? {
            JsonValue::Number(n) => n
                .as_u64()
                .map(|u| u as u8)
                .or_else(|| n.as_i64().map(|i| i as u8))
                .or_else(|| n.as_f64().map(|f| f as u8)),
            _ => None,
        }
    }

    pub fn contains(&self, name: &str) -> bool {
        self.0.contains_key(name)
    }

    /// Read a required float property, reporting the row index when absent.
    pub fn require_f32(&self, name: &str, index: usize, path: &Path) -> Result<f32> {
        self.get_f32(name).ok_or_else(|| DatasetError::Ply {
            path: path.to_path_buf(),
            message: format!("Missing '{}' at vertex {}", name, index),
        })
    }
}

/// Decode every `vertex` row of a PLY file (ASCII or binary).
#[tracing::instrument(skip_all, fields(path = %path.display()))]
pub fn read_vertex_rows(path: &Path) -> Result<Vec<VertexRow>> {
    debug!("Loading PLY vertices from: {}", path.display());
    if !path.is_file() {
        return Err(DatasetError::MissingFile(path.to_path_buf()));
    }
    let file = File::open(path).map_err(|e| DatasetError::io(path, e))?;
    let reader = BufReader::new(file);

    let ply_data: PlyFile = serde_ply::from_reader(reader).map_err(|e| {
        warn!("Failed to parse PLY file: {}", e);
        DatasetError::Ply {
            path: path.to_path_buf(),
            message: e.to_string(),
        }
    })?;

    info!("PLY file parsed: {} vertices", ply_data.vertex.len());
    Ok(ply_data.vertex.into_iter().map(VertexRow).collect())
}

/// Load a colored point cloud (`x y z [nx ny nz] [red green blue]`).
pub fn read_point_cloud(path: &Path) -> Result<BasicPointCloud> {
    let rows = read_vertex_rows(path)?;

    let mut cloud = BasicPointCloud {
        points: Vec::with_capacity(rows.len()),
        colors: Vec::with_capacity(rows.len()),
        normals: Vec::with_capacity(rows.len()),
    };

    for (i, row) in rows.iter().enumerate() {
        let x = row.require_f32("x", i, path)?;
        let y = row.require_f32("y", i, path)?;
        let z = row.require_f32("z", i, path)?;

        let color = match (row.get_u8("red"), row.get_u8("green"), row.get_u8("blue")) {
            (Some(r), Some(g), Some(b)) => {
                Vec3::new(r as f32 / 255.0, g as f32 / 255.0, b as f32 / 255.0)
            }
            _ => Vec3::splat(0.5),
        };
        let normal = match (row.get_f32("nx"), row.get_f32("ny"), row.get_f32("nz")) {
            (Some(nx), Some(ny), Some(nz)) => Vec3::new(nx, ny, nz),
            _ => Vec3::ZERO,
        };

        cloud.points.push(Vec3::new(x, y, z));
        cloud.colors.push(color);
        cloud.normals.push(normal);
    }

    debug!("Loaded {} points from PLY file", cloud.len());
    Ok(cloud)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_read_ascii_point_cloud() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("points.ply");
        let mut file = File::create(&path).unwrap();
        write!(
            file,
            "ply\nformat ascii 1.0\nelement vertex 2\n\
             property float x\nproperty float y\nproperty float z\n\
             property uchar red\nproperty uchar green\nproperty uchar blue\n\
             end_header\n0 1 2 255 0 0\n-1 -2 -3 0 255 0\n"
        )
        .unwrap();
        drop(file);

        let cloud = read_point_cloud(&path).unwrap();
        assert_eq!(cloud.len(), 2);
        assert_eq!(cloud.points[1], Vec3::new(-1.0, -2.0, -3.0));
        assert_eq!(cloud.colors[0], Vec3::new(1.0, 0.0, 0.0));
        assert_eq!(cloud.normals[0], Vec3::ZERO);
    }

    #[test]
    fn test_read_missing_file() {
        let dir = tempfile::tempdir().unwrap();
        let err = read_point_cloud(&dir.path().join("nope.ply")).unwrap_err();
        assert!(matches!(err, DatasetError::MissingFile(_)));
    }
}
