//! PLY file writing

use crate::error::{DatasetError, Result};
use crate::ply::BasicPointCloud;
use serde::Serialize;
use serde_ply::SerializeOptions;
use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::Path;
use tracing::debug;

#[derive(Serialize)]
struct PlyFile<'a, R> {
    vertex: &'a [R],
}

#[derive(Serialize, Debug, Clone, Copy)]
struct PointRow {
    x: f32,
    y: f32,
    z: f32,
    nx: f32,
    ny: f32,
    nz: f32,
    red: u8,
    green: u8,
    blue: u8,
}

/// Write `rows` as the `vertex` element of a binary little-endian PLY file.
///
/// Property names and types come from the row's `Serialize` impl; struct rows
/// keep field order and map rows keep entry order.
#[tracing::instrument(skip_all, fields(path = %path.display(), rows = rows.len()))]
pub fn write_vertex_rows<R: Serialize>(path: &Path, rows: &[R]) -> Result<()> {
    let file = File::create(path).map_err(|e| DatasetError::io(path, e))?;
    let mut writer = BufWriter::new(file);
    serde_ply::to_writer(
        &PlyFile { vertex: rows },
        SerializeOptions::binary_le(),
        &mut writer,
    )
    .map_err(|source| DatasetError::PlyWrite {
        path: path.to_path_buf(),
        source,
    })?;
    writer.flush().map_err(|e| DatasetError::io(path, e))
}

/// Write a point cloud as binary PLY with `x y z nx ny nz red green blue`.
pub fn write_point_cloud(path: &Path, cloud: &BasicPointCloud) -> Result<()> {
    let rows: Vec<PointRow> = cloud
        .points
        .iter()
        .zip(&cloud.colors)
        .zip(&cloud.normals)
        .map(|((p, c), n)| {
            let [red, green, blue] = (c.clamp(glam::Vec3::ZERO, glam::Vec3::ONE) * 255.0)
                .round()
                .to_array()
                .map(|v| v as u8);
            PointRow {
                x: p.x,
                y: p.y,
                z: p.z,
                nx: n.x,
                ny: n.y,
                nz: n.z,
                red,
                green,
                blue,
            }
        })
        .collect();

    write_vertex_rows(path, &rows)?;
    debug!("Wrote {} points", rows.len());
    Ok(())
}
