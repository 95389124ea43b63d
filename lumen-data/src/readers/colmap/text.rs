//! COLMAP text model parsing (`*.txt`).

use super::model::{CameraModel, ColmapCamera, ColmapImage, ColmapPoint};
use crate::error::{DatasetError, Result};
use glam::Vec3;
use std::path::Path;
use std::str::FromStr;

fn read_to_string(path: &Path) -> Result<String> {
    std::fs::read_to_string(path).map_err(|e| DatasetError::io(path, e))
}

fn is_record(line: &str) -> bool {
    let line = line.trim();
    !line.is_empty() && !line.starts_with('#')
}

fn field<T: FromStr>(fields: &[&str], index: usize, path: &Path, line: usize) -> Result<T> {
    fields
        .get(index)
        .and_then(|s| s.parse().ok())
        .ok_or_else(|| DatasetError::colmap(path, format!("bad field {} on line {}", index, line + 1)))
}

pub fn parse_cameras(text: &str, path: &Path) -> Result<Vec<ColmapCamera>> {
    let mut cameras = Vec::new();
    for (line_no, line) in text.lines().enumerate().filter(|(_, l)| is_record(l)) {
        let fields: Vec<&str> = line.split_whitespace().collect();
        let model = CameraModel::from_name(fields.get(1).copied().unwrap_or_default())
            .ok_or_else(|| DatasetError::colmap(path, format!("unknown camera model on line {}", line_no + 1)))?;
        let params = (4..4 + model.num_params())
            .map(|i| field(&fields, i, path, line_no))
            .collect::<Result<Vec<f64>>>()?;
        cameras.push(ColmapCamera {
            id: field(&fields, 0, path, line_no)?,
            model,
            width: field(&fields, 2, path, line_no)?,
            height: field(&fields, 3, path, line_no)?,
            params,
        });
    }
    Ok(cameras)
}

pub fn parse_images(text: &str, path: &Path) -> Result<Vec<ColmapImage>> {
    let mut images = Vec::new();
    let mut lines = text.lines().enumerate();
    while let Some((line_no, line)) = lines.next() {
        if !is_record(line) {
            continue;
        }
        let fields: Vec<&str> = line.split_whitespace().collect();
        let f = |i| field::<f64>(&fields, i, path, line_no);
        images.push(ColmapImage {
            id: field(&fields, 0, path, line_no)?,
            qvec: [f(1)?, f(2)?, f(3)?, f(4)?],
            tvec: [f(5)?, f(6)?, f(7)?],
            camera_id: field(&fields, 8, path, line_no)?,
            // Names may contain spaces.
            name: fields.get(9..).map(|rest| rest.join(" ")).unwrap_or_default(),
        });
        // The following line lists 2D observations and may be empty.
        lines.next();
    }
    Ok(images)
}

pub fn parse_points(text: &str, path: &Path) -> Result<Vec<ColmapPoint>> {
    text.lines()
        .enumerate()
        .filter(|(_, l)| is_record(l))
        .map(|(line_no, line)| {
            let fields: Vec<&str> = line.split_whitespace().collect();
            let f = |i| field::<f32>(&fields, i, path, line_no);
            let c = |i| field::<u8>(&fields, i, path, line_no);
            Ok(ColmapPoint {
                xyz: Vec3::new(f(1)?, f(2)?, f(3)?),
                rgb: [c(4)?, c(5)?, c(6)?],
            })
        })
        .collect()
}

pub fn read_cameras(path: &Path) -> Result<Vec<ColmapCamera>> {
    parse_cameras(&read_to_string(path)?, path)
}

pub fn read_images(path: &Path) -> Result<Vec<ColmapImage>> {
    parse_images(&read_to_string(path)?, path)
}

pub fn read_points(path: &Path) -> Result<Vec<ColmapPoint>> {
    parse_points(&read_to_string(path)?, path)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_cameras_text() {
        let text = "# Camera list\n1 PINHOLE 640 480 500 510 320 240\n2 SIMPLE_PINHOLE 100 50 80 50 25\n";
        let cameras = parse_cameras(text, Path::new("cameras.txt")).unwrap();
        assert_eq!(cameras.len(), 2);
        assert_eq!(cameras[0].model, CameraModel::Pinhole);
        assert_eq!(cameras[0].params, vec![500.0, 510.0, 320.0, 240.0]);
        assert_eq!(cameras[1].width, 100);
    }

    #[test]
    fn test_parse_images_with_empty_observation_lines() {
        let text = "# Image list\n\
                    1 1 0 0 0 0 0 1 1 a.png\n\
                    \n\
                    2 1 0 0 0 1 2 3 1 my image.png\n\
                    10.0 20.0 -1\n";
        let images = parse_images(text, Path::new("images.txt")).unwrap();
        assert_eq!(images.len(), 2);
        assert_eq!(images[0].name, "a.png");
        assert_eq!(images[1].tvec, [1.0, 2.0, 3.0]);
        assert_eq!(images[1].name, "my image.png");
    }

    #[test]
    fn test_parse_points_text() {
        let text = "# 3D point list\n7 0.5 1.5 -2 255 128 0 0.1 1 2 3 4\n";
        let points = parse_points(text, Path::new("points3D.txt")).unwrap();
        assert_eq!(points.len(), 1);
        assert_eq!(points[0].xyz, Vec3::new(0.5, 1.5, -2.0));
        assert_eq!(points[0].rgb, [255, 128, 0]);
    }

    #[test]
    fn test_unknown_model_text() {
        let err = parse_cameras("1 WEIRD 1 1 1\n", Path::new("cameras.txt")).unwrap_err();
        assert!(matches!(err, DatasetError::InvalidColmap { .. }));
    }
}
