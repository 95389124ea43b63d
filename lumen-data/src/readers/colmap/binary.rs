//! COLMAP binary model parsing (`*.bin`, little-endian).

use super::model::{CameraModel, ColmapCamera, ColmapImage, ColmapPoint};
use crate::error::{DatasetError, Result};
use glam::Vec3;
use std::fs::File;
use std::io::{self, BufReader, Read};
use std::path::Path;

struct LeReader<R> {
    inner: R,
}

impl<R: Read> LeReader<R> {
    fn bytes<const N: usize>(&mut self) -> io::Result<[u8; N]> {
        let mut buf = [0u8; N];
        self.inner.read_exact(&mut buf)?;
        Ok(buf)
    }

    fn u8(&mut self) -> io::Result<u8> {
        Ok(self.bytes::<1>()?[0])
    }

    fn i32(&mut self) -> io::Result<i32> {
        Ok(i32::from_le_bytes(self.bytes()?))
    }

    fn u32(&mut self) -> io::Result<u32> {
        Ok(u32::from_le_bytes(self.bytes()?))
    }

    fn u64(&mut self) -> io::Result<u64> {
        Ok(u64::from_le_bytes(self.bytes()?))
    }

    fn f64(&mut self) -> io::Result<f64> {
        Ok(f64::from_le_bytes(self.bytes()?))
    }

    fn skip(&mut self, len: u64) -> io::Result<()> {
        let copied = io::copy(&mut (&mut self.inner).take(len), &mut io::sink())?;
        if copied != len {
            return Err(io::ErrorKind::UnexpectedEof.into());
        }
        Ok(())
    }

    fn c_string(&mut self) -> io::Result<String> {
        let mut bytes = Vec::new();
        loop {
            match self.u8()? {
                0 => break,
                b => bytes.push(b),
            }
        }
        String::from_utf8(bytes).map_err(|e| io::Error::new(io::ErrorKind::InvalidData, e))
    }
}

fn invalid(message: String) -> io::Error {
    io::Error::new(io::ErrorKind::InvalidData, message)
}

/// Upper bound on up-front allocation for a record count read from disk.
const MAX_PREALLOC: u64 = 1 << 16;

fn with_count<T>(count: u64) -> Vec<T> {
    Vec::with_capacity(count.min(MAX_PREALLOC) as usize)
}

fn record_bytes(count: u64, record_size: u64, what: &str) -> io::Result<u64> {
    count
        .checked_mul(record_size)
        .ok_or_else(|| invalid(format!("{} count {} overflows", what, count)))
}

fn parse_file<T>(path: &Path, parse: impl FnOnce(&mut LeReader<BufReader<File>>) -> io::Result<T>) -> Result<T> {
    let file = File::open(path).map_err(|e| DatasetError::io(path, e))?;
    let mut reader = LeReader {
        inner: BufReader::new(file),
    };
    parse(&mut reader).map_err(|e| match e.kind() {
        io::ErrorKind::InvalidData | io::ErrorKind::UnexpectedEof => {
            DatasetError::colmap(path, e.to_string())
        }
        _ => DatasetError::io(path, e),
    })
}

fn cameras<R: Read>(reader: &mut LeReader<R>) -> io::Result<Vec<ColmapCamera>> {
    let count = reader.u64()?;
    let mut cameras = with_count(count);
    for _ in 0..count {
        let id = reader.u32()?;
        let model_id = reader.i32()?;
        let model = CameraModel::from_id(model_id)
            .ok_or_else(|| invalid(format!("unknown camera model id {}", model_id)))?;
        let width = reader.u64()?;
        let height = reader.u64()?;
        let params = (0..model.num_params())
            .map(|_| reader.f64())
            .collect::<io::Result<Vec<_>>>()?;
        cameras.push(ColmapCamera {
            id,
            model,
            width,
            height,
            params,
        });
    }
    Ok(cameras)
}

fn images<R: Read>(reader: &mut LeReader<R>) -> io::Result<Vec<ColmapImage>> {
    let count = reader.u64()?;
    let mut images = with_count(count);
    for _ in 0..count {
        let id = reader.u32()?;
        let qvec = [reader.f64()?, reader.f64()?, reader.f64()?, reader.f64()?];
        let tvec = [reader.f64()?, reader.f64()?, reader.f64()?];
        let camera_id = reader.u32()?;
        let name = reader.c_string()?;
        // Each 2D observation is (x: f64, y: f64, point3D_id: i64).
        let num_points2d = reader.u64()?;
        reader.skip(record_bytes(num_points2d, 24, "2D point")?)?;
        images.push(ColmapImage {
            id,
            qvec,
            tvec,
            camera_id,
            name,
        });
    }
    Ok(images)
}

fn points<R: Read>(reader: &mut LeReader<R>) -> io::Result<Vec<ColmapPoint>> {
    let count = reader.u64()?;
    let mut points = with_count(count);
    for _ in 0..count {
        let _point_id = reader.u64()?;
        let xyz = Vec3::new(
            reader.f64()? as f32,
            reader.f64()? as f32,
            reader.f64()? as f32,
        );
        let rgb = [reader.u8()?, reader.u8()?, reader.u8()?];
        let _error = reader.f64()?;
        // Track entries are (image_id: i32, point2D_idx: i32).
        let track_length = reader.u64()?;
        reader.skip(record_bytes(track_length, 8, "track")?)?;
        points.push(ColmapPoint { xyz, rgb });
    }
    Ok(points)
}

pub fn read_cameras(path: &Path) -> Result<Vec<ColmapCamera>> {
    parse_file(path, cameras)
}

pub fn read_images(path: &Path) -> Result<Vec<ColmapImage>> {
    parse_file(path, images)
}

pub fn read_points(path: &Path) -> Result<Vec<ColmapPoint>> {
    parse_file(path, points)
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use std::io::Cursor;

    /// Encodes `(image, camera)` pairs the way COLMAP writes `images.bin` / `cameras.bin`.
    pub fn encode_model(images: &[ColmapImage], cameras: &[ColmapCamera]) -> (Vec<u8>, Vec<u8>) {
        let mut img = Vec::new();
        img.extend((images.len() as u64).to_le_bytes());
        for image in images {
            img.extend(image.id.to_le_bytes());
            image.qvec.iter().for_each(|v| img.extend(v.to_le_bytes()));
            image.tvec.iter().for_each(|v| img.extend(v.to_le_bytes()));
            img.extend(image.camera_id.to_le_bytes());
            img.extend(image.name.as_bytes());
            img.push(0);
            img.extend(1u64.to_le_bytes());
            img.extend(1.5f64.to_le_bytes());
            img.extend(2.5f64.to_le_bytes());
            img.extend((-1i64).to_le_bytes());
        }

        let mut cam = Vec::new();
        cam.extend((cameras.len() as u64).to_le_bytes());
        for camera in cameras {
            cam.extend(camera.id.to_le_bytes());
            let model_id = match camera.model {
                CameraModel::SimplePinhole => 0i32,
                CameraModel::Pinhole => 1,
                _ => 2,
            };
            cam.extend(model_id.to_le_bytes());
            cam.extend(camera.width.to_le_bytes());
            cam.extend(camera.height.to_le_bytes());
            camera.params.iter().for_each(|v| cam.extend(v.to_le_bytes()));
        }
        (img, cam)
    }

    #[test]
    fn test_parse_images_and_cameras() {
        let image = ColmapImage {
            id: 4,
            qvec: [1.0, 0.0, 0.0, 0.0],
            tvec: [0.5, -0.5, 2.0],
            camera_id: 1,
            name: "frame_004.jpg".to_string(),
        };
        let camera = ColmapCamera {
            id: 1,
            model: CameraModel::Pinhole,
            width: 640,
            height: 480,
            params: vec![500.0, 510.0, 320.0, 240.0],
        };
        let (img_bytes, cam_bytes) = encode_model(&[image.clone()], &[camera.clone()]);

        let parsed = images(&mut LeReader {
            inner: Cursor::new(img_bytes),
        })
        .unwrap();
        assert_eq!(parsed, vec![image]);

        let parsed = cameras(&mut LeReader {
            inner: Cursor::new(cam_bytes),
        })
        .unwrap();
        assert_eq!(parsed, vec![camera]);
    }

    #[test]
    fn test_parse_points() {
        let mut bytes = Vec::new();
        bytes.extend(1u64.to_le_bytes());
        bytes.extend(9u64.to_le_bytes());
        [1.0f64, 2.0, 3.0].iter().for_each(|v| bytes.extend(v.to_le_bytes()));
        bytes.extend([200u8, 100, 50]);
        bytes.extend(0.25f64.to_le_bytes());
        bytes.extend(2u64.to_le_bytes());
        bytes.extend([0u8; 16]);

        let parsed = points(&mut LeReader {
            inner: Cursor::new(bytes),
        })
        .unwrap();
        assert_eq!(parsed.len(), 1);
        assert_eq!(parsed[0].xyz, Vec3::new(1.0, 2.0, 3.0));
        assert_eq!(parsed[0].rgb, [200, 100, 50]);
    }

    #[test]
    fn test_truncated_file_is_invalid() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("cameras.bin");
        std::fs::write(&path, 3u64.to_le_bytes()).unwrap();
        let err = read_cameras(&path).unwrap_err();
        assert!(matches!(err, DatasetError::InvalidColmap { .. }));
    }

    #[test]
    fn test_huge_counts_are_invalid() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("cameras.bin");
        std::fs::write(&path, (u64::MAX / 2).to_le_bytes()).unwrap();
        let err = read_cameras(&path).unwrap_err();
        assert!(matches!(err, DatasetError::InvalidColmap { .. }));

        let mut bytes = Vec::new();
        bytes.extend(1u64.to_le_bytes());
        bytes.extend(1u32.to_le_bytes());
        [1.0f64, 0.0, 0.0, 0.0, 0.0, 0.0, 0.0]
            .iter()
            .for_each(|v| bytes.extend(v.to_le_bytes()));
        bytes.extend(1u32.to_le_bytes());
        bytes.extend(b"a.png\0");
        bytes.extend(u64::MAX.to_le_bytes());
        let path = dir.path().join("images.bin");
        std::fs::write(&path, bytes).unwrap();
        let err = read_images(&path).unwrap_err();
        assert!(matches!(err, DatasetError::InvalidColmap { .. }));

        let mut bytes = Vec::new();
        bytes.extend(1u64.to_le_bytes());
        bytes.extend(9u64.to_le_bytes());
        [1.0f64, 2.0, 3.0].iter().for_each(|v| bytes.extend(v.to_le_bytes()));
        bytes.extend([1u8, 2, 3]);
        bytes.extend(0.0f64.to_le_bytes());
        bytes.extend(u64::MAX.to_le_bytes());
        let path = dir.path().join("points3D.bin");
        std::fs::write(&path, bytes).unwrap();
        let err = read_points(&path).unwrap_err();
        assert!(matches!(err, DatasetError::InvalidColmap { .. }));
    }
}
