//! Scene assembly: dataset loading, snapshot persistence and per-scale camera lists.

use crate::camera::{Camera, CameraError, CameraLoader, ImageCameraLoader};
use crate::config::ModelParams;
use crate::gaussian::{PointCloudStore, StoreError};
use crate::iteration::{checkpoint_path, search_for_max_iteration};
use lumen_data::{
    CameraRecord, DatasetError, DatasetFormat, Normalization, ReaderRegistry, SceneInfo,
    detect_format,
};
use ordered_float::OrderedFloat;
use rand::Rng;
use rand::seq::SliceRandom;
use std::collections::BTreeMap;
use std::fmt;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use thiserror::Error;
use tracing::{debug, info, warn};

pub const INPUT_PLY: &str = "input.ply";
pub const CAMERAS_JSON: &str = "cameras.json";

#[derive(Debug, Error)]
pub enum SceneError {
    #[error("Could not recognize scene type of {0}")]
    UnrecognizedDatasetFormat(PathBuf),

    #[error("No checkpoint found under {0}")]
    NoCheckpointFound(PathBuf),

    #[error("Cannot read {path}: {source}")]
    SourceFileUnreadable {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("Cannot write {path}: {source}")]
    DestinationUnwritable {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("Invalid resolution scale {0} (must be finite and positive)")]
    InvalidResolutionScale(f32),

    #[error("Resolution scale {0} was not loaded")]
    UnknownResolutionScale(f32),

    #[error("Invalid load iteration {0} (use -1 for the latest checkpoint)")]
    InvalidLoadIteration(i64),

    #[error(transparent)]
    Dataset(#[from] DatasetError),

    #[error(transparent)]
    Camera(#[from] CameraError),

    #[error(transparent)]
    Store(#[from] StoreError),
}

/// Which checkpoint to resume from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoadIteration {
    /// Highest `iteration_<N>` under `point_cloud/`.
    Latest,
    Exact(u32),
}

impl LoadIteration {
    /// Command-line convention: `-1` is latest, `0` is a fresh start.
    pub fn from_arg(value: i64) -> Result<Option<Self>, SceneError> {
        match value {
            -1 => Ok(Some(LoadIteration::Latest)),
            0 => Ok(None),
            n if n > 0 && n <= u32::MAX as i64 => Ok(Some(LoadIteration::Exact(n as u32))),
            other => Err(SceneError::InvalidLoadIteration(other)),
        }
    }
}

/// How a [`Scene`] is assembled.
pub struct SceneOptions {
    /// `None` starts fresh and writes the snapshot.
    pub load_iteration: Option<LoadIteration>,
    /// Shuffle the train and test descriptors once before building cameras.
    pub shuffle: bool,
    /// Scales to build camera lists for. Duplicates collapse.
    pub resolution_scales: Vec<f32>,
    pub registry: ReaderRegistry,
    pub camera_loader: Box<dyn CameraLoader>,
}

impl Default for SceneOptions {
    fn default() -> Self {
        Self {
            load_iteration: None,
            shuffle: true,
            resolution_scales: vec![1.0],
            registry: ReaderRegistry::default(),
            camera_loader: Box::new(ImageCameraLoader::new()),
        }
    }
}

impl fmt::Debug for SceneOptions {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SceneOptions")
            .field("load_iteration", &self.load_iteration)
            .field("shuffle", &self.shuffle)
            .field("resolution_scales", &self.resolution_scales)
            .field("registry", &self.registry)
            .finish_non_exhaustive()
    }
}

type CameraLists = BTreeMap<OrderedFloat<f32>, Vec<Camera>>;

/// A loaded dataset with its camera lists and Gaussian store.
pub struct Scene<S> {
    model_path: PathBuf,
    format: DatasetFormat,
    loaded_iteration: Option<u32>,
    normalization: Normalization,
    cameras_extent: f32,
    train_cameras: CameraLists,
    test_cameras: CameraLists,
    gaussians: S,
}

impl<S: PointCloudStore> Scene<S> {
    /// Detect the dataset format, load it and build every requested camera list.
    ///
    /// On a fresh start the initial point cloud is copied to `input.ply` and the
    /// cameras are dumped to `cameras.json`; on resume both are left untouched and
    /// the store is restored from the checkpoint.
    #[tracing::instrument(skip_all, fields(source = %params.source_path.display()))]
    pub fn new<R: Rng + ?Sized>(
        params: &ModelParams,
        gaussians: S,
        options: SceneOptions,
        rng: &mut R,
    ) -> Result<Self, SceneError> {
        if let Some(&scale) = options
            .resolution_scales
            .iter()
            .find(|s| !(s.is_finite() && **s > 0.0))
        {
            return Err(SceneError::InvalidResolutionScale(scale));
        }
        let loaded_iteration = resolve_iteration(&params.model_path, options.load_iteration)?;

        let rule = detect_format(&params.source_path)
            .ok_or_else(|| SceneError::UnrecognizedDatasetFormat(params.source_path.clone()))?;
        info!("Found {}, assuming {} data set!", rule.marker, rule.format);

        Self::assemble(params, rule.format, loaded_iteration, gaussians, options, rng)
    }

    /// Load a COLMAP dataset for local experiments.
    ///
    /// No evaluation split, a single scale of 1.0, shuffled cameras, and the
    /// snapshot is always written.
    pub fn from_local_colmap<R: Rng + ?Sized>(
        params: &ModelParams,
        gaussians: S,
        rng: &mut R,
    ) -> Result<Self, SceneError> {
        let params = ModelParams {
            eval: false,
            ..params.clone()
        };
        info!("Loading local COLMAP scene from {}", params.source_path.display());
        Self::assemble(
            &params,
            DatasetFormat::Colmap,
            None,
            gaussians,
            SceneOptions::default(),
            rng,
        )
    }

    fn assemble<R: Rng + ?Sized>(
        params: &ModelParams,
        format: DatasetFormat,
        loaded_iteration: Option<u32>,
        mut gaussians: S,
        options: SceneOptions,
        rng: &mut R,
    ) -> Result<Self, SceneError> {
        let mut scene_info =
            options
                .registry
                .read(format, &params.source_path, &params.reader_flags())?;

        if loaded_iteration.is_none() {
            write_snapshot(&params.model_path, &scene_info)?;
        }

        if options.shuffle {
            scene_info.train_cameras.shuffle(rng);
            scene_info.test_cameras.shuffle(rng);
        }

        let cameras_extent = scene_info.normalization.radius;

        let mut train_cameras = CameraLists::new();
        let mut test_cameras = CameraLists::new();
        for &scale in &options.resolution_scales {
            let key = OrderedFloat(scale);
            if train_cameras.contains_key(&key) {
                continue;
            }
            info!("Loading Training Cameras");
            let train =
                options
                    .camera_loader
                    .load_cameras(&scene_info.train_cameras, scale, params)?;
            info!("Loading Test Cameras");
            let test = options
                .camera_loader
                .load_cameras(&scene_info.test_cameras, scale, params)?;
            train_cameras.insert(key, train);
            test_cameras.insert(key, test);
        }

        match loaded_iteration {
            Some(iteration) => {
                gaussians.load_ply(&checkpoint_path(&params.model_path, iteration))?;
            }
            None => gaussians.create_from_pcd(&scene_info.point_cloud, cameras_extent),
        }

        Ok(Self {
            model_path: params.model_path.clone(),
            format,
            loaded_iteration,
            normalization: scene_info.normalization,
            cameras_extent,
            train_cameras,
            test_cameras,
            gaussians,
        })
    }

    /// Write the store to `point_cloud/iteration_<iteration>/point_cloud.ply`.
    pub fn save(&self, iteration: u32) -> Result<(), SceneError> {
        let path = checkpoint_path(&self.model_path, iteration);
        info!("Saving Gaussians at iteration {}", iteration);
        self.gaussians.save_ply(&path)?;
        Ok(())
    }
}

impl<S> Scene<S> {
    pub fn train_cameras(&self, scale: f32) -> Result<&[Camera], SceneError> {
        lookup(&self.train_cameras, scale)
    }

    pub fn test_cameras(&self, scale: f32) -> Result<&[Camera], SceneError> {
        lookup(&self.test_cameras, scale)
    }

    /// Loaded scales in ascending order.
    pub fn resolution_scales(&self) -> impl Iterator<Item = f32> + '_ {
        self.train_cameras.keys().map(|key| key.into_inner())
    }

    pub fn cameras_extent(&self) -> f32 {
        self.cameras_extent
    }

    pub fn normalization(&self) -> Normalization {
        self.normalization
    }

    /// Checkpoint iteration resumed from, `None` on a fresh start.
    pub fn loaded_iteration(&self) -> Option<u32> {
        self.loaded_iteration
    }

    pub fn format(&self) -> DatasetFormat {
        self.format
    }

    pub fn model_path(&self) -> &Path {
        &self.model_path
    }

    pub fn gaussians(&self) -> &S {
        &self.gaussians
    }

    pub fn gaussians_mut(&mut self) -> &mut S {
        &mut self.gaussians
    }
}

fn lookup(lists: &CameraLists, scale: f32) -> Result<&[Camera], SceneError> {
    lists
        .get(&OrderedFloat(scale))
        .map(Vec::as_slice)
        .ok_or(SceneError::UnknownResolutionScale(scale))
}

fn resolve_iteration(
    model_path: &Path,
    request: Option<LoadIteration>,
) -> Result<Option<u32>, SceneError> {
    let iteration = match request {
        None => return Ok(None),
        Some(LoadIteration::Exact(n)) => n,
        Some(LoadIteration::Latest) => {
            let root = model_path.join("point_cloud");
            search_for_max_iteration(&root)
                .map_err(|source| SceneError::SourceFileUnreadable {
                    path: root.clone(),
                    source,
                })?
                .ok_or(SceneError::NoCheckpointFound(root))?
        }
    };
    info!("Loading trained model at iteration {}", iteration);
    Ok(Some(iteration))
}

fn unwritable(path: &Path) -> impl FnOnce(io::Error) -> SceneError + use<> {
    let path = path.to_path_buf();
    move |source| SceneError::DestinationUnwritable { path, source }
}

/// Copy the initial point cloud and dump the cameras, test split first.
///
/// Both files are staged next to their destination and renamed only once
/// every write succeeded. A snapshot already in place is moved to a `.bak`
/// sibling while the new one is renamed in; on failure the new files are
/// removed and the previous snapshot is restored.
fn write_snapshot(model_path: &Path, scene_info: &SceneInfo) -> Result<(), SceneError> {
    fs::create_dir_all(model_path).map_err(unwritable(model_path))?;

    let point_cloud = fs::read(&scene_info.point_cloud_path).map_err(|source| {
        SceneError::SourceFileUnreadable {
            path: scene_info.point_cloud_path.clone(),
            source,
        }
    })?;

    let records: Vec<CameraRecord> = scene_info
        .test_cameras
        .iter()
        .chain(&scene_info.train_cameras)
        .enumerate()
        .map(|(id, camera)| camera.to_record(id))
        .collect();
    let cameras_path = model_path.join(CAMERAS_JSON);
    let cameras =
        serde_json::to_vec(&records).map_err(|e| unwritable(&cameras_path)(io::Error::from(e)))?;

    let staged = [
        (model_path.join(INPUT_PLY), point_cloud),
        (cameras_path, cameras),
    ];
    let temporaries: Vec<PathBuf> = staged
        .iter()
        .map(|(path, _)| sibling(path, "tmp"))
        .collect();

    let mut renamed = Vec::new();
    let mut backups = Vec::new();
    let mut commit = || -> Result<(), SceneError> {
        for ((_, bytes), tmp) in staged.iter().zip(&temporaries) {
            fs::write(tmp, bytes).map_err(unwritable(tmp))?;
        }
        for ((path, _), tmp) in staged.iter().zip(&temporaries) {
            if path.exists() {
                let backup = sibling(path, "bak");
                fs::rename(path, &backup).map_err(unwritable(path))?;
                backups.push((path, backup));
            }
            fs::rename(tmp, path).map_err(unwritable(path))?;
            renamed.push(path);
        }
        Ok(())
    };
    let result = commit();
    if let Err(e) = result {
        for path in temporaries.iter().chain(renamed) {
            let _ = fs::remove_file(path);
        }
        for (path, backup) in &backups {
            if let Err(restore) = fs::rename(backup, path) {
                warn!("Could not restore {}: {}", path.display(), restore);
            }
        }
        return Err(e);
    }
    for (_, backup) in &backups {
        let _ = fs::remove_file(backup);
    }

    debug!(
        "Wrote snapshot with {} cameras to {}",
        records.len(),
        model_path.display()
    );
    Ok(())
}

/// `input.ply` -> `input.ply.<suffix>`.
fn sibling(path: &Path, suffix: &str) -> PathBuf {
    match path.extension() {
        Some(ext) => path.with_extension(format!("{}.{}", ext.to_string_lossy(), suffix)),
        None => path.with_extension(suffix),
    }
}
