use crate::{DatasetArgs, PrepareArgs};
use lumen_train::{
    CONFIG_FILE_NAME, ConfigError, GaussianModel, LoadIteration, ModelParams, Scene, SceneError,
    SceneOptions,
};
use rand::SeedableRng;
use rand::rngs::StdRng;
use std::error::Error as StdError;
use thiserror::Error;
use tracing::info;

#[derive(Debug, Error)]
pub enum AppError {
    #[error(transparent)]
    Scene(#[from] SceneError),
    #[error(transparent)]
    Config(#[from] ConfigError),
}

pub fn init_logging(level: &str) {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(level)),
        )
        .with_target(false)
        .init();
}

/// `error: cause: cause` for the whole source chain.
pub fn error_chain(error: &dyn StdError) -> String {
    let mut message = error.to_string();
    let mut source = error.source();
    while let Some(cause) = source {
        message.push_str(": ");
        message.push_str(&cause.to_string());
        source = cause.source();
    }
    message
}

fn model_params(dataset: &DatasetArgs) -> ModelParams {
    ModelParams {
        source_path: dataset.source_path.clone(),
        model_path: dataset.model_path.clone(),
        images: dataset.images.clone(),
        ..Default::default()
    }
}

fn prepare_params(args: &PrepareArgs) -> ModelParams {
    ModelParams {
        sh_degree: args.sh_degree,
        resolution: args.resolution,
        white_background: args.white_background,
        data_device: args.data_device.clone(),
        eval: args.eval,
        debug_cuda: args.debug_cuda,
        ..model_params(&args.dataset)
    }
}

fn report(scene: &Scene<GaussianModel>) {
    for scale in scene.resolution_scales() {
        let train = scene.train_cameras(scale).map_or(0, <[_]>::len);
        let test = scene.test_cameras(scale).map_or(0, <[_]>::len);
        info!("Scale {}: {} train / {} test cameras", scale, train, test);
    }
    info!(
        "{} Gaussians, cameras extent {:.4}",
        scene.gaussians().len(),
        scene.cameras_extent()
    );
}

pub fn prepare(args: PrepareArgs) -> Result<(), AppError> {
    let params = prepare_params(&args);
    let options = SceneOptions {
        load_iteration: LoadIteration::from_arg(args.load_iteration)?,
        shuffle: !args.no_shuffle,
        resolution_scales: args.resolution_scales.clone(),
        ..Default::default()
    };

    let mut rng = StdRng::seed_from_u64(args.dataset.seed);
    let scene = Scene::new(&params, GaussianModel::new(params.sh_degree), options, &mut rng)?;
    if scene.loaded_iteration().is_none() {
        params.save(&params.model_path.join(CONFIG_FILE_NAME))?;
    }
    report(&scene);

    if let Some(iteration) = args.save_iteration {
        scene.save(iteration)?;
    }
    Ok(())
}

pub fn local(dataset: DatasetArgs) -> Result<(), AppError> {
    let params = model_params(&dataset);
    let mut rng = StdRng::seed_from_u64(dataset.seed);
    let scene = Scene::from_local_colmap(&params, GaussianModel::new(params.sh_degree), &mut rng)?;
    params.save(&params.model_path.join(CONFIG_FILE_NAME))?;
    report(&scene);
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::Args;
    use crate::Command;
    use clap::Parser;

    fn parse_prepare(argv: &[&str]) -> PrepareArgs {
        match Args::try_parse_from(argv).unwrap().command {
            Command::Prepare(args) => args,
            other => panic!("unexpected command {other:?}"),
        }
    }

    #[test]
    fn test_prepare_defaults() {
        let args = parse_prepare(&["lumen", "prepare", "-s", "data/garden", "-m", "out"]);
        assert_eq!(args.load_iteration, 0);
        assert_eq!(args.resolution_scales, [1.0]);
        let params = prepare_params(&args);
        assert_eq!(params.resolution, -1);
        assert_eq!(params.images, "images");
        assert_eq!(params.data_device, "cuda");
    }

    #[test]
    fn test_prepare_flags() {
        let args = parse_prepare(&[
            "lumen",
            "prepare",
            "-s",
            "data",
            "-m",
            "out",
            "--load-iteration",
            "-1",
            "--resolution-scales",
            "1.0,2.0",
            "-r",
            "4",
            "--eval",
            "--no-shuffle",
        ]);
        assert_eq!(args.load_iteration, -1);
        assert_eq!(args.resolution_scales, [1.0, 2.0]);
        assert!(args.no_shuffle);
        let params = prepare_params(&args);
        assert_eq!(params.resolution, 4);
        assert!(params.eval);
    }

    #[test]
    fn test_unrecognized_dataset_reports_path() {
        let dir = tempfile::tempdir().unwrap();
        let source = dir.path().join("empty");
        std::fs::create_dir(&source).unwrap();
        let args = parse_prepare(&[
            "lumen",
            "prepare",
            "-s",
            source.to_str().unwrap(),
            "-m",
            dir.path().join("out").to_str().unwrap(),
        ]);

        let err = prepare(args).unwrap_err();
        assert!(matches!(err, AppError::Scene(SceneError::UnrecognizedDatasetFormat(_))));
        assert!(error_chain(&err).contains("empty"));
        assert!(!dir.path().join("out").exists());
    }

    #[test]
    fn test_invalid_load_iteration() {
        let args = parse_prepare(&["lumen", "prepare", "-s", "x", "-m", "y", "--load-iteration", "-5"]);
        let err = prepare(args).unwrap_err();
        assert!(matches!(err, AppError::Scene(SceneError::InvalidLoadIteration(-5))));
    }

    #[test]
    fn test_zero_resolution_scale_is_rejected() {
        let args = parse_prepare(&["lumen", "prepare", "-s", "x", "-m", "y", "--resolution-scales", "1.0,0"]);
        let err = prepare(args).unwrap_err();
        assert!(matches!(err, AppError::Scene(SceneError::InvalidResolutionScale(s)) if s == 0.0));
    }
}
