//! Checkpoint discovery under `point_cloud/iteration_<N>`.

use std::fs;
use std::io;
use std::path::{Path, PathBuf};

const ITERATION_PREFIX: &str = "iteration_";

/// Directory name of the checkpoint for `iteration`.
pub fn iteration_dir_name(iteration: u32) -> String {
    format!("{ITERATION_PREFIX}{iteration}")
}

/// Checkpoint file written for `iteration` under `model_path`.
pub fn checkpoint_path(model_path: &Path, iteration: u32) -> PathBuf {
    model_path
        .join("point_cloud")
        .join(iteration_dir_name(iteration))
        .join("point_cloud.ply")
}

/// Highest `N` among the `iteration_<N>` entries of `root`.
///
/// A missing root is treated as empty.
pub fn search_for_max_iteration(root: &Path) -> io::Result<Option<u32>> {
    let entries = match fs::read_dir(root) {
        Ok(entries) => entries,
        Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(None),
        Err(e) => return Err(e),
    };

    let mut max = None;
    for entry in entries {
        let name = entry?.file_name();
        let iteration = name
            .to_str()
            .and_then(|n| n.strip_prefix(ITERATION_PREFIX))
            .and_then(|n| n.parse::<u32>().ok());
        if let Some(n) = iteration {
            max = max.max(Some(n));
        }
    }
    Ok(max)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_picks_highest_iteration() {
        let dir = tempfile::tempdir().unwrap();
        for name in ["iteration_7000", "iteration_30000", "iteration_500", "iteration_x", "other"] {
            fs::create_dir(dir.path().join(name)).unwrap();
        }
        assert_eq!(search_for_max_iteration(dir.path()).unwrap(), Some(30000));
    }

    #[test]
    fn test_empty_and_missing_roots() {
        let dir = tempfile::tempdir().unwrap();
        assert_eq!(search_for_max_iteration(dir.path()).unwrap(), None);
        assert_eq!(search_for_max_iteration(&dir.path().join("missing")).unwrap(), None);
    }

    #[test]
    fn test_checkpoint_path_layout() {
        let path = checkpoint_path(Path::new("out"), 500);
        assert_eq!(path, Path::new("out/point_cloud/iteration_500/point_cloud.ply"));
    }
}
