//! Dataset format detection.
//!
//! Formats are recognised by marker files in the source directory. The rules
//! are evaluated in order and the first match wins.

use std::fmt;
use std::path::Path;

/// Dataset layouts understood by the readers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum DatasetFormat {
    Colmap,
    StanfordOrb,
    Synthetic4Relight,
    Blender,
    Neilf,
}

impl DatasetFormat {
    pub const ALL: [DatasetFormat; 5] = [
        DatasetFormat::Colmap,
        DatasetFormat::StanfordOrb,
        DatasetFormat::Synthetic4Relight,
        DatasetFormat::Blender,
        DatasetFormat::Neilf,
    ];

    pub fn name(&self) -> &'static str {
        match self {
            DatasetFormat::Colmap => "Colmap",
            DatasetFormat::StanfordOrb => "StanfordORB",
            DatasetFormat::Synthetic4Relight => "Synthetic4Relight",
            DatasetFormat::Blender => "Blender",
            DatasetFormat::Neilf => "NeILF",
        }
    }
}

impl fmt::Display for DatasetFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// A single detection rule.
pub struct FormatRule {
    pub format: DatasetFormat,
    /// Human-readable description of what the rule looks for.
    pub marker: &'static str,
    matches: fn(&Path) -> bool,
}

impl FormatRule {
    pub fn matches(&self, source: &Path) -> bool {
        (self.matches)(source)
    }
}

fn has_sparse(source: &Path) -> bool {
    source.join("sparse").exists()
}

fn has_transforms(source: &Path) -> bool {
    source.join("transforms_train.json").exists()
}

fn path_contains(source: &Path, needle: &str) -> bool {
    source.to_string_lossy().contains(needle)
}

fn is_stanford_orb(source: &Path) -> bool {
    has_transforms(source) && path_contains(source, "stanford_orb")
}

fn is_synthetic4relight(source: &Path) -> bool {
    has_transforms(source) && path_contains(source, "Synthetic4Relight")
}

fn has_sfm_scene(source: &Path) -> bool {
    source.join("inputs").join("sfm_scene.json").exists()
}

/// Detection rules in priority order.
pub static FORMAT_RULES: &[FormatRule] = &[
    FormatRule {
        format: DatasetFormat::Colmap,
        marker: "sparse/",
        matches: has_sparse,
    },
    FormatRule {
        format: DatasetFormat::StanfordOrb,
        marker: "transforms_train.json in a stanford_orb path",
        matches: is_stanford_orb,
    },
    FormatRule {
        format: DatasetFormat::Synthetic4Relight,
        marker: "transforms_train.json in a Synthetic4Relight path",
        matches: is_synthetic4relight,
    },
    FormatRule {
        format: DatasetFormat::Blender,
        marker: "transforms_train.json",
        matches: has_transforms,
    },
    FormatRule {
        format: DatasetFormat::Neilf,
        marker: "inputs/sfm_scene.json",
        matches: has_sfm_scene,
    },
];

/// Detect the dataset format of `source`, or `None` if no marker matched.
pub fn detect_format(source: &Path) -> Option<&'static FormatRule> {
    FORMAT_RULES.iter().find(|rule| rule.matches(source))
}
