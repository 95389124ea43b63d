//! Reader registry keyed by dataset format.

use crate::error::{DatasetError, Result};
use crate::format::DatasetFormat;
use crate::readers::{ColmapReader, NeilfReader, TransformsFlavor, TransformsReader};
use crate::scene_info::SceneInfo;
use std::collections::HashMap;
use std::fmt;
use std::path::Path;

/// Flags forwarded from the model configuration to every reader.
#[derive(Debug, Clone, PartialEq)]
pub struct ReaderFlags {
    /// Image folder name, relative to the source directory (COLMAP only).
    pub images: String,
    pub white_background: bool,
    /// Hold out a test split.
    pub eval: bool,
    /// Verbose per-camera logging.
    pub debug: bool,
}

impl Default for ReaderFlags {
    fn default() -> Self {
        Self {
            images: "images".to_string(),
            white_background: false,
            eval: false,
            debug: false,
        }
    }
}

/// Turns a dataset directory into a normalized [`SceneInfo`].
pub trait DatasetReader {
    fn read(&self, source: &Path, flags: &ReaderFlags) -> Result<SceneInfo>;
}

impl<F> DatasetReader for F
where
    F: Fn(&Path, &ReaderFlags) -> Result<SceneInfo>,
{
    fn read(&self, source: &Path, flags: &ReaderFlags) -> Result<SceneInfo> {
        self(source, flags)
    }
}

/// Maps each [`DatasetFormat`] to the reader that handles it.
pub struct ReaderRegistry {
    readers: HashMap<DatasetFormat, Box<dyn DatasetReader>>,
}

impl ReaderRegistry {
    /// An empty registry.
    pub fn new() -> Self {
        Self {
            readers: HashMap::new(),
        }
    }

    /// Register (or replace) the reader for `format`.
    pub fn with_reader(mut self, format: DatasetFormat, reader: impl DatasetReader + 'static) -> Self {
        self.register(format, reader);
        self
    }

    pub fn register(&mut self, format: DatasetFormat, reader: impl DatasetReader + 'static) {
        self.readers.insert(format, Box::new(reader));
    }

    pub fn contains(&self, format: DatasetFormat) -> bool {
        self.readers.contains_key(&format)
    }

    pub fn read(&self, format: DatasetFormat, source: &Path, flags: &ReaderFlags) -> Result<SceneInfo> {
        let reader = self
            .readers
            .get(&format)
            .ok_or(DatasetError::NoReader(format))?;
        reader.read(source, flags)
    }
}

impl Default for ReaderRegistry {
    /// A registry with the built-in reader for every format.
    fn default() -> Self {
        Self::new()
            .with_reader(DatasetFormat::Colmap, ColmapReader)
            .with_reader(
                DatasetFormat::StanfordOrb,
                TransformsReader::new(TransformsFlavor::StanfordOrb),
            )
            .with_reader(
                DatasetFormat::Synthetic4Relight,
                TransformsReader::new(TransformsFlavor::Synthetic4Relight),
            )
            .with_reader(
                DatasetFormat::Blender,
                TransformsReader::new(TransformsFlavor::Blender),
            )
            .with_reader(DatasetFormat::Neilf, NeilfReader)
    }
}

impl fmt::Debug for ReaderRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut formats: Vec<_> = self.readers.keys().collect();
        formats.sort();
        f.debug_struct("ReaderRegistry")
            .field("formats", &formats)
            .finish()
    }
}
