use image::{ImageFormat, ImageReader};
use std::path::{Path, PathBuf};
use tracing::{error, info};

use crate::error::ListingError;

/// Outcome of normalizing one image.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Normalized {
    /// A fresh PNG was written.
    Converted(PathBuf),
    /// The PNG already existed; nothing was decoded.
    Cached(PathBuf),
}

impl Normalized {
    pub fn path(&self) -> &Path {
        match self {
            Normalized::Converted(p) | Normalized::Cached(p) => p,
        }
    }

    pub fn into_path(self) -> PathBuf {
        match self {
            Normalized::Converted(p) | Normalized::Cached(p) => p,
        }
    }
}

/// Turns game textures (`.dds`) and other rasters into PNGs under one output dir.
#[derive(Debug, Clone)]
pub struct ImageNormalizer {
    output_dir: PathBuf,
}

impl ImageNormalizer {
    pub fn new(output_dir: impl Into<PathBuf>) -> Self {
        Self {
            output_dir: output_dir.into(),
        }
    }

    pub fn output_dir(&self) -> &Path {
        &self.output_dir
    }

    /// Target file for a source: `{output_dir}/{stem}.png`.
    pub fn target_for(&self, source: &Path) -> Result<PathBuf, ListingError> {
        let stem = source
            .file_stem()
            .and_then(|s| s.to_str())
            .filter(|s| !s.is_empty())
            .ok_or_else(|| {
                ListingError::conversion(source.display().to_string(), "invalid image file name")
            })?;
        Ok(self.output_dir.join(format!("{stem}.png")))
    }

    /// Ensure a PNG counterpart of `source` exists in the output dir.
    ///
    /// An existing target is reused as-is; its content is never compared
    /// against the source.
    pub fn normalize(&self, source: &Path) -> Result<Normalized, ListingError> {
        let target = self.target_for(source)?;
        if target.is_file() {
            return Ok(Normalized::Cached(target));
        }

        std::fs::create_dir_all(&self.output_dir)?;
        let src_name = source.display().to_string();
        let img = ImageReader::open(source)
            .map_err(|e| ListingError::conversion(&src_name, e))?
            .with_guessed_format()
            .map_err(|e| ListingError::conversion(&src_name, e))?
            .decode()
            .map_err(|e| ListingError::conversion(&src_name, e))?;
        img.save_with_format(&target, ImageFormat::Png)
            .map_err(|e| ListingError::conversion(&src_name, e))?;

        info!(source = %src_name, target = %target.display(), "converted image to PNG");
        Ok(Normalized::Converted(target))
    }

    /// Like [`normalize`](Self::normalize) but logs failures and yields `None`.
    pub fn normalize_or_skip(&self, source: &Path) -> Option<PathBuf> {
        match self.normalize(source) {
            Ok(n) => Some(n.into_path()),
            Err(err) => {
                error!(%err, source = %source.display(), "image conversion failed; listing will have no image");
                None
            }
        }
    }
}
