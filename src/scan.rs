//! Enumerate candidate R-JPEGs in an input directory.

use std::{
    fs::read_dir,
    path::{Path, PathBuf},
};

use crate::error::Result;

/// Extensions (compared case-insensitively) accepted as
/// R-JPEG inputs.
pub const IMAGE_EXTENSIONS: [&str; 2] = ["jpg", "jpeg"];

/// A source image selected by [`scan_inputs`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InputImage {
    pub path: PathBuf,
    pub filename: String,
}

impl InputImage {
    pub fn new(dir: &Path, filename: String) -> Self {
        InputImage {
            path: dir.join(&filename),
            filename,
        }
    }

    /// Filename without its extension. Every artifact
    /// derived from this image is keyed on it.
    pub fn stem(&self) -> &str {
        match self.filename.rfind('.') {
            Some(idx) if idx > 0 => &self.filename[..idx],
            _ => &self.filename,
        }
    }

    pub fn extension(&self) -> Option<&str> {
        Path::new(&self.filename)
            .extension()
            .and_then(|ext| ext.to_str())
    }
}

/// Whether `filename` has an image extension and contains
/// `label`.
pub fn is_candidate(filename: &str, label: &str) -> bool {
    let has_image_ext = Path::new(filename)
        .extension()
        .and_then(|ext| ext.to_str())
        .map(|ext| {
            IMAGE_EXTENSIONS
                .iter()
                .any(|known| ext.eq_ignore_ascii_case(known))
        })
        .unwrap_or(false);
    has_image_ext && filename.contains(label)
}

/// Lazily yield the candidate images of `dir` in directory
/// enumeration order.
///
/// Entries that are not regular files, cannot be read, or
/// have non UTF-8 names are skipped silently. Only a failure
/// to open `dir` itself is an error.
pub fn scan_inputs<'a>(
    dir: &'a Path,
    label: &'a str,
) -> Result<impl Iterator<Item = InputImage> + 'a> {
    let entries = read_dir(dir)?;
    Ok(entries
        .filter_map(|entry| entry.ok())
        .filter(|entry| entry.file_type().map(|ty| ty.is_file()).unwrap_or(false))
        .filter_map(|entry| entry.file_name().into_string().ok())
        .filter(move |name| is_candidate(name, label))
        .map(move |name| InputImage::new(dir, name)))
}
