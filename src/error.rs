//! Errors raised while converting a single image.
//!
//! Every variant except [`ConversionError::Io`] is a
//! per-file failure: the [`pipeline`][crate::pipeline]
//! logs it against the offending file and moves on.

use std::path::PathBuf;

use thiserror::Error;

#[derive(Error, Debug)]
pub enum ConversionError {
    #[error("could not extract raw buffer from {}: {reason}", .file.display())]
    Extraction { file: PathBuf, reason: String },

    #[error("raw buffer has {actual} bytes, expected {expected}")]
    ShapeMismatch { expected: usize, actual: usize },

    #[error("raster of {height}x{width} samples is too large")]
    GeometryOverflow { height: usize, width: usize },

    #[error("{} has the same stem `{stem}` as {first}, skipped", .file.display())]
    DuplicateStem {
        file: PathBuf,
        stem: String,
        first: String,
    },

    #[error("could not write raster {}: {reason}", .path.display())]
    Write { path: PathBuf, reason: String },

    #[error("could not copy metadata from {}: {reason}", .file.display())]
    Metadata { file: PathBuf, reason: String },

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

pub type Result<T> = std::result::Result<T, ConversionError>;
