//! Persist decoded rasters as single-band 16-bit TIFFs.
//!
//! No CRS or geotransform is written: the sensor data has no
//! native georeferencing and the GPS tags arrive later with
//! the rest of the metadata.

use std::{
    borrow::Cow,
    fs::write,
    io::Cursor,
    path::{Path, PathBuf},
    str::FromStr,
};

use ndarray::Array2;
use tiff::encoder::{colortype::Gray16, compression::DeflateLevel, Compression, TiffEncoder};
use tracing::debug;

use crate::{
    error::{ConversionError, Result},
    scan::InputImage,
};

/// Extension of the written rasters.
pub const RASTER_EXTENSION: &str = "tif";

/// Lossless compression schemes supported for output.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RasterCompression {
    Lzw,
    Deflate,
}

impl Default for RasterCompression {
    fn default() -> Self {
        RasterCompression::Lzw
    }
}

impl RasterCompression {
    pub const NAMES: [&'static str; 2] = ["lzw", "deflate"];

    fn to_tiff(self) -> Compression {
        match self {
            RasterCompression::Lzw => Compression::Lzw,
            RasterCompression::Deflate => Compression::Deflate(DeflateLevel::Balanced),
        }
    }
}

impl FromStr for RasterCompression {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "lzw" => Ok(RasterCompression::Lzw),
            "deflate" => Ok(RasterCompression::Deflate),
            other => Err(format!("unknown compression: {}", other)),
        }
    }
}

/// A raster written to disk. Always one band of `u16`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OutputRasterFile {
    pub path: PathBuf,
    pub width: usize,
    pub height: usize,
    pub compression: RasterCompression,
}

/// Output location for `input`: its stem with the raster
/// extension, inside `output_dir`.
pub fn output_path_for(output_dir: &Path, input: &InputImage) -> PathBuf {
    output_dir.join(format!("{}.{}", input.stem(), RASTER_EXTENSION))
}

pub trait RasterWriter: Sync {
    /// Create (or overwrite) the raster at `path`.
    fn write(&self, raster: &Array2<u16>, path: &Path) -> Result<OutputRasterFile>;
}

/// [`RasterWriter`] backed by the `tiff` encoder.
#[derive(Debug, Clone, Copy, Default)]
pub struct TiffRasterWriter {
    pub compression: RasterCompression,
}

impl TiffRasterWriter {
    pub fn new(compression: RasterCompression) -> Self {
        TiffRasterWriter { compression }
    }

    /// Encode `raster` into an in-memory TIFF.
    pub fn encode(&self, raster: &Array2<u16>) -> tiff::TiffResult<Vec<u8>> {
        let (height, width) = raster.dim();
        let samples: Cow<[u16]> = match raster.as_slice() {
            Some(slice) => Cow::Borrowed(slice),
            None => Cow::Owned(raster.iter().copied().collect()),
        };

        let mut buffer = Vec::with_capacity(samples.len() * 2);
        TiffEncoder::new(Cursor::new(&mut buffer))?
            .with_compression(self.compression.to_tiff())
            .write_image::<Gray16>(width as u32, height as u32, &samples)?;
        Ok(buffer)
    }
}

impl RasterWriter for TiffRasterWriter {
    fn write(&self, raster: &Array2<u16>, path: &Path) -> Result<OutputRasterFile> {
        let (height, width) = raster.dim();
        debug!(path = %path.display(), width, height, "encoding tiff");

        let write_error = |reason: String| ConversionError::Write {
            path: path.to_owned(),
            reason,
        };
        let buffer = self.encode(raster).map_err(|e| write_error(e.to_string()))?;
        write(path, &buffer).map_err(|e| write_error(e.to_string()))?;

        Ok(OutputRasterFile {
            path: path.to_owned(),
            width,
            height,
            compression: self.compression,
        })
    }
}
