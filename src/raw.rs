//! Raw sensor buffers produced by `dji_irp -a extract`.
//!
//! The buffer carries no header: it is `height * width`
//! little-endian `u16` samples in row-major order. The
//! geometry therefore has to be supplied by the caller and
//! is shared by every image of a run.

use std::{
    fs::{metadata, read},
    mem::size_of,
    path::{Path, PathBuf},
};

use byteordered::ByteOrdered;
use ndarray::Array2;

use crate::error::{ConversionError, Result};

/// Rows and columns of every raster in a run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RasterGeometry {
    pub height: usize,
    pub width: usize,
}

impl Default for RasterGeometry {
    /// Geometry of the M3T / H20T thermal sensor.
    fn default() -> Self {
        RasterGeometry {
            height: 512,
            width: 640,
        }
    }
}

impl RasterGeometry {
    pub fn new(height: usize, width: usize) -> Self {
        RasterGeometry { height, width }
    }

    /// Number of samples, `None` on overflow.
    pub fn samples(&self) -> Option<usize> {
        self.height.checked_mul(self.width)
    }

    /// Byte length of a raw buffer of this geometry, `None`
    /// if it does not fit in `usize`.
    pub fn expected_len(&self) -> Option<usize> {
        self.samples()?.checked_mul(size_of::<u16>())
    }

    fn checked_len(&self) -> Result<usize> {
        self.expected_len().ok_or(ConversionError::GeometryOverflow {
            height: self.height,
            width: self.width,
        })
    }
}

/// Reinterpret `bytes` as a `height x width` array of
/// little-endian `u16` samples.
///
/// No calibration or other processing is applied. Fails with
/// [`ConversionError::ShapeMismatch`] unless the length is
/// exactly [`RasterGeometry::expected_len`].
pub fn decode(bytes: &[u8], geometry: RasterGeometry) -> Result<Array2<u16>> {
    let expected = geometry.checked_len()?;
    if bytes.len() != expected {
        return Err(ConversionError::ShapeMismatch {
            expected,
            actual: bytes.len(),
        });
    }

    let mut reader = ByteOrdered::le(bytes);
    let samples = (0..expected / size_of::<u16>())
        .map(|_| reader.read_u16())
        .collect::<std::io::Result<Vec<u16>>>()?;

    Array2::from_shape_vec((geometry.height, geometry.width), samples).map_err(|_| {
        ConversionError::ShapeMismatch {
            expected,
            actual: bytes.len(),
        }
    })
}

/// Intermediate raw buffer written by the extraction stage.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RawBufferFile {
    pub path: PathBuf,
    pub len: u64,
    /// Whether the file pre-existed and extraction was
    /// skipped.
    pub reused: bool,
}

impl RawBufferFile {
    pub fn from_path(path: &Path, reused: bool) -> Result<Self> {
        let len = metadata(path)?.len();
        Ok(RawBufferFile {
            path: path.to_owned(),
            len,
            reused,
        })
    }

    /// Read and [`decode`] the buffer.
    ///
    /// A length mismatch is reported from the recorded file
    /// size, before the file is read.
    pub fn read_raster(&self, geometry: RasterGeometry) -> Result<Array2<u16>> {
        let expected = geometry.checked_len()?;
        if self.len != expected as u64 {
            return Err(ConversionError::ShapeMismatch {
                expected,
                actual: self.len as usize,
            });
        }
        decode(&read(&self.path)?, geometry)
    }
}
