//! Convert DJI thermal R-JPEGs into 16-bit single-band
//! TIFF rasters that carry the original image metadata.
//!
//! The radiometric payload of an R-JPEG is pulled out by
//! `dji_irp` from the [DJI Thermal SDK] as a headerless
//! buffer of `u16` samples, [decoded][raw::decode] into an
//! [`ndarray::Array2`], [written][raster::TiffRasterWriter]
//! as a TIFF, and finally tagged with the source metadata by
//! [ExifTool].
//!
//! # Usage
//!
//! The [`Pipeline`] converts a whole directory. Failures
//! are isolated per image: the run reports what happened to
//! each candidate instead of stopping at the first bad file.
//!
//! ```rust,no_run
//! # fn test_compile() -> anyhow::Result<()> {
//! use std::path::Path;
//! use thermal_tiff::{
//!     raster::RasterCompression, tool::ExternalTool, Pipeline, PipelineConfig,
//! };
//!
//! let config = PipelineConfig::new("flight/images", "flight/tiff");
//! let pipeline = Pipeline::new(
//!     config,
//!     ExternalTool::dji_irp(Some(Path::new("/opt/dji_thermal_sdk"))),
//!     ExternalTool::exiftool(None),
//!     RasterCompression::Lzw,
//! );
//! let report = pipeline.run()?;
//! for failure in report.failures() {
//!     eprintln!("{}: {:?}", failure.filename, failure.error);
//! }
//! # Ok(())
//! # }
//! ```
//!
//! The individual stages are usable on their own, e.g. to
//! decode a buffer that was extracted elsewhere:
//!
//! ```rust
//! use thermal_tiff::raw::{decode, RasterGeometry};
//!
//! let raster = decode(&[1, 0, 2, 0, 3, 0, 4, 0], RasterGeometry::new(2, 2)).unwrap();
//! assert_eq!(raster[(1, 0)], 3);
//! ```
//!
//! [DJI Thermal SDK]: //www.dji.com/downloads/softwares/dji-thermal-sdk
//! [ExifTool]: //exiftool.org

pub mod cli;
pub mod error;
pub mod extract;
pub mod logger;
pub mod metadata;
pub mod pipeline;
pub mod raster;
pub mod raw;
pub mod scan;
pub mod tool;

pub use crate::error::{ConversionError, Result};
pub use crate::pipeline::{Pipeline, PipelineConfig, RunReport};
