//! Drive `dji_irp` to pull the raw sensor buffer out of an
//! R-JPEG.

use std::{
    ffi::OsString,
    fs::create_dir_all,
    path::{Path, PathBuf},
};

use tracing::debug;

use crate::{
    error::{ConversionError, Result},
    raw::RawBufferFile,
    scan::InputImage,
    tool::{ExternalTool, ToolRunner},
};

/// Extension of the intermediate raw buffers.
pub const RAW_EXTENSION: &str = "raw";

/// Location of the raw buffer for `input` inside `dest_dir`.
pub fn raw_path_for(dest_dir: &Path, input: &InputImage) -> PathBuf {
    dest_dir.join(format!("{}.{}", input.stem(), RAW_EXTENSION))
}

pub struct Extractor<R> {
    tool: ExternalTool,
    runner: R,
}

impl<R: ToolRunner> Extractor<R> {
    pub fn new(tool: ExternalTool, runner: R) -> Self {
        Extractor { tool, runner }
    }

    /// Extract `source` into `<dest_dir>/<stem>.raw`.
    ///
    /// An existing destination file is reused as is, without
    /// running the tool or looking at its contents. A tool
    /// crash may leave a truncated destination behind, which
    /// a later run will then reuse.
    pub fn extract(&self, source: &InputImage, dest_dir: &Path) -> Result<RawBufferFile> {
        create_dir_all(dest_dir)?;
        let dest = raw_path_for(dest_dir, source);
        if dest.exists() {
            debug!(file = %source.filename, "raw buffer exists, skipping extraction");
            return RawBufferFile::from_path(&dest, true);
        }

        let failed = |reason: String| ConversionError::Extraction {
            file: source.path.clone(),
            reason,
        };

        let args: Vec<OsString> = vec![
            "-s".into(),
            source.path.clone().into(),
            "-a".into(),
            "extract".into(),
            "-o".into(),
            dest.clone().into(),
        ];
        debug!(file = %source.filename, tool = %self.tool.display(), "extracting raw buffer");
        let output = self
            .runner
            .run(&self.tool, &args)
            .map_err(|e| failed(format!("could not launch {}: {}", self.tool.display(), e)))?;
        if !output.success() {
            return Err(failed(output.failure_reason()));
        }
        if !dest.exists() {
            return Err(failed("tool exited successfully but wrote no output".into()));
        }

        RawBufferFile::from_path(&dest, false)
    }
}
