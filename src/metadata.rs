//! Copy metadata from the source R-JPEG onto its raster
//! with ExifTool.

use std::{ffi::OsString, path::Path};

use tracing::debug;

use crate::{
    error::{ConversionError, Result},
    tool::{ExternalTool, ToolRunner},
};

pub struct MetadataPropagator<R> {
    tool: ExternalTool,
    runner: R,
}

impl<R: ToolRunner> MetadataPropagator<R> {
    pub fn new(tool: ExternalTool, runner: R) -> Self {
        MetadataPropagator { tool, runner }
    }

    /// Copy every tag of `source` onto `dest` in place.
    ///
    /// Tags already on `dest` with the same name are
    /// overwritten and no `_original` backup is kept.
    pub fn propagate(&self, source: &Path, dest: &Path) -> Result<()> {
        let args: Vec<OsString> = vec![
            "-tagsfromfile".into(),
            source.into(),
            "-all:all".into(),
            "-overwrite_original".into(),
            dest.into(),
        ];
        let failed = |reason: String| ConversionError::Metadata {
            file: source.to_owned(),
            reason,
        };

        debug!(source = %source.display(), dest = %dest.display(), "copying metadata");
        let output = self
            .runner
            .run(&self.tool, &args)
            .map_err(|e| failed(format!("could not launch {}: {}", self.tool.display(), e)))?;
        if !output.success() {
            return Err(failed(output.failure_reason()));
        }
        Ok(())
    }
}
