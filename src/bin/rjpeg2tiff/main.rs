mod args;

use std::{fs::File, io::BufWriter};

use anyhow::{Context, Result};
use thermal_tiff::{logger, tool::ExternalTool, Pipeline, PipelineConfig};

use crate::args::Args;

fn main() -> Result<()> {
    let args = Args::from_cmd_line()?;
    logger::init(args.verbose);

    let config = PipelineConfig {
        input_dir: args.input.clone(),
        output_dir: args.output.clone(),
        label: args.label.clone(),
        geometry: args.geometry,
        jobs: args.jobs,
        keep_intermediate: args.keep_raw,
        show_progress: args.progress,
    };
    let pipeline = Pipeline::new(
        config,
        ExternalTool::dji_irp(args.tsdk.as_deref()),
        ExternalTool::exiftool(args.exiftool.as_deref()),
        args.compression,
    );

    let report = pipeline
        .run()
        .with_context(|| format!("could not convert images in {}", args.input.display()))?;

    if let Some(path) = &args.report {
        let writer = BufWriter::new(
            File::create(path).with_context(|| format!("creating {}", path.display()))?,
        );
        serde_json::to_writer_pretty(writer, &report)?;
    }

    println!("Conversion completed.");
    eprintln!(
        "Converted {} of {} images ({} failed)",
        report.converted, report.candidates, report.failed
    );
    if let Some(e) = &report.cleanup_error {
        eprintln!(
            "Raw buffers left in {}: {}",
            report.intermediate_dir.display(),
            e
        );
    }
    let output = args.output.canonicalize().unwrap_or(args.output);
    println!("TIFF images are saved in: {}", output.display());
    Ok(())
}
