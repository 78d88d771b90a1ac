use anyhow::{ensure, Result};
use clap::value_t_or_exit;
use std::path::PathBuf;
use thermal_tiff::{args_parser, flag, opt, raster::RasterCompression, raw::RasterGeometry};

pub struct Args {
    pub input: PathBuf,
    pub output: PathBuf,
    pub tsdk: Option<PathBuf>,
    pub exiftool: Option<PathBuf>,
    pub geometry: RasterGeometry,
    pub label: String,
    pub jobs: usize,
    pub compression: RasterCompression,
    pub keep_raw: bool,
    pub report: Option<PathBuf>,
    pub progress: bool,
    pub verbose: bool,
}

impl Args {
    pub fn from_cmd_line() -> Result<Args> {
        let matches = args_parser!("rjpeg2tiff")
            .about("Convert DJI thermal R-JPEGs into 16-bit TIFFs, keeping their metadata.")
            .arg(
                opt!("input path")
                    .required(true)
                    .help("Folder containing the R-JPEG images"),
            )
            .arg(
                opt!("output path")
                    .required(true)
                    .help("Folder for the TIFF images"),
            )
            .arg(
                opt!("tsdk")
                    .help("Folder of the DJI Thermal SDK (default: dji_irp from PATH)"),
            )
            .arg(
                opt!("exiftool")
                    .help("Folder containing exiftool (default: exiftool from PATH)"),
            )
            .arg(
                opt!("height")
                    .alias("h")
                    .default_value("512")
                    .help("Height of the thermal images"),
            )
            .arg(
                opt!("width")
                    .alias("w")
                    .default_value("640")
                    .help("Width of the thermal images"),
            )
            .arg(
                opt!("label")
                    .default_value("T")
                    .help("Only convert images whose name contains this label"),
            )
            .arg(
                opt!("jobs")
                    .short("j")
                    .default_value("1")
                    .help("Number of images converted concurrently"),
            )
            .arg(
                opt!("compression")
                    .possible_values(&RasterCompression::NAMES)
                    .default_value("lzw")
                    .help("Lossless compression of the TIFFs"),
            )
            .arg(flag!("keep raw").help("Keep the intermediate raw16 folder"))
            .arg(opt!("report").help("Write a JSON report of the run to this path"))
            .arg(flag!("no progress").help("Do not show progress bars"))
            .arg(
                flag!("verbose")
                    .short("v")
                    .help("Log every step (RUST_LOG overrides)"),
            )
            .get_matches();

        let input = value_t_or_exit!(matches, "input path", PathBuf);
        let output = value_t_or_exit!(matches, "output path", PathBuf);
        let tsdk = matches.value_of("tsdk").map(PathBuf::from);
        let exiftool = matches.value_of("exiftool").map(PathBuf::from);
        let height = value_t_or_exit!(matches, "height", usize);
        let width = value_t_or_exit!(matches, "width", usize);
        let label = matches.value_of("label").unwrap_or("T").to_string();
        let jobs = value_t_or_exit!(matches, "jobs", usize);
        let compression = value_t_or_exit!(matches, "compression", RasterCompression);
        let report = matches.value_of("report").map(PathBuf::from);

        ensure!(height > 0 && width > 0, "image dimensions must be positive");
        ensure!(
            height <= u32::MAX as usize && width <= u32::MAX as usize,
            "image dimensions must fit in a TIFF"
        );
        let geometry = RasterGeometry::new(height, width);
        ensure!(
            geometry.expected_len().is_some(),
            "image of {}x{} samples is too large",
            height,
            width
        );
        ensure!(jobs > 0, "jobs must be at least 1");

        Ok(Args {
            input,
            output,
            tsdk,
            exiftool,
            geometry,
            label,
            jobs,
            compression,
            keep_raw: matches.is_present("keep raw"),
            report,
            progress: !matches.is_present("no progress"),
            verbose: matches.is_present("verbose"),
        })
    }
}
