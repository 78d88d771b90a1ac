//! Batch driver: scan, extract everything, then decode,
//! write and tag each image, and finally drop the
//! intermediate buffers.
//!
//! Every image moves through the [`Stage`]s on its own. A
//! failure is logged against its file and ends that file's
//! chain only; the batch always runs to completion. A
//! completed run therefore means every candidate was
//! *attempted*, see [`RunReport`] for what actually
//! succeeded.

use std::{
    collections::HashMap,
    fs::{create_dir_all, remove_dir_all},
    io,
    path::{Path, PathBuf},
};

use indicatif::{ParallelProgressIterator, ProgressBar, ProgressStyle};
use itertools::Itertools;
use rayon::prelude::*;
use serde_derive::*;
use tracing::{info, warn};

use crate::{
    error::{ConversionError, Result},
    extract::Extractor,
    metadata::MetadataPropagator,
    raster::{output_path_for, RasterCompression, RasterWriter, TiffRasterWriter},
    raw::{RasterGeometry, RawBufferFile},
    scan::{scan_inputs, InputImage},
    tool::{ExternalTool, ProcessRunner, ToolRunner},
};

/// Name of the intermediate directory, created next to the
/// output directory.
pub const INTERMEDIATE_DIR_NAME: &str = "raw16";

#[derive(Debug, Clone)]
pub struct PipelineConfig {
    pub input_dir: PathBuf,
    pub output_dir: PathBuf,
    /// Substring a filename must contain to be converted.
    pub label: String,
    pub geometry: RasterGeometry,
    /// Worker threads; 1 processes the files strictly one
    /// after the other.
    pub jobs: usize,
    /// Leave the raw buffers on disk after the run.
    pub keep_intermediate: bool,
    pub show_progress: bool,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        PipelineConfig {
            input_dir: PathBuf::new(),
            output_dir: PathBuf::new(),
            label: "T".into(),
            geometry: RasterGeometry::default(),
            jobs: 1,
            keep_intermediate: false,
            show_progress: false,
        }
    }
}

impl PipelineConfig {
    pub fn new<P: Into<PathBuf>, Q: Into<PathBuf>>(input_dir: P, output_dir: Q) -> Self {
        PipelineConfig {
            input_dir: input_dir.into(),
            output_dir: output_dir.into(),
            ..Default::default()
        }
    }

    pub fn intermediate_dir(&self) -> PathBuf {
        intermediate_dir_for(&self.output_dir, &self.input_dir)
    }
}

/// Sibling of `output_dir` holding the raw buffers.
///
/// The directory is removed after the run, so it is never
/// `output_dir` or `input_dir`, nor a directory containing
/// either of them. On a collision `raw16-intermediate`,
/// then `raw16-intermediate-2` and so on are tried.
pub fn intermediate_dir_for(output_dir: &Path, input_dir: &Path) -> PathBuf {
    let parent = output_dir.parent().unwrap_or_else(|| Path::new(""));
    let collides = |dir: &Path| is_within(output_dir, dir) || is_within(input_dir, dir);

    let mut dir = parent.join(INTERMEDIATE_DIR_NAME);
    let mut attempt = 1;
    while collides(&dir) {
        dir = match attempt {
            1 => parent.join(format!("{}-intermediate", INTERMEDIATE_DIR_NAME)),
            n => parent.join(format!("{}-intermediate-{}", INTERMEDIATE_DIR_NAME, n)),
        };
        attempt += 1;
    }
    dir
}

/// Whether `path` is `dir` or lies below it, either as
/// written or once symlinks and relative parts are resolved.
fn is_within(path: &Path, dir: &Path) -> bool {
    path.starts_with(dir) || resolved(path).starts_with(resolved(dir))
}

/// `path` canonicalized as far as it exists on disk.
fn resolved(path: &Path) -> PathBuf {
    if let Ok(path) = path.canonicalize() {
        return path;
    }
    match (path.parent(), path.file_name()) {
        (Some(parent), Some(name)) if parent.as_os_str().is_empty() => {
            resolved(Path::new(".")).join(name)
        }
        (Some(parent), Some(name)) => resolved(parent).join(name),
        _ => path.to_owned(),
    }
}

/// Remove `dir` and its contents. A missing directory is
/// fine.
pub fn remove_intermediate_dir(dir: &Path) -> io::Result<()> {
    match remove_dir_all(dir) {
        Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(()),
        res => res,
    }
}

/// Progress of one image through the pipeline, in order.
#[derive(Serialize, Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Stage {
    Scanned,
    Extracted,
    Decoded,
    Written,
    MetadataCopied,
}

/// Final state of one image.
///
/// `stage` is the last stage reached. If `error` is set the
/// image failed while attempting the stage after it.
#[derive(Serialize, Debug, Clone, PartialEq, Eq)]
pub struct FileOutcome {
    pub filename: String,
    pub stage: Stage,
    pub output: Option<PathBuf>,
    pub error: Option<String>,
}

impl FileOutcome {
    fn new(filename: &str, stage: Stage) -> Self {
        FileOutcome {
            filename: filename.to_owned(),
            stage,
            output: None,
            error: None,
        }
    }

    pub fn is_complete(&self) -> bool {
        self.error.is_none() && self.stage == Stage::MetadataCopied
    }

    pub fn is_failed(&self) -> bool {
        self.error.is_some()
    }
}

#[derive(Serialize, Debug, Clone)]
pub struct RunReport {
    pub input_dir: PathBuf,
    pub output_dir: PathBuf,
    pub intermediate_dir: PathBuf,
    pub candidates: usize,
    pub converted: usize,
    pub failed: usize,
    /// One entry per candidate, sorted by filename.
    pub files: Vec<FileOutcome>,
    /// Set when the intermediate directory could not be
    /// removed. The conversions themselves are unaffected.
    pub cleanup_error: Option<String>,
}

impl RunReport {
    fn new(config: &PipelineConfig, intermediate_dir: PathBuf, files: Vec<FileOutcome>) -> Self {
        RunReport {
            input_dir: config.input_dir.clone(),
            output_dir: config.output_dir.clone(),
            intermediate_dir,
            candidates: files.len(),
            converted: files.iter().filter(|f| f.is_complete()).count(),
            failed: files.iter().filter(|f| f.is_failed()).count(),
            files,
            cleanup_error: None,
        }
    }

    pub fn completed_files(&self) -> impl Iterator<Item = &FileOutcome> {
        self.files.iter().filter(|f| f.is_complete())
    }

    pub fn failures(&self) -> impl Iterator<Item = &FileOutcome> {
        self.files.iter().filter(|f| f.is_failed())
    }
}

/// A successful extraction, handed from the extraction phase
/// to the conversion phase.
#[derive(Debug, Clone)]
pub struct ExtractedBuffer {
    pub input: InputImage,
    pub raw: RawBufferFile,
}

pub struct Pipeline<R, W> {
    config: PipelineConfig,
    extractor: Extractor<R>,
    propagator: MetadataPropagator<R>,
    writer: W,
}

impl Pipeline<ProcessRunner, TiffRasterWriter> {
    pub fn new(
        config: PipelineConfig,
        extraction_tool: ExternalTool,
        metadata_tool: ExternalTool,
        compression: RasterCompression,
    ) -> Self {
        Self::with_custom(
            config,
            extraction_tool,
            metadata_tool,
            ProcessRunner,
            TiffRasterWriter::new(compression),
        )
    }
}

impl<R: ToolRunner + Clone, W: RasterWriter> Pipeline<R, W> {
    pub fn with_custom(
        config: PipelineConfig,
        extraction_tool: ExternalTool,
        metadata_tool: ExternalTool,
        runner: R,
        writer: W,
    ) -> Self {
        Pipeline {
            config,
            extractor: Extractor::new(extraction_tool, runner.clone()),
            propagator: MetadataPropagator::new(metadata_tool, runner),
            writer,
        }
    }

    pub fn config(&self) -> &PipelineConfig {
        &self.config
    }

    /// Run the whole batch.
    ///
    /// Only failures to set up (unreadable input directory,
    /// output directory that cannot be created, worker pool)
    /// are returned as errors. Per-image failures and a
    /// failed cleanup end up in the report.
    pub fn run(&self) -> Result<RunReport> {
        let config = &self.config;
        create_dir_all(&config.output_dir)?;
        let intermediate = config.intermediate_dir();

        let inputs: Vec<InputImage> = scan_inputs(&config.input_dir, &config.label)?
            .sorted_by(|a, b| a.filename.cmp(&b.filename))
            .collect();
        let (inputs, duplicates) = self.split_duplicate_stems(inputs);
        info!(
            count = inputs.len(),
            input = %config.input_dir.display(),
            label = %config.label,
            "found candidate images"
        );

        let pool = rayon::ThreadPoolBuilder::new()
            .num_threads(config.jobs.max(1))
            .build()
            .map_err(|e| io::Error::new(io::ErrorKind::Other, e.to_string()))?;

        let files = pool.install(|| {
            let (extracted, mut outcomes) = self.extract_all(&inputs, &intermediate);
            outcomes.extend(self.convert_all(&extracted));
            outcomes
        });
        let files = files
            .into_iter()
            .chain(duplicates)
            .sorted_by(|a, b| a.filename.cmp(&b.filename))
            .collect();

        let mut report = RunReport::new(config, intermediate.clone(), files);
        if config.keep_intermediate {
            info!(dir = %intermediate.display(), "keeping raw buffers");
        } else if let Err(e) = remove_intermediate_dir(&intermediate) {
            warn!(dir = %intermediate.display(), "could not remove raw buffers: {}", e);
            report.cleanup_error = Some(e.to_string());
        }

        info!(
            candidates = report.candidates,
            converted = report.converted,
            failed = report.failed,
            "run finished"
        );
        Ok(report)
    }

    /// Keep the first input of every stem. Later inputs with
    /// the same stem would share its raw buffer and raster, so
    /// they fail before extraction.
    fn split_duplicate_stems(
        &self,
        inputs: Vec<InputImage>,
    ) -> (Vec<InputImage>, Vec<FileOutcome>) {
        let mut first_by_stem: HashMap<String, String> = HashMap::new();
        let mut unique = vec![];
        let mut duplicates = vec![];
        for input in inputs {
            match first_by_stem.get(input.stem()) {
                Some(first) => {
                    let error = ConversionError::DuplicateStem {
                        file: input.path.clone(),
                        stem: input.stem().to_owned(),
                        first: first.clone(),
                    };
                    let outcome = FileOutcome::new(&input.filename, Stage::Scanned);
                    duplicates.push(self.failed(outcome, error));
                }
                None => {
                    first_by_stem.insert(input.stem().to_owned(), input.filename.clone());
                    unique.push(input);
                }
            }
        }
        (unique, duplicates)
    }

    /// Extract every input into `dest_dir`.
    ///
    /// Returns the buffers to convert and the outcomes of the
    /// inputs that failed extraction.
    pub fn extract_all(
        &self,
        inputs: &[InputImage],
        dest_dir: &Path,
    ) -> (Vec<ExtractedBuffer>, Vec<FileOutcome>) {
        info!(dir = %dest_dir.display(), "extracting raw buffers");
        let results: Vec<_> = inputs
            .par_iter()
            .progress_with(self.progress_bar(inputs.len(), "extract"))
            .map(|input| (input, self.extractor.extract(input, dest_dir)))
            .collect();

        let mut extracted = vec![];
        let mut failures = vec![];
        for (input, res) in results {
            match res {
                Ok(raw) => extracted.push(ExtractedBuffer {
                    input: input.clone(),
                    raw,
                }),
                Err(e) => {
                    let outcome = FileOutcome::new(&input.filename, Stage::Scanned);
                    failures.push(self.failed(outcome, e));
                }
            }
        }
        (extracted, failures)
    }

    /// Decode, write and tag every extracted buffer.
    pub fn convert_all(&self, extracted: &[ExtractedBuffer]) -> Vec<FileOutcome> {
        info!(count = extracted.len(), "converting raw buffers");
        extracted
            .par_iter()
            .progress_with(self.progress_bar(extracted.len(), "convert"))
            .map(|buffer| self.convert_one(buffer))
            .collect()
    }

    /// Carry one buffer through decode, write and metadata.
    pub fn convert_one(&self, buffer: &ExtractedBuffer) -> FileOutcome {
        let mut outcome = FileOutcome::new(&buffer.input.filename, Stage::Extracted);
        match self.advance(buffer, &mut outcome) {
            Ok(()) => outcome,
            Err(e) => self.failed(outcome, e),
        }
    }

    fn advance(&self, buffer: &ExtractedBuffer, outcome: &mut FileOutcome) -> Result<()> {
        let raster = buffer.raw.read_raster(self.config.geometry)?;
        outcome.stage = Stage::Decoded;

        let out_path = output_path_for(&self.config.output_dir, &buffer.input);
        let written = self.writer.write(&raster, &out_path)?;
        outcome.stage = Stage::Written;
        outcome.output = Some(written.path);

        self.propagator.propagate(&buffer.input.path, &out_path)?;
        outcome.stage = Stage::MetadataCopied;
        Ok(())
    }

    fn failed(&self, mut outcome: FileOutcome, error: ConversionError) -> FileOutcome {
        warn!(
            file = %outcome.filename,
            stage = ?outcome.stage,
            "skipping: {}",
            error
        );
        outcome.error = Some(error.to_string());
        outcome
    }

    fn progress_bar(&self, len: usize, phase: &'static str) -> ProgressBar {
        if !self.config.show_progress {
            return ProgressBar::hidden();
        }
        let bar = ProgressBar::new(len as u64);
        bar.set_style(
            ProgressStyle::default_bar()
                .template("{msg:>8} [{elapsed_precise}] {wide_bar:cyan/blue} {pos:>7}/{len:7}"),
        );
        bar.set_message(phase);
        bar
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        raster::OutputRasterFile,
        tool::{
            mock::{exit_with, MockRunner},
            ToolOutput,
        },
    };
    use ndarray::Array2;
    use std::{
        ffi::OsString,
        fs::write,
        sync::{Arc, Mutex},
    };

    fn arg_after<'a>(args: &'a [OsString], flag: &str) -> Option<&'a OsString> {
        let idx = args.iter().position(|a| a == flag)?;
        args.get(idx + 1)
    }

    fn file_name(path: &OsString) -> String {
        Path::new(path)
            .file_name()
            .map(|name| name.to_string_lossy().into_owned())
            .unwrap_or_default()
    }

    /// Pretends to be both tools. `bad` files get a short
    /// buffer, `broken` files make extraction fail and `untagged`
    /// files make the metadata copy fail.
    fn fake_tools(args: &[OsString]) -> io::Result<ToolOutput> {
        if let Some(source) = arg_after(args, "-s") {
            let source = file_name(source);
            if source.contains("broken") {
                return exit_with(1);
            }
            let dest = arg_after(args, "-o").unwrap();
            let bytes: &[u8] = if source.contains("bad") {
                &[1, 0, 2]
            } else {
                &[1, 0, 2, 0, 3, 0, 4, 0]
            };
            write(dest, bytes)?;
            return exit_with(0);
        }
        let source = arg_after(args, "-tagsfromfile").unwrap();
        if file_name(source).contains("untagged") {
            return exit_with(1);
        }
        exit_with(0)
    }

    struct MockWriter {
        should_fail: bool,
        written: Arc<Mutex<Vec<(PathBuf, Array2<u16>)>>>,
    }

    impl RasterWriter for MockWriter {
        fn write(&self, raster: &Array2<u16>, path: &Path) -> Result<OutputRasterFile> {
            if self.should_fail {
                return Err(ConversionError::Write {
                    path: path.to_owned(),
                    reason: "mock encode error".into(),
                });
            }
            self.written
                .lock()
                .unwrap()
                .push((path.to_owned(), raster.clone()));
            Ok(OutputRasterFile {
                path: path.to_owned(),
                width: raster.ncols(),
                height: raster.nrows(),
                compression: RasterCompression::Lzw,
            })
        }
    }

    struct Fixture {
        _root: tempfile::TempDir,
        config: PipelineConfig,
    }

    fn fixture(names: &[&str]) -> Fixture {
        fixture_in("input", names)
    }

    fn fixture_in(input_name: &str, names: &[&str]) -> Fixture {
        let root = tempfile::tempdir().unwrap();
        let input = root.path().join(input_name);
        create_dir_all(&input).unwrap();
        for name in names {
            write(input.join(name), b"rjpeg").unwrap();
        }
        let mut config = PipelineConfig::new(input, root.path().join("tiff"));
        config.geometry = RasterGeometry::new(2, 2);
        Fixture {
            _root: root,
            config,
        }
    }

    fn pipeline<'a, F>(
        config: &PipelineConfig,
        runner: &'a MockRunner<F>,
        writer: MockWriter,
    ) -> Pipeline<&'a MockRunner<F>, MockWriter>
    where
        F: Fn(&[OsString]) -> io::Result<ToolOutput> + Sync,
    {
        Pipeline::with_custom(
            config.clone(),
            ExternalTool::new("dji_irp"),
            ExternalTool::new("exiftool"),
            runner,
            writer,
        )
    }

    fn writer(should_fail: bool) -> (MockWriter, Arc<Mutex<Vec<(PathBuf, Array2<u16>)>>>) {
        let written = Arc::new(Mutex::new(vec![]));
        (
            MockWriter {
                should_fail,
                written: written.clone(),
            },
            written,
        )
    }

    #[test]
    fn converts_labelled_images_and_cleans_up() {
        let fx = fixture(&["img_T.JPG", "img_X.JPG", "notes.txt"]);
        let runner = MockRunner::new(fake_tools);
        let (w, written) = writer(false);

        let report = pipeline(&fx.config, &runner, w).run().unwrap();

        assert_eq!(report.candidates, 1);
        assert_eq!(report.converted, 1);
        assert_eq!(report.failed, 0);
        let file = &report.files[0];
        assert_eq!(file.filename, "img_T.JPG");
        assert_eq!(file.stage, Stage::MetadataCopied);
        assert_eq!(file.output, Some(fx.config.output_dir.join("img_T.tif")));

        let written = written.lock().unwrap();
        assert_eq!(written.len(), 1);
        assert_eq!(written[0].1, ndarray::arr2(&[[1u16, 2], [3, 4]]));

        // one extraction, one metadata copy
        assert_eq!(runner.call_count(), 2);
        assert!(!fx.config.intermediate_dir().exists());
    }

    #[test]
    fn one_bad_file_does_not_stop_the_batch() {
        let fx = fixture(&["a_T.JPG", "bad_T.JPG", "broken_T.JPG", "z_T.jpg"]);
        let runner = MockRunner::new(fake_tools);
        let (w, written) = writer(false);

        let report = pipeline(&fx.config, &runner, w).run().unwrap();

        assert_eq!(report.candidates, 4);
        assert_eq!(report.converted, 2);
        assert_eq!(report.failed, 2);
        let names: Vec<_> = report.completed_files().map(|f| f.filename.as_str()).collect();
        assert_eq!(names, vec!["a_T.JPG", "z_T.jpg"]);

        let bad = &report.files[1];
        assert_eq!(bad.filename, "bad_T.JPG");
        assert_eq!(bad.stage, Stage::Extracted);
        assert!(bad.error.as_ref().unwrap().contains("expected 8"));

        let broken = &report.files[2];
        assert_eq!(broken.stage, Stage::Scanned);
        assert!(broken.output.is_none());

        assert_eq!(written.lock().unwrap().len(), 2);
    }

    #[test]
    fn write_failure_skips_metadata() {
        let fx = fixture(&["a_T.JPG"]);
        let runner = MockRunner::new(fake_tools);
        let (w, _) = writer(true);

        let report = pipeline(&fx.config, &runner, w).run().unwrap();

        assert_eq!(report.failed, 1);
        assert_eq!(report.files[0].stage, Stage::Decoded);
        let calls = runner.calls.lock().unwrap();
        assert_eq!(calls.len(), 1);
        assert_eq!(calls[0][0], OsString::from("dji_irp"));
    }

    #[test]
    fn metadata_failure_keeps_raster() {
        let fx = fixture(&["untagged_T.JPG"]);
        let runner = MockRunner::new(fake_tools);
        let (w, written) = writer(false);

        let report = pipeline(&fx.config, &runner, w).run().unwrap();

        let file = &report.files[0];
        assert_eq!(file.stage, Stage::Written);
        assert!(file.is_failed());
        assert_eq!(file.output, Some(fx.config.output_dir.join("untagged_T.tif")));
        assert_eq!(written.lock().unwrap().len(), 1);
    }

    #[test]
    fn keep_intermediate_leaves_buffers() {
        let mut fx = fixture(&["a_T.JPG"]);
        fx.config.keep_intermediate = true;
        let runner = MockRunner::new(fake_tools);
        let (w, _) = writer(false);

        pipeline(&fx.config, &runner, w).run().unwrap();
        assert!(fx.config.intermediate_dir().join("a_T.raw").exists());

        // rerun reuses the buffer without calling dji_irp again
        let runner = MockRunner::new(fake_tools);
        let (w, _) = writer(false);
        let report = pipeline(&fx.config, &runner, w).run().unwrap();
        assert_eq!(report.converted, 1);
        assert_eq!(runner.call_count(), 1);
    }

    #[test]
    fn parallel_run_matches_sequential() {
        let names: Vec<String> = (0..12)
            .map(|i| {
                if i % 4 == 1 {
                    format!("bad{:02}_T.JPG", i)
                } else {
                    format!("img{:02}_T.JPG", i)
                }
            })
            .collect();
        let names: Vec<&str> = names.iter().map(|s| s.as_str()).collect();

        let run = |jobs: usize| {
            let mut fx = fixture(&names);
            fx.config.jobs = jobs;
            let runner = MockRunner::new(fake_tools);
            let (w, _) = writer(false);
            let report = pipeline(&fx.config, &runner, w).run().unwrap();
            report
                .files
                .iter()
                .map(|f| (f.filename.clone(), f.stage, f.is_failed()))
                .collect::<Vec<_>>()
        };
        assert_eq!(run(1), run(4));
    }

    #[test]
    fn missing_input_dir_is_an_error() {
        let fx = fixture(&[]);
        let mut config = fx.config.clone();
        config.input_dir = config.input_dir.join("missing");
        let runner = MockRunner::new(fake_tools);
        let (w, _) = writer(false);
        assert!(pipeline(&config, &runner, w).run().is_err());
    }

    #[test]
    fn empty_batch_completes() {
        let fx = fixture(&[]);
        let runner = MockRunner::new(fake_tools);
        let (w, _) = writer(false);
        let report = pipeline(&fx.config, &runner, w).run().unwrap();
        assert_eq!(report.candidates, 0);
        assert!(fx.config.output_dir.is_dir());
        assert!(!fx.config.intermediate_dir().exists());
    }

    #[test]
    fn intermediate_dir_is_a_distinct_sibling() {
        let images = Path::new("/data/images");
        assert_eq!(
            intermediate_dir_for(Path::new("/data/tiff"), images),
            Path::new("/data/raw16")
        );
        assert_eq!(
            intermediate_dir_for(Path::new("/data/raw16"), images),
            Path::new("/data/raw16-intermediate")
        );
        assert_eq!(
            intermediate_dir_for(Path::new("tiff"), Path::new("images")),
            Path::new("raw16")
        );
    }

    #[test]
    fn intermediate_dir_never_holds_the_inputs() {
        let tiff = Path::new("/data/tiff");
        assert_eq!(
            intermediate_dir_for(tiff, Path::new("/data/raw16")),
            Path::new("/data/raw16-intermediate")
        );
        assert_eq!(
            intermediate_dir_for(tiff, Path::new("/data/raw16/flight")),
            Path::new("/data/raw16-intermediate")
        );
        assert_eq!(
            intermediate_dir_for(
                Path::new("/data/raw16"),
                Path::new("/data/raw16-intermediate")
            ),
            Path::new("/data/raw16-intermediate-2")
        );
        assert_eq!(
            intermediate_dir_for(Path::new("tiff"), Path::new("./raw16")),
            Path::new("raw16-intermediate")
        );
    }

    #[test]
    fn inputs_in_a_raw16_folder_survive_the_run() {
        let fx = fixture_in("raw16", &["img_T.JPG"]);
        let intermediate = fx.config.intermediate_dir();
        assert_ne!(intermediate, fx.config.input_dir);
        let runner = MockRunner::new(fake_tools);
        let (w, _) = writer(false);

        let report = pipeline(&fx.config, &runner, w).run().unwrap();

        assert_eq!(report.converted, 1);
        assert_eq!(report.intermediate_dir, intermediate);
        assert!(fx.config.input_dir.join("img_T.JPG").is_file());
        assert!(!intermediate.exists());
    }

    #[test]
    fn duplicate_stems_fail_the_later_file() {
        let mut fx = fixture(&["a_T.JPG", "a_T.jpeg", "b_T.JPG"]);
        fx.config.jobs = 4;
        let runner = MockRunner::new(fake_tools);
        let (w, written) = writer(false);

        let report = pipeline(&fx.config, &runner, w).run().unwrap();

        assert_eq!(report.candidates, 3);
        assert_eq!(report.converted, 2);
        let dup = &report.files[1];
        assert_eq!(dup.filename, "a_T.jpeg");
        assert_eq!(dup.stage, Stage::Scanned);
        assert!(dup.error.as_ref().unwrap().contains("a_T.JPG"));

        // two extractions, two metadata copies
        assert_eq!(runner.call_count(), 4);
        assert_eq!(written.lock().unwrap().len(), 2);
    }

    #[cfg(unix)]
    #[test]
    fn cleanup_failure_still_reports() {
        let fx = fixture(&["a_T.JPG", "b_T.JPG"]);
        // a stray file where the intermediate directory goes
        write(fx.config.intermediate_dir(), b"not a dir").unwrap();
        let runner = MockRunner::new(fake_tools);
        let (w, _) = writer(false);

        let report = pipeline(&fx.config, &runner, w).run().unwrap();

        assert_eq!(report.candidates, 2);
        assert_eq!(report.failed, 2);
        assert!(report.files.iter().all(|f| f.stage == Stage::Scanned));
        assert!(report.cleanup_error.is_some());
        assert!(fx.config.intermediate_dir().is_file());
    }

    #[test]
    fn cleanup_is_idempotent() {
        let root = tempfile::tempdir().unwrap();
        let dir = root.path().join("raw16");
        create_dir_all(&dir).unwrap();
        write(dir.join("a.raw"), b"..").unwrap();

        remove_intermediate_dir(&dir).unwrap();
        assert!(!dir.exists());
        remove_intermediate_dir(&dir).unwrap();
    }
}
