//! Typed invocation of the external collaborators
//! (`dji_irp` and `exiftool`).
//!
//! Tools are described by an [`ExternalTool`] and executed
//! through a [`ToolRunner`]. Arguments are always passed as
//! separate values, never through a shell, so paths with
//! spaces or quotes need no escaping.

use std::{
    ffi::{OsStr, OsString},
    io,
    path::{Path, PathBuf},
    process::Command,
};

/// An executable plus the arguments that precede every
/// invocation (e.g. the script path when the tool runs
/// under an interpreter).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExternalTool {
    pub program: PathBuf,
    pub leading_args: Vec<OsString>,
}

impl ExternalTool {
    pub fn new<P: Into<PathBuf>>(program: P) -> Self {
        ExternalTool {
            program: program.into(),
            leading_args: vec![],
        }
    }

    pub fn with_leading_arg<S: AsRef<OsStr>>(mut self, arg: S) -> Self {
        self.leading_args.push(arg.as_ref().to_owned());
        self
    }

    /// The DJI Thermal SDK `dji_irp` utility.
    ///
    /// `sdk_dir` is the root of the unpacked SDK; without it
    /// `dji_irp` is looked up in `PATH`.
    pub fn dji_irp(sdk_dir: Option<&Path>) -> Self {
        match sdk_dir {
            Some(dir) if cfg!(windows) => {
                Self::new(dir.join("utility/bin/windows/release_x64/dji_irp.exe"))
            }
            Some(dir) => Self::new(dir.join("utility/bin/linux/release_x64/dji_irp")),
            None => Self::new("dji_irp"),
        }
    }

    /// ExifTool, either the standalone windows executable or
    /// the perl script elsewhere.
    ///
    /// `tool_dir` is the directory holding it; without it
    /// `exiftool` is looked up in `PATH`.
    pub fn exiftool(tool_dir: Option<&Path>) -> Self {
        match tool_dir {
            Some(dir) if cfg!(windows) => Self::new(dir.join("exiftool.exe")),
            Some(dir) => Self::new("perl").with_leading_arg(dir.join("exiftool")),
            None => Self::new("exiftool"),
        }
    }

    /// Human readable rendering, for logs only.
    pub fn display(&self) -> String {
        let mut out = self.program.display().to_string();
        for arg in &self.leading_args {
            out.push(' ');
            out.push_str(&arg.to_string_lossy());
        }
        out
    }
}

/// Result of a finished tool invocation.
#[derive(Debug, Clone, Default)]
pub struct ToolOutput {
    /// Exit code; `None` if the process was killed by a
    /// signal.
    pub code: Option<i32>,
    pub stdout: Vec<u8>,
    pub stderr: Vec<u8>,
}

impl ToolOutput {
    pub fn success(&self) -> bool {
        self.code == Some(0)
    }

    /// Short description of a failed run for error messages.
    pub fn failure_reason(&self) -> String {
        let status = match self.code {
            Some(code) => format!("exited with status {}", code),
            None => "terminated by signal".to_string(),
        };
        let stderr = String::from_utf8_lossy(&self.stderr);
        let stderr = stderr.trim();
        if stderr.is_empty() {
            status
        } else {
            format!("{}: {}", status, stderr)
        }
    }
}

/// Executes an [`ExternalTool`] to completion.
///
/// `Err` is reserved for failures to launch the tool; a
/// tool that runs and fails reports it through
/// [`ToolOutput::code`].
pub trait ToolRunner: Sync {
    fn run(&self, tool: &ExternalTool, args: &[OsString]) -> io::Result<ToolOutput>;
}

/// Runs tools as child processes, blocking until they exit.
#[derive(Debug, Clone, Copy, Default)]
pub struct ProcessRunner;

impl ToolRunner for ProcessRunner {
    fn run(&self, tool: &ExternalTool, args: &[OsString]) -> io::Result<ToolOutput> {
        let output = Command::new(&tool.program)
            .args(&tool.leading_args)
            .args(args)
            .output()?;
        Ok(ToolOutput {
            code: output.status.code(),
            stdout: output.stdout,
            stderr: output.stderr,
        })
    }
}

impl<T: ToolRunner + ?Sized> ToolRunner for &T {
    fn run(&self, tool: &ExternalTool, args: &[OsString]) -> io::Result<ToolOutput> {
        (**self).run(tool, args)
    }
}
