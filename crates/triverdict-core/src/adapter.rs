//! Common adapter seam and the scoped subprocess plumbing behind it.

use std::fs::File;
use std::io::{Read, Write};
use std::path::{Path, PathBuf};
use std::process::{Command, ExitStatus, Stdio};

use crate::error::AdapterError;
use crate::verdict::{Arm, Verdict};

/// Anything that can turn a candidate input into a [`Verdict`].
///
/// Implementations hold no per-input state and may be shared across threads.
pub trait Validator: Send + Sync {
    fn arm(&self) -> Arm;

    fn validate(&self, input: &[u8]) -> Result<Verdict, AdapterError>;
}

/// How a tool receives the candidate input.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InputDelivery {
    /// The scratch file path replaces every `{input}` argument.
    File,
    /// The scratch file is connected to the child's stdin.
    Stdin,
}

/// Placeholder substituted with the scratch input path.
pub const INPUT_PLACEHOLDER: &str = "{input}";

/// A fixed tool invocation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ToolCommand {
    pub program: String,
    pub args: Vec<String>,
    pub delivery: InputDelivery,
    /// Prefix of the scratch directory; shows up in diagnostics paths.
    pub scratch_prefix: String,
    /// File name of the candidate inside the scratch directory.
    pub input_name: String,
    pub workdir: PathBuf,
    /// Extra environment for the child, on top of the inherited one.
    pub env: Vec<(String, String)>,
}

impl ToolCommand {
    #[must_use]
    pub fn new(program: impl Into<String>, delivery: InputDelivery) -> Self {
        Self {
            program: program.into(),
            args: Vec::new(),
            delivery,
            scratch_prefix: String::from("fuzz."),
            input_name: String::from("prog.go"),
            workdir: std::env::temp_dir(),
            env: Vec::new(),
        }
    }

    #[must_use]
    pub fn args<I, S>(mut self, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.args = args.into_iter().map(Into::into).collect();
        self
    }

    #[must_use]
    pub fn scratch_prefix(mut self, prefix: impl Into<String>) -> Self {
        self.scratch_prefix = prefix.into();
        self
    }

    #[must_use]
    pub fn workdir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.workdir = dir.into();
        self
    }

    #[must_use]
    pub fn env(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.env.push((key.into(), value.into()));
        self
    }

    /// Run the tool on `input`, blocking until it exits.
    ///
    /// The input and the combined stdout/stderr live in a scratch directory that
    /// is removed when this returns, on success and on every error path.
    pub fn run(&self, input: &[u8]) -> Result<ToolRun, AdapterError> {
        let scratch = tempfile::Builder::new()
            .prefix(&self.scratch_prefix)
            .tempdir_in(&self.workdir)
            .map_err(|source| AdapterError::Scratch {
                dir: self.workdir.clone(),
                source,
            })?;
        let input_path = scratch.path().join(&self.input_name);
        write_input(&input_path, input)?;

        let log_path = scratch.path().join("output.log");
        let log = File::create(&log_path).map_err(|source| AdapterError::Scratch {
            dir: scratch.path().to_path_buf(),
            source,
        })?;
        let spawn_err = |source| AdapterError::Spawn {
            program: self.program.clone(),
            source,
        };

        let stdin = match self.delivery {
            InputDelivery::Stdin => Stdio::from(File::open(&input_path).map_err(spawn_err)?),
            InputDelivery::File => Stdio::null(),
        };
        let status = Command::new(&self.program)
            .args(self.expand_args(&input_path))
            .current_dir(&self.workdir)
            .envs(self.env.iter().map(|(key, value)| (key, value)))
            .stdin(stdin)
            .stdout(Stdio::from(log.try_clone().map_err(spawn_err)?))
            .stderr(Stdio::from(log))
            .status()
            .map_err(spawn_err)?;

        let mut output = Vec::new();
        File::open(&log_path)
            .and_then(|mut file| file.read_to_end(&mut output))
            .map_err(|source| AdapterError::Wait {
                program: self.program.clone(),
                source,
            })?;
        Ok(ToolRun { status, output })
    }

    fn expand_args(&self, input_path: &Path) -> Vec<String> {
        let path = input_path.to_string_lossy();
        self.args
            .iter()
            .map(|arg| arg.replace(INPUT_PLACEHOLDER, &path))
            .collect()
    }
}

fn write_input(path: &Path, input: &[u8]) -> Result<(), AdapterError> {
    let mut file = File::create(path).map_err(AdapterError::Write)?;
    file.write_all(input).map_err(AdapterError::Write)?;
    file.sync_all().map_err(AdapterError::Write)
}

/// Exit status plus interleaved stdout/stderr of one tool run.
#[derive(Debug, Clone)]
pub struct ToolRun {
    pub status: ExitStatus,
    pub output: Vec<u8>,
}

impl ToolRun {
    #[must_use]
    pub fn success(&self) -> bool {
        self.status.success()
    }

    /// Output followed by the exit description, e.g. `...\nexit status: 2`.
    #[must_use]
    pub fn describe(&self) -> String {
        format!("{}\n{}", String::from_utf8_lossy(&self.output), self.status)
    }
}
