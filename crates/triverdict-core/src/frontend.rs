//! Reference front-end adapter.
//!
//! Drives parse → type-check → SSA construction → full materialization and
//! reduces the result to a single [`Verdict`]. The pipeline itself is an
//! external collaborator behind the [`FrontEnd`] trait.

use std::any::Any;
use std::backtrace::Backtrace;
use std::io;
use std::panic::{self, AssertUnwindSafe};

use crate::adapter::{INPUT_PLACEHOLDER, InputDelivery, ToolCommand, Validator};
use crate::error::{AdapterError, StageError};
use crate::patterns;
use crate::verdict::{Arm, Verdict};

/// Parser error-collection strategy.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ParseMode {
    pub comments: bool,
    pub declaration_errors: bool,
    pub all_errors: bool,
}

impl Default for ParseMode {
    fn default() -> Self {
        Self {
            comments: true,
            declaration_errors: true,
            all_errors: true,
        }
    }
}

/// Size and alignment model for the type checker.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Sizes {
    pub word_size: u8,
    pub max_align: u8,
}

impl Sizes {
    /// `GOARCH` whose gc size model has this word size and alignment.
    #[must_use]
    pub const fn goarch(self) -> Option<&'static str> {
        match (self.word_size, self.max_align) {
            (4, 4) => Some("386"),
            (4, 8) => Some("amd64p32"),
            (8, 8) => Some("amd64"),
            _ => None,
        }
    }
}

impl Default for Sizes {
    fn default() -> Self {
        Self {
            word_size: 4,
            max_align: 8,
        }
    }
}

/// SSA builder strictness.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LowerMode {
    pub serial: bool,
    pub sanity_check: bool,
    pub debug_info: bool,
}

impl Default for LowerMode {
    fn default() -> Self {
        Self {
            serial: true,
            sanity_check: true,
            debug_info: true,
        }
    }
}

/// Pipeline stage, reported in crash context.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stage {
    Parse,
    Check,
    Lower,
}

impl Stage {
    #[must_use]
    pub const fn name(self) -> &'static str {
        match self {
            Stage::Parse => "parse",
            Stage::Check => "check",
            Stage::Lower => "lower",
        }
    }
}

/// The library pipeline being validated.
pub trait FrontEnd: Send + Sync {
    type Syntax;
    type Package;

    fn parse(&self, source: &[u8], mode: ParseMode) -> Result<Self::Syntax, StageError>;

    /// Type-check. Diagnostics are all collected; the first one is the error.
    fn check(&self, syntax: &Self::Syntax, sizes: Sizes) -> Result<Self::Package, StageError>;

    /// Build and fully materialize the IR for every package into `sink`.
    fn lower(
        &self,
        package: &Self::Package,
        mode: LowerMode,
        sink: &mut dyn io::Write,
    ) -> Result<(), StageError>;
}

/// Adapter from a [`FrontEnd`] to a [`Validator`].
#[derive(Debug, Clone)]
pub struct ReferenceAdapter<F> {
    front_end: F,
    pub parse_mode: ParseMode,
    pub sizes: Sizes,
    pub lower_mode: LowerMode,
}

impl<F: FrontEnd> ReferenceAdapter<F> {
    #[must_use]
    pub fn new(front_end: F) -> Self {
        Self {
            front_end,
            parse_mode: ParseMode::default(),
            sizes: Sizes::default(),
            lower_mode: LowerMode::default(),
        }
    }

    /// Run the pipeline; panics inside a stage become `Crashed`.
    pub fn run(&self, input: &[u8]) -> Result<Verdict, AdapterError> {
        let syntax = match self.stage(Stage::Parse, || {
            self.front_end.parse(input, self.parse_mode)
        })? {
            Ok(syntax) => syntax,
            Err(verdict) => return Ok(verdict),
        };
        let package = match self.stage(Stage::Check, || {
            self.front_end.check(&syntax, self.sizes)
        })? {
            Ok(package) => package,
            Err(verdict) => return Ok(verdict),
        };
        let lowered = self.stage(Stage::Lower, || {
            self.front_end
                .lower(&package, self.lower_mode, &mut io::sink())
        })?;
        Ok(lowered.map_or_else(|verdict| verdict, |()| Verdict::valid()))
    }

    fn stage<T>(
        &self,
        stage: Stage,
        body: impl FnOnce() -> Result<T, StageError>,
    ) -> Result<Result<T, Verdict>, AdapterError> {
        Ok(match panic::catch_unwind(AssertUnwindSafe(body)) {
            Ok(Ok(value)) => Ok(value),
            Ok(Err(StageError::Rejected(message))) => Err(Verdict::invalid(message)),
            Ok(Err(StageError::Fault(message))) => Err(fault(stage, &message)),
            Ok(Err(StageError::Unavailable(message))) => {
                return Err(AdapterError::Unavailable {
                    stage: stage.name(),
                    message,
                });
            }
            Err(payload) => Err(fault(stage, &panic_message(payload.as_ref()))),
        })
    }
}

impl<F: FrontEnd> Validator for ReferenceAdapter<F> {
    fn arm(&self) -> Arm {
        Arm::Reference
    }

    fn validate(&self, input: &[u8]) -> Result<Verdict, AdapterError> {
        self.run(input)
    }
}

fn fault(stage: Stage, message: &str) -> Verdict {
    let context = format!(
        "{} stage faulted: {message}\n{}",
        stage.name(),
        Backtrace::force_capture()
    );
    Verdict::crashed(format!("{} stage faulted: {message}", stage.name()), context)
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        String::from("non-string panic payload")
    }
}

/// Placeholder argument replaced by the stage's mode flags, possibly none.
pub const MODE_PLACEHOLDER: &str = "{mode}";

/// [`FrontEnd`] backed by standalone tools: a syntax checker, a type checker
/// and an SSA dumper, each reporting diagnostics on its combined output.
///
/// A tool exiting non-zero rejects the program, unless it was killed by a
/// signal or its output carries a Go panic dump: both are faults.
///
/// Modes reach the tools as flags substituted for [`MODE_PLACEHOLDER`];
/// sizes reach the check and lower tools as `GOARCH`. The tools always keep
/// comments and always report declaration errors, so a [`ParseMode`] turning
/// either off cannot be honored and makes the stage unavailable.
#[derive(Debug, Clone)]
pub struct ToolFrontEnd {
    pub parse: ToolCommand,
    pub check: ToolCommand,
    pub lower: ToolCommand,
}

impl ToolFrontEnd {
    /// `gofmt` for parsing, `gotype -e` for checking and `ssadump` for
    /// lowering.
    #[must_use]
    pub fn go_tools(gofmt: &str, gotype: &str, ssadump: &str) -> Self {
        Self {
            parse: ToolCommand::new(gofmt, InputDelivery::File)
                .args(["-l", MODE_PLACEHOLDER, INPUT_PLACEHOLDER])
                .scratch_prefix("fuzz.parse"),
            check: ToolCommand::new(gotype, InputDelivery::File)
                .args(["-e", INPUT_PLACEHOLDER])
                .scratch_prefix("fuzz.check"),
            lower: ToolCommand::new(ssadump, InputDelivery::File)
                .args([MODE_PLACEHOLDER, INPUT_PLACEHOLDER])
                .scratch_prefix("fuzz.ssa"),
        }
    }

    /// Run every stage tool from `dir`.
    #[must_use]
    pub fn workdir(mut self, dir: &std::path::Path) -> Self {
        self.parse = self.parse.workdir(dir);
        self.check = self.check.workdir(dir);
        self.lower = self.lower.workdir(dir);
        self
    }

    /// Parse invocation for `mode`: `-e` when all errors are wanted.
    pub fn parse_command(&self, mode: ParseMode) -> Result<ToolCommand, StageError> {
        if !mode.comments || !mode.declaration_errors {
            return Err(StageError::Unavailable(format!(
                "{} cannot run with {mode:?}",
                self.parse.program
            )));
        }
        let flags: &[&str] = if mode.all_errors { &["-e"] } else { &[] };
        Ok(with_mode_flags(&self.parse, flags))
    }

    /// Check invocation using the size model of the `GOARCH` matching `sizes`.
    pub fn check_command(&self, sizes: Sizes) -> Result<ToolCommand, StageError> {
        let goarch = goarch_for(sizes)?;
        Ok(with_mode_flags(&self.check, &[]).env("GOARCH", goarch))
    }

    /// Lower invocation: `-build=` letters from `mode`, plus the unit's `GOARCH`.
    #[must_use]
    pub fn lower_command(&self, mode: LowerMode, goarch: &str) -> ToolCommand {
        let letters: String = [
            (mode.sanity_check, 'C'),
            (mode.debug_info, 'D'),
            (mode.serial, 'L'),
        ]
        .into_iter()
        .filter_map(|(on, letter)| on.then_some(letter))
        .collect();
        let build = format!("-build={letters}");
        let flags: Vec<&str> = if letters.is_empty() {
            Vec::new()
        } else {
            vec![build.as_str()]
        };
        with_mode_flags(&self.lower, &flags).env("GOARCH", goarch)
    }

    fn invoke(tool: &ToolCommand, source: &[u8]) -> Result<Vec<u8>, StageError> {
        let run = tool
            .run(source)
            .map_err(|err| StageError::Unavailable(err.to_string()))?;
        if run.success() {
            return Ok(run.output);
        }
        if run.status.code().is_none() || patterns::tool_fault(&run.output).is_some() {
            return Err(StageError::Fault(run.describe()));
        }
        let text = String::from_utf8_lossy(&run.output);
        Err(StageError::Rejected(first_diagnostic(&text)))
    }
}

fn with_mode_flags(tool: &ToolCommand, flags: &[&str]) -> ToolCommand {
    let mut command = tool.clone();
    command.args = tool
        .args
        .iter()
        .flat_map(|arg| {
            if arg == MODE_PLACEHOLDER {
                flags.iter().map(|flag| (*flag).to_string()).collect::<Vec<_>>()
            } else {
                vec![arg.clone()]
            }
        })
        .collect();
    command
}

fn goarch_for(sizes: Sizes) -> Result<&'static str, StageError> {
    sizes.goarch().ok_or_else(|| {
        StageError::Unavailable(format!(
            "no GOARCH has word size {} and max align {}",
            sizes.word_size, sizes.max_align
        ))
    })
}

/// Parsed unit handed from parse to check: the source itself.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ToolUnit(pub Vec<u8>);

/// Checked unit: the source and the `GOARCH` it was checked under.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CheckedUnit {
    pub source: Vec<u8>,
    pub goarch: &'static str,
}

impl FrontEnd for ToolFrontEnd {
    type Syntax = ToolUnit;
    type Package = CheckedUnit;

    fn parse(&self, source: &[u8], mode: ParseMode) -> Result<ToolUnit, StageError> {
        Self::invoke(&self.parse_command(mode)?, source)?;
        Ok(ToolUnit(source.to_vec()))
    }

    fn check(&self, syntax: &ToolUnit, sizes: Sizes) -> Result<CheckedUnit, StageError> {
        Self::invoke(&self.check_command(sizes)?, &syntax.0)?;
        Ok(CheckedUnit {
            source: syntax.0.clone(),
            goarch: goarch_for(sizes)?,
        })
    }

    fn lower(
        &self,
        package: &CheckedUnit,
        mode: LowerMode,
        sink: &mut dyn io::Write,
    ) -> Result<(), StageError> {
        let dump = Self::invoke(&self.lower_command(mode, package.goarch), &package.source)?;
        sink.write_all(&dump)
            .map_err(|err| StageError::Fault(err.to_string()))
    }
}

fn first_diagnostic(text: &str) -> String {
    text.lines()
        .map(str::trim)
        .find(|line| !line.is_empty())
        .unwrap_or("rejected without diagnostics")
        .to_string()
}
