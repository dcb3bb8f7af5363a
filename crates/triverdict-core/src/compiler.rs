//! External compiler adapters for gc and gccgo.

use std::path::Path;

use crate::adapter::{INPUT_PLACEHOLDER, InputDelivery, ToolCommand, Validator};
use crate::error::AdapterError;
use crate::patterns;
use crate::verdict::{Arm, Verdict};

/// gc is run as `compile <file>`.
pub const GC_ARGS: &[&str] = &[INPUT_PLACEHOLDER];

/// gccgo's frontend reads the program from stdin and discards the object.
pub const GCCGO_ARGS: &[&str] = &[
    "-",
    "-o",
    "/dev/null",
    "-quiet",
    "-mtune=generic",
    "-march=x86-64",
    "-O3",
];

/// Runs one compiler binary and reduces its exit status and output to a
/// [`Verdict`].
#[derive(Debug, Clone)]
pub struct CompilerAdapter {
    arm: Arm,
    command: ToolCommand,
}

impl CompilerAdapter {
    #[must_use]
    pub fn new(arm: Arm, command: ToolCommand) -> Self {
        Self { arm, command }
    }

    #[must_use]
    pub fn gc(program: &str, workdir: &Path) -> Self {
        Self::new(
            Arm::Gc,
            ToolCommand::new(program, InputDelivery::File)
                .args(GC_ARGS.iter().copied())
                .scratch_prefix("fuzz.gc")
                .workdir(workdir),
        )
    }

    #[must_use]
    pub fn gccgo(program: &str, workdir: &Path) -> Self {
        Self::new(
            Arm::Gccgo,
            ToolCommand::new(program, InputDelivery::Stdin)
                .args(GCCGO_ARGS.iter().copied())
                .scratch_prefix("fuzz.gccgo")
                .workdir(workdir),
        )
    }

    #[must_use]
    pub fn command(&self) -> &ToolCommand {
        &self.command
    }
}

impl Validator for CompilerAdapter {
    fn arm(&self) -> Arm {
        self.arm
    }

    fn validate(&self, input: &[u8]) -> Result<Verdict, AdapterError> {
        let run = self.command.run(input)?;
        if run.success() {
            return Ok(Verdict::valid());
        }
        let message = run.describe();
        Ok(match patterns::crash_signature(&run.output) {
            Some(_) => Verdict::crashed(message, run.output),
            None => Verdict::invalid(message),
        })
    }
}

#[cfg(all(test, unix))]
mod tests {
    use super::*;
    use crate::verdict::Outcome;

    fn scripted(arm: Arm, script: &str) -> CompilerAdapter {
        CompilerAdapter::new(
            arm,
            ToolCommand::new("sh", InputDelivery::Stdin).args(["-c", script]),
        )
    }

    #[test]
    fn zero_exit_is_valid() {
        let verdict = scripted(Arm::Gccgo, "cat >/dev/null").validate(b"package p").expect("run");
        assert_eq!(verdict, Verdict::valid());
    }

    #[test]
    fn nonzero_exit_is_invalid_with_output_and_status() {
        let verdict = scripted(Arm::Gccgo, "echo '<stdin>:1:1: error: expected package' >&2; exit 1")
            .validate(b"garbage")
            .expect("run");
        assert_eq!(verdict.outcome, Outcome::Invalid);
        assert!(verdict.message.contains("error: expected package"));
        assert!(verdict.message.ends_with("exit status: 1"));
    }

    #[test]
    fn ice_output_is_crashed() {
        let verdict = scripted(
            Arm::Gccgo,
            "printf 'x.go: In function main:\\ngo1: internal compiler error: in methods, at go/gofrontend/types.cc:1\\n' >&2; exit 4",
        )
        .validate(b"package main")
        .expect("run");
        assert_eq!(verdict.outcome, Outcome::Crashed);
        assert!(String::from_utf8_lossy(&verdict.output).contains("in methods"));
    }

    #[test]
    fn gc_reads_scratch_file() {
        let dir = tempfile::tempdir().expect("tempdir");
        let mut adapter = CompilerAdapter::gc("sh", dir.path());
        adapter.command = adapter
            .command
            .clone()
            .args(["-c", "grep -q '^package' \"$1\"", "sh", INPUT_PLACEHOLDER]);
        assert!(adapter.validate(b"package p\n").expect("run").is_valid());
        assert!(!adapter.validate(b"func f()\n").expect("run").is_valid());
    }

    #[test]
    fn gccgo_uses_fixed_arguments() {
        let adapter = CompilerAdapter::gccgo("go1", Path::new("/tmp"));
        assert_eq!(adapter.arm(), Arm::Gccgo);
        assert_eq!(adapter.command().args, GCCGO_ARGS);
        assert_eq!(adapter.command().delivery, InputDelivery::Stdin);
    }
}
