//! Reformat round-trip check for inputs every arm accepted.

use crate::adapter::{InputDelivery, ToolCommand, Validator};
use crate::error::FormatError;
use crate::patterns;
use crate::verdict::{Finding, FindingKind, OracleVerdict, Verdict, Verdicts};

/// Source formatter (`gofmt`-equivalent).
pub trait SourceFormatter: Send + Sync {
    fn format(&self, source: &[u8]) -> Result<Vec<u8>, FormatError>;
}

/// Formatter run as a subprocess: source on stdin, formatted source on stdout.
#[derive(Debug, Clone)]
pub struct ToolFormatter {
    command: ToolCommand,
}

impl ToolFormatter {
    #[must_use]
    pub fn new(command: ToolCommand) -> Self {
        Self { command }
    }

    #[must_use]
    pub fn gofmt(program: &str, workdir: &std::path::Path) -> Self {
        Self::new(
            ToolCommand::new(program, InputDelivery::Stdin)
                .scratch_prefix("fuzz.gofmt")
                .workdir(workdir),
        )
    }
}

impl SourceFormatter for ToolFormatter {
    fn format(&self, source: &[u8]) -> Result<Vec<u8>, FormatError> {
        let run = self.command.run(source)?;
        if run.success() {
            Ok(run.output)
        } else {
            Err(FormatError::Rejected(run.describe()))
        }
    }
}

/// Stage name used as the finding's rule for formatter failures.
pub const FORMAT_STAGE: &str = "reformat";
/// Stage name used when the formatted program no longer validates.
pub const REVALIDATE_STAGE: &str = "reformat-revalidate";

/// Run the round-trip check. `revalidate`, when given, re-runs the reference
/// adapter over the formatted output.
pub fn round_trip(
    input: &[u8],
    verdicts: &Verdicts,
    formatter: &dyn SourceFormatter,
    revalidate: Option<&dyn Validator>,
) -> OracleVerdict {
    if patterns::reformat_exemption(input).is_some() {
        return OracleVerdict::Pass;
    }
    let source: Vec<u8> = input
        .iter()
        .map(|&b| if b == b'\r' { b' ' } else { b })
        .collect();

    let formatted = match formatter.format(&source) {
        Ok(formatted) => formatted,
        Err(err) => {
            return defect(
                FORMAT_STAGE,
                "formatter failed on a program every implementation accepted",
                verdicts,
                err.to_string(),
            );
        }
    };

    let Some(validator) = revalidate else {
        return OracleVerdict::Pass;
    };
    let verdict = match validator.validate(&formatted) {
        Ok(verdict) => verdict,
        Err(err) => {
            return OracleVerdict::Fail {
                reason: format!("re-validating formatted program: {err}"),
            };
        }
    };
    if verdict.is_valid() {
        return OracleVerdict::Pass;
    }
    defect(
        REVALIDATE_STAGE,
        "program became invalid after gofmt",
        verdicts,
        describe_revalidation(&formatted, &verdict),
    )
}

fn describe_revalidation(formatted: &[u8], verdict: &Verdict) -> String {
    format!(
        "new: {:?}\nerr: {verdict}",
        String::from_utf8_lossy(formatted)
    )
}

fn defect(stage: &'static str, summary: &str, verdicts: &Verdicts, detail: String) -> OracleVerdict {
    OracleVerdict::Fatal {
        finding: Box::new(Finding {
            kind: FindingKind::FormatterDefect,
            rule: stage,
            arm: None,
            summary: summary.to_string(),
            verdicts: verdicts.clone(),
            detail: Some(detail),
        }),
    }
}
