//! Verdicts produced by each implementation and by the oracle as a whole.

use std::fmt;

use serde::Serialize;

/// One of the three implementations under comparison.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Arm {
    /// Library front end: parse, type-check, lower to SSA.
    Reference,
    /// `gc` compiler binary.
    Gc,
    /// `gccgo` frontend binary.
    Gccgo,
}

impl Arm {
    pub const ALL: [Arm; 3] = [Arm::Reference, Arm::Gc, Arm::Gccgo];

    #[must_use]
    pub const fn name(self) -> &'static str {
        match self {
            Arm::Reference => "go/types",
            Arm::Gc => "gc",
            Arm::Gccgo => "gccgo",
        }
    }
}

impl fmt::Display for Arm {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Outcome {
    Valid,
    Invalid,
    Crashed,
}

/// Normalized result of one implementation validating one input.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Verdict {
    pub outcome: Outcome,
    /// Diagnostic text; empty for `Valid`.
    pub message: String,
    /// Raw output blob (combined stdout/stderr, or the adapter's fault context)
    /// used for crash-signature matching. Empty unless `Crashed`.
    #[serde(skip_serializing_if = "Vec::is_empty", serialize_with = "lossy")]
    pub output: Vec<u8>,
}

impl Verdict {
    #[must_use]
    pub fn valid() -> Self {
        Self {
            outcome: Outcome::Valid,
            message: String::new(),
            output: Vec::new(),
        }
    }

    #[must_use]
    pub fn invalid(message: impl Into<String>) -> Self {
        Self {
            outcome: Outcome::Invalid,
            message: message.into(),
            output: Vec::new(),
        }
    }

    #[must_use]
    pub fn crashed(message: impl Into<String>, output: impl Into<Vec<u8>>) -> Self {
        Self {
            outcome: Outcome::Crashed,
            message: message.into(),
            output: output.into(),
        }
    }

    #[must_use]
    pub fn is_valid(&self) -> bool {
        self.outcome == Outcome::Valid
    }

    #[must_use]
    pub fn is_crashed(&self) -> bool {
        self.outcome == Outcome::Crashed
    }

    /// Message for rejection/crash verdicts, `None` when valid.
    #[must_use]
    pub fn error(&self) -> Option<&str> {
        (!self.is_valid()).then_some(self.message.as_str())
    }

    /// Bytes a crash signature is matched against.
    #[must_use]
    pub fn crash_blob(&self) -> &[u8] {
        if self.output.is_empty() {
            self.message.as_bytes()
        } else {
            &self.output
        }
    }
}

impl fmt::Display for Verdict {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.outcome {
            Outcome::Valid => f.write_str("<nil>"),
            Outcome::Invalid => f.write_str(&self.message),
            Outcome::Crashed => write!(f, "CRASHED: {}", self.message),
        }
    }
}

fn lossy<S: serde::Serializer>(bytes: &[u8], serializer: S) -> Result<S::Ok, S::Error> {
    serializer.serialize_str(&String::from_utf8_lossy(bytes))
}

/// The three verdicts for a single input. `gc` is `None` when that arm is
/// disabled.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Verdicts {
    pub reference: Verdict,
    pub gc: Option<Verdict>,
    pub gccgo: Verdict,
}

impl Verdicts {
    #[must_use]
    pub fn get(&self, arm: Arm) -> Option<&Verdict> {
        match arm {
            Arm::Reference => Some(&self.reference),
            Arm::Gc => self.gc.as_ref(),
            Arm::Gccgo => Some(&self.gccgo),
        }
    }

    /// Verdicts of the enabled arms, in arm order.
    pub fn present(&self) -> impl Iterator<Item = (Arm, &Verdict)> {
        Arm::ALL
            .into_iter()
            .filter_map(|arm| self.get(arm).map(|verdict| (arm, verdict)))
    }

    /// Whether every enabled arm reached the same valid/invalid conclusion.
    #[must_use]
    pub fn agree(&self) -> bool {
        let ok = self.reference.is_valid();
        self.present().all(|(_, verdict)| verdict.is_valid() == ok)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum FindingKind {
    Crash,
    Disagreement,
    FormatterDefect,
}

/// Evidence attached to a `Fatal` verdict, complete enough for a triager to
/// write a narrowly scoped suppression rule.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Finding {
    pub kind: FindingKind,
    /// Rule that escalated, or the reformat stage that failed.
    pub rule: &'static str,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub arm: Option<Arm>,
    pub summary: String,
    pub verdicts: Verdicts,
    /// Extra context (formatter error, formatted source) for reformat defects.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub detail: Option<String>,
}

impl Finding {
    /// Multi-line triage report.
    #[must_use]
    pub fn render(&self) -> String {
        let mut out = format!("{} [{}]\n", self.summary, self.rule);
        for arm in Arm::ALL {
            match self.verdicts.get(arm) {
                Some(verdict) => {
                    out.push_str(&format!("{arm} result: {verdict}\n"));
                    if verdict.is_crashed() && !verdict.output.is_empty() {
                        out.push_str(&String::from_utf8_lossy(&verdict.output));
                        out.push('\n');
                    }
                }
                None => out.push_str(&format!("{arm} result: <disabled>\n")),
            }
        }
        if let Some(detail) = &self.detail {
            out.push_str(detail);
            out.push('\n');
        }
        out
    }
}

/// Final decision for one candidate input.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "verdict", rename_all = "lowercase")]
pub enum OracleVerdict {
    /// All implementations accept and the reformat check held.
    Pass,
    /// Uninteresting: pre-filtered, suppressed by a rule, or rejected by all.
    Skip { reason: SkipReason },
    /// Infrastructure failure; record, keep fuzzing.
    Fail { reason: String },
    /// Unexplained crash, disagreement or formatter defect.
    Fatal { finding: Box<Finding> },
}

impl OracleVerdict {
    #[must_use]
    pub fn is_fatal(&self) -> bool {
        matches!(self, OracleVerdict::Fatal { .. })
    }

    #[must_use]
    pub const fn label(&self) -> &'static str {
        match self {
            OracleVerdict::Pass => "pass",
            OracleVerdict::Skip { .. } => "skip",
            OracleVerdict::Fail { .. } => "fail",
            OracleVerdict::Fatal { .. } => "fatal",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", content = "name", rename_all = "snake_case")]
pub enum SkipReason {
    PreFiltered(&'static str),
    Suppressed(&'static str),
    AllInvalid,
}
