//! Oracle entry point: one candidate input in, one [`OracleVerdict`] out.

use std::thread::{self, ScopedJoinHandle};

use crate::adapter::Validator;
use crate::classifier::{Classification, classify_with};
use crate::compiler::CompilerAdapter;
use crate::config::{Execution, OracleConfig};
use crate::error::AdapterError;
use crate::frontend::{ReferenceAdapter, ToolFrontEnd};
use crate::patterns;
use crate::reformat::{self, SourceFormatter, ToolFormatter};
use crate::rules::{RULES, Rule};
use crate::verdict::{Arm, OracleVerdict, SkipReason, Verdict, Verdicts};

/// Everything `evaluate` decided about one input, for callers that record
/// more than the final verdict.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Evaluation {
    pub verdict: OracleVerdict,
    /// Absent when the input was pre-filtered or an adapter failed.
    pub verdicts: Option<Verdicts>,
}

impl Evaluation {
    /// Name of the rule, pre-filter or reformat stage that decided, if any.
    #[must_use]
    pub fn rule(&self) -> Option<&'static str> {
        match &self.verdict {
            OracleVerdict::Skip {
                reason: SkipReason::PreFiltered(name) | SkipReason::Suppressed(name),
            } => Some(*name),
            OracleVerdict::Fatal { finding } => Some(finding.rule),
            _ => None,
        }
    }
}

pub struct Oracle {
    reference: Box<dyn Validator>,
    gc: Option<Box<dyn Validator>>,
    gccgo: Box<dyn Validator>,
    formatter: Box<dyn SourceFormatter>,
    rules: &'static [Rule],
    verify_reformat: bool,
    execution: Execution,
}

impl std::fmt::Debug for Oracle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Oracle")
            .field("gc", &self.gc.is_some())
            .field("rules", &self.rules.len())
            .field("verify_reformat", &self.verify_reformat)
            .field("execution", &self.execution)
            .finish_non_exhaustive()
    }
}

impl Oracle {
    /// Two-way oracle over explicit adapters; add gc with [`Oracle::with_gc`].
    #[must_use]
    pub fn new(
        reference: Box<dyn Validator>,
        gccgo: Box<dyn Validator>,
        formatter: Box<dyn SourceFormatter>,
    ) -> Self {
        Self {
            reference,
            gc: None,
            gccgo,
            formatter,
            rules: RULES,
            verify_reformat: false,
            execution: Execution::Sequential,
        }
    }

    /// Oracle over the installed Go toolchain described by `config`.
    #[must_use]
    pub fn from_config(config: &OracleConfig) -> Self {
        let workdir = config.workdir.as_path();
        let front_end = ToolFrontEnd::go_tools(
            &config.gofmt_program,
            &config.gotype_program,
            &config.ssadump_program,
        )
        .workdir(workdir);
        let mut oracle = Self::new(
            Box::new(ReferenceAdapter::new(front_end)),
            Box::new(CompilerAdapter::gccgo(&config.gccgo_program, workdir)),
            Box::new(ToolFormatter::gofmt(&config.gofmt_program, workdir)),
        )
        .verify_reformat(config.verify_reformat)
        .execution(config.execution);
        if config.arms.runs_gc() {
            oracle = oracle.with_gc(Box::new(CompilerAdapter::gc(&config.gc_program, workdir)));
        }
        oracle
    }

    #[must_use]
    pub fn with_gc(mut self, gc: Box<dyn Validator>) -> Self {
        self.gc = Some(gc);
        self
    }

    #[must_use]
    pub fn verify_reformat(mut self, enabled: bool) -> Self {
        self.verify_reformat = enabled;
        self
    }

    #[must_use]
    pub fn execution(mut self, execution: Execution) -> Self {
        self.execution = execution;
        self
    }

    /// Replace the rule table; used to audit table changes.
    #[must_use]
    pub fn rules(mut self, rules: &'static [Rule]) -> Self {
        self.rules = rules;
        self
    }

    /// Decide one candidate input.
    #[must_use]
    pub fn evaluate(&self, input: &[u8]) -> OracleVerdict {
        self.evaluate_detailed(input).verdict
    }

    #[must_use]
    pub fn evaluate_detailed(&self, input: &[u8]) -> Evaluation {
        if let Some(pattern) = patterns::pre_filter(input) {
            return Evaluation {
                verdict: OracleVerdict::Skip {
                    reason: SkipReason::PreFiltered(pattern.name()),
                },
                verdicts: None,
            };
        }

        let verdicts = match self.run_arms(input) {
            Ok(verdicts) => verdicts,
            Err(reason) => {
                return Evaluation {
                    verdict: OracleVerdict::Fail { reason },
                    verdicts: None,
                };
            }
        };

        let verdict = match classify_with(self.rules, input, &verdicts) {
            Classification::Suppressed(rule) => OracleVerdict::Skip {
                reason: SkipReason::Suppressed(rule.name),
            },
            Classification::Escalated(_, finding) => OracleVerdict::Fatal { finding },
            Classification::AllInvalid => OracleVerdict::Skip {
                reason: SkipReason::AllInvalid,
            },
            Classification::AllValid => {
                let revalidate = self.verify_reformat.then_some(self.reference.as_ref());
                reformat::round_trip(input, &verdicts, self.formatter.as_ref(), revalidate)
            }
        };
        Evaluation {
            verdict,
            verdicts: Some(verdicts),
        }
    }

    fn run_arms(&self, input: &[u8]) -> Result<Verdicts, String> {
        match self.execution {
            Execution::Sequential => {
                let reference = checked(self.reference.as_ref(), input)?;
                let gc = self
                    .gc
                    .as_deref()
                    .map(|gc| checked(gc, input))
                    .transpose()?;
                let gccgo = checked(self.gccgo.as_ref(), input)?;
                Ok(Verdicts {
                    reference,
                    gc,
                    gccgo,
                })
            }
            // The external compilers share nothing; the reference runs once
            // both have terminated.
            Execution::ConcurrentExternals => {
                let (gc, gccgo) = thread::scope(|scope| {
                    let gc = self
                        .gc
                        .as_deref()
                        .map(|gc| scope.spawn(move || gc.validate(input)));
                    let gccgo = {
                        let gccgo = self.gccgo.as_ref();
                        scope.spawn(move || gccgo.validate(input))
                    };
                    (
                        gc.map(|handle| joined(Arm::Gc, handle)),
                        joined(Arm::Gccgo, gccgo),
                    )
                });
                let gc = gc.transpose()?;
                let gccgo = gccgo?;
                let reference = checked(self.reference.as_ref(), input)?;
                Ok(Verdicts {
                    reference,
                    gc,
                    gccgo,
                })
            }
        }
    }
}

fn checked(validator: &dyn Validator, input: &[u8]) -> Result<Verdict, String> {
    validator
        .validate(input)
        .map_err(|err| fail_reason(validator.arm(), &err))
}

fn joined(
    arm: Arm,
    handle: ScopedJoinHandle<'_, Result<Verdict, AdapterError>>,
) -> Result<Verdict, String> {
    match handle.join() {
        Ok(result) => result.map_err(|err| fail_reason(arm, &err)),
        Err(_) => Err(format!("{arm} adapter thread panicked")),
    }
}

fn fail_reason(arm: Arm, err: &AdapterError) -> String {
    format!("{arm} adapter: {err}")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::FormatError;
    use crate::verdict::FindingKind;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    struct Fixed {
        arm: Arm,
        verdict: Option<Verdict>,
        calls: Arc<AtomicUsize>,
    }

    impl Validator for Fixed {
        fn arm(&self) -> Arm {
            self.arm
        }
        fn validate(&self, _input: &[u8]) -> Result<Verdict, AdapterError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            self.verdict.clone().ok_or(AdapterError::Unavailable {
                stage: "check",
                message: String::from("gotype: not found"),
            })
        }
    }

    fn fixed(arm: Arm, verdict: Verdict) -> Box<dyn Validator> {
        Box::new(Fixed {
            arm,
            verdict: Some(verdict),
            calls: Arc::new(AtomicUsize::new(0)),
        })
    }

    struct Echo;

    impl SourceFormatter for Echo {
        fn format(&self, source: &[u8]) -> Result<Vec<u8>, FormatError> {
            Ok(source.to_vec())
        }
    }

    fn oracle(reference: Verdict, gc: Verdict, gccgo: Verdict) -> Oracle {
        Oracle::new(
            fixed(Arm::Reference, reference),
            fixed(Arm::Gccgo, gccgo),
            Box::new(Echo),
        )
        .with_gc(fixed(Arm::Gc, gc))
    }

    #[test]
    fn pre_filter_skips_without_running_adapters() {
        let calls = Arc::new(AtomicUsize::new(0));
        let o = Oracle::new(
            Box::new(Fixed {
                arm: Arm::Reference,
                verdict: Some(Verdict::valid()),
                calls: Arc::clone(&calls),
            }),
            fixed(Arm::Gccgo, Verdict::valid()),
            Box::new(Echo),
        );
        let evaluation = o.evaluate_detailed(b"package p\nconst c = 1e1000\n");
        assert_eq!(
            evaluation.verdict,
            OracleVerdict::Skip {
                reason: SkipReason::PreFiltered("big_exponent")
            }
        );
        assert_eq!(evaluation.rule(), Some("big_exponent"));
        assert_eq!(calls.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn adapter_failure_is_fail() {
        let o = Oracle::new(
            Box::new(Fixed {
                arm: Arm::Reference,
                verdict: None,
                calls: Arc::new(AtomicUsize::new(0)),
            }),
            fixed(Arm::Gccgo, Verdict::valid()),
            Box::new(Echo),
        );
        match o.evaluate(b"package p") {
            OracleVerdict::Fail { reason } => {
                assert!(reason.starts_with("go/types adapter:"));
                assert!(reason.contains("gotype: not found"));
            }
            other => panic!("expected fail, got {other:?}"),
        }
    }

    #[test]
    fn all_invalid_skips() {
        let o = oracle(
            Verdict::invalid("1:1: expected 'package'"),
            Verdict::invalid("prog.go:1: syntax error"),
            Verdict::invalid("<stdin>:1:1: error: expected package"),
        );
        assert_eq!(
            o.evaluate(&[0xde, 0xad, 0xbe, 0xef]),
            OracleVerdict::Skip {
                reason: SkipReason::AllInvalid
            }
        );
    }

    #[test]
    fn all_valid_passes_through_reformat() {
        let o = oracle(Verdict::valid(), Verdict::valid(), Verdict::valid());
        assert_eq!(o.evaluate(b"package p\n"), OracleVerdict::Pass);
    }

    #[test]
    fn unexplained_disagreement_is_fatal() {
        let o = oracle(
            Verdict::valid(),
            Verdict::invalid("prog.go:3: brand new complaint"),
            Verdict::valid(),
        );
        let evaluation = o.evaluate_detailed(b"package p\n");
        match &evaluation.verdict {
            OracleVerdict::Fatal { finding } => {
                assert_eq!(finding.kind, FindingKind::Disagreement);
                assert!(finding.render().contains("brand new complaint"));
            }
            other => panic!("expected fatal, got {other:?}"),
        }
        assert_eq!(evaluation.rule(), Some("disagreement"));
    }

    #[test]
    fn two_way_oracle_never_runs_gc() {
        let o = Oracle::new(
            fixed(Arm::Reference, Verdict::valid()),
            fixed(Arm::Gccgo, Verdict::valid()),
            Box::new(Echo),
        );
        let evaluation = o.evaluate_detailed(b"package p\n");
        assert_eq!(evaluation.verdict, OracleVerdict::Pass);
        assert_eq!(evaluation.verdicts.expect("verdicts").gc, None);
    }

    #[test]
    fn concurrent_execution_matches_sequential() {
        let cases = [
            (Verdict::valid(), Verdict::valid(), Verdict::valid()),
            (Verdict::invalid("a"), Verdict::invalid("b"), Verdict::invalid("c")),
            (
                Verdict::valid(),
                Verdict::valid(),
                Verdict::invalid("error: integer constant overflow"),
            ),
            (Verdict::valid(), Verdict::invalid("new"), Verdict::valid()),
        ];
        for (reference, gc, gccgo) in cases {
            let sequential = oracle(reference.clone(), gc.clone(), gccgo.clone());
            let concurrent =
                oracle(reference, gc, gccgo).execution(Execution::ConcurrentExternals);
            assert_eq!(
                sequential.evaluate(b"package p\n"),
                concurrent.evaluate(b"package p\n")
            );
        }
    }

    #[test]
    fn verify_reformat_revalidates_with_reference() {
        let calls = Arc::new(AtomicUsize::new(0));
        let o = Oracle::new(
            Box::new(Fixed {
                arm: Arm::Reference,
                verdict: Some(Verdict::valid()),
                calls: Arc::clone(&calls),
            }),
            fixed(Arm::Gccgo, Verdict::valid()),
            Box::new(Echo),
        )
        .verify_reformat(true);
        assert_eq!(o.evaluate(b"package p\n"), OracleVerdict::Pass);
        assert_eq!(calls.load(Ordering::SeqCst), 2);
    }

    #[test]
    fn empty_rule_table_still_escalates() {
        let o = oracle(
            Verdict::valid(),
            Verdict::valid(),
            Verdict::invalid("error: integer constant overflow"),
        )
        .rules(&[]);
        assert!(o.evaluate(b"package p\n").is_fatal());
    }
}
