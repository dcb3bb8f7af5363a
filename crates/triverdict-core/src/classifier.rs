//! Divergence classifier: first-match-wins evaluation of the rule table,
//! followed by the all-invalid / all-valid tail.

use crate::rules::{Disposition, RULES, Rule};
use crate::verdict::{Arm, Finding, FindingKind, Verdicts};

/// Result of classifying one input's verdicts.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Classification<'r> {
    /// A rule explained the divergence or crash.
    Suppressed(&'r Rule),
    /// A rule escalated; the oracle must report `Fatal`.
    Escalated(&'r Rule, Box<Finding>),
    /// Every enabled arm rejected the input.
    AllInvalid,
    /// Every enabled arm accepted the input; the reformat check decides.
    AllValid,
}

/// Classify against the process-wide [`RULES`].
#[must_use]
pub fn classify(input: &[u8], verdicts: &Verdicts) -> Classification<'static> {
    classify_with(RULES, input, verdicts)
}

/// Classify against an explicit table.
#[must_use]
pub fn classify_with<'r>(rules: &'r [Rule], input: &[u8], verdicts: &Verdicts) -> Classification<'r> {
    if let Some(rule) = rules.iter().find(|rule| rule.matches(input, verdicts)) {
        return match rule.disposition {
            Disposition::Suppress => Classification::Suppressed(rule),
            Disposition::CrashEscalate(arm) => Classification::Escalated(
                rule,
                Box::new(Finding {
                    kind: FindingKind::Crash,
                    rule: rule.name,
                    arm: Some(arm),
                    summary: crash_summary(arm),
                    verdicts: verdicts.clone(),
                    detail: None,
                }),
            ),
            Disposition::DisagreementEscalate => Classification::Escalated(
                rule,
                Box::new(Finding {
                    kind: FindingKind::Disagreement,
                    rule: rule.name,
                    arm: None,
                    summary: disagreement_summary(verdicts),
                    verdicts: verdicts.clone(),
                    detail: None,
                }),
            ),
        };
    }

    // A table without its safety net must still never let a divergence pass.
    if !verdicts.agree() {
        return Classification::Escalated(
            rules.last().unwrap_or(&SAFETY_NET),
            Box::new(Finding {
                kind: FindingKind::Disagreement,
                rule: SAFETY_NET.name,
                arm: None,
                summary: disagreement_summary(verdicts),
                verdicts: verdicts.clone(),
                detail: None,
            }),
        );
    }
    if verdicts.reference.is_valid() {
        Classification::AllValid
    } else {
        Classification::AllInvalid
    }
}

static SAFETY_NET: Rule = Rule {
    name: "disagreement",
    tracker: &[],
    shape: crate::rules::Shape::Disagreement,
    message: &[],
    input: &[],
    disposition: Disposition::DisagreementEscalate,
};

fn crash_summary(arm: Arm) -> String {
    match arm {
        Arm::Reference => String::from("go/types crashed"),
        Arm::Gc | Arm::Gccgo => format!("{arm} compiler crashed"),
    }
}

fn disagreement_summary(verdicts: &Verdicts) -> String {
    let names: Vec<&str> = verdicts.present().map(|(arm, _)| arm.name()).collect();
    format!("{} disagree", names.join(", "))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::verdict::Verdict;

    fn three(reference: Verdict, gc: Verdict, gccgo: Verdict) -> Verdicts {
        Verdicts {
            reference,
            gc: Some(gc),
            gccgo,
        }
    }

    fn suppressed_by(c: &Classification<'_>) -> Option<&'static str> {
        match c {
            Classification::Suppressed(rule) => Some(rule.name),
            _ => None,
        }
    }

    #[test]
    fn all_invalid_and_all_valid() {
        let invalid = three(Verdict::invalid("a"), Verdict::invalid("b"), Verdict::invalid("c"));
        assert_eq!(classify(b"x", &invalid), Classification::AllInvalid);
        let valid = three(Verdict::valid(), Verdict::valid(), Verdict::valid());
        assert_eq!(classify(b"package p", &valid), Classification::AllValid);
    }

    #[test]
    fn unexplained_divergence_escalates() {
        let v = three(Verdict::valid(), Verdict::valid(), Verdict::invalid("1:1: error: something new"));
        match classify(b"package p", &v) {
            Classification::Escalated(rule, finding) => {
                assert_eq!(rule.name, "disagreement");
                assert_eq!(finding.kind, FindingKind::Disagreement);
                assert_eq!(finding.summary, "go/types, gc, gccgo disagree");
                assert_eq!(finding.verdicts, v);
            }
            other => panic!("expected escalation, got {other:?}"),
        }
    }

    #[test]
    fn known_divergence_is_suppressed() {
        let v = three(
            Verdict::valid(),
            Verdict::valid(),
            Verdict::invalid("<stdin>:3:9: error: integer constant overflow\nexit status: 1"),
        );
        assert_eq!(
            suppressed_by(&classify(b"package p", &v)),
            Some("gccgo-integer-constant-overflow")
        );
    }

    #[test]
    fn first_match_wins_over_later_rules() {
        // Matches both the octal-imaginary input guard and the
        // incompatible-types message rule; the earlier one must decide.
        let v = three(
            Verdict::valid(),
            Verdict::valid(),
            Verdict::invalid("error: incompatible types in binary expression"),
        );
        let input = b"package p\nvar x = 0i + 08i";
        assert_eq!(
            suppressed_by(&classify(input, &v)),
            Some("gccgo-octal-imaginary-literal")
        );
    }

    #[test]
    fn crash_is_checked_before_divergence() {
        // gccgo rejection text matches a divergence suppression, but the
        // output is an unknown ICE: the crash decides.
        let v = three(
            Verdict::valid(),
            Verdict::valid(),
            Verdict::crashed(
                "exit status: 1",
                b"x.go:1\ngo1: internal compiler error: in brand_new_function\nerror: integer constant overflow"
                    .to_vec(),
            ),
        );
        match classify(b"package p", &v) {
            Classification::Escalated(rule, finding) => {
                assert_eq!(rule.name, "gccgo-crash");
                assert_eq!(finding.arm, Some(Arm::Gccgo));
                assert_eq!(finding.summary, "gccgo compiler crashed");
            }
            other => panic!("expected crash escalation, got {other:?}"),
        }
    }

    #[test]
    fn known_crash_is_suppressed() {
        let v = three(
            Verdict::valid(),
            Verdict::crashed(
                "exit status: 2",
                b"/tmp/fuzz.gcX/prog.go:7: internal compiler error: out of fixed registers\n".to_vec(),
            ),
            Verdict::valid(),
        );
        assert_eq!(
            suppressed_by(&classify(b"package p", &v)),
            Some("gc-ice-out-of-fixed-registers")
        );
    }

    #[test]
    fn reference_crash_always_escalates() {
        let v = three(
            Verdict::crashed("lower stage faulted: out of fixed registers", Vec::new()),
            Verdict::valid(),
            Verdict::valid(),
        );
        assert!(matches!(
            classify(b"package p", &v),
            Classification::Escalated(rule, _) if rule.name == "go-types-fault"
        ));
    }

    #[test]
    fn table_without_safety_net_still_escalates() {
        let v = three(Verdict::valid(), Verdict::invalid("x"), Verdict::valid());
        assert!(matches!(
            classify_with(&[], b"", &v),
            Classification::Escalated(rule, _) if rule.name == "disagreement"
        ));
    }

    #[test]
    fn two_way_comparison_ignores_gc() {
        let v = Verdicts {
            reference: Verdict::valid(),
            gc: None,
            gccgo: Verdict::valid(),
        };
        assert_eq!(classify(b"package p", &v), Classification::AllValid);
        let v = Verdicts {
            reference: Verdict::valid(),
            gc: None,
            gccgo: Verdict::invalid("error: new"),
        };
        match classify(b"package p", &v) {
            Classification::Escalated(_, finding) => {
                assert_eq!(finding.summary, "go/types, gccgo disagree");
            }
            other => panic!("expected escalation, got {other:?}"),
        }
    }

    #[test]
    fn classification_is_deterministic() {
        let v = three(
            Verdict::invalid("src.go:1:1: redeclared in this block"),
            Verdict::invalid("x"),
            Verdict::valid(),
        );
        let first = classify(b"package p", &v);
        for _ in 0..16 {
            assert_eq!(classify(b"package p", &v), first);
        }
    }
}
