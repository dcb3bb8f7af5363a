//! The classification rule table.
//!
//! Rules are evaluated strictly in table order and the first match decides.
//! The table is append-only: a newly triaged divergence gets its own narrowly
//! scoped rule placed before the escalation it intercepts. Never widen an
//! existing rule.
//!
//! Tracker numbers refer to issues on github.com/golang/go.

use serde::Serialize;

use crate::patterns::{self, Pattern};
use crate::verdict::Arm::{Gc, Gccgo, Reference};
use crate::verdict::{Arm, Outcome, Verdicts};

/// A literal substring or library pattern.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Needle {
    Text(&'static str),
    Pattern(Pattern),
}

impl Needle {
    #[must_use]
    pub fn matches(self, haystack: &[u8]) -> bool {
        match self {
            Needle::Text(text) => patterns::contains(haystack, text.as_bytes()),
            Needle::Pattern(pattern) => pattern.is_match(haystack),
        }
    }
}

/// Which verdict configuration a rule applies to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Shape {
    /// `arm` crashed, and its output carries `signature` when one is given.
    Crashed {
        arm: Arm,
        signature: Option<Pattern>,
    },
    /// `accepts` says valid, `rejects` says invalid. Message needles are
    /// tested against the rejecting arm's message.
    Accepts { accepts: Arm, rejects: Arm },
    /// `a` and `b` disagree in either direction.
    EitherWay { a: Arm, b: Arm },
    /// Enabled arms do not all reach the same valid/invalid conclusion.
    Disagreement,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", content = "arm", rename_all = "snake_case")]
pub enum Disposition {
    Suppress,
    CrashEscalate(Arm),
    DisagreementEscalate,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct Rule {
    pub name: &'static str,
    pub tracker: &'static [u32],
    pub shape: Shape,
    /// Any-of; empty leaves the message unconstrained.
    pub message: &'static [Needle],
    /// Any-of over the candidate input; empty leaves it unconstrained.
    pub input: &'static [Needle],
    pub disposition: Disposition,
}

impl Rule {
    /// Whether this rule explains the given verdicts. Rules that name a
    /// disabled arm never match.
    #[must_use]
    pub fn matches(&self, input: &[u8], verdicts: &Verdicts) -> bool {
        let message: &[u8] = match self.shape {
            Shape::Crashed { arm, signature } => {
                let Some(verdict) = verdicts.get(arm) else {
                    return false;
                };
                if !verdict.is_crashed()
                    || signature.is_some_and(|sig| !sig.is_match(verdict.crash_blob()))
                {
                    return false;
                }
                verdict.crash_blob()
            }
            Shape::Accepts { accepts, rejects } => {
                let (Some(ok), Some(bad)) = (verdicts.get(accepts), verdicts.get(rejects)) else {
                    return false;
                };
                if !ok.is_valid() || bad.outcome != Outcome::Invalid {
                    return false;
                }
                bad.message.as_bytes()
            }
            Shape::EitherWay { a, b } => {
                let (Some(a), Some(b)) = (verdicts.get(a), verdicts.get(b)) else {
                    return false;
                };
                if a.is_valid() == b.is_valid() {
                    return false;
                }
                b.error().or(a.error()).unwrap_or_default().as_bytes()
            }
            Shape::Disagreement => {
                if verdicts.agree() {
                    return false;
                }
                &[]
            }
        };
        any_of(self.message, message) && any_of(self.input, input)
    }
}

fn any_of(needles: &[Needle], haystack: &[u8]) -> bool {
    needles.is_empty() || needles.iter().any(|needle| needle.matches(haystack))
}

const fn suppress_crash(
    name: &'static str,
    tracker: &'static [u32],
    arm: Arm,
    signature: Pattern,
    message: &'static [Needle],
) -> Rule {
    Rule {
        name,
        tracker,
        shape: Shape::Crashed {
            arm,
            signature: Some(signature),
        },
        message,
        input: &[],
        disposition: Disposition::Suppress,
    }
}

const fn escalate_crash(name: &'static str, arm: Arm) -> Rule {
    Rule {
        name,
        tracker: &[],
        shape: Shape::Crashed {
            arm,
            signature: None,
        },
        message: &[],
        input: &[],
        disposition: Disposition::CrashEscalate(arm),
    }
}

const fn accepts(
    name: &'static str,
    tracker: &'static [u32],
    accepts: Arm,
    rejects: Arm,
    message: &'static [Needle],
    input: &'static [Needle],
) -> Rule {
    Rule {
        name,
        tracker,
        shape: Shape::Accepts { accepts, rejects },
        message,
        input,
        disposition: Disposition::Suppress,
    }
}

const GC_ICE: Pattern = Pattern::GcIce;
const GCCGO_ICE: Pattern = Pattern::GccgoIce;

/// The process-wide rule table, in evaluation order.
#[rustfmt::skip]
pub static RULES: &[Rule] = &[
    // --- Crashes -----------------------------------------------------------
    escalate_crash("go-types-fault", Reference),
    suppress_crash("gc-ice-out-of-fixed-registers", &[11352], Gc, GC_ICE,
        &[Needle::Text("internal compiler error: out of fixed registers")]),
    suppress_crash("gc-ice-naddr-bad-hmul", &[11358], Gc, GC_ICE,
        &[Needle::Text("internal compiler error: naddr: bad HMUL")]),
    suppress_crash("gc-ice-treecopy-name", &[11361], Gc, GC_ICE,
        &[Needle::Text("internal compiler error: treecopy Name")]),
    escalate_crash("gc-crash", Gc),
    suppress_crash("gccgo-print-without-arguments", &[11526], Gccgo, GCCGO_ICE,
        &[Needle::Text("warning: no arguments for builtin function \u{2018}print\u{2019}")]),
    suppress_crash("gccgo-constant-refers-to-itself", &[11536], Gccgo, GCCGO_ICE,
        &[Needle::Text("error: constant refers to itself")]),
    suppress_crash("gccgo-ice-set-type", &[11537], Gccgo, GCCGO_ICE,
        &[Needle::Text("go1: internal compiler error: in set_type, at go/gofrontend/expressions.cc")]),
    suppress_crash("gccgo-ice-global-variable-set-init", &[11541], Gccgo, GCCGO_ICE,
        &[Needle::Text("go1: internal compiler error: in global_variable_set_init, at go/go-gcc.cc")]),
    suppress_crash("gccgo-ice-wide-int-to-tree", &[11542], Gccgo, GCCGO_ICE,
        &[Needle::Text("go1: internal compiler error: in wide_int_to_tree, at tree.c")]),
    suppress_crash("gccgo-ice-record-var-depends-on", &[11543], Gccgo, GCCGO_ICE,
        &[Needle::Text("go1: internal compiler error: in record_var_depends_on, at go/gofrontend/gogo.h")]),
    suppress_crash("gccgo-ice-builtin-call-expression", &[11544], Gccgo, GCCGO_ICE,
        &[Needle::Text("go1: internal compiler error: in Builtin_call_expression, at go/gofrontend/expressions.cc")]),
    suppress_crash("gccgo-ice-check-bounds", &[11545], Gccgo, GCCGO_ICE,
        &[Needle::Text("go1: internal compiler error: in check_bounds, at go/gofrontend/expressions.cc")]),
    suppress_crash("gccgo-ice-do-determine-type", &[11546], Gccgo, GCCGO_ICE,
        &[Needle::Text("go1: internal compiler error: in do_determine_type, at go/gofrontend/expressions.h")]),
    suppress_crash("gccgo-ice-backend-numeric-constant", &[11548], Gccgo, GCCGO_ICE,
        &[Needle::Text("go1: internal compiler error: in backend_numeric_constant_expression, at go/gofrontend/expressions.cc")]),
    suppress_crash("gccgo-ice-declare-function", &[11557], Gccgo, GCCGO_ICE,
        &[Needle::Text("go1: internal compiler error: in declare_function, at go/gofrontend/gogo.cc")]),
    suppress_crash("gccgo-ice-expressions-5756", &[11558], Gccgo, GCCGO_ICE,
        &[Needle::Text("gcc/go/gofrontend/expressions.cc:5756")]),
    suppress_crash("gccgo-ice-send-statement-flatten", &[11559], Gccgo, GCCGO_ICE,
        &[Needle::Text("Send_statement::do_flatten")]),
    suppress_crash("gccgo-ice-do-get-backend", &[11560], Gccgo, GCCGO_ICE,
        &[Needle::Text("internal compiler error: in do_get_backend, at go/gofrontend/expressions.cc")]),
    suppress_crash("gccgo-ice-type-size", &[11554, 11555, 11556], Gccgo, GCCGO_ICE,
        &[Needle::Text("go1: internal compiler error: in type_size, at go/go-gcc.cc")]),
    suppress_crash("gccgo-ice-create-tmp-var", &[11568], Gccgo, GCCGO_ICE,
        &[Needle::Text("go1: internal compiler error: in create_tmp_var, at gimple-expr.c")]),
    suppress_crash("gccgo-ice-start-function", &[11576], Gccgo, GCCGO_ICE,
        &[Needle::Text("go1: internal compiler error: in start_function, at go/gofrontend/gogo.cc")]),
    suppress_crash("gccgo-ice-methods", &[11579], Gccgo, GCCGO_ICE,
        &[Needle::Text("go1: internal compiler error: in methods, at go/gofrontend/types.cc")]),
    suppress_crash("gccgo-asan-skip-cpp-comment", &[11577], Gccgo, Pattern::AsanReport,
        &[Needle::Text(" in Lex::skip_cpp_comment() ../../gcc/go/gofrontend/lex.cc")]),
    escalate_crash("gccgo-crash", Gccgo),
    // --- go/types vs gc ----------------------------------------------------
    accepts("gc-line-number-out-of-range", &[11329], Reference, Gc,
        &[Needle::Text("line number out of range")], &[]),
    accepts("gc-stupid-shift", &[11328], Reference, Gc,
        &[Needle::Text("stupid shift:")], &[]),
    accepts("go-types-untyped-float-constant", &[11350], Gc, Reference,
        &[Needle::Text("untyped float constant")], &[]),
    accepts("gc-overflow-int-to-string", &[11330], Reference, Gc,
        &[Needle::Text("overflow in int -> string")], &[]),
    accepts("go-types-illegal-character", &[11359], Gc, Reference,
        &[Needle::Text("illegal character U+")], &[]),
    accepts("gc-larger-than-address-space", &[], Reference, Gc,
        &[Needle::Text("larger than address space")], &[]),
    accepts("gc-non-canonical-import-path", &[], Reference, Gc,
        &[Needle::Text("non-canonical import path")], &[]),
    // --- gccgo accepts, go/types rejects -------------------------------------
    accepts("go-types-stupid-shift-count", &[11524], Gccgo, Reference,
        &[Needle::Text("invalid operation: stupid shift count")], &[]),
    accepts("go-types-line-directive-encoding", &[11527], Gccgo, Reference,
        &[Needle::Text("illegal UTF-8 encoding"), Needle::Text("illegal character NUL")],
        &[Needle::Text("//line"), Needle::Text("/*")]),
    accepts("go-types-xor-not-defined", &[11529], Gccgo, Reference,
        &[Needle::Text("invalid operation: operator ^ not defined for")], &[]),
    accepts("go-types-float-rounding", &[], Gccgo, Reference,
        &[Needle::Pattern(Pattern::FloatTruncation)], &[]),
    accepts("go-types-blank-identifier", &[11547, 11535], Gccgo, Reference,
        &[Needle::Text(": undeclared name: "), Needle::Text("invalid array length")],
        &[Needle::Text("_")]),
    accepts("go-types-complex-arguments", &[11561], Gccgo, Reference,
        &[Needle::Text("not enough arguments for complex")], &[]),
    accepts("go-types-or-not-defined", &[11566], Gccgo, Reference,
        &[Needle::Text("operator | not defined for")], &[]),
    accepts("go-types-nil-is-not-a-type", &[11567], Gccgo, Reference,
        &[Needle::Text("nil (untyped nil value) is not a type")], &[]),
    accepts("go-types-builtin-must-be-called", &[11570], Gccgo, Reference,
        &[Needle::Text("(built-in) must be called")], &[]),
    accepts("go-types-redeclared-in-block", &[11573], Gccgo, Reference,
        &[Needle::Text("redeclared in this block")], &[]),
    accepts("go-types-byte-order-mark", &[], Gccgo, Reference,
        &[Needle::Text("illegal byte order mark")], &[]),
    accepts("go-types-unknown-escape", &[11575], Gccgo, Reference,
        &[Needle::Text("unknown escape sequence")], &[]),
    // --- go/types accepts, gccgo rejects -------------------------------------
    accepts("gccgo-string-index-out-of-bounds", &[11522], Reference, Gccgo,
        &[Needle::Text("error: string index out of bounds")], &[]),
    accepts("gccgo-integer-constant-overflow", &[11525], Reference, Gccgo,
        &[Needle::Text("error: integer constant overflow")], &[]),
    accepts("gccgo-octal-imaginary-literal", &[11532, 11533], Reference, Gccgo,
        &[], &[Needle::Pattern(Pattern::OctalImaginary)]),
    accepts("gccgo-imaginary-zero-types", &[11564, 11563], Reference, Gccgo,
        &[Needle::Text("incompatible types in binary expression"),
          Needle::Text("initialization expression has wrong type")],
        &[Needle::Text("0i")]),
    accepts("gccgo-invalid-character-0x37f", &[11569], Reference, Gccgo,
        &[Needle::Text("invalid character 0x37f in input file")], &[]),
    accepts("gccgo-incompatible-binary-types", &[11572], Reference, Gccgo,
        &[Needle::Text("error: incompatible types in binary expression")], &[]),
    accepts("gccgo-broken-import-install", &[], Reference, Gccgo,
        &[Needle::Text(": error: import file ")], &[]),
    Rule {
        name: "gccgo-multiline-comment",
        tracker: &[11528],
        shape: Shape::EitherWay { a: Reference, b: Gccgo },
        message: &[],
        input: &[Needle::Pattern(Pattern::MultilineBlockComment)],
        disposition: Disposition::Suppress,
    },
    // --- Safety net --------------------------------------------------------
    Rule {
        name: "disagreement",
        tracker: &[],
        shape: Shape::Disagreement,
        message: &[],
        input: &[],
        disposition: Disposition::DisagreementEscalate,
    },
];

/// Structural problems that would let a rule absorb more than it should.
#[must_use]
pub fn audit(rules: &[Rule]) -> Vec<String> {
    let mut problems = Vec::new();
    let mut seen = std::collections::BTreeSet::new();
    let mut escalated = std::collections::BTreeSet::new();

    for (idx, rule) in rules.iter().enumerate() {
        if !seen.insert(rule.name) {
            problems.push(format!("{}: duplicate rule name", rule.name));
        }
        match (rule.shape, rule.disposition) {
            (Shape::Crashed { arm, .. }, Disposition::Suppress) => {
                if rule.message.is_empty() {
                    problems.push(format!("{}: crash suppression without a signature", rule.name));
                }
                if escalated.contains(&arm) {
                    problems.push(format!("{}: unreachable after {arm} crash escalation", rule.name));
                }
            }
            (Shape::Crashed { arm, signature }, Disposition::CrashEscalate(target)) => {
                if arm != target || signature.is_some() {
                    problems.push(format!("{}: escalation must cover every {arm} crash", rule.name));
                }
                escalated.insert(arm);
            }
            (Shape::Accepts { accepts, rejects }, Disposition::Suppress) => {
                if accepts == rejects {
                    problems.push(format!("{}: accepts and rejects the same arm", rule.name));
                }
                if rule.message.is_empty() && rule.input.is_empty() {
                    problems.push(format!("{}: unconstrained divergence suppression", rule.name));
                }
            }
            (Shape::EitherWay { a, b }, Disposition::Suppress) => {
                if a == b || (rule.message.is_empty() && rule.input.is_empty()) {
                    problems.push(format!("{}: unconstrained divergence suppression", rule.name));
                }
            }
            (Shape::Disagreement, Disposition::DisagreementEscalate) => {
                if idx + 1 != rules.len() {
                    problems.push(format!("{}: disagreement escalation must be last", rule.name));
                }
            }
            _ => problems.push(format!("{}: shape and disposition do not fit", rule.name)),
        }
        if !matches!(rule.shape, Shape::Crashed { .. })
            && escalated.len() < Arm::ALL.len()
        {
            problems.push(format!("{}: divergence rule placed before crash escalations", rule.name));
        }
    }
    if !matches!(rules.last(), Some(rule) if rule.shape == Shape::Disagreement) {
        problems.push(String::from("table does not end with the disagreement safety net"));
    }
    problems
}

/// Look a rule up by name.
#[must_use]
pub fn find(name: &str) -> Option<&'static Rule> {
    RULES.iter().find(|rule| rule.name == name)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::verdict::Verdict;

    fn verdicts(reference: Verdict, gc: Option<Verdict>, gccgo: Verdict) -> Verdicts {
        Verdicts {
            reference,
            gc,
            gccgo,
        }
    }

    #[test]
    fn table_passes_audit() {
        let problems = audit(RULES);
        assert!(problems.is_empty(), "rule table problems: {problems:#?}");
    }

    #[test]
    fn audit_flags_widened_rules() {
        let widened = [
            escalate_crash("a", Reference),
            escalate_crash("b", Gc),
            escalate_crash("c", Gccgo),
            accepts("too-broad", &[], Reference, Gccgo, &[], &[]),
            RULES[RULES.len() - 1],
        ];
        let problems = audit(&widened);
        assert_eq!(problems.len(), 1, "{problems:?}");
        assert!(problems[0].contains("unconstrained"));
    }

    #[test]
    fn audit_flags_suppression_after_escalation() {
        let misplaced = [
            escalate_crash("a", Reference),
            escalate_crash("b", Gc),
            suppress_crash("late", &[], Gc, GC_ICE, &[Needle::Text("x")]),
            escalate_crash("c", Gccgo),
            RULES[RULES.len() - 1],
        ];
        let problems = audit(&misplaced);
        assert!(problems.iter().any(|p| p.contains("unreachable")), "{problems:?}");
    }

    #[test]
    fn accepts_rule_is_directional() {
        let rule = find("gc-stupid-shift").expect("rule");
        let forward = verdicts(
            Verdict::valid(),
            Some(Verdict::invalid("x.go:3: stupid shift: 1000")),
            Verdict::valid(),
        );
        assert!(rule.matches(b"", &forward));
        let reverse = verdicts(
            Verdict::invalid("x.go:3: stupid shift: 1000"),
            Some(Verdict::valid()),
            Verdict::valid(),
        );
        assert!(!rule.matches(b"", &reverse));
    }

    #[test]
    fn rules_naming_disabled_arm_never_match() {
        let rule = find("gc-stupid-shift").expect("rule");
        let two_way = verdicts(Verdict::valid(), None, Verdict::valid());
        assert!(!rule.matches(b"", &two_way));
    }

    #[test]
    fn input_and_message_guards_both_apply() {
        let rule = find("go-types-line-directive-encoding").expect("rule");
        let v = verdicts(
            Verdict::invalid("src.go:1:1: illegal UTF-8 encoding"),
            None,
            Verdict::valid(),
        );
        assert!(rule.matches(b"//line \xff:1\npackage p", &v));
        assert!(!rule.matches(b"package p \xff", &v));
    }

    #[test]
    fn crash_rule_requires_signature() {
        let rule = find("gccgo-ice-methods").expect("rule");
        let text_only = verdicts(
            Verdict::valid(),
            None,
            Verdict::crashed(
                "exit status 1",
                b"error: in methods, at go/gofrontend/types.cc".to_vec(),
            ),
        );
        assert!(!rule.matches(b"", &text_only));
        let ice = verdicts(
            Verdict::valid(),
            None,
            Verdict::crashed(
                "exit status 1",
                b"x.go:1\ngo1: internal compiler error: in methods, at go/gofrontend/types.cc:9".to_vec(),
            ),
        );
        assert!(rule.matches(b"", &ice));
    }

    #[test]
    fn either_way_rule_matches_both_directions() {
        let rule = find("gccgo-multiline-comment").expect("rule");
        let input = b"package p\n/* a\n*/";
        let forward = verdicts(Verdict::valid(), None, Verdict::invalid("e"));
        let reverse = verdicts(Verdict::invalid("e"), None, Verdict::valid());
        let agree = verdicts(Verdict::invalid("e"), None, Verdict::invalid("e"));
        assert!(rule.matches(input, &forward));
        assert!(rule.matches(input, &reverse));
        assert!(!rule.matches(input, &agree));
    }

    #[test]
    fn rules_serialize_for_audit() {
        let json = serde_json::to_value(find("gccgo-ice-type-size").expect("rule")).expect("json");
        assert_eq!(json["tracker"], serde_json::json!([11554, 11555, 11556]));
        assert_eq!(json["shape"]["kind"], "crashed");
        assert_eq!(json["disposition"]["kind"], "suppress");
    }
}
