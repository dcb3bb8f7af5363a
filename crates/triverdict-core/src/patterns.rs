//! Pattern library: precompiled byte matchers shared by the pre-filter, the
//! rule table and the external compiler adapters.
//!
//! Every pattern is compiled once, process-wide, in byte mode with Unicode
//! disabled, so matching is total over arbitrary input including invalid UTF-8.

use std::sync::OnceLock;

use regex::bytes::{Regex, RegexBuilder};
use serde::Serialize;

/// Named matcher in the library.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Pattern {
    /// Numeric literal with a 3+ digit exponent (go issue 11327).
    BigExponent,
    /// Two commas separated only by whitespace; gccgo hangs (go issue 11531).
    DoubleComma,
    /// Block comment spanning lines (go issue 11528).
    MultilineBlockComment,
    /// Octal-looking literal followed by an imaginary or exponent suffix
    /// (go issues 11532, 11533).
    OctalImaginary,
    /// `*/` followed by `;` (go issue 11274).
    CommentThenSemicolon,
    /// `;` followed by `/*` (go issue 11274).
    SemicolonThenComment,
    /// Constant truncation diagnostic where gccgo rounds differently.
    FloatTruncation,
    /// gc internal compiler error line.
    GcIce,
    /// gccgo frontend internal compiler error line.
    GccgoIce,
    /// AddressSanitizer report header.
    AsanReport,
    /// Go runtime panic or fatal error followed by a goroutine dump.
    GoPanic,
}

const PATTERN_COUNT: usize = 11;

impl Pattern {
    pub const ALL: [Pattern; PATTERN_COUNT] = [
        Pattern::BigExponent,
        Pattern::DoubleComma,
        Pattern::MultilineBlockComment,
        Pattern::OctalImaginary,
        Pattern::CommentThenSemicolon,
        Pattern::SemicolonThenComment,
        Pattern::FloatTruncation,
        Pattern::GcIce,
        Pattern::GccgoIce,
        Pattern::AsanReport,
        Pattern::GoPanic,
    ];

    /// Patterns that reject an input before any implementation runs.
    pub const PRE_FILTERS: [Pattern; 2] = [Pattern::BigExponent, Pattern::DoubleComma];

    /// Patterns that exempt a valid input from the reformat check.
    pub const REFORMAT_EXEMPTIONS: [Pattern; 2] =
        [Pattern::CommentThenSemicolon, Pattern::SemicolonThenComment];

    /// Signatures that turn a non-zero compiler exit into a crash.
    pub const CRASH_SIGNATURES: [Pattern; 3] =
        [Pattern::GcIce, Pattern::GccgoIce, Pattern::AsanReport];

    /// Signatures that turn a non-zero reference tool exit into a fault.
    /// Go tools exit 2 on both a panic and an ordinary diagnostic.
    pub const TOOL_FAULT_SIGNATURES: [Pattern; 2] = [Pattern::GoPanic, Pattern::AsanReport];

    #[must_use]
    pub const fn name(self) -> &'static str {
        match self {
            Pattern::BigExponent => "big_exponent",
            Pattern::DoubleComma => "double_comma",
            Pattern::MultilineBlockComment => "multiline_block_comment",
            Pattern::OctalImaginary => "octal_imaginary",
            Pattern::CommentThenSemicolon => "comment_then_semicolon",
            Pattern::SemicolonThenComment => "semicolon_then_comment",
            Pattern::FloatTruncation => "float_truncation",
            Pattern::GcIce => "gc_ice",
            Pattern::GccgoIce => "gccgo_ice",
            Pattern::AsanReport => "asan_report",
            Pattern::GoPanic => "go_panic",
        }
    }

    #[must_use]
    pub const fn source(self) -> &'static str {
        match self {
            Pattern::BigExponent => r"(\.[0-9]*|[0-9]+)[eE]-?\+?[0-9]{3,}",
            Pattern::DoubleComma => r",[ \t\r\n]*,",
            Pattern::MultilineBlockComment => r"/\*(.*\n)+.*\*/",
            Pattern::OctalImaginary => r"[ \r\t\n=+\-*^/(,]0[0-9]+[ieE]",
            Pattern::CommentThenSemicolon => r"\*/[ \t\n\r\f\v]*;",
            Pattern::SemicolonThenComment => r";[ \t\n\r\f\v]*/\*",
            Pattern::FloatTruncation => r" \(untyped float constant .*\) truncated to ",
            Pattern::GcIce => r"(?m)^[^\n]+?:[0-9]+: internal compiler error: ",
            Pattern::GccgoIce => r"(?m)^go1: internal compiler error:",
            Pattern::AsanReport => r"(?m)^==[0-9]+==ERROR: AddressSanitizer: ",
            Pattern::GoPanic => r"(?m)^(panic: |fatal error: )(?s:.*)^goroutine [0-9]+ \[",
        }
    }

    /// Test the pattern against arbitrary bytes.
    #[must_use]
    pub fn is_match(self, haystack: &[u8]) -> bool {
        match compiled()[self as usize].as_ref() {
            Some(re) => re.is_match(haystack),
            // Unreachable for the constant sources above; a pattern that failed
            // to build never matches rather than panicking mid-evaluation.
            None => false,
        }
    }
}

fn compiled() -> &'static [Option<Regex>; PATTERN_COUNT] {
    static TABLE: OnceLock<[Option<Regex>; PATTERN_COUNT]> = OnceLock::new();
    TABLE.get_or_init(|| {
        Pattern::ALL.map(|pattern| {
            RegexBuilder::new(pattern.source())
                .unicode(false)
                .build()
                .ok()
        })
    })
}

/// First pre-filter pattern the candidate input matches, if any.
#[must_use]
pub fn pre_filter(input: &[u8]) -> Option<Pattern> {
    Pattern::PRE_FILTERS
        .into_iter()
        .find(|pattern| pattern.is_match(input))
}

/// First reformat exemption the input matches, if any.
#[must_use]
pub fn reformat_exemption(input: &[u8]) -> Option<Pattern> {
    Pattern::REFORMAT_EXEMPTIONS
        .into_iter()
        .find(|pattern| pattern.is_match(input))
}

/// First crash signature found in a compiler's combined output, if any.
#[must_use]
pub fn crash_signature(output: &[u8]) -> Option<Pattern> {
    Pattern::CRASH_SIGNATURES
        .into_iter()
        .find(|pattern| pattern.is_match(output))
}

/// First tool-fault signature found in a reference tool's output, if any.
#[must_use]
pub fn tool_fault(output: &[u8]) -> Option<Pattern> {
    Pattern::TOOL_FAULT_SIGNATURES
        .into_iter()
        .find(|pattern| pattern.is_match(output))
}

/// Byte-substring search over arbitrary data.
#[must_use]
pub fn contains(haystack: &[u8], needle: &[u8]) -> bool {
    needle.is_empty() || haystack.windows(needle.len()).any(|window| window == needle)
}
