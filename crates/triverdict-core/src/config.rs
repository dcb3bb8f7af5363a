//! Oracle configuration.
//!
//! Tunables resolve from environment variables; unrecognized values fall back
//! to the baseline rather than failing:
//! - `TRIVERDICT_ARMS`: `three` (default) or `two`. Two-way runs skip gc.
//! - `TRIVERDICT_GC`, `TRIVERDICT_GCCGO`, `TRIVERDICT_GOFMT`: tool programs.
//! - `TRIVERDICT_GOTYPE`, `TRIVERDICT_SSADUMP`: reference stage programs.
//! - `TRIVERDICT_VERIFY_REFORMAT`: re-validate formatted output.
//! - `TRIVERDICT_EXEC`: `sequential` (default) or `concurrent`.
//! - `TRIVERDICT_WORKDIR`: scratch root, system temp dir by default.

use std::path::PathBuf;

/// Which implementations take part in the comparison.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Arms {
    /// Reference, gc and gccgo.
    #[default]
    Three,
    /// Reference and gccgo only; gc is never run.
    Two,
}

impl Arms {
    /// Parse from string (case-insensitive).
    #[must_use]
    pub fn from_str_loose(s: &str) -> Self {
        match s.trim().to_ascii_lowercase().as_str() {
            "2" | "two" | "two-way" => Self::Two,
            _ => Self::Three,
        }
    }

    #[must_use]
    pub const fn runs_gc(self) -> bool {
        matches!(self, Self::Three)
    }
}

/// How the adapters are scheduled for one input.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Execution {
    /// Reference, then gc, then gccgo.
    #[default]
    Sequential,
    /// The external compilers run on scoped threads alongside the reference.
    ConcurrentExternals,
}

impl Execution {
    /// Parse from string (case-insensitive).
    #[must_use]
    pub fn from_str_loose(s: &str) -> Self {
        match s.trim().to_ascii_lowercase().as_str() {
            "concurrent" | "parallel" | "concurrent-externals" => Self::ConcurrentExternals,
            _ => Self::Sequential,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OracleConfig {
    pub arms: Arms,
    pub gc_program: String,
    pub gccgo_program: String,
    pub gofmt_program: String,
    pub gotype_program: String,
    pub ssadump_program: String,
    pub verify_reformat: bool,
    pub execution: Execution,
    pub workdir: PathBuf,
}

impl Default for OracleConfig {
    fn default() -> Self {
        Self {
            arms: Arms::Three,
            gc_program: String::from("compile"),
            gccgo_program: String::from("go1"),
            gofmt_program: String::from("gofmt"),
            gotype_program: String::from("gotype"),
            ssadump_program: String::from("ssadump"),
            verify_reformat: false,
            execution: Execution::Sequential,
            workdir: std::env::temp_dir(),
        }
    }
}

impl OracleConfig {
    /// Resolve from the process environment.
    #[must_use]
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Resolve through `lookup`; absent or empty values keep the default.
    #[must_use]
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let get = |key: &str| lookup(key).filter(|value| !value.trim().is_empty());
        let mut config = Self::default();
        if let Some(raw) = get("TRIVERDICT_ARMS") {
            config.arms = Arms::from_str_loose(&raw);
        }
        if let Some(program) = get("TRIVERDICT_GC") {
            config.gc_program = program;
        }
        if let Some(program) = get("TRIVERDICT_GCCGO") {
            config.gccgo_program = program;
        }
        if let Some(program) = get("TRIVERDICT_GOFMT") {
            config.gofmt_program = program;
        }
        if let Some(program) = get("TRIVERDICT_GOTYPE") {
            config.gotype_program = program;
        }
        if let Some(program) = get("TRIVERDICT_SSADUMP") {
            config.ssadump_program = program;
        }
        if let Some(raw) = get("TRIVERDICT_VERIFY_REFORMAT") {
            config.verify_reformat = parse_flag(&raw);
        }
        if let Some(raw) = get("TRIVERDICT_EXEC") {
            config.execution = Execution::from_str_loose(&raw);
        }
        if let Some(dir) = get("TRIVERDICT_WORKDIR") {
            config.workdir = PathBuf::from(dir);
        }
        config
    }
}

fn parse_flag(raw: &str) -> bool {
    matches!(
        raw.trim().to_ascii_lowercase().as_str(),
        "1" | "true" | "yes" | "on"
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| ((*k).to_string(), (*v).to_string()))
            .collect();
        move |key| map.get(key).cloned()
    }

    #[test]
    fn defaults_match_baseline() {
        let config = OracleConfig::from_lookup(lookup(&[]));
        assert_eq!(config, OracleConfig::default());
        assert_eq!(config.arms, Arms::Three);
        assert_eq!(config.gc_program, "compile");
        assert_eq!(config.gccgo_program, "go1");
        assert!(!config.verify_reformat);
        assert_eq!(config.execution, Execution::Sequential);
    }

    #[test]
    fn environment_overrides() {
        let config = OracleConfig::from_lookup(lookup(&[
            ("TRIVERDICT_ARMS", "two"),
            ("TRIVERDICT_GC", "/opt/go/pkg/tool/linux_amd64/compile"),
            ("TRIVERDICT_GCCGO", "/usr/libexec/gcc/x86_64-linux-gnu/go1"),
            ("TRIVERDICT_VERIFY_REFORMAT", "TRUE"),
            ("TRIVERDICT_EXEC", "concurrent"),
            ("TRIVERDICT_WORKDIR", "/scratch"),
        ]));
        assert_eq!(config.arms, Arms::Two);
        assert_eq!(config.gc_program, "/opt/go/pkg/tool/linux_amd64/compile");
        assert_eq!(config.gccgo_program, "/usr/libexec/gcc/x86_64-linux-gnu/go1");
        assert!(config.verify_reformat);
        assert_eq!(config.execution, Execution::ConcurrentExternals);
        assert_eq!(config.workdir, PathBuf::from("/scratch"));
    }

    #[test]
    fn unknown_and_empty_values_keep_defaults() {
        let config = OracleConfig::from_lookup(lookup(&[
            ("TRIVERDICT_ARMS", "four"),
            ("TRIVERDICT_GC", "  "),
            ("TRIVERDICT_VERIFY_REFORMAT", "maybe"),
            ("TRIVERDICT_EXEC", "warp"),
        ]));
        assert_eq!(config.arms, Arms::Three);
        assert_eq!(config.gc_program, "compile");
        assert!(!config.verify_reformat);
        assert_eq!(config.execution, Execution::Sequential);
    }

    #[test]
    fn arms_parse_loosely() {
        assert_eq!(Arms::from_str_loose("2"), Arms::Two);
        assert_eq!(Arms::from_str_loose("TWO"), Arms::Two);
        assert_eq!(Arms::from_str_loose("3"), Arms::Three);
        assert!(Arms::Three.runs_gc());
        assert!(!Arms::Two.runs_gc());
    }
}
