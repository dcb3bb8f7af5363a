//! Structured logging contract for oracle runs.
//!
//! Provides:
//! - [`LogEntry`]: canonical JSONL log record with required + optional fields.
//! - [`LogEmitter`]: writes JSONL lines to a file or an in-memory buffer.
//! - [`validate_log_line`]: validates a single JSONL line against the schema.
//! - [`validate_log_file`]: validates an entire JSONL file.

use serde::{Deserialize, Serialize};
use std::io::Write;
use std::path::Path;

use triverdict_core::OracleVerdict;

// ---------------------------------------------------------------------------
// Log entry
// ---------------------------------------------------------------------------

/// Severity level for log entries.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogLevel {
    Trace,
    Debug,
    Info,
    Warn,
    Error,
    Fatal,
}

/// Oracle outcome for one evaluated input.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Outcome {
    Pass,
    Skip,
    Fail,
    Fatal,
}

impl Outcome {
    #[must_use]
    pub fn of(verdict: &OracleVerdict) -> Self {
        match verdict {
            OracleVerdict::Pass => Self::Pass,
            OracleVerdict::Skip { .. } => Self::Skip,
            OracleVerdict::Fail { .. } => Self::Fail,
            OracleVerdict::Fatal { .. } => Self::Fatal,
        }
    }

    /// Level an evaluation with this outcome is logged at.
    #[must_use]
    pub const fn level(self) -> LogLevel {
        match self {
            Self::Pass | Self::Skip => LogLevel::Info,
            Self::Fail => LogLevel::Warn,
            Self::Fatal => LogLevel::Error,
        }
    }
}

const OUTCOMES: [&str; 4] = ["pass", "skip", "fail", "fatal"];
const LEVELS: [&str; 6] = ["trace", "debug", "info", "warn", "error", "fatal"];
const ARMS: [&str; 3] = ["go/types", "gc", "gccgo"];

/// Canonical structured log entry.
///
/// Required fields: `timestamp`, `trace_id`, `level`, `event`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LogEntry {
    // Required
    pub timestamp: String,
    pub trace_id: String,
    pub level: LogLevel,
    pub event: String,

    // Optional
    #[serde(skip_serializing_if = "Option::is_none")]
    pub campaign: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub outcome: Option<Outcome>,
    /// Rule, pre-filter or reformat stage that decided the outcome.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub rule: Option<String>,
    /// Arm a crash finding was attributed to.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub arm: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub input_sha256: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub input_path: Option<String>,
    /// Exit code of the harness process, on run summary events.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub exit_code: Option<i32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub duration_ms: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<serde_json::Value>,
}

impl LogEntry {
    /// Create a new log entry with required fields only.
    #[must_use]
    pub fn new(trace_id: impl Into<String>, level: LogLevel, event: impl Into<String>) -> Self {
        Self {
            timestamp: now_utc(),
            trace_id: trace_id.into(),
            level,
            event: event.into(),
            campaign: None,
            outcome: None,
            rule: None,
            arm: None,
            input_sha256: None,
            input_path: None,
            exit_code: None,
            duration_ms: None,
            details: None,
        }
    }

    #[must_use]
    pub fn with_campaign(mut self, campaign: impl Into<String>) -> Self {
        self.campaign = Some(campaign.into());
        self
    }

    #[must_use]
    pub fn with_outcome(mut self, outcome: Outcome) -> Self {
        self.outcome = Some(outcome);
        self
    }

    #[must_use]
    pub fn with_rule(mut self, rule: impl Into<String>) -> Self {
        self.rule = Some(rule.into());
        self
    }

    #[must_use]
    pub fn with_arm(mut self, arm: impl Into<String>) -> Self {
        self.arm = Some(arm.into());
        self
    }

    /// Set the input identity: its path and hex SHA-256 digest.
    #[must_use]
    pub fn with_input(mut self, path: impl Into<String>, sha256: impl Into<String>) -> Self {
        self.input_path = Some(path.into());
        self.input_sha256 = Some(sha256.into());
        self
    }

    #[must_use]
    pub fn with_exit_code(mut self, exit_code: i32) -> Self {
        self.exit_code = Some(exit_code);
        self
    }

    #[must_use]
    pub fn with_duration_ms(mut self, ms: u64) -> Self {
        self.duration_ms = Some(ms);
        self
    }

    /// Set free-form details.
    #[must_use]
    pub fn with_details(mut self, details: serde_json::Value) -> Self {
        self.details = Some(details);
        self
    }

    /// Serialize to a single JSONL line (no trailing newline).
    pub fn to_jsonl(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string(self)
    }
}

// ---------------------------------------------------------------------------
// Log emitter
// ---------------------------------------------------------------------------

/// Writes structured JSONL log entries to a file.
pub struct LogEmitter {
    writer: Box<dyn Write>,
    seq: u64,
    run_id: String,
    campaign: String,
}

impl LogEmitter {
    /// Create an emitter that writes to a file.
    pub fn to_file(path: &Path, run_id: &str, campaign: &str) -> std::io::Result<Self> {
        let file = std::fs::File::create(path)?;
        Ok(Self {
            writer: Box::new(std::io::BufWriter::new(file)),
            seq: 0,
            run_id: run_id.to_string(),
            campaign: campaign.to_string(),
        })
    }

    fn next_trace_id(&mut self) -> String {
        self.seq += 1;
        format!("{}::{}::{:03}", self.run_id, self.campaign, self.seq)
    }

    /// Emit a log entry. An empty trace_id is replaced by the next
    /// `run::campaign::NNN` id and a missing campaign by the emitter's.
    pub fn emit_entry(&mut self, mut entry: LogEntry) -> std::io::Result<()> {
        if entry.trace_id.is_empty() {
            entry.trace_id = self.next_trace_id();
        }
        if entry.campaign.is_none() {
            entry.campaign = Some(self.campaign.clone());
        }
        let line = serde_json::to_string(&entry).map_err(std::io::Error::other)?;
        writeln!(self.writer, "{line}")
    }

    pub fn flush(&mut self) -> std::io::Result<()> {
        self.writer.flush()
    }
}

impl std::fmt::Debug for LogEmitter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LogEmitter")
            .field("seq", &self.seq)
            .field("run_id", &self.run_id)
            .field("campaign", &self.campaign)
            .finish_non_exhaustive()
    }
}

// ---------------------------------------------------------------------------
// Validation
// ---------------------------------------------------------------------------

/// Validation error for a log line.
#[derive(Debug)]
pub struct LogValidationError {
    pub line_number: usize,
    pub field: String,
    pub message: String,
}

impl std::fmt::Display for LogValidationError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "line {}: field '{}': {}",
            self.line_number, self.field, self.message
        )
    }
}

/// Validate a single JSONL line against the schema.
pub fn validate_log_line(
    line: &str,
    line_number: usize,
) -> Result<LogEntry, Vec<LogValidationError>> {
    let mut errors = Vec::new();
    let mut reject = |field: &str, message: String| {
        errors.push(LogValidationError {
            line_number,
            field: field.to_string(),
            message,
        });
    };

    let value: serde_json::Value = match serde_json::from_str(line) {
        Ok(v) => v,
        Err(e) => {
            reject("<json>", format!("invalid JSON: {e}"));
            return Err(errors);
        }
    };

    let Some(obj) = value.as_object() else {
        reject("<root>", "expected JSON object".to_string());
        return Err(errors);
    };

    for field in ["timestamp", "trace_id", "level", "event"] {
        if !obj.contains_key(field) {
            reject(field, "required field missing".to_string());
        }
    }

    if let Some(level) = obj.get("level").and_then(|v| v.as_str())
        && !LEVELS.contains(&level)
    {
        reject("level", format!("invalid level: '{level}'"));
    }

    if let Some(outcome) = obj.get("outcome").and_then(|v| v.as_str())
        && !OUTCOMES.contains(&outcome)
    {
        reject("outcome", format!("invalid outcome: '{outcome}'"));
    }

    if let Some(arm) = obj.get("arm").and_then(|v| v.as_str())
        && !ARMS.contains(&arm)
    {
        reject("arm", format!("invalid arm: '{arm}'"));
    }

    if let Some(digest) = obj.get("input_sha256").and_then(|v| v.as_str())
        && (digest.len() != 64 || !digest.bytes().all(|b| b.is_ascii_hexdigit()))
    {
        reject("input_sha256", format!("expected 64 hex digits, got: '{digest}'"));
    }

    // Fatal outcomes must name what escalated.
    if obj.get("outcome").and_then(|v| v.as_str()) == Some("fatal")
        && !obj
            .get("rule")
            .and_then(|v| v.as_str())
            .is_some_and(|rule| !rule.trim().is_empty())
    {
        reject("rule", "fatal outcomes must include a non-empty rule".to_string());
    }

    if let Some(trace_id) = obj.get("trace_id").and_then(|v| v.as_str())
        && trace_id.split("::").count() != 3
    {
        reject(
            "trace_id",
            format!("trace_id should follow <run>::<campaign>::<seq> format, got: '{trace_id}'"),
        );
    }

    if !errors.is_empty() {
        return Err(errors);
    }

    match serde_json::from_value::<LogEntry>(value) {
        Ok(entry) => Ok(entry),
        Err(e) => {
            errors.push(LogValidationError {
                line_number,
                field: "<deserialization>".to_string(),
                message: format!("failed to deserialize: {e}"),
            });
            Err(errors)
        }
    }
}

/// Validate an entire JSONL file.
///
/// Returns the total line count and any validation errors found.
pub fn validate_log_file(path: &Path) -> Result<(usize, Vec<LogValidationError>), std::io::Error> {
    let content = std::fs::read_to_string(path)?;
    let mut all_errors = Vec::new();
    let mut line_count = 0;

    for (i, line) in content.lines().enumerate() {
        let line = line.trim();
        if line.is_empty() {
            continue;
        }
        line_count += 1;
        if let Err(errs) = validate_log_line(line, i + 1) {
            all_errors.extend(errs);
        }
    }

    Ok((line_count, all_errors))
}

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

/// Current time as RFC 3339 UTC with millisecond precision.
#[must_use]
pub fn now_utc() -> String {
    let duration = std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .unwrap_or_default();
    format_utc(duration.as_secs(), duration.subsec_millis())
}

fn format_utc(secs: u64, millis: u32) -> String {
    let days = secs / 86_400;
    let (year, month, day) = civil_from_days(days);
    format!(
        "{year:04}-{month:02}-{day:02}T{:02}:{:02}:{:02}.{millis:03}Z",
        (secs % 86_400) / 3600,
        (secs % 3600) / 60,
        secs % 60,
    )
}

// Days since 1970-01-01 to a proleptic Gregorian date.
fn civil_from_days(days: u64) -> (u64, u64, u64) {
    let z = days + 719_468;
    let era = z / 146_097;
    let doe = z % 146_097;
    let yoe = (doe - doe / 1460 + doe / 36_524 - doe / 146_096) / 365;
    let doy = doe - (365 * yoe + yoe / 4 - yoe / 100);
    let mp = (5 * doy + 2) / 153;
    let day = doy - (153 * mp + 2) / 5 + 1;
    let month = if mp < 10 { mp + 3 } else { mp - 9 };
    let year = yoe + era * 400 + u64::from(month <= 2);
    (year, month, day)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn log_entry_serializes_required_fields() {
        let entry = LogEntry::new("run-1::corpus::001", LogLevel::Info, "replay_start");
        let json = entry.to_jsonl().unwrap();
        let parsed: serde_json::Value = serde_json::from_str(&json).unwrap();
        assert!(parsed["timestamp"].is_string());
        assert_eq!(parsed["trace_id"], "run-1::corpus::001");
        assert_eq!(parsed["level"], "info");
        assert_eq!(parsed["event"], "replay_start");
        assert!(parsed.get("campaign").is_none());
        assert!(parsed.get("outcome").is_none());
        assert!(parsed.get("rule").is_none());
    }

    #[test]
    fn log_entry_with_all_optional_fields() {
        let digest = "a".repeat(64);
        let entry = LogEntry::new("run-1::corpus::002", LogLevel::Error, "evaluate")
            .with_campaign("corpus")
            .with_outcome(Outcome::Fatal)
            .with_rule("gccgo-crash")
            .with_arm("gccgo")
            .with_input("corpus/crash-1", &digest)
            .with_exit_code(1)
            .with_duration_ms(12)
            .with_details(serde_json::json!({"summary": "gccgo compiler crashed"}));

        let json = entry.to_jsonl().unwrap();
        let parsed: serde_json::Value = serde_json::from_str(&json).unwrap();
        assert_eq!(parsed["campaign"], "corpus");
        assert_eq!(parsed["outcome"], "fatal");
        assert_eq!(parsed["rule"], "gccgo-crash");
        assert_eq!(parsed["arm"], "gccgo");
        assert_eq!(parsed["input_path"], "corpus/crash-1");
        assert_eq!(parsed["input_sha256"], digest.as_str());
        assert_eq!(parsed["exit_code"], 1);
        assert_eq!(parsed["duration_ms"], 12);
        assert!(parsed["details"].is_object());
        assert!(validate_log_line(&json, 1).is_ok());
    }

    #[test]
    fn validate_missing_required_field() {
        let json = r#"{"timestamp":"2026-01-01T00:00:00Z","level":"info","event":"test"}"#;
        let errors = validate_log_line(json, 1).unwrap_err();
        assert!(errors.iter().any(|e| e.field == "trace_id"));
    }

    #[test]
    fn validate_invalid_level_and_outcome() {
        let json = r#"{"timestamp":"2026-01-01T00:00:00Z","trace_id":"a::b::1","level":"critical","event":"x","outcome":"timeout"}"#;
        let errors = validate_log_line(json, 1).unwrap_err();
        assert!(errors.iter().any(|e| e.field == "level"));
        assert!(errors.iter().any(|e| e.field == "outcome"));
    }

    #[test]
    fn validate_invalid_json() {
        let errors = validate_log_line("not json at all", 1).unwrap_err();
        assert!(errors.iter().any(|e| e.field == "<json>"));
    }

    #[test]
    fn validate_bad_trace_id_format() {
        let json = r#"{"timestamp":"2026-01-01T00:00:00Z","trace_id":"no-separator","level":"info","event":"test"}"#;
        let errors = validate_log_line(json, 1).unwrap_err();
        assert!(errors.iter().any(|e| e.field == "trace_id"));
    }

    #[test]
    fn fatal_without_rule_is_rejected() {
        let json = r#"{"timestamp":"2026-01-01T00:00:00Z","trace_id":"a::b::1","level":"error","event":"evaluate","outcome":"fatal"}"#;
        let errors = validate_log_line(json, 7).unwrap_err();
        assert!(errors.iter().any(|e| e.field == "rule" && e.line_number == 7));
    }

    #[test]
    fn short_digest_is_rejected() {
        let json = r#"{"timestamp":"2026-01-01T00:00:00Z","trace_id":"a::b::1","level":"info","event":"evaluate","input_sha256":"abc"}"#;
        let errors = validate_log_line(json, 1).unwrap_err();
        assert!(errors.iter().any(|e| e.field == "input_sha256"));
    }

    #[test]
    fn emitter_fills_trace_ids_and_campaign() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("log.jsonl");
        let mut emitter = LogEmitter::to_file(&path, "run-42", "corpus").unwrap();
        emitter
            .emit_entry(LogEntry::new(String::new(), LogLevel::Info, "start"))
            .unwrap();
        emitter
            .emit_entry(LogEntry::new("fixed::trace::id", LogLevel::Info, "explicit"))
            .unwrap();
        emitter
            .emit_entry(
                LogEntry::new(String::new(), LogLevel::Info, "end").with_campaign("other"),
            )
            .unwrap();
        emitter.flush().unwrap();

        let content = std::fs::read_to_string(&path).unwrap();
        let entries: Vec<LogEntry> = content
            .lines()
            .enumerate()
            .map(|(idx, line)| validate_log_line(line, idx + 1).unwrap())
            .collect();
        assert_eq!(entries[0].trace_id, "run-42::corpus::001");
        assert_eq!(entries[0].campaign.as_deref(), Some("corpus"));
        assert_eq!(entries[1].trace_id, "fixed::trace::id");
        assert_eq!(entries[2].trace_id, "run-42::corpus::002");
        assert_eq!(entries[2].campaign.as_deref(), Some("other"));
    }

    #[test]
    fn timestamps_use_the_civil_calendar() {
        assert_eq!(format_utc(0, 0), "1970-01-01T00:00:00.000Z");
        assert_eq!(format_utc(951_782_400, 5), "2000-02-29T00:00:00.005Z");
        assert_eq!(format_utc(1_792_281_599, 999), "2026-10-17T23:59:59.999Z");
    }

    #[test]
    fn outcome_follows_oracle_verdict() {
        assert_eq!(Outcome::of(&OracleVerdict::Pass), Outcome::Pass);
        assert_eq!(
            Outcome::of(&OracleVerdict::Fail {
                reason: String::from("x")
            }),
            Outcome::Fail
        );
        assert_eq!(Outcome::Fatal.level(), LogLevel::Error);
    }
}
