//! Corpus replay engine.

use std::path::{Path, PathBuf};
use std::time::Instant;

use sha2::Digest;
use thiserror::Error;
use triverdict_core::{Oracle, OracleVerdict};

use crate::report::ReplayReport;
use crate::structured_log::{LogEmitter, LogEntry, LogLevel, Outcome};

#[derive(Debug, Error)]
pub enum HarnessError {
    #[error("reading {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("writing structured log: {0}")]
    Log(#[source] std::io::Error),
    #[error("corpus {0} contains no inputs")]
    EmptyCorpus(PathBuf),
}

/// One evaluated corpus input.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CaseResult {
    pub input_path: String,
    pub sha256: String,
    pub verdict: OracleVerdict,
    pub rule: Option<&'static str>,
    pub duration_ms: u64,
}

impl CaseResult {
    #[must_use]
    pub fn outcome(&self) -> Outcome {
        Outcome::of(&self.verdict)
    }

    /// Structured log record for this case.
    #[must_use]
    pub fn log_entry(&self) -> LogEntry {
        let outcome = self.outcome();
        let mut entry = LogEntry::new(String::new(), outcome.level(), "evaluate")
            .with_outcome(outcome)
            .with_input(&self.input_path, &self.sha256)
            .with_duration_ms(self.duration_ms);
        if let Some(rule) = self.rule {
            entry = entry.with_rule(rule);
        }
        if let OracleVerdict::Fatal { finding } = &self.verdict
            && let Some(arm) = finding.arm
        {
            entry = entry.with_arm(arm.name());
        }
        if let Ok(details) = serde_json::to_value(&self.verdict) {
            entry = entry.with_details(details);
        }
        entry
    }
}

/// Replays a directory of candidate inputs through an oracle.
pub struct ReplayRunner<'o> {
    oracle: &'o Oracle,
    /// Name of the replay campaign.
    pub campaign: String,
}

impl<'o> ReplayRunner<'o> {
    #[must_use]
    pub fn new(oracle: &'o Oracle, campaign: impl Into<String>) -> Self {
        Self {
            oracle,
            campaign: campaign.into(),
        }
    }

    /// Evaluate a single file.
    pub fn evaluate_file(&self, path: &Path) -> Result<CaseResult, HarnessError> {
        let input = std::fs::read(path).map_err(|source| HarnessError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        let started = Instant::now();
        let evaluation = self.oracle.evaluate_detailed(&input);
        let duration_ms = u64::try_from(started.elapsed().as_millis()).unwrap_or(u64::MAX);
        Ok(CaseResult {
            input_path: path.display().to_string(),
            sha256: sha256_hex(&input),
            rule: evaluation.rule(),
            verdict: evaluation.verdict,
            duration_ms,
        })
    }

    /// Evaluate every regular file under `dir`, in path order, logging one
    /// entry per input when an emitter is given.
    pub fn run(
        &self,
        dir: &Path,
        mut log: Option<&mut LogEmitter>,
    ) -> Result<ReplayReport, HarnessError> {
        let files = corpus_files(dir)?;
        if files.is_empty() {
            return Err(HarnessError::EmptyCorpus(dir.to_path_buf()));
        }
        if let Some(log) = log.as_deref_mut() {
            log.emit_entry(
                LogEntry::new(String::new(), LogLevel::Info, "replay_start").with_details(
                    serde_json::json!({"corpus": dir.display().to_string(), "inputs": files.len()}),
                ),
            )
            .map_err(HarnessError::Log)?;
        }

        let mut cases = Vec::with_capacity(files.len());
        for path in &files {
            let case = self.evaluate_file(path)?;
            if let Some(log) = log.as_deref_mut() {
                log.emit_entry(case.log_entry()).map_err(HarnessError::Log)?;
            }
            cases.push(case);
        }

        let report = ReplayReport::from_cases(&self.campaign, &cases);
        if let Some(log) = log {
            let level = if report.fatal > 0 {
                LogLevel::Error
            } else {
                LogLevel::Info
            };
            log.emit_entry(
                LogEntry::new(String::new(), level, "replay_complete")
                    .with_exit_code(i32::from(report.fatal > 0))
                    .with_details(serde_json::json!({
                        "total": report.total,
                        "pass": report.pass,
                        "skip": report.skip,
                        "fail": report.fail,
                        "fatal": report.fatal,
                    })),
            )
            .map_err(HarnessError::Log)?;
            log.flush().map_err(HarnessError::Log)?;
        }
        Ok(report)
    }
}

/// Regular files directly under `dir`, sorted by path.
pub fn corpus_files(dir: &Path) -> Result<Vec<PathBuf>, HarnessError> {
    let read_err = |source| HarnessError::Read {
        path: dir.to_path_buf(),
        source,
    };
    let mut files = Vec::new();
    for entry in std::fs::read_dir(dir).map_err(read_err)? {
        let path = entry.map_err(read_err)?.path();
        if path.is_file() {
            files.push(path);
        }
    }
    files.sort();
    Ok(files)
}

/// Lowercase hex SHA-256 of `data`.
#[must_use]
pub fn sha256_hex(data: &[u8]) -> String {
    use std::fmt::Write;
    let digest = sha2::Sha256::digest(data);
    let mut out = String::with_capacity(digest.len() * 2);
    for b in digest {
        let _ = write!(&mut out, "{b:02x}");
    }
    out
}
