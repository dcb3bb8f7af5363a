//! Replay summary rendering.

use std::collections::BTreeMap;

use serde::Serialize;
use triverdict_core::{Finding, OracleVerdict, SkipReason};

use crate::runner::CaseResult;
use crate::structured_log::now_utc;

/// A `Fatal` finding together with the input that produced it.
#[derive(Debug, Clone, Serialize)]
pub struct ReportedFinding {
    pub input_path: String,
    pub sha256: String,
    pub finding: Finding,
}

/// An input whose evaluation failed for infrastructure reasons.
#[derive(Debug, Clone, Serialize)]
pub struct ReportedFailure {
    pub input_path: String,
    pub reason: String,
}

/// Summary of one corpus replay.
#[derive(Debug, Clone, Serialize)]
pub struct ReplayReport {
    pub campaign: String,
    pub timestamp: String,
    pub total: usize,
    pub pass: usize,
    pub skip: usize,
    pub fail: usize,
    pub fatal: usize,
    /// Inputs absorbed per suppression rule.
    pub suppressed: BTreeMap<&'static str, usize>,
    /// Inputs dropped per pre-filter pattern.
    pub pre_filtered: BTreeMap<&'static str, usize>,
    pub all_invalid: usize,
    pub findings: Vec<ReportedFinding>,
    pub failures: Vec<ReportedFailure>,
}

impl ReplayReport {
    #[must_use]
    pub fn from_cases(campaign: &str, cases: &[CaseResult]) -> Self {
        let mut report = Self {
            campaign: campaign.to_string(),
            timestamp: now_utc(),
            total: cases.len(),
            pass: 0,
            skip: 0,
            fail: 0,
            fatal: 0,
            suppressed: BTreeMap::new(),
            pre_filtered: BTreeMap::new(),
            all_invalid: 0,
            findings: Vec::new(),
            failures: Vec::new(),
        };
        for case in cases {
            match &case.verdict {
                OracleVerdict::Pass => report.pass += 1,
                OracleVerdict::Skip { reason } => {
                    report.skip += 1;
                    match reason {
                        SkipReason::Suppressed(rule) => {
                            *report.suppressed.entry(*rule).or_default() += 1;
                        }
                        SkipReason::PreFiltered(pattern) => {
                            *report.pre_filtered.entry(*pattern).or_default() += 1;
                        }
                        SkipReason::AllInvalid => report.all_invalid += 1,
                    }
                }
                OracleVerdict::Fail { reason } => {
                    report.fail += 1;
                    report.failures.push(ReportedFailure {
                        input_path: case.input_path.clone(),
                        reason: reason.clone(),
                    });
                }
                OracleVerdict::Fatal { finding } => {
                    report.fatal += 1;
                    report.findings.push(ReportedFinding {
                        input_path: case.input_path.clone(),
                        sha256: case.sha256.clone(),
                        finding: (**finding).clone(),
                    });
                }
            }
        }
        report
    }

    #[must_use]
    pub fn has_findings(&self) -> bool {
        self.fatal > 0
    }

    /// Render the report as markdown.
    #[must_use]
    pub fn to_markdown(&self) -> String {
        let mut out = format!("# Replay: {}\n\n", self.campaign);
        out.push_str(&format!("- Timestamp: {}\n", self.timestamp));
        out.push_str(&format!("- Total: {}\n", self.total));
        out.push_str(&format!("- Pass: {}\n", self.pass));
        out.push_str(&format!(
            "- Skip: {} (all invalid: {})\n",
            self.skip, self.all_invalid
        ));
        out.push_str(&format!("- Fail: {}\n", self.fail));
        out.push_str(&format!("- Fatal: {}\n", self.fatal));

        if !self.suppressed.is_empty() || !self.pre_filtered.is_empty() {
            out.push_str("\n| Rule | Inputs |\n|------|--------|\n");
            for (rule, count) in self.pre_filtered.iter().chain(&self.suppressed) {
                out.push_str(&format!("| {rule} | {count} |\n"));
            }
        }
        for finding in &self.findings {
            out.push_str(&format!(
                "\n## {} ({})\n\n```\n{}```\n",
                finding.input_path,
                finding.sha256,
                finding.finding.render()
            ));
        }
        for failure in &self.failures {
            out.push_str(&format!(
                "\n- FAIL {}: {}\n",
                failure.input_path, failure.reason
            ));
        }
        out
    }

    /// Render the report as JSON.
    #[must_use]
    pub fn to_json(&self) -> String {
        serde_json::to_string_pretty(self).unwrap_or_else(|e| format!("{{\"error\": \"{e}\"}}"))
    }
}
