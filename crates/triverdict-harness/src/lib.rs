//! Harness for the triverdict oracle.
//!
//! This crate provides:
//! - Structured logging: JSONL records for every evaluated input
//! - Corpus replay: run a directory of inputs through the oracle
//! - Report generation: human-readable + machine-readable replay summaries

#![forbid(unsafe_code)]

pub mod report;
pub mod runner;
pub mod structured_log;

pub use report::ReplayReport;
pub use runner::{CaseResult, HarnessError, ReplayRunner};
