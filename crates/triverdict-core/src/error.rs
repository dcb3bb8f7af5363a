//! Error taxonomy for adapters and the formatter.
//!
//! Ordinary rejections and crashes are *verdicts*, not errors. The types here
//! cover the remaining cases: a stage reporting back to its adapter, and
//! infrastructure that failed before any verdict could be produced.

use std::path::PathBuf;

use thiserror::Error;

/// Failure reported by one reference front-end stage.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum StageError {
    /// The program is not valid; becomes an `Invalid` verdict.
    #[error("{0}")]
    Rejected(String),
    /// The stage itself faulted; becomes a `Crashed` verdict.
    #[error("internal fault: {0}")]
    Fault(String),
    /// The stage's tooling could not run; no verdict is possible.
    #[error("unavailable: {0}")]
    Unavailable(String),
}

/// An adapter could not produce a verdict at all.
#[derive(Debug, Error)]
pub enum AdapterError {
    #[error("creating scratch file in {dir}: {source}")]
    Scratch {
        dir: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("writing candidate input: {0}")]
    Write(#[source] std::io::Error),
    #[error("spawning {program}: {source}")]
    Spawn {
        program: String,
        #[source]
        source: std::io::Error,
    },
    #[error("reference {stage} stage unavailable: {message}")]
    Unavailable { stage: &'static str, message: String },
    #[error("waiting for {program}: {source}")]
    Wait {
        program: String,
        #[source]
        source: std::io::Error,
    },
}

/// The formatter refused or failed on its input.
#[derive(Debug, Error)]
pub enum FormatError {
    #[error("{0}")]
    Rejected(String),
    #[error(transparent)]
    Adapter(#[from] AdapterError),
}
