//! # triverdict-core
//!
//! Differential-testing oracle for Go toolchains.
//!
//! Each candidate input is validated by a reference front end (parse, type
//! check, SSA lowering), by gc and by gccgo. The three verdicts are then run
//! through an ordered, append-only rule table that absorbs already-triaged
//! divergences and crashes. Anything the table does not explain is `Fatal`.
//!
//! This crate provides:
//! - Pattern library: byte-level pre-filters, input guards and crash signatures
//! - Adapters: the reference pipeline and the external compilers
//! - Rule table and first-match-wins classifier
//! - Reformat round-trip check for programs every arm accepted
//! - [`Oracle::evaluate`], the per-input entry point

#![forbid(unsafe_code)]

pub mod adapter;
pub mod classifier;
pub mod compiler;
pub mod config;
pub mod error;
pub mod frontend;
pub mod oracle;
pub mod patterns;
pub mod reformat;
pub mod rules;
pub mod verdict;

pub use adapter::Validator;
pub use classifier::{Classification, classify};
pub use config::{Arms, Execution, OracleConfig};
pub use error::{AdapterError, FormatError, StageError};
pub use oracle::{Evaluation, Oracle};
pub use reformat::SourceFormatter;
pub use rules::{RULES, Rule};
pub use verdict::{Arm, Finding, FindingKind, OracleVerdict, Outcome, SkipReason, Verdict, Verdicts};
