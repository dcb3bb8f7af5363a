//! CLI entrypoint for the triverdict oracle harness.

use std::path::PathBuf;

use clap::{Args, Parser, Subcommand};
use triverdict_core::{Arms, Execution, Oracle, OracleConfig, RULES, rules};
use triverdict_harness::ReplayRunner;
use triverdict_harness::structured_log::{LogEmitter, validate_log_file};

/// Differential oracle for Go toolchains.
#[derive(Debug, Parser)]
#[command(name = "harness")]
#[command(about = "Three-way differential oracle for go/types, gc and gccgo")]
struct Cli {
    #[command(flatten)]
    oracle: OracleFlags,
    #[command(subcommand)]
    command: Command,
}

/// Overrides applied on top of the `TRIVERDICT_*` environment.
#[derive(Debug, Args)]
struct OracleFlags {
    /// Compare go/types against gccgo only; gc is not run.
    #[arg(long, global = true)]
    two_way: bool,
    /// Re-validate gofmt output with the reference front end.
    #[arg(long, global = true)]
    verify_reformat: bool,
    /// Run gc and gccgo concurrently.
    #[arg(long, global = true)]
    concurrent: bool,
}

impl OracleFlags {
    fn config(&self) -> OracleConfig {
        let mut config = OracleConfig::from_env();
        if self.two_way {
            config.arms = Arms::Two;
        }
        if self.verify_reformat {
            config.verify_reformat = true;
        }
        if self.concurrent {
            config.execution = Execution::ConcurrentExternals;
        }
        config
    }
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Evaluate one input and print the verdict as JSON.
    Evaluate {
        #[arg(long)]
        input: PathBuf,
    },
    /// Evaluate every file in a corpus directory.
    Replay {
        #[arg(long)]
        corpus: PathBuf,
        /// Structured JSONL log path.
        #[arg(long)]
        log: Option<PathBuf>,
        /// Output report path (JSON); a markdown copy is written alongside.
        #[arg(long)]
        report: Option<PathBuf>,
        /// Campaign name used in trace ids.
        #[arg(long, default_value = "replay")]
        campaign: String,
    },
    /// Print the ordered classification rule table.
    Rules {
        #[arg(long)]
        json: bool,
    },
    /// Validate a structured log file.
    CheckLog {
        #[arg(long)]
        log: PathBuf,
    },
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    match cli.command {
        Command::Evaluate { input } => {
            let oracle = Oracle::from_config(&cli.oracle.config());
            let runner = ReplayRunner::new(&oracle, "evaluate");
            let case = runner.evaluate_file(&input)?;
            println!("{}", serde_json::to_string_pretty(&case.verdict)?);
            if let triverdict_core::OracleVerdict::Fatal { finding } = &case.verdict {
                eprint!("{}", finding.render());
                return Err(format!("fatal finding for {}", input.display()).into());
            }
        }
        Command::Replay {
            corpus,
            log,
            report,
            campaign,
        } => {
            let oracle = Oracle::from_config(&cli.oracle.config());
            let runner = ReplayRunner::new(&oracle, &campaign);
            let run_id = format!("run-{}", std::process::id());
            let mut emitter = match &log {
                Some(path) => Some(LogEmitter::to_file(path, &run_id, &campaign)?),
                None => None,
            };
            eprintln!("Replaying corpus {}", corpus.display());
            let summary = runner.run(&corpus, emitter.as_mut())?;
            eprintln!(
                "Replay complete: total={}, pass={}, skip={}, fail={}, fatal={}",
                summary.total, summary.pass, summary.skip, summary.fail, summary.fatal
            );
            if let Some(report_path) = report {
                eprintln!("Writing report to {}", report_path.display());
                std::fs::write(&report_path, summary.to_json())?;
                std::fs::write(report_path.with_extension("md"), summary.to_markdown())?;
            }
            for finding in &summary.findings {
                eprintln!("--- {}\n{}", finding.input_path, finding.finding.render());
            }
            if summary.has_findings() {
                return Err(format!("{} fatal finding(s)", summary.fatal).into());
            }
        }
        Command::Rules { json } => {
            let problems = rules::audit(RULES);
            if json {
                println!("{}", serde_json::to_string_pretty(RULES)?);
            } else {
                for (idx, rule) in RULES.iter().enumerate() {
                    let trackers: Vec<String> =
                        rule.tracker.iter().map(|n| format!("go#{n}")).collect();
                    println!(
                        "{idx:3} {:<40} {:<24} {}",
                        rule.name,
                        disposition_label(rule),
                        trackers.join(",")
                    );
                }
            }
            for problem in &problems {
                eprintln!("audit: {problem}");
            }
            if !problems.is_empty() {
                return Err(format!("{} rule table problem(s)", problems.len()).into());
            }
        }
        Command::CheckLog { log } => {
            let (lines, errors) = validate_log_file(&log)?;
            for error in &errors {
                eprintln!("{error}");
            }
            eprintln!("{}: {lines} line(s), {} error(s)", log.display(), errors.len());
            if !errors.is_empty() {
                return Err("structured log validation failed".into());
            }
        }
    }

    Ok(())
}

fn disposition_label(rule: &triverdict_core::Rule) -> String {
    match rule.disposition {
        rules::Disposition::Suppress => String::from("suppress"),
        rules::Disposition::CrashEscalate(arm) => format!("escalate-crash({arm})"),
        rules::Disposition::DisagreementEscalate => String::from("escalate-disagreement"),
    }
}
