#![no_main]
use std::sync::OnceLock;

use libfuzzer_sys::{Corpus, fuzz_target};
use triverdict_core::{Oracle, OracleConfig, OracleVerdict};

fn oracle() -> &'static Oracle {
    static ORACLE: OnceLock<Oracle> = OnceLock::new();
    ORACLE.get_or_init(|| Oracle::from_config(&OracleConfig::from_env()))
}

// Pass grows the corpus; skipped and failed inputs carry no signal.
fuzz_target!(|data: &[u8]| -> Corpus {
    match oracle().evaluate(data) {
        OracleVerdict::Pass => Corpus::Keep,
        OracleVerdict::Skip { .. } => Corpus::Reject,
        OracleVerdict::Fail { reason } => {
            eprintln!("oracle fail: {reason}");
            Corpus::Reject
        }
        OracleVerdict::Fatal { finding } => {
            eprintln!("program:\n{:?}", String::from_utf8_lossy(data));
            eprint!("{}", finding.render());
            panic!("{}", finding.summary);
        }
    }
});
