#![no_main]
use libfuzzer_sys::fuzz_target;
use triverdict_core::patterns::{self, Pattern};
use triverdict_core::{Classification, Verdict, Verdicts, classify};

fuzz_target!(|data: &[u8]| {
    for pattern in Pattern::ALL {
        let _ = pattern.is_match(data);
    }
    let _ = patterns::pre_filter(data);
    let _ = patterns::reformat_exemption(data);

    // A divergent verdict set is always either explained or escalated.
    let text = String::from_utf8_lossy(data);
    let crashed = patterns::crash_signature(data).is_some();
    let gccgo = if crashed {
        Verdict::crashed("exit status: 1", data.to_vec())
    } else {
        Verdict::invalid(text.as_ref())
    };
    let verdicts = Verdicts {
        reference: Verdict::valid(),
        gc: Some(Verdict::valid()),
        gccgo,
    };
    assert!(!matches!(
        classify(data, &verdicts),
        Classification::AllValid | Classification::AllInvalid
    ));
});
