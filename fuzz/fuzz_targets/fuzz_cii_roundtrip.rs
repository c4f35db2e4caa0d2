#![no_main]

use libfuzzer_sys::fuzz_target;
use vatsplit::cii::{self, TotalsPolicy};

fuzz_target!(|data: &[u8]| {
    if let Ok(s) = std::str::from_utf8(data) {
        // Parse, compute, serialize and verify: no step may panic.
        if let Ok(doc) = cii::from_cii_xml(s) {
            let computation = doc.invoice.compute_tax();
            let _ = doc.invoice.amount_due(&computation.totals);
            let _ = cii::from_cii_xml_with(s, TotalsPolicy::Verify);
            if let Ok(xml) = cii::to_cii_xml(&doc.invoice) {
                let _ = cii::from_cii_xml_with(&xml, TotalsPolicy::Verify);
            }
        }
    }
});
