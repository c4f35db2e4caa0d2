#![no_main]

use libfuzzer_sys::fuzz_target;

fuzz_target!(|data: &[u8]| {
    if let Ok(s) = std::str::from_utf8(data) {
        // Errors are expected, panics are not.
        let _ = vatsplit::cii::from_cii_xml(s);
    }
});
