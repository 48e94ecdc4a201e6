#![no_main]
use libfuzzer_sys::fuzz_target;
use xmlscan::ElementScanner;

fuzz_target!(|data: &[u8]| {
    let mut scanner = ElementScanner::new();
    for pattern in ["*", "a//b", "item[@id]", "x[. = 'y']"] {
        let _ = scanner.listen(pattern, |_, doc, node| {
            let _ = doc.extract_subtree(node);
            Ok(())
        });
    }
    // Scanning should never panic, whatever the input bytes.
    let _ = scanner.parse_bytes(data);
});
