#![no_main]
use libfuzzer_sys::fuzz_target;
use xmlscan::Pattern;

fuzz_target!(|data: &[u8]| {
    if let Ok(source) = std::str::from_utf8(data) {
        if let Ok(pattern) = Pattern::compile(source) {
            // Compiled patterns must evaluate without panicking.
            let _ = pattern.matches_path(&["root", "a", "b"]);
            if let Ok(doc) =
                xmlscan::Document::parse_str("<root a=\"1\"><b>2</b><!-- c --><b/>text</root>")
            {
                let _ = pattern.matches_node(&doc, doc.roots()[0]);
            }
        }
    }
});
