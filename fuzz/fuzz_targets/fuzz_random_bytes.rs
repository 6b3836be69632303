#![no_main]

use enveye::{compare_snapshots, DiagnosticCollector, DiffOptions, Snapshot};
use libfuzzer_sys::fuzz_target;
use std::io::Write;
use tempfile::NamedTempFile;

fuzz_target!(|data: &[u8]| {
    // Loading goes through compression sniffing first, so go via a real file.
    if let Ok(mut temp_file) = NamedTempFile::new() {
        if temp_file.write_all(data).is_ok() {
            if let Ok(snapshot) = Snapshot::load(temp_file.path()) {
                // Anything that loads must compare cleanly against itself
                let mut diagnostics = DiagnosticCollector::new();
                if let Ok(report) =
                    compare_snapshots(&snapshot, &snapshot, &DiffOptions::new(), &mut diagnostics)
                {
                    assert!(report.is_empty());
                }
            }
        }
    }

    if let Err(diagnostic) = Snapshot::from_bytes(data, "fuzz") {
        assert!(!diagnostic.description.is_empty());
    }
});
