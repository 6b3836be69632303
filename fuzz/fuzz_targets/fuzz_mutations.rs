#![no_main]

use enveye::{compare_snapshots, DiagnosticCollector, DiffOptions, Snapshot};
use libfuzzer_sys::fuzz_target;

const BASELINE: &str = r#"{
  "application_name": "SampleApp",
  "application_type": "desktop",
  "environment_context": {
    "os_info": {"name": "Windows", "version": "10.0.19045", "build": "19045", "architecture": "x86_64"},
    "dotnet_frameworks_installed": ["4.8.04084", "4.0.0.0"],
    "app_folder_dlls": {
      "Core.dll": {"file_version": "1.2.3.4", "assembly_version": "1.2.0.0"},
      "Data.dll": {"file_version": "Unknown", "assembly_version": "Unknown", "error": "not an assembly"}
    },
    "app_config_settings": {"app_settings": {"Mode": "Production"}, "connection_strings": {"Main": "Server=db01"}},
    "critical_registry_keys": {"HKEY_LOCAL_MACHINE\\SOFTWARE\\SampleApp\\Settings": {"InstallDir": "C:\\App"}},
    "required_services_status": {"W3SVC": "Running", "MSSQL$SQLEXPRESS": "Stopped"},
    "critical_environment_variables": {"APP_ENV": "prod", "ENVIRONMENT": "Not Set"}
  },
  "timestamp": "2025-01-01T00:00:00.000000Z"
}"#;

fn mutate(data: &[u8]) -> Vec<u8> {
    let mut result = BASELINE.as_bytes().to_vec();

    // Keep mutations small and realistic
    let max_size = 8192;

    for (i, &byte) in data.iter().take(16).enumerate() {
        if result.len() > max_size {
            break;
        }

        match byte % 8 {
            0 => {
                // Truncate at random position
                let pos = (byte as usize) % result.len().max(1);
                result.truncate(pos);
            }
            1 => {
                // Insert invalid UTF-8
                let pos = (byte as usize) % (result.len() + 1);
                result.insert(pos, 0xFF);
            }
            2 => {
                // Corrupt a quote
                if let Some(pos) = result.iter().position(|&b| b == b'"') {
                    result[pos] = b'X';
                }
            }
            3 => {
                // Turn a mapping into a sequence
                if let Some(pos) = result.iter().skip(1).position(|&b| b == b'{') {
                    result[pos + 1] = b'[';
                }
            }
            4 => {
                // Corrupt a bracket
                if let Some(pos) = result.iter().position(|&b| b == b'[' || b == b'{') {
                    result[pos] = b'?';
                }
            }
            5 => {
                // Insert random byte
                let pos = (byte as usize) % (result.len() + 1);
                result.insert(pos, byte);
            }
            6 => {
                // Remove a character
                if !result.is_empty() {
                    let pos = (byte as usize) % result.len();
                    result.remove(pos);
                }
            }
            _ => {
                // Add a sibling value
                let insertion = format!("\"fuzz{}\": [{}, null], ", i, byte);
                let pos = result
                    .iter()
                    .position(|&b| b == b'{')
                    .map(|p| p + 1)
                    .unwrap_or(0);
                result.splice(pos..pos, insertion.bytes());
            }
        }
    }

    result
}

fuzz_target!(|data: &[u8]| {
    let baseline = Snapshot::from_bytes(BASELINE.as_bytes(), "baseline").unwrap();
    let mutated = match Snapshot::from_bytes(&mutate(data), "mutated") {
        Ok(snapshot) => snapshot,
        Err(diagnostic) => {
            assert!(diagnostic.is_fatal());
            return;
        }
    };

    let mut diagnostics = DiagnosticCollector::new();
    if let Ok(report) =
        compare_snapshots(&baseline, &mutated, &DiffOptions::new(), &mut diagnostics)
    {
        let old = baseline.context(&mut diagnostics).unwrap();
        let new = mutated.context(&mut diagnostics).unwrap();
        for entry in &report {
            let location = entry.location();
            assert!(location.exists_in(&old) || location.exists_in(&new));
        }
        // The table renderer must cope with any value
        let _ = report.render_table();
    }
});
