// enveye is a tool for comparing application environment snapshots
// Copyright (C) 2025  Peoples Grocers LLC
//
// This program is free software: you can redistribute it and/or modify
// it under the terms of the GNU Affero General Public License as published
// by the Free Software Foundation, either version 3 of the License, or
// (at your option) any later version.
//
// This program is distributed in the hope that it will be useful,
// but WITHOUT ANY WARRANTY; without even the implied warranty of
// MERCHANTABILITY or FITNESS FOR A PARTICULAR PURPOSE.  See the
// GNU Affero General Public License for more details.
//
// You should have received a copy of the GNU Affero General Public License
// along with this program.  If not, see <https://www.gnu.org/licenses/>.
//
// To purchase a license under different terms contact admin@peoplesgrocers.com
// To request changes, report bugs, or give user feedback contact
// marxism@peoplesgrocers.com
//

use crate::flags;
use enveye::{
    dispatch, CommandTransport, Diagnostic, DiagnosticCode, DiagnosticCollector, RemoteOutcome,
    Snapshot, DEFAULT_TEMPLATE, DEFAULT_TIMEOUT_SECS,
};
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

pub fn run(flags: &flags::Remote) -> Vec<Diagnostic> {
    let template = flags.template.as_deref().unwrap_or(DEFAULT_TEMPLATE);
    let transport = match CommandTransport::new(template) {
        Ok(transport) => transport,
        Err(diagnostic) => return vec![diagnostic],
    };
    let timeout = Duration::from_secs(flags.timeout.unwrap_or(DEFAULT_TIMEOUT_SECS));

    if let Some(dir) = &flags.save_dir {
        if let Err(e) = fs::create_dir_all(dir) {
            return vec![Diagnostic::fatal(
                DiagnosticCode::OutputWriteFailed,
                format!("I couldn't create the directory {}: {}", dir.display(), e),
            )];
        }
    }

    let results = match dispatch(&flags.hosts, &flags.command, &transport, timeout) {
        Ok(results) => results,
        Err(diagnostic) => return vec![diagnostic],
    };

    let mut diagnostics = DiagnosticCollector::new();
    for result in results {
        let outcome = match result {
            Ok(outcome) => outcome,
            Err(diagnostic) => {
                diagnostics.add(diagnostic);
                continue;
            }
        };

        println!("{}", status_line(&outcome));
        if let Some(diagnostic) = outcome.diagnostic() {
            diagnostics.add(diagnostic);
            continue;
        }

        match &flags.save_dir {
            Some(dir) => {
                if let Err(diagnostic) = save_snapshot(dir, &outcome) {
                    diagnostics.add(diagnostic);
                }
            }
            None => {
                let stdout = outcome.stdout.trim_end();
                if !stdout.is_empty() {
                    println!("{}", stdout);
                }
            }
        }
    }

    diagnostics.into_diagnostics()
}

fn status_line(outcome: &RemoteOutcome) -> String {
    let status = if outcome.timed_out {
        "timed out".to_string()
    } else {
        match outcome.exit_code {
            Some(0) => "ok".to_string(),
            Some(code) => format!("failed (exit code {})", code),
            None => "failed (killed by signal)".to_string(),
        }
    };
    format!("{}: {} in {} ms", outcome.host, status, outcome.duration_ms)
}

/// Host output must parse as a snapshot before it is written out.
fn save_snapshot(dir: &Path, outcome: &RemoteOutcome) -> Result<PathBuf, Diagnostic> {
    let snapshot = Snapshot::from_bytes(outcome.stdout.as_bytes(), &outcome.host)?;
    let path = dir.join(snapshot_filename(&outcome.host));

    let json = serde_json::to_string_pretty(snapshot.document()).map_err(|e| {
        Diagnostic::fatal(
            DiagnosticCode::OutputWriteFailed,
            format!("I couldn't serialize the snapshot from {}: {}", outcome.host, e),
        )
    })?;

    fs::write(&path, json + "\n").map_err(|e| {
        Diagnostic::fatal(
            DiagnosticCode::OutputWriteFailed,
            format!("I couldn't write {}: {}", path.display(), e),
        )
    })?;

    println!("  saved {}", path.display());
    Ok(path)
}

fn snapshot_filename(host: &str) -> String {
    format!("{}.json", host.replace(':', "_"))
}
