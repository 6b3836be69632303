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
    AppType, CollectRequest, Collector, Diagnostic, DiagnosticCode, DiagnosticCollector, PowerShell,
};
use std::fs;
use std::path::{Path, PathBuf};

const DEFAULT_OUTPUT: &str = "context_snapshot.json";

pub fn run(flags: &flags::Collect) -> Vec<Diagnostic> {
    let request = match build_request(flags) {
        Ok(request) => request,
        Err(diagnostic) => return vec![diagnostic],
    };

    let shell = PowerShell;
    let env = |name: &str| std::env::var(name).ok();
    let collector = Collector::new(&shell, &env);

    let mut diagnostics = DiagnosticCollector::new();
    let document = match collector.collect(&request, &mut diagnostics) {
        Ok(document) => document,
        Err(diagnostic) => {
            diagnostics.add(diagnostic);
            return diagnostics.into_diagnostics();
        }
    };

    let json = match serde_json::to_string_pretty(&document) {
        Ok(json) => json,
        Err(e) => {
            diagnostics.add(Diagnostic::fatal(
                DiagnosticCode::OutputWriteFailed,
                format!("I couldn't serialize the snapshot: {}", e),
            ));
            return diagnostics.into_diagnostics();
        }
    };

    let output = flags
        .output
        .clone()
        .unwrap_or_else(|| PathBuf::from(DEFAULT_OUTPUT));

    if output == Path::new("-") {
        println!("{}", json);
    } else if let Err(e) = fs::write(&output, json + "\n") {
        diagnostics.add(
            Diagnostic::fatal(
                DiagnosticCode::OutputWriteFailed,
                format!("I couldn't write the snapshot to {}: {}", output.display(), e),
            )
            .with_advice("Check that the directory exists and is writable.".to_string()),
        );
    } else {
        println!("Context snapshot saved to {}", output.display());
    }

    diagnostics.into_diagnostics()
}

/// Repeated flags replace the stock lists rather than extend them.
fn build_request(flags: &flags::Collect) -> Result<CollectRequest, Diagnostic> {
    let app_type: AppType = flags.app_type.parse()?;

    let mut request = CollectRequest::new(flags.app_folder.clone(), app_type);
    if !flags.service.is_empty() {
        request.services = flags.service.clone();
    }
    if !flags.env_var.is_empty() {
        request.env_vars = flags.env_var.clone();
    }
    if !flags.registry_key.is_empty() {
        request.registry_keys = flags.registry_key.clone();
    }
    Ok(request)
}
