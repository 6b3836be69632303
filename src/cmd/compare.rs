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
    compare_snapshots, explain_with_config, Diagnostic, DiagnosticCode, DiagnosticCollector,
    DiffOptions, DiffReport, ProviderConfig, Snapshot, SnapshotPath,
};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum OutputFormat {
    Text,
    Json,
}

pub fn run(flags: &flags::Compare) -> Vec<Diagnostic> {
    let format = match parse_output_format(flags.output.as_deref()) {
        Ok(format) => format,
        Err(diagnostic) => return vec![diagnostic],
    };

    let mut options = DiffOptions::new();
    for pointer in &flags.ordered {
        match SnapshotPath::parse(pointer) {
            Ok(path) => options = options.ordered_at(path),
            Err(diagnostic) => return vec![diagnostic],
        }
    }

    // Report both unreadable inputs at once rather than one per run.
    let (old, new) = match (Snapshot::load(&flags.old), Snapshot::load(&flags.new)) {
        (Ok(old), Ok(new)) => (old, new),
        (old, new) => {
            return [old.err(), new.err()].into_iter().flatten().collect();
        }
    };

    let mut diagnostics = DiagnosticCollector::new();
    let report = match compare_snapshots(&old, &new, &options, &mut diagnostics) {
        Ok(report) => report,
        Err(diagnostic) => {
            diagnostics.add(diagnostic);
            return diagnostics.into_diagnostics();
        }
    };

    match format {
        OutputFormat::Json => match report.to_json_pretty() {
            Ok(json) => println!("{}", json),
            Err(diagnostic) => diagnostics.add(diagnostic),
        },
        OutputFormat::Text => {
            println!("Old: {}", old.describe());
            println!("New: {}", new.describe());
            println!();
            if !report.is_empty() {
                println!("{}", report.render_table());
            }
            println!("{}", report.summary());
        }
    }

    if flags.explain {
        if let Err(diagnostic) = print_explanation(&report, format) {
            diagnostics.add(diagnostic);
        }
    }

    diagnostics.into_diagnostics()
}

fn print_explanation(report: &DiffReport, format: OutputFormat) -> Result<(), Diagnostic> {
    let explanation = explain_with_config(report, ProviderConfig::from_env())?;

    // Keep stdout parseable when it carries the JSON report.
    match format {
        OutputFormat::Json => eprintln!("{}", explanation),
        OutputFormat::Text => {
            println!();
            println!("Explanation:");
            println!("{}", explanation);
        }
    }
    Ok(())
}

fn parse_output_format(output: Option<&str>) -> Result<OutputFormat, Diagnostic> {
    match output {
        None | Some("text") => Ok(OutputFormat::Text),
        Some("json") => Ok(OutputFormat::Json),
        Some(other) => Err(Diagnostic::fatal(
            DiagnosticCode::InvalidFlag,
            format!("I don't know the output format '{}'.", other),
        )
        .with_advice("Use --output text or --output json.".to_string())),
    }
}
