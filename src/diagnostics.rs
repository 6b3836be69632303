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

use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DiagnosticLevel {
    Fatal,
    Warning,
    Info,
}

impl fmt::Display for DiagnosticLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DiagnosticLevel::Fatal => write!(f, "error"),
            DiagnosticLevel::Warning => write!(f, "warning"),
            DiagnosticLevel::Info => write!(f, "info"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DiagnosticCode {
    FileNotFound,
    EmptyFile,
    InvalidJson,
    DecompressionFailed,

    InvalidSnapshotFormat,
    MissingEnvironmentContext,

    InvalidPathSyntax,
    PathNotFound,

    InvalidReport,
    OutputWriteFailed,

    ExplanationFailed,
    ProviderMisconfigured,

    NoRemoteHosts,
    RemoteCommandFailed,
    RemoteTimeout,

    AppFolderNotFound,
    FactCollectionFailed,
    ConfigFileMissing,

    InvalidFlag,
}

impl DiagnosticCode {
    pub fn as_str(&self) -> &'static str {
        match self {
            DiagnosticCode::FileNotFound => "E001",
            DiagnosticCode::EmptyFile => "E002",
            DiagnosticCode::InvalidJson => "E003",
            DiagnosticCode::DecompressionFailed => "E004",

            DiagnosticCode::InvalidSnapshotFormat => "E010",
            DiagnosticCode::MissingEnvironmentContext => "W011",

            DiagnosticCode::InvalidPathSyntax => "E020",
            DiagnosticCode::PathNotFound => "E021",

            DiagnosticCode::InvalidReport => "E030",
            DiagnosticCode::OutputWriteFailed => "E031",

            DiagnosticCode::ExplanationFailed => "E040",
            DiagnosticCode::ProviderMisconfigured => "E041",

            DiagnosticCode::NoRemoteHosts => "E050",
            DiagnosticCode::RemoteCommandFailed => "E051",
            DiagnosticCode::RemoteTimeout => "W052",

            DiagnosticCode::AppFolderNotFound => "E060",
            DiagnosticCode::FactCollectionFailed => "W061",
            DiagnosticCode::ConfigFileMissing => "W062",

            DiagnosticCode::InvalidFlag => "E070",
        }
    }

    pub fn title(&self) -> &'static str {
        match self {
            DiagnosticCode::FileNotFound => "File not found",
            DiagnosticCode::EmptyFile => "Empty file",
            DiagnosticCode::InvalidJson => "Invalid JSON",
            DiagnosticCode::DecompressionFailed => "Decompression failed",

            DiagnosticCode::InvalidSnapshotFormat => "Invalid snapshot format",
            DiagnosticCode::MissingEnvironmentContext => "Missing environment context",

            DiagnosticCode::InvalidPathSyntax => "Invalid path syntax",
            DiagnosticCode::PathNotFound => "Path not found",

            DiagnosticCode::InvalidReport => "Invalid diff report",
            DiagnosticCode::OutputWriteFailed => "Could not write output",

            DiagnosticCode::ExplanationFailed => "Explanation failed",
            DiagnosticCode::ProviderMisconfigured => "Explanation provider misconfigured",

            DiagnosticCode::NoRemoteHosts => "No remote hosts",
            DiagnosticCode::RemoteCommandFailed => "Remote command failed",
            DiagnosticCode::RemoteTimeout => "Remote command timed out",

            DiagnosticCode::AppFolderNotFound => "Application folder not found",
            DiagnosticCode::FactCollectionFailed => "Fact collection failed",
            DiagnosticCode::ConfigFileMissing => "Config file missing",

            DiagnosticCode::InvalidFlag => "Invalid flag",
        }
    }
}

#[derive(Debug, Clone)]
pub struct Diagnostic {
    pub filename: Option<String>,
    pub line_number: Option<usize>,
    pub column: Option<usize>,
    pub level: DiagnosticLevel,
    pub code: DiagnosticCode,
    pub description: String,
    pub code_snippet: Option<String>,
    pub advice: Option<String>,
}

impl Diagnostic {
    pub fn new(level: DiagnosticLevel, code: DiagnosticCode, description: String) -> Self {
        Self {
            filename: None,
            line_number: None,
            column: None,
            level,
            code,
            description,
            code_snippet: None,
            advice: None,
        }
    }

    pub fn fatal(code: DiagnosticCode, description: String) -> Self {
        Self::new(DiagnosticLevel::Fatal, code, description)
    }

    pub fn warning(code: DiagnosticCode, description: String) -> Self {
        Self::new(DiagnosticLevel::Warning, code, description)
    }

    pub fn with_location(mut self, filename: String, line_number: usize) -> Self {
        self.filename = Some(filename);
        self.line_number = Some(line_number);
        self
    }

    pub fn with_column(mut self, column: usize) -> Self {
        self.column = Some(column);
        self
    }

    pub fn with_snippet(mut self, snippet: String) -> Self {
        self.code_snippet = Some(snippet);
        self
    }

    pub fn with_advice(mut self, advice: String) -> Self {
        self.advice = Some(advice);
        self
    }

    pub fn is_fatal(&self) -> bool {
        self.level == DiagnosticLevel::Fatal
    }
}

impl fmt::Display for Diagnostic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if let Some(filename) = &self.filename {
            match (self.line_number, self.column) {
                (Some(line), Some(col)) => write!(f, "{}:{}:{} - ", filename, line, col)?,
                (Some(line), None) => write!(f, "{}:{} - ", filename, line)?,
                _ => write!(f, "{} - ", filename)?,
            }
        }

        writeln!(
            f,
            "{} {}: {}",
            self.level,
            self.code.as_str(),
            self.code.title()
        )?;
        writeln!(f)?;
        writeln!(f, "{}", self.description)?;

        if let Some(snippet) = &self.code_snippet {
            writeln!(f)?;
            writeln!(f, "{}", snippet)?;
        }

        if let Some(advice) = &self.advice {
            writeln!(f)?;
            writeln!(f, "{}", advice)?;
        }

        Ok(())
    }
}

#[derive(Debug, Default)]
pub struct DiagnosticCollector {
    diagnostics: Vec<Diagnostic>,
}

impl DiagnosticCollector {
    pub fn new() -> Self {
        Self {
            diagnostics: Vec::new(),
        }
    }

    pub fn add(&mut self, diagnostic: Diagnostic) {
        self.diagnostics.push(diagnostic);
    }

    pub fn extend<I: IntoIterator<Item = Diagnostic>>(&mut self, diagnostics: I) {
        self.diagnostics.extend(diagnostics);
    }

    pub fn has_fatal(&self) -> bool {
        self.diagnostics.iter().any(|d| d.is_fatal())
    }

    pub fn diagnostics(&self) -> &[Diagnostic] {
        &self.diagnostics
    }

    pub fn into_diagnostics(self) -> Vec<Diagnostic> {
        self.diagnostics
    }

    pub fn is_empty(&self) -> bool {
        self.diagnostics.is_empty()
    }

    pub fn len(&self) -> usize {
        self.diagnostics.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_display_with_location_and_advice() {
        let diagnostic = Diagnostic::fatal(
            DiagnosticCode::InvalidJson,
            "I couldn't parse this file as JSON".to_string(),
        )
        .with_location("before.json".to_string(), 3)
        .with_column(7)
        .with_advice("Check for a trailing comma.".to_string());

        let rendered = diagnostic.to_string();
        assert!(rendered.starts_with("before.json:3:7 - error E003: Invalid JSON"));
        assert!(rendered.contains("I couldn't parse this file as JSON"));
        assert!(rendered.ends_with("Check for a trailing comma.\n"));
    }

    #[test]
    fn test_display_filename_only() {
        let diagnostic = Diagnostic::warning(
            DiagnosticCode::MissingEnvironmentContext,
            "no context".to_string(),
        )
        .with_location("a.json".to_string(), 1);
        let mut without_line = diagnostic.clone();
        without_line.line_number = None;

        assert!(without_line.to_string().starts_with("a.json - warning W011"));
    }

    #[test]
    fn test_collector_tracks_fatal() {
        let mut collector = DiagnosticCollector::new();
        assert!(collector.is_empty());

        collector.add(Diagnostic::warning(
            DiagnosticCode::RemoteTimeout,
            "slow host".to_string(),
        ));
        assert!(!collector.has_fatal());

        collector.extend(vec![Diagnostic::fatal(
            DiagnosticCode::NoRemoteHosts,
            "nothing to do".to_string(),
        )]);
        assert!(collector.has_fatal());
        assert_eq!(collector.len(), 2);
        assert_eq!(collector.into_diagnostics()[1].code, DiagnosticCode::NoRemoteHosts);
    }
}
