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

//! Reading snapshot documents from disk.
//!
//! A snapshot document is a JSON object whose `environment_context` key holds
//! the tree that gets compared. Everything else in the document (application
//! name, timestamp, snapshot id) is metadata for people and is ignored by the
//! differ.
//!
//! Snapshots copied off remote hosts are often compressed, so the loader
//! sniffs gzip and zstd magic bytes and accepts brotli when the file name ends
//! in `.br`.

use crate::diagnostics::{Diagnostic, DiagnosticCode, DiagnosticCollector};
use crate::diff::{diff_with_options, DiffOptions};
use crate::path::ValueTypeExt;
use crate::report::DiffReport;
use chrono::{DateTime, Utc};
use serde_json::{Map, Value};
use std::borrow::Cow;
use std::fs;
use std::path::Path;

pub const CONTEXT_KEY: &str = "environment_context";

const GZIP_MAGIC: [u8; 2] = [0x1f, 0x8b];
const ZSTD_MAGIC: [u8; 4] = [0x28, 0xb5, 0x2f, 0xfd];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Compression {
    None,
    Gzip,
    Zstd,
    Brotli,
}

pub fn detect_compression(bytes: &[u8], path: &Path) -> Compression {
    if bytes.starts_with(&GZIP_MAGIC) {
        Compression::Gzip
    } else if bytes.starts_with(&ZSTD_MAGIC) {
        Compression::Zstd
    } else if path.extension().and_then(|e| e.to_str()) == Some("br") {
        Compression::Brotli
    } else {
        Compression::None
    }
}

#[derive(Debug, Clone)]
pub struct Snapshot {
    source: String,
    document: Value,
}

impl Snapshot {
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self, Diagnostic> {
        let path = path.as_ref();
        let source = path.display().to_string();

        if !path.exists() {
            return Err(Diagnostic::fatal(
                DiagnosticCode::FileNotFound,
                format!("I couldn't find the snapshot file: {}", source),
            )
            .with_advice(
                "Make sure the file path is correct and the file exists. \
                 Check for typos in the filename."
                    .to_string(),
            ));
        }

        let raw = fs::read(path).map_err(|e| {
            Diagnostic::fatal(
                DiagnosticCode::FileNotFound,
                format!("I couldn't read the snapshot file {}: {}", source, e),
            )
        })?;

        let bytes = decompress(raw, path)?;
        Self::from_bytes(&bytes, &source)
    }

    pub fn from_bytes(bytes: &[u8], source: &str) -> Result<Self, Diagnostic> {
        if bytes.iter().all(|b| b.is_ascii_whitespace()) {
            return Err(Diagnostic::fatal(
                DiagnosticCode::EmptyFile,
                format!("The snapshot {} is empty.", source),
            ));
        }

        let document: Value = serde_json::from_slice(bytes).map_err(|e| {
            let mut diagnostic = Diagnostic::fatal(
                DiagnosticCode::InvalidJson,
                format!("I couldn't parse the snapshot as JSON: {}", e),
            )
            .with_location(source.to_string(), e.line())
            .with_column(e.column());

            if let Some(snippet) = snippet_at(bytes, e.line(), e.column()) {
                diagnostic = diagnostic.with_snippet(snippet);
            }
            diagnostic
        })?;

        Self::from_value(document, source)
    }

    pub fn from_value(document: Value, source: &str) -> Result<Self, Diagnostic> {
        if !document.is_object() {
            return Err(Diagnostic::fatal(
                DiagnosticCode::InvalidSnapshotFormat,
                format!(
                    "A snapshot document must be a JSON object, but {} holds a {}.",
                    source,
                    document.type_name()
                ),
            )
            .with_location(source.to_string(), 1)
            .with_advice(format!(
                "Snapshots written by `enveye collect` look like {{\"{}\": {{...}}, ...}}.",
                CONTEXT_KEY
            )));
        }

        Ok(Self {
            source: source.to_string(),
            document,
        })
    }

    pub fn source(&self) -> &str {
        &self.source
    }

    pub fn document(&self) -> &Value {
        &self.document
    }

    pub fn application_name(&self) -> Option<&str> {
        self.document.get("application_name").and_then(Value::as_str)
    }

    pub fn timestamp(&self) -> Option<DateTime<Utc>> {
        self.document
            .get("timestamp")
            .and_then(Value::as_str)
            .and_then(|s| s.parse().ok())
    }

    /// One-line description used in command output headers.
    pub fn describe(&self) -> String {
        let mut parts = vec![self.source.clone()];
        if let Some(name) = self.application_name() {
            parts.push(name.to_string());
        }
        if let Some(ts) = self.timestamp() {
            parts.push(ts.format("%a %H:%M:%S %d-%b-%Y").to_string());
        }
        parts.join(", ")
    }

    /// The tree under `environment_context`. A document without one compares
    /// as an empty mapping and leaves a warning behind.
    pub fn context(&self, diagnostics: &mut DiagnosticCollector) -> Result<Cow<'_, Value>, Diagnostic> {
        match self.document.get(CONTEXT_KEY) {
            Some(context) if context.is_object() => Ok(Cow::Borrowed(context)),
            Some(other) => Err(Diagnostic::fatal(
                DiagnosticCode::InvalidSnapshotFormat,
                format!(
                    "I expected \"{}\" in {} to be a mapping, but it is a {}.",
                    CONTEXT_KEY,
                    self.source,
                    other.type_name()
                ),
            )
            .with_location(self.source.clone(), 1)),
            None => {
                diagnostics.add(
                    Diagnostic::warning(
                        DiagnosticCode::MissingEnvironmentContext,
                        format!(
                            "{} has no \"{}\" key, so I compared it as if it were empty.",
                            self.source, CONTEXT_KEY
                        ),
                    )
                    .with_location(self.source.clone(), 1),
                );
                Ok(Cow::Owned(Value::Object(Map::new())))
            }
        }
    }
}

/// Diffs the environment contexts of two snapshots.
pub fn compare_snapshots(
    old: &Snapshot,
    new: &Snapshot,
    options: &DiffOptions,
    diagnostics: &mut DiagnosticCollector,
) -> Result<DiffReport, Diagnostic> {
    let old_context = old.context(diagnostics)?;
    let new_context = new.context(diagnostics)?;
    diff_with_options(&old_context, &new_context, options)
}

fn snippet_at(bytes: &[u8], line: usize, column: usize) -> Option<String> {
    let text = std::str::from_utf8(bytes).ok()?;
    let line_text = text.lines().nth(line.checked_sub(1)?)?;
    if line_text.len() > 200 {
        return None;
    }
    let caret = format!("{}^", " ".repeat(column.saturating_sub(1)));
    Some(format!("    {}\n    {}", line_text, caret))
}

#[cfg(feature = "compression")]
fn decompress(bytes: Vec<u8>, path: &Path) -> Result<Vec<u8>, Diagnostic> {
    let compression = detect_compression(&bytes, path);
    let decoded = match compression {
        Compression::None => return Ok(bytes),
        Compression::Gzip => read_all(flate2::read::GzDecoder::new(&bytes[..])),
        Compression::Zstd => zstd::stream::decode_all(&bytes[..]),
        Compression::Brotli => read_all(brotli::Decompressor::new(&bytes[..], 4096)),
    };

    decoded.map_err(|e| {
        Diagnostic::fatal(
            DiagnosticCode::DecompressionFailed,
            format!(
                "I couldn't decompress {} as {:?}: {}",
                path.display(),
                compression,
                e
            ),
        )
    })
}

#[cfg(feature = "compression")]
fn read_all<R: std::io::Read>(mut reader: R) -> std::io::Result<Vec<u8>> {
    let mut out = Vec::new();
    reader.read_to_end(&mut out)?;
    Ok(out)
}

#[cfg(not(feature = "compression"))]
fn decompress(bytes: Vec<u8>, path: &Path) -> Result<Vec<u8>, Diagnostic> {
    match detect_compression(&bytes, path) {
        Compression::None => Ok(bytes),
        other => Err(Diagnostic::fatal(
            DiagnosticCode::DecompressionFailed,
            format!(
                "{} looks {:?} compressed, but this build has no compression support.",
                path.display(),
                other
            ),
        )
        .with_advice("Rebuild with the `compression` feature enabled.".to_string())),
    }
}
