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

//! The diff report and its boundary forms.
//!
//! A [`DiffReport`] serializes to `{"differences": [...]}` where each entry is
//! an object tagged with `kind`. The same document deserializes back, so a
//! report written by `enveye compare --output json` can be handed to
//! `enveye explain` later.

use crate::diagnostics::{Diagnostic, DiagnosticCode};
use crate::path::SnapshotPath;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fmt;
use std::fs;
use std::path::Path;

/// The kind of node sitting at a path. Scalars of different JSON types are
/// still the same kind.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NodeKind {
    Scalar,
    Mapping,
    Sequence,
}

impl NodeKind {
    pub fn of(value: &Value) -> Self {
        match value {
            Value::Object(_) => NodeKind::Mapping,
            Value::Array(_) => NodeKind::Sequence,
            _ => NodeKind::Scalar,
        }
    }
}

impl fmt::Display for NodeKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            NodeKind::Scalar => write!(f, "scalar"),
            NodeKind::Mapping => write!(f, "mapping"),
            NodeKind::Sequence => write!(f, "sequence"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum DiffEntry {
    Added {
        path: SnapshotPath,
        value: Value,
    },
    Removed {
        path: SnapshotPath,
        value: Value,
    },
    TypeChanged {
        path: SnapshotPath,
        old_type: NodeKind,
        new_type: NodeKind,
        old_value: Value,
        new_value: Value,
    },
    ValueChanged {
        path: SnapshotPath,
        old_value: Value,
        new_value: Value,
    },
    /// `path` names the sequence; `index` is the element position in the new snapshot.
    SequenceItemAdded {
        path: SnapshotPath,
        index: usize,
        value: Value,
    },
    /// `path` names the sequence; `index` is the element position in the old snapshot.
    SequenceItemRemoved {
        path: SnapshotPath,
        index: usize,
        value: Value,
    },
}

impl DiffEntry {
    pub fn path(&self) -> &SnapshotPath {
        match self {
            DiffEntry::Added { path, .. }
            | DiffEntry::Removed { path, .. }
            | DiffEntry::TypeChanged { path, .. }
            | DiffEntry::ValueChanged { path, .. }
            | DiffEntry::SequenceItemAdded { path, .. }
            | DiffEntry::SequenceItemRemoved { path, .. } => path,
        }
    }

    /// The exact location the entry talks about. For sequence items this is
    /// the element, not the sequence.
    pub fn location(&self) -> SnapshotPath {
        match self {
            DiffEntry::SequenceItemAdded { path, index, .. }
            | DiffEntry::SequenceItemRemoved { path, index, .. } => path.child_index(*index),
            other => other.path().clone(),
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            DiffEntry::Added { .. } => "Added",
            DiffEntry::Removed { .. } => "Removed",
            DiffEntry::TypeChanged { .. } => "Type changed",
            DiffEntry::ValueChanged { .. } => "Changed",
            DiffEntry::SequenceItemAdded { .. } => "Item added",
            DiffEntry::SequenceItemRemoved { .. } => "Item removed",
        }
    }

    pub fn old_value(&self) -> Option<&Value> {
        match self {
            DiffEntry::Removed { value, .. } | DiffEntry::SequenceItemRemoved { value, .. } => {
                Some(value)
            }
            DiffEntry::TypeChanged { old_value, .. } | DiffEntry::ValueChanged { old_value, .. } => {
                Some(old_value)
            }
            DiffEntry::Added { .. } | DiffEntry::SequenceItemAdded { .. } => None,
        }
    }

    pub fn new_value(&self) -> Option<&Value> {
        match self {
            DiffEntry::Added { value, .. } | DiffEntry::SequenceItemAdded { value, .. } => {
                Some(value)
            }
            DiffEntry::TypeChanged { new_value, .. } | DiffEntry::ValueChanged { new_value, .. } => {
                Some(new_value)
            }
            DiffEntry::Removed { .. } | DiffEntry::SequenceItemRemoved { .. } => None,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct DiffReport {
    #[serde(rename = "differences")]
    entries: Vec<DiffEntry>,
}

impl DiffReport {
    pub fn new() -> Self {
        Self::default()
    }

    pub(crate) fn push(&mut self, entry: DiffEntry) {
        self.entries.push(entry);
    }

    pub fn entries(&self) -> &[DiffEntry] {
        &self.entries
    }

    pub fn into_entries(self) -> Vec<DiffEntry> {
        self.entries
    }

    pub fn iter(&self) -> std::slice::Iter<'_, DiffEntry> {
        self.entries.iter()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn summary(&self) -> DiffSummary {
        let mut summary = DiffSummary::default();
        for entry in &self.entries {
            match entry {
                DiffEntry::Added { .. } => summary.added += 1,
                DiffEntry::Removed { .. } => summary.removed += 1,
                DiffEntry::TypeChanged { .. } => summary.type_changed += 1,
                DiffEntry::ValueChanged { .. } => summary.value_changed += 1,
                DiffEntry::SequenceItemAdded { .. } => summary.items_added += 1,
                DiffEntry::SequenceItemRemoved { .. } => summary.items_removed += 1,
            }
        }
        summary
    }

    pub fn to_json_pretty(&self) -> Result<String, Diagnostic> {
        serde_json::to_string_pretty(self).map_err(|e| {
            Diagnostic::fatal(
                DiagnosticCode::InvalidReport,
                format!("I couldn't serialize the diff report to JSON: {}", e),
            )
        })
    }

    pub fn from_json_str(text: &str) -> Result<Self, Diagnostic> {
        serde_json::from_str(text).map_err(|e| {
            Diagnostic::fatal(
                DiagnosticCode::InvalidReport,
                format!("I couldn't read this as a diff report: {}", e),
            )
            .with_advice(
                "A diff report is the JSON written by `enveye compare --output json`: \
                 an object with a \"differences\" list."
                    .to_string(),
            )
        })
    }

    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self, Diagnostic> {
        let path = path.as_ref();
        let text = fs::read_to_string(path).map_err(|e| {
            Diagnostic::fatal(
                DiagnosticCode::FileNotFound,
                format!("I couldn't read the report file {}: {}", path.display(), e),
            )
        })?;
        Self::from_json_str(&text).map_err(|d| d.with_location(path.display().to_string(), 1))
    }

    /// One row per entry: type, dotted path, old value, new value.
    pub fn render_table(&self) -> String {
        let mut out = String::new();
        out.push_str(&format!(
            "  {:12}  {:44}  {:24}  {:24}\n",
            "Type", "Path", "Old Value", "New Value"
        ));
        out.push_str(&"─".repeat(112));
        out.push('\n');

        for entry in &self.entries {
            let old = entry.old_value().map(render_cell).unwrap_or_else(|| "-".to_string());
            let new = entry.new_value().map(render_cell).unwrap_or_else(|| "-".to_string());
            out.push_str(&format!(
                "  {:12}  {:44}  {:24}  {:24}\n",
                entry.label(),
                truncate(&entry.location().to_string(), 44),
                old,
                new
            ));
        }
        out
    }
}

impl<'a> IntoIterator for &'a DiffReport {
    type Item = &'a DiffEntry;
    type IntoIter = std::slice::Iter<'a, DiffEntry>;

    fn into_iter(self) -> Self::IntoIter {
        self.entries.iter()
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct DiffSummary {
    pub added: usize,
    pub removed: usize,
    pub type_changed: usize,
    pub value_changed: usize,
    pub items_added: usize,
    pub items_removed: usize,
}

impl DiffSummary {
    pub fn total(&self) -> usize {
        self.added
            + self.removed
            + self.type_changed
            + self.value_changed
            + self.items_added
            + self.items_removed
    }
}

impl fmt::Display for DiffSummary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.total() == 0 {
            return write!(f, "No differences found");
        }

        let parts: Vec<String> = [
            (self.value_changed, "changed"),
            (self.type_changed, "type changed"),
            (self.added, "added"),
            (self.removed, "removed"),
            (self.items_added, "sequence items added"),
            (self.items_removed, "sequence items removed"),
        ]
        .iter()
        .filter(|(count, _)| *count > 0)
        .map(|(count, label)| format!("{} {}", count, label))
        .collect();

        write!(f, "{} differences: {}", self.total(), parts.join(", "))
    }
}

fn render_cell(value: &Value) -> String {
    let text = match value {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    };
    truncate(&text, 24)
}

fn truncate(text: &str, width: usize) -> String {
    if text.chars().count() > width {
        let kept: String = text.chars().take(width.saturating_sub(3)).collect();
        format!("{}...", kept)
    } else {
        text.to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn path(pointer: &str) -> SnapshotPath {
        SnapshotPath::parse(pointer).unwrap()
    }

    fn sample_report() -> DiffReport {
        let mut report = DiffReport::new();
        report.push(DiffEntry::ValueChanged {
            path: path("/services/W3SVC"),
            old_value: json!("Running"),
            new_value: json!("Stopped"),
        });
        report.push(DiffEntry::Added {
            path: path("/services/SQL"),
            value: json!("Running"),
        });
        report.push(DiffEntry::SequenceItemRemoved {
            path: path("/dotnet_frameworks_installed"),
            index: 1,
            value: json!("4.7.2"),
        });
        report
    }

    #[test]
    fn test_document_shape() {
        let value = serde_json::to_value(sample_report()).unwrap();
        assert_eq!(
            value,
            json!({
                "differences": [
                    {
                        "kind": "value_changed",
                        "path": "/services/W3SVC",
                        "old_value": "Running",
                        "new_value": "Stopped"
                    },
                    {
                        "kind": "added",
                        "path": "/services/SQL",
                        "value": "Running"
                    },
                    {
                        "kind": "sequence_item_removed",
                        "path": "/dotnet_frameworks_installed",
                        "index": 1,
                        "value": "4.7.2"
                    }
                ]
            })
        );
    }

    #[test]
    fn test_type_changed_serializes_kinds() {
        let entry = DiffEntry::TypeChanged {
            path: path("/x"),
            old_type: NodeKind::Scalar,
            new_type: NodeKind::Mapping,
            old_value: json!("1.0"),
            new_value: json!({"major": 1}),
        };
        let value = serde_json::to_value(&entry).unwrap();
        assert_eq!(value["kind"], json!("type_changed"));
        assert_eq!(value["old_type"], json!("scalar"));
        assert_eq!(value["new_type"], json!("mapping"));
    }

    #[test]
    fn test_report_reads_back() {
        let report = sample_report();
        let text = report.to_json_pretty().unwrap();
        let back = DiffReport::from_json_str(&text).unwrap();
        assert_eq!(back, report);
    }

    #[test]
    fn test_rejects_foreign_document() {
        let err = DiffReport::from_json_str(r#"{"values_changed": {}}"#).unwrap_err();
        assert_eq!(err.code, DiagnosticCode::InvalidReport);
    }

    #[test]
    fn test_summary() {
        let summary = sample_report().summary();
        assert_eq!(summary.value_changed, 1);
        assert_eq!(summary.added, 1);
        assert_eq!(summary.items_removed, 1);
        assert_eq!(summary.total(), 3);
        assert_eq!(
            summary.to_string(),
            "3 differences: 1 changed, 1 added, 1 sequence items removed"
        );
        assert_eq!(DiffReport::new().summary().to_string(), "No differences found");
    }

    #[test]
    fn test_location_of_sequence_item() {
        let report = sample_report();
        let location = report.entries()[2].location();
        assert_eq!(location.to_pointer(), "/dotnet_frameworks_installed/1");
        assert_eq!(report.entries()[0].location(), *report.entries()[0].path());
    }

    #[test]
    fn test_table_rows() {
        let table = sample_report().render_table();
        let lines: Vec<&str> = table.lines().collect();
        assert_eq!(lines.len(), 5);
        assert!(lines[2].contains("Changed"));
        assert!(lines[2].contains("services.W3SVC"));
        assert!(lines[2].contains("Running"));
        assert!(lines[2].contains("Stopped"));
        assert!(lines[3].contains("Added"));
        assert!(lines[4].contains("dotnet_frameworks_installed[1]"));
    }

    #[test]
    fn test_truncate_long_cells() {
        let long = "x".repeat(60);
        let cell = render_cell(&json!(long));
        assert_eq!(cell.chars().count(), 24);
        assert!(cell.ends_with("..."));
    }
}
