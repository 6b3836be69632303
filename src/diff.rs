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

//! Structural diff between two snapshot trees.
//!
//! The walk is depth-first and pre-order. Mapping keys are visited in sorted
//! order, so the same pair of inputs always yields the same report in the same
//! order. A key present on one side only is reported once with its whole
//! subtree; the differ never descends into an added or removed subtree, nor
//! past a type change.
//!
//! Sequences are compared as multisets unless their path is tagged as ordered
//! in [`DiffOptions`]. Most sequences in an environment snapshot (installed
//! framework versions, for instance) carry no meaning in their order, and a
//! positional comparison would report every element after an insertion.

use crate::diagnostics::{Diagnostic, DiagnosticCode};
use crate::path::{Segment, SnapshotPath, ValueTypeExt};
use crate::report::{DiffEntry, DiffReport, NodeKind};
use serde_json::{Map, Value};
use std::collections::{BTreeMap, BTreeSet, HashSet, VecDeque};
use std::fmt::Write;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SequenceMode {
    /// Element membership only, compared by value with multiplicity.
    SetLike,
    /// Element by element, by position.
    Ordered,
}

#[derive(Debug, Clone, Default)]
pub struct DiffOptions {
    ordered: HashSet<SnapshotPath>,
}

impl DiffOptions {
    pub fn new() -> Self {
        Self::default()
    }

    /// Compare the sequence at `path` position by position.
    pub fn ordered_at(mut self, path: SnapshotPath) -> Self {
        self.ordered.insert(path);
        self
    }

    pub fn sequence_mode(&self, path: &SnapshotPath) -> SequenceMode {
        if self.ordered.contains(path) {
            SequenceMode::Ordered
        } else {
            SequenceMode::SetLike
        }
    }
}

/// Diffs two mapping-rooted snapshot trees with default options.
pub fn diff(old: &Value, new: &Value) -> Result<DiffReport, Diagnostic> {
    diff_with_options(old, new, &DiffOptions::default())
}

pub fn diff_with_options(
    old: &Value,
    new: &Value,
    options: &DiffOptions,
) -> Result<DiffReport, Diagnostic> {
    let old_root = require_mapping(old, "old")?;
    let new_root = require_mapping(new, "new")?;

    let mut differ = Differ {
        options,
        path: SnapshotPath::root(),
        report: DiffReport::new(),
    };
    differ.diff_mappings(old_root, new_root);
    Ok(differ.report)
}

fn require_mapping<'a>(value: &'a Value, side: &str) -> Result<&'a Map<String, Value>, Diagnostic> {
    value.as_object().ok_or_else(|| {
        Diagnostic::fatal(
            DiagnosticCode::InvalidSnapshotFormat,
            format!(
                "I can only compare snapshots whose top level is a mapping, but the {} snapshot is a {}.",
                side,
                value.type_name()
            ),
        )
    })
}

struct Differ<'o> {
    options: &'o DiffOptions,
    path: SnapshotPath,
    report: DiffReport,
}

impl Differ<'_> {
    fn diff_values(&mut self, old: &Value, new: &Value) {
        match (old, new) {
            (Value::Object(old_obj), Value::Object(new_obj)) => {
                self.diff_mappings(old_obj, new_obj);
            }
            (Value::Array(old_arr), Value::Array(new_arr)) => {
                match self.options.sequence_mode(&self.path) {
                    SequenceMode::SetLike => self.diff_sequences_as_sets(old_arr, new_arr),
                    SequenceMode::Ordered => self.diff_sequences_by_position(old_arr, new_arr),
                }
            }
            _ => {
                let old_type = NodeKind::of(old);
                let new_type = NodeKind::of(new);
                if old_type != new_type {
                    self.report.push(DiffEntry::TypeChanged {
                        path: self.path.clone(),
                        old_type,
                        new_type,
                        old_value: old.clone(),
                        new_value: new.clone(),
                    });
                } else if old != new {
                    self.report.push(DiffEntry::ValueChanged {
                        path: self.path.clone(),
                        old_value: old.clone(),
                        new_value: new.clone(),
                    });
                }
            }
        }
    }

    fn diff_mappings(&mut self, old: &Map<String, Value>, new: &Map<String, Value>) {
        let keys: BTreeSet<&String> = old.keys().chain(new.keys()).collect();

        for key in keys {
            self.path.push(Segment::Key(key.clone()));
            match (old.get(key), new.get(key)) {
                (Some(old_value), Some(new_value)) => {
                    if old_value != new_value {
                        self.diff_values(old_value, new_value);
                    }
                }
                (Some(old_value), None) => {
                    self.report.push(DiffEntry::Removed {
                        path: self.path.clone(),
                        value: old_value.clone(),
                    });
                }
                (None, Some(new_value)) => {
                    self.report.push(DiffEntry::Added {
                        path: self.path.clone(),
                        value: new_value.clone(),
                    });
                }
                (None, None) => {}
            }
            self.path.pop();
        }
    }

    fn diff_sequences_as_sets(&mut self, old: &[Value], new: &[Value]) {
        // Equal values share a canonical key; each old element consumes the
        // earliest unmatched new element with the same key.
        let mut unmatched_new: BTreeMap<String, VecDeque<usize>> = BTreeMap::new();
        for (i, value) in new.iter().enumerate() {
            unmatched_new.entry(canonical_key(value)).or_default().push_back(i);
        }

        let mut removed = Vec::new();
        for (i, value) in old.iter().enumerate() {
            let matched = unmatched_new
                .get_mut(&canonical_key(value))
                .and_then(|indices| indices.pop_front());
            if matched.is_none() {
                removed.push(i);
            }
        }

        let mut added: Vec<usize> = unmatched_new.into_values().flatten().collect();
        added.sort_unstable();

        for index in removed {
            self.report.push(DiffEntry::SequenceItemRemoved {
                path: self.path.clone(),
                index,
                value: old[index].clone(),
            });
        }

        for index in added {
            self.report.push(DiffEntry::SequenceItemAdded {
                path: self.path.clone(),
                index,
                value: new[index].clone(),
            });
        }
    }

    fn diff_sequences_by_position(&mut self, old: &[Value], new: &[Value]) {
        let shared = old.len().min(new.len());

        for i in 0..shared {
            if old[i] != new[i] {
                self.path.push(Segment::Index(i));
                self.diff_values(&old[i], &new[i]);
                self.path.pop();
            }
        }

        for (index, value) in old.iter().enumerate().skip(shared) {
            self.report.push(DiffEntry::SequenceItemRemoved {
                path: self.path.clone(),
                index,
                value: value.clone(),
            });
        }

        for (index, value) in new.iter().enumerate().skip(shared) {
            self.report.push(DiffEntry::SequenceItemAdded {
                path: self.path.clone(),
                index,
                value: value.clone(),
            });
        }
    }
}

/// A string that is equal for two values exactly when the values are equal,
/// independent of how the underlying map orders its keys.
fn canonical_key(value: &Value) -> String {
    let mut out = String::new();
    write_canonical(value, &mut out);
    out
}

fn write_canonical(value: &Value, out: &mut String) {
    match value {
        Value::Null => out.push_str("null"),
        Value::Bool(b) => {
            let _ = write!(out, "{}", b);
        }
        // serde_json compares floats numerically, so -0.0 must key like 0.0.
        Value::Number(n) if n.is_f64() && n.as_f64() == Some(0.0) => out.push_str("0.0"),
        Value::Number(n) => {
            let _ = write!(out, "{}", n);
        }
        Value::String(s) => {
            let _ = write!(out, "{:?}", s);
        }
        Value::Array(items) => {
            out.push('[');
            for (i, item) in items.iter().enumerate() {
                if i > 0 {
                    out.push(',');
                }
                write_canonical(item, out);
            }
            out.push(']');
        }
        Value::Object(obj) => {
            let mut keys: Vec<&String> = obj.keys().collect();
            keys.sort();
            out.push('{');
            for (i, key) in keys.into_iter().enumerate() {
                if i > 0 {
                    out.push(',');
                }
                let _ = write!(out, "{:?}:", key);
                write_canonical(&obj[key], out);
            }
            out.push('}');
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use arbitrary::Unstructured;
    use serde_json::json;

    fn path(pointer: &str) -> SnapshotPath {
        SnapshotPath::parse(pointer).unwrap()
    }

    #[test]
    fn test_service_status_example() {
        let old = json!({"services": {"W3SVC": "Running"}});
        let new = json!({"services": {"W3SVC": "Stopped", "SQL": "Running"}});
        let report = diff(&old, &new).unwrap();

        // "SQL" sorts before "W3SVC"
        assert_eq!(
            report.entries(),
            &[
                DiffEntry::Added {
                    path: path("/services/SQL"),
                    value: json!("Running"),
                },
                DiffEntry::ValueChanged {
                    path: path("/services/W3SVC"),
                    old_value: json!("Running"),
                    new_value: json!("Stopped"),
                },
            ]
        );
        assert_eq!(report.entries()[1].path().to_string(), "services.W3SVC");
    }

    #[test]
    fn test_removed_subtree_is_one_entry() {
        let old = json!({"dlls": {"a.dll": {"version": "1.0"}}});
        let new = json!({"dlls": {}});
        let report = diff(&old, &new).unwrap();

        assert_eq!(
            report.entries(),
            &[DiffEntry::Removed {
                path: path("/dlls/a.dll"),
                value: json!({"version": "1.0"}),
            }]
        );
        assert_eq!(report.entries()[0].path().to_string(), "dlls.a.dll");
    }

    #[test]
    fn test_type_change_does_not_recurse() {
        let old = json!({"x": "1.0"});
        let new = json!({"x": {"major": 1}});
        let report = diff(&old, &new).unwrap();

        assert_eq!(
            report.entries(),
            &[DiffEntry::TypeChanged {
                path: path("/x"),
                old_type: NodeKind::Scalar,
                new_type: NodeKind::Mapping,
                old_value: json!("1.0"),
                new_value: json!({"major": 1}),
            }]
        );
    }

    #[test]
    fn test_mapping_vs_sequence_is_type_change() {
        let old = json!({"x": {"a": 1}});
        let new = json!({"x": [1]});
        let report = diff(&old, &new).unwrap();
        assert_eq!(report.len(), 1);
        assert!(matches!(
            report.entries()[0],
            DiffEntry::TypeChanged {
                old_type: NodeKind::Mapping,
                new_type: NodeKind::Sequence,
                ..
            }
        ));
    }

    #[test]
    fn test_scalar_type_difference_is_value_change() {
        let old = json!({"port": "8080"});
        let new = json!({"port": 8080});
        let report = diff(&old, &new).unwrap();
        assert!(matches!(report.entries()[0], DiffEntry::ValueChanged { .. }));
    }

    #[test]
    fn test_null_to_scalar_is_value_change() {
        let old = json!({"APP_ENV": null});
        let new = json!({"APP_ENV": "prod"});
        let report = diff(&old, &new).unwrap();
        assert!(matches!(report.entries()[0], DiffEntry::ValueChanged { .. }));
    }

    #[test]
    fn test_nested_value_change() {
        let old = json!({"os_info": {"name": "Windows", "build": "10"}});
        let new = json!({"os_info": {"name": "Windows", "build": "11"}});
        let report = diff(&old, &new).unwrap();
        assert_eq!(report.len(), 1);
        assert_eq!(report.entries()[0].path().to_pointer(), "/os_info/build");
    }

    #[test]
    fn test_set_like_sequence_insertion() {
        let old = json!({"frameworks": ["4.0", "4.7.2", "4.8"]});
        let new = json!({"frameworks": ["3.5", "4.0", "4.7.2", "4.8"]});
        let report = diff(&old, &new).unwrap();

        assert_eq!(
            report.entries(),
            &[DiffEntry::SequenceItemAdded {
                path: path("/frameworks"),
                index: 0,
                value: json!("3.5"),
            }]
        );
    }

    #[test]
    fn test_set_like_sequence_reorder_is_silent() {
        let old = json!({"frameworks": ["4.0", "4.8", {"sp": 1}]});
        let new = json!({"frameworks": [{"sp": 1}, "4.8", "4.0"]});
        assert!(diff(&old, &new).unwrap().is_empty());
    }

    #[test]
    fn test_set_like_sequence_respects_multiplicity() {
        let old = json!({"list": ["a", "a", "b"]});
        let new = json!({"list": ["a", "b", "c"]});
        let report = diff(&old, &new).unwrap();

        assert_eq!(
            report.entries(),
            &[
                DiffEntry::SequenceItemRemoved {
                    path: path("/list"),
                    index: 1,
                    value: json!("a"),
                },
                DiffEntry::SequenceItemAdded {
                    path: path("/list"),
                    index: 2,
                    value: json!("c"),
                },
            ]
        );
    }

    #[test]
    fn test_set_like_does_not_confuse_string_and_number() {
        let old = json!({"list": ["1"]});
        let new = json!({"list": [1]});
        assert_eq!(diff(&old, &new).unwrap().len(), 2);
    }

    #[test]
    fn test_ordered_sequence_by_position() {
        let old = json!({"path_order": ["C:\\a", "C:\\b"]});
        let new = json!({"path_order": ["C:\\b", "C:\\a", "C:\\c"]});
        let options = DiffOptions::new().ordered_at(path("/path_order"));
        let report = diff_with_options(&old, &new, &options).unwrap();

        assert_eq!(
            report.entries(),
            &[
                DiffEntry::ValueChanged {
                    path: path("/path_order/0"),
                    old_value: json!("C:\\a"),
                    new_value: json!("C:\\b"),
                },
                DiffEntry::ValueChanged {
                    path: path("/path_order/1"),
                    old_value: json!("C:\\b"),
                    new_value: json!("C:\\a"),
                },
                DiffEntry::SequenceItemAdded {
                    path: path("/path_order"),
                    index: 2,
                    value: json!("C:\\c"),
                },
            ]
        );
    }

    #[test]
    fn test_ordered_sequence_recurses_into_elements() {
        let old = json!({"bindings": [{"port": 80}, {"port": 443}]});
        let new = json!({"bindings": [{"port": 8080}]});
        let options = DiffOptions::new().ordered_at(path("/bindings"));
        let report = diff_with_options(&old, &new, &options).unwrap();

        assert_eq!(report.len(), 2);
        assert_eq!(report.entries()[0].path().to_pointer(), "/bindings/0/port");
        assert!(matches!(
            report.entries()[1],
            DiffEntry::SequenceItemRemoved { index: 1, .. }
        ));
    }

    #[test]
    fn test_rejects_non_mapping_root() {
        let err = diff(&json!([1, 2]), &json!({})).unwrap_err();
        assert_eq!(err.code, DiagnosticCode::InvalidSnapshotFormat);
        assert!(err.description.contains("old snapshot is a sequence"));

        let err = diff(&json!({}), &json!("text")).unwrap_err();
        assert!(err.description.contains("new snapshot is a string"));
    }

    #[test]
    fn test_escape_sequences_in_keys() {
        let old = json!({});
        let new = json!({"HKLM/SOFTWARE": "value", "a~b": "value2"});
        let report = diff(&old, &new).unwrap();

        let pointers: Vec<String> = report.iter().map(|e| e.path().to_pointer()).collect();
        assert_eq!(pointers, vec!["/HKLM~1SOFTWARE", "/a~0b"]);
    }

    #[test]
    fn test_canonical_key_ignores_map_order() {
        let a: Value = serde_json::from_str(r#"{"b": 1, "a": [true, null]}"#).unwrap();
        let b: Value = serde_json::from_str(r#"{"a": [true, null], "b": 1}"#).unwrap();
        assert_eq!(canonical_key(&a), canonical_key(&b));
        assert_ne!(canonical_key(&json!("1")), canonical_key(&json!(1)));
    }

    #[test]
    fn test_negative_zero_matches_zero_in_sequences() {
        let old = json!({"offsets": [0.0, "a"]});
        let new = json!({"offsets": [-0.0, "b"]});
        assert_eq!(old["offsets"][0], new["offsets"][0]);

        let report = diff(&old, &new).unwrap();
        assert_eq!(
            report.entries(),
            &[
                DiffEntry::SequenceItemRemoved {
                    path: path("/offsets"),
                    index: 1,
                    value: json!("a"),
                },
                DiffEntry::SequenceItemAdded {
                    path: path("/offsets"),
                    index: 1,
                    value: json!("b"),
                },
            ]
        );
        assert_ne!(canonical_key(&json!(0)), canonical_key(&json!(0.0)));
    }

    // Small key and value alphabets so that random pairs overlap.
    const KEYS: &[&str] = &["os", "svc", "dll", "a.b", "x/y", "env"];
    const WORDS: &[&str] = &["Running", "Stopped", "1.0", "2.0", ""];

    fn random_tree(u: &mut Unstructured<'_>, depth: usize) -> arbitrary::Result<Value> {
        let choice = if depth == 0 { u.int_in_range(0..=4)? } else { u.int_in_range(0..=6)? };
        Ok(match choice {
            0 => Value::Null,
            1 => Value::Bool(u.arbitrary()?),
            2 => json!(u.int_in_range(0..=3u8)?),
            3 | 4 => json!(*u.choose(WORDS)?),
            5 => {
                let len = u.int_in_range(0..=4usize)?;
                let mut items = Vec::with_capacity(len);
                for _ in 0..len {
                    items.push(random_tree(u, depth - 1)?);
                }
                Value::Array(items)
            }
            _ => random_mapping(u, depth - 1)?,
        })
    }

    fn random_mapping(u: &mut Unstructured<'_>, depth: usize) -> arbitrary::Result<Value> {
        let mut map = Map::new();
        let len = u.int_in_range(0..=4usize)?;
        for _ in 0..len {
            let key = *u.choose(KEYS)?;
            map.insert(key.to_string(), random_tree(u, depth)?);
        }
        Ok(Value::Object(map))
    }

    fn random_pairs(count: usize) -> Vec<(Value, Value)> {
        let mut state: u64 = 0x5eed_1234_abcd_0001;
        let mut pairs = Vec::with_capacity(count);
        for _ in 0..count {
            let bytes: Vec<u8> = (0..512)
                .map(|_| {
                    state = state
                        .wrapping_mul(6364136223846793005)
                        .wrapping_add(1442695040888963407);
                    (state >> 33) as u8
                })
                .collect();
            let mut u = Unstructured::new(&bytes);
            let a = random_mapping(&mut u, 3).unwrap();
            let b = random_mapping(&mut u, 3).unwrap();
            pairs.push((a, b));
        }
        pairs
    }

    fn mirrored(entry: &DiffEntry) -> DiffEntry {
        match entry.clone() {
            DiffEntry::Added { path, value } => DiffEntry::Removed { path, value },
            DiffEntry::Removed { path, value } => DiffEntry::Added { path, value },
            DiffEntry::TypeChanged {
                path,
                old_type,
                new_type,
                old_value,
                new_value,
            } => DiffEntry::TypeChanged {
                path,
                old_type: new_type,
                new_type: old_type,
                old_value: new_value,
                new_value: old_value,
            },
            DiffEntry::ValueChanged {
                path,
                old_value,
                new_value,
            } => DiffEntry::ValueChanged {
                path,
                old_value: new_value,
                new_value: old_value,
            },
            DiffEntry::SequenceItemAdded { path, index, value } => {
                DiffEntry::SequenceItemRemoved { path, index, value }
            }
            DiffEntry::SequenceItemRemoved { path, index, value } => {
                DiffEntry::SequenceItemAdded { path, index, value }
            }
        }
    }

    #[test]
    fn test_identity() {
        for (a, b) in random_pairs(200) {
            assert!(diff(&a, &a).unwrap().is_empty(), "diff(A, A) not empty for {}", a);
            assert!(diff(&b, &b).unwrap().is_empty());
        }
    }

    #[test]
    fn test_determinism() {
        for (a, b) in random_pairs(200) {
            let first = serde_json::to_string(&diff(&a, &b).unwrap()).unwrap();
            let second = serde_json::to_string(&diff(&a, &b).unwrap()).unwrap();
            assert_eq!(first, second);
        }
    }

    #[test]
    fn test_antisymmetry() {
        for (a, b) in random_pairs(200) {
            let forward = diff(&a, &b).unwrap();
            let backward = diff(&b, &a).unwrap();
            assert_eq!(forward.len(), backward.len(), "{} vs {}", a, b);
            for entry in &forward {
                assert!(
                    backward.entries().contains(&mirrored(entry)),
                    "{:?} has no mirror in diff({}, {})",
                    entry,
                    b,
                    a
                );
            }
        }
    }

    #[test]
    fn test_every_location_exists_in_an_input() {
        for (a, b) in random_pairs(200) {
            let report = diff(&a, &b).unwrap();
            for entry in &report {
                let location = entry.location();
                let found = match entry {
                    DiffEntry::Added { .. } | DiffEntry::SequenceItemAdded { .. } => {
                        location.exists_in(&b) && !matches!(entry, DiffEntry::Added { .. } if location.exists_in(&a))
                    }
                    DiffEntry::Removed { .. } | DiffEntry::SequenceItemRemoved { .. } => {
                        location.exists_in(&a) && !matches!(entry, DiffEntry::Removed { .. } if location.exists_in(&b))
                    }
                    DiffEntry::TypeChanged { .. } | DiffEntry::ValueChanged { .. } => {
                        location.exists_in(&a) && location.exists_in(&b)
                    }
                };
                assert!(found, "{:?} does not match the inputs {} / {}", entry, a, b);
            }
        }
    }

    /// Paths reached through mappings only. Scalars, sequences and empty
    /// mappings are the leaves.
    fn leaves(value: &Value, path: &mut SnapshotPath, out: &mut Vec<(SnapshotPath, Value)>) {
        match value {
            Value::Object(map) if !map.is_empty() => {
                for (key, child) in map {
                    path.push(Segment::Key(key.clone()));
                    leaves(child, path, out);
                    path.pop();
                }
            }
            other => out.push((path.clone(), other.clone())),
        }
    }

    fn mapping_node<'a>(value: &'a Value, path: &SnapshotPath) -> Option<&'a Value> {
        path.segments()
            .iter()
            .try_fold(value, |node, segment| node.as_object()?.get(segment.token().as_ref()))
    }

    fn covers(entry: &DiffEntry, path: &SnapshotPath) -> bool {
        let prefix = entry.path().segments();
        prefix.len() <= path.len() && prefix == &path.segments()[..prefix.len()]
    }

    fn check_leaves_covered(this: &Value, other: &Value, this_is_old: bool, report: &DiffReport) {
        let mut found = Vec::new();
        leaves(this, &mut SnapshotPath::root(), &mut found);

        for (path, leaf) in found {
            let covering: Vec<&DiffEntry> = report.iter().filter(|e| covers(e, &path)).collect();

            match mapping_node(other, &path) {
                None => {
                    assert_eq!(covering.len(), 1, "{} covered by {:?}", path, covering);
                    let one_sided = if this_is_old {
                        matches!(covering[0], DiffEntry::Removed { .. })
                    } else {
                        matches!(covering[0], DiffEntry::Added { .. })
                    };
                    assert!(
                        one_sided || matches!(covering[0], DiffEntry::TypeChanged { .. }),
                        "{} covered by {:?}",
                        path,
                        covering[0]
                    );
                }
                Some(counterpart) if *counterpart == leaf => {
                    assert!(covering.is_empty(), "equal {} covered by {:?}", path, covering);
                }
                Some(counterpart) => match (NodeKind::of(&leaf), NodeKind::of(counterpart)) {
                    (NodeKind::Scalar, NodeKind::Scalar) => {
                        assert_eq!(covering.len(), 1, "{} covered by {:?}", path, covering);
                        assert!(matches!(covering[0], DiffEntry::ValueChanged { .. }));
                        assert_eq!(covering[0].path(), &path);
                    }
                    (NodeKind::Sequence, NodeKind::Sequence) => {
                        assert!(covering.iter().all(|e| e.path() == &path
                            && matches!(
                                e,
                                DiffEntry::SequenceItemAdded { .. } | DiffEntry::SequenceItemRemoved { .. }
                            )));
                    }
                    (NodeKind::Mapping, NodeKind::Mapping) => {
                        // An empty mapping; the other side's keys are its own leaves.
                        assert!(covering.is_empty(), "{} covered by {:?}", path, covering);
                    }
                    _ => {
                        assert_eq!(covering.len(), 1, "{} covered by {:?}", path, covering);
                        assert!(matches!(covering[0], DiffEntry::TypeChanged { .. }));
                        assert_eq!(covering[0].path(), &path);
                    }
                },
            }
        }
    }

    #[test]
    fn test_every_leaf_is_covered_exactly_once() {
        for (a, b) in random_pairs(200) {
            let report = diff(&a, &b).unwrap();
            check_leaves_covered(&a, &b, true, &report);
            check_leaves_covered(&b, &a, false, &report);
        }
    }

    #[test]
    fn test_no_duplicate_locations_per_side() {
        for (a, b) in random_pairs(200) {
            let report = diff(&a, &b).unwrap();
            let mut seen = HashSet::new();
            for entry in &report {
                let side = matches!(
                    entry,
                    DiffEntry::SequenceItemAdded { .. } | DiffEntry::Added { .. }
                );
                assert!(seen.insert((side, entry.location())), "duplicate {:?}", entry);
            }
        }
    }
}
