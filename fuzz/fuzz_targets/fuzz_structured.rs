#![no_main]

use arbitrary::{Arbitrary, Unstructured};
use enveye::{diff, diff_with_options, DiffEntry, DiffOptions, SnapshotPath};
use libfuzzer_sys::fuzz_target;
use serde_json::{json, Value};

#[derive(Arbitrary, Debug)]
struct FuzzPair {
    old: Vec<(String, FuzzValue)>,
    new: Vec<(String, FuzzValue)>,
    ordered: Vec<String>,
}

#[derive(Arbitrary, Debug)]
enum FuzzValue {
    Null,
    Bool(bool),
    Number(f64),
    String(String),
    Array(Vec<FuzzValue>),
    Object(Vec<(String, FuzzValue)>),
}

impl FuzzValue {
    fn to_json(&self) -> Value {
        match self {
            FuzzValue::Null => Value::Null,
            FuzzValue::Bool(b) => Value::Bool(*b),
            FuzzValue::Number(n) => json!(n),
            FuzzValue::String(s) => Value::String(s.clone()),
            FuzzValue::Array(arr) => Value::Array(arr.iter().map(|v| v.to_json()).collect()),
            FuzzValue::Object(obj) => object(obj),
        }
    }
}

fn object(fields: &[(String, FuzzValue)]) -> Value {
    Value::Object(fields.iter().map(|(k, v)| (k.clone(), v.to_json())).collect())
}

/// What the entry should look like in the report with the sides swapped.
fn mirrored(entry: &DiffEntry) -> DiffEntry {
    match entry.clone() {
        DiffEntry::Added { path, value } => DiffEntry::Removed { path, value },
        DiffEntry::Removed { path, value } => DiffEntry::Added { path, value },
        DiffEntry::TypeChanged { path, old_type, new_type, old_value, new_value } => {
            DiffEntry::TypeChanged {
                path,
                old_type: new_type,
                new_type: old_type,
                old_value: new_value,
                new_value: old_value,
            }
        }
        DiffEntry::ValueChanged { path, old_value, new_value } => DiffEntry::ValueChanged {
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

fuzz_target!(|data: &[u8]| {
    let mut u = Unstructured::new(data);
    let pair = match FuzzPair::arbitrary(&mut u) {
        Ok(pair) => pair,
        Err(_) => return,
    };

    let old = object(&pair.old);
    let new = object(&pair.new);

    let mut options = DiffOptions::new();
    for pointer in &pair.ordered {
        if let Ok(path) = SnapshotPath::parse(pointer) {
            options = options.ordered_at(path);
        }
    }

    // Mapping-rooted inputs never fail
    let forward = diff_with_options(&old, &new, &options).unwrap();
    let backward = diff_with_options(&new, &old, &options).unwrap();

    assert_eq!(forward, diff_with_options(&old, &new, &options).unwrap());
    assert!(diff(&old, &old).unwrap().is_empty());

    assert_eq!(forward.len(), backward.len());
    for entry in &forward {
        assert!(backward.entries().contains(&mirrored(entry)));

        let location = entry.location();
        assert!(location.exists_in(&old) || location.exists_in(&new));
    }

    let mut locations: Vec<String> = forward
        .iter()
        .map(|entry| match entry {
            DiffEntry::Added { .. } | DiffEntry::SequenceItemAdded { .. } => {
                format!("new {}", entry.location().to_pointer())
            }
            _ => format!("old {}", entry.location().to_pointer()),
        })
        .collect();
    let count = locations.len();
    locations.sort();
    locations.dedup();
    assert_eq!(locations.len(), count);

    // The serialized report reads back to the same entries
    let json = forward.to_json_pretty().unwrap();
    let reparsed = enveye::DiffReport::from_json_str(&json).unwrap();
    assert_eq!(reparsed.len(), forward.len());
});
