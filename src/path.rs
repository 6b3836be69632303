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

//! Locations inside a snapshot tree.
//!
//! A [`SnapshotPath`] has two string forms. The canonical one is an RFC 6901
//! JSON Pointer (`/app_folder_dlls/a.dll/file_version`), which survives any
//! key because `~` and `/` are escaped. The display form is dotted
//! (`app_folder_dlls.a.dll.file_version`) and only meant for people reading a
//! report or a prompt; it is never parsed back.

use crate::diagnostics::{Diagnostic, DiagnosticCode};
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use serde_json::Value;
use std::borrow::Cow;
use std::fmt;
use std::hash::{Hash, Hasher};

#[derive(Debug, Clone)]
pub enum Segment {
    Key(String),
    Index(usize),
}

impl Segment {
    /// The unescaped pointer token for this segment.
    pub fn token(&self) -> Cow<'_, str> {
        match self {
            Segment::Key(key) => Cow::Borrowed(key.as_str()),
            Segment::Index(index) => Cow::Owned(index.to_string()),
        }
    }
}

// A pointer token does not say whether it names a key or an index, so a
// parsed "/list/0" must equal the `Index(0)` the differ produced.
impl PartialEq for Segment {
    fn eq(&self, other: &Self) -> bool {
        self.token() == other.token()
    }
}

impl Eq for Segment {}

impl Hash for Segment {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.token().hash(state);
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Hash)]
pub struct SnapshotPath {
    segments: Vec<Segment>,
}

impl SnapshotPath {
    pub fn root() -> Self {
        Self::default()
    }

    pub fn parse(pointer: &str) -> Result<Self, Diagnostic> {
        if pointer.is_empty() {
            return Ok(Self::root());
        }

        if !pointer.starts_with('/') {
            return Err(Diagnostic::fatal(
                DiagnosticCode::InvalidPathSyntax,
                format!(
                    "I couldn't parse the path '{}': Path must start with '/'",
                    pointer
                ),
            )
            .with_advice(
                "Paths use JSON Pointer syntax, for example /required_services_status/W3SVC"
                    .to_string(),
            ));
        }

        // A bare token can't say whether it names a key or an index, so it
        // stays a key; `resolve` still indexes sequences with it.
        let segments = pointer[1..]
            .split('/')
            .map(|token| Segment::Key(token.replace("~1", "/").replace("~0", "~")))
            .collect();

        Ok(Self { segments })
    }

    pub fn segments(&self) -> &[Segment] {
        &self.segments
    }

    pub fn is_root(&self) -> bool {
        self.segments.is_empty()
    }

    pub fn len(&self) -> usize {
        self.segments.len()
    }

    pub fn is_empty(&self) -> bool {
        self.segments.is_empty()
    }

    pub fn push(&mut self, segment: Segment) {
        self.segments.push(segment);
    }

    pub fn pop(&mut self) -> Option<Segment> {
        self.segments.pop()
    }

    pub fn child_key(&self, key: &str) -> Self {
        let mut child = self.clone();
        child.push(Segment::Key(key.to_string()));
        child
    }

    pub fn child_index(&self, index: usize) -> Self {
        let mut child = self.clone();
        child.push(Segment::Index(index));
        child
    }

    pub fn to_pointer(&self) -> String {
        if self.segments.is_empty() {
            return String::new();
        }

        let escaped_tokens: Vec<String> = self
            .segments
            .iter()
            .map(|segment| segment.token().replace('~', "~0").replace('/', "~1"))
            .collect();

        format!("/{}", escaped_tokens.join("/"))
    }

    /// Walks `value` along this path. Index segments look up string keys when
    /// they land on a mapping, and key segments that parse as numbers index
    /// into sequences.
    pub fn resolve<'a>(&self, value: &'a Value) -> Result<&'a Value, Diagnostic> {
        let mut current = value;

        for segment in &self.segments {
            let token = segment.token();
            match current {
                Value::Object(obj) => {
                    current = obj.get(token.as_ref()).ok_or_else(|| {
                        Diagnostic::fatal(
                            DiagnosticCode::PathNotFound,
                            format!("I couldn't find the key '{}' in {}", token, self),
                        )
                    })?;
                }
                Value::Array(arr) => {
                    let index = parse_index(&token).ok_or_else(|| {
                        Diagnostic::fatal(
                            DiagnosticCode::InvalidPathSyntax,
                            format!("I couldn't parse '{}' as a sequence index", token),
                        )
                    })?;
                    current = arr.get(index).ok_or_else(|| {
                        Diagnostic::fatal(
                            DiagnosticCode::PathNotFound,
                            format!(
                                "I couldn't find index {} (sequence length is {})",
                                index,
                                arr.len()
                            ),
                        )
                    })?;
                }
                _ => {
                    return Err(Diagnostic::fatal(
                        DiagnosticCode::PathNotFound,
                        format!(
                            "I can't descend into {} with '{}'",
                            current.type_name(),
                            token
                        ),
                    ));
                }
            }
        }

        Ok(current)
    }

    pub fn exists_in(&self, value: &Value) -> bool {
        self.resolve(value).is_ok()
    }
}

impl fmt::Display for SnapshotPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.segments.is_empty() {
            return write!(f, "root");
        }

        for (i, segment) in self.segments.iter().enumerate() {
            match segment {
                Segment::Key(key) if i == 0 => write!(f, "{}", key)?,
                Segment::Key(key) => write!(f, ".{}", key)?,
                Segment::Index(index) => write!(f, "[{}]", index)?,
            }
        }
        Ok(())
    }
}

impl Serialize for SnapshotPath {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.serialize_str(&self.to_pointer())
    }
}

impl<'de> Deserialize<'de> for SnapshotPath {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        let pointer = String::deserialize(deserializer)?;
        SnapshotPath::parse(&pointer).map_err(|d| serde::de::Error::custom(d.description))
    }
}

fn parse_index(token: &str) -> Option<usize> {
    // RFC 6901 forbids leading zeros, so "01" never indexes a sequence.
    if token.is_empty() || (token.len() > 1 && token.starts_with('0')) {
        return None;
    }
    if !token.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    token.parse().ok()
}

pub(crate) trait ValueTypeExt {
    fn type_name(&self) -> &'static str;
}

impl ValueTypeExt for Value {
    fn type_name(&self) -> &'static str {
        match self {
            Value::Null => "null",
            Value::Bool(_) => "boolean",
            Value::Number(_) => "number",
            Value::String(_) => "string",
            Value::Array(_) => "sequence",
            Value::Object(_) => "mapping",
        }
    }
}
