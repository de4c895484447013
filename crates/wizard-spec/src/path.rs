use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use thiserror::Error;

/// A single step of a [`Path`].
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Segment {
    Key(String),
    Index(usize),
}

impl Segment {
    fn get<'a>(&self, value: &'a Value) -> Option<&'a Value> {
        match (self, value) {
            (Segment::Key(key), Value::Object(map)) => map.get(key),
            (Segment::Key(key), Value::Array(items)) => {
                key.parse::<usize>().ok().and_then(|index| items.get(index))
            }
            (Segment::Index(index), Value::Array(items)) => items.get(*index),
            (Segment::Index(index), Value::Object(map)) => map.get(&index.to_string()),
            _ => None,
        }
    }

    fn get_mut<'a>(&self, value: &'a mut Value) -> Option<&'a mut Value> {
        match (self, value) {
            (Segment::Key(key), Value::Object(map)) => map.get_mut(key),
            (Segment::Key(key), Value::Array(items)) => key
                .parse::<usize>()
                .ok()
                .and_then(move |index| items.get_mut(index)),
            (Segment::Index(index), Value::Array(items)) => items.get_mut(*index),
            (Segment::Index(index), Value::Object(map)) => map.get_mut(&index.to_string()),
            _ => None,
        }
    }

    fn empty_container(&self) -> Value {
        match self {
            Segment::Key(_) => Value::Object(Map::new()),
            Segment::Index(_) => Value::Array(Vec::new()),
        }
    }
}

impl fmt::Display for Segment {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Segment::Key(key) => {
                for ch in key.chars() {
                    if matches!(ch, '.' | '\\' | '[' | ']') {
                        f.write_str("\\")?;
                    }
                    write!(f, "{ch}")?;
                }
                Ok(())
            }
            Segment::Index(index) => write!(f, "[{index}]"),
        }
    }
}

/// Errors raised while parsing or resolving a [`Path`].
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum PathError {
    #[error("invalid path '{path}': {reason}")]
    Syntax { path: String, reason: &'static str },
    #[error("path conflict at '{path}': expected a container but found {found}")]
    Conflict { path: String, found: &'static str },
    #[error("index {index} at '{path}' is too far past the end of the array ({len} items)")]
    IndexTooFar { path: String, index: usize, len: usize },
}

/// Largest number of `null` slots `set` pads an array with to reach an index.
const MAX_INDEX_GAP: usize = 64;

/// Parsed address into a document.
///
/// Segments are separated by `.`; `\.` keeps a literal dot inside a key (as in
/// `metadata.annotations.apps\.open-cluster-management\.io/git-branch`),
/// `[n]` or an all-digit segment addresses an array element. The empty string
/// is the root path.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct Path {
    segments: Vec<Segment>,
}

#[derive(Clone, Copy, PartialEq, Eq)]
enum ParseState {
    Start,
    InKey,
    AfterIndex,
}

impl Path {
    pub fn root() -> Self {
        Self::default()
    }

    pub fn parse(input: &str) -> Result<Self, PathError> {
        let syntax = |reason| PathError::Syntax {
            path: input.to_string(),
            reason,
        };

        let mut segments = Vec::new();
        if input.is_empty() {
            return Ok(Self { segments });
        }

        let mut current = String::new();
        let mut literal = false;
        let mut state = ParseState::Start;
        let mut chars = input.chars();

        while let Some(ch) = chars.next() {
            match ch {
                '\\' => {
                    if state == ParseState::AfterIndex {
                        return Err(syntax("expected '.' or '[' after ']'"));
                    }
                    match chars.next() {
                        Some(next @ ('.' | '\\' | '[' | ']')) => current.push(next),
                        Some(_) => return Err(syntax("unknown escape sequence")),
                        None => return Err(syntax("dangling escape")),
                    }
                    literal = true;
                    state = ParseState::InKey;
                }
                '.' => match state {
                    ParseState::Start => return Err(syntax("empty segment")),
                    ParseState::InKey => {
                        segments.push(key_segment(std::mem::take(&mut current), literal));
                        literal = false;
                        state = ParseState::Start;
                    }
                    ParseState::AfterIndex => state = ParseState::Start,
                },
                '[' => {
                    match state {
                        ParseState::InKey => {
                            segments.push(key_segment(std::mem::take(&mut current), literal));
                            literal = false;
                        }
                        ParseState::Start if !segments.is_empty() => {
                            return Err(syntax("index must follow a key or another index"));
                        }
                        _ => {}
                    }
                    let mut digits = String::new();
                    let mut closed = false;
                    for next in chars.by_ref() {
                        if next == ']' {
                            closed = true;
                            break;
                        }
                        digits.push(next);
                    }
                    if !closed {
                        return Err(syntax("unclosed '['"));
                    }
                    if digits.is_empty() || !digits.chars().all(|c| c.is_ascii_digit()) {
                        return Err(syntax("array index must be a non-negative integer"));
                    }
                    let index = digits
                        .parse::<usize>()
                        .map_err(|_| syntax("array index out of range"))?;
                    segments.push(Segment::Index(index));
                    state = ParseState::AfterIndex;
                }
                ']' => return Err(syntax("unexpected ']'")),
                other => {
                    if state == ParseState::AfterIndex {
                        return Err(syntax("expected '.' or '[' after ']'"));
                    }
                    current.push(other);
                    state = ParseState::InKey;
                }
            }
        }

        match state {
            ParseState::Start => Err(syntax("empty segment")),
            ParseState::InKey => {
                segments.push(key_segment(current, literal));
                Ok(Self { segments })
            }
            ParseState::AfterIndex => Ok(Self { segments }),
        }
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

    pub fn last(&self) -> Option<&Segment> {
        self.segments.last()
    }

    pub fn parent(&self) -> Option<Path> {
        self.segments.split_last().map(|(_, parent)| Path {
            segments: parent.to_vec(),
        })
    }

    /// Appends `other` to this path.
    pub fn join(&self, other: &Path) -> Path {
        let mut segments = self.segments.clone();
        segments.extend(other.segments.iter().cloned());
        Path { segments }
    }

    pub fn child(&self, segment: Segment) -> Path {
        let mut segments = self.segments.clone();
        segments.push(segment);
        Path { segments }
    }

    pub fn key(&self, key: impl Into<String>) -> Path {
        self.child(Segment::Key(key.into()))
    }

    pub fn index(&self, index: usize) -> Path {
        self.child(Segment::Index(index))
    }

    /// Resolves the path; a missing intermediate yields `None`.
    pub fn get<'a>(&self, value: &'a Value) -> Option<&'a Value> {
        self.segments
            .iter()
            .try_fold(value, |current, segment| segment.get(current))
    }

    pub fn get_mut<'a>(&self, value: &'a mut Value) -> Option<&'a mut Value> {
        self.segments
            .iter()
            .try_fold(value, |current, segment| segment.get_mut(current))
    }

    /// Assigns `value`, creating missing objects and arrays along the way.
    pub fn set(&self, root: &mut Value, value: Value) -> Result<(), PathError> {
        let mut current = root;
        for (depth, segment) in self.segments.iter().enumerate() {
            current = self.slot_mut(current, segment, depth)?;
        }
        *current = value;
        Ok(())
    }

    /// Removes the addressed value. Array removal shifts later elements down.
    pub fn unset(&self, root: &mut Value) -> Result<Option<Value>, PathError> {
        let Some((last, parents)) = self.segments.split_last() else {
            return Ok(Some(std::mem::take(root)));
        };

        let mut current = root;
        for (depth, segment) in parents.iter().enumerate() {
            if current.is_null() {
                return Ok(None);
            }
            if !current.is_object() && !current.is_array() {
                return Err(self.conflict(depth, current));
            }
            match segment.get_mut(current) {
                Some(next) => current = next,
                None => return Ok(None),
            }
        }

        match (last, current) {
            (Segment::Key(key), Value::Object(map)) => Ok(map.shift_remove(key)),
            (Segment::Index(index), Value::Object(map)) => {
                Ok(map.shift_remove(&index.to_string()))
            }
            (segment, Value::Array(items)) => {
                let index = match segment {
                    Segment::Index(index) => Some(*index),
                    Segment::Key(key) => key.parse::<usize>().ok(),
                };
                match index {
                    Some(index) if index < items.len() => Ok(Some(items.remove(index))),
                    _ => Ok(None),
                }
            }
            (_, Value::Null) => Ok(None),
            (_, other) => Err(self.conflict(parents.len(), other)),
        }
    }

    fn slot_mut<'a>(
        &self,
        current: &'a mut Value,
        segment: &Segment,
        depth: usize,
    ) -> Result<&'a mut Value, PathError> {
        if current.is_null() {
            *current = segment.empty_container();
        }
        match current {
            Value::Object(map) => {
                let key = match segment {
                    Segment::Key(key) => key.clone(),
                    Segment::Index(index) => index.to_string(),
                };
                Ok(map.entry(key).or_insert(Value::Null))
            }
            Value::Array(items) => {
                let index = match segment {
                    Segment::Index(index) => *index,
                    Segment::Key(key) => key.parse::<usize>().map_err(|_| PathError::Conflict {
                        path: self.prefix(depth),
                        found: "array",
                    })?,
                };
                if index >= items.len() {
                    let new_len = index
                        .checked_add(1)
                        .filter(|new_len| new_len - items.len() <= MAX_INDEX_GAP)
                        .ok_or_else(|| PathError::IndexTooFar {
                            path: self.prefix(depth),
                            index,
                            len: items.len(),
                        })?;
                    items.resize(new_len, Value::Null);
                }
                Ok(&mut items[index])
            }
            other => Err(self.conflict(depth, other)),
        }
    }

    fn conflict(&self, depth: usize, found: &Value) -> PathError {
        PathError::Conflict {
            path: self.prefix(depth),
            found: value_kind(found),
        }
    }

    fn prefix(&self, depth: usize) -> String {
        Path {
            segments: self.segments[..depth].to_vec(),
        }
        .to_string()
    }
}

fn key_segment(key: String, literal: bool) -> Segment {
    if !literal
        && key.chars().all(|c| c.is_ascii_digit())
        && let Ok(index) = key.parse::<usize>()
    {
        return Segment::Index(index);
    }
    Segment::Key(key)
}

pub(crate) fn value_kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}

impl fmt::Display for Path {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (position, segment) in self.segments.iter().enumerate() {
            if position > 0 && matches!(segment, Segment::Key(_)) {
                f.write_str(".")?;
            }
            write!(f, "{segment}")?;
        }
        Ok(())
    }
}

impl FromStr for Path {
    type Err = PathError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Path::parse(s)
    }
}

impl TryFrom<String> for Path {
    type Error = PathError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Path::parse(&value)
    }
}

impl TryFrom<&str> for Path {
    type Error = PathError;

    fn try_from(value: &str) -> Result<Self, Self::Error> {
        Path::parse(value)
    }
}

impl From<Path> for String {
    fn from(path: Path) -> Self {
        path.to_string()
    }
}

impl From<Vec<Segment>> for Path {
    fn from(segments: Vec<Segment>) -> Self {
        Path { segments }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn path(input: &str) -> Path {
        Path::parse(input).expect("valid path")
    }

    #[test]
    fn parses_dotted_and_bracketed_segments() {
        let parsed = path("spec.items[2].value");
        assert_eq!(
            parsed.segments(),
            &[
                Segment::Key("spec".into()),
                Segment::Key("items".into()),
                Segment::Index(2),
                Segment::Key("value".into()),
            ]
        );
        assert_eq!(path("spec.items.2.value"), parsed);
    }

    #[test]
    fn escaped_dot_stays_inside_key() {
        let parsed = path(r"metadata.annotations.apps\.open-cluster-management\.io/git-branch");
        assert_eq!(parsed.len(), 3);
        assert_eq!(
            parsed.last(),
            Some(&Segment::Key(
                "apps.open-cluster-management.io/git-branch".into()
            ))
        );
    }

    #[test]
    fn set_with_escaped_key_stores_literal_key() {
        let mut doc = json!({});
        let parsed = path(r"a\.b.c");
        parsed.set(&mut doc, json!(1)).unwrap();
        assert_eq!(doc, json!({ "a.b": { "c": 1 } }));
        assert_eq!(parsed.get(&doc), Some(&json!(1)));
        assert!(doc.get("a").is_none());
    }

    #[test]
    fn display_round_trips_through_parse() {
        for input in [
            "metadata.name",
            r"metadata.annotations.policy\.open-cluster-management\.io/rerun",
            "spec.items[0].value",
            "[1].kind",
            "a[0][1]",
        ] {
            let parsed = path(input);
            assert_eq!(Path::parse(&parsed.to_string()).unwrap(), parsed);
        }
    }

    #[test]
    fn rejects_malformed_paths() {
        for input in ["a..b", "a.", ".a", r"a\", "a[", "a[x]", "a]", "a[0]b", "a.[0]", r"a\q"] {
            assert!(
                matches!(Path::parse(input), Err(PathError::Syntax { .. })),
                "expected syntax error for {input}"
            );
        }
    }

    #[test]
    fn get_missing_intermediate_returns_none() {
        let doc = json!({ "spec": { "mode": "once" } });
        assert_eq!(path("spec.automationDef.name").get(&doc), None);
        assert_eq!(path("spec.mode.deeper").get(&doc), None);
    }

    #[test]
    fn set_creates_arrays_for_index_segments() {
        let mut doc = json!({});
        path("spec.items[1].name").set(&mut doc, json!("b")).unwrap();
        assert_eq!(doc, json!({ "spec": { "items": [null, { "name": "b" }] } }));
    }

    #[test]
    fn set_rejects_indices_far_past_the_end() {
        let mut doc = json!({});
        let err = path("items[18446744073709551615]")
            .set(&mut doc, json!(1))
            .unwrap_err();
        assert_eq!(
            err,
            PathError::IndexTooFar {
                path: "items".into(),
                index: usize::MAX,
                len: 0
            }
        );

        let mut doc = json!({ "items": ["a"] });
        let err = path("items[4000000000]").set(&mut doc, json!(1)).unwrap_err();
        assert!(matches!(err, PathError::IndexTooFar { index: 4_000_000_000, len: 1, .. }));
        assert_eq!(doc, json!({ "items": ["a"] }));

        path("items[3]").set(&mut doc, json!("d")).unwrap();
        assert_eq!(doc, json!({ "items": ["a", null, null, "d"] }));
    }

    #[test]
    fn set_through_scalar_is_a_conflict() {
        let mut doc = json!({ "spec": "flat" });
        let err = path("spec.mode").set(&mut doc, json!("x")).unwrap_err();
        assert_eq!(
            err,
            PathError::Conflict {
                path: "spec".into(),
                found: "string"
            }
        );
        assert_eq!(doc, json!({ "spec": "flat" }));
    }

    #[test]
    fn unset_array_element_shifts_following_items() {
        let mut doc = json!({ "items": ["a", "b", "c"] });
        let removed = path("items[0]").unset(&mut doc).unwrap();
        assert_eq!(removed, Some(json!("a")));
        assert_eq!(doc, json!({ "items": ["b", "c"] }));
    }

    #[test]
    fn unset_keeps_sibling_key_order() {
        let mut doc = json!({ "a": 1, "b": 2, "c": 3 });
        path("a").unset(&mut doc).unwrap();
        let keys: Vec<_> = doc.as_object().unwrap().keys().cloned().collect();
        assert_eq!(keys, vec!["b", "c"]);
    }

    #[test]
    fn unset_missing_is_noop() {
        let mut doc = json!({ "a": {} });
        assert_eq!(path("a.b.c").unset(&mut doc).unwrap(), None);
        assert_eq!(doc, json!({ "a": {} }));
    }

    #[test]
    fn serde_uses_string_form() {
        let parsed: Path = serde_json::from_value(json!(r"a\.b.c")).unwrap();
        assert_eq!(serde_json::to_value(&parsed).unwrap(), json!(r"a\.b.c"));
        assert!(serde_json::from_value::<Path>(json!("a..b")).is_err());
    }
}
