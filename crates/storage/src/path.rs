//! Field paths into JSON documents and the write operations that target them.
//!
//! A path is a list of segments rather than a dotted string, so map keys such as user ids
//! may contain dots. Numeric segments index into arrays.

use std::fmt;

use serde_json::{Map, Value};

use crate::StoreError;

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct FieldPath(Vec<String>);

impl FieldPath {
    pub fn new<I, S>(segments: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self(segments.into_iter().map(Into::into).collect())
    }

    pub fn field(name: impl Into<String>) -> Self {
        Self(vec![name.into()])
    }

    pub fn child(&self, segment: impl Into<String>) -> Self {
        let mut segments = self.0.clone();
        segments.push(segment.into());
        Self(segments)
    }

    pub fn index(&self, index: usize) -> Self {
        self.child(index.to_string())
    }

    pub fn segments(&self) -> &[String] {
        &self.0
    }
}

impl fmt::Display for FieldPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0.join("."))
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum FieldOp {
    Set(FieldPath, Value),
    Delete(FieldPath),
}

impl FieldOp {
    pub fn path(&self) -> &FieldPath {
        match self {
            Self::Set(path, _) | Self::Delete(path) => path,
        }
    }
}

pub fn lookup<'a>(document: &'a Value, path: &FieldPath) -> Option<&'a Value> {
    path.segments()
        .iter()
        .try_fold(document, |node, segment| match node {
            Value::Object(map) => map.get(segment),
            Value::Array(items) => segment.parse::<usize>().ok().and_then(|i| items.get(i)),
            _ => None,
        })
}

/// Applies `ops` in order to a copy of `document`. Either every op applies or none do.
pub fn apply_ops(document: &Value, ops: &[FieldOp]) -> Result<Value, StoreError> {
    let mut next = document.clone();
    for op in ops {
        match op {
            FieldOp::Set(path, value) => set_at(&mut next, path, value.clone())?,
            FieldOp::Delete(path) => delete_at(&mut next, path)?,
        }
    }
    Ok(next)
}

fn set_at(document: &mut Value, path: &FieldPath, value: Value) -> Result<(), StoreError> {
    let (last, parents) = split_last(path)?;
    let parent = descend(document, path, parents)?;
    match parent {
        Value::Object(map) => {
            map.insert(last.clone(), value);
            Ok(())
        }
        Value::Array(items) => {
            let index = parse_index(path, last)?;
            if index < items.len() {
                items[index] = value;
                Ok(())
            } else if index == items.len() {
                items.push(value);
                Ok(())
            } else {
                Err(invalid(path, format!("index {index} is past the end")))
            }
        }
        _ => Err(invalid(path, "parent is not a map or array")),
    }
}

fn delete_at(document: &mut Value, path: &FieldPath) -> Result<(), StoreError> {
    let (last, parents) = split_last(path)?;
    let parent = descend(document, path, parents)?;
    match parent {
        Value::Object(map) => {
            map.remove(last);
            Ok(())
        }
        _ => Err(invalid(path, "only map fields can be deleted")),
    }
}

fn split_last(path: &FieldPath) -> Result<(&String, &[String]), StoreError> {
    path.segments()
        .split_last()
        .ok_or_else(|| invalid(path, "path is empty"))
}

/// Walks to the parent of the final segment, creating missing intermediate maps.
fn descend<'a>(
    document: &'a mut Value,
    path: &FieldPath,
    parents: &[String],
) -> Result<&'a mut Value, StoreError> {
    let mut node = document;
    for segment in parents {
        node = match node {
            Value::Object(map) => map
                .entry(segment.clone())
                .or_insert_with(|| Value::Object(Map::new())),
            Value::Array(items) => {
                let index = parse_index(path, segment)?;
                items
                    .get_mut(index)
                    .ok_or_else(|| invalid(path, format!("index {index} is out of bounds")))?
            }
            _ => return Err(invalid(path, format!("'{segment}' is not inside a map"))),
        };
    }
    Ok(node)
}

fn parse_index(path: &FieldPath, segment: &str) -> Result<usize, StoreError> {
    segment
        .parse::<usize>()
        .map_err(|_| invalid(path, format!("'{segment}' is not an array index")))
}

fn invalid(path: &FieldPath, reason: impl Into<String>) -> StoreError {
    StoreError::InvalidPath {
        path: path.to_string(),
        reason: reason.into(),
    }
}

#[cfg(test)]
#[path = "tests/path_tests.rs"]
mod tests;
