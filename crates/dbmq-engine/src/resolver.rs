//! Path resolver – walks a [`Value`] tree one [`Segment`] at a time.
//!
//! Each step checks the shape of the *current* node against the segment:
//! key lookups need a mapping, indices need a sequence and bare names need a
//! record. A mismatch is reported as a typed [`BridgeError`]; resolution never
//! panics, whatever the payload looks like. The leaf is returned by reference
//! and without coercion, so structured leaves are legal results.

use dbmq_types::{BridgeError, Scalar, Value};
use tracing::trace;

use crate::path::{PathExpression, Segment};

/// Follow `path` through `payload` and return the addressed node.
///
/// An empty path returns `payload` itself.
pub fn resolve<'v>(payload: &'v Value, path: &PathExpression) -> Result<&'v Value, BridgeError> {
    path.segments()
        .iter()
        .try_fold(payload, |current, segment| step(current, segment))
}

/// Parse `expr` and resolve it against `payload`.
///
/// Syntax errors surface here, at resolve time, as
/// [`BridgeError::InvalidPathSyntax`] or [`BridgeError::InvalidIndexSyntax`].
pub fn resolve_str<'v>(payload: &'v Value, expr: &str) -> Result<&'v Value, BridgeError> {
    let path = PathExpression::parse(expr)?;
    resolve(payload, &path)
}

fn step<'v>(current: &'v Value, segment: &Segment) -> Result<&'v Value, BridgeError> {
    trace!(segment = %segment, shape = current.kind(), "applying path segment");
    match segment {
        Segment::Key(key) => match current {
            Value::Mapping(entries) => entries
                .iter()
                .find(|(k, _)| key_matches(k, key))
                .map(|(_, v)| v)
                .ok_or_else(|| BridgeError::KeyNotFound { key: key.clone() }),
            other => Err(BridgeError::NotAMapping {
                key: key.clone(),
                found: other.kind(),
            }),
        },
        Segment::Index(index) => match current {
            Value::Sequence(items) => items.get(*index).ok_or(BridgeError::IndexOutOfRange {
                index: *index,
                len: items.len(),
            }),
            other => Err(BridgeError::NotASequence {
                index: *index,
                found: other.kind(),
            }),
        },
        Segment::Field(name) => match current {
            Value::Record(fields) => fields
                .iter()
                .find(|(field, _)| field == name)
                .map(|(_, v)| v)
                .ok_or_else(|| BridgeError::FieldNotFound { field: name.clone() }),
            other => Err(BridgeError::NotARecord {
                field: name.clone(),
                found: other.kind(),
            }),
        },
    }
}

/// Keys are compared by their canonical string form.
fn key_matches(key: &Scalar, wanted: &str) -> bool {
    match key {
        Scalar::Text(s) => s == wanted,
        other => other.to_string() == wanted,
    }
}
