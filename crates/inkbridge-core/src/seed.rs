// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Seed documents and their structural validation.
//
// The host hands the editor either a bare editor document (`{"ops": [...]}`)
// or the wrapped form used by reconnect fetches
// (`{"content": {...}, "timestamp": N}`). Both normalise to `SeedDocument`.
// Validation here is structural only: enough to refuse a document the editor
// would choke on, nothing about the editor's own semantics.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::error::{InkbridgeError, Result};
use crate::types::{EditorFormat, UNKNOWN_TIMESTAMP};

fn unknown_timestamp() -> i64 {
    UNKNOWN_TIMESTAMP
}

/// Initial (or refetched) editor content plus its authority timestamp.
///
/// Serialises to the wire format `{"content": <editor JSON>, "timestamp": N}`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SeedDocument {
    pub content: Value,
    #[serde(default = "unknown_timestamp")]
    pub timestamp: i64,
}

impl SeedDocument {
    pub fn new(content: Value, timestamp: i64) -> Self {
        Self { content, timestamp }
    }

    /// Seed without an authoritative timestamp.
    pub fn untimed(content: Value) -> Self {
        Self::new(content, UNKNOWN_TIMESTAMP)
    }

    /// Whether the timestamp can be trusted for conflict resolution.
    pub fn is_authoritative(&self) -> bool {
        self.timestamp != UNKNOWN_TIMESTAMP
    }

    /// Parse a seed as the host supplies it and validate it for `format`.
    ///
    /// Accepts the bare editor document (timestamp becomes `-1`) or the
    /// wrapped `{content, timestamp}` form.
    pub fn parse(json: &str, format: EditorFormat) -> Result<Self> {
        let value: Value = serde_json::from_str(json)
            .map_err(|e| InkbridgeError::InvalidSeed(format!("not JSON: {e}")))?;
        Self::from_value(value, format)
    }

    /// Same as [`SeedDocument::parse`] for an already-decoded value.
    pub fn from_value(value: Value, format: EditorFormat) -> Result<Self> {
        let seed = if is_wrapped(&value, format) {
            let timestamp = match value.get("timestamp") {
                None | Some(Value::Null) => UNKNOWN_TIMESTAMP,
                Some(ts) => ts.as_i64().ok_or_else(|| {
                    InkbridgeError::InvalidSeed(format!("timestamp is not an integer: {ts}"))
                })?,
            };
            let content = value.get("content").cloned().unwrap_or(Value::Null);
            Self::new(content, timestamp)
        } else {
            Self::untimed(value)
        };
        validate_structure(format, &seed.content)?;
        Ok(seed)
    }

    /// Encode in the wire format shared by host and content.
    pub fn to_wire_json(&self) -> Result<String> {
        Ok(serde_json::to_string(self)?)
    }
}

/// A document is in wrapped form when it has a `content` key but not the
/// format's own root key at top level.
fn is_wrapped(value: &Value, format: EditorFormat) -> bool {
    match value.as_object() {
        Some(obj) => obj.contains_key("content") && !obj.contains_key(format.root_key()),
        None => false,
    }
}

/// Check that `content` has the top-level shape `format` requires.
pub fn validate_structure(format: EditorFormat, content: &Value) -> Result<()> {
    let obj = content
        .as_object()
        .ok_or_else(|| invalid(format, "document must be a JSON object"))?;
    match format {
        EditorFormat::Quill => validate_quill(obj),
        EditorFormat::Lexical => validate_lexical(obj),
        EditorFormat::Draft => validate_draft(obj),
    }
}

fn invalid(format: EditorFormat, reason: impl std::fmt::Display) -> InkbridgeError {
    InkbridgeError::InvalidSeed(format!("{format}: {reason}"))
}

fn validate_quill(doc: &Map<String, Value>) -> Result<()> {
    let fmt = EditorFormat::Quill;
    let ops = doc
        .get("ops")
        .ok_or_else(|| invalid(fmt, "missing `ops`"))?
        .as_array()
        .ok_or_else(|| invalid(fmt, "`ops` must be an array"))?;

    for (i, op) in ops.iter().enumerate() {
        let op = op
            .as_object()
            .ok_or_else(|| invalid(fmt, format!("op {i} is not an object")))?;

        let kinds = ["insert", "delete", "retain"]
            .iter()
            .filter(|k| op.contains_key(**k))
            .count();
        if kinds != 1 {
            return Err(invalid(
                fmt,
                format!("op {i} must have exactly one of insert/delete/retain"),
            ));
        }
        if let Some(insert) = op.get("insert")
            && !(insert.is_string() || insert.is_object())
        {
            return Err(invalid(fmt, format!("op {i}: insert must be a string or embed")));
        }
        if let Some(delete) = op.get("delete")
            && !delete.as_u64().is_some_and(|n| n > 0)
        {
            return Err(invalid(fmt, format!("op {i}: delete must be a positive integer")));
        }
        if let Some(retain) = op.get("retain")
            && !(retain.as_u64().is_some_and(|n| n > 0) || retain.is_object())
        {
            return Err(invalid(fmt, format!("op {i}: retain must be a positive integer or embed")));
        }
        if let Some(attrs) = op.get("attributes")
            && !attrs.is_object()
        {
            return Err(invalid(fmt, format!("op {i}: attributes must be an object")));
        }
    }
    Ok(())
}

fn validate_lexical(doc: &Map<String, Value>) -> Result<()> {
    let fmt = EditorFormat::Lexical;
    let root = doc
        .get("root")
        .ok_or_else(|| invalid(fmt, "missing `root`"))?
        .as_object()
        .ok_or_else(|| invalid(fmt, "`root` must be an object"))?;

    match root.get("type") {
        Some(kind) if kind == "root" => {}
        Some(kind) => return Err(invalid(fmt, format!("root node has type {kind}"))),
        None => return Err(invalid(fmt, "missing `root.type`")),
    }
    match root.get("children") {
        Some(Value::Array(children)) => {
            for (i, child) in children.iter().enumerate() {
                if child.get("type").and_then(Value::as_str).is_none() {
                    return Err(invalid(fmt, format!("root child {i} has no `type`")));
                }
            }
        }
        Some(_) => return Err(invalid(fmt, "`root.children` must be an array")),
        None => return Err(invalid(fmt, "missing `root.children`")),
    }
    if let Some(threads) = doc.get("commentThreads")
        && !threads.is_array()
    {
        return Err(invalid(fmt, "`commentThreads` must be an array"));
    }
    Ok(())
}

fn validate_draft(doc: &Map<String, Value>) -> Result<()> {
    let fmt = EditorFormat::Draft;
    let blocks = doc
        .get("blocks")
        .ok_or_else(|| invalid(fmt, "missing `blocks`"))?
        .as_array()
        .ok_or_else(|| invalid(fmt, "`blocks` must be an array"))?;

    for (i, block) in blocks.iter().enumerate() {
        if block.get("text").and_then(Value::as_str).is_none() {
            return Err(invalid(fmt, format!("block {i} has no `text`")));
        }
    }
    match doc.get("entityMap") {
        Some(Value::Object(_)) => Ok(()),
        Some(_) => Err(invalid(fmt, "`entityMap` must be an object")),
        None => Err(invalid(fmt, "missing `entityMap`")),
    }
}
