// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Typed editor documents.
//
// Only the fields the bridge needs are named; everything else an editor
// writes is carried through `extra` untouched, so a document read from a seed
// serialises back to a structurally equal value.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use inkbridge_core::error::{InkbridgeError, Result};
use inkbridge_core::seed::{self, SeedDocument};
use inkbridge_core::types::EditorFormat;

/// Quill delta: `{"ops": [...]}`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QuillDelta {
    pub ops: Vec<QuillOp>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

/// One delta operation. Exactly one of `insert`, `delete`, `retain` is set.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QuillOp {
    /// Text, or an embed object.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub insert: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub delete: Option<u64>,
    /// Length, or an embed object for embed retains.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub retain: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub attributes: Option<Map<String, Value>>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

/// Serialised Lexical editor state plus the comment threads stored with it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LexicalState {
    pub root: LexicalNode,
    #[serde(rename = "commentThreads", default, skip_serializing_if = "Option::is_none")]
    pub comment_threads: Option<Vec<Value>>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LexicalNode {
    #[serde(rename = "type")]
    pub kind: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub children: Option<Vec<LexicalNode>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub text: Option<String>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

/// Draft.js raw content: `{"blocks": [...], "entityMap": {...}}`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DraftRaw {
    pub blocks: Vec<DraftBlock>,
    #[serde(rename = "entityMap")]
    pub entity_map: Map<String, Value>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DraftBlock {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub key: Option<String>,
    pub text: String,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

/// The document an editor currently holds.
#[derive(Debug, Clone, PartialEq)]
pub enum EditorDocument {
    Quill(QuillDelta),
    Lexical(LexicalState),
    Draft(DraftRaw),
}

impl EditorDocument {
    /// Build the typed document from a seed's content.
    pub fn from_seed(format: EditorFormat, seed: &SeedDocument) -> Result<Self> {
        Self::from_value(format, seed.content.clone())
    }

    /// Validate `content` for `format` and convert it.
    pub fn from_value(format: EditorFormat, content: Value) -> Result<Self> {
        seed::validate_structure(format, &content)?;
        let doc = match format {
            EditorFormat::Quill => Self::Quill(typed(format, content)?),
            EditorFormat::Lexical => Self::Lexical(typed(format, content)?),
            EditorFormat::Draft => Self::Draft(typed(format, content)?),
        };
        Ok(doc)
    }

    /// Comment threads stored alongside a Lexical document.
    pub fn comment_threads(&self) -> Option<&[Value]> {
        match self {
            Self::Lexical(state) => state.comment_threads.as_deref(),
            _ => None,
        }
    }

    pub fn format(&self) -> EditorFormat {
        match self {
            Self::Quill(_) => EditorFormat::Quill,
            Self::Lexical(_) => EditorFormat::Lexical,
            Self::Draft(_) => EditorFormat::Draft,
        }
    }

    /// Read the document back as editor-native JSON.
    pub fn snapshot(&self) -> Result<Value> {
        let value = match self {
            Self::Quill(d) => serde_json::to_value(d)?,
            Self::Lexical(s) => serde_json::to_value(s)?,
            Self::Draft(r) => serde_json::to_value(r)?,
        };
        Ok(value)
    }

    /// Plain text with one line per paragraph or block.
    pub fn plain_text(&self) -> String {
        match self {
            Self::Quill(delta) => delta
                .ops
                .iter()
                .filter_map(|op| op.insert.as_ref().and_then(Value::as_str))
                .collect(),
            Self::Lexical(state) => {
                let mut out = String::new();
                for block in state.root.children.iter().flatten() {
                    collect_text(block, &mut out);
                    out.push('\n');
                }
                out
            }
            Self::Draft(raw) => raw.blocks.iter().map(|b| format!("{}\n", b.text)).collect(),
        }
    }
}

fn typed<T: serde::de::DeserializeOwned>(format: EditorFormat, content: Value) -> Result<T> {
    serde_json::from_value(content).map_err(|e| InkbridgeError::InvalidSeed(format!("{format}: {e}")))
}

fn collect_text(node: &LexicalNode, out: &mut String) {
    if let Some(text) = &node.text {
        out.push_str(text);
    }
    for child in node.children.iter().flatten() {
        collect_text(child, out);
    }
}
