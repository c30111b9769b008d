// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Bridge configuration.

use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::{InkbridgeError, Result};
use crate::types::{CorrelationMode, EditorFormat, ScriptStyle};

/// Kind of bundled asset injected after the page finishes loading.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AssetKind {
    /// JavaScript evaluated directly in the content runtime.
    Script,
    /// CSS appended to the document head as a `<style>` element.
    Stylesheet,
}

/// One entry of the asset manifest.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AssetSpec {
    /// Path relative to the bundle directory (e.g. `static/js/main.js`).
    pub path: String,
    pub kind: AssetKind,
    /// Optional lowercase hex SHA-256 the file must match.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sha256: Option<String>,
}

impl AssetSpec {
    pub fn script(path: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            kind: AssetKind::Script,
            sha256: None,
        }
    }

    pub fn stylesheet(path: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            kind: AssetKind::Stylesheet,
            sha256: None,
        }
    }
}

/// Collaboration session parameters, passed through to the client verbatim.
///
/// Serialises with the camelCase keys the client expects
/// (`docId`, `username`, `apiKey`, `autostart`).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CollabConfig {
    pub doc_id: String,
    pub username: String,
    pub api_key: String,
    #[serde(default)]
    pub autostart: bool,
}

impl Default for CollabConfig {
    fn default() -> Self {
        Self {
            doc_id: "demo-document".into(),
            username: "demo-user".into(),
            api_key: String::new(),
            autostart: false,
        }
    }
}

/// Persistent bridge settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct BridgeConfig {
    /// Origin the content is loaded under. Must be an allow-listed domain for
    /// the collaboration service, with an `http://` or `https://` prefix.
    pub base_origin: String,
    /// HTML entry document inside the asset bundle.
    pub html_entry: String,
    /// Editor the content bundle hosts.
    pub editor_format: EditorFormat,
    /// Scripts and stylesheets injected after load, in order.
    pub assets: Vec<AssetSpec>,
    pub collab: CollabConfig,
    /// Deadline for a content → host request/response call.
    pub reply_timeout_ms: u64,
    /// Deadline for each positive completion signal awaited by the pipeline.
    pub ready_timeout_ms: u64,
    pub correlation: CorrelationMode,
    /// How host → content calls are rendered when the view only evaluates
    /// scripts.
    pub script_style: ScriptStyle,
    /// Forward the content's `console.*` output into the host log.
    pub pipe_content_logs: bool,
}

impl Default for BridgeConfig {
    fn default() -> Self {
        Self {
            base_origin: "http://inkbridge_demo.app/".into(),
            html_entry: "quill.html".into(),
            editor_format: EditorFormat::Quill,
            assets: vec![AssetSpec::script("codox.js")],
            collab: CollabConfig::default(),
            reply_timeout_ms: 10_000,
            ready_timeout_ms: 5_000,
            correlation: CorrelationMode::ById,
            script_style: ScriptStyle::Envelope,
            pipe_content_logs: true,
        }
    }
}

impl BridgeConfig {
    /// Parse from JSON and validate. Missing fields take their defaults.
    pub fn from_json_str(json: &str) -> Result<Self> {
        let config: Self = serde_json::from_str(json)?;
        config.validate()?;
        Ok(config)
    }

    pub fn reply_timeout(&self) -> Duration {
        Duration::from_millis(self.reply_timeout_ms)
    }

    pub fn ready_timeout(&self) -> Duration {
        Duration::from_millis(self.ready_timeout_ms)
    }

    /// Reject settings the bridge cannot work with.
    pub fn validate(&self) -> Result<()> {
        if !(self.base_origin.starts_with("http://") || self.base_origin.starts_with("https://")) {
            return Err(InkbridgeError::Config(format!(
                "base_origin must start with http:// or https://, got {:?}",
                self.base_origin
            )));
        }
        if self.html_entry.trim().is_empty() {
            return Err(InkbridgeError::Config("html_entry is empty".into()));
        }
        if self.reply_timeout_ms == 0 || self.ready_timeout_ms == 0 {
            return Err(InkbridgeError::Config("timeouts must be non-zero".into()));
        }
        for asset in &self.assets {
            if let Some(digest) = &asset.sha256
                && (digest.len() != 64 || !digest.bytes().all(|b| b.is_ascii_hexdigit()))
            {
                return Err(InkbridgeError::Config(format!(
                    "asset {} has a malformed sha256",
                    asset.path
                )));
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_are_valid() {
        assert!(BridgeConfig::default().validate().is_ok());
    }

    #[test]
    fn partial_json_takes_defaults() {
        let config = BridgeConfig::from_json_str(
            r#"{"editor_format":"lexical","collab":{"docId":"d1","username":"u1","apiKey":"k"}}"#,
        )
        .unwrap();
        assert_eq!(config.editor_format, EditorFormat::Lexical);
        assert_eq!(config.collab.doc_id, "d1");
        assert!(!config.collab.autostart);
        assert_eq!(config.reply_timeout(), Duration::from_secs(10));
    }

    #[test]
    fn origin_without_scheme_is_rejected() {
        let config = BridgeConfig {
            base_origin: "kotlin_demo.app".into(),
            ..BridgeConfig::default()
        };
        assert!(matches!(config.validate(), Err(InkbridgeError::Config(_))));
    }

    #[test]
    fn collab_config_uses_client_keys() {
        let json = serde_json::to_value(CollabConfig::default()).unwrap();
        assert!(json.get("docId").is_some());
        assert!(json.get("apiKey").is_some());
    }
}
