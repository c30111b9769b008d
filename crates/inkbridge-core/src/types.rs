// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Core domain types for the Inkbridge editor bridge.

use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Timestamp sentinel meaning "no authoritative timestamp available".
pub const UNKNOWN_TIMESTAMP: i64 = -1;

/// Correlation identifier for a single request/response exchange.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct RequestId(pub Uuid);

impl RequestId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for RequestId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for RequestId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Monotonic counter identifying one collaboration session.
///
/// Every `startSync` bumps the generation; events stamped with an older
/// generation belong to a stopped session and are discarded.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct SessionGeneration(pub u64);

impl SessionGeneration {
    pub fn next(self) -> Self {
        Self(self.0.wrapping_add(1))
    }
}

impl std::fmt::Display for SessionGeneration {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "gen-{}", self.0)
    }
}

/// Rich-text editor whose native JSON format the seed document carries.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EditorFormat {
    /// Quill delta: `{ "ops": [...] }`.
    Quill,
    /// Lexical serialized tree: `{ "root": {...}, "commentThreads": [...] }`.
    Lexical,
    /// Draft.js raw content: `{ "blocks": [...], "entityMap": {...} }`.
    Draft,
}

impl EditorFormat {
    /// Top-level key every document of this format must carry.
    pub fn root_key(&self) -> &'static str {
        match self {
            Self::Quill => "ops",
            Self::Lexical => "root",
            Self::Draft => "blocks",
        }
    }

    /// Parse a format name as it appears in configuration files.
    pub fn from_name(name: &str) -> Option<Self> {
        match name.to_ascii_lowercase().as_str() {
            "quill" => Some(Self::Quill),
            "lexical" => Some(Self::Lexical),
            "draft" | "draftjs" | "draft-js" => Some(Self::Draft),
            _ => None,
        }
    }
}

impl std::fmt::Display for EditorFormat {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            Self::Quill => "quill",
            Self::Lexical => "lexical",
            Self::Draft => "draft",
        };
        f.write_str(name)
    }
}

/// How replies are matched to outstanding bridge calls.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CorrelationMode {
    /// Every call carries a request id; any number may be outstanding.
    #[default]
    ById,
    /// One outstanding call per channel. A newer call supersedes the older
    /// one, which fails with `Superseded`.
    SingleSlot,
}

/// How host → content calls are rendered for script evaluation.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ScriptStyle {
    /// `window.inkbridge.receive({...})`: a single registered entry point.
    #[default]
    Envelope,
    /// `setInitState(...)`, `window.<channel>HookResponse(...)`: the bare
    /// window globals older content bundles expose.
    LegacyGlobals,
}

/// Retry classification shared by the bridge, pipeline and error reporting.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ErrorClass {
    /// Retrying the same operation may succeed.
    Transient,
    /// Something outside the bridge must change first.
    UserAction,
    /// Retrying will fail the same way.
    Permanent,
}

/// Channel and call names shared by both sides of the bridge.
pub mod channels {
    // -- Content → host messages --
    pub const CONTENT_CHANGED: &str = "contentChanged";
    pub const USERS_UPDATE: &str = "usersUpdate";
    pub const COLLAB_ERROR: &str = "onCodoxError";
    pub const FETCH_DOC_ON_NETWORK_RECONNECT: &str = "fetchDocOnNetworkReconnect";
    pub const BLACKLISTED_INSERT: &str = "onBlacklistedInsert";
    pub const PAGE_LOADED: &str = "pageLoaded";
    pub const EDITOR_INITIALIZED: &str = "editorInitialized";
    pub const INIT_ERROR: &str = "onInitError";
    /// Console output of the content runtime.
    pub const CONTENT_LOGS: &str = "jsLogsPipeHandler";

    // -- Host → content calls --
    pub const SET_INIT_STATE: &str = "setInitState";
    pub const START_SYNC: &str = "startSync";
    pub const STOP_SYNC: &str = "stopSync";
    pub const SHOW_REMOTE_CURSORS: &str = "showRemoteCursors";
    pub const HIDE_REMOTE_CURSORS: &str = "hideRemoteCursors";

    /// Name of the reply callback for request channel `channel`.
    ///
    /// Content bundles in the field register `fetchDocOnReconnectHookResponse`
    /// for the reconnect channel, so that one keeps its historical name.
    pub fn hook_response_name(channel: &str) -> String {
        if channel == FETCH_DOC_ON_NETWORK_RECONNECT {
            "fetchDocOnReconnectHookResponse".to_owned()
        } else {
            format!("{channel}HookResponse")
        }
    }

    /// Inverse of [`hook_response_name`].
    pub fn channel_for_hook(hook: &str) -> Option<String> {
        if hook == "fetchDocOnReconnectHookResponse" {
            return Some(FETCH_DOC_ON_NETWORK_RECONNECT.to_owned());
        }
        hook.strip_suffix("HookResponse")
            .filter(|channel| !channel.is_empty())
            .map(str::to_owned)
    }
}

/// Console level of a piped content log line.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ConsoleLevel {
    Debug,
    #[default]
    Log,
    Info,
    Warn,
    Error,
}

/// One `console.*` call made in the content, as posted on
/// [`channels::CONTENT_LOGS`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConsoleMessage {
    #[serde(default)]
    pub level: ConsoleLevel,
    #[serde(default)]
    pub args: Vec<serde_json::Value>,
}

impl ConsoleMessage {
    pub fn new(level: ConsoleLevel, args: Vec<serde_json::Value>) -> Self {
        Self { level, args }
    }

    /// Decode a posted line. Older bundles post the bare argument array;
    /// anything that is not JSON is kept as a single text argument.
    pub fn parse(json: &str) -> Self {
        if let Ok(message) = serde_json::from_str::<Self>(json) {
            return message;
        }
        match serde_json::from_str::<Vec<serde_json::Value>>(json) {
            Ok(args) => Self::new(ConsoleLevel::Log, args),
            Err(_) => Self::new(ConsoleLevel::Log, vec![serde_json::Value::String(json.to_owned())]),
        }
    }

    /// Arguments joined by spaces, strings unquoted, as a console prints them.
    pub fn text(&self) -> String {
        self.args
            .iter()
            .map(|arg| match arg {
                serde_json::Value::String(s) => s.clone(),
                other => other.to_string(),
            })
            .collect::<Vec<_>>()
            .join(" ")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn hook_response_names() {
        assert_eq!(
            channels::hook_response_name(channels::FETCH_DOC_ON_NETWORK_RECONNECT),
            "fetchDocOnReconnectHookResponse"
        );
        assert_eq!(channels::hook_response_name("loadComments"), "loadCommentsHookResponse");
    }

    #[test]
    fn hook_names_map_back_to_channels() {
        for channel in [channels::FETCH_DOC_ON_NETWORK_RECONNECT, "loadComments"] {
            let hook = channels::hook_response_name(channel);
            assert_eq!(channels::channel_for_hook(&hook).as_deref(), Some(channel));
        }
        assert!(channels::channel_for_hook("HookResponse").is_none());
        assert!(channels::channel_for_hook("startSync").is_none());
    }

    #[test]
    fn console_lines_in_every_shape() {
        let tagged = ConsoleMessage::parse(r#"{"level":"error","args":["codox failed",{"code":401}]}"#);
        assert_eq!(tagged.level, ConsoleLevel::Error);
        assert_eq!(tagged.text(), r#"codox failed {"code":401}"#);

        let bare = ConsoleMessage::parse(r#"["editor ready",3]"#);
        assert_eq!(bare.level, ConsoleLevel::Log);
        assert_eq!(bare.text(), "editor ready 3");

        assert_eq!(ConsoleMessage::parse("plain text").text(), "plain text");
    }

    #[test]
    fn editor_format_names() {
        assert_eq!(EditorFormat::from_name("Draft-JS"), Some(EditorFormat::Draft));
        assert_eq!(EditorFormat::from_name("prosemirror"), None);
        assert_eq!(EditorFormat::Lexical.root_key(), "root");
    }

    #[test]
    fn generations_increase() {
        let g = SessionGeneration::default();
        assert!(g.next() > g);
        assert_eq!(g.next().to_string(), "gen-1");
    }
}
