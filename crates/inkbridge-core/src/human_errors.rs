// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Human-readable error messages for the host's editor screen.
//
// Bridge and session errors are mapped to a short message plus a suggestion
// the host can show in a banner or toast. Collaboration-client error events
// arrive as opaque JSON and get the same treatment.

use serde_json::Value;

use crate::error::InkbridgeError;
use crate::types::ErrorClass;

/// Severity of an error from the user's perspective.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Severity {
    /// Sync hiccup; the bridge retries or the next edit will recover.
    Transient,
    /// The user (or app operator) must do something first.
    ActionRequired,
    /// The editor cannot proceed with this document or build.
    Permanent,
}

/// A human-readable error with a plain message and actionable suggestion.
#[derive(Debug, Clone)]
pub struct HumanError {
    /// Plain summary (shown as a heading).
    pub message: String,
    /// What the user should try (shown as body text).
    pub suggestion: String,
    /// Whether the host may retry automatically.
    pub retriable: bool,
    pub severity: Severity,
}

impl HumanError {
    fn new(message: &str, suggestion: impl Into<String>, class: ErrorClass) -> Self {
        let severity = match class {
            ErrorClass::Transient => Severity::Transient,
            ErrorClass::UserAction => Severity::ActionRequired,
            ErrorClass::Permanent => Severity::Permanent,
        };
        Self {
            message: message.into(),
            suggestion: suggestion.into(),
            retriable: class == ErrorClass::Transient,
            severity,
        }
    }
}

/// Convert an `InkbridgeError` into something an editor user can act on.
pub fn humanize_error(err: &InkbridgeError) -> HumanError {
    let class = err.class();
    match err {
        InkbridgeError::InvalidSeed(detail) => HumanError::new(
            "This document could not be opened.",
            format!("The saved content looks damaged. Try reopening it, or restore an earlier version. ({detail})"),
            class,
        ),

        InkbridgeError::Timeout { .. } | InkbridgeError::SignalTimeout(_) => HumanError::new(
            "The editor is taking too long to respond.",
            "Check your connection. We'll try again in a moment.",
            class,
        ),

        InkbridgeError::Superseded(_) => HumanError::new(
            "A newer request replaced this one.",
            "Nothing to do, the latest request is still running.",
            class,
        ),

        InkbridgeError::Cancelled(_) => HumanError::new(
            "The request was cancelled.",
            "Reopen the document if you want to continue editing.",
            class,
        ),

        InkbridgeError::Collaboration(detail) => HumanError::new(
            "Live collaboration had a problem.",
            format!("Your edits are kept locally and will sync when the connection recovers. ({detail})"),
            class,
        ),

        InkbridgeError::AssetMissing(path) => HumanError::new(
            "Part of the editor is missing from this app build.",
            format!("Reinstall or update the app. (Missing: {path})"),
            class,
        ),

        InkbridgeError::IntegrityMismatch { asset, .. } => HumanError::new(
            "The editor files failed a safety check.",
            format!("Reinstall the app from the official store. (Asset: {asset})"),
            class,
        ),

        InkbridgeError::Config(detail) => HumanError::new(
            "The editor is not configured correctly.",
            format!("Contact the app's support team. ({detail})"),
            class,
        ),

        other => HumanError::new(
            "The editor ran into a problem.",
            format!("Close and reopen the document. If this keeps happening, restart the app. (Detail: {other})"),
            class,
        ),
    }
}

/// Humanize an error event raised by the collaboration client.
///
/// The payload is opaque; a `message` string is used when present, and
/// `reconnect`/`network` wording marks the error as transient.
pub fn humanize_collab_event(payload: &Value) -> HumanError {
    let detail = payload
        .get("message")
        .and_then(Value::as_str)
        .map(str::to_owned)
        .unwrap_or_else(|| payload.to_string());
    let lower = detail.to_ascii_lowercase();

    if lower.contains("network") || lower.contains("reconnect") || lower.contains("offline") {
        HumanError::new(
            "You're offline.",
            "Keep typing, changes will sync when you're back online.",
            ErrorClass::Transient,
        )
    } else if lower.contains("apikey") || lower.contains("api key") || lower.contains("domain") {
        HumanError::new(
            "Live collaboration isn't enabled for this app.",
            format!("The app's collaboration subscription needs attention. ({detail})"),
            ErrorClass::UserAction,
        )
    } else {
        humanize_error(&InkbridgeError::Collaboration(detail))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn timeout_is_transient() {
        let human = humanize_error(&InkbridgeError::Timeout {
            channel: "fetchDocOnNetworkReconnect".into(),
            after_ms: 500,
        });
        assert_eq!(human.severity, Severity::Transient);
        assert!(human.retriable);
    }

    #[test]
    fn bad_seed_is_permanent() {
        let human = humanize_error(&InkbridgeError::InvalidSeed("lexical: missing `root`".into()));
        assert_eq!(human.severity, Severity::Permanent);
        assert!(!human.retriable);
        assert!(human.suggestion.contains("missing `root`"));
    }

    #[test]
    fn missing_asset_needs_action() {
        let human = humanize_error(&InkbridgeError::AssetMissing("codox.js".into()));
        assert_eq!(human.severity, Severity::ActionRequired);
    }

    #[test]
    fn collab_network_event_is_transient() {
        let human = humanize_collab_event(&json!({"message": "Network disconnected, reconnecting"}));
        assert_eq!(human.severity, Severity::Transient);
    }

    #[test]
    fn collab_domain_event_needs_action() {
        let human = humanize_collab_event(&json!({"message": "domain not allowed"}));
        assert_eq!(human.severity, Severity::ActionRequired);
    }
}
