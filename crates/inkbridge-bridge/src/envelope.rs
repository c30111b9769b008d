// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Messages that cross the bridge in each direction.
//
// Content → host traffic is an `Envelope`: a channel name, an optional JSON
// text payload, and an optional request id when the content expects a reply.
// Host → content traffic is a `ContentCall`: either a named call into the
// content's handler table or the reply to an earlier request.

use serde::{Deserialize, Serialize};

use inkbridge_core::error::{InkbridgeError, Result};
use inkbridge_core::types::{RequestId, channels};
use inkbridge_core::SeedDocument;

/// One-way message posted by the content to the host.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Envelope {
    pub channel: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub request_id: Option<RequestId>,
    /// JSON text, passed through without re-encoding.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub payload: Option<String>,
}

impl Envelope {
    /// Fire-and-forget notification.
    pub fn notify(channel: impl Into<String>, payload: Option<String>) -> Self {
        Self {
            channel: channel.into(),
            request_id: None,
            payload,
        }
    }

    /// Message that expects a `HookResponse` carrying `request_id`.
    pub fn request(channel: impl Into<String>, request_id: RequestId, payload: Option<String>) -> Self {
        Self {
            channel: channel.into(),
            request_id: Some(request_id),
            payload,
        }
    }

    /// Decode an envelope posted as JSON text by a WebView message handler.
    pub fn from_json(json: &str) -> Result<Self> {
        serde_json::from_str(json).map_err(|e| InkbridgeError::MalformedMessage(e.to_string()))
    }

    pub fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string(self)?)
    }
}

/// Call made by the host into the content runtime.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "camelCase")]
pub enum ContentCall {
    /// Invoke a handler the content registered under `name`.
    #[serde(rename_all = "camelCase")]
    Invoke {
        name: String,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        payload: Option<String>,
    },
    /// Reply to a request the content posted on `channel`.
    #[serde(rename_all = "camelCase")]
    HookResponse {
        channel: String,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        request_id: Option<RequestId>,
        payload: String,
    },
}

impl ContentCall {
    pub fn invoke(name: impl Into<String>, payload: Option<String>) -> Self {
        Self::Invoke {
            name: name.into(),
            payload,
        }
    }

    pub fn set_init_state(seed: &SeedDocument) -> Result<Self> {
        Ok(Self::invoke(channels::SET_INIT_STATE, Some(seed.to_wire_json()?)))
    }

    pub fn start_sync() -> Self {
        Self::invoke(channels::START_SYNC, None)
    }

    pub fn stop_sync() -> Self {
        Self::invoke(channels::STOP_SYNC, None)
    }

    pub fn show_remote_cursors() -> Self {
        Self::invoke(channels::SHOW_REMOTE_CURSORS, None)
    }

    pub fn hide_remote_cursors() -> Self {
        Self::invoke(channels::HIDE_REMOTE_CURSORS, None)
    }

    pub fn hook_response(channel: impl Into<String>, request_id: Option<RequestId>, payload: String) -> Self {
        Self::HookResponse {
            channel: channel.into(),
            request_id,
            payload,
        }
    }

    /// Short name for logging.
    pub fn name(&self) -> &str {
        match self {
            Self::Invoke { name, .. } => name,
            Self::HookResponse { channel, .. } => channel,
        }
    }
}
