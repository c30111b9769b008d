// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// In-memory view for desktop/CI builds and tests.
//
// Stands in for a platform WebView: host → content calls travel over one
// unbounded channel, content → host envelopes over another. Loaded documents
// and evaluated scripts are recorded so tests can assert on what the host
// did, and `load_html` raises `pageLoaded` the way a WebView's
// page-finished callback would. Scripts that decode as rendered calls are
// handed to the content the way the bundle's dispatcher would, so the view
// also works behind a `ScriptRuntime`.

use std::sync::{Mutex, MutexGuard, PoisonError};

use tokio::sync::mpsc;
use tracing::{debug, warn};

use inkbridge_core::error::{InkbridgeError, Result};
use inkbridge_core::types::channels;

use crate::envelope::{ContentCall, Envelope};
use crate::script;
use crate::traits::{ContentRuntime, DocumentLoader, HostView, MessageSink, ScriptEvaluator};

/// A document handed to `load_html`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LoadedDocument {
    pub html: String,
    pub base_origin: String,
}

#[derive(Default)]
struct Recorded {
    documents: Vec<LoadedDocument>,
    scripts: Vec<String>,
    fail_markers: Vec<String>,
}

/// Host-side half of the loopback.
pub struct LoopbackView {
    calls: mpsc::UnboundedSender<ContentCall>,
    host_inbox: mpsc::UnboundedSender<Envelope>,
    recorded: Mutex<Recorded>,
}

/// Content-side half of the loopback.
pub struct ContentEndpoint {
    pub calls: mpsc::UnboundedReceiver<ContentCall>,
    pub sink: LoopbackSink,
}

/// Content → host message channel of the loopback.
#[derive(Clone)]
pub struct LoopbackSink {
    tx: mpsc::UnboundedSender<Envelope>,
}

/// Create a connected view / content pair plus the host's inbox.
pub fn pair() -> (LoopbackView, ContentEndpoint, mpsc::UnboundedReceiver<Envelope>) {
    let (calls_tx, calls_rx) = mpsc::unbounded_channel();
    let (inbox_tx, inbox_rx) = mpsc::unbounded_channel();
    let view = LoopbackView {
        calls: calls_tx,
        host_inbox: inbox_tx.clone(),
        recorded: Mutex::new(Recorded::default()),
    };
    let content = ContentEndpoint {
        calls: calls_rx,
        sink: LoopbackSink { tx: inbox_tx },
    };
    (view, content, inbox_rx)
}

impl LoopbackView {
    fn lock(&self) -> MutexGuard<'_, Recorded> {
        self.recorded.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Make every later evaluation of a script containing `marker` fail.
    pub fn fail_scripts_containing(&self, marker: impl Into<String>) {
        self.lock().fail_markers.push(marker.into());
    }

    pub fn documents(&self) -> Vec<LoadedDocument> {
        self.lock().documents.clone()
    }

    pub fn scripts(&self) -> Vec<String> {
        self.lock().scripts.clone()
    }
}

impl HostView for LoopbackView {
    fn platform_name(&self) -> &str {
        "loopback"
    }
}

impl ScriptEvaluator for LoopbackView {
    async fn evaluate(&self, script: &str) -> Result<()> {
        {
            let mut recorded = self.lock();
            if let Some(marker) = recorded.fail_markers.iter().find(|m| script.contains(m.as_str())) {
                warn!(marker = %marker, "loopback evaluation failure injected");
                return Err(InkbridgeError::ContentLoad(format!("script evaluation failed ({marker})")));
            }
            debug!(bytes = script.len(), "script evaluated");
            recorded.scripts.push(script.to_owned());
        }
        match script::parse(script) {
            Some(call) => self.deliver(call).await,
            None => Ok(()),
        }
    }
}

impl DocumentLoader for LoopbackView {
    async fn load_html(&self, html: &str, base_origin: &str) -> Result<()> {
        self.lock().documents.push(LoadedDocument {
            html: html.to_owned(),
            base_origin: base_origin.to_owned(),
        });
        self.host_inbox
            .send(Envelope::notify(channels::PAGE_LOADED, None))
            .map_err(|_| InkbridgeError::Transport("host inbox closed".into()))
    }
}

impl ContentRuntime for LoopbackView {
    async fn deliver(&self, call: ContentCall) -> Result<()> {
        self.calls
            .send(call)
            .map_err(|_| InkbridgeError::Transport("content endpoint closed".into()))
    }
}

impl MessageSink for LoopbackSink {
    fn post(&self, envelope: Envelope) -> Result<()> {
        self.tx
            .send(envelope)
            .map_err(|_| InkbridgeError::Transport("host inbox closed".into()))
    }
}
