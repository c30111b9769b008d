// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Platform-agnostic traits for the two one-way primitives a content view
// offers, plus the adapter that turns script evaluation into typed calls.
//
// A platform binding (WKWebView, android.webkit.WebView, an in-app browser
// plugin) implements `ScriptEvaluator` and `DocumentLoader`; everything above
// this module is written against these traits only.

use std::future::Future;

use inkbridge_core::error::Result;
use inkbridge_core::types::ScriptStyle;

use crate::envelope::{ContentCall, Envelope};
use crate::script;

/// Host's handle on an embedded content view.
pub trait HostView: ScriptEvaluator + DocumentLoader + ContentRuntime {
    /// Human-readable platform name (e.g. "WKWebView", "loopback").
    fn platform_name(&self) -> &str;
}

/// Evaluate script in the content runtime.
pub trait ScriptEvaluator: Send + Sync {
    /// Resolves once the platform reports the evaluation finished.
    fn evaluate(&self, script: &str) -> impl Future<Output = Result<()>> + Send;
}

/// Load markup into the view under a fixed origin.
pub trait DocumentLoader: Send + Sync {
    /// Start loading `html` as if served from `base_origin`.
    ///
    /// Completion is signalled separately by the content (`pageLoaded`),
    /// not by this future.
    fn load_html(&self, html: &str, base_origin: &str) -> impl Future<Output = Result<()>> + Send;
}

/// Deliver a typed call to the content.
pub trait ContentRuntime: Send + Sync {
    fn deliver(&self, call: ContentCall) -> impl Future<Output = Result<()>> + Send;
}

/// Content side's one-way channel to the host. Never waits for the host.
pub trait MessageSink: Send + Sync {
    fn post(&self, envelope: Envelope) -> Result<()>;
}

/// Full `HostView` over a view that only understands script evaluation:
/// every `ContentCall` is rendered in the configured `ScriptStyle` and
/// evaluated. Loading and plain evaluation pass straight through.
pub struct ScriptRuntime<E> {
    evaluator: E,
    style: ScriptStyle,
}

impl<E: ScriptEvaluator> ScriptRuntime<E> {
    pub fn new(evaluator: E, style: ScriptStyle) -> Self {
        Self { evaluator, style }
    }

    pub fn evaluator(&self) -> &E {
        &self.evaluator
    }

    pub fn style(&self) -> ScriptStyle {
        self.style
    }
}

impl<E: HostView> HostView for ScriptRuntime<E> {
    fn platform_name(&self) -> &str {
        self.evaluator.platform_name()
    }
}

impl<E: ScriptEvaluator> ScriptEvaluator for ScriptRuntime<E> {
    async fn evaluate(&self, script: &str) -> Result<()> {
        self.evaluator.evaluate(script).await
    }
}

impl<E: DocumentLoader> DocumentLoader for ScriptRuntime<E> {
    async fn load_html(&self, html: &str, base_origin: &str) -> Result<()> {
        self.evaluator.load_html(html, base_origin).await
    }
}

impl<E: ScriptEvaluator> ContentRuntime for ScriptRuntime<E> {
    async fn deliver(&self, call: ContentCall) -> Result<()> {
        let source = script::render(&call, self.style)?;
        self.evaluator.evaluate(&source).await
    }
}
