// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Host end of the bridge.
//
// Dispatches content messages to registered channel handlers and, for
// requests, serialises the handler's result and calls back into the content
// with a `HookResponse` naming the same request id.

use std::sync::Arc;

use serde_json::Value;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, instrument, warn};

use inkbridge_core::error::{InkbridgeError, Result};
use inkbridge_core::SeedDocument;

use crate::envelope::{ContentCall, Envelope};
use crate::handlers::{ChannelHandler, HandlerRegistry};
use crate::traits::HostView;

#[derive(Clone)]
struct Registered {
    handler: Arc<dyn ChannelHandler>,
    /// Always reply, even when the envelope carries no request id. Needed
    /// for content bundles that predate request ids.
    replies: bool,
}

/// Host side of one content view.
pub struct HostBridge<V> {
    view: Arc<V>,
    handlers: HandlerRegistry<Registered>,
    shutdown: CancellationToken,
}

impl<V: HostView + 'static> HostBridge<V> {
    pub fn new(view: Arc<V>) -> Arc<Self> {
        Arc::new(Self {
            view,
            handlers: HandlerRegistry::new(),
            shutdown: CancellationToken::new(),
        })
    }

    pub fn view(&self) -> &Arc<V> {
        &self.view
    }

    /// Handle notifications on `channel`. A reply is still sent when the
    /// content attaches a request id.
    pub fn register(&self, channel: &str, handler: impl ChannelHandler + 'static) -> Result<()> {
        self.handlers.register(
            channel,
            Registered {
                handler: Arc::new(handler),
                replies: false,
            },
        )
    }

    /// Handle requests on `channel`: the result is always sent back.
    pub fn register_request(&self, channel: &str, handler: impl ChannelHandler + 'static) -> Result<()> {
        self.handlers.register(
            channel,
            Registered {
                handler: Arc::new(handler),
                replies: true,
            },
        )
    }

    pub fn deregister(&self, channel: &str) -> bool {
        self.handlers.deregister(channel).is_some()
    }

    pub fn channels(&self) -> Vec<String> {
        self.handlers.names()
    }

    /// Tear down: drop all handlers and refuse further messages.
    pub fn close(&self) {
        info!(platform = self.view.platform_name(), "host bridge closed");
        self.handlers.close();
        self.shutdown.cancel();
    }

    /// Dispatch one content message.
    #[instrument(skip_all, fields(channel = %envelope.channel))]
    pub async fn dispatch(&self, envelope: Envelope) -> Result<()> {
        let Envelope {
            channel,
            request_id,
            payload,
        } = envelope;
        let entry = self.handlers.get(&channel)?;

        let result = entry.handler.call(payload).await;
        if request_id.is_none() && !entry.replies {
            if let Err(e) = &result {
                warn!(error = %e, "notification handler failed");
            }
            return result.map(|_| ());
        }

        // A failed request still gets an answer so the content is not left
        // waiting for its deadline.
        let reply = match &result {
            Ok(value) => value.clone().unwrap_or(Value::Null),
            Err(e) => {
                warn!(error = %e, "request handler failed, replying with error");
                serde_json::json!({ "error": e.to_string() })
            }
        };
        let payload = serde_json::to_string(&reply)?;
        debug!(request_id = ?request_id, bytes = payload.len(), "replying");
        self.view
            .deliver(ContentCall::hook_response(channel, request_id, payload))
            .await?;
        result.map(|_| ())
    }

    /// Drain `inbox` until it closes or the bridge is closed.
    ///
    /// Notifications are dispatched inline, one at a time in arrival order,
    /// so a later `contentChanged` is never persisted before an earlier one.
    /// Requests carrying an id run on their own task; their replies are
    /// matched by id and order does not matter.
    pub async fn serve(self: Arc<Self>, mut inbox: mpsc::UnboundedReceiver<Envelope>) {
        loop {
            let envelope = tokio::select! {
                _ = self.shutdown.cancelled() => break,
                envelope = inbox.recv() => match envelope {
                    Some(envelope) => envelope,
                    None => break,
                },
            };
            if envelope.request_id.is_some() {
                let bridge = Arc::clone(&self);
                tokio::spawn(async move { bridge.dispatch_logged(envelope).await });
            } else {
                self.dispatch_logged(envelope).await;
            }
        }
        debug!("host inbox closed");
    }

    async fn dispatch_logged(&self, envelope: Envelope) {
        let channel = envelope.channel.clone();
        match self.dispatch(envelope).await {
            Ok(()) => {}
            Err(InkbridgeError::NoHandler(_)) => {
                warn!(channel = %channel, "message on unhandled channel ignored");
            }
            Err(e) => error!(channel = %channel, error = %e, "dispatch failed"),
        }
    }

    // -- Host → content calls ------------------------------------------------

    pub async fn call(&self, call: ContentCall) -> Result<()> {
        debug!(call = call.name(), "calling content");
        self.view.deliver(call).await
    }

    pub async fn set_init_state(&self, seed: &SeedDocument) -> Result<()> {
        self.call(ContentCall::set_init_state(seed)?).await
    }

    pub async fn start_sync(&self) -> Result<()> {
        self.call(ContentCall::start_sync()).await
    }

    pub async fn stop_sync(&self) -> Result<()> {
        self.call(ContentCall::stop_sync()).await
    }

    pub async fn show_remote_cursors(&self) -> Result<()> {
        self.call(ContentCall::show_remote_cursors()).await
    }

    pub async fn hide_remote_cursors(&self) -> Result<()> {
        self.call(ContentCall::hide_remote_cursors()).await
    }
}
