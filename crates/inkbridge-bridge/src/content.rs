// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Content end of the bridge.
//
// Posts one-way messages, emulates request/response calls on top of them
// via the correlation router, and resolves incoming host calls through a
// route table the content registers at startup.

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use serde::Serialize;
use tokio_util::sync::CancellationToken;
use tracing::{debug, trace};

use inkbridge_core::error::{InkbridgeError, Result};

use crate::envelope::{ContentCall, Envelope};
use crate::handlers::HandlerRegistry;
use crate::router::RequestRouter;
use crate::traits::MessageSink;

/// A host call matched against the route table.
#[derive(Debug, Clone, PartialEq)]
pub struct Routed<R> {
    pub route: R,
    pub payload: Option<String>,
}

/// Content side of one bridge. `R` is the typed route a call name maps to.
pub struct ContentBridge<R> {
    sink: Arc<dyn MessageSink>,
    router: Arc<RequestRouter>,
    routes: HandlerRegistry<R>,
}

impl<R: Clone + Send + 'static> ContentBridge<R> {
    pub fn new(sink: Arc<dyn MessageSink>, router: Arc<RequestRouter>) -> Self {
        Self {
            sink,
            router,
            routes: HandlerRegistry::new(),
        }
    }

    pub fn router(&self) -> &Arc<RequestRouter> {
        &self.router
    }

    /// Accept host calls named `name`, mapping them to `route`.
    pub fn register_route(&self, name: &str, route: R) -> Result<()> {
        self.routes.register(name, route)
    }

    pub fn deregister_route(&self, name: &str) -> Option<R> {
        self.routes.deregister(name)
    }

    pub fn routes(&self) -> Vec<String> {
        self.routes.names()
    }

    /// Tear down: drop routes and fail every outstanding call.
    pub fn close(&self) {
        self.routes.close();
        self.router.close();
    }

    pub fn is_closed(&self) -> bool {
        self.routes.is_closed()
    }

    /// Fire-and-forget message to the host.
    pub fn post(&self, channel: &str, payload: Option<String>) -> Result<()> {
        trace!(channel, "posting");
        self.sink.post(Envelope::notify(channel, payload))
    }

    /// Serialise `value` to JSON and post it.
    pub fn post_json<T: Serialize + ?Sized>(&self, channel: &str, value: &T) -> Result<()> {
        self.post(channel, Some(serde_json::to_string(value)?))
    }

    /// Request/response call with the router's default deadline.
    ///
    /// The request is registered and posted before this returns; the
    /// returned future only waits for the reply and owns everything it needs,
    /// so it can be spawned.
    pub fn invoke(
        &self,
        channel: &str,
        payload: Option<String>,
    ) -> impl Future<Output = Result<String>> + Send + 'static + use<R> {
        self.invoke_with(channel, payload, None, None)
    }

    /// Request/response call with an explicit deadline and cancellation.
    pub fn invoke_with(
        &self,
        channel: &str,
        payload: Option<String>,
        timeout: Option<Duration>,
        cancel: Option<CancellationToken>,
    ) -> impl Future<Output = Result<String>> + Send + 'static + use<R> {
        let started = self.router.begin(channel).and_then(|call| {
            self.sink
                .post(Envelope::request(channel, call.id(), payload))
                .map(|()| call)
        });
        async move {
            let call = started?;
            debug!(channel = call.channel(), request_id = %call.id(), "awaiting reply");
            call.wait(timeout, cancel).await
        }
    }

    /// Handle a call from the host.
    ///
    /// Replies are resolved internally and yield `Ok(None)`; named calls are
    /// matched against the route table.
    pub fn receive(&self, call: ContentCall) -> Result<Option<Routed<R>>> {
        match call {
            ContentCall::HookResponse {
                channel,
                request_id,
                payload,
            } => {
                if self.is_closed() {
                    return Err(InkbridgeError::BridgeClosed);
                }
                self.router.resolve(&channel, request_id, payload);
                Ok(None)
            }
            ContentCall::Invoke { name, payload } => {
                let route = self.routes.get(&name)?;
                Ok(Some(Routed { route, payload }))
            }
        }
    }
}
