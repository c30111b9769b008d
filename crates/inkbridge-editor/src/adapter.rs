// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Editor adapter: the content-side event loop.
//
// Host calls and collaboration events arrive on two queues and are handled
// one at a time on a single task. Request/response calls to the host are
// spawned so the loop never waits on the host.

use std::sync::Arc;

use serde_json::{Value, json};
use tokio::sync::{mpsc, oneshot};
use tracing::{debug, info, instrument, warn};

use inkbridge_bridge::content::{ContentBridge, Routed};
use inkbridge_bridge::envelope::ContentCall;
use inkbridge_bridge::router::RequestRouter;
use inkbridge_bridge::traits::MessageSink;
use inkbridge_core::config::CollabConfig;
use inkbridge_core::error::{InkbridgeError, Result};
use inkbridge_core::human_errors::humanize_error;
use inkbridge_core::seed::SeedDocument;
use inkbridge_core::types::{ConsoleLevel, ConsoleMessage, EditorFormat, SessionGeneration, UNKNOWN_TIMESTAMP, channels};

use crate::collab::{CollabEvent, CollaborationClient, SessionEvent, SessionEvents};
use crate::document::EditorDocument;
use crate::state::{AdapterEvent, AdapterState};

/// Host calls the adapter accepts.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HostRoute {
    SetInitState,
    StartSync,
    StopSync,
    ShowRemoteCursors,
    HideRemoteCursors,
}

const ROUTES: [(&str, HostRoute); 5] = [
    (channels::SET_INIT_STATE, HostRoute::SetInitState),
    (channels::START_SYNC, HostRoute::StartSync),
    (channels::STOP_SYNC, HostRoute::StopSync),
    (channels::SHOW_REMOTE_CURSORS, HostRoute::ShowRemoteCursors),
    (channels::HIDE_REMOTE_CURSORS, HostRoute::HideRemoteCursors),
];

pub struct EditorAdapter<C> {
    format: EditorFormat,
    collab: CollabConfig,
    bridge: ContentBridge<HostRoute>,
    client: C,
    state: AdapterState,
    document: Option<EditorDocument>,
    timestamp: i64,
    generation: SessionGeneration,
    /// Generation of the running session; `None` when stopped.
    active: Option<SessionGeneration>,
    events_tx: mpsc::UnboundedSender<SessionEvent>,
    events_rx: Option<mpsc::UnboundedReceiver<SessionEvent>>,
}

impl<C: CollaborationClient> EditorAdapter<C> {
    pub fn new(
        format: EditorFormat,
        collab: CollabConfig,
        sink: Arc<dyn MessageSink>,
        router: Arc<RequestRouter>,
        client: C,
    ) -> Self {
        let (events_tx, events_rx) = mpsc::unbounded_channel();
        Self {
            format,
            collab,
            bridge: ContentBridge::new(sink, router),
            client,
            state: AdapterState::Unloaded,
            document: None,
            timestamp: UNKNOWN_TIMESTAMP,
            generation: SessionGeneration::default(),
            active: None,
            events_tx,
            events_rx: Some(events_rx),
        }
    }

    pub fn state(&self) -> AdapterState {
        self.state
    }

    pub fn document(&self) -> Option<&EditorDocument> {
        self.document.as_ref()
    }

    /// Timestamp of the last applied seed (`-1` if not authoritative).
    pub fn timestamp(&self) -> i64 {
        self.timestamp
    }

    pub fn generation(&self) -> SessionGeneration {
        self.generation
    }

    pub fn bridge(&self) -> &ContentBridge<HostRoute> {
        &self.bridge
    }

    pub fn client(&self) -> &C {
        &self.client
    }

    /// Register the host call routes. Called once the content is running.
    pub fn attach(&mut self) -> Result<()> {
        let next = self.state.on(AdapterEvent::PageLoaded)?;
        for (name, route) in ROUTES {
            self.bridge.register_route(name, route)?;
        }
        self.state = next;
        info!(format = %self.format, routes = ROUTES.len(), "editor adapter attached");
        Ok(())
    }

    /// Stop syncing and tear the bridge down. Outstanding calls fail with
    /// `BridgeClosed`.
    pub fn detach(&mut self) {
        self.stop_sync();
        for (name, _) in ROUTES {
            self.bridge.deregister_route(name);
        }
        self.bridge.close();
        info!("editor adapter detached");
    }

    /// Handle one call from the host.
    pub fn handle_call(&mut self, call: ContentCall) -> Result<()> {
        let Some(Routed { route, payload }) = self.bridge.receive(call)? else {
            return Ok(());
        };
        debug!(?route, "host call");
        match route {
            HostRoute::SetInitState => self.init_editor(payload.as_deref()),
            HostRoute::StartSync => self.start_sync(),
            HostRoute::StopSync => {
                self.stop_sync();
                Ok(())
            }
            HostRoute::ShowRemoteCursors => {
                self.client.set_cursors_visible(true);
                Ok(())
            }
            HostRoute::HideRemoteCursors => {
                self.client.set_cursors_visible(false);
                Ok(())
            }
        }
    }

    /// Apply a seed from the host and acknowledge with `editorInitialized`,
    /// or report `onInitError` and keep the current document.
    #[instrument(skip_all, fields(state = %self.state))]
    pub fn init_editor(&mut self, payload: Option<&str>) -> Result<()> {
        match self.apply_seed(payload) {
            Ok(()) => {
                self.bridge.post(channels::EDITOR_INITIALIZED, None)?;
                if self.collab.autostart {
                    self.start_sync()?;
                }
                Ok(())
            }
            Err(e) => {
                warn!(error = %e, "seed rejected, editor unchanged");
                self.report(channels::INIT_ERROR, &e);
                Err(e)
            }
        }
    }

    fn apply_seed(&mut self, payload: Option<&str>) -> Result<()> {
        let json = payload.ok_or_else(|| InkbridgeError::InvalidSeed("setInitState called without a document".into()))?;
        let seed = SeedDocument::parse(json, self.format)?;
        let document = EditorDocument::from_seed(self.format, &seed)?;
        let next = self.state.on(AdapterEvent::SeedApplied)?;

        self.document = Some(document);
        self.timestamp = seed.timestamp;
        self.state = next;
        info!(timestamp = seed.timestamp, "editor initialised from seed");
        Ok(())
    }

    /// Start a collaboration session, stopping the running one first.
    pub fn start_sync(&mut self) -> Result<()> {
        if self.state.is_syncing() {
            debug!("restarting running session");
            self.stop_sync();
        }
        let next = self.state.on(AdapterEvent::SyncStarted)?;
        let Some(document) = &self.document else {
            return Err(InkbridgeError::InvalidTransition {
                from: self.state.to_string(),
                event: "SyncStarted".into(),
            });
        };

        if let Some(threads) = document.comment_threads()
            && let Err(e) = self.client.init_comments(threads)
        {
            warn!(error = %e, "comment threads rejected");
            self.report(channels::COLLAB_ERROR, &e);
            return Err(e);
        }

        self.generation = self.generation.next();
        let events = SessionEvents::new(self.generation, self.events_tx.clone());
        if let Err(e) = self.client.start(&self.collab, document, events) {
            warn!(error = %e, generation = %self.generation, "collaboration client failed to start");
            self.report(channels::COLLAB_ERROR, &e);
            return Err(e);
        }
        self.active = Some(self.generation);
        self.state = next;
        info!(generation = %self.generation, doc_id = %self.collab.doc_id, "sync started");
        Ok(())
    }

    /// Stop the running session. Safe to call in any state.
    pub fn stop_sync(&mut self) {
        if self.state.is_syncing() {
            self.client.stop();
        }
        if let Some(generation) = self.active.take() {
            info!(%generation, "sync stopped");
        }
        if let Ok(next) = self.state.on(AdapterEvent::SyncStopped) {
            self.state = next;
        }
    }

    /// Edit made in the editor itself.
    pub fn local_edit(&mut self, content: Value) -> Result<()> {
        if !self.state.has_document() {
            return Err(InkbridgeError::InvalidTransition {
                from: self.state.to_string(),
                event: "LocalEdit".into(),
            });
        }
        let document = EditorDocument::from_value(self.format, content)?;
        if self.state.is_syncing() {
            self.client.on_editor_change(&document)?;
        }
        self.document = Some(document);
        Ok(())
    }

    /// Handle one collaboration event. Events from any session but the
    /// running one are dropped.
    pub fn handle_session_event(&mut self, event: SessionEvent) {
        if self.active != Some(event.generation) {
            debug!(generation = %event.generation, active = ?self.active, "event from stopped session dropped");
            return;
        }
        let forwarded = match event.event {
            CollabEvent::ContentChanged(doc) => self.bridge.post_json(channels::CONTENT_CHANGED, &doc),
            CollabEvent::UsersUpdate(users) => self.bridge.post_json(channels::USERS_UPDATE, &users),
            CollabEvent::Error(err) => {
                warn!(error = %err, "collaboration client error");
                match self.state.on(AdapterEvent::CollabError) {
                    Ok(next) => self.state = next,
                    Err(e) => debug!(error = %e, "collaboration error outside a session"),
                }
                self.bridge.post_json(channels::COLLAB_ERROR, &err)
            }
            CollabEvent::BlacklistedInsert => self.bridge.post(channels::BLACKLISTED_INSERT, None),
            CollabEvent::RemoteState(content) => {
                match EditorDocument::from_value(self.format, content) {
                    Ok(document) => self.document = Some(document),
                    Err(e) => warn!(error = %e, "remote state rejected"),
                }
                Ok(())
            }
            CollabEvent::FetchOnReconnect(reply) => {
                self.fetch_on_reconnect(reply);
                Ok(())
            }
        };
        if let Err(e) = forwarded {
            warn!(error = %e, "forwarding to host failed");
        }
    }

    /// Ask the host for the latest stored document and hand it to the client.
    fn fetch_on_reconnect(&self, reply: oneshot::Sender<Result<SeedDocument>>) {
        let call = self.bridge.invoke(channels::FETCH_DOC_ON_NETWORK_RECONNECT, None);
        let format = self.format;
        tokio::spawn(async move {
            let result = match call.await {
                Ok(json) => parse_fetch_reply(&json, format),
                Err(e) => Err(e),
            };
            match &result {
                Ok(seed) => debug!(timestamp = seed.timestamp, "reconnect fetch resolved"),
                Err(e) => warn!(error = %e, "reconnect fetch failed"),
            }
            if reply.send(result).is_err() {
                debug!("client stopped waiting for reconnect fetch");
            }
        });
    }

    /// Pipe a console line to the host log.
    pub fn console(&self, level: ConsoleLevel, args: Vec<Value>) -> Result<()> {
        self.bridge.post_json(channels::CONTENT_LOGS, &ConsoleMessage::new(level, args))
    }

    fn report(&self, channel: &str, err: &InkbridgeError) {
        let human = humanize_error(err);
        let payload = json!({
            "message": err.to_string(),
            "class": err.class(),
            "suggestion": human.suggestion,
        });
        if let Err(post_err) = self.bridge.post_json(channel, &payload) {
            warn!(channel, error = %post_err, "could not report error to host");
        }
    }

    /// Run until the host side goes away, then detach.
    pub async fn run(mut self, mut calls: mpsc::UnboundedReceiver<ContentCall>) -> Self {
        let Some(mut events) = self.events_rx.take() else {
            warn!("adapter event loop already ran");
            return self;
        };
        loop {
            tokio::select! {
                call = calls.recv() => match call {
                    Some(call) => {
                        let name = call.name().to_owned();
                        match self.handle_call(call) {
                            Ok(()) => {}
                            Err(InkbridgeError::NoHandler(_)) => warn!(call = %name, "unknown host call ignored"),
                            Err(e) => debug!(call = %name, error = %e, "host call failed"),
                        }
                    }
                    None => break,
                },
                Some(event) = events.recv() => self.handle_session_event(event),
            }
        }
        self.detach();
        self
    }
}

/// Decode the host's answer to `fetchDocOnNetworkReconnect`.
pub fn parse_fetch_reply(json: &str, format: EditorFormat) -> Result<SeedDocument> {
    let value: Value = serde_json::from_str(json)?;
    if let Some(err) = value.get("error").and_then(Value::as_str)
        && value.get("content").is_none()
    {
        return Err(InkbridgeError::Collaboration(format!("host could not fetch document: {err}")));
    }
    SeedDocument::from_value(value, format)
}
