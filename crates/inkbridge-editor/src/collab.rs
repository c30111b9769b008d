// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Collaboration client seam.
//
// The real client (OT/CRDT engine, presence, transport) is an external
// library. The adapter only starts and stops it, feeds it local edits and
// listens to the events it raises. Every event is stamped with the
// generation of the session that produced it so the adapter can ignore a
// stopped session's stragglers.

use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use serde_json::Value;
use tokio::sync::{mpsc, oneshot};
use tracing::{debug, info};

use inkbridge_core::config::CollabConfig;
use inkbridge_core::error::{InkbridgeError, Result};
use inkbridge_core::seed::SeedDocument;
use inkbridge_core::types::SessionGeneration;

use crate::document::EditorDocument;

/// Event raised by a collaboration client.
#[derive(Debug)]
pub enum CollabEvent {
    /// The merged document changed (local or remote edit).
    ContentChanged(Value),
    /// Presence list changed.
    UsersUpdate(Value),
    /// Client-side error (network, auth, domain not allow-listed, ...).
    Error(Value),
    /// The client came back online and needs the latest stored document.
    /// The adapter answers through `reply`.
    FetchOnReconnect(oneshot::Sender<Result<SeedDocument>>),
    /// The user tried to insert blacklisted content.
    BlacklistedInsert,
    /// The client replaced the editor's document with merged remote state.
    RemoteState(Value),
}

/// A [`CollabEvent`] tagged with the session that raised it.
#[derive(Debug)]
pub struct SessionEvent {
    pub generation: SessionGeneration,
    pub event: CollabEvent,
}

/// Event sink handed to a client when a session starts.
#[derive(Debug, Clone)]
pub struct SessionEvents {
    generation: SessionGeneration,
    tx: mpsc::UnboundedSender<SessionEvent>,
}

impl SessionEvents {
    pub fn new(generation: SessionGeneration, tx: mpsc::UnboundedSender<SessionEvent>) -> Self {
        Self { generation, tx }
    }

    pub fn generation(&self) -> SessionGeneration {
        self.generation
    }

    /// Raise `event`. Returns false once the adapter has gone away.
    pub fn emit(&self, event: CollabEvent) -> bool {
        self.tx
            .send(SessionEvent {
                generation: self.generation,
                event,
            })
            .is_ok()
    }
}

/// What the adapter needs from a collaboration client.
pub trait CollaborationClient: Send {
    /// Load the comment threads stored with a document. Called before
    /// `start`, and only when the document carries threads.
    fn init_comments(&mut self, threads: &[Value]) -> Result<()>;

    /// Attach to `document` and start synchronising.
    fn start(&mut self, config: &CollabConfig, document: &EditorDocument, events: SessionEvents) -> Result<()>;

    /// Detach. Must be safe to call when not started.
    fn stop(&mut self);

    /// Local edit made in the editor.
    fn on_editor_change(&mut self, document: &EditorDocument) -> Result<()>;

    fn set_cursors_visible(&mut self, visible: bool);
}

#[derive(Default)]
struct LocalState {
    session: Option<SessionEvents>,
    configs: Vec<CollabConfig>,
    stops: usize,
    cursors_visible: bool,
    comment_threads: Option<Vec<Value>>,
    fail_start: Option<String>,
}

/// In-process client used by the desktop demo and tests.
///
/// It has no peers: local edits are echoed as `ContentChanged`, and a
/// [`LocalCollabHandle`] lets callers raise the events a networked client
/// would (presence, errors, reconnects).
pub struct LocalCollabClient {
    state: Arc<Mutex<LocalState>>,
}

/// Remote control for a [`LocalCollabClient`].
#[derive(Clone)]
pub struct LocalCollabHandle {
    state: Arc<Mutex<LocalState>>,
}

fn lock(state: &Mutex<LocalState>) -> MutexGuard<'_, LocalState> {
    state.lock().unwrap_or_else(PoisonError::into_inner)
}

impl LocalCollabClient {
    pub fn new() -> (Self, LocalCollabHandle) {
        let state = Arc::new(Mutex::new(LocalState {
            cursors_visible: true,
            ..LocalState::default()
        }));
        (
            Self {
                state: Arc::clone(&state),
            },
            LocalCollabHandle { state },
        )
    }
}

impl CollaborationClient for LocalCollabClient {
    fn init_comments(&mut self, threads: &[Value]) -> Result<()> {
        debug!(threads = threads.len(), "comment threads loaded");
        lock(&self.state).comment_threads = Some(threads.to_vec());
        Ok(())
    }

    fn start(&mut self, config: &CollabConfig, _document: &EditorDocument, events: SessionEvents) -> Result<()> {
        let mut state = lock(&self.state);
        if let Some(reason) = &state.fail_start {
            return Err(InkbridgeError::Collaboration(reason.clone()));
        }
        info!(doc_id = %config.doc_id, user = %config.username, generation = %events.generation(), "local session started");
        state.configs.push(config.clone());
        state.session = Some(events);
        Ok(())
    }

    fn stop(&mut self) {
        let mut state = lock(&self.state);
        if let Some(session) = state.session.take() {
            debug!(generation = %session.generation(), "local session stopped");
            state.stops += 1;
        }
    }

    fn on_editor_change(&mut self, document: &EditorDocument) -> Result<()> {
        let state = lock(&self.state);
        if let Some(session) = &state.session {
            session.emit(CollabEvent::ContentChanged(document.snapshot()?));
        }
        Ok(())
    }

    fn set_cursors_visible(&mut self, visible: bool) {
        lock(&self.state).cursors_visible = visible;
    }
}

impl LocalCollabHandle {
    /// Raise `event` on the running session. Returns false if none is running.
    pub fn emit(&self, event: CollabEvent) -> bool {
        match &lock(&self.state).session {
            Some(session) => session.emit(event),
            None => false,
        }
    }

    /// Sink of the running session, kept alive past a stop to replay
    /// stragglers.
    pub fn session(&self) -> Option<SessionEvents> {
        lock(&self.state).session.clone()
    }

    /// Simulate an edit from a peer: the merged state replaces the editor's
    /// document, then the change is raised for persistence.
    pub fn remote_edit(&self, content: Value) -> bool {
        self.emit(CollabEvent::RemoteState(content.clone())) && self.emit(CollabEvent::ContentChanged(content))
    }

    /// Simulate coming back online: ask the adapter for the stored document.
    pub fn request_refetch(&self) -> Option<oneshot::Receiver<Result<SeedDocument>>> {
        let (tx, rx) = oneshot::channel();
        self.emit(CollabEvent::FetchOnReconnect(tx)).then_some(rx)
    }

    /// Make every later `start` fail with `reason`.
    pub fn fail_start(&self, reason: impl Into<String>) {
        lock(&self.state).fail_start = Some(reason.into());
    }

    pub fn is_running(&self) -> bool {
        lock(&self.state).session.is_some()
    }

    /// Configurations passed to each successful `start`.
    pub fn started_with(&self) -> Vec<CollabConfig> {
        lock(&self.state).configs.clone()
    }

    pub fn stops(&self) -> usize {
        lock(&self.state).stops
    }

    /// Threads handed to `init_comments`, if it was called.
    pub fn comment_threads(&self) -> Option<Vec<Value>> {
        lock(&self.state).comment_threads.clone()
    }

    pub fn cursors_visible(&self) -> bool {
        lock(&self.state).cursors_visible
    }
}
