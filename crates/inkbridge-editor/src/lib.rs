// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>

//! Content side of Inkbridge.
//!
//! [`EditorAdapter`] runs inside the content runtime. It owns the editor
//! document, answers the host's calls (`setInitState`, `startSync`, ...),
//! drives a [`CollaborationClient`] and forwards the client's events to the
//! host over the bridge.

pub mod adapter;
pub mod collab;
pub mod document;
pub mod state;

pub use adapter::{EditorAdapter, HostRoute};
pub use collab::{CollabEvent, CollaborationClient, LocalCollabClient, LocalCollabHandle, SessionEvent, SessionEvents};
pub use document::EditorDocument;
pub use state::{AdapterEvent, AdapterState};
