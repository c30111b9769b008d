// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>

//! Inkbridge host ↔ content message bridge.
//!
//! An embedded content view offers exactly two one-way primitives: the host
//! can evaluate script in the content, and the content can post a message to
//! the host. This crate layers request/response calls, handler tables with a
//! defined lifecycle, and typed host → content calls on top of them.
//!
//! Platform bindings implement the traits in [`traits`]; the [`loopback`]
//! view connects both ends in-process for desktop builds and tests.

pub mod content;
pub mod envelope;
pub mod handlers;
pub mod host;
pub mod loopback;
pub mod router;
pub mod script;
pub mod traits;

pub use content::{ContentBridge, Routed};
pub use envelope::{ContentCall, Envelope};
pub use handlers::{ChannelHandler, HandlerRegistry};
pub use host::HostBridge;
pub use router::{PendingCall, RequestRouter};
pub use traits::{ContentRuntime, DocumentLoader, HostView, MessageSink, ScriptEvaluator, ScriptRuntime};
