// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Registered-handler tables with an explicit lifecycle.
//
// Both sides of the bridge resolve incoming names through a registry instead
// of looking up globals: handlers are registered at startup, deregistered at
// teardown, and a closed registry refuses every lookup.

use std::collections::HashMap;
use std::future::Future;
use std::pin::Pin;
use std::sync::{Mutex, MutexGuard, PoisonError};

use serde_json::Value;
use tracing::debug;

use inkbridge_core::error::{InkbridgeError, Result};

/// Future returned by a host channel handler.
pub type HandlerFuture = Pin<Box<dyn Future<Output = Result<Option<Value>>> + Send>>;

/// Host-side handler for one content → host channel.
///
/// Returns the value to send back when the message was a request, or `None`
/// for notifications.
pub trait ChannelHandler: Send + Sync {
    fn call(&self, payload: Option<String>) -> HandlerFuture;
}

impl<F, Fut> ChannelHandler for F
where
    F: Fn(Option<String>) -> Fut + Send + Sync,
    Fut: Future<Output = Result<Option<Value>>> + Send + 'static,
{
    fn call(&self, payload: Option<String>) -> HandlerFuture {
        Box::pin(self(payload))
    }
}

struct Table<H> {
    handlers: HashMap<String, H>,
    closed: bool,
}

/// Name → handler table.
pub struct HandlerRegistry<H> {
    table: Mutex<Table<H>>,
}

impl<H> Default for HandlerRegistry<H> {
    fn default() -> Self {
        Self::new()
    }
}

impl<H> HandlerRegistry<H> {
    pub fn new() -> Self {
        Self {
            table: Mutex::new(Table {
                handlers: HashMap::new(),
                closed: false,
            }),
        }
    }

    fn lock(&self) -> MutexGuard<'_, Table<H>> {
        self.table.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Register `handler` under `name`. Names are unique.
    pub fn register(&self, name: impl Into<String>, handler: H) -> Result<()> {
        let name = name.into();
        let mut table = self.lock();
        if table.closed {
            return Err(InkbridgeError::BridgeClosed);
        }
        if table.handlers.contains_key(&name) {
            return Err(InkbridgeError::DuplicateHandler(name));
        }
        debug!(name = %name, "handler registered");
        table.handlers.insert(name, handler);
        Ok(())
    }

    pub fn deregister(&self, name: &str) -> Option<H> {
        let removed = self.lock().handlers.remove(name);
        if removed.is_some() {
            debug!(name, "handler deregistered");
        }
        removed
    }

    /// Deregister everything and refuse further registrations and lookups.
    pub fn close(&self) {
        let mut table = self.lock();
        table.closed = true;
        table.handlers.clear();
    }

    pub fn is_closed(&self) -> bool {
        self.lock().closed
    }

    pub fn contains(&self, name: &str) -> bool {
        self.lock().handlers.contains_key(name)
    }

    /// Registered names, sorted.
    pub fn names(&self) -> Vec<String> {
        let mut names: Vec<String> = self.lock().handlers.keys().cloned().collect();
        names.sort();
        names
    }
}

impl<H: Clone> HandlerRegistry<H> {
    /// Look up the handler for `name`.
    pub fn get(&self, name: &str) -> Result<H> {
        let table = self.lock();
        if table.closed {
            return Err(InkbridgeError::BridgeClosed);
        }
        table
            .handlers
            .get(name)
            .cloned()
            .ok_or_else(|| InkbridgeError::NoHandler(name.to_owned()))
    }
}
