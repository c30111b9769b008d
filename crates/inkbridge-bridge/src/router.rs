// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Request/response correlation over one-way messaging.
//
// The content posts a request envelope and parks a resolver in this map under
// a fresh request id. The host's `HookResponse` names the same id and the
// resolver fires exactly once. Entries leave the map on reply, deadline,
// cancellation, supersession, or teardown, whichever comes first.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use tokio::sync::oneshot;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

use inkbridge_core::error::{InkbridgeError, Result};
use inkbridge_core::types::{CorrelationMode, RequestId};

struct Pending {
    channel: String,
    tx: oneshot::Sender<Result<String>>,
}

/// Correlation map shared by every outstanding call of one bridge.
pub struct RequestRouter {
    mode: CorrelationMode,
    default_timeout: Duration,
    pending: Mutex<HashMap<RequestId, Pending>>,
    closed: AtomicBool,
}

impl RequestRouter {
    pub fn new(mode: CorrelationMode, default_timeout: Duration) -> Arc<Self> {
        Arc::new(Self {
            mode,
            default_timeout,
            pending: Mutex::new(HashMap::new()),
            closed: AtomicBool::new(false),
        })
    }

    pub fn mode(&self) -> CorrelationMode {
        self.mode
    }

    pub fn default_timeout(&self) -> Duration {
        self.default_timeout
    }

    fn lock(&self) -> MutexGuard<'_, HashMap<RequestId, Pending>> {
        self.pending.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Register a new outstanding call on `channel`.
    ///
    /// In `SingleSlot` mode any call already outstanding on the channel fails
    /// with `Superseded`.
    pub fn begin(self: &Arc<Self>, channel: &str) -> Result<PendingCall> {
        let id = RequestId::new();
        let (tx, rx) = oneshot::channel();

        // `closed` only flips under this lock, so nothing can be inserted
        // after `close` has drained the map.
        let mut pending = self.lock();
        if self.closed.load(Ordering::Acquire) {
            return Err(InkbridgeError::BridgeClosed);
        }
        if self.mode == CorrelationMode::SingleSlot {
            let stale: Vec<RequestId> = pending
                .iter()
                .filter(|(_, p)| p.channel == channel)
                .map(|(id, _)| *id)
                .collect();
            for old in stale {
                if let Some(p) = pending.remove(&old) {
                    warn!(channel, request_id = %old, "outstanding call superseded");
                    let _ = p.tx.send(Err(InkbridgeError::Superseded(channel.to_owned())));
                }
            }
        }
        pending.insert(
            id,
            Pending {
                channel: channel.to_owned(),
                tx,
            },
        );
        debug!(channel, request_id = %id, outstanding = pending.len(), "call registered");

        Ok(PendingCall {
            id,
            channel: channel.to_owned(),
            rx: Some(rx),
            router: Arc::clone(self),
        })
    }

    /// Deliver a reply. Returns `true` if it resolved an outstanding call.
    ///
    /// A reply without a request id resolves the single outstanding call on
    /// `channel`; when several are outstanding it is ambiguous and dropped.
    pub fn resolve(&self, channel: &str, request_id: Option<RequestId>, payload: String) -> bool {
        let mut pending = self.lock();

        let id = match request_id {
            Some(id) => id,
            None => {
                let mut on_channel = pending.iter().filter(|(_, p)| p.channel == channel);
                match (on_channel.next(), on_channel.next()) {
                    (Some((id, _)), None) => *id,
                    (None, _) => {
                        warn!(channel, "reply without request id and nothing outstanding, dropped");
                        return false;
                    }
                    (Some(_), Some(_)) => {
                        warn!(channel, "reply without request id is ambiguous, dropped");
                        return false;
                    }
                }
            }
        };

        match pending.remove(&id) {
            Some(p) if p.channel == channel => {
                debug!(channel, request_id = %id, "call resolved");
                // Receiver may have timed out between lookup and send.
                p.tx.send(Ok(payload)).is_ok()
            }
            Some(p) => {
                warn!(channel, expected = %p.channel, request_id = %id, "reply on wrong channel, dropped");
                pending.insert(id, p);
                false
            }
            None => {
                warn!(channel, request_id = %id, "late or unknown reply, dropped");
                false
            }
        }
    }

    /// Fail every outstanding call with `BridgeClosed` and refuse new ones.
    pub fn close(&self) {
        let drained: Vec<Pending> = {
            let mut pending = self.lock();
            self.closed.store(true, Ordering::Release);
            pending.drain().map(|(_, p)| p).collect()
        };
        for p in drained {
            let _ = p.tx.send(Err(InkbridgeError::BridgeClosed));
        }
    }

    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::Acquire)
    }

    /// Number of calls awaiting a reply.
    pub fn outstanding(&self) -> usize {
        self.lock().len()
    }

    pub fn outstanding_on(&self, channel: &str) -> usize {
        self.lock().values().filter(|p| p.channel == channel).count()
    }

    fn forget(&self, id: &RequestId) {
        self.lock().remove(id);
    }
}

/// Handle to one outstanding call. Dropping it abandons the call.
pub struct PendingCall {
    id: RequestId,
    channel: String,
    rx: Option<oneshot::Receiver<Result<String>>>,
    router: Arc<RequestRouter>,
}

impl PendingCall {
    pub fn id(&self) -> RequestId {
        self.id
    }

    pub fn channel(&self) -> &str {
        &self.channel
    }

    /// Wait for the reply, bounded by `timeout` (router default when `None`)
    /// and by `cancel` when given.
    pub async fn wait(mut self, timeout: Option<Duration>, cancel: Option<CancellationToken>) -> Result<String> {
        let timeout = timeout.unwrap_or(self.router.default_timeout);
        let Some(rx) = self.rx.take() else {
            return Err(InkbridgeError::BridgeClosed);
        };

        let cancelled = async {
            match &cancel {
                Some(token) => token.cancelled().await,
                None => std::future::pending().await,
            }
        };

        tokio::select! {
            reply = rx => match reply {
                Ok(result) => result,
                Err(_) => Err(InkbridgeError::BridgeClosed),
            },
            _ = tokio::time::sleep(timeout) => {
                warn!(channel = %self.channel, request_id = %self.id, timeout_ms = timeout.as_millis() as u64, "call timed out");
                Err(InkbridgeError::Timeout {
                    channel: self.channel.clone(),
                    after_ms: timeout.as_millis() as u64,
                })
            }
            _ = cancelled => {
                debug!(channel = %self.channel, request_id = %self.id, "call cancelled");
                Err(InkbridgeError::Cancelled(self.channel.clone()))
            }
        }
    }
}

impl Drop for PendingCall {
    fn drop(&mut self) {
        self.router.forget(&self.id);
    }
}
