// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Adapter lifecycle.
//
//   Unloaded → ContentLoaded → EditorInitialized → SyncActive
//                                                   ├─ stopSync  → SyncStopped
//                                                   └─ collab error → SyncError
//
// SyncStopped and SyncError can both start again. Stop is idempotent.

use std::fmt;

use serde::{Deserialize, Serialize};

use inkbridge_core::error::{InkbridgeError, Result};

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum AdapterState {
    /// Content not yet running.
    #[default]
    Unloaded,
    /// Content running, no seed applied.
    ContentLoaded,
    /// Seed applied, no collaboration session.
    EditorInitialized,
    SyncActive,
    SyncStopped,
    /// The client reported an error. The session stays up.
    SyncError,
}

/// Something that moves the adapter between states.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AdapterEvent {
    PageLoaded,
    SeedApplied,
    SyncStarted,
    SyncStopped,
    CollabError,
}

impl AdapterState {
    /// Next state after `event`, or `InvalidTransition`.
    pub fn on(self, event: AdapterEvent) -> Result<Self> {
        use AdapterEvent as E;
        use AdapterState as S;

        let next = match (self, event) {
            (S::Unloaded, E::PageLoaded) => S::ContentLoaded,

            // Re-seeding is allowed while no session is running (reconnect
            // refetch, host reload of the document).
            (S::ContentLoaded | S::EditorInitialized | S::SyncStopped, E::SeedApplied) => {
                S::EditorInitialized
            }

            (S::EditorInitialized | S::SyncStopped | S::SyncError | S::SyncActive, E::SyncStarted) => {
                S::SyncActive
            }

            (S::SyncActive | S::SyncError | S::SyncStopped, E::SyncStopped) => S::SyncStopped,
            // Stop before any start is a no-op.
            (S::Unloaded | S::ContentLoaded | S::EditorInitialized, E::SyncStopped) => self,

            (S::SyncActive | S::SyncError, E::CollabError) => S::SyncError,

            (from, event) => {
                return Err(InkbridgeError::InvalidTransition {
                    from: from.to_string(),
                    event: format!("{event:?}"),
                });
            }
        };
        Ok(next)
    }

    /// Whether a collaboration session is running.
    pub fn is_syncing(self) -> bool {
        matches!(self, Self::SyncActive | Self::SyncError)
    }

    /// Whether a seed has been applied at some point.
    pub fn has_document(self) -> bool {
        !matches!(self, Self::Unloaded | Self::ContentLoaded)
    }
}

impl fmt::Display for AdapterState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Unloaded => "unloaded",
            Self::ContentLoaded => "content-loaded",
            Self::EditorInitialized => "editor-initialized",
            Self::SyncActive => "sync-active",
            Self::SyncStopped => "sync-stopped",
            Self::SyncError => "sync-error",
        };
        f.write_str(name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use AdapterEvent as E;
    use AdapterState as S;

    #[test]
    fn happy_path() {
        let s = S::Unloaded.on(E::PageLoaded).unwrap();
        let s = s.on(E::SeedApplied).unwrap();
        let s = s.on(E::SyncStarted).unwrap();
        assert_eq!(s, S::SyncActive);
        assert_eq!(s.on(E::SyncStopped).unwrap(), S::SyncStopped);
    }

    #[test]
    fn stop_is_idempotent() {
        assert_eq!(S::SyncStopped.on(E::SyncStopped).unwrap(), S::SyncStopped);
        assert_eq!(S::EditorInitialized.on(E::SyncStopped).unwrap(), S::EditorInitialized);
    }

    #[test]
    fn error_keeps_session_restartable() {
        let s = S::SyncActive.on(E::CollabError).unwrap();
        assert_eq!(s, S::SyncError);
        assert!(s.is_syncing());
        assert_eq!(s.on(E::SyncStarted).unwrap(), S::SyncActive);
        assert_eq!(s.on(E::SyncStopped).unwrap(), S::SyncStopped);
    }

    #[test]
    fn cannot_start_without_seed() {
        assert!(matches!(
            S::ContentLoaded.on(E::SyncStarted),
            Err(InkbridgeError::InvalidTransition { .. })
        ));
        assert!(S::Unloaded.on(E::SeedApplied).is_err());
    }

    #[test]
    fn cannot_reseed_during_session() {
        assert!(S::SyncActive.on(E::SeedApplied).is_err());
        assert_eq!(S::SyncStopped.on(E::SeedApplied).unwrap(), S::EditorInitialized);
    }
}
