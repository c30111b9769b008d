// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Unified error types for Inkbridge.

use thiserror::Error;

use crate::types::ErrorClass;

/// Top-level error type for all Inkbridge operations.
#[derive(Debug, Error)]
pub enum InkbridgeError {
    // -- Seed / document errors --
    #[error("invalid seed document: {0}")]
    InvalidSeed(String),

    #[error("unsupported editor format: {0}")]
    UnsupportedFormat(String),

    // -- Bridge errors --
    #[error("no handler registered for `{0}`")]
    NoHandler(String),

    #[error("handler for `{0}` is already registered")]
    DuplicateHandler(String),

    #[error("bridge call on `{channel}` timed out after {after_ms} ms")]
    Timeout { channel: String, after_ms: u64 },

    #[error("bridge call on `{0}` was cancelled")]
    Cancelled(String),

    #[error("bridge call on `{0}` was superseded by a newer call")]
    Superseded(String),

    #[error("bridge is closed")]
    BridgeClosed,

    #[error("bridge transport error: {0}")]
    Transport(String),

    #[error("malformed bridge message: {0}")]
    MalformedMessage(String),

    // -- Host shell errors --
    #[error("asset not found: {0}")]
    AssetMissing(String),

    #[error("integrity check failed for {asset}: expected {expected}, got {actual}")]
    IntegrityMismatch {
        asset: String,
        expected: String,
        actual: String,
    },

    #[error("content load failed: {0}")]
    ContentLoad(String),

    #[error("stage `{stage}` entered out of order: {reason}")]
    StageOrder { stage: String, reason: String },

    #[error("timed out waiting for {0}")]
    SignalTimeout(String),

    // -- Session errors --
    #[error("invalid transition from {from} on {event}")]
    InvalidTransition { from: String, event: String },

    #[error("collaboration client error: {0}")]
    Collaboration(String),

    // -- Storage / configuration --
    #[error("database error: {0}")]
    Database(String),

    #[error("configuration error: {0}")]
    Config(String),

    #[error("file I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl InkbridgeError {
    /// Classify this error for retry decisions.
    ///
    /// Only `Transient` errors are worth repeating as-is: the same bridge call
    /// or pipeline stage may succeed once the content side catches up.
    pub fn class(&self) -> ErrorClass {
        match self {
            // Transient: the other side was slow, busy, or restarting
            Self::Timeout { .. }
            | Self::SignalTimeout(_)
            | Self::Superseded(_)
            | Self::Transport(_)
            | Self::Collaboration(_)
            | Self::Database(_) => ErrorClass::Transient,

            // Caller decided to stop, or the environment needs fixing
            Self::Cancelled(_) | Self::Config(_) | Self::AssetMissing(_) => ErrorClass::UserAction,

            // Permanent: bad data or a programming error in the wiring
            Self::InvalidSeed(_)
            | Self::UnsupportedFormat(_)
            | Self::NoHandler(_)
            | Self::DuplicateHandler(_)
            | Self::BridgeClosed
            | Self::MalformedMessage(_)
            | Self::IntegrityMismatch { .. }
            | Self::ContentLoad(_)
            | Self::StageOrder { .. }
            | Self::InvalidTransition { .. }
            | Self::Serialization(_) => ErrorClass::Permanent,

            Self::Io(io_err) => match io_err.kind() {
                std::io::ErrorKind::NotFound | std::io::ErrorKind::PermissionDenied => {
                    ErrorClass::UserAction
                }
                _ => ErrorClass::Transient,
            },
        }
    }
}

/// Alias used throughout the codebase.
pub type Result<T> = std::result::Result<T, InkbridgeError>;
