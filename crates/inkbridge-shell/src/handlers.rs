// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Host handlers for content → host messages.
//
// Each handler does its work synchronously and returns a ready future:
// SQLite calls are sub-millisecond and nothing here waits on the content.

use std::future::{Ready, ready};
use std::sync::{Arc, Mutex, PoisonError};

use serde_json::Value;
use tokio::sync::mpsc;
use tracing::{debug, error, info, warn};

use inkbridge_bridge::host::HostBridge;
use inkbridge_bridge::traits::HostView;
use inkbridge_core::error::{InkbridgeError, Result};
use inkbridge_core::human_errors::{HumanError, humanize_collab_event};
use inkbridge_core::seed::{self, SeedDocument};
use inkbridge_core::types::{ConsoleLevel, ConsoleMessage, EditorFormat, channels};

use crate::pipeline::Signal;
use crate::store::DocumentStore;

/// Something the host application may want to show the user.
#[derive(Debug, Clone)]
pub enum HostEvent {
    /// Latest document was persisted.
    DocumentSaved { timestamp: i64 },
    /// Presence list changed.
    UsersUpdated(Value),
    /// The collaboration client reported an error.
    CollabError { raw: Value, human: HumanError },
    /// The user tried to insert blacklisted content.
    BlacklistedInsert,
}

/// Everything the handlers share.
#[derive(Clone)]
pub struct HandlerContext {
    pub store: Arc<Mutex<DocumentStore>>,
    pub doc_id: String,
    pub format: EditorFormat,
    /// Served on reconnect when nothing has been stored yet.
    pub seed: SeedDocument,
    pub signals: mpsc::UnboundedSender<Signal>,
    pub events: mpsc::UnboundedSender<HostEvent>,
}

type Handled = Ready<Result<Option<Value>>>;

/// Register every content → host channel on `host`.
pub fn install<V: HostView + 'static>(host: &HostBridge<V>, ctx: HandlerContext) -> Result<()> {
    let c = ctx.clone();
    host.register(channels::CONTENT_CHANGED, move |p: Option<String>| -> Handled { ready(content_changed(&c, p)) })?;
    let c = ctx.clone();
    host.register(channels::USERS_UPDATE, move |p: Option<String>| -> Handled { ready(users_update(&c, p)) })?;
    let c = ctx.clone();
    host.register(channels::COLLAB_ERROR, move |p: Option<String>| -> Handled { ready(collab_error(&c, p)) })?;
    let c = ctx.clone();
    host.register(channels::BLACKLISTED_INSERT, move |_p: Option<String>| -> Handled { ready(blacklisted_insert(&c)) })?;
    let c = ctx.clone();
    host.register(channels::CONTENT_LOGS, move |p: Option<String>| -> Handled { ready(content_log(p)) })?;
    host.register_request(channels::FETCH_DOC_ON_NETWORK_RECONNECT, move |_p: Option<String>| -> Handled {
        ready(fetch_on_reconnect(&c))
    })?;

    let c = ctx.clone();
    host.register(channels::PAGE_LOADED, move |_p: Option<String>| -> Handled { ready(signal(&c, Signal::PageLoaded)) })?;
    let c = ctx.clone();
    host.register(channels::EDITOR_INITIALIZED, move |_p: Option<String>| -> Handled {
        ready(signal(&c, Signal::EditorInitialized))
    })?;
    let c = ctx;
    host.register(channels::INIT_ERROR, move |p: Option<String>| -> Handled {
        ready(signal(&c, Signal::InitError(p.unwrap_or_default())))
    })?;

    debug!(channels = ?host.channels(), "host handlers installed");
    Ok(())
}

fn parse(channel: &str, payload: Option<String>) -> Result<Value> {
    let json = payload.ok_or_else(|| InkbridgeError::MalformedMessage(format!("{channel} without payload")))?;
    serde_json::from_str(&json).map_err(|e| InkbridgeError::MalformedMessage(format!("{channel}: {e}")))
}

fn publish(ctx: &HandlerContext, event: HostEvent) {
    if ctx.events.send(event).is_err() {
        debug!("no listener for host events");
    }
}

/// Persist the merged document.
pub fn content_changed(ctx: &HandlerContext, payload: Option<String>) -> Result<Option<Value>> {
    let content = parse(channels::CONTENT_CHANGED, payload)?;
    seed::validate_structure(ctx.format, &content)?;
    let saved = ctx
        .store
        .lock()
        .unwrap_or_else(PoisonError::into_inner)
        .save_content(&ctx.doc_id, content)?;
    debug!(doc_id = %ctx.doc_id, timestamp = saved.timestamp, "document persisted");
    publish(
        ctx,
        HostEvent::DocumentSaved {
            timestamp: saved.timestamp,
        },
    );
    Ok(None)
}

pub fn users_update(ctx: &HandlerContext, payload: Option<String>) -> Result<Option<Value>> {
    let users = parse(channels::USERS_UPDATE, payload)?;
    info!(users = users.as_array().map_or(0, Vec::len), "presence updated");
    publish(ctx, HostEvent::UsersUpdated(users));
    Ok(None)
}

pub fn collab_error(ctx: &HandlerContext, payload: Option<String>) -> Result<Option<Value>> {
    let raw = parse(channels::COLLAB_ERROR, payload).unwrap_or(Value::Null);
    let human = humanize_collab_event(&raw);
    warn!(error = %raw, retriable = human.retriable, "collaboration error");
    publish(ctx, HostEvent::CollabError { raw, human });
    Ok(None)
}

pub fn blacklisted_insert(ctx: &HandlerContext) -> Result<Option<Value>> {
    info!("blacklisted insert blocked");
    publish(ctx, HostEvent::BlacklistedInsert);
    Ok(None)
}

/// Write one line of piped content console output into the host log.
pub fn content_log(payload: Option<String>) -> Result<Option<Value>> {
    let line = ConsoleMessage::parse(payload.as_deref().unwrap_or_default());
    let text = line.text();
    match line.level {
        ConsoleLevel::Error => error!(target: "inkbridge::content", "{text}"),
        ConsoleLevel::Warn => warn!(target: "inkbridge::content", "{text}"),
        ConsoleLevel::Log | ConsoleLevel::Info => info!(target: "inkbridge::content", "{text}"),
        ConsoleLevel::Debug => debug!(target: "inkbridge::content", "{text}"),
    }
    Ok(None)
}

/// Latest stored document, or the seed without an authoritative timestamp.
pub fn fetch_on_reconnect(ctx: &HandlerContext) -> Result<Option<Value>> {
    let stored = ctx
        .store
        .lock()
        .unwrap_or_else(PoisonError::into_inner)
        .latest(&ctx.doc_id)?;
    let document = match stored {
        Some(stored) => stored.document,
        None => SeedDocument::untimed(ctx.seed.content.clone()),
    };
    debug!(doc_id = %ctx.doc_id, timestamp = document.timestamp, "serving reconnect fetch");
    Ok(Some(serde_json::to_value(document)?))
}

fn signal(ctx: &HandlerContext, signal: Signal) -> Result<Option<Value>> {
    debug!(?signal, "content signal");
    if ctx.signals.send(signal).is_err() {
        debug!("pipeline no longer listening");
    }
    Ok(None)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn context() -> (HandlerContext, mpsc::UnboundedReceiver<Signal>, mpsc::UnboundedReceiver<HostEvent>) {
        let (signals, signal_rx) = mpsc::unbounded_channel();
        let (events, event_rx) = mpsc::unbounded_channel();
        let ctx = HandlerContext {
            store: Arc::new(Mutex::new(DocumentStore::open_in_memory().unwrap())),
            doc_id: "demo-document".into(),
            format: EditorFormat::Quill,
            seed: SeedDocument::new(json!({"ops": [{"insert": "demo document\n"}]}), 42),
            signals,
            events,
        };
        (ctx, signal_rx, event_rx)
    }

    #[test]
    fn reconnect_falls_back_to_untimed_seed() {
        let (ctx, _s, _e) = context();
        let reply = fetch_on_reconnect(&ctx).unwrap().unwrap();
        assert_eq!(reply, json!({"content": {"ops": [{"insert": "demo document\n"}]}, "timestamp": -1}));
    }

    #[test]
    fn content_changed_is_served_on_reconnect() {
        let (ctx, _s, mut events) = context();
        let edited = r#"{"ops":[{"insert":"edited\n"}]}"#;
        content_changed(&ctx, Some(edited.into())).unwrap();
        assert!(matches!(events.try_recv().unwrap(), HostEvent::DocumentSaved { .. }));

        let reply = fetch_on_reconnect(&ctx).unwrap().unwrap();
        assert_eq!(reply["content"], json!({"ops": [{"insert": "edited\n"}]}));
        assert!(reply["timestamp"].as_i64().unwrap() > 0);
    }

    #[test]
    fn invalid_content_is_not_stored() {
        let (ctx, _s, _e) = context();
        assert!(content_changed(&ctx, Some(r#"{"blocks":[]}"#.into())).is_err());
        assert!(content_changed(&ctx, None).is_err());
        assert!(ctx.store.lock().unwrap().latest("demo-document").unwrap().is_none());
    }

    #[test]
    fn collab_error_is_humanized() {
        let (ctx, _s, mut events) = context();
        collab_error(&ctx, Some(r#"{"message":"network offline"}"#.into())).unwrap();
        match events.try_recv().unwrap() {
            HostEvent::CollabError { human, .. } => assert!(human.retriable),
            other => panic!("unexpected event {other:?}"),
        }
    }

    #[test]
    fn content_logs_are_accepted_in_any_shape() {
        for line in [
            Some(r#"{"level":"error","args":["codox: invalid apiKey"]}"#.to_owned()),
            Some(r#"["editor mounted", 2]"#.to_owned()),
            Some("not json".to_owned()),
            None,
        ] {
            assert_eq!(content_log(line).unwrap(), None);
        }
    }

    #[tokio::test]
    async fn signals_reach_pipeline_through_host_bridge() {
        let (view, _content, _inbox) = inkbridge_bridge::loopback::pair();
        let host = HostBridge::new(Arc::new(view));
        let (ctx, mut signals, _e) = context();
        install(&host, ctx).unwrap();

        host.dispatch(inkbridge_bridge::envelope::Envelope::notify(channels::INIT_ERROR, Some("{}".into())))
            .await
            .unwrap();
        assert_eq!(signals.try_recv().unwrap(), Signal::InitError("{}".into()));
        assert_eq!(host.channels().len(), 9);
        assert!(host.channels().iter().any(|c| c == channels::CONTENT_LOGS));
    }
}
