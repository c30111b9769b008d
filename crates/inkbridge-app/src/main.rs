// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Inkbridge: native host ↔ embedded editor bridge.
//
// Desktop demo. Runs the host shell and the editor adapter in one process
// over the in-memory view, opens the document, plays a short collaboration
// session (presence, an edit, a network reconnect) and shuts down.

mod services;

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::mpsc;
use tracing::{error, info, warn};

use inkbridge_bridge::loopback;
use inkbridge_bridge::router::RequestRouter;
use inkbridge_bridge::traits::ScriptRuntime;
use inkbridge_core::error::{InkbridgeError, Result};
use inkbridge_core::human_errors::humanize_error;
use inkbridge_core::types::ConsoleLevel;
use inkbridge_editor::{CollabEvent, EditorAdapter, LocalCollabClient};
use inkbridge_shell::{AssetBundle, HostEvent, HostShell};

use services::app_services::{self, AppServices};

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();

    info!("Inkbridge starting");

    if let Err(e) = run().await {
        let human = humanize_error(&e);
        error!(error = %e, suggestion = %human.suggestion, "{}", human.message);
        std::process::exit(1);
    }
}

async fn run() -> Result<()> {
    let services = match AppServices::init() {
        Ok(s) => s,
        Err(e) => {
            error!(error = %e, "persistent storage failed, using in-memory fallback");
            AppServices::fallback()?
        }
    };
    info!(
        data_dir = %services.data_dir().display(),
        format = %services.config().editor_format,
        "services ready"
    );
    let (config, store, bundle_dir) = services.into_parts();
    let seed = app_services::demo_seed(config.editor_format);

    // Host side. The loopback stands in for a WebView that only evaluates
    // scripts, so host calls are rendered in the configured style.
    let (view, content, inbox) = loopback::pair();
    let view = ScriptRuntime::new(view, config.script_style);
    let (mut shell, mut events) =
        HostShell::new(Arc::new(view), config.clone(), AssetBundle::new(bundle_dir), store, seed.clone())?;
    shell.serve(inbox);

    // Content side.
    let (client, collab) = LocalCollabClient::new();
    let router = RequestRouter::new(config.correlation, config.reply_timeout());
    let mut adapter = EditorAdapter::new(
        config.editor_format,
        config.collab.clone(),
        Arc::new(content.sink),
        router,
        client,
    );
    adapter.attach()?;
    adapter.console(ConsoleLevel::Info, vec![serde_json::json!("editor adapter attached")])?;
    let adapter = tokio::spawn(adapter.run(content.calls));

    shell.open().await?;
    wait_for(|| collab.is_running(), config.ready_timeout()).await?;

    collab.emit(CollabEvent::UsersUpdate(serde_json::json!([
        {"username": config.collab.username, "color": "#3b82f6"}
    ])));
    collab.emit(CollabEvent::ContentChanged(seed.content.clone()));
    if let Some(peer_edit) = app_services::demo_peer_edit(config.editor_format) {
        collab.remote_edit(peer_edit);
    }
    if let Some(reply) = collab.request_refetch() {
        match reply.await {
            Ok(Ok(doc)) => info!(timestamp = doc.timestamp, authoritative = doc.is_authoritative(), "refetched after reconnect"),
            Ok(Err(e)) => warn!(error = %e, "reconnect fetch failed"),
            Err(_) => warn!("reconnect fetch dropped"),
        }
    }
    drain_events(&mut events, Duration::from_millis(200)).await;

    shell.close().await?;
    drop(shell);
    let adapter = adapter
        .await
        .map_err(|e| InkbridgeError::Transport(format!("adapter task: {e}")))?;
    info!(state = %adapter.state(), generation = %adapter.generation(), "Inkbridge demo finished");
    Ok(())
}

async fn wait_for(check: impl Fn() -> bool, limit: Duration) -> Result<()> {
    tokio::time::timeout(limit, async {
        while !check() {
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
    })
    .await
    .map_err(|_| InkbridgeError::SignalTimeout("collaboration session start".into()))
}

/// Log host events until none arrive for `quiet`.
async fn drain_events(events: &mut mpsc::UnboundedReceiver<HostEvent>, quiet: Duration) {
    while let Ok(Some(event)) = tokio::time::timeout(quiet, events.recv()).await {
        match event {
            HostEvent::DocumentSaved { timestamp } => info!(timestamp, "document saved"),
            HostEvent::UsersUpdated(users) => info!(%users, "collaborators"),
            HostEvent::CollabError { human, .. } => warn!(suggestion = %human.suggestion, "{}", human.message),
            HostEvent::BlacklistedInsert => warn!("blocked content insert"),
        }
    }
}
