// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Host shell: one content view, its handlers, pipeline and document store.

use std::sync::{Arc, Mutex, PoisonError};

use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{info, instrument};

use inkbridge_bridge::envelope::Envelope;
use inkbridge_bridge::host::HostBridge;
use inkbridge_bridge::traits::HostView;
use inkbridge_core::config::BridgeConfig;
use inkbridge_core::error::Result;
use inkbridge_core::seed::{self, SeedDocument};

use crate::assets::AssetBundle;
use crate::handlers::{self, HandlerContext, HostEvent};
use crate::pipeline::{self, InitPipeline};
use crate::store::{DocumentStore, StoredDocument};

pub struct HostShell<V> {
    host: Arc<HostBridge<V>>,
    pipeline: InitPipeline<V>,
    store: Arc<Mutex<DocumentStore>>,
    config: BridgeConfig,
    seed: SeedDocument,
}

impl<V: HostView + 'static> HostShell<V> {
    /// Wire a shell around `view`. Returns the shell and the stream of
    /// user-facing host events.
    pub fn new(
        view: Arc<V>,
        config: BridgeConfig,
        bundle: AssetBundle,
        store: DocumentStore,
        seed: SeedDocument,
    ) -> Result<(Self, mpsc::UnboundedReceiver<HostEvent>)> {
        config.validate()?;
        seed::validate_structure(config.editor_format, &seed.content)?;

        let host = HostBridge::new(view);
        let store = Arc::new(Mutex::new(store));
        let (signal_tx, signal_rx) = pipeline::signal_channel();
        let (event_tx, event_rx) = mpsc::unbounded_channel();

        handlers::install(
            &host,
            HandlerContext {
                store: Arc::clone(&store),
                doc_id: config.collab.doc_id.clone(),
                format: config.editor_format,
                seed: seed.clone(),
                signals: signal_tx,
                events: event_tx,
            },
        )?;
        let pipeline = InitPipeline::new(Arc::clone(&host), bundle, config.clone(), signal_rx);

        info!(
            platform = host.view().platform_name(),
            format = %config.editor_format,
            doc_id = %config.collab.doc_id,
            "host shell ready"
        );
        Ok((
            Self {
                host,
                pipeline,
                store,
                config,
                seed,
            },
            event_rx,
        ))
    }

    pub fn host(&self) -> &Arc<HostBridge<V>> {
        &self.host
    }

    pub fn config(&self) -> &BridgeConfig {
        &self.config
    }

    pub fn pipeline(&self) -> &InitPipeline<V> {
        &self.pipeline
    }

    /// Start dispatching content messages from `inbox`.
    pub fn serve(&self, inbox: mpsc::UnboundedReceiver<Envelope>) -> JoinHandle<()> {
        tokio::spawn(Arc::clone(&self.host).serve(inbox))
    }

    /// Document the editor opens with: the latest stored one, else the seed.
    pub fn initial_document(&self) -> Result<SeedDocument> {
        Ok(self
            .latest_document()?
            .map_or_else(|| self.seed.clone(), |stored| stored.document))
    }

    pub fn latest_document(&self) -> Result<Option<StoredDocument>> {
        self.store
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .latest(&self.config.collab.doc_id)
    }

    /// Run the whole init pipeline.
    #[instrument(skip(self))]
    pub async fn open(&mut self) -> Result<()> {
        let document = self.initial_document()?;
        self.pipeline.run(&document).await
    }

    /// Load the content again from scratch.
    pub async fn reload(&mut self) -> Result<()> {
        self.pipeline.reset();
        self.open().await
    }

    pub async fn start_sync(&self) -> Result<()> {
        self.host.start_sync().await
    }

    pub async fn stop_sync(&self) -> Result<()> {
        self.host.stop_sync().await
    }

    pub async fn set_remote_cursors(&self, visible: bool) -> Result<()> {
        if visible {
            self.host.show_remote_cursors().await
        } else {
            self.host.hide_remote_cursors().await
        }
    }

    /// Stop syncing and refuse further content messages.
    pub async fn close(&self) -> Result<()> {
        let stopped = self.host.stop_sync().await;
        self.host.close();
        stopped
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    use inkbridge_bridge::loopback::{self, LoopbackView};
    use inkbridge_bridge::router::RequestRouter;
    use inkbridge_bridge::traits::ScriptRuntime;
    use inkbridge_core::config::{AssetSpec, CollabConfig};
    use inkbridge_core::types::{CorrelationMode, ScriptStyle};
    use inkbridge_editor::{AdapterState, EditorAdapter, LocalCollabClient, LocalCollabHandle};
    use serde_json::json;

    struct Running {
        shell: HostShell<LoopbackView>,
        events: mpsc::UnboundedReceiver<HostEvent>,
        collab: LocalCollabHandle,
        adapter: JoinHandle<EditorAdapter<LocalCollabClient>>,
        _dir: tempfile::TempDir,
    }

    fn bundle_dir() -> tempfile::TempDir {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("quill.html"), "<html><body><div id=editor></div></body></html>").unwrap();
        std::fs::write(dir.path().join("codox.js"), "/* codox */").unwrap();
        dir
    }

    /// Shell and adapter connected over the loopback, nothing opened yet.
    fn start(store: DocumentStore, collab_config: CollabConfig) -> Running {
        let dir = bundle_dir();
        let (view, content, inbox) = loopback::pair();
        let config = BridgeConfig {
            assets: vec![AssetSpec::script("codox.js")],
            collab: collab_config.clone(),
            ready_timeout_ms: 1_000,
            ..BridgeConfig::default()
        };
        let seed = SeedDocument::untimed(json!({"ops": [{"insert": "demo document\n"}]}));
        let (shell, events) =
            HostShell::new(Arc::new(view), config.clone(), AssetBundle::new(dir.path()), store, seed).unwrap();
        shell.serve(inbox);

        let (client, collab) = LocalCollabClient::new();
        let router = RequestRouter::new(CorrelationMode::ById, Duration::from_secs(1));
        let mut adapter =
            EditorAdapter::new(config.editor_format, collab_config, Arc::new(content.sink), router, client);
        adapter.attach().unwrap();
        let adapter = tokio::spawn(adapter.run(content.calls));

        Running {
            shell,
            events,
            collab,
            adapter,
            _dir: dir,
        }
    }

    async fn until(mut check: impl FnMut() -> bool) {
        tokio::time::timeout(Duration::from_secs(1), async {
            while !check() {
                tokio::task::yield_now().await;
            }
        })
        .await
        .unwrap();
    }

    #[tokio::test]
    async fn open_loads_injects_seeds_and_syncs() {
        let mut r = start(DocumentStore::open_in_memory().unwrap(), CollabConfig::default());
        r.shell.open().await.unwrap();

        assert_eq!(r.shell.pipeline().completed(), Some(pipeline::Stage::StartSync));
        assert_eq!(
            r.shell.host().view().scripts(),
            vec![inkbridge_bridge::script::console_pipe(), "/* codox */".to_owned()]
        );
        until(|| r.collab.is_running()).await;
        assert_eq!(r.collab.started_with()[0].doc_id, "demo-document");
        r.adapter.abort();
    }

    #[tokio::test]
    async fn edits_are_persisted_and_served_on_reconnect() {
        let mut r = start(DocumentStore::open_in_memory().unwrap(), CollabConfig::default());
        r.shell.open().await.unwrap();
        until(|| r.collab.is_running()).await;

        let edited = json!({"ops": [{"insert": "written while online\n"}]});
        r.collab
            .emit(inkbridge_editor::CollabEvent::ContentChanged(edited.clone()));
        match tokio::time::timeout(Duration::from_secs(1), r.events.recv()).await.unwrap() {
            Some(HostEvent::DocumentSaved { timestamp }) => assert!(timestamp > 0),
            other => panic!("unexpected event {other:?}"),
        }

        let fetched = r.collab.request_refetch().unwrap().await.unwrap().unwrap();
        assert_eq!(fetched.content, edited);
        assert!(fetched.is_authoritative());
        assert_eq!(r.shell.latest_document().unwrap().unwrap().document, fetched);
        r.adapter.abort();
    }

    #[tokio::test]
    async fn reconnect_without_saved_document_returns_untimed_seed() {
        let mut r = start(DocumentStore::open_in_memory().unwrap(), CollabConfig::default());
        r.shell.open().await.unwrap();
        until(|| r.collab.is_running()).await;

        let fetched = r.collab.request_refetch().unwrap().await.unwrap().unwrap();
        assert_eq!(fetched.timestamp, -1);
        assert_eq!(fetched.content, json!({"ops": [{"insert": "demo document\n"}]}));
        r.adapter.abort();
    }

    #[tokio::test]
    async fn autostart_content_starts_sync_itself() {
        let collab = CollabConfig {
            autostart: true,
            ..CollabConfig::default()
        };
        let mut r = start(DocumentStore::open_in_memory().unwrap(), collab);
        r.shell.open().await.unwrap();
        until(|| r.collab.is_running()).await;
        assert_eq!(r.collab.started_with().len(), 1);
        r.adapter.abort();
    }

    #[tokio::test]
    async fn stored_document_is_opened_instead_of_seed() {
        let store = DocumentStore::open_in_memory().unwrap();
        store
            .save("demo-document", &SeedDocument::new(json!({"ops": [{"insert": "saved\n"}]}), 7))
            .unwrap();
        let mut r = start(store, CollabConfig::default());
        assert_eq!(r.shell.initial_document().unwrap().timestamp, 7);
        r.shell.open().await.unwrap();
        r.adapter.abort();
    }

    #[tokio::test]
    async fn legacy_script_view_runs_the_whole_session() {
        let dir = bundle_dir();
        let (view, content, inbox) = loopback::pair();
        let config = BridgeConfig {
            assets: vec![AssetSpec::script("codox.js")],
            script_style: ScriptStyle::LegacyGlobals,
            ready_timeout_ms: 1_000,
            ..BridgeConfig::default()
        };
        let view = ScriptRuntime::new(view, config.script_style);
        let seed = SeedDocument::untimed(json!({"ops": [{"insert": "demo document\n"}]}));
        let (mut shell, _events) = HostShell::new(
            Arc::new(view),
            config.clone(),
            AssetBundle::new(dir.path()),
            DocumentStore::open_in_memory().unwrap(),
            seed,
        )
        .unwrap();
        shell.serve(inbox);

        let (client, collab) = LocalCollabClient::new();
        let router = RequestRouter::new(config.correlation, config.reply_timeout());
        let mut adapter =
            EditorAdapter::new(config.editor_format, config.collab.clone(), Arc::new(content.sink), router, client);
        adapter.attach().unwrap();
        let adapter = tokio::spawn(adapter.run(content.calls));

        shell.open().await.unwrap();
        until(|| collab.is_running()).await;
        let fetched = collab.request_refetch().unwrap().await.unwrap().unwrap();
        assert_eq!(fetched.timestamp, -1);

        let scripts = shell.host().view().evaluator().scripts();
        assert!(scripts.iter().any(|s| s.starts_with("setInitState(")));
        assert!(scripts.contains(&"startSync();".to_owned()));
        assert!(scripts.iter().any(|s| s.starts_with("window.fetchDocOnReconnectHookResponse(")));
        adapter.abort();
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn last_edit_sent_is_the_one_stored() {
        let dir = bundle_dir();
        let (view, _content, _view_inbox) = loopback::pair();
        let seed = SeedDocument::untimed(json!({"ops": [{"insert": "demo document\n"}]}));
        let (shell, mut events) = HostShell::new(
            Arc::new(view),
            BridgeConfig::default(),
            AssetBundle::new(dir.path()),
            DocumentStore::open_in_memory().unwrap(),
            seed,
        )
        .unwrap();

        let (tx, inbox) = mpsc::unbounded_channel();
        let serving = shell.serve(inbox);
        for i in 0..200 {
            let edit = json!({"ops": [{"insert": format!("edit {i}\n")}]});
            tx.send(Envelope::notify(
                inkbridge_core::types::channels::CONTENT_CHANGED,
                Some(edit.to_string()),
            ))
            .unwrap();
        }
        drop(tx);
        serving.await.unwrap();

        let mut saved = 0;
        while let Ok(HostEvent::DocumentSaved { .. }) = events.try_recv() {
            saved += 1;
        }
        assert_eq!(saved, 200);
        let latest = shell.latest_document().unwrap().unwrap();
        assert_eq!(latest.document.content, json!({"ops": [{"insert": "edit 199\n"}]}));
        assert_eq!(latest.revision, 200);
    }

    #[tokio::test]
    async fn close_stops_session_and_detaches_content() {
        let mut r = start(DocumentStore::open_in_memory().unwrap(), CollabConfig::default());
        r.shell.open().await.unwrap();
        until(|| r.collab.is_running()).await;

        r.shell.close().await.unwrap();
        until(|| !r.collab.is_running()).await;
        assert!(r.shell.host().channels().is_empty());

        drop(r.shell);
        let adapter = r.adapter.await.unwrap();
        assert_eq!(adapter.state(), AdapterState::SyncStopped);
        assert!(adapter.bridge().is_closed());
    }
}
