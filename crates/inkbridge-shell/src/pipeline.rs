// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Staged content initialisation.
//
//   LoadDocument → InjectAssets → DeliverSeed → StartSync
//
// Each stage checks that the previous one completed and waits for a positive
// completion signal from the content (bounded by `ready_timeout`) rather than
// sleeping for a fixed delay.

use std::fmt;
use std::sync::Arc;

use tokio::sync::mpsc;
use tracing::{debug, error, info, instrument, warn};

use inkbridge_bridge::host::HostBridge;
use inkbridge_bridge::script;
use inkbridge_bridge::traits::HostView;
use inkbridge_core::config::BridgeConfig;
use inkbridge_core::error::{InkbridgeError, Result};
use inkbridge_core::seed::{self, SeedDocument};

use crate::assets::AssetBundle;

/// Named pipeline stage, in execution order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum Stage {
    LoadDocument,
    InjectAssets,
    DeliverSeed,
    StartSync,
}

impl Stage {
    pub const ALL: [Stage; 4] = [
        Stage::LoadDocument,
        Stage::InjectAssets,
        Stage::DeliverSeed,
        Stage::StartSync,
    ];

    fn previous(self) -> Option<Stage> {
        match self {
            Self::LoadDocument => None,
            Self::InjectAssets => Some(Self::LoadDocument),
            Self::DeliverSeed => Some(Self::InjectAssets),
            Self::StartSync => Some(Self::DeliverSeed),
        }
    }
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::LoadDocument => "load-document",
            Self::InjectAssets => "inject-assets",
            Self::DeliverSeed => "deliver-seed",
            Self::StartSync => "start-sync",
        };
        f.write_str(name)
    }
}

/// Completion signal raised by the content.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Signal {
    PageLoaded,
    EditorInitialized,
    /// The content rejected the seed; carries its report.
    InitError(String),
}

/// Create the channel host handlers feed signals into.
pub fn signal_channel() -> (mpsc::UnboundedSender<Signal>, mpsc::UnboundedReceiver<Signal>) {
    mpsc::unbounded_channel()
}

pub struct InitPipeline<V> {
    host: Arc<HostBridge<V>>,
    bundle: AssetBundle,
    config: BridgeConfig,
    signals: mpsc::UnboundedReceiver<Signal>,
    completed: Option<Stage>,
}

impl<V: HostView + 'static> InitPipeline<V> {
    pub fn new(
        host: Arc<HostBridge<V>>,
        bundle: AssetBundle,
        config: BridgeConfig,
        signals: mpsc::UnboundedReceiver<Signal>,
    ) -> Self {
        Self {
            host,
            bundle,
            config,
            signals,
            completed: None,
        }
    }

    /// Last stage that completed.
    pub fn completed(&self) -> Option<Stage> {
        self.completed
    }

    /// Forget progress so the content can be loaded again.
    pub fn reset(&mut self) {
        self.completed = None;
        while self.signals.try_recv().is_ok() {}
    }

    fn enter(&self, stage: Stage) -> Result<()> {
        if self.completed != stage.previous() {
            let reason = match (stage.previous(), self.completed) {
                (Some(prev), _) => format!("`{prev}` has not completed"),
                (None, Some(done)) => format!("pipeline already at `{done}`"),
                (None, None) => "pipeline not reset".into(),
            };
            return Err(InkbridgeError::StageOrder {
                stage: stage.to_string(),
                reason,
            });
        }
        debug!(%stage, "entering stage");
        Ok(())
    }

    fn complete(&mut self, stage: Stage) {
        info!(%stage, "stage complete");
        self.completed = Some(stage);
    }

    /// Load the HTML entry under the configured origin and wait for
    /// `pageLoaded`.
    #[instrument(skip(self), fields(entry = %self.config.html_entry))]
    pub async fn load_document(&mut self) -> Result<()> {
        self.enter(Stage::LoadDocument)?;
        let html = self.bundle.read_html(&self.config.html_entry).await?;
        self.host.view().load_html(&html, &self.config.base_origin).await?;
        self.await_signal(Stage::LoadDocument).await?;
        self.complete(Stage::LoadDocument);
        Ok(())
    }

    /// Evaluate each asset in manifest order. Each evaluation completes
    /// before the next starts.
    #[instrument(skip(self), fields(assets = self.config.assets.len()))]
    pub async fn inject_assets(&mut self) -> Result<()> {
        self.enter(Stage::InjectAssets)?;
        let assets = self.bundle.load_all(&self.config.assets).await?;
        if self.config.pipe_content_logs {
            self.host
                .view()
                .evaluate(&script::console_pipe())
                .await
                .map_err(|e| InkbridgeError::ContentLoad(format!("installing console pipe: {e}")))?;
        }
        for asset in &assets {
            let script = asset.injection_script()?;
            self.host.view().evaluate(&script).await.map_err(|e| {
                InkbridgeError::ContentLoad(format!("injecting {}: {e}", asset.spec.path))
            })?;
            debug!(path = %asset.spec.path, "asset injected");
        }
        self.complete(Stage::InjectAssets);
        Ok(())
    }

    /// Hand the seed to the editor and wait for its acknowledgement.
    #[instrument(skip_all, fields(timestamp = seed.timestamp))]
    pub async fn deliver_seed(&mut self, seed: &SeedDocument) -> Result<()> {
        self.enter(Stage::DeliverSeed)?;
        seed::validate_structure(self.config.editor_format, &seed.content)?;
        self.host.set_init_state(seed).await?;
        self.await_signal(Stage::DeliverSeed).await?;
        self.complete(Stage::DeliverSeed);
        Ok(())
    }

    /// Start the collaboration session, unless the content starts it itself.
    pub async fn start_sync(&mut self) -> Result<()> {
        self.enter(Stage::StartSync)?;
        if self.config.collab.autostart {
            debug!("content starts sync on initialisation");
        } else {
            self.host.start_sync().await?;
        }
        self.complete(Stage::StartSync);
        Ok(())
    }

    /// Run every stage in order. Stops at the first failure.
    pub async fn run(&mut self, seed: &SeedDocument) -> Result<()> {
        let result = async {
            self.load_document().await?;
            self.inject_assets().await?;
            self.deliver_seed(seed).await?;
            self.start_sync().await
        }
        .await;
        if let Err(e) = &result {
            let failed = Stage::ALL
                .into_iter()
                .find(|s| s.previous() == self.completed)
                .map(|s| s.to_string());
            error!(stage = ?failed, error = %e, "content initialisation aborted");
        }
        result
    }

    async fn await_signal(&mut self, stage: Stage) -> Result<()> {
        let timeout = self.config.ready_timeout();
        let wanted = match stage {
            Stage::LoadDocument => "pageLoaded",
            _ => "editorInitialized",
        };
        let wait = async {
            loop {
                match self.signals.recv().await {
                    Some(Signal::PageLoaded) if stage == Stage::LoadDocument => return Ok(()),
                    Some(Signal::EditorInitialized) if stage == Stage::DeliverSeed => return Ok(()),
                    Some(Signal::InitError(report)) if stage == Stage::DeliverSeed => {
                        return Err(InkbridgeError::InvalidSeed(format!("editor rejected seed: {report}")));
                    }
                    Some(other) => warn!(?other, %stage, "unexpected signal ignored"),
                    None => return Err(InkbridgeError::BridgeClosed),
                }
            }
        };
        match tokio::time::timeout(timeout, wait).await {
            Ok(result) => result,
            Err(_) => Err(InkbridgeError::SignalTimeout(format!(
                "{wanted} after {} ms",
                timeout.as_millis()
            ))),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use inkbridge_bridge::envelope::Envelope;
    use inkbridge_bridge::loopback::{self, ContentEndpoint, LoopbackView};
    use inkbridge_core::config::AssetSpec;
    use serde_json::json;

    struct Fixture {
        pipeline: InitPipeline<LoopbackView>,
        signals: mpsc::UnboundedSender<Signal>,
        content: ContentEndpoint,
        host: Arc<HostBridge<LoopbackView>>,
        _inbox: mpsc::UnboundedReceiver<Envelope>,
        _dir: tempfile::TempDir,
    }

    fn fixture(assets: Vec<AssetSpec>) -> Fixture {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("quill.html"), "<html><body><div id=editor></div></body></html>").unwrap();
        std::fs::write(dir.path().join("codox.js"), "/* codox */").unwrap();
        std::fs::write(dir.path().join("quill.css"), ".ql-editor { padding: 0; }").unwrap();

        let (view, content, inbox) = loopback::pair();
        let host = HostBridge::new(Arc::new(view));
        let (tx, rx) = signal_channel();
        let config = BridgeConfig {
            assets,
            ready_timeout_ms: 200,
            pipe_content_logs: false,
            ..BridgeConfig::default()
        };
        let pipeline = InitPipeline::new(Arc::clone(&host), AssetBundle::new(dir.path()), config, rx);
        Fixture {
            pipeline,
            signals: tx,
            content,
            host,
            _inbox: inbox,
            _dir: dir,
        }
    }

    fn demo_seed() -> SeedDocument {
        SeedDocument::untimed(json!({"ops": [{"insert": "demo document\n"}]}))
    }

    #[tokio::test]
    async fn stages_run_in_order_on_signals() {
        let mut f = fixture(vec![AssetSpec::script("codox.js"), AssetSpec::stylesheet("quill.css")]);

        f.signals.send(Signal::PageLoaded).unwrap();
        f.pipeline.load_document().await.unwrap();
        assert_eq!(f.host.view().documents()[0].base_origin, "http://inkbridge_demo.app/");

        f.pipeline.inject_assets().await.unwrap();
        let scripts = f.host.view().scripts();
        assert_eq!(scripts.len(), 2);
        assert_eq!(scripts[0], "/* codox */");

        f.signals.send(Signal::EditorInitialized).unwrap();
        f.pipeline.deliver_seed(&demo_seed()).await.unwrap();
        f.pipeline.start_sync().await.unwrap();
        assert_eq!(f.pipeline.completed(), Some(Stage::StartSync));

        let delivered: Vec<String> = std::iter::from_fn(|| f.content.calls.try_recv().ok())
            .map(|c| c.name().to_owned())
            .collect();
        assert_eq!(delivered, vec!["setInitState", "startSync"]);
    }

    #[tokio::test]
    async fn console_pipe_is_installed_before_assets() {
        let mut f = fixture(vec![AssetSpec::script("codox.js")]);
        f.pipeline.config.pipe_content_logs = true;
        f.signals.send(Signal::PageLoaded).unwrap();
        f.pipeline.load_document().await.unwrap();
        f.pipeline.inject_assets().await.unwrap();

        assert_eq!(f.host.view().scripts(), vec![script::console_pipe(), "/* codox */".to_owned()]);
    }

    #[tokio::test]
    async fn seed_before_assets_is_out_of_order() {
        let mut f = fixture(vec![]);
        let err = f.pipeline.deliver_seed(&demo_seed()).await.unwrap_err();
        assert!(matches!(err, InkbridgeError::StageOrder { ref stage, .. } if stage == "deliver-seed"));
        assert!(f.content.calls.try_recv().is_err());
    }

    #[tokio::test(start_paused = true)]
    async fn missing_page_loaded_times_out() {
        let mut f = fixture(vec![]);
        let err = f.pipeline.load_document().await.unwrap_err();
        assert!(matches!(err, InkbridgeError::SignalTimeout(ref m) if m.contains("pageLoaded")));
        assert_eq!(f.pipeline.completed(), None);
    }

    #[tokio::test]
    async fn failed_asset_aborts_before_seed() {
        let mut f = fixture(vec![AssetSpec::script("codox.js")]);
        f.host.view().fail_scripts_containing("codox");
        f.signals.send(Signal::PageLoaded).unwrap();

        let err = f.pipeline.run(&demo_seed()).await.unwrap_err();
        assert!(matches!(err, InkbridgeError::ContentLoad(ref m) if m.contains("codox.js")));
        assert_eq!(f.pipeline.completed(), Some(Stage::LoadDocument));
        assert!(f.content.calls.try_recv().is_err());
    }

    #[tokio::test]
    async fn rejected_seed_surfaces_content_report() {
        let mut f = fixture(vec![]);
        f.signals.send(Signal::PageLoaded).unwrap();
        f.pipeline.load_document().await.unwrap();
        f.pipeline.inject_assets().await.unwrap();

        f.signals.send(Signal::InitError("ops must be an array".into())).unwrap();
        let err = f.pipeline.deliver_seed(&demo_seed()).await.unwrap_err();
        assert!(matches!(err, InkbridgeError::InvalidSeed(ref m) if m.contains("ops must be an array")));
        assert_eq!(f.pipeline.completed(), Some(Stage::InjectAssets));
    }

    #[tokio::test]
    async fn host_side_validation_rejects_bad_seed_without_delivery() {
        let mut f = fixture(vec![]);
        f.signals.send(Signal::PageLoaded).unwrap();
        f.pipeline.load_document().await.unwrap();
        f.pipeline.inject_assets().await.unwrap();

        let bad = SeedDocument::untimed(json!({"blocks": []}));
        assert!(f.pipeline.deliver_seed(&bad).await.is_err());
        assert!(f.content.calls.try_recv().is_err());
    }

    #[tokio::test]
    async fn reset_allows_reload() {
        let mut f = fixture(vec![]);
        f.signals.send(Signal::PageLoaded).unwrap();
        f.pipeline.load_document().await.unwrap();
        assert!(f.pipeline.load_document().await.is_err());

        f.pipeline.reset();
        f.signals.send(Signal::PageLoaded).unwrap();
        f.pipeline.load_document().await.unwrap();
        assert_eq!(f.host.view().documents().len(), 2);
    }
}
