// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Backend services for the demo: configuration, document store and the asset
// bundle the shell injects from.

use std::path::{Path, PathBuf};

use serde_json::{Value, json};
use tracing::{info, warn};

use inkbridge_core::config::BridgeConfig;
use inkbridge_core::error::Result;
use inkbridge_core::seed::SeedDocument;
use inkbridge_core::types::EditorFormat;
use inkbridge_shell::store::DocumentStore;

use super::data_dir;

const CONFIG_FILE: &str = "config.json";
const STORE_FILE: &str = "documents.db";
const BUNDLE_DIR: &str = "bundle";

pub struct AppServices {
    data_dir: PathBuf,
    config: BridgeConfig,
    store: DocumentStore,
}

impl AppServices {
    /// Open everything under the data directory. Call once at startup.
    pub fn init() -> Result<Self> {
        let dir = data_dir::data_dir()?;
        info!(path = %dir.display(), "initialising app services");

        let store = DocumentStore::open(dir.join(STORE_FILE))?;
        let config = match load_config(&dir) {
            Some(config) => config,
            None => {
                let config = BridgeConfig::default();
                if let Err(e) = persist_config(&dir, &config) {
                    warn!(error = %e, "could not write default config");
                }
                config
            }
        };
        write_demo_bundle(&data_dir::subdir(&dir, BUNDLE_DIR)?, &config)?;

        info!("app services initialised");
        Ok(Self {
            data_dir: dir,
            config,
            store,
        })
    }

    /// Defaults with an in-memory store, for when the data directory is
    /// unusable.
    pub fn fallback() -> Result<Self> {
        let dir = std::env::temp_dir().join("inkbridge-fallback");
        let config = BridgeConfig::default();
        write_demo_bundle(&data_dir::subdir(&dir, BUNDLE_DIR)?, &config)?;
        Ok(Self {
            data_dir: dir,
            config,
            store: DocumentStore::open_in_memory()?,
        })
    }

    pub fn config(&self) -> &BridgeConfig {
        &self.config
    }

    pub fn data_dir(&self) -> &Path {
        &self.data_dir
    }

    pub fn bundle_dir(&self) -> PathBuf {
        self.data_dir.join(BUNDLE_DIR)
    }

    /// Hand the store over to the shell.
    pub fn into_parts(self) -> (BridgeConfig, DocumentStore, PathBuf) {
        let bundle = self.bundle_dir();
        (self.config, self.store, bundle)
    }
}

// -- Config file persistence -------------------------------------------------

/// Read `config.json`. A missing, unreadable or invalid file yields `None`.
pub fn load_config(data_dir: &Path) -> Option<BridgeConfig> {
    let path = data_dir.join(CONFIG_FILE);
    let data = std::fs::read_to_string(&path).ok()?;
    match BridgeConfig::from_json_str(&data) {
        Ok(config) => Some(config),
        Err(e) => {
            warn!(path = %path.display(), error = %e, "ignoring invalid config");
            None
        }
    }
}

pub fn persist_config(data_dir: &Path, config: &BridgeConfig) -> Result<()> {
    let path = data_dir.join(CONFIG_FILE);
    let json = serde_json::to_string_pretty(config)?;
    std::fs::write(&path, json)?;
    Ok(())
}

// -- Demo content ------------------------------------------------------------

/// Seed shown on first launch.
pub fn demo_seed(format: EditorFormat) -> SeedDocument {
    let content: Value = match format {
        EditorFormat::Quill => json!({"ops": [{"insert": "demo document\n"}]}),
        EditorFormat::Lexical => json!({
            "root": {
                "children": [{"children": [], "direction": null, "format": "", "indent": 0,
                              "type": "paragraph", "version": 1}],
                "direction": null, "format": "", "indent": 0, "type": "root", "version": 1
            },
            "commentThreads": []
        }),
        EditorFormat::Draft => json!({
            "blocks": [{"key": "demo0", "text": "demo document", "type": "unstyled", "depth": 0,
                        "inlineStyleRanges": [], "entityRanges": [], "data": {}}],
            "entityMap": {}
        }),
    };
    SeedDocument::untimed(content)
}

/// Edit a simulated peer makes during the demo session.
pub fn demo_peer_edit(format: EditorFormat) -> Option<Value> {
    match format {
        EditorFormat::Quill => Some(json!({"ops": [
            {"insert": "demo document\n"},
            {"insert": "edited by a peer", "attributes": {"italic": true}},
            {"insert": "\n"}
        ]})),
        EditorFormat::Lexical | EditorFormat::Draft => None,
    }
}

/// Write placeholder entry and asset files the in-memory view can "load".
/// Existing files are left alone so a real bundle can be dropped in.
fn write_demo_bundle(dir: &Path, config: &BridgeConfig) -> Result<()> {
    let entry = dir.join(&config.html_entry);
    if !entry.exists() {
        std::fs::write(
            &entry,
            format!(
                "<!DOCTYPE html><html><head><meta charset=\"utf-8\"></head>\
                 <body><div id=\"editor\" data-format=\"{}\"></div></body></html>",
                config.editor_format
            ),
        )?;
    }
    for asset in &config.assets {
        let relative = Path::new(&asset.path);
        if !relative.components().all(|c| matches!(c, std::path::Component::Normal(_))) {
            warn!(path = %asset.path, "not writing placeholder outside the bundle");
            continue;
        }
        let path = dir.join(relative);
        if path.exists() {
            continue;
        }
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        std::fs::write(&path, format!("/* {} placeholder */\n", asset.path))?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use inkbridge_core::config::AssetSpec;
    use inkbridge_core::seed::validate_structure;

    #[test]
    fn config_round_trips_through_file() {
        let dir = tempfile::tempdir().unwrap();
        assert!(load_config(dir.path()).is_none());

        let mut config = BridgeConfig::default();
        config.collab.doc_id = "notes".into();
        persist_config(dir.path(), &config).unwrap();
        assert_eq!(load_config(dir.path()).unwrap().collab.doc_id, "notes");
    }

    #[test]
    fn invalid_config_is_ignored() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join(CONFIG_FILE), r#"{"base_origin": "file:///"}"#).unwrap();
        assert!(load_config(dir.path()).is_none());
    }

    #[test]
    fn demo_seeds_are_valid() {
        for format in [EditorFormat::Quill, EditorFormat::Lexical, EditorFormat::Draft] {
            let seed = demo_seed(format);
            assert!(validate_structure(format, &seed.content).is_ok(), "{format}");
            assert_eq!(seed.timestamp, -1);
        }
    }

    #[test]
    fn demo_peer_edit_is_valid_when_present() {
        for format in [EditorFormat::Quill, EditorFormat::Lexical, EditorFormat::Draft] {
            if let Some(edit) = demo_peer_edit(format) {
                assert!(validate_structure(format, &edit).is_ok(), "{format}");
            }
        }
        assert!(demo_peer_edit(EditorFormat::Quill).is_some());
    }

    #[test]
    fn demo_bundle_keeps_existing_files() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("codox.js"), "real client").unwrap();
        let config = BridgeConfig {
            assets: vec![AssetSpec::script("codox.js"), AssetSpec::stylesheet("css/editor.css")],
            ..BridgeConfig::default()
        };
        write_demo_bundle(dir.path(), &config).unwrap();

        assert_eq!(std::fs::read_to_string(dir.path().join("codox.js")).unwrap(), "real client");
        assert!(dir.path().join("css/editor.css").exists());
        assert!(dir.path().join("quill.html").exists());
    }
}
