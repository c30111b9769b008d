// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Asset bundle and integrity checks.
//
// Content is loaded from an in-memory string under a synthetic origin, so
// relative `<script src>` and `<link href>` never resolve. The shell reads
// the bundle itself and injects each asset after the page has loaded.

use std::path::{Component, Path, PathBuf};

use sha2::{Digest, Sha256};
use tracing::{debug, instrument};

use inkbridge_bridge::script;
use inkbridge_core::config::{AssetKind, AssetSpec};
use inkbridge_core::error::{InkbridgeError, Result};

/// Lowercase hex SHA-256 of `data`.
pub fn hash_bytes(data: &[u8]) -> String {
    let mut hasher = Sha256::new();
    hasher.update(data);
    hex::encode(hasher.finalize())
}

/// Check `data` against a pinned digest.
pub fn verify_hash(asset: &str, data: &[u8], expected_hex: &str) -> Result<()> {
    let actual = hash_bytes(data);
    if actual.eq_ignore_ascii_case(expected_hex) {
        Ok(())
    } else {
        Err(InkbridgeError::IntegrityMismatch {
            asset: asset.to_owned(),
            expected: expected_hex.to_owned(),
            actual,
        })
    }
}

/// A loaded asset ready for injection.
#[derive(Debug, Clone)]
pub struct Asset {
    pub spec: AssetSpec,
    pub source: String,
}

impl Asset {
    /// Script that installs this asset in the running page.
    pub fn injection_script(&self) -> Result<String> {
        match self.spec.kind {
            AssetKind::Script => Ok(self.source.clone()),
            AssetKind::Stylesheet => Ok(format!(
                "(function(){{var s=document.createElement('style');s.textContent={};document.head.appendChild(s);}})();",
                script::string_literal(&self.source)?
            )),
        }
    }
}

/// Directory holding the HTML entry document and its assets.
#[derive(Debug, Clone)]
pub struct AssetBundle {
    root: PathBuf,
}

impl AssetBundle {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Resolve `relative` inside the bundle, refusing anything that escapes it.
    fn resolve(&self, relative: &str) -> Result<PathBuf> {
        let path = Path::new(relative);
        let inside = path
            .components()
            .all(|c| matches!(c, Component::Normal(_) | Component::CurDir));
        if relative.is_empty() || !inside {
            return Err(InkbridgeError::Config(format!(
                "asset path {relative:?} must be relative to the bundle"
            )));
        }
        Ok(self.root.join(path))
    }

    async fn read(&self, relative: &str) -> Result<Vec<u8>> {
        let path = self.resolve(relative)?;
        tokio::fs::read(&path).await.map_err(|e| match e.kind() {
            std::io::ErrorKind::NotFound => InkbridgeError::AssetMissing(path.display().to_string()),
            _ => InkbridgeError::Io(e),
        })
    }

    /// Read the HTML entry document.
    #[instrument(skip(self), fields(root = %self.root.display()))]
    pub async fn read_html(&self, entry: &str) -> Result<String> {
        let bytes = self.read(entry).await?;
        decode(entry, bytes)
    }

    /// Read one asset and check its pinned digest, if any.
    pub async fn load(&self, spec: &AssetSpec) -> Result<Asset> {
        let bytes = self.read(&spec.path).await?;
        if let Some(expected) = &spec.sha256 {
            verify_hash(&spec.path, &bytes, expected)?;
        }
        debug!(path = %spec.path, kind = ?spec.kind, bytes = bytes.len(), "asset loaded");
        Ok(Asset {
            spec: spec.clone(),
            source: decode(&spec.path, bytes)?,
        })
    }

    /// Load every asset in manifest order. Fails on the first bad asset.
    pub async fn load_all(&self, specs: &[AssetSpec]) -> Result<Vec<Asset>> {
        let mut assets = Vec::with_capacity(specs.len());
        for spec in specs {
            assets.push(self.load(spec).await?);
        }
        Ok(assets)
    }
}

fn decode(name: &str, bytes: Vec<u8>) -> Result<String> {
    String::from_utf8(bytes).map_err(|_| InkbridgeError::ContentLoad(format!("{name} is not UTF-8")))
}
