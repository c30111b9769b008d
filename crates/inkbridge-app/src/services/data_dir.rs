// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Data directory resolution.

use std::path::{Path, PathBuf};

use inkbridge_core::error::Result;

const APP_DIR: &str = "inkbridge";

/// Return the application data directory, creating it if needed.
///
/// `INKBRIDGE_DATA_DIR` wins; otherwise the XDG data dir, then
/// `~/.local/share`. Mobile hosts pass the platform documents directory
/// through `INKBRIDGE_DATA_DIR`.
pub fn data_dir() -> Result<PathBuf> {
    let dir = match std::env::var_os("INKBRIDGE_DATA_DIR") {
        Some(explicit) => PathBuf::from(explicit),
        None => base_dir(std::env::var_os("XDG_DATA_HOME"), std::env::var_os("HOME")).join(APP_DIR),
    };
    std::fs::create_dir_all(&dir)?;
    Ok(dir)
}

/// Return a subdirectory inside `root` (e.g. "bundle"), creating it if needed.
pub fn subdir(root: &Path, name: &str) -> Result<PathBuf> {
    let dir = root.join(name);
    std::fs::create_dir_all(&dir)?;
    Ok(dir)
}

fn base_dir(xdg: Option<std::ffi::OsString>, home: Option<std::ffi::OsString>) -> PathBuf {
    if let Some(xdg) = xdg.filter(|v| !v.is_empty()) {
        return PathBuf::from(xdg);
    }
    if let Some(home) = home.filter(|v| !v.is_empty()) {
        return PathBuf::from(home).join(".local").join("share");
    }
    std::env::temp_dir()
}
