// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Inkbridge host shell: loads the editor content into a view, injects the
// bundled assets, delivers the seed document, starts sync, and answers the
// content's messages.

pub mod assets;
pub mod handlers;
pub mod pipeline;
pub mod shell;
pub mod store;

pub use assets::{Asset, AssetBundle};
pub use handlers::HostEvent;
pub use pipeline::{InitPipeline, Signal, Stage};
pub use shell::HostShell;
pub use store::{DocumentStore, StoredDocument};
