// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Service layer: data directory, persisted configuration, document store and
// the demo asset bundle.

pub mod app_services;
pub mod data_dir;
