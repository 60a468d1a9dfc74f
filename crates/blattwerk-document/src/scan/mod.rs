// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Scan module: simulated scanning of existing documents.

pub mod fake;

pub use fake::{FakeScanOptions, fake_scan};
