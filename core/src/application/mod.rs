// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

pub mod reconciler;
pub mod scheduler;

pub use reconciler::{CycleSummary, Reconciler, SyncError};
pub use scheduler::RefreshLoop;
