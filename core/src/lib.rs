// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0
//! # `beacon-core` — Registry Reconciliation Crate
//!
//! Keeps a service-discovery registry synchronized with the live task set
//! of a cluster orchestrator. Each polling cycle discovers the current
//! leader, pulls its full state document, registers every running task
//! whose agent is known, and deregisters everything that vanished from
//! the snapshot.
//!
//! ## Crate Layout
//!
//! | Module | Layer | Contents |
//! |--------|-------|----------|
//! | [`domain`] | Domain | `ClusterState` snapshot model, `Registry` port |
//! | [`application`] | Application | `Reconciler` engine, `RefreshLoop` scheduler |
//! | [`infrastructure`] | Infrastructure | HTTP state fetcher, leader locator, Consul backend |
//!
//! ## Key Invariant
//!
//! After a completed cycle the registry contains exactly the services
//! implied by the RUNNING, known-agent tasks of the most recently fetched
//! snapshot (no more, no fewer), modulo writes that failed and were
//! reported. The registration cache is a disposable hint rebuilt from
//! registry truth every cycle; deregistration is always driven by absence
//! from the fresh snapshot, never by the cache alone.

pub mod application;
pub mod domain;
pub mod infrastructure;

pub use domain::*;
