// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

//! Registry port.
//!
//! Abstract interface to the service-discovery backend. The reconciliation
//! engine only ever talks to this trait; the concrete backend owns
//! transport, auth, and TLS concerns.

use async_trait::async_trait;
use serde::Serialize;
use thiserror::Error;

/// Service-discovery record derived from a running task or cluster host.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ServiceRegistration {
    /// Stable identity, unique per (host, service, port).
    #[serde(rename = "ID")]
    pub id: String,
    #[serde(rename = "Name")]
    pub name: String,
    #[serde(rename = "Address")]
    pub address: String,
    /// 0 means the service advertises no port.
    #[serde(rename = "Port")]
    pub port: u16,
    #[serde(rename = "Tags")]
    pub tags: Vec<String>,
}

impl ServiceRegistration {
    pub fn new(
        id: impl Into<String>,
        name: impl Into<String>,
        address: impl Into<String>,
        port: u16,
        tags: Vec<String>,
    ) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            address: address.into(),
            port,
            tags,
        }
    }
}

/// Sanitize a task name into a registry-safe service name: strip the
/// leading path separator, lowercase, and collapse `_`, `.` and spaces
/// into `-`.
pub fn service_name(task_name: &str) -> String {
    task_name
        .trim_start_matches('/')
        .to_lowercase()
        .replace(['_', '.', ' ', '/'], "-")
}

#[derive(Debug, Error)]
pub enum RegistryError {
    #[error("registry request failed: {0}")]
    Transport(#[from] reqwest::Error),
    #[error("registry rejected {id}: HTTP {status}")]
    Rejected { id: String, status: u16 },
    #[error("registry cache load failed: {0}")]
    CacheLoad(String),
}

/// The service-discovery backend as seen by the reconciliation engine.
///
/// One cycle drives it through: optional `load_cache`, any number of
/// `register` calls, then a single `deregister_untouched` sweep. Entries
/// not registered (or confirmed present) during the cycle are removed by
/// that sweep; absence from the snapshot is the only deregistration signal.
#[async_trait]
pub trait Registry: Send + Sync {
    /// Whether the backend wants `load_cache` called before each cycle.
    fn cache_supported(&self) -> bool;

    /// Rebuild the registration cache from current registry contents.
    /// Full replace of any prior cycle's cache, never a merge.
    async fn load_cache(&self) -> Result<(), RegistryError>;

    /// Register one service. Backends with a cache may skip the write when
    /// an identical registration is already present, but must still count
    /// the entry as touched for this cycle.
    async fn register(&self, registration: ServiceRegistration) -> Result<(), RegistryError>;

    /// Remove every registry entry not touched during this cycle.
    async fn deregister_untouched(&self) -> Result<(), RegistryError>;
}
