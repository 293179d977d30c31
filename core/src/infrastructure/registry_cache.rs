// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

//! Registration Cache.
//!
//! Remembers, across polling cycles, which registry entries are believed
//! to already be registered so the backend can skip redundant writes. The
//! cache is a performance hint, not a source of truth: it is rebuilt from
//! registry contents at the start of every cache-enabled cycle and never
//! persisted. It also never deletes on its own initiative: untouched
//! entries are removed by the backend's deregistration pass.

use std::collections::HashMap;

use crate::domain::registry::ServiceRegistration;

#[derive(Debug, Clone)]
pub struct CacheEntry {
    pub registration: ServiceRegistration,
    /// Touched this cycle: registered, or confirmed identical and present.
    pub is_registered: bool,
}

#[derive(Debug, Default)]
pub struct RegistrationCache {
    entries: HashMap<String, CacheEntry>,
}

impl RegistrationCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// Full replace from current registry contents. Every entry starts the
    /// cycle untouched; prior cycle state is discarded, not merged.
    pub fn replace(&mut self, registrations: impl IntoIterator<Item = ServiceRegistration>) {
        self.entries = registrations
            .into_iter()
            .map(|registration| {
                (
                    registration.id.clone(),
                    CacheEntry {
                        registration,
                        is_registered: false,
                    },
                )
            })
            .collect();
    }

    /// Cache-hit check for a desired registration. An identical entry is
    /// marked touched and `true` returned, meaning the write can be
    /// skipped. A differing entry under the same id is not a hit; the
    /// caller's write will overwrite it (last-write-wins within a cycle).
    pub fn hit(&mut self, desired: &ServiceRegistration) -> bool {
        match self.entries.get_mut(&desired.id) {
            Some(entry) if entry.registration == *desired => {
                entry.is_registered = true;
                true
            }
            _ => false,
        }
    }

    /// Record a successful registry write.
    pub fn mark_registered(&mut self, registration: ServiceRegistration) {
        self.entries.insert(
            registration.id.clone(),
            CacheEntry {
                registration,
                is_registered: true,
            },
        );
    }

    /// Entries never touched this cycle, i.e. the deregistration candidates.
    pub fn untouched(&self) -> Vec<ServiceRegistration> {
        self.entries
            .values()
            .filter(|entry| !entry.is_registered)
            .map(|entry| entry.registration.clone())
            .collect()
    }

    /// Drop an entry after the backend has deregistered it.
    pub fn remove(&mut self, id: &str) {
        self.entries.remove(id);
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}
