// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

//! Fixed-interval refresh loop.
//!
//! One refresh cycle per tick, forever, on a single logical thread of
//! execution. Cycles never overlap: a slow cycle delays the next tick's
//! effective start rather than being skipped or parallelized. Cycle
//! outcomes are logged and counted; none are fatal to the process.

use metrics::counter;
use std::sync::Arc;
use std::time::Duration;
use tokio::time::MissedTickBehavior;
use tracing::{info, warn};

use crate::application::reconciler::{Reconciler, SyncError};

pub struct RefreshLoop {
    reconciler: Arc<Reconciler>,
    interval: Duration,
}

impl RefreshLoop {
    pub fn new(reconciler: Arc<Reconciler>, interval: Duration) -> Self {
        Self {
            reconciler,
            interval,
        }
    }

    /// Run forever. The first cycle starts immediately; each later cycle
    /// starts one interval after the previous tick.
    pub async fn run(&self) -> ! {
        let mut ticker = tokio::time::interval(self.interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        loop {
            ticker.tick().await;
            self.run_once().await;
        }
    }

    /// Drive one cycle and record its outcome.
    pub async fn run_once(&self) {
        match self.reconciler.refresh().await {
            Ok(summary) => {
                counter!("beacon_cycles_total", "outcome" => "success").increment(1);
                info!(
                    agents = summary.agents,
                    running_tasks = summary.running_tasks,
                    skipped_unknown_agent = summary.skipped_unknown_agent,
                    registration_failures = summary.registration_failures,
                    "refresh cycle complete"
                );
            }
            Err(err) => {
                counter!("beacon_cycles_total", "outcome" => outcome_label(&err)).increment(1);
                warn!(%err, "refresh cycle abandoned, retrying next tick");
            }
        }
    }
}

fn outcome_label(err: &SyncError) -> &'static str {
    match err {
        SyncError::NoLeader => "no_leader",
        SyncError::ClusterLeaderless => "cluster_leaderless",
        SyncError::Fetch(_) => "fetch_failed",
        SyncError::Registry(_) => "registry_failed",
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::registry::RegistryError;
    use crate::infrastructure::state_client::FetchError;

    #[test]
    fn test_outcome_labels_are_stable() {
        assert_eq!(outcome_label(&SyncError::NoLeader), "no_leader");
        assert_eq!(outcome_label(&SyncError::ClusterLeaderless), "cluster_leaderless");
        assert_eq!(
            outcome_label(&SyncError::Fetch(FetchError::Status {
                leader: "10.0.0.5:5050".to_string(),
                status: 503,
            })),
            "fetch_failed"
        );
        assert_eq!(
            outcome_label(&SyncError::Registry(RegistryError::CacheLoad(
                "boom".to_string()
            ))),
            "registry_failed"
        );
    }
}
