// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

//! Leader Locator.
//!
//! Maintains the current address of the orchestrator's active leader. A
//! background watch task updates the value while refresh cycles read it;
//! both sides go through the same lock-guarded accessor, so a reader can
//! never observe a half-written value. A one-cycle-stale read is an
//! accepted race: the State Fetcher verifies leader identity after
//! fetching and self-corrects.

use async_trait::async_trait;
use parking_lot::Mutex;
use reqwest::Client;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info, warn};

use crate::domain::state::{ClusterState, LeaderInfo};

/// Source of leader observations consumed by the locator's watch task.
///
/// `next_leader` yields the next observation (which may repeat the current
/// leader); returning `None` ends the watch.
#[async_trait]
pub trait LeaderWatch: Send {
    async fn next_leader(&mut self) -> Option<LeaderInfo>;
}

/// Lock-guarded holder of the most recently observed leader.
pub struct LeaderLocator {
    current: Mutex<LeaderInfo>,
    watch_started: AtomicBool,
}

impl LeaderLocator {
    pub fn new() -> Arc<Self> {
        Arc::new(Self {
            current: Mutex::new(LeaderInfo::default()),
            watch_started: AtomicBool::new(false),
        })
    }

    /// Most recently observed leader; empty if none has been seen yet.
    pub fn current_leader(&self) -> LeaderInfo {
        self.current.lock().clone()
    }

    /// Atomically replace the stored leader. The critical section is a
    /// plain value swap, never spanning a network call.
    pub fn set_leader(&self, leader: LeaderInfo) {
        let mut current = self.current.lock();
        if *current != leader {
            info!(old = %*current, new = %leader, "orchestrator leader changed");
        }
        *current = leader;
    }

    /// Establish the background watch. Only the first call per process
    /// lifetime spawns a task; later calls are no-ops.
    pub fn start_watch<W>(self: &Arc<Self>, mut watch: W)
    where
        W: LeaderWatch + 'static,
    {
        if self.watch_started.swap(true, Ordering::SeqCst) {
            return;
        }
        let locator = Arc::clone(self);
        tokio::spawn(async move {
            while let Some(leader) = watch.next_leader().await {
                locator.set_leader(leader);
            }
            warn!("leader watch ended");
        });
    }
}

/// [`LeaderWatch`] that probes a configured master list.
///
/// Each round asks every candidate for its state document and adopts the
/// first self-reported leader. Election mechanics stay with the
/// orchestrator; this watch only observes the outcome.
pub struct MasterListWatch {
    masters: Vec<String>,
    port: u16,
    interval: Duration,
    client: Client,
    first_probe: bool,
}

impl MasterListWatch {
    pub fn new(masters: Vec<String>, port: u16, interval: Duration) -> Self {
        Self {
            masters,
            port,
            interval,
            client: Client::new(),
            first_probe: true,
        }
    }

    async fn probe(&self) -> Option<LeaderInfo> {
        for master in &self.masters {
            let url = format!("http://{}:{}/master/state.json", master, self.port);
            let state: ClusterState = match self.client.get(&url).send().await {
                Ok(response) => match response.json().await {
                    Ok(state) => state,
                    Err(err) => {
                        debug!(%master, %err, "master answered with undecodable state");
                        continue;
                    }
                },
                Err(err) => {
                    debug!(%master, %err, "master unreachable");
                    continue;
                }
            };

            let hostname = state.leader_hostname();
            if hostname.is_empty() {
                debug!(%master, "master reports no elected leader");
                continue;
            }
            return Some(LeaderInfo::new(
                hostname,
                state.leader_port().unwrap_or(self.port),
            ));
        }
        None
    }
}

#[async_trait]
impl LeaderWatch for MasterListWatch {
    async fn next_leader(&mut self) -> Option<LeaderInfo> {
        loop {
            if !self.first_probe {
                tokio::time::sleep(self.interval).await;
            }
            self.first_probe = false;

            if let Some(leader) = self.probe().await {
                return Some(leader);
            }
            warn!("no master reachable, retrying leader probe");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::sync::mpsc;

    struct ScriptedWatch {
        rx: mpsc::Receiver<LeaderInfo>,
    }

    #[async_trait]
    impl LeaderWatch for ScriptedWatch {
        async fn next_leader(&mut self) -> Option<LeaderInfo> {
            self.rx.recv().await
        }
    }

    #[test]
    fn test_locator_starts_empty() {
        let locator = LeaderLocator::new();
        assert!(locator.current_leader().is_empty());
    }

    #[tokio::test]
    async fn test_watch_replaces_leader() {
        let locator = LeaderLocator::new();
        let (tx, rx) = mpsc::channel(4);
        locator.start_watch(ScriptedWatch { rx });

        tx.send(LeaderInfo::new("10.0.0.5", 5050)).await.unwrap();
        tx.send(LeaderInfo::new("10.0.0.6", 5050)).await.unwrap();
        drop(tx);

        // Wait for the watch task to drain the channel.
        tokio::time::timeout(Duration::from_secs(1), async {
            while locator.current_leader().hostname != "10.0.0.6" {
                tokio::time::sleep(Duration::from_millis(5)).await;
            }
        })
        .await
        .unwrap();
    }

    #[tokio::test]
    async fn test_watch_established_only_once() {
        let locator = LeaderLocator::new();
        let (tx1, rx1) = mpsc::channel(1);
        let (_tx2, rx2) = mpsc::channel(1);

        locator.start_watch(ScriptedWatch { rx: rx1 });
        // Second watch must not spawn; tx1 stays the live feed.
        locator.start_watch(ScriptedWatch { rx: rx2 });

        tx1.send(LeaderInfo::new("10.0.0.5", 5050)).await.unwrap();
        tokio::time::timeout(Duration::from_secs(1), async {
            while locator.current_leader().is_empty() {
                tokio::time::sleep(Duration::from_millis(5)).await;
            }
        })
        .await
        .unwrap();
        assert_eq!(locator.current_leader().hostname, "10.0.0.5");
    }

    #[tokio::test]
    async fn test_master_list_probe_adopts_reported_leader() {
        let mut server = mockito::Server::new_async().await;
        server
            .mock("GET", "/master/state.json")
            .with_status(200)
            .with_body(r#"{"leader": "master@10.0.0.5:5050", "slaves": [], "frameworks": []}"#)
            .create_async()
            .await;

        let hp = server.host_with_port();
        let (host, port) = hp.split_once(':').unwrap();
        let mut watch = MasterListWatch::new(
            vec!["unreachable.invalid".to_string(), host.to_string()],
            port.parse().unwrap(),
            Duration::from_secs(30),
        );

        let leader = watch.next_leader().await.unwrap();
        assert_eq!(leader, LeaderInfo::new("10.0.0.5", 5050));
    }
}
