// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

//! Reconciliation Engine.
//!
//! Drives one full refresh cycle: obtain the current leader, fetch a
//! cluster snapshot, prime the registration cache, then reconcile the
//! registry against the snapshot's running tasks. Absence from the
//! snapshot is the only deregistration signal. A cycle either runs to
//! completion or is abandoned whole; no cycle error is fatal to the
//! process, the scheduler simply retries on the next tick.

use metrics::counter;
use std::sync::Arc;
use thiserror::Error;
use tracing::{debug, warn};

use crate::domain::registry::{service_name, Registry, RegistryError, ServiceRegistration};
use crate::domain::state::{AgentIndex, ClusterState, LeaderInfo, Task, TaskState};
use crate::infrastructure::leader::LeaderLocator;
use crate::infrastructure::state_client::{FetchError, StateFetch};

/// Why a refresh cycle was abandoned. Never fatal; the next tick retries.
#[derive(Debug, Error)]
pub enum SyncError {
    #[error("no master known to the leader locator")]
    NoLeader,
    #[error("snapshot reports no elected cluster leader")]
    ClusterLeaderless,
    #[error(transparent)]
    Fetch(#[from] FetchError),
    #[error("registry maintenance failed: {0}")]
    Registry(#[from] RegistryError),
}

/// Outcome of one completed cycle, exposed for observability.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct CycleSummary {
    pub agents: usize,
    pub running_tasks: usize,
    /// RUNNING tasks skipped because their agent is not in the snapshot's
    /// agent map (host not addressable).
    pub skipped_unknown_agent: usize,
    /// Individual registration writes that failed and were skipped past.
    pub registration_failures: usize,
}

pub struct Reconciler {
    locator: Arc<LeaderLocator>,
    fetcher: Arc<dyn StateFetch>,
    registry: Arc<dyn Registry>,
    prefix: String,
    tags: Vec<String>,
}

impl Reconciler {
    pub fn new(
        locator: Arc<LeaderLocator>,
        fetcher: Arc<dyn StateFetch>,
        registry: Arc<dyn Registry>,
        prefix: impl Into<String>,
        tags: Vec<String>,
    ) -> Self {
        Self {
            locator,
            fetcher,
            registry,
            prefix: prefix.into(),
            tags,
        }
    }

    /// Run one refresh cycle to completion.
    pub async fn refresh(&self) -> Result<CycleSummary, SyncError> {
        // Phase 1: acquire state.
        let leader = self.locator.current_leader();
        if leader.is_empty() {
            return Err(SyncError::NoLeader);
        }
        let state = self.fetcher.fetch(&leader).await?;

        // Phase 2: validate. A snapshot without an elected leader is
        // unusable; the orchestrator itself is mid-election.
        if state.leader_hostname().is_empty() {
            return Err(SyncError::ClusterLeaderless);
        }

        // Phase 3: prime the cache before any register/deregister call.
        if self.registry.cache_supported() {
            self.registry.load_cache().await?;
        }

        // Phase 4: reconcile.
        let agents = AgentIndex::from_state(&state);
        let mut summary = CycleSummary {
            agents: agents.len(),
            ..Default::default()
        };

        // The snapshot's self-reported leader, not the locator's view: the
        // fetcher may have corrected to a newer master mid-cycle.
        let elected = LeaderInfo::new(
            state.leader_hostname(),
            state.leader_port().unwrap_or(leader.port),
        );
        self.register_hosts(&state, &elected, &mut summary).await;

        for framework in &state.frameworks {
            for task in &framework.tasks {
                if task.state != TaskState::Running {
                    continue;
                }
                summary.running_tasks += 1;
                match agents.hostname(&task.agent_id) {
                    Some(hostname) => self.register_task(task, hostname, &mut summary).await,
                    None => {
                        // Agent left the cluster or was never seen: the
                        // host is not addressable, so the task is neither
                        // registered nor an error.
                        debug!(task = %task.id, agent = %task.agent_id, "skipping task on unknown agent");
                        summary.skipped_unknown_agent += 1;
                    }
                }
            }
        }

        // Everything not touched above has vanished from the snapshot.
        self.registry.deregister_untouched().await?;

        Ok(summary)
    }

    /// Register the cluster hosts themselves: every agent plus the current
    /// leader. These flow through the normal register path so they are
    /// cache-touched and survive the deregistration sweep.
    async fn register_hosts(&self, state: &ClusterState, leader: &LeaderInfo, summary: &mut CycleSummary) {
        for agent in &state.agents {
            let registration = ServiceRegistration::new(
                format!("{}:{}:agent", self.prefix, agent.hostname),
                format!("{}-agent", self.prefix),
                agent.hostname.clone(),
                0,
                self.tagged(["agent"]),
            );
            self.ensure_registered(registration, summary).await;
        }

        let registration = ServiceRegistration::new(
            format!("{}:{}:leader", self.prefix, leader.hostname),
            format!("{}-leader", self.prefix),
            leader.hostname.clone(),
            leader.port,
            self.tagged(["leader"]),
        );
        self.ensure_registered(registration, summary).await;
    }

    /// Register one running task: one service per advertised port, or a
    /// single port-less service when the task advertises none. The
    /// descriptor carries the configured default tags plus the task's own
    /// declared labels, so a label change on a running task produces a
    /// differing descriptor and a rewrite instead of a cache hit. Same-key
    /// collisions within a cycle are last-write-wins.
    async fn register_task(&self, task: &Task, hostname: &str, summary: &mut CycleSummary) {
        let name = if task.name.is_empty() {
            service_name(&task.id)
        } else {
            service_name(&task.name)
        };

        let mut tags = self.tags.clone();
        tags.extend(task.label_tags());

        let mut ports = task.resources.port_list();
        if ports.is_empty() {
            ports.push(0);
        }

        for port in ports {
            let registration = ServiceRegistration::new(
                format!("{}:{}:{}:{}", self.prefix, hostname, name, port),
                name.clone(),
                hostname.to_string(),
                port,
                tags.clone(),
            );
            self.ensure_registered(registration, summary).await;
        }
    }

    /// One registration write. Failure is contained to the entry: logged,
    /// counted, and skipped past. A still-running task reappears in the
    /// next snapshot and is retried then.
    async fn ensure_registered(&self, registration: ServiceRegistration, summary: &mut CycleSummary) {
        if let Err(err) = self.registry.register(registration.clone()).await {
            warn!(id = %registration.id, %err, "registration failed, continuing cycle");
            counter!("beacon_registration_failures_total").increment(1);
            summary.registration_failures += 1;
        }
    }

    fn tagged(&self, extra: impl IntoIterator<Item = &'static str>) -> Vec<String> {
        let mut tags = self.tags.clone();
        tags.extend(extra.into_iter().map(String::from));
        tags
    }
}
