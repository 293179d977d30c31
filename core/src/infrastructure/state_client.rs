// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

//! State Fetcher.
//!
//! Pulls one full `ClusterState` snapshot from an orchestrator leader over
//! HTTP and corrects for a stale leader address: if the decoded body
//! self-reports a different leader than the one contacted, exactly one
//! corrective fetch is issued against the reported address and its result
//! used instead. Never more than one: a leader bouncing between hosts
//! within a single cycle is left for the next polling cycle to resolve.

use async_trait::async_trait;
use reqwest::Client;
use thiserror::Error;
use tracing::{debug, warn};

use crate::domain::state::{ClusterState, LeaderInfo};

#[derive(Debug, Error)]
pub enum FetchError {
    #[error("state request to {leader} failed: {source}")]
    Transport {
        leader: String,
        #[source]
        source: reqwest::Error,
    },
    #[error("leader {leader} answered HTTP {status}")]
    Status { leader: String, status: u16 },
    #[error("undecodable state document from {leader}: {source}")]
    Decode {
        leader: String,
        #[source]
        source: serde_json::Error,
    },
}

/// Port for obtaining a cluster snapshot from a candidate leader.
#[async_trait]
pub trait StateFetch: Send + Sync {
    async fn fetch(&self, leader: &LeaderInfo) -> Result<ClusterState, FetchError>;
}

/// HTTP implementation of [`StateFetch`] against `/master/state.json`.
pub struct HttpStateClient {
    client: Client,
}

impl HttpStateClient {
    pub fn new() -> Self {
        Self {
            client: Client::new(),
        }
    }

    async fn fetch_once(&self, leader: &LeaderInfo) -> Result<ClusterState, FetchError> {
        let url = format!("http://{}:{}/master/state.json", leader.hostname, leader.port);
        debug!(%url, "fetching cluster state");

        let response = self
            .client
            .get(&url)
            .header("Content-Type", "application/json")
            .send()
            .await
            .map_err(|source| FetchError::Transport {
                leader: leader.to_string(),
                source,
            })?;

        if !response.status().is_success() {
            return Err(FetchError::Status {
                leader: leader.to_string(),
                status: response.status().as_u16(),
            });
        }

        let body = response
            .text()
            .await
            .map_err(|source| FetchError::Transport {
                leader: leader.to_string(),
                source,
            })?;

        serde_json::from_str(&body).map_err(|source| FetchError::Decode {
            leader: leader.to_string(),
            source,
        })
    }
}

impl Default for HttpStateClient {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl StateFetch for HttpStateClient {
    async fn fetch(&self, leader: &LeaderInfo) -> Result<ClusterState, FetchError> {
        let state = self.fetch_once(leader).await?;

        let reported = LeaderInfo::new(
            state.leader_hostname(),
            state.leader_port().unwrap_or(leader.port),
        );
        if reported.is_empty() || reported == *leader {
            return Ok(state);
        }

        // One-shot correction, never a loop. Whatever the corrected leader
        // reports about itself is taken at face value for this cycle.
        warn!(assumed = %leader, reported = %reported, "leader changed, refetching from reported leader");
        self.fetch_once(&reported).await
    }
}
