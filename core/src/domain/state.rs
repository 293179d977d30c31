// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

//! Cluster state model.
//!
//! Passive data structures decoded from the orchestrator leader's
//! `/master/state.json` document. A `ClusterState` is immutable for the
//! duration of one refresh cycle; everything above this layer consumes it
//! read-only.

use serde::Deserialize;
use std::collections::HashMap;

/// Network identity of the active orchestrator leader.
///
/// An empty hostname means no leader has been observed yet.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LeaderInfo {
    pub hostname: String,
    pub port: u16,
}

impl LeaderInfo {
    pub fn new(hostname: impl Into<String>, port: u16) -> Self {
        Self {
            hostname: hostname.into(),
            port,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.hostname.is_empty()
    }
}

impl std::fmt::Display for LeaderInfo {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}:{}", self.hostname, self.port)
    }
}

/// One full snapshot of cluster state as reported by a leader.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ClusterState {
    /// Self-reported leader, e.g. `master@10.0.0.5:5050`.
    #[serde(default)]
    pub leader: String,

    /// Worker hosts currently known to the leader.
    #[serde(rename = "slaves", default)]
    pub agents: Vec<Agent>,

    #[serde(default)]
    pub frameworks: Vec<Framework>,
}

impl ClusterState {
    /// Hostname/IP portion of the self-reported leader pid
    /// (`master@10.0.0.5:5050` → `10.0.0.5`). Empty if the cluster has no
    /// elected leader at snapshot time.
    pub fn leader_hostname(&self) -> &str {
        let addr = match self.leader.split_once('@') {
            Some((_, addr)) => addr,
            None => &self.leader,
        };
        addr.split(':').next().unwrap_or_default()
    }

    /// Port portion of the self-reported leader pid, if present.
    pub fn leader_port(&self) -> Option<u16> {
        let addr = self.leader.split_once('@').map(|(_, a)| a)?;
        addr.split_once(':')?.1.parse().ok()
    }
}

/// A worker host capable of running tasks.
#[derive(Debug, Clone, Deserialize)]
pub struct Agent {
    pub id: String,
    pub hostname: String,
}

/// A workload owner's grouping of tasks.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct Framework {
    #[serde(default)]
    pub id: String,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub tasks: Vec<Task>,
}

/// A unit of work scheduled onto an agent.
#[derive(Debug, Clone, Deserialize)]
pub struct Task {
    pub id: String,
    #[serde(default)]
    pub name: String,
    #[serde(rename = "slave_id")]
    pub agent_id: String,
    pub state: TaskState,
    #[serde(default)]
    pub resources: Resources,
    #[serde(default)]
    pub labels: Vec<Label>,
}

impl Task {
    /// Render task-declared labels as registry tags: `key:value`, or the
    /// bare key when the value is empty.
    pub fn label_tags(&self) -> Vec<String> {
        self.labels
            .iter()
            .map(|label| {
                if label.value.is_empty() {
                    label.key.clone()
                } else {
                    format!("{}:{}", label.key, label.value)
                }
            })
            .collect()
    }
}

/// A key/value label attached to a task by its framework.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct Label {
    pub key: String,
    #[serde(default)]
    pub value: String,
}

/// Task lifecycle state. Only `Running` tasks are registration candidates.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
pub enum TaskState {
    #[serde(rename = "TASK_STAGING")]
    Staging,
    #[serde(rename = "TASK_STARTING")]
    Starting,
    #[serde(rename = "TASK_RUNNING")]
    Running,
    #[serde(rename = "TASK_FINISHED")]
    Finished,
    #[serde(rename = "TASK_FAILED")]
    Failed,
    #[serde(rename = "TASK_KILLED")]
    Killed,
    #[serde(rename = "TASK_LOST")]
    Lost,
    #[serde(other)]
    Other,
}

/// Resources advertised by a task. Only ports are read.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct Resources {
    /// Port ranges in the orchestrator's wire format,
    /// e.g. `"[31000-31000, 31002-31004]"`.
    #[serde(default)]
    pub ports: String,
}

impl Resources {
    /// Expand the wire-format port ranges into individual ports.
    /// Malformed segments are dropped rather than failing the snapshot.
    pub fn port_list(&self) -> Vec<u16> {
        parse_port_ranges(&self.ports)
    }
}

fn parse_port_ranges(spec: &str) -> Vec<u16> {
    let trimmed = spec.trim().trim_start_matches('[').trim_end_matches(']');
    let mut ports = Vec::new();
    for range in trimmed.split(',') {
        let range = range.trim();
        if range.is_empty() {
            continue;
        }
        let (lo, hi) = match range.split_once('-') {
            Some((lo, hi)) => (lo.trim(), hi.trim()),
            None => (range, range),
        };
        if let (Ok(lo), Ok(hi)) = (lo.parse::<u16>(), hi.parse::<u16>()) {
            if lo <= hi {
                ports.extend(lo..=hi);
            }
        }
    }
    ports
}

/// Agent id → reachable hostname, rebuilt fresh from every snapshot.
///
/// Replacement, never merge: a decommissioned agent from a prior cycle
/// cannot leak forward.
#[derive(Debug, Clone, Default)]
pub struct AgentIndex {
    hosts: HashMap<String, String>,
}

impl AgentIndex {
    pub fn from_state(state: &ClusterState) -> Self {
        let hosts = state
            .agents
            .iter()
            .map(|a| (a.id.clone(), a.hostname.clone()))
            .collect();
        Self { hosts }
    }

    pub fn hostname(&self, agent_id: &str) -> Option<&str> {
        self.hosts.get(agent_id).map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.hosts.len()
    }

    pub fn is_empty(&self) -> bool {
        self.hosts.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_leader_hostname_parses_pid_format() {
        let state = ClusterState {
            leader: "master@10.0.0.5:5050".to_string(),
            ..Default::default()
        };
        assert_eq!(state.leader_hostname(), "10.0.0.5");
        assert_eq!(state.leader_port(), Some(5050));
    }

    #[test]
    fn test_leader_hostname_empty_when_no_leader() {
        let state = ClusterState::default();
        assert_eq!(state.leader_hostname(), "");
        assert_eq!(state.leader_port(), None);
    }

    #[test]
    fn test_port_ranges_expand() {
        assert_eq!(
            parse_port_ranges("[31000-31000, 31002-31004]"),
            vec![31000, 31002, 31003, 31004]
        );
    }

    #[test]
    fn test_port_ranges_tolerate_garbage() {
        assert_eq!(parse_port_ranges(""), Vec::<u16>::new());
        assert_eq!(parse_port_ranges("[oops-31000]"), Vec::<u16>::new());
        assert_eq!(parse_port_ranges("[31005-31001]"), Vec::<u16>::new());
    }

    #[test]
    fn test_task_state_decodes_unknown_variants() {
        let task: Task = serde_json::from_str(
            r#"{"id":"t1","name":"web","slave_id":"a1","state":"TASK_GONE"}"#,
        )
        .unwrap();
        assert_eq!(task.state, TaskState::Other);
    }

    #[test]
    fn test_agent_index_replaces_not_merges() {
        let first = ClusterState {
            agents: vec![Agent {
                id: "a1".to_string(),
                hostname: "host-a".to_string(),
            }],
            ..Default::default()
        };
        let second = ClusterState {
            agents: vec![Agent {
                id: "a2".to_string(),
                hostname: "host-b".to_string(),
            }],
            ..Default::default()
        };

        let index = AgentIndex::from_state(&first);
        assert_eq!(index.hostname("a1"), Some("host-a"));

        let index = AgentIndex::from_state(&second);
        assert_eq!(index.hostname("a1"), None);
        assert_eq!(index.hostname("a2"), Some("host-b"));
    }

    #[test]
    fn test_task_labels_decode_and_render_as_tags() {
        let task: Task = serde_json::from_str(
            r#"{"id": "t1", "name": "web", "slave_id": "a1", "state": "TASK_RUNNING",
                "labels": [{"key": "env", "value": "prod"}, {"key": "canary"}]}"#,
        )
        .unwrap();
        assert_eq!(
            task.label_tags(),
            vec!["env:prod".to_string(), "canary".to_string()]
        );
    }

    #[test]
    fn test_state_decodes_wire_document() {
        let body = r#"{
            "leader": "master@10.0.0.5:5050",
            "slaves": [{"id": "agent-1", "hostname": "host-a"}],
            "frameworks": [{
                "id": "fw-1",
                "name": "marathon",
                "tasks": [{
                    "id": "t1",
                    "name": "web",
                    "slave_id": "agent-1",
                    "state": "TASK_RUNNING",
                    "resources": {"ports": "[31000-31000]"}
                }]
            }]
        }"#;
        let state: ClusterState = serde_json::from_str(body).unwrap();
        assert_eq!(state.agents.len(), 1);
        assert_eq!(state.frameworks[0].tasks[0].state, TaskState::Running);
        assert_eq!(state.frameworks[0].tasks[0].resources.port_list(), vec![31000]);
    }
}
