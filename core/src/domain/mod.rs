// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

pub mod registry;
pub mod state;

pub use registry::{Registry, RegistryError, ServiceRegistration};
pub use state::{Agent, AgentIndex, ClusterState, Framework, Label, LeaderInfo, Task, TaskState};
