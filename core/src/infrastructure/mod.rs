// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

pub mod consul;
pub mod leader;
pub mod registry_cache;
pub mod state_client;

pub use consul::{ConsulConfig, ConsulRegistry};
pub use leader::{LeaderLocator, LeaderWatch, MasterListWatch};
pub use state_client::{FetchError, HttpStateClient, StateFetch};
