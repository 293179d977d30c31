// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

//! Consul-compatible registry backend.
//!
//! Speaks the Consul agent HTTP API (`/v1/agent/service/register`,
//! `/v1/agent/service/deregister/<id>`, `/v1/agent/services`) and owns the
//! Registration Cache plus the per-cycle touched-set driving
//! `deregister_untouched`. Only services carrying this daemon's id prefix
//! are ever loaded or deregistered; entries owned by anything else in the
//! registry are invisible to the sweep.

use async_trait::async_trait;
use parking_lot::Mutex;
use reqwest::Client;
use serde::Deserialize;
use std::collections::HashMap;
use tracing::{debug, info};

use crate::domain::registry::{Registry, RegistryError, ServiceRegistration};
use crate::infrastructure::registry_cache::RegistrationCache;

/// Connection settings for the registry backend.
#[derive(Debug, Clone)]
pub struct ConsulConfig {
    /// Base URL of the registry agent, e.g. `http://127.0.0.1:8500`.
    pub base_url: String,
    /// ACL token sent as `X-Consul-Token`, if any.
    pub token: Option<String>,
    /// HTTP basic auth as `(user, password)`, if any.
    pub auth: Option<(String, Option<String>)>,
    /// Service id prefix marking entries as owned by this daemon.
    pub prefix: String,
}

impl ConsulConfig {
    pub fn new(base_url: impl Into<String>, prefix: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into(),
            token: None,
            auth: None,
            prefix: prefix.into(),
        }
    }
}

pub struct ConsulRegistry {
    config: ConsulConfig,
    client: Client,
    cache: Mutex<RegistrationCache>,
}

/// Service entry shape returned by `/v1/agent/services`.
#[derive(Debug, Deserialize)]
struct AgentService {
    #[serde(rename = "ID")]
    id: String,
    #[serde(rename = "Service")]
    service: String,
    #[serde(rename = "Address", default)]
    address: String,
    #[serde(rename = "Port", default)]
    port: u16,
    #[serde(rename = "Tags", default)]
    tags: Option<Vec<String>>,
}

impl ConsulRegistry {
    pub fn new(config: ConsulConfig) -> Self {
        Self {
            config,
            client: Client::new(),
            cache: Mutex::new(RegistrationCache::new()),
        }
    }

    fn request(&self, method: reqwest::Method, path: &str) -> reqwest::RequestBuilder {
        let mut builder = self
            .client
            .request(method, format!("{}{}", self.config.base_url, path));
        if let Some(token) = &self.config.token {
            builder = builder.header("X-Consul-Token", token);
        }
        if let Some((user, pass)) = &self.config.auth {
            builder = builder.basic_auth(user, pass.as_deref());
        }
        builder
    }

    fn owned(&self, id: &str) -> bool {
        id.starts_with(&format!("{}:", self.config.prefix))
    }

    async fn write_registration(&self, registration: &ServiceRegistration) -> Result<(), RegistryError> {
        let response = self
            .request(reqwest::Method::PUT, "/v1/agent/service/register")
            .json(registration)
            .send()
            .await?;
        if !response.status().is_success() {
            return Err(RegistryError::Rejected {
                id: registration.id.clone(),
                status: response.status().as_u16(),
            });
        }
        Ok(())
    }

    async fn write_deregistration(&self, id: &str) -> Result<(), RegistryError> {
        let response = self
            .request(
                reqwest::Method::PUT,
                &format!("/v1/agent/service/deregister/{}", id),
            )
            .send()
            .await?;
        if !response.status().is_success() {
            return Err(RegistryError::Rejected {
                id: id.to_string(),
                status: response.status().as_u16(),
            });
        }
        Ok(())
    }
}

#[async_trait]
impl Registry for ConsulRegistry {
    fn cache_supported(&self) -> bool {
        true
    }

    async fn load_cache(&self) -> Result<(), RegistryError> {
        let response = self
            .request(reqwest::Method::GET, "/v1/agent/services")
            .send()
            .await?;
        if !response.status().is_success() {
            return Err(RegistryError::CacheLoad(format!(
                "registry answered HTTP {}",
                response.status().as_u16()
            )));
        }
        let services: HashMap<String, AgentService> = response
            .json()
            .await
            .map_err(|err| RegistryError::CacheLoad(err.to_string()))?;

        let owned = services
            .into_values()
            .filter(|service| self.owned(&service.id))
            .map(|service| {
                ServiceRegistration::new(
                    service.id,
                    service.service,
                    service.address,
                    service.port,
                    service.tags.unwrap_or_default(),
                )
            })
            .collect::<Vec<_>>();

        debug!(entries = owned.len(), "registration cache loaded");
        self.cache.lock().replace(owned);
        Ok(())
    }

    async fn register(&self, registration: ServiceRegistration) -> Result<(), RegistryError> {
        if self.cache.lock().hit(&registration) {
            debug!(id = %registration.id, "already registered, skipping write");
            return Ok(());
        }

        info!(id = %registration.id, address = %registration.address, port = registration.port, "registering service");
        self.write_registration(&registration).await?;
        self.cache.lock().mark_registered(registration);
        Ok(())
    }

    async fn deregister_untouched(&self) -> Result<(), RegistryError> {
        let stale = self.cache.lock().untouched();
        for registration in stale {
            info!(id = %registration.id, "deregistering vanished service");
            self.write_deregistration(&registration.id).await?;
            self.cache.lock().remove(&registration.id);
        }
        Ok(())
    }
}
