//! Gateway instance registry.
//!
//! Each configured instance gets a handle owning its HTTP client (built with
//! the per-instance TLS policy and timeout) and its state cache. Handles are
//! created at registration and dropped at removal; nothing about an instance
//! lives in process-global state.

use std::sync::Arc;
use std::time::Duration;

use dashmap::DashMap;
use tracing::info;

use crate::cache::StateCache;
use crate::config::{Config, InstanceConfig};
use crate::error::{Error, InstanceError};

/// One registered gateway instance: immutable config, its HTTP client, and
/// its cached read-back state.
#[derive(Debug)]
pub struct InstanceHandle {
    pub config: InstanceConfig,
    pub cache: StateCache,
    pub(crate) http: reqwest::Client,
}

impl InstanceHandle {
    fn build(config: InstanceConfig, timeout: Duration) -> Result<Self, Error> {
        let http = reqwest::Client::builder()
            .timeout(timeout)
            .danger_accept_invalid_certs(!config.verify_tls)
            .build()?;
        Ok(Self {
            config,
            cache: StateCache::default(),
            http,
        })
    }

    pub fn id(&self) -> &str {
        &self.config.id
    }
}

/// Holds configured instances; resolves one by explicit id or default.
pub struct InstanceRegistry {
    instances: DashMap<String, Arc<InstanceHandle>>,
    default_id: Option<String>,
}

impl InstanceRegistry {
    /// Build a registry from validated configuration.
    pub fn from_config(config: &Config) -> Result<Self, Error> {
        let timeout = Duration::from_secs(config.timeout_seconds);
        let default_id = config.default_instance_id().map(str::to_string);
        let instances = DashMap::new();
        for instance in &config.instances {
            let handle = InstanceHandle::build(instance.clone(), timeout)?;
            info!(instance = %instance.id, url = %instance.base_url(), "registered gateway instance");
            instances.insert(instance.id.clone(), Arc::new(handle));
        }
        Ok(Self {
            instances,
            default_id,
        })
    }

    /// Resolve an instance by explicit id, or fall back to the default.
    /// The registry never picks arbitrarily.
    pub fn select(&self, override_id: Option<&str>) -> Result<Arc<InstanceHandle>, InstanceError> {
        match override_id {
            Some(id) => self
                .instances
                .get(id)
                .map(|entry| Arc::clone(entry.value()))
                .ok_or_else(|| InstanceError::NotFound(id.to_string())),
            None => {
                let id = self.default_id.as_deref().ok_or(InstanceError::NoDefault)?;
                self.instances
                    .get(id)
                    .map(|entry| Arc::clone(entry.value()))
                    .ok_or_else(|| InstanceError::NotFound(id.to_string()))
            }
        }
    }

    /// Remove an instance, tearing down its cache with it. In-flight calls
    /// holding the handle complete against the detached instance.
    pub fn remove(&self, id: &str) -> Option<Arc<InstanceHandle>> {
        self.instances.remove(id).map(|(_, handle)| handle)
    }

    pub fn ids(&self) -> Vec<String> {
        self.instances.iter().map(|e| e.key().clone()).collect()
    }
}
