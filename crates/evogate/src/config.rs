//! Gateway configuration.
//!
//! Loaded once at startup from a YAML file. Instances are immutable for the
//! session; the registry is rebuilt on reload by the host.

use std::path::Path;

use serde::Deserialize;
use thiserror::Error;
use tokio::fs;

use crate::media::DEFAULT_MAX_INLINE_BYTES;

// ============================================================================
// Config (root)
// ============================================================================

#[derive(Debug, Deserialize)]
pub struct Config {
    pub instances: Vec<InstanceConfig>,
    #[serde(default = "default_timeout_seconds")]
    pub timeout_seconds: u64,
    #[serde(default = "default_max_inline_media_bytes")]
    pub max_inline_media_bytes: u64,
    #[serde(default = "default_poll_interval_seconds")]
    pub poll_interval_seconds: u64,
}

impl Config {
    pub async fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let contents = fs::read_to_string(path.as_ref()).await?;
        let config: Config = serde_saphyr::from_str(&contents)?;
        config.validate()?;
        Ok(config)
    }

    /// Structural checks beyond deserialization: at least one instance,
    /// unique ids, and an unambiguous default. A single configured instance
    /// is implicitly the default; among several, exactly one must be marked.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.instances.is_empty() {
            return Err(ConfigError::NoInstances);
        }
        for (i, instance) in self.instances.iter().enumerate() {
            if instance.id.trim().is_empty() {
                return Err(ConfigError::Invalid("instance id must not be empty".into()));
            }
            if instance.server_url.trim().is_empty() {
                return Err(ConfigError::Invalid(format!(
                    "instance {} has an empty server_url",
                    instance.id
                )));
            }
            if self.instances[..i].iter().any(|o| o.id == instance.id) {
                return Err(ConfigError::DuplicateInstance(instance.id.clone()));
            }
        }
        let defaults = self.instances.iter().filter(|i| i.default).count();
        if self.instances.len() > 1 && defaults != 1 {
            return Err(ConfigError::AmbiguousDefault(defaults));
        }
        Ok(())
    }

    /// Id of the default instance. `validate` guarantees one exists.
    pub fn default_instance_id(&self) -> Option<&str> {
        self.instances
            .iter()
            .find(|i| i.default)
            .or_else(|| (self.instances.len() == 1).then(|| &self.instances[0]))
            .map(|i| i.id.as_str())
    }
}

// ============================================================================
// InstanceConfig
// ============================================================================

/// One configured gateway instance: base URL, credential, TLS policy.
#[derive(Debug, Clone, Deserialize)]
pub struct InstanceConfig {
    pub id: String,
    pub server_url: String,
    pub api_key: String,
    #[serde(default = "default_verify_tls")]
    pub verify_tls: bool,
    #[serde(default)]
    pub default: bool,
}

impl InstanceConfig {
    /// Base URL without a trailing slash, ready for endpoint concatenation.
    pub fn base_url(&self) -> &str {
        self.server_url.trim_end_matches('/')
    }
}

fn default_verify_tls() -> bool {
    true
}

fn default_timeout_seconds() -> u64 {
    10
}

fn default_max_inline_media_bytes() -> u64 {
    DEFAULT_MAX_INLINE_BYTES
}

fn default_poll_interval_seconds() -> u64 {
    60
}

// ============================================================================
// ConfigError
// ============================================================================

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config file: {0}")]
    Io(#[from] std::io::Error),

    #[error("failed to parse config file: {0}")]
    Yaml(#[from] serde_saphyr::Error),

    #[error("no gateway instances configured")]
    NoInstances,

    #[error("duplicate instance id: {0}")]
    DuplicateInstance(String),

    #[error("expected exactly one default instance, found {0}")]
    AmbiguousDefault(usize),

    #[error("invalid configuration: {0}")]
    Invalid(String),
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use std::io::Write;

    use tempfile::NamedTempFile;

    use super::*;

    fn instance(id: &str, default: bool) -> InstanceConfig {
        InstanceConfig {
            id: id.to_string(),
            server_url: "https://gateway.local:3000".to_string(),
            api_key: "secret".to_string(),
            verify_tls: true,
            default,
        }
    }

    fn config(instances: Vec<InstanceConfig>) -> Config {
        Config {
            instances,
            timeout_seconds: default_timeout_seconds(),
            max_inline_media_bytes: default_max_inline_media_bytes(),
            poll_interval_seconds: default_poll_interval_seconds(),
        }
    }

    #[tokio::test]
    async fn test_load_valid_yaml() {
        let mut file = NamedTempFile::new().unwrap();
        writeln!(
            file,
            r#"
instances:
  - id: main
    server_url: "https://wa.example.net:3000/"
    api_key: "key-1"
    default: true
  - id: backup
    server_url: "https://wa2.example.net:3000"
    api_key: "key-2"
    verify_tls: false
timeout_seconds: 5
"#
        )
        .unwrap();

        let config = Config::load(file.path()).await.unwrap();
        assert_eq!(config.instances.len(), 2);
        assert_eq!(config.timeout_seconds, 5);
        assert_eq!(config.max_inline_media_bytes, DEFAULT_MAX_INLINE_BYTES); // default
        assert_eq!(config.poll_interval_seconds, 60); // default
        assert_eq!(config.default_instance_id(), Some("main"));
        assert_eq!(config.instances[0].base_url(), "https://wa.example.net:3000");
        assert!(config.instances[0].verify_tls); // default
        assert!(!config.instances[1].verify_tls);
    }

    #[tokio::test]
    async fn test_load_missing_file_is_error() {
        let result = Config::load("/definitely/not/there.yaml").await;
        assert!(matches!(result, Err(ConfigError::Io(_))));
    }

    #[test]
    fn test_single_instance_is_implicit_default() {
        let c = config(vec![instance("only", false)]);
        c.validate().unwrap();
        assert_eq!(c.default_instance_id(), Some("only"));
    }

    #[test]
    fn test_multiple_instances_require_one_default() {
        let c = config(vec![instance("a", false), instance("b", false)]);
        assert!(matches!(c.validate(), Err(ConfigError::AmbiguousDefault(0))));

        let c = config(vec![instance("a", true), instance("b", true)]);
        assert!(matches!(c.validate(), Err(ConfigError::AmbiguousDefault(2))));

        let c = config(vec![instance("a", true), instance("b", false)]);
        c.validate().unwrap();
        assert_eq!(c.default_instance_id(), Some("a"));
    }

    #[test]
    fn test_duplicate_ids_rejected() {
        let c = config(vec![instance("a", true), instance("a", false)]);
        assert!(matches!(c.validate(), Err(ConfigError::DuplicateInstance(_))));
    }

    #[test]
    fn test_empty_instances_rejected() {
        let c = config(vec![]);
        assert!(matches!(c.validate(), Err(ConfigError::NoInstances)));
    }
}
