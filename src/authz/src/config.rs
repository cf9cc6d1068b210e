//! Service configuration loading and validation

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::engine::{CacheConfig, EngineConfig};
use crate::error::{AuthzError, Result};
use crate::policy::{CrossRealmPolicy, PolicyDocument};
use crate::session::SessionSettings;

/// Complete service configuration
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize, Serialize)]
pub struct AuthzConfig {
    #[serde(default)]
    pub session: SessionSection,

    #[serde(default)]
    pub engine: EngineSection,

    #[serde(default)]
    pub server: ServerSection,

    #[serde(default)]
    pub policy: PolicySection,
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
pub struct SessionSection {
    #[serde(default = "default_ttl")]
    pub ttl_secs: u64,
    #[serde(default)]
    pub refresh_grace_secs: u64,
    #[serde(default = "default_prune_interval")]
    pub prune_interval_secs: u64,
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
pub struct EngineSection {
    #[serde(default = "default_true")]
    pub enable_cache: bool,
    #[serde(default = "default_cache_capacity")]
    pub cache_capacity: usize,
    #[serde(default = "default_cache_ttl")]
    pub cache_ttl_secs: u64,
    #[serde(default = "default_true")]
    pub enable_metrics: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
pub struct ServerSection {
    #[serde(default = "default_host")]
    pub host: String,
    #[serde(default = "default_port")]
    pub port: u16,
    #[serde(default = "default_metrics_port")]
    pub metrics_port: u16,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize, Serialize)]
pub struct PolicySection {
    /// Policy document; the built-in matrix when absent
    #[serde(default)]
    pub path: Option<PathBuf>,
}

fn default_true() -> bool { true }
fn default_ttl() -> u64 { 3600 }
fn default_prune_interval() -> u64 { 300 }
fn default_cache_capacity() -> usize { 10_000 }
fn default_cache_ttl() -> u64 { 60 }
fn default_host() -> String { "0.0.0.0".to_string() }
fn default_port() -> u16 { 8080 }
fn default_metrics_port() -> u16 { 9090 }

impl Default for SessionSection {
    fn default() -> Self {
        Self {
            ttl_secs: default_ttl(),
            refresh_grace_secs: 0,
            prune_interval_secs: default_prune_interval(),
        }
    }
}

impl Default for EngineSection {
    fn default() -> Self {
        Self {
            enable_cache: true,
            cache_capacity: default_cache_capacity(),
            cache_ttl_secs: default_cache_ttl(),
            enable_metrics: true,
        }
    }
}

impl Default for ServerSection {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
            metrics_port: default_metrics_port(),
        }
    }
}

impl AuthzConfig {
    /// Load configuration from a TOML file
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let contents = std::fs::read_to_string(path.as_ref())?;
        Self::from_toml_str(&contents)
    }

    pub fn from_toml_str(contents: &str) -> Result<Self> {
        toml::from_str(contents)
            .map_err(|e| AuthzError::Config(format!("Failed to parse configuration: {}", e)))
    }

    /// Validate configuration
    pub fn validate(&self) -> Result<()> {
        if self.session.ttl_secs == 0 {
            return Err(AuthzError::Config("session.ttl_secs must be positive".to_string()));
        }

        if self.session.prune_interval_secs == 0 {
            return Err(AuthzError::Config(
                "session.prune_interval_secs must be positive".to_string(),
            ));
        }

        if session_duration(self.session.ttl_secs).is_none() {
            return Err(AuthzError::Config("session.ttl_secs out of range".to_string()));
        }

        if session_duration(self.session.refresh_grace_secs).is_none() {
            return Err(AuthzError::Config(
                "session.refresh_grace_secs out of range".to_string(),
            ));
        }

        if self.engine.enable_cache {
            if self.engine.cache_capacity == 0 {
                return Err(AuthzError::Config(
                    "engine.cache_capacity must be positive when caching is enabled".to_string(),
                ));
            }
            if self.engine.cache_ttl_secs == 0 {
                return Err(AuthzError::Config(
                    "engine.cache_ttl_secs must be positive when caching is enabled".to_string(),
                ));
            }
        }

        if self.server.port == self.server.metrics_port {
            return Err(AuthzError::Config(
                "server.port and server.metrics_port must differ".to_string(),
            ));
        }

        Ok(())
    }

    /// Session lifetimes; call after `validate`, out-of-range values saturate
    pub fn session_settings(&self) -> SessionSettings {
        SessionSettings {
            ttl: session_duration(self.session.ttl_secs).unwrap_or(chrono::Duration::MAX),
            refresh_grace: session_duration(self.session.refresh_grace_secs)
                .unwrap_or(chrono::Duration::MAX),
        }
    }

    pub fn engine_config(&self) -> EngineConfig {
        EngineConfig {
            enable_cache: self.engine.enable_cache,
            cache_config: CacheConfig {
                capacity: self.engine.cache_capacity,
                ttl: Duration::from_secs(self.engine.cache_ttl_secs),
            },
            enable_metrics: self.engine.enable_metrics,
        }
    }

    pub fn prune_interval(&self) -> Duration {
        Duration::from_secs(self.session.prune_interval_secs)
    }

    /// The configured policy file, or the built-in matrix
    pub fn load_policy(&self) -> Result<CrossRealmPolicy> {
        match &self.policy.path {
            Some(path) => PolicyDocument::load(path)?.into_policy(),
            None => CrossRealmPolicy::builtin(),
        }
    }
}

fn session_duration(secs: u64) -> Option<chrono::Duration> {
    i64::try_from(secs).ok().and_then(chrono::Duration::try_seconds)
}
