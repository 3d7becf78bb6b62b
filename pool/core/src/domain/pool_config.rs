// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

// Pool Configuration Types
//
// Defines the options a pool is constructed with and the YAML manifest the
// CLI loads them from:
// - Kubernetes-style manifest format (apiVersion/kind/metadata/spec)
// - Per-group pool options (ttl, failure threshold, adaptation policy)
// - Seed upstream records for the in-memory registry

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use crate::domain::policy::{CooldownPolicy, DecayPolicy, FailurePolicy};
use crate::domain::pool::PoolError;
use crate::domain::repository::NewUpstream;

pub const API_VERSION: &str = "upool/v1";
pub const KIND: &str = "PoolConfig";

/// Options resolved once at pool construction
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PoolOptions {
    /// Snapshot freshness window in seconds
    #[serde(default = "default_ttl")]
    pub ttl_secs: f64,

    /// Consecutive failures before the policy degrades an upstream
    #[serde(default)]
    pub min_failures: u32,

    #[serde(default)]
    pub policy: PolicyOptions,
}

/// Failure-adaptation strategy, fixed for the pool's lifetime
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "strategy", rename_all = "lowercase")]
pub enum PolicyOptions {
    Cooldown {
        /// Seconds added per failure
        #[serde(default = "default_cooldown")]
        cooldown_secs: f64,
        #[serde(default)]
        min_cooldown_secs: f64,
        #[serde(default = "default_max_cooldown")]
        max_cooldown_secs: f64,
    },
    Decay {
        #[serde(default)]
        min_weight: f64,
        /// Multiplier applied per qualifying failure
        #[serde(default = "default_decay")]
        decay: f64,
    },
}

fn default_ttl() -> f64 {
    60.0
}

fn default_cooldown() -> f64 {
    10.0
}

fn default_max_cooldown() -> f64 {
    86400.0
}

fn default_decay() -> f64 {
    0.5
}

impl Default for PolicyOptions {
    fn default() -> Self {
        Self::Cooldown {
            cooldown_secs: default_cooldown(),
            min_cooldown_secs: 0.0,
            max_cooldown_secs: default_max_cooldown(),
        }
    }
}

impl PolicyOptions {
    pub fn decay() -> Self {
        Self::Decay {
            min_weight: 0.0,
            decay: default_decay(),
        }
    }
}

impl Default for PoolOptions {
    fn default() -> Self {
        Self {
            ttl_secs: default_ttl(),
            min_failures: 0,
            policy: PolicyOptions::default(),
        }
    }
}

impl PoolOptions {
    pub fn with_ttl(mut self, ttl_secs: f64) -> Self {
        self.ttl_secs = ttl_secs;
        self
    }

    pub fn with_min_failures(mut self, min_failures: u32) -> Self {
        self.min_failures = min_failures;
        self
    }

    pub fn with_policy(mut self, policy: PolicyOptions) -> Self {
        self.policy = policy;
        self
    }

    /// Reject any value outside its documented range
    pub fn validate(&self) -> Result<(), PoolError> {
        if !(self.ttl_secs >= 1.0 && self.ttl_secs.is_finite()) {
            return Err(invalid(format!("ttl_secs must be >= 1, got {}", self.ttl_secs)));
        }

        match &self.policy {
            PolicyOptions::Cooldown {
                cooldown_secs,
                min_cooldown_secs,
                max_cooldown_secs,
            } => {
                non_negative("cooldown_secs", *cooldown_secs)?;
                non_negative("min_cooldown_secs", *min_cooldown_secs)?;
                non_negative("max_cooldown_secs", *max_cooldown_secs)?;
                if max_cooldown_secs < min_cooldown_secs {
                    return Err(invalid(format!(
                        "max_cooldown_secs ({}) must be >= min_cooldown_secs ({})",
                        max_cooldown_secs, min_cooldown_secs
                    )));
                }
            }
            PolicyOptions::Decay { min_weight, decay } => {
                non_negative("min_weight", *min_weight)?;
                if !(*decay > 0.0 && *decay < 1.0) {
                    return Err(invalid(format!("decay must be in (0, 1), got {}", decay)));
                }
            }
        }

        Ok(())
    }

    /// Instantiate the configured strategy
    pub fn build_policy(&self) -> Box<dyn FailurePolicy> {
        match &self.policy {
            PolicyOptions::Cooldown {
                cooldown_secs,
                min_cooldown_secs,
                max_cooldown_secs,
            } => Box::new(CooldownPolicy {
                min_failures: self.min_failures,
                cooldown_secs: *cooldown_secs,
                min_cooldown_secs: *min_cooldown_secs,
                max_cooldown_secs: *max_cooldown_secs,
            }),
            PolicyOptions::Decay { min_weight, decay } => Box::new(DecayPolicy {
                min_failures: self.min_failures,
                min_weight: *min_weight,
                decay: *decay,
            }),
        }
    }
}

fn invalid(message: String) -> PoolError {
    PoolError::Configuration(message)
}

fn non_negative(field: &str, value: f64) -> Result<(), PoolError> {
    if value >= 0.0 && value.is_finite() {
        Ok(())
    } else {
        Err(invalid(format!("{} must be >= 0, got {}", field, value)))
    }
}

/// Top-level Kubernetes-style pool configuration manifest
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PoolConfigManifest {
    /// API version (must be "upool/v1")
    #[serde(rename = "apiVersion")]
    pub api_version: String,

    /// Resource kind (must be "PoolConfig")
    pub kind: String,

    pub metadata: ManifestMetadata,

    pub spec: PoolConfigSpec,
}

/// Manifest metadata (Kubernetes-style)
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ManifestMetadata {
    pub name: String,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub labels: Option<HashMap<String, String>>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct PoolConfigSpec {
    /// One entry per upstream group
    #[serde(default)]
    pub pools: Vec<PoolSpec>,

    /// Records seeded into the in-memory registry
    #[serde(default)]
    pub upstreams: Vec<NewUpstream>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PoolSpec {
    #[serde(rename = "type")]
    pub upstream_type: String,

    #[serde(default)]
    pub options: PoolOptions,
}

impl Default for PoolConfigManifest {
    fn default() -> Self {
        Self {
            api_version: API_VERSION.to_string(),
            kind: KIND.to_string(),
            metadata: ManifestMetadata {
                name: "upool".to_string(),
                labels: None,
            },
            spec: PoolConfigSpec::default(),
        }
    }
}

impl PoolConfigManifest {
    /// Load configuration from YAML file
    pub fn from_yaml_file(path: impl AsRef<Path>) -> anyhow::Result<Self> {
        let content = std::fs::read_to_string(path)?;
        Self::from_yaml_str(&content)
    }

    /// Parse configuration from YAML string
    pub fn from_yaml_str(yaml: &str) -> anyhow::Result<Self> {
        let config = serde_yaml::from_str(yaml)?;
        Ok(config)
    }

    pub fn to_yaml_string(&self) -> anyhow::Result<String> {
        Ok(serde_yaml::to_string(self)?)
    }

    /// Discover configuration file using precedence order
    /// 1. UPOOL_CONFIG_PATH environment variable
    /// 2. ./upool-config.yaml (working directory)
    /// 3. ~/.upool/config.yaml (user home)
    /// 4. /etc/upool/config.yaml (system, Unix) or C:\ProgramData\Upool\config.yaml (Windows)
    pub fn discover_config() -> Option<PathBuf> {
        if let Ok(path) = std::env::var("UPOOL_CONFIG_PATH") {
            let path = PathBuf::from(path);
            if path.exists() {
                return Some(path);
            }
        }

        let cwd = PathBuf::from("./upool-config.yaml");
        if cwd.exists() {
            return Some(cwd);
        }

        if let Some(home) = dirs::home_dir() {
            let user_config = home.join(".upool").join("config.yaml");
            if user_config.exists() {
                return Some(user_config);
            }
        }

        #[cfg(unix)]
        let system_config = PathBuf::from("/etc/upool/config.yaml");
        #[cfg(windows)]
        let system_config = PathBuf::from("C:\\ProgramData\\Upool\\config.yaml");

        if system_config.exists() {
            return Some(system_config);
        }

        None
    }

    /// Load configuration with discovery, fallback to default
    pub fn load_or_default(cli_path: Option<PathBuf>) -> anyhow::Result<Self> {
        // Explicit path must exist and parse
        if let Some(path) = cli_path {
            tracing::info!("Loading configuration from explicit path: {:?}", path);
            let mut config = Self::from_yaml_file(&path)
                .map_err(|e| anyhow::anyhow!("Failed to load config at {:?}: {}", path, e))?;
            config.apply_env_overrides();
            return Ok(config);
        }

        if let Some(config_path) = Self::discover_config() {
            tracing::info!("Loading configuration from discovered path: {:?}", config_path);
            let mut config = Self::from_yaml_file(config_path)?;
            config.apply_env_overrides();
            Ok(config)
        } else {
            tracing::warn!("No configuration file found in standard locations. Using empty defaults.");
            let mut config = Self::default();
            config.apply_env_overrides();
            Ok(config)
        }
    }

    /// Apply environment variable overrides to configuration
    pub fn apply_env_overrides(&mut self) {
        if let Ok(val) = std::env::var("UPOOL_DEFAULT_TTL_SECS") {
            match val.parse::<f64>() {
                Ok(ttl) => {
                    tracing::info!("Environment override: UPOOL_DEFAULT_TTL_SECS={}", ttl);
                    for pool in &mut self.spec.pools {
                        pool.options.ttl_secs = ttl;
                    }
                }
                Err(_) => {
                    tracing::warn!(
                        "Invalid value for UPOOL_DEFAULT_TTL_SECS: '{}'. Expected a number. Ignoring.",
                        val
                    );
                }
            }
        }
    }

    /// Pool entry for a group
    pub fn pool(&self, upstream_type: &str) -> Option<&PoolSpec> {
        self.spec.pools.iter().find(|p| p.upstream_type == upstream_type)
    }

    /// Validate configuration
    pub fn validate(&self) -> anyhow::Result<()> {
        if self.api_version != API_VERSION {
            anyhow::bail!(
                "Invalid apiVersion: '{}'. Must be '{}'",
                self.api_version,
                API_VERSION
            );
        }

        if self.kind != KIND {
            anyhow::bail!("Invalid kind: '{}'. Must be '{}'", self.kind, KIND);
        }

        if self.metadata.name.is_empty() {
            anyhow::bail!("metadata.name cannot be empty");
        }

        let mut seen = std::collections::HashSet::new();
        for pool in &self.spec.pools {
            if pool.upstream_type.is_empty() {
                anyhow::bail!("Pool type cannot be empty");
            }
            if !seen.insert(pool.upstream_type.as_str()) {
                anyhow::bail!("Duplicate pool type: {}", pool.upstream_type);
            }
            pool.options
                .validate()
                .map_err(|e| anyhow::anyhow!("Pool '{}': {}", pool.upstream_type, e))?;
        }

        for upstream in &self.spec.upstreams {
            upstream
                .validate()
                .map_err(|e| anyhow::anyhow!("Upstream '{}': {}", upstream.host, e))?;
        }

        Ok(())
    }
}
