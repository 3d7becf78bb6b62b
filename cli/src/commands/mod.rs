// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

//! Command implementations for the upool CLI

pub mod config;
pub mod debug;
pub mod sample;

pub use self::config::ConfigCommand;
pub use self::debug::DebugArgs;
pub use self::sample::SampleArgs;

use anyhow::{Context, Result};
use std::path::PathBuf;
use std::sync::Arc;
use tracing::{info, warn};

use upstream_pool_core::domain::pool_config::{PoolConfigManifest, PoolOptions};
use upstream_pool_core::infrastructure::repositories::InMemoryUpstreamRepository;
use upstream_pool_core::UpstreamPool;

/// Load the configuration, seed an in-memory registry and build the pool for
/// one group
pub(crate) async fn build_pool(
    config_path: Option<PathBuf>,
    upstream_type: &str,
    seed: Option<u64>,
) -> Result<UpstreamPool> {
    let config = PoolConfigManifest::load_or_default(config_path)
        .context("Failed to load configuration")?;
    config
        .validate()
        .context("Configuration validation failed")?;

    let repository = InMemoryUpstreamRepository::with_upstreams(config.spec.upstreams.clone())
        .await
        .context("Failed to seed upstream registry")?;
    info!("Seeded registry with {} upstreams", repository.len());

    let options = match config.pool(upstream_type) {
        Some(spec) => spec.options.clone(),
        None => {
            warn!("No pool configured for type '{}', using default options", upstream_type);
            PoolOptions::default()
        }
    };

    let pool = UpstreamPool::new(Arc::new(repository), upstream_type, options)
        .with_context(|| format!("Failed to create pool for type '{}'", upstream_type))?;

    Ok(match seed {
        Some(seed) => pool.with_seed(seed),
        None => pool,
    })
}
