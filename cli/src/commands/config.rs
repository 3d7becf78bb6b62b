// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

//! Configuration management commands
//!
//! Commands: show, validate, generate

use anyhow::{Context, Result};
use clap::Subcommand;
use colored::Colorize;
use std::path::{Path, PathBuf};

use upstream_pool_core::domain::pool_config::{PolicyOptions, PoolConfigManifest};

#[derive(Subcommand)]
pub enum ConfigCommand {
    /// Show current configuration
    Show {
        /// Show config file paths checked
        #[arg(long)]
        paths: bool,
    },

    /// Validate configuration file
    Validate {
        /// Path to config file (default: discover)
        #[arg(value_name = "FILE")]
        file: Option<PathBuf>,
    },

    /// Generate sample configuration
    Generate {
        /// Output path (default: ./upool-config.yaml)
        #[arg(short, long, default_value = "./upool-config.yaml")]
        output: PathBuf,

        /// Include examples and comments
        #[arg(long)]
        examples: bool,
    },
}

pub async fn handle_command(
    command: ConfigCommand,
    config_override: Option<PathBuf>,
) -> Result<()> {
    match command {
        ConfigCommand::Show { paths } => show(config_override, paths).await,
        ConfigCommand::Validate { file } => validate(file.or(config_override)).await,
        ConfigCommand::Generate { output, examples } => generate(&output, examples).await,
    }
}

async fn show(config_override: Option<PathBuf>, show_paths: bool) -> Result<()> {
    let config = PoolConfigManifest::load_or_default(config_override.clone())
        .context("Failed to load configuration")?;

    if show_paths {
        println!("{}", "Configuration discovery paths:".bold());
        if let Some(path) = &config_override {
            println!("  1. --config flag: {}", path.display());
        } else {
            println!("  1. --config flag: {}", "(not set)".dimmed());
        }
        println!(
            "  2. UPOOL_CONFIG_PATH: {}",
            std::env::var("UPOOL_CONFIG_PATH")
                .unwrap_or_else(|_| "(not set)".to_string())
                .dimmed()
        );
        println!("  3. ./upool-config.yaml");
        println!("  4. ~/.upool/config.yaml");
        println!("  5. /etc/upool/config.yaml");
        println!();
    }

    println!("{}", "Current configuration:".bold());
    println!("  Name: {}", config.metadata.name);
    println!();

    println!("{}", "Pools:".bold());
    if config.spec.pools.is_empty() {
        println!("  {}", "(none)".dimmed());
    }
    for pool in &config.spec.pools {
        let options = &pool.options;
        println!("  {}", pool.upstream_type.bold());
        println!("    TTL: {}s", options.ttl_secs);
        println!("    Min failures: {}", options.min_failures);
        match &options.policy {
            PolicyOptions::Cooldown {
                cooldown_secs,
                min_cooldown_secs,
                max_cooldown_secs,
            } => println!(
                "    Policy: cooldown ({}s per failure, clamped to {}s..{}s)",
                cooldown_secs, min_cooldown_secs, max_cooldown_secs
            ),
            PolicyOptions::Decay { min_weight, decay } => println!(
                "    Policy: decay (x{} per failure, floor {})",
                decay, min_weight
            ),
        }
    }
    println!();

    println!("{}", "Upstreams:".bold());
    for upstream in &config.spec.upstreams {
        println!(
            "  [{}] {}  weight={}  interval={}s",
            upstream.upstream_type,
            upstream.host,
            upstream.weight.unwrap_or(0.0),
            upstream
                .interval
                .unwrap_or(upstream_pool_core::domain::upstream::MIN_INTERVAL_SECS)
        );
    }
    println!();

    Ok(())
}

async fn validate(config_path: Option<PathBuf>) -> Result<()> {
    println!("Validating configuration...");

    let config = PoolConfigManifest::load_or_default(config_path)
        .context("Failed to load configuration")?;

    config
        .validate()
        .context("Configuration validation failed")?;

    println!("{}", "✓ Configuration is valid".green());

    Ok(())
}

async fn generate(output: &Path, with_examples: bool) -> Result<()> {
    let sample = if with_examples {
        include_str!("../../templates/config-with-examples.yaml")
    } else {
        include_str!("../../templates/config-minimal.yaml")
    };

    std::fs::write(output, sample)
        .with_context(|| format!("Failed to write config to {:?}", output))?;

    println!(
        "{}",
        format!("✓ Configuration generated: {}", output.display()).green()
    );

    Ok(())
}
