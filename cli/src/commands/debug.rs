// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

//! Pool diagnostics dump

use anyhow::{Context, Result};
use clap::Args;
use std::path::PathBuf;

#[derive(Args)]
pub struct DebugArgs {
    /// Upstream group to inspect
    #[arg(short = 't', long = "type", value_name = "TYPE")]
    pub upstream_type: String,

    /// Samples to draw before dumping
    #[arg(long, default_value_t = 1)]
    pub warmup: usize,
}

pub async fn handle_command(args: DebugArgs, config_path: Option<PathBuf>) -> Result<()> {
    let pool = super::build_pool(config_path, &args.upstream_type, None).await?;

    for _ in 0..args.warmup {
        pool.sample(None).await.context("Warm-up sample failed")?;
    }

    let diagnostics = pool.debug();
    println!("{}", serde_json::to_string_pretty(&diagnostics)?);
    Ok(())
}
