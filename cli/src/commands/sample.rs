// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

//! Sample upstreams from a configured pool
//!
//! Optionally simulates caller feedback: each draw is reported as a failure
//! with probability `--fail-rate`, otherwise as a success.

use anyhow::{Context, Result};
use clap::Args;
use colored::Colorize;
use rand::Rng;
use std::collections::BTreeMap;
use std::path::PathBuf;
use tokio::time::Instant;

use upstream_pool_core::domain::pool::Hint;
use upstream_pool_core::domain::upstream::{UpstreamId, UrlOptions};

#[derive(Args)]
pub struct SampleArgs {
    /// Upstream group to sample from
    #[arg(short = 't', long = "type", value_name = "TYPE")]
    pub upstream_type: String,

    /// Number of draws
    #[arg(short = 'n', long, default_value_t = 1)]
    pub count: usize,

    /// Prefer this upstream
    #[arg(long, value_name = "UPSTREAM_ID", conflicts_with = "diff")]
    pub same: Option<UpstreamId>,

    /// Prefer any upstream except this one
    #[arg(long, value_name = "UPSTREAM_ID")]
    pub diff: Option<UpstreamId>,

    /// Probability of reporting each draw as failed
    #[arg(long, default_value_t = 0.0)]
    pub fail_rate: f64,

    /// Seed for the pool's random source
    #[arg(long)]
    pub seed: Option<u64>,

    /// Print each draw
    #[arg(short, long)]
    pub verbose: bool,
}

pub async fn handle_command(args: SampleArgs, config_path: Option<PathBuf>) -> Result<()> {
    if !(0.0..=1.0).contains(&args.fail_rate) {
        anyhow::bail!("--fail-rate must be within [0, 1], got {}", args.fail_rate);
    }

    let pool = super::build_pool(config_path, &args.upstream_type, args.seed).await?;
    let hint = match (args.same, args.diff) {
        (Some(id), _) => Some(Hint::same(id)),
        (None, Some(id)) => Some(Hint::diff(id)),
        (None, None) => None,
    };

    let start = Instant::now();
    let mut hits: BTreeMap<UpstreamId, (String, usize)> = BTreeMap::new();
    let mut rng = rand::rng();

    for i in 0..args.count {
        let upstream = pool
            .sample(hint)
            .await
            .with_context(|| format!("Sample {} failed", i + 1))?;

        let failed = rng.random_bool(args.fail_rate);
        if failed {
            pool.fail(&upstream)?;
        } else {
            pool.succeed(&upstream)?;
        }

        if args.verbose {
            let link = upstream
                .link(&UrlOptions::default())
                .unwrap_or_else(|_| upstream.host.clone());
            let status = if failed { "fail".red() } else { "ok".green() };
            println!(
                "{:>5}  {:>8.3}s  {}  {}  [{}]",
                i + 1,
                start.elapsed().as_secs_f64(),
                upstream.id,
                link,
                status
            );
        }

        hits.entry(upstream.id)
            .or_insert_with(|| (upstream.host.clone(), 0))
            .1 += 1;
    }

    println!();
    println!(
        "{}",
        format!(
            "{} draws from '{}' in {:.3}s",
            args.count,
            args.upstream_type,
            start.elapsed().as_secs_f64()
        )
        .bold()
    );
    for (id, (host, count)) in &hits {
        let share = *count as f64 / args.count.max(1) as f64 * 100.0;
        println!("  {}  {:>6}  {:>6.2}%  {}", id, count, share, host.dimmed());
    }

    Ok(())
}
