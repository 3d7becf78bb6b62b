// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0
//! # Upstream Pool Service
//!
//! [`UpstreamPool`] answers "which upstream should I use next?" for one group
//! of registry records. Each `sample()` call:
//!
//! 1. refreshes the cached snapshot if its TTL has expired,
//! 2. narrows the candidates by an optional [`Hint`], falling back to the full
//!    snapshot when the hint matches nothing,
//! 3. draws one candidate by weight,
//! 4. waits until the candidate's reuse delay has passed, then records the
//!    selection time.
//!
//! Callers report back through [`UpstreamPool::succeed`] and
//! [`UpstreamPool::fail`]; the configured [`FailurePolicy`] turns that
//! feedback into longer reuse delays or smaller selection weights.
//!
//! ## Concurrency
//!
//! State sits behind a `parking_lot::Mutex` that is never held across an
//! `.await`. The only suspension points are the registry fetch and the
//! throttling sleep. Two in-flight `sample()` calls that pick the same
//! upstream read the same `last_selected_at`, compute the same wait and
//! resume together; per-upstream spacing is not serialized between them.
//! The selection time is written after the sleep, so a cancelled call leaves
//! no trace.

use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use std::time::Duration;
use parking_lot::Mutex;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use tokio::time::Instant;
use tracing::{debug, info, warn};

use crate::domain::policy::{AdaptationState, FailurePolicy};
use crate::domain::pool::{Hint, PoolDiagnostics, PoolError, UpstreamDiagnostics};
use crate::domain::pool_config::PoolOptions;
use crate::domain::repository::{UpstreamQuery, UpstreamRepository};
use crate::domain::upstream::{Upstream, UpstreamId, UpstreamRef};

// Stand-in expiry when `now + ttl` does not fit in an Instant.
const FAR_FUTURE: Duration = Duration::from_secs(86400 * 365 * 30);

#[derive(Default)]
struct PoolState {
    snapshot: Vec<Upstream>,
    /// `None` until the first successful refresh
    expires_at: Option<Instant>,
    table: HashMap<UpstreamId, AdaptationState>,
}

/// Weighted, failure-aware selector for one upstream group
pub struct UpstreamPool {
    repository: Arc<dyn UpstreamRepository>,
    upstream_type: String,
    options: PoolOptions,
    ttl: Duration,
    policy: Box<dyn FailurePolicy>,
    state: Mutex<PoolState>,
    rng: Mutex<StdRng>,
}

impl std::fmt::Debug for UpstreamPool {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("UpstreamPool")
            .field("upstream_type", &self.upstream_type)
            .field("options", &self.options)
            .field("policy", &self.policy)
            .finish_non_exhaustive()
    }
}

impl UpstreamPool {
    /// Create a pool bound to one registry and one group.
    ///
    /// Options are validated here; an invalid value yields
    /// [`PoolError::Configuration`] and no pool.
    pub fn new(
        repository: Arc<dyn UpstreamRepository>,
        upstream_type: impl Into<String>,
        options: PoolOptions,
    ) -> Result<Self, PoolError> {
        options.validate()?;
        let ttl = Duration::try_from_secs_f64(options.ttl_secs)
            .map_err(|e| PoolError::Configuration(format!("ttl_secs: {}", e)))?;
        let policy = options.build_policy();

        Ok(Self {
            repository,
            upstream_type: upstream_type.into(),
            options,
            ttl,
            policy,
            state: Mutex::new(PoolState::default()),
            rng: Mutex::new(StdRng::from_os_rng()),
        })
    }

    /// Replace the random source with a seeded one
    pub fn with_seed(self, seed: u64) -> Self {
        *self.rng.lock() = StdRng::seed_from_u64(seed);
        self
    }

    pub fn upstream_type(&self) -> &str {
        &self.upstream_type
    }

    pub fn options(&self) -> &PoolOptions {
        &self.options
    }

    /// Current cached records, in registry order
    pub fn snapshot(&self) -> Vec<Upstream> {
        self.state.lock().snapshot.clone()
    }

    /// Consecutive failures recorded for an upstream, 0 if none
    pub fn failure_count<'a>(&self, reference: impl Into<UpstreamRef<'a>>) -> u32 {
        let id = reference.into().id();
        self.state.lock().table.get(&id).map_or(0, |row| row.failures)
    }

    /// Pick the next upstream to use.
    ///
    /// Registry errors propagate unchanged. Fails with
    /// [`PoolError::NoUpstreamAvailable`] when the snapshot is empty or the
    /// weighted draw degenerates.
    pub async fn sample(&self, hint: Option<Hint<'_>>) -> Result<Upstream, PoolError> {
        self.sync().await?;

        let (upstream, wait) = {
            let state = self.state.lock();
            let candidates = self.candidates(&state.snapshot, hint);
            if candidates.is_empty() {
                return Err(PoolError::NoUpstreamAvailable);
            }
            let upstream = self.pick(&candidates, &state.table)?.clone();
            let wait = state
                .table
                .get(&upstream.id)
                .and_then(|row| self.remaining_delay(&upstream, row, Instant::now()));
            (upstream, wait)
        };

        if let Some(wait) = wait {
            debug!(
                "Throttling upstream {} for {:.3}s ({})",
                upstream.id,
                wait.as_secs_f64(),
                self.upstream_type
            );
            tokio::time::sleep(wait).await;
        }

        let mut state = self.state.lock();
        let now = Instant::now();
        let row = state.table.entry(upstream.id).or_default();
        row.last_selected_at = Some(row.last_selected_at.map_or(now, |last| last.max(now)));
        debug!("Sampled upstream {} ({})", upstream.id, self.upstream_type);

        Ok(upstream)
    }

    /// Report a successful use. Resets the failure counter and lets the policy
    /// restore any degraded state.
    pub fn succeed<'a>(&self, reference: impl Into<UpstreamRef<'a>>) -> Result<(), PoolError> {
        let id = reference.into().id();
        let mut guard = self.state.lock();
        let PoolState { snapshot, table, .. } = &mut *guard;
        let upstream = snapshot
            .iter()
            .find(|u| u.id == id)
            .ok_or(PoolError::UnknownUpstream(id))?;

        let row = table.entry(id).or_default();
        row.failures = 0;
        self.policy.on_success(upstream, row);
        debug!("Upstream {} succeeded ({})", id, self.upstream_type);
        Ok(())
    }

    /// Report a failed use. Increments the failure counter, then lets the
    /// policy degrade the upstream once the threshold is reached.
    pub fn fail<'a>(&self, reference: impl Into<UpstreamRef<'a>>) -> Result<(), PoolError> {
        let id = reference.into().id();
        let mut guard = self.state.lock();
        let PoolState { snapshot, table, .. } = &mut *guard;
        let upstream = snapshot
            .iter()
            .find(|u| u.id == id)
            .ok_or(PoolError::UnknownUpstream(id))?;

        let row = table.entry(id).or_default();
        row.failures = row.failures.saturating_add(1);
        self.policy.on_failure(upstream, row);
        debug!(
            "Upstream {} failed ({} consecutive, {})",
            id, row.failures, self.upstream_type
        );
        Ok(())
    }

    /// Dump configuration, snapshot and adaptation state
    pub fn debug(&self) -> PoolDiagnostics {
        let state = self.state.lock();
        let now = Instant::now();
        let clean = AdaptationState::default();

        let upstreams = state
            .snapshot
            .iter()
            .map(|upstream| {
                let row = state.table.get(&upstream.id).unwrap_or(&clean);
                UpstreamDiagnostics {
                    id: upstream.id,
                    host: upstream.host.clone(),
                    base_weight: upstream.weight,
                    selection_weight: self.policy.selection_weight(upstream, row),
                    failures: row.failures,
                    last_selected_secs_ago: row
                        .last_selected_at
                        .map(|at| now.saturating_duration_since(at).as_secs_f64()),
                    reuse_delay_secs: self.policy.reuse_delay(upstream, row).as_secs_f64(),
                }
            })
            .collect();

        let diagnostics = PoolDiagnostics {
            upstream_type: self.upstream_type.clone(),
            policy: self.policy.name(),
            options: self.options.clone(),
            expires_in_secs: state
                .expires_at
                .filter(|at| *at > now)
                .map(|at| (at - now).as_secs_f64()),
            upstreams,
        };
        debug!(?diagnostics, "Pool diagnostics");
        diagnostics
    }

    /// Refresh the snapshot if the TTL has expired
    async fn sync(&self) -> Result<(), PoolError> {
        let now = Instant::now();
        if self.state.lock().expires_at.is_some_and(|at| now < at) {
            return Ok(());
        }

        let query = UpstreamQuery::by_type(self.upstream_type.as_str()).gt_weight(0.0);
        let upstreams = self.repository.find_many(&query).await?;

        let mut state = self.state.lock();
        let keys: HashSet<UpstreamId> = upstreams.iter().map(|u| u.id).collect();
        let before = state.table.len();
        state.table.retain(|id, _| keys.contains(id));
        let pruned = before - state.table.len();

        if upstreams.is_empty() {
            warn!("Registry returned no upstreams for type '{}'", self.upstream_type);
        }
        info!(
            "Refreshed pool '{}': {} upstreams, {} pruned",
            self.upstream_type,
            upstreams.len(),
            pruned
        );

        state.snapshot = upstreams;
        state.expires_at = Some(now.checked_add(self.ttl).unwrap_or(now + FAR_FUTURE));
        Ok(())
    }

    /// Apply the hint, falling back to the whole snapshot when it filters
    /// everything out
    fn candidates<'s>(&self, snapshot: &'s [Upstream], hint: Option<Hint<'_>>) -> Vec<&'s Upstream> {
        let Some(hint) = hint else {
            return snapshot.iter().collect();
        };

        let filtered: Vec<&Upstream> = snapshot.iter().filter(|u| hint.accepts(u)).collect();
        if filtered.is_empty() {
            debug!(
                "Hint {:?} on {} matched nothing in '{}', using full snapshot",
                hint,
                hint.reference(),
                self.upstream_type
            );
            return snapshot.iter().collect();
        }
        filtered
    }

    /// Weighted draw over the candidates, walked in snapshot order
    fn pick<'s>(
        &self,
        candidates: &[&'s Upstream],
        table: &HashMap<UpstreamId, AdaptationState>,
    ) -> Result<&'s Upstream, PoolError> {
        let clean = AdaptationState::default();
        let weights: Vec<f64> = candidates
            .iter()
            .map(|u| self.policy.selection_weight(u, table.get(&u.id).unwrap_or(&clean)))
            .collect();

        let sum: f64 = weights.iter().sum();
        if !(sum > 0.0 && sum.is_finite()) {
            return Err(PoolError::NoUpstreamAvailable);
        }

        let mut rand = self.rng.lock().random::<f64>() * sum;
        for (&upstream, weight) in candidates.iter().zip(&weights) {
            rand -= weight;
            if rand <= 0.0 {
                return Ok(upstream);
            }
        }

        // Rounding can leave a sliver past the last weight.
        candidates
            .iter()
            .zip(&weights)
            .rev()
            .find(|(_, weight)| **weight > 0.0)
            .map(|(&upstream, _)| upstream)
            .ok_or(PoolError::NoUpstreamAvailable)
    }

    /// Time left before `upstream` may be handed out again, if any
    fn remaining_delay(
        &self,
        upstream: &Upstream,
        row: &AdaptationState,
        now: Instant,
    ) -> Option<Duration> {
        let last = row.last_selected_at?;
        let delay = self.policy.reuse_delay(upstream, row);
        let remaining = match last.checked_add(delay) {
            Some(ready) => ready.saturating_duration_since(now),
            None => delay,
        };
        (!remaining.is_zero()).then_some(remaining)
    }
}
