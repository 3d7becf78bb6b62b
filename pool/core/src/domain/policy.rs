// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0
//! # Failure-Adaptation Policies
//!
//! A [`FailurePolicy`] answers two questions for the pool's selector:
//!
//! - how much selection mass does a candidate carry right now, and
//! - how long must the caller wait before reusing it.
//!
//! | Policy | Weight | Reuse delay |
//! |--------|--------|-------------|
//! | [`CooldownPolicy`] | base weight | `interval`, lengthened linearly by failures |
//! | [`DecayPolicy`] | base weight, shrunk geometrically by failures | `interval` |
//!
//! Policies are stateless. The per-upstream rows they read and write
//! ([`AdaptationState`]) are owned by the pool's state table.

use std::fmt::Debug;
use std::time::Duration;
use tokio::time::Instant;
use crate::domain::upstream::Upstream;

/// Per-upstream adaptation row
#[derive(Debug, Clone, Default, PartialEq)]
pub struct AdaptationState {
    /// Consecutive failures since the last success
    pub failures: u32,

    /// When the upstream was last handed out by `sample()`
    pub last_selected_at: Option<Instant>,

    /// Decayed selection weight. `None` means "use the base weight".
    pub effective_weight: Option<f64>,
}

/// Strategy consulted by the pool's selector
pub trait FailurePolicy: Send + Sync + Debug {
    fn name(&self) -> &'static str;

    /// Mass used for the weighted pick
    fn selection_weight(&self, upstream: &Upstream, state: &AdaptationState) -> f64;

    /// Minimum gap between two selections of this upstream
    fn reuse_delay(&self, upstream: &Upstream, state: &AdaptationState) -> Duration;

    /// Called after the pool reset the failure counter
    fn on_success(&self, upstream: &Upstream, state: &mut AdaptationState);

    /// Called after the pool incremented the failure counter
    fn on_failure(&self, upstream: &Upstream, state: &mut AdaptationState);
}

fn interval_of(upstream: &Upstream) -> Duration {
    match Duration::try_from_secs_f64(upstream.interval) {
        Ok(interval) => interval,
        Err(_) if upstream.interval > 0.0 => Duration::MAX,
        Err(_) => Duration::ZERO,
    }
}

/// Hard backoff: failures lengthen the reuse delay, weight is untouched.
#[derive(Debug, Clone, PartialEq)]
pub struct CooldownPolicy {
    pub min_failures: u32,
    pub cooldown_secs: f64,
    pub min_cooldown_secs: f64,
    pub max_cooldown_secs: f64,
}

impl CooldownPolicy {
    /// Cooldown in seconds for a given failure count, before the interval floor
    pub fn cooldown_for(&self, failures: u32) -> Option<f64> {
        if failures == 0 || failures < self.min_failures {
            return None;
        }
        let raw = f64::from(failures) * self.cooldown_secs;
        Some(raw.min(self.max_cooldown_secs).max(self.min_cooldown_secs))
    }
}

impl FailurePolicy for CooldownPolicy {
    fn name(&self) -> &'static str {
        "cooldown"
    }

    fn selection_weight(&self, upstream: &Upstream, _state: &AdaptationState) -> f64 {
        upstream.weight
    }

    fn reuse_delay(&self, upstream: &Upstream, state: &AdaptationState) -> Duration {
        let interval = interval_of(upstream);
        match self.cooldown_for(state.failures) {
            Some(secs) => interval.max(Duration::try_from_secs_f64(secs).unwrap_or(Duration::MAX)),
            None => interval,
        }
    }

    fn on_success(&self, _upstream: &Upstream, _state: &mut AdaptationState) {}

    // The degraded delay is derived from the counter at sample time.
    fn on_failure(&self, _upstream: &Upstream, _state: &mut AdaptationState) {}
}

/// Soft de-prioritization: failures shrink the selection weight, the reuse
/// delay stays at the record's interval.
#[derive(Debug, Clone, PartialEq)]
pub struct DecayPolicy {
    pub min_failures: u32,
    pub min_weight: f64,
    pub decay: f64,
}

impl FailurePolicy for DecayPolicy {
    fn name(&self) -> &'static str {
        "decay"
    }

    fn selection_weight(&self, upstream: &Upstream, state: &AdaptationState) -> f64 {
        state.effective_weight.unwrap_or(upstream.weight)
    }

    fn reuse_delay(&self, upstream: &Upstream, _state: &AdaptationState) -> Duration {
        interval_of(upstream)
    }

    // Back to tracking the record, so a re-weight in the registry applies.
    fn on_success(&self, _upstream: &Upstream, state: &mut AdaptationState) {
        state.effective_weight = None;
    }

    fn on_failure(&self, upstream: &Upstream, state: &mut AdaptationState) {
        if state.failures < self.min_failures {
            return;
        }
        let current = self.selection_weight(upstream, state);
        // Never pushed below min_weight, never raised either.
        let floor = self.min_weight.min(current);
        let decayed = (current * self.decay).max(floor);
        // Underflow to zero would exclude the upstream.
        if decayed > 0.0 {
            state.effective_weight = Some(decayed);
        }
    }
}
