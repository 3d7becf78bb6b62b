// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0
//! Pool
//!
//! Value types shared by the pool service and its callers: selection hints,
//! the error taxonomy and the diagnostic dump.

use serde::Serialize;
use crate::domain::repository::RepositoryError;
use crate::domain::upstream::{Upstream, UpstreamId, UpstreamRef};

/// Advisory constraint for `sample()`.
///
/// When the filtered candidate set is empty the pool falls back to the full
/// snapshot instead of failing.
#[derive(Debug, Clone, Copy)]
pub enum Hint<'a> {
    /// Prefer the referenced upstream
    Same(UpstreamRef<'a>),
    /// Prefer anything except the referenced upstream
    Diff(UpstreamRef<'a>),
}

impl<'a> Hint<'a> {
    pub fn same(reference: impl Into<UpstreamRef<'a>>) -> Self {
        Self::Same(reference.into())
    }

    pub fn diff(reference: impl Into<UpstreamRef<'a>>) -> Self {
        Self::Diff(reference.into())
    }

    pub fn reference(&self) -> UpstreamId {
        match self {
            Self::Same(r) | Self::Diff(r) => r.id(),
        }
    }

    /// Whether a snapshot record satisfies the hint
    pub fn accepts(&self, upstream: &Upstream) -> bool {
        match self {
            Self::Same(r) => upstream.id == r.id(),
            Self::Diff(r) => upstream.id != r.id(),
        }
    }
}

/// Pool errors
#[derive(Debug, thiserror::Error)]
pub enum PoolError {
    #[error("No upstream available")]
    NoUpstreamAvailable,

    #[error("Unknown upstream: {0}")]
    UnknownUpstream(UpstreamId),

    #[error("Registry error: {0}")]
    Registry(#[from] RepositoryError),

    #[error("Invalid pool configuration: {0}")]
    Configuration(String),
}

/// Snapshot of a pool's configuration and adaptation state.
///
/// Diagnostic only; nothing in the pool reads it back.
#[derive(Debug, Clone, Serialize)]
pub struct PoolDiagnostics {
    pub upstream_type: String,
    pub policy: &'static str,
    pub options: crate::domain::pool_config::PoolOptions,
    /// Seconds until the snapshot goes stale, `None` if never synced or stale
    pub expires_in_secs: Option<f64>,
    pub upstreams: Vec<UpstreamDiagnostics>,
}

#[derive(Debug, Clone, Serialize)]
pub struct UpstreamDiagnostics {
    pub id: UpstreamId,
    pub host: String,
    pub base_weight: f64,
    pub selection_weight: f64,
    pub failures: u32,
    /// Seconds since last selection, `None` if never selected
    pub last_selected_secs_ago: Option<f64>,
    pub reuse_delay_secs: f64,
}
