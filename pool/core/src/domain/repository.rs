// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0
//! # Upstream Registry Interface
//!
//! Persistence contract for [`Upstream`] records, following the DDD Repository
//! pattern: the interface lives in the domain layer and is implemented in
//! `crate::infrastructure::repositories`.
//!
//! | Trait | Aggregate | Implementations |
//! |-------|-----------|----------------|
//! | `UpstreamRepository` | `Upstream` | `InMemoryUpstreamRepository` |
//!
//! The pool only ever calls [`UpstreamRepository::find_many`] with
//! `{ type = group, weight > 0 }`. The write operations exist for the
//! registry's own users (CLI seeding, tests, admin tooling).

use async_trait::async_trait;
use std::collections::BTreeMap;
use url::Url;
use crate::domain::upstream::{Upstream, UpstreamId, MIN_INTERVAL_SECS};

/// Filter for registry lookups. Unset fields match everything.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct UpstreamQuery {
    pub id: Option<UpstreamId>,
    pub upstream_type: Option<String>,
    /// Weight strictly greater than
    pub gt_weight: Option<f64>,
    /// Weight greater than or equal to
    pub gte_weight: Option<f64>,
}

impl UpstreamQuery {
    pub fn by_id(id: UpstreamId) -> Self {
        Self {
            id: Some(id),
            ..Self::default()
        }
    }

    pub fn by_type(upstream_type: impl Into<String>) -> Self {
        Self {
            upstream_type: Some(upstream_type.into()),
            ..Self::default()
        }
    }

    pub fn gt_weight(mut self, weight: f64) -> Self {
        self.gt_weight = Some(weight);
        self
    }

    pub fn gte_weight(mut self, weight: f64) -> Self {
        self.gte_weight = Some(weight);
        self
    }

    /// Check a record against every set field
    pub fn matches(&self, upstream: &Upstream) -> bool {
        if self.id.is_some_and(|id| id != upstream.id) {
            return false;
        }
        if self
            .upstream_type
            .as_deref()
            .is_some_and(|t| t != upstream.upstream_type)
        {
            return false;
        }
        if self.gt_weight.is_some_and(|w| upstream.weight <= w) {
            return false;
        }
        if self.gte_weight.is_some_and(|w| upstream.weight < w) {
            return false;
        }
        true
    }
}

/// Values for a new registry record
#[derive(Debug, Clone, Default, serde::Serialize, serde::Deserialize)]
pub struct NewUpstream {
    #[serde(default)]
    pub id: Option<UpstreamId>,
    #[serde(rename = "type")]
    pub upstream_type: String,
    pub host: String,
    #[serde(default)]
    pub path: Option<String>,
    #[serde(default)]
    pub headers: BTreeMap<String, String>,
    #[serde(default)]
    pub query: BTreeMap<String, String>,
    #[serde(default)]
    pub auth: BTreeMap<String, String>,
    #[serde(default)]
    pub interval: Option<f64>,
    #[serde(default)]
    pub weight: Option<f64>,
}

impl NewUpstream {
    pub fn validate(&self) -> Result<(), RepositoryError> {
        validate_host(&self.host)?;
        validate_interval(self.interval)?;
        validate_weight(self.weight)?;
        Ok(())
    }
}

/// Partial update. `Some(None)` on an optional field clears it back to its
/// default.
#[derive(Debug, Clone, Default)]
pub struct UpstreamPatch {
    pub upstream_type: Option<String>,
    pub host: Option<String>,
    pub path: Option<Option<String>>,
    pub headers: Option<BTreeMap<String, String>>,
    pub query: Option<BTreeMap<String, String>>,
    pub auth: Option<BTreeMap<String, String>>,
    pub interval: Option<Option<f64>>,
    pub weight: Option<Option<f64>>,
}

impl UpstreamPatch {
    pub fn validate(&self) -> Result<(), RepositoryError> {
        if let Some(host) = &self.host {
            validate_host(host)?;
        }
        validate_interval(self.interval.flatten())?;
        validate_weight(self.weight.flatten())?;
        Ok(())
    }

    /// Apply this patch to a record in place
    pub fn apply(self, upstream: &mut Upstream) {
        if let Some(t) = self.upstream_type {
            upstream.upstream_type = t;
        }
        if let Some(host) = self.host {
            upstream.host = host;
        }
        if let Some(path) = self.path {
            upstream.path = path;
        }
        if let Some(headers) = self.headers {
            upstream.headers = headers;
        }
        if let Some(query) = self.query {
            upstream.query = query;
        }
        if let Some(auth) = self.auth {
            upstream.auth = auth;
        }
        if let Some(interval) = self.interval {
            upstream.interval = interval.unwrap_or(MIN_INTERVAL_SECS);
        }
        if let Some(weight) = self.weight {
            upstream.weight = weight.unwrap_or(0.0);
        }
    }
}

fn validate_host(host: &str) -> Result<(), RepositoryError> {
    Url::parse(host)
        .map(|_| ())
        .map_err(|e| RepositoryError::Validation(format!("invalid host '{}': {}", host, e)))
}

fn validate_interval(interval: Option<f64>) -> Result<(), RepositoryError> {
    match interval {
        Some(i) if !(i >= MIN_INTERVAL_SECS && i.is_finite()) => {
            Err(RepositoryError::Validation(format!(
                "interval must be a finite number >= {}, got {}",
                MIN_INTERVAL_SECS, i
            )))
        }
        _ => Ok(()),
    }
}

fn validate_weight(weight: Option<f64>) -> Result<(), RepositoryError> {
    match weight {
        Some(w) if !(w >= 0.0 && w.is_finite()) => Err(RepositoryError::Validation(format!(
            "weight must be a finite number >= 0, got {}",
            w
        ))),
        _ => Ok(()),
    }
}

/// Repository interface for Upstream records
#[async_trait]
pub trait UpstreamRepository: Send + Sync {
    /// All records matching the query
    async fn find_many(&self, query: &UpstreamQuery) -> Result<Vec<Upstream>, RepositoryError>;

    /// First record matching the query
    async fn find_one(&self, query: &UpstreamQuery) -> Result<Option<Upstream>, RepositoryError>;

    /// Validate and store a new record
    async fn insert(&self, values: NewUpstream) -> Result<Upstream, RepositoryError>;

    /// Validate and apply a partial update
    async fn update(&self, id: UpstreamId, patch: UpstreamPatch) -> Result<Upstream, RepositoryError>;

    /// Delete every record matching the query, returning how many were removed
    async fn delete_many(&self, query: &UpstreamQuery) -> Result<usize, RepositoryError>;
}

/// Repository errors
#[derive(Debug, thiserror::Error)]
pub enum RepositoryError {
    #[error("Entity not found: {0}")]
    NotFound(String),

    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Backend error: {0}")]
    Backend(String),
}
