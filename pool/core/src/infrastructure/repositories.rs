// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

//! Repository Implementations
//!
//! Infrastructure implementations of the upstream registry contract defined
//! in the domain layer.
//!
//! # Architecture
//!
//! - **Layer:** Infrastructure
//! - **Purpose:** Store and query upstream records
//! - **Pattern:** Repository (DDD), Adapter (Hexagonal Architecture)
//!
//! # Available Implementations
//!
//! - **InMemoryUpstreamRepository** - Thread-safe, insertion-ordered storage
//!   for development, the CLI and tests. Clones share the same records, so one
//!   instance can back several pools.

use std::sync::Arc;
use async_trait::async_trait;
use chrono::Utc;
use parking_lot::RwLock;
use tracing::debug;
use crate::domain::repository::{
    NewUpstream, RepositoryError, UpstreamPatch, UpstreamQuery, UpstreamRepository,
};
use crate::domain::upstream::{Upstream, UpstreamId, MIN_INTERVAL_SECS};

#[derive(Clone, Default)]
pub struct InMemoryUpstreamRepository {
    upstreams: Arc<RwLock<Vec<Upstream>>>,
}

impl InMemoryUpstreamRepository {
    pub fn new() -> Self {
        Self::default()
    }

    /// Seed a repository, failing on the first invalid record
    pub async fn with_upstreams(
        values: impl IntoIterator<Item = NewUpstream>,
    ) -> Result<Self, RepositoryError> {
        let repository = Self::new();
        for value in values {
            repository.insert(value).await?;
        }
        Ok(repository)
    }

    pub fn len(&self) -> usize {
        self.upstreams.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.upstreams.read().is_empty()
    }
}

#[async_trait]
impl UpstreamRepository for InMemoryUpstreamRepository {
    async fn find_many(&self, query: &UpstreamQuery) -> Result<Vec<Upstream>, RepositoryError> {
        let upstreams = self.upstreams.read();
        Ok(upstreams.iter().filter(|u| query.matches(u)).cloned().collect())
    }

    async fn find_one(&self, query: &UpstreamQuery) -> Result<Option<Upstream>, RepositoryError> {
        let upstreams = self.upstreams.read();
        Ok(upstreams.iter().find(|u| query.matches(u)).cloned())
    }

    async fn insert(&self, values: NewUpstream) -> Result<Upstream, RepositoryError> {
        values.validate()?;

        let id = values.id.unwrap_or_default();
        let upstream = Upstream {
            id,
            upstream_type: values.upstream_type,
            host: values.host,
            path: values.path,
            headers: values.headers,
            query: values.query,
            auth: values.auth,
            interval: values.interval.unwrap_or(MIN_INTERVAL_SECS),
            weight: values.weight.unwrap_or(0.0),
            created_at: Utc::now(),
        };

        let mut upstreams = self.upstreams.write();
        if upstreams.iter().any(|u| u.id == id) {
            return Err(RepositoryError::Validation(format!("Duplicate upstream id: {}", id)));
        }
        upstreams.push(upstream.clone());
        debug!("Inserted upstream {} ({})", upstream.id, upstream.upstream_type);
        Ok(upstream)
    }

    async fn update(&self, id: UpstreamId, patch: UpstreamPatch) -> Result<Upstream, RepositoryError> {
        patch.validate()?;

        let mut upstreams = self.upstreams.write();
        let upstream = upstreams
            .iter_mut()
            .find(|u| u.id == id)
            .ok_or_else(|| RepositoryError::NotFound(format!("Upstream {}", id)))?;
        patch.apply(upstream);
        Ok(upstream.clone())
    }

    async fn delete_many(&self, query: &UpstreamQuery) -> Result<usize, RepositoryError> {
        let mut upstreams = self.upstreams.write();
        let before = upstreams.len();
        upstreams.retain(|u| !query.matches(u));
        Ok(before - upstreams.len())
    }
}
