// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

//! Shared fixtures for pool integration tests.

#![allow(dead_code)]

use async_trait::async_trait;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;
use upstream_pool_core::domain::repository::{
    NewUpstream, RepositoryError, UpstreamPatch, UpstreamQuery, UpstreamRepository,
};
use upstream_pool_core::domain::upstream::{Upstream, UpstreamId};
use upstream_pool_core::infrastructure::repositories::InMemoryUpstreamRepository;

pub const TYPE: &str = "search";

/// In-memory registry that counts reads and can be told to fail them
#[derive(Default)]
pub struct InstrumentedRepository {
    pub inner: InMemoryUpstreamRepository,
    pub find_many_calls: AtomicUsize,
    pub failing: AtomicBool,
}

impl InstrumentedRepository {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn calls(&self) -> usize {
        self.find_many_calls.load(Ordering::SeqCst)
    }

    pub fn set_failing(&self, failing: bool) {
        self.failing.store(failing, Ordering::SeqCst);
    }
}

#[async_trait]
impl UpstreamRepository for InstrumentedRepository {
    async fn find_many(&self, query: &UpstreamQuery) -> Result<Vec<Upstream>, RepositoryError> {
        self.find_many_calls.fetch_add(1, Ordering::SeqCst);
        if self.failing.load(Ordering::SeqCst) {
            return Err(RepositoryError::Backend("registry unreachable".to_string()));
        }
        self.inner.find_many(query).await
    }

    async fn find_one(&self, query: &UpstreamQuery) -> Result<Option<Upstream>, RepositoryError> {
        self.inner.find_one(query).await
    }

    async fn insert(&self, values: NewUpstream) -> Result<Upstream, RepositoryError> {
        self.inner.insert(values).await
    }

    async fn update(&self, id: UpstreamId, patch: UpstreamPatch) -> Result<Upstream, RepositoryError> {
        self.inner.update(id, patch).await
    }

    async fn delete_many(&self, query: &UpstreamQuery) -> Result<usize, RepositoryError> {
        self.inner.delete_many(query).await
    }
}

pub fn new_upstream(weight: f64) -> NewUpstream {
    NewUpstream {
        upstream_type: TYPE.to_string(),
        host: "https://upstream.example.com".to_string(),
        weight: Some(weight),
        ..NewUpstream::default()
    }
}

pub async fn insert_upstreams(repo: &dyn UpstreamRepository, weight: f64, n: usize) -> Vec<Upstream> {
    let mut inserted = Vec::with_capacity(n);
    for _ in 0..n {
        inserted.push(repo.insert(new_upstream(weight)).await.unwrap());
    }
    inserted
}
