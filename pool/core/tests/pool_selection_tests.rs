// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

//! Selection behaviour of `UpstreamPool`:
//! - weighted distribution over repeated samples
//! - `Same` / `Diff` hints and their fallback to the full snapshot
//! - feedback resolution against the snapshot
//! - error propagation from the registry

mod common;

use common::{insert_upstreams, InstrumentedRepository, TYPE};
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use tokio::time::Instant;
use tokio_test::{assert_err, assert_ok};
use upstream_pool_core::domain::pool::{Hint, PoolError};
use upstream_pool_core::domain::pool_config::{PolicyOptions, PoolOptions};
use upstream_pool_core::domain::repository::{RepositoryError, UpstreamRepository};
use upstream_pool_core::domain::upstream::UpstreamId;
use upstream_pool_core::UpstreamPool;

fn pool(repo: Arc<InstrumentedRepository>, options: PoolOptions) -> UpstreamPool {
    UpstreamPool::new(repo, TYPE, options).unwrap().with_seed(42)
}

#[tokio::test(start_paused = true)]
async fn test_hit_rate_follows_weights() {
    let repo = InstrumentedRepository::new();
    let mut expected = HashMap::new();
    for weight in [1.0, 2.0, 3.0, 4.0] {
        let upstream = repo.insert(common::new_upstream(weight)).await.unwrap();
        expected.insert(upstream.id, weight / 10.0);
    }
    let pool = pool(repo, PoolOptions::default());

    let trials = 10_000;
    let mut hits: HashMap<UpstreamId, usize> = HashMap::new();
    for _ in 0..trials {
        let upstream = pool.sample(None).await.unwrap();
        *hits.entry(upstream.id).or_default() += 1;
    }

    // Chi-squared with 3 degrees of freedom; 25 is far past the 0.1% tail.
    let chi2: f64 = expected
        .iter()
        .map(|(id, p)| {
            let e = p * trials as f64;
            let o = *hits.get(id).unwrap_or(&0) as f64;
            (o - e).powi(2) / e
        })
        .sum();
    assert!(chi2 < 25.0, "chi2 = {}, hits = {:?}", chi2, hits);
}

#[tokio::test(start_paused = true)]
async fn test_same_hint_returns_reference() {
    let repo = InstrumentedRepository::new();
    insert_upstreams(repo.as_ref(), 1.0, 10).await;
    let pool = pool(repo, PoolOptions::default().with_ttl(10.0));

    let upstream = pool.sample(None).await.unwrap();
    for _ in 0..20 {
        let sampled = pool.sample(Some(Hint::same(&upstream))).await.unwrap();
        assert_eq!(sampled.id, upstream.id);
    }
}

#[tokio::test(start_paused = true)]
async fn test_same_hint_without_match_falls_back() {
    let repo = InstrumentedRepository::new();
    let inserted = insert_upstreams(repo.as_ref(), 1.0, 1).await;
    let pool = pool(repo, PoolOptions::default().with_ttl(10.0));

    let stranger = UpstreamId::new();
    for _ in 0..20 {
        let upstream = pool.sample(Some(Hint::same(stranger))).await.unwrap();
        assert_ne!(upstream.id, stranger);
        assert_eq!(upstream.id, inserted[0].id);
    }
}

#[tokio::test(start_paused = true)]
async fn test_diff_hint_excludes_reference() {
    let repo = InstrumentedRepository::new();
    insert_upstreams(repo.as_ref(), 1.0, 2).await;
    let pool = pool(repo, PoolOptions::default().with_ttl(10.0));

    let upstream = pool.sample(None).await.unwrap();
    for _ in 0..20 {
        let sampled = pool.sample(Some(Hint::diff(upstream.id))).await.unwrap();
        assert_ne!(sampled.id, upstream.id);
    }
}

#[tokio::test(start_paused = true)]
async fn test_diff_hint_with_single_upstream_falls_back() {
    let repo = InstrumentedRepository::new();
    insert_upstreams(repo.as_ref(), 1.0, 1).await;
    let pool = pool(repo, PoolOptions::default().with_ttl(10.0));

    let upstream = pool.sample(None).await.unwrap();
    for _ in 0..20 {
        let sampled = pool.sample(Some(Hint::diff(&upstream))).await.unwrap();
        assert_eq!(sampled.id, upstream.id);
    }
}

#[tokio::test]
async fn test_zero_weight_group_has_no_upstream() {
    let repo = InstrumentedRepository::new();
    insert_upstreams(repo.as_ref(), 0.0, 3).await;
    let pool = pool(repo, PoolOptions::default());

    let err = pool.sample(None).await.unwrap_err();
    assert!(matches!(err, PoolError::NoUpstreamAvailable));
    // A hint never turns an empty group into a success.
    let err = pool.sample(Some(Hint::same(UpstreamId::new()))).await.unwrap_err();
    assert!(matches!(err, PoolError::NoUpstreamAvailable));
}

#[tokio::test]
async fn test_feedback_on_unknown_upstream_fails() {
    let repo = InstrumentedRepository::new();
    insert_upstreams(repo.as_ref(), 1.0, 1).await;
    let pool = pool(repo, PoolOptions::default());
    pool.sample(None).await.unwrap();

    let stranger = UpstreamId::new();
    assert!(matches!(pool.fail(stranger), Err(PoolError::UnknownUpstream(id)) if id == stranger));
    assert!(matches!(pool.succeed(stranger), Err(PoolError::UnknownUpstream(_))));
}

#[tokio::test]
async fn test_feedback_before_first_sample_is_unknown() {
    let repo = InstrumentedRepository::new();
    let inserted = insert_upstreams(repo.as_ref(), 1.0, 1).await;
    let pool = pool(repo, PoolOptions::default());

    // Nothing has been cached yet.
    assert_err!(pool.fail(&inserted[0]));
}

#[tokio::test]
async fn test_failures_count_monotonically() {
    let repo = InstrumentedRepository::new();
    insert_upstreams(repo.as_ref(), 1.0, 1).await;
    let pool = pool(repo, PoolOptions::default().with_min_failures(3));
    let upstream = pool.sample(None).await.unwrap();

    for n in 1..=7 {
        assert_ok!(pool.fail(&upstream));
        assert_eq!(pool.failure_count(&upstream), n);
    }
    // Id and record references address the same entry.
    assert_eq!(pool.failure_count(upstream.id), 7);
}

#[tokio::test]
async fn test_succeed_is_idempotent() {
    for policy in [PolicyOptions::default(), PolicyOptions::decay()] {
        let repo = InstrumentedRepository::new();
        insert_upstreams(repo.as_ref(), 2.0, 1).await;
        let pool = pool(repo, PoolOptions::default().with_min_failures(1).with_policy(policy));
        let upstream = pool.sample(None).await.unwrap();

        for _ in 0..3 {
            pool.fail(&upstream).unwrap();
        }
        pool.succeed(&upstream).unwrap();
        let once = pool.debug();
        pool.succeed(upstream.id).unwrap();
        let twice = pool.debug();

        assert_eq!(once.upstreams[0].failures, 0);
        assert_eq!(once.upstreams[0].selection_weight, 2.0);
        assert_eq!(once.upstreams[0].failures, twice.upstreams[0].failures);
        assert_eq!(once.upstreams[0].selection_weight, twice.upstreams[0].selection_weight);
        assert_eq!(once.upstreams[0].reuse_delay_secs, twice.upstreams[0].reuse_delay_secs);
    }
}

#[tokio::test(start_paused = true)]
async fn test_registry_error_propagates_and_keeps_snapshot() {
    let repo = InstrumentedRepository::new();
    let inserted = insert_upstreams(repo.as_ref(), 1.0, 1).await;
    let pool = pool(repo.clone(), PoolOptions::default().with_ttl(5.0));
    pool.sample(None).await.unwrap();

    tokio::time::advance(Duration::from_secs(6)).await;
    repo.set_failing(true);
    let err = pool.sample(None).await.unwrap_err();
    assert!(matches!(err, PoolError::Registry(RepositoryError::Backend(_))));

    // The previous snapshot still resolves feedback.
    assert_ok!(pool.succeed(&inserted[0]));
    assert_eq!(pool.snapshot().len(), 1);

    // No implicit retry: each call issues exactly one fetch.
    assert_eq!(repo.calls(), 2);
    repo.set_failing(false);
    assert_eq!(pool.sample(None).await.unwrap().id, inserted[0].id);
    assert_eq!(repo.calls(), 3);
}

#[tokio::test(start_paused = true)]
async fn test_concurrent_samples_share_stale_wait() {
    let repo = InstrumentedRepository::new();
    let mut values = common::new_upstream(1.0);
    values.interval = Some(10.0);
    repo.insert(values).await.unwrap();
    let pool = pool(repo, PoolOptions::default());

    pool.sample(None).await.unwrap();
    let start = Instant::now();
    let (a, b) = tokio::join!(
        async {
            pool.sample(None).await.unwrap();
            start.elapsed()
        },
        async {
            pool.sample(None).await.unwrap();
            start.elapsed()
        }
    );

    // Both read the same last selection time and resume together.
    for elapsed in [a, b] {
        assert!(elapsed >= Duration::from_secs(10), "{:?}", elapsed);
        assert!(elapsed < Duration::from_millis(10_050), "{:?}", elapsed);
    }
}

#[tokio::test]
async fn test_debug_dump_reports_state() {
    let repo = InstrumentedRepository::new();
    insert_upstreams(repo.as_ref(), 1.0, 2).await;
    let pool = pool(repo, PoolOptions::default().with_ttl(30.0));

    let empty = pool.debug();
    assert!(empty.upstreams.is_empty());
    assert_eq!(empty.expires_in_secs, None);

    let upstream = pool.sample(None).await.unwrap();
    pool.fail(&upstream).unwrap();

    let dump = pool.debug();
    assert_eq!(dump.upstream_type, TYPE);
    assert_eq!(dump.policy, "cooldown");
    assert_eq!(dump.upstreams.len(), 2);
    assert!(dump.expires_in_secs.is_some());
    let row = dump.upstreams.iter().find(|u| u.id == upstream.id).unwrap();
    assert_eq!(row.failures, 1);
    assert!(row.last_selected_secs_ago.is_some());

    let json = serde_json::to_value(&dump).unwrap();
    assert_eq!(json["policy"], "cooldown");
}
