// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0
//! # Upstream Pool Domain Layer
//!
//! Pure domain types for upstream selection. No I/O dependencies.
//!
//! | Module | Key Types |
//! |--------|-----------|
//! | [`upstream`] | `Upstream`, `UpstreamId`, `UpstreamRef` |
//! | [`repository`] | `UpstreamRepository`, `UpstreamQuery`, `RepositoryError` |
//! | [`policy`] | `FailurePolicy`, `CooldownPolicy`, `DecayPolicy`, `AdaptationState` |
//! | [`pool`] | `Hint`, `PoolError`, `PoolDiagnostics` |
//! | [`pool_config`] | `PoolOptions`, `PolicyOptions`, `PoolConfigManifest` |

pub mod upstream;
pub mod repository;
pub mod policy;
pub mod pool;
pub mod pool_config;
