// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0
//! # `upstream-pool-core` — Weighted Upstream Selection
//!
//! Picks one upstream per request from a registry-backed group, using
//! weighted random selection, per-upstream reuse spacing and live failure
//! feedback from callers.
//!
//! ## Crate Layout
//!
//! | Module | Layer | Contents |
//! |--------|-------|----------|
//! | [`domain`] | Domain | records, registry contract, failure policies, configuration |
//! | [`application`] | Application | `UpstreamPool` service |
//! | [`infrastructure`] | Infrastructure | `InMemoryUpstreamRepository` |
//!
//! All adaptation state is in memory and lives as long as the pool instance.

pub mod domain;
pub mod application;
pub mod infrastructure;

pub use domain::*;
pub use application::pool::UpstreamPool;
