// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0
//! Infrastructure
//!
//! Adapters implementing domain interfaces.
//!
//! # Architecture
//!
//! - **Layer:** Infrastructure
//! - **Purpose:** Registry implementations

pub mod repositories;
