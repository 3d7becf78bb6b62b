// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0
//! # Upstream Records
//!
//! An [`Upstream`] is a selectable network target owned by the registry.
//! The pool never mutates records; it only reads them into its snapshot and
//! keys its own adaptation state by [`UpstreamId`].
//!
//! Callers may refer to an upstream either by the full record or by its bare
//! identifier ([`UpstreamRef`]). Both resolve to the same key.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use url::Url;
use uuid::Uuid;

/// Smallest reuse interval a record may carry, in seconds.
pub const MIN_INTERVAL_SECS: f64 = 0.001;

/// Unique identifier for an upstream record
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct UpstreamId(pub Uuid);

impl UpstreamId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }

    pub fn from_string(s: &str) -> Result<Self, uuid::Error> {
        Ok(Self(Uuid::parse_str(s)?))
    }
}

impl Default for UpstreamId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for UpstreamId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl std::str::FromStr for UpstreamId {
    type Err = uuid::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::from_string(s)
    }
}

/// A selectable upstream target.
///
/// `weight` is the base selection mass and `interval` the minimum number of
/// seconds between two selections of this record.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Upstream {
    pub id: UpstreamId,

    /// Group key. A pool serves exactly one group.
    #[serde(rename = "type")]
    pub upstream_type: String,

    /// Base URL, e.g. `https://api.example.com/v1`
    pub host: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub path: Option<String>,

    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub headers: BTreeMap<String, String>,

    /// Query parameters appended to every link
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub query: BTreeMap<String, String>,

    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub auth: BTreeMap<String, String>,

    #[serde(default = "default_interval")]
    pub interval: f64,

    #[serde(default)]
    pub weight: f64,

    pub created_at: DateTime<Utc>,
}

/// Overrides applied when building a link for an [`Upstream`]
#[derive(Debug, Clone, Default)]
pub struct UrlOptions {
    pub path: Option<String>,
    pub query: BTreeMap<String, String>,
}

impl UrlOptions {
    pub fn with_path(mut self, path: impl Into<String>) -> Self {
        self.path = Some(path.into());
        self
    }

    pub fn with_query(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.query.insert(key.into(), value.into());
        self
    }
}

impl Upstream {
    /// Build the target URL.
    ///
    /// The option path replaces the record path. Query parameters from the
    /// record and the options are merged and emitted in key order.
    pub fn url(&self, options: &UrlOptions) -> Result<Url, url::ParseError> {
        let mut url = Url::parse(&self.host)?;

        if let Some(path) = options.path.as_deref().or(self.path.as_deref()) {
            let mut joined = url.path().to_string();
            if !joined.ends_with('/') {
                joined.push('/');
            }
            joined.push_str(path);
            url.set_path(&joined);
        }

        // Option params override record params of the same name.
        let mut query = self.query.clone();
        query.extend(options.query.clone());
        if !query.is_empty() {
            let mut pairs = url.query_pairs_mut();
            for (k, v) in &query {
                pairs.append_pair(k, v);
            }
        }

        Ok(url)
    }

    pub fn link(&self, options: &UrlOptions) -> Result<String, url::ParseError> {
        Ok(self.url(options)?.to_string())
    }
}

fn default_interval() -> f64 {
    MIN_INTERVAL_SECS
}

/// Reference to an upstream, either by identifier or by full record.
#[derive(Debug, Clone, Copy)]
pub enum UpstreamRef<'a> {
    Id(UpstreamId),
    Record(&'a Upstream),
}

impl UpstreamRef<'_> {
    /// Canonical adaptation-state key
    pub fn id(&self) -> UpstreamId {
        match self {
            Self::Id(id) => *id,
            Self::Record(upstream) => upstream.id,
        }
    }
}

impl From<UpstreamId> for UpstreamRef<'_> {
    fn from(id: UpstreamId) -> Self {
        Self::Id(id)
    }
}

impl<'a> From<&'a Upstream> for UpstreamRef<'a> {
    fn from(upstream: &'a Upstream) -> Self {
        Self::Record(upstream)
    }
}
