// Copyright 2026 Feedscout Contributors
// SPDX-License-Identifier: Apache-2.0

//! Core data types shared by the extractor, crawler and orchestrator.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use url::Url;

/// Marker name used when the caller does not pick one.
pub const DEFAULT_MARKER_KEY: &str = "data-crawled";

/// A post extracted from a rendered feed. Immutable once produced.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PostRecord {
    /// Permalink of the post.
    pub url: String,
    /// Text body.
    pub content: String,
    /// When the post was published.
    pub created: DateTime<Utc>,
}

/// Knobs for one pagination crawl.
#[derive(Debug, Clone, PartialEq)]
pub struct CrawlOptions {
    /// Name of the seen marker; crawls sharing a name share dedup state.
    pub dedup_marker_key: String,
    /// Scroll for more content after each batch.
    pub paginate: bool,
    /// Upper bound on waiting for network quiescence after a scroll.
    pub next_page_timeout_ms: u64,
    /// Fixed pause after a scroll before waiting for quiescence.
    pub next_page_pause_ms: u64,
    /// Base URL used to resolve relative permalinks.
    pub base_url: Option<Url>,
}

impl Default for CrawlOptions {
    fn default() -> Self {
        Self {
            dedup_marker_key: DEFAULT_MARKER_KEY.to_string(),
            paginate: true,
            next_page_timeout_ms: 10_000,
            next_page_pause_ms: 500,
            base_url: None,
        }
    }
}

/// Field-by-field overrides for [`CrawlOptions`]; `None` keeps the base value.
#[derive(Debug, Clone, Default)]
pub struct CrawlOverrides {
    pub dedup_marker_key: Option<String>,
    pub paginate: Option<bool>,
    pub next_page_timeout_ms: Option<u64>,
    pub next_page_pause_ms: Option<u64>,
    pub base_url: Option<Url>,
}

impl CrawlOptions {
    /// Shallow merge: every field set in `overrides` replaces ours.
    pub fn merge(self, overrides: CrawlOverrides) -> Self {
        Self {
            dedup_marker_key: overrides.dedup_marker_key.unwrap_or(self.dedup_marker_key),
            paginate: overrides.paginate.unwrap_or(self.paginate),
            next_page_timeout_ms: overrides
                .next_page_timeout_ms
                .unwrap_or(self.next_page_timeout_ms),
            next_page_pause_ms: overrides
                .next_page_pause_ms
                .unwrap_or(self.next_page_pause_ms),
            base_url: overrides.base_url.or(self.base_url),
        }
    }
}
