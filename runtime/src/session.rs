// Copyright 2026 Feedscout Contributors
// SPDX-License-Identifier: Apache-2.0

//! Rendering session: one browser context plus the dedup state scoped to
//! the document it currently shows.
//!
//! Seen markers live here rather than on the rendered elements. They are
//! keyed by marker name so independent crawls over one document do not
//! share markers, and they are dropped on every navigation so a freshly
//! loaded document always starts with an empty set.

use crate::renderer::{NavigationResult, RenderContext, WaitPolicy};
use anyhow::{Context, Result};
use std::collections::{HashMap, HashSet};
use std::time::Duration;
use tracing::debug;

/// Structural identity of a post-bearing element.
pub type Fingerprint = u64;

/// Default bound on a single navigation.
pub const DEFAULT_NAVIGATION_TIMEOUT: Duration = Duration::from_secs(30);

/// Per-document sets of already-extracted element fingerprints.
#[derive(Debug, Default)]
pub struct SeenRegistry {
    markers: HashMap<String, HashSet<Fingerprint>>,
}

impl SeenRegistry {
    /// Mark an element as seen under `marker`. Returns `false` if it
    /// already carried the marker.
    pub fn mark(&mut self, marker: &str, fingerprint: Fingerprint) -> bool {
        self.markers
            .entry(marker.to_string())
            .or_default()
            .insert(fingerprint)
    }

    pub fn is_seen(&self, marker: &str, fingerprint: Fingerprint) -> bool {
        self.markers
            .get(marker)
            .is_some_and(|set| set.contains(&fingerprint))
    }

    /// Number of elements carrying `marker`.
    pub fn len(&self, marker: &str) -> usize {
        self.markers.get(marker).map_or(0, HashSet::len)
    }

    pub fn is_empty(&self) -> bool {
        self.markers.values().all(HashSet::is_empty)
    }

    /// Forget every marker; called whenever the document is replaced.
    pub fn clear(&mut self) {
        self.markers.clear();
    }
}

/// A rendering session driven by exactly one logical thread of control.
pub struct Session {
    /// Unique session identifier.
    pub id: String,
    /// The browser context.
    context: Box<dyn RenderContext>,
    seen: SeenRegistry,
    navigation_timeout: Duration,
    navigations: usize,
}

impl Session {
    /// Create a new session with a browser context.
    pub fn new(id: impl Into<String>, context: Box<dyn RenderContext>) -> Self {
        Self {
            id: id.into(),
            context,
            seen: SeenRegistry::default(),
            navigation_timeout: DEFAULT_NAVIGATION_TIMEOUT,
            navigations: 0,
        }
    }

    pub fn with_navigation_timeout(mut self, timeout: Duration) -> Self {
        self.navigation_timeout = timeout;
        self
    }

    /// Load `url`, replacing the current document and its seen markers.
    pub async fn navigate(&mut self, url: &str, policy: WaitPolicy) -> Result<NavigationResult> {
        self.seen.clear();
        self.navigations += 1;

        let result = self
            .context
            .navigate(url, policy, self.navigation_timeout.as_millis() as u64)
            .await
            .with_context(|| format!("session {} could not load {url}", self.id))?;

        debug!(
            session = %self.id,
            url = %result.final_url,
            settled = result.settled,
            load_time_ms = result.load_time_ms,
            "navigated"
        );
        Ok(result)
    }

    /// The browser context for this session.
    pub fn context(&self) -> &dyn RenderContext {
        self.context.as_ref()
    }

    pub fn seen(&self) -> &SeenRegistry {
        &self.seen
    }

    pub(crate) fn seen_mut(&mut self) -> &mut SeenRegistry {
        &mut self.seen
    }

    /// Number of navigations issued so far.
    pub fn navigations(&self) -> usize {
        self.navigations
    }

    /// Close the session and release the browser context.
    pub async fn close(self) -> Result<()> {
        self.context.close().await
    }
}
