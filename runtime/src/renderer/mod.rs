// Copyright 2026 Feedscout Contributors
// SPDX-License-Identifier: Apache-2.0

//! Renderer abstraction for browser-based page rendering.
//!
//! Defines the `Renderer` and `RenderContext` traits that abstract over
//! the browser engine (Chromium via chromiumoxide, or a scripted replay of
//! captured snapshots).

pub mod chromium;
pub mod scripted;

use anyhow::Result;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Result of navigating to a URL.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NavigationResult {
    /// The final URL after any redirects.
    pub final_url: String,
    /// Whether the readiness policy was satisfied before the deadline.
    pub settled: bool,
    /// Time taken to load the page in milliseconds.
    pub load_time_ms: u64,
}

/// When `navigate` is allowed to return.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WaitPolicy {
    /// Return once the document load event fired.
    Load,
    /// Additionally wait until no network requests are in flight.
    #[default]
    NetworkIdle,
}

/// A browser engine that can create rendering contexts.
#[async_trait]
pub trait Renderer: Send + Sync {
    /// Create a new browser context (tab).
    async fn new_context(&self) -> Result<Box<dyn RenderContext>>;
    /// Shut down the browser engine.
    async fn shutdown(&self) -> Result<()>;
    /// Number of currently active contexts.
    fn active_contexts(&self) -> usize;
}

/// A single browser context (tab) for rendering pages.
#[async_trait]
pub trait RenderContext: Send + Sync {
    /// Navigate to a URL and wait for `policy`, bounded by `timeout_ms`.
    async fn navigate(
        &mut self,
        url: &str,
        policy: WaitPolicy,
        timeout_ms: u64,
    ) -> Result<NavigationResult>;
    /// Execute JavaScript in the page context and return the result.
    async fn execute_js(&self, script: &str) -> Result<serde_json::Value>;
    /// Get the full page HTML as currently rendered.
    async fn get_html(&self) -> Result<String>;
    /// Suspend for a fixed duration.
    async fn wait_fixed(&self, duration_ms: u64) -> Result<()> {
        tokio::time::sleep(Duration::from_millis(duration_ms)).await;
        Ok(())
    }
    /// Wait until the network goes quiet.
    ///
    /// Returns `Ok(false)` when `timeout_ms` elapsed first. A timeout is not
    /// an error: callers proceed with whatever content has arrived.
    async fn wait_for_quiescence(&self, timeout_ms: u64) -> Result<bool>;
    /// Close this context.
    async fn close(self: Box<Self>) -> Result<()>;
}
