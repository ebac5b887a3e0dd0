// Copyright 2026 Feedscout Contributors
// SPDX-License-Identifier: Apache-2.0

//! In-memory render context replaying captured HTML snapshots.
//!
//! Each registered URL maps to a list of snapshots of the same document as
//! more content loads. Navigation shows the first snapshot; every
//! `scrollIntoView` script reveals the next one, which is how infinite
//! scroll behaves in a real browser. Useful for offline replays of
//! captured pages and for exercising the crawler without Chromium.

use super::{NavigationResult, RenderContext, WaitPolicy};
use anyhow::{anyhow, Result};
use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard};

const BLANK_PAGE: &str = "<html><head></head><body></body></html>";

/// Everything the scripted context observed, shared with the test or
/// replay driver after the context has been boxed.
#[derive(Debug, Default, Clone)]
pub struct ScriptLog {
    /// URLs passed to `navigate`, in call order.
    pub navigations: Vec<String>,
    /// Scripts passed to `execute_js`, in call order.
    pub scripts: Vec<String>,
    /// Number of `wait_fixed` calls.
    pub fixed_waits: usize,
    /// Number of `wait_for_quiescence` calls.
    pub quiescence_waits: usize,
    /// Scroll scripts whose target was not found.
    pub missed_scrolls: usize,
}

#[derive(Debug, Default)]
struct ScriptState {
    current: Option<String>,
    stage: usize,
    html_reads: usize,
    log: ScriptLog,
}

/// Replays fixed snapshots instead of rendering.
#[derive(Debug, Default)]
pub struct ScriptedContext {
    pages: HashMap<String, Vec<String>>,
    fallback: Option<Vec<String>>,
    failing: Vec<String>,
    html_budget: Option<usize>,
    scripts_fail: bool,
    scroll_targets_lost: bool,
    state: Arc<Mutex<ScriptState>>,
}

impl ScriptedContext {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register the snapshots served for `url`.
    pub fn with_page(mut self, url: impl Into<String>, snapshots: Vec<String>) -> Self {
        self.pages.insert(url.into(), snapshots);
        self
    }

    /// Snapshots served for any URL without its own entry.
    pub fn with_fallback(mut self, snapshots: Vec<String>) -> Self {
        self.fallback = Some(snapshots);
        self
    }

    /// Make navigation to any URL starting with `prefix` fail.
    pub fn failing_on(mut self, prefix: impl Into<String>) -> Self {
        self.failing.push(prefix.into());
        self
    }

    /// Let `get_html` succeed `reads` times, then fail.
    pub fn failing_html_after(mut self, reads: usize) -> Self {
        self.html_budget = Some(reads);
        self
    }

    /// Make every `execute_js` call fail.
    pub fn failing_scripts(mut self) -> Self {
        self.scripts_fail = true;
        self
    }

    /// Scroll scripts find no target: they evaluate to `false` and reveal
    /// nothing, as when a virtualized feed unmounted the element.
    pub fn losing_scroll_targets(mut self) -> Self {
        self.scroll_targets_lost = true;
        self
    }

    /// Handle for inspecting calls after the context is handed off.
    pub fn log_handle(&self) -> ScriptLogHandle {
        ScriptLogHandle(Arc::clone(&self.state))
    }

    fn state(&self) -> MutexGuard<'_, ScriptState> {
        self.state.lock().unwrap_or_else(|e| e.into_inner())
    }

    fn snapshots(&self, url: &str) -> Option<&Vec<String>> {
        self.pages.get(url).or(self.fallback.as_ref())
    }
}

/// Shared read access to a [`ScriptedContext`]'s log.
#[derive(Debug, Clone)]
pub struct ScriptLogHandle(Arc<Mutex<ScriptState>>);

impl ScriptLogHandle {
    pub fn snapshot(&self) -> ScriptLog {
        self.0.lock().unwrap_or_else(|e| e.into_inner()).log.clone()
    }
}

#[async_trait]
impl RenderContext for ScriptedContext {
    async fn navigate(
        &mut self,
        url: &str,
        _policy: WaitPolicy,
        _timeout_ms: u64,
    ) -> Result<NavigationResult> {
        let mut state = self.state();
        state.log.navigations.push(url.to_string());

        if self.failing.iter().any(|prefix| url.starts_with(prefix)) {
            return Err(anyhow!("navigation to {url} failed: session unreachable"));
        }
        if self.snapshots(url).is_none() {
            return Err(anyhow!("navigation to {url} failed: no snapshot recorded"));
        }

        state.current = Some(url.to_string());
        state.stage = 0;

        Ok(NavigationResult {
            final_url: url.to_string(),
            settled: true,
            load_time_ms: 0,
        })
    }

    async fn execute_js(&self, script: &str) -> Result<serde_json::Value> {
        let mut state = self.state();
        state.log.scripts.push(script.to_string());

        if self.scripts_fail {
            return Err(anyhow!("script evaluation failed: session unreachable"));
        }
        if !script.contains("scrollIntoView") {
            return Ok(serde_json::Value::Null);
        }
        if self.scroll_targets_lost {
            state.log.missed_scrolls += 1;
            return Ok(serde_json::Value::Bool(false));
        }

        let last_stage = state
            .current
            .as_deref()
            .and_then(|url| self.snapshots(url))
            .map(|snapshots| snapshots.len().saturating_sub(1))
            .unwrap_or(0);
        state.stage = (state.stage + 1).min(last_stage);
        Ok(serde_json::Value::Bool(true))
    }

    async fn get_html(&self) -> Result<String> {
        let mut state = self.state();
        if self.html_budget.is_some_and(|budget| state.html_reads >= budget) {
            return Err(anyhow!("snapshot failed: session unreachable"));
        }
        state.html_reads += 1;
        let html = state
            .current
            .as_deref()
            .and_then(|url| self.snapshots(url))
            .and_then(|snapshots| snapshots.get(state.stage))
            .cloned()
            .unwrap_or_else(|| BLANK_PAGE.to_string());
        Ok(html)
    }

    async fn wait_fixed(&self, _duration_ms: u64) -> Result<()> {
        self.state().log.fixed_waits += 1;
        Ok(())
    }

    async fn wait_for_quiescence(&self, _timeout_ms: u64) -> Result<bool> {
        self.state().log.quiescence_waits += 1;
        Ok(true)
    }

    async fn close(self: Box<Self>) -> Result<()> {
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_scroll_reveals_next_snapshot_and_stops_at_last() {
        let mut ctx = ScriptedContext::new().with_page(
            "https://example.com/feed",
            vec!["<p>one</p>".to_string(), "<p>two</p>".to_string()],
        );
        ctx.navigate("https://example.com/feed", WaitPolicy::NetworkIdle, 1000)
            .await
            .unwrap();
        assert!(ctx.get_html().await.unwrap().contains("one"));

        ctx.execute_js("el.scrollIntoView()").await.unwrap();
        assert!(ctx.get_html().await.unwrap().contains("two"));

        ctx.execute_js("el.scrollIntoView()").await.unwrap();
        assert!(ctx.get_html().await.unwrap().contains("two"));
    }

    #[tokio::test]
    async fn test_unknown_and_failing_urls_error() {
        let mut ctx = ScriptedContext::new()
            .with_page("https://example.com/ok", vec![BLANK_PAGE.to_string()])
            .failing_on("https://example.com/down");
        let log = ctx.log_handle();

        assert!(ctx
            .navigate("https://example.com/missing", WaitPolicy::Load, 1000)
            .await
            .is_err());
        assert!(ctx
            .navigate("https://example.com/down/1", WaitPolicy::Load, 1000)
            .await
            .is_err());
        assert!(ctx
            .navigate("https://example.com/ok", WaitPolicy::Load, 1000)
            .await
            .is_ok());
        assert_eq!(log.snapshot().navigations.len(), 3);
    }

    #[tokio::test]
    async fn test_failure_hooks() {
        let mut ctx = ScriptedContext::new()
            .with_fallback(vec!["<p>one</p>".to_string()])
            .failing_html_after(1)
            .failing_scripts();
        ctx.navigate("https://example.com/feed", WaitPolicy::Load, 1000)
            .await
            .unwrap();

        assert!(ctx.get_html().await.is_ok());
        assert!(ctx.get_html().await.is_err());
        assert!(ctx.execute_js("el.scrollIntoView()").await.is_err());
    }
}
