// Copyright 2026 Feedscout Contributors
// SPDX-License-Identifier: Apache-2.0

//! Chromium-based renderer using chromiumoxide.
//!
//! Network quiescence is derived from CDP network events: a page is idle
//! once no request has been in flight for [`IDLE_WINDOW`].

use super::{NavigationResult, RenderContext, Renderer, WaitPolicy};
use anyhow::{bail, Context, Result};
use async_trait::async_trait;
use chromiumoxide::browser::{Browser, BrowserConfig};
use chromiumoxide::cdp::browser_protocol::network::{
    EnableParams, EventLoadingFailed, EventLoadingFinished, EventRequestWillBeSent,
};
use chromiumoxide::page::Page;
use futures::StreamExt;
use std::collections::HashSet;
use std::path::PathBuf;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};
use tokio::task::JoinHandle;
use tracing::debug;

/// How long the network must stay silent to count as quiescent.
const IDLE_WINDOW: Duration = Duration::from_millis(500);

const POLL_INTERVAL: Duration = Duration::from_millis(50);

/// Find the Chromium binary path.
pub fn find_chromium() -> Option<PathBuf> {
    // 1. FEEDSCOUT_CHROMIUM_PATH env
    if let Ok(p) = std::env::var(crate::config::CHROMIUM_PATH_ENV) {
        let path = PathBuf::from(&p);
        if path.exists() {
            return Some(path);
        }
    }

    // 2. ~/.feedscout/chromium/
    if let Some(home) = dirs::home_dir() {
        let candidates = if cfg!(target_os = "macos") {
            vec![
                home.join(".feedscout/chromium/chrome-mac-arm64/Google Chrome for Testing.app/Contents/MacOS/Google Chrome for Testing"),
                home.join(".feedscout/chromium/chrome-mac-x64/Google Chrome for Testing.app/Contents/MacOS/Google Chrome for Testing"),
                home.join(".feedscout/chromium/chrome"),
            ]
        } else {
            vec![
                home.join(".feedscout/chromium/chrome-linux64/chrome"),
                home.join(".feedscout/chromium/chrome"),
            ]
        };
        for c in candidates {
            if c.exists() {
                return Some(c);
            }
        }
    }

    // 3. System PATH
    for name in ["google-chrome", "chromium", "chromium-browser"] {
        if let Ok(path) = which::which(name) {
            return Some(path);
        }
    }

    // 4. Common macOS location
    if cfg!(target_os = "macos") {
        let common =
            PathBuf::from("/Applications/Google Chrome.app/Contents/MacOS/Google Chrome");
        if common.exists() {
            return Some(common);
        }
    }

    None
}

/// How to launch the browser.
#[derive(Debug, Clone, Default)]
pub struct LaunchOptions {
    /// Run without a visible window.
    pub headless: bool,
    /// Explicit browser binary; falls back to [`find_chromium`].
    pub chrome_path: Option<PathBuf>,
}

/// Chromium-based renderer.
pub struct ChromiumRenderer {
    browser: tokio::sync::Mutex<Browser>,
    handler: JoinHandle<()>,
    active_count: Arc<AtomicUsize>,
}

impl ChromiumRenderer {
    /// Launch a Chromium instance.
    pub async fn launch(options: &LaunchOptions) -> Result<Self> {
        let mut builder = BrowserConfig::builder()
            .arg("--disable-gpu")
            .arg("--no-sandbox")
            .arg("--disable-dev-shm-usage")
            .arg("--disable-extensions");

        if let Some(path) = options.chrome_path.clone().or_else(find_chromium) {
            builder = builder.chrome_executable(path);
        }
        if !options.headless {
            builder = builder.with_head();
        }

        let config = builder
            .build()
            .map_err(|e| anyhow::anyhow!("failed to build browser config: {e}"))?;

        let (browser, mut handler) = Browser::launch(config)
            .await
            .context("failed to launch Chromium")?;

        // Spawn the handler task
        let handler = tokio::spawn(async move {
            while let Some(event) = handler.next().await {
                let _ = event;
            }
        });

        Ok(Self {
            browser: tokio::sync::Mutex::new(browser),
            handler,
            active_count: Arc::new(AtomicUsize::new(0)),
        })
    }
}

#[async_trait]
impl Renderer for ChromiumRenderer {
    async fn new_context(&self) -> Result<Box<dyn RenderContext>> {
        let page = self
            .browser
            .lock()
            .await
            .new_page("about:blank")
            .await
            .context("failed to create new page")?;

        page.execute(EnableParams::default())
            .await
            .context("failed to enable network events")?;

        let network = Arc::new(NetworkTracker::new());
        let listeners = NetworkTracker::attach(&page, Arc::clone(&network)).await?;

        self.active_count.fetch_add(1, Ordering::Relaxed);

        Ok(Box::new(ChromiumContext {
            page,
            network,
            listeners,
            active_count: Arc::clone(&self.active_count),
        }))
    }

    async fn shutdown(&self) -> Result<()> {
        let mut browser = self.browser.lock().await;
        browser.close().await.context("failed to close Chromium")?;
        let _ = browser.wait().await;
        self.handler.abort();
        Ok(())
    }

    fn active_contexts(&self) -> usize {
        self.active_count.load(Ordering::Relaxed)
    }
}

/// In-flight request bookkeeping for one page.
struct NetworkTracker {
    in_flight: Mutex<HashSet<String>>,
    last_activity: Mutex<Instant>,
}

impl NetworkTracker {
    fn new() -> Self {
        Self {
            in_flight: Mutex::new(HashSet::new()),
            last_activity: Mutex::new(Instant::now()),
        }
    }

    /// Subscribe to the page's network events. Redirects reuse the request
    /// id, so the in-flight set never double counts them.
    async fn attach(page: &Page, tracker: Arc<Self>) -> Result<Vec<JoinHandle<()>>> {
        let mut sent = page
            .event_listener::<EventRequestWillBeSent>()
            .await
            .context("failed to listen for requests")?;
        let mut finished = page
            .event_listener::<EventLoadingFinished>()
            .await
            .context("failed to listen for finished loads")?;
        let mut failed = page
            .event_listener::<EventLoadingFailed>()
            .await
            .context("failed to listen for failed loads")?;

        let t = Arc::clone(&tracker);
        let on_sent = tokio::spawn(async move {
            while let Some(event) = sent.next().await {
                t.started(event.request_id.inner());
            }
        });
        let t = Arc::clone(&tracker);
        let on_finished = tokio::spawn(async move {
            while let Some(event) = finished.next().await {
                t.settled(event.request_id.inner());
            }
        });
        let t = tracker;
        let on_failed = tokio::spawn(async move {
            while let Some(event) = failed.next().await {
                t.settled(event.request_id.inner());
            }
        });

        Ok(vec![on_sent, on_finished, on_failed])
    }

    fn started(&self, request_id: &str) {
        self.in_flight
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .insert(request_id.to_string());
        self.touch();
    }

    fn settled(&self, request_id: &str) {
        self.in_flight
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .remove(request_id);
        self.touch();
    }

    fn touch(&self) {
        *self.last_activity.lock().unwrap_or_else(|e| e.into_inner()) = Instant::now();
    }

    fn is_idle(&self) -> bool {
        let quiet = self
            .last_activity
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .elapsed()
            >= IDLE_WINDOW;
        quiet
            && self
                .in_flight
                .lock()
                .unwrap_or_else(|e| e.into_inner())
                .is_empty()
    }
}

/// A single Chromium page context.
pub struct ChromiumContext {
    page: Page,
    network: Arc<NetworkTracker>,
    listeners: Vec<JoinHandle<()>>,
    active_count: Arc<AtomicUsize>,
}

#[async_trait]
impl RenderContext for ChromiumContext {
    async fn navigate(
        &mut self,
        url: &str,
        policy: WaitPolicy,
        timeout_ms: u64,
    ) -> Result<NavigationResult> {
        let start = Instant::now();
        let deadline = Duration::from_millis(timeout_ms);

        let page = &self.page;
        let load = async move {
            page.goto(url).await?;
            page.wait_for_navigation().await?;
            Ok::<(), chromiumoxide::error::CdpError>(())
        };

        match tokio::time::timeout(deadline, load).await {
            Ok(Ok(())) => {}
            Ok(Err(e)) => bail!("navigation to {url} failed: {e}"),
            Err(_) => bail!("navigation to {url} timed out after {timeout_ms}ms"),
        }

        let settled = match policy {
            WaitPolicy::Load => true,
            WaitPolicy::NetworkIdle => {
                let remaining = deadline.saturating_sub(start.elapsed());
                self.wait_for_quiescence(remaining.as_millis() as u64).await?
            }
        };

        let final_url = self
            .page
            .url()
            .await
            .unwrap_or_default()
            .map(|u| u.to_string())
            .unwrap_or_else(|| url.to_string());

        Ok(NavigationResult {
            final_url,
            settled,
            load_time_ms: start.elapsed().as_millis() as u64,
        })
    }

    async fn execute_js(&self, script: &str) -> Result<serde_json::Value> {
        let result = self
            .page
            .evaluate(script)
            .await
            .context("JS execution failed")?;

        // Scripts returning `undefined` carry no value.
        Ok(result.value().cloned().unwrap_or(serde_json::Value::Null))
    }

    async fn get_html(&self) -> Result<String> {
        let result = self
            .page
            .evaluate("document.documentElement.outerHTML")
            .await
            .context("failed to get HTML")?;

        let html: String = result
            .into_value()
            .map_err(|e| anyhow::anyhow!("failed to convert HTML result: {e:?}"))?;

        Ok(html)
    }

    async fn wait_for_quiescence(&self, timeout_ms: u64) -> Result<bool> {
        let network = Arc::clone(&self.network);
        let idle = async move {
            while !network.is_idle() {
                tokio::time::sleep(POLL_INTERVAL).await;
            }
        };
        let settled = tokio::time::timeout(Duration::from_millis(timeout_ms), idle)
            .await
            .is_ok();
        if !settled {
            debug!(timeout_ms, "network still busy, proceeding");
        }
        Ok(settled)
    }

    async fn close(self: Box<Self>) -> Result<()> {
        for listener in &self.listeners {
            listener.abort();
        }
        self.active_count.fetch_sub(1, Ordering::Relaxed);
        let _ = self.page.close().await;
        Ok(())
    }
}
