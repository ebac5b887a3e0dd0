// Copyright 2026 Feedscout Contributors
// SPDX-License-Identifier: Apache-2.0

use anyhow::{Context, Result};
use clap::Parser;
use feedscout::config::{EnvSettings, ScoutArgs, ScoutConfig, Target};
use feedscout::renderer::chromium::ChromiumRenderer;
use feedscout::renderer::Renderer;
use feedscout::{crawl_path, discover, JsonLinesSink, Session};
use tracing::info;

#[tokio::main]
async fn main() {
    let args = ScoutArgs::parse();

    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(&args.log_level));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();

    // Consistent exit codes: 0=success, 1=error
    let result = match args.into_config(&EnvSettings::from_env()) {
        Ok(config) => run(config).await,
        Err(e) => Err(e.into()),
    };
    if let Err(e) = result {
        eprintln!("Error: {e:#}");
        std::process::exit(1);
    }
}

async fn run(config: ScoutConfig) -> Result<()> {
    let renderer = ChromiumRenderer::launch(&config.launch).await?;

    let outcome = match renderer.new_context().await {
        Ok(context) => {
            let mut session = Session::new("main", context)
                .with_navigation_timeout(config.navigation_timeout);
            let outcome = scout(&mut session, &config).await;
            let closed = session.close().await.context("failed to close session");
            outcome.and(closed)
        }
        Err(e) => Err(e.context("failed to open browser context")),
    };

    // The browser goes down on every path.
    let shutdown = renderer.shutdown().await.context("failed to shut down browser");
    outcome.and(shutdown)
}

async fn scout(session: &mut Session, config: &ScoutConfig) -> Result<()> {
    let mut sink = JsonLinesSink::stdio();

    match &config.target {
        Target::Subject(subject) => {
            let report = discover(session, subject, &config.discovery, &mut sink).await?;
            info!(
                subject = %report.subject,
                timeline_posts = report.timeline_posts,
                range_posts = report.range_posts,
                ranges = report.ranges.len(),
                skipped = ?report.skipped,
                "discovery finished"
            );
        }
        Target::Path(path) => {
            let posts = crawl_path(session, path, &config.discovery, config.limit, &mut sink).await?;
            info!(path = %path, posts, "crawl finished");
        }
    }
    Ok(())
}
