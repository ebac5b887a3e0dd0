// Copyright 2026 Feedscout Contributors
// SPDX-License-Identifier: Apache-2.0

//! Feedscout: timeline discovery for infinitely-scrolling social feeds.
//!
//! A subject's feed is crawled to exhaustion through a rendered browser
//! session, then the history it could not reach is re-crawled through
//! date-partitioned searches. Every post is streamed out as soon as it is
//! found and never emitted twice for the same document.

pub mod config;
pub mod crawler;
pub mod discovery;
pub mod error;
pub mod extraction;
pub mod output;
pub mod renderer;
pub mod search;
pub mod session;
pub mod types;

pub use crawler::{PostCrawler, StopSignal};
pub use discovery::{crawl_path, discover, DiscoveryOptions, DiscoveryReport};
pub use output::{JsonLinesSink, PostSink};
pub use session::Session;
pub use types::{CrawlOptions, PostRecord};
