// Copyright 2026 Feedscout Contributors
// SPDX-License-Identifier: Apache-2.0

//! Pagination crawler for infinitely-scrolling feeds.
//!
//! The crawler is pulled one batch at a time through [`PostCrawler::next_batch`].
//! Between batches it scrolls, pauses, and waits for the network to go
//! quiet; it stops when an extraction pass finds nothing new. Consumers
//! cancel cooperatively through a [`StopSignal`], checked at batch
//! boundaries only.
//!
//! ```ignore
//! let mut crawler = PostCrawler::new(&mut session, CrawlOptions::default());
//! while let Some(batch) = crawler.next_batch().await? {
//!     for post in batch {
//!         sink.post(&post)?;
//!     }
//! }
//! ```

use crate::extraction::posts::extract_new_posts;
use crate::session::Session;
use crate::types::{CrawlOptions, PostRecord};
use anyhow::Result;
use futures::Stream;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tracing::debug;

/// Side channel for asking a crawler to stop at its next batch boundary.
#[derive(Debug, Clone, Default)]
pub struct StopSignal(Arc<AtomicBool>);

impl StopSignal {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn stop(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    pub fn is_stopped(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }
}

/// Where the crawler is between pulls.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CrawlState {
    /// Next pull extracts from the current document.
    Fetching,
    /// Next pull waits for lazily loaded content first.
    Settling,
    /// Terminal.
    Done,
}

/// Pull-based, deduplicating crawl over one rendered document.
pub struct PostCrawler<'s> {
    session: &'s mut Session,
    options: CrawlOptions,
    state: CrawlState,
    stop: StopSignal,
    batches: usize,
    records: usize,
}

impl<'s> PostCrawler<'s> {
    pub fn new(session: &'s mut Session, options: CrawlOptions) -> Self {
        Self {
            session,
            options,
            state: CrawlState::Fetching,
            stop: StopSignal::new(),
            batches: 0,
            records: 0,
        }
    }

    /// Share an existing stop signal instead of the crawler's own.
    pub fn with_stop_signal(mut self, stop: StopSignal) -> Self {
        self.stop = stop;
        self
    }

    /// A handle the consumer can use to stop the crawl.
    pub fn stop_signal(&self) -> StopSignal {
        self.stop.clone()
    }

    pub fn state(&self) -> CrawlState {
        self.state
    }

    pub fn is_done(&self) -> bool {
        self.state == CrawlState::Done
    }

    /// Batches emitted so far.
    pub fn batches(&self) -> usize {
        self.batches
    }

    /// Records emitted so far.
    pub fn records(&self) -> usize {
        self.records
    }

    /// Pull the next batch of never-before-seen records.
    ///
    /// Returns `Ok(None)` once the crawl is done. Rendering failures end the
    /// crawl and propagate; nothing is retried.
    pub async fn next_batch(&mut self) -> Result<Option<Vec<PostRecord>>> {
        loop {
            if self.stop.is_stopped() {
                self.state = CrawlState::Done;
            }

            match self.state {
                CrawlState::Done => return Ok(None),
                CrawlState::Settling => {
                    if let Err(e) = self.settle().await {
                        self.state = CrawlState::Done;
                        return Err(e);
                    }
                    self.state = CrawlState::Fetching;
                }
                CrawlState::Fetching => {
                    let batch = match extract_new_posts(self.session, &self.options).await {
                        Ok(batch) => batch,
                        Err(e) => {
                            self.state = CrawlState::Done;
                            return Err(e);
                        }
                    };

                    if batch.records.is_empty() {
                        debug!(batches = self.batches, records = self.records, "no new posts");
                        self.state = CrawlState::Done;
                        return Ok(None);
                    }

                    self.state = if self.options.paginate {
                        CrawlState::Settling
                    } else {
                        CrawlState::Done
                    };
                    self.batches += 1;
                    self.records += batch.records.len();
                    return Ok(Some(batch.records));
                }
            }
        }
    }

    async fn settle(&self) -> Result<()> {
        let context = self.session.context();
        context.wait_fixed(self.options.next_page_pause_ms).await?;
        let settled = context
            .wait_for_quiescence(self.options.next_page_timeout_ms)
            .await?;
        if !settled {
            debug!(
                timeout_ms = self.options.next_page_timeout_ms,
                "feed still loading, extracting anyway"
            );
        }
        Ok(())
    }

    /// Consume the crawler as a stream of batches.
    pub fn into_stream(mut self) -> impl Stream<Item = Result<Vec<PostRecord>>> + 's {
        async_stream::try_stream! {
            while let Some(batch) = self.next_batch().await? {
                yield batch;
            }
        }
    }
}

/// One non-paginated pass over what is currently rendered.
pub async fn crawl_visible(session: &mut Session, options: &CrawlOptions) -> Result<Vec<PostRecord>> {
    let options = CrawlOptions {
        paginate: false,
        ..options.clone()
    };
    let mut crawler = PostCrawler::new(session, options);
    Ok(crawler.next_batch().await?.unwrap_or_default())
}
