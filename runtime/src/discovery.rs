// Copyright 2026 Feedscout Contributors
// SPDX-License-Identifier: Apache-2.0

//! Discovery orchestration.
//!
//! A subject's chronological feed only reaches back so far. After crawling
//! it to exhaustion, the orchestrator reads the profile header and, when
//! both the join date and the lifetime post count are known, re-crawls the
//! gap between the join date and the oldest post seen through date-bounded
//! searches. Every record is forwarded to the sink as soon as it is found.
//!
//! Ranges run strictly one after another on the single session. A failure
//! anywhere aborts the run; records already forwarded stay delivered.

use crate::crawler::{PostCrawler, StopSignal};
use crate::extraction::profile::{extract_profile, parse_profile, ProfileSummary};
use crate::output::PostSink;
use crate::renderer::WaitPolicy;
use crate::search::partition::{partition, DateRange, RangeEstimator};
use crate::search::query::{feed_url, path_url, range_search_url};
use crate::session::Session;
use crate::types::{CrawlOptions, PostRecord};
use anyhow::Result;
use chrono::{DateTime, NaiveTime, Utc};
use futures::TryStreamExt;
use serde::Serialize;
use tracing::{info, warn};
use url::Url;

/// Settings for a discovery run.
#[derive(Debug, Clone)]
pub struct DiscoveryOptions {
    /// Site root all feed and search URLs hang off.
    pub base_url: Url,
    /// Options for every pagination pass.
    pub crawl: CrawlOptions,
    pub estimator: RangeEstimator,
    /// Only report the profile summary; crawl nothing.
    pub profile_only: bool,
}

/// Why the run ended without range searches.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SkipReason {
    /// Profile-only run.
    ProfileOnly,
    /// The timeline pass found no posts to anchor the search window.
    NoTimelinePosts,
    /// The join date was absent or unparseable.
    MissingSignUpDate,
    /// The lifetime post count was absent or unparseable.
    MissingPostCount,
    /// The oldest timeline post is not after the join date.
    EmptySearchWindow,
}

/// Summary of a discovery run.
#[derive(Debug, Clone, Default, Serialize)]
pub struct DiscoveryReport {
    pub subject: String,
    pub timeline_posts: usize,
    pub oldest: Option<DateTime<Utc>>,
    /// Timeline posts newer than the post before them.
    pub out_of_order: usize,
    pub profile: ProfileSummary,
    pub range_count: usize,
    pub ranges: Vec<DateRange>,
    pub range_posts: usize,
    pub skipped: Option<SkipReason>,
}

/// Tracks the chronologically oldest post of a pass.
///
/// Feeds are expected newest-first, but pinned posts and lazy inserts break
/// that, so the minimum is tracked explicitly and ordering violations are
/// counted.
#[derive(Debug, Default)]
pub struct OldestTracker {
    oldest: Option<PostRecord>,
    previous: Option<DateTime<Utc>>,
    out_of_order: usize,
}

impl OldestTracker {
    pub fn observe(&mut self, record: &PostRecord) {
        if self.previous.is_some_and(|previous| record.created > previous) {
            self.out_of_order += 1;
        }
        self.previous = Some(record.created);

        if self
            .oldest
            .as_ref()
            .map_or(true, |oldest| record.created < oldest.created)
        {
            self.oldest = Some(record.clone());
        }
    }

    pub fn oldest(&self) -> Option<&PostRecord> {
        self.oldest.as_ref()
    }

    pub fn out_of_order(&self) -> usize {
        self.out_of_order
    }
}

/// The range searches a run will issue.
#[derive(Debug, Clone, PartialEq)]
pub struct RangePlan {
    pub range_count: usize,
    pub ranges: Vec<DateRange>,
}

/// Decide the search windows from partial evidence.
///
/// Missing evidence never widens the search: without an oldest post, a
/// join date and a post count there is nothing to bound it.
pub fn plan_ranges(
    oldest: Option<DateTime<Utc>>,
    profile: &ProfileSummary,
    estimator: &RangeEstimator,
) -> Result<RangePlan, SkipReason> {
    let until = oldest.ok_or(SkipReason::NoTimelinePosts)?;
    let sign_up = profile.sign_up_date.ok_or(SkipReason::MissingSignUpDate)?;
    let total = profile
        .estimated_total_posts
        .ok_or(SkipReason::MissingPostCount)?;

    let since = sign_up.and_time(NaiveTime::MIN).and_utc();
    let range_count = estimator.range_count(total);
    let ranges = partition(since, until, range_count);
    if ranges.is_empty() {
        return Err(SkipReason::EmptySearchWindow);
    }

    Ok(RangePlan {
        range_count,
        ranges,
    })
}

/// Crawl the current document to exhaustion, forwarding every record.
async fn forward_all<S: PostSink>(
    session: &mut Session,
    options: &CrawlOptions,
    sink: &mut S,
    mut observe: impl FnMut(&PostRecord),
) -> Result<usize> {
    let stream = PostCrawler::new(session, options.clone()).into_stream();
    futures::pin_mut!(stream);

    let mut forwarded = 0;
    while let Some(batch) = stream.try_next().await? {
        for record in &batch {
            observe(record);
            sink.post(record)?;
            forwarded += 1;
        }
    }
    Ok(forwarded)
}

/// Discover as much of `subject`'s history as the evidence allows.
pub async fn discover<S: PostSink>(
    session: &mut Session,
    subject: &str,
    options: &DiscoveryOptions,
    sink: &mut S,
) -> Result<DiscoveryReport> {
    let mut report = DiscoveryReport {
        subject: subject.to_string(),
        ..Default::default()
    };

    let feed = feed_url(&options.base_url, subject)?;
    session.navigate(feed.as_str(), WaitPolicy::NetworkIdle).await?;

    if options.profile_only {
        let raw = extract_profile(session).await?;
        let profile = parse_profile(&raw);
        sink.profile(&raw, &profile)?;
        report.profile = profile;
        report.skipped = Some(SkipReason::ProfileOnly);
        return Ok(report);
    }

    info!(subject, url = %feed, "crawling timeline");
    let mut tracker = OldestTracker::default();
    report.timeline_posts =
        forward_all(session, &options.crawl, sink, |record| tracker.observe(record)).await?;
    report.oldest = tracker.oldest().map(|record| record.created);
    report.out_of_order = tracker.out_of_order();
    if report.out_of_order > 0 {
        warn!(
            subject,
            out_of_order = report.out_of_order,
            "timeline was not strictly newest-first"
        );
    }

    let raw = extract_profile(session).await?;
    let profile = parse_profile(&raw);
    sink.profile(&raw, &profile)?;
    report.profile = profile;

    let plan = match plan_ranges(report.oldest, &report.profile, &options.estimator) {
        Ok(plan) => plan,
        Err(reason) => {
            warn!(subject, ?reason, "skipping range search");
            report.skipped = Some(reason);
            return Ok(report);
        }
    };

    info!(
        subject,
        range_count = plan.range_count,
        ranges = plan.ranges.len(),
        "searching date ranges"
    );
    report.range_count = plan.range_count;
    report.ranges = plan.ranges;

    for range in &report.ranges {
        let url = range_search_url(&options.base_url, subject, range)?;
        session.navigate(url.as_str(), WaitPolicy::NetworkIdle).await?;
        let found = forward_all(session, &options.crawl, sink, |_| {}).await?;
        info!(
            since = %range.since,
            until = %range.until,
            posts = found,
            "range searched"
        );
        report.range_posts += found;
    }

    Ok(report)
}

/// Crawl a raw path or query (e.g. a search) with pagination.
///
/// With a `limit`, the crawler is stopped once that many records have been
/// forwarded.
pub async fn crawl_path<S: PostSink>(
    session: &mut Session,
    path: &str,
    options: &DiscoveryOptions,
    limit: Option<usize>,
    sink: &mut S,
) -> Result<usize> {
    let url = path_url(&options.base_url, path)?;
    info!(url = %url, "crawling path");
    session.navigate(url.as_str(), WaitPolicy::NetworkIdle).await?;

    let stop = StopSignal::new();
    let mut crawler = PostCrawler::new(session, options.crawl.clone()).with_stop_signal(stop.clone());
    let mut forwarded = 0;

    while let Some(batch) = crawler.next_batch().await? {
        let remaining = limit.map_or(usize::MAX, |limit| limit.saturating_sub(forwarded));
        for record in batch.iter().take(remaining) {
            sink.post(record)?;
            forwarded += 1;
        }
        if limit.is_some_and(|limit| forwarded >= limit) {
            stop.stop();
        }
    }
    Ok(forwarded)
}
