// Copyright 2026 Feedscout Contributors
// SPDX-License-Identifier: Apache-2.0

//! Date-range partitioning for search re-crawls.
//!
//! A single search view stops returning results after a platform-imposed
//! ceiling. Splitting a subject's history into enough date windows keeps
//! each window under that ceiling. The ceiling is an empirical
//! observation, so the estimate is inflated by a buffer coefficient and
//! the per-query maximum is set slightly below what was observed.

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};

/// Results a single search view reliably returns.
pub const DEFAULT_MAX_PER_QUERY: f64 = 49.0;

/// Safety multiplier on the naive number of searches.
pub const DEFAULT_BUFFER_COEFFICIENT: f64 = 2.0;

/// Spans shorter than this (two days, in milliseconds) are never split;
/// date search is day-granular.
pub const MIN_PARTITION_SPAN_MS: i64 = 2 * 24 * 60 * 60 * 1000;

/// A closed time window `[since, until]` with `since <= until`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct DateRange {
    pub since: DateTime<Utc>,
    pub until: DateTime<Utc>,
}

impl DateRange {
    pub fn duration(&self) -> Duration {
        self.until - self.since
    }
}

/// Estimated number of searches needed to cover `estimated_total` posts.
///
/// The result is a real number; callers round up. Nothing here clamps it,
/// see [`RangeEstimator::range_count`] for the clamped form.
pub fn estimate_range_count(estimated_total: f64, max_per_query: f64, buffer_coefficient: f64) -> f64 {
    buffer_coefficient * estimated_total / max_per_query
}

/// Range-count estimation with configurable ceiling and buffer.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct RangeEstimator {
    pub max_per_query: f64,
    pub buffer_coefficient: f64,
}

impl Default for RangeEstimator {
    fn default() -> Self {
        Self {
            max_per_query: DEFAULT_MAX_PER_QUERY,
            buffer_coefficient: DEFAULT_BUFFER_COEFFICIENT,
        }
    }
}

impl RangeEstimator {
    pub fn estimate(&self, estimated_total: u64) -> f64 {
        estimate_range_count(
            estimated_total as f64,
            self.max_per_query,
            self.buffer_coefficient,
        )
    }

    /// Number of partitions to request: the estimate rounded up, never
    /// below one.
    pub fn range_count(&self, estimated_total: u64) -> usize {
        let estimate = self.estimate(estimated_total).ceil();
        if estimate.is_finite() && estimate >= 1.0 {
            estimate as usize
        } else {
            1
        }
    }
}

/// Split `[since, until]` into `range_count` contiguous windows.
///
/// Empty when `until <= since`; a single window when the span is shorter
/// than [`MIN_PARTITION_SPAN_MS`]. Otherwise `range_count - 1` windows of
/// `floor(span / range_count)` milliseconds and a final window absorbing
/// the remainder. Adjacent windows share their boundary instant.
///
/// A count of zero is treated as one, and the count is capped at the span
/// in milliseconds so no window is empty.
pub fn partition(since: DateTime<Utc>, until: DateTime<Utc>, range_count: usize) -> Vec<DateRange> {
    let span = until - since;
    if span <= Duration::zero() {
        return Vec::new();
    }
    let span_ms = span.num_milliseconds();
    if span_ms < MIN_PARTITION_SPAN_MS {
        return vec![DateRange { since, until }];
    }

    let count = (range_count.max(1) as i64).min(span_ms);
    let interval = Duration::milliseconds(span_ms / count);

    let mut ranges = Vec::with_capacity(count as usize);
    let mut current = since;
    for _ in 0..count - 1 {
        let next = current + interval;
        ranges.push(DateRange {
            since: current,
            until: next,
        });
        current = next;
    }
    ranges.push(DateRange {
        since: current,
        until,
    });
    ranges
}
