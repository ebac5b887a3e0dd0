// Copyright 2026 Feedscout Contributors
// SPDX-License-Identifier: Apache-2.0

//! Search-based re-crawling: date partitioning and query URLs.

pub mod partition;
pub mod query;

pub use partition::{estimate_range_count, partition, DateRange, RangeEstimator};
