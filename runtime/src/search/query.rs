// Copyright 2026 Feedscout Contributors
// SPDX-License-Identifier: Apache-2.0

//! URL builders for feed, search and raw-path views.

use super::partition::DateRange;
use anyhow::{anyhow, Context, Result};
use url::Url;

/// Calendar format accepted by the search operators.
const SEARCH_DATE_FORMAT: &str = "%Y-%m-%d";

/// The subject's chronological feed, replies included.
pub fn feed_url(base: &Url, subject: &str) -> Result<Url> {
    let mut url = base.clone();
    url.path_segments_mut()
        .map_err(|_| anyhow!("base URL {base} cannot carry a path"))?
        .clear()
        .push(subject)
        .push("with_replies");
    Ok(url)
}

/// Search operators restricting results to `subject` within `range`.
pub fn search_query(subject: &str, range: &DateRange) -> String {
    format!(
        "from:{subject} since:{} until:{}",
        range.since.format(SEARCH_DATE_FORMAT),
        range.until.format(SEARCH_DATE_FORMAT)
    )
}

/// The search view for `subject` within `range`.
pub fn range_search_url(base: &Url, subject: &str, range: &DateRange) -> Result<Url> {
    let mut url = base.join("search").context("failed to build search URL")?;
    url.query_pairs_mut()
        .clear()
        .append_pair("q", &search_query(subject, range));
    Ok(url)
}

/// A raw path or query such as `search?q=rust` relative to `base`.
pub fn path_url(base: &Url, path: &str) -> Result<Url> {
    base.join(path.trim_start_matches('/'))
        .with_context(|| format!("invalid path {path:?}"))
}
