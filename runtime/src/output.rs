// Copyright 2026 Feedscout Contributors
// SPDX-License-Identifier: Apache-2.0

//! Output sinks.
//!
//! Posts are written as JSON lines to the output channel as soon as they
//! are discovered; profile summaries go to the diagnostic channel.

use crate::extraction::profile::{ProfileSummary, RawProfileSummary};
use crate::types::PostRecord;
use anyhow::{Context, Result};
use serde::Serialize;
use std::io::{self, Stderr, Stdout, Write};

/// Destination for everything a crawl discovers.
pub trait PostSink {
    /// Deliver one post. Called once per record, in discovery order.
    fn post(&mut self, record: &PostRecord) -> Result<()>;
    /// Report the raw and parsed profile summary.
    fn profile(&mut self, raw: &RawProfileSummary, parsed: &ProfileSummary) -> Result<()>;
}

impl<S: PostSink + ?Sized> PostSink for &mut S {
    fn post(&mut self, record: &PostRecord) -> Result<()> {
        (**self).post(record)
    }

    fn profile(&mut self, raw: &RawProfileSummary, parsed: &ProfileSummary) -> Result<()> {
        (**self).profile(raw, parsed)
    }
}

/// Newline-delimited JSON writer.
pub struct JsonLinesSink<O, D> {
    out: O,
    diag: D,
    posts_written: usize,
}

impl JsonLinesSink<Stdout, Stderr> {
    /// Posts to stdout, summaries to stderr.
    pub fn stdio() -> Self {
        Self::new(io::stdout(), io::stderr())
    }
}

impl<O: Write, D: Write> JsonLinesSink<O, D> {
    pub fn new(out: O, diag: D) -> Self {
        Self {
            out,
            diag,
            posts_written: 0,
        }
    }

    pub fn posts_written(&self) -> usize {
        self.posts_written
    }

    pub fn into_inner(self) -> (O, D) {
        (self.out, self.diag)
    }
}

/// Write one JSON value and a newline, then flush so consumers see it now.
fn write_line<W: Write, T: Serialize>(writer: &mut W, value: &T) -> Result<()> {
    serde_json::to_writer(&mut *writer, value).context("failed to serialize record")?;
    writer.write_all(b"\n")?;
    writer.flush()?;
    Ok(())
}

impl<O: Write, D: Write> PostSink for JsonLinesSink<O, D> {
    fn post(&mut self, record: &PostRecord) -> Result<()> {
        write_line(&mut self.out, record).context("failed to write post")?;
        self.posts_written += 1;
        Ok(())
    }

    fn profile(&mut self, raw: &RawProfileSummary, parsed: &ProfileSummary) -> Result<()> {
        write_line(&mut self.diag, raw).context("failed to write raw profile")?;
        write_line(&mut self.diag, parsed).context("failed to write parsed profile")?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert_json_diff::assert_json_eq;
    use chrono::NaiveDate;
    use serde_json::{json, Value};

    fn lines(bytes: &[u8]) -> Vec<Value> {
        std::str::from_utf8(bytes)
            .unwrap()
            .lines()
            .map(|line| serde_json::from_str(line).unwrap())
            .collect()
    }

    #[test]
    fn test_posts_are_one_per_line() {
        let mut sink = JsonLinesSink::new(Vec::new(), Vec::new());
        for id in 1..=2 {
            sink.post(&PostRecord {
                url: format!("https://twitter.com/a/status/{id}"),
                content: format!("line {id}\nwith break"),
                created: "2020-01-01T00:00:00Z".parse().unwrap(),
            })
            .unwrap();
        }
        assert_eq!(sink.posts_written(), 2);

        let (out, diag) = sink.into_inner();
        let posts = lines(&out);
        assert_eq!(posts.len(), 2);
        assert_json_eq!(
            posts[0],
            json!({
                "url": "https://twitter.com/a/status/1",
                "content": "line 1\nwith break",
                "created": "2020-01-01T00:00:00Z"
            })
        );
        assert!(diag.is_empty());
    }

    #[test]
    fn test_profile_goes_to_diagnostics() {
        let mut sink = JsonLinesSink::new(Vec::new(), Vec::new());
        let raw = RawProfileSummary {
            display_name: Some("Alice".to_string()),
            sign_up_date_text: Some("Joined April 2017".to_string()),
            ..Default::default()
        };
        let parsed = ProfileSummary {
            display_name: Some("Alice".to_string()),
            sign_up_date: NaiveDate::from_ymd_opt(2017, 4, 1),
            ..Default::default()
        };
        sink.profile(&raw, &parsed).unwrap();

        let (out, diag) = sink.into_inner();
        assert!(out.is_empty());
        let summaries = lines(&diag);
        assert_eq!(summaries.len(), 2);
        assert_json_eq!(
            summaries[1],
            json!({
                "display_name": "Alice",
                "location": null,
                "sign_up_date": "2017-04-01",
                "estimated_total_posts": null
            })
        );
    }
}
