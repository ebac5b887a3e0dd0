// Copyright 2026 Feedscout Contributors
// SPDX-License-Identifier: Apache-2.0

//! Record extraction from rendered feed snapshots.
//!
//! The rendered document is snapshotted as HTML and parsed with `scraper`.
//! Every post-bearing element is reduced to a [`PostCandidate`]; candidates
//! whose fingerprint is not yet marked in the session are marked, then
//! parsed into [`PostRecord`]s. Candidates missing a permalink, a body or a
//! parseable timestamp are ads, tombstones or half-rendered entries and are
//! dropped without complaint.

use crate::session::{Fingerprint, SeenRegistry, Session};
use crate::types::{CrawlOptions, PostRecord};
use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use scraper::{ElementRef, Html, Selector};
use std::hash::{Hash, Hasher};
use std::sync::OnceLock;
use tracing::{debug, warn};
use url::Url;

/// Post-bearing elements.
pub const POST_SELECTOR: &str = r#"article[data-testid="tweet"]"#;
/// Publication timestamp; its parent anchor is the permalink.
const TIME_SELECTOR: &str = "time[datetime]";
/// Text body.
const TEXT_SELECTOR: &str = "div[dir][lang]";

struct PostSelectors {
    post: Selector,
    time: Selector,
    text: Selector,
}

fn selectors() -> &'static PostSelectors {
    static SELECTORS: OnceLock<PostSelectors> = OnceLock::new();
    SELECTORS.get_or_init(|| PostSelectors {
        post: Selector::parse(POST_SELECTOR).expect("post selector is valid"),
        time: Selector::parse(TIME_SELECTOR).expect("time selector is valid"),
        text: Selector::parse(TEXT_SELECTOR).expect("text selector is valid"),
    })
}

/// Raw fields read from one post-bearing element.
#[derive(Debug, Clone, PartialEq)]
pub struct PostCandidate {
    /// Position among post-bearing elements, in document order.
    pub index: usize,
    pub fingerprint: Fingerprint,
    pub permalink: Option<String>,
    pub datetime: Option<String>,
    pub text: Option<String>,
}

impl PostCandidate {
    /// Parse into a record; `None` if any mandatory field is missing.
    pub fn to_record(&self, base_url: Option<&Url>) -> Option<PostRecord> {
        let url = resolve_permalink(self.permalink.as_deref()?, base_url);
        let content = self.text.clone()?;
        let created = DateTime::parse_from_rfc3339(self.datetime.as_deref()?)
            .ok()?
            .with_timezone(&Utc);
        Some(PostRecord {
            url,
            content,
            created,
        })
    }
}

/// The element a pass scrolls into view.
///
/// Virtualized feeds unmount cells between the snapshot and the scroll, so
/// the permalink is the primary handle and the snapshot index a fallback.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScrollTarget {
    pub index: usize,
    /// Raw `href` of the element's permalink anchor.
    pub permalink: Option<String>,
}

/// Outcome of one extraction pass.
#[derive(Debug, Default)]
pub struct ExtractedBatch {
    /// Newly extracted records, in document order.
    pub records: Vec<PostRecord>,
    /// Last unseen element visited, whether or not it produced a record.
    pub last_visited: Option<ScrollTarget>,
    /// Number of unseen elements visited (and now marked).
    pub visited: usize,
    /// Whether the scroll after this pass found its target.
    pub scrolled: bool,
}

/// Read every post-bearing element of `html` in document order.
pub fn scan_posts(html: &str) -> Vec<PostCandidate> {
    let document = Html::parse_document(html);
    document
        .select(&selectors().post)
        .enumerate()
        .map(|(index, element)| read_candidate(index, element))
        .collect()
}

fn read_candidate(index: usize, article: ElementRef<'_>) -> PostCandidate {
    let sel = selectors();
    let time = article.select(&sel.time).next();

    let datetime = time
        .and_then(|t| t.value().attr("datetime"))
        .filter(|s| !s.is_empty())
        .map(str::to_string);

    let permalink = time
        .and_then(|t| t.parent())
        .and_then(ElementRef::wrap)
        .filter(|parent| parent.value().name() == "a")
        .and_then(|anchor| anchor.value().attr("href"))
        .filter(|s| !s.is_empty())
        .map(str::to_string);

    let text = article
        .select(&sel.text)
        .next()
        .map(|body| body.text().collect::<String>())
        .filter(|s| !s.is_empty());

    let fingerprint = fingerprint(
        permalink.as_deref(),
        datetime.as_deref(),
        text.as_deref(),
        article,
    );

    PostCandidate {
        index,
        fingerprint,
        permalink,
        datetime,
        text,
    }
}

/// Permalinks identify a post on their own. Without one, fall back to the
/// timestamp and body, and only hash the markup when nothing else exists.
fn fingerprint(
    permalink: Option<&str>,
    datetime: Option<&str>,
    text: Option<&str>,
    element: ElementRef<'_>,
) -> Fingerprint {
    let mut hasher = fnv::FnvHasher::default();
    match (permalink, datetime, text) {
        (Some(url), _, _) => {
            "permalink".hash(&mut hasher);
            url.hash(&mut hasher);
        }
        (None, None, None) => {
            "markup".hash(&mut hasher);
            element.html().hash(&mut hasher);
        }
        (None, datetime, text) => {
            "body".hash(&mut hasher);
            datetime.hash(&mut hasher);
            text.hash(&mut hasher);
        }
    }
    hasher.finish()
}

fn resolve_permalink(href: &str, base_url: Option<&Url>) -> String {
    base_url
        .and_then(|base| base.join(href).ok())
        .map(|url| url.to_string())
        .unwrap_or_else(|| href.to_string())
}

/// Mark every unseen candidate under `marker` and parse it.
pub fn collect_unseen(
    candidates: &[PostCandidate],
    seen: &mut SeenRegistry,
    marker: &str,
    base_url: Option<&Url>,
) -> ExtractedBatch {
    let mut batch = ExtractedBatch::default();
    for candidate in candidates {
        if !seen.mark(marker, candidate.fingerprint) {
            continue;
        }
        batch.visited += 1;
        batch.last_visited = Some(ScrollTarget {
            index: candidate.index,
            permalink: candidate.permalink.clone(),
        });
        if let Some(record) = candidate.to_record(base_url) {
            batch.records.push(record);
        }
    }
    batch
}

/// Script scrolling `target` into view; evaluates to whether it was found.
///
/// The post owning the permalink anchor wins; the element at the snapshot
/// index is only used when there is no permalink or it is gone.
pub fn scroll_script(target: &ScrollTarget) -> String {
    let selector = serde_json::Value::from(POST_SELECTOR);
    let href = serde_json::Value::from(target.permalink.clone());
    format!(
        "(() => {{ const sel = {selector}; const href = {href}; let el = null; \
         if (href !== null) {{ for (const a of document.querySelectorAll('a[href]')) {{ \
         if (a.getAttribute('href') === href) {{ el = a.closest(sel); if (el) {{ break; }} }} }} }} \
         if (!el) {{ el = document.querySelectorAll(sel)[{index}]; }} \
         if (!el) {{ return false; }} el.scrollIntoView(); return true; }})()",
        index = target.index
    )
}

/// Extract the posts rendered since the last pass and, when paginating,
/// scroll the last visited element into view to trigger more loading.
pub async fn extract_new_posts(
    session: &mut Session,
    options: &CrawlOptions,
) -> Result<ExtractedBatch> {
    let html = session
        .context()
        .get_html()
        .await
        .context("failed to snapshot rendered document")?;

    let candidates = scan_posts(&html);
    let mut batch = collect_unseen(
        &candidates,
        session.seen_mut(),
        &options.dedup_marker_key,
        options.base_url.as_ref(),
    );

    if options.paginate {
        if let Some(target) = &batch.last_visited {
            let found = session
                .context()
                .execute_js(&scroll_script(target))
                .await
                .context("failed to scroll feed")?;
            batch.scrolled = found.as_bool().unwrap_or(false);
            if !batch.scrolled {
                warn!(
                    index = target.index,
                    permalink = ?target.permalink,
                    "scroll target no longer rendered"
                );
            }
        }
    }

    debug!(
        candidates = candidates.len(),
        visited = batch.visited,
        records = batch.records.len(),
        "extraction pass"
    );
    Ok(batch)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::renderer::scripted::ScriptedContext;
    use crate::renderer::WaitPolicy;

    fn post(id: u32, datetime: Option<&str>, text: &str) -> String {
        match datetime {
            Some(dt) => format!(
                r#"<article data-testid="tweet"><div><a href="/alice/status/{id}"><time datetime="{dt}">Apr 1</time></a></div><div dir="auto" lang="en">{text}</div></article>"#
            ),
            None => format!(
                r#"<article data-testid="tweet"><div><span>Promoted</span></div><div dir="auto" lang="en">{text}</div></article>"#
            ),
        }
    }

    fn page(posts: &[String]) -> String {
        format!("<html><body><main>{}</main></body></html>", posts.join(""))
    }

    #[test]
    fn test_scan_reads_fields_in_document_order() {
        let html = page(&[
            post(1, Some("2017-04-02T10:00:00.000Z"), "first"),
            post(2, None, "ad"),
        ]);
        let candidates = scan_posts(&html);
        assert_eq!(candidates.len(), 2);
        assert_eq!(candidates[0].index, 0);
        assert_eq!(candidates[0].permalink.as_deref(), Some("/alice/status/1"));
        assert_eq!(candidates[0].text.as_deref(), Some("first"));
        assert_eq!(candidates[1].permalink, None);
        assert_eq!(candidates[1].datetime, None);
    }

    #[test]
    fn test_malformed_element_is_marked_but_dropped() {
        let html = page(&[
            post(1, Some("2017-04-02T10:00:00.000Z"), "first"),
            post(2, None, "no timestamp here"),
            post(3, Some("2017-04-01T09:00:00.000Z"), "third"),
        ]);
        let candidates = scan_posts(&html);
        let mut seen = SeenRegistry::default();

        let batch = collect_unseen(&candidates, &mut seen, "data-crawled", None);

        assert_eq!(batch.records.len(), 2);
        assert_eq!(batch.records[0].content, "first");
        assert_eq!(batch.records[1].content, "third");
        assert_eq!(batch.visited, 3);
        assert_eq!(seen.len("data-crawled"), 3);
        for candidate in &candidates {
            assert!(seen.is_seen("data-crawled", candidate.fingerprint));
        }
    }

    #[test]
    fn test_second_pass_emits_nothing() {
        let html = page(&[post(1, Some("2017-04-02T10:00:00Z"), "first")]);
        let candidates = scan_posts(&html);
        let mut seen = SeenRegistry::default();

        assert_eq!(collect_unseen(&candidates, &mut seen, "m", None).records.len(), 1);
        let again = collect_unseen(&candidates, &mut seen, "m", None);
        assert!(again.records.is_empty());
        assert_eq!(again.last_visited, None);
    }

    #[test]
    fn test_last_visited_counts_dropped_elements() {
        let html = page(&[
            post(1, Some("2017-04-02T10:00:00Z"), "first"),
            post(2, None, "trailing ad"),
        ]);
        let mut seen = SeenRegistry::default();
        let batch = collect_unseen(&scan_posts(&html), &mut seen, "m", None);
        assert_eq!(
            batch.last_visited,
            Some(ScrollTarget {
                index: 1,
                permalink: None
            })
        );
    }

    #[test]
    fn test_unparseable_timestamp_is_dropped() {
        let html = page(&[post(1, Some("yesterday"), "first")]);
        let mut seen = SeenRegistry::default();
        let batch = collect_unseen(&scan_posts(&html), &mut seen, "m", None);
        assert!(batch.records.is_empty());
        assert_eq!(batch.visited, 1);
    }

    #[test]
    fn test_relative_permalink_resolves_against_base() {
        let html = page(&[post(9, Some("2017-04-02T10:00:00Z"), "hi")]);
        let base = Url::parse("https://twitter.com").unwrap();
        let mut seen = SeenRegistry::default();
        let batch = collect_unseen(&scan_posts(&html), &mut seen, "m", Some(&base));
        assert_eq!(batch.records[0].url, "https://twitter.com/alice/status/9");
    }

    #[test]
    fn test_scroll_script_prefers_permalink() {
        let script = scroll_script(&ScrollTarget {
            index: 4,
            permalink: Some("/alice/status/4".to_string()),
        });
        assert!(script.contains(r#"const sel = "article[data-testid=\"tweet\"]";"#));
        assert!(script.contains(r#"const href = "/alice/status/4";"#));
        assert!(script.contains("a.closest(sel)"));
        assert!(script.contains("document.querySelectorAll(sel)[4]"));
    }

    #[test]
    fn test_scroll_script_without_permalink_uses_index() {
        let script = scroll_script(&ScrollTarget {
            index: 2,
            permalink: None,
        });
        assert!(script.contains("const href = null;"));
        assert!(script.contains("document.querySelectorAll(sel)[2]"));
    }

    #[tokio::test]
    async fn test_extract_scrolls_only_when_paginating() {
        let html = page(&[post(1, Some("2017-04-02T10:00:00Z"), "first")]);
        let ctx = ScriptedContext::new().with_fallback(vec![html]);
        let log = ctx.log_handle();
        let mut session = Session::new("s", Box::new(ctx));
        session
            .navigate("https://example.com/feed", WaitPolicy::Load)
            .await
            .unwrap();

        let options = CrawlOptions {
            paginate: false,
            ..CrawlOptions::default()
        };
        let batch = extract_new_posts(&mut session, &options).await.unwrap();
        assert_eq!(batch.records.len(), 1);
        assert!(log.snapshot().scripts.is_empty());

        session
            .navigate("https://example.com/feed", WaitPolicy::Load)
            .await
            .unwrap();
        let batch = extract_new_posts(&mut session, &CrawlOptions::default())
            .await
            .unwrap();
        assert_eq!(batch.records.len(), 1);
        assert!(batch.scrolled);
        let target = ScrollTarget {
            index: 0,
            permalink: Some("/alice/status/1".to_string()),
        };
        assert_eq!(log.snapshot().scripts, vec![scroll_script(&target)]);
    }

    #[tokio::test]
    async fn test_missed_scroll_is_reported() {
        let html = page(&[post(1, Some("2017-04-02T10:00:00Z"), "first")]);
        let ctx = ScriptedContext::new()
            .with_fallback(vec![html])
            .losing_scroll_targets();
        let log = ctx.log_handle();
        let mut session = Session::new("s", Box::new(ctx));
        session
            .navigate("https://example.com/feed", WaitPolicy::Load)
            .await
            .unwrap();

        let batch = extract_new_posts(&mut session, &CrawlOptions::default())
            .await
            .unwrap();
        assert_eq!(batch.records.len(), 1);
        assert!(!batch.scrolled);
        assert_eq!(log.snapshot().missed_scrolls, 1);
    }
}
