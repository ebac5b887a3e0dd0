// Copyright 2026 Feedscout Contributors
// SPDX-License-Identifier: Apache-2.0

//! Profile header extraction and normalization.
//!
//! [`scan_profile`] pulls raw text fragments out of a rendered profile page;
//! [`parse_profile`] turns them into typed values. Parsing never fails:
//! anything unrecognized becomes `None`, which downstream logic treats as
//! missing evidence rather than zero.

use crate::extraction::posts::POST_SELECTOR;
use crate::session::Session;
use anyhow::{Context, Result};
use chrono::NaiveDate;
use regex::Regex;
use scraper::{ElementRef, Html, Selector};
use serde::{Deserialize, Serialize};
use std::sync::OnceLock;

const NAME_SELECTOR: &str = r#"[data-testid="UserName"] span"#;
const LOCATION_SELECTOR: &str = r#"[data-testid="UserLocation"]"#;
const JOIN_DATE_SELECTOR: &str = r#"[data-testid="UserJoinDate"]"#;

/// Raw header fragments, exactly as rendered.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RawProfileSummary {
    pub display_name: Option<String>,
    pub location: Option<String>,
    pub sign_up_date_text: Option<String>,
    pub estimated_count_text: Option<String>,
}

/// Normalized header values.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProfileSummary {
    pub display_name: Option<String>,
    pub location: Option<String>,
    pub sign_up_date: Option<NaiveDate>,
    pub estimated_total_posts: Option<u64>,
}

struct ProfilePatterns {
    count: Regex,
    joined: Regex,
    post: Selector,
}

fn patterns() -> &'static ProfilePatterns {
    static PATTERNS: OnceLock<ProfilePatterns> = OnceLock::new();
    PATTERNS.get_or_init(|| ProfilePatterns {
        count: Regex::new(r"(?i)^\s*(\d[\d,]*(?:\.\d+)?)\s*([KM])?\s+(?:posts|tweets)\b")
            .expect("count regex is valid"),
        joined: Regex::new(r"(?i)^\s*joined\s+(.+?)\s*$").expect("joined regex is valid"),
        post: Selector::parse(POST_SELECTOR).expect("post selector is valid"),
    })
}

/// Whether any of `ancestors` is a post-bearing element.
fn within_post<'a>(mut ancestors: impl Iterator<Item = ElementRef<'a>>) -> bool {
    let post = &patterns().post;
    ancestors.any(|el| post.matches(&el))
}

/// Read the profile header fragments from `html`.
///
/// Text inside post-bearing elements is never read: after a timeline pass
/// the document holds every post body, and a body like "300 posts and
/// counting" must not pass for the header count.
pub fn scan_profile(html: &str) -> RawProfileSummary {
    let document = Html::parse_document(html);

    let first_text = |selector: &str| -> Option<String> {
        let selector = Selector::parse(selector).ok()?;
        document
            .select(&selector)
            .filter(|el| !within_post(el.ancestors().filter_map(ElementRef::wrap)))
            .map(|el| el.text().collect::<String>().trim().to_string())
            .find(|text| !text.is_empty())
    };

    // The post count sits in a bare text node of the header.
    let count_re = &patterns().count;
    let estimated_count_text = document
        .root_element()
        .descendants()
        .filter(|node| !within_post(node.ancestors().filter_map(ElementRef::wrap)))
        .filter_map(|node| node.value().as_text())
        .map(|text| text.trim())
        .find(|text| count_re.is_match(text))
        .map(str::to_string);

    RawProfileSummary {
        display_name: first_text(NAME_SELECTOR),
        location: first_text(LOCATION_SELECTOR),
        sign_up_date_text: first_text(JOIN_DATE_SELECTOR),
        estimated_count_text,
    }
}

/// Snapshot the session's document and read its profile header.
pub async fn extract_profile(session: &Session) -> Result<RawProfileSummary> {
    let html = session
        .context()
        .get_html()
        .await
        .context("failed to snapshot profile page")?;
    Ok(scan_profile(&html))
}

pub fn parse_profile(raw: &RawProfileSummary) -> ProfileSummary {
    ProfileSummary {
        display_name: raw.display_name.clone(),
        location: raw.location.clone(),
        sign_up_date: raw.sign_up_date_text.as_deref().and_then(parse_sign_up_date),
        estimated_total_posts: raw
            .estimated_count_text
            .as_deref()
            .and_then(parse_post_count),
    }
}

/// Parse labels like `"12.3K Posts"`, `"1.2M Posts"` or `"4,096 Tweets"`.
pub fn parse_post_count(text: &str) -> Option<u64> {
    let caps = patterns().count.captures(text)?;
    let number: f64 = caps[1].replace(',', "").parse().ok()?;
    let multiplier = match caps.get(2).map(|m| m.as_str().to_ascii_uppercase()) {
        Some(suffix) if suffix == "K" => 1_000.0,
        Some(suffix) if suffix == "M" => 1_000_000.0,
        _ => 1.0,
    };
    let total = (number * multiplier).round();
    if !total.is_finite() || total < 0.0 {
        return None;
    }
    Some(total as u64)
}

/// Parse labels like `"Joined April 2017"` into the first day they name.
pub fn parse_sign_up_date(text: &str) -> Option<NaiveDate> {
    let caps = patterns().joined.captures(text)?;
    parse_calendar_date(&caps[1])
}

/// Month-and-year labels resolve to the first of the month.
fn parse_calendar_date(text: &str) -> Option<NaiveDate> {
    const FULL_DATES: [&str; 5] = ["%B %d, %Y", "%b %d, %Y", "%d %B %Y", "%d %b %Y", "%Y-%m-%d"];
    const MONTH_YEAR: [&str; 2] = ["%d %B %Y", "%d %b %Y"];

    FULL_DATES
        .iter()
        .find_map(|fmt| NaiveDate::parse_from_str(text, fmt).ok())
        .or_else(|| {
            let first_of_month = format!("01 {text}");
            MONTH_YEAR
                .iter()
                .find_map(|fmt| NaiveDate::parse_from_str(&first_of_month, fmt).ok())
        })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_count_with_suffixes() {
        assert_eq!(parse_post_count("12.3K Posts"), Some(12_300));
        assert_eq!(parse_post_count("1.2M Posts"), Some(1_200_000));
        assert_eq!(parse_post_count("4,096 Tweets"), Some(4_096));
        assert_eq!(parse_post_count("987 posts"), Some(987));
    }

    #[test]
    fn test_count_without_match_is_none() {
        assert_eq!(parse_post_count("responses: 4"), None);
        assert_eq!(parse_post_count("Posts"), None);
        assert_eq!(parse_post_count(""), None);
    }

    #[test]
    fn test_zero_count_is_kept() {
        assert_eq!(parse_post_count("0 Posts"), Some(0));
    }

    #[test]
    fn test_sign_up_month_year() {
        assert_eq!(
            parse_sign_up_date("Joined April 2017"),
            NaiveDate::from_ymd_opt(2017, 4, 1)
        );
        assert_eq!(
            parse_sign_up_date("Joined Sep 2009"),
            NaiveDate::from_ymd_opt(2009, 9, 1)
        );
    }

    #[test]
    fn test_sign_up_full_date() {
        assert_eq!(
            parse_sign_up_date("Joined March 21, 2006"),
            NaiveDate::from_ymd_opt(2006, 3, 21)
        );
    }

    #[test]
    fn test_sign_up_unparseable_is_none() {
        assert_eq!(parse_sign_up_date("Born April 2017"), None);
        assert_eq!(parse_sign_up_date("Joined recently"), None);
    }

    #[test]
    fn test_absent_fields_stay_absent() {
        let parsed = parse_profile(&RawProfileSummary::default());
        assert_eq!(parsed, ProfileSummary::default());
    }

    #[test]
    fn test_scan_profile_header() {
        let html = r#"
        <html><body><div data-testid="primaryColumn">
          <div><h2>Alice Example</h2><div>12.3K posts</div></div>
          <div data-testid="UserName"><div><span>Alice Example</span></div><div><span>@alice</span></div></div>
          <div data-testid="UserProfileHeader_Items">
            <span data-testid="UserLocation"><span>Lisbon</span></span>
            <span data-testid="UserJoinDate"><span>Joined April 2017</span></span>
          </div>
        </div></body></html>
        "#;

        let raw = scan_profile(html);
        assert_eq!(raw.display_name.as_deref(), Some("Alice Example"));
        assert_eq!(raw.location.as_deref(), Some("Lisbon"));
        assert_eq!(raw.sign_up_date_text.as_deref(), Some("Joined April 2017"));
        assert_eq!(raw.estimated_count_text.as_deref(), Some("12.3K posts"));

        let parsed = parse_profile(&raw);
        assert_eq!(parsed.sign_up_date, NaiveDate::from_ymd_opt(2017, 4, 1));
        assert_eq!(parsed.estimated_total_posts, Some(12_300));
    }

    #[test]
    fn test_count_is_never_read_from_post_bodies() {
        let html = r#"
        <html><body><div data-testid="primaryColumn">
          <div><h2>Alice Example</h2></div>
          <span data-testid="UserJoinDate"><span>Joined April 2017</span></span>
          <article data-testid="tweet">
            <a href="/alice/status/1"><time datetime="2020-01-01T00:00:00Z"></time></a>
            <div dir="auto" lang="en">300 posts and counting</div>
          </article>
        </div></body></html>
        "#;

        let raw = scan_profile(html);
        assert_eq!(raw.estimated_count_text, None);
        assert_eq!(raw.sign_up_date_text.as_deref(), Some("Joined April 2017"));
        assert_eq!(parse_profile(&raw).estimated_total_posts, None);
    }

    #[test]
    fn test_header_count_found_alongside_posts() {
        let html = r#"
        <html><body>
          <article data-testid="tweet"><div dir="auto" lang="en">5 posts today</div></article>
          <div><h2>Alice</h2><div>1,024 posts</div></div>
        </body></html>
        "#;
        assert_eq!(scan_profile(html).estimated_count_text.as_deref(), Some("1,024 posts"));
    }

    #[test]
    fn test_scan_profile_without_header() {
        let raw = scan_profile("<html><body><p>nothing here</p></body></html>");
        assert_eq!(raw, RawProfileSummary::default());
    }
}
