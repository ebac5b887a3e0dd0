// Copyright 2026 Feedscout Contributors
// SPDX-License-Identifier: Apache-2.0

//! Command-line and environment configuration.
//!
//! Flags are parsed with clap into [`ScoutArgs`]; environment switches are
//! read once into [`EnvSettings`]. [`ScoutArgs::into_config`] validates both
//! and produces the [`ScoutConfig`] the binary runs with.

use crate::discovery::DiscoveryOptions;
use crate::error::ConfigError;
use crate::renderer::chromium::LaunchOptions;
use crate::search::partition::{RangeEstimator, DEFAULT_BUFFER_COEFFICIENT, DEFAULT_MAX_PER_QUERY};
use crate::types::{CrawlOptions, CrawlOverrides};
use clap::Parser;
use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;
use url::Url;

pub const DEFAULT_BASE_URL: &str = "https://twitter.com";

/// Any non-empty value runs the browser headless.
pub const HEADLESS_ENV: &str = "HEADLESS";
/// Any non-empty value switches to profile-only mode.
pub const PROFILE_ONLY_ENV: &str = "USER_DETAILS";
/// Explicit Chromium binary.
pub const CHROMIUM_PATH_ENV: &str = "FEEDSCOUT_CHROMIUM_PATH";

/// What to crawl.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Target {
    /// A subject handle, leading `@` stripped.
    Subject(String),
    /// A raw path or query relative to the base URL, e.g. `search?q=rust`.
    Path(String),
}

impl Target {
    pub fn parse(raw: &str) -> Result<Self, ConfigError> {
        let raw = raw.trim();
        if raw.contains('/') || raw.contains('?') {
            return Ok(Target::Path(raw.to_string()));
        }
        let handle = raw.trim_start_matches('@');
        if handle.is_empty() {
            return Err(ConfigError::EmptyTarget);
        }
        Ok(Target::Subject(handle.to_string()))
    }
}

impl FromStr for Target {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Target::parse(s)
    }
}

/// Switches read from the process environment.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct EnvSettings {
    pub headless: bool,
    pub profile_only: bool,
    pub chrome_path: Option<PathBuf>,
}

impl EnvSettings {
    pub fn from_env() -> Self {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    /// Build from an arbitrary variable lookup.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let flag = |name: &str| lookup(name).is_some_and(|value| !value.is_empty());
        Self {
            headless: flag(HEADLESS_ENV),
            profile_only: flag(PROFILE_ONLY_ENV),
            chrome_path: lookup(CHROMIUM_PATH_ENV)
                .filter(|value| !value.is_empty())
                .map(PathBuf::from),
        }
    }
}

/// Discover a subject's post history from an infinitely-scrolling feed.
///
/// Posts are written to stdout as JSON lines; the profile summary and
/// logs go to stderr.
#[derive(Parser, Debug, Clone)]
#[command(name = "feedscout", version, about)]
pub struct ScoutArgs {
    /// Subject handle (e.g. `@alice`) or a raw path such as `search?q=rust`.
    pub target: String,

    /// Site root for feed and search URLs.
    #[arg(long, default_value = DEFAULT_BASE_URL)]
    pub base_url: String,

    /// Upper bound on waiting for the next page to load.
    #[arg(long, default_value_t = 10_000)]
    pub next_page_timeout_ms: u64,

    /// Pause after each scroll before waiting for the next page.
    #[arg(long, default_value_t = 500)]
    pub next_page_pause_ms: u64,

    /// Read only what is rendered initially.
    #[arg(long)]
    pub no_paginate: bool,

    /// Upper bound on each navigation.
    #[arg(long, default_value_t = 30_000)]
    pub navigation_timeout_ms: u64,

    /// Results a single search view reliably returns.
    #[arg(long, default_value_t = DEFAULT_MAX_PER_QUERY)]
    pub max_per_query: f64,

    /// Safety multiplier on the estimated number of searches.
    #[arg(long, default_value_t = DEFAULT_BUFFER_COEFFICIENT)]
    pub buffer_coefficient: f64,

    /// Print the profile summary and stop (also enabled by USER_DETAILS).
    #[arg(long)]
    pub profile_only: bool,

    /// Stop after this many posts (raw path targets only).
    #[arg(long)]
    pub limit: Option<usize>,

    /// Log level used when RUST_LOG is unset.
    #[arg(long, default_value = "info")]
    pub log_level: String,
}

/// Validated runtime configuration.
#[derive(Debug, Clone)]
pub struct ScoutConfig {
    pub target: Target,
    pub discovery: DiscoveryOptions,
    pub launch: LaunchOptions,
    pub navigation_timeout: Duration,
    pub limit: Option<usize>,
}

/// Parse a base URL that can carry feed paths.
pub fn parse_base_url(raw: &str) -> Result<Url, ConfigError> {
    let url = Url::parse(raw).map_err(|source| ConfigError::InvalidBaseUrl {
        url: raw.to_string(),
        source,
    })?;
    if url.cannot_be_a_base() {
        return Err(ConfigError::CannotBeABase(raw.to_string()));
    }
    Ok(url)
}

fn positive(value: f64) -> bool {
    value.is_finite() && value > 0.0
}

impl ScoutArgs {
    pub fn into_config(self, env: &EnvSettings) -> Result<ScoutConfig, ConfigError> {
        let target = Target::parse(&self.target)?;
        let base_url = parse_base_url(&self.base_url)?;

        if !positive(self.max_per_query) {
            return Err(ConfigError::InvalidMaxPerQuery(self.max_per_query));
        }
        if !positive(self.buffer_coefficient) {
            return Err(ConfigError::InvalidBufferCoefficient(self.buffer_coefficient));
        }
        if self.limit.is_some() && !matches!(target, Target::Path(_)) {
            return Err(ConfigError::LimitWithoutPath);
        }

        let crawl = CrawlOptions::default().merge(CrawlOverrides {
            paginate: Some(!self.no_paginate),
            next_page_timeout_ms: Some(self.next_page_timeout_ms),
            next_page_pause_ms: Some(self.next_page_pause_ms),
            base_url: Some(base_url.clone()),
            ..Default::default()
        });

        Ok(ScoutConfig {
            target,
            discovery: DiscoveryOptions {
                base_url,
                crawl,
                estimator: RangeEstimator {
                    max_per_query: self.max_per_query,
                    buffer_coefficient: self.buffer_coefficient,
                },
                profile_only: self.profile_only || env.profile_only,
            },
            launch: LaunchOptions {
                headless: env.headless,
                chrome_path: env.chrome_path.clone(),
            },
            navigation_timeout: Duration::from_millis(self.navigation_timeout_ms),
            limit: self.limit,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn args(argv: &[&str]) -> ScoutArgs {
        let mut full = vec!["feedscout"];
        full.extend_from_slice(argv);
        ScoutArgs::try_parse_from(full).unwrap()
    }

    #[test]
    fn test_target_forms() {
        assert_eq!(Target::parse("@alice").unwrap(), Target::Subject("alice".into()));
        assert_eq!(Target::parse("alice").unwrap(), Target::Subject("alice".into()));
        assert_eq!(
            Target::parse("search?q=rust").unwrap(),
            Target::Path("search?q=rust".into())
        );
        assert_eq!(
            Target::parse("/alice/likes").unwrap(),
            Target::Path("/alice/likes".into())
        );
        assert!(matches!(Target::parse("@"), Err(ConfigError::EmptyTarget)));
        assert!(matches!(Target::parse("  "), Err(ConfigError::EmptyTarget)));
    }

    #[test]
    fn test_env_flags_need_non_empty_values() {
        let vars: HashMap<&str, &str> = [("HEADLESS", "1"), ("USER_DETAILS", "")].into();
        let env = EnvSettings::from_lookup(|name| vars.get(name).map(|v| v.to_string()));
        assert!(env.headless);
        assert!(!env.profile_only);
        assert_eq!(env.chrome_path, None);
    }

    #[test]
    fn test_defaults() {
        let config = args(&["@alice"]).into_config(&EnvSettings::default()).unwrap();
        assert_eq!(config.target, Target::Subject("alice".into()));
        assert_eq!(config.discovery.base_url.as_str(), "https://twitter.com/");
        assert!(config.discovery.crawl.paginate);
        assert_eq!(config.discovery.crawl.next_page_timeout_ms, 10_000);
        assert_eq!(config.discovery.crawl.next_page_pause_ms, 500);
        assert_eq!(config.discovery.estimator, RangeEstimator::default());
        assert!(!config.discovery.profile_only);
        assert!(!config.launch.headless);
        assert_eq!(config.navigation_timeout, Duration::from_secs(30));
    }

    #[test]
    fn test_flags_override_defaults() {
        let config = args(&[
            "alice",
            "--no-paginate",
            "--next-page-pause-ms",
            "50",
            "--max-per-query",
            "20",
            "--profile-only",
        ])
        .into_config(&EnvSettings::default())
        .unwrap();
        assert!(!config.discovery.crawl.paginate);
        assert_eq!(config.discovery.crawl.next_page_pause_ms, 50);
        assert_eq!(config.discovery.estimator.max_per_query, 20.0);
        assert!(config.discovery.profile_only);
    }

    #[test]
    fn test_env_enables_profile_only_and_headless() {
        let env = EnvSettings {
            headless: true,
            profile_only: true,
            chrome_path: Some(PathBuf::from("/opt/chromium")),
        };
        let config = args(&["alice"]).into_config(&env).unwrap();
        assert!(config.discovery.profile_only);
        assert!(config.launch.headless);
        assert_eq!(config.launch.chrome_path, Some(PathBuf::from("/opt/chromium")));
    }

    #[test]
    fn test_rejects_invalid_values() {
        let env = EnvSettings::default();
        assert!(matches!(
            args(&["alice", "--max-per-query", "0"]).into_config(&env),
            Err(ConfigError::InvalidMaxPerQuery(_))
        ));
        assert!(matches!(
            args(&["alice", "--buffer-coefficient=-1"]).into_config(&env),
            Err(ConfigError::InvalidBufferCoefficient(_))
        ));
        assert!(matches!(
            args(&["alice", "--base-url", "not a url"]).into_config(&env),
            Err(ConfigError::InvalidBaseUrl { .. })
        ));
        assert!(matches!(
            args(&["alice", "--limit", "5"]).into_config(&env),
            Err(ConfigError::LimitWithoutPath)
        ));
        assert!(args(&["search?q=rust", "--limit", "5"]).into_config(&env).is_ok());
    }
}
