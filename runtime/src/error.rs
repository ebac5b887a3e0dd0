// Copyright 2026 Feedscout Contributors
// SPDX-License-Identifier: Apache-2.0

//! Configuration errors.
//!
//! Everything past startup propagates as `anyhow::Error` with context.

/// Invalid invocation, detected before the browser is launched.
#[derive(thiserror::Error, Debug)]
pub enum ConfigError {
    #[error("Target must not be empty")]
    EmptyTarget,

    #[error("Invalid base URL {url:?}: {source}")]
    InvalidBaseUrl {
        url: String,
        #[source]
        source: url::ParseError,
    },

    #[error("Base URL {0} cannot carry a path")]
    CannotBeABase(String),

    #[error("Max results per query must be a positive number, got {0}")]
    InvalidMaxPerQuery(f64),

    #[error("Buffer coefficient must be a positive number, got {0}")]
    InvalidBufferCoefficient(f64),

    #[error("--limit only applies to raw path targets")]
    LimitWithoutPath,
}
