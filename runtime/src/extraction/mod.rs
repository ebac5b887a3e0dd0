// Copyright 2026 Feedscout Contributors
// SPDX-License-Identifier: Apache-2.0

//! Extraction of posts and profile headers from rendered snapshots.

pub mod posts;
pub mod profile;
