// Copyright (c) CareMatch Team
// SPDX-License-Identifier: Apache-2.0

//! Business-statistics pipeline: parameter parsing in [`params`], the
//! in-memory join/filter/aggregate pass in [`engine`].

pub mod engine;
pub mod params;

pub use engine::{run, Statistics, StatisticsInputs, StatisticsReport};
pub use params::{StatisticsFilter, StatisticsQuery};

/// Upper bound on match rows loaded per request, newest first.
pub const MATCH_WINDOW: i64 = 1000;
