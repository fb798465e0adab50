// Copyright (c) CareMatch Team
// SPDX-License-Identifier: Apache-2.0

pub mod api;
pub mod client;
pub mod config;
pub mod dates;
pub mod db;
pub mod error;
pub mod metrics;
pub mod models;
pub mod realtime;
pub mod schema;
pub mod stage;
pub mod stats;
