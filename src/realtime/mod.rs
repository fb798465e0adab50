// Copyright (c) CareMatch Team
// SPDX-License-Identifier: Apache-2.0

//! Stage-change propagation: an in-process broadcast hub fed by the API
//! layer, per-profile watchers that combine the hub with a poll fallback,
//! and the background service that turns watcher notices into notification
//! rows.

use chrono::{DateTime, Utc};

use crate::stage::{ProgressStage, StageUpdater};

pub mod hub;
pub mod service;
pub mod watcher;

pub use hub::ChangeHub;
pub use service::NotificationService;
pub use watcher::{
    NotifyPolicy, StageNotice, StageSnapshot, StageSource, StageWatcher, WatchOptions,
};

/// A stage write on one profile, as published to the hub.
#[derive(Debug, Clone, PartialEq)]
pub struct StageChange {
    pub profile_id: String,
    pub stage: ProgressStage,
    pub updated_by: Option<StageUpdater>,
    pub changed_at: DateTime<Utc>,
}
