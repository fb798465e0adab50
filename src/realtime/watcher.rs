// Copyright (c) CareMatch Team
// SPDX-License-Identifier: Apache-2.0

//! Per-profile stage watcher.
//!
//! One task owns the last-seen stage and merges two detection paths: the
//! broadcast hub (push) and a fixed-interval poll of the same row. A push
//! delivery resets the poll timer, so the fallback only fires when the push
//! path has been quiet for a full interval; because a single owner compares
//! every observation against last-seen, an actual value change is delivered
//! exactly once no matter which path saw it first.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use tokio::sync::{broadcast, mpsc};
use tokio::task::JoinHandle;
use tokio::time::{interval, MissedTickBehavior};
use tracing::{debug, warn};

use crate::error::PlatformError;
use crate::stage::{ProgressStage, StageUpdater};

use super::hub::ChangeHub;
use super::StageChange;

/// Remote view of one profile's stage, used by the poll fallback.
#[async_trait]
pub trait StageSource: Send + Sync {
    async fn current_stage(&self, profile_id: &str)
        -> Result<Option<StageSnapshot>, PlatformError>;
}

/// What a poll observes: the stage plus who last wrote it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StageSnapshot {
    pub stage: ProgressStage,
    pub updated_by: Option<StageUpdater>,
}

/// Which observed changes turn into notices.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NotifyPolicy {
    /// Every change; matched parents watch this way.
    AllChanges,
    /// Only admin-authored changes; a surrogate watching their own profile
    /// is not told about their own writes.
    AdminOnly,
}

#[derive(Debug, Clone)]
pub struct WatchOptions {
    pub poll_interval: Duration,
    pub policy: NotifyPolicy,
}

impl Default for WatchOptions {
    fn default() -> Self {
        Self {
            poll_interval: Duration::from_secs(10),
            policy: NotifyPolicy::AllChanges,
        }
    }
}

/// One observed change, delivered at most once per actual value change.
#[derive(Debug, Clone, PartialEq)]
pub struct StageNotice {
    pub profile_id: String,
    pub from: Option<ProgressStage>,
    pub to: ProgressStage,
    pub updated_by: Option<StageUpdater>,
}

/// Advance the task-owned last-seen value with one observation. The first
/// sighting is absorbed silently; a suppressed change still advances
/// last-seen so a later poll cannot resurrect it.
fn advance(
    last_seen: &mut Option<ProgressStage>,
    profile_id: &str,
    stage: ProgressStage,
    updated_by: Option<StageUpdater>,
    policy: NotifyPolicy,
) -> Option<StageNotice> {
    let previous = *last_seen;
    match previous {
        Some(prev) if prev == stage => None,
        _ => {
            *last_seen = Some(stage);
            if previous.is_none() {
                return None;
            }
            match policy {
                NotifyPolicy::AllChanges => {}
                NotifyPolicy::AdminOnly => {
                    if updated_by != Some(StageUpdater::Admin) {
                        return None;
                    }
                }
            }
            Some(StageNotice {
                profile_id: profile_id.to_string(),
                from: previous,
                to: stage,
                updated_by,
            })
        }
    }
}

/// Watches one profile's stage through the hub with a poll fallback.
pub struct StageWatcher<S> {
    profile_id: String,
    source: Arc<S>,
    updates: broadcast::Receiver<StageChange>,
    options: WatchOptions,
}

impl<S: StageSource + 'static> StageWatcher<S> {
    pub fn new(
        profile_id: impl Into<String>,
        source: Arc<S>,
        hub: &ChangeHub,
        options: WatchOptions,
    ) -> Self {
        Self {
            profile_id: profile_id.into(),
            source,
            updates: hub.subscribe(),
            options,
        }
    }

    /// Spawn the watch loop. Notices arrive on the returned receiver; the
    /// loop ends when the receiver is dropped or the handle is aborted.
    pub fn spawn(self) -> (mpsc::Receiver<StageNotice>, JoinHandle<()>) {
        let (tx, rx) = mpsc::channel(16);
        let handle = tokio::spawn(self.run(tx));
        (rx, handle)
    }

    async fn run(mut self, out: mpsc::Sender<StageNotice>) {
        let mut poll = interval(self.options.poll_interval);
        poll.set_missed_tick_behavior(MissedTickBehavior::Delay);

        // Seed last-seen so the first observation is not reported as a
        // change. If the seed fails the first poll absorbs it instead.
        let mut last_seen = match self.source.current_stage(&self.profile_id).await {
            Ok(snapshot) => snapshot.map(|s| s.stage),
            Err(e) => {
                warn!(profile = %self.profile_id, error = %e, "stage seed failed");
                None
            }
        };

        let mut hub_alive = true;
        loop {
            tokio::select! {
                change = self.updates.recv(), if hub_alive => match change {
                    Ok(change) if change.profile_id == self.profile_id => {
                        if let Some(notice) = advance(
                            &mut last_seen,
                            &self.profile_id,
                            change.stage,
                            change.updated_by,
                            self.options.policy,
                        ) {
                            if out.send(notice).await.is_err() {
                                break;
                            }
                        }
                        // Push delivered; push the fallback out a full
                        // interval.
                        poll.reset();
                    }
                    Ok(_) => {}
                    Err(broadcast::error::RecvError::Lagged(skipped)) => {
                        warn!(profile = %self.profile_id, skipped, "hub receiver lagged, poll will reconcile");
                    }
                    Err(broadcast::error::RecvError::Closed) => {
                        warn!(profile = %self.profile_id, "change hub closed, continuing on poll only");
                        hub_alive = false;
                    }
                },
                _ = poll.tick() => {
                    match self.source.current_stage(&self.profile_id).await {
                        Ok(Some(snapshot)) => {
                            if let Some(notice) = advance(
                                &mut last_seen,
                                &self.profile_id,
                                snapshot.stage,
                                snapshot.updated_by,
                                self.options.policy,
                            ) {
                                if out.send(notice).await.is_err() {
                                    break;
                                }
                            }
                        }
                        Ok(None) => {
                            debug!(profile = %self.profile_id, "watched profile has no stage yet");
                        }
                        Err(e) => {
                            warn!(profile = %self.profile_id, error = %e, "stage poll failed");
                        }
                    }
                }
            }
        }
    }
}
