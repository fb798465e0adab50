// Copyright (c) CareMatch Team
// SPDX-License-Identifier: Apache-2.0

//! Background notification service. Keeps one stage watcher per surrogate
//! with an active match, refreshing the watched set on a timer, and turns
//! watcher notices into notification rows: every matched parent hears about
//! every change, the surrogate only about admin overrides.

use std::collections::{BTreeSet, HashMap, HashSet};
use std::str::FromStr;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use diesel::prelude::*;
use diesel_async::RunQueryDsl;
use tokio::task::JoinHandle;
use tokio::time::interval;
use tracing::{error, info, warn};

use crate::config::Config;
use crate::db::Database;
use crate::error::PlatformError;
use crate::metrics;
use crate::models::matches::{MatchStatus, SurrogateMatch};
use crate::models::notification::NewNotification;
use crate::schema;
use crate::stage::{ProgressStage, StageUpdater};

use super::hub::ChangeHub;
use super::watcher::{
    NotifyPolicy, StageNotice, StageSource, StageSnapshot, StageWatcher, WatchOptions,
};

#[async_trait]
impl StageSource for Database {
    async fn current_stage(
        &self,
        profile_id: &str,
    ) -> Result<Option<StageSnapshot>, PlatformError> {
        let mut conn = self.connection().await?;
        let row: Option<(String, Option<String>)> = schema::profiles::table
            .find(profile_id)
            .select((
                schema::profiles::progress_stage,
                schema::profiles::stage_updated_by,
            ))
            .first(&mut conn)
            .await
            .optional()?;
        Ok(row.and_then(|(stage, updated_by)| {
            let stage = match ProgressStage::from_str(&stage) {
                Ok(stage) => stage,
                Err(e) => {
                    warn!(profile = %profile_id, error = %e, "profile carries unreadable stage");
                    return None;
                }
            };
            Some(StageSnapshot {
                stage,
                updated_by: updated_by.and_then(|u| u.parse().ok()),
            })
        }))
    }
}

struct CaseWatch {
    watcher: JoinHandle<()>,
    writer: JoinHandle<()>,
}

impl CaseWatch {
    fn abort(&self) {
        self.watcher.abort();
        self.writer.abort();
    }
}

pub struct NotificationService {
    db: Arc<Database>,
    hub: ChangeHub,
    watched: HashMap<String, CaseWatch>,
}

impl NotificationService {
    pub fn new(db: Arc<Database>, hub: ChangeHub) -> Self {
        Self {
            db,
            hub,
            watched: HashMap::new(),
        }
    }

    /// Run forever, refreshing the watched set on the configured cadence.
    /// The first refresh happens immediately on startup.
    pub async fn run(mut self) {
        let cadence = Duration::from_millis(Config::get().realtime.watch_refresh_interval_ms);
        let mut refresh = interval(cadence);
        loop {
            refresh.tick().await;
            if let Err(e) = self.refresh_watchers().await {
                warn!(error = %e, "failed to refresh stage watchers");
            }
        }
    }

    async fn refresh_watchers(&mut self) -> Result<(), PlatformError> {
        let mut conn = self.db.connection().await?;
        let ids: Vec<String> = schema::surrogate_matches::table
            .filter(schema::surrogate_matches::status.eq(MatchStatus::Active.as_str()))
            .select(schema::surrogate_matches::surrogate_id)
            .distinct()
            .load(&mut conn)
            .await?;
        drop(conn);

        let want: HashSet<String> = ids.into_iter().collect();
        self.watched.retain(|id, case| {
            if want.contains(id) {
                true
            } else {
                info!(profile = %id, "match no longer active, stopping watcher");
                case.abort();
                false
            }
        });
        for id in want {
            if !self.watched.contains_key(&id) {
                let case = self.watch(id.clone());
                self.watched.insert(id, case);
            }
        }
        Ok(())
    }

    fn watch(&self, surrogate_id: String) -> CaseWatch {
        let options = WatchOptions {
            poll_interval: Duration::from_millis(Config::get().realtime.stage_poll_interval_ms),
            policy: NotifyPolicy::AllChanges,
        };
        let watcher = StageWatcher::new(surrogate_id.clone(), self.db.clone(), &self.hub, options);
        let (mut notices, handle) = watcher.spawn();

        let db = self.db.clone();
        let writer = tokio::spawn(async move {
            while let Some(notice) = notices.recv().await {
                if let Err(e) = deliver(&db, &notice).await {
                    error!(profile = %notice.profile_id, error = %e, "failed to write stage notifications");
                }
            }
        });

        info!(profile = %surrogate_id, "watching stage changes");
        CaseWatch {
            watcher: handle,
            writer,
        }
    }
}

/// Fan one notice out into notification rows and persist them.
async fn deliver(db: &Database, notice: &StageNotice) -> Result<(), PlatformError> {
    let mut conn = db.connection().await?;
    let matches: Vec<SurrogateMatch> = schema::surrogate_matches::table
        .filter(schema::surrogate_matches::surrogate_id.eq(&notice.profile_id))
        .filter(schema::surrogate_matches::status.eq(MatchStatus::Active.as_str()))
        .load(&mut conn)
        .await?;

    let mut parents = BTreeSet::new();
    for m in &matches {
        for parent in m.parent_ids() {
            parents.insert(parent.to_string());
        }
    }
    let parents: Vec<String> = parents.into_iter().collect();

    let rows = notification_rows(notice, &parents);
    if rows.is_empty() {
        return Ok(());
    }

    diesel::insert_into(schema::notifications::table)
        .values(&rows)
        .execute(&mut conn)
        .await?;
    metrics::NOTIFICATIONS_EMITTED.inc_by(rows.len() as u64);
    info!(
        profile = %notice.profile_id,
        stage = notice.to.as_str(),
        recipients = rows.len(),
        "stage change notifications written"
    );
    Ok(())
}

/// Parents are always told; the surrogate only when an admin made the
/// change on their behalf.
fn notification_rows(notice: &StageNotice, parent_ids: &[String]) -> Vec<NewNotification> {
    let mut rows = Vec::new();
    for parent in parent_ids {
        rows.push(NewNotification::stage_change(
            parent.clone(),
            format!(
                "Your surrogate moved to the {} stage",
                notice.to.label()
            ),
        ));
    }
    if notice.updated_by == Some(StageUpdater::Admin) {
        rows.push(NewNotification::stage_change(
            notice.profile_id.clone(),
            format!(
                "Your care team updated your journey to the {} stage",
                notice.to.label()
            ),
        ));
    }
    rows
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::notification::KIND_STAGE_CHANGE;

    fn notice(by: Option<StageUpdater>) -> StageNotice {
        StageNotice {
            profile_id: "s1".into(),
            from: Some(ProgressStage::Pregnancy),
            to: ProgressStage::ObVisit,
            updated_by: by,
        }
    }

    #[test]
    fn parents_are_always_notified() {
        let rows = notification_rows(
            &notice(Some(StageUpdater::Surrogate)),
            &["p1".to_string(), "p2".to_string()],
        );
        assert_eq!(rows.len(), 2);
        assert!(rows.iter().all(|r| r.kind == KIND_STAGE_CHANGE));
        assert_eq!(rows[0].recipient_id, "p1");
        assert_eq!(rows[1].recipient_id, "p2");
    }

    #[test]
    fn surrogate_hears_only_about_admin_overrides() {
        let rows = notification_rows(&notice(Some(StageUpdater::Admin)), &["p1".to_string()]);
        assert_eq!(rows.len(), 2);
        assert!(rows.iter().any(|r| r.recipient_id == "s1"));

        let rows = notification_rows(&notice(Some(StageUpdater::Surrogate)), &["p1".to_string()]);
        assert!(rows.iter().all(|r| r.recipient_id != "s1"));
    }

    #[test]
    fn unmatched_surrogate_authored_change_writes_nothing() {
        let rows = notification_rows(&notice(Some(StageUpdater::Surrogate)), &[]);
        assert!(rows.is_empty());
    }
}
