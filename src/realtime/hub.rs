// Copyright (c) CareMatch Team
// SPDX-License-Identifier: Apache-2.0

use tokio::sync::broadcast;

use super::StageChange;

const HUB_CAPACITY: usize = 256;

/// Broadcast fan-out for stage writes. Every API-side stage write publishes
/// here; watchers subscribe. A lagged or missing subscriber is not an error,
/// the poll fallback reconciles it.
#[derive(Clone)]
pub struct ChangeHub {
    tx: broadcast::Sender<StageChange>,
}

impl ChangeHub {
    pub fn new() -> Self {
        let (tx, _) = broadcast::channel(HUB_CAPACITY);
        Self { tx }
    }

    /// Publish a change. Having zero live subscribers is normal.
    pub fn publish(&self, change: StageChange) {
        let _ = self.tx.send(change);
    }

    pub fn subscribe(&self) -> broadcast::Receiver<StageChange> {
        self.tx.subscribe()
    }
}

impl Default for ChangeHub {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::stage::ProgressStage;
    use chrono::Utc;

    #[test_log::test(tokio::test)]
    async fn subscribers_receive_published_changes() {
        let hub = ChangeHub::new();
        let mut rx = hub.subscribe();
        hub.publish(StageChange {
            profile_id: "s1".into(),
            stage: ProgressStage::Pregnancy,
            updated_by: None,
            changed_at: Utc::now(),
        });
        let change = rx.recv().await.unwrap();
        assert_eq!(change.profile_id, "s1");
        assert_eq!(change.stage, ProgressStage::Pregnancy);
    }

    #[test_log::test(tokio::test)]
    async fn publish_without_subscribers_is_harmless() {
        let hub = ChangeHub::new();
        hub.publish(StageChange {
            profile_id: "s1".into(),
            stage: ProgressStage::Delivery,
            updated_by: None,
            changed_at: Utc::now(),
        });
    }
}
