// Copyright (c) CareMatch Team
// SPDX-License-Identifier: Apache-2.0

use chrono::{DateTime, Utc};
use diesel::prelude::*;
use serde::{Deserialize, Serialize};

use crate::schema::notifications;

/// Notification kind emitted when a watched profile changes stage.
pub const KIND_STAGE_CHANGE: &str = "stage_change";

#[derive(Debug, Clone, Queryable, Selectable, Serialize, Deserialize)]
#[diesel(table_name = notifications)]
#[diesel(check_for_backend(diesel::pg::Pg))]
pub struct Notification {
    pub id: String,
    pub recipient_id: String,
    pub kind: String,
    pub body: String,
    pub read: bool,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Insertable, Serialize, Deserialize)]
#[diesel(table_name = notifications)]
pub struct NewNotification {
    pub id: String,
    pub recipient_id: String,
    pub kind: String,
    pub body: String,
    pub read: bool,
    pub created_at: DateTime<Utc>,
}

impl NewNotification {
    pub fn stage_change(recipient_id: impl Into<String>, body: impl Into<String>) -> Self {
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            recipient_id: recipient_id.into(),
            kind: KIND_STAGE_CHANGE.to_string(),
            body: body.into(),
            read: false,
            created_at: Utc::now(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn stage_change_builder_sets_kind_and_unread() {
        let n = NewNotification::stage_change("p1", "Your surrogate reached Pregnancy");
        assert_eq!(n.kind, KIND_STAGE_CHANGE);
        assert!(!n.read);
        assert_eq!(n.recipient_id, "p1");
    }
}
