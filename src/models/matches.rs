// Copyright (c) CareMatch Team
// SPDX-License-Identifier: Apache-2.0

use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, NaiveDate, Utc};
use diesel::prelude::*;
use serde::{Deserialize, Serialize};

use crate::schema::surrogate_matches;

/// Lifecycle status of an engagement. Matches are never deleted, only moved
/// between these states.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MatchStatus {
    Active,
    Completed,
    Cancelled,
    OnHold,
}

impl MatchStatus {
    pub const ALL: [MatchStatus; 4] = [
        MatchStatus::Active,
        MatchStatus::Completed,
        MatchStatus::Cancelled,
        MatchStatus::OnHold,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Active => "active",
            Self::Completed => "completed",
            Self::Cancelled => "cancelled",
            Self::OnHold => "on_hold",
        }
    }
}

impl fmt::Display for MatchStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for MatchStatus {
    type Err = String;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value {
            "active" => Ok(Self::Active),
            "completed" => Ok(Self::Completed),
            "cancelled" => Ok(Self::Cancelled),
            "on_hold" => Ok(Self::OnHold),
            other => Err(format!("unknown match status: {other:?}")),
        }
    }
}

/// One surrogacy engagement: the surrogate, up to two intended parents and
/// the milestone dates the agency tracks against it.
#[derive(Debug, Clone, PartialEq, Queryable, Selectable, Serialize, Deserialize)]
#[diesel(table_name = surrogate_matches)]
#[diesel(check_for_backend(diesel::pg::Pg))]
pub struct SurrogateMatch {
    pub id: String,
    pub surrogate_id: String,
    pub parent_id: Option<String>,
    pub secondary_parent_id: Option<String>,
    pub status: String,
    pub sign_date: Option<NaiveDate>,
    pub transfer_date: Option<NaiveDate>,
    pub beta_confirm_date: Option<NaiveDate>,
    pub due_date: Option<NaiveDate>,
    pub legal_clearance_date: Option<NaiveDate>,
    pub medication_start_date: Option<NaiveDate>,
    pub pregnancy_test_date: Option<NaiveDate>,
    pub second_pregnancy_test_date: Option<NaiveDate>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl SurrogateMatch {
    pub fn status(&self) -> Option<MatchStatus> {
        self.status.parse().ok()
    }

    pub fn is_active(&self) -> bool {
        self.status() == Some(MatchStatus::Active)
    }

    /// Both named parent ids, primary first.
    pub fn parent_ids(&self) -> impl Iterator<Item = &str> {
        self.parent_id
            .as_deref()
            .into_iter()
            .chain(self.secondary_parent_id.as_deref())
    }

    pub fn involves(&self, profile_id: &str) -> bool {
        self.surrogate_id == profile_id || self.parent_ids().any(|p| p == profile_id)
    }

    /// The match a viewer's stage mirror binds to: the active match when
    /// one exists, otherwise the most recent. `matches` must be ordered
    /// newest first.
    pub fn anchor(matches: &[SurrogateMatch]) -> Option<&SurrogateMatch> {
        matches
            .iter()
            .find(|m| m.is_active())
            .or_else(|| matches.get(0))
    }
}

#[derive(Debug, Insertable, Serialize, Deserialize)]
#[diesel(table_name = surrogate_matches)]
pub struct NewSurrogateMatch {
    pub id: String,
    pub surrogate_id: String,
    pub parent_id: Option<String>,
    pub secondary_parent_id: Option<String>,
    pub status: String,
    pub sign_date: Option<NaiveDate>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Default, AsChangeset, Serialize, Deserialize)]
#[diesel(table_name = surrogate_matches)]
pub struct UpdateSurrogateMatch {
    pub parent_id: Option<String>,
    pub secondary_parent_id: Option<String>,
    pub status: Option<String>,
    pub sign_date: Option<NaiveDate>,
    pub transfer_date: Option<NaiveDate>,
    pub beta_confirm_date: Option<NaiveDate>,
    pub due_date: Option<NaiveDate>,
    pub legal_clearance_date: Option<NaiveDate>,
    pub medication_start_date: Option<NaiveDate>,
    pub pregnancy_test_date: Option<NaiveDate>,
    pub second_pregnancy_test_date: Option<NaiveDate>,
    pub updated_at: Option<DateTime<Utc>>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn status_round_trips() {
        for status in MatchStatus::ALL {
            assert_eq!(status.as_str().parse::<MatchStatus>().unwrap(), status);
        }
        assert!("archived".parse::<MatchStatus>().is_err());
    }

    #[test]
    fn parent_ids_skip_missing_slots() {
        let now = Utc::now();
        let mut m = SurrogateMatch {
            id: "m1".into(),
            surrogate_id: "s1".into(),
            parent_id: Some("p1".into()),
            secondary_parent_id: None,
            status: "active".into(),
            sign_date: None,
            transfer_date: None,
            beta_confirm_date: None,
            due_date: None,
            legal_clearance_date: None,
            medication_start_date: None,
            pregnancy_test_date: None,
            second_pregnancy_test_date: None,
            created_at: now,
            updated_at: now,
        };
        assert_eq!(m.parent_ids().collect::<Vec<_>>(), vec!["p1"]);
        m.secondary_parent_id = Some("p2".into());
        assert_eq!(m.parent_ids().collect::<Vec<_>>(), vec!["p1", "p2"]);
        assert!(m.involves("s1"));
        assert!(m.involves("p2"));
        assert!(!m.involves("p3"));
    }

    fn match_with_status(id: &str, status: &str) -> SurrogateMatch {
        let now = Utc::now();
        SurrogateMatch {
            id: id.into(),
            surrogate_id: "s1".into(),
            parent_id: None,
            secondary_parent_id: None,
            status: status.into(),
            sign_date: None,
            transfer_date: None,
            beta_confirm_date: None,
            due_date: None,
            legal_clearance_date: None,
            medication_start_date: None,
            pregnancy_test_date: None,
            second_pregnancy_test_date: None,
            created_at: now,
            updated_at: now,
        }
    }

    #[test]
    fn anchor_prefers_the_active_match() {
        let rows = vec![
            match_with_status("m2", "cancelled"),
            match_with_status("m1", "active"),
        ];
        let anchor = SurrogateMatch::anchor(&rows).unwrap();
        assert_eq!(anchor.id, "m1");
    }

    #[test]
    fn anchor_falls_back_to_the_newest_match() {
        let rows = vec![
            match_with_status("m3", "on_hold"),
            match_with_status("m2", "completed"),
        ];
        let anchor = SurrogateMatch::anchor(&rows).unwrap();
        assert_eq!(anchor.id, "m3");
        assert!(SurrogateMatch::anchor(&[]).is_none());
    }
}
