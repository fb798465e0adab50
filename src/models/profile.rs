// Copyright (c) CareMatch Team
// SPDX-License-Identifier: Apache-2.0

use chrono::{DateTime, NaiveDate, Utc};
use diesel::prelude::*;
use serde::{Deserialize, Serialize};

use crate::schema::profiles;
use crate::stage::gestation::EmbryoDay;
use crate::stage::{ProgressStage, StageUpdater};

pub const ROLE_SURROGATE: &str = "surrogate";
pub const ROLE_PARENT: &str = "parent";
pub const ROLE_ADMIN: &str = "admin";

#[derive(Debug, Clone, PartialEq, Queryable, Selectable, Serialize, Deserialize)]
#[diesel(table_name = profiles)]
#[diesel(check_for_backend(diesel::pg::Pg))]
pub struct Profile {
    pub id: String,
    pub role: String,
    pub display_name: String,
    pub email: Option<String>,
    pub date_of_birth: Option<NaiveDate>,
    pub location: Option<String>,
    pub race: Option<String>,
    pub progress_stage: String,
    pub stage_updated_by: Option<String>,
    pub stage_updated_at: Option<DateTime<Utc>>,
    pub transfer_date: Option<NaiveDate>,
    pub transfer_embryo_day: Option<i32>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Profile {
    pub fn is_surrogate(&self) -> bool {
        self.role == ROLE_SURROGATE
    }

    /// Parsed stage; `None` when the stored value is not a known stage,
    /// which active stage filters treat as missing data.
    pub fn stage(&self) -> Option<ProgressStage> {
        self.progress_stage.parse().ok()
    }

    pub fn stage_updater(&self) -> Option<StageUpdater> {
        self.stage_updated_by.as_deref().and_then(|s| s.parse().ok())
    }

    pub fn embryo_day(&self) -> Option<EmbryoDay> {
        self.transfer_embryo_day.and_then(EmbryoDay::from_i32)
    }
}

#[derive(Debug, Insertable, Serialize, Deserialize)]
#[diesel(table_name = profiles)]
pub struct NewProfile {
    pub id: String,
    pub role: String,
    pub display_name: String,
    pub email: Option<String>,
    pub date_of_birth: Option<NaiveDate>,
    pub location: Option<String>,
    pub race: Option<String>,
    pub progress_stage: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Default, AsChangeset, Serialize, Deserialize)]
#[diesel(table_name = profiles)]
pub struct UpdateProfile {
    pub display_name: Option<String>,
    pub email: Option<String>,
    pub date_of_birth: Option<NaiveDate>,
    pub location: Option<String>,
    pub race: Option<String>,
    pub transfer_date: Option<NaiveDate>,
    pub transfer_embryo_day: Option<i32>,
    pub updated_at: Option<DateTime<Utc>>,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn profile(stage: &str) -> Profile {
        let now = Utc::now();
        Profile {
            id: "p1".into(),
            role: ROLE_SURROGATE.into(),
            display_name: "Avery".into(),
            email: None,
            date_of_birth: None,
            location: None,
            race: None,
            progress_stage: stage.into(),
            stage_updated_by: Some("admin".into()),
            stage_updated_at: Some(now),
            transfer_date: None,
            transfer_embryo_day: Some(5),
            created_at: now,
            updated_at: now,
        }
    }

    #[test]
    fn stage_parses_known_values() {
        assert_eq!(profile("ob_visit").stage(), Some(ProgressStage::ObVisit));
        assert_eq!(profile("mystery").stage(), None);
    }

    #[test]
    fn embryo_day_rejects_unknown_values() {
        let mut p = profile("pre");
        assert_eq!(p.embryo_day(), Some(EmbryoDay::Five));
        p.transfer_embryo_day = Some(7);
        assert_eq!(p.embryo_day(), None);
    }
}
