// Copyright (c) CareMatch Team
// SPDX-License-Identifier: Apache-2.0

//! Case file documents. Each row records where a file landed in storage and
//! which side of the match it belongs to; the bytes themselves live in the
//! object store, not in Postgres.

use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use diesel::prelude::*;
use serde::{Deserialize, Serialize};

use crate::schema::documents;

/// Document categories the agency tracks per case.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DocumentKind {
    Contract,
    AttorneyRetainer,
    Insurance,
    /// Pre-birth order.
    Pbo,
    Claim,
    AgencyRetainer,
    HipaaRelease,
    PhotoRelease,
}

impl DocumentKind {
    pub const ALL: [DocumentKind; 8] = [
        DocumentKind::Contract,
        DocumentKind::AttorneyRetainer,
        DocumentKind::Insurance,
        DocumentKind::Pbo,
        DocumentKind::Claim,
        DocumentKind::AgencyRetainer,
        DocumentKind::HipaaRelease,
        DocumentKind::PhotoRelease,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Contract => "contract",
            Self::AttorneyRetainer => "attorney_retainer",
            Self::Insurance => "insurance",
            Self::Pbo => "pbo",
            Self::Claim => "claim",
            Self::AgencyRetainer => "agency_retainer",
            Self::HipaaRelease => "hipaa_release",
            Self::PhotoRelease => "photo_release",
        }
    }
}

impl fmt::Display for DocumentKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for DocumentKind {
    type Err = String;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .iter()
            .find(|kind| kind.as_str() == value)
            .copied()
            .ok_or_else(|| format!("unknown document kind: {value:?}"))
    }
}

#[derive(Debug, Clone, Queryable, Selectable, Serialize, Deserialize)]
#[diesel(table_name = documents)]
#[diesel(check_for_backend(diesel::pg::Pg))]
pub struct Document {
    pub id: String,
    pub kind: String,
    pub surrogate_id: Option<String>,
    pub parent_id: Option<String>,
    pub storage_path: String,
    pub uploaded_by: String,
    pub uploaded_at: DateTime<Utc>,
}

impl Document {
    pub fn kind(&self) -> Option<DocumentKind> {
        self.kind.parse().ok()
    }
}

#[derive(Debug, Insertable, Serialize, Deserialize)]
#[diesel(table_name = documents)]
pub struct NewDocument {
    pub id: String,
    pub kind: String,
    pub surrogate_id: Option<String>,
    pub parent_id: Option<String>,
    pub storage_path: String,
    pub uploaded_by: String,
    pub uploaded_at: DateTime<Utc>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn kind_round_trips_through_str() {
        for kind in DocumentKind::ALL {
            assert_eq!(kind.as_str().parse::<DocumentKind>(), Ok(kind));
        }
    }

    #[test]
    fn unknown_kind_is_rejected() {
        assert!("passport".parse::<DocumentKind>().is_err());
    }
}
