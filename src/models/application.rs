// Copyright (c) CareMatch Team
// SPDX-License-Identifier: Apache-2.0

//! Intake applications. The stored `form_data` blob is schema-on-read: the
//! fields the platform actually consumes are typed here, and everything else
//! rides along in a flattened map so unknown answers survive a round trip.

use std::fmt;

use chrono::{DateTime, Utc};
use diesel::prelude::*;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::schema::applications;

#[derive(Debug, Clone, Queryable, Selectable, Serialize, Deserialize)]
#[diesel(table_name = applications)]
#[diesel(check_for_backend(diesel::pg::Pg))]
pub struct Application {
    pub id: String,
    pub surrogate_id: String,
    pub form_data: Value,
    pub submitted_at: DateTime<Utc>,
}

impl Application {
    pub fn form(&self) -> ApplicationForm {
        ApplicationForm::from_value(self.form_data.clone())
    }
}

#[derive(Debug, Insertable, Serialize, Deserialize)]
#[diesel(table_name = applications)]
pub struct NewApplication {
    pub id: String,
    pub surrogate_id: String,
    pub form_data: Value,
    pub submitted_at: DateTime<Utc>,
}

/// Canonical marital-status labels the filter engine compares against.
/// Raw forms carry a mix of boolean flags and free text; everything maps
/// onto one of these before any comparison.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MaritalStatus {
    Married,
    Single,
    Divorced,
    Widowed,
    Partnered,
}

impl MaritalStatus {
    pub const ALL: [MaritalStatus; 5] = [
        MaritalStatus::Married,
        MaritalStatus::Single,
        MaritalStatus::Divorced,
        MaritalStatus::Widowed,
        MaritalStatus::Partnered,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Married => "married",
            Self::Single => "single",
            Self::Divorced => "divorced",
            Self::Widowed => "widowed",
            Self::Partnered => "partnered",
        }
    }

    /// Map free-text form answers onto a canonical label.
    pub fn from_text(text: &str) -> Option<Self> {
        match text.trim().to_lowercase().as_str() {
            "married" | "m" => Some(Self::Married),
            "single" | "s" | "never married" => Some(Self::Single),
            "divorced" | "separated" => Some(Self::Divorced),
            "widowed" | "widow" | "widower" => Some(Self::Widowed),
            "partnered" | "domestic partnership" | "engaged" => Some(Self::Partnered),
            _ => None,
        }
    }
}

impl fmt::Display for MaritalStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// The typed view of an intake form.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ApplicationForm {
    pub blood_type: Option<String>,
    pub marital_status: Option<String>,
    pub is_married: Option<bool>,
    pub deliveries_count: Option<u32>,
    pub has_delivered: Option<bool>,
    #[serde(flatten)]
    pub extra: serde_json::Map<String, Value>,
}

impl ApplicationForm {
    /// Decode a stored blob, tolerating shapes we do not recognize.
    pub fn from_value(value: Value) -> Self {
        serde_json::from_value(value).unwrap_or_default()
    }

    pub fn to_value(&self) -> Value {
        serde_json::to_value(self).unwrap_or(Value::Null)
    }

    /// Canonical marital status: the boolean flag wins when present,
    /// otherwise the free-text answer is normalized.
    pub fn canonical_marital_status(&self) -> Option<MaritalStatus> {
        if let Some(married) = self.is_married {
            return Some(if married {
                MaritalStatus::Married
            } else {
                MaritalStatus::Single
            });
        }
        self.marital_status
            .as_deref()
            .and_then(MaritalStatus::from_text)
    }

    /// Whether the applicant has carried a delivery before, from whichever
    /// field the form version used.
    pub fn delivered_before(&self) -> Option<bool> {
        if let Some(flag) = self.has_delivered {
            return Some(flag);
        }
        self.deliveries_count.map(|count| count > 0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn boolean_flag_beats_free_text() {
        let form = ApplicationForm::from_value(json!({
            "is_married": false,
            "marital_status": "Married"
        }));
        assert_eq!(form.canonical_marital_status(), Some(MaritalStatus::Single));
    }

    #[test]
    fn free_text_variants_normalize() {
        for (raw, expected) in [
            ("Married", MaritalStatus::Married),
            ("  single ", MaritalStatus::Single),
            ("Domestic Partnership", MaritalStatus::Partnered),
            ("WIDOW", MaritalStatus::Widowed),
        ] {
            let form = ApplicationForm::from_value(json!({ "marital_status": raw }));
            assert_eq!(form.canonical_marital_status(), Some(expected), "{raw}");
        }
        let form = ApplicationForm::from_value(json!({ "marital_status": "complicated" }));
        assert_eq!(form.canonical_marital_status(), None);
    }

    #[test]
    fn delivery_history_from_count_or_flag() {
        let by_count = ApplicationForm::from_value(json!({ "deliveries_count": 2 }));
        assert_eq!(by_count.delivered_before(), Some(true));
        let zero = ApplicationForm::from_value(json!({ "deliveries_count": 0 }));
        assert_eq!(zero.delivered_before(), Some(false));
        let by_flag = ApplicationForm::from_value(json!({ "has_delivered": true }));
        assert_eq!(by_flag.delivered_before(), Some(true));
        let silent = ApplicationForm::from_value(json!({}));
        assert_eq!(silent.delivered_before(), None);
    }

    #[test]
    fn unknown_keys_survive_round_trip() {
        let original = json!({
            "blood_type": "O+",
            "favorite_color": "teal",
            "references": [{"name": "Dana"}]
        });
        let form = ApplicationForm::from_value(original);
        assert_eq!(form.blood_type.as_deref(), Some("O+"));
        assert_eq!(form.extra["favorite_color"], json!("teal"));
        let back = form.to_value();
        assert_eq!(back["references"][0]["name"], json!("Dana"));
    }
}
