// Copyright (c) CareMatch Team
// SPDX-License-Identifier: Apache-2.0

//! Query-string parameters for the business-statistics endpoint and their
//! validated, typed form. Every parameter arrives as an optional string;
//! parsing happens here, before any row is touched, so a malformed value is
//! a 400 and never a half-evaluated report.

use std::collections::BTreeMap;
use std::str::FromStr;

use chrono::NaiveDate;
use serde::Deserialize;

use crate::dates;
use crate::error::PlatformError;
use crate::models::application::MaritalStatus;
use crate::models::matches::MatchStatus;
use crate::stage::ProgressStage;

/// Raw query parameters, one field per documented filter. Blank values are
/// treated the same as absent ones; the dashboard sends empty strings for
/// untouched selectors.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct StatisticsQuery {
    pub match_status: Option<String>,
    pub surrogate_stage: Option<String>,
    pub surrogate_age_min: Option<String>,
    pub surrogate_age_max: Option<String>,
    pub surrogate_location: Option<String>,
    pub surrogate_race: Option<String>,
    pub surrogate_marital_status: Option<String>,
    pub surrogate_blood_type: Option<String>,
    pub surrogate_bmi_min: Option<String>,
    pub surrogate_bmi_max: Option<String>,
    pub surrogate_has_delivered: Option<String>,
    pub parent_age_min: Option<String>,
    pub parent_age_max: Option<String>,
    pub parent_location: Option<String>,
    pub parent_race: Option<String>,
    pub embryo_testing: Option<String>,
    pub sign_date_from: Option<String>,
    pub sign_date_to: Option<String>,
    pub transfer_date_from: Option<String>,
    pub transfer_date_to: Option<String>,
    pub beta_confirm_date_from: Option<String>,
    pub beta_confirm_date_to: Option<String>,
    pub due_date_from: Option<String>,
    pub due_date_to: Option<String>,
    pub legal_clearance_date_from: Option<String>,
    pub legal_clearance_date_to: Option<String>,
    pub medication_start_date_from: Option<String>,
    pub medication_start_date_to: Option<String>,
    pub pregnancy_test_date_from: Option<String>,
    pub pregnancy_test_date_to: Option<String>,
    pub second_pregnancy_test_date_from: Option<String>,
    pub second_pregnancy_test_date_to: Option<String>,
    pub medical_exam_date_from: Option<String>,
    pub medical_exam_date_to: Option<String>,
}

/// Inclusive integer range, open on either end.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct AgeRange {
    pub min: Option<i32>,
    pub max: Option<i32>,
}

impl AgeRange {
    pub fn is_active(&self) -> bool {
        self.min.is_some() || self.max.is_some()
    }

    pub fn admits(&self, age: i32) -> bool {
        self.min.map_or(true, |min| age >= min) && self.max.map_or(true, |max| age <= max)
    }
}

/// Inclusive float range, open on either end.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct NumericRange {
    pub min: Option<f64>,
    pub max: Option<f64>,
}

impl NumericRange {
    pub fn is_active(&self) -> bool {
        self.min.is_some() || self.max.is_some()
    }

    pub fn admits(&self, value: f64) -> bool {
        self.min.map_or(true, |min| value >= min) && self.max.map_or(true, |max| value <= max)
    }
}

/// Inclusive calendar-date window. Comparisons happen on whole dates, never
/// on timestamps, so timezone drift cannot move a row across a boundary.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct DateWindow {
    pub from: Option<NaiveDate>,
    pub to: Option<NaiveDate>,
}

impl DateWindow {
    pub fn is_active(&self) -> bool {
        self.from.is_some() || self.to.is_some()
    }

    pub fn contains(&self, date: NaiveDate) -> bool {
        self.from.map_or(true, |from| date >= from) && self.to.map_or(true, |to| date <= to)
    }
}

/// The embryo screening filter is binary; there is no grading scale.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EmbryoTesting {
    PgsTested,
    Untested,
}

impl EmbryoTesting {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::PgsTested => "pgs_tested",
            Self::Untested => "untested",
        }
    }
}

impl FromStr for EmbryoTesting {
    type Err = String;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value {
            "pgs_tested" => Ok(Self::PgsTested),
            "untested" => Ok(Self::Untested),
            other => Err(format!("unknown embryo testing value: {other:?}")),
        }
    }
}

/// Validated filter set. Text filters keep the raw value as sent; the engine
/// lowercases both sides at comparison time.
#[derive(Debug, Clone, Default)]
pub struct StatisticsFilter {
    pub match_status: Option<MatchStatus>,
    pub surrogate_stage: Option<ProgressStage>,
    pub surrogate_age: AgeRange,
    pub surrogate_location: Option<String>,
    pub surrogate_race: Option<String>,
    pub surrogate_marital_status: Option<MaritalStatus>,
    pub surrogate_blood_type: Option<String>,
    pub surrogate_bmi: NumericRange,
    pub surrogate_has_delivered: Option<bool>,
    pub parent_age: AgeRange,
    pub parent_location: Option<String>,
    pub parent_race: Option<String>,
    pub embryo_testing: Option<EmbryoTesting>,
    pub sign_date: DateWindow,
    pub transfer_date: DateWindow,
    pub beta_confirm_date: DateWindow,
    pub due_date: DateWindow,
    pub legal_clearance_date: DateWindow,
    pub medication_start_date: DateWindow,
    pub pregnancy_test_date: DateWindow,
    pub second_pregnancy_test_date: DateWindow,
    pub medical_exam_date: DateWindow,
}

fn text(value: &Option<String>) -> Option<&str> {
    value.as_deref().map(str::trim).filter(|v| !v.is_empty())
}

fn parse_int(name: &str, value: &Option<String>) -> Result<Option<i32>, PlatformError> {
    text(value)
        .map(|raw| {
            raw.parse::<i32>()
                .map_err(|_| PlatformError::validation(format!("invalid integer for {name}: {raw:?}")))
        })
        .transpose()
}

fn parse_float(name: &str, value: &Option<String>) -> Result<Option<f64>, PlatformError> {
    text(value)
        .map(|raw| {
            raw.parse::<f64>()
                .map_err(|_| PlatformError::validation(format!("invalid number for {name}: {raw:?}")))
        })
        .transpose()
}

fn parse_bool(name: &str, value: &Option<String>) -> Result<Option<bool>, PlatformError> {
    text(value)
        .map(|raw| match raw.to_ascii_lowercase().as_str() {
            "true" | "1" | "yes" => Ok(true),
            "false" | "0" | "no" => Ok(false),
            _ => Err(PlatformError::validation(format!(
                "invalid boolean for {name}: {raw:?}"
            ))),
        })
        .transpose()
}

fn parse_date(name: &str, value: &Option<String>) -> Result<Option<NaiveDate>, PlatformError> {
    text(value)
        .map(|raw| {
            dates::parse_flexible(raw)
                .map_err(|_| PlatformError::validation(format!("invalid date for {name}: {raw:?}")))
        })
        .transpose()
}

fn parse_window(
    from_name: &str,
    from: &Option<String>,
    to_name: &str,
    to: &Option<String>,
) -> Result<DateWindow, PlatformError> {
    Ok(DateWindow {
        from: parse_date(from_name, from)?,
        to: parse_date(to_name, to)?,
    })
}

impl StatisticsFilter {
    pub fn from_query(query: &StatisticsQuery) -> Result<Self, PlatformError> {
        let match_status = text(&query.match_status)
            .map(|raw| {
                raw.parse::<MatchStatus>()
                    .map_err(PlatformError::validation)
            })
            .transpose()?;
        let surrogate_stage = text(&query.surrogate_stage)
            .map(|raw| {
                raw.parse::<ProgressStage>()
                    .map_err(|e| PlatformError::validation(e.to_string()))
            })
            .transpose()?;
        let surrogate_marital_status = text(&query.surrogate_marital_status)
            .map(|raw| {
                MaritalStatus::from_text(raw).ok_or_else(|| {
                    PlatformError::validation(format!("unknown marital status: {raw:?}"))
                })
            })
            .transpose()?;
        let embryo_testing = text(&query.embryo_testing)
            .map(|raw| {
                raw.parse::<EmbryoTesting>()
                    .map_err(PlatformError::validation)
            })
            .transpose()?;

        Ok(Self {
            match_status,
            surrogate_stage,
            surrogate_age: AgeRange {
                min: parse_int("surrogate_age_min", &query.surrogate_age_min)?,
                max: parse_int("surrogate_age_max", &query.surrogate_age_max)?,
            },
            surrogate_location: text(&query.surrogate_location).map(str::to_string),
            surrogate_race: text(&query.surrogate_race).map(str::to_string),
            surrogate_marital_status,
            surrogate_blood_type: text(&query.surrogate_blood_type).map(str::to_string),
            surrogate_bmi: NumericRange {
                min: parse_float("surrogate_bmi_min", &query.surrogate_bmi_min)?,
                max: parse_float("surrogate_bmi_max", &query.surrogate_bmi_max)?,
            },
            surrogate_has_delivered: parse_bool(
                "surrogate_has_delivered",
                &query.surrogate_has_delivered,
            )?,
            parent_age: AgeRange {
                min: parse_int("parent_age_min", &query.parent_age_min)?,
                max: parse_int("parent_age_max", &query.parent_age_max)?,
            },
            parent_location: text(&query.parent_location).map(str::to_string),
            parent_race: text(&query.parent_race).map(str::to_string),
            embryo_testing,
            sign_date: parse_window(
                "sign_date_from",
                &query.sign_date_from,
                "sign_date_to",
                &query.sign_date_to,
            )?,
            transfer_date: parse_window(
                "transfer_date_from",
                &query.transfer_date_from,
                "transfer_date_to",
                &query.transfer_date_to,
            )?,
            beta_confirm_date: parse_window(
                "beta_confirm_date_from",
                &query.beta_confirm_date_from,
                "beta_confirm_date_to",
                &query.beta_confirm_date_to,
            )?,
            due_date: parse_window(
                "due_date_from",
                &query.due_date_from,
                "due_date_to",
                &query.due_date_to,
            )?,
            legal_clearance_date: parse_window(
                "legal_clearance_date_from",
                &query.legal_clearance_date_from,
                "legal_clearance_date_to",
                &query.legal_clearance_date_to,
            )?,
            medication_start_date: parse_window(
                "medication_start_date_from",
                &query.medication_start_date_from,
                "medication_start_date_to",
                &query.medication_start_date_to,
            )?,
            pregnancy_test_date: parse_window(
                "pregnancy_test_date_from",
                &query.pregnancy_test_date_from,
                "pregnancy_test_date_to",
                &query.pregnancy_test_date_to,
            )?,
            second_pregnancy_test_date: parse_window(
                "second_pregnancy_test_date_from",
                &query.second_pregnancy_test_date_from,
                "second_pregnancy_test_date_to",
                &query.second_pregnancy_test_date_to,
            )?,
            medical_exam_date: parse_window(
                "medical_exam_date_from",
                &query.medical_exam_date_from,
                "medical_exam_date_to",
                &query.medical_exam_date_to,
            )?,
        })
    }

    /// Rows without a transfer date are normally excluded from the candidate
    /// set; an active medical-exam window keeps them in.
    pub fn retains_untransferred(&self) -> bool {
        self.medical_exam_date.is_active()
    }

    /// Echo of every active parameter under its query name, for the
    /// `filters.applied` section of the response.
    pub fn applied(&self) -> BTreeMap<String, String> {
        let mut out = BTreeMap::new();
        let mut put = |key: &str, value: String| {
            out.insert(key.to_string(), value);
        };

        if let Some(status) = self.match_status {
            put("match_status", status.as_str().to_string());
        }
        if let Some(stage) = self.surrogate_stage {
            put("surrogate_stage", stage.as_str().to_string());
        }
        if let Some(min) = self.surrogate_age.min {
            put("surrogate_age_min", min.to_string());
        }
        if let Some(max) = self.surrogate_age.max {
            put("surrogate_age_max", max.to_string());
        }
        if let Some(v) = &self.surrogate_location {
            put("surrogate_location", v.clone());
        }
        if let Some(v) = &self.surrogate_race {
            put("surrogate_race", v.clone());
        }
        if let Some(v) = self.surrogate_marital_status {
            put("surrogate_marital_status", v.as_str().to_string());
        }
        if let Some(v) = &self.surrogate_blood_type {
            put("surrogate_blood_type", v.clone());
        }
        if let Some(min) = self.surrogate_bmi.min {
            put("surrogate_bmi_min", min.to_string());
        }
        if let Some(max) = self.surrogate_bmi.max {
            put("surrogate_bmi_max", max.to_string());
        }
        if let Some(v) = self.surrogate_has_delivered {
            put("surrogate_has_delivered", v.to_string());
        }
        if let Some(min) = self.parent_age.min {
            put("parent_age_min", min.to_string());
        }
        if let Some(max) = self.parent_age.max {
            put("parent_age_max", max.to_string());
        }
        if let Some(v) = &self.parent_location {
            put("parent_location", v.clone());
        }
        if let Some(v) = &self.parent_race {
            put("parent_race", v.clone());
        }
        if let Some(v) = self.embryo_testing {
            put("embryo_testing", v.as_str().to_string());
        }

        let windows: [(&str, &DateWindow); 9] = [
            ("sign_date", &self.sign_date),
            ("transfer_date", &self.transfer_date),
            ("beta_confirm_date", &self.beta_confirm_date),
            ("due_date", &self.due_date),
            ("legal_clearance_date", &self.legal_clearance_date),
            ("medication_start_date", &self.medication_start_date),
            ("pregnancy_test_date", &self.pregnancy_test_date),
            ("second_pregnancy_test_date", &self.second_pregnancy_test_date),
            ("medical_exam_date", &self.medical_exam_date),
        ];
        for (name, window) in windows {
            if let Some(from) = window.from {
                put(&format!("{name}_from"), from.to_string());
            }
            if let Some(to) = window.to {
                put(&format!("{name}_to"), to.to_string());
            }
        }

        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn blank_and_missing_parameters_are_inactive() {
        let query = StatisticsQuery {
            surrogate_location: Some("  ".into()),
            ..Default::default()
        };
        let filter = StatisticsFilter::from_query(&query).unwrap();
        assert!(filter.surrogate_location.is_none());
        assert!(filter.applied().is_empty());
        assert!(!filter.retains_untransferred());
    }

    #[test]
    fn typed_parameters_parse_and_echo() {
        let query = StatisticsQuery {
            match_status: Some("active".into()),
            surrogate_age_min: Some("21".into()),
            surrogate_age_max: Some("38".into()),
            surrogate_has_delivered: Some("Yes".into()),
            embryo_testing: Some("pgs_tested".into()),
            transfer_date_from: Some("01/15/24".into()),
            transfer_date_to: Some("2024-12-31".into()),
            ..Default::default()
        };
        let filter = StatisticsFilter::from_query(&query).unwrap();
        assert_eq!(filter.match_status, Some(MatchStatus::Active));
        assert_eq!(filter.surrogate_has_delivered, Some(true));
        assert!(filter.surrogate_age.admits(21));
        assert!(!filter.surrogate_age.admits(39));
        assert_eq!(
            filter.transfer_date.from,
            NaiveDate::from_ymd_opt(2024, 1, 15)
        );

        let applied = filter.applied();
        assert_eq!(applied["match_status"], "active");
        assert_eq!(applied["transfer_date_from"], "2024-01-15");
        assert_eq!(applied["embryo_testing"], "pgs_tested");
        assert_eq!(applied.len(), 7);
    }

    #[test]
    fn malformed_values_are_validation_failures() {
        let bad_date = StatisticsQuery {
            sign_date_from: Some("02/30/24".into()),
            ..Default::default()
        };
        assert!(matches!(
            StatisticsFilter::from_query(&bad_date),
            Err(PlatformError::Validation(_))
        ));

        let bad_status = StatisticsQuery {
            match_status: Some("paused".into()),
            ..Default::default()
        };
        assert!(matches!(
            StatisticsFilter::from_query(&bad_status),
            Err(PlatformError::Validation(_))
        ));

        let bad_age = StatisticsQuery {
            surrogate_age_min: Some("twenty".into()),
            ..Default::default()
        };
        assert!(matches!(
            StatisticsFilter::from_query(&bad_age),
            Err(PlatformError::Validation(_))
        ));
    }

    #[test]
    fn medical_exam_window_retains_untransferred_rows() {
        let query = StatisticsQuery {
            medical_exam_date_from: Some("2024-01-01".into()),
            ..Default::default()
        };
        let filter = StatisticsFilter::from_query(&query).unwrap();
        assert!(filter.retains_untransferred());
    }

    #[test]
    fn date_window_contains_is_inclusive() {
        let window = DateWindow {
            from: NaiveDate::from_ymd_opt(2024, 3, 1),
            to: NaiveDate::from_ymd_opt(2024, 3, 31),
        };
        assert!(window.contains(NaiveDate::from_ymd_opt(2024, 3, 1).unwrap()));
        assert!(window.contains(NaiveDate::from_ymd_opt(2024, 3, 31).unwrap()));
        assert!(!window.contains(NaiveDate::from_ymd_opt(2024, 4, 1).unwrap()));
    }
}
