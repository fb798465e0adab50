// Copyright (c) CareMatch Team
// SPDX-License-Identifier: Apache-2.0

//! Clinical data: the per-surrogate medical summary and the per-visit
//! reports. Report metrics are stored as jsonb; on read they decode into a
//! stage-keyed tagged union with typed fields for the stages the clinic
//! actually files, and an untyped map for anything else.

use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, NaiveDate, Utc};
use diesel::prelude::*;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::schema::{medical_infos, medical_reports};

/// Per-surrogate medical summary used by the statistics filters.
#[derive(Debug, Clone, Queryable, Selectable, Serialize, Deserialize)]
#[diesel(table_name = medical_infos)]
#[diesel(check_for_backend(diesel::pg::Pg))]
pub struct MedicalInfo {
    pub surrogate_id: String,
    pub height_cm: Option<f64>,
    pub weight_kg: Option<f64>,
    pub bmi: Option<f64>,
    pub blood_type: Option<String>,
    pub embryo_grade: Option<String>,
    pub updated_at: DateTime<Utc>,
}

impl MedicalInfo {
    /// Stored BMI, else computed from height and weight when both exist.
    pub fn bmi_value(&self) -> Option<f64> {
        if let Some(bmi) = self.bmi {
            return Some(bmi);
        }
        match (self.height_cm, self.weight_kg) {
            (Some(height), Some(weight)) if height > 0.0 => {
                let meters = height / 100.0;
                Some(weight / (meters * meters))
            }
            _ => None,
        }
    }

    /// The grade field is free text; genetic screening is detected purely by
    /// the "PGS" substring. A missing grade counts as untested.
    pub fn is_pgs_tested(&self) -> bool {
        self.embryo_grade
            .as_deref()
            .map(|grade| grade.to_uppercase().contains("PGS"))
            .unwrap_or(false)
    }
}

#[derive(Debug, Insertable, AsChangeset, Serialize, Deserialize)]
#[diesel(table_name = medical_infos)]
pub struct NewMedicalInfo {
    pub surrogate_id: String,
    pub height_cm: Option<f64>,
    pub weight_kg: Option<f64>,
    pub bmi: Option<f64>,
    pub blood_type: Option<String>,
    pub embryo_grade: Option<String>,
    pub updated_at: DateTime<Utc>,
}

/// The three report stages the clinic files, with their exact legacy labels.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ReportStage {
    PreTransfer,
    PostTransfer,
    Obgyn,
}

impl ReportStage {
    pub const ALL: [ReportStage; 3] = [
        ReportStage::PreTransfer,
        ReportStage::PostTransfer,
        ReportStage::Obgyn,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::PreTransfer => "Pre-Transfer",
            Self::PostTransfer => "Post-Transfer",
            Self::Obgyn => "OBGYN",
        }
    }
}

impl fmt::Display for ReportStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ReportStage {
    type Err = String;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value {
            "Pre-Transfer" => Ok(Self::PreTransfer),
            "Post-Transfer" => Ok(Self::PostTransfer),
            "OBGYN" => Ok(Self::Obgyn),
            other => Err(format!("unknown report stage: {other:?}")),
        }
    }
}

/// One clinical visit. Append-only; only an explicit admin action deletes.
#[derive(Debug, Clone, Queryable, Selectable, Serialize, Deserialize)]
#[diesel(table_name = medical_reports)]
#[diesel(check_for_backend(diesel::pg::Pg))]
pub struct MedicalReport {
    pub id: String,
    pub surrogate_id: String,
    pub report_stage: String,
    pub exam_date: NaiveDate,
    pub report_data: Value,
    pub proof_image: Option<String>,
    pub created_at: DateTime<Utc>,
}

impl MedicalReport {
    pub fn stage(&self) -> Option<ReportStage> {
        self.report_stage.parse().ok()
    }

    pub fn data(&self) -> ReportData {
        ReportData::from_row(&self.report_stage, self.report_data.clone())
    }
}

#[derive(Debug, Insertable, Serialize, Deserialize)]
#[diesel(table_name = medical_reports)]
pub struct NewMedicalReport {
    pub id: String,
    pub surrogate_id: String,
    pub report_stage: String,
    pub exam_date: NaiveDate,
    pub report_data: Value,
    pub proof_image: Option<String>,
    pub created_at: DateTime<Utc>,
}

/// Metrics recorded before the transfer: lining checks and med levels.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PreTransferMetrics {
    pub lining_thickness_mm: Option<f64>,
    pub estradiol_level: Option<f64>,
    pub medication_dose: Option<String>,
    #[serde(flatten)]
    pub extra: serde_json::Map<String, Value>,
}

/// Metrics from the post-transfer beta window.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PostTransferMetrics {
    pub hcg_level: Option<f64>,
    pub test_result: Option<String>,
    #[serde(flatten)]
    pub extra: serde_json::Map<String, Value>,
}

/// Metrics from a routine OB visit.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ObgynMetrics {
    pub gestational_weeks: Option<u32>,
    pub fetal_heart_rate: Option<u32>,
    pub blood_pressure: Option<String>,
    pub weight_kg: Option<f64>,
    #[serde(flatten)]
    pub extra: serde_json::Map<String, Value>,
}

/// Stage-keyed view of a report's metrics blob.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum ReportData {
    PreTransfer(PreTransferMetrics),
    PostTransfer(PostTransferMetrics),
    Obgyn(ObgynMetrics),
    /// Unknown stage tag, or a blob that is not an object: kept verbatim.
    Other(Value),
}

impl ReportData {
    /// Decode keyed on the row's stage column rather than an embedded tag,
    /// because historical rows carry none.
    pub fn from_row(stage: &str, value: Value) -> Self {
        match stage.parse::<ReportStage>() {
            Ok(ReportStage::PreTransfer) => serde_json::from_value(value.clone())
                .map(Self::PreTransfer)
                .unwrap_or(Self::Other(value)),
            Ok(ReportStage::PostTransfer) => serde_json::from_value(value.clone())
                .map(Self::PostTransfer)
                .unwrap_or(Self::Other(value)),
            Ok(ReportStage::Obgyn) => serde_json::from_value(value.clone())
                .map(Self::Obgyn)
                .unwrap_or(Self::Other(value)),
            Err(_) => Self::Other(value),
        }
    }

    pub fn to_value(&self) -> Value {
        match self {
            Self::PreTransfer(m) => serde_json::to_value(m).unwrap_or(Value::Null),
            Self::PostTransfer(m) => serde_json::to_value(m).unwrap_or(Value::Null),
            Self::Obgyn(m) => serde_json::to_value(m).unwrap_or(Value::Null),
            Self::Other(v) => v.clone(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn bmi_prefers_stored_value() {
        let info = MedicalInfo {
            surrogate_id: "s1".into(),
            height_cm: Some(165.0),
            weight_kg: Some(60.0),
            bmi: Some(23.5),
            blood_type: None,
            embryo_grade: None,
            updated_at: Utc::now(),
        };
        assert_eq!(info.bmi_value(), Some(23.5));
    }

    #[test]
    fn bmi_computes_from_height_and_weight() {
        let info = MedicalInfo {
            surrogate_id: "s1".into(),
            height_cm: Some(160.0),
            weight_kg: Some(64.0),
            bmi: None,
            blood_type: None,
            embryo_grade: None,
            updated_at: Utc::now(),
        };
        let bmi = info.bmi_value().unwrap();
        assert!((bmi - 25.0).abs() < 1e-9);
    }

    #[test]
    fn pgs_detection_is_substring_based() {
        let mut info = MedicalInfo {
            surrogate_id: "s1".into(),
            height_cm: None,
            weight_kg: None,
            bmi: None,
            blood_type: None,
            embryo_grade: Some("5AA pgs normal".into()),
            updated_at: Utc::now(),
        };
        assert!(info.is_pgs_tested());
        info.embryo_grade = Some("4BB".into());
        assert!(!info.is_pgs_tested());
        info.embryo_grade = None;
        assert!(!info.is_pgs_tested());
    }

    #[test]
    fn report_data_decodes_by_stage_column() {
        let data = ReportData::from_row(
            "OBGYN",
            json!({"gestational_weeks": 12, "fetal_heart_rate": 155, "clinic_note": "all good"}),
        );
        match data {
            ReportData::Obgyn(metrics) => {
                assert_eq!(metrics.gestational_weeks, Some(12));
                assert_eq!(metrics.fetal_heart_rate, Some(155));
                assert_eq!(metrics.extra["clinic_note"], json!("all good"));
            }
            other => panic!("expected OBGYN metrics, got {other:?}"),
        }
    }

    #[test]
    fn unknown_stage_falls_back_to_raw_value() {
        let blob = json!({"anything": true});
        let data = ReportData::from_row("Postpartum", blob.clone());
        assert_eq!(data, ReportData::Other(blob));
    }

    #[test]
    fn unknown_keys_survive_reencode() {
        let blob = json!({"hcg_level": 240.0, "lab": "Quest"});
        let data = ReportData::from_row("Post-Transfer", blob);
        let back = data.to_value();
        assert_eq!(back["lab"], json!("Quest"));
        assert_eq!(back["hcg_level"], json!(240.0));
    }
}
