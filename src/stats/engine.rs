// Copyright (c) CareMatch Team
// SPDX-License-Identifier: Apache-2.0

//! In-memory filter and aggregation pass over the loaded match window.
//!
//! The handler loads up to [`super::MATCH_WINDOW`] match rows plus their
//! joined tables, and everything after that happens here: id-keyed lookups,
//! an ordered AND chain of predicates (each active filter may veto a row),
//! then one aggregation sweep into fixed buckets. A row missing the data an
//! active filter needs is dropped, with two deliberate exceptions: rows
//! without a transfer date survive candidate selection while a medical-exam
//! window is active, and a missing embryo grade counts as "untested" rather
//! than vanishing from both branches.

use std::collections::{BTreeMap, BTreeSet, HashMap};

use chrono::NaiveDate;
use serde::Serialize;

use crate::dates;
use crate::models::application::Application;
use crate::models::matches::SurrogateMatch;
use crate::models::medical::{MedicalInfo, MedicalReport};
use crate::models::profile::Profile;

use super::params::{EmbryoTesting, StatisticsFilter};

/// Fixed histogram buckets, in display order.
pub const AGE_BUCKETS: [&str; 7] = [
    "18-24", "25-29", "30-34", "35-39", "40-44", "45+", "unknown",
];

/// Loaded rows for one statistics request, with id-keyed lookups built once.
pub struct StatisticsInputs {
    matches: Vec<SurrogateMatch>,
    profiles: HashMap<String, Profile>,
    applications: HashMap<String, Application>,
    medical_infos: HashMap<String, MedicalInfo>,
    medical_reports: HashMap<String, Vec<MedicalReport>>,
}

impl StatisticsInputs {
    pub fn new(
        matches: Vec<SurrogateMatch>,
        profiles: Vec<Profile>,
        applications: Vec<Application>,
        medical_infos: Vec<MedicalInfo>,
        medical_reports: Vec<MedicalReport>,
    ) -> Self {
        let profiles = profiles.into_iter().map(|p| (p.id.clone(), p)).collect();
        let applications = applications
            .into_iter()
            .map(|a| (a.surrogate_id.clone(), a))
            .collect();
        let medical_infos = medical_infos
            .into_iter()
            .map(|m| (m.surrogate_id.clone(), m))
            .collect();
        let mut reports: HashMap<String, Vec<MedicalReport>> = HashMap::new();
        for report in medical_reports {
            reports
                .entry(report.surrogate_id.clone())
                .or_default()
                .push(report);
        }
        Self {
            matches,
            profiles,
            applications,
            medical_infos,
            medical_reports: reports,
        }
    }

    fn case<'a>(&'a self, row: &'a SurrogateMatch) -> CaseView<'a> {
        CaseView {
            row,
            surrogate: self.profiles.get(&row.surrogate_id),
            parents: row
                .parent_ids()
                .filter_map(|id| self.profiles.get(id))
                .collect(),
            application: self.applications.get(&row.surrogate_id),
            medical: self.medical_infos.get(&row.surrogate_id),
            reports: self
                .medical_reports
                .get(&row.surrogate_id)
                .map(Vec::as_slice)
                .unwrap_or(&[]),
        }
    }
}

/// One match with its joined rows resolved, borrowed from the inputs.
/// `parents` holds every named parent, primary first.
struct CaseView<'a> {
    row: &'a SurrogateMatch,
    surrogate: Option<&'a Profile>,
    parents: Vec<&'a Profile>,
    application: Option<&'a Application>,
    medical: Option<&'a MedicalInfo>,
    reports: &'a [MedicalReport],
}

impl CaseView<'_> {
    fn surrogate_age(&self, today: NaiveDate) -> Option<i32> {
        self.surrogate
            .and_then(|p| p.date_of_birth)
            .and_then(|dob| dates::age_on(dob, today))
    }

    fn parent_ages(&self, today: NaiveDate) -> impl Iterator<Item = i32> + '_ {
        self.parents
            .iter()
            .filter_map(move |p| p.date_of_birth.and_then(|dob| dates::age_on(dob, today)))
    }

    fn pgs_tested(&self) -> bool {
        self.medical.map(MedicalInfo::is_pgs_tested).unwrap_or(false)
    }

    fn blood_type(&self) -> Option<String> {
        self.medical
            .and_then(|m| m.blood_type.clone())
            .or_else(|| self.application.and_then(|a| a.form().blood_type))
    }
}

fn contains_ci(haystack: &str, needle: &str) -> bool {
    haystack.to_lowercase().contains(&needle.to_lowercase())
}

fn norm_blood(raw: &str) -> String {
    raw.trim().to_uppercase()
}

/// The ordered predicate chain. Every active filter must pass or the row is
/// dropped on the spot. Parent dimensions look at every named parent; one
/// matching parent keeps the row.
fn keep(case: &CaseView<'_>, filter: &StatisticsFilter, today: NaiveDate) -> bool {
    if let Some(want) = filter.match_status {
        if case.row.status() != Some(want) {
            return false;
        }
    }

    if let Some(want) = filter.surrogate_stage {
        match case.surrogate.and_then(Profile::stage) {
            Some(stage) if stage == want => {}
            _ => return false,
        }
    }

    if filter.surrogate_age.is_active() {
        match case.surrogate_age(today) {
            Some(age) if filter.surrogate_age.admits(age) => {}
            _ => return false,
        }
    }

    if let Some(needle) = &filter.surrogate_location {
        match case.surrogate.and_then(|p| p.location.as_deref()) {
            Some(hay) if contains_ci(hay, needle) => {}
            _ => return false,
        }
    }

    if let Some(needle) = &filter.surrogate_race {
        match case.surrogate.and_then(|p| p.race.as_deref()) {
            Some(hay) if contains_ci(hay, needle) => {}
            _ => return false,
        }
    }

    if let Some(want) = filter.surrogate_marital_status {
        match case
            .application
            .and_then(|a| a.form().canonical_marital_status())
        {
            Some(got) if got == want => {}
            _ => return false,
        }
    }

    if let Some(want) = &filter.surrogate_blood_type {
        match case.blood_type() {
            Some(got) if norm_blood(&got) == norm_blood(want) => {}
            _ => return false,
        }
    }

    if filter.surrogate_bmi.is_active() {
        match case.medical.and_then(MedicalInfo::bmi_value) {
            Some(bmi) if filter.surrogate_bmi.admits(bmi) => {}
            _ => return false,
        }
    }

    if let Some(want) = filter.surrogate_has_delivered {
        match case.application.and_then(|a| a.form().delivered_before()) {
            Some(got) if got == want => {}
            _ => return false,
        }
    }

    if filter.parent_age.is_active()
        && !case
            .parent_ages(today)
            .any(|age| filter.parent_age.admits(age))
    {
        return false;
    }

    if let Some(needle) = &filter.parent_location {
        if !case
            .parents
            .iter()
            .filter_map(|p| p.location.as_deref())
            .any(|hay| contains_ci(hay, needle))
        {
            return false;
        }
    }

    if let Some(needle) = &filter.parent_race {
        if !case
            .parents
            .iter()
            .filter_map(|p| p.race.as_deref())
            .any(|hay| contains_ci(hay, needle))
        {
            return false;
        }
    }

    if let Some(want) = filter.embryo_testing {
        let tested = case.pgs_tested();
        let pass = match want {
            EmbryoTesting::PgsTested => tested,
            EmbryoTesting::Untested => !tested,
        };
        if !pass {
            return false;
        }
    }

    let milestone_windows = [
        (&filter.sign_date, case.row.sign_date),
        (&filter.transfer_date, case.row.transfer_date),
        (&filter.beta_confirm_date, case.row.beta_confirm_date),
        (&filter.due_date, case.row.due_date),
        (&filter.legal_clearance_date, case.row.legal_clearance_date),
        (&filter.medication_start_date, case.row.medication_start_date),
        (&filter.pregnancy_test_date, case.row.pregnancy_test_date),
        (
            &filter.second_pregnancy_test_date,
            case.row.second_pregnancy_test_date,
        ),
    ];
    for (window, value) in milestone_windows {
        if window.is_active() {
            match value {
                Some(date) if window.contains(date) => {}
                _ => return false,
            }
        }
    }

    if filter.medical_exam_date.is_active()
        && !case
            .reports
            .iter()
            .any(|r| filter.medical_exam_date.contains(r.exam_date))
    {
        return false;
    }

    true
}

#[derive(Debug, Clone, Serialize)]
pub struct StatisticsReport {
    pub statistics: Statistics,
    pub filters: FilterSummary,
}

#[derive(Debug, Clone, Serialize)]
pub struct Statistics {
    pub total_matches: u64,
    /// Percent of transfer-dated kept matches that reached a beta confirm,
    /// rounded to one decimal.
    pub success_rate: f64,
    pub surrogate_age_histogram: BTreeMap<String, u64>,
    /// One entry per named parent of a kept match; a two-parent case counts
    /// twice, a parentless one not at all.
    pub parent_age_histogram: BTreeMap<String, u64>,
    pub embryo_testing: EmbryoTestingCounts,
}

#[derive(Debug, Clone, Serialize)]
pub struct EmbryoTestingCounts {
    pub pgs_tested: u64,
    pub untested: u64,
}

#[derive(Debug, Clone, Serialize)]
pub struct FilterSummary {
    pub applied: BTreeMap<String, String>,
    pub available: AvailableFilters,
}

/// Distinct value sets per filterable dimension, computed from the loaded
/// rows before any predicate runs; the dashboard populates its selectors
/// from these.
#[derive(Debug, Clone, Serialize)]
pub struct AvailableFilters {
    pub match_statuses: Vec<String>,
    pub surrogate_stages: Vec<String>,
    pub surrogate_locations: Vec<String>,
    pub surrogate_races: Vec<String>,
    pub surrogate_marital_statuses: Vec<String>,
    pub surrogate_blood_types: Vec<String>,
    pub parent_locations: Vec<String>,
    pub parent_races: Vec<String>,
    pub embryo_testing: Vec<String>,
}

fn age_bucket(age: Option<i32>) -> &'static str {
    match age {
        Some(a) if (18..=24).contains(&a) => "18-24",
        Some(a) if (25..=29).contains(&a) => "25-29",
        Some(a) if (30..=34).contains(&a) => "30-34",
        Some(a) if (35..=39).contains(&a) => "35-39",
        Some(a) if (40..=44).contains(&a) => "40-44",
        Some(a) if a >= 45 => "45+",
        _ => "unknown",
    }
}

fn empty_histogram() -> BTreeMap<String, u64> {
    AGE_BUCKETS.iter().map(|b| (b.to_string(), 0)).collect()
}

fn round1(value: f64) -> f64 {
    (value * 10.0).round() / 10.0
}

fn available(inputs: &StatisticsInputs) -> AvailableFilters {
    let mut statuses = BTreeSet::new();
    let mut stages = BTreeSet::new();
    let mut s_locations = BTreeSet::new();
    let mut s_races = BTreeSet::new();
    let mut maritals = BTreeSet::new();
    let mut bloods = BTreeSet::new();
    let mut p_locations = BTreeSet::new();
    let mut p_races = BTreeSet::new();

    for row in &inputs.matches {
        statuses.insert(row.status.clone());
        if let Some(surrogate) = inputs.profiles.get(&row.surrogate_id) {
            stages.insert(surrogate.progress_stage.clone());
            if let Some(v) = &surrogate.location {
                s_locations.insert(v.clone());
            }
            if let Some(v) = &surrogate.race {
                s_races.insert(v.clone());
            }
        }
        if let Some(app) = inputs.applications.get(&row.surrogate_id) {
            let form = app.form();
            if let Some(ms) = form.canonical_marital_status() {
                maritals.insert(ms.as_str().to_string());
            }
            if let Some(bt) = form.blood_type {
                bloods.insert(norm_blood(&bt));
            }
        }
        if let Some(info) = inputs.medical_infos.get(&row.surrogate_id) {
            if let Some(bt) = &info.blood_type {
                bloods.insert(norm_blood(bt));
            }
        }
        for parent_id in row.parent_ids() {
            if let Some(parent) = inputs.profiles.get(parent_id) {
                if let Some(v) = &parent.location {
                    p_locations.insert(v.clone());
                }
                if let Some(v) = &parent.race {
                    p_races.insert(v.clone());
                }
            }
        }
    }

    AvailableFilters {
        match_statuses: statuses.into_iter().collect(),
        surrogate_stages: stages.into_iter().collect(),
        surrogate_locations: s_locations.into_iter().collect(),
        surrogate_races: s_races.into_iter().collect(),
        surrogate_marital_statuses: maritals.into_iter().collect(),
        surrogate_blood_types: bloods.into_iter().collect(),
        parent_locations: p_locations.into_iter().collect(),
        parent_races: p_races.into_iter().collect(),
        embryo_testing: vec!["pgs_tested".to_string(), "untested".to_string()],
    }
}

/// Filter the candidate set and aggregate it into the response shape.
pub fn run(
    inputs: &StatisticsInputs,
    filter: &StatisticsFilter,
    today: NaiveDate,
) -> StatisticsReport {
    let kept: Vec<CaseView<'_>> = inputs
        .matches
        .iter()
        .filter(|row| row.transfer_date.is_some() || filter.retains_untransferred())
        .map(|row| inputs.case(row))
        .filter(|case| keep(case, filter, today))
        .collect();

    let transfer_dated = kept
        .iter()
        .filter(|c| c.row.transfer_date.is_some())
        .count();
    let confirmed = kept
        .iter()
        .filter(|c| c.row.beta_confirm_date.is_some())
        .count();
    let success_rate = if transfer_dated == 0 {
        0.0
    } else {
        round1(confirmed as f64 / transfer_dated as f64 * 100.0)
    };

    let mut surrogate_ages = empty_histogram();
    let mut parent_ages = empty_histogram();
    let mut pgs_tested = 0u64;
    let mut untested = 0u64;
    for case in &kept {
        *surrogate_ages
            .entry(age_bucket(case.surrogate_age(today)).to_string())
            .or_insert(0) += 1;
        for parent in &case.parents {
            let age = parent
                .date_of_birth
                .and_then(|dob| dates::age_on(dob, today));
            *parent_ages.entry(age_bucket(age).to_string()).or_insert(0) += 1;
        }
        if case.pgs_tested() {
            pgs_tested += 1;
        } else {
            untested += 1;
        }
    }

    StatisticsReport {
        statistics: Statistics {
            total_matches: kept.len() as u64,
            success_rate,
            surrogate_age_histogram: surrogate_ages,
            parent_age_histogram: parent_ages,
            embryo_testing: EmbryoTestingCounts {
                pgs_tested,
                untested,
            },
        },
        filters: FilterSummary {
            applied: filter.applied(),
            available: available(inputs),
        },
    }
}
