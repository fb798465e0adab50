// Copyright (c) CareMatch Team
// SPDX-License-Identifier: Apache-2.0

use std::collections::BTreeSet;

use axum::extract::{Query, State};
use axum::headers::Cookie;
use axum::{Json, TypedHeader};
use chrono::Utc;
use diesel::prelude::*;
use diesel_async::RunQueryDsl;
use tracing::warn;

use crate::api::auth::require_admin;
use crate::api::AppContext;
use crate::error::PlatformError;
use crate::metrics::STATISTICS_REQUESTS;
use crate::models::application::Application;
use crate::models::matches::SurrogateMatch;
use crate::models::medical::{MedicalInfo, MedicalReport};
use crate::models::profile::Profile;
use crate::schema;
use crate::stats::{
    self, StatisticsFilter, StatisticsInputs, StatisticsQuery, StatisticsReport, MATCH_WINDOW,
};

/// Admin-only aggregate statistics over the most recent match window.
///
/// A failed match fetch is a 500. Failed auxiliary joins degrade to empty
/// lookups with a warning so one broken table cannot take the dashboard
/// down; the affected predicates then fail closed per record.
pub async fn business_statistics(
    State(ctx): State<AppContext>,
    cookies: Option<TypedHeader<Cookie>>,
    Query(query): Query<StatisticsQuery>,
) -> Result<Json<StatisticsReport>, PlatformError> {
    require_admin(&ctx, cookies.as_ref()).await?;
    let filter = StatisticsFilter::from_query(&query)?;
    STATISTICS_REQUESTS.inc();

    let mut conn = ctx.db.connection().await?;

    let matches = schema::surrogate_matches::table
        .order(schema::surrogate_matches::created_at.desc())
        .limit(MATCH_WINDOW)
        .load::<SurrogateMatch>(&mut conn)
        .await?;

    let mut profile_ids = BTreeSet::new();
    let mut surrogate_ids = BTreeSet::new();
    for row in &matches {
        surrogate_ids.insert(row.surrogate_id.clone());
        profile_ids.insert(row.surrogate_id.clone());
        profile_ids.extend(row.parent_ids().map(str::to_string));
    }
    let profile_ids: Vec<String> = profile_ids.into_iter().collect();
    let surrogate_ids: Vec<String> = surrogate_ids.into_iter().collect();

    let profiles = schema::profiles::table
        .filter(schema::profiles::id.eq_any(&profile_ids))
        .load::<Profile>(&mut conn)
        .await
        .unwrap_or_else(|err| {
            warn!(error = %err, "profile join failed, continuing without profiles");
            Vec::new()
        });
    let applications = schema::applications::table
        .filter(schema::applications::surrogate_id.eq_any(&surrogate_ids))
        .load::<Application>(&mut conn)
        .await
        .unwrap_or_else(|err| {
            warn!(error = %err, "application join failed, continuing without applications");
            Vec::new()
        });
    let medical_infos = schema::medical_infos::table
        .filter(schema::medical_infos::surrogate_id.eq_any(&surrogate_ids))
        .load::<MedicalInfo>(&mut conn)
        .await
        .unwrap_or_else(|err| {
            warn!(error = %err, "medical info join failed, continuing without medical infos");
            Vec::new()
        });
    let medical_reports = schema::medical_reports::table
        .filter(schema::medical_reports::surrogate_id.eq_any(&surrogate_ids))
        .load::<MedicalReport>(&mut conn)
        .await
        .unwrap_or_else(|err| {
            warn!(error = %err, "medical report join failed, continuing without reports");
            Vec::new()
        });

    let inputs = StatisticsInputs::new(
        matches,
        profiles,
        applications,
        medical_infos,
        medical_reports,
    );
    let report = stats::run(&inputs, &filter, Utc::now().date_naive());
    Ok(Json(report))
}
