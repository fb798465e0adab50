// Copyright (c) CareMatch Team
// SPDX-License-Identifier: Apache-2.0

use axum::extract::State;
use axum::http::StatusCode;
use axum::response::IntoResponse;
use axum::Json;
use serde_json::json;

use crate::api::AppContext;

/// Health check endpoint: 200 when the database answers, 503 otherwise.
pub async fn health_check(State(ctx): State<AppContext>) -> impl IntoResponse {
    match ctx.db.ping().await {
        Ok(()) => (
            StatusCode::OK,
            Json(json!({
                "status": "healthy",
                "message": "API server is running"
            })),
        ),
        Err(err) => (
            StatusCode::SERVICE_UNAVAILABLE,
            Json(json!({
                "status": "unhealthy",
                "message": format!("database check failed: {err}")
            })),
        ),
    }
}
