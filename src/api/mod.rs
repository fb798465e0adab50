// Copyright (c) CareMatch Team
// SPDX-License-Identifier: Apache-2.0

mod auth;
mod handlers;
mod routes;

pub use auth::ADMIN_COOKIE;
pub use routes::{ApiResponse, PaginationParams};

use std::net::SocketAddr;
use std::sync::Arc;

use anyhow::Result;
use axum::routing::{delete, get, post, put};
use axum::Router;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;
use tracing::info;

use crate::config::Config;
use crate::db::Database;
use crate::realtime::ChangeHub;

/// Shared state for every handler: the database plus the stage-change hub
/// so stage writes reach watchers without a poll round-trip.
#[derive(Clone)]
pub struct AppContext {
    pub db: Arc<Database>,
    pub hub: ChangeHub,
}

/// Build the full router. Split out from server startup so tests can drive
/// it with `tower::ServiceExt`.
pub fn router(ctx: AppContext) -> Router {
    Router::new()
        // General routes
        .route("/health", get(handlers::health::health_check))
        .route("/metrics", get(handlers::metrics::get_metrics))
        // Admin dashboard
        .route(
            "/api/business-statistics",
            get(handlers::statistics::business_statistics),
        )
        // Profile routes
        .route(
            "/api/profiles",
            get(handlers::profiles::list_profiles).post(handlers::profiles::create_profile),
        )
        .route(
            "/api/profiles/:id",
            get(handlers::profiles::get_profile).patch(handlers::profiles::update_profile),
        )
        .route(
            "/api/profiles/:id/stage",
            post(handlers::profiles::set_stage),
        )
        // Match routes
        .route(
            "/api/matches",
            get(handlers::matches::list_matches).post(handlers::matches::create_match),
        )
        .route(
            "/api/matches/:id",
            get(handlers::matches::get_match).patch(handlers::matches::update_match),
        )
        // Medical routes
        .route(
            "/api/medical-reports",
            get(handlers::medical::list_reports).post(handlers::medical::create_report),
        )
        .route(
            "/api/medical-reports/:id",
            delete(handlers::medical::delete_report),
        )
        // Application routes
        .route(
            "/api/applications",
            get(handlers::applications::list_applications)
                .post(handlers::applications::create_application),
        )
        // Community routes
        .route("/api/community/feed", get(handlers::community::get_feed))
        .route(
            "/api/community/posts",
            post(handlers::community::create_post),
        )
        .route(
            "/api/community/posts/:id",
            delete(handlers::community::delete_post),
        )
        .route(
            "/api/community/posts/:id/comments",
            post(handlers::community::create_comment),
        )
        .route(
            "/api/community/comments/:id",
            delete(handlers::community::delete_comment),
        )
        .route(
            "/api/community/posts/:id/likes",
            put(handlers::community::put_like).delete(handlers::community::delete_like),
        )
        // Document routes
        .route(
            "/api/documents",
            get(handlers::documents::list_documents).post(handlers::documents::create_document),
        )
        // Notification routes
        .route(
            "/api/notifications",
            get(handlers::notifications::list_notifications),
        )
        .route(
            "/api/notifications/:id/read",
            post(handlers::notifications::mark_read),
        )
        .with_state(ctx)
}

/// Start the API server.
pub async fn start_api_server(db: Arc<Database>, hub: ChangeHub) -> Result<()> {
    let config = Config::get();

    let app = {
        let mut app = router(AppContext { db, hub }).layer(TraceLayer::new_for_http());
        if config.server.enable_cors {
            app = app.layer(
                CorsLayer::new()
                    .allow_origin(Any)
                    .allow_methods(Any)
                    .allow_headers(Any),
            );
        }
        app
    };

    let addr = format!("{}:{}", config.server.host, config.server.port).parse::<SocketAddr>()?;

    info!("starting API server on {}", addr);
    axum::Server::bind(&addr)
        .serve(app.into_make_service())
        .await?;

    Ok(())
}
