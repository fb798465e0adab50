// Copyright (c) CareMatch Team
// SPDX-License-Identifier: Apache-2.0

//! Community feed and interactions. Everything here runs through the
//! viewer's resolved stage: hidden posts never leave the server, and
//! likes/comments only land on interactable posts.

use std::collections::HashMap;

use axum::extract::{Path, Query, State};
use axum::headers::Cookie;
use axum::{Json, TypedHeader};
use chrono::Utc;
use diesel::prelude::*;
use diesel_async::RunQueryDsl;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use tracing::info;
use uuid::Uuid;

use crate::api::auth::require_admin;
use crate::api::routes::ApiResponse;
use crate::api::AppContext;
use crate::db::DbConnection;
use crate::error::PlatformError;
use crate::models::community::{Comment, NewComment, NewPost, Post, PostLike};
use crate::models::matches::SurrogateMatch;
use crate::models::profile::Profile;
use crate::schema::{comments, post_likes, posts, profiles, surrogate_matches};
use crate::stage::{resolve_viewer_stage, visibility, ProgressStage, Visibility};

/// A viewer with enough context to resolve their current stage and the
/// journeys their feed spans.
struct Viewer {
    profile: Profile,
    partner_stage: Option<ProgressStage>,
    /// The journey new posts land in: the surrogate's own, or the active
    /// (else most recent) match's surrogate for a parent.
    anchor_surrogate: Option<String>,
    surrogate_ids: Vec<String>,
}

impl Viewer {
    fn resolved_stage(&self) -> ProgressStage {
        resolve_viewer_stage(
            self.profile.stage(),
            self.profile.is_surrogate(),
            self.partner_stage,
        )
    }
}

async fn load_viewer(conn: &mut DbConnection, viewer_id: &str) -> Result<Viewer, PlatformError> {
    let profile = profiles::table
        .find(viewer_id)
        .first::<Profile>(conn)
        .await
        .optional()?
        .ok_or_else(|| PlatformError::NotFound(format!("profile {viewer_id}")))?;

    let rows: Vec<SurrogateMatch> = surrogate_matches::table
        .filter(
            surrogate_matches::surrogate_id
                .eq(viewer_id)
                .or(surrogate_matches::parent_id.eq(viewer_id))
                .or(surrogate_matches::secondary_parent_id.eq(viewer_id)),
        )
        .order(surrogate_matches::created_at.desc())
        .load(conn)
        .await?;

    let surrogate_ids = if profile.is_surrogate() {
        vec![profile.id.clone()]
    } else {
        let mut ids: Vec<String> = rows.iter().map(|m| m.surrogate_id.clone()).collect();
        ids.sort();
        ids.dedup();
        ids
    };

    let anchor = SurrogateMatch::anchor(&rows);
    let anchor_surrogate = if profile.is_surrogate() {
        Some(profile.id.clone())
    } else {
        anchor.map(|m| m.surrogate_id.clone())
    };

    let partner_stage = match (&anchor_surrogate, profile.is_surrogate()) {
        (Some(surrogate_id), false) => profiles::table
            .find(surrogate_id)
            .select(profiles::progress_stage)
            .first::<String>(conn)
            .await
            .optional()?
            .and_then(|s| s.parse().ok()),
        _ => None,
    };

    Ok(Viewer {
        profile,
        partner_stage,
        anchor_surrogate,
        surrogate_ids,
    })
}

fn require_interactable(viewer: &Viewer, post: &Post) -> Result<(), PlatformError> {
    let stage = post
        .stage()
        .ok_or_else(|| PlatformError::validation("post stage is unreadable"))?;
    if visibility(viewer.resolved_stage(), stage) != Visibility::Interactable {
        return Err(PlatformError::validation(
            "post is outside your current stage",
        ));
    }
    Ok(())
}

async fn load_post(conn: &mut DbConnection, post_id: &str) -> Result<Post, PlatformError> {
    posts::table
        .find(post_id)
        .first::<Post>(conn)
        .await
        .optional()?
        .ok_or_else(|| PlatformError::NotFound(format!("post {post_id}")))
}

#[derive(Debug, Deserialize)]
pub struct FeedQuery {
    pub viewer_id: String,
}

#[derive(Debug, Serialize)]
pub struct FeedEntry {
    pub post: Post,
    pub visibility: Visibility,
    pub comments: Vec<Comment>,
    pub like_count: i64,
    pub liked_by_viewer: bool,
}

/// The viewer's feed: their journey's posts (or the community pre-stage
/// feed for unmatched parents), later-stage posts omitted, the rest
/// tagged interactable or read-only.
pub async fn get_feed(
    State(ctx): State<AppContext>,
    Query(query): Query<FeedQuery>,
) -> Result<Json<ApiResponse<Vec<FeedEntry>>>, PlatformError> {
    let mut conn = ctx.db.connection().await?;
    let viewer = load_viewer(&mut conn, &query.viewer_id).await?;
    let resolved = viewer.resolved_stage();

    let scoped: Vec<Post> = if viewer.surrogate_ids.is_empty() {
        posts::table
            .filter(posts::stage.eq(ProgressStage::Pre.as_str()))
            .order(posts::created_at.desc())
            .load(&mut conn)
            .await?
    } else {
        posts::table
            .filter(posts::surrogate_id.eq_any(&viewer.surrogate_ids))
            .order(posts::created_at.desc())
            .load(&mut conn)
            .await?
    };

    let visible: Vec<(Post, Visibility)> = scoped
        .into_iter()
        .filter_map(|post| {
            let stage = post.stage()?;
            match visibility(resolved, stage) {
                Visibility::Hidden => None,
                vis => Some((post, vis)),
            }
        })
        .collect();

    let post_ids: Vec<String> = visible.iter().map(|(p, _)| p.id.clone()).collect();
    let all_comments: Vec<Comment> = comments::table
        .filter(comments::post_id.eq_any(&post_ids))
        .order(comments::created_at.asc())
        .load(&mut conn)
        .await?;
    let all_likes: Vec<PostLike> = post_likes::table
        .filter(post_likes::post_id.eq_any(&post_ids))
        .load(&mut conn)
        .await?;

    let mut comment_map: HashMap<String, Vec<Comment>> = HashMap::new();
    for comment in all_comments {
        comment_map
            .entry(comment.post_id.clone())
            .or_default()
            .push(comment);
    }
    let mut like_map: HashMap<String, Vec<PostLike>> = HashMap::new();
    for like in all_likes {
        like_map.entry(like.post_id.clone()).or_default().push(like);
    }

    let entries: Vec<FeedEntry> = visible
        .into_iter()
        .map(|(post, vis)| {
            let likes = like_map.remove(&post.id).unwrap_or_default();
            FeedEntry {
                liked_by_viewer: likes.iter().any(|l| l.profile_id == viewer.profile.id),
                like_count: likes.len() as i64,
                comments: comment_map.remove(&post.id).unwrap_or_default(),
                visibility: vis,
                post,
            }
        })
        .collect();
    Ok(Json(ApiResponse::success(entries)))
}

#[derive(Debug, Deserialize)]
pub struct CreatePost {
    pub author_id: String,
    pub content: String,
    pub image_url: Option<String>,
}

/// Create a post. The stage is frozen from the author's resolved stage at
/// creation; it never moves afterwards.
pub async fn create_post(
    State(ctx): State<AppContext>,
    Json(body): Json<CreatePost>,
) -> Result<Json<ApiResponse<Post>>, PlatformError> {
    if body.content.trim().is_empty() {
        return Err(PlatformError::validation("content is empty"));
    }

    let mut conn = ctx.db.connection().await?;
    let viewer = load_viewer(&mut conn, &body.author_id).await?;
    let surrogate_id = viewer
        .anchor_surrogate
        .clone()
        .ok_or_else(|| PlatformError::validation("author has no journey to post to"))?;
    let stage = viewer.resolved_stage();

    let record = NewPost {
        id: Uuid::new_v4().to_string(),
        author_id: viewer.profile.id.clone(),
        surrogate_id,
        stage: stage.as_str().to_string(),
        content: body.content.trim().to_string(),
        image_url: body.image_url,
        created_at: Utc::now(),
    };
    let row = diesel::insert_into(posts::table)
        .values(&record)
        .get_result::<Post>(&mut conn)
        .await?;
    info!(post_id = %row.id, stage = %row.stage, "post created");
    Ok(Json(ApiResponse::success(row)))
}

#[derive(Debug, Deserialize)]
pub struct ActorQuery {
    pub requester_id: Option<String>,
}

/// Delete a post as its author or as an admin. Comments and likes go with
/// it through the cascade.
pub async fn delete_post(
    State(ctx): State<AppContext>,
    cookies: Option<TypedHeader<Cookie>>,
    Path(id): Path<String>,
    Query(query): Query<ActorQuery>,
) -> Result<Json<ApiResponse<Value>>, PlatformError> {
    let mut conn = ctx.db.connection().await?;
    let post = load_post(&mut conn, &id).await?;

    let is_author = query.requester_id.as_deref() == Some(post.author_id.as_str());
    if !is_author {
        require_admin(&ctx, cookies.as_ref()).await?;
    }

    diesel::delete(posts::table.find(&id))
        .execute(&mut conn)
        .await?;
    info!(post_id = %id, "post deleted");
    Ok(Json(ApiResponse::success(json!({ "deleted": id }))))
}

#[derive(Debug, Deserialize)]
pub struct CreateComment {
    pub author_id: String,
    pub content: String,
    pub parent_comment_id: Option<String>,
}

/// Comment on an interactable post. Replies must target a comment on the
/// same post.
pub async fn create_comment(
    State(ctx): State<AppContext>,
    Path(post_id): Path<String>,
    Json(body): Json<CreateComment>,
) -> Result<Json<ApiResponse<Comment>>, PlatformError> {
    if body.content.trim().is_empty() {
        return Err(PlatformError::validation("content is empty"));
    }

    let mut conn = ctx.db.connection().await?;
    let post = load_post(&mut conn, &post_id).await?;
    let viewer = load_viewer(&mut conn, &body.author_id).await?;
    require_interactable(&viewer, &post)?;

    if let Some(parent_id) = &body.parent_comment_id {
        let parent_post = comments::table
            .find(parent_id)
            .select(comments::post_id)
            .first::<String>(&mut conn)
            .await
            .optional()?;
        if parent_post.as_deref() != Some(post_id.as_str()) {
            return Err(PlatformError::validation(
                "reply target is not a comment on this post",
            ));
        }
    }

    let record = NewComment {
        id: Uuid::new_v4().to_string(),
        post_id: post_id.clone(),
        author_id: viewer.profile.id.clone(),
        parent_comment_id: body.parent_comment_id,
        content: body.content.trim().to_string(),
        created_at: Utc::now(),
    };
    let row = diesel::insert_into(comments::table)
        .values(&record)
        .get_result::<Comment>(&mut conn)
        .await?;
    Ok(Json(ApiResponse::success(row)))
}

/// Delete a comment as its author or as an admin. Replies cascade.
pub async fn delete_comment(
    State(ctx): State<AppContext>,
    cookies: Option<TypedHeader<Cookie>>,
    Path(id): Path<String>,
    Query(query): Query<ActorQuery>,
) -> Result<Json<ApiResponse<Value>>, PlatformError> {
    let mut conn = ctx.db.connection().await?;
    let author = comments::table
        .find(&id)
        .select(comments::author_id)
        .first::<String>(&mut conn)
        .await
        .optional()?
        .ok_or_else(|| PlatformError::NotFound(format!("comment {id}")))?;

    let is_author = query.requester_id.as_deref() == Some(author.as_str());
    if !is_author {
        require_admin(&ctx, cookies.as_ref()).await?;
    }

    diesel::delete(comments::table.find(&id))
        .execute(&mut conn)
        .await?;
    Ok(Json(ApiResponse::success(json!({ "deleted": id }))))
}

#[derive(Debug, Deserialize)]
pub struct LikeBody {
    pub profile_id: String,
}

/// Idempotent like: the composite key makes a repeat PUT a no-op.
pub async fn put_like(
    State(ctx): State<AppContext>,
    Path(post_id): Path<String>,
    Json(body): Json<LikeBody>,
) -> Result<Json<ApiResponse<Value>>, PlatformError> {
    let mut conn = ctx.db.connection().await?;
    let post = load_post(&mut conn, &post_id).await?;
    let viewer = load_viewer(&mut conn, &body.profile_id).await?;
    require_interactable(&viewer, &post)?;

    let like = PostLike {
        post_id: post_id.clone(),
        profile_id: viewer.profile.id.clone(),
        created_at: Utc::now(),
    };
    diesel::insert_into(post_likes::table)
        .values(&like)
        .on_conflict_do_nothing()
        .execute(&mut conn)
        .await?;

    let count: i64 = post_likes::table
        .filter(post_likes::post_id.eq(&post_id))
        .count()
        .get_result(&mut conn)
        .await?;
    Ok(Json(ApiResponse::success(
        json!({ "liked": true, "like_count": count }),
    )))
}

#[derive(Debug, Deserialize)]
pub struct LikeQuery {
    pub profile_id: String,
}

/// Idempotent unlike. Removing a like is allowed even after the viewer's
/// stage has moved past the post.
pub async fn delete_like(
    State(ctx): State<AppContext>,
    Path(post_id): Path<String>,
    Query(query): Query<LikeQuery>,
) -> Result<Json<ApiResponse<Value>>, PlatformError> {
    let mut conn = ctx.db.connection().await?;
    diesel::delete(post_likes::table.find((&post_id, &query.profile_id)))
        .execute(&mut conn)
        .await?;

    let count: i64 = post_likes::table
        .filter(post_likes::post_id.eq(&post_id))
        .count()
        .get_result(&mut conn)
        .await?;
    Ok(Json(ApiResponse::success(
        json!({ "liked": false, "like_count": count }),
    )))
}
