// Copyright (c) CareMatch Team
// SPDX-License-Identifier: Apache-2.0

//! Backend reads and writes the app session performs, behind a trait so the
//! session logic can run against a fake store in tests.

use async_trait::async_trait;
use diesel::prelude::*;
use diesel_async::RunQueryDsl;

use crate::db::Database;
use crate::error::PlatformError;
use crate::models::community::{Comment, NewComment, Post, PostLike};
use crate::models::matches::SurrogateMatch;
use crate::models::profile::Profile;
use crate::realtime::StageSource;
use crate::schema;
use crate::stage::{ProgressStage, StageUpdater};

/// Everything the session needs from the backend. Watching a stage requires
/// the store to double as a [`StageSource`] for the poll fallback.
#[async_trait]
pub trait RemoteStore: StageSource {
    async fn profile(&self, id: &str) -> Result<Option<Profile>, PlatformError>;

    /// Matches the profile takes part in, on either side, newest first.
    async fn matches_for(&self, profile_id: &str)
        -> Result<Vec<SurrogateMatch>, PlatformError>;

    /// Journey feed across the given surrogates, newest first.
    async fn posts_for_surrogates(
        &self,
        surrogate_ids: &[String],
    ) -> Result<Vec<Post>, PlatformError>;

    /// Community-wide feed for one stage, newest first. Used by viewers
    /// without a journey of their own.
    async fn posts_with_stage(&self, stage: ProgressStage) -> Result<Vec<Post>, PlatformError>;

    async fn comments_for_posts(&self, post_ids: &[String])
        -> Result<Vec<Comment>, PlatformError>;

    async fn likes_for_posts(&self, post_ids: &[String])
        -> Result<Vec<PostLike>, PlatformError>;

    async fn insert_like(&self, like: &PostLike) -> Result<(), PlatformError>;

    async fn delete_like(&self, post_id: &str, profile_id: &str) -> Result<(), PlatformError>;

    async fn insert_comment(&self, comment: &NewComment) -> Result<(), PlatformError>;

    async fn write_stage(
        &self,
        profile_id: &str,
        stage: ProgressStage,
        updated_by: StageUpdater,
    ) -> Result<(), PlatformError>;
}

#[async_trait]
impl RemoteStore for Database {
    async fn profile(&self, id: &str) -> Result<Option<Profile>, PlatformError> {
        let mut conn = self.connection().await?;
        let profile = schema::profiles::table
            .find(id)
            .first::<Profile>(&mut conn)
            .await
            .optional()?;
        Ok(profile)
    }

    async fn matches_for(
        &self,
        profile_id: &str,
    ) -> Result<Vec<SurrogateMatch>, PlatformError> {
        use schema::surrogate_matches::dsl;

        let mut conn = self.connection().await?;
        let rows = dsl::surrogate_matches
            .filter(
                dsl::surrogate_id
                    .eq(profile_id)
                    .or(dsl::parent_id.eq(profile_id))
                    .or(dsl::secondary_parent_id.eq(profile_id)),
            )
            .order(dsl::created_at.desc())
            .load::<SurrogateMatch>(&mut conn)
            .await?;
        Ok(rows)
    }

    async fn posts_for_surrogates(
        &self,
        surrogate_ids: &[String],
    ) -> Result<Vec<Post>, PlatformError> {
        use schema::posts::dsl;

        if surrogate_ids.is_empty() {
            return Ok(Vec::new());
        }
        let mut conn = self.connection().await?;
        let rows = dsl::posts
            .filter(dsl::surrogate_id.eq_any(surrogate_ids))
            .order(dsl::created_at.desc())
            .load::<Post>(&mut conn)
            .await?;
        Ok(rows)
    }

    async fn posts_with_stage(&self, stage: ProgressStage) -> Result<Vec<Post>, PlatformError> {
        use schema::posts::dsl;

        let mut conn = self.connection().await?;
        let rows = dsl::posts
            .filter(dsl::stage.eq(stage.as_str()))
            .order(dsl::created_at.desc())
            .load::<Post>(&mut conn)
            .await?;
        Ok(rows)
    }

    async fn comments_for_posts(
        &self,
        post_ids: &[String],
    ) -> Result<Vec<Comment>, PlatformError> {
        use schema::comments::dsl;

        if post_ids.is_empty() {
            return Ok(Vec::new());
        }
        let mut conn = self.connection().await?;
        let rows = dsl::comments
            .filter(dsl::post_id.eq_any(post_ids))
            .order(dsl::created_at.asc())
            .load::<Comment>(&mut conn)
            .await?;
        Ok(rows)
    }

    async fn likes_for_posts(
        &self,
        post_ids: &[String],
    ) -> Result<Vec<PostLike>, PlatformError> {
        use schema::post_likes::dsl;

        if post_ids.is_empty() {
            return Ok(Vec::new());
        }
        let mut conn = self.connection().await?;
        let rows = dsl::post_likes
            .filter(dsl::post_id.eq_any(post_ids))
            .load::<PostLike>(&mut conn)
            .await?;
        Ok(rows)
    }

    async fn insert_like(&self, like: &PostLike) -> Result<(), PlatformError> {
        let mut conn = self.connection().await?;
        diesel::insert_into(schema::post_likes::table)
            .values(like)
            .on_conflict_do_nothing()
            .execute(&mut conn)
            .await?;
        Ok(())
    }

    async fn delete_like(&self, post_id: &str, profile_id: &str) -> Result<(), PlatformError> {
        let mut conn = self.connection().await?;
        diesel::delete(schema::post_likes::table.find((post_id, profile_id)))
            .execute(&mut conn)
            .await?;
        Ok(())
    }

    async fn insert_comment(&self, comment: &NewComment) -> Result<(), PlatformError> {
        let mut conn = self.connection().await?;
        diesel::insert_into(schema::comments::table)
            .values(comment)
            .execute(&mut conn)
            .await?;
        Ok(())
    }

    async fn write_stage(
        &self,
        profile_id: &str,
        stage: ProgressStage,
        updated_by: StageUpdater,
    ) -> Result<(), PlatformError> {
        use schema::profiles::dsl;

        let mut conn = self.connection().await?;
        let now = chrono::Utc::now();
        let updated = diesel::update(dsl::profiles.find(profile_id))
            .set((
                dsl::progress_stage.eq(stage.as_str()),
                dsl::stage_updated_by.eq(updated_by.as_str()),
                dsl::stage_updated_at.eq(now),
                dsl::updated_at.eq(now),
            ))
            .execute(&mut conn)
            .await?;
        if updated == 0 {
            return Err(PlatformError::NotFound(format!("profile {profile_id}")));
        }
        Ok(())
    }
}
