// Copyright (c) CareMatch Team
// SPDX-License-Identifier: Apache-2.0

//! Community feed rows. A post is pinned to the stage its author was in at
//! publication time, which is what the stage-gated feed filters on later; the
//! author moving on never reclassifies old posts.

use chrono::{DateTime, Utc};
use diesel::prelude::*;
use serde::{Deserialize, Serialize};

use crate::schema::{comments, post_likes, posts};
use crate::stage::ProgressStage;

#[derive(Debug, Clone, Queryable, Selectable, Serialize, Deserialize)]
#[diesel(table_name = posts)]
#[diesel(check_for_backend(diesel::pg::Pg))]
pub struct Post {
    pub id: String,
    pub author_id: String,
    /// Surrogate whose journey this post belongs to. For surrogate authors
    /// this is the author; for parent authors it is their matched surrogate.
    pub surrogate_id: String,
    pub stage: String,
    pub content: String,
    pub image_url: Option<String>,
    pub created_at: DateTime<Utc>,
}

impl Post {
    pub fn stage(&self) -> Option<ProgressStage> {
        self.stage.parse().ok()
    }
}

#[derive(Debug, Insertable, Serialize, Deserialize)]
#[diesel(table_name = posts)]
pub struct NewPost {
    pub id: String,
    pub author_id: String,
    pub surrogate_id: String,
    pub stage: String,
    pub content: String,
    pub image_url: Option<String>,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Queryable, Selectable, Serialize, Deserialize)]
#[diesel(table_name = comments)]
#[diesel(check_for_backend(diesel::pg::Pg))]
pub struct Comment {
    pub id: String,
    pub post_id: String,
    pub author_id: String,
    /// Present for replies; must reference a comment on the same post.
    pub parent_comment_id: Option<String>,
    pub content: String,
    pub created_at: DateTime<Utc>,
}

impl Comment {
    pub fn is_reply(&self) -> bool {
        self.parent_comment_id.is_some()
    }
}

#[derive(Debug, Insertable, Serialize, Deserialize)]
#[diesel(table_name = comments)]
pub struct NewComment {
    pub id: String,
    pub post_id: String,
    pub author_id: String,
    pub parent_comment_id: Option<String>,
    pub content: String,
    pub created_at: DateTime<Utc>,
}

/// One like per profile per post, enforced by the composite primary key.
#[derive(Debug, Clone, Queryable, Selectable, Insertable, Serialize, Deserialize)]
#[diesel(table_name = post_likes)]
#[diesel(check_for_backend(diesel::pg::Pg))]
pub struct PostLike {
    pub post_id: String,
    pub profile_id: String,
    pub created_at: DateTime<Utc>,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn post(stage: &str) -> Post {
        Post {
            id: "p1".into(),
            author_id: "s1".into(),
            surrogate_id: "s1".into(),
            stage: stage.into(),
            content: "first scan today".into(),
            image_url: None,
            created_at: Utc::now(),
        }
    }

    #[test]
    fn post_stage_parses_known_labels() {
        assert_eq!(post("ob_visit").stage(), Some(ProgressStage::ObVisit));
        assert_eq!(post("archived").stage(), None);
    }

    #[test]
    fn reply_detection() {
        let comment = Comment {
            id: "c2".into(),
            post_id: "p1".into(),
            author_id: "u1".into(),
            parent_comment_id: Some("c1".into()),
            content: "congrats!".into(),
            created_at: Utc::now(),
        };
        assert!(comment.is_reply());
    }
}
