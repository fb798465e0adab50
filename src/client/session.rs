// Copyright (c) CareMatch Team
// SPDX-License-Identifier: Apache-2.0

//! The app session: one struct owning local state for a signed-in viewer.
//! Lifecycle is hydrate, interact, teardown. Hydration degrades from remote
//! to cached snapshot to empty defaults instead of failing; interactions
//! apply optimistically and roll back when the backend rejects them.

use std::collections::BTreeSet;
use std::sync::Arc;
use std::time::Duration;

use chrono::{NaiveDate, Utc};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio::time::timeout;
use tracing::{info, warn};
use uuid::Uuid;

use crate::client::cache::{Snapshot, SnapshotCache};
use crate::client::optimistic::{commit_or_revert, LocalMutation};
use crate::client::store::RemoteStore;
use crate::error::PlatformError;
use crate::models::community::{Comment, NewComment, Post, PostLike};
use crate::models::matches::SurrogateMatch;
use crate::models::profile::Profile;
use crate::realtime::{ChangeHub, NotifyPolicy, StageNotice, StageWatcher, WatchOptions};
use crate::stage::gestation::{gestational_age, has_graduated, GestationalAge};
use crate::stage::{resolve_viewer_stage, visibility, ProgressStage, StageUpdater, Visibility};

/// Outer deadline for one bulk-load attempt.
pub const LOAD_TIMEOUT: Duration = Duration::from_secs(25);

/// Remote attempts before falling back to the cache.
pub const LOAD_ATTEMPTS: u32 = 2;

/// Where the session state came from. Hydration never fails outright.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HydrationSource {
    Remote,
    Cache,
    Empty,
}

/// A feed entry the viewer is allowed to see, tagged with how far they can
/// go with it.
#[derive(Debug)]
pub struct VisiblePost<'a> {
    pub post: &'a Post,
    pub visibility: Visibility,
}

struct StageFeed {
    notices: mpsc::Receiver<StageNotice>,
    handle: JoinHandle<()>,
}

pub struct AppSession<R, C> {
    user_id: String,
    store: Arc<R>,
    cache: C,
    state: Snapshot,
    watch: Option<StageFeed>,
}

impl<R, C> AppSession<R, C>
where
    R: RemoteStore + 'static,
    C: SnapshotCache,
{
    pub fn new(user_id: impl Into<String>, store: Arc<R>, cache: C) -> Self {
        Self {
            user_id: user_id.into(),
            store,
            cache,
            state: Snapshot::default(),
            watch: None,
        }
    }

    pub fn user_id(&self) -> &str {
        &self.user_id
    }

    pub fn state(&self) -> &Snapshot {
        &self.state
    }

    /// Load everything the app needs: two remote attempts under a deadline,
    /// then the cached snapshot, then empty defaults. The celebration flag
    /// survives whichever path wins, and a successful remote load refreshes
    /// the cache.
    pub async fn hydrate(&mut self) -> HydrationSource {
        let cached = match self.cache.load() {
            Ok(cached) => cached,
            Err(err) => {
                warn!(error = %err, "snapshot cache unreadable");
                None
            }
        };
        let graduation_seen = self.state.graduation_seen
            || cached.as_ref().map(|s| s.graduation_seen).unwrap_or(false);

        for attempt in 1..=LOAD_ATTEMPTS {
            match timeout(LOAD_TIMEOUT, self.load_remote()).await {
                Ok(Ok(mut snapshot)) => {
                    snapshot.graduation_seen = graduation_seen;
                    if let Err(err) = self.cache.store(&snapshot) {
                        warn!(error = %err, "failed to refresh snapshot cache");
                    }
                    self.state = snapshot;
                    return HydrationSource::Remote;
                }
                Ok(Err(err)) => {
                    warn!(attempt, error = %err, "bulk load failed");
                }
                Err(_) => {
                    warn!(
                        attempt,
                        timeout_secs = LOAD_TIMEOUT.as_secs(),
                        "bulk load timed out"
                    );
                }
            }
        }

        match cached {
            Some(mut snapshot) => {
                info!("serving cached snapshot until the backend recovers");
                snapshot.graduation_seen = graduation_seen;
                self.state = snapshot;
                HydrationSource::Cache
            }
            None => {
                warn!("no usable snapshot cache, starting from empty state");
                self.state = Snapshot {
                    graduation_seen,
                    ..Snapshot::default()
                };
                HydrationSource::Empty
            }
        }
    }

    async fn load_remote(&self) -> Result<Snapshot, PlatformError> {
        let profile = self
            .store
            .profile(&self.user_id)
            .await?
            .ok_or_else(|| PlatformError::NotFound(format!("profile {}", self.user_id)))?;
        let matches = self.store.matches_for(&self.user_id).await?;

        let is_surrogate = profile.is_surrogate();
        let mut surrogate_ids = BTreeSet::new();
        if is_surrogate {
            surrogate_ids.insert(profile.id.clone());
        } else {
            surrogate_ids.extend(matches.iter().map(|m| m.surrogate_id.clone()));
        }
        let surrogate_ids: Vec<String> = surrogate_ids.into_iter().collect();

        let anchor = SurrogateMatch::anchor(&matches);
        let partner_id = match anchor {
            Some(m) if is_surrogate => m.parent_ids().next().map(str::to_string),
            Some(m) => Some(m.surrogate_id.clone()),
            None => None,
        };

        let (partner, posts) = tokio::try_join!(
            async {
                match partner_id.as_deref() {
                    Some(id) => self.store.profile(id).await,
                    None => Ok(None),
                }
            },
            async {
                if surrogate_ids.is_empty() {
                    self.store.posts_with_stage(ProgressStage::Pre).await
                } else {
                    self.store.posts_for_surrogates(&surrogate_ids).await
                }
            },
        )?;

        let post_ids: Vec<String> = posts.iter().map(|p| p.id.clone()).collect();
        let (comments, likes) = tokio::try_join!(
            self.store.comments_for_posts(&post_ids),
            self.store.likes_for_posts(&post_ids),
        )?;

        Ok(Snapshot {
            profile: Some(profile),
            partner,
            matches,
            posts,
            comments,
            likes,
            graduation_seen: false,
        })
    }

    /// The stage this viewer experiences as "current".
    pub fn resolved_stage(&self) -> ProgressStage {
        let own = self.state.profile.as_ref().and_then(Profile::stage);
        let is_surrogate = self
            .state
            .profile
            .as_ref()
            .map(Profile::is_surrogate)
            .unwrap_or(false);
        let partner = self.state.partner.as_ref().and_then(Profile::stage);
        resolve_viewer_stage(own, is_surrogate, partner)
    }

    /// Feed entries the viewer may see. Later-stage content is dropped
    /// entirely; posts whose stored stage cannot be read are dropped too.
    pub fn visible_posts(&self) -> Vec<VisiblePost<'_>> {
        let viewer = self.resolved_stage();
        self.state
            .posts
            .iter()
            .filter_map(|post| {
                let stage = post.stage()?;
                match visibility(viewer, stage) {
                    Visibility::Hidden => None,
                    vis => Some(VisiblePost {
                        post,
                        visibility: vis,
                    }),
                }
            })
            .collect()
    }

    pub fn comments_on(&self, post_id: &str) -> Vec<&Comment> {
        self.state
            .comments
            .iter()
            .filter(|c| c.post_id == post_id)
            .collect()
    }

    pub fn like_count(&self, post_id: &str) -> usize {
        self.state
            .likes
            .iter()
            .filter(|l| l.post_id == post_id)
            .count()
    }

    pub fn liked_by_me(&self, post_id: &str) -> bool {
        self.state
            .likes
            .iter()
            .any(|l| l.post_id == post_id && l.profile_id == self.user_id)
    }

    /// The profile whose pregnancy this session follows: the surrogate's
    /// own, or the matched surrogate's for a parent.
    fn journey_profile(&self) -> Option<&Profile> {
        let own = self.state.profile.as_ref()?;
        if own.is_surrogate() {
            Some(own)
        } else {
            self.state.partner.as_ref()
        }
    }

    /// Current gestational age, when a transfer date is on record.
    pub fn gestation(&self, today: NaiveDate) -> Option<GestationalAge> {
        let journey = self.journey_profile()?;
        let transfer = journey.transfer_date?;
        let embryo = journey.embryo_day().unwrap_or_default();
        Some(gestational_age(transfer, embryo, today))
    }

    /// One-time celebration once the pregnancy passes the ten-week clinic
    /// graduation. Returns the banner copy the first time it fires; the
    /// flag is persisted so it never fires again, even after a reinstall
    /// restores from cache.
    pub fn maybe_celebrate(&mut self, today: NaiveDate) -> Option<String> {
        if self.state.graduation_seen {
            return None;
        }
        let journey = self.journey_profile()?;
        let transfer = journey.transfer_date?;
        let embryo = journey.embryo_day().unwrap_or_default();
        if !has_graduated(transfer, embryo, today) {
            return None;
        }
        let own_journey = self
            .state
            .profile
            .as_ref()
            .map(|p| p.id == journey.id)
            .unwrap_or(false);
        let name = journey.display_name.clone();

        self.state.graduation_seen = true;
        if let Err(err) = self.cache.store(&self.state) {
            warn!(error = %err, "failed to persist celebration flag");
        }
        if own_journey {
            Some("Ten weeks! You have officially graduated from the fertility clinic.".to_string())
        } else {
            Some(format!(
                "{name} is ten weeks along and has graduated from the fertility clinic!"
            ))
        }
    }

    fn require_interactable(&self, post_id: &str) -> Result<(), PlatformError> {
        let post = self
            .state
            .posts
            .iter()
            .find(|p| p.id == post_id)
            .ok_or_else(|| PlatformError::NotFound(format!("post {post_id}")))?;
        let stage = post
            .stage()
            .ok_or_else(|| PlatformError::validation("post stage is unreadable"))?;
        if visibility(self.resolved_stage(), stage) != Visibility::Interactable {
            return Err(PlatformError::validation(
                "post is outside your current stage",
            ));
        }
        Ok(())
    }

    /// Like or unlike an interactable post. Returns whether the post ends
    /// up liked.
    pub async fn toggle_like(&mut self, post_id: &str) -> Result<bool, PlatformError> {
        self.require_interactable(post_id)?;
        let store = Arc::clone(&self.store);
        let existing = self
            .state
            .likes
            .iter()
            .find(|l| l.post_id == post_id && l.profile_id == self.user_id)
            .cloned();

        match existing {
            Some(like) => {
                let target = (like.post_id.clone(), like.profile_id.clone());
                commit_or_revert(&mut self.state, RemoveLike { like }, || async move {
                    store.delete_like(&target.0, &target.1).await
                })
                .await?;
                Ok(false)
            }
            None => {
                let like = PostLike {
                    post_id: post_id.to_string(),
                    profile_id: self.user_id.clone(),
                    created_at: Utc::now(),
                };
                let record = like.clone();
                commit_or_revert(&mut self.state, AddLike { like }, || async move {
                    store.insert_like(&record).await
                })
                .await?;
                Ok(true)
            }
        }
    }

    /// Comment on an interactable post. `reply_to` threads the comment
    /// under an existing comment on the same post. Returns the new
    /// comment's id.
    pub async fn add_comment(
        &mut self,
        post_id: &str,
        content: impl Into<String>,
        reply_to: Option<&str>,
    ) -> Result<String, PlatformError> {
        self.require_interactable(post_id)?;
        let content = content.into();
        if content.trim().is_empty() {
            return Err(PlatformError::validation("comment content is empty"));
        }
        if let Some(parent_id) = reply_to {
            let parent_on_post = self
                .state
                .comments
                .iter()
                .any(|c| c.id == parent_id && c.post_id == post_id);
            if !parent_on_post {
                return Err(PlatformError::validation(
                    "reply target is not a comment on this post",
                ));
            }
        }

        let comment = Comment {
            id: Uuid::new_v4().to_string(),
            post_id: post_id.to_string(),
            author_id: self.user_id.clone(),
            parent_comment_id: reply_to.map(str::to_string),
            content,
            created_at: Utc::now(),
        };
        let record = NewComment {
            id: comment.id.clone(),
            post_id: comment.post_id.clone(),
            author_id: comment.author_id.clone(),
            parent_comment_id: comment.parent_comment_id.clone(),
            content: comment.content.clone(),
            created_at: comment.created_at,
        };
        let id = comment.id.clone();
        let store = Arc::clone(&self.store);
        commit_or_revert(&mut self.state, AddComment { comment }, || async move {
            store.insert_comment(&record).await
        })
        .await?;
        Ok(id)
    }

    /// Surrogate-side stage report. Backward moves are allowed but logged.
    pub async fn set_stage(&mut self, stage: ProgressStage) -> Result<(), PlatformError> {
        let profile = self
            .state
            .profile
            .as_ref()
            .ok_or_else(|| PlatformError::validation("no profile loaded"))?;
        if !profile.is_surrogate() {
            return Err(PlatformError::validation(
                "only surrogates report their own stage",
            ));
        }
        if let Some(current) = profile.stage() {
            if current == stage {
                return Ok(());
            }
            if current.is_regression_to(stage) {
                warn!(
                    profile_id = %profile.id,
                    from = current.as_str(),
                    to = stage.as_str(),
                    "stage moving backwards"
                );
            }
        }

        let mutation = SetStage {
            from_stage: profile.progress_stage.clone(),
            from_updated_by: profile.stage_updated_by.clone(),
            to: stage,
        };
        let store = Arc::clone(&self.store);
        let user_id = self.user_id.clone();
        commit_or_revert(&mut self.state, mutation, || async move {
            store
                .write_stage(&user_id, stage, StageUpdater::Surrogate)
                .await
        })
        .await
    }

    /// Start following stage changes: a surrogate hears only care-team
    /// corrections to their own stage, a parent hears every change on
    /// their surrogate's. No-op when there is nothing to watch.
    pub fn watch_stage(&mut self, hub: &ChangeHub) {
        self.stop_watching();
        let own = match self.state.profile.as_ref() {
            Some(profile) => profile,
            None => return,
        };
        let (target, policy) = if own.is_surrogate() {
            (own.id.clone(), NotifyPolicy::AdminOnly)
        } else {
            match self.state.partner.as_ref() {
                Some(partner) => (partner.id.clone(), NotifyPolicy::AllChanges),
                None => return,
            }
        };
        let options = WatchOptions {
            policy,
            ..WatchOptions::default()
        };
        let watcher = StageWatcher::new(target, Arc::clone(&self.store), hub, options);
        let (notices, handle) = watcher.spawn();
        self.watch = Some(StageFeed { notices, handle });
    }

    /// Next stage change on the watched profile. `None` when nothing is
    /// being watched or the watcher has stopped.
    pub async fn next_stage_notice(&mut self) -> Option<StageNotice> {
        match self.watch.as_mut() {
            Some(feed) => feed.notices.recv().await,
            None => None,
        }
    }

    /// Fold a received notice back into local state so the feed and stage
    /// banner re-render with the new stage.
    pub fn apply_stage_notice(&mut self, notice: &StageNotice) {
        if let Some(profile) = self.state.profile.as_mut() {
            if profile.id == notice.profile_id {
                profile.progress_stage = notice.to.as_str().to_string();
                profile.stage_updated_by = notice.updated_by.map(|u| u.as_str().to_string());
            }
        }
        if let Some(partner) = self.state.partner.as_mut() {
            if partner.id == notice.profile_id {
                partner.progress_stage = notice.to.as_str().to_string();
                partner.stage_updated_by = notice.updated_by.map(|u| u.as_str().to_string());
            }
        }
    }

    fn stop_watching(&mut self) {
        if let Some(feed) = self.watch.take() {
            feed.handle.abort();
        }
    }

    /// Persist state and stop background work. Call on app close.
    pub fn teardown(mut self) {
        self.stop_watching();
        if let Err(err) = self.cache.store(&self.state) {
            warn!(error = %err, "failed to persist snapshot on teardown");
        }
    }
}

struct AddLike {
    like: PostLike,
}

impl LocalMutation<Snapshot> for AddLike {
    fn apply(&self, state: &mut Snapshot) {
        state.likes.push(self.like.clone());
    }

    fn invert(&self, state: &mut Snapshot) {
        state
            .likes
            .retain(|l| !(l.post_id == self.like.post_id && l.profile_id == self.like.profile_id));
    }
}

struct RemoveLike {
    like: PostLike,
}

impl LocalMutation<Snapshot> for RemoveLike {
    fn apply(&self, state: &mut Snapshot) {
        state
            .likes
            .retain(|l| !(l.post_id == self.like.post_id && l.profile_id == self.like.profile_id));
    }

    fn invert(&self, state: &mut Snapshot) {
        state.likes.push(self.like.clone());
    }
}

struct AddComment {
    comment: Comment,
}

impl LocalMutation<Snapshot> for AddComment {
    fn apply(&self, state: &mut Snapshot) {
        state.comments.push(self.comment.clone());
    }

    fn invert(&self, state: &mut Snapshot) {
        state.comments.retain(|c| c.id != self.comment.id);
    }
}

struct SetStage {
    from_stage: String,
    from_updated_by: Option<String>,
    to: ProgressStage,
}

impl LocalMutation<Snapshot> for SetStage {
    fn apply(&self, state: &mut Snapshot) {
        if let Some(profile) = state.profile.as_mut() {
            profile.progress_stage = self.to.as_str().to_string();
            profile.stage_updated_by = Some(StageUpdater::Surrogate.as_str().to_string());
        }
    }

    fn invert(&self, state: &mut Snapshot) {
        if let Some(profile) = state.profile.as_mut() {
            profile.progress_stage = self.from_stage.clone();
            profile.stage_updated_by = self.from_updated_by.clone();
        }
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicBool, AtomicU32, Ordering};
    use std::sync::Mutex;

    use async_trait::async_trait;
    use chrono::Duration as ChronoDuration;

    use super::*;
    use crate::client::cache::MemoryCache;
    use crate::realtime::{StageChange, StageSnapshot, StageSource};

    #[derive(Default)]
    struct FakeStore {
        profiles: Mutex<Vec<Profile>>,
        matches: Mutex<Vec<SurrogateMatch>>,
        posts: Mutex<Vec<Post>>,
        comments: Mutex<Vec<Comment>>,
        likes: Mutex<Vec<PostLike>>,
        fail_all: AtomicBool,
        fail_writes: AtomicBool,
        hang: AtomicBool,
        profile_calls: AtomicU32,
    }

    impl FakeStore {
        fn guard(&self) -> Result<(), PlatformError> {
            if self.fail_all.load(Ordering::SeqCst) {
                return Err(PlatformError::remote("backend down"));
            }
            Ok(())
        }

        fn write_guard(&self) -> Result<(), PlatformError> {
            self.guard()?;
            if self.fail_writes.load(Ordering::SeqCst) {
                return Err(PlatformError::remote("write rejected"));
            }
            Ok(())
        }
    }

    #[async_trait]
    impl StageSource for FakeStore {
        async fn current_stage(
            &self,
            profile_id: &str,
        ) -> Result<Option<StageSnapshot>, PlatformError> {
            self.guard()?;
            let profiles = self.profiles.lock().unwrap();
            Ok(profiles.iter().find(|p| p.id == profile_id).map(|p| {
                StageSnapshot {
                    stage: p.stage().unwrap_or(ProgressStage::Pre),
                    updated_by: p.stage_updater(),
                }
            }))
        }
    }

    #[async_trait]
    impl RemoteStore for FakeStore {
        async fn profile(&self, id: &str) -> Result<Option<Profile>, PlatformError> {
            self.profile_calls.fetch_add(1, Ordering::SeqCst);
            if self.hang.load(Ordering::SeqCst) {
                tokio::time::sleep(Duration::from_secs(3600)).await;
            }
            self.guard()?;
            Ok(self
                .profiles
                .lock()
                .unwrap()
                .iter()
                .find(|p| p.id == id)
                .cloned())
        }

        async fn matches_for(
            &self,
            profile_id: &str,
        ) -> Result<Vec<SurrogateMatch>, PlatformError> {
            self.guard()?;
            Ok(self
                .matches
                .lock()
                .unwrap()
                .iter()
                .filter(|m| m.involves(profile_id))
                .cloned()
                .collect())
        }

        async fn posts_for_surrogates(
            &self,
            surrogate_ids: &[String],
        ) -> Result<Vec<Post>, PlatformError> {
            self.guard()?;
            Ok(self
                .posts
                .lock()
                .unwrap()
                .iter()
                .filter(|p| surrogate_ids.contains(&p.surrogate_id))
                .cloned()
                .collect())
        }

        async fn posts_with_stage(
            &self,
            stage: ProgressStage,
        ) -> Result<Vec<Post>, PlatformError> {
            self.guard()?;
            Ok(self
                .posts
                .lock()
                .unwrap()
                .iter()
                .filter(|p| p.stage == stage.as_str())
                .cloned()
                .collect())
        }

        async fn comments_for_posts(
            &self,
            post_ids: &[String],
        ) -> Result<Vec<Comment>, PlatformError> {
            self.guard()?;
            Ok(self
                .comments
                .lock()
                .unwrap()
                .iter()
                .filter(|c| post_ids.contains(&c.post_id))
                .cloned()
                .collect())
        }

        async fn likes_for_posts(
            &self,
            post_ids: &[String],
        ) -> Result<Vec<PostLike>, PlatformError> {
            self.guard()?;
            Ok(self
                .likes
                .lock()
                .unwrap()
                .iter()
                .filter(|l| post_ids.contains(&l.post_id))
                .cloned()
                .collect())
        }

        async fn insert_like(&self, like: &PostLike) -> Result<(), PlatformError> {
            self.write_guard()?;
            self.likes.lock().unwrap().push(like.clone());
            Ok(())
        }

        async fn delete_like(
            &self,
            post_id: &str,
            profile_id: &str,
        ) -> Result<(), PlatformError> {
            self.write_guard()?;
            self.likes
                .lock()
                .unwrap()
                .retain(|l| !(l.post_id == post_id && l.profile_id == profile_id));
            Ok(())
        }

        async fn insert_comment(&self, comment: &NewComment) -> Result<(), PlatformError> {
            self.write_guard()?;
            self.comments.lock().unwrap().push(Comment {
                id: comment.id.clone(),
                post_id: comment.post_id.clone(),
                author_id: comment.author_id.clone(),
                parent_comment_id: comment.parent_comment_id.clone(),
                content: comment.content.clone(),
                created_at: comment.created_at,
            });
            Ok(())
        }

        async fn write_stage(
            &self,
            profile_id: &str,
            stage: ProgressStage,
            updated_by: StageUpdater,
        ) -> Result<(), PlatformError> {
            self.write_guard()?;
            let mut profiles = self.profiles.lock().unwrap();
            if let Some(profile) = profiles.iter_mut().find(|p| p.id == profile_id) {
                profile.progress_stage = stage.as_str().to_string();
                profile.stage_updated_by = Some(updated_by.as_str().to_string());
            }
            Ok(())
        }
    }

    fn profile(id: &str, role: &str, stage: &str) -> Profile {
        Profile {
            id: id.to_string(),
            role: role.to_string(),
            display_name: format!("{id} name"),
            email: None,
            date_of_birth: None,
            location: None,
            race: None,
            progress_stage: stage.to_string(),
            stage_updated_by: None,
            stage_updated_at: None,
            transfer_date: None,
            transfer_embryo_day: None,
            created_at: Utc::now(),
            updated_at: Utc::now(),
        }
    }

    fn active_match(id: &str, surrogate: &str, parent: &str) -> SurrogateMatch {
        SurrogateMatch {
            id: id.to_string(),
            surrogate_id: surrogate.to_string(),
            parent_id: Some(parent.to_string()),
            secondary_parent_id: None,
            status: "active".to_string(),
            sign_date: None,
            transfer_date: None,
            beta_confirm_date: None,
            due_date: None,
            legal_clearance_date: None,
            medication_start_date: None,
            pregnancy_test_date: None,
            second_pregnancy_test_date: None,
            created_at: Utc::now(),
            updated_at: Utc::now(),
        }
    }

    fn post(id: &str, surrogate: &str, stage: &str) -> Post {
        Post {
            id: id.to_string(),
            author_id: surrogate.to_string(),
            surrogate_id: surrogate.to_string(),
            stage: stage.to_string(),
            content: "an update".to_string(),
            image_url: None,
            created_at: Utc::now(),
        }
    }

    fn surrogate_store() -> FakeStore {
        let store = FakeStore::default();
        store
            .profiles
            .lock()
            .unwrap()
            .push(profile("s1", "surrogate", "pregnancy"));
        store
            .profiles
            .lock()
            .unwrap()
            .push(profile("p1", "parent", "pre"));
        store
            .matches
            .lock()
            .unwrap()
            .push(active_match("m1", "s1", "p1"));
        store.posts.lock().unwrap().extend([
            post("post-pre", "s1", "pre"),
            post("post-now", "s1", "pregnancy"),
            post("post-later", "s1", "ob_visit"),
        ]);
        store
    }

    #[tokio::test]
    async fn hydrates_from_remote_and_refreshes_cache() {
        let cache = Arc::new(MemoryCache::default());
        let mut session =
            AppSession::new("s1", Arc::new(surrogate_store()), Arc::clone(&cache));

        assert_eq!(session.hydrate().await, HydrationSource::Remote);
        assert!(session.state().profile.is_some());
        assert_eq!(session.state().posts.len(), 3);
        assert_eq!(
            session.state().partner.as_ref().map(|p| p.id.as_str()),
            Some("p1")
        );
        assert!(cache.load().unwrap().is_some());
    }

    #[tokio::test]
    async fn falls_back_to_cache_after_two_failed_attempts() {
        let store = surrogate_store();
        store.fail_all.store(true, Ordering::SeqCst);
        let store = Arc::new(store);

        let cache = Arc::new(MemoryCache::default());
        cache
            .store(&Snapshot {
                profile: Some(profile("s1", "surrogate", "pregnancy")),
                ..Snapshot::default()
            })
            .unwrap();

        let mut session = AppSession::new("s1", Arc::clone(&store), cache);
        assert_eq!(session.hydrate().await, HydrationSource::Cache);
        assert!(session.state().profile.is_some());
        assert_eq!(store.profile_calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn starts_empty_when_remote_and_cache_are_both_gone() {
        let store = FakeStore::default();
        store.fail_all.store(true, Ordering::SeqCst);

        let mut session = AppSession::new("s1", Arc::new(store), MemoryCache::default());
        assert_eq!(session.hydrate().await, HydrationSource::Empty);
        assert!(session.state().profile.is_none());
        assert!(session.state().posts.is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn slow_backend_times_out_instead_of_blocking_startup() {
        let store = surrogate_store();
        store.hang.store(true, Ordering::SeqCst);
        let store = Arc::new(store);

        let mut session = AppSession::new("s1", Arc::clone(&store), MemoryCache::default());
        assert_eq!(session.hydrate().await, HydrationSource::Empty);
        assert_eq!(store.profile_calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn visible_posts_hide_later_stages_and_tag_the_rest() {
        let mut session = AppSession::new(
            "s1",
            Arc::new(surrogate_store()),
            MemoryCache::default(),
        );
        session.hydrate().await;

        let visible = session.visible_posts();
        assert_eq!(visible.len(), 2);
        let earlier = visible.iter().find(|v| v.post.id == "post-pre").unwrap();
        assert_eq!(earlier.visibility, Visibility::ReadOnly);
        let current = visible.iter().find(|v| v.post.id == "post-now").unwrap();
        assert_eq!(current.visibility, Visibility::Interactable);
        assert!(visible.iter().all(|v| v.post.id != "post-later"));
    }

    #[tokio::test]
    async fn unmatched_parent_gets_the_community_pre_feed() {
        let store = FakeStore::default();
        store
            .profiles
            .lock()
            .unwrap()
            .push(profile("p9", "parent", "pre"));
        store.posts.lock().unwrap().extend([
            post("other-pre", "s7", "pre"),
            post("other-later", "s7", "pregnancy"),
        ]);

        let mut session = AppSession::new("p9", Arc::new(store), MemoryCache::default());
        assert_eq!(session.hydrate().await, HydrationSource::Remote);
        assert_eq!(session.resolved_stage(), ProgressStage::Pre);

        let visible = session.visible_posts();
        assert_eq!(visible.len(), 1);
        assert_eq!(visible[0].post.id, "other-pre");
    }

    #[tokio::test]
    async fn matched_parent_mirrors_the_surrogate_stage() {
        let mut session = AppSession::new(
            "p1",
            Arc::new(surrogate_store()),
            MemoryCache::default(),
        );
        session.hydrate().await;
        assert_eq!(session.resolved_stage(), ProgressStage::Pregnancy);
    }

    #[tokio::test]
    async fn toggle_like_rolls_back_when_the_backend_rejects_it() {
        let store = Arc::new(surrogate_store());
        let mut session = AppSession::new("s1", Arc::clone(&store), MemoryCache::default());
        session.hydrate().await;

        store.fail_writes.store(true, Ordering::SeqCst);
        let err = session.toggle_like("post-now").await.unwrap_err();
        assert!(matches!(err, PlatformError::Remote(_)));
        assert!(!session.liked_by_me("post-now"));

        store.fail_writes.store(false, Ordering::SeqCst);
        assert!(session.toggle_like("post-now").await.unwrap());
        assert!(session.liked_by_me("post-now"));
        assert_eq!(session.like_count("post-now"), 1);

        assert!(!session.toggle_like("post-now").await.unwrap());
        assert!(!session.liked_by_me("post-now"));
    }

    #[tokio::test]
    async fn interactions_outside_the_current_stage_are_rejected() {
        let mut session = AppSession::new(
            "s1",
            Arc::new(surrogate_store()),
            MemoryCache::default(),
        );
        session.hydrate().await;

        let err = session.toggle_like("post-pre").await.unwrap_err();
        assert!(matches!(err, PlatformError::Validation(_)));
        let err = session
            .add_comment("post-later", "hello", None)
            .await
            .unwrap_err();
        assert!(matches!(err, PlatformError::Validation(_)));
    }

    #[tokio::test]
    async fn comments_thread_under_parents_on_the_same_post() {
        let store = Arc::new(surrogate_store());
        let mut session = AppSession::new("s1", Arc::clone(&store), MemoryCache::default());
        session.hydrate().await;

        let top = session
            .add_comment("post-now", "how are you feeling?", None)
            .await
            .unwrap();
        let reply = session
            .add_comment("post-now", "great this week", Some(&top))
            .await
            .unwrap();
        assert_ne!(top, reply);
        assert_eq!(session.comments_on("post-now").len(), 2);

        let err = session
            .add_comment("post-pre", "old thread", Some(&top))
            .await
            .unwrap_err();
        assert!(matches!(err, PlatformError::Validation(_)));
    }

    #[tokio::test]
    async fn set_stage_reverts_locally_when_the_write_fails() {
        let store = Arc::new(surrogate_store());
        let mut session = AppSession::new("s1", Arc::clone(&store), MemoryCache::default());
        session.hydrate().await;

        store.fail_writes.store(true, Ordering::SeqCst);
        let err = session.set_stage(ProgressStage::ObVisit).await.unwrap_err();
        assert!(matches!(err, PlatformError::Remote(_)));
        assert_eq!(session.resolved_stage(), ProgressStage::Pregnancy);

        store.fail_writes.store(false, Ordering::SeqCst);
        session.set_stage(ProgressStage::ObVisit).await.unwrap();
        assert_eq!(session.resolved_stage(), ProgressStage::ObVisit);
    }

    #[tokio::test]
    async fn celebration_fires_once_and_survives_a_fresh_session() {
        let today = NaiveDate::from_ymd_opt(2025, 6, 15).unwrap();
        let transfer = today - ChronoDuration::days(75);

        let store = surrogate_store();
        if let Some(p) = store.profiles.lock().unwrap().iter_mut().find(|p| p.id == "s1") {
            p.transfer_date = Some(transfer);
            p.transfer_embryo_day = Some(5);
        }
        let store = Arc::new(store);
        let cache = Arc::new(MemoryCache::default());

        let mut session = AppSession::new("s1", Arc::clone(&store), Arc::clone(&cache));
        session.hydrate().await;
        assert!(session.maybe_celebrate(today).is_some());
        assert!(session.maybe_celebrate(today).is_none());

        // A fresh session hydrating from remote still remembers the flag
        // through the cache.
        let mut fresh = AppSession::new("s1", Arc::clone(&store), Arc::clone(&cache));
        assert_eq!(fresh.hydrate().await, HydrationSource::Remote);
        assert!(fresh.maybe_celebrate(today).is_none());
    }

    #[tokio::test]
    async fn celebration_waits_for_the_threshold() {
        let today = NaiveDate::from_ymd_opt(2025, 6, 15).unwrap();
        let transfer = today - ChronoDuration::days(30);

        let store = surrogate_store();
        if let Some(p) = store.profiles.lock().unwrap().iter_mut().find(|p| p.id == "s1") {
            p.transfer_date = Some(transfer);
            p.transfer_embryo_day = Some(5);
        }

        let mut session = AppSession::new("s1", Arc::new(store), MemoryCache::default());
        session.hydrate().await;
        // 30 days post transfer of a day-5 embryo is 49 gestational days.
        assert_eq!(session.gestation(today).unwrap().total_days, 49);
        assert!(session.maybe_celebrate(today).is_none());
    }

    #[tokio::test(start_paused = true)]
    async fn parent_session_hears_admin_stage_pushes() {
        let store = Arc::new(surrogate_store());
        let hub = ChangeHub::new();

        let mut session = AppSession::new("p1", Arc::clone(&store), MemoryCache::default());
        session.hydrate().await;
        session.watch_stage(&hub);

        hub.publish(StageChange {
            profile_id: "s1".to_string(),
            stage: ProgressStage::ObVisit,
            updated_by: Some(StageUpdater::Admin),
            changed_at: Utc::now(),
        });

        let notice = session.next_stage_notice().await.unwrap();
        assert_eq!(notice.to, ProgressStage::ObVisit);
        session.apply_stage_notice(&notice);
        assert_eq!(session.resolved_stage(), ProgressStage::ObVisit);

        session.teardown();
    }
}
