// Copyright (c) CareMatch Team
// SPDX-License-Identifier: Apache-2.0

//! Snapshot persistence between app runs.

use std::fs;
use std::io::ErrorKind;
use std::path::PathBuf;
use std::sync::{Arc, Mutex};

use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::error::PlatformError;
use crate::models::community::{Comment, Post, PostLike};
use crate::models::matches::SurrogateMatch;
use crate::models::profile::Profile;

/// Everything the session keeps in memory and persists between runs.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Snapshot {
    pub profile: Option<Profile>,
    /// The other side of the match: the surrogate for a parent viewer, the
    /// primary parent for a surrogate viewer.
    pub partner: Option<Profile>,
    pub matches: Vec<SurrogateMatch>,
    pub posts: Vec<Post>,
    pub comments: Vec<Comment>,
    pub likes: Vec<PostLike>,
    /// Set once the ten-week celebration has been shown. Survives restarts
    /// so the celebration never repeats.
    #[serde(default)]
    pub graduation_seen: bool,
}

pub trait SnapshotCache: Send + Sync {
    /// `Ok(None)` when nothing usable is cached.
    fn load(&self) -> Result<Option<Snapshot>, PlatformError>;

    fn store(&self, snapshot: &Snapshot) -> Result<(), PlatformError>;
}

impl<T: SnapshotCache + ?Sized> SnapshotCache for Arc<T> {
    fn load(&self) -> Result<Option<Snapshot>, PlatformError> {
        (**self).load()
    }

    fn store(&self, snapshot: &Snapshot) -> Result<(), PlatformError> {
        (**self).store(snapshot)
    }
}

/// JSON file cache. A missing or corrupt file reads as absent rather than
/// failing hydration.
pub struct FileCache {
    path: PathBuf,
}

impl FileCache {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }
}

impl SnapshotCache for FileCache {
    fn load(&self) -> Result<Option<Snapshot>, PlatformError> {
        let raw = match fs::read_to_string(&self.path) {
            Ok(raw) => raw,
            Err(err) if err.kind() == ErrorKind::NotFound => return Ok(None),
            Err(err) => return Err(PlatformError::remote(err)),
        };
        match serde_json::from_str(&raw) {
            Ok(snapshot) => Ok(Some(snapshot)),
            Err(err) => {
                warn!(path = %self.path.display(), error = %err, "discarding unreadable snapshot");
                Ok(None)
            }
        }
    }

    fn store(&self, snapshot: &Snapshot) -> Result<(), PlatformError> {
        let raw = serde_json::to_string(snapshot).map_err(PlatformError::remote)?;
        if let Some(parent) = self.path.parent() {
            fs::create_dir_all(parent).map_err(PlatformError::remote)?;
        }
        fs::write(&self.path, raw).map_err(PlatformError::remote)
    }
}

/// In-memory cache for tests and previews.
#[derive(Default)]
pub struct MemoryCache {
    slot: Mutex<Option<Snapshot>>,
}

impl SnapshotCache for MemoryCache {
    fn load(&self) -> Result<Option<Snapshot>, PlatformError> {
        let slot = self
            .slot
            .lock()
            .map_err(|_| PlatformError::remote("snapshot cache poisoned"))?;
        Ok(slot.clone())
    }

    fn store(&self, snapshot: &Snapshot) -> Result<(), PlatformError> {
        let mut slot = self
            .slot
            .lock()
            .map_err(|_| PlatformError::remote("snapshot cache poisoned"))?;
        *slot = Some(snapshot.clone());
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn file_cache_round_trips() {
        let dir = tempfile::tempdir().unwrap();
        let cache = FileCache::new(dir.path().join("snapshot.json"));
        assert!(cache.load().unwrap().is_none());

        let snapshot = Snapshot {
            graduation_seen: true,
            ..Snapshot::default()
        };
        cache.store(&snapshot).unwrap();

        let loaded = cache.load().unwrap().unwrap();
        assert!(loaded.graduation_seen);
        assert!(loaded.posts.is_empty());
    }

    #[test]
    fn corrupt_file_reads_as_absent() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("snapshot.json");
        std::fs::write(&path, "{not json").unwrap();

        let cache = FileCache::new(path);
        assert!(cache.load().unwrap().is_none());
    }

    #[test]
    fn file_cache_creates_parent_directories() {
        let dir = tempfile::tempdir().unwrap();
        let cache = FileCache::new(dir.path().join("nested").join("snapshot.json"));
        cache.store(&Snapshot::default()).unwrap();
        assert!(cache.load().unwrap().is_some());
    }
}
