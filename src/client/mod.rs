// Copyright (c) CareMatch Team
// SPDX-License-Identifier: Apache-2.0

//! Embedded core for the companion app. One [`AppSession`] owns the local
//! state for a signed-in viewer, hydrates it from the backend or a cached
//! snapshot, applies optimistic mutations, and follows stage changes while
//! the app is open.

pub mod cache;
pub mod optimistic;
pub mod session;
pub mod store;

pub use cache::{FileCache, MemoryCache, Snapshot, SnapshotCache};
pub use optimistic::{commit_or_revert, LocalMutation};
pub use session::{AppSession, HydrationSource, VisiblePost, LOAD_ATTEMPTS, LOAD_TIMEOUT};
pub use store::RemoteStore;
