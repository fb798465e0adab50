// Copyright (c) CareMatch Team
// SPDX-License-Identifier: Apache-2.0

//! Local-first mutations. A state change applies immediately; a failed
//! remote commit rolls the exact inverse back before the error surfaces.

use std::future::Future;

use crate::error::PlatformError;

/// A reversible edit to local state. `invert` must exactly undo `apply`.
pub trait LocalMutation<S> {
    fn apply(&self, state: &mut S);

    fn invert(&self, state: &mut S);
}

/// Apply `mutation` to `state`, then run the remote commit. On commit
/// failure the mutation is inverted and the error returned untouched.
pub async fn commit_or_revert<S, M, F, Fut>(
    state: &mut S,
    mutation: M,
    commit: F,
) -> Result<(), PlatformError>
where
    M: LocalMutation<S>,
    F: FnOnce() -> Fut,
    Fut: Future<Output = Result<(), PlatformError>>,
{
    mutation.apply(state);
    match commit().await {
        Ok(()) => Ok(()),
        Err(err) => {
            mutation.invert(state);
            Err(err)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct AddOne;

    impl LocalMutation<i32> for AddOne {
        fn apply(&self, state: &mut i32) {
            *state += 1;
        }

        fn invert(&self, state: &mut i32) {
            *state -= 1;
        }
    }

    #[tokio::test]
    async fn keeps_state_on_success() {
        let mut state = 0;
        commit_or_revert(&mut state, AddOne, || async { Ok(()) })
            .await
            .unwrap();
        assert_eq!(state, 1);
    }

    #[tokio::test]
    async fn rolls_back_on_failure() {
        let mut state = 0;
        let err = commit_or_revert(&mut state, AddOne, || async {
            Err(PlatformError::remote("offline"))
        })
        .await
        .unwrap_err();

        assert_eq!(state, 0);
        assert!(matches!(err, PlatformError::Remote(_)));
    }
}
