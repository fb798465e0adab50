// Copyright (c) CareMatch Team
// SPDX-License-Identifier: Apache-2.0

//! Pregnancy progress stages and the content-visibility rules keyed on them.
//!
//! The stage is the sole gate for what a user may see and touch in the
//! community feed. It lives on the surrogate's profile, moves only through
//! an explicit admin or surrogate write, and is never inferred from dates
//! or medical data.

pub mod gestation;

use std::cmp::Ordering;
use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

/// The four strictly ordered pregnancy stages.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ProgressStage {
    Pre,
    Pregnancy,
    ObVisit,
    Delivery,
}

impl ProgressStage {
    pub const ALL: [ProgressStage; 4] = [
        ProgressStage::Pre,
        ProgressStage::Pregnancy,
        ProgressStage::ObVisit,
        ProgressStage::Delivery,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Pre => "pre",
            Self::Pregnancy => "pregnancy",
            Self::ObVisit => "ob_visit",
            Self::Delivery => "delivery",
        }
    }

    /// Human-readable label used in notification bodies.
    pub fn label(&self) -> &'static str {
        match self {
            Self::Pre => "Pre-transfer",
            Self::Pregnancy => "Pregnancy",
            Self::ObVisit => "OB visit",
            Self::Delivery => "Delivery",
        }
    }

    /// True when `next` would move the stage backwards. Backward writes are
    /// allowed (admin corrections happen) but get logged by callers.
    pub fn is_regression_to(&self, next: ProgressStage) -> bool {
        next < *self
    }
}

impl fmt::Display for ProgressStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ProgressStage {
    type Err = UnknownStage;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value {
            "pre" => Ok(Self::Pre),
            "pregnancy" => Ok(Self::Pregnancy),
            "ob_visit" => Ok(Self::ObVisit),
            "delivery" => Ok(Self::Delivery),
            other => Err(UnknownStage(other.to_string())),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UnknownStage(pub String);

impl fmt::Display for UnknownStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "unknown progress stage: {:?}", self.0)
    }
}

impl std::error::Error for UnknownStage {}

/// Who authored a stage write. Provenance matters for self-notification
/// suppression: a surrogate is not told about their own change.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StageUpdater {
    Admin,
    Surrogate,
}

impl StageUpdater {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Admin => "admin",
            Self::Surrogate => "surrogate",
        }
    }
}

impl FromStr for StageUpdater {
    type Err = UnknownStage;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value {
            "admin" => Ok(Self::Admin),
            "surrogate" => Ok(Self::Surrogate),
            other => Err(UnknownStage(other.to_string())),
        }
    }
}

/// What a viewer may do with a piece of stage-tagged content.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Visibility {
    /// Content tagged with the viewer's current stage: like/comment/post.
    Interactable,
    /// Content from an earlier stage: visible but frozen.
    ReadOnly,
    /// Content from a later stage: not shown at all.
    Hidden,
}

/// Visibility of `content_stage` content for a viewer currently at
/// `viewer_stage`.
pub fn visibility(viewer_stage: ProgressStage, content_stage: ProgressStage) -> Visibility {
    match content_stage.cmp(&viewer_stage) {
        Ordering::Equal => Visibility::Interactable,
        Ordering::Less => Visibility::ReadOnly,
        Ordering::Greater => Visibility::Hidden,
    }
}

/// Resolve the stage a viewer experiences as "current".
///
/// A surrogate sees their own stage; a matched parent sees their surrogate's
/// stage; a parent without a match sees `pre`. Unparseable stored stages
/// resolve to the initial stage rather than erroring.
pub fn resolve_viewer_stage(
    own_stage: Option<ProgressStage>,
    is_surrogate: bool,
    partner_stage: Option<ProgressStage>,
) -> ProgressStage {
    if is_surrogate {
        own_stage.unwrap_or(ProgressStage::Pre)
    } else {
        partner_stage.unwrap_or(ProgressStage::Pre)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn stages_are_strictly_ordered() {
        assert!(ProgressStage::Pre < ProgressStage::Pregnancy);
        assert!(ProgressStage::Pregnancy < ProgressStage::ObVisit);
        assert!(ProgressStage::ObVisit < ProgressStage::Delivery);
    }

    #[test]
    fn round_trips_through_str() {
        for stage in ProgressStage::ALL {
            assert_eq!(stage.as_str().parse::<ProgressStage>().unwrap(), stage);
        }
        assert!("post_partum".parse::<ProgressStage>().is_err());
    }

    #[test]
    fn pregnancy_content_visibility_matrix() {
        use ProgressStage::*;
        // A pregnancy-tagged post is interactable only at pregnancy,
        // read-only once the viewer has moved past it, hidden before it.
        assert_eq!(visibility(Pregnancy, Pregnancy), Visibility::Interactable);
        assert_eq!(visibility(ObVisit, Pregnancy), Visibility::ReadOnly);
        assert_eq!(visibility(Delivery, Pregnancy), Visibility::ReadOnly);
        assert_eq!(visibility(Pre, Pregnancy), Visibility::Hidden);
    }

    #[test]
    fn unmatched_parent_resolves_to_pre() {
        assert_eq!(
            resolve_viewer_stage(None, false, None),
            ProgressStage::Pre
        );
    }

    #[test]
    fn matched_parent_follows_surrogate_stage() {
        assert_eq!(
            resolve_viewer_stage(None, false, Some(ProgressStage::ObVisit)),
            ProgressStage::ObVisit
        );
    }

    #[test]
    fn surrogate_uses_own_stage() {
        assert_eq!(
            resolve_viewer_stage(Some(ProgressStage::Delivery), true, None),
            ProgressStage::Delivery
        );
    }

    #[test]
    fn regression_detection() {
        assert!(ProgressStage::ObVisit.is_regression_to(ProgressStage::Pre));
        assert!(!ProgressStage::Pre.is_regression_to(ProgressStage::Pregnancy));
        assert!(!ProgressStage::Delivery.is_regression_to(ProgressStage::Delivery));
    }
}
