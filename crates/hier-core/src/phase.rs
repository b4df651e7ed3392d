//! Per-level load phases
//!
//! ```text
//! Idle ──▶ Loading ──▶ Loaded{selected}
//!   ▲         │  ╲
//!   │         │   ▶ Failed
//!   └─────────┴───── (cleared by a parent change)
//! ```

use serde::{Deserialize, Serialize};

/// Load phase of one level
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case", tag = "phase")]
pub enum LevelPhase {
    /// Nothing requested; collection empty
    #[default]
    Idle,
    /// A fetch for this level is in flight
    Loading,
    /// Collection committed; `selected` tells whether a selection was made
    Loaded { selected: bool },
    /// The latest fetch failed; collection holds its last committed value
    Failed,
}

impl LevelPhase {
    #[inline]
    #[must_use]
    pub fn is_loading(self) -> bool {
        matches!(self, Self::Loading)
    }

    #[inline]
    #[must_use]
    pub fn is_failed(self) -> bool {
        matches!(self, Self::Failed)
    }

    /// Whether the controller may move from `self` to `to`
    #[must_use]
    pub fn can_transition_to(self, to: LevelPhase) -> bool {
        use LevelPhase::{Failed, Idle, Loaded, Loading};
        match (self, to) {
            // a parent change or teardown may clear any level
            (_, Idle) => true,
            (Idle | Loaded { .. } | Failed | Loading, Loading) => true,
            (Loading, Loaded { .. } | Failed) => true,
            // a direct selection changes the flag or supersedes a pending load
            (Loaded { .. } | Failed, Loaded { .. }) => true,
            (Idle, Loaded { .. } | Failed) => false,
            (Loaded { .. } | Failed, Failed) => false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn idle_must_load_first() {
        assert!(LevelPhase::Idle.can_transition_to(LevelPhase::Loading));
        assert!(!LevelPhase::Idle.can_transition_to(LevelPhase::Loaded { selected: true }));
        assert!(!LevelPhase::Idle.can_transition_to(LevelPhase::Failed));
    }

    #[test]
    fn loading_settles_either_way() {
        assert!(LevelPhase::Loading.can_transition_to(LevelPhase::Loaded { selected: false }));
        assert!(LevelPhase::Loading.can_transition_to(LevelPhase::Failed));
    }

    #[test]
    fn failed_retries_through_loading() {
        assert!(LevelPhase::Failed.can_transition_to(LevelPhase::Loading));
        assert!(!LevelPhase::Failed.can_transition_to(LevelPhase::Failed));
    }

    #[test]
    fn anything_can_be_cleared() {
        for from in [
            LevelPhase::Idle,
            LevelPhase::Loading,
            LevelPhase::Loaded { selected: true },
            LevelPhase::Failed,
        ] {
            assert!(from.can_transition_to(LevelPhase::Idle));
        }
    }
}
