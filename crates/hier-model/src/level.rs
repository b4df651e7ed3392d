//! Hierarchy levels
//!
//! Provides [`Level`], the strict parent-to-child ordering
//! Project → Client → Site → Plant.

use serde::{Deserialize, Serialize};
use std::fmt::{self, Display, Formatter};
use std::str::FromStr;

/// One tier of the engineering hierarchy
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Level {
    /// Root tier, one tenant per project
    Project,
    /// Client owned by a project
    Client,
    /// Site owned by a client
    Site,
    /// Plant owned by a site (leaf)
    Plant,
}

impl Level {
    /// All levels, root first
    pub const ALL: [Level; 4] = [Level::Project, Level::Client, Level::Site, Level::Plant];

    /// Number of levels
    pub const COUNT: usize = 4;

    /// Position in the chain (Project = 0)
    #[inline]
    #[must_use]
    pub fn index(self) -> usize {
        match self {
            Level::Project => 0,
            Level::Client => 1,
            Level::Site => 2,
            Level::Plant => 3,
        }
    }

    /// Level at a chain position
    #[inline]
    #[must_use]
    pub fn from_index(index: usize) -> Option<Self> {
        Self::ALL.get(index).copied()
    }

    /// The level directly below, `None` for the leaf
    #[inline]
    #[must_use]
    pub fn child(self) -> Option<Self> {
        Self::from_index(self.index() + 1)
    }

    /// The level directly above, `None` for the root
    #[inline]
    #[must_use]
    pub fn parent(self) -> Option<Self> {
        self.index().checked_sub(1).and_then(Self::from_index)
    }

    /// Whether this is the leaf level
    #[inline]
    #[must_use]
    pub fn is_leaf(self) -> bool {
        self == Level::Plant
    }

    /// Levels strictly below this one, nearest first
    pub fn below(self) -> impl Iterator<Item = Level> {
        Self::ALL.into_iter().skip(self.index() + 1)
    }

    /// This level and every level below it
    pub fn and_below(self) -> impl Iterator<Item = Level> {
        Self::ALL.into_iter().skip(self.index())
    }

    /// Lowercase name, as used on the wire and on the command line
    #[inline]
    #[must_use]
    pub fn key(self) -> &'static str {
        match self {
            Level::Project => "project",
            Level::Client => "client",
            Level::Site => "site",
            Level::Plant => "plant",
        }
    }

    /// Human-readable label
    #[inline]
    #[must_use]
    pub fn label(self) -> &'static str {
        match self {
            Level::Project => "Project",
            Level::Client => "Client",
            Level::Site => "Site",
            Level::Plant => "Plant",
        }
    }
}

impl Display for Level {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// Error parsing a level name
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unknown hierarchy level: {0}")]
pub struct ParseLevelError(pub String);

impl FromStr for Level {
    type Err = ParseLevelError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let name = s.trim();
        Self::ALL
            .into_iter()
            .find(|level| level.key().eq_ignore_ascii_case(name))
            .ok_or_else(|| ParseLevelError(s.to_string()))
    }
}
