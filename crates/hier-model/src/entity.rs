//! Hierarchy entities
//!
//! Wire-shaped records ([`Project`], [`Client`], [`Site`], [`Plant`]) and the
//! uniform [`Node`] they normalize into. The engine only ever sees [`Node`]s.

use crate::level::Level;
use serde::{Deserialize, Serialize};
use std::fmt::{self, Display, Formatter};

/// Stable entity identifier, unique within a level
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct NodeId(pub i64);

impl Display for NodeId {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<i64> for NodeId {
    #[inline]
    fn from(id: i64) -> Self {
        Self(id)
    }
}

/// Project lifecycle status
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ProjectStatus {
    #[default]
    Active,
    OnHold,
    Completed,
    Cancelled,
}

/// Root entity. `project_no` plays the role of a short code.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Project {
    pub id: NodeId,
    pub project_no: String,
    pub name: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub status: ProjectStatus,
}

impl Project {
    #[must_use]
    pub fn new(id: i64, project_no: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            id: NodeId(id),
            project_no: project_no.into(),
            name: name.into(),
            description: String::new(),
            status: ProjectStatus::Active,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Client {
    pub id: NodeId,
    pub project_id: NodeId,
    pub code: String,
    pub name: String,
}

impl Client {
    #[must_use]
    pub fn new(id: i64, project_id: i64, code: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            id: NodeId(id),
            project_id: NodeId(project_id),
            code: code.into(),
            name: name.into(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Site {
    pub id: NodeId,
    pub client_id: NodeId,
    pub code: String,
    pub name: String,
    #[serde(default)]
    pub location: String,
}

impl Site {
    #[must_use]
    pub fn new(id: i64, client_id: i64, code: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            id: NodeId(id),
            client_id: NodeId(client_id),
            code: code.into(),
            name: name.into(),
            location: String::new(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Plant {
    pub id: NodeId,
    pub site_id: NodeId,
    pub code: String,
    pub name: String,
    #[serde(default = "default_active")]
    pub is_active: bool,
}

fn default_active() -> bool {
    true
}

impl Plant {
    #[must_use]
    pub fn new(id: i64, site_id: i64, code: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            id: NodeId(id),
            site_id: NodeId(site_id),
            code: code.into(),
            name: name.into(),
            is_active: true,
        }
    }
}

/// Level-tagged entity as held by the store
///
/// `code` is the short identifier used in breadcrumbs: the project number for
/// projects, the entity code everywhere else.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Node {
    pub level: Level,
    pub id: NodeId,
    pub code: String,
    pub name: String,
    pub parent_id: Option<NodeId>,
}

impl Node {
    /// Create a node; `parent_id` must be `None` exactly when `level` is the root
    #[inline]
    #[must_use]
    pub fn new(
        level: Level,
        id: impl Into<NodeId>,
        code: impl Into<String>,
        name: impl Into<String>,
        parent_id: Option<NodeId>,
    ) -> Self {
        Self {
            level,
            id: id.into(),
            code: code.into(),
            name: name.into(),
            parent_id,
        }
    }

    /// Whether this node sits directly under `parent`
    #[inline]
    #[must_use]
    pub fn is_child_of(&self, parent: &Node) -> bool {
        parent.level.child() == Some(self.level) && self.parent_id == Some(parent.id)
    }

    /// `CODE - Name` label used by tree and selector rows
    #[must_use]
    pub fn label(&self) -> String {
        format!("{} - {}", self.code, self.name)
    }
}

impl From<Project> for Node {
    fn from(p: Project) -> Self {
        Node::new(Level::Project, p.id, p.project_no, p.name, None)
    }
}

impl From<Client> for Node {
    fn from(c: Client) -> Self {
        Node::new(Level::Client, c.id, c.code, c.name, Some(c.project_id))
    }
}

impl From<Site> for Node {
    fn from(s: Site) -> Self {
        Node::new(Level::Site, s.id, s.code, s.name, Some(s.client_id))
    }
}

impl From<Plant> for Node {
    fn from(p: Plant) -> Self {
        Node::new(Level::Plant, p.id, p.code, p.name, Some(p.site_id))
    }
}
