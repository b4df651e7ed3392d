//! Hierarchy Model
//!
//! Typed records for the Project → Client → Site → Plant chain.
//!
//! # Core Concepts
//!
//! - [`Level`]: one tier of the chain, strictly ordered root first
//! - [`Project`], [`Client`], [`Site`], [`Plant`]: records as the data service returns them
//! - [`Node`]: the level-tagged form every record normalizes into
//! - [`PathStyle`]: breadcrumb rendering of the current selections
//!
//! # Example
//!
//! ```rust
//! use hier_model::{build_path, Client, Node, Project};
//!
//! let project = Node::from(Project::new(1, "P1", "Refinery"));
//! let client = Node::from(Client::new(10, 1, "C1", "Acme"));
//!
//! assert_eq!(build_path([Some(&project), Some(&client), None, None]), "P1 / C1");
//! ```

#![warn(unreachable_pub)]
#![allow(missing_docs)]

mod entity;
mod level;
mod path;

pub use entity::{Client, Node, NodeId, Plant, Project, ProjectStatus, Site};
pub use level::{Level, ParseLevelError};
pub use path::{build_path, PathStyle, DEFAULT_PLACEHOLDER, DEFAULT_SEPARATOR};

/// Version of this crate
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
