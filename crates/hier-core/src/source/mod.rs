//! External collaborators
//!
//! - [`HierarchySource`]: the data service listing each level
//! - [`AuthGate`]: the session owner consulted before loading

mod memory;

pub use memory::{HierarchyDataset, MemorySource};

use crate::error::FetchError;
use async_trait::async_trait;
use hier_model::{Client, NodeId, Plant, Project, Site};
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};

/// Data service contract
///
/// Each call returns a possibly empty list in service order. Calls must be
/// free of side effects beyond the read.
#[async_trait]
pub trait HierarchySource: Send + Sync {
    async fn list_projects(&self) -> Result<Vec<Project>, FetchError>;

    async fn list_clients(&self, project_id: NodeId) -> Result<Vec<Client>, FetchError>;

    async fn list_sites(&self, client_id: NodeId) -> Result<Vec<Site>, FetchError>;

    async fn list_plants(&self, site_id: NodeId) -> Result<Vec<Plant>, FetchError>;
}

/// Session gate
///
/// Loading is a no-op while [`AuthGate::is_authenticated`] is false. When the
/// service rejects a session mid-cascade the gate is told so it can
/// redirect or reset; the controller itself does not retry.
pub trait AuthGate: Send + Sync {
    fn is_authenticated(&self) -> bool;

    fn session_rejected(&self) {}
}

/// Gate that always lets loading through
#[derive(Debug, Clone, Copy, Default)]
pub struct AlwaysAuthorized;

impl AuthGate for AlwaysAuthorized {
    fn is_authenticated(&self) -> bool {
        true
    }
}

/// Toggleable session flag
///
/// A rejection from the service signs the session out.
#[derive(Debug, Default)]
pub struct SessionFlag {
    signed_in: AtomicBool,
    rejections: AtomicU64,
}

impl SessionFlag {
    #[must_use]
    pub fn new(signed_in: bool) -> Self {
        Self {
            signed_in: AtomicBool::new(signed_in),
            rejections: AtomicU64::new(0),
        }
    }

    pub fn sign_in(&self) {
        self.signed_in.store(true, Ordering::SeqCst);
    }

    pub fn sign_out(&self) {
        self.signed_in.store(false, Ordering::SeqCst);
    }

    /// Number of times the service rejected this session
    #[must_use]
    pub fn rejections(&self) -> u64 {
        self.rejections.load(Ordering::SeqCst)
    }
}

impl AuthGate for SessionFlag {
    fn is_authenticated(&self) -> bool {
        self.signed_in.load(Ordering::SeqCst)
    }

    fn session_rejected(&self) {
        self.rejections.fetch_add(1, Ordering::SeqCst);
        self.sign_out();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rejection_signs_out() {
        let session = SessionFlag::new(true);
        assert!(session.is_authenticated());

        session.session_rejected();
        assert!(!session.is_authenticated());
        assert_eq!(session.rejections(), 1);

        session.sign_in();
        assert!(session.is_authenticated());
    }
}
