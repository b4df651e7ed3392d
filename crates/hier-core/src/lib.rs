//! Hierarchy Core - selection and cascade engine
//!
//! Keeps the Project → Client → Site → Plant selections consistent while
//! their collections load asynchronously:
//! - Single-writer entity store
//! - Level-addressed fetch contract over the data service
//! - Cascade controller with per-level generation counters
//! - First-item auto-selection and refresh policies
//! - Snapshot publishing and a request channel for consumers
//!
//! # Example
//!
//! ```rust,ignore
//! use hier_core::{AlwaysAuthorized, HierarchyConfig, HierarchyController, MemorySource, SourceFetcher};
//! use std::sync::Arc;
//!
//! # async fn example(data: hier_core::HierarchyDataset) {
//! let fetcher = SourceFetcher::new(Arc::new(MemorySource::new(data)));
//! let controller = HierarchyController::new(fetcher, Arc::new(AlwaysAuthorized), HierarchyConfig::new());
//!
//! controller.activate().await;
//! println!("{}", controller.current_path());
//! # }
//! ```

#![warn(unreachable_pub)]
#![allow(missing_docs)]

pub mod config;
pub mod controller;
pub mod error;
pub mod fetcher;
pub mod phase;
pub mod requests;
pub mod simulator;
pub mod snapshot;
pub mod source;
pub mod store;

pub use config::{HierarchyConfig, RefreshPolicy};
pub use controller::{ControllerStats, HierarchyController};
pub use error::{ConfigError, FetchError, HierarchyError, RequestError};
pub use fetcher::{Fetcher, SourceFetcher};
pub use phase::LevelPhase;
pub use requests::{HierarchyRequest, RequestHandle};
pub use simulator::{run_simulator, SimulationReport, SimulatorConfig};
pub use snapshot::{HierarchySnapshot, TreeRow};
pub use source::{
    AlwaysAuthorized, AuthGate, HierarchyDataset, HierarchySource, MemorySource, SessionFlag,
};
pub use store::EntityStore;

pub use hier_model::{Client, Level, Node, NodeId, PathStyle, Plant, Project, Site};

/// Prelude module for common imports
pub mod prelude {
    //! Common imports for driving a hierarchy controller
    pub use crate::{
        AuthGate, Fetcher, HierarchyConfig, HierarchyController, HierarchyError,
        HierarchySnapshot, HierarchySource, Level, Node, NodeId, SourceFetcher,
    };
}

/// Version of this crate
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
