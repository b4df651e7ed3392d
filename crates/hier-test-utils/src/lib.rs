//! Testing utilities for the hierarchy workspace
//!
//! Shared fixtures, a manually released fetcher and invariant assertions.

#![allow(missing_docs)]

use async_trait::async_trait;
use hier_core::{
    AlwaysAuthorized, FetchError, Fetcher, HierarchyConfig, HierarchyController, HierarchyDataset,
    MemorySource, SourceFetcher,
};
use hier_model::{Client, Level, Node, NodeId, Plant, Project, Site};
use parking_lot::Mutex;
use std::sync::Arc;
use tokio::sync::{oneshot, Notify};

/// Three projects; P3 has no clients, C11 has a site without plants
///
/// ```text
/// P1(1) ─ C10(10) ─ S100(100) ─ PL1000, PL1001
///       │         └ S101(101) ─ PL1010
///       └ C11(11) ─ S110(110)
/// P2(2) ─ C20(20) ─ S200(200) ─ PL2000
/// P3(3)
/// ```
pub fn standard_dataset() -> HierarchyDataset {
    HierarchyDataset {
        projects: vec![
            Project::new(1, "P1", "Refinery Expansion"),
            Project::new(2, "P2", "Gas Terminal"),
            Project::new(3, "P3", "Empty Project"),
        ],
        clients: vec![
            Client::new(10, 1, "C10", "Acme"),
            Client::new(11, 1, "C11", "Globex"),
            Client::new(20, 2, "C20", "Initech"),
        ],
        sites: vec![
            Site::new(100, 10, "S100", "North"),
            Site::new(101, 10, "S101", "South"),
            Site::new(110, 11, "S110", "East"),
            Site::new(200, 20, "S200", "Harbour"),
        ],
        plants: vec![
            Plant::new(1000, 100, "PL1000", "Crude Unit"),
            Plant::new(1001, 100, "PL1001", "Vacuum Unit"),
            Plant::new(1010, 101, "PL1010", "Utilities"),
            Plant::new(2000, 200, "PL2000", "Compression"),
        ],
    }
}

/// Children of `parent` at `level`, in dataset order
pub fn children(data: &HierarchyDataset, level: Level, parent: Option<NodeId>) -> Vec<Node> {
    match (level, parent) {
        (Level::Project, _) => data.projects.iter().cloned().map(Node::from).collect(),
        (_, None) => Vec::new(),
        (Level::Client, Some(id)) => data
            .clients
            .iter()
            .filter(|c| c.project_id == id)
            .cloned()
            .map(Node::from)
            .collect(),
        (Level::Site, Some(id)) => data
            .sites
            .iter()
            .filter(|s| s.client_id == id)
            .cloned()
            .map(Node::from)
            .collect(),
        (Level::Plant, Some(id)) => data
            .plants
            .iter()
            .filter(|p| p.site_id == id)
            .cloned()
            .map(Node::from)
            .collect(),
    }
}

/// Look up a node by level and id in a dataset
pub fn node(data: &HierarchyDataset, level: Level, id: i64) -> Node {
    let all = match level {
        Level::Project => children(data, Level::Project, None),
        Level::Client => data.clients.iter().cloned().map(Node::from).collect(),
        Level::Site => data.sites.iter().cloned().map(Node::from).collect(),
        Level::Plant => data.plants.iter().cloned().map(Node::from).collect(),
    };
    all.into_iter()
        .find(|n| n.id == NodeId(id))
        .unwrap_or_else(|| panic!("no {level} with id {id} in dataset"))
}

pub type MemoryController = HierarchyController<SourceFetcher<MemorySource>>;

/// Controller over a [`MemorySource`] serving `data`, plus the source for call counts
pub fn memory_controller(data: HierarchyDataset) -> (MemoryController, Arc<MemorySource>) {
    memory_controller_with(data, HierarchyConfig::default())
}

pub fn memory_controller_with(
    data: HierarchyDataset,
    config: HierarchyConfig,
) -> (MemoryController, Arc<MemorySource>) {
    let source = Arc::new(MemorySource::new(data));
    let fetcher = SourceFetcher::new(Arc::clone(&source));
    let controller = HierarchyController::new(fetcher, Arc::new(AlwaysAuthorized), config);
    (controller, source)
}

/// Panic with every breach if the store violates the parent/child invariants
pub fn assert_invariants<F: Fetcher>(controller: &HierarchyController<F>) {
    let breaches = controller.with_store(|store| store.check_invariants());
    assert!(breaches.is_empty(), "invariants violated: {breaches:#?}");
}

type Outcome = Result<Vec<Node>, FetchError>;

struct Gate {
    level: Level,
    parent: Option<NodeId>,
    reply: oneshot::Sender<Outcome>,
}

/// Fetcher whose calls stay pending until the test releases them
///
/// Lets a test decide the completion order of overlapping fetches.
pub struct GatedFetcher {
    data: Mutex<HierarchyDataset>,
    pending: Mutex<Vec<Gate>>,
    calls: Mutex<Vec<(Level, Option<NodeId>)>>,
    arrived: Notify,
}

impl GatedFetcher {
    pub fn new(data: HierarchyDataset) -> Arc<Self> {
        Arc::new(Self {
            data: Mutex::new(data),
            pending: Mutex::new(Vec::new()),
            calls: Mutex::new(Vec::new()),
            arrived: Notify::new(),
        })
    }

    /// Every call made so far, in order
    pub fn calls(&self) -> Vec<(Level, Option<NodeId>)> {
        self.calls.lock().clone()
    }

    pub fn calls_for(&self, level: Level) -> usize {
        self.calls.lock().iter().filter(|(l, _)| *l == level).count()
    }

    pub fn pending_count(&self) -> usize {
        self.pending.lock().len()
    }

    pub fn is_pending(&self, level: Level, parent: Option<NodeId>) -> bool {
        self.pending
            .lock()
            .iter()
            .any(|g| g.level == level && g.parent == parent)
    }

    /// Wait until a call for `level`/`parent` is pending
    pub async fn wait_for(&self, level: Level, parent: Option<NodeId>) {
        loop {
            let arrived = self.arrived.notified();
            if self.is_pending(level, parent) {
                return;
            }
            arrived.await;
        }
    }

    /// Answer the oldest pending call for `level`/`parent` from the dataset
    pub fn release(&self, level: Level, parent: Option<NodeId>) {
        let items = children(&self.data.lock(), level, parent);
        self.respond(level, parent, Ok(items));
    }

    /// Answer the oldest pending call for `level`/`parent` with an error
    pub fn fail(&self, level: Level, parent: Option<NodeId>, error: FetchError) {
        self.respond(level, parent, Err(error));
    }

    /// Answer the oldest pending call for `level`/`parent` with `outcome`
    pub fn respond(&self, level: Level, parent: Option<NodeId>, outcome: Outcome) {
        let gate = {
            let mut pending = self.pending.lock();
            let index = pending
                .iter()
                .position(|g| g.level == level && g.parent == parent)
                .unwrap_or_else(|| panic!("no pending {level} fetch for parent {parent:?}"));
            pending.remove(index)
        };
        // the caller may have been dropped; nothing to deliver then
        let _ = gate.reply.send(outcome);
    }

    /// Swap the data future releases answer from
    pub fn replace_data(&self, data: HierarchyDataset) {
        *self.data.lock() = data;
    }
}

#[async_trait]
impl Fetcher for GatedFetcher {
    async fn fetch(&self, level: Level, parent: Option<NodeId>) -> Result<Vec<Node>, FetchError> {
        let (reply, outcome) = oneshot::channel();
        self.calls.lock().push((level, parent));
        self.pending.lock().push(Gate {
            level,
            parent,
            reply,
        });
        self.arrived.notify_waiters();

        outcome
            .await
            .unwrap_or_else(|_| Err(FetchError::Unreachable("gate dropped".to_string())))
    }
}

pub type GatedController = HierarchyController<Arc<GatedFetcher>>;

pub fn gated_controller(data: HierarchyDataset) -> (GatedController, Arc<GatedFetcher>) {
    let fetcher = GatedFetcher::new(data);
    let controller = HierarchyController::new(
        Arc::clone(&fetcher),
        Arc::new(AlwaysAuthorized),
        HierarchyConfig::default(),
    );
    (controller, fetcher)
}
