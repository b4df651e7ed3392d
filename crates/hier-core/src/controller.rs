//! Cascade controller
//!
//! The single writer of the [`EntityStore`]. A selection change at one level:
//! 1. validates the entity against the level's current collection
//! 2. commits it
//! 3. synchronously clears every level below (selection and collection)
//! 4. fetches the next level filtered by the new selection, auto-selects the
//!    first item and repeats downward until a level comes back empty or the
//!    leaf is reached
//!
//! Every fetch is tagged with its level's generation. Any change that makes a
//! pending result obsolete bumps the generation, and a completion whose tag no
//! longer matches is dropped without touching state. No lock is held across a
//! fetch, so overlapping requests interleave freely at the await points.

use crate::config::{HierarchyConfig, RefreshPolicy};
use crate::error::{FetchError, HierarchyError};
use crate::fetcher::Fetcher;
use crate::phase::LevelPhase;
use crate::snapshot::HierarchySnapshot;
use crate::source::AuthGate;
use crate::store::EntityStore;
use hier_model::{Level, Node, NodeId};
use parking_lot::Mutex;
use std::sync::Arc;
use tokio::sync::watch;

/// Counters kept by the controller
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ControllerStats {
    /// Fetches started
    pub fetches_issued: u64,
    /// Completions dropped because a newer request superseded them
    pub stale_discarded: u64,
    /// Fetches that failed
    pub failures: u64,
    /// Selections rejected as not belonging to the current collection
    pub rejected_selections: u64,
}

/// A registered fetch that still has to be awaited
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) struct PendingFetch {
    level: Level,
    parent: Option<NodeId>,
    generation: u64,
}

/// What a level should select once its next collection lands
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
enum Preference {
    #[default]
    First,
    Keep(NodeId),
    Nothing,
}

#[derive(Debug, Default)]
struct CascadeState {
    store: EntityStore,
    phases: [LevelPhase; Level::COUNT],
    generations: [u64; Level::COUNT],
    /// Ids to keep across a refresh, consumed level by level
    preferred: [Preference; Level::COUNT],
    last_error: Option<HierarchyError>,
    revision: u64,
    stats: ControllerStats,
    dirty: bool,
}

impl CascadeState {
    fn set_phase(&mut self, level: Level, phase: LevelPhase) {
        let from = self.phases[level.index()];
        if from != phase && !from.can_transition_to(phase) {
            tracing::error!(%level, ?from, to = ?phase, "illegal phase transition");
        }
        self.phases[level.index()] = phase;
    }

    /// Make any in-flight result for `level` stale
    fn invalidate(&mut self, level: Level) {
        self.generations[level.index()] += 1;
    }

    fn drop_errors_from(&mut self, level: Level) {
        if self
            .last_error
            .as_ref()
            .is_some_and(|err| err.level() >= level)
        {
            self.last_error = None;
        }
    }

    fn clear_below(&mut self, level: Level) {
        self.store.clear_below(level);
        for below in level.below() {
            self.invalidate(below);
            self.set_phase(below, LevelPhase::Idle);
        }
        if let Some(child) = level.child() {
            self.drop_errors_from(child);
        }
    }

    fn begin_load(&mut self, level: Level, parent: Option<NodeId>) -> PendingFetch {
        self.invalidate(level);
        self.set_phase(level, LevelPhase::Loading);
        self.drop_errors_from(level);
        self.stats.fetches_issued += 1;
        self.dirty = true;

        tracing::debug!(%level, parent = ?parent, "loading");
        PendingFetch {
            level,
            parent,
            generation: self.generations[level.index()],
        }
    }

    fn begin_root(&mut self, policy: RefreshPolicy) -> PendingFetch {
        self.preferred = match policy {
            RefreshPolicy::PreserveIfPresent => Level::ALL.map(|level| {
                self.store
                    .selected_id(level)
                    .map_or(Preference::First, Preference::Keep)
            }),
            RefreshPolicy::ResetToFirst => [Preference::First; Level::COUNT],
        };
        self.begin_load(Level::Project, None)
    }

    fn select(
        &mut self,
        level: Level,
        node: Option<&Node>,
    ) -> Result<Option<PendingFetch>, HierarchyError> {
        let requested = match node {
            Some(node) => {
                let stored = (node.level == level)
                    .then(|| self.store.find(level, node.id))
                    .flatten();
                match stored {
                    Some(stored) => Some(stored.clone()),
                    None => {
                        self.stats.rejected_selections += 1;
                        tracing::debug!(%level, id = %node.id, "rejected selection");
                        return Err(HierarchyError::InvalidSelection { level, id: node.id });
                    }
                }
            }
            None => None,
        };

        let requested_id = requested.as_ref().map(|n| n.id);
        let child_failed = level
            .child()
            .is_some_and(|child| self.phases[child.index()].is_failed());
        let retry = requested_id.is_some() && child_failed;

        if self.store.selected_id(level) == requested_id && !retry {
            tracing::debug!(%level, "selection unchanged");
            return Ok(None);
        }

        // a refresh still running at or above this level applies the new choice
        self.preferred[level.index()] = requested_id.map_or(Preference::Nothing, Preference::Keep);
        for below in level.below() {
            self.preferred[below.index()] = Preference::First;
        }

        let selected = requested.is_some();
        self.store.set_selection(level, requested.clone());
        self.clear_below(level);
        if !matches!(self.phases[level.index()], LevelPhase::Idle | LevelPhase::Loading) {
            self.set_phase(level, LevelPhase::Loaded { selected });
        }
        self.dirty = true;

        tracing::debug!(%level, id = ?requested_id, "selection committed");
        Ok(match (requested, level.child()) {
            (Some(node), Some(child)) => Some(self.begin_load(child, Some(node.id))),
            _ => None,
        })
    }

    fn finish_load(
        &mut self,
        pending: PendingFetch,
        result: Result<Vec<Node>, FetchError>,
        auth: &dyn AuthGate,
    ) -> Option<PendingFetch> {
        let level = pending.level;
        if self.generations[level.index()] != pending.generation {
            self.stats.stale_discarded += 1;
            tracing::debug!(%level, generation = pending.generation, "discarding stale result");
            return None;
        }
        self.dirty = true;

        match result {
            Ok(items) => self.commit_items(pending, items),
            Err(cause) if cause.is_auth() => {
                tracing::info!(%level, "session rejected; treating as no data");
                self.store.replace_collection(level, Vec::new());
                self.store.set_selection(level, None);
                self.clear_below(level);
                self.set_phase(level, LevelPhase::Loaded { selected: false });
                self.preferred = [Preference::First; Level::COUNT];
                auth.session_rejected();
                None
            }
            Err(cause) => {
                tracing::warn!(%level, error = %cause, "failed to load");
                self.stats.failures += 1;
                self.set_phase(level, LevelPhase::Failed);
                self.last_error = Some(HierarchyError::FetchFailed { level, cause });
                None
            }
        }
    }

    /// Replace the collection, apply the auto-selection policy and start the
    /// next level if something got selected
    fn commit_items(&mut self, pending: PendingFetch, items: Vec<Node>) -> Option<PendingFetch> {
        let level = pending.level;
        let fetched = items.len();
        let items: Vec<Node> = items
            .into_iter()
            .filter(|n| n.level == level && n.parent_id == pending.parent)
            .collect();
        if items.len() != fetched {
            tracing::warn!(%level, dropped = fetched - items.len(), "dropped entries from another parent");
        }

        let chosen = match std::mem::take(&mut self.preferred[level.index()]) {
            Preference::First => items.first().cloned(),
            Preference::Nothing => None,
            Preference::Keep(id) => {
                let kept = items.iter().find(|n| n.id == id);
                if kept.is_none() {
                    // the kept path is broken; everything below falls back too
                    for below in level.below() {
                        self.preferred[below.index()] = Preference::First;
                    }
                }
                kept.or_else(|| items.first()).cloned()
            }
        };

        tracing::debug!(%level, count = items.len(), selected = ?chosen.as_ref().map(|n| n.id), "loaded");
        self.store.replace_collection(level, items);
        self.store.set_selection(level, chosen.clone());
        self.clear_below(level);
        self.set_phase(
            level,
            LevelPhase::Loaded {
                selected: chosen.is_some(),
            },
        );

        let child = level.child()?;
        let node = chosen?;
        Some(self.begin_load(child, Some(node.id)))
    }

    fn logout(&mut self) {
        for level in Level::ALL {
            self.invalidate(level);
            self.set_phase(level, LevelPhase::Idle);
        }
        self.store.clear_all();
        self.preferred = [Preference::First; Level::COUNT];
        self.last_error = None;
        self.dirty = true;
    }

    fn snapshot(&self, config: &HierarchyConfig) -> HierarchySnapshot {
        HierarchySnapshot::capture(
            self.revision,
            &self.store,
            self.phases,
            self.last_error.clone(),
            &config.path,
        )
    }
}

struct Shared<F> {
    fetcher: F,
    auth: Arc<dyn AuthGate>,
    config: HierarchyConfig,
    state: Mutex<CascadeState>,
    updates: watch::Sender<HierarchySnapshot>,
}

/// Owner of the hierarchy state
///
/// Cheap to clone; clones drive the same state. Consumers read through
/// [`HierarchyController::snapshot`] or [`HierarchyController::subscribe`]
/// and request changes through the `select_*` methods, `refresh` and
/// `logout`.
pub struct HierarchyController<F> {
    shared: Arc<Shared<F>>,
}

impl<F> Clone for HierarchyController<F> {
    fn clone(&self) -> Self {
        Self {
            shared: Arc::clone(&self.shared),
        }
    }
}

impl<F> std::fmt::Debug for HierarchyController<F> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let state = self.shared.state.lock();
        f.debug_struct("HierarchyController")
            .field("revision", &state.revision)
            .field("phases", &state.phases)
            .field("stats", &state.stats)
            .finish_non_exhaustive()
    }
}

impl<F: Fetcher> HierarchyController<F> {
    /// Create a controller with empty collections and no selections
    #[must_use]
    pub fn new(fetcher: F, auth: Arc<dyn AuthGate>, config: HierarchyConfig) -> Self {
        let state = CascadeState::default();
        let (updates, _) = watch::channel(state.snapshot(&config));
        Self {
            shared: Arc::new(Shared {
                fetcher,
                auth,
                config,
                state: Mutex::new(state),
                updates,
            }),
        }
    }

    #[inline]
    #[must_use]
    pub fn config(&self) -> &HierarchyConfig {
        &self.shared.config
    }

    /// Receive a snapshot after every committed change
    #[must_use]
    pub fn subscribe(&self) -> watch::Receiver<HierarchySnapshot> {
        self.shared.updates.subscribe()
    }

    /// Latest published snapshot
    #[must_use]
    pub fn snapshot(&self) -> HierarchySnapshot {
        self.shared.updates.borrow().clone()
    }

    /// Read the store directly
    pub fn with_store<R>(&self, f: impl FnOnce(&EntityStore) -> R) -> R {
        f(&self.shared.state.lock().store)
    }

    #[must_use]
    pub fn stats(&self) -> ControllerStats {
        self.shared.state.lock().stats
    }

    #[must_use]
    pub fn is_loading(&self) -> bool {
        self.shared.updates.borrow().is_loading()
    }

    #[must_use]
    pub fn current_path(&self) -> String {
        self.shared.updates.borrow().current_path().to_string()
    }

    #[must_use]
    pub fn selected(&self, level: Level) -> Option<Node> {
        self.with_store(|store| store.selection(level).cloned())
    }

    #[must_use]
    pub fn last_error(&self) -> Option<HierarchyError> {
        self.shared.state.lock().last_error.clone()
    }

    /// Run `f` against the state and publish if it changed anything
    fn mutate<R>(&self, f: impl FnOnce(&mut CascadeState, &dyn AuthGate) -> R) -> R {
        let mut state = self.shared.state.lock();
        let out = f(&mut state, self.shared.auth.as_ref());
        if state.dirty {
            state.dirty = false;
            state.revision += 1;
            self.shared
                .updates
                .send_replace(state.snapshot(&self.shared.config));
        }
        out
    }

    /// Load the project list on first mount
    ///
    /// Returns `false` without fetching when no session is present.
    pub async fn activate(&self) -> bool {
        match self.begin_activation() {
            Some(pending) => {
                self.run_cascade(Some(pending)).await;
                true
            }
            None => false,
        }
    }

    /// Reload from the root, keeping selections per the configured policy
    ///
    /// Returns `false` without fetching when no session is present.
    pub async fn refresh(&self) -> bool {
        self.activate().await
    }

    /// Consumer-facing alias of [`HierarchyController::refresh`]
    pub async fn refresh_data(&self) -> bool {
        self.refresh().await
    }

    pub(crate) fn begin_activation(&self) -> Option<PendingFetch> {
        if !self.shared.auth.is_authenticated() {
            tracing::info!("not authenticated; skipping hierarchy load");
            return None;
        }
        let policy = self.shared.config.refresh_policy;
        tracing::info!(?policy, "loading hierarchy from the root");
        Some(self.mutate(|state, _| state.begin_root(policy)))
    }

    /// Change the selection at `level` and cascade below it
    ///
    /// Resolves once the cascade settled or was superseded. Fetch failures
    /// are recorded in [`HierarchyController::last_error`], not returned.
    ///
    /// # Errors
    /// - `HierarchyError::InvalidSelection` if `node` is not in the level's
    ///   current collection; state is left unchanged
    pub async fn select_at(&self, level: Level, node: Option<&Node>) -> Result<(), HierarchyError> {
        let pending = self.begin_select(level, node)?;
        self.run_cascade(pending).await;
        Ok(())
    }

    pub(crate) fn begin_select(
        &self,
        level: Level,
        node: Option<&Node>,
    ) -> Result<Option<PendingFetch>, HierarchyError> {
        self.mutate(|state, _| state.select(level, node))
    }

    /// # Errors
    /// See [`HierarchyController::select_at`].
    pub async fn select_project(&self, project: Option<&Node>) -> Result<(), HierarchyError> {
        self.select_at(Level::Project, project).await
    }

    /// # Errors
    /// See [`HierarchyController::select_at`].
    pub async fn select_client(&self, client: Option<&Node>) -> Result<(), HierarchyError> {
        self.select_at(Level::Client, client).await
    }

    /// # Errors
    /// See [`HierarchyController::select_at`].
    pub async fn select_site(&self, site: Option<&Node>) -> Result<(), HierarchyError> {
        self.select_at(Level::Site, site).await
    }

    /// Leaf selection; never fetches
    ///
    /// # Errors
    /// See [`HierarchyController::select_at`].
    pub async fn select_plant(&self, plant: Option<&Node>) -> Result<(), HierarchyError> {
        self.select_at(Level::Plant, plant).await
    }

    /// Drop every collection and selection; pending fetches become stale
    pub fn logout(&self) {
        tracing::info!("clearing hierarchy");
        self.mutate(|state, _| state.logout());
    }

    /// Wait until no level is loading
    pub async fn settled(&self) {
        let mut updates = self.subscribe();
        // the sender lives as long as `self`, so this cannot fail
        let _ = updates.wait_for(|snapshot| !snapshot.is_loading()).await;
    }

    pub(crate) async fn run_cascade(&self, mut pending: Option<PendingFetch>) {
        while let Some(fetch) = pending.take() {
            let result = self.shared.fetcher.fetch(fetch.level, fetch.parent).await;
            pending = self.mutate(|state, auth| state.finish_load(fetch, result, auth));
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::source::{AlwaysAuthorized, HierarchyDataset, MemorySource, SessionFlag};
    use crate::SourceFetcher;
    use hier_model::{Client, Plant, Project, Site};

    fn dataset() -> HierarchyDataset {
        HierarchyDataset {
            projects: vec![Project::new(1, "P1", "One"), Project::new(2, "P2", "Two")],
            clients: vec![
                Client::new(10, 1, "C10", "Ten"),
                Client::new(11, 1, "C11", "Eleven"),
                Client::new(20, 2, "C20", "Twenty"),
            ],
            sites: vec![Site::new(100, 10, "S100", "Hundred")],
            plants: vec![Plant::new(1000, 100, "PL1000", "Thousand")],
        }
    }

    fn controller() -> HierarchyController<SourceFetcher<MemorySource>> {
        let fetcher = SourceFetcher::new(Arc::new(MemorySource::new(dataset())));
        HierarchyController::new(fetcher, Arc::new(AlwaysAuthorized), HierarchyConfig::default())
    }

    #[tokio::test]
    async fn activation_cascades_to_the_leaf() {
        let ctl = controller();
        assert!(ctl.activate().await);

        let snap = ctl.snapshot();
        assert_eq!(snap.current_path(), "P1 / C10 / S100 / PL1000");
        assert!(!snap.is_loading());
        assert_eq!(snap.phase(Level::Plant), LevelPhase::Loaded { selected: true });
    }

    #[tokio::test]
    async fn unauthenticated_activation_is_a_no_op() {
        let fetcher = SourceFetcher::new(Arc::new(MemorySource::new(dataset())));
        let source = Arc::clone(fetcher.source());
        let ctl = HierarchyController::new(
            fetcher,
            Arc::new(SessionFlag::new(false)),
            HierarchyConfig::default(),
        );

        assert!(!ctl.activate().await);
        assert!(!ctl.refresh_data().await);
        assert_eq!(source.total_calls(), 0);
        assert!(ctl.snapshot().projects().is_empty());
        assert_eq!(ctl.snapshot().revision(), 0);
    }

    #[tokio::test]
    async fn foreign_node_is_rejected_without_change() {
        let ctl = controller();
        ctl.activate().await;
        let before = ctl.snapshot();

        let stranger = Node::new(Level::Client, 20, "C20", "Twenty", Some(NodeId(2)));
        let err = ctl.select_client(Some(&stranger)).await.unwrap_err();

        assert_eq!(
            err,
            HierarchyError::InvalidSelection {
                level: Level::Client,
                id: NodeId(20)
            }
        );
        assert_eq!(ctl.snapshot().revision(), before.revision());
        assert_eq!(ctl.stats().rejected_selections, 1);
    }

    #[tokio::test]
    async fn node_of_the_wrong_level_is_rejected() {
        let ctl = controller();
        ctl.activate().await;

        let project = ctl.selected(Level::Project).unwrap();
        let err = ctl.select_client(Some(&project)).await.unwrap_err();
        assert!(matches!(err, HierarchyError::InvalidSelection { level: Level::Client, .. }));
    }

    #[tokio::test]
    async fn clearing_a_selection_empties_levels_below() {
        let ctl = controller();
        ctl.activate().await;

        ctl.select_client(None).await.unwrap();

        let snap = ctl.snapshot();
        assert!(snap.selected_project().is_some());
        assert!(snap.selected_client().is_none());
        assert_eq!(snap.clients().len(), 2);
        assert!(snap.sites().is_empty());
        assert!(snap.plants().is_empty());
        assert_eq!(snap.current_path(), "P1");
    }

    #[tokio::test]
    async fn logout_resets_everything() {
        let ctl = controller();
        ctl.activate().await;

        ctl.logout();

        let snap = ctl.snapshot();
        for level in Level::ALL {
            assert!(snap.items(level).is_empty());
            assert!(snap.selected(level).is_none());
            assert_eq!(snap.phase(level), LevelPhase::Idle);
        }
        assert_eq!(snap.current_path(), "Select Project");
    }

    #[tokio::test]
    async fn tree_rows_expand_the_selected_path() {
        let ctl = controller();
        ctl.activate().await;

        let snap = ctl.snapshot();
        let rows: Vec<(i64, usize, bool)> = snap
            .tree_rows()
            .iter()
            .map(|r| (r.node.id.0, r.depth, r.selected))
            .collect();

        assert_eq!(
            rows,
            vec![
                (1, 0, false),
                (10, 1, false),
                (100, 2, false),
                (1000, 3, true),
                (11, 1, false),
                (2, 0, false),
            ]
        );
        let leaves: Vec<i64> = snap
            .tree_rows()
            .iter()
            .filter(|r| !r.has_children)
            .map(|r| r.node.id.0)
            .collect();
        assert_eq!(leaves, vec![1000]);
    }
}
