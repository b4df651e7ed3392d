//! Read-only projection for consumers
//!
//! A [`HierarchySnapshot`] is published after every committed change. Selector
//! and tree widgets render from it and never see a half-applied cascade step.

use crate::error::HierarchyError;
use crate::phase::LevelPhase;
use crate::store::EntityStore;
use hier_model::{Level, Node, PathStyle};
use std::sync::Arc;

/// Immutable view of the hierarchy at one revision
#[derive(Debug, Clone)]
pub struct HierarchySnapshot {
    revision: u64,
    items: [Arc<[Node]>; Level::COUNT],
    selected: [Option<Node>; Level::COUNT],
    phases: [LevelPhase; Level::COUNT],
    current_path: String,
    last_error: Option<HierarchyError>,
}

impl Default for HierarchySnapshot {
    fn default() -> Self {
        Self::capture(
            0,
            &EntityStore::new(),
            [LevelPhase::Idle; Level::COUNT],
            None,
            &PathStyle::default(),
        )
    }
}

impl HierarchySnapshot {
    pub(crate) fn capture(
        revision: u64,
        store: &EntityStore,
        phases: [LevelPhase; Level::COUNT],
        last_error: Option<HierarchyError>,
        style: &PathStyle,
    ) -> Self {
        Self {
            revision,
            items: Level::ALL.map(|level| store.items_shared(level)),
            selected: Level::ALL.map(|level| store.selection(level).cloned()),
            phases,
            current_path: style.render(store.selections()),
            last_error,
        }
    }

    /// Monotonic change counter
    #[inline]
    #[must_use]
    pub fn revision(&self) -> u64 {
        self.revision
    }

    #[inline]
    #[must_use]
    pub fn items(&self, level: Level) -> &[Node] {
        &self.items[level.index()]
    }

    #[inline]
    #[must_use]
    pub fn selected(&self, level: Level) -> Option<&Node> {
        self.selected[level.index()].as_ref()
    }

    #[inline]
    #[must_use]
    pub fn phase(&self, level: Level) -> LevelPhase {
        self.phases[level.index()]
    }

    pub fn projects(&self) -> &[Node] {
        self.items(Level::Project)
    }

    pub fn clients(&self) -> &[Node] {
        self.items(Level::Client)
    }

    pub fn sites(&self) -> &[Node] {
        self.items(Level::Site)
    }

    pub fn plants(&self) -> &[Node] {
        self.items(Level::Plant)
    }

    pub fn selected_project(&self) -> Option<&Node> {
        self.selected(Level::Project)
    }

    pub fn selected_client(&self) -> Option<&Node> {
        self.selected(Level::Client)
    }

    pub fn selected_site(&self) -> Option<&Node> {
        self.selected(Level::Site)
    }

    pub fn selected_plant(&self) -> Option<&Node> {
        self.selected(Level::Plant)
    }

    /// Whether any level has a fetch in flight
    #[inline]
    #[must_use]
    pub fn is_loading(&self) -> bool {
        self.phases.iter().any(|p| p.is_loading())
    }

    /// Breadcrumb of the current selections
    #[inline]
    #[must_use]
    pub fn current_path(&self) -> &str {
        &self.current_path
    }

    /// Most recent load failure, cleared when that level loads again
    #[inline]
    #[must_use]
    pub fn last_error(&self) -> Option<&HierarchyError> {
        self.last_error.as_ref()
    }

    /// Flatten into tree rows
    ///
    /// Every project is listed; only the selected entity at each level is
    /// expanded, so children always appear under their own parent.
    #[must_use]
    pub fn tree_rows(&self) -> Vec<TreeRow<'_>> {
        let mut rows = Vec::new();
        self.push_rows(Level::Project, &mut rows);
        rows
    }

    fn push_rows<'a>(&'a self, level: Level, rows: &mut Vec<TreeRow<'a>>) {
        let selected_id = self.selected(level).map(|n| n.id);
        let child_selected = level
            .child()
            .is_some_and(|child| self.selected(child).is_some());

        for node in self.items(level) {
            let on_path = selected_id == Some(node.id);
            // children are only known for the expanded node
            let has_children = !level.is_leaf()
                && (!on_path || level.child().is_some_and(|child| !self.items(child).is_empty()));

            rows.push(TreeRow {
                node,
                depth: level.index(),
                selected: on_path && !child_selected,
                expanded: on_path && has_children,
                has_children,
            });

            if on_path {
                if let Some(child) = level.child() {
                    self.push_rows(child, rows);
                }
            }
        }
    }
}

/// One line of the hierarchy tree
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TreeRow<'a> {
    pub node: &'a Node,
    /// Indentation, 0 for projects
    pub depth: usize,
    /// Deepest selected entity
    pub selected: bool,
    pub expanded: bool,
    pub has_children: bool,
}

impl TreeRow<'_> {
    /// Indented `CODE - Name` with a selection marker
    #[must_use]
    pub fn render(&self) -> String {
        let marker = if self.selected { '*' } else { ' ' };
        format!("{marker} {}{}", "  ".repeat(self.depth), self.node.label())
    }
}
