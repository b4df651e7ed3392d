//! Entity store
//!
//! Holds the four ordered collections and the four current selections.
//! Reads are public; every mutation is crate-private so that the cascade
//! controller stays the only writer.

use hier_model::{Level, Node, NodeId};
use std::sync::Arc;

/// Collections and selections for every level
#[derive(Debug, Clone)]
pub struct EntityStore {
    collections: [Arc<[Node]>; Level::COUNT],
    selections: [Option<Node>; Level::COUNT],
}

impl Default for EntityStore {
    fn default() -> Self {
        Self::new()
    }
}

impl EntityStore {
    /// Empty store: no items, nothing selected
    #[must_use]
    pub fn new() -> Self {
        Self {
            collections: std::array::from_fn(|_| Arc::from(Vec::new())),
            selections: Default::default(),
        }
    }

    /// Items at `level`, in fetch order
    #[inline]
    #[must_use]
    pub fn items(&self, level: Level) -> &[Node] {
        &self.collections[level.index()]
    }

    /// Shared handle to the items at `level`
    #[inline]
    #[must_use]
    pub fn items_shared(&self, level: Level) -> Arc<[Node]> {
        Arc::clone(&self.collections[level.index()])
    }

    /// Current selection at `level`
    #[inline]
    #[must_use]
    pub fn selection(&self, level: Level) -> Option<&Node> {
        self.selections[level.index()].as_ref()
    }

    /// Id of the current selection at `level`
    #[inline]
    #[must_use]
    pub fn selected_id(&self, level: Level) -> Option<NodeId> {
        self.selection(level).map(|n| n.id)
    }

    /// Look up an item at `level` by id
    #[must_use]
    pub fn find(&self, level: Level, id: NodeId) -> Option<&Node> {
        self.items(level).iter().find(|n| n.id == id)
    }

    /// Whether `level` holds an item with `id`
    #[inline]
    #[must_use]
    pub fn contains(&self, level: Level, id: NodeId) -> bool {
        self.find(level, id).is_some()
    }

    /// Selections root first
    pub fn selections(&self) -> impl Iterator<Item = Option<&Node>> {
        self.selections.iter().map(Option::as_ref)
    }

    pub(crate) fn replace_collection(&mut self, level: Level, items: Vec<Node>) {
        self.collections[level.index()] = Arc::from(items);
    }

    pub(crate) fn set_selection(&mut self, level: Level, node: Option<Node>) {
        self.selections[level.index()] = node;
    }

    /// Empty both the selection and the collection of every level below `level`
    pub(crate) fn clear_below(&mut self, level: Level) {
        for below in level.below() {
            self.clear_level(below);
        }
    }

    pub(crate) fn clear_level(&mut self, level: Level) {
        self.selections[level.index()] = None;
        if !self.collections[level.index()].is_empty() {
            self.collections[level.index()] = Arc::from(Vec::new());
        }
    }

    pub(crate) fn clear_all(&mut self) {
        for level in Level::ALL {
            self.clear_level(level);
        }
    }

    /// Check the parent/child invariants; returns a description of each breach
    #[must_use]
    pub fn check_invariants(&self) -> Vec<String> {
        let mut breaches = Vec::new();

        for level in Level::ALL {
            let Some(parent_level) = level.parent() else {
                continue;
            };
            let parent = self.selection(parent_level);

            match parent {
                None => {
                    if self.selection(level).is_some() {
                        breaches.push(format!("{level} selected without a {parent_level}"));
                    }
                    if !self.items(level).is_empty() {
                        breaches.push(format!("{level} list not empty without a {parent_level}"));
                    }
                }
                Some(parent) => {
                    if let Some(child) = self.selection(level) {
                        if !child.is_child_of(parent) {
                            breaches.push(format!(
                                "{level} {} does not belong to {parent_level} {}",
                                child.id, parent.id
                            ));
                        }
                    }
                    if let Some(stray) = self.items(level).iter().find(|n| !n.is_child_of(parent)) {
                        breaches.push(format!(
                            "{level} list holds {} from another {parent_level}",
                            stray.id
                        ));
                    }
                }
            }

            if let Some(selected) = self.selection(level) {
                if !self.contains(level, selected.id) {
                    breaches.push(format!("{level} selection {} is not in its list", selected.id));
                }
            }
        }

        breaches
    }
}
