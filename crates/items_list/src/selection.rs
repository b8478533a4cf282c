use std::{collections::HashMap, hash::Hash};

use tracing::debug;

use crate::{columns::Column, controller::ListController};

pub trait Identified {
    type Id: Clone + Eq + Hash;

    fn id(&self) -> Self::Id;
}

/// Bulk actions offered for the selected rows.
pub trait ExtraActions<T> {
    /// Whether any action applies to `item`; asked against the current page.
    fn is_item_supported(&self, item: &T) -> bool;
}

impl<T, F> ExtraActions<T> for F
where
    F: Fn(&T) -> bool,
{
    fn is_item_supported(&self, item: &T) -> bool {
        self(item)
    }
}

#[derive(Debug)]
pub struct ExtraActionsState<'a, T> {
    pub selected_items: Vec<&'a T>,
    pub are_extra_actions_available: bool,
}

/// Row selection scoped to the page a controller currently shows.
///
/// Selection is dropped whenever the controller's revision moves, so actions
/// never run against rows that are no longer on screen.
pub struct SelectionCoordinator<T: Identified, A> {
    actions: A,
    columns: Vec<Column>,
    selected: HashMap<T::Id, bool>,
    synced_revision: Option<u64>,
}

impl<T, A> SelectionCoordinator<T, A>
where
    T: Identified,
    A: ExtraActions<T>,
{
    pub fn new(columns: impl IntoIterator<Item = Column>, actions: A) -> Self {
        Self {
            actions,
            columns: std::iter::once(Column::selection()).chain(columns).collect(),
            selected: HashMap::new(),
            synced_revision: None,
        }
    }

    pub fn list_columns(&self) -> &[Column] {
        &self.columns
    }

    pub fn actions(&self) -> &A {
        &self.actions
    }

    pub fn is_selected(&mut self, controller: &ListController<T>, id: &T::Id) -> bool {
        self.sync(controller);
        self.selected.get(id).copied().unwrap_or(false)
    }

    /// Flips one row. Ids not on the current page are ignored.
    pub fn toggle_item(&mut self, controller: &ListController<T>, id: &T::Id) -> bool {
        self.sync(controller);
        if !controller.page_items().iter().any(|item| item.id() == *id) {
            debug!("ignoring selection of an item outside the current page");
            return false;
        }
        let entry = self.selected.entry(id.clone()).or_insert(false);
        *entry = !*entry;
        *entry
    }

    /// Selects every supported row on the page, or clears when all of them
    /// are already selected.
    pub fn toggle_all(&mut self, controller: &ListController<T>) {
        self.sync(controller);
        let supported: Vec<T::Id> = controller
            .page_items()
            .iter()
            .filter(|item| self.actions.is_item_supported(item))
            .map(Identified::id)
            .collect();
        let all_selected = !supported.is_empty()
            && supported
                .iter()
                .all(|id| self.selected.get(id).copied().unwrap_or(false));
        if all_selected {
            self.selected.clear();
        } else {
            for id in supported {
                self.selected.insert(id, true);
            }
        }
    }

    pub fn clear(&mut self) {
        self.selected.clear();
    }

    pub fn selected_items<'a>(&mut self, controller: &'a ListController<T>) -> Vec<&'a T> {
        self.sync(controller);
        controller
            .page_items()
            .iter()
            .filter(|item| self.selected.get(&item.id()).copied().unwrap_or(false))
            .collect()
    }

    pub fn are_extra_actions_available(&mut self, controller: &ListController<T>) -> bool {
        !self.selected_items(controller).is_empty()
            && controller
                .page_items()
                .iter()
                .any(|item| self.actions.is_item_supported(item))
    }

    pub fn state<'a>(&mut self, controller: &'a ListController<T>) -> ExtraActionsState<'a, T> {
        let are_extra_actions_available = self.are_extra_actions_available(controller);
        ExtraActionsState {
            selected_items: self.selected_items(controller),
            are_extra_actions_available,
        }
    }

    fn sync(&mut self, controller: &ListController<T>) {
        let revision = controller.revision();
        if self.synced_revision == Some(revision) {
            return;
        }
        if self.selected.values().any(|selected| *selected) {
            debug!(revision, "list changed; clearing selection");
        }
        self.selected.clear();
        self.synced_revision = Some(revision);
    }
}

#[cfg(test)]
#[path = "tests/selection_tests.rs"]
mod tests;
