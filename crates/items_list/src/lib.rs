//! Paginated, searchable, sortable and tag-filterable lists backed by a
//! remote resource, with list state mirrored into the location query string.

use shared::domain::Scope;

pub mod columns;
pub mod compose;
pub mod controller;
pub mod error;
pub mod history;
pub mod selection;
pub mod source;
pub mod state;
pub mod storage;
pub mod transport;

pub use compose::{wrap, ItemsList, ItemsListComponent, MountedList};
pub use controller::{ControllerOptions, EventOutcome, ListController, PaginationUpdate};
pub use error::{ConfigurationError, FetchError};
pub use history::{History, MemoryHistory, NavigationAction};
pub use selection::{ExtraActions, Identified, SelectionCoordinator};
pub use source::{FnResource, ItemSource, ItemsPage, Resource, ResourceItemsSource, ResourceMap};
pub use state::{EmptyState, LoadStatus, PersistedStateRecord, StateDefaults};
pub use storage::{MemoryStateStorage, StateStorage, UrlStateStorage};
pub use transport::{HttpResource, HttpTagVocabulary, MissingTagVocabulary, TagVocabulary};

/// Identifies which list is shown.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ListContext {
    pub scope: Scope,
    pub page_title: String,
}

impl ListContext {
    pub fn new(scope: Scope, page_title: impl Into<String>) -> Self {
        Self {
            scope,
            page_title: page_title.into(),
        }
    }
}
