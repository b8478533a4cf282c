//! Binds a list controller to a rendering component.

use std::sync::Arc;

use tracing::info;

use crate::{
    controller::{ControllerOptions, ListController},
    error::ConfigurationError,
    source::ItemSource,
    storage::StateStorage,
    ListContext,
};

pub trait ItemsListComponent<T> {
    type Output;

    fn render(&self, controller: &ListController<T>) -> Self::Output;
}

impl<T, O, F> ItemsListComponent<T> for F
where
    F: Fn(&ListController<T>) -> O,
{
    type Output = O;

    fn render(&self, controller: &ListController<T>) -> O {
        self(controller)
    }
}

pub type SourceFactory<T> = Box<
    dyn Fn(&ListContext) -> Result<Arc<dyn ItemSource<Item = T>>, ConfigurationError>
        + Send
        + Sync,
>;

pub type StorageFactory = Box<dyn Fn(&ListContext) -> Arc<dyn StateStorage> + Send + Sync>;

/// A component together with the factories that build its controller.
pub struct ItemsList<C, T> {
    component: Arc<C>,
    source_factory: SourceFactory<T>,
    storage_factory: StorageFactory,
    options: ControllerOptions,
}

pub fn wrap<C, T, S, P>(component: C, source_factory: S, storage_factory: P) -> ItemsList<C, T>
where
    C: ItemsListComponent<T>,
    S: Fn(&ListContext) -> Result<Arc<dyn ItemSource<Item = T>>, ConfigurationError>
        + Send
        + Sync
        + 'static,
    P: Fn(&ListContext) -> Arc<dyn StateStorage> + Send + Sync + 'static,
{
    ItemsList {
        component: Arc::new(component),
        source_factory: Box::new(source_factory),
        storage_factory: Box::new(storage_factory),
        options: ControllerOptions::default(),
    }
}

impl<C, T> ItemsList<C, T>
where
    C: ItemsListComponent<T>,
    T: Send + 'static,
{
    pub fn with_options(mut self, options: ControllerOptions) -> Self {
        self.options = options;
        self
    }

    /// Builds a fresh controller for `context`. Must run inside a tokio runtime.
    pub fn mount(&self, context: ListContext) -> Result<MountedList<C, T>, ConfigurationError> {
        let source = (self.source_factory)(&context)?;
        let storage = (self.storage_factory)(&context);
        info!(scope = %context.scope, title = %context.page_title, "mounting list");
        let controller = ListController::new(context, source, storage, self.options.clone());
        Ok(MountedList {
            component: Arc::clone(&self.component),
            controller,
        })
    }
}

pub struct MountedList<C, T> {
    component: Arc<C>,
    controller: ListController<T>,
}

impl<C, T> MountedList<C, T>
where
    C: ItemsListComponent<T>,
{
    pub fn controller(&self) -> &ListController<T> {
        &self.controller
    }

    pub fn controller_mut(&mut self) -> &mut ListController<T> {
        &mut self.controller
    }

    pub fn component(&self) -> &C {
        &self.component
    }

    pub fn render(&self) -> C::Output {
        self.component.render(&self.controller)
    }

    /// Drops the controller, its storage subscription and any pending search.
    pub fn unmount(self) {
        info!(scope = %self.controller.context().scope, "unmounting list");
    }
}

#[cfg(test)]
#[path = "tests/compose_tests.rs"]
mod tests;
