use std::{
    fmt::Write as _,
    sync::{Mutex, MutexGuard, PoisonError},
};

use chrono::{DateTime, Utc};
use items_list::{
    columns::{Column, ColumnKind, SortDirection},
    selection::SelectionCoordinator,
    ConfigurationError, EmptyState, ExtraActions, HttpResource, Identified, ItemsListComponent,
    ListController, LoadStatus, ResourceMap,
};
use shared::{
    domain::{QueryId, Scope},
    protocol::{QueryRecord, QuerySchedule},
};
use url::Url;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Query {
    pub id: QueryId,
    pub name: String,
    pub tags: Vec<String>,
    pub is_draft: bool,
    pub is_archived: bool,
    pub is_favorite: bool,
    pub author: String,
    pub created_at: DateTime<Utc>,
    pub retrieved_at: Option<DateTime<Utc>>,
    pub schedule: Option<QuerySchedule>,
}

impl From<QueryRecord> for Query {
    fn from(record: QueryRecord) -> Self {
        Self {
            id: record.id,
            name: record.name,
            tags: record.tags,
            is_draft: record.is_draft,
            is_archived: record.is_archived,
            is_favorite: record.is_favorite,
            author: record.user.name,
            created_at: record.created_at,
            retrieved_at: record.retrieved_at,
            schedule: record.schedule.filter(|schedule| schedule.interval.is_some()),
        }
    }
}

impl Identified for Query {
    type Id = QueryId;

    fn id(&self) -> QueryId {
        self.id
    }
}

/// Bulk actions only apply to queries that are still live.
#[derive(Debug, Clone, Copy, Default)]
pub struct ArchiveAwareActions;

impl ExtraActions<Query> for ArchiveAwareActions {
    fn is_item_supported(&self, item: &Query) -> bool {
        !item.is_archived
    }
}

pub type QuerySelection = SelectionCoordinator<Query, ArchiveAwareActions>;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SidebarItem {
    pub scope: Scope,
    pub href: &'static str,
    pub title: &'static str,
}

pub fn sidebar_menu() -> [SidebarItem; 4] {
    [
        SidebarItem {
            scope: Scope::All,
            href: "queries",
            title: "All Queries",
        },
        SidebarItem {
            scope: Scope::Mine,
            href: "queries/my",
            title: "My Queries",
        },
        SidebarItem {
            scope: Scope::Favorites,
            href: "queries/favorites",
            title: "Favorites",
        },
        SidebarItem {
            scope: Scope::Archived,
            href: "queries/archive",
            title: "Archived",
        },
    ]
}

pub fn sidebar_line(current: Scope) -> String {
    let entries: Vec<String> = sidebar_menu()
        .iter()
        .map(|item| {
            if item.scope == current {
                format!("[{}]", item.title)
            } else {
                item.title.to_string()
            }
        })
        .collect();
    entries.join(" | ")
}

pub fn page_title(scope: Scope) -> &'static str {
    match scope {
        Scope::All => "Queries",
        Scope::Mine => "My Queries",
        Scope::Favorites => "Favorite Queries",
        Scope::Archived => "Archived Queries",
    }
}

pub fn scope_endpoint(scope: Scope) -> &'static str {
    match scope {
        Scope::All => "api/queries",
        Scope::Mine => "api/queries/my",
        Scope::Favorites => "api/queries/favorites",
        Scope::Archived => "api/queries/archive",
    }
}

pub const TAGS_ENDPOINT: &str = "api/queries/tags";

pub fn list_columns() -> Vec<Column> {
    vec![
        Column::favorites(),
        Column::text("name", "Name").sortable("name"),
        Column::text("created_by", "Created By")
            .sortable("created_by")
            .width("1%"),
        Column::date_time("created_at", "Created At")
            .sortable("created_at")
            .width("1%"),
        Column::date_time("retrieved_at", "Last Executed At")
            .sortable("retrieved_at")
            .order_by("executed_at")
            .width("1%"),
        Column::text("schedule", "Refresh Schedule")
            .sortable("schedule")
            .width("1%"),
    ]
}

/// Server-side sort field for a column key; unknown keys pass through.
pub fn sort_field_for(key: &str) -> String {
    list_columns()
        .iter()
        .find(|column| column.key == key)
        .and_then(Column::sort_field)
        .unwrap_or(key)
        .to_string()
}

pub fn resources(
    base: &Url,
    api_key: Option<String>,
) -> Result<ResourceMap<QueryRecord>, ConfigurationError> {
    let client = reqwest::Client::new();
    let mut map = ResourceMap::new();
    for scope in Scope::ALL {
        let resource = HttpResource::new(base, scope_endpoint(scope))?
            .with_client(client.clone())
            .with_api_key(api_key.clone());
        map = map.with(scope, resource);
    }
    Ok(map)
}

/// Initial location for a scope, relative to the server base.
pub fn scope_location(base: &Url, scope: Scope) -> Result<Url, ConfigurationError> {
    let href = sidebar_menu()
        .into_iter()
        .find(|item| item.scope == scope)
        .map(|item| item.href)
        .unwrap_or("queries");
    items_list::transport::endpoint_url(base, href)
}

pub fn schedule_label(schedule: Option<&QuerySchedule>) -> String {
    let Some(seconds) = schedule.and_then(|schedule| schedule.interval) else {
        return "Never".into();
    };
    let (count, unit) = match seconds {
        s if s % 604_800 == 0 => (s / 604_800, "week"),
        s if s % 86_400 == 0 => (s / 86_400, "day"),
        s if s % 3_600 == 0 => (s / 3_600, "hour"),
        s if s % 60 == 0 => (s / 60, "minute"),
        s => (s, "second"),
    };
    let mut label = if count == 1 {
        format!("Every {unit}")
    } else {
        format!("Every {count} {unit}s")
    };
    if let Some(time) = schedule.and_then(|schedule| schedule.time.as_deref()) {
        let _ = write!(label, " at {time}");
    }
    label
}

fn cell(
    column: &Column,
    query: &Query,
    selection: &mut QuerySelection,
    controller: &ListController<Query>,
) -> String {
    match column.kind {
        ColumnKind::Selection => {
            if selection.is_selected(controller, &query.id) {
                "[x]".into()
            } else {
                "[ ]".into()
            }
        }
        ColumnKind::Favorites => {
            let star = if query.is_favorite { "*" } else { " " };
            star.into()
        }
        ColumnKind::DateTime => {
            let value = match column.key.as_str() {
                "created_at" => Some(query.created_at),
                _ => query.retrieved_at,
            };
            value
                .map(|at| at.format("%Y-%m-%d %H:%M").to_string())
                .unwrap_or_else(|| "-".into())
        }
        ColumnKind::Text => match column.key.as_str() {
            "name" => {
                let mut name = format!("#{} {}", query.id, query.name);
                if query.is_draft {
                    name.push_str(" (draft)");
                }
                if !query.tags.is_empty() {
                    let _ = write!(name, " [{}]", query.tags.join(", "));
                }
                name
            }
            "created_by" => query.author.clone(),
            "schedule" => schedule_label(query.schedule.as_ref()),
            _ => String::new(),
        },
    }
}

fn header(column: &Column, controller: &ListController<Query>) -> String {
    let direction =
        column.sort_direction(controller.order_by_field(), controller.order_by_reverse());
    let marker = match direction {
        Some(SortDirection::Ascending) => " ^",
        Some(SortDirection::Descending) => " v",
        None => "",
    };
    format!("{}{marker}", column.title)
}

/// Plain-text rendering of the list view.
pub fn render(controller: &ListController<Query>, selection: &mut QuerySelection) -> String {
    let mut out = String::new();
    let context = controller.context();
    let _ = writeln!(out, "== {} ==", context.page_title);

    let mut filters = Vec::new();
    if !controller.search_term().is_empty() {
        filters.push(format!("search: {:?}", controller.search_term()));
    }
    if !controller.selected_tags().is_empty() {
        let tags: Vec<&str> = controller.selected_tags().iter().map(String::as_str).collect();
        filters.push(format!("tags: {}", tags.join(", ")));
    }
    if !filters.is_empty() {
        let _ = writeln!(out, "{}", filters.join(" | "));
    }

    match controller.status() {
        LoadStatus::Uninitialized | LoadStatus::Loading if !controller.is_loaded() => {
            let _ = writeln!(out, "Loading...");
            return out;
        }
        LoadStatus::Errored if !controller.is_loaded() => {
            let message = controller.error().map(ToString::to_string).unwrap_or_default();
            let _ = writeln!(out, "Failed to load queries: {message}");
            let _ = writeln!(out, "Type 'reload' to try again.");
            return out;
        }
        _ => {}
    }

    match controller.empty_state() {
        Some(EmptyState::NoMatches) => {
            let _ = writeln!(out, "Sorry, we couldn't find anything.");
        }
        Some(EmptyState::NoItems) => {
            let _ = writeln!(out, "There are no queries here yet.");
        }
        None => {
            let columns = selection.list_columns().to_vec();
            let headers: Vec<String> = columns
                .iter()
                .map(|column| header(column, controller))
                .collect();
            let _ = writeln!(out, "{}", headers.join(" | "));
            for query in controller.page_items() {
                let cells: Vec<String> = columns
                    .iter()
                    .map(|column| cell(column, query, selection, controller))
                    .collect();
                let _ = writeln!(out, "{}", cells.join(" | "));
            }
        }
    }

    let _ = writeln!(
        out,
        "page {}/{} ({} per page, {} total)",
        controller.page(),
        controller.page_count(),
        controller.items_per_page(),
        controller.total_items_count()
    );
    if controller.is_loading() {
        let _ = writeln!(out, "(refreshing)");
    }
    if let Some(error) = controller.error() {
        let _ = writeln!(out, "last refresh failed: {error}");
    }

    let state = selection.state(controller);
    if !state.selected_items.is_empty() {
        let _ = writeln!(
            out,
            "{} selected; bulk actions {}",
            state.selected_items.len(),
            if state.are_extra_actions_available {
                "available"
            } else {
                "unavailable"
            }
        );
    }
    out
}

/// The queries list view: renders the table and owns the row selection.
pub struct QueriesView {
    selection: Mutex<QuerySelection>,
}

impl Default for QueriesView {
    fn default() -> Self {
        Self {
            selection: Mutex::new(QuerySelection::new(list_columns(), ArchiveAwareActions)),
        }
    }
}

impl QueriesView {
    pub fn toggle(&self, controller: &ListController<Query>, id: QueryId) -> bool {
        self.selection().toggle_item(controller, &id)
    }

    pub fn toggle_all(&self, controller: &ListController<Query>) {
        self.selection().toggle_all(controller);
    }

    fn selection(&self) -> MutexGuard<'_, QuerySelection> {
        self.selection.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl ItemsListComponent<Query> for QueriesView {
    type Output = String;

    fn render(&self, controller: &ListController<Query>) -> String {
        render(controller, &mut self.selection())
    }
}

#[cfg(test)]
#[path = "tests/page_tests.rs"]
mod tests;
