//! Declarative table column configuration.

pub const SELECTION_COLUMN_KEY: &str = "__selection";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ColumnKind {
    Selection,
    Favorites,
    Text,
    DateTime,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SortDirection {
    Ascending,
    Descending,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Column {
    pub key: String,
    pub title: String,
    pub kind: ColumnKind,
    pub field: Option<String>,
    /// Server-side sort field when it differs from the displayed field.
    pub order_by_field: Option<String>,
    pub sortable: bool,
    pub width: Option<String>,
}

impl Column {
    pub fn text(key: impl Into<String>, title: impl Into<String>) -> Self {
        Self {
            key: key.into(),
            title: title.into(),
            kind: ColumnKind::Text,
            field: None,
            order_by_field: None,
            sortable: false,
            width: None,
        }
    }

    pub fn date_time(field: impl Into<String>, title: impl Into<String>) -> Self {
        let field = field.into();
        Self {
            key: field.clone(),
            kind: ColumnKind::DateTime,
            field: Some(field),
            ..Self::text("", title)
        }
    }

    pub fn favorites() -> Self {
        Self {
            kind: ColumnKind::Favorites,
            width: Some("1%".into()),
            ..Self::text("favorites", "")
        }
    }

    pub fn selection() -> Self {
        Self {
            kind: ColumnKind::Selection,
            width: Some("1%".into()),
            ..Self::text(SELECTION_COLUMN_KEY, "")
        }
    }

    pub fn sortable(mut self, field: impl Into<String>) -> Self {
        self.field = Some(field.into());
        self.sortable = true;
        self
    }

    pub fn order_by(mut self, field: impl Into<String>) -> Self {
        self.order_by_field = Some(field.into());
        self
    }

    pub fn width(mut self, width: impl Into<String>) -> Self {
        self.width = Some(width.into());
        self
    }

    /// Field to hand to `toggle_sorting` when the header is clicked.
    pub fn sort_field(&self) -> Option<&str> {
        if !self.sortable {
            return None;
        }
        self.order_by_field.as_deref().or(self.field.as_deref())
    }

    pub fn sort_direction(&self, order_by_field: Option<&str>, reverse: bool) -> Option<SortDirection> {
        let field = self.sort_field()?;
        if order_by_field != Some(field) {
            return None;
        }
        Some(if reverse {
            SortDirection::Descending
        } else {
            SortDirection::Ascending
        })
    }
}
