use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::domain::{QueryId, Scope, UserId};

/// One page request as issued by a list controller.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ItemsRequest {
    pub scope: Scope,
    pub page: u32,
    pub page_size: u32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub order_by_field: Option<String>,
    #[serde(default)]
    pub order_by_reverse: bool,
    #[serde(default)]
    pub search_term: String,
    #[serde(default)]
    pub tags: Vec<String>,
}

impl ItemsRequest {
    /// Query-string pairs as the list endpoints expect them. `tags` repeats.
    pub fn query_pairs(&self) -> Vec<(&'static str, String)> {
        let mut pairs = vec![
            ("page", self.page.to_string()),
            ("page_size", self.page_size.to_string()),
        ];
        if let Some(field) = &self.order_by_field {
            let order = if self.order_by_reverse {
                format!("-{field}")
            } else {
                field.clone()
            };
            pairs.push(("order", order));
        }
        if !self.search_term.is_empty() {
            pairs.push(("q", self.search_term.clone()));
        }
        for tag in &self.tags {
            pairs.push(("tags", tag.clone()));
        }
        pairs
    }
}

/// Raw page as returned by a list endpoint, before item processing.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RawPage<R> {
    pub results: Vec<R>,
    pub count: u64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserSummary {
    pub id: UserId,
    pub name: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct QuerySchedule {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub interval: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub time: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub day_of_week: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub until: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct QueryRecord {
    pub id: QueryId,
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default)]
    pub tags: Vec<String>,
    #[serde(default)]
    pub is_draft: bool,
    #[serde(default)]
    pub is_archived: bool,
    #[serde(default)]
    pub is_favorite: bool,
    pub user: UserSummary,
    pub created_at: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub retrieved_at: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub schedule: Option<QuerySchedule>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TagCount {
    pub name: String,
    #[serde(default)]
    pub count: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TagList {
    pub tags: Vec<TagCount>,
}
