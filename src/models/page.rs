//! Server-driven pagination types shared by the list endpoints.

use serde::{Deserialize, Serialize};

/// Default page size used by the service's data tables.
const DEFAULT_PAGE_SIZE: u32 = 10;

/// One page of results as returned by a paginated endpoint.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Page<T> {
    pub results: Vec<T>,
    pub total_pages: u32,
    pub page_size: u32,
    pub current_page: u32,
}

impl<T> Page<T> {
    pub fn is_empty(&self) -> bool {
        self.results.is_empty()
    }

    pub fn has_next(&self) -> bool {
        self.current_page + 1 < self.total_pages
    }
}

/// Query parameters for a paginated, sortable, searchable endpoint.
/// Serialized directly into the request query string.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PageQuery {
    pub page: u32,
    pub page_size: u32,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub query: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub sort_by: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub sort_desc: Option<bool>,
}

impl Default for PageQuery {
    fn default() -> Self {
        Self {
            page: 0,
            page_size: DEFAULT_PAGE_SIZE,
            query: None,
            sort_by: None,
            sort_desc: None,
        }
    }
}

impl PageQuery {
    pub fn page(page: u32) -> Self {
        Self {
            page,
            ..Self::default()
        }
    }

    pub fn with_query(mut self, query: impl Into<String>) -> Self {
        self.query = Some(query.into());
        self
    }

    pub fn sorted_by(mut self, column: impl Into<String>, desc: bool) -> Self {
        self.sort_by = Some(column.into());
        self.sort_desc = Some(desc);
        self
    }
}
