//! Paging request and response shapes.

use serde::{Deserialize, Serialize};

use crate::config::Config;

/// Filter, ordering and page selection for one request.
///
/// Pages are 1-based; a page of zero or below is the first page, and a page
/// size of zero or below uses the configured default.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct GridQuery {
    pub page: i64,
    pub page_size: i64,
    pub order_by: Option<String>,
    pub filter: Option<String>,
}

impl GridQuery {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_page(mut self, page: i64, page_size: i64) -> Self {
        self.page = page;
        self.page_size = page_size;
        self
    }

    pub fn with_filter(mut self, filter: impl Into<String>) -> Self {
        self.filter = Some(filter.into());
        self
    }

    pub fn with_order_by(mut self, order_by: impl Into<String>) -> Self {
        self.order_by = Some(order_by.into());
        self
    }

    /// Effective page size.
    pub fn take(&self, config: &Config) -> usize {
        if self.page_size > 0 {
            usize::try_from(self.page_size).unwrap_or(usize::MAX)
        } else {
            config.default_page_size
        }
    }

    /// Number of records before the requested page.
    pub fn skip(&self, config: &Config) -> usize {
        let page = usize::try_from(self.page.max(1)).unwrap_or(usize::MAX);
        (page - 1).saturating_mul(self.take(config))
    }

    pub fn filter_text(&self) -> &str {
        self.filter.as_deref().unwrap_or("")
    }

    pub fn order_text(&self) -> &str {
        self.order_by.as_deref().unwrap_or("")
    }
}

/// One page of results plus the total match count.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Paging<T> {
    pub count: usize,
    pub data: Vec<T>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = Config::default();
        let query = GridQuery::new();
        assert_eq!(query.take(&config), 20);
        assert_eq!(query.skip(&config), 0);
    }

    #[test]
    fn test_non_positive_page_is_first_page() {
        let config = Config::default();
        assert_eq!(GridQuery::new().with_page(0, 10).skip(&config), 0);
        assert_eq!(GridQuery::new().with_page(-3, 10).skip(&config), 0);
        assert_eq!(GridQuery::new().with_page(3, 10).skip(&config), 20);
    }

    #[test]
    fn test_deserialize_camel_case() {
        let query: GridQuery =
            serde_json::from_str(r#"{"page":2,"pageSize":5,"orderBy":"id desc","filter":"id>1"}"#)
                .unwrap();
        assert_eq!(query.skip(&Config::default()), 5);
        assert_eq!(query.order_text(), "id desc");
        assert_eq!(query.filter_text(), "id>1");
    }
}
