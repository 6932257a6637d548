//! Pagination, sorting and filtering options

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;
use std::str::FromStr;

use super::error::{AppError, RequestError};
use super::store::Document;

/// Page size used when none is configured
pub const DEFAULT_PAGE_SIZE: u64 = 10;

/// Sort direction for one field
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SortOrder {
    Asc,
    Desc,
}

impl FromStr for SortOrder {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "asc" | "1" => Ok(SortOrder::Asc),
            "desc" | "-1" => Ok(SortOrder::Desc),
            other => Err(format!("unknown sort direction '{}'", other)),
        }
    }
}

/// Ordered field -> direction mapping; earlier fields take precedence
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Sort(pub IndexMap<String, SortOrder>);

impl Sort {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a sort key
    pub fn then(mut self, field: impl Into<String>, order: SortOrder) -> Self {
        self.0.insert(field.into(), order);
        self
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, SortOrder)> {
        self.0.iter().map(|(field, order)| (field.as_str(), *order))
    }
}

/// Parse `field:asc,other:desc`; a bare field sorts ascending
impl FromStr for Sort {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let mut sort = Sort::new();
        for part in s.split(',').map(str::trim).filter(|p| !p.is_empty()) {
            let (field, order) = match part.split_once(':') {
                Some((field, order)) => (field.trim(), order.trim().parse()?),
                None => (part, SortOrder::Asc),
            };
            if field.is_empty() {
                return Err(format!("missing field name in '{}'", part));
            }
            sort.0.insert(field.to_string(), order);
        }
        Ok(sort)
    }
}

impl fmt::Display for Sort {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let parts: Vec<String> = self
            .iter()
            .map(|(field, order)| match order {
                SortOrder::Asc => format!("{}:asc", field),
                SortOrder::Desc => format!("{}:desc", field),
            })
            .collect();
        f.write_str(&parts.join(","))
    }
}

/// Options for a paginated query
///
/// `page` is 1-based. Both `page` and `page_size` are clamped to at least 1.
#[derive(Debug, Clone, PartialEq)]
pub struct PaginationOptions {
    pub page: u64,
    pub page_size: u64,
    /// Empty means the store's natural order, newest first
    pub sort: Sort,
    pub filter: Document,
}

impl Default for PaginationOptions {
    fn default() -> Self {
        Self::new(1, DEFAULT_PAGE_SIZE as i64)
    }
}

impl PaginationOptions {
    pub fn new(page: i64, page_size: i64) -> Self {
        Self {
            page: page.max(1) as u64,
            page_size: page_size.max(1) as u64,
            sort: Sort::new(),
            filter: Document::new(),
        }
    }

    pub fn with_sort(mut self, sort: Sort) -> Self {
        self.sort = sort;
        self
    }

    pub fn with_filter(mut self, filter: Document) -> Self {
        self.filter = filter;
        self
    }

    /// Number of items before the requested page
    pub fn skip(&self) -> u64 {
        (self.page - 1).saturating_mul(self.page_size)
    }

    /// Read `page` and `pageSize` from a query string
    ///
    /// Returns `None` when neither is present, which callers treat as "list
    /// everything". A missing counterpart takes its default.
    pub fn from_query(
        query: &HashMap<String, String>,
        default_page_size: u64,
    ) -> Result<Option<Self>, AppError> {
        let page = parse_number(query, "page")?;
        let page_size = parse_number(query, "pageSize")?;
        if page.is_none() && page_size.is_none() {
            return Ok(None);
        }
        Ok(Some(Self::new(
            page.unwrap_or(1),
            page_size.unwrap_or(default_page_size as i64),
        )))
    }
}

fn parse_number(query: &HashMap<String, String>, name: &str) -> Result<Option<i64>, AppError> {
    query
        .get(name)
        .map(|raw| {
            raw.trim().parse::<i64>().map_err(|e| -> AppError {
                RequestError::InvalidQuery {
                    parameter: name.to_string(),
                    message: e.to_string(),
                }
                .into()
            })
        })
        .transpose()
}

/// One page of results plus the counts needed to request the others
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PageResult<T> {
    pub data: Vec<T>,
    pub total_items: u64,
    pub current_page: u64,
    pub page_size: u64,
    pub total_pages: u64,
}

impl<T> PageResult<T> {
    pub fn new(data: Vec<T>, total_items: u64, options: &PaginationOptions) -> Self {
        Self {
            data,
            total_items,
            current_page: options.page,
            page_size: options.page_size,
            total_pages: total_pages(total_items, options.page_size),
        }
    }

    pub fn map<U>(self, f: impl FnMut(T) -> U) -> PageResult<U> {
        PageResult {
            data: self.data.into_iter().map(f).collect(),
            total_items: self.total_items,
            current_page: self.current_page,
            page_size: self.page_size,
            total_pages: self.total_pages,
        }
    }
}

/// Ceiling division, 0 for an empty collection
pub fn total_pages(total_items: u64, page_size: u64) -> u64 {
    total_items.div_ceil(page_size.max(1))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn query(pairs: &[(&str, &str)]) -> HashMap<String, String> {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect()
    }

    #[test]
    fn test_options_are_clamped() {
        let options = PaginationOptions::new(0, -5);
        assert_eq!(options.page, 1);
        assert_eq!(options.page_size, 1);
        assert_eq!(options.skip(), 0);

        let options = PaginationOptions::new(3, 10);
        assert_eq!(options.skip(), 20);
    }

    #[test]
    fn test_from_query() {
        assert_eq!(PaginationOptions::from_query(&query(&[]), 10).unwrap(), None);

        let options = PaginationOptions::from_query(&query(&[("page", "2")]), 25)
            .unwrap()
            .unwrap();
        assert_eq!((options.page, options.page_size), (2, 25));

        let options = PaginationOptions::from_query(&query(&[("pageSize", "0")]), 25)
            .unwrap()
            .unwrap();
        assert_eq!((options.page, options.page_size), (1, 1));

        assert!(PaginationOptions::from_query(&query(&[("page", "two")]), 10).is_err());
    }

    #[test]
    fn test_sort_parsing_keeps_order() {
        let sort: Sort = "title:asc, createdAt:desc,priority".parse().unwrap();
        let keys: Vec<(&str, SortOrder)> = sort.iter().collect();
        assert_eq!(
            keys,
            vec![
                ("title", SortOrder::Asc),
                ("createdAt", SortOrder::Desc),
                ("priority", SortOrder::Asc)
            ]
        );
        assert_eq!(sort.to_string(), "title:asc,createdAt:desc,priority:asc");
    }

    #[test]
    fn test_sort_parsing_rejects_unknown_direction() {
        assert!("title:sideways".parse::<Sort>().is_err());
        assert!(":asc".parse::<Sort>().is_err());
    }

    #[test]
    fn test_total_pages() {
        assert_eq!(total_pages(0, 10), 0);
        assert_eq!(total_pages(3, 10), 1);
        assert_eq!(total_pages(20, 10), 2);
        assert_eq!(total_pages(21, 10), 3);
    }

    #[test]
    fn test_page_result_serializes_camel_case() {
        let result = PageResult::new(vec![1, 2], 12, &PaginationOptions::new(2, 2));
        let json = serde_json::to_value(&result).unwrap();
        assert_eq!(json["totalItems"], 12);
        assert_eq!(json["currentPage"], 2);
        assert_eq!(json["pageSize"], 2);
        assert_eq!(json["totalPages"], 6);
        assert_eq!(json["data"], serde_json::json!([1, 2]));
    }
}
