// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0
//! Pagination
//!
//! Page windows over in-memory result lists and `previous`/`next` link
//! construction for paginated responses.

use serde::Deserialize;
use url::Url;

pub const DEFAULT_PAGE: i64 = 1;
pub const DEFAULT_PAGE_SIZE: i64 = 20;
pub const MAX_PAGE_SIZE: i64 = 100;

fn default_paging() -> bool {
    true
}

/// Paging query parameters (`paging`, `page`, `page_size`).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
pub struct PageRequest {
    #[serde(default = "default_paging")]
    pub paging: bool,
    #[serde(default)]
    pub page: i64,
    #[serde(default)]
    pub page_size: i64,
}

impl Default for PageRequest {
    fn default() -> Self {
        Self {
            paging: true,
            page: DEFAULT_PAGE,
            page_size: DEFAULT_PAGE_SIZE,
        }
    }
}

impl PageRequest {
    pub fn new(page: i64, page_size: i64) -> Self {
        Self {
            paging: true,
            page,
            page_size,
        }
    }

    /// Fill in defaults for non-positive values and cap the page size.
    pub fn with_defaults(mut self, default_size: i64, max_size: i64) -> Self {
        if self.page <= 0 {
            self.page = DEFAULT_PAGE;
        }
        if self.page_size <= 0 {
            self.page_size = default_size;
        }
        if max_size > 0 && self.page_size > max_size {
            self.page_size = max_size;
        }
        self
    }

    pub fn offset(&self) -> i64 {
        self.page
            .saturating_sub(1)
            .saturating_mul(self.page_size)
            .max(0)
    }

    /// Cut one page out of a fully materialized list. Returns everything when
    /// paging is disabled.
    pub fn slice<T>(&self, items: Vec<T>) -> Vec<T> {
        if !self.paging {
            return items;
        }
        let start = usize::try_from(self.offset()).unwrap_or(usize::MAX);
        let size = usize::try_from(self.page_size).unwrap_or(0);
        items.into_iter().skip(start).take(size).collect()
    }
}

/// One page of results with the total count before slicing.
#[derive(Debug, Clone, PartialEq)]
pub struct Page<T> {
    pub count: usize,
    pub results: Vec<T>,
}

impl<T> Page<T> {
    pub fn from_all(request: &PageRequest, items: Vec<T>) -> Self {
        let count = items.len();
        Self {
            count,
            results: request.slice(items),
        }
    }

    pub fn map<U>(self, f: impl FnMut(T) -> U) -> Page<U> {
        Page {
            count: self.count,
            results: self.results.into_iter().map(f).collect(),
        }
    }
}

/// `previous` and `next` links for a page, derived from the request URL by
/// replacing its `page`/`page_size` query parameters.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PageLinks {
    pub previous: Option<String>,
    pub next: Option<String>,
}

impl PageLinks {
    pub fn build(base: &Url, request: &PageRequest, total: usize) -> Self {
        if request.page_size <= 0 {
            return Self::default();
        }
        let total = i64::try_from(total).unwrap_or(i64::MAX);
        let last_page = total.saturating_add(request.page_size - 1) / request.page_size;

        let make = |page: i64| {
            let mut url = base.clone();
            let retained: Vec<(String, String)> = base
                .query_pairs()
                .filter(|(k, _)| k != "page" && k != "page_size")
                .map(|(k, v)| (k.into_owned(), v.into_owned()))
                .collect();
            url.query_pairs_mut()
                .clear()
                .extend_pairs(retained)
                .append_pair("page", &page.max(1).to_string())
                .append_pair("page_size", &request.page_size.to_string());
            url.to_string()
        };

        Self {
            previous: (request.page > 1).then(|| make(request.page - 1)),
            next: (request.page < last_page).then(|| make(request.page + 1)),
        }
    }
}
