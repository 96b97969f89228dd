//! # Pagination Descriptor
//!
//! Page number, page size and ordered sort pairs, parsed from a request
//! query string the way Spring-style REST APIs spell them.
//!
//! ## Accepted Query Strings
//! ```text
//! ?page=1&size=10           → page 1, size 10, no sort
//! ?page=2&sort=name         → page 2, default size, name ASC
//! ?page=2&sort=name,desc    → page 2, default size, name DESC
//! ?sort=name&sort=id,DESC   → default page and size, name ASC, id DESC
//! ?page=abc&size=           → defaults for both
//! ```
//!
//! Malformed input never fails; it falls back to [`PageOptions`]. The
//! descriptor is then folded into SQL text with [`Page::wrap`] or into a
//! parameter map with [`Page::bind_into`] before calling the store.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::dialect::Dialect;
use crate::value::Params;

// =============================================================================
// Options
// =============================================================================

/// Defaults applied when the query string omits or garbles a field.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PageOptions {
    /// Default page size. Default: 20
    pub page_size: i64,
    /// Default page, counted from 1. Default: 1
    pub page: i64,
}

impl Default for PageOptions {
    fn default() -> Self {
        PageOptions {
            page_size: 20,
            page: 1,
        }
    }
}

// =============================================================================
// Sort
// =============================================================================

/// Sort direction.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Direction {
    #[serde(rename = "ASC")]
    Asc,
    #[serde(rename = "DESC")]
    Desc,
}

impl fmt::Display for Direction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Direction::Asc => f.write_str("ASC"),
            Direction::Desc => f.write_str("DESC"),
        }
    }
}

/// One `ORDER BY` term.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Sort {
    #[serde(rename = "sort")]
    pub field: String,
    pub dir: Direction,
}

impl Sort {
    pub fn asc(field: impl Into<String>) -> Self {
        Sort {
            field: field.into(),
            dir: Direction::Asc,
        }
    }

    pub fn desc(field: impl Into<String>) -> Self {
        Sort {
            field: field.into(),
            dir: Direction::Desc,
        }
    }

    /// Parses `field` or `field,dir`. Anything else yields `None`.
    fn parse(raw: &str) -> Option<Self> {
        if raw.is_empty() {
            return None;
        }
        let clips: Vec<&str> = raw.split(',').collect();
        match clips.as_slice() {
            [field] => Some(Sort::asc(*field)),
            [field, dir] if dir.eq_ignore_ascii_case("desc") => Some(Sort::desc(*field)),
            [field, _] => Some(Sort::asc(*field)),
            _ => None,
        }
    }

    /// Plain identifiers only, so the field can be spliced into SQL.
    fn is_safe(&self) -> bool {
        !self.field.is_empty()
            && self
                .field
                .chars()
                .all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '.')
    }
}

// =============================================================================
// Page
// =============================================================================

/// A requested page of results.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Page {
    pub page: i64,
    pub size: i64,
    pub sort: Vec<Sort>,
}

impl Default for Page {
    fn default() -> Self {
        Page::with_options(&PageOptions::default())
    }
}

impl Page {
    /// First page with the option defaults and no sort.
    pub fn with_options(opts: &PageOptions) -> Self {
        Page {
            page: opts.page,
            size: opts.page_size,
            sort: Vec::new(),
        }
    }

    /// Parses `page`, `size` and every `sort` from a URL query string.
    ///
    /// A leading `?` is ignored and values are URL-decoded. Only the first
    /// `page` and `size` count.
    ///
    /// ## Example
    /// ```rust
    /// use storekit_core::{Page, PageOptions, Sort};
    ///
    /// let page = Page::from_query("?page=2&sort=name,desc", &PageOptions::default());
    /// assert_eq!(page.page, 2);
    /// assert_eq!(page.size, 20);
    /// assert_eq!(page.sort, vec![Sort::desc("name")]);
    /// ```
    pub fn from_query(query: &str, opts: &PageOptions) -> Self {
        let query = query.strip_prefix('?').unwrap_or(query);

        let mut page_raw: Option<String> = None;
        let mut size_raw: Option<String> = None;
        let mut sort = Vec::new();

        for (key, value) in form_urlencoded::parse(query.as_bytes()) {
            match key.as_ref() {
                "page" if page_raw.is_none() => page_raw = Some(value.into_owned()),
                "size" if size_raw.is_none() => size_raw = Some(value.into_owned()),
                "sort" => sort.extend(Sort::parse(&value)),
                _ => {}
            }
        }

        let page = page_raw
            .and_then(|p| p.trim().parse::<i64>().ok())
            .filter(|p| *p >= 0)
            .unwrap_or(opts.page);

        let size = size_raw
            .and_then(|s| s.trim().parse::<i64>().ok())
            .unwrap_or(opts.page_size);

        // A page whose offset does not fit in i64 is as garbled as "abc".
        if page > 0 && size > 0 && (page - 1).checked_mul(size).is_none() {
            return Page {
                page: opts.page,
                size: opts.page_size,
                sort,
            };
        }

        Page { page, size, sort }
    }

    /// Whether a LIMIT clause applies.
    pub fn is_bounded(&self) -> bool {
        self.page > 0 && self.size > 0
    }

    /// Rows skipped before this page (0 when unbounded). Saturates at
    /// `i64::MAX`, which selects nothing.
    pub fn offset(&self) -> i64 {
        if self.is_bounded() {
            (self.page - 1).saturating_mul(self.size)
        } else {
            0
        }
    }

    /// Wraps a statement with this page's ordering and limit.
    ///
    /// ## Output Shape
    /// ```text
    /// SELECT * FROM ( <stmt> ) AS pagination_table_wrapper
    ///     ORDER BY name ASC,id DESC      (when sorts are present)
    ///     LIMIT 20,10                    (MySql)
    ///     LIMIT 10 OFFSET 20             (Postgres, Sqlite)
    /// ```
    ///
    /// Sort fields that are not plain identifiers are dropped rather than
    /// spliced into the SQL.
    pub fn wrap(&self, dialect: Dialect, stmt: &str) -> String {
        let mut parts = vec![
            "SELECT * FROM (".to_string(),
            stmt.to_string(),
            ") AS pagination_table_wrapper".to_string(),
        ];

        let orders: Vec<String> = self
            .sort
            .iter()
            .filter(|s| s.is_safe())
            .map(|s| format!("{} {}", s.field, s.dir))
            .collect();
        if !orders.is_empty() {
            parts.push(format!("ORDER BY {}", orders.join(",")));
        }

        if self.is_bounded() {
            let limit = match dialect {
                Dialect::MySql => format!("LIMIT {},{}", self.offset(), self.size),
                Dialect::Postgres | Dialect::Sqlite => {
                    format!("LIMIT {} OFFSET {}", self.size, self.offset())
                }
            };
            parts.push(limit);
        }

        parts.join(" ")
    }

    /// Adds `limit` and `offset` parameters for templates that spell out
    /// `LIMIT :limit OFFSET :offset` themselves.
    pub fn bind_into(&self, params: &mut Params) {
        params.insert("limit", self.size);
        params.insert("offset", self.offset());
    }
}

// =============================================================================
// Unit Tests
// =============================================================================
