//! Turns raw list query parameters into a validated [`TodoQuery`].
//!
//! Paging values are clamped rather than rejected; values that cannot be
//! parsed at all are reported per field.

use serde::Deserialize;

use crate::error::{ApiError, Validator};

pub const DEFAULT_PAGE: i64 = 1;
pub const DEFAULT_LIMIT: i64 = 10;
pub const MAX_LIMIT: i64 = 50;
pub const MAX_SEARCH_LEN: usize = 100;

/// Query string of `GET /todos`, kept as raw strings so that bad values turn
/// into field errors instead of an extractor rejection.
#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ListParams {
    pub page: Option<String>,
    pub limit: Option<String>,
    pub completed: Option<String>,
    pub search: Option<String>,
    pub sort_by: Option<String>,
    pub sort_order: Option<String>,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum SortField {
    #[default]
    CreatedAt,
    Title,
    Priority,
    DueDate,
    Completed,
}

impl SortField {
    fn parse(s: &str) -> Option<Self> {
        match s {
            "createdAt" => Some(SortField::CreatedAt),
            "title" => Some(SortField::Title),
            "priority" => Some(SortField::Priority),
            "dueDate" => Some(SortField::DueDate),
            "completed" => Some(SortField::Completed),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum SortOrder {
    Asc,
    #[default]
    Desc,
}

impl SortOrder {
    pub fn as_sql(self) -> &'static str {
        match self {
            SortOrder::Asc => "ASC",
            SortOrder::Desc => "DESC",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TodoQuery {
    pub page: i64,
    pub limit: i64,
    pub completed: Option<bool>,
    pub search: Option<String>,
    pub sort_by: SortField,
    pub sort_order: SortOrder,
}

impl Default for TodoQuery {
    fn default() -> Self {
        Self {
            page: DEFAULT_PAGE,
            limit: DEFAULT_LIMIT,
            completed: None,
            search: None,
            sort_by: SortField::default(),
            sort_order: SortOrder::default(),
        }
    }
}

fn present(v: Option<String>) -> Option<String> {
    v.map(|s| s.trim().to_string()).filter(|s| !s.is_empty())
}

/// Integers past the `i64` range saturate instead of failing, so they still
/// get clamped like any other out-of-range value.
fn parse_int(raw: &str) -> Option<i64> {
    if let Ok(n) = raw.parse::<i64>() {
        return Some(n);
    }
    let (negative, digits) = match raw.strip_prefix('-') {
        Some(rest) => (true, rest),
        None => (false, raw.strip_prefix('+').unwrap_or(raw)),
    };
    if digits.is_empty() || !digits.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    Some(if negative { i64::MIN } else { i64::MAX })
}

impl TryFrom<ListParams> for TodoQuery {
    type Error = ApiError;

    fn try_from(p: ListParams) -> Result<Self, Self::Error> {
        let mut v = Validator::new();
        let mut q = TodoQuery::default();

        if let Some(raw) = present(p.page) {
            match parse_int(&raw) {
                Some(n) => q.page = n.max(1),
                None => {
                    v.add("page", "page must be an integer");
                }
            }
        }
        if let Some(raw) = present(p.limit) {
            match parse_int(&raw) {
                Some(n) => q.limit = n.clamp(1, MAX_LIMIT),
                None => {
                    v.add("limit", "limit must be an integer");
                }
            }
        }
        if let Some(raw) = present(p.completed) {
            match raw.as_str() {
                "true" => q.completed = Some(true),
                "false" => q.completed = Some(false),
                _ => {
                    v.add("completed", "completed must be true or false");
                }
            }
        }
        if let Some(term) = present(p.search) {
            if term.chars().count() > MAX_SEARCH_LEN {
                v.add(
                    "search",
                    format!("search must be at most {MAX_SEARCH_LEN} characters"),
                );
            } else {
                q.search = Some(term);
            }
        }
        if let Some(raw) = present(p.sort_by) {
            match SortField::parse(&raw) {
                Some(field) => q.sort_by = field,
                None => {
                    v.add(
                        "sortBy",
                        "sortBy must be one of createdAt, title, priority, dueDate, completed",
                    );
                }
            }
        }
        if let Some(raw) = present(p.sort_order) {
            match raw.as_str() {
                "asc" => q.sort_order = SortOrder::Asc,
                "desc" => q.sort_order = SortOrder::Desc,
                _ => {
                    v.add("sortOrder", "sortOrder must be asc or desc");
                }
            }
        }

        v.finish()?;
        Ok(q)
    }
}

impl TodoQuery {
    pub fn offset(&self) -> i64 {
        (self.page - 1).saturating_mul(self.limit)
    }

    /// Never less than one, even for an empty result.
    pub fn total_pages(&self, total: i64) -> i64 {
        let pages = (total + self.limit - 1) / self.limit;
        pages.max(1)
    }

    /// `%term%` with LIKE metacharacters escaped by `\`.
    pub fn search_pattern(&self) -> Option<String> {
        self.search.as_deref().map(|term| {
            let mut out = String::with_capacity(term.len() + 2);
            out.push('%');
            for c in term.chars() {
                if matches!(c, '\\' | '%' | '_') {
                    out.push('\\');
                }
                out.push(c);
            }
            out.push('%');
            out
        })
    }
}
