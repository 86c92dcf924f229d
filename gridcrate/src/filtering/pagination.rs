//! Page windows for offset and keyset pagination.

use std::ops::RangeInclusive;

use axum::http::header::HeaderMap;
use base64::{Engine as _, engine::general_purpose::URL_SAFE_NO_PAD};
use sea_orm::{
    Condition,
    sea_query::{Expr, SimpleExpr},
};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use utoipa::ToSchema;

use super::sort::SortDirection;
use crate::models::DEFAULT_PAGE_SIZE;

/// Navigation metadata for page-number pagination.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
pub struct OffsetWindow {
    pub current_page: u64,
    pub page_size: u64,
    pub total_count: u64,
    pub total_pages: u64,
    pub has_next: bool,
    pub has_previous: bool,
    /// One-based index of the first row shown, 0 when the page is empty.
    pub start_index: u64,
    pub end_index: u64,
}

/// Window reported whenever execution fails.
pub const ERROR_WINDOW: OffsetWindow = OffsetWindow {
    current_page: 1,
    page_size: DEFAULT_PAGE_SIZE,
    total_count: 0,
    total_pages: 1,
    has_next: false,
    has_previous: false,
    start_index: 0,
    end_index: 0,
};

/// Offset window for `result_count` rows shown on `current_page`.
///
/// The requested page is taken literally; an out-of-range page yields a
/// window without a next page and no rows.
#[must_use]
pub fn compute_window(
    result_count: u64,
    current_page: u64,
    page_size: u64,
    total_count: u64,
) -> OffsetWindow {
    let current_page = current_page.max(1);
    let page_size = page_size.max(1);
    let total_pages = total_count.div_ceil(page_size).max(1);
    let (start_index, end_index) = if result_count == 0 {
        (0, 0)
    } else {
        let start = page_offset(current_page, page_size).saturating_add(1);
        let end = start.saturating_add(result_count - 1).min(total_count);
        (start, end)
    };
    OffsetWindow {
        current_page,
        page_size,
        total_count,
        total_pages,
        has_next: current_page < total_pages,
        has_previous: current_page > 1,
        start_index,
        end_index,
    }
}

/// Page numbers around `current_page`, clipped to `1..=total_pages`.
#[must_use]
pub fn page_range(current_page: u64, total_pages: u64, radius: u64) -> RangeInclusive<u64> {
    let total_pages = total_pages.max(1);
    let current_page = current_page.clamp(1, total_pages);
    current_page.saturating_sub(radius).max(1)..=(current_page + radius).min(total_pages)
}

/// Row offset of the first row on `page`.
#[must_use]
pub fn page_offset(page: u64, page_size: u64) -> u64 {
    page.saturating_sub(1).saturating_mul(page_size)
}

/// Sort key values of a boundary row, carried in URLs as an opaque token.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Cursor(pub Vec<Value>);

impl Cursor {
    /// URL-safe base64 of the JSON array.
    #[must_use]
    pub fn encode(&self) -> String {
        serde_json::to_vec(&self.0)
            .map(|bytes| URL_SAFE_NO_PAD.encode(bytes))
            .unwrap_or_default()
    }

    /// `None` for anything that is not a token produced by [`Cursor::encode`].
    #[must_use]
    pub fn decode(token: &str) -> Option<Self> {
        let bytes = URL_SAFE_NO_PAD.decode(token.trim()).ok()?;
        let values: Vec<Value> = serde_json::from_slice(&bytes).ok()?;
        (!values.is_empty()).then_some(Self(values))
    }
}

/// Which page the caller asked for.
#[derive(Debug, Clone, PartialEq)]
pub enum PageRequest {
    /// One-based page number (offset mode).
    Page(u64),
    /// Rows after this cursor (keyset mode).
    After(Cursor),
    /// Rows before this cursor (keyset mode).
    Before(Cursor),
}

impl Default for PageRequest {
    fn default() -> Self {
        Self::Page(1)
    }
}

impl PageRequest {
    #[must_use]
    pub fn first() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn is_first(&self) -> bool {
        matches!(self, Self::Page(1))
    }
}

/// Navigation metadata for cursor pagination. There is no total.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
pub struct KeysetWindow {
    pub forward_cursor: Option<String>,
    pub backward_cursor: Option<String>,
    pub has_next: bool,
    pub has_previous: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum KeysetDirection {
    /// First page, no cursor.
    Start,
    Forward,
    Backward,
}

impl KeysetDirection {
    #[must_use]
    pub fn of(page: &PageRequest) -> Self {
        match page {
            PageRequest::Page(_) => Self::Start,
            PageRequest::After(_) => Self::Forward,
            PageRequest::Before(_) => Self::Backward,
        }
    }
}

/// Keyset window from an over-fetched result.
///
/// `fetched` is the row count before the sentinel row was dropped. `first`
/// and `last` are the cursors of the first and last rows shown.
#[must_use]
pub fn compute_keyset_window(
    fetched: usize,
    page_size: u64,
    direction: KeysetDirection,
    first: Option<&Cursor>,
    last: Option<&Cursor>,
) -> KeysetWindow {
    let more = u64::try_from(fetched).unwrap_or(u64::MAX) > page_size;
    let (has_next, has_previous) = match direction {
        KeysetDirection::Start => (more, false),
        KeysetDirection::Forward => (more, true),
        KeysetDirection::Backward => (true, more),
    };
    let forward_cursor = last.filter(|_| has_next).map(Cursor::encode);
    let backward_cursor = first.filter(|_| has_previous).map(Cursor::encode);
    KeysetWindow {
        has_next: forward_cursor.is_some(),
        has_previous: backward_cursor.is_some(),
        forward_cursor,
        backward_cursor,
    }
}

/// Rows strictly past `values` in the order given by `keys`:
/// `(k1 > v1) OR (k1 = v1 AND k2 > v2) OR ...`, with `<` for descending keys.
#[must_use]
pub fn keyset_condition(keys: &[(SimpleExpr, SortDirection)], values: &[Value]) -> Condition {
    let mut any = Condition::any();
    for (index, ((expr, direction), value)) in keys.iter().zip(values).enumerate() {
        let mut all = Condition::all();
        for ((prefix, _), prefix_value) in keys.iter().zip(values).take(index) {
            all = all.add(Expr::expr(prefix.clone()).eq(json_to_value(prefix_value)));
        }
        let bound = json_to_value(value);
        all = all.add(match direction {
            SortDirection::Asc => Expr::expr(expr.clone()).gt(bound),
            SortDirection::Desc => Expr::expr(expr.clone()).lt(bound),
        });
        any = any.add(all);
    }
    any
}

/// Bind a JSON scalar taken from a row.
#[must_use]
pub fn json_to_value(value: &Value) -> sea_orm::Value {
    match value {
        Value::Bool(flag) => (*flag).into(),
        Value::Number(number) => number
            .as_i64()
            .map(sea_orm::Value::from)
            .or_else(|| number.as_f64().map(sea_orm::Value::from))
            .unwrap_or_else(|| number.to_string().into()),
        Value::String(text) => text.as_str().into(),
        Value::Null => sea_orm::Value::String(None),
        other => other.to_string().into(),
    }
}

/// Window of either pagination mode.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(tag = "mode", rename_all = "snake_case")]
pub enum PageWindow {
    Offset(OffsetWindow),
    Keyset(KeysetWindow),
}

impl PageWindow {
    #[must_use]
    pub fn has_next(&self) -> bool {
        match self {
            Self::Offset(window) => window.has_next,
            Self::Keyset(window) => window.has_next,
        }
    }

    #[must_use]
    pub fn has_previous(&self) -> bool {
        match self {
            Self::Offset(window) => window.has_previous,
            Self::Keyset(window) => window.has_previous,
        }
    }
}

/// Sanitize resource name by removing control characters for HTTP headers
fn sanitize_resource_name(name: &str) -> String {
    name.chars().filter(|c| c.is_ascii() && !c.is_ascii_control()).collect()
}

/// `Content-Range` header for an offset window, zero-based:
/// `books 25-49/120`, or `books */0` for an empty result.
#[must_use]
pub fn content_range(window: &OffsetWindow, resource_name: &str) -> HeaderMap {
    let safe_name = sanitize_resource_name(resource_name);
    let value = if window.start_index == 0 {
        format!("{safe_name} */{}", window.total_count)
    } else {
        format!(
            "{safe_name} {}-{}/{}",
            window.start_index - 1,
            window.end_index - 1,
            window.total_count
        )
    };

    let mut headers = HeaderMap::new();
    if let Ok(value) = value.parse() {
        headers.insert("Content-Range", value);
    }
    headers
}
