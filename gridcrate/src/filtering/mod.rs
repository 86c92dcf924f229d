//! # Filtering, Sorting & Pagination
//!
//! Turns grid state into sea-query predicates, orderings and page slices.
//!
//! ## Main Components
//!
//! - **[`FilterKind`]**: contract for a family of filters (text, select, ...)
//! - **[`FilterRegistry`]**: kind id to [`FilterKind`] lookup, with a shared [`registry::global`] instance
//! - **[`apply_filters`]**: filter values to `WHERE` predicates, including relationship joins and JSON paths
//! - **[`apply_search`]**: global search across searchable columns
//! - **[`toggle`] / [`apply_sort`]**: multi-column sort state and `ORDER BY`
//! - **[`compute_window`] / [`compute_keyset_window`]**: page navigation metadata
//!
//! ## Built-in kinds
//!
//! | Kind           | Raw input             | SQL                                        |
//! |----------------|-----------------------|--------------------------------------------|
//! | `text`         | `dune`                | `UPPER(CAST(col AS TEXT)) LIKE '%DUNE%'`   |
//! | `select`       | `draft`               | `col = 'draft'`                            |
//! | `multi_select` | `draft,published`     | `col IN ('draft', 'published')`            |
//! | `boolean`      | `true`                | `col = TRUE`                               |
//! | `date_range`   | `2024-01-01,`         | `col >= '2024-01-01'`                      |
//! | `number_range` | `10,20`               | `col >= 10 AND col <= 20`                  |
//!
//! Text matching escapes `%`, `_` and `\` in user input, so they only ever
//! match literally.

pub mod builtin;
pub mod conditions;
pub mod joined;
pub mod kinds;
pub mod pagination;
pub mod registry;
pub mod search;
pub mod sort;

pub use builtin::{
    BooleanFilter, DateRangeFilter, MultiSelectFilter, NumberRangeFilter, SelectFilter, TextFilter,
};
pub use conditions::{apply_filters, escape_like_wildcards};
pub use kinds::{
    ColumnMeta, FilterData, FilterKind, FilterMap, FilterOperator, FilterOptions, FilterTarget,
    FilterValue, Number, RawFilterInput,
};
pub use pagination::{
    Cursor, ERROR_WINDOW, KeysetDirection, KeysetWindow, OffsetWindow, PageRequest, PageWindow,
    compute_keyset_window, compute_window, content_range, page_range,
};
pub use registry::FilterRegistry;
pub use search::apply_search;
pub use sort::{SortCycle, SortDirection, SortState, apply_sort, toggle};
