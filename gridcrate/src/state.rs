//! Interaction state of a single grid instance.
//!
//! The rendering layer turns user actions into [`GridEvent`]s and folds them
//! into a [`GridState`]. Every transition is pure: it consumes the old state
//! and returns the new one, so events can be replayed and tested without a
//! database.

use crate::column::{ResolvedColumn, find_column};
use crate::filtering::kinds::{FilterMap, RawFilterInput};
use crate::filtering::pagination::PageRequest;
use crate::filtering::registry::FilterRegistry;
use crate::filtering::sort::{SortState, toggle};
use crate::models::GridConfig;
use crate::url_state::{UrlCodec, UrlState};

/// Raw interaction emitted by the rendering layer.
#[derive(Debug, Clone, PartialEq)]
pub enum GridEvent {
    FilterChanged { field: String, raw: RawFilterInput },
    FilterCleared { field: String },
    FiltersCleared,
    SearchChanged(String),
    PageSizeChanged(u64),
    PageChanged(PageRequest),
    SortToggled { field: String },
    /// Reload with unchanged state.
    Refresh,
}

impl GridEvent {
    /// Whether the event moves back to the first page.
    #[must_use]
    pub fn resets_page(&self) -> bool {
        !matches!(self, Self::PageChanged(_) | Self::Refresh)
    }
}

/// Everything needed to rebuild the current page.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct GridState {
    /// Keyed by canonical field notation.
    pub filters: FilterMap,
    pub sort: SortState,
    pub page: PageRequest,
    /// `None` uses the configured default.
    pub page_size: Option<u64>,
    pub search: Option<String>,
}

impl GridState {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Fold one event into the state.
    ///
    /// Filter, search, page-size and sort changes go back to the first page.
    /// Sort is only ever changed by [`GridEvent::SortToggled`], and only for
    /// columns whose verdict allows sorting.
    #[must_use]
    pub fn apply(
        mut self,
        event: GridEvent,
        columns: &[ResolvedColumn],
        registry: &FilterRegistry,
        config: &GridConfig,
    ) -> Self {
        if event.resets_page() {
            self.page = PageRequest::first();
        }
        match event {
            GridEvent::FilterChanged { field, raw } => {
                let processed = find_column(columns, &field).and_then(|column| {
                    let value =
                        column.process_filter(&raw, registry, config.max_filter_value_length)?;
                    Some((column.key.clone()?, value))
                });
                match processed {
                    Some((key, value)) => {
                        self.filters.insert(key, value);
                    }
                    None => self.remove_filter(&field, columns),
                }
            }
            GridEvent::FilterCleared { field } => self.remove_filter(&field, columns),
            GridEvent::FiltersCleared => self.filters.clear(),
            GridEvent::SearchChanged(term) => {
                let term = term.trim();
                self.search = (!term.is_empty()).then(|| term.to_string());
            }
            GridEvent::PageSizeChanged(size) => {
                self.page_size = Some(config.page_size(Some(size)));
            }
            GridEvent::PageChanged(page) => self.page = page,
            GridEvent::SortToggled { field } => match find_column(columns, &field) {
                Some(column) if column.verdict.sortable => {
                    if let Some(key) = &column.key {
                        self.sort = toggle(&self.sort, key, &column.spec.sort_cycle);
                    }
                }
                _ => tracing::debug!(field, "Ignoring sort toggle on unsortable column"),
            },
            GridEvent::Refresh => {}
        }
        self
    }

    fn remove_filter(&mut self, field: &str, columns: &[ResolvedColumn]) {
        let key = find_column(columns, field)
            .and_then(|column| column.key.clone())
            .unwrap_or_else(|| field.to_string());
        self.filters.remove(&key);
    }

    /// State described by URL parameters, validated against `columns`.
    #[must_use]
    pub fn from_url(
        url: &UrlState,
        columns: &[ResolvedColumn],
        registry: &FilterRegistry,
        config: &GridConfig,
    ) -> Self {
        let decoded = UrlCodec::new(registry)
            .with_max_value_length(config.max_filter_value_length)
            .decode(url, columns);
        Self {
            filters: decoded.filters,
            sort: decoded.sort,
            page: decoded.page,
            page_size: None,
            search: decoded.search,
        }
    }

    #[must_use]
    pub fn to_url(&self, registry: &FilterRegistry) -> UrlState {
        UrlCodec::new(registry).encode(
            &self.filters,
            &self.sort,
            &self.page,
            self.search.as_deref(),
        )
    }

    /// Page size after applying the configured default and maximum.
    #[must_use]
    pub fn effective_page_size(&self, config: &GridConfig) -> u64 {
        config.page_size(self.page_size)
    }
}
