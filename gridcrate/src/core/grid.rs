//! The query orchestrator.
//!
//! [`Grid`] ties everything together for one executor: it resolves the
//! column declarations, translates filters, search and sort into a
//! [`GridQuery`], refuses to execute requests that name fields the schema does
//! not allow, runs the query and computes the page window.

use std::ops::RangeInclusive;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use sea_orm::sea_query::SimpleExpr;
use serde::Serialize;
use serde_json::{Map, Value};

use super::executor::QueryExecutor;
use crate::capability::{Capability, Denial, LeafKind, ResolvedPath, queryable_path};
use crate::column::{ColumnSpec, ResolvedColumn, find_column, resolve_columns};
use crate::errors::{FieldIssue, GridError};
use crate::field::parse;
use crate::filtering::conditions::apply_filters;
use crate::filtering::kinds::FilterMap;
use crate::filtering::pagination::{
    Cursor, ERROR_WINDOW, KeysetDirection, OffsetWindow, PageRequest, PageWindow,
    compute_keyset_window, compute_window, keyset_condition, page_offset, page_range,
};
use crate::filtering::registry::{self, FilterRegistry};
use crate::filtering::search::apply_search;
use crate::filtering::sort::{SortDirection, SortState, apply_sort};
use crate::models::{GridConfig, PaginationMode};
use crate::query::GridQuery;
use crate::schema::SchemaIntrospector;
use crate::state::GridState;

/// Token identifying one load request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Generation(u64);

/// Hands out increasing [`Generation`]s; only the latest one is current.
#[derive(Debug, Default)]
pub struct GenerationCounter(AtomicU64);

impl GenerationCounter {
    pub fn next(&self) -> Generation {
        Generation(self.0.fetch_add(1, Ordering::SeqCst) + 1)
    }

    #[must_use]
    pub fn current(&self) -> Generation {
        Generation(self.0.load(Ordering::SeqCst))
    }

    #[must_use]
    pub fn is_current(&self, generation: Generation) -> bool {
        self.current() == generation
    }
}

/// Everything a single load needs besides the resource name.
#[derive(Debug, Clone, Default)]
pub struct GridOptions {
    /// Actor/tenant context, passed through untouched to custom predicates
    /// and the executor.
    pub context: Option<Value>,
    pub columns: Vec<ColumnSpec>,
    /// Keyed by canonical field notation.
    pub filters: FilterMap,
    pub sort: SortState,
    pub search: Option<String>,
    pub page_size: Option<u64>,
    pub page: PageRequest,
    /// Extra query options, passed through like `context`.
    pub extra: Map<String, Value>,
}

impl GridOptions {
    #[must_use]
    pub fn new(columns: Vec<ColumnSpec>) -> Self {
        Self {
            columns,
            ..Self::default()
        }
    }

    /// Options for the current interaction state.
    #[must_use]
    pub fn from_state(columns: Vec<ColumnSpec>, state: &GridState) -> Self {
        Self {
            columns,
            filters: state.filters.clone(),
            sort: state.sort.clone(),
            search: state.search.clone(),
            page_size: state.page_size,
            page: state.page.clone(),
            ..Self::default()
        }
    }

    #[must_use]
    pub fn with_context(mut self, context: Value) -> Self {
        self.context = Some(context);
        self
    }
}

/// One page of results.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct GridPage<Row> {
    pub rows: Vec<Row>,
    pub window: PageWindow,
    /// Capabilities the column declarations asked for but could not get.
    pub warnings: Vec<FieldIssue>,
}

impl<Row> GridPage<Row> {
    fn failed() -> Self {
        Self {
            rows: Vec::new(),
            window: PageWindow::Offset(ERROR_WINDOW),
            warnings: Vec::new(),
        }
    }
}

/// Result of [`Grid::load`]: always a page, plus the error when it failed.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct GridLoad<Row> {
    pub page: GridPage<Row>,
    pub error: Option<String>,
}

struct KeysetKey {
    name: String,
    expr: SimpleExpr,
    direction: SortDirection,
}

enum Paging {
    Offset { page: u64 },
    Keyset { direction: KeysetDirection, keys: Vec<String> },
}

struct Plan {
    page_size: u64,
    paging: Paging,
    warnings: Vec<FieldIssue>,
}

pub struct Grid<X> {
    executor: X,
    schema: Arc<dyn SchemaIntrospector>,
    registry: Arc<FilterRegistry>,
    config: GridConfig,
    generations: GenerationCounter,
}

impl<X> Grid<X>
where
    X: QueryExecutor,
{
    /// Grid using the process-wide filter registry and default config.
    pub fn new(executor: X, schema: Arc<dyn SchemaIntrospector>) -> Self {
        Self {
            executor,
            schema,
            registry: registry::global(),
            config: GridConfig::default(),
            generations: GenerationCounter::default(),
        }
    }

    #[must_use]
    pub fn with_registry(mut self, registry: Arc<FilterRegistry>) -> Self {
        self.registry = registry;
        self
    }

    #[must_use]
    pub fn with_config(mut self, config: GridConfig) -> Self {
        self.config = config;
        self
    }

    pub fn executor(&self) -> &X {
        &self.executor
    }

    pub fn registry(&self) -> &FilterRegistry {
        &self.registry
    }

    pub fn config(&self) -> &GridConfig {
        &self.config
    }

    pub fn schema(&self) -> &dyn SchemaIntrospector {
        self.schema.as_ref()
    }

    /// Resolve column declarations for rendering and URL decoding.
    pub fn columns(&self, resource: &str, specs: &[ColumnSpec]) -> Vec<ResolvedColumn> {
        resolve_columns(specs, self.schema.as_ref(), resource)
    }

    /// Page numbers to offer around the window's current page.
    #[must_use]
    pub fn page_links(&self, window: &OffsetWindow) -> RangeInclusive<u64> {
        page_range(window.current_page, window.total_pages, self.config.page_range_radius)
    }

    /// Start a new load; earlier generations become stale.
    pub fn begin(&self) -> Generation {
        self.generations.next()
    }

    /// The query that [`Grid::build_and_execute`] would run.
    ///
    /// # Errors
    ///
    /// Returns [`GridError::Validation`] naming every filter or sort entry
    /// the schema does not allow.
    pub fn build_query(&self, resource: &str, options: &GridOptions) -> Result<GridQuery, GridError> {
        self.plan(resource, options).map(|(query, _)| query)
    }

    fn plan(&self, resource: &str, options: &GridOptions) -> Result<(GridQuery, Plan), GridError> {
        let schema = self.schema.as_ref();
        let columns = resolve_columns(&options.columns, schema, resource);
        let warnings = column_warnings(&columns);

        let query = GridQuery::new(resource, self.executor.backend())
            .with_context(options.context.clone())
            .with_extra(options.extra.clone());
        let (query, mut issues) = apply_filters(query, &options.filters, &columns, &self.registry);
        let query = match options.search.as_deref() {
            Some(term) => apply_search(query, term, &columns, self.config.max_filter_value_length),
            None => query,
        };

        let page_size = self.config.page_size(options.page_size);
        let (query, paging) = match self.config.pagination {
            PaginationMode::Offset => {
                let (query, sort_issues) = apply_sort(query, &options.sort, &columns, schema);
                issues.extend(sort_issues);
                let page = match &options.page {
                    PageRequest::Page(page) => (*page).max(1),
                    PageRequest::After(_) | PageRequest::Before(_) => {
                        tracing::debug!("Cursor ignored in offset mode");
                        1
                    }
                };
                let query = query
                    .with_page(page_size, Some(page_offset(page, page_size)))
                    .with_count(true);
                (query, Paging::Offset { page })
            }
            PaginationMode::Keyset => {
                let (query, keys, sort_issues) =
                    self.keyset_keys(query, &options.sort, &columns);
                issues.extend(sort_issues);
                keyset_query(query, keys, &options.page, page_size)
            }
        };

        if !issues.is_empty() {
            let error = GridError::validation(issues);
            error.log_internal();
            return Err(error);
        }

        Ok((
            query,
            Plan {
                page_size,
                paging,
                warnings,
            },
        ))
    }

    /// Sort keys for keyset paging: direct attributes only, with the primary
    /// key appended as tiebreaker.
    fn keyset_keys(
        &self,
        mut query: GridQuery,
        sort: &SortState,
        columns: &[ResolvedColumn],
    ) -> (GridQuery, Vec<KeysetKey>, Vec<FieldIssue>) {
        let resource = query.resource().to_string();
        let mut keys = Vec::new();
        let mut issues = Vec::new();

        for (field, direction) in sort.iter() {
            let path = match find_column(columns, field) {
                Some(column) if column.spec.custom_sort.is_some() => Err(format!(
                    "{field} has a custom sort and cannot be used for keyset pagination"
                )),
                Some(column) => match (&column.path, column.verdict.sortable) {
                    (Some(path), true) => Ok(path.clone()),
                    _ => Err(column
                        .verdict
                        .sort_warning
                        .clone()
                        .unwrap_or_else(|| format!("{field} is not sortable"))),
                },
                None => queryable_path(&parse(field), self.schema.as_ref(), &resource)
                    .map_err(|denial| denial.message(field, &resource, Capability::Sort)),
            };
            match path {
                Ok(path) if is_keyset_key(&path) => keys.push(KeysetKey {
                    name: path.name.clone(),
                    expr: query.column(&path.name),
                    direction,
                }),
                Ok(_) => issues.push(FieldIssue::new(
                    field,
                    format!("{field} cannot be used for keyset pagination"),
                )),
                Err(message) => issues.push(FieldIssue::new(field, message)),
            }
        }

        let primary_key = self
            .schema
            .primary_key(&resource)
            .unwrap_or_else(|| self.config.primary_key.clone());
        if !keys.iter().any(|key| key.name == primary_key) {
            if self.schema.attribute_exists(&resource, &primary_key) {
                keys.push(KeysetKey {
                    expr: query.column(&primary_key),
                    name: primary_key,
                    direction: SortDirection::Asc,
                });
            } else {
                issues.push(FieldIssue::new(
                    &primary_key,
                    Denial::NotFound.message(&primary_key, &resource, Capability::Sort),
                ));
            }
        }

        query = query.with_count(false);
        (query, keys, issues)
    }

    /// Build, validate and run the query.
    ///
    /// # Errors
    ///
    /// [`GridError::Validation`] when any requested filter or sort is not
    /// allowed (nothing is executed), [`GridError::Execution`] when the
    /// executor fails.
    pub async fn build_and_execute(
        &self,
        resource: &str,
        options: &GridOptions,
    ) -> Result<GridPage<X::Row>, GridError> {
        let (query, plan) = self.plan(resource, options)?;
        let execution = match self.executor.execute(&query).await {
            Ok(execution) => execution,
            Err(err) => {
                let error = GridError::execution(err);
                error.log_internal();
                return Err(error);
            }
        };

        let Plan {
            page_size,
            paging,
            warnings,
        } = plan;
        let mut rows = execution.rows;
        let window = match paging {
            Paging::Offset { page } => {
                let shown = u64::try_from(rows.len()).unwrap_or(u64::MAX);
                let total = execution.total_count.unwrap_or(shown);
                PageWindow::Offset(compute_window(shown, page, page_size, total))
            }
            Paging::Keyset { direction, keys } => {
                let fetched = rows.len();
                rows.truncate(usize::try_from(page_size).unwrap_or(usize::MAX));
                if direction == KeysetDirection::Backward {
                    rows.reverse();
                }
                let first = rows.first().map(|row| row_cursor(row, &keys));
                let last = rows.last().map(|row| row_cursor(row, &keys));
                PageWindow::Keyset(compute_keyset_window(
                    fetched,
                    page_size,
                    direction,
                    first.as_ref(),
                    last.as_ref(),
                ))
            }
        };

        Ok(GridPage {
            rows,
            window,
            warnings,
        })
    }

    /// Like [`Grid::build_and_execute`], but failures become an empty page
    /// with the error window and a user-facing message.
    pub async fn load(&self, resource: &str, options: &GridOptions) -> GridLoad<X::Row> {
        match self.build_and_execute(resource, options).await {
            Ok(page) => GridLoad { page, error: None },
            Err(error) => GridLoad {
                page: GridPage::failed(),
                error: Some(error.user_message()),
            },
        }
    }

    /// [`Grid::load`] for `generation`; `None` when a newer load has begun
    /// in the meantime.
    pub async fn load_tagged(
        &self,
        generation: Generation,
        resource: &str,
        options: &GridOptions,
    ) -> Option<GridLoad<X::Row>> {
        let load = self.load(resource, options).await;
        if self.generations.is_current(generation) {
            Some(load)
        } else {
            tracing::debug!(
                generation = generation.0,
                current = self.generations.current().0,
                "Discarding stale grid result"
            );
            None
        }
    }
}

fn is_keyset_key(path: &ResolvedPath) -> bool {
    path.hops.is_empty() && path.embedded.is_empty() && path.leaf == LeafKind::Attribute
}

fn keyset_query(
    mut query: GridQuery,
    keys: Vec<KeysetKey>,
    page: &PageRequest,
    page_size: u64,
) -> (GridQuery, Paging) {
    let (direction, cursor) = match page {
        PageRequest::After(cursor) => (KeysetDirection::Forward, Some(cursor)),
        PageRequest::Before(cursor) => (KeysetDirection::Backward, Some(cursor)),
        PageRequest::Page(_) => (KeysetDirection::Start, None),
    };
    let (direction, cursor) = match cursor {
        Some(cursor) if cursor.0.len() != keys.len() => {
            tracing::debug!("Cursor does not match the sort keys, starting over");
            (KeysetDirection::Start, None)
        }
        other => (direction, other),
    };

    let ordered: Vec<(SimpleExpr, SortDirection)> = keys
        .iter()
        .map(|key| {
            let direction = if direction == KeysetDirection::Backward {
                key.direction.reversed()
            } else {
                key.direction
            };
            (key.expr.clone(), direction)
        })
        .collect();

    if let Some(cursor) = cursor {
        query = query.filter(keyset_condition(&ordered, &cursor.0));
    }
    for (expr, direction) in ordered {
        query = query.order_by(expr, direction.into());
    }
    let query = query.with_page(page_size.saturating_add(1), None);
    let names = keys.into_iter().map(|key| key.name).collect();
    (query, Paging::Keyset { direction, keys: names })
}

fn row_cursor<Row: Serialize>(row: &Row, keys: &[String]) -> Cursor {
    let value = serde_json::to_value(row).unwrap_or(Value::Null);
    Cursor(
        keys.iter()
            .map(|key| value.get(key).cloned().unwrap_or(Value::Null))
            .collect(),
    )
}

fn column_warnings(columns: &[ResolvedColumn]) -> Vec<FieldIssue> {
    let mut warnings = Vec::new();
    for column in columns {
        let Some(key) = &column.key else {
            continue;
        };
        for warning in [&column.verdict.sort_warning, &column.verdict.filter_warning]
            .into_iter()
            .flatten()
        {
            if !warnings
                .iter()
                .any(|issue: &FieldIssue| issue.field == *key && issue.message == *warning)
            {
                warnings.push(FieldIssue::new(key, warning));
            }
        }
    }
    warnings
}
