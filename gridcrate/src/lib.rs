//! Filter, sort, paginate and URL-sync data grids on top of Sea-ORM.
//!
//! ```ignore
//! let grid = Grid::new(SeaOrmExecutor::<books::Entity>::new(db), Arc::new(schema));
//! let columns = vec![
//!     ColumnSpec::new("title").sortable().filterable("text").searchable(),
//!     ColumnSpec::new("author.name").sortable(),
//!     ColumnSpec::new("metadata[:genre]").filterable("select"),
//! ];
//! let resolved = grid.columns("books", &columns);
//! let state = GridState::from_url(&url, &resolved, grid.registry(), grid.config());
//! let page = grid.build_and_execute("books", &GridOptions::from_state(columns, &state)).await?;
//! ```

pub mod capability;
pub mod column;
pub mod core;
pub mod errors;
pub mod field;
pub mod filtering;
pub mod models;
pub mod query;
pub mod schema;
pub mod state;
pub mod url_state;

pub use capability::{CapabilityVerdict, resolve};
pub use column::{ColumnSpec, FilterKindSpec, ResolvedColumn, resolve_columns};
pub use crate::core::{Grid, GridLoad, GridOptions, GridPage, QueryExecutor, SeaOrmExecutor};
pub use errors::{ExecutionError, FieldIssue, GridError};
pub use field::FieldRef;
pub use filtering::{FilterKind, FilterRegistry, PageRequest, PageWindow, SortDirection, SortState};
pub use models::{GridConfig, PaginationMode};
pub use query::GridQuery;
pub use schema::{AttributeType, SchemaIntrospector, StaticSchema};
pub use state::{GridEvent, GridState};
pub use url_state::{UrlCodec, UrlState};

// Re-export for custom filter kinds and predicates
pub use sea_orm::sea_query;
