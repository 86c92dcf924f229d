//! Minimal data grid endpoint with Axum
//!
//! ```bash
//! cargo run --example minimal
//! ```
//!
//! Then try:
//! - <http://localhost:3000/todos?sort=-priority>
//! - <http://localhost:3000/todos?filters[title]=milk&filters[completed]=false>
//! - <http://localhost:3000/todos?search=buy&page=2>

use std::env;
use std::sync::Arc;

use axum::extract::State;
use axum::http::HeaderMap;
use axum::routing::get;
use axum::{Json, Router};
use gridcrate::filtering::content_range;
use gridcrate::{
    ColumnSpec, Grid, GridError, GridOptions, GridPage, GridState, PageWindow, SeaOrmExecutor,
    StaticSchema, UrlState,
};
use sea_orm::{ConnectionTrait, Database, DatabaseConnection, entity::prelude::*};
use serde_json::Value;

#[derive(Clone, Debug, PartialEq, DeriveEntityModel, Eq)]
#[sea_orm(table_name = "todos")]
pub struct Model {
    #[sea_orm(primary_key)]
    pub id: i32,
    pub title: String,
    pub priority: i32,
    pub completed: bool,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {}
impl ActiveModelBehavior for ActiveModel {}

type TodoGrid = Grid<SeaOrmExecutor<Entity>>;

fn columns() -> Vec<ColumnSpec> {
    vec![
        ColumnSpec::new("title").sortable().filterable("text").searchable(),
        ColumnSpec::new("priority").sortable().filterable("auto"),
        ColumnSpec::new("completed").filterable("auto"),
    ]
}

async fn list_todos(
    State(grid): State<Arc<TodoGrid>>,
    url: UrlState,
) -> Result<(HeaderMap, Json<GridPage<Value>>), GridError> {
    let columns = columns();
    let resolved = grid.columns("todos", &columns);
    let state = GridState::from_url(&url, &resolved, grid.registry(), grid.config());
    let page = grid
        .build_and_execute("todos", &GridOptions::from_state(columns, &state))
        .await?;
    let headers = match &page.window {
        PageWindow::Offset(window) => content_range(window, "todos"),
        PageWindow::Keyset(_) => HeaderMap::new(),
    };
    Ok((headers, Json(page)))
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let database_url = env::var("DATABASE_URL").unwrap_or_else(|_| "sqlite::memory:".to_string());
    let db: DatabaseConnection = Database::connect(&database_url).await?;

    db.execute_unprepared(
        r"CREATE TABLE IF NOT EXISTS todos (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            title TEXT NOT NULL,
            priority INTEGER NOT NULL,
            completed BOOLEAN NOT NULL
        );
        INSERT INTO todos (title, priority, completed) VALUES
            ('Buy milk', 2, 0),
            ('Buy bread', 1, 1),
            ('Write report', 3, 0),
            ('Call plumber', 5, 0);",
    )
    .await?;

    let mut schema = StaticSchema::new();
    schema.entity::<Entity>();
    let grid = Grid::new(SeaOrmExecutor::new(db), Arc::new(schema));

    let app = Router::new()
        .route("/todos", get(list_todos))
        .with_state(Arc::new(grid));
    let listener = tokio::net::TcpListener::bind("0.0.0.0:3000").await?;
    println!("🚀 Grid: http://0.0.0.0:3000/todos");
    axum::serve(listener, app).await?;
    Ok(())
}
