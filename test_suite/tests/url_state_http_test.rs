mod common;

use std::sync::Arc;

use axum::body::{Body, to_bytes};
use axum::extract::State;
use axum::http::{HeaderMap, Request, StatusCode};
use axum::routing::get;
use axum::{Json, Router};
use common::{BookGrid, book_columns, init_tracing, setup_grid};
use gridcrate::filtering::content_range;
use gridcrate::{GridConfig, GridError, GridOptions, GridPage, GridState, PageWindow, UrlState};
use serde_json::Value;
use tower::ServiceExt;

type AppState = Arc<BookGrid>;

async fn list_books(
    State(grid): State<AppState>,
    url: UrlState,
) -> Result<(HeaderMap, Json<GridPage<Value>>), GridError> {
    let columns = book_columns();
    let resolved = grid.columns("books", &columns);
    let state = GridState::from_url(&url, &resolved, grid.registry(), grid.config());
    let page = grid
        .build_and_execute("books", &GridOptions::from_state(columns, &state))
        .await?;
    let headers = match &page.window {
        PageWindow::Offset(window) => content_range(window, "books"),
        PageWindow::Keyset(_) => HeaderMap::new(),
    };
    Ok((headers, Json(page)))
}

// No declared columns: URL sort tokens pass through to runtime validation
async fn list_books_raw(
    State(grid): State<AppState>,
    url: UrlState,
) -> Result<Json<GridPage<Value>>, GridError> {
    let state = GridState::from_url(&url, &[], grid.registry(), grid.config());
    let page = grid
        .build_and_execute("books", &GridOptions::from_state(Vec::new(), &state))
        .await?;
    Ok(Json(page))
}

async fn setup_app(config: GridConfig) -> Router {
    let grid = setup_grid(config).await.unwrap();
    Router::new()
        .route("/books", get(list_books))
        .route("/books/raw", get(list_books_raw))
        .with_state(Arc::new(grid))
}

async fn get_json(app: Router, uri: &str) -> (StatusCode, HeaderMap, Value) {
    let response = app
        .oneshot(Request::builder().uri(uri).body(Body::empty()).unwrap())
        .await
        .unwrap();
    let status = response.status();
    let headers = response.headers().clone();
    let body = to_bytes(response.into_body(), usize::MAX).await.unwrap();
    (status, headers, serde_json::from_slice(&body).unwrap())
}

fn ids(body: &Value) -> Vec<i64> {
    body["rows"]
        .as_array()
        .unwrap()
        .iter()
        .filter_map(|row| row["id"].as_i64())
        .collect()
}

#[tokio::test]
async fn test_query_string_drives_filters_sort_and_page() {
    init_tracing();
    let app = setup_app(GridConfig::default()).await;
    let (status, headers, body) = get_json(
        app,
        "/books?filters%5Bauthor.name%5D=banks&sort=-pages&page=1",
    )
    .await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(ids(&body), vec![7, 10, 8, 9]);
    assert_eq!(headers["Content-Range"], "books 0-3/4");
    assert_eq!(body["warnings"].as_array().unwrap().len(), 1);
}

#[tokio::test]
async fn test_invalid_url_values_are_ignored() {
    init_tracing();
    let app = setup_app(GridConfig::default()).await;
    let (status, _, body) = get_json(
        app,
        "/books?filters%5Bpages%5D=abc&filters%5Bghost%5D=1&sort=reading_time,nope&page=zero",
    )
    .await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(ids(&body).len(), 10);
}

#[tokio::test]
async fn test_state_survives_a_url_round_trip() {
    init_tracing();
    let grid = setup_grid(GridConfig::default()).await.unwrap();
    let resolved = grid.columns("books", &book_columns());

    let url = UrlState::from_query_string(
        "filters%5Bpages%5D=300%2C&sort=author.name,-pages&search=dune",
    );
    let state = GridState::from_url(&url, &resolved, grid.registry(), grid.config());
    let again = GridState::from_url(
        &UrlState::from_query_string(&state.to_url(grid.registry()).to_query_string()),
        &resolved,
        grid.registry(),
        grid.config(),
    );
    assert_eq!(state, again);

    let query = state.to_url(grid.registry()).to_query_string();
    let app = Router::new()
        .route("/books", get(list_books))
        .with_state(Arc::new(grid));
    let (_, _, body) = get_json(app, &format!("/books?{query}")).await;
    assert_eq!(ids(&body), vec![3, 1]);
}

#[tokio::test]
async fn test_unsortable_runtime_field_returns_unprocessable() {
    init_tracing();
    let app = setup_app(GridConfig::default()).await;
    let (status, _, body) = get_json(app, "/books/raw?sort=reading_time").await;

    assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
    assert_eq!(body["error"], "Invalid grid query");
    assert!(body["details"][0].as_str().unwrap().contains("reading_time"));
}

#[tokio::test]
async fn test_runtime_sort_on_schema_attribute_is_allowed() {
    init_tracing();
    let app = setup_app(GridConfig::default()).await;
    let (status, _, body) = get_json(app, "/books/raw?sort=-pages").await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(ids(&body)[0], 7);
}

#[tokio::test]
async fn test_huge_page_number_yields_an_empty_page() {
    init_tracing();
    let app = setup_app(GridConfig::default()).await;
    let (status, headers, body) = get_json(app, "/books?page=18446744073709551615").await;

    assert_eq!(status, StatusCode::OK);
    assert!(ids(&body).is_empty());
    assert_eq!(body["window"]["mode"], "offset");
    assert_eq!(body["window"]["current_page"], u64::MAX);
    assert!(!body["window"]["has_next"].as_bool().unwrap());
    assert_eq!(headers["Content-Range"], "books */10");
}
