//! # Error Handling for Grid Queries
//!
//! Two things can go wrong when a grid asks for a page:
//!
//! - the request itself is invalid (a sort on an in-memory calculation, a
//!   filter on an undeclared field). Every offending field is collected into a
//!   [`GridError::Validation`] and nothing is executed.
//! - the executor fails. The cause is kept in [`ExecutionError`] and logged,
//!   but only a generic message is shown to users.
//!
//! ```rust,ignore
//! async fn books(State(grid): State<Arc<BookGrid>>, url: UrlState) -> Result<Json<GridPage<Value>>, GridError> {
//!     let columns = columns();
//!     let resolved = grid.columns("books", &columns);
//!     let state = GridState::from_url(&url, &resolved, grid.registry(), grid.config());
//!     let options = GridOptions::from_state(columns, &state);
//!     Ok(Json(grid.build_and_execute("books", &options).await?))
//! }
//! ```

use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use sea_orm::DbErr;
use serde::Serialize;
use std::fmt;

/// One rejected field and why.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FieldIssue {
    pub field: String,
    /// Full sentence, already naming the field.
    pub message: String,
}

impl FieldIssue {
    pub fn new(field: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            field: field.into(),
            message: message.into(),
        }
    }
}

impl fmt::Display for FieldIssue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.message)
    }
}

/// Why the executor could not produce rows.
#[derive(Debug)]
pub enum ExecutionError {
    Database(DbErr),
    Timeout,
    Other(String),
}

impl fmt::Display for ExecutionError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Database(err) => write!(f, "database error: {err}"),
            Self::Timeout => f.write_str("query timed out"),
            Self::Other(message) => f.write_str(message),
        }
    }
}

impl std::error::Error for ExecutionError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::Database(err) => Some(err),
            _ => None,
        }
    }
}

impl From<DbErr> for ExecutionError {
    fn from(err: DbErr) -> Self {
        Self::Database(err)
    }
}

/// Lookup of an unregistered filter kind.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RegistryError {
    NotFound(String),
}

impl fmt::Display for RegistryError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::NotFound(kind) => write!(f, "filter kind '{kind}' is not registered"),
        }
    }
}

impl std::error::Error for RegistryError {}

#[derive(Debug)]
pub enum GridError {
    /// 422 Unprocessable Entity - the request names fields it may not use
    Validation {
        /// Every rejected field, in request order
        issues: Vec<FieldIssue>,
    },

    /// 500 Internal Server Error - executor failure (details logged, not exposed)
    Execution {
        /// User-facing generic message
        message: String,
        /// Internal error (logged, not sent to user)
        internal: ExecutionError,
    },
}

impl GridError {
    #[must_use]
    pub fn validation(issues: Vec<FieldIssue>) -> Self {
        Self::Validation { issues }
    }

    #[must_use]
    pub fn execution(internal: ExecutionError) -> Self {
        Self::Execution {
            message: "Failed to load data".to_string(),
            internal,
        }
    }

    #[must_use]
    pub fn status_code(&self) -> StatusCode {
        match self {
            Self::Validation { .. } => StatusCode::UNPROCESSABLE_ENTITY,
            Self::Execution { .. } => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    /// Sanitized message, safe to show to users.
    #[must_use]
    pub fn user_message(&self) -> String {
        match self {
            Self::Validation { issues } => {
                let reasons: Vec<String> = issues.iter().map(ToString::to_string).collect();
                format!("Invalid grid query: {}", reasons.join("; "))
            }
            Self::Execution { message, .. } => message.clone(),
        }
    }

    /// Fields rejected by validation; empty for execution failures.
    #[must_use]
    pub fn issues(&self) -> &[FieldIssue] {
        match self {
            Self::Validation { issues } => issues,
            Self::Execution { .. } => &[],
        }
    }

    pub(crate) fn log_internal(&self) {
        match self {
            Self::Execution { internal, .. } => {
                tracing::error!(error = %internal, "Grid query execution failed");
            }
            Self::Validation { .. } => {
                tracing::debug!(error = %self.user_message(), "Grid query rejected");
            }
        }
    }
}

#[derive(Serialize)]
struct ErrorResponse {
    error: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    details: Option<Vec<String>>,
}

impl IntoResponse for GridError {
    fn into_response(self) -> Response {
        self.log_internal();

        let status = self.status_code();
        let response = match &self {
            Self::Validation { issues } => ErrorResponse {
                error: "Invalid grid query".to_string(),
                details: Some(issues.iter().map(ToString::to_string).collect()),
            },
            Self::Execution { message, .. } => ErrorResponse {
                error: message.clone(),
                details: None,
            },
        };

        (status, Json(response)).into_response()
    }
}

impl fmt::Display for GridError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.user_message())
    }
}

impl std::error::Error for GridError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::Execution { internal, .. } => Some(internal),
            Self::Validation { .. } => None,
        }
    }
}

impl From<ExecutionError> for GridError {
    fn from(err: ExecutionError) -> Self {
        Self::execution(err)
    }
}

impl From<DbErr> for GridError {
    fn from(err: DbErr) -> Self {
        Self::execution(ExecutionError::Database(err))
    }
}
