use sea_orm::Condition;

use super::conditions::like_predicate;
use super::joined::value_expr;
use super::kinds::FilterOperator;
use crate::column::ResolvedColumn;
use crate::query::GridQuery;

/// Truncate to at most `max_len` bytes on a char boundary.
fn truncate(term: &str, max_len: usize) -> &str {
    if term.len() <= max_len {
        return term;
    }
    let mut end = max_len;
    while !term.is_char_boundary(end) {
        end -= 1;
    }
    &term[..end]
}

/// Global search: a case-insensitive substring match OR-ed across every
/// searchable column that resolves to a queryable path.
///
/// Blank terms and grids without searchable columns leave the query as is.
#[must_use]
pub fn apply_search(
    mut query: GridQuery,
    term: &str,
    columns: &[ResolvedColumn],
    max_len: usize,
) -> GridQuery {
    let term = truncate(term.trim(), max_len).trim();
    if term.is_empty() {
        return query;
    }

    let backend = query.backend();
    let mut any = Condition::any();
    for column in columns.iter().filter(|column| column.spec.searchable) {
        let Some(path) = column.path.as_ref() else {
            continue;
        };
        if let Some(expr) = value_expr(&mut query, path) {
            any = any.add(like_predicate(
                expr,
                backend,
                term,
                FilterOperator::Contains,
                false,
            ));
        }
    }

    if any.is_empty() {
        tracing::debug!(term, "Search ignored, no searchable columns");
        return query;
    }
    query.filter(any)
}
