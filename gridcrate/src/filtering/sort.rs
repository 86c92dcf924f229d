use sea_orm::sea_query::Order;
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use super::joined::value_expr;
use crate::capability::{Capability, Denial, ResolvedPath, queryable_path};
use crate::column::{ResolvedColumn, find_column};
use crate::errors::FieldIssue;
use crate::field::parse;
use crate::query::GridQuery;
use crate::schema::SchemaIntrospector;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "lowercase")]
pub enum SortDirection {
    Asc,
    Desc,
}

impl SortDirection {
    #[must_use]
    pub fn reversed(self) -> Self {
        match self {
            Self::Asc => Self::Desc,
            Self::Desc => Self::Asc,
        }
    }

    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Asc => "asc",
            Self::Desc => "desc",
        }
    }
}

impl From<SortDirection> for Order {
    fn from(direction: SortDirection) -> Self {
        match direction {
            SortDirection::Asc => Order::Asc,
            SortDirection::Desc => Order::Desc,
        }
    }
}

/// Ordered sort entries; the first entry is the primary sort.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SortState(Vec<(String, SortDirection)>);

impl SortState {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Append an entry, or update it in place if the field is already sorted.
    #[must_use]
    pub fn with(mut self, field: impl Into<String>, direction: SortDirection) -> Self {
        self.set(field.into(), direction);
        self
    }

    fn set(&mut self, field: String, direction: SortDirection) {
        match self.0.iter_mut().find(|(existing, _)| *existing == field) {
            Some(entry) => entry.1 = direction,
            None => self.0.push((field, direction)),
        }
    }

    #[must_use]
    pub fn get(&self, field: &str) -> Option<SortDirection> {
        self.0
            .iter()
            .find(|(existing, _)| existing == field)
            .map(|(_, direction)| *direction)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, SortDirection)> {
        self.0
            .iter()
            .map(|(field, direction)| (field.as_str(), *direction))
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.0.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl FromIterator<(String, SortDirection)> for SortState {
    fn from_iter<I: IntoIterator<Item = (String, SortDirection)>>(iter: I) -> Self {
        let mut state = Self::new();
        for (field, direction) in iter {
            state.set(field, direction);
        }
        state
    }
}

/// States a column's sort toggle steps through. `None` means unsorted.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SortCycle(Vec<Option<SortDirection>>);

impl SortCycle {
    #[must_use]
    pub fn new(states: Vec<Option<SortDirection>>) -> Self {
        Self(states)
    }

    #[must_use]
    pub fn states(&self) -> &[Option<SortDirection>] {
        &self.0
    }

    /// State after `current`. States missing from the cycle restart it.
    #[must_use]
    pub fn next(&self, current: Option<SortDirection>) -> Option<Option<SortDirection>> {
        let first = *self.0.first()?;
        Some(match self.0.iter().position(|state| *state == current) {
            Some(index) => self.0[(index + 1) % self.0.len()],
            None => first,
        })
    }
}

impl Default for SortCycle {
    fn default() -> Self {
        Self(vec![None, Some(SortDirection::Asc), Some(SortDirection::Desc)])
    }
}

/// Advance `field` to the next state of `cycle`.
///
/// Existing entries keep their position, new entries go last, and an entry
/// whose next state is unsorted is removed. An empty cycle changes nothing.
#[must_use]
pub fn toggle(current: &SortState, field: &str, cycle: &SortCycle) -> SortState {
    let Some(next) = cycle.next(current.get(field)) else {
        return current.clone();
    };
    let mut entries = current.0.clone();
    let position = entries.iter().position(|(existing, _)| existing == field);
    match (position, next) {
        (Some(index), Some(direction)) => entries[index].1 = direction,
        (Some(index), None) => {
            entries.remove(index);
        }
        (None, Some(direction)) => entries.push((field.to_string(), direction)),
        (None, None) => {}
    }
    SortState(entries)
}

/// Add ORDER BY clauses for `sort`.
///
/// Declared columns go through their verdict (or custom sort); other fields
/// are checked against the schema. Rejected entries are reported and skipped.
pub fn apply_sort(
    mut query: GridQuery,
    sort: &SortState,
    columns: &[ResolvedColumn],
    schema: &dyn SchemaIntrospector,
) -> (GridQuery, Vec<FieldIssue>) {
    let mut issues = Vec::new();
    let resource = query.resource().to_string();

    for (field, direction) in sort.iter() {
        let path: ResolvedPath = if let Some(column) = find_column(columns, field) {
            if let Some(custom) = &column.spec.custom_sort {
                query = custom(query, direction);
                continue;
            }
            match (&column.path, column.verdict.sortable) {
                (Some(path), true) => path.clone(),
                _ => {
                    let message = column
                        .verdict
                        .sort_warning
                        .clone()
                        .unwrap_or_else(|| format!("{field} is not sortable"));
                    issues.push(FieldIssue::new(field, message));
                    continue;
                }
            }
        } else {
            match queryable_path(&parse(field), schema, &resource) {
                Ok(path) => path,
                Err(denial) => {
                    issues.push(FieldIssue::new(
                        field,
                        denial.message(field, &resource, Capability::Sort),
                    ));
                    continue;
                }
            }
        };

        let Some(expr) = value_expr(&mut query, &path) else {
            issues.push(FieldIssue::new(
                field,
                Denial::InMemory.message(field, &resource, Capability::Sort),
            ));
            continue;
        };
        query = query.order_by(expr, direction.into());
    }

    (query, issues)
}
