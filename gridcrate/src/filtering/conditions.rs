use sea_orm::{
    DatabaseBackend,
    sea_query::{Alias, Expr, Func, LikeExpr, SimpleExpr},
};
use uuid::Uuid;

use super::joined::value_expr;
use super::kinds::{FilterMap, FilterOperator, FilterTarget};
use super::registry::FilterRegistry;
use crate::capability::{Capability, Denial};
use crate::column::{ResolvedColumn, find_column};
use crate::errors::FieldIssue;
use crate::query::GridQuery;
use crate::schema::AttributeType;

/// Escape LIKE wildcards so user input only ever matches literally.
/// Escapes: `\` first, then `%` and `_`.
#[must_use]
pub fn escape_like_wildcards(input: &str) -> String {
    input
        .replace('\\', "\\\\")
        .replace('%', "\\%")
        .replace('_', "\\_")
}

/// LIKE pattern for a text operator; `Equals` yields the escaped text alone.
#[must_use]
pub fn like_pattern(text: &str, operator: FilterOperator) -> String {
    let escaped = escape_like_wildcards(text);
    match operator {
        FilterOperator::Contains => format!("%{escaped}%"),
        FilterOperator::StartsWith => format!("{escaped}%"),
        FilterOperator::EndsWith => format!("%{escaped}"),
        _ => escaped,
    }
}

/// Cast any value to the backend's text type.
#[must_use]
pub fn text_cast(expr: SimpleExpr, backend: DatabaseBackend) -> SimpleExpr {
    let text_type = match backend {
        DatabaseBackend::MySql => "CHAR",
        DatabaseBackend::Postgres | DatabaseBackend::Sqlite => "TEXT",
    };
    Expr::expr(expr).cast_as(Alias::new(text_type))
}

/// Substring match on the string form of `expr`.
#[must_use]
pub fn like_predicate(
    expr: SimpleExpr,
    backend: DatabaseBackend,
    text: &str,
    operator: FilterOperator,
    case_sensitive: bool,
) -> SimpleExpr {
    let cast = text_cast(expr, backend);
    if case_sensitive {
        Expr::expr(cast).like(LikeExpr::new(like_pattern(text, operator)).escape('\\'))
    } else {
        Expr::expr(Func::upper(cast))
            .like(LikeExpr::new(like_pattern(&text.to_uppercase(), operator)).escape('\\'))
    }
}

#[must_use]
pub fn upper_eq(expr: SimpleExpr, text: &str) -> SimpleExpr {
    Expr::expr(Func::upper(expr)).eq(text.to_uppercase())
}

/// Bind `raw` with the column's native type so equality never needs a cast.
/// Unparseable input falls back to a string bind.
#[must_use]
pub fn typed_value(attribute_type: Option<&AttributeType>, raw: &str) -> sea_orm::Value {
    let raw = raw.trim();
    match attribute_type {
        Some(AttributeType::Uuid) => Uuid::parse_str(raw).map_or_else(|_| raw.into(), Into::into),
        Some(AttributeType::Integer) => raw.parse::<i64>().map_or_else(|_| raw.into(), Into::into),
        Some(AttributeType::Float | AttributeType::Decimal) => {
            raw.parse::<f64>().map_or_else(|_| raw.into(), Into::into)
        }
        Some(AttributeType::Boolean) => match raw.to_ascii_lowercase().as_str() {
            "true" | "1" => true.into(),
            "false" | "0" => false.into(),
            _ => raw.into(),
        },
        _ => raw.into(),
    }
}

/// Membership test on a list-valued column.
#[must_use]
pub fn array_contains(
    array: SimpleExpr,
    value: sea_orm::Value,
    backend: DatabaseBackend,
) -> SimpleExpr {
    let value = SimpleExpr::Value(value);
    match backend {
        DatabaseBackend::Postgres => Expr::cust_with_exprs("$1 = ANY($2)", [value, array]),
        DatabaseBackend::MySql => {
            Expr::cust_with_exprs("JSON_CONTAINS($1, JSON_ARRAY($2))", [array, value])
        }
        DatabaseBackend::Sqlite => Expr::cust_with_exprs(
            "EXISTS (SELECT 1 FROM json_each($1) WHERE json_each.value = $2)",
            [array, value],
        ),
    }
}

/// Turn applied filter values into predicates on `query`.
///
/// A column's custom filter predicate always wins. Otherwise the column must
/// be filterable and declare a registered kind. Invalid entries are skipped
/// and reported; the rest are still applied.
pub fn apply_filters(
    mut query: GridQuery,
    filters: &FilterMap,
    columns: &[ResolvedColumn],
    registry: &FilterRegistry,
) -> (GridQuery, Vec<FieldIssue>) {
    let mut issues = Vec::new();
    let resource = query.resource().to_string();

    for (field, value) in filters {
        let Some(column) = find_column(columns, field) else {
            issues.push(FieldIssue::new(
                field,
                format!("{field} has no filter kind declared"),
            ));
            continue;
        };

        if let Some(custom) = &column.spec.custom_filter {
            query = custom(query, value);
            continue;
        }

        if !column.verdict.filterable {
            let message = column
                .verdict
                .filter_warning
                .clone()
                .unwrap_or_else(|| format!("{field} is not filterable"));
            issues.push(FieldIssue::new(field, message));
            continue;
        }

        let Some(kind_id) = column.filter_kind.as_deref() else {
            issues.push(FieldIssue::new(
                field,
                format!("{field} has no filter kind declared"),
            ));
            continue;
        };

        let kind = match registry.lookup(kind_id) {
            Ok(kind) => kind,
            Err(err) => {
                issues.push(FieldIssue::new(field, format!("{field}: {err}")));
                continue;
            }
        };

        if !kind.validate(value) {
            issues.push(FieldIssue::new(
                field,
                format!("{field} has an invalid {kind_id} filter value"),
            ));
            continue;
        }

        let Some(expr) = column
            .path
            .as_ref()
            .and_then(|path| value_expr(&mut query, path))
        else {
            issues.push(FieldIssue::new(
                field,
                Denial::InMemory.message(field, &resource, Capability::Filter),
            ));
            continue;
        };

        let target = FilterTarget {
            expr,
            attribute_type: column.attribute_type(),
            backend: query.backend(),
        };
        if let Some(predicate) = kind.predicate(&target, value) {
            query = query.filter(predicate);
        }
    }

    (query, issues)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::column::{ColumnSpec, resolve_columns};
    use crate::filtering::kinds::{FilterData, FilterValue};
    use crate::schema::StaticSchema;

    fn schema() -> StaticSchema {
        let mut schema = StaticSchema::new();
        schema
            .resource("books")
            .attribute("title", AttributeType::Text)
            .attribute("pages", AttributeType::Integer)
            .relation("author", "authors", "author_id", "id")
            .host_calculation("reading_time");
        schema.resource("authors").attribute("name", AttributeType::Text);
        schema
    }

    fn text(value: &str) -> FilterValue {
        FilterValue::new("text", FilterData::Text(value.into()), FilterOperator::Contains)
            .case_sensitive(false)
    }

    #[test]
    fn test_escape_like_wildcards() {
        assert_eq!(escape_like_wildcards("100%"), "100\\%");
        assert_eq!(escape_like_wildcards("a_b"), "a\\_b");
        assert_eq!(escape_like_wildcards("c:\\"), "c:\\\\");
        assert_eq!(like_pattern("ab", FilterOperator::StartsWith), "ab%");
        assert_eq!(like_pattern("ab", FilterOperator::EndsWith), "%ab");
    }

    #[test]
    fn test_typed_value() {
        use sea_orm::Value;
        assert_eq!(typed_value(Some(&AttributeType::Integer), "42"), Value::from(42_i64));
        assert_eq!(typed_value(Some(&AttributeType::Integer), "x"), Value::from("x"));
        assert_eq!(typed_value(Some(&AttributeType::Boolean), "TRUE"), Value::from(true));
        assert_eq!(typed_value(None, " hi "), Value::from("hi"));
    }

    #[test]
    fn test_relationship_filter_adds_join() {
        let schema = schema();
        let columns = resolve_columns(
            &[ColumnSpec::new("author.name").filterable("text")],
            &schema,
            "books",
        );
        let mut filters = FilterMap::new();
        filters.insert("author.name".into(), text("le guin"));

        let query = GridQuery::new("books", DatabaseBackend::Sqlite);
        let (query, issues) = apply_filters(query, &filters, &columns, &FilterRegistry::with_builtin());
        assert!(issues.is_empty(), "{issues:?}");
        let sql = query.to_sql();
        assert!(sql.contains(r#"LEFT JOIN "authors" AS "author""#), "{sql}");
        assert!(sql.contains(r#"UPPER(CAST("author"."name" AS TEXT)) LIKE"#), "{sql}");
    }

    #[test]
    fn test_rejected_fields_are_all_reported() {
        let schema = schema();
        let columns = resolve_columns(
            &[
                ColumnSpec::new("reading_time").filterable("text"),
                ColumnSpec::new("pages").filterable("stars"),
                ColumnSpec::new("title").filterable("text"),
            ],
            &schema,
            "books",
        );
        let mut filters = FilterMap::new();
        filters.insert("reading_time".into(), text("5"));
        filters.insert("pages".into(), text("5"));
        filters.insert("ghost".into(), text("5"));
        filters.insert("title".into(), text("dune"));

        let query = GridQuery::new("books", DatabaseBackend::Sqlite);
        let (query, issues) = apply_filters(query, &filters, &columns, &FilterRegistry::with_builtin());
        let fields: Vec<&str> = issues.iter().map(|issue| issue.field.as_str()).collect();
        assert_eq!(fields, vec!["ghost", "pages", "reading_time"]);
        assert_eq!(
            issues[2].message,
            "reading_time is an in-memory calculation and cannot be filtered"
        );
        assert!(issues[1].message.contains("'stars' is not registered"));
        assert!(query.to_sql().contains(r#""books"."title""#));
    }

    #[test]
    fn test_custom_filter_is_used_unconditionally() {
        let schema = schema();
        let columns = resolve_columns(
            &[ColumnSpec::new("reading_time")
                .filterable("number_range")
                .custom_filter(|query, _value| {
                    let pages = query.column("pages");
                    query.filter(Expr::expr(pages).lte(100))
                })],
            &schema,
            "books",
        );
        let mut filters = FilterMap::new();
        filters.insert("reading_time".into(), text("short"));

        let query = GridQuery::new("books", DatabaseBackend::Sqlite);
        let (query, issues) = apply_filters(query, &filters, &columns, &FilterRegistry::with_builtin());
        assert!(issues.is_empty());
        assert!(query.to_sql().contains(r#""books"."pages" <= 100"#));
    }
}
