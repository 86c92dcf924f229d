//! Value expressions for resolved field paths.
//!
//! Relationship segments become `LEFT JOIN`s aliased by their relation path
//! (`author`, `author__company`), embedded segments become the backend's JSON
//! extraction function, and expression calculations are inlined.

use sea_orm::{
    DatabaseBackend,
    sea_query::{Alias, Expr, Func, SimpleExpr},
};

use crate::capability::{LeafKind, ResolvedPath};
use crate::query::{GridQuery, JoinStep};
use crate::schema::AttributeType;

/// Alias separator for nested relation joins.
pub const JOIN_ALIAS_SEPARATOR: &str = "__";

/// Register the joins `path` needs on `query` and return the alias of the
/// table owning the leaf.
pub fn join_path(query: &mut GridQuery, path: &ResolvedPath) -> String {
    let mut parent = query.resource().to_string();
    let mut relations: Vec<&str> = Vec::with_capacity(path.hops.len());
    for hop in &path.hops {
        relations.push(&hop.relation);
        let alias = relations.join(JOIN_ALIAS_SEPARATOR);
        query.join(JoinStep {
            alias: alias.clone(),
            parent_alias: parent,
            table: hop.target.resource.clone(),
            source_key: hop.target.source_key.clone(),
            target_key: hop.target.target_key.clone(),
        });
        parent = alias;
    }
    parent
}

/// SQL expression yielding the value `path` points at.
///
/// Paths without a SQL form (see [`ResolvedPath::denial`]) yield `None` and
/// add no joins.
pub fn value_expr(query: &mut GridQuery, path: &ResolvedPath) -> Option<SimpleExpr> {
    if path.denial().is_some() {
        return None;
    }
    let alias = join_path(query, path);
    let base: SimpleExpr = match &path.leaf {
        LeafKind::HostEvaluated => return None,
        LeafKind::Expression(sql) => Expr::cust(sql.as_str()),
        LeafKind::Attribute => {
            Expr::col((Alias::new(alias.as_str()), Alias::new(path.name.as_str()))).into()
        }
    };
    if path.embedded.is_empty() {
        return Some(base);
    }
    let extracted = json_extract(base, &path.embedded, query.backend());
    Some(typed_json_value(
        extracted,
        path.attribute_type.as_ref(),
        query.backend(),
    ))
}

/// Read a key path out of a JSON document column.
#[must_use]
pub fn json_extract(document: SimpleExpr, keys: &[String], backend: DatabaseBackend) -> SimpleExpr {
    match backend {
        DatabaseBackend::Postgres => {
            let mut call = Func::cust(Alias::new("json_extract_path_text"))
                .arg(Expr::expr(document).cast_as(Alias::new("json")));
            for key in keys {
                call = call.arg(key.as_str());
            }
            call.into()
        }
        DatabaseBackend::MySql => Func::cust(Alias::new("JSON_UNQUOTE"))
            .arg(
                Func::cust(Alias::new("JSON_EXTRACT"))
                    .arg(document)
                    .arg(json_path(keys)),
            )
            .into(),
        DatabaseBackend::Sqlite => Func::cust(Alias::new("json_extract"))
            .arg(document)
            .arg(json_path(keys))
            .into(),
    }
}

fn json_path(keys: &[String]) -> String {
    format!("$.{}", keys.join("."))
}

/// Postgres and MySQL extract JSON values as text; cast typed leaves back so
/// range and equality comparisons are numeric.
fn typed_json_value(
    expr: SimpleExpr,
    attribute_type: Option<&AttributeType>,
    backend: DatabaseBackend,
) -> SimpleExpr {
    let sql_type = match (backend, attribute_type) {
        (DatabaseBackend::Sqlite, _) => None,
        (DatabaseBackend::Postgres, Some(AttributeType::Integer)) => Some("BIGINT"),
        (DatabaseBackend::Postgres, Some(AttributeType::Float | AttributeType::Decimal)) => {
            Some("DOUBLE PRECISION")
        }
        (DatabaseBackend::Postgres, Some(AttributeType::Boolean)) => Some("BOOLEAN"),
        (DatabaseBackend::MySql, Some(AttributeType::Integer)) => Some("SIGNED"),
        (DatabaseBackend::MySql, Some(AttributeType::Float | AttributeType::Decimal)) => {
            Some("DOUBLE")
        }
        _ => None,
    };
    match sql_type {
        Some(sql_type) => Expr::expr(expr).cast_as(Alias::new(sql_type)),
        None => expr,
    }
}
