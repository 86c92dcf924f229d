//! The query value threaded through translation, sorting and execution.
//!
//! A [`GridQuery`] is backend-aware but connection-free: it holds a
//! sea-query [`Condition`], the relationship joins the condition needs, the
//! ordering and the page slice. Executors copy it onto a
//! [`SelectStatement`] with [`GridQuery::apply_to_statement`].

use sea_orm::{
    Condition, DatabaseBackend,
    sea_query::{
        Alias, Asterisk, ConditionExpression, Expr, JoinType, Order, Query, SelectStatement,
        SimpleExpr,
    },
};
use serde_json::{Map, Value};

/// Largest limit or offset handed to the database; drivers bind them as
/// signed 64-bit integers.
pub const MAX_SLICE_BOUND: u64 = i64::MAX.unsigned_abs();

/// One `LEFT JOIN` needed to reach a related resource.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct JoinStep {
    /// Alias of the joined table, e.g. `author__company`.
    pub alias: String,
    /// Alias (or table name) the join hangs off.
    pub parent_alias: String,
    pub table: String,
    pub source_key: String,
    pub target_key: String,
}

#[derive(Debug, Clone)]
pub struct GridQuery {
    resource: String,
    backend: DatabaseBackend,
    condition: Condition,
    joins: Vec<JoinStep>,
    order: Vec<(SimpleExpr, Order)>,
    limit: Option<u64>,
    offset: Option<u64>,
    count_total: bool,
    context: Option<Value>,
    extra: Map<String, Value>,
}

impl GridQuery {
    #[must_use]
    pub fn new(resource: impl Into<String>, backend: DatabaseBackend) -> Self {
        Self {
            resource: resource.into(),
            backend,
            condition: Condition::all(),
            joins: Vec::new(),
            order: Vec::new(),
            limit: None,
            offset: None,
            count_total: false,
            context: None,
            extra: Map::new(),
        }
    }

    #[must_use]
    pub fn resource(&self) -> &str {
        &self.resource
    }

    #[must_use]
    pub fn backend(&self) -> DatabaseBackend {
        self.backend
    }

    #[must_use]
    pub fn condition(&self) -> &Condition {
        &self.condition
    }

    #[must_use]
    pub fn joins(&self) -> &[JoinStep] {
        &self.joins
    }

    #[must_use]
    pub fn order(&self) -> &[(SimpleExpr, Order)] {
        &self.order
    }

    #[must_use]
    pub fn limit(&self) -> Option<u64> {
        self.limit
    }

    #[must_use]
    pub fn offset(&self) -> Option<u64> {
        self.offset
    }

    /// Whether the executor should also report the unpaginated row count.
    #[must_use]
    pub fn count_total(&self) -> bool {
        self.count_total
    }

    /// Opaque actor/tenant context handed through to the executor.
    #[must_use]
    pub fn context(&self) -> Option<&Value> {
        self.context.as_ref()
    }

    #[must_use]
    pub fn extra(&self) -> &Map<String, Value> {
        &self.extra
    }

    /// Table-qualified column on the base resource.
    #[must_use]
    pub fn column(&self, name: &str) -> SimpleExpr {
        Expr::col((Alias::new(self.resource.as_str()), Alias::new(name))).into()
    }

    /// AND a predicate onto the query.
    #[must_use]
    pub fn filter<C>(mut self, predicate: C) -> Self
    where
        C: Into<ConditionExpression>,
    {
        self.condition = self.condition.add(predicate);
        self
    }

    #[must_use]
    pub fn order_by(mut self, expr: SimpleExpr, order: Order) -> Self {
        self.order.push((expr, order));
        self
    }

    /// Register a join; joins with an alias already present are ignored.
    pub fn join(&mut self, step: JoinStep) {
        if !self.joins.iter().any(|existing| existing.alias == step.alias) {
            self.joins.push(step);
        }
    }

    #[must_use]
    pub fn with_page(mut self, limit: u64, offset: Option<u64>) -> Self {
        self.limit = Some(limit.min(MAX_SLICE_BOUND));
        self.offset = offset.map(|offset| offset.min(MAX_SLICE_BOUND));
        self
    }

    #[must_use]
    pub fn with_count(mut self, count_total: bool) -> Self {
        self.count_total = count_total;
        self
    }

    #[must_use]
    pub fn with_context(mut self, context: Option<Value>) -> Self {
        self.context = context;
        self
    }

    #[must_use]
    pub fn with_extra(mut self, extra: Map<String, Value>) -> Self {
        self.extra = extra;
        self
    }

    /// Joins and the WHERE clause only; used for counting.
    pub fn apply_conditions(&self, stmt: &mut SelectStatement) {
        for step in &self.joins {
            stmt.join_as(
                JoinType::LeftJoin,
                Alias::new(step.table.as_str()),
                Alias::new(step.alias.as_str()),
                Expr::col((
                    Alias::new(step.parent_alias.as_str()),
                    Alias::new(step.source_key.as_str()),
                ))
                .equals((
                    Alias::new(step.alias.as_str()),
                    Alias::new(step.target_key.as_str()),
                )),
            );
        }
        stmt.cond_where(self.condition.clone());
    }

    /// ORDER BY, LIMIT and OFFSET.
    pub fn apply_ordering(&self, stmt: &mut SelectStatement) {
        for (expr, order) in &self.order {
            stmt.order_by_expr(expr.clone(), order.clone());
        }
        if let Some(limit) = self.limit {
            stmt.limit(limit);
        }
        if let Some(offset) = self.offset {
            stmt.offset(offset);
        }
    }

    pub fn apply_to_statement(&self, stmt: &mut SelectStatement) {
        self.apply_conditions(stmt);
        self.apply_ordering(stmt);
    }

    /// `SELECT * FROM <resource> ...` rendered for this query's backend.
    /// Meant for logging and tests.
    #[must_use]
    pub fn to_sql(&self) -> String {
        let mut stmt = Query::select();
        stmt.column(Asterisk).from(Alias::new(self.resource.as_str()));
        self.apply_to_statement(&mut stmt);
        self.backend.build(&stmt).to_string()
    }
}
