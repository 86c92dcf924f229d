//! Column declarations and their resolved form.
//!
//! A [`ColumnSpec`] is what the host application declares: which field a
//! column shows and which interactions it asks for. [`resolve_columns`] checks
//! every declaration against the schema once, producing [`ResolvedColumn`]s
//! that the translator, sort controller and URL codec work from.

use std::fmt;
use std::sync::Arc;

use crate::capability::{
    CapabilityVerdict, Overrides, ResolvedPath, resolve_path, resolve_with_overrides,
};
use crate::field::{FieldRef, parse};
use crate::filtering::kinds::{ColumnMeta, FilterOptions, FilterValue, RawFilterInput};
use crate::filtering::registry::{self, FilterRegistry};
use crate::filtering::sort::{SortCycle, SortDirection};
use crate::query::GridQuery;
use crate::schema::{AttributeType, SchemaIntrospector};

/// Replaces standard filter translation for a column.
pub type CustomFilterFn = Arc<dyn Fn(GridQuery, &FilterValue) -> GridQuery + Send + Sync>;

/// Replaces standard ordering for a column.
pub type CustomSortFn = Arc<dyn Fn(GridQuery, SortDirection) -> GridQuery + Send + Sync>;

/// Filter kind declared on a column.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FilterKindSpec {
    /// Inferred from the attribute type.
    Auto,
    Named(String),
}

impl From<&str> for FilterKindSpec {
    fn from(kind: &str) -> Self {
        if kind == "auto" {
            Self::Auto
        } else {
            Self::Named(kind.to_string())
        }
    }
}

/// A grid column as declared by the host application.
#[derive(Clone)]
pub struct ColumnSpec {
    /// `None` for action columns that show no field.
    pub field: Option<FieldRef>,
    pub label: String,
    pub sortable: bool,
    pub filterable: bool,
    pub filter_kind: Option<FilterKindSpec>,
    pub filter_options: FilterOptions,
    pub custom_filter: Option<CustomFilterFn>,
    pub custom_sort: Option<CustomSortFn>,
    pub sort_cycle: SortCycle,
    /// Included in global search.
    pub searchable: bool,
}

impl ColumnSpec {
    /// Column for `field`, labelled from the field name.
    #[must_use]
    pub fn new(field: &str) -> Self {
        let field = parse(field);
        Self {
            label: field.humanize(),
            field: Some(field),
            sortable: false,
            filterable: false,
            filter_kind: None,
            filter_options: FilterOptions::new(),
            custom_filter: None,
            custom_sort: None,
            sort_cycle: SortCycle::default(),
            searchable: false,
        }
    }

    /// Column without a field, e.g. row actions.
    #[must_use]
    pub fn action(label: &str) -> Self {
        Self {
            field: None,
            label: label.to_string(),
            ..Self::new("")
        }
    }

    #[must_use]
    pub fn label(mut self, label: &str) -> Self {
        self.label = label.to_string();
        self
    }

    #[must_use]
    pub fn sortable(mut self) -> Self {
        self.sortable = true;
        self
    }

    /// Request filtering with the given kind id, or `"auto"`.
    #[must_use]
    pub fn filterable(mut self, kind: impl Into<FilterKindSpec>) -> Self {
        self.filterable = true;
        self.filter_kind = Some(kind.into());
        self
    }

    #[must_use]
    pub fn filter_option(mut self, key: &str, value: impl Into<serde_json::Value>) -> Self {
        self.filter_options.set(key, value);
        self
    }

    #[must_use]
    pub fn custom_filter<F>(mut self, filter: F) -> Self
    where
        F: Fn(GridQuery, &FilterValue) -> GridQuery + Send + Sync + 'static,
    {
        self.custom_filter = Some(Arc::new(filter));
        self
    }

    #[must_use]
    pub fn custom_sort<F>(mut self, sort: F) -> Self
    where
        F: Fn(GridQuery, SortDirection) -> GridQuery + Send + Sync + 'static,
    {
        self.custom_sort = Some(Arc::new(sort));
        self
    }

    #[must_use]
    pub fn sort_cycle(mut self, cycle: SortCycle) -> Self {
        self.sort_cycle = cycle;
        self
    }

    #[must_use]
    pub fn searchable(mut self) -> Self {
        self.searchable = true;
        self
    }
}

impl fmt::Debug for ColumnSpec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ColumnSpec")
            .field("field", &self.field)
            .field("label", &self.label)
            .field("sortable", &self.sortable)
            .field("filterable", &self.filterable)
            .field("filter_kind", &self.filter_kind)
            .field("filter_options", &self.filter_options)
            .field("custom_filter", &self.custom_filter.is_some())
            .field("custom_sort", &self.custom_sort.is_some())
            .field("sort_cycle", &self.sort_cycle)
            .field("searchable", &self.searchable)
            .finish()
    }
}

/// A column checked against the schema.
#[derive(Debug, Clone)]
pub struct ResolvedColumn {
    pub spec: ColumnSpec,
    /// Canonical field notation.
    pub key: Option<String>,
    /// URL parameter form of `key`.
    pub url_key: Option<String>,
    pub verdict: CapabilityVerdict,
    /// Walked path, when the field exists.
    pub path: Option<ResolvedPath>,
    /// Effective kind id, with `"auto"` already inferred.
    pub filter_kind: Option<String>,
    /// Column options; kind defaults are layered underneath at use.
    pub filter_options: FilterOptions,
}

impl ResolvedColumn {
    #[must_use]
    pub fn attribute_type(&self) -> Option<&AttributeType> {
        self.path.as_ref().and_then(|path| path.attribute_type.as_ref())
    }

    #[must_use]
    pub fn matches(&self, field: &str) -> bool {
        self.key.as_deref() == Some(field) || self.url_key.as_deref() == Some(field)
    }

    /// Render hint of the effective kind.
    #[must_use]
    pub fn render_hint(&self, registry: &FilterRegistry) -> Option<&'static str> {
        let kind = registry.lookup(self.filter_kind.as_deref()?).ok()?;
        Some(kind.render_hint())
    }

    /// Run raw input through this column's kind.
    ///
    /// Returns `None` for non-filterable columns, unknown kinds, oversized or
    /// empty input, and values the kind rejects.
    #[must_use]
    pub fn process_filter(
        &self,
        raw: &RawFilterInput,
        registry: &FilterRegistry,
        max_len: usize,
    ) -> Option<FilterValue> {
        if !self.verdict.filterable || raw.byte_len() > max_len {
            return None;
        }
        let kind_id = self.filter_kind.as_deref()?;
        let key = self.key.as_deref()?;
        let kind = registry.lookup(kind_id).ok()?;
        if kind.is_empty(raw) {
            return None;
        }
        let options = self.filter_options.merged_over(&kind.default_options());
        let meta = ColumnMeta {
            kind: kind_id,
            field: key,
            options: &options,
            attribute_type: self.attribute_type(),
        };
        let value = kind.process(raw, &meta)?;
        kind.validate(&value).then_some(value)
    }
}

/// Kind id for `"auto"` columns.
#[must_use]
pub fn infer_filter_kind(attribute_type: Option<&AttributeType>) -> &'static str {
    match attribute_type {
        Some(AttributeType::Boolean) => registry::BOOLEAN,
        Some(AttributeType::Integer | AttributeType::Float | AttributeType::Decimal) => {
            registry::NUMBER_RANGE
        }
        Some(AttributeType::Date | AttributeType::DateTime) => registry::DATE_RANGE,
        Some(AttributeType::Enum(_)) => registry::SELECT,
        Some(AttributeType::Array(_)) => registry::MULTI_SELECT,
        _ => registry::TEXT,
    }
}

fn resolve_column(
    spec: &ColumnSpec,
    schema: &dyn SchemaIntrospector,
    resource: &str,
) -> ResolvedColumn {
    let Some(field) = &spec.field else {
        return ResolvedColumn {
            spec: spec.clone(),
            key: None,
            url_key: None,
            verdict: CapabilityVerdict::default(),
            path: None,
            filter_kind: None,
            filter_options: spec.filter_options.clone(),
        };
    };

    let overrides = Overrides {
        custom_sort: spec.custom_sort.is_some(),
        custom_filter: spec.custom_filter.is_some(),
    };
    let verdict = resolve_with_overrides(
        field,
        schema,
        resource,
        spec.sortable,
        spec.filterable,
        overrides,
    );
    let path = resolve_path(field, schema, resource).ok();
    let attribute_type = path.as_ref().and_then(|path| path.attribute_type.as_ref());

    let filter_kind = spec.filter_kind.as_ref().map(|kind| match kind {
        FilterKindSpec::Auto => infer_filter_kind(attribute_type).to_string(),
        FilterKindSpec::Named(id) => id.clone(),
    });

    let mut filter_options = spec.filter_options.clone();
    if let Some(AttributeType::Enum(variants)) = attribute_type {
        let is_choice = matches!(
            filter_kind.as_deref(),
            Some(registry::SELECT | registry::MULTI_SELECT)
        );
        if is_choice && !filter_options.contains("options") {
            filter_options.set("options", variants.clone());
        }
    }

    ResolvedColumn {
        spec: spec.clone(),
        key: Some(field.to_string()),
        url_key: Some(field.to_url_safe()),
        verdict,
        path,
        filter_kind,
        filter_options,
    }
}

/// Resolve every declared column against `resource`.
#[must_use]
pub fn resolve_columns(
    columns: &[ColumnSpec],
    schema: &dyn SchemaIntrospector,
    resource: &str,
) -> Vec<ResolvedColumn> {
    columns
        .iter()
        .map(|spec| resolve_column(spec, schema, resource))
        .collect()
}

/// Column whose canonical or URL-safe key is `field`.
#[must_use]
pub fn find_column<'a>(columns: &'a [ResolvedColumn], field: &str) -> Option<&'a ResolvedColumn> {
    columns.iter().find(|column| column.matches(field))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::filtering::kinds::FilterData;
    use crate::schema::StaticSchema;

    fn schema() -> StaticSchema {
        let mut schema = StaticSchema::new();
        schema
            .resource("books")
            .attribute("title", AttributeType::Text)
            .attribute("pages", AttributeType::Integer)
            .attribute("published", AttributeType::Boolean)
            .attribute("released_on", AttributeType::Date)
            .attribute(
                "status",
                AttributeType::Enum(vec!["draft".into(), "published".into()]),
            )
            .attribute("tags", AttributeType::Array(Box::new(AttributeType::Text)))
            .attribute("metadata", AttributeType::Json)
            .host_calculation("reading_time");
        schema
    }

    #[test]
    fn test_new_column_defaults() {
        let column = ColumnSpec::new("metadata[:first_edition]");
        assert_eq!(column.label, "Metadata > First Edition");
        assert!(!column.sortable && !column.filterable && !column.searchable);
        assert_eq!(column.sort_cycle, SortCycle::default());
    }

    #[test]
    fn test_auto_kind_inference() {
        let schema = schema();
        let specs: Vec<ColumnSpec> = ["title", "pages", "published", "released_on", "status", "tags"]
            .into_iter()
            .map(|field| ColumnSpec::new(field).filterable("auto"))
            .collect();
        let kinds: Vec<Option<String>> = resolve_columns(&specs, &schema, "books")
            .into_iter()
            .map(|column| column.filter_kind)
            .collect();
        let expected = ["text", "number_range", "boolean", "date_range", "select", "multi_select"];
        assert_eq!(
            kinds,
            expected.iter().map(|kind| Some((*kind).to_string())).collect::<Vec<_>>()
        );
    }

    #[test]
    fn test_enum_options_fill_select() {
        let columns = resolve_columns(
            &[ColumnSpec::new("status").filterable("auto")],
            &schema(),
            "books",
        );
        assert_eq!(
            columns[0].filter_options.choices("options"),
            vec!["draft", "published"]
        );
    }

    #[test]
    fn test_url_keys_and_lookup() {
        let columns = resolve_columns(
            &[ColumnSpec::new("metadata[:genre]").filterable("text")],
            &schema(),
            "books",
        );
        assert_eq!(columns[0].key.as_deref(), Some("metadata[:genre]"));
        assert_eq!(columns[0].url_key.as_deref(), Some("metadata__genre"));
        assert!(find_column(&columns, "metadata__genre").is_some());
        assert!(find_column(&columns, "metadata[:genre]").is_some());
        assert!(find_column(&columns, "metadata").is_none());
    }

    #[test]
    fn test_action_column_has_no_capabilities() {
        let columns = resolve_columns(&[ColumnSpec::action("Actions")], &schema(), "books");
        assert!(columns[0].key.is_none());
        assert!(!columns[0].verdict.exists);
        assert!(columns[0].verdict.sort_warning.is_none());
    }

    #[test]
    fn test_process_filter() {
        let registry = FilterRegistry::with_builtin();
        let columns = resolve_columns(
            &[
                ColumnSpec::new("title").filterable("text"),
                ColumnSpec::new("reading_time").filterable("text"),
            ],
            &schema(),
            "books",
        );
        let value = columns[0]
            .process_filter(&"dune".into(), &registry, 100)
            .unwrap();
        assert_eq!(value.kind, "text");
        assert_eq!(value.value, FilterData::Text("dune".into()));

        assert!(columns[0].process_filter(&"".into(), &registry, 100).is_none());
        assert!(columns[0].process_filter(&"x".repeat(101).as_str().into(), &registry, 100).is_none());
        assert!(columns[1].process_filter(&"dune".into(), &registry, 100).is_none());
        assert_eq!(columns[0].render_hint(&registry), Some("text_input"));
    }
}
