//! Grid state in the address bar.
//!
//! [`UrlState`] is the flat parameter map as it appears in a query string:
//!
//! ```text
//! ?filters[title]=dune&filters[tags][]=sci-fi&filters[tags][]=classic&sort=author.name,-pages&page=3&search=arrakis
//! ```
//!
//! [`UrlCodec`] converts between that map and typed grid state. Encoding runs
//! every filter value through its kind's encoder. Decoding is defensive: any
//! token that does not validate against the declared columns is dropped and
//! logged at `debug`, never reported as an error.

use std::collections::BTreeMap;
use std::convert::Infallible;

use axum::extract::FromRequestParts;
use axum::http::request::Parts;
use url::form_urlencoded;

use crate::column::{ResolvedColumn, find_column};
use crate::field::{from_url_safe, parse};
use crate::filtering::kinds::{FilterMap, RawFilterInput};
use crate::filtering::pagination::{Cursor, PageRequest};
use crate::filtering::registry::FilterRegistry;
use crate::filtering::sort::{SortDirection, SortState};
use crate::models::MAX_FILTER_VALUE_LENGTH;

const FILTER_PREFIX: &str = "filters[";

/// Raw URL parameters, before any validation.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct UrlState {
    /// Keyed by URL-safe field name.
    pub filters: BTreeMap<String, RawFilterInput>,
    pub sort: Option<String>,
    pub page: Option<String>,
    pub after: Option<String>,
    pub before: Option<String>,
    pub search: Option<String>,
}

impl UrlState {
    /// Ordered key/value pairs, lists expanded into repeated `[]` keys.
    #[must_use]
    pub fn to_pairs(&self) -> Vec<(String, String)> {
        let mut pairs = Vec::new();
        for (key, raw) in &self.filters {
            match raw {
                RawFilterInput::Single(value) => {
                    pairs.push((format!("{FILTER_PREFIX}{key}]"), value.clone()));
                }
                RawFilterInput::Many(values) => {
                    for value in values {
                        pairs.push((format!("{FILTER_PREFIX}{key}][]"), value.clone()));
                    }
                }
            }
        }
        let scalars = [
            ("sort", &self.sort),
            ("page", &self.page),
            ("after", &self.after),
            ("before", &self.before),
            ("search", &self.search),
        ];
        for (key, value) in scalars {
            if let Some(value) = value {
                pairs.push((key.to_string(), value.clone()));
            }
        }
        pairs
    }

    /// Collect pairs; unknown keys are ignored and later values win.
    pub fn from_pairs<I, K, V>(pairs: I) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: AsRef<str>,
        V: Into<String>,
    {
        let mut state = Self::default();
        for (key, value) in pairs {
            let key = key.as_ref();
            let value = value.into();
            if let Some(field) = key.strip_prefix(FILTER_PREFIX) {
                state.push_filter(field, value);
                continue;
            }
            match key {
                "sort" => state.sort = Some(value),
                "page" => state.page = Some(value),
                "after" => state.after = Some(value),
                "before" => state.before = Some(value),
                "search" => state.search = Some(value),
                _ => tracing::debug!(key, "Ignoring unknown URL parameter"),
            }
        }
        state
    }

    fn push_filter(&mut self, field: &str, value: String) {
        if let Some(field) = field.strip_suffix("][]") {
            let entry = self
                .filters
                .entry(field.to_string())
                .or_insert_with(|| RawFilterInput::Many(Vec::new()));
            match entry {
                RawFilterInput::Many(values) => values.push(value),
                RawFilterInput::Single(_) => *entry = RawFilterInput::Many(vec![value]),
            }
        } else if let Some(field) = field.strip_suffix(']') {
            self.filters
                .insert(field.to_string(), RawFilterInput::Single(value));
        } else {
            tracing::debug!(field, "Ignoring malformed filter parameter");
        }
    }

    /// `application/x-www-form-urlencoded` rendering, without the leading `?`.
    #[must_use]
    pub fn to_query_string(&self) -> String {
        let mut serializer = form_urlencoded::Serializer::new(String::new());
        for (key, value) in self.to_pairs() {
            serializer.append_pair(&key, &value);
        }
        serializer.finish()
    }

    /// Parse a query string, with or without the leading `?`.
    #[must_use]
    pub fn from_query_string(query: &str) -> Self {
        let query = query.strip_prefix('?').unwrap_or(query);
        Self::from_pairs(form_urlencoded::parse(query.as_bytes()))
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        *self == Self::default()
    }
}

impl<S> FromRequestParts<S> for UrlState
where
    S: Send + Sync,
{
    type Rejection = Infallible;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        Ok(Self::from_query_string(parts.uri.query().unwrap_or_default()))
    }
}

/// Typed state recovered from a [`UrlState`].
#[derive(Debug, Clone, Default, PartialEq)]
pub struct DecodedState {
    /// Keyed by canonical field notation.
    pub filters: FilterMap,
    pub sort: SortState,
    pub page: PageRequest,
    pub search: Option<String>,
}

/// Encodes and decodes grid state against a filter registry.
#[derive(Debug, Clone, Copy)]
pub struct UrlCodec<'a> {
    registry: &'a FilterRegistry,
    max_value_length: usize,
}

impl<'a> UrlCodec<'a> {
    #[must_use]
    pub fn new(registry: &'a FilterRegistry) -> Self {
        Self {
            registry,
            max_value_length: MAX_FILTER_VALUE_LENGTH,
        }
    }

    /// Longest accepted filter value or search term, in bytes.
    #[must_use]
    pub fn with_max_value_length(mut self, max_value_length: usize) -> Self {
        self.max_value_length = max_value_length;
        self
    }

    #[must_use]
    pub fn encode(
        &self,
        filters: &FilterMap,
        sort: &SortState,
        page: &PageRequest,
        search: Option<&str>,
    ) -> UrlState {
        let mut state = UrlState::default();

        for (field, value) in filters {
            match self.registry.lookup(&value.kind) {
                Ok(kind) => {
                    let raw = kind.encode(value);
                    if !raw.is_blank() {
                        state.filters.insert(parse(field).to_url_safe(), raw);
                    }
                }
                Err(error) => tracing::debug!(field, %error, "Not encoding filter"),
            }
        }

        if !sort.is_empty() {
            let tokens: Vec<String> = sort
                .iter()
                .map(|(field, direction)| {
                    let field = parse(field).to_url_safe();
                    match direction {
                        SortDirection::Asc => field,
                        SortDirection::Desc => format!("-{field}"),
                    }
                })
                .collect();
            state.sort = Some(tokens.join(","));
        }

        match page {
            PageRequest::Page(1) => {}
            PageRequest::Page(page) => state.page = Some(page.to_string()),
            PageRequest::After(cursor) => state.after = Some(cursor.encode()),
            PageRequest::Before(cursor) => state.before = Some(cursor.encode()),
        }

        state.search = search
            .map(str::trim)
            .filter(|term| !term.is_empty())
            .map(str::to_string);
        state
    }

    /// Recover typed state, dropping whatever `columns` does not allow.
    ///
    /// With no columns, sort tokens are kept (converted back from their
    /// URL-safe form) and filters dropped.
    #[must_use]
    pub fn decode(&self, url: &UrlState, columns: &[ResolvedColumn]) -> DecodedState {
        DecodedState {
            filters: self.decode_filters(url, columns),
            sort: decode_sort(url.sort.as_deref(), columns),
            page: decode_page(url),
            search: self.decode_search(url.search.as_deref(), columns),
        }
    }

    fn decode_filters(&self, url: &UrlState, columns: &[ResolvedColumn]) -> FilterMap {
        let mut filters = FilterMap::new();
        for (key, raw) in &url.filters {
            let Some(column) = find_column(columns, key) else {
                tracing::debug!(key, "Dropping filter for undeclared column");
                continue;
            };
            let Some(field) = column.key.clone() else {
                continue;
            };
            match column.process_filter(raw, self.registry, self.max_value_length) {
                Some(value) => {
                    filters.insert(field, value);
                }
                None => tracing::debug!(key, "Dropping invalid filter value"),
            }
        }
        filters
    }

    fn decode_search(&self, search: Option<&str>, columns: &[ResolvedColumn]) -> Option<String> {
        let term = search.map(str::trim).filter(|term| !term.is_empty())?;
        if term.len() > self.max_value_length {
            tracing::debug!(length = term.len(), "Dropping oversized search term");
            return None;
        }
        if !columns.is_empty() && !columns.iter().any(|column| column.spec.searchable) {
            tracing::debug!("Dropping search term, no searchable columns");
            return None;
        }
        Some(term.to_string())
    }
}

fn decode_sort(raw: Option<&str>, columns: &[ResolvedColumn]) -> SortState {
    let Some(raw) = raw else {
        return SortState::new();
    };
    let mut entries = Vec::new();
    for token in raw.split(',').map(str::trim).filter(|token| !token.is_empty()) {
        let (name, direction) = match token.strip_prefix('-') {
            Some(name) => (name, SortDirection::Desc),
            None => (token, SortDirection::Asc),
        };
        if name.is_empty() {
            continue;
        }
        if columns.is_empty() {
            entries.push((from_url_safe(name).to_string(), direction));
            continue;
        }
        match find_column(columns, name) {
            Some(column) if column.verdict.sortable => {
                if let Some(key) = &column.key {
                    entries.push((key.clone(), direction));
                }
            }
            _ => tracing::debug!(token, "Dropping sort token"),
        }
    }
    entries.into_iter().collect()
}

fn decode_page(url: &UrlState) -> PageRequest {
    if let Some(token) = &url.after {
        match Cursor::decode(token) {
            Some(cursor) => return PageRequest::After(cursor),
            None => tracing::debug!(token, "Dropping malformed cursor"),
        }
    }
    if let Some(token) = &url.before {
        match Cursor::decode(token) {
            Some(cursor) => return PageRequest::Before(cursor),
            None => tracing::debug!(token, "Dropping malformed cursor"),
        }
    }
    match url.page.as_deref().map(|page| page.trim().parse::<u64>()) {
        Some(Ok(page)) if page >= 1 => PageRequest::Page(page),
        Some(_) => {
            tracing::debug!(page = ?url.page, "Dropping malformed page");
            PageRequest::first()
        }
        None => PageRequest::first(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::column::{ColumnSpec, resolve_columns};
    use crate::filtering::kinds::{FilterData, FilterOperator, FilterValue, Number};
    use crate::schema::{AttributeType, StaticSchema};
    use proptest::prelude::*;
    use serde_json::json;

    use SortDirection::{Asc, Desc};

    fn columns() -> Vec<ResolvedColumn> {
        let mut schema = StaticSchema::new();
        schema
            .resource("authors")
            .attribute("name", AttributeType::Text);
        schema
            .resource("books")
            .attribute("title", AttributeType::Text)
            .attribute("pages", AttributeType::Integer)
            .attribute("tags", AttributeType::Array(Box::new(AttributeType::Text)))
            .attribute("metadata", AttributeType::Json)
            .relation("author", "authors", "author_id", "id")
            .host_calculation("reading_time");
        resolve_columns(
            &[
                ColumnSpec::new("title").sortable().filterable("text").searchable(),
                ColumnSpec::new("pages").sortable().filterable("auto"),
                ColumnSpec::new("tags").filterable("multi_select"),
                ColumnSpec::new("metadata[:genre]").sortable().filterable("text"),
                ColumnSpec::new("author.name").sortable(),
                ColumnSpec::new("reading_time").sortable(),
            ],
            &schema,
            "books",
        )
    }

    fn encode_decode(
        filters: &FilterMap,
        sort: &SortState,
        page: &PageRequest,
        search: Option<&str>,
    ) -> DecodedState {
        let registry = FilterRegistry::with_builtin();
        let codec = UrlCodec::new(&registry);
        let query = codec.encode(filters, sort, page, search).to_query_string();
        codec.decode(&UrlState::from_query_string(&query), &columns())
    }

    #[test]
    fn test_encode_shapes() {
        let registry = FilterRegistry::with_builtin();
        let mut filters = FilterMap::new();
        filters.insert(
            "metadata[:genre]".into(),
            FilterValue::new("text", FilterData::Text("dune".into()), FilterOperator::Contains),
        );
        filters.insert(
            "pages".into(),
            FilterValue::new(
                "number_range",
                FilterData::NumberRange {
                    min: Some(Number::Int(100)),
                    max: None,
                },
                FilterOperator::Between,
            ),
        );
        let sort = SortState::new().with("author.name", Asc).with("pages", Desc);
        let state = UrlCodec::new(&registry).encode(&filters, &sort, &PageRequest::Page(1), None);

        assert_eq!(
            state.filters.get("metadata__genre"),
            Some(&RawFilterInput::Single("dune".into()))
        );
        assert_eq!(
            state.filters.get("pages"),
            Some(&RawFilterInput::Single("100,".into()))
        );
        assert_eq!(state.sort.as_deref(), Some("author.name,-pages"));
        assert_eq!(state.page, None);
    }

    #[test]
    fn test_round_trip() {
        let registry = FilterRegistry::with_builtin();
        let columns = columns();
        let mut filters = FilterMap::new();
        for (field, raw) in [
            ("title", RawFilterInput::from("dune")),
            ("pages", RawFilterInput::from("10,20")),
            ("tags", RawFilterInput::from("classic,sci-fi")),
            ("metadata[:genre]", RawFilterInput::from("space opera")),
        ] {
            let column = find_column(&columns, field).unwrap();
            let value = column.process_filter(&raw, &registry, 100).unwrap();
            filters.insert(field.to_string(), value);
        }
        let sort = SortState::new()
            .with("metadata[:genre]", Desc)
            .with("title", Asc);
        let page = PageRequest::Page(7);

        let decoded = encode_decode(&filters, &sort, &page, Some("arrakis"));
        assert_eq!(decoded.filters, filters);
        assert_eq!(decoded.sort, sort);
        assert_eq!(decoded.page, page);
        assert_eq!(decoded.search.as_deref(), Some("arrakis"));
    }

    #[test]
    fn test_cursor_round_trip() {
        let cursor = Cursor(vec![json!("Dune"), json!(42)]);
        let decoded = encode_decode(
            &FilterMap::new(),
            &SortState::new(),
            &PageRequest::Before(cursor.clone()),
            None,
        );
        assert_eq!(decoded.page, PageRequest::Before(cursor));
    }

    #[test]
    fn test_decode_drops_invalid_tokens() {
        let registry = FilterRegistry::with_builtin();
        let url = UrlState::from_query_string(
            "filters[pages]=ten,20&filters[ghost]=x&filters[title]=%20&\
             sort=reading_time,-ghost,title,-tags&page=zero&after=%%%",
        );
        let decoded = UrlCodec::new(&registry).decode(&url, &columns());
        assert!(decoded.filters.is_empty());
        assert_eq!(decoded.sort, SortState::new().with("title", Asc));
        assert_eq!(decoded.page, PageRequest::first());
        assert_eq!(decoded.search, None);
    }

    #[test]
    fn test_empty_columns_keep_sort_verbatim() {
        let registry = FilterRegistry::with_builtin();
        let url = UrlState::from_query_string("sort=ghost,-reading_time&filters[title]=dune");
        let decoded = UrlCodec::new(&registry).decode(&url, &[]);
        assert_eq!(
            decoded.sort,
            SortState::new().with("ghost", Asc).with("reading_time", Desc)
        );
        assert!(decoded.filters.is_empty());

        let url = UrlState::from_query_string("sort=-metadata__genre,author.profile__city");
        let decoded = UrlCodec::new(&registry).decode(&url, &[]);
        assert_eq!(
            decoded.sort,
            SortState::new()
                .with("metadata[:genre]", Desc)
                .with("author.profile[:city]", Asc)
        );
    }

    #[test]
    fn test_declared_column_with_reserved_separator_round_trips() {
        let mut schema = StaticSchema::new();
        schema.resource("books").attribute("metadata", AttributeType::Json);
        let columns = resolve_columns(
            &[ColumnSpec::new("metadata[:first__name]").sortable()],
            &schema,
            "books",
        );
        let registry = FilterRegistry::with_builtin();
        let codec = UrlCodec::new(&registry);
        let sort = SortState::new().with("metadata[:first__name]", Desc);
        let url = codec.encode(&FilterMap::new(), &sort, &PageRequest::first(), None);
        assert_eq!(url.sort.as_deref(), Some("-metadata__first__name"));
        assert_eq!(codec.decode(&url, &columns).sort, sort);
    }

    #[test]
    fn test_oversized_filter_is_dropped() {
        let registry = FilterRegistry::with_builtin();
        let url = UrlState::from_pairs([("filters[title]", "x".repeat(20))]);
        let decoded = UrlCodec::new(&registry)
            .with_max_value_length(10)
            .decode(&url, &columns());
        assert!(decoded.filters.is_empty());
    }

    #[test]
    fn test_list_parameters() {
        let url = UrlState::from_query_string("filters[tags][]=a&filters[tags][]=b&filters[x=1");
        assert_eq!(
            url.filters.get("tags"),
            Some(&RawFilterInput::Many(vec!["a".into(), "b".into()]))
        );
        assert_eq!(url.filters.len(), 1);
        let rendered = url.to_query_string();
        assert_eq!(rendered, "filters%5Btags%5D%5B%5D=a&filters%5Btags%5D%5B%5D=b");
        assert_eq!(UrlState::from_query_string(&rendered), url);
    }

    #[tokio::test]
    async fn test_extractor_reads_query() {
        let request = axum::http::Request::builder()
            .uri("/books?sort=-title&search=dune")
            .body(())
            .unwrap();
        let (mut parts, ()) = request.into_parts();
        let state = UrlState::from_request_parts(&mut parts, &()).await.unwrap();
        assert_eq!(state.sort.as_deref(), Some("-title"));
        assert_eq!(state.search.as_deref(), Some("dune"));
    }

    fn sortable_field() -> impl Strategy<Value = &'static str> {
        prop_oneof![
            Just("title"),
            Just("pages"),
            Just("metadata[:genre]"),
            Just("author.name"),
        ]
    }

    proptest! {
        #[test]
        fn prop_sort_and_page_round_trip(
            entries in proptest::collection::vec((sortable_field(), any::<bool>()), 0..4),
            page in 1u64..10_000,
            term in "[a-z]{1,12}",
        ) {
            let sort: SortState = entries
                .into_iter()
                .map(|(field, desc)| (field.to_string(), if desc { Desc } else { Asc }))
                .collect();
            let page = PageRequest::Page(page);
            let decoded = encode_decode(&FilterMap::new(), &sort, &page, Some(&term));
            prop_assert_eq!(decoded.sort, sort);
            prop_assert_eq!(decoded.page, page);
            prop_assert_eq!(decoded.search, Some(term));
        }

        #[test]
        fn prop_decode_never_panics(query in ".{0,80}") {
            let registry = FilterRegistry::with_builtin();
            let url = UrlState::from_query_string(&query);
            let _ = UrlCodec::new(&registry).decode(&url, &columns());
        }
    }
}
