//! Capability resolution.
//!
//! A column may ask to be sortable and filterable, but the schema gets the
//! final word: requested capabilities are only ever narrowed. Custom
//! predicates are the one way around the schema, since they supply their own
//! query logic.

use serde::Serialize;

use crate::field::FieldRef;
use crate::schema::{AttributeType, CalculationKind, RelationTarget, SchemaIntrospector};

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct CapabilityVerdict {
    pub exists: bool,
    pub sortable: bool,
    pub filterable: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub sort_warning: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub filter_warning: Option<String>,
}

/// Custom query logic declared on a column.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Overrides {
    pub custom_sort: bool,
    pub custom_filter: bool,
}

/// How the final segment of a reference is evaluated.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LeafKind {
    Attribute,
    Expression(String),
    HostEvaluated,
}

/// One relation traversed on the way to the leaf.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Hop {
    pub relation: String,
    pub target: RelationTarget,
}

/// A field reference walked against the schema.
#[derive(Debug, Clone, PartialEq)]
pub struct ResolvedPath {
    pub hops: Vec<Hop>,
    /// Resource owning `name`.
    pub resource: String,
    /// Leaf attribute, or the document container for embedded access.
    pub name: String,
    /// Key path inside the container; empty for plain attributes.
    pub embedded: Vec<String>,
    pub leaf: LeafKind,
    /// Type of the value the reference points at, when known.
    pub attribute_type: Option<AttributeType>,
}

impl ResolvedPath {
    #[must_use]
    pub fn is_host_evaluated(&self) -> bool {
        self.leaf == LeafKind::HostEvaluated
    }

    /// Why the path has no SQL form, if it has none.
    ///
    /// Expression SQL is written against its own resource's table, so it
    /// cannot be evaluated behind a join alias.
    #[must_use]
    pub fn denial(&self) -> Option<Denial> {
        match self.leaf {
            LeafKind::HostEvaluated => Some(Denial::InMemory),
            LeafKind::Expression(_) if !self.hops.is_empty() => Some(Denial::RelatedExpression),
            LeafKind::Expression(_) | LeafKind::Attribute => None,
        }
    }
}

/// Why a reference cannot be pushed into a query.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Denial {
    InvalidSyntax,
    NotFound,
    InMemory,
    RelatedExpression,
}

/// The capability being checked, for messages.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Capability {
    Sort,
    Filter,
}

impl Capability {
    fn participle(self) -> &'static str {
        match self {
            Self::Sort => "sorted",
            Self::Filter => "filtered",
        }
    }
}

impl Denial {
    /// User-facing reason. Always names the full field string.
    #[must_use]
    pub fn message(self, field: &str, resource: &str, capability: Capability) -> String {
        match self {
            Self::InvalidSyntax => format!("{field} is not a valid field reference"),
            Self::NotFound => format!("{field} does not exist on {resource}"),
            Self::InMemory => format!(
                "{field} is an in-memory calculation and cannot be {}",
                capability.participle()
            ),
            Self::RelatedExpression => format!(
                "{field} is a SQL expression on a related resource and cannot be {}",
                capability.participle()
            ),
        }
    }
}

fn split_leaf(field: &FieldRef) -> Option<(&str, Vec<String>)> {
    match field {
        FieldRef::Direct(name) | FieldRef::Relationship { leaf: name, .. } => {
            Some((name.as_str(), Vec::new()))
        }
        FieldRef::Embedded { container, leaf }
        | FieldRef::RelationshipEmbedded {
            container, leaf, ..
        } => Some((container.as_str(), vec![leaf.clone()])),
        FieldRef::NestedEmbedded { container, path }
        | FieldRef::RelationshipNestedEmbedded {
            container, path, ..
        } => Some((container.as_str(), path.clone())),
        FieldRef::Invalid(_) => None,
    }
}

/// Walk `field` from `resource`: relations first, then the leaf.
///
/// # Errors
///
/// [`Denial::InvalidSyntax`] for unparseable references and
/// [`Denial::NotFound`] when any segment is missing. Host-evaluated
/// calculations resolve successfully; callers decide what to do with them.
pub fn resolve_path(
    field: &FieldRef,
    schema: &dyn SchemaIntrospector,
    resource: &str,
) -> Result<ResolvedPath, Denial> {
    let (name, embedded) = split_leaf(field).ok_or(Denial::InvalidSyntax)?;

    let mut current = resource.to_string();
    let mut hops = Vec::new();
    for relation in field.relation_path() {
        let target = schema
            .relation_target(&current, relation)
            .ok_or(Denial::NotFound)?;
        current.clone_from(&target.resource);
        hops.push(Hop {
            relation: relation.clone(),
            target,
        });
    }

    let leaf = match schema.calculation_kind(&current, name) {
        CalculationKind::HostEvaluated => {
            if !embedded.is_empty() {
                return Err(Denial::NotFound);
            }
            return Ok(ResolvedPath {
                hops,
                resource: current,
                name: name.to_string(),
                embedded,
                leaf: LeafKind::HostEvaluated,
                attribute_type: None,
            });
        }
        CalculationKind::Expression(sql) => LeafKind::Expression(sql),
        CalculationKind::None => {
            if !schema.attribute_exists(&current, name) {
                return Err(Denial::NotFound);
            }
            LeafKind::Attribute
        }
    };

    let declared = schema.attribute_type(&current, name);
    let attribute_type = if embedded.is_empty() {
        declared
    } else {
        let container = declared.filter(AttributeType::is_document).ok_or(Denial::NotFound)?;
        Some(container.embedded(&embedded).ok_or(Denial::NotFound)?)
    };

    Ok(ResolvedPath {
        hops,
        resource: current,
        name: name.to_string(),
        embedded,
        leaf,
        attribute_type,
    })
}

/// Whether `field` can be pushed into a query, and the walked path if so.
///
/// # Errors
///
/// The [`Denial`] explaining why the reference cannot be queried.
pub fn queryable_path(
    field: &FieldRef,
    schema: &dyn SchemaIntrospector,
    resource: &str,
) -> Result<ResolvedPath, Denial> {
    let path = resolve_path(field, schema, resource)?;
    match path.denial() {
        Some(denial) => Err(denial),
        None => Ok(path),
    }
}

/// Narrow the requested capabilities of `field` to what `resource` supports.
#[must_use]
pub fn resolve(
    field: &FieldRef,
    schema: &dyn SchemaIntrospector,
    resource: &str,
    requested_sortable: bool,
    requested_filterable: bool,
) -> CapabilityVerdict {
    resolve_with_overrides(
        field,
        schema,
        resource,
        requested_sortable,
        requested_filterable,
        Overrides::default(),
    )
}

/// [`resolve`], with custom predicates re-enabling denied capabilities.
#[must_use]
pub fn resolve_with_overrides(
    field: &FieldRef,
    schema: &dyn SchemaIntrospector,
    resource: &str,
    requested_sortable: bool,
    requested_filterable: bool,
    overrides: Overrides,
) -> CapabilityVerdict {
    let (exists, denial) = match resolve_path(field, schema, resource) {
        Ok(path) => (true, path.denial()),
        Err(denial) => (false, Some(denial)),
    };

    let sortable = requested_sortable && (denial.is_none() || overrides.custom_sort);
    let filterable = requested_filterable && (denial.is_none() || overrides.custom_filter);

    let field_name = field.to_string();
    let warn = |requested: bool, granted: bool, capability: Capability| {
        if !requested || granted {
            return None;
        }
        let message = denial?.message(&field_name, resource, capability);
        tracing::warn!(field = %field_name, resource, "{message}");
        Some(message)
    };

    CapabilityVerdict {
        exists,
        sortable,
        filterable,
        sort_warning: warn(requested_sortable, sortable, Capability::Sort),
        filter_warning: warn(requested_filterable, filterable, Capability::Filter),
    }
}
