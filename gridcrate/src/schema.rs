//! Resource schema introspection.
//!
//! The engine never talks to a database catalogue directly. It asks a
//! [`SchemaIntrospector`] three questions: does an attribute exist (and with
//! what type), where does a relation lead, and is a name a calculation.
//! [`StaticSchema`] is an in-memory implementation that can be filled by hand
//! or straight from Sea-ORM entities.

use std::collections::{BTreeMap, HashMap};

use sea_orm::{ColumnTrait, ColumnType, EntityTrait, IdenStatic, Iterable, PrimaryKeyToColumn};

/// Declared type of an attribute, as far as filtering and sorting care.
#[derive(Debug, Clone, PartialEq)]
pub enum AttributeType {
    Text,
    Uuid,
    Integer,
    Float,
    Decimal,
    Boolean,
    Date,
    DateTime,
    /// Enumerated string values.
    Enum(Vec<String>),
    /// List-valued column.
    Array(Box<AttributeType>),
    /// Schemaless document; any embedded key path is accepted.
    Json,
    /// Document with declared keys.
    Map(BTreeMap<String, AttributeType>),
}

impl AttributeType {
    #[must_use]
    pub fn is_integer(&self) -> bool {
        matches!(self, Self::Integer)
    }

    #[must_use]
    pub fn is_numeric(&self) -> bool {
        matches!(self, Self::Integer | Self::Float | Self::Decimal)
    }

    /// Whether bracket access (`container[:leaf]`) can be applied.
    #[must_use]
    pub fn is_document(&self) -> bool {
        matches!(self, Self::Json | Self::Map(_))
    }

    /// Type of `path` inside this document, if it resolves.
    ///
    /// Schemaless documents yield [`AttributeType::Json`] for any path.
    #[must_use]
    pub fn embedded(&self, path: &[String]) -> Option<AttributeType> {
        let mut current = self;
        for key in path {
            match current {
                Self::Json => return Some(Self::Json),
                Self::Map(fields) => current = fields.get(key)?,
                _ => return None,
            }
        }
        Some(current.clone())
    }

    /// Map a Sea-ORM column type onto the types the engine distinguishes.
    #[must_use]
    pub fn from_column_type(column_type: &ColumnType) -> Self {
        match column_type {
            ColumnType::TinyInteger
            | ColumnType::SmallInteger
            | ColumnType::Integer
            | ColumnType::BigInteger
            | ColumnType::TinyUnsigned
            | ColumnType::SmallUnsigned
            | ColumnType::Unsigned
            | ColumnType::BigUnsigned => Self::Integer,
            ColumnType::Float | ColumnType::Double => Self::Float,
            ColumnType::Decimal(_) | ColumnType::Money(_) => Self::Decimal,
            ColumnType::Boolean => Self::Boolean,
            ColumnType::Uuid => Self::Uuid,
            ColumnType::Date => Self::Date,
            ColumnType::DateTime | ColumnType::Timestamp | ColumnType::TimestampWithTimeZone => {
                Self::DateTime
            }
            ColumnType::Json | ColumnType::JsonBinary => Self::Json,
            ColumnType::Enum { variants, .. } => {
                Self::Enum(variants.iter().map(|variant| variant.to_string()).collect())
            }
            ColumnType::Array(inner) => Self::Array(Box::new(Self::from_column_type(inner))),
            _ => Self::Text,
        }
    }
}

/// Where a relation leads and how to join it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RelationTarget {
    /// Target resource (also its table name).
    pub resource: String,
    /// Column on the source resource.
    pub source_key: String,
    /// Column on the target resource.
    pub target_key: String,
}

/// How a calculated field is evaluated.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum CalculationKind {
    /// Not a calculation.
    #[default]
    None,
    /// Database-evaluable SQL expression over the owning resource.
    Expression(String),
    /// Computed after rows are loaded; cannot be pushed into a query.
    HostEvaluated,
}

/// Minimal schema capability the resolver and translator work against.
pub trait SchemaIntrospector: Send + Sync {
    /// Declared type of a stored attribute, `None` if it does not exist.
    fn attribute_type(&self, resource: &str, name: &str) -> Option<AttributeType>;

    fn attribute_exists(&self, resource: &str, name: &str) -> bool {
        self.attribute_type(resource, name).is_some()
    }

    fn relation_target(&self, resource: &str, name: &str) -> Option<RelationTarget>;

    fn calculation_kind(&self, resource: &str, name: &str) -> CalculationKind;

    /// Column used as keyset tiebreaker.
    fn primary_key(&self, resource: &str) -> Option<String> {
        let _ = resource;
        None
    }
}

#[derive(Debug, Clone, Default)]
struct ResourceDef {
    attributes: HashMap<String, AttributeType>,
    relations: HashMap<String, RelationTarget>,
    calculations: HashMap<String, (CalculationKind, Option<AttributeType>)>,
    primary_key: Option<String>,
}

/// Builder for one resource inside a [`StaticSchema`].
#[derive(Debug)]
pub struct ResourceBuilder<'a> {
    def: &'a mut ResourceDef,
}

impl ResourceBuilder<'_> {
    pub fn attribute(&mut self, name: &str, attribute_type: AttributeType) -> &mut Self {
        self.def.attributes.insert(name.to_string(), attribute_type);
        self
    }

    pub fn relation(
        &mut self,
        name: &str,
        target: &str,
        source_key: &str,
        target_key: &str,
    ) -> &mut Self {
        self.def.relations.insert(
            name.to_string(),
            RelationTarget {
                resource: target.to_string(),
                source_key: source_key.to_string(),
                target_key: target_key.to_string(),
            },
        );
        self
    }

    /// Database-evaluable calculation with a result type.
    pub fn expression(&mut self, name: &str, sql: &str, result: AttributeType) -> &mut Self {
        self.def.calculations.insert(
            name.to_string(),
            (CalculationKind::Expression(sql.to_string()), Some(result)),
        );
        self
    }

    /// Calculation that only exists after rows are loaded.
    pub fn host_calculation(&mut self, name: &str) -> &mut Self {
        self.def
            .calculations
            .insert(name.to_string(), (CalculationKind::HostEvaluated, None));
        self
    }

    pub fn primary_key(&mut self, name: &str) -> &mut Self {
        self.def.primary_key = Some(name.to_string());
        self
    }
}

/// In-memory schema.
///
/// ```rust,ignore
/// let mut schema = StaticSchema::new();
/// schema
///     .resource("books")
///     .attribute("title", AttributeType::Text)
///     .relation("author", "authors", "author_id", "id")
///     .host_calculation("reading_time");
/// ```
#[derive(Debug, Clone, Default)]
pub struct StaticSchema {
    resources: HashMap<String, ResourceDef>,
}

impl StaticSchema {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Start (or continue) describing a resource.
    pub fn resource(&mut self, name: &str) -> ResourceBuilder<'_> {
        ResourceBuilder {
            def: self.resources.entry(name.to_string()).or_default(),
        }
    }

    /// Register every column of a Sea-ORM entity under its table name.
    ///
    /// Relations and calculations are added afterwards through
    /// [`StaticSchema::resource`].
    pub fn entity<E>(&mut self) -> ResourceBuilder<'_>
    where
        E: EntityTrait,
    {
        let table = E::default().table_name().to_string();
        let mut builder = self.resource(&table);
        for column in E::Column::iter() {
            let attribute_type = AttributeType::from_column_type(column.def().get_column_type());
            builder.attribute(column.as_str(), attribute_type);
        }
        if let Some(key) = E::PrimaryKey::iter().next() {
            builder.primary_key(key.into_column().as_str());
        }
        builder
    }

    #[must_use]
    pub fn has_resource(&self, resource: &str) -> bool {
        self.resources.contains_key(resource)
    }
}

impl SchemaIntrospector for StaticSchema {
    fn attribute_type(&self, resource: &str, name: &str) -> Option<AttributeType> {
        let def = self.resources.get(resource)?;
        def.attributes
            .get(name)
            .cloned()
            .or_else(|| def.calculations.get(name).and_then(|(_, ty)| ty.clone()))
    }

    fn attribute_exists(&self, resource: &str, name: &str) -> bool {
        self.resources.get(resource).is_some_and(|def| {
            def.attributes.contains_key(name) || def.calculations.contains_key(name)
        })
    }

    fn relation_target(&self, resource: &str, name: &str) -> Option<RelationTarget> {
        self.resources.get(resource)?.relations.get(name).cloned()
    }

    fn calculation_kind(&self, resource: &str, name: &str) -> CalculationKind {
        self.resources
            .get(resource)
            .and_then(|def| def.calculations.get(name))
            .map_or(CalculationKind::None, |(kind, _)| kind.clone())
    }

    fn primary_key(&self, resource: &str) -> Option<String> {
        self.resources.get(resource)?.primary_key.clone()
    }
}
