//! Field reference notation.
//!
//! Columns, filters and sort entries address values with a compact string
//! notation:
//!
//! | Notation                         | Variant                                   |
//! |----------------------------------|-------------------------------------------|
//! | `title`                          | [`FieldRef::Direct`]                      |
//! | `author.company.name`            | [`FieldRef::Relationship`]                |
//! | `metadata[:genre]`               | [`FieldRef::Embedded`]                    |
//! | `metadata[:publisher][:city]`    | [`FieldRef::NestedEmbedded`]              |
//! | `author.profile[:bio]`           | [`FieldRef::RelationshipEmbedded`]        |
//! | `author.profile[:links][:site]`  | [`FieldRef::RelationshipNestedEmbedded`]  |
//!
//! Parsing is total: anything that does not fit the grammar becomes
//! [`FieldRef::Invalid`] carrying the original input.

use std::convert::Infallible;
use std::fmt;
use std::str::FromStr;

/// Structured form of a field reference string.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum FieldRef {
    /// A plain attribute on the base resource.
    Direct(String),
    /// An attribute reached through one or more relations.
    Relationship { path: Vec<String>, leaf: String },
    /// A key inside a document-valued attribute.
    Embedded { container: String, leaf: String },
    /// A nested key path inside a document-valued attribute.
    NestedEmbedded { container: String, path: Vec<String> },
    /// A key inside a document-valued attribute of a related resource.
    RelationshipEmbedded {
        relation_path: Vec<String>,
        container: String,
        leaf: String,
    },
    /// A nested key path inside a document-valued attribute of a related resource.
    RelationshipNestedEmbedded {
        relation_path: Vec<String>,
        container: String,
        path: Vec<String>,
    },
    /// Input that matched none of the shapes above, kept verbatim.
    Invalid(String),
}

/// Attribute, relation and container names.
fn is_identifier(name: &str) -> bool {
    let mut chars = name.chars();
    match chars.next() {
        Some(first) if first.is_ascii_alphabetic() || first == '_' => {
            chars.all(|c| c.is_ascii_alphanumeric() || c == '_')
        }
        _ => false,
    }
}

/// Keys inside embedded documents: `[a-z][a-z0-9_]*`.
fn is_embedded_leaf(name: &str) -> bool {
    let mut chars = name.chars();
    match chars.next() {
        Some(first) if first.is_ascii_lowercase() => {
            chars.all(|c| c.is_ascii_lowercase() || c.is_ascii_digit() || c == '_')
        }
        _ => false,
    }
}

/// Parse a run of `[:leaf]` segments. Returns `None` on any malformed segment.
fn parse_brackets(mut rest: &str) -> Option<Vec<String>> {
    let mut leaves = Vec::new();
    while !rest.is_empty() {
        let body = rest.strip_prefix("[:")?;
        let close = body.find(']')?;
        let leaf = &body[..close];
        if !is_embedded_leaf(leaf) {
            return None;
        }
        leaves.push(leaf.to_string());
        rest = &body[close + 1..];
    }
    if leaves.is_empty() { None } else { Some(leaves) }
}

/// Classify a raw field string.
///
/// Leading and trailing whitespace is ignored; whitespace anywhere else makes
/// the reference invalid.
#[must_use]
pub fn parse(raw: &str) -> FieldRef {
    let invalid = || FieldRef::Invalid(raw.to_string());
    let trimmed = raw.trim();
    if trimmed.is_empty() || trimmed.chars().any(char::is_whitespace) {
        return invalid();
    }

    let (head, brackets) = match trimmed.find('[') {
        Some(idx) => (&trimmed[..idx], Some(&trimmed[idx..])),
        None => (trimmed, None),
    };

    let mut segments: Vec<String> = head.split('.').map(str::to_string).collect();
    if !segments.iter().all(|s| is_identifier(s)) {
        return invalid();
    }
    let Some(last) = segments.pop() else {
        return invalid();
    };

    let Some(brackets) = brackets else {
        return if segments.is_empty() {
            FieldRef::Direct(last)
        } else {
            FieldRef::Relationship {
                path: segments,
                leaf: last,
            }
        };
    };

    let Some(mut leaves) = parse_brackets(brackets) else {
        return invalid();
    };
    let container = last;
    match (segments.is_empty(), leaves.len()) {
        (true, 1) => FieldRef::Embedded {
            container,
            leaf: leaves.remove(0),
        },
        (true, _) => FieldRef::NestedEmbedded {
            container,
            path: leaves,
        },
        (false, 1) => FieldRef::RelationshipEmbedded {
            relation_path: segments,
            container,
            leaf: leaves.remove(0),
        },
        (false, _) => FieldRef::RelationshipNestedEmbedded {
            relation_path: segments,
            container,
            path: leaves,
        },
    }
}

/// Byte offsets of `__` separators in a URL-safe segment.
///
/// A separator must be followed by a lowercase letter because embedded keys
/// always start with one; this keeps `data___name` as `data_` + `name`.
fn url_safe_separators(segment: &str) -> Vec<usize> {
    let bytes = segment.as_bytes();
    let mut found = Vec::new();
    let mut i = 1;
    while i + 2 < bytes.len() {
        if bytes[i] == b'_' && bytes[i + 1] == b'_' && bytes[i + 2].is_ascii_lowercase() {
            found.push(i);
            i += 2;
        } else {
            i += 1;
        }
    }
    found
}

/// Inverse of [`FieldRef::to_url_safe`].
///
/// `__` followed by a lowercase letter is reserved as the embedded separator,
/// so names containing it do not survive the round trip:
/// `metadata__first__name` reads back as `metadata[:first][:name]`. Declared
/// columns are matched by their URL key instead and are not affected.
#[must_use]
pub fn from_url_safe(raw: &str) -> FieldRef {
    let (relations, last) = match raw.rfind('.') {
        Some(idx) => (&raw[..=idx], &raw[idx + 1..]),
        None => ("", raw),
    };
    let separators = url_safe_separators(last);
    if separators.is_empty() {
        return parse(raw);
    }

    let mut notation = String::from(relations);
    let mut start = 0;
    for (n, sep) in separators.iter().enumerate() {
        let piece = &last[start..*sep];
        if n == 0 {
            notation.push_str(piece);
        } else {
            notation.push_str(&format!("[:{piece}]"));
        }
        start = sep + 2;
    }
    notation.push_str(&format!("[:{}]", &last[start..]));
    parse(&notation)
}

fn title_case(segment: &str) -> String {
    segment
        .split('_')
        .filter(|word| !word.is_empty())
        .map(|word| {
            let mut chars = word.chars();
            chars.next().map_or_else(String::new, |first| {
                first.to_uppercase().chain(chars).collect()
            })
        })
        .collect::<Vec<_>>()
        .join(" ")
}

impl FieldRef {
    /// Every name along the reference, in traversal order.
    #[must_use]
    pub fn segments(&self) -> Vec<&str> {
        match self {
            Self::Direct(name) => vec![name.as_str()],
            Self::Relationship { path, leaf } => path
                .iter()
                .map(String::as_str)
                .chain(std::iter::once(leaf.as_str()))
                .collect(),
            Self::Embedded { container, leaf } => vec![container.as_str(), leaf.as_str()],
            Self::NestedEmbedded { container, path } => std::iter::once(container.as_str())
                .chain(path.iter().map(String::as_str))
                .collect(),
            Self::RelationshipEmbedded {
                relation_path,
                container,
                leaf,
            } => relation_path
                .iter()
                .map(String::as_str)
                .chain([container.as_str(), leaf.as_str()])
                .collect(),
            Self::RelationshipNestedEmbedded {
                relation_path,
                container,
                path,
            } => relation_path
                .iter()
                .map(String::as_str)
                .chain(std::iter::once(container.as_str()))
                .chain(path.iter().map(String::as_str))
                .collect(),
            Self::Invalid(raw) => vec![raw.as_str()],
        }
    }

    #[must_use]
    pub fn is_valid(&self) -> bool {
        !matches!(self, Self::Invalid(_))
    }

    /// Relations traversed before reaching the leaf (empty for base fields).
    #[must_use]
    pub fn relation_path(&self) -> &[String] {
        match self {
            Self::Relationship { path, .. } => path,
            Self::RelationshipEmbedded { relation_path, .. }
            | Self::RelationshipNestedEmbedded { relation_path, .. } => relation_path,
            _ => &[],
        }
    }

    /// Variant used as a URL parameter key: bracket segments become `__`
    /// suffixes, dotted relations are kept as they are.
    ///
    /// Exact inverse of [`from_url_safe`] unless a container or key itself
    /// contains the reserved `__` separator.
    #[must_use]
    pub fn to_url_safe(&self) -> String {
        match self {
            Self::Direct(_) | Self::Relationship { .. } | Self::Invalid(_) => self.to_string(),
            Self::Embedded { container, leaf } => format!("{container}__{leaf}"),
            Self::NestedEmbedded { container, path } => {
                format!("{container}__{}", path.join("__"))
            }
            Self::RelationshipEmbedded {
                relation_path,
                container,
                leaf,
            } => format!("{}.{container}__{leaf}", relation_path.join(".")),
            Self::RelationshipNestedEmbedded {
                relation_path,
                container,
                path,
            } => format!(
                "{}.{container}__{}",
                relation_path.join("."),
                path.join("__")
            ),
        }
    }

    /// Human label, e.g. `author.profile[:first_name]` -> `Author > Profile > First Name`.
    #[must_use]
    pub fn humanize(&self) -> String {
        if let Self::Invalid(raw) = self {
            return raw.clone();
        }
        self.segments()
            .into_iter()
            .map(title_case)
            .collect::<Vec<_>>()
            .join(" > ")
    }
}

impl fmt::Display for FieldRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Direct(name) => write!(f, "{name}"),
            Self::Relationship { path, leaf } => write!(f, "{}.{leaf}", path.join(".")),
            Self::Embedded { container, leaf } => write!(f, "{container}[:{leaf}]"),
            Self::NestedEmbedded { container, path } => {
                write!(f, "{container}")?;
                path.iter().try_for_each(|leaf| write!(f, "[:{leaf}]"))
            }
            Self::RelationshipEmbedded {
                relation_path,
                container,
                leaf,
            } => write!(f, "{}.{container}[:{leaf}]", relation_path.join(".")),
            Self::RelationshipNestedEmbedded {
                relation_path,
                container,
                path,
            } => {
                write!(f, "{}.{container}", relation_path.join("."))?;
                path.iter().try_for_each(|leaf| write!(f, "[:{leaf}]"))
            }
            Self::Invalid(raw) => write!(f, "{raw}"),
        }
    }
}

impl FromStr for FieldRef {
    type Err = Infallible;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(parse(s))
    }
}

impl From<&str> for FieldRef {
    fn from(raw: &str) -> Self {
        parse(raw)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn strings(items: &[&str]) -> Vec<String> {
        items.iter().map(ToString::to_string).collect()
    }

    #[test]
    fn test_direct() {
        assert_eq!(parse("title"), FieldRef::Direct("title".into()));
        assert_eq!(parse("  created_at "), FieldRef::Direct("created_at".into()));
    }

    #[test]
    fn test_relationship() {
        assert_eq!(
            parse("author.company.name"),
            FieldRef::Relationship {
                path: strings(&["author", "company"]),
                leaf: "name".into()
            }
        );
    }

    #[test]
    fn test_embedded_shapes() {
        assert_eq!(
            parse("metadata[:genre]"),
            FieldRef::Embedded {
                container: "metadata".into(),
                leaf: "genre".into()
            }
        );
        assert_eq!(
            parse("metadata[:publisher][:city]"),
            FieldRef::NestedEmbedded {
                container: "metadata".into(),
                path: strings(&["publisher", "city"])
            }
        );
        assert_eq!(
            parse("author.profile[:bio]"),
            FieldRef::RelationshipEmbedded {
                relation_path: strings(&["author"]),
                container: "profile".into(),
                leaf: "bio".into()
            }
        );
        assert_eq!(
            parse("author.profile[:links][:site]"),
            FieldRef::RelationshipNestedEmbedded {
                relation_path: strings(&["author"]),
                container: "profile".into(),
                path: strings(&["links", "site"])
            }
        );
    }

    #[test]
    fn test_malformed_is_invalid_and_verbatim() {
        for raw in [
            "",
            "   ",
            "metadata[genre]",
            "metadata[:genre",
            "metadata[:]",
            "metadata[:Genre]",
            "metadata[:9lives]",
            "meta data",
            "author..name",
            ".name",
            "name.",
            "[:genre]",
            "metadata[:genre]x",
            "metadata[:genre].name",
            "na-me",
        ] {
            assert_eq!(parse(raw), FieldRef::Invalid(raw.to_string()), "input {raw:?}");
        }
    }

    #[test]
    fn test_display_is_canonical() {
        for raw in [
            "title",
            "author.company.name",
            "metadata[:genre]",
            "metadata[:publisher][:city]",
            "author.profile[:bio]",
            "author.profile[:links][:site]",
        ] {
            assert_eq!(parse(raw).to_string(), raw);
        }
    }

    #[test]
    fn test_url_safe_forms() {
        assert_eq!(parse("metadata[:genre]").to_url_safe(), "metadata__genre");
        assert_eq!(
            parse("metadata[:publisher][:city]").to_url_safe(),
            "metadata__publisher__city"
        );
        assert_eq!(parse("author.profile[:bio]").to_url_safe(), "author.profile__bio");
        assert_eq!(parse("author.name").to_url_safe(), "author.name");
    }

    #[test]
    fn test_from_url_safe_handles_trailing_underscores() {
        assert_eq!(
            from_url_safe("data___name"),
            FieldRef::Embedded {
                container: "data_".into(),
                leaf: "name".into()
            }
        );
        assert_eq!(from_url_safe("title"), FieldRef::Direct("title".into()));
    }

    #[test]
    fn test_humanize() {
        assert_eq!(parse("created_at").humanize(), "Created At");
        assert_eq!(parse("author.company.name").humanize(), "Author > Company > Name");
        assert_eq!(
            parse("author.profile[:first_name]").humanize(),
            "Author > Profile > First Name"
        );
        assert_eq!(parse("bad field").humanize(), "bad field");
    }

    fn name() -> impl Strategy<Value = String> {
        "[a-z][a-z0-9_]{0,6}"
            .prop_filter("reserved separator", |name| url_safe_separators(name).is_empty())
    }

    fn embedded_ref() -> impl Strategy<Value = FieldRef> {
        (
            prop::collection::vec(name(), 0..3),
            name(),
            prop::collection::vec(name(), 1..4),
        )
            .prop_map(|(relations, container, leaves)| {
                let mut raw = relations.join(".");
                if !raw.is_empty() {
                    raw.push('.');
                }
                raw.push_str(&container);
                for leaf in &leaves {
                    raw.push_str(&format!("[:{leaf}]"));
                }
                parse(&raw)
            })
    }

    #[test]
    fn test_reserved_separator_inside_names() {
        let field = parse("metadata[:first__name]");
        assert!(field.is_valid());
        assert_eq!(field.to_url_safe(), "metadata__first__name");
        assert_eq!(
            from_url_safe("metadata__first__name"),
            parse("metadata[:first][:name]")
        );
        assert_eq!(from_url_safe("my__doc__genre"), parse("my[:doc][:genre]"));

        // Single and trailing underscores are not separators
        assert_eq!(from_url_safe("first_name__x"), parse("first_name[:x]"));
        assert_eq!(from_url_safe("data___name"), parse("data_[:name]"));
        assert_eq!(from_url_safe("data__1"), parse("data__1"));
    }

    proptest! {
        #[test]
        fn parse_never_panics(raw in ".*") {
            let _ = parse(&raw);
        }

        #[test]
        fn embedded_refs_round_trip_through_url_safe(field in embedded_ref()) {
            prop_assert!(field.is_valid());
            prop_assert_eq!(from_url_safe(&field.to_url_safe()), field);
        }

        #[test]
        fn relationship_refs_are_already_url_safe(path in prop::collection::vec(name(), 1..4), leaf in name()) {
            let raw = format!("{}.{leaf}", path.join("."));
            let field = parse(&raw);
            prop_assert_eq!(field.to_url_safe(), raw);
        }
    }
}
