use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

pub const DEFAULT_PAGE_SIZE: u64 = 25;
pub const MAX_PAGE_SIZE: u64 = 250;
pub const MAX_FILTER_VALUE_LENGTH: usize = 10_000;
pub const PAGE_RANGE_RADIUS: u64 = 2;

/// How pages are addressed.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "snake_case")]
pub enum PaginationMode {
    /// Page numbers and a total count.
    #[default]
    Offset,
    /// Opaque forward/backward cursors, no total count.
    Keyset,
}

/// Grid-wide settings.
///
/// Every field has a default, so a partial config deserializes:
///
/// ```json
/// { "pagination": "keyset", "default_page_size": 50 }
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(default)]
pub struct GridConfig {
    pub default_page_size: u64,
    /// Requested page sizes above this are clamped.
    pub max_page_size: u64,
    pub pagination: PaginationMode,
    /// Raw filter inputs longer than this (in bytes) are dropped.
    pub max_filter_value_length: usize,
    /// Pages shown either side of the current one in page links.
    pub page_range_radius: u64,
    /// Keyset tiebreaker when the schema does not name a primary key.
    pub primary_key: String,
}

impl Default for GridConfig {
    fn default() -> Self {
        Self {
            default_page_size: DEFAULT_PAGE_SIZE,
            max_page_size: MAX_PAGE_SIZE,
            pagination: PaginationMode::Offset,
            max_filter_value_length: MAX_FILTER_VALUE_LENGTH,
            page_range_radius: PAGE_RANGE_RADIUS,
            primary_key: "id".to_string(),
        }
    }
}

impl GridConfig {
    #[must_use]
    pub fn keyset() -> Self {
        Self {
            pagination: PaginationMode::Keyset,
            ..Self::default()
        }
    }

    /// Page size actually used for a request.
    #[must_use]
    pub fn page_size(&self, requested: Option<u64>) -> u64 {
        match requested {
            None | Some(0) => self.default_page_size.max(1),
            Some(size) => size.min(self.max_page_size.max(1)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_page_size_defaults_and_clamps() {
        let config = GridConfig::default();
        assert_eq!(config.page_size(None), 25);
        assert_eq!(config.page_size(Some(0)), 25);
        assert_eq!(config.page_size(Some(10)), 10);
        assert_eq!(config.page_size(Some(10_000)), 250);
    }

    #[test]
    fn test_partial_config_deserializes() {
        let config: GridConfig =
            serde_json::from_str(r#"{"pagination": "keyset", "default_page_size": 50}"#).unwrap();
        assert_eq!(config.pagination, PaginationMode::Keyset);
        assert_eq!(config.default_page_size, 50);
        assert_eq!(config.max_page_size, MAX_PAGE_SIZE);
        assert_eq!(config.primary_key, "id");
    }
}
