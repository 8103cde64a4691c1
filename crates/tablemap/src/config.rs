//! Per-mapper configuration.

use serde::{Deserialize, Serialize};

/// Configuration for a [`Mapper`](crate::Mapper).
///
/// Column names only take effect when the table schema actually declares
/// the column, so one config can be shared by tables with and without
/// timestamps.
///
/// ```rust,ignore
/// let config: MapperConfig = serde_json::from_str(r#"{ "soft_delete": false }"#)?;
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct MapperConfig {
    /// Column stamped once at insert (and at upsert when zero).
    pub created_at_column: String,
    /// Column stamped at every insert, update and upsert.
    pub updated_at_column: String,
    /// Nullable timestamp column marking a row as soft-deleted.
    pub deleted_at_column: String,
    /// Filter and soft-delete through `deleted_at_column` when present.
    pub soft_delete: bool,
    /// Stamp `created_at_column` / `updated_at_column` automatically.
    pub manage_timestamps: bool,
}

impl Default for MapperConfig {
    fn default() -> Self {
        Self {
            created_at_column: "created_at".to_string(),
            updated_at_column: "updated_at".to_string(),
            deleted_at_column: "deleted_at".to_string(),
            soft_delete: true,
            manage_timestamps: true,
        }
    }
}

impl MapperConfig {
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the creation timestamp column name.
    pub fn created_at_column(mut self, name: impl Into<String>) -> Self {
        self.created_at_column = name.into();
        self
    }

    /// Set the modification timestamp column name.
    pub fn updated_at_column(mut self, name: impl Into<String>) -> Self {
        self.updated_at_column = name.into();
        self
    }

    /// Set the soft-delete marker column name.
    pub fn deleted_at_column(mut self, name: impl Into<String>) -> Self {
        self.deleted_at_column = name.into();
        self
    }

    /// Enable or disable soft-delete handling.
    pub fn soft_delete(mut self, enabled: bool) -> Self {
        self.soft_delete = enabled;
        self
    }

    /// Enable or disable automatic timestamps.
    pub fn manage_timestamps(mut self, enabled: bool) -> Self {
        self.manage_timestamps = enabled;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_use_conventional_names() {
        let config = MapperConfig::default();
        assert_eq!(config.created_at_column, "created_at");
        assert_eq!(config.updated_at_column, "updated_at");
        assert_eq!(config.deleted_at_column, "deleted_at");
        assert!(config.soft_delete);
        assert!(config.manage_timestamps);
    }

    #[test]
    fn partial_json_fills_defaults() {
        let config: MapperConfig =
            serde_json::from_str(r#"{ "deleted_at_column": "archived_at", "soft_delete": true }"#)
                .unwrap();
        assert_eq!(config.deleted_at_column, "archived_at");
        assert_eq!(config.created_at_column, "created_at");
        assert!(config.manage_timestamps);
    }

    #[test]
    fn builder_setters() {
        let config = MapperConfig::new()
            .created_at_column("inserted_at")
            .updated_at_column("modified_at")
            .soft_delete(false)
            .manage_timestamps(false);
        assert_eq!(config.created_at_column, "inserted_at");
        assert_eq!(config.updated_at_column, "modified_at");
        assert!(!config.soft_delete);

        let json = serde_json::to_string(&config).unwrap();
        let back: MapperConfig = serde_json::from_str(&json).unwrap();
        assert_eq!(back, config);
    }
}
