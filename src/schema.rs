//! Schema metadata consumed by selector evaluation, proof, and compilation.
//!
//! The engine never introspects on its own; it is handed this shape either
//! from a JSON introspection file or from the catalog bridge in `db`.

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};
use std::path::Path;

/// Column name and declared type, as reported by the catalog.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ColumnInfo {
    pub name: String,
    #[serde(rename = "type")]
    pub column_type: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TableMetadata {
    #[serde(default = "default_schema")]
    pub schema: String,
    pub name: String,
    pub columns: Vec<ColumnInfo>,
}

fn default_schema() -> String {
    "public".to_string()
}

impl TableMetadata {
    pub fn qualified_name(&self) -> String {
        format!("{}.{}", self.schema, self.name)
    }

    pub fn column(&self, name: &str) -> Option<&ColumnInfo> {
        self.columns.iter().find(|c| c.name == name)
    }

    pub fn has_column(&self, name: &str) -> bool {
        self.column(name).is_some()
    }
}

/// Ordered table list. Insertion order is the canonical table order: it is
/// the compiler's iteration order and therefore determines emitted DDL order.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct SchemaMetadata {
    pub tables: Vec<TableMetadata>,
}

impl SchemaMetadata {
    pub fn table(&self, name: &str) -> Option<&TableMetadata> {
        self.tables.iter().find(|t| t.name == name)
    }

    pub fn column_exists_anywhere(&self, column: &str) -> bool {
        self.tables.iter().any(|t| t.has_column(column))
    }
}

/// Table tags, keyed by table name. Tagging has no backing source in the
/// catalog; it is supplied alongside the schema, and an empty map makes
/// every `tagged(...)` selector evaluate to the empty table set.
pub type TagMap = BTreeMap<String, BTreeSet<String>>;

/// On-disk introspection document consumed by `--schema`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SchemaDocument {
    pub tables: Vec<TableDocument>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TableDocument {
    #[serde(default = "default_schema")]
    pub schema: String,
    pub name: String,
    pub columns: Vec<ColumnInfo>,
    #[serde(default)]
    pub tags: Vec<String>,
}

impl SchemaDocument {
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("failed to read schema file {}", path.display()))?;
        serde_json::from_str(&content)
            .with_context(|| format!("failed to parse schema file {}", path.display()))
    }

    /// Split into the core schema model and the out-of-core tag map.
    pub fn into_parts(self) -> (SchemaMetadata, TagMap) {
        let mut tags: TagMap = BTreeMap::new();
        let mut tables = Vec::with_capacity(self.tables.len());
        for table in self.tables {
            if !table.tags.is_empty() {
                tags.entry(table.name.clone())
                    .or_default()
                    .extend(table.tags.iter().cloned());
            }
            tables.push(TableMetadata {
                schema: table.schema,
                name: table.name,
                columns: table.columns,
            });
        }
        (SchemaMetadata { tables }, tags)
    }
}
