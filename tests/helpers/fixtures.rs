//! Fixture builders shared across unit tests.

use pgrls::ast::PolicySet;
use pgrls::schema::{ColumnInfo, SchemaMetadata, TableMetadata};

pub fn table(schema: &str, name: &str, columns: &[(&str, &str)]) -> TableMetadata {
    TableMetadata {
        schema: schema.to_string(),
        name: name.to_string(),
        columns: columns
            .iter()
            .map(|(n, t)| ColumnInfo {
                name: n.to_string(),
                column_type: t.to_string(),
            })
            .collect(),
    }
}

/// users / projects / tasks / files, all tenant-scoped, with the
/// foreign-key shape the traversal scenarios need.
pub fn tenant_schema() -> SchemaMetadata {
    SchemaMetadata {
        tables: vec![
            table(
                "public",
                "users",
                &[("id", "text"), ("tenant_id", "text"), ("email", "text")],
            ),
            table(
                "public",
                "projects",
                &[
                    ("id", "text"),
                    ("tenant_id", "text"),
                    ("is_deleted", "boolean"),
                ],
            ),
            table(
                "public",
                "tasks",
                &[("id", "text"), ("project_id", "text")],
            ),
            table(
                "public",
                "files",
                &[("id", "text"), ("project_id", "text")],
            ),
        ],
    }
}

/// Parse DSL text that the test knows is valid.
pub fn parse_policies(source: &str) -> PolicySet {
    let result = pgrls::parser::parse(source);
    assert!(
        result.errors.is_empty(),
        "fixture source failed to parse: {:?}",
        result.errors
    );
    result.policy_set.expect("no errors means a tree")
}
