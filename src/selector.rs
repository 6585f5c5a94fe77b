//! Selector evaluation: which tables does a policy govern?

use crate::ast::Selector;
use crate::schema::{SchemaMetadata, TableMetadata, TagMap};
use std::collections::BTreeSet;

/// Evaluate a selector against schema metadata, returning the governed
/// tables. `And` intersects preserving the left operand's order; `Or`
/// unions preserving first appearance across left then right.
pub fn evaluate<'a>(
    selector: &Selector,
    schema: &'a SchemaMetadata,
    tags: &TagMap,
) -> Vec<&'a TableMetadata> {
    match selector {
        Selector::All => schema.tables.iter().collect(),
        Selector::HasColumn {
            column,
            column_type,
        } => schema
            .tables
            .iter()
            .filter(|table| {
                table.columns.iter().any(|c| {
                    c.name == *column
                        && column_type
                            .as_ref()
                            .is_none_or(|t| c.column_type.eq_ignore_ascii_case(t))
                })
            })
            .collect(),
        Selector::InSchema(name) => schema
            .tables
            .iter()
            .filter(|table| table.schema == *name)
            .collect(),
        Selector::Named(name) => schema
            .tables
            .iter()
            .filter(|table| table.name == *name)
            .collect(),
        Selector::Tagged(tag) => schema
            .tables
            .iter()
            .filter(|table| {
                tags.get(&table.name)
                    .is_some_and(|table_tags| table_tags.contains(tag))
            })
            .collect(),
        Selector::And(left, right) => {
            let right_names: BTreeSet<String> = evaluate(right, schema, tags)
                .iter()
                .map(|t| t.qualified_name())
                .collect();
            evaluate(left, schema, tags)
                .into_iter()
                .filter(|t| right_names.contains(&t.qualified_name()))
                .collect()
        }
        Selector::Or(left, right) => {
            let mut result = evaluate(left, schema, tags);
            let mut seen: BTreeSet<String> =
                result.iter().map(|t| t.qualified_name()).collect();
            for table in evaluate(right, schema, tags) {
                if seen.insert(table.qualified_name()) {
                    result.push(table);
                }
            }
            result
        }
    }
}
