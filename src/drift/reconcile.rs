//! Reconciliation: the DDL sequence that transitions observed state back
//! to the expected compiled state, in drift-item order.

use super::DriftItem;
use crate::compiler::CompiledState;
use tracing::warn;

pub fn reconcile(items: &[DriftItem], expected: &CompiledState) -> Vec<String> {
    let mut statements = Vec::new();
    for item in items {
        let Some(artifacts) = expected.table(item.table()) else {
            // Drift items are derived from the expected state, so an
            // unknown table indicates the inputs are out of sync.
            warn!(table = item.table(), "drift item for table not in expected state");
            continue;
        };
        match item {
            DriftItem::RlsDisabled { .. } => statements.push(artifacts.enable_rls.clone()),
            DriftItem::RlsNotForced { .. } => statements.push(artifacts.force_rls.clone()),
            DriftItem::MissingPolicy { policy, .. } => {
                if let Some(compiled) = artifacts.policies.iter().find(|p| p.name == *policy) {
                    statements.push(compiled.sql.clone());
                }
            }
            DriftItem::ModifiedPolicy { policy, .. } => {
                statements.push(drop_policy(policy, &artifacts.schema, &artifacts.table));
                if let Some(compiled) = artifacts.policies.iter().find(|p| p.name == *policy) {
                    statements.push(compiled.sql.clone());
                }
            }
            DriftItem::ExtraPolicy { policy, .. } => {
                statements.push(drop_policy(policy, &artifacts.schema, &artifacts.table));
            }
        }
    }
    statements
}

fn drop_policy(name: &str, schema: &str, table: &str) -> String {
    format!("DROP POLICY IF EXISTS {} ON {}.{};", name, schema, table)
}
