//! Drift detection and reconciliation scenarios.

use crate::helpers::fixtures::{parse_policies, table};
use anyhow::Result;
use pgrls::compiler::{CompiledState, compile};
use pgrls::drift::reconcile::reconcile;
use pgrls::drift::{
    DriftItem, ObservedPolicy, ObservedState, ObservedTableState, Severity, detect_drift,
};
use pgrls::schema::{SchemaMetadata, TagMap};

fn users_schema() -> SchemaMetadata {
    SchemaMetadata {
        tables: vec![table(
            "public",
            "users",
            &[("id", "text"), ("tenant_id", "text"), ("email", "text")],
        )],
    }
}

fn compiled_tenant_isolation() -> Result<CompiledState> {
    let set = parse_policies(
        "POLICY tenant_isolation PERMISSIVE FOR SELECT,INSERT,UPDATE,DELETE \
         SELECTOR has_column(tenant_id) \
         CLAUSE col(tenant_id) = session('app.tenant_id')",
    );
    let compiled = compile(&set, &users_schema(), &TagMap::new())?;
    assert!(compiled.errors.is_empty());
    Ok(compiled.state)
}

fn observed_policy(name: &str, using_expr: &str) -> ObservedPolicy {
    ObservedPolicy {
        name: name.to_string(),
        table: "users".to_string(),
        mode: "PERMISSIVE".to_string(),
        command: "ALL".to_string(),
        using_expr: Some(using_expr.to_string()),
        check_expr: None,
    }
}

fn observed_users(policies: Vec<ObservedPolicy>) -> ObservedState {
    ObservedState {
        tables: vec![ObservedTableState {
            table: "users".to_string(),
            rls_enabled: true,
            rls_forced: true,
            policies,
        }],
    }
}

#[test]
fn test_missing_policy() -> Result<()> {
    let expected = compiled_tenant_isolation()?;
    let observed = observed_users(vec![]);

    let report = detect_drift(&expected, &observed);
    assert_eq!(
        report.items,
        vec![DriftItem::MissingPolicy {
            table: "users".to_string(),
            policy: "tenant_isolation_users".to_string(),
        }]
    );
    assert_eq!(report.items[0].severity(), Severity::Critical);

    // Reconciliation is exactly the stored CREATE POLICY statement.
    let ddl = reconcile(&report.items, &expected);
    assert_eq!(ddl, vec![expected.tables[0].policies[0].sql.clone()]);
    Ok(())
}

#[test]
fn test_modified_expression() -> Result<()> {
    let expected = compiled_tenant_isolation()?;
    let observed = observed_users(vec![observed_policy(
        "tenant_isolation_users",
        "email = 'admin@example.com'",
    )]);

    let report = detect_drift(&expected, &observed);
    assert_eq!(report.items.len(), 1);
    match &report.items[0] {
        DriftItem::ModifiedPolicy {
            table,
            policy,
            expected: expected_expr,
            observed: observed_expr,
        } => {
            assert_eq!(table, "users");
            assert_eq!(policy, "tenant_isolation_users");
            assert!(expected_expr.contains("current_setting"));
            assert!(observed_expr.contains("admin@example.com"));
        }
        other => panic!("expected ModifiedPolicy, got {:?}", other),
    }
    assert_eq!(report.items[0].severity(), Severity::Critical);

    let ddl = reconcile(&report.items, &expected);
    assert_eq!(ddl.len(), 2);
    assert_eq!(
        ddl[0],
        "DROP POLICY IF EXISTS tenant_isolation_users ON public.users;"
    );
    assert!(ddl[1].starts_with("CREATE POLICY tenant_isolation_users"));
    Ok(())
}

#[test]
fn test_cast_tolerance_produces_no_drift() -> Result<()> {
    let expected = compiled_tenant_isolation()?;
    let observed = observed_users(vec![observed_policy(
        "tenant_isolation_users",
        "(tenant_id = current_setting('app.tenant_id'::text))",
    )]);
    let report = detect_drift(&expected, &observed);
    assert!(report.is_empty(), "unexpected drift: {:?}", report.items);
    Ok(())
}

#[test]
fn test_rls_flags() -> Result<()> {
    let expected = compiled_tenant_isolation()?;
    let observed = ObservedState {
        tables: vec![ObservedTableState {
            table: "users".to_string(),
            rls_enabled: false,
            rls_forced: false,
            policies: vec![observed_policy(
                "tenant_isolation_users",
                "tenant_id = current_setting('app.tenant_id')",
            )],
        }],
    };
    let report = detect_drift(&expected, &observed);
    assert_eq!(
        report.items,
        vec![
            DriftItem::RlsDisabled {
                table: "users".to_string()
            },
            DriftItem::RlsNotForced {
                table: "users".to_string()
            },
        ]
    );
    assert_eq!(report.items[0].severity(), Severity::Critical);
    assert_eq!(report.items[1].severity(), Severity::High);

    let ddl = reconcile(&report.items, &expected);
    assert_eq!(
        ddl,
        vec![
            "ALTER TABLE public.users ENABLE ROW LEVEL SECURITY;".to_string(),
            "ALTER TABLE public.users FORCE ROW LEVEL SECURITY;".to_string(),
        ]
    );
    Ok(())
}

#[test]
fn test_unobserved_table_reports_everything_missing() -> Result<()> {
    let expected = compiled_tenant_isolation()?;
    let report = detect_drift(&expected, &ObservedState::default());
    assert_eq!(report.items.len(), 2);
    assert!(matches!(report.items[0], DriftItem::RlsDisabled { .. }));
    assert!(matches!(report.items[1], DriftItem::MissingPolicy { .. }));
    Ok(())
}

#[test]
fn test_extra_policy_is_warning() -> Result<()> {
    let expected = compiled_tenant_isolation()?;
    let observed = observed_users(vec![
        observed_policy(
            "tenant_isolation_users",
            "tenant_id = current_setting('app.tenant_id')",
        ),
        observed_policy("hand_rolled", "true"),
    ]);
    let report = detect_drift(&expected, &observed);
    assert_eq!(
        report.items,
        vec![DriftItem::ExtraPolicy {
            table: "users".to_string(),
            policy: "hand_rolled".to_string(),
        }]
    );
    assert_eq!(report.items[0].severity(), Severity::Warning);

    let ddl = reconcile(&report.items, &expected);
    assert_eq!(
        ddl,
        vec!["DROP POLICY IF EXISTS hand_rolled ON public.users;".to_string()]
    );
    Ok(())
}

/// Replay reconciliation DDL onto the observed model and re-detect: drift
/// shrinks to empty in one pass.
#[test]
fn test_reconciliation_reaches_fixpoint() -> Result<()> {
    let expected = compiled_tenant_isolation()?;
    let mut observed = ObservedState {
        tables: vec![ObservedTableState {
            table: "users".to_string(),
            rls_enabled: true,
            rls_forced: false,
            policies: vec![
                observed_policy("tenant_isolation_users", "email = 'admin@example.com'"),
                observed_policy("hand_rolled", "true"),
            ],
        }],
    };

    let before = detect_drift(&expected, &observed);
    assert_eq!(before.items.len(), 3);

    let ddl = reconcile(&before.items, &expected);
    apply_to_model(&mut observed, &ddl, &expected);

    let after = detect_drift(&expected, &observed);
    assert!(after.is_empty(), "drift remains: {:?}", after.items);
    Ok(())
}

/// Minimal interpreter for the reconciliation statements, enough to update
/// the observed model the way the database would.
fn apply_to_model(observed: &mut ObservedState, ddl: &[String], expected: &CompiledState) {
    for statement in ddl {
        if let Some(rest) = statement.strip_prefix("ALTER TABLE ") {
            let table = rest
                .split_whitespace()
                .next()
                .and_then(|qualified| qualified.split('.').nth(1))
                .expect("qualified table name");
            let state = observed
                .tables
                .iter_mut()
                .find(|t| t.table == table)
                .expect("altered table is observed");
            if statement.contains("ENABLE ROW LEVEL SECURITY") {
                state.rls_enabled = true;
            } else if statement.contains("FORCE ROW LEVEL SECURITY") {
                state.rls_forced = true;
            }
        } else if let Some(rest) = statement.strip_prefix("DROP POLICY IF EXISTS ") {
            let name = rest.split_whitespace().next().expect("policy name");
            for state in &mut observed.tables {
                state.policies.retain(|p| p.name != name);
            }
        } else if statement.starts_with("CREATE POLICY ") {
            let compiled = expected
                .tables
                .iter()
                .flat_map(|t| &t.policies)
                .find(|p| *statement == p.sql)
                .expect("created policy comes from the expected state");
            let state = observed
                .tables
                .iter_mut()
                .find(|t| t.table == compiled.table)
                .expect("policy table is observed");
            state.policies.push(ObservedPolicy {
                name: compiled.name.clone(),
                table: compiled.table.clone(),
                mode: "PERMISSIVE".to_string(),
                command: "ALL".to_string(),
                using_expr: Some(compiled.using_expr.clone()),
                check_expr: None,
            });
        }
    }
}
