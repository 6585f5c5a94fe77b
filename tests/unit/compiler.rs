//! Compiler scenarios: emitted DDL shape, ordering, determinism.

use crate::helpers::fixtures::{parse_policies, table, tenant_schema};
use anyhow::Result;
use insta::assert_snapshot;
use pgrls::compiler::{CompileErrorKind, compile};
use pgrls::schema::{SchemaMetadata, TagMap};

#[test]
fn test_tenant_isolation_matches_contract() -> Result<()> {
    let set = parse_policies(
        "POLICY tenant_isolation PERMISSIVE FOR SELECT,INSERT,UPDATE,DELETE \
         SELECTOR has_column(tenant_id) \
         CLAUSE col(tenant_id) = session('app.tenant_id')",
    );
    let schema = SchemaMetadata {
        tables: vec![table(
            "public",
            "users",
            &[("id", "text"), ("tenant_id", "text"), ("email", "text")],
        )],
    };

    let compiled = compile(&set, &schema, &TagMap::new())?;
    assert!(compiled.errors.is_empty());

    let artifacts = compiled.state.table("users").expect("users is governed");
    assert_eq!(
        artifacts.enable_rls,
        "ALTER TABLE public.users ENABLE ROW LEVEL SECURITY;"
    );
    assert_eq!(
        artifacts.force_rls,
        "ALTER TABLE public.users FORCE ROW LEVEL SECURITY;"
    );
    assert_eq!(artifacts.policies.len(), 1);

    let policy = &artifacts.policies[0];
    assert_eq!(policy.name, "tenant_isolation_users");
    assert_eq!(
        policy.using_expr,
        "tenant_id = current_setting('app.tenant_id')"
    );
    assert_eq!(
        policy.sql,
        "CREATE POLICY tenant_isolation_users\n\
         \x20 ON public.users\n\
         \x20 AS PERMISSIVE\n\
         \x20 FOR ALL\n\
         \x20 USING (tenant_id = current_setting('app.tenant_id'));"
    );
    Ok(())
}

#[test]
fn test_traversal_using_expression() -> Result<()> {
    let set = parse_policies(
        "POLICY project_scope PERMISSIVE FOR SELECT \
         SELECTOR named('tasks') OR named('files') \
         CLAUSE exists(rel(_, project_id, projects, id), { col(tenant_id) = session('app.tenant_id') })",
    );
    let compiled = compile(&set, &tenant_schema(), &TagMap::new())?;
    assert!(compiled.errors.is_empty());

    let tasks = compiled.state.table("tasks").expect("tasks is governed");
    assert_eq!(
        tasks.policies[0].using_expr,
        "EXISTS (SELECT 1 FROM public.projects \
         WHERE public.projects.id = public.tasks.project_id \
         AND public.projects.tenant_id = current_setting('app.tenant_id'))"
    );

    let files = compiled.state.table("files").expect("files is governed");
    assert!(files.policies[0].using_expr.contains("public.files.project_id"));
    Ok(())
}

#[test]
fn test_restrictive_soft_delete() -> Result<()> {
    let set = parse_policies(
        "POLICY soft_delete RESTRICTIVE FOR SELECT \
         SELECTOR has_column(is_deleted) \
         CLAUSE col(is_deleted) = lit(false)",
    );
    let compiled = compile(&set, &tenant_schema(), &TagMap::new())?;
    let projects = compiled.state.table("projects").expect("projects is governed");
    let policy = &projects.policies[0];
    assert_eq!(policy.name, "soft_delete_projects");
    assert!(policy.sql.contains("AS RESTRICTIVE"));
    assert!(policy.sql.contains("FOR SELECT"));
    assert!(policy.sql.contains("USING (is_deleted = false);"));
    Ok(())
}

#[test]
fn test_compiler_is_deterministic() -> Result<()> {
    let source = "POLICY tenant_isolation PERMISSIVE FOR SELECT,INSERT,UPDATE,DELETE \
         SELECTOR has_column(tenant_id) \
         CLAUSE col(tenant_id) = session('app.tenant_id') \
         POLICY soft_delete RESTRICTIVE FOR SELECT \
         SELECTOR has_column(is_deleted) \
         CLAUSE col(is_deleted) = lit(false)";
    let set = parse_policies(source);
    let schema = tenant_schema();

    let first = compile(&set, &schema, &TagMap::new())?.state.render();
    let second = compile(&set, &schema, &TagMap::new())?.state.render();
    assert_eq!(first, second);

    // Clause-internal reordering normalizes away too.
    let shuffled = parse_policies(
        "POLICY p PERMISSIVE FOR SELECT SELECTOR named('users') \
         CLAUSE col(email) IS NOT NULL AND col(tenant_id) = session('app.tenant_id')",
    );
    let reordered = parse_policies(
        "POLICY p PERMISSIVE FOR SELECT SELECTOR named('users') \
         CLAUSE col(tenant_id) = session('app.tenant_id') AND col(email) IS NOT NULL",
    );
    assert_eq!(
        compile(&shuffled, &schema, &TagMap::new())?.state.render(),
        compile(&reordered, &schema, &TagMap::new())?.state.render()
    );
    Ok(())
}

#[test]
fn test_ddl_structure_invariants() -> Result<()> {
    let set = parse_policies(
        "POLICY tenant_isolation PERMISSIVE FOR SELECT,INSERT,UPDATE,DELETE \
         SELECTOR has_column(tenant_id) \
         CLAUSE col(tenant_id) = session('app.tenant_id')",
    );
    let schema = tenant_schema();
    let compiled = compile(&set, &schema, &TagMap::new())?;

    for artifacts in &compiled.state.tables {
        for policy in &artifacts.policies {
            assert_eq!(policy.name, format!("tenant_isolation_{}", artifacts.table));
            assert!(policy.sql.contains("CREATE POLICY"));
            assert!(
                policy
                    .sql
                    .contains(&format!("ON {}.{}", artifacts.schema, artifacts.table))
            );
            assert!(policy.sql.contains("USING"));
            assert!(policy.sql.contains("AS PERMISSIVE") || policy.sql.contains("AS RESTRICTIVE"));
            assert!(policy.sql.ends_with(';'));
        }
    }
    Ok(())
}

#[test]
fn test_table_order_follows_schema_order() -> Result<()> {
    let set = parse_policies(
        "POLICY p PERMISSIVE FOR SELECT \
         SELECTOR named('projects') OR named('users') \
         CLAUSE col(tenant_id) = session('app.tenant_id')",
    );
    let compiled = compile(&set, &tenant_schema(), &TagMap::new())?;
    let tables: Vec<&str> = compiled
        .state
        .tables
        .iter()
        .map(|t| t.table.as_str())
        .collect();
    // Schema order, not selector mention order.
    assert_eq!(tables, vec!["users", "projects"]);
    Ok(())
}

#[test]
fn test_semantic_error_skips_policy_but_continues() -> Result<()> {
    let set = parse_policies(
        "POLICY broken PERMISSIVE FOR SELECT \
         SELECTOR has_column(no_such_column) \
         CLAUSE col(no_such_column) = lit(1) \
         POLICY good PERMISSIVE FOR SELECT \
         SELECTOR named('users') \
         CLAUSE col(tenant_id) = session('app.tenant_id')",
    );
    let compiled = compile(&set, &tenant_schema(), &TagMap::new())?;
    assert_eq!(compiled.errors.len(), 1);
    assert_eq!(compiled.errors[0].kind, CompileErrorKind::UnknownColumn);
    assert_eq!(compiled.errors[0].policy, "broken");
    assert!(compiled.state.table("users").is_some());
    Ok(())
}

#[test]
fn test_unknown_traversal_target_is_semantic_error() -> Result<()> {
    let set = parse_policies(
        "POLICY p PERMISSIVE FOR SELECT SELECTOR named('tasks') \
         CLAUSE exists(rel(_, project_id, nowhere, id), { col(x) = lit(1) })",
    );
    let compiled = compile(&set, &tenant_schema(), &TagMap::new())?;
    assert_eq!(compiled.errors.len(), 1);
    assert_eq!(compiled.errors[0].kind, CompileErrorKind::UnknownTable);
    assert!(compiled.state.tables.is_empty());
    Ok(())
}

#[test]
fn test_duplicate_policy_names_are_refused() {
    let set = parse_policies(
        "POLICY dup PERMISSIVE FOR SELECT SELECTOR named('users') \
         CLAUSE col(tenant_id) = session('a') \
         POLICY dup PERMISSIVE FOR SELECT SELECTOR named('users') \
         CLAUSE col(tenant_id) = session('b')",
    );
    let err = compile(&set, &tenant_schema(), &TagMap::new()).unwrap_err();
    assert!(err.to_string().contains("duplicate compiled policy name"));
}

#[test]
fn test_render_snapshot() -> Result<()> {
    let set = parse_policies(
        "POLICY tenant_isolation PERMISSIVE FOR SELECT,INSERT,UPDATE,DELETE \
         SELECTOR has_column(tenant_id) \
         CLAUSE col(tenant_id) = session('app.tenant_id') \
         POLICY soft_delete RESTRICTIVE FOR SELECT \
         SELECTOR has_column(is_deleted) \
         CLAUSE col(is_deleted) = lit(false)",
    );
    let schema = SchemaMetadata {
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
        ],
    };
    let sql = compile(&set, &schema, &TagMap::new())?.state.render();
    assert_snapshot!(sql, @r"
    ALTER TABLE public.users ENABLE ROW LEVEL SECURITY;
    ALTER TABLE public.users FORCE ROW LEVEL SECURITY;
    CREATE POLICY tenant_isolation_users
      ON public.users
      AS PERMISSIVE
      FOR ALL
      USING (tenant_id = current_setting('app.tenant_id'));

    ALTER TABLE public.projects ENABLE ROW LEVEL SECURITY;
    ALTER TABLE public.projects FORCE ROW LEVEL SECURITY;
    CREATE POLICY tenant_isolation_projects
      ON public.projects
      AS PERMISSIVE
      FOR ALL
      USING (tenant_id = current_setting('app.tenant_id'));
    CREATE POLICY soft_delete_projects
      ON public.projects
      AS RESTRICTIVE
      FOR SELECT
      USING (is_deleted = false);
    ");
    Ok(())
}

#[test]
fn test_tagged_selector_with_tag_map() -> Result<()> {
    let set = parse_policies(
        "POLICY p PERMISSIVE FOR SELECT SELECTOR tagged('tenant_scoped') \
         CLAUSE col(tenant_id) = session('app.tenant_id')",
    );
    let schema = tenant_schema();

    // Empty map: the selector governs nothing.
    let compiled = compile(&set, &schema, &TagMap::new())?;
    assert!(compiled.state.tables.is_empty());

    let mut tags = TagMap::new();
    tags.entry("users".to_string())
        .or_default()
        .insert("tenant_scoped".to_string());
    let compiled = compile(&set, &schema, &tags)?;
    assert_eq!(compiled.state.tables.len(), 1);
    assert_eq!(compiled.state.tables[0].table, "users");
    Ok(())
}
