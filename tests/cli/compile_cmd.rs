//! `pgrls compile` end to end.

use crate::helpers::cli::{CliHelper, SCHEMA_JSON, TENANT_POLICY};
use anyhow::Result;
use predicates::prelude::*;

#[test]
fn test_compile_to_stdout() -> Result<()> {
    let helper = CliHelper::new()?;
    let policies = helper.write_file("policies.rls", TENANT_POLICY)?;
    let schema = helper.write_file("schema.json", SCHEMA_JSON)?;

    helper
        .command()
        .args([
            "compile",
            policies.to_str().unwrap(),
            "--schema",
            schema.to_str().unwrap(),
        ])
        .assert()
        .success()
        .stdout(predicate::str::contains(
            "ALTER TABLE public.users ENABLE ROW LEVEL SECURITY;",
        ))
        .stdout(predicate::str::contains("CREATE POLICY tenant_isolation_users"))
        .stdout(predicate::str::contains("CREATE POLICY tenant_isolation_projects"))
        .stdout(predicate::str::contains(
            "USING (tenant_id = current_setting('app.tenant_id'));",
        ));
    Ok(())
}

#[test]
fn test_compile_to_output_file() -> Result<()> {
    let helper = CliHelper::new()?;
    let policies = helper.write_file("policies.rls", TENANT_POLICY)?;
    let schema = helper.write_file("schema.json", SCHEMA_JSON)?;

    helper
        .command()
        .args([
            "compile",
            policies.to_str().unwrap(),
            "--schema",
            schema.to_str().unwrap(),
            "--output",
            "out.sql",
        ])
        .assert()
        .success();

    let sql = helper.read_file("out.sql")?;
    assert!(sql.contains("FORCE ROW LEVEL SECURITY;"));
    assert!(sql.ends_with('\n'));
    Ok(())
}

#[test]
fn test_compile_semantic_error_continues_and_fails() -> Result<()> {
    let helper = CliHelper::new()?;
    let policies = helper.write_file(
        "policies.rls",
        &format!(
            "POLICY broken PERMISSIVE FOR SELECT \
             SELECTOR has_column(no_such_column) \
             CLAUSE col(no_such_column) = lit(1)\n{}",
            TENANT_POLICY
        ),
    )?;
    let schema = helper.write_file("schema.json", SCHEMA_JSON)?;

    // The broken policy is reported, the good one still compiles, and the
    // exit code is non-zero.
    helper
        .command()
        .args([
            "compile",
            policies.to_str().unwrap(),
            "--schema",
            schema.to_str().unwrap(),
        ])
        .assert()
        .failure()
        .stderr(predicate::str::contains("unknown column"))
        .stdout(predicate::str::contains("CREATE POLICY tenant_isolation_users"));
    Ok(())
}

#[test]
fn test_compile_is_byte_identical_across_runs() -> Result<()> {
    let helper = CliHelper::new()?;
    let policies = helper.write_file("policies.rls", TENANT_POLICY)?;
    let schema = helper.write_file("schema.json", SCHEMA_JSON)?;

    let run = || -> Result<Vec<u8>> {
        let output = helper
            .command()
            .args([
                "compile",
                policies.to_str().unwrap(),
                "--schema",
                schema.to_str().unwrap(),
            ])
            .output()?;
        Ok(output.stdout)
    };
    assert_eq!(run()?, run()?);
    Ok(())
}
