//! `pgrls parse` end to end.

use crate::helpers::cli::{CliHelper, TENANT_POLICY};
use anyhow::Result;
use predicates::prelude::*;

#[test]
fn test_parse_valid_file() -> Result<()> {
    let helper = CliHelper::new()?;
    let file = helper.write_file("policies.rls", TENANT_POLICY)?;

    helper
        .command()
        .args(["parse", file.to_str().unwrap()])
        .assert()
        .success()
        .stdout(predicate::str::contains("Parsed 1 policy"));
    Ok(())
}

#[test]
fn test_parse_reports_every_error_with_position() -> Result<()> {
    let helper = CliHelper::new()?;
    let file = helper.write_file(
        "broken.rls",
        "POLICY one PERMISSIVE FOR NOPE SELECTOR ALL CLAUSE col(a) = lit(1)\n\
         POLICY two PERMISSIVE FOR SELECT SELECTOR ALL CLAUSE col(a) ?= lit(1)\n",
    )?;

    helper
        .command()
        .args(["parse", file.to_str().unwrap()])
        .assert()
        .failure()
        .stderr(predicate::str::contains("broken.rls:1:"))
        .stderr(predicate::str::contains("broken.rls:2:"))
        .stderr(predicate::str::contains("syntax errors"));
    Ok(())
}

#[test]
fn test_parse_missing_file_fails() -> Result<()> {
    let helper = CliHelper::new()?;
    helper
        .command()
        .args(["parse", "no-such-file.rls"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("failed to read policy file"));
    Ok(())
}
