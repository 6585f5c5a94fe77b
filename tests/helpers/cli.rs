//! Helper for driving the pgrls binary in CLI tests.

use anyhow::Result;
use assert_cmd::Command;
use std::path::PathBuf;
use tempfile::TempDir;

pub struct CliHelper {
    dir: TempDir,
}

impl CliHelper {
    pub fn new() -> Result<Self> {
        Ok(Self {
            dir: TempDir::new()?,
        })
    }

    pub fn command(&self) -> Command {
        let mut cmd = Command::cargo_bin("pgrls").expect("pgrls binary builds");
        cmd.current_dir(self.dir.path());
        cmd
    }

    pub fn write_file(&self, name: &str, content: &str) -> Result<PathBuf> {
        let path = self.dir.path().join(name);
        std::fs::write(&path, content)?;
        Ok(path)
    }

    pub fn read_file(&self, name: &str) -> Result<String> {
        Ok(std::fs::read_to_string(self.dir.path().join(name))?)
    }
}

/// The schema fixture most CLI tests use: a tenant-scoped `users` table
/// and a `projects` table with a soft-delete flag.
pub const SCHEMA_JSON: &str = r#"{
  "tables": [
    {
      "schema": "public",
      "name": "users",
      "columns": [
        {"name": "id", "type": "text"},
        {"name": "tenant_id", "type": "text"},
        {"name": "email", "type": "text"}
      ]
    },
    {
      "schema": "public",
      "name": "projects",
      "columns": [
        {"name": "id", "type": "text"},
        {"name": "tenant_id", "type": "text"},
        {"name": "is_deleted", "type": "boolean"}
      ]
    }
  ]
}"#;

pub const TENANT_POLICY: &str = "POLICY tenant_isolation PERMISSIVE \
    FOR SELECT,INSERT,UPDATE,DELETE \
    SELECTOR has_column(tenant_id) \
    CLAUSE col(tenant_id) = session('app.tenant_id')\n";
