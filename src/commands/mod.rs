//! CLI command implementations. Commands return the process exit code;
//! `main` turns it into the actual exit.

pub mod analyze;
pub mod apply;
pub mod compile;
pub mod monitor;
pub mod parse;

pub use analyze::cmd_analyze;
pub use apply::cmd_apply;
pub use compile::cmd_compile;
pub use monitor::cmd_monitor;
pub use parse::cmd_parse;

use crate::ast::PolicySet;
use crate::schema::{SchemaDocument, SchemaMetadata, TagMap};
use anyhow::{Context, Result};
use std::path::Path;

/// Read and parse a policy file. Syntax errors are printed and `None` is
/// returned so the caller can exit non-zero; IO failures propagate.
pub(crate) fn load_policy_set(path: &Path) -> Result<Option<PolicySet>> {
    let source = std::fs::read_to_string(path)
        .with_context(|| format!("failed to read policy file {}", path.display()))?;
    let result = crate::parser::parse(&source);
    if result.errors.is_empty() {
        Ok(result.policy_set)
    } else {
        for error in &result.errors {
            eprintln!("{}:{}", path.display(), error);
        }
        eprintln!(
            "❌ {} syntax error{} in {}",
            result.errors.len(),
            if result.errors.len() == 1 { "" } else { "s" },
            path.display()
        );
        Ok(None)
    }
}

pub(crate) fn load_schema(path: &Path) -> Result<(SchemaMetadata, TagMap)> {
    Ok(SchemaDocument::load(path)?.into_parts())
}

/// Print semantic errors from compilation; returns how many there were.
pub(crate) fn report_compile_errors(errors: &[crate::compiler::CompileError]) -> usize {
    for error in errors {
        eprintln!("⚠️  {}", error);
    }
    errors.len()
}
