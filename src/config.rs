//! CLI-boundary configuration. The core pipeline is driven exclusively by
//! function arguments; only this layer reads the environment.

use anyhow::{Context, Result};
use clap::Args;

/// Database connection arguments for commands that talk to PostgreSQL.
#[derive(Args, Debug, Clone, Default)]
pub struct DatabaseArgs {
    /// Database connection string (defaults to the DATABASE_URL environment
    /// variable)
    #[arg(long)]
    pub database_url: Option<String>,
}

impl DatabaseArgs {
    pub fn resolve(&self) -> Result<String> {
        match &self.database_url {
            Some(url) => Ok(url.clone()),
            None => std::env::var("DATABASE_URL")
                .context("no database configured: pass --database-url or set DATABASE_URL"),
        }
    }
}
