//! Declarative row-level-security policy engine for PostgreSQL.
//!
//! Policies written in a small DSL are parsed, normalized into a canonical
//! form, matched against schema metadata, proven sound against an
//! adversarial cross-tenant model, and compiled into a deterministic DDL
//! artifact. A drift subsystem compares the installed database state with
//! the artifact and produces reconciliation DDL.

pub mod ast;
pub mod commands;
pub mod compiler;
pub mod config;
pub mod db;
pub mod drift;
pub mod normalize;
pub mod parser;
pub mod proof;
pub mod report;
pub mod schema;
pub mod selector;
