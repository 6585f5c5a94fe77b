use anyhow::Result;
use clap::{Parser, Subcommand};
use dotenv::dotenv;
use std::path::PathBuf;
use tracing_subscriber::{EnvFilter, fmt};

use pgrls::commands::{self, analyze::AnalyzeArgs, monitor::MonitorArgs};
use pgrls::config::DatabaseArgs;
use pgrls::report::ReportFormat;

#[derive(Parser)]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Enable verbose output (info level)
    #[arg(long, short = 'v', global = true)]
    verbose: bool,

    /// Suppress all non-essential output (error level only)
    #[arg(long, short = 'q', global = true)]
    quiet: bool,

    /// Enable debug output (debug level)
    #[arg(long, global = true)]
    debug: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Syntax-check a policy file
    Parse {
        /// Policy DSL file
        file: PathBuf,
    },

    /// Prove every policy sound against the cross-tenant model
    Analyze {
        /// Policy DSL file
        file: PathBuf,

        /// Schema introspection JSON file
        #[arg(long)]
        schema: PathBuf,

        /// Solver command line; the SMT script is fed on stdin
        #[arg(long, default_value = "z3 -in -smt2")]
        solver: String,

        /// Per-query solver timeout in seconds
        #[arg(long, default_value_t = 10)]
        timeout_secs: u64,

        /// Output format
        #[arg(long, value_enum, default_value = "human")]
        format: ReportFormat,
    },

    /// Compile policies into DDL
    Compile {
        /// Policy DSL file
        file: PathBuf,

        /// Schema introspection JSON file
        #[arg(long)]
        schema: PathBuf,

        /// Write DDL to this file instead of stdout
        #[arg(long)]
        output: Option<PathBuf>,
    },

    /// Compile policies and execute the DDL against the database
    Apply {
        /// Policy DSL file
        file: PathBuf,

        /// Schema introspection JSON file
        #[arg(long)]
        schema: PathBuf,

        #[command(flatten)]
        database: DatabaseArgs,
    },

    /// Detect drift between installed and expected state
    Monitor {
        /// Policy DSL file
        file: PathBuf,

        /// Schema introspection JSON file (defaults to introspecting the
        /// database)
        #[arg(long)]
        schema: Option<PathBuf>,

        #[command(flatten)]
        database: DatabaseArgs,

        /// Output format
        #[arg(long, value_enum, default_value = "human")]
        format: ReportFormat,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    dotenv().ok();
    let cli = Cli::parse();
    initialize_logging(&cli);

    let code = run(cli).await?;
    if code != 0 {
        std::process::exit(code);
    }
    Ok(())
}

fn initialize_logging(cli: &Cli) {
    let level = if cli.debug {
        "debug"
    } else if cli.verbose {
        "info"
    } else if cli.quiet {
        "error"
    } else {
        "warn" // default level
    };

    let filter = if std::env::var("RUST_LOG").is_ok() {
        EnvFilter::from_default_env()
    } else {
        EnvFilter::new(level)
    };

    fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();
}

async fn run(cli: Cli) -> Result<i32> {
    match cli.command {
        Commands::Parse { file } => commands::cmd_parse(&file).await,
        Commands::Analyze {
            file,
            schema,
            solver,
            timeout_secs,
            format,
        } => {
            commands::cmd_analyze(
                &file,
                &schema,
                AnalyzeArgs {
                    solver,
                    timeout_secs,
                    format,
                },
            )
            .await
        }
        Commands::Compile {
            file,
            schema,
            output,
        } => commands::cmd_compile(&file, &schema, output.as_deref()).await,
        Commands::Apply {
            file,
            schema,
            database,
        } => commands::cmd_apply(&file, &schema, &database).await,
        Commands::Monitor {
            file,
            schema,
            database,
            format,
        } => {
            commands::cmd_monitor(&file, schema.as_deref(), &database, MonitorArgs { format })
                .await
        }
    }
}
