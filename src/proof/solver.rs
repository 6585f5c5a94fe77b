//! External SMT solver invocation.
//!
//! The solver is the pipeline's only stateful resource. Each query spawns a
//! fresh process, writes the script on stdin and reads the verdict from
//! stdout; nothing is cached between queries. The child is killed on drop,
//! so the process is released on every exit path including timeout.

use std::process::Stdio;
use std::time::Duration;
use tokio::io::AsyncWriteExt;
use tokio::time::timeout;
use tracing::{debug, warn};

#[derive(Debug, Clone)]
pub struct SolverConfig {
    /// Solver command line, e.g. `z3 -in -smt2`. The script is fed on stdin.
    pub command: String,
    /// Per-query wall-clock bound, also passed to the solver as its
    /// internal timeout option.
    pub timeout: Duration,
}

impl Default for SolverConfig {
    fn default() -> Self {
        Self {
            command: "z3 -in -smt2".to_string(),
            timeout: Duration::from_secs(10),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SolverVerdict {
    Unsat,
    Sat,
    /// Timeout, missing solver, or output the engine cannot interpret.
    /// Never an error: proof incapacity is a result, not a failure.
    Unknown(String),
}

pub async fn check(config: &SolverConfig, script: &str) -> SolverVerdict {
    let mut parts = config.command.split_whitespace();
    let Some(program) = parts.next() else {
        return SolverVerdict::Unknown("solver command is empty".to_string());
    };

    let mut command = tokio::process::Command::new(program);
    command
        .args(parts)
        .stdin(Stdio::piped())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .kill_on_drop(true);

    let mut child = match command.spawn() {
        Ok(child) => child,
        Err(e) => {
            warn!(solver = program, error = %e, "failed to start solver");
            return SolverVerdict::Unknown(format!("failed to start solver '{}': {}", program, e));
        }
    };

    let payload = format!(
        "(set-option :timeout {})\n{}",
        config.timeout.as_millis(),
        script
    );
    if let Some(mut stdin) = child.stdin.take() {
        if let Err(e) = stdin.write_all(payload.as_bytes()).await {
            return SolverVerdict::Unknown(format!("failed to write solver input: {}", e));
        }
        // Closing stdin lets the solver run the script to completion.
        drop(stdin);
    }

    // Grace period on top of the solver's own timeout; dropping the future
    // kills the child.
    let deadline = config.timeout + Duration::from_secs(2);
    let output = match timeout(deadline, child.wait_with_output()).await {
        Ok(Ok(output)) => output,
        Ok(Err(e)) => {
            return SolverVerdict::Unknown(format!("solver process failed: {}", e));
        }
        Err(_) => {
            debug!(solver = program, "solver exceeded its deadline");
            return SolverVerdict::Unknown("solver timed out".to_string());
        }
    };

    parse_verdict(
        &String::from_utf8_lossy(&output.stdout),
        &String::from_utf8_lossy(&output.stderr),
    )
}

fn parse_verdict(stdout: &str, stderr: &str) -> SolverVerdict {
    for line in stdout.lines() {
        match line.trim() {
            "unsat" => return SolverVerdict::Unsat,
            "sat" => return SolverVerdict::Sat,
            "unknown" | "timeout" => {
                return SolverVerdict::Unknown("solver returned unknown".to_string());
            }
            _ => {}
        }
    }
    let detail = stdout
        .lines()
        .chain(stderr.lines())
        .map(str::trim)
        .find(|line| !line.is_empty())
        .unwrap_or("no solver output");
    SolverVerdict::Unknown(format!("unrecognized solver output: {}", detail))
}
