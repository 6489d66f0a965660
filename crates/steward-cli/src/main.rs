// crates/steward-cli/src/main.rs
// ============================================================================
// Module: Steward CLI Entry Point
// Description: Command dispatcher for the governance control plane.
// Purpose: Run the supervisor loop, the PR gate, and offline verification.
// Dependencies: clap, serde_json, steward-core, steward-forge, steward-supervisor
// ============================================================================

//! ## Overview
//! The `steward` binary wires the environment document, the forge client,
//! and the supervisor together. Exit codes follow the control-plane
//! contract: 0 after a successful claimed-and-handled task (or an idle
//! bounded run), 1 on startup governance failure, 2 on a kill-switch.

// ============================================================================
// SECTION: Lint Configuration
// ============================================================================

#![allow(
    clippy::print_stdout,
    reason = "The CLI owns the process stdout contract for supervisor tokens."
)]

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::path::PathBuf;
use std::process::ExitCode;

use clap::Parser;
use clap::Subcommand;

use steward_core::verify_audit_stream;
use steward_forge::ForgeApi;
use steward_forge::HttpForge;
use steward_forge::repo_identity_from_git;
use steward_supervisor::EnvironmentDoc;
use steward_supervisor::EnvironmentPaths;
use steward_supervisor::Reporter;
use steward_supervisor::Supervisor;
use steward_supervisor::SupervisorConfig;
use steward_supervisor::validate_environment;

// ============================================================================
// SECTION: Arguments
// ============================================================================

/// Deterministic governance and execution control plane.
#[derive(Debug, Parser)]
#[command(name = "steward", version, about = "Governed task supervisor for a forge-backed backlog")]
struct Cli {
    /// Repository root the supervisor operates in.
    #[arg(long, default_value = ".")]
    repo_root: PathBuf,

    /// Command to run.
    #[command(subcommand)]
    command: CliCommand,
}

/// Top-level commands.
#[derive(Debug, Subcommand)]
enum CliCommand {
    /// Run the supervisor control loop until one task is handled.
    Run {
        /// Optional cycle budget; the loop exits idle when it is exhausted.
        #[arg(long)]
        max_cycles: Option<u64>,
    },
    /// Run one PR governance gate pass and exit.
    Gate,
    /// Validate the environment and print the report.
    ValidateEnv,
    /// Verify one audit stream offline.
    VerifyStream {
        /// Stream identifier, for example `task-3`.
        #[arg(long)]
        stream_id: String,
    },
}

// ============================================================================
// SECTION: Stdout Reporter
// ============================================================================

/// Reporter printing supervisor tokens to stdout.
#[derive(Debug, Clone, Copy)]
struct StdoutReporter;

impl Reporter for StdoutReporter {
    fn emit(&self, line: &str) {
        println!("{line}");
    }
}

// ============================================================================
// SECTION: Wiring
// ============================================================================

/// Loads the environment document and builds the forge client.
fn build_forge(config: &SupervisorConfig) -> Result<(HttpForge, bool), String> {
    let doc = EnvironmentDoc::load(&config.environment_path).map_err(|err| err.to_string())?;
    let (owner, repo) = match (doc.owner.clone(), doc.repo.clone()) {
        (Some(owner), Some(repo)) => (owner, repo),
        _ => repo_identity_from_git().map_err(|err| err.to_string())?,
    };
    let token = doc.resolve_token();
    let has_token = token.is_some();
    let forge = HttpForge::new(&doc.api_base, owner, repo, token.clone())
        .map_err(|err| err.to_string())?;
    // Resolve redirected names once so every later call uses canonical ones.
    let (owner, repo) = forge.resolve_repo();
    let forge =
        HttpForge::new(&doc.api_base, owner, repo, token).map_err(|err| err.to_string())?;
    Ok((forge, has_token))
}

/// Runs the selected command.
fn run(cli: Cli) -> ExitCode {
    let mut config = SupervisorConfig::rooted_at(&cli.repo_root);

    match cli.command {
        CliCommand::Run {
            max_cycles,
        } => {
            config.max_cycles = max_cycles;
            let (forge, has_token) = match build_forge(&config) {
                Ok(built) => built,
                Err(message) => {
                    println!("startup failure: {message}");
                    return ExitCode::from(1);
                }
            };
            config.has_token = has_token;
            let reporter = StdoutReporter;
            let mut supervisor = Supervisor::new(config, &forge, &reporter);
            ExitCode::from(supervisor.run().exit_code())
        }
        CliCommand::Gate => {
            let (forge, has_token) = match build_forge(&config) {
                Ok(built) => built,
                Err(message) => {
                    println!("startup failure: {message}");
                    return ExitCode::from(1);
                }
            };
            config.has_token = has_token;
            let reporter = StdoutReporter;
            let mut supervisor = Supervisor::new(config, &forge, &reporter);
            match supervisor.run_gate_only() {
                Ok(()) => ExitCode::from(0),
                Err(err) if err.is_kill_switch() => {
                    println!("kill-switch: {err}");
                    ExitCode::from(2)
                }
                Err(err) => {
                    println!("gate failure: {err}");
                    ExitCode::from(1)
                }
            }
        }
        CliCommand::ValidateEnv => {
            let (forge, has_token) = match build_forge(&config) {
                Ok(built) => built,
                Err(message) => {
                    println!("startup failure: {message}");
                    return ExitCode::from(1);
                }
            };
            let paths = EnvironmentPaths {
                repo_root: config.repo_root.clone(),
                governance_path: config.governance_path.clone(),
                environment_path: config.environment_path.clone(),
                runtime_probe: config.runtime_probe.clone(),
            };
            let report = validate_environment(&forge, &paths, has_token, "in-progress");
            match serde_json::to_string_pretty(&report) {
                Ok(rendered) => println!("{rendered}"),
                Err(err) => println!("report render failure: {err}"),
            }
            if report.environment_valid {
                ExitCode::from(0)
            } else {
                ExitCode::from(1)
            }
        }
        CliCommand::VerifyStream {
            stream_id,
        } => match verify_audit_stream(&config.repo_root, &stream_id) {
            Ok(length) => {
                println!("stream {stream_id} verified length={length}");
                ExitCode::from(0)
            }
            Err(err) => {
                println!("stream {stream_id} verification failed: {err}");
                ExitCode::from(2)
            }
        },
    }
}

fn main() -> ExitCode {
    run(Cli::parse())
}
