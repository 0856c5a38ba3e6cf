//! Cirrus CLI - Main entry point.
//!
//! Exit codes:
//! - 0: Success
//! - 1: General error
//! - 2: Invalid arguments
//! - 3: Composition error (cycles, visibility violations)
//! - 4: Provisioning failure

use std::process::ExitCode;

use clap::Parser;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use cirrus_aws::AwsError;
use cirrus_core::SynthError;

mod commands;
mod config;

use commands::{Cli, Commands};

/// CI-friendly exit codes
pub struct ExitCodes;

impl ExitCodes {
    pub const SUCCESS: u8 = 0;
    pub const GENERAL_ERROR: u8 = 1;
    pub const INVALID_ARGS: u8 = 2;
    pub const COMPOSITION_ERROR: u8 = 3;
    pub const PROVISIONING_FAILURE: u8 = 4;
}

#[tokio::main]
async fn main() -> ExitCode {
    // Initialize logging
    let log_result = tracing_subscriber::registry()
        .with(fmt::layer().with_target(false))
        .with(
            EnvFilter::from_default_env()
                .add_directive("cirrus=info".parse().unwrap())
                .add_directive("warn".parse().unwrap()),
        )
        .try_init();

    if log_result.is_err() {
        // Logging already initialized, continue
    }

    let cli = Cli::parse();

    let result = match cli.command {
        Commands::Synth(args) => commands::synth::execute(args).await,
        Commands::Plan(args) => commands::plan::execute(args).await,
    };

    match result {
        Ok(()) => ExitCode::from(ExitCodes::SUCCESS),
        Err(e) => {
            let exit_code = categorize_error(&e);
            eprintln!("Error: {:#}", e);
            ExitCode::from(exit_code)
        }
    }
}

/// Categorize error to determine exit code
fn categorize_error(e: &anyhow::Error) -> u8 {
    if let Some(synth) = e.downcast_ref::<SynthError>() {
        return categorize_synth(synth);
    }
    if let Some(aws) = e.downcast_ref::<AwsError>() {
        return match aws {
            AwsError::Synth(inner) => categorize_synth(inner),
            AwsError::InvalidCidr(_)
            | AwsError::CidrExhausted { .. }
            | AwsError::NoAvailabilityZones => ExitCodes::INVALID_ARGS,
        };
    }

    let msg = e.to_string().to_lowercase();
    if msg.contains("argument") || msg.contains("not found") {
        ExitCodes::INVALID_ARGS
    } else {
        ExitCodes::GENERAL_ERROR
    }
}

fn categorize_synth(e: &SynthError) -> u8 {
    match e {
        SynthError::Cycle { .. }
        | SynthError::ForeignReference { .. }
        | SynthError::DuplicateResource { .. }
        | SynthError::BindingTargetMissing { .. } => ExitCodes::COMPOSITION_ERROR,
        SynthError::Provisioning { .. } | SynthError::IncompleteGraph { .. } => {
            ExitCodes::PROVISIONING_FAILURE
        }
        _ => ExitCodes::GENERAL_ERROR,
    }
}
