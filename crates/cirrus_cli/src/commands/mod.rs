//! CLI command definitions.
//!
//! Each subcommand drives one phase of the synthesis pipeline: `plan`
//! stops after graph composition, `synth` runs the full pass against the
//! simulated provisioner.

use clap::{Parser, Subcommand};

pub mod plan;
pub mod synth;

/// Cirrus - dependency-aware deployment composition
#[derive(Parser)]
#[command(name = "cirrus")]
#[command(version, about = "Cirrus - dependency-aware deployment composition")]
#[command(long_about = r#"
Cirrus composes cloud deployments as a dependency graph of declared
resources, then resolves them in a deterministic topological pass.

COMMANDS:
  plan   → Compose the deployment and print the creation order
  synth  → Run a full synthesis pass and print the resolved outputs

EXIT CODES:
  0 - Success
  1 - General error
  2 - Invalid arguments
  3 - Composition error (cycles, visibility violations)
  4 - Provisioning failure
"#)]
#[command(propagate_version = true)]
pub struct Cli {
    /// Enable verbose output
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Suppress non-essential output
    #[arg(short, long, global = true)]
    pub quiet: bool,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Compose the deployment and print its creation order
    Plan(plan::PlanArgs),

    /// Run a full synthesis pass against the simulated provisioner
    Synth(synth::SynthArgs),
}
