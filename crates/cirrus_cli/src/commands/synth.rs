//! Synth command - run a full synthesis pass.

use std::path::PathBuf;

use anyhow::Result;
use clap::Args;
use tracing::info;

use cirrus_aws::SimProvisioner;
use cirrus_core::{synthesize, App};

#[derive(Args)]
pub struct SynthArgs {
    /// Path to a YAML deployment config (defaults apply if omitted)
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Account id the simulated provisioner reports
    #[arg(long, default_value = "111111111111")]
    account: String,

    /// Region the simulated provisioner reports
    #[arg(long, default_value = "us-east-1")]
    region: String,

    /// Print the resolved outputs as JSON instead of a table
    #[arg(long)]
    json: bool,
}

pub async fn execute(args: SynthArgs) -> Result<()> {
    let spec = crate::config::load_spec(args.config.as_deref())?;
    info!("synthesizing deployment '{}'", spec.name);

    let mut app = App::new(spec.name.clone());
    spec.instantiate(&mut app)?;

    let provisioner = SimProvisioner::new(args.account, args.region);
    let result = synthesize(&mut app, &provisioner).await?;

    if args.json {
        println!("{}", serde_json::to_string_pretty(result.outputs())?);
        return Ok(());
    }

    println!(
        "Synthesis {} completed: {} resources, {} bindings",
        result.run_id,
        result.creation_order.len(),
        result.bindings_applied
    );
    println!();
    println!("Outputs:");
    for (key, value) in result.outputs() {
        println!("  {key} = {value}");
    }

    Ok(())
}
