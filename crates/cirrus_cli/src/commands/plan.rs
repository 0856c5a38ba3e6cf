//! Plan command - compose the deployment and print the creation order.

use std::path::PathBuf;

use anyhow::Result;
use clap::Args;
use tracing::info;

use cirrus_core::App;

#[derive(Args)]
pub struct PlanArgs {
    /// Path to a YAML deployment config (defaults apply if omitted)
    #[arg(short, long)]
    config: Option<PathBuf>,
}

pub async fn execute(args: PlanArgs) -> Result<()> {
    let spec = crate::config::load_spec(args.config.as_deref())?;
    info!("planning deployment '{}'", spec.name);

    let mut app = App::new(spec.name.clone());
    spec.instantiate(&mut app)?;

    let order = app.creation_order()?;
    println!("Creation order ({} resources):", order.len());
    for (position, path) in order.iter().enumerate() {
        println!("  {:>3}. {}", position + 1, path);
    }

    Ok(())
}
